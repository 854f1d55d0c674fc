//! Text notes (kind 1) with NIP-10 threading markers, plus repost wrapping.

use nostr_sdk::prelude::*;

use crate::constants::kinds;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub id: EventId,
    pub author: PublicKey,
    pub content: String,
    pub created_at: Timestamp,
    /// Thread root, when this note is a reply.
    pub root_id: Option<EventId>,
    /// Direct parent, when different from the root.
    pub reply_to: Option<EventId>,
    /// Pubkeys mentioned via `p` tags.
    pub mentions: Vec<PublicKey>,
    /// Set when this note reached us wrapped in a kind-6 repost.
    pub reposted_by: Option<PublicKey>,
}

impl Note {
    /// Parse a kind-1 event. Returns `None` for any other kind.
    pub fn from_event(event: &Event, reposted_by: Option<PublicKey>) -> Option<Note> {
        if event.kind != Kind::from(kinds::TEXT_NOTE) {
            return None;
        }

        let (root_id, reply_to) = parse_thread_refs(event);
        let mentions = event
            .tags
            .iter()
            .filter_map(|tag| {
                let fields = tag.as_slice();
                if fields.first().map(|s| s.as_str()) == Some("p") {
                    fields.get(1).and_then(|v| PublicKey::from_hex(v).ok())
                } else {
                    None
                }
            })
            .collect();

        Some(Note {
            id: event.id,
            author: event.pubkey,
            content: event.content.clone(),
            created_at: event.created_at,
            root_id,
            reply_to,
            mentions,
            reposted_by,
        })
    }

    pub fn is_reply(&self) -> bool {
        self.root_id.is_some() || self.reply_to.is_some()
    }
}

/// NIP-10 thread references: marked `e` tags when present, positional
/// fallback (first = root, last = reply) for legacy events.
fn parse_thread_refs(event: &Event) -> (Option<EventId>, Option<EventId>) {
    let mut marked_root = None;
    let mut marked_reply = None;
    let mut positional = Vec::new();

    for tag in event.tags.iter() {
        let fields = tag.as_slice();
        if fields.first().map(|s| s.as_str()) != Some("e") {
            continue;
        }
        let Some(id) = fields.get(1).and_then(|v| EventId::from_hex(v).ok()) else {
            continue;
        };
        match fields.get(3).map(|s| s.as_str()) {
            Some("root") => marked_root = Some(id),
            Some("reply") => marked_reply = Some(id),
            Some("mention") => {}
            _ => positional.push(id),
        }
    }

    if marked_root.is_some() || marked_reply.is_some() {
        return (marked_root.or(marked_reply), marked_reply);
    }

    match positional.as_slice() {
        [] => (None, None),
        [only] => (Some(*only), None),
        [first, .., last] => (Some(*first), Some(*last)),
    }
}

/// Extract the reposted note id from a kind-6 event's first `e` tag.
pub fn repost_target(event: &Event) -> Option<EventId> {
    if event.kind != Kind::from(kinds::REPOST) {
        return None;
    }
    event.tags.iter().find_map(|tag| {
        let fields = tag.as_slice();
        if fields.first().map(|s| s.as_str()) == Some("e") {
            fields.get(1).and_then(|v| EventId::from_hex(v).ok())
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e_tag(id: &EventId, marker: &str) -> Tag {
        let mut values = vec![id.to_hex(), String::new()];
        if !marker.is_empty() {
            values.push(marker.to_string());
        }
        Tag::custom(
            TagKind::SingleLetter(SingleLetterTag::lowercase(Alphabet::E)),
            values,
        )
    }

    fn note_event(keys: &Keys, tags: Vec<Tag>) -> Event {
        EventBuilder::text_note("body")
            .tags(tags)
            .sign_with_keys(keys)
            .unwrap()
    }

    #[test]
    fn test_top_level_note() {
        let keys = Keys::generate();
        let event = note_event(&keys, vec![]);
        let note = Note::from_event(&event, None).unwrap();
        assert!(!note.is_reply());
        assert_eq!(note.author, keys.public_key());
    }

    #[test]
    fn test_marked_root_and_reply() {
        let keys = Keys::generate();
        let root = EventId::all_zeros();
        let parent_event = note_event(&keys, vec![]);

        let event = note_event(
            &keys,
            vec![e_tag(&root, "root"), e_tag(&parent_event.id, "reply")],
        );
        let note = Note::from_event(&event, None).unwrap();
        assert_eq!(note.root_id, Some(root));
        assert_eq!(note.reply_to, Some(parent_event.id));
    }

    #[test]
    fn test_positional_fallback() {
        let keys = Keys::generate();
        let first = note_event(&keys, vec![]);
        let second = note_event(&keys, vec![e_tag(&first.id, "")]);

        // Legacy reply: two unmarked e tags, first is root, last is parent.
        let event = note_event(&keys, vec![e_tag(&first.id, ""), e_tag(&second.id, "")]);
        let note = Note::from_event(&event, None).unwrap();
        assert_eq!(note.root_id, Some(first.id));
        assert_eq!(note.reply_to, Some(second.id));

        // Single unmarked e tag is the root.
        let single = Note::from_event(&second, None).unwrap();
        assert_eq!(single.root_id, Some(first.id));
        assert_eq!(single.reply_to, None);
    }

    #[test]
    fn test_mentions_skip_malformed_pubkeys() {
        let keys = Keys::generate();
        let friend = Keys::generate().public_key();
        let event = note_event(
            &keys,
            vec![
                Tag::custom(
                    TagKind::SingleLetter(SingleLetterTag::lowercase(Alphabet::P)),
                    vec![friend.to_hex()],
                ),
                Tag::custom(
                    TagKind::SingleLetter(SingleLetterTag::lowercase(Alphabet::P)),
                    vec!["zz-not-a-key".to_string()],
                ),
            ],
        );
        let note = Note::from_event(&event, None).unwrap();
        assert_eq!(note.mentions, vec![friend]);
    }

    #[test]
    fn test_repost_target() {
        let keys = Keys::generate();
        let original = note_event(&keys, vec![]);

        let repost = EventBuilder::new(Kind::from(kinds::REPOST), "")
            .tag(e_tag(&original.id, ""))
            .sign_with_keys(&keys)
            .unwrap();
        assert_eq!(repost_target(&repost), Some(original.id));

        // Not a repost kind.
        assert_eq!(repost_target(&original), None);
    }
}
