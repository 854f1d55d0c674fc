//! User profile derived from kind-0 metadata events.

use nostr_sdk::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub pubkey: PublicKey,
    pub created_at: Timestamp,
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub about: Option<String>,
    pub picture: Option<String>,
    pub banner: Option<String>,
    pub nip05: Option<String>,
    pub lud16: Option<String>,
    pub website: Option<String>,
}

impl Profile {
    /// Parse a kind-0 event. Returns `None` for other kinds or content that
    /// is not valid metadata JSON.
    pub fn from_event(event: &Event) -> Option<Profile> {
        if event.kind != Kind::Metadata {
            return None;
        }
        let metadata = Metadata::from_json(&event.content).ok()?;
        Some(Profile {
            pubkey: event.pubkey,
            created_at: event.created_at,
            name: metadata.name,
            display_name: metadata.display_name,
            about: metadata.about,
            picture: metadata.picture,
            banner: metadata.banner,
            nip05: metadata.nip05,
            lud16: metadata.lud16,
            website: metadata.website,
        })
    }

    /// Human-facing label: display name, then name, then a shortened npub.
    pub fn display_label(&self) -> String {
        if let Some(name) = self.display_name.as_deref().filter(|s| !s.is_empty()) {
            return name.to_string();
        }
        if let Some(name) = self.name.as_deref().filter(|s| !s.is_empty()) {
            return name.to_string();
        }
        let npub = self
            .pubkey
            .to_bech32()
            .unwrap_or_else(|_| self.pubkey.to_hex());
        npub.chars().take(12).collect()
    }

    /// Case-insensitive match against name, display name, npub, or hex key.
    pub fn matches(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        let npub = self.pubkey.to_bech32().unwrap_or_default();
        self.name
            .as_deref()
            .map(|n| n.to_lowercase().contains(&term))
            .unwrap_or(false)
            || self
                .display_name
                .as_deref()
                .map(|n| n.to_lowercase().contains(&term))
                .unwrap_or(false)
            || npub.contains(&term)
            || self.pubkey.to_hex().contains(&term)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata_event(keys: &Keys, metadata: &Metadata) -> Event {
        EventBuilder::metadata(metadata)
            .sign_with_keys(keys)
            .expect("failed to sign metadata")
    }

    #[test]
    fn test_from_event_parses_metadata() {
        let keys = Keys::generate();
        let metadata = Metadata::new()
            .name("fiatjaf")
            .display_name("Fiatjaf")
            .about("buy bitcoin");
        let event = metadata_event(&keys, &metadata);

        let profile = Profile::from_event(&event).expect("should parse");
        assert_eq!(profile.pubkey, keys.public_key());
        assert_eq!(profile.name.as_deref(), Some("fiatjaf"));
        assert_eq!(profile.display_label(), "Fiatjaf");
    }

    #[test]
    fn test_from_event_rejects_other_kinds() {
        let keys = Keys::generate();
        let event = EventBuilder::text_note("not metadata")
            .sign_with_keys(&keys)
            .unwrap();
        assert!(Profile::from_event(&event).is_none());
    }

    #[test]
    fn test_display_label_falls_back_to_npub() {
        let keys = Keys::generate();
        let event = metadata_event(&keys, &Metadata::new());
        let profile = Profile::from_event(&event).unwrap();

        let label = profile.display_label();
        assert!(label.starts_with("npub1"));
        assert_eq!(label.chars().count(), 12);
    }

    #[test]
    fn test_matches_searches_all_identifiers() {
        let keys = Keys::generate();
        let event = metadata_event(&keys, &Metadata::new().name("Alice In Nostrland"));
        let profile = Profile::from_event(&event).unwrap();

        assert!(profile.matches("alice"));
        assert!(profile.matches("nostrland"));
        assert!(profile.matches(&keys.public_key().to_hex()[..16]));
        assert!(!profile.matches("bob"));
    }
}
