//! Contact (kind 3) and mute (kind 10000) lists: derivation from events,
//! serialization back to tags, and the fetch/publish flows.
//!
//! Parsing is forgiving by contract: malformed pubkeys are silently
//! dropped and duplicates collapse to the first occurrence, so one bad
//! tag never discards an entire list.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use nostr_sdk::prelude::*;
use tracing::debug;

use crate::constants::kinds;
use crate::error::SigningError;
use crate::publisher::{PublishCoordinator, PublishReport};
use crate::relay::RelayPool;
use crate::session::Session;

/// One followed pubkey with its optional relay hint and petname label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactEntry {
    pub pubkey: PublicKey,
    pub relay_hint: Option<String>,
    pub petname: Option<String>,
}

/// Deduplicated follow set in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactList {
    entries: Vec<ContactEntry>,
}

impl ContactList {
    /// Derive from a kind-3 event's `p` tags.
    pub fn from_event(event: &Event) -> ContactList {
        Self::from_tag_slices(event.tags.iter().map(|t| t.as_slice()))
    }

    fn from_tag_slices<'a, I>(tags: I) -> ContactList
    where
        I: Iterator<Item = &'a [String]>,
    {
        let mut list = ContactList::default();
        for fields in tags {
            if fields.first().map(|s| s.as_str()) != Some("p") {
                continue;
            }
            let Some(pubkey) = fields.get(1).and_then(|v| PublicKey::from_hex(v).ok()) else {
                continue;
            };
            let relay_hint = fields.get(2).filter(|s| !s.is_empty()).cloned();
            let petname = fields.get(3).filter(|s| !s.is_empty()).cloned();
            list.insert(ContactEntry {
                pubkey,
                relay_hint,
                petname,
            });
        }
        list
    }

    /// Insert, keeping the first occurrence on duplicates.
    pub fn insert(&mut self, entry: ContactEntry) {
        if !self.contains(&entry.pubkey) {
            self.entries.push(entry);
        }
    }

    pub fn remove(&mut self, pubkey: &PublicKey) {
        self.entries.retain(|e| &e.pubkey != pubkey);
    }

    pub fn contains(&self, pubkey: &PublicKey) -> bool {
        self.entries.iter().any(|e| &e.pubkey == pubkey)
    }

    pub fn entries(&self) -> &[ContactEntry] {
        &self.entries
    }

    pub fn pubkeys(&self) -> Vec<PublicKey> {
        self.entries.iter().map(|e| e.pubkey).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize back to kind-3 `p` tags.
    pub fn to_tags(&self) -> Vec<Tag> {
        self.entries
            .iter()
            .map(|entry| {
                let mut values = vec![entry.pubkey.to_hex()];
                match (&entry.relay_hint, &entry.petname) {
                    (hint, Some(petname)) => {
                        values.push(hint.clone().unwrap_or_default());
                        values.push(petname.clone());
                    }
                    (Some(hint), None) => values.push(hint.clone()),
                    (None, None) => {}
                }
                Tag::custom(
                    TagKind::SingleLetter(SingleLetterTag::lowercase(Alphabet::P)),
                    values,
                )
            })
            .collect()
    }
}

/// Muted authors derived from the latest kind-10000 event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MuteList {
    pubkeys: Vec<PublicKey>,
}

impl MuteList {
    pub fn from_event(event: &Event) -> MuteList {
        let mut list = MuteList::default();
        for tag in event.tags.iter() {
            let fields = tag.as_slice();
            if fields.first().map(|s| s.as_str()) != Some("p") {
                continue;
            }
            if let Some(pubkey) = fields.get(1).and_then(|v| PublicKey::from_hex(v).ok()) {
                list.insert(pubkey);
            }
        }
        list
    }

    pub fn from_pubkeys(pubkeys: Vec<PublicKey>) -> MuteList {
        let mut list = MuteList::default();
        for pubkey in pubkeys {
            list.insert(pubkey);
        }
        list
    }

    pub fn insert(&mut self, pubkey: PublicKey) {
        if !self.pubkeys.contains(&pubkey) {
            self.pubkeys.push(pubkey);
        }
    }

    pub fn remove(&mut self, pubkey: &PublicKey) {
        self.pubkeys.retain(|p| p != pubkey);
    }

    pub fn contains(&self, pubkey: &PublicKey) -> bool {
        self.pubkeys.contains(pubkey)
    }

    pub fn pubkeys(&self) -> &[PublicKey] {
        &self.pubkeys
    }

    pub fn is_empty(&self) -> bool {
        self.pubkeys.is_empty()
    }

    pub fn to_tags(&self) -> Vec<Tag> {
        self.pubkeys
            .iter()
            .map(|pubkey| {
                Tag::custom(
                    TagKind::SingleLetter(SingleLetterTag::lowercase(Alphabet::P)),
                    vec![pubkey.to_hex()],
                )
            })
            .collect()
    }
}

/// Fetches, refreshes, and republishes the contact and mute lists.
pub struct ListManager {
    pool: Arc<RelayPool>,
    session: Arc<Session>,
    publisher: Arc<PublishCoordinator>,
}

impl ListManager {
    pub fn new(
        pool: Arc<RelayPool>,
        session: Arc<Session>,
        publisher: Arc<PublishCoordinator>,
    ) -> Self {
        Self {
            pool,
            session,
            publisher,
        }
    }

    /// Latest contact list for `pubkey`, empty when no kind-3 exists.
    pub async fn fetch_contact_list(&self, pubkey: &PublicKey) -> Result<ContactList> {
        let filter = Filter::new()
            .kind(Kind::from(kinds::CONTACT_LIST))
            .author(*pubkey)
            .limit(1);
        let event = self.pool.query(&self.session.relays(), filter).await?;
        Ok(event
            .map(|e| ContactList::from_event(&e))
            .unwrap_or_default())
    }

    /// Refresh the active identity's contact list into the session.
    pub async fn refresh_contacts(&self) -> Result<ContactList> {
        let Some(pubkey) = self.session.identity().public_key() else {
            return Ok(ContactList::default());
        };
        let list = self.fetch_contact_list(&pubkey).await?;
        debug!(contacts = list.len(), "contact list refreshed");
        self.session.replace_contacts(list.clone());
        Ok(list)
    }

    /// Publish `list` as the identity's new kind-3 and install it locally.
    pub async fn publish_contact_list(
        &self,
        list: &ContactList,
    ) -> Result<PublishReport, SigningError> {
        let report = self
            .publisher
            .publish(Kind::from(kinds::CONTACT_LIST), list.to_tags(), "")
            .await?;
        self.session.replace_contacts(list.clone());
        Ok(report)
    }

    /// Latest mute list for `pubkey`, empty when no kind-10000 exists.
    pub async fn fetch_mute_list(&self, pubkey: &PublicKey) -> Result<MuteList> {
        let filter = Filter::new()
            .kind(Kind::from(kinds::MUTE_LIST))
            .author(*pubkey)
            .limit(1);
        let event = self.pool.query(&self.session.relays(), filter).await?;
        Ok(event.map(|e| MuteList::from_event(&e)).unwrap_or_default())
    }

    /// Refresh the active identity's mute list into the session.
    pub async fn refresh_mutes(&self) -> Result<MuteList> {
        let Some(pubkey) = self.session.identity().public_key() else {
            return Ok(MuteList::default());
        };
        let list = self.fetch_mute_list(&pubkey).await?;
        debug!(muted = list.pubkeys().len(), "mute list refreshed");
        self.session.replace_mutes(list.clone());
        Ok(list)
    }

    /// Publish `list` as the identity's new kind-10000 and install it.
    pub async fn publish_mute_list(&self, list: &MuteList) -> Result<PublishReport, SigningError> {
        let report = self
            .publisher
            .publish(Kind::from(kinds::MUTE_LIST), list.to_tags(), "")
            .await?;
        self.session.replace_mutes(list.clone());
        Ok(report)
    }

    /// Add `pubkey` to the mute list and republish the whole list.
    pub async fn mute(&self, pubkey: PublicKey) -> Result<PublishReport, SigningError> {
        let mut list = self.session.mutes();
        list.insert(pubkey);
        self.publish_mute_list(&list).await
    }

    /// Remove `pubkey` from the mute list and republish.
    pub async fn unmute(&self, pubkey: &PublicKey) -> Result<PublishReport, SigningError> {
        let mut list = self.session.mutes();
        list.remove(pubkey);
        self.publish_mute_list(&list).await
    }

    /// Follow `pubkey` and republish the contact list.
    pub async fn follow(
        &self,
        pubkey: PublicKey,
        petname: Option<String>,
    ) -> Result<PublishReport, SigningError> {
        let mut list = self.session.contacts();
        list.insert(ContactEntry {
            pubkey,
            relay_hint: self
                .session
                .relays()
                .first()
                .map(|url| url.to_string()),
            petname,
        });
        self.publish_contact_list(&list).await
    }

    /// Unfollow `pubkey` and republish the contact list.
    pub async fn unfollow(&self, pubkey: &PublicKey) -> Result<PublishReport, SigningError> {
        let mut list = self.session.contacts();
        list.remove(pubkey);
        self.publish_contact_list(&list).await
    }

    /// Pubkeys that follow `pubkey`, via kind-3 events carrying its `p` tag.
    pub async fn fetch_followers(
        &self,
        pubkey: &PublicKey,
        limit: usize,
    ) -> Result<Vec<PublicKey>> {
        let filter = Filter::new()
            .kind(Kind::from(kinds::CONTACT_LIST))
            .pubkey(*pubkey)
            .limit(limit);
        let events = self
            .pool
            .query_all(&self.session.relays(), vec![filter])
            .await?;
        let mut seen = HashSet::new();
        Ok(events
            .into_iter()
            .map(|e| e.pubkey)
            .filter(|pk| seen.insert(*pk))
            .collect())
    }
}
