//! Query aggregation: fan filters out across the pool, merge, suppress
//! muted authors, order deterministically, and lift raw events into
//! domain objects.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::Result;
use nostr_sdk::prelude::*;
use tracing::debug;

use crate::cache::CacheSink;
use crate::constants::{kinds, DM_PAGE_LIMIT, FEED_PAGE_LIMIT};
use crate::models::{note, Note, Profile, ZapReceipt};
use crate::relay::RelayPool;
use crate::session::Session;

pub struct QueryAggregator {
    pool: Arc<RelayPool>,
    session: Arc<Session>,
    cache: Arc<dyn CacheSink>,
}

/// Newest kind-0 per author; older profile versions from slower relays
/// are superseded, never merged.
pub(crate) fn latest_profiles(events: &[Event]) -> Vec<Profile> {
    let mut latest: HashMap<PublicKey, Profile> = HashMap::new();
    for event in events {
        if let Some(profile) = Profile::from_event(event) {
            let newer = latest
                .get(&profile.pubkey)
                .map(|existing| profile.created_at > existing.created_at)
                .unwrap_or(true);
            if newer {
                latest.insert(profile.pubkey, profile);
            }
        }
    }
    latest.into_values().collect()
}

/// Mute suppression, dedupe, and deterministic feed ordering:
/// `created_at` descending, ties broken by event id so two clients
/// render the same feed for the same data.
pub(crate) fn finalize_feed(
    events: Vec<Event>,
    muted: &HashSet<PublicKey>,
    include_muted: bool,
) -> Vec<Event> {
    let mut seen = HashSet::new();
    let mut feed: Vec<Event> = events
        .into_iter()
        .filter(|e| include_muted || !muted.contains(&e.pubkey))
        .filter(|e| seen.insert(e.id))
        .collect();
    feed.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    feed
}

impl QueryAggregator {
    pub fn new(pool: Arc<RelayPool>, session: Arc<Session>, cache: Arc<dyn CacheSink>) -> Self {
        Self {
            pool,
            session,
            cache,
        }
    }

    /// Feed query with the current mute list applied.
    pub async fn fetch_feed(&self, filters: Vec<Filter>) -> Result<Vec<Event>> {
        self.fetch_feed_with(filters, false).await
    }

    /// Feed query; `include_muted` bypasses mute suppression for callers
    /// that explicitly want everything (e.g. viewing a muted profile).
    pub async fn fetch_feed_with(
        &self,
        filters: Vec<Filter>,
        include_muted: bool,
    ) -> Result<Vec<Event>> {
        let events = self
            .pool
            .query_all(&self.session.relays(), filters)
            .await?;
        let muted = self.session.muted_pubkeys();
        Ok(finalize_feed(events, &muted, include_muted))
    }

    /// Latest profile for one pubkey.
    pub async fn fetch_profile(&self, pubkey: &PublicKey) -> Result<Option<Profile>> {
        let filter = Filter::new()
            .kind(Kind::Metadata)
            .author(*pubkey)
            .limit(1);
        let event = self.pool.query(&self.session.relays(), filter).await?;
        let profile = event.as_ref().and_then(Profile::from_event);
        if let Some(profile) = &profile {
            self.remember_profile(profile);
            self.cache.store_profiles(std::slice::from_ref(profile));
        }
        Ok(profile)
    }

    /// Latest profile per author. Multiple kind-0 events per author may
    /// arrive from different relays; only the newest survives.
    pub async fn fetch_profiles(&self, authors: Vec<PublicKey>) -> Result<Vec<Profile>> {
        if authors.is_empty() {
            return Ok(Vec::new());
        }
        let filter = Filter::new().kind(Kind::Metadata).authors(authors);
        let events = self
            .pool
            .query_all(&self.session.relays(), vec![filter])
            .await?;

        let profiles = latest_profiles(&events);
        for profile in &profiles {
            self.remember_profile(profile);
        }
        self.cache.store_profiles(&profiles);
        debug!(profiles = profiles.len(), "profiles fetched");
        Ok(profiles)
    }

    /// Profiles of everyone the active identity follows.
    pub async fn fetch_contact_profiles(&self) -> Result<Vec<Profile>> {
        let authors = self.session.contacts().pubkeys();
        self.fetch_profiles(authors).await
    }

    /// Fetch every known profile and keep the ones matching `term`.
    /// Relay-side search is not assumed; matching happens locally.
    pub async fn search_profiles(&self, term: &str) -> Result<Vec<Profile>> {
        let filter = Filter::new().kind(Kind::Metadata).limit(FEED_PAGE_LIMIT);
        let events = self
            .pool
            .query_all(&self.session.relays(), vec![filter])
            .await?;

        let matches: Vec<Profile> = latest_profiles(&events)
            .into_iter()
            .filter(|p| p.matches(term))
            .collect();
        self.cache.store_profiles(&matches);
        Ok(matches)
    }

    /// A user's notes and reposts in `[since, until]`, reposts resolved to
    /// the original notes in a second round-trip. Feed-ordered.
    pub async fn fetch_user_notes(
        &self,
        pubkey: &PublicKey,
        since: Timestamp,
        until: Timestamp,
    ) -> Result<Vec<Note>> {
        let notes_filter = Filter::new()
            .kind(Kind::from(kinds::TEXT_NOTE))
            .author(*pubkey)
            .since(since)
            .until(until)
            .limit(FEED_PAGE_LIMIT);
        let reposts_filter = Filter::new()
            .kind(Kind::from(kinds::REPOST))
            .author(*pubkey)
            .since(since)
            .until(until)
            .limit(FEED_PAGE_LIMIT);

        let events = self
            .fetch_feed_with(vec![notes_filter, reposts_filter], true)
            .await?;

        let mut notes = Vec::new();
        let mut repost_ids = Vec::new();
        for event in &events {
            if let Some(n) = Note::from_event(event, None) {
                notes.push(n);
            } else if let Some(target) = note::repost_target(event) {
                repost_ids.push(target);
            }
        }

        if !repost_ids.is_empty() {
            let filter = Filter::new()
                .kind(Kind::from(kinds::TEXT_NOTE))
                .ids(repost_ids);
            let originals = self.fetch_feed_with(vec![filter], true).await?;
            notes.extend(
                originals
                    .iter()
                    .filter_map(|e| Note::from_event(e, Some(*pubkey))),
            );
        }

        notes.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(notes)
    }

    /// One note by id, if any relay still has it.
    pub async fn fetch_note(&self, id: &EventId) -> Result<Option<Note>> {
        let filter = Filter::new()
            .kind(Kind::from(kinds::TEXT_NOTE))
            .id(*id)
            .limit(1);
        let event = self.pool.query(&self.session.relays(), filter).await?;
        Ok(event.as_ref().and_then(|e| Note::from_event(e, None)))
    }

    /// A note and its replies, in chronological order for thread reading.
    /// Mutes still apply: a muted reply disappears from the thread.
    pub async fn fetch_note_thread(&self, id: &EventId) -> Result<Vec<Note>> {
        let root_filter = Filter::new()
            .kind(Kind::from(kinds::TEXT_NOTE))
            .id(*id)
            .limit(1);
        let replies_filter = Filter::new()
            .kind(Kind::from(kinds::TEXT_NOTE))
            .event(*id);

        let events = self
            .fetch_feed_with(vec![root_filter, replies_filter], false)
            .await?;
        let mut thread: Vec<Note> = events
            .iter()
            .filter_map(|e| Note::from_event(e, None))
            .collect();
        thread.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(thread)
    }

    /// Encrypted direct messages to and from the active identity, in
    /// conversation order. Contents stay encrypted; decrypt per message
    /// with the encryption service.
    pub async fn fetch_direct_message_events(&self) -> Result<Vec<Event>> {
        let Some(pubkey) = self.session.identity().public_key() else {
            return Ok(Vec::new());
        };
        let inbound = Filter::new()
            .kind(Kind::from(kinds::ENCRYPTED_DM))
            .pubkey(pubkey)
            .limit(DM_PAGE_LIMIT);
        let outbound = Filter::new()
            .kind(Kind::from(kinds::ENCRYPTED_DM))
            .author(pubkey)
            .limit(DM_PAGE_LIMIT);

        let mut events = self
            .pool
            .query_all(&self.session.relays(), vec![inbound, outbound])
            .await?;
        events.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(events)
    }

    /// Zap receipts addressed to the active identity, newest first.
    pub async fn fetch_zap_notifications(&self) -> Result<Vec<ZapReceipt>> {
        let Some(pubkey) = self.session.identity().public_key() else {
            return Ok(Vec::new());
        };
        let filter = Filter::new()
            .kind(Kind::from(kinds::ZAP_RECEIPT))
            .pubkey(pubkey)
            .limit(FEED_PAGE_LIMIT);
        let events = self
            .pool
            .query_all(&self.session.relays(), vec![filter])
            .await?;

        let mut receipts: Vec<ZapReceipt> = events
            .iter()
            .filter_map(ZapReceipt::from_event)
            .collect();
        receipts.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        self.cache.store_notifications(&receipts);
        Ok(receipts)
    }

    /// Note ids the active identity has reacted to.
    pub async fn fetch_liked_note_ids(&self) -> Result<Vec<EventId>> {
        let Some(pubkey) = self.session.identity().public_key() else {
            return Ok(Vec::new());
        };
        let filter = Filter::new()
            .kind(Kind::from(kinds::REACTION))
            .author(pubkey);
        let events = self
            .pool
            .query_all(&self.session.relays(), vec![filter])
            .await?;

        let mut seen = HashSet::new();
        Ok(events
            .iter()
            .filter_map(|event| {
                event.tags.iter().rev().find_map(|tag| {
                    let fields = tag.as_slice();
                    if fields.first().map(|s| s.as_str()) == Some("e") {
                        fields.get(1).and_then(|v| EventId::from_hex(v).ok())
                    } else {
                        None
                    }
                })
            })
            .filter(|id| seen.insert(*id))
            .collect())
    }

    /// Notes tagged with any word of `term` (hashtag search).
    pub async fn search_notes(&self, term: &str) -> Result<Vec<Note>> {
        let hashtags: Vec<String> = term
            .split_whitespace()
            .map(|w| w.trim_start_matches('#').to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        if hashtags.is_empty() {
            return Ok(Vec::new());
        }
        let mut filter = Filter::new()
            .kind(Kind::from(kinds::TEXT_NOTE))
            .limit(FEED_PAGE_LIMIT);
        for hashtag in hashtags {
            filter = filter.hashtag(hashtag);
        }

        let events = self.fetch_feed(vec![filter]).await?;
        Ok(events
            .iter()
            .filter_map(|e| Note::from_event(e, None))
            .collect())
    }

    fn remember_profile(&self, profile: &Profile) {
        let label = profile.display_label();
        self.session
            .with_prefs(|p| p.remember_display_name(&profile.pubkey.to_hex(), &label));
    }
}
