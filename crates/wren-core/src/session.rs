//! Process-wide mutable state: active identity, relay configuration, and
//! the current contact/mute lists.
//!
//! Every field has exactly one setter and lists are swapped whole, never
//! merged field-by-field. Readers get snapshots; no lock is ever held
//! across an await point.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use nostr_sdk::prelude::*;
use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use crate::config::CoreConfig;
use crate::lists::{ContactList, MuteList};
use crate::models::PreferencesStorage;
use crate::signer::Identity;

pub struct Session {
    identity: Identity,
    relays: RwLock<Vec<RelayUrl>>,
    contacts: RwLock<ContactList>,
    mutes: RwLock<MuteList>,
    prefs: Mutex<PreferencesStorage>,
}

impl Session {
    /// Create the session store: load preferences from `data_dir` and
    /// resolve the relay set (config overrides stored preferences, which
    /// override the defaults). Invalid relay URLs are dropped with a
    /// warning rather than failing startup.
    pub fn init(config: &CoreConfig) -> Result<Arc<Session>> {
        std::fs::create_dir_all(&config.data_dir)?;
        let prefs = PreferencesStorage::new(&config.data_dir);

        let urls = if config.relays.is_empty() {
            prefs.relays()
        } else {
            config.relays.clone()
        };
        let relays = parse_relay_urls(&urls);
        info!(relays = relays.len(), "session initialized");

        Ok(Arc::new(Session {
            identity: Identity::new(),
            relays: RwLock::new(relays),
            contacts: RwLock::new(ContactList::default()),
            mutes: RwLock::new(MuteList::default()),
            prefs: Mutex::new(prefs),
        }))
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Snapshot of the configured relay set.
    pub fn relays(&self) -> Vec<RelayUrl> {
        self.relays.read().clone()
    }

    /// Replace the relay set and persist it.
    pub fn set_relays(&self, urls: Vec<String>) {
        let parsed = parse_relay_urls(&urls);
        *self.relays.write() = parsed;
        self.prefs.lock().set_relays(urls);
    }

    pub fn contacts(&self) -> ContactList {
        self.contacts.read().clone()
    }

    /// Atomically replace the contact list (rebuilt from the latest
    /// kind-3 event, never merged).
    pub fn replace_contacts(&self, list: ContactList) {
        *self.contacts.write() = list;
    }

    pub fn mutes(&self) -> MuteList {
        self.mutes.read().clone()
    }

    /// Muted authors as a set, for feed filtering.
    pub fn muted_pubkeys(&self) -> HashSet<PublicKey> {
        self.mutes.read().pubkeys().iter().copied().collect()
    }

    /// Atomically replace the mute list.
    pub fn replace_mutes(&self, list: MuteList) {
        *self.mutes.write() = list;
    }

    /// Run a closure against the preferences store.
    pub fn with_prefs<R>(&self, f: impl FnOnce(&mut PreferencesStorage) -> R) -> R {
        f(&mut self.prefs.lock())
    }

    /// Sign out: wipe key material, stored credentials, and derived lists.
    /// An in-flight signing call either completes with the old key or
    /// fails cleanly; it can never observe partial state.
    pub fn sign_out(&self) {
        self.identity.clear();
        *self.contacts.write() = ContactList::default();
        *self.mutes.write() = MuteList::default();
        self.prefs.lock().clear_credentials();
        info!("signed out, session state cleared");
    }
}

fn parse_relay_urls(urls: &[String]) -> Vec<RelayUrl> {
    urls.iter()
        .filter_map(|url| match RelayUrl::parse(url.trim()) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(url = %url, "dropping invalid relay url: {e}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_init_uses_default_relays() {
        let dir = tempdir().unwrap();
        let session = Session::init(&CoreConfig::new(dir.path())).unwrap();
        assert_eq!(
            session.relays().len(),
            crate::constants::DEFAULT_RELAYS.len()
        );
    }

    #[test]
    fn test_config_relays_override_defaults() {
        let dir = tempdir().unwrap();
        let config = CoreConfig::with_relays(
            dir.path(),
            vec![
                "wss://relay.example.com".to_string(),
                "not a url".to_string(),
            ],
        );
        let session = Session::init(&config).unwrap();

        // The invalid one was dropped, not fatal.
        let relays = session.relays();
        assert_eq!(relays.len(), 1);
        assert_eq!(
            relays[0].to_string().trim_end_matches('/'),
            "wss://relay.example.com"
        );
    }

    #[test]
    fn test_set_relays_persists() {
        let dir = tempdir().unwrap();
        {
            let session = Session::init(&CoreConfig::new(dir.path())).unwrap();
            session.set_relays(vec!["wss://other.example.com".to_string()]);
        }
        let session = Session::init(&CoreConfig::new(dir.path())).unwrap();
        assert_eq!(
            session.relays()[0].to_string().trim_end_matches('/'),
            "wss://other.example.com"
        );
    }

    #[test]
    fn test_sign_out_clears_identity_and_lists() {
        let dir = tempdir().unwrap();
        let session = Session::init(&CoreConfig::new(dir.path())).unwrap();

        let keys = Keys::generate();
        session.identity().login_local(keys.clone());
        session.with_prefs(|p| p.store_credentials("nsec1something"));
        session.replace_mutes(MuteList::from_pubkeys(vec![Keys::generate().public_key()]));

        session.sign_out();

        assert_eq!(session.identity().public_key_hex(), "");
        assert!(session.muted_pubkeys().is_empty());
        assert!(session.contacts().is_empty());
        assert!(!session.with_prefs(|p| p.has_stored_credentials()));
    }
}
