//! Persisted settings (JSON file under the data directory).
//!
//! Plays the role the browser's key-value storage plays for the original
//! system: relay configuration, the stored credential, and small user
//! settings. Every setter writes through to disk.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_RELAYS;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Preferences {
    #[serde(default)]
    pub relays: Vec<String>,
    /// `nsec1...` or NIP-49 `ncryptsec1...`.
    #[serde(default)]
    pub credentials: Option<String>,
    #[serde(default)]
    pub last_pubkey: Option<String>,
    #[serde(default)]
    pub default_zap_amount: Option<u64>,
    /// Cached display names keyed by hex pubkey, so labels survive restarts.
    #[serde(default)]
    pub display_names: HashMap<String, String>,
}

pub struct PreferencesStorage {
    path: PathBuf,
    pub prefs: Preferences,
}

impl PreferencesStorage {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        let path = data_dir.as_ref().join("preferences.json");
        let prefs = Self::load_from_file(&path).unwrap_or_default();
        Self { path, prefs }
    }

    fn load_from_file(path: &PathBuf) -> Option<Preferences> {
        let contents = fs::read_to_string(path).ok()?;
        serde_json::from_str(&contents).ok()
    }

    fn save_to_file(&self) {
        if let Ok(json) = serde_json::to_string_pretty(&self.prefs) {
            let _ = fs::write(&self.path, json);
        }
    }

    /// Configured relays, falling back to the defaults when none are stored.
    pub fn relays(&self) -> Vec<String> {
        if self.prefs.relays.is_empty() {
            DEFAULT_RELAYS.iter().map(|s| s.to_string()).collect()
        } else {
            self.prefs.relays.clone()
        }
    }

    pub fn set_relays(&mut self, relays: Vec<String>) {
        self.prefs.relays = relays;
        self.save_to_file();
    }

    pub fn store_credentials(&mut self, credential: &str) {
        self.prefs.credentials = Some(credential.to_string());
        self.save_to_file();
    }

    pub fn get_stored_credentials(&self) -> Option<String> {
        self.prefs.credentials.clone()
    }

    pub fn clear_credentials(&mut self) {
        self.prefs.credentials = None;
        self.prefs.last_pubkey = None;
        self.save_to_file();
    }

    pub fn has_stored_credentials(&self) -> bool {
        self.prefs.credentials.is_some()
    }

    pub fn credentials_need_password(&self) -> bool {
        self.prefs
            .credentials
            .as_deref()
            .map(|c| c.starts_with("ncryptsec"))
            .unwrap_or(false)
    }

    pub fn set_last_pubkey(&mut self, pubkey_hex: &str) {
        self.prefs.last_pubkey = Some(pubkey_hex.to_string());
        self.save_to_file();
    }

    pub fn last_pubkey(&self) -> Option<&str> {
        self.prefs.last_pubkey.as_deref()
    }

    pub fn default_zap_amount(&self) -> u64 {
        self.prefs.default_zap_amount.unwrap_or(5)
    }

    pub fn set_default_zap_amount(&mut self, sats: u64) {
        self.prefs.default_zap_amount = Some(sats);
        self.save_to_file();
    }

    pub fn display_name(&self, pubkey_hex: &str) -> Option<&str> {
        self.prefs.display_names.get(pubkey_hex).map(|s| s.as_str())
    }

    pub fn remember_display_name(&mut self, pubkey_hex: &str, name: &str) {
        self.prefs
            .display_names
            .insert(pubkey_hex.to_string(), name.to_string());
        self.save_to_file();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_preferences_round_trip() {
        let dir = tempdir().unwrap();

        {
            let mut storage = PreferencesStorage::new(dir.path());
            storage.set_relays(vec!["wss://relay.example.com".to_string()]);
            storage.store_credentials("nsec1example");
            storage.set_default_zap_amount(21);
        }

        let reloaded = PreferencesStorage::new(dir.path());
        assert_eq!(reloaded.relays(), vec!["wss://relay.example.com"]);
        assert_eq!(
            reloaded.get_stored_credentials().as_deref(),
            Some("nsec1example")
        );
        assert_eq!(reloaded.default_zap_amount(), 21);
    }

    #[test]
    fn test_empty_relays_fall_back_to_defaults() {
        let dir = tempdir().unwrap();
        let storage = PreferencesStorage::new(dir.path());
        assert_eq!(storage.relays().len(), DEFAULT_RELAYS.len());
    }

    #[test]
    fn test_clear_credentials_also_forgets_pubkey() {
        let dir = tempdir().unwrap();
        let mut storage = PreferencesStorage::new(dir.path());
        storage.store_credentials("nsec1example");
        storage.set_last_pubkey("ab".repeat(32).as_str());

        storage.clear_credentials();
        assert!(!storage.has_stored_credentials());
        assert!(storage.last_pubkey().is_none());
    }

    #[test]
    fn test_corrupt_file_yields_defaults() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("preferences.json"), "{not json").unwrap();
        let storage = PreferencesStorage::new(dir.path());
        assert!(!storage.has_stored_credentials());
    }
}
