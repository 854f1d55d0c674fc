//! Login flows: generate, import, persist, and reload key material.
//!
//! Credentials persist through [`PreferencesStorage`] either as a plain
//! `nsec` or, when the user supplies a password, NIP-49 encrypted
//! (`ncryptsec`). Malformed input never mutates stored state.

use nostr_sdk::nips::nip49::EncryptedSecretKey;
use nostr_sdk::prelude::*;

use crate::error::KeyError;
use crate::models::PreferencesStorage;

/// Generate a fresh keypair and store its nsec.
pub fn generate_identity(prefs: &mut PreferencesStorage) -> Result<Keys, KeyError> {
    let keys = Keys::generate();
    let nsec = keys
        .secret_key()
        .to_bech32()
        .map_err(|e| KeyError::InvalidKey(e.to_string()))?;
    prefs.store_credentials(&nsec);
    prefs.set_last_pubkey(&keys.public_key().to_hex());
    Ok(keys)
}

/// Import an nsec (or hex secret key). With a non-empty password the
/// credential is stored NIP-49 encrypted, otherwise as the plain nsec.
pub fn login_with_nsec(
    nsec: &str,
    password: Option<&str>,
    prefs: &mut PreferencesStorage,
) -> Result<Keys, KeyError> {
    let secret_key =
        SecretKey::parse(nsec).map_err(|e| KeyError::InvalidKey(e.to_string()))?;
    let keys = Keys::new(secret_key);

    match password {
        Some(pwd) if !pwd.is_empty() => {
            let encrypted = keys
                .secret_key()
                .encrypt(pwd)
                .map_err(|e| KeyError::InvalidKey(e.to_string()))?;
            let encrypted_bech32 = encrypted
                .to_bech32()
                .map_err(|e| KeyError::InvalidKey(e.to_string()))?;
            prefs.store_credentials(&encrypted_bech32);
        }
        _ => {
            // Normalize to nsec even when the input was hex.
            let nsec = keys
                .secret_key()
                .to_bech32()
                .map_err(|e| KeyError::InvalidKey(e.to_string()))?;
            prefs.store_credentials(&nsec);
        }
    }
    prefs.set_last_pubkey(&keys.public_key().to_hex());
    Ok(keys)
}

/// Load stored keys, decrypting with the password when needed.
pub fn load_stored_keys(password: &str, prefs: &PreferencesStorage) -> Result<Keys, KeyError> {
    let stored = prefs
        .get_stored_credentials()
        .ok_or(KeyError::NoStoredCredentials)?;

    let secret_key = if stored.starts_with("ncryptsec") {
        let encrypted = EncryptedSecretKey::from_bech32(&stored)
            .map_err(|e| KeyError::InvalidKey(e.to_string()))?;
        encrypted
            .decrypt(password)
            .map_err(|e| KeyError::Unlock(e.to_string()))?
    } else {
        SecretKey::parse(&stored).map_err(|e| KeyError::InvalidKey(e.to_string()))?
    };

    Ok(Keys::new(secret_key))
}

/// Load stored keys that don't require a password (unencrypted nsec).
pub fn load_unencrypted_keys(prefs: &PreferencesStorage) -> Result<Keys, KeyError> {
    let stored = prefs
        .get_stored_credentials()
        .ok_or(KeyError::NoStoredCredentials)?;
    if stored.starts_with("ncryptsec") {
        return Err(KeyError::PasswordRequired);
    }
    let secret_key =
        SecretKey::parse(&stored).map_err(|e| KeyError::InvalidKey(e.to_string()))?;
    Ok(Keys::new(secret_key))
}

pub fn has_stored_credentials(prefs: &PreferencesStorage) -> bool {
    prefs.has_stored_credentials()
}

/// Whether the stored credential is encrypted and needs a password to unlock.
pub fn credentials_need_password(prefs: &PreferencesStorage) -> bool {
    prefs.credentials_need_password()
}

/// Decode a bech32 npub into a public key.
pub fn decode_npub(npub: &str) -> Result<PublicKey, KeyError> {
    PublicKey::from_bech32(npub).map_err(|e| KeyError::InvalidKey(e.to_string()))
}
