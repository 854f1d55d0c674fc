//! NIP-04 direct-message encryption over the active signer.
//!
//! Local identities derive the ECDH shared secret directly; delegated
//! identities forward to the capability's nip04 operations. Decryption
//! never returns an error: callers render the sentinel inline instead of
//! tearing down a whole message view over one bad payload.

use nostr_sdk::nips::nip04;
use nostr_sdk::prelude::*;
use tracing::warn;

use crate::constants::DECRYPT_FAILURE_TEXT;
use crate::error::SigningError;
use crate::signer::{ActiveSigner, Identity};

/// Encrypt a plaintext for `counterparty`. Wire format is fixed by NIP-04:
/// `base64(aes-256-cbc(plaintext)) + "?iv=" + base64(iv)`.
pub async fn encrypt(
    identity: &Identity,
    counterparty: &PublicKey,
    plaintext: &str,
) -> Result<String, SigningError> {
    let (pubkey, signer) = identity.snapshot();
    match signer {
        Some(ActiveSigner::LocalKey(keys)) => {
            nip04::encrypt(keys.secret_key(), counterparty, plaintext)
                .map_err(|e| SigningError::Backend(e.to_string()))
        }
        Some(ActiveSigner::Delegated(signer)) => signer
            .nip04_encrypt(counterparty, plaintext)
            .await
            .map_err(|e| SigningError::DelegateRejected(e.to_string())),
        None if pubkey.is_some() => Err(SigningError::DelegateUnavailable),
        None => Err(SigningError::NoKeyMaterial),
    }
}

/// Decrypt a NIP-04 payload from `counterparty`. Infallible by contract:
/// any failure yields [`DECRYPT_FAILURE_TEXT`].
pub async fn decrypt(identity: &Identity, counterparty: &PublicKey, ciphertext: &str) -> String {
    let (_, signer) = identity.snapshot();
    let result = match signer {
        Some(ActiveSigner::LocalKey(keys)) => {
            nip04::decrypt(keys.secret_key(), counterparty, ciphertext)
                .map_err(|e| e.to_string())
        }
        Some(ActiveSigner::Delegated(signer)) => signer
            .nip04_decrypt(counterparty, ciphertext)
            .await
            .map_err(|e| e.to_string()),
        None => Err("no identity".to_string()),
    };

    match result {
        Ok(plaintext) => plaintext,
        Err(e) => {
            warn!(counterparty = %counterparty, "nip04 decryption failed: {e}");
            DECRYPT_FAILURE_TEXT.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_local_encrypt_decrypt_round_trip() {
        let alice = Identity::new();
        let alice_keys = Keys::generate();
        alice.login_local(alice_keys.clone());

        let bob = Identity::new();
        let bob_keys = Keys::generate();
        bob.login_local(bob_keys.clone());

        let ciphertext = encrypt(&alice, &bob_keys.public_key(), "meet at dawn")
            .await
            .expect("encryption failed");
        assert!(ciphertext.contains("?iv="), "NIP-04 wire format");

        let plaintext = decrypt(&bob, &alice_keys.public_key(), &ciphertext).await;
        assert_eq!(plaintext, "meet at dawn");
    }

    #[tokio::test]
    async fn test_delegated_encrypt_decrypt_round_trip() {
        let alice = Identity::new();
        let alice_keys = Keys::generate();
        alice
            .login_delegated(Arc::new(alice_keys.clone()))
            .await
            .unwrap();

        let bob_keys = Keys::generate();
        let ciphertext = encrypt(&alice, &bob_keys.public_key(), "delegated secret")
            .await
            .expect("delegated encryption failed");

        let bob = Identity::new();
        bob.login_local(bob_keys);
        let plaintext = decrypt(&bob, &alice_keys.public_key(), &ciphertext).await;
        assert_eq!(plaintext, "delegated secret");
    }

    #[tokio::test]
    async fn test_tampered_ciphertext_returns_sentinel() {
        let alice = Identity::new();
        let alice_keys = Keys::generate();
        alice.login_local(alice_keys.clone());

        let bob = Identity::new();
        let bob_keys = Keys::generate();
        bob.login_local(bob_keys.clone());

        let ciphertext = encrypt(&alice, &bob_keys.public_key(), "original")
            .await
            .unwrap();
        // Corrupt the iv so the payload can no longer be decoded.
        let tampered = ciphertext.replace("?iv=", "?iv=!");

        let result = decrypt(&bob, &alice_keys.public_key(), &tampered).await;
        assert_eq!(result, DECRYPT_FAILURE_TEXT);
    }

    #[tokio::test]
    async fn test_garbage_ciphertext_returns_sentinel() {
        let bob = Identity::new();
        bob.login_local(Keys::generate());
        let counterparty = Keys::generate().public_key();

        assert_eq!(
            decrypt(&bob, &counterparty, "not a nip04 payload").await,
            DECRYPT_FAILURE_TEXT
        );
    }

    #[tokio::test]
    async fn test_decrypt_without_identity_returns_sentinel() {
        let nobody = Identity::new();
        let counterparty = Keys::generate().public_key();
        assert_eq!(
            decrypt(&nobody, &counterparty, "whatever?iv=AAAA").await,
            DECRYPT_FAILURE_TEXT
        );
    }

    #[tokio::test]
    async fn test_encrypt_without_identity_fails() {
        let nobody = Identity::new();
        let counterparty = Keys::generate().public_key();
        match encrypt(&nobody, &counterparty, "secret").await {
            Err(SigningError::NoKeyMaterial) => {}
            other => panic!("expected NoKeyMaterial, got {other:?}"),
        }
    }
}
