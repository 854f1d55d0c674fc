//! Identity and signing.
//!
//! An identity is either backed by local key material or delegated to an
//! external signer capability (NIP-46 remote signer, platform signer, ...).
//! Which path a signing call takes is decided here, in one place, based on
//! whether local key material exists; callers never choose.

pub mod auth;
pub mod nip04;

use std::sync::Arc;

use nostr_sdk::prelude::*;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::SigningError;

/// The two signing capability variants. Closed set: everything the core
/// signs or encrypts goes through one of these.
pub enum ActiveSigner {
    /// Local key material; signs and derives shared secrets directly.
    LocalKey(Keys),
    /// External capability holding the keys on our behalf.
    Delegated(Arc<dyn NostrSigner>),
}

impl Clone for ActiveSigner {
    fn clone(&self) -> Self {
        match self {
            ActiveSigner::LocalKey(keys) => ActiveSigner::LocalKey(keys.clone()),
            ActiveSigner::Delegated(signer) => ActiveSigner::Delegated(signer.clone()),
        }
    }
}

#[derive(Default)]
struct IdentityState {
    pubkey: Option<PublicKey>,
    signer: Option<ActiveSigner>,
}

/// Process-wide identity. All mutation goes through the login/clear
/// operations below; signing snapshots the state so a sign-out racing an
/// in-flight call either completes with the old key or fails cleanly.
#[derive(Default)]
pub struct Identity {
    state: RwLock<IdentityState>,
}

impl Identity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Establish a local-key identity.
    pub fn login_local(&self, keys: Keys) {
        let pubkey = keys.public_key();
        *self.state.write() = IdentityState {
            pubkey: Some(pubkey),
            signer: Some(ActiveSigner::LocalKey(keys)),
        };
        debug!(pubkey = %pubkey, "local identity established");
    }

    /// Establish a delegated identity. The capability is asked for its
    /// public key; a capability that cannot even report one is rejected.
    pub async fn login_delegated(
        &self,
        signer: Arc<dyn NostrSigner>,
    ) -> Result<PublicKey, SigningError> {
        let pubkey = signer
            .get_public_key()
            .await
            .map_err(|e| SigningError::DelegateRejected(e.to_string()))?;
        *self.state.write() = IdentityState {
            pubkey: Some(pubkey),
            signer: Some(ActiveSigner::Delegated(signer)),
        };
        debug!(pubkey = %pubkey, "delegated identity established");
        Ok(pubkey)
    }

    /// Record a delegated identity whose capability is not (yet) attached.
    /// Reads work against the pubkey; signing fails with
    /// [`SigningError::DelegateUnavailable`] until a capability is attached.
    pub fn login_delegated_pubkey_only(&self, pubkey: PublicKey) {
        *self.state.write() = IdentityState {
            pubkey: Some(pubkey),
            signer: None,
        };
    }

    /// Wipe all key material. Subsequent signing fails with
    /// [`SigningError::NoKeyMaterial`] until a new identity is established.
    pub fn clear(&self) {
        *self.state.write() = IdentityState::default();
        debug!("identity cleared");
    }

    pub fn public_key(&self) -> Option<PublicKey> {
        self.state.read().pubkey
    }

    /// Hex public key, or the empty string when signed out.
    pub fn public_key_hex(&self) -> String {
        self.state
            .read()
            .pubkey
            .map(|pk| pk.to_hex())
            .unwrap_or_default()
    }

    pub fn is_local_key_active(&self) -> bool {
        matches!(
            self.state.read().signer,
            Some(ActiveSigner::LocalKey(_))
        )
    }

    pub fn is_logged_in(&self) -> bool {
        self.state.read().pubkey.is_some()
    }

    /// Bech32 `npub` for display, when logged in.
    pub fn npub(&self) -> Option<String> {
        self.state.read().pubkey.and_then(|pk| pk.to_bech32().ok())
    }

    /// Bech32 `nsec` export. Only available for local-key identities.
    pub fn nsec(&self) -> Option<String> {
        match &self.state.read().signer {
            Some(ActiveSigner::LocalKey(keys)) => keys.secret_key().to_bech32().ok(),
            _ => None,
        }
    }

    /// Snapshot of (pubkey, signer) taken under the lock and released
    /// before any await point.
    pub(crate) fn snapshot(&self) -> (Option<PublicKey>, Option<ActiveSigner>) {
        let state = self.state.read();
        (state.pubkey, state.signer.clone())
    }

    /// Sign an unsigned event with whichever capability variant is active.
    pub async fn sign(&self, unsigned: UnsignedEvent) -> Result<Event, SigningError> {
        let (pubkey, signer) = self.snapshot();
        match signer {
            Some(ActiveSigner::LocalKey(keys)) => unsigned
                .sign_with_keys(&keys)
                .map_err(|e| SigningError::Backend(e.to_string())),
            Some(ActiveSigner::Delegated(signer)) => {
                let event = signer
                    .sign_event(unsigned)
                    .await
                    .map_err(|e| SigningError::DelegateRejected(e.to_string()))?;
                // Never trust a delegated result blindly.
                event
                    .verify()
                    .map_err(|e| SigningError::DelegateRejected(e.to_string()))?;
                Ok(event)
            }
            None if pubkey.is_some() => Err(SigningError::DelegateUnavailable),
            None => Err(SigningError::NoKeyMaterial),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::build_unsigned;

    fn unsigned_note(identity: &Identity, content: &str) -> UnsignedEvent {
        let pubkey = identity.public_key().expect("logged in");
        build_unsigned(pubkey, Kind::from(1u16), vec![], content)
    }

    #[tokio::test]
    async fn test_local_sign_verifies() {
        let identity = Identity::new();
        let keys = Keys::generate();
        identity.login_local(keys.clone());

        let event = identity
            .sign(unsigned_note(&identity, "signed locally"))
            .await
            .expect("local signing failed");

        assert_eq!(event.pubkey, keys.public_key());
        assert!(event.verify().is_ok());
        assert!(identity.is_local_key_active());
    }

    #[tokio::test]
    async fn test_delegated_sign_verifies() {
        let identity = Identity::new();
        let keys = Keys::generate();
        // Keys implements NostrSigner, standing in for a remote capability.
        let pubkey = identity
            .login_delegated(Arc::new(keys.clone()))
            .await
            .expect("delegated login failed");
        assert_eq!(pubkey, keys.public_key());
        assert!(!identity.is_local_key_active());

        let event = identity
            .sign(unsigned_note(&identity, "signed remotely"))
            .await
            .expect("delegated signing failed");
        assert!(event.verify().is_ok());
    }

    #[tokio::test]
    async fn test_sign_without_identity_fails_no_key_material() {
        let identity = Identity::new();
        let keys = Keys::generate();
        let unsigned = build_unsigned(keys.public_key(), Kind::from(1u16), vec![], "x");

        match identity.sign(unsigned).await {
            Err(SigningError::NoKeyMaterial) => {}
            other => panic!("expected NoKeyMaterial, got {other:?}"),
        }
        assert_eq!(identity.public_key_hex(), "");
    }

    #[tokio::test]
    async fn test_sign_with_detached_delegate_fails_unavailable() {
        let identity = Identity::new();
        let keys = Keys::generate();
        identity.login_delegated_pubkey_only(keys.public_key());

        let unsigned = build_unsigned(keys.public_key(), Kind::from(1u16), vec![], "x");
        match identity.sign(unsigned).await {
            Err(SigningError::DelegateUnavailable) => {}
            other => panic!("expected DelegateUnavailable, got {other:?}"),
        }
        // The pubkey is still readable.
        assert_eq!(identity.public_key_hex(), keys.public_key().to_hex());
    }

    #[tokio::test]
    async fn test_sign_out_clears_everything() {
        let identity = Identity::new();
        identity.login_local(Keys::generate());
        assert!(identity.is_logged_in());

        let unsigned = {
            let pk = identity.public_key().unwrap();
            build_unsigned(pk, Kind::from(1u16), vec![], "before clear")
        };
        identity.clear();

        assert_eq!(identity.public_key_hex(), "");
        assert!(identity.nsec().is_none());
        match identity.sign(unsigned).await {
            Err(SigningError::NoKeyMaterial) => {}
            other => panic!("expected NoKeyMaterial after sign-out, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_snapshot_taken_before_clear_still_signs() {
        // A signing call that snapshotted its backend before sign-out must
        // complete with the old key, never with torn state.
        let identity = Identity::new();
        let keys = Keys::generate();
        identity.login_local(keys.clone());

        let (_, signer) = identity.snapshot();
        identity.clear();

        let unsigned = build_unsigned(keys.public_key(), Kind::from(1u16), vec![], "old key");
        match signer {
            Some(ActiveSigner::LocalKey(old_keys)) => {
                let event = unsigned.sign_with_keys(&old_keys).unwrap();
                assert_eq!(event.pubkey, keys.public_key());
                assert!(event.verify().is_ok());
            }
            _ => panic!("expected a local snapshot"),
        }
    }
}
