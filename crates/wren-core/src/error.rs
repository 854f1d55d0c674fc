//! Failure taxonomy shared across the core.
//!
//! Network failures are deliberately absent: per-relay errors are isolated
//! inside the pool and surface as partial results, never as a typed error.

/// Why a signing request could not produce a signed event.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    /// No identity is established, or it was cleared by sign-out.
    #[error("no key material available")]
    NoKeyMaterial,

    /// The identity is delegated but no signer capability is attached.
    #[error("delegated signer unavailable")]
    DelegateUnavailable,

    /// The delegated signer errored, or returned an event that does not verify.
    #[error("delegated signer rejected the request: {0}")]
    DelegateRejected(String),

    /// The local signing backend failed.
    #[error("signing backend failed: {0}")]
    Backend(String),
}

/// Errors from importing or loading key material.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    /// Malformed nsec/hex input. Identity state is left untouched.
    #[error("invalid key encoding: {0}")]
    InvalidKey(String),

    /// No credential is stored in preferences.
    #[error("no stored credentials")]
    NoStoredCredentials,

    /// The stored credential is NIP-49 encrypted and needs a password.
    #[error("stored credentials are encrypted, password required")]
    PasswordRequired,

    /// The stored credential could not be decrypted (wrong password or corrupt).
    #[error("failed to unlock stored credentials: {0}")]
    Unlock(String),
}

impl SigningError {
    /// Whether a retry with the same identity state could ever succeed.
    pub fn is_permanent(&self) -> bool {
        matches!(self, SigningError::NoKeyMaterial | SigningError::DelegateUnavailable)
    }
}
