//! Application-wide constants
//!
//! Centralized location for magic strings and configuration values
//! that are used across multiple modules.

use std::time::Duration;

/// Relays used when neither configuration nor stored preferences name any.
pub const DEFAULT_RELAYS: [&str; 3] = [
    "wss://relay.damus.io",
    "wss://relay.primal.net",
    "wss://nos.lol",
];

/// Sentinel returned in place of plaintext when NIP-04 decryption fails.
/// Rendered inline by consumers instead of crashing a render pass.
pub const DECRYPT_FAILURE_TEXT: &str = "*failed to decrypt*";

/// Upper bound for one-shot queries; a relay that never signals EOSE
/// cannot stall completion past this.
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// How long publish waits for per-relay OK acknowledgements before
/// reporting stragglers as timed out.
pub const PUBLISH_ACK_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait for newly added relays to come up before querying them.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(4);

/// Deadline after which a live subscription's end-of-stored-events is
/// forced even if some relay never signaled it.
pub const EOSE_TIMEOUT: Duration = Duration::from_secs(15);

/// Default page size for feed and notes queries.
pub const FEED_PAGE_LIMIT: usize = 100;

/// Default page size for direct-message queries (per direction).
pub const DM_PAGE_LIMIT: usize = 50;

// Nostr event kinds used by the core
pub mod kinds {
    /// Profile metadata
    pub const METADATA: u16 = 0;
    /// Text note
    pub const TEXT_NOTE: u16 = 1;
    /// Contact list
    pub const CONTACT_LIST: u16 = 3;
    /// NIP-04 encrypted direct message
    pub const ENCRYPTED_DM: u16 = 4;
    /// Repost
    pub const REPOST: u16 = 6;
    /// Reaction
    pub const REACTION: u16 = 7;
    /// Zap receipt
    pub const ZAP_RECEIPT: u16 = 9735;
    /// Mute list
    pub const MUTE_LIST: u16 = 10000;
}
