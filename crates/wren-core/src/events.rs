//! Unsigned event construction.
//!
//! Stamps `created_at` with the current time and the author's public key,
//! and precomputes the content-addressed id so signers of either variant
//! receive a fully formed unsigned event.

use nostr_sdk::prelude::*;

/// Build an unsigned event from (kind, tags, content) for the given author.
pub fn build_unsigned(
    pubkey: PublicKey,
    kind: Kind,
    tags: Vec<Tag>,
    content: &str,
) -> UnsignedEvent {
    let mut unsigned = EventBuilder::new(kind, content).tags(tags).build(pubkey);
    unsigned.ensure_id();
    unsigned
}
