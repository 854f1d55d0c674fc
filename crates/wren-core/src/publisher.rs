//! Publish coordination: stamp, sign, fan out, collect acknowledgements.
//!
//! Delivery is best-effort by policy: once an event is signed, per-relay
//! failures are logged and reported but do not fail the operation. The
//! protocol is eventually consistent across relays; any one acceptance is
//! enough for the event to propagate.

use std::sync::Arc;

use nostr_sdk::prelude::*;
use tracing::{info, warn};

use crate::constants::kinds;
use crate::error::SigningError;
use crate::events::build_unsigned;
use crate::relay::{RelayAck, RelayPool};
use crate::session::Session;
use crate::signer::nip04;

/// What happened to one publish: the signed event's id and every relay's
/// acknowledgement. Callers that want a delivery quorum can inspect `acks`.
#[derive(Debug, Clone)]
pub struct PublishReport {
    pub event_id: EventId,
    pub acks: Vec<RelayAck>,
}

impl PublishReport {
    /// How many relays accepted the event.
    pub fn accepted(&self) -> usize {
        self.acks.iter().filter(|a| a.outcome.is_success()).count()
    }
}

pub struct PublishCoordinator {
    pool: Arc<RelayPool>,
    session: Arc<Session>,
}

impl PublishCoordinator {
    pub fn new(pool: Arc<RelayPool>, session: Arc<Session>) -> Self {
        Self { pool, session }
    }

    /// Build, sign, and fan out an event to the configured relay set.
    /// Fails only when signing fails; relay outcomes are in the report.
    pub async fn publish(
        &self,
        kind: Kind,
        tags: Vec<Tag>,
        content: &str,
    ) -> Result<PublishReport, SigningError> {
        let identity = self.session.identity();
        let Some(pubkey) = identity.public_key() else {
            return Err(SigningError::NoKeyMaterial);
        };

        let unsigned = build_unsigned(pubkey, kind, tags, content);
        let event = identity.sign(unsigned).await?;
        let event_id = event.id;

        let relays = self.session.relays();
        let acks = self.pool.publish(&relays, &event).await;
        for ack in &acks {
            match &ack.outcome {
                outcome if outcome.is_success() => {}
                outcome => warn!(relay = %ack.relay, ?outcome, "relay did not accept event"),
            }
        }
        info!(
            id = %event_id,
            kind = kind.as_u16(),
            accepted = acks.iter().filter(|a| a.outcome.is_success()).count(),
            total = acks.len(),
            "event published"
        );

        Ok(PublishReport { event_id, acks })
    }

    /// Publish a plain text note.
    pub async fn publish_note(
        &self,
        content: &str,
        tags: Vec<Tag>,
    ) -> Result<PublishReport, SigningError> {
        self.publish(Kind::from(kinds::TEXT_NOTE), tags, content).await
    }

    /// Publish the identity's profile metadata (kind 0).
    pub async fn publish_profile(&self, metadata: &Metadata) -> Result<PublishReport, SigningError> {
        let content = metadata.as_json();
        self.publish(Kind::from(kinds::METADATA), vec![], &content).await
    }

    /// Publish a reaction (kind 7) to a note.
    pub async fn publish_reaction(
        &self,
        note_id: &EventId,
        note_author: &PublicKey,
        content: &str,
    ) -> Result<PublishReport, SigningError> {
        let tags = vec![
            Tag::custom(
                TagKind::SingleLetter(SingleLetterTag::lowercase(Alphabet::E)),
                vec![note_id.to_hex()],
            ),
            Tag::custom(
                TagKind::SingleLetter(SingleLetterTag::lowercase(Alphabet::P)),
                vec![note_author.to_hex()],
            ),
        ];
        self.publish(Kind::from(kinds::REACTION), tags, content).await
    }

    /// Encrypt `plaintext` for `recipient` and publish it as a NIP-04
    /// direct message (kind 4).
    pub async fn publish_direct_message(
        &self,
        recipient: &PublicKey,
        plaintext: &str,
    ) -> Result<PublishReport, SigningError> {
        let ciphertext = nip04::encrypt(self.session.identity(), recipient, plaintext).await?;
        let tags = vec![Tag::custom(
            TagKind::SingleLetter(SingleLetterTag::lowercase(Alphabet::P)),
            vec![recipient.to_hex()],
        )];
        self.publish(Kind::from(kinds::ENCRYPTED_DM), tags, &ciphertext)
            .await
    }
}
