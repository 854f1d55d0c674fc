//! Zap receipts (kind 9735), the Lightning payment notifications.

use nostr_sdk::prelude::*;

use crate::constants::kinds;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZapReceipt {
    pub id: EventId,
    /// The zapper service that issued the receipt, not the payer.
    pub author: PublicKey,
    pub created_at: Timestamp,
    /// Zapped user (`p` tag).
    pub recipient: Option<PublicKey>,
    /// Zapped note (`e` tag), absent for profile zaps.
    pub target_event: Option<EventId>,
    /// Millisat amount from the embedded zap request, when present.
    pub amount_msats: Option<u64>,
}

impl ZapReceipt {
    /// Parse a kind-9735 event. Returns `None` for other kinds.
    pub fn from_event(event: &Event) -> Option<ZapReceipt> {
        if event.kind != Kind::from(kinds::ZAP_RECEIPT) {
            return None;
        }

        let mut recipient = None;
        let mut target_event = None;
        let mut amount_msats = None;

        for tag in event.tags.iter() {
            let fields = tag.as_slice();
            match fields.first().map(|s| s.as_str()) {
                Some("p") => {
                    if recipient.is_none() {
                        recipient = fields.get(1).and_then(|v| PublicKey::from_hex(v).ok());
                    }
                }
                Some("e") => {
                    if target_event.is_none() {
                        target_event = fields.get(1).and_then(|v| EventId::from_hex(v).ok());
                    }
                }
                Some("description") => {
                    // The description tag carries the original zap request;
                    // its amount tag is the authoritative msat value.
                    if let Some(request_json) = fields.get(1) {
                        amount_msats = amount_from_request(request_json);
                    }
                }
                _ => {}
            }
        }

        Some(ZapReceipt {
            id: event.id,
            author: event.pubkey,
            created_at: event.created_at,
            recipient,
            target_event,
            amount_msats,
        })
    }
}

fn amount_from_request(request_json: &str) -> Option<u64> {
    let request: serde_json::Value = serde_json::from_str(request_json).ok()?;
    request
        .get("tags")?
        .as_array()?
        .iter()
        .filter_map(|tag| tag.as_array())
        .find(|tag| tag.first().and_then(|v| v.as_str()) == Some("amount"))
        .and_then(|tag| tag.get(1)?.as_str()?.parse().ok())
}
