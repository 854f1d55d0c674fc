//! Relay pool: connection ownership and the four wire primitives
//! (query, query_all, subscribe, publish).

mod pool;
mod subscription;

pub use pool::{AckOutcome, RelayAck, RelayPool};
pub use subscription::{EoseCallback, EventCallback, Subscription, SubscriptionState};

use std::fmt;

use nostr_sdk::prelude::*;

/// Connection state of one relay in the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closed,
}

/// One relay endpoint with its current connection state.
#[derive(Debug, Clone)]
pub struct RelayDescriptor {
    pub url: RelayUrl,
    pub state: ConnectionState,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Closed => "closed",
        };
        write!(f, "{s}")
    }
}

pub(crate) fn connection_state(status: RelayStatus) -> ConnectionState {
    match status {
        RelayStatus::Connected => ConnectionState::Connected,
        RelayStatus::Initialized | RelayStatus::Pending | RelayStatus::Connecting => {
            ConnectionState::Connecting
        }
        RelayStatus::Disconnected => ConnectionState::Disconnected,
        _ => ConnectionState::Closed,
    }
}
