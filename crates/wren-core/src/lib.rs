//! wren-core: a Nostr client core.
//!
//! Identity and signing (local keys or a delegated signer capability),
//! NIP-04 direct-message encryption, relay-pool query/publish
//! orchestration, contact/mute list management, and query aggregation
//! into domain objects. Front ends plug in on top; this crate owns the
//! protocol state machine.

pub mod aggregator;
pub mod cache;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod lists;
pub mod models;
pub mod publisher;
pub mod relay;
pub mod session;
pub mod signer;

use std::sync::Arc;

use anyhow::Result;

use crate::aggregator::QueryAggregator;
use crate::cache::{CacheSink, NoopCache};
use crate::config::CoreConfig;
use crate::lists::ListManager;
use crate::publisher::PublishCoordinator;
use crate::relay::RelayPool;
use crate::session::Session;

// Re-exports for embedders
pub use crate::error::{KeyError, SigningError};
pub use crate::lists::{ContactEntry, ContactList, MuteList};
pub use crate::models::{Note, Profile, ZapReceipt};
pub use crate::publisher::PublishReport;
pub use crate::relay::{AckOutcome, RelayAck, Subscription, SubscriptionState};
pub use crate::signer::Identity;

/// The wired-up client core. Construct inside a Tokio runtime: the relay
/// pool spawns its notification dispatcher at construction.
pub struct Core {
    pub session: Arc<Session>,
    pub pool: Arc<RelayPool>,
    pub publisher: Arc<PublishCoordinator>,
    pub aggregator: QueryAggregator,
    pub lists: ListManager,
}

impl Core {
    pub fn new(config: CoreConfig) -> Result<Self> {
        Self::with_cache(config, Arc::new(NoopCache))
    }

    pub fn with_cache(config: CoreConfig, cache: Arc<dyn CacheSink>) -> Result<Self> {
        let session = Session::init(&config)?;
        let pool = Arc::new(RelayPool::new());
        let publisher = Arc::new(PublishCoordinator::new(pool.clone(), session.clone()));
        let aggregator = QueryAggregator::new(pool.clone(), session.clone(), cache);
        let lists = ListManager::new(pool.clone(), session.clone(), publisher.clone());

        Ok(Self {
            session,
            pool,
            publisher,
            aggregator,
            lists,
        })
    }

    /// Disconnect relays and stop background tasks. The session store
    /// itself stays usable for a later reconnect.
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_core_wires_up_and_shuts_down() {
        let dir = tempdir().unwrap();
        let core = Core::new(CoreConfig::new(dir.path())).unwrap();

        assert!(!core.session.relays().is_empty());
        assert_eq!(core.session.identity().public_key_hex(), "");

        core.shutdown().await;
    }
}
