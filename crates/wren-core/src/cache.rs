//! Opaque bulk-insert persistence capability.
//!
//! The aggregator hands fetched profiles and notifications to a [`CacheSink`]
//! fire-and-forget; the core never reads them back. Embedders plug in their
//! own store, tests and headless use get the no-op.

use crate::models::{Profile, ZapReceipt};

pub trait CacheSink: Send + Sync {
    fn store_profiles(&self, _profiles: &[Profile]) {}
    fn store_notifications(&self, _notifications: &[ZapReceipt]) {}
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

impl CacheSink for NoopCache {}
