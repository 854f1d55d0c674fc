//! Relay pool over the SDK client: connection management, a notification
//! dispatcher feeding subscriptions, and the query/publish primitives.
//!
//! Failure policy: a relay that is unreachable or misbehaving never aborts
//! a multi-relay operation; the remaining relays' results flow through.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use nostr_sdk::prelude::*;
use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::constants::{CONNECT_TIMEOUT, EOSE_TIMEOUT, PUBLISH_ACK_TIMEOUT, QUERY_TIMEOUT};
use crate::relay::subscription::{
    EoseCallback, EventCallback, Subscription, SubscriptionRegistry, SubscriptionShared,
};
use crate::relay::{connection_state, RelayDescriptor};

/// Outcome of publishing one event to one relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckOutcome {
    /// Relay sent `OK <id> true`.
    Accepted,
    /// Relay sent `OK <id> false` with its reason.
    Rejected(String),
    /// No acknowledgement before the deadline. Not retried.
    Timeout,
    /// Could not talk to the relay at all.
    Unreachable(String),
}

impl AckOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AckOutcome::Accepted)
    }
}

#[derive(Debug, Clone)]
pub struct RelayAck {
    pub relay: RelayUrl,
    pub outcome: AckOutcome,
}

/// Owns the relay connections and the notification dispatcher task.
///
/// Must be constructed inside a Tokio runtime; the dispatcher is spawned
/// at construction and runs until [`RelayPool::shutdown`].
pub struct RelayPool {
    client: Client,
    registry: SubscriptionRegistry,
    cancel_tx: watch::Sender<bool>,
    sub_counter: AtomicU64,
}

impl RelayPool {
    pub fn new() -> Self {
        let client = Client::default();
        let registry: SubscriptionRegistry = Arc::new(RwLock::new(HashMap::new()));
        let (cancel_tx, cancel_rx) = watch::channel(false);

        tokio::spawn(dispatch_notifications(
            client.clone(),
            registry.clone(),
            cancel_rx,
        ));

        Self {
            client,
            registry,
            cancel_tx,
            sub_counter: AtomicU64::new(0),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Current connection state of every relay the pool knows about.
    pub async fn relay_states(&self) -> Vec<RelayDescriptor> {
        self.client
            .relays()
            .await
            .into_iter()
            .map(|(url, relay)| RelayDescriptor {
                url,
                state: connection_state(relay.status()),
            })
            .collect()
    }

    /// Make sure the given relays are in the pool and give them a bounded
    /// window to come up. A relay that stays down is simply not answering.
    async fn ensure_relays(&self, relays: &[RelayUrl]) {
        let mut added_any = false;
        for url in relays {
            match self.client.add_relay(url.clone()).await {
                Ok(true) => {
                    debug!(relay = %url, "added relay to pool");
                    added_any = true;
                }
                Ok(false) => {}
                Err(e) => warn!(relay = %url, "failed to add relay: {e}"),
            }
        }
        if added_any {
            self.client.connect().await;
            self.client.wait_for_connection(CONNECT_TIMEOUT).await;
        }
    }

    /// Most recent event matching `filter` across the given relays, or
    /// `None`. Used for latest-metadata lookups (profile, contact list,
    /// mute list).
    pub async fn query(&self, relays: &[RelayUrl], filter: Filter) -> Result<Option<Event>> {
        self.ensure_relays(relays).await;
        let events = self
            .client
            .fetch_events_from(relays.to_vec(), filter, QUERY_TIMEOUT)
            .await?;
        Ok(events
            .into_iter()
            .filter(|event| event.verify().is_ok())
            .max_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| b.id.cmp(&a.id))
            }))
    }

    /// Every event matching any of `filters` until end-of-stored-events,
    /// deduplicated by id (first seen wins) and validated. Filters run
    /// concurrently; a failing fetch degrades to partial results.
    pub async fn query_all(&self, relays: &[RelayUrl], filters: Vec<Filter>) -> Result<Vec<Event>> {
        self.ensure_relays(relays).await;

        let fetches = filters.into_iter().map(|filter| {
            self.client
                .fetch_events_from(relays.to_vec(), filter, QUERY_TIMEOUT)
        });
        let batches = futures::future::join_all(fetches).await;

        let mut seen = std::collections::HashSet::new();
        let mut merged = Vec::new();
        for batch in batches {
            match batch {
                Ok(events) => {
                    for event in events.into_iter() {
                        if event.verify().is_err() {
                            warn!(id = %event.id, "discarding event that fails verification");
                            continue;
                        }
                        if seen.insert(event.id) {
                            merged.push(event);
                        }
                    }
                }
                Err(e) => warn!("relay fetch failed, continuing with partial results: {e}"),
            }
        }
        Ok(merged)
    }

    /// Open a long-lived stream. `on_event` fires per new matching event
    /// (backlog and live), `on_eose` fires once after every relay has
    /// finished backlog replay or the EOSE deadline passed.
    pub async fn subscribe(
        &self,
        relays: &[RelayUrl],
        filters: Vec<Filter>,
        on_event: EventCallback,
        on_eose: EoseCallback,
    ) -> Result<Subscription> {
        self.ensure_relays(relays).await;

        let shared = Arc::new(SubscriptionShared::new(on_event, on_eose));

        // Register every leg before asking the relays for anything, so no
        // EOSE can race ahead of the bookkeeping.
        let mut legs = Vec::with_capacity(filters.len());
        for filter in filters {
            let id = self.next_subscription_id();
            shared.add_pending_legs(&id, relays);
            self.registry.write().insert(id.clone(), shared.clone());
            legs.push((id, filter));
        }

        let mut ids = Vec::with_capacity(legs.len());
        for (id, filter) in legs {
            match self
                .client
                .subscribe_with_id_to(relays.to_vec(), id.clone(), filter, None)
                .await
            {
                Ok(_) => ids.push(id),
                Err(e) => {
                    warn!(leg = %id, "subscription leg failed to open: {e}");
                    self.registry.write().remove(&id);
                    shared.clear_legs_for(&id);
                }
            }
        }

        // Bound EOSE: a relay that never answers cannot hold the
        // subscription in limbo forever.
        let deadline_shared = shared.clone();
        tokio::spawn(async move {
            tokio::time::sleep(EOSE_TIMEOUT).await;
            deadline_shared.force_eose();
        });

        Ok(Subscription::new(
            self.client.clone(),
            self.registry.clone(),
            ids,
            shared,
        ))
    }

    /// Send `event` to every relay concurrently and collect one outcome per
    /// relay. Resolves once every relay acknowledged or the deadline passed;
    /// stragglers are reported as timed out, not retried.
    pub async fn publish(&self, relays: &[RelayUrl], event: &Event) -> Vec<RelayAck> {
        self.ensure_relays(relays).await;

        let sends = relays.iter().map(|url| {
            let client = self.client.clone();
            let event = event.clone();
            let url = url.clone();
            async move {
                let outcome = match tokio::time::timeout(
                    PUBLISH_ACK_TIMEOUT,
                    client.send_event_to([url.clone()], &event),
                )
                .await
                {
                    Err(_) => AckOutcome::Timeout,
                    Ok(Err(e)) => AckOutcome::Unreachable(e.to_string()),
                    Ok(Ok(output)) => {
                        if output.success.contains(&url) {
                            AckOutcome::Accepted
                        } else {
                            let reason = output
                                .failed
                                .values()
                                .next()
                                .cloned()
                                .unwrap_or_else(|| "not acknowledged".to_string());
                            AckOutcome::Rejected(reason)
                        }
                    }
                };
                RelayAck { relay: url, outcome }
            }
        });

        futures::future::join_all(sends).await
    }

    fn next_subscription_id(&self) -> SubscriptionId {
        let n = self.sub_counter.fetch_add(1, Ordering::Relaxed);
        SubscriptionId::new(format!("wren-{n}"))
    }

    /// Stop the dispatcher and drop every relay connection.
    pub async fn shutdown(&self) {
        let _ = self.cancel_tx.send(true);
        self.client.disconnect().await;
    }
}

impl Default for RelayPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Routes relay-pool notifications to registered subscriptions. Lookups go
/// through the registry; anything already removed is silently discarded,
/// which is what makes closing a subscription cut off late responses.
async fn dispatch_notifications(
    client: Client,
    registry: SubscriptionRegistry,
    mut cancel_rx: watch::Receiver<bool>,
) {
    let mut notifications = client.notifications();
    debug!("relay notification dispatcher started");

    loop {
        tokio::select! {
            changed = cancel_rx.changed() => {
                // A dropped sender means the pool is gone; stop either way.
                if changed.is_err() || *cancel_rx.borrow() {
                    break;
                }
            }
            result = notifications.recv() => {
                match result {
                    Ok(RelayPoolNotification::Event { subscription_id, event, .. }) => {
                        let entry = registry.read().get(&subscription_id).cloned();
                        if let Some(shared) = entry {
                            shared.deliver(*event);
                        }
                    }
                    Ok(RelayPoolNotification::Message { relay_url, message }) => {
                        match message {
                            RelayMessage::EndOfStoredEvents(subscription_id) => {
                                let entry = registry.read().get(subscription_id.as_ref()).cloned();
                                if let Some(shared) = entry {
                                    shared.relay_finished(subscription_id.as_ref(), &relay_url);
                                }
                            }
                            RelayMessage::Ok { event_id, status, message } => {
                                debug!(
                                    relay = %relay_url,
                                    id = %event_id,
                                    status,
                                    "relay ack: {message}"
                                );
                            }
                            _ => {}
                        }
                    }
                    Ok(RelayPoolNotification::Shutdown) => break,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "notification dispatcher lagged, events dropped");
                    }
                    Err(_) => break,
                }
            }
        }
    }
    debug!("relay notification dispatcher stopped");
}
