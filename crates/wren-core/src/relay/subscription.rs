//! Live subscription bookkeeping: per-id dedupe, EOSE aggregation across
//! every (relay, filter) leg, and the Open → EndOfStoredEvents → Closed
//! lifecycle. A closed subscription is never reopened.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use nostr_sdk::prelude::*;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

pub type EventCallback = Box<dyn Fn(Event) + Send + Sync>;
pub type EoseCallback = Box<dyn Fn() + Send + Sync>;

/// Registry shared between the pool's dispatcher task and subscription
/// handles. Removal from here is what discards late relay responses.
pub(crate) type SubscriptionRegistry =
    Arc<RwLock<HashMap<SubscriptionId, Arc<SubscriptionShared>>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Open,
    EndOfStoredEvents,
    Closed,
}

pub(crate) struct SubscriptionShared {
    on_event: EventCallback,
    on_eose: EoseCallback,
    seen: Mutex<HashSet<EventId>>,
    /// Outstanding (subscription leg, relay) pairs that have not yet
    /// signaled end-of-stored-events.
    pending_eose: Mutex<HashSet<(SubscriptionId, RelayUrl)>>,
    state: Mutex<SubscriptionState>,
}

impl SubscriptionShared {
    pub(crate) fn new(on_event: EventCallback, on_eose: EoseCallback) -> Self {
        Self {
            on_event,
            on_eose,
            seen: Mutex::new(HashSet::new()),
            pending_eose: Mutex::new(HashSet::new()),
            state: Mutex::new(SubscriptionState::Open),
        }
    }

    pub(crate) fn state(&self) -> SubscriptionState {
        *self.state.lock()
    }

    pub(crate) fn add_pending_legs(&self, id: &SubscriptionId, relays: &[RelayUrl]) {
        let mut pending = self.pending_eose.lock();
        for relay in relays {
            pending.insert((id.clone(), relay.clone()));
        }
    }

    /// Drop all legs for a subscription id that failed to open, so the
    /// remaining relays can still complete EOSE.
    pub(crate) fn clear_legs_for(&self, id: &SubscriptionId) {
        self.pending_eose.lock().retain(|(leg, _)| leg != id);
        self.check_eose_complete();
    }

    /// Deliver one event: validate, dedupe, forward. Invalid events are
    /// discarded here, before any application logic sees them. The first
    /// seen copy wins; later duplicates are dropped without re-validation.
    pub(crate) fn deliver(&self, event: Event) {
        if self.state() == SubscriptionState::Closed {
            return;
        }
        if let Err(e) = event.verify() {
            warn!(id = %event.id, "discarding event that fails verification: {e}");
            return;
        }
        if !self.seen.lock().insert(event.id) {
            return;
        }
        (self.on_event)(event);
    }

    /// One (leg, relay) pair finished backlog replay.
    pub(crate) fn relay_finished(&self, id: &SubscriptionId, relay: &RelayUrl) {
        self.pending_eose
            .lock()
            .remove(&(id.clone(), relay.clone()));
        self.check_eose_complete();
    }

    /// Force EOSE after a deadline: relays that never answered stop
    /// blocking completion.
    pub(crate) fn force_eose(&self) {
        let remaining = {
            let mut pending = self.pending_eose.lock();
            let n = pending.len();
            pending.clear();
            n
        };
        if remaining > 0 {
            debug!(remaining, "forcing end-of-stored-events past silent relays");
        }
        self.check_eose_complete();
    }

    fn check_eose_complete(&self) {
        if !self.pending_eose.lock().is_empty() {
            return;
        }
        {
            let mut state = self.state.lock();
            if *state != SubscriptionState::Open {
                return;
            }
            *state = SubscriptionState::EndOfStoredEvents;
        }
        (self.on_eose)();
    }

    pub(crate) fn close(&self) {
        *self.state.lock() = SubscriptionState::Closed;
    }
}

/// Handle to a live subscription. Closing it stops callback delivery even
/// for responses already in flight; a closed subscription must be
/// recreated, not reused.
pub struct Subscription {
    client: Client,
    registry: SubscriptionRegistry,
    ids: Vec<SubscriptionId>,
    shared: Arc<SubscriptionShared>,
}

impl Subscription {
    pub(crate) fn new(
        client: Client,
        registry: SubscriptionRegistry,
        ids: Vec<SubscriptionId>,
        shared: Arc<SubscriptionShared>,
    ) -> Self {
        Self {
            client,
            registry,
            ids,
            shared,
        }
    }

    pub fn state(&self) -> SubscriptionState {
        self.shared.state()
    }

    /// Stop the subscription on every relay and discard late responses.
    pub async fn close(&self) {
        self.shared.close();
        {
            let mut registry = self.registry.write();
            for id in &self.ids {
                registry.remove(id);
            }
        }
        for id in &self.ids {
            self.client.unsubscribe(id).await;
        }
        debug!(legs = self.ids.len(), "subscription closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn relay(url: &str) -> RelayUrl {
        RelayUrl::parse(url).unwrap()
    }

    fn signed_note(content: &str) -> Event {
        EventBuilder::text_note(content)
            .sign_with_keys(&Keys::generate())
            .unwrap()
    }

    fn counting_shared() -> (Arc<SubscriptionShared>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let events = Arc::new(AtomicUsize::new(0));
        let eoses = Arc::new(AtomicUsize::new(0));
        let events_cb = events.clone();
        let eoses_cb = eoses.clone();
        let shared = Arc::new(SubscriptionShared::new(
            Box::new(move |_| {
                events_cb.fetch_add(1, Ordering::SeqCst);
            }),
            Box::new(move || {
                eoses_cb.fetch_add(1, Ordering::SeqCst);
            }),
        ));
        (shared, events, eoses)
    }

    #[test]
    fn test_duplicate_events_delivered_once() {
        let (shared, events, _) = counting_shared();
        let event = signed_note("same event twice");

        shared.deliver(event.clone());
        shared.deliver(event);
        assert_eq!(events.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invalid_events_discarded() {
        let (shared, events, _) = counting_shared();
        let mut event = signed_note("will be tampered");
        event.content = "tampered".to_string();

        shared.deliver(event);
        assert_eq!(events.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_eose_fires_once_after_all_legs() {
        let (shared, _, eoses) = counting_shared();
        let id = SubscriptionId::new("legs");
        let relays = [relay("wss://a.example.com"), relay("wss://b.example.com")];
        shared.add_pending_legs(&id, &relays);

        shared.relay_finished(&id, &relays[0]);
        assert_eq!(eoses.load(Ordering::SeqCst), 0);
        assert_eq!(shared.state(), SubscriptionState::Open);

        shared.relay_finished(&id, &relays[1]);
        assert_eq!(eoses.load(Ordering::SeqCst), 1);
        assert_eq!(shared.state(), SubscriptionState::EndOfStoredEvents);

        // A straggler EOSE after completion must not re-fire.
        shared.relay_finished(&id, &relays[0]);
        assert_eq!(eoses.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_events_still_flow_after_eose() {
        let (shared, events, _) = counting_shared();
        let id = SubscriptionId::new("live");
        let relays = [relay("wss://a.example.com")];
        shared.add_pending_legs(&id, &relays);
        shared.relay_finished(&id, &relays[0]);

        shared.deliver(signed_note("live event"));
        assert_eq!(events.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_closed_subscription_discards_events() {
        let (shared, events, eoses) = counting_shared();
        let id = SubscriptionId::new("closing");
        shared.add_pending_legs(&id, &[relay("wss://a.example.com")]);

        shared.close();
        shared.deliver(signed_note("late arrival"));
        shared.relay_finished(&id, &relay("wss://a.example.com"));

        assert_eq!(events.load(Ordering::SeqCst), 0);
        // No EOSE transition out of Closed either.
        assert_eq!(eoses.load(Ordering::SeqCst), 0);
        assert_eq!(shared.state(), SubscriptionState::Closed);
    }

    #[test]
    fn test_force_eose_unblocks_silent_relay() {
        let (shared, _, eoses) = counting_shared();
        let id = SubscriptionId::new("stuck");
        let relays = [relay("wss://a.example.com"), relay("wss://dead.example.com")];
        shared.add_pending_legs(&id, &relays);

        shared.relay_finished(&id, &relays[0]);
        assert_eq!(eoses.load(Ordering::SeqCst), 0);

        shared.force_eose();
        assert_eq!(eoses.load(Ordering::SeqCst), 1);
        assert_eq!(shared.state(), SubscriptionState::EndOfStoredEvents);
    }

    #[test]
    fn test_failed_leg_cleared_lets_rest_complete() {
        let (shared, _, eoses) = counting_shared();
        let ok_leg = SubscriptionId::new("ok-leg");
        let bad_leg = SubscriptionId::new("bad-leg");
        let relays = [relay("wss://a.example.com")];
        shared.add_pending_legs(&ok_leg, &relays);
        shared.add_pending_legs(&bad_leg, &relays);

        shared.clear_legs_for(&bad_leg);
        assert_eq!(eoses.load(Ordering::SeqCst), 0);

        shared.relay_finished(&ok_leg, &relays[0]);
        assert_eq!(eoses.load(Ordering::SeqCst), 1);
    }
}
