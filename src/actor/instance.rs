//! One running actor: state, context, mailbox, subscribers, counters.
//!
//! The instance is the passive half of an actor: it owns the data and the
//! lifecycle transitions. The active half — the dispatch loop that drains
//! the mailbox and invokes the behavior — is a tokio task driven by the
//! actor system.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::Notify;
use tracing::debug;

// Layer 3: Internal module imports
use super::dependencies::Dependencies;
use super::lifecycle::{ActorCounters, ActorSnapshot, ActorState};
use crate::behavior::{Behavior, HandlerError, HookParams};
use crate::mailbox::bounded::EnqueueOutcome;
use crate::mailbox::{Mailbox, OverflowPolicy};
use crate::message::{Envelope, EventFilter};
use crate::util::{Address, SharedClock};

/// One entry of an actor's subscriber set.
#[derive(Debug, Clone)]
pub struct EventSubscriber {
    pub subscriber: Address,
    pub filter: EventFilter,
}

/// A delivery the instance refused, with the envelope handed back.
#[derive(Debug)]
pub struct DeliveryRefused {
    pub state: ActorState,
    pub envelope: Envelope,
}

/// A running (or stopped) actor instance.
pub struct ActorInstance {
    address: Address,
    behavior: Behavior,
    mailbox: Arc<Mailbox>,
    state: RwLock<ActorState>,
    context: Mutex<Value>,
    subscribers: Mutex<Vec<EventSubscriber>>,
    counters: ActorCounters,
    started_at: Mutex<Option<DateTime<Utc>>>,
    processing: AtomicBool,
    state_notify: Notify,
    stopped_notify: Notify,
    clock: SharedClock,
}

impl ActorInstance {
    /// Build an idle instance; `start` brings it to life.
    pub fn new(
        address: Address,
        behavior: Behavior,
        mailbox_capacity: usize,
        overflow: OverflowPolicy,
        clock: SharedClock,
    ) -> Self {
        let initial_context = behavior.initial_context();
        Self {
            address,
            behavior,
            mailbox: Arc::new(Mailbox::new(mailbox_capacity, overflow)),
            state: RwLock::new(ActorState::Idle),
            context: Mutex::new(initial_context),
            subscribers: Mutex::new(Vec::new()),
            counters: ActorCounters::new(),
            started_at: Mutex::new(None),
            processing: AtomicBool::new(false),
            state_notify: Notify::new(),
            stopped_notify: Notify::new(),
            clock,
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn behavior(&self) -> &Behavior {
        &self.behavior
    }

    pub(crate) fn mailbox(&self) -> &Arc<Mailbox> {
        &self.mailbox
    }

    pub fn state(&self) -> ActorState {
        *self.state.read()
    }

    /// Force a state, notifying dispatcher and stop waiters.
    ///
    /// Transitions are validated by the callers (the dispatch loop and the
    /// supervisor effects); this only records and signals.
    pub(crate) fn set_state(&self, next: ActorState) {
        *self.state.write() = next;
        self.state_notify.notify_waiters();
        if next == ActorState::Stopped {
            self.stopped_notify.notify_waiters();
        }
    }

    /// Transition Idle → Starting → Running, invoking the start hook once.
    ///
    /// Fails if the instance is not Idle, or if the hook errors (the
    /// instance is left in `Error`).
    pub async fn start(&self, deps: Dependencies) -> Result<(), HandlerError> {
        {
            let mut state = self.state.write();
            if *state != ActorState::Idle {
                return Err(HandlerError::failed(format!(
                    "cannot start actor {} from state {:?}",
                    self.address, *state
                )));
            }
            *state = ActorState::Starting;
        }

        let context = self.context();
        if let Err(err) = self.behavior.run_start(HookParams { context, deps }).await {
            self.set_state(ActorState::Error);
            return Err(err);
        }

        *self.started_at.lock() = Some(self.clock.now());
        self.set_state(ActorState::Running);
        debug!(path = self.address.path(), "actor running");
        Ok(())
    }

    /// Move towards Stopped: close the mailbox and mark Stopping.
    ///
    /// Idempotent from Stopping/Stopped. Returns whether this call initiated
    /// the stop.
    pub fn begin_stop(&self) -> bool {
        {
            let mut state = self.state.write();
            match *state {
                ActorState::Stopping | ActorState::Stopped => return false,
                _ => *state = ActorState::Stopping,
            }
        }
        self.mailbox.close_for_new_sends();
        self.state_notify.notify_waiters();
        debug!(path = self.address.path(), "actor stopping");
        true
    }

    /// Run the stop hook and settle in Stopped.
    ///
    /// Called by the dispatch loop on the way out; hook errors are returned
    /// for logging but never block the transition.
    pub(crate) async fn finalize_stop(&self, deps: Dependencies) -> Result<(), HandlerError> {
        let context = self.context();
        let result = self.behavior.run_stop(HookParams { context, deps }).await;
        self.set_state(ActorState::Stopped);
        debug!(path = self.address.path(), "actor stopped");
        result
    }

    /// Wait until the instance reaches Stopped.
    pub async fn await_stopped(&self) {
        loop {
            let stopped = self.stopped_notify.notified();
            if self.state() == ActorState::Stopped {
                return;
            }
            stopped.await;
        }
    }

    /// Wait for a state change notification. Spurious wakeups are possible;
    /// callers re-check state.
    pub(crate) async fn state_changed(&self) {
        let changed = self.state_notify.notified();
        changed.await;
    }

    /// Park until the state is no longer `from`. Registers interest before
    /// re-checking, so a concurrent transition cannot be missed.
    pub(crate) async fn await_state_change(&self, from: ActorState) {
        loop {
            let changed = self.state_notify.notified();
            if self.state() != from {
                return;
            }
            changed.await;
        }
    }

    /// Enqueue an envelope if the actor is Running.
    ///
    /// Refusals hand the envelope back together with the state that refused
    /// it, so the caller can route it to the dead-letter sink.
    pub async fn deliver(&self, envelope: Envelope) -> Result<EnqueueOutcome, DeliveryRefused> {
        let state = self.state();
        if !state.accepts_messages() {
            return Err(DeliveryRefused { state, envelope });
        }
        let outcome = self.mailbox.enqueue(envelope).await;
        if outcome.verdict.accepted() {
            self.counters.record_received();
        }
        Ok(outcome)
    }

    /// Current context (a clone; contexts are only replaced, never shared).
    pub fn context(&self) -> Value {
        self.context.lock().clone()
    }

    /// Replace the context atomically at a message boundary.
    pub(crate) fn set_context(&self, context: Value) {
        *self.context.lock() = context;
    }

    pub fn counters(&self) -> &ActorCounters {
        &self.counters
    }

    /// Read-only view of state, context, and counters.
    pub fn snapshot(&self) -> ActorSnapshot {
        let uptime = self
            .started_at
            .lock()
            .map(|started| {
                (self.clock.now() - started)
                    .to_std()
                    .unwrap_or(Duration::ZERO)
            })
            .unwrap_or(Duration::ZERO);

        ActorSnapshot {
            state: self.state(),
            context: self.context(),
            received: self.counters.received(),
            processed: self.counters.processed(),
            errors: self.counters.errors(),
            uptime,
        }
    }

    /// Add (or replace) a subscriber with its filter.
    pub fn subscribe(&self, subscriber: Address, filter: EventFilter) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|s| s.subscriber != subscriber);
        subscribers.push(EventSubscriber { subscriber, filter });
    }

    /// Remove a subscriber; returns whether it was present.
    pub fn unsubscribe(&self, subscriber: &Address) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|s| &s.subscriber != subscriber);
        subscribers.len() != before
    }

    /// Subscriber addresses whose filter matches an event type.
    pub fn subscribers_for(&self, event_type: &str) -> Vec<Address> {
        self.subscribers
            .lock()
            .iter()
            .filter(|s| s.filter.matches(event_type))
            .map(|s| s.subscriber.clone())
            .collect()
    }

    /// Whether a handler invocation is currently in flight.
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    pub(crate) fn set_processing(&self, value: bool) {
        self.processing.store(value, Ordering::Release);
    }

    /// Idle means: nothing queued and no handler mid-flight.
    pub fn is_quiescent(&self) -> bool {
        self.mailbox.is_empty() && !self.is_processing()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::behavior::HandlerResult;
    use crate::message::Message;
    use crate::util::{SystemClock, LOCAL_NODE};

    fn instance() -> ActorInstance {
        let behavior = Behavior::with_context(json!({ "n": 0 }), |_| async {
            Ok(HandlerResult::unchanged())
        });
        ActorInstance::new(
            Address::new(LOCAL_NODE, "worker", "w1"),
            behavior,
            8,
            OverflowPolicy::Fail,
            Arc::new(SystemClock),
        )
    }

    #[test]
    fn test_fresh_instance_is_idle_with_initial_context() {
        let instance = instance();
        assert_eq!(instance.state(), ActorState::Idle);
        assert_eq!(instance.context(), json!({ "n": 0 }));
        assert!(instance.is_quiescent());
    }

    #[tokio::test]
    async fn test_deliver_refused_until_running() {
        let instance = instance();
        let envelope = Envelope::new(Message::of("PING"));
        let refused = instance.deliver(envelope).await.unwrap_err();
        assert_eq!(refused.state, ActorState::Idle);
        assert_eq!(refused.envelope.message_kind(), "PING");
    }

    #[tokio::test]
    async fn test_deliver_counts_received_when_running() {
        let instance = instance();
        instance.set_state(ActorState::Running);

        instance
            .deliver(Envelope::new(Message::of("PING")))
            .await
            .unwrap();
        assert_eq!(instance.counters().received(), 1);
        assert_eq!(instance.mailbox().size(), 1);
        assert!(!instance.is_quiescent());
    }

    #[test]
    fn test_begin_stop_is_idempotent() {
        let instance = instance();
        instance.set_state(ActorState::Running);

        assert!(instance.begin_stop());
        assert!(!instance.begin_stop());
        assert_eq!(instance.state(), ActorState::Stopping);
        assert!(instance.mailbox().is_closed());
    }

    #[test]
    fn test_subscriber_set_with_filters() {
        let instance = instance();
        let a = Address::new(LOCAL_NODE, "audit", "a1");
        let b = Address::new(LOCAL_NODE, "audit", "b1");

        instance.subscribe(a.clone(), EventFilter::All);
        instance.subscribe(b.clone(), EventFilter::parse("orderPlaced"));

        let matched = instance.subscribers_for("orderPlaced");
        assert_eq!(matched.len(), 2);

        let matched = instance.subscribers_for("other");
        assert_eq!(matched, vec![a.clone()]);

        assert!(instance.unsubscribe(&b));
        assert!(!instance.unsubscribe(&b));
    }

    #[test]
    fn test_resubscribe_replaces_filter() {
        let instance = instance();
        let a = Address::new(LOCAL_NODE, "audit", "a1");

        instance.subscribe(a.clone(), EventFilter::parse("x"));
        instance.subscribe(a.clone(), EventFilter::parse("y"));

        assert!(instance.subscribers_for("x").is_empty());
        assert_eq!(instance.subscribers_for("y").len(), 1);
    }

    #[test]
    fn test_snapshot_reflects_counters() {
        let instance = instance();
        instance.counters().record_received();
        instance.counters().record_processed();

        let snapshot = instance.snapshot();
        assert_eq!(snapshot.received, 1);
        assert_eq!(snapshot.processed, 1);
        assert_eq!(snapshot.errors, 0);
        assert_eq!(snapshot.context, json!({ "n": 0 }));
    }
}
