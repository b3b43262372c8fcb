//! System lifecycle events and their fan-out.
//!
//! Events flow through a dedicated internal event actor owned by the system
//! (created at start, stopped at stop); callback listeners and subscribed
//! actor addresses both hang off the [`EventHub`], which the event actor's
//! behavior drains. When the event actor is unavailable (before start,
//! during the tail of shutdown) events are dispatched to callback listeners
//! directly so `stopping`/`stopped` are never lost.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use crate::message::EventFilter;
use crate::util::Address;

/// One system event: a timestamp plus the typed payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: SystemEventKind,
}

impl SystemEvent {
    pub fn new(timestamp: DateTime<Utc>, kind: SystemEventKind) -> Self {
        Self { timestamp, kind }
    }

    /// The event-type string used by filters.
    pub fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }
}

/// Typed payloads of the system event stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SystemEventKind {
    ActorSpawned {
        path: String,
    },
    ActorStopping {
        path: String,
    },
    ActorStopped {
        path: String,
    },
    ActorRestarted {
        path: String,
        restarts: u32,
    },
    ExceededRestartLimit {
        path: String,
        restarts: u32,
    },
    Stopping,
    Stopped,
    DeadLetter {
        target: String,
        message_kind: String,
        reason: String,
    },
    UnhandledFailure {
        actor_path: String,
        error: String,
        supervisor_path: Vec<String>,
    },
    DirectoryRegistered {
        path: String,
        location: String,
    },
    DirectoryUnregistered {
        path: String,
    },
    Subscribe {
        publisher: String,
        subscriber: String,
    },
    Unsubscribe {
        publisher: String,
        subscriber: String,
    },
    ShutdownTimeout {
        path: String,
    },
}

impl SystemEventKind {
    /// The stable event-type string for this payload.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ActorSpawned { .. } => "actorSpawned",
            Self::ActorStopping { .. } => "actorStopping",
            Self::ActorStopped { .. } => "actorStopped",
            Self::ActorRestarted { .. } => "actorRestarted",
            Self::ExceededRestartLimit { .. } => "exceededRestartLimit",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::DeadLetter { .. } => "deadLetter",
            Self::UnhandledFailure { .. } => "unhandledFailure",
            Self::DirectoryRegistered { .. } => "directoryRegistered",
            Self::DirectoryUnregistered { .. } => "directoryUnregistered",
            Self::Subscribe { .. } => "subscribe",
            Self::Unsubscribe { .. } => "unsubscribe",
            Self::ShutdownTimeout { .. } => "shutdownTimeout",
        }
    }
}

/// Callback listener for system events.
pub type SystemEventListener = Box<dyn Fn(&SystemEvent) + Send + Sync>;

type ListenerMap = Mutex<HashMap<u64, (EventFilter, SystemEventListener)>>;

/// Handle returned by event subscription; call [`unsubscribe`] to stop.
///
/// [`unsubscribe`]: EventSubscription::unsubscribe
pub struct EventSubscription {
    id: u64,
    listeners: Weak<ListenerMap>,
}

impl EventSubscription {
    pub fn unsubscribe(self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.lock().remove(&self.id);
        }
    }
}

/// Registry of event listeners and subscribed actor addresses.
pub struct EventHub {
    listeners: Arc<ListenerMap>,
    actor_subscribers: Mutex<HashMap<String, (Address, EventFilter)>>,
    seq: AtomicU64,
    event_actor: RwLock<Option<Address>>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHub {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(Mutex::new(HashMap::new())),
            actor_subscribers: Mutex::new(HashMap::new()),
            seq: AtomicU64::new(0),
            event_actor: RwLock::new(None),
        }
    }

    /// Register a callback listener with a filter.
    pub fn subscribe(&self, filter: EventFilter, listener: SystemEventListener) -> EventSubscription {
        let id = self.seq.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().insert(id, (filter, listener));
        EventSubscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Register an actor address to receive matching events as messages.
    pub fn subscribe_address(&self, address: Address, filter: EventFilter) {
        self.actor_subscribers
            .lock()
            .insert(address.path().to_string(), (address, filter));
    }

    /// Remove an address subscription; returns whether it existed.
    pub fn unsubscribe_address(&self, address: &Address) -> bool {
        self.actor_subscribers.lock().remove(address.path()).is_some()
    }

    /// Subscribed addresses whose filter matches the event type.
    pub fn addresses_for(&self, event_type: &str) -> Vec<Address> {
        self.actor_subscribers
            .lock()
            .values()
            .filter(|(_, filter)| filter.matches(event_type))
            .map(|(address, _)| address.clone())
            .collect()
    }

    /// Invoke every matching callback listener.
    pub fn dispatch(&self, event: &SystemEvent) {
        let listeners = self.listeners.lock();
        for (filter, listener) in listeners.values() {
            if filter.matches(event.event_type()) {
                listener(event);
            }
        }
    }

    /// Record which actor fans out events.
    pub fn set_event_actor(&self, address: Option<Address>) {
        *self.event_actor.write() = address;
    }

    /// The event actor's address, while one is running.
    pub fn event_actor(&self) -> Option<Address> {
        self.event_actor.read().clone()
    }

    /// Drop all listeners and address subscriptions.
    pub fn clear(&self) {
        self.listeners.lock().clear();
        self.actor_subscribers.lock().clear();
        self.set_event_actor(None);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::util::LOCAL_NODE;

    fn event(kind: SystemEventKind) -> SystemEvent {
        SystemEvent::new(Utc::now(), kind)
    }

    #[test]
    fn test_event_type_strings_are_reserved_names() {
        assert_eq!(
            SystemEventKind::ActorSpawned { path: "p".into() }.event_type(),
            "actorSpawned"
        );
        assert_eq!(SystemEventKind::Stopping.event_type(), "stopping");
        assert_eq!(SystemEventKind::Stopped.event_type(), "stopped");
        assert_eq!(
            SystemEventKind::DeadLetter {
                target: "t".into(),
                message_kind: "m".into(),
                reason: "r".into()
            }
            .event_type(),
            "deadLetter"
        );
        assert_eq!(
            SystemEventKind::UnhandledFailure {
                actor_path: "p".into(),
                error: "e".into(),
                supervisor_path: vec![]
            }
            .event_type(),
            "unhandledFailure"
        );
    }

    #[test]
    fn test_serialized_tag_matches_event_type() {
        let event = event(SystemEventKind::ActorSpawned { path: "p".into() });
        let json = serde_json::to_value(&event).unwrap_or_default();
        assert_eq!(json["type"], "actorSpawned");
        assert_eq!(json["path"], "p");
    }

    #[test]
    fn test_dispatch_respects_filters() {
        let hub = EventHub::new();
        let all = Arc::new(AtomicUsize::new(0));
        let filtered = Arc::new(AtomicUsize::new(0));

        let all_count = Arc::clone(&all);
        let _sub_all = hub.subscribe(
            EventFilter::All,
            Box::new(move |_| {
                all_count.fetch_add(1, Ordering::Relaxed);
            }),
        );
        let filtered_count = Arc::clone(&filtered);
        let _sub_filtered = hub.subscribe(
            EventFilter::parse("stopped"),
            Box::new(move |_| {
                filtered_count.fetch_add(1, Ordering::Relaxed);
            }),
        );

        hub.dispatch(&event(SystemEventKind::Stopping));
        hub.dispatch(&event(SystemEventKind::Stopped));

        assert_eq!(all.load(Ordering::Relaxed), 2);
        assert_eq!(filtered.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_unsubscribe_removes_listener() {
        let hub = EventHub::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let seen_count = Arc::clone(&seen);
        let sub = hub.subscribe(
            EventFilter::All,
            Box::new(move |_| {
                seen_count.fetch_add(1, Ordering::Relaxed);
            }),
        );
        hub.dispatch(&event(SystemEventKind::Stopping));
        sub.unsubscribe();
        hub.dispatch(&event(SystemEventKind::Stopped));

        assert_eq!(seen.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_address_subscriptions_filter() {
        let hub = EventHub::new();
        let a = Address::new(LOCAL_NODE, "audit", "a1");
        let b = Address::new(LOCAL_NODE, "audit", "b1");

        hub.subscribe_address(a.clone(), EventFilter::All);
        hub.subscribe_address(b.clone(), EventFilter::parse("deadLetter"));

        assert_eq!(hub.addresses_for("actorSpawned"), vec![a.clone()]);
        assert_eq!(hub.addresses_for("deadLetter").len(), 2);

        assert!(hub.unsubscribe_address(&b));
        assert!(!hub.unsubscribe_address(&b));
    }
}
