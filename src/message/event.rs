// Layer 1: Standard library imports
use std::fmt::{self, Display};

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};
use serde_json::Value;

// Layer 3: Internal module imports
use super::message::Message;

/// A domain event emitted by an actor to its subscribers.
///
/// Events are delivered to each subscriber's mailbox as an ordinary
/// [`Message`] whose kind is the event type, so subscribers handle them with
/// the same handler that processes direct sends.
///
/// # Examples
///
/// ```rust
/// use lattice_rt::message::DomainEvent;
/// use serde_json::json;
///
/// let event = DomainEvent::new("orderPlaced", json!({ "order_id": 42 }));
/// let msg = event.to_message();
/// assert_eq!(msg.kind(), "orderPlaced");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    event_type: String,
    payload: Value,
}

impl DomainEvent {
    /// Create an event with the given type and payload.
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
        }
    }

    /// Create an event with a null payload.
    pub fn of(event_type: impl Into<String>) -> Self {
        Self::new(event_type, Value::Null)
    }

    /// The event type tag.
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// The event payload.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Convert into the message delivered to subscriber mailboxes.
    pub fn to_message(&self) -> Message {
        Message::new(self.event_type.clone(), self.payload.clone())
    }
}

impl Display for DomainEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.event_type)
    }
}

/// Event-type filter used by subscriptions. `*` matches everything;
/// anything else is an exact match on the event type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EventFilter {
    /// Match every event type.
    #[default]
    All,

    /// Match exactly one event type.
    EventType(String),
}

impl EventFilter {
    /// Parse a filter string; `"*"` is the match-all wildcard.
    pub fn parse(pattern: &str) -> Self {
        if pattern == "*" {
            Self::All
        } else {
            Self::EventType(pattern.to_string())
        }
    }

    /// Whether this filter matches an event type.
    pub fn matches(&self, event_type: &str) -> bool {
        match self {
            Self::All => true,
            Self::EventType(exact) => exact == event_type,
        }
    }
}
