// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use super::message::Message;
use crate::util::{Address, CorrelationId};

/// A message queued in a mailbox, together with its routing metadata.
///
/// # Example
///
/// ```rust
/// use lattice_rt::message::{Envelope, Message};
/// use lattice_rt::util::{Address, LOCAL_NODE};
/// use serde_json::json;
///
/// let sender = Address::new(LOCAL_NODE, "client", "c1");
/// let envelope = Envelope::new(Message::new("PING", json!(null)))
///     .with_sender(sender.clone());
///
/// assert_eq!(envelope.sender.as_ref(), Some(&sender));
/// assert!(envelope.correlation_id.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// The message payload.
    pub message: Message,

    /// Correlation token when this send belongs to an ask exchange.
    pub correlation_id: Option<CorrelationId>,

    /// Address of the sending actor, when known.
    pub sender: Option<Address>,

    /// When the envelope was created for enqueueing.
    pub enqueued_at: DateTime<Utc>,
}

impl Envelope {
    /// Create an envelope with no sender and no correlation.
    pub fn new(message: Message) -> Self {
        Self {
            message,
            correlation_id: None,
            sender: None,
            enqueued_at: Utc::now(),
        }
    }

    /// Builder method: record the sending actor.
    pub fn with_sender(mut self, sender: Address) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Builder method: bind the envelope to an ask exchange.
    pub fn with_correlation_id(mut self, id: CorrelationId) -> Self {
        self.correlation_id = Some(id);
        self
    }

    /// Builder method: stamp the envelope with an explicit enqueue time.
    pub fn with_enqueued_at(mut self, at: DateTime<Utc>) -> Self {
        self.enqueued_at = at;
        self
    }

    /// The kind of the carried message.
    pub fn message_kind(&self) -> &str {
        self.message.kind()
    }
}
