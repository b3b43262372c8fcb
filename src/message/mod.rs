//! Messages, domain events, and mailbox envelopes.
//!
//! The runtime routes dynamically typed messages: a [`Message`] is a kind tag
//! plus an opaque JSON body. Handlers decode bodies into their own types with
//! serde; the runtime itself never interprets them.

pub mod envelope;
pub mod event;
pub mod message;

pub use envelope::Envelope;
pub use event::{DomainEvent, EventFilter};
pub use message::{Message, MessageError, REPLY_KIND};
