//! Actor instances: lifecycle state, counters, mailbox attachment, and the
//! capabilities injected into handlers.

pub mod dependencies;
pub mod instance;
pub mod lifecycle;

pub use dependencies::Dependencies;
pub use instance::{ActorInstance, DeliveryRefused, EventSubscriber};
pub use lifecycle::{ActorCounters, ActorSnapshot, ActorState};
