//! The actor system: root coordinator for spawning, routing, supervision,
//! events, and shutdown.

pub mod actor_system;
pub mod config;
pub mod dead_letter;
pub mod errors;
pub mod events;
pub mod handle;
pub mod options;

pub use actor_system::{ActorSystem, SupervisorSpec, SystemState};
pub use config::{DirectoryConfig, SupervisionConfig, SystemConfig, SystemConfigBuilder};
pub use dead_letter::{DeadLetter, DeadLetterReason, DeadLetterSink};
pub use errors::SystemError;
pub use events::{
    EventHub, EventSubscription, SystemEvent, SystemEventKind, SystemEventListener,
};
pub use handle::SystemHandle;
pub use options::SpawnOptions;
