//! # lattice-rt - Lightweight Actor Runtime
//!
//! An actor runtime with per-actor mailboxes, ask/reply correlation,
//! hierarchical supervision, a TTL-cached distributed directory, and a
//! scheduler actor as the single source of delayed work.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use lattice_rt::prelude::*;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let system = ActorSystem::new(SystemConfig::default())?;
//!     system.start().await?;
//!
//!     // 1. Describe a behavior: initial context plus an async handler.
//!     let counter = Behavior::with_context(json!({ "count": 0 }), |params| async move {
//!         let count = params.context["count"].as_i64().unwrap_or(0);
//!         match params.message.kind() {
//!             "INCREMENT" => Ok(HandlerResult::context(json!({ "count": count + 1 }))),
//!             "GET_COUNT" => Ok(HandlerResult::reply(json!({ "count": count }))),
//!             _ => Ok(HandlerResult::unchanged()),
//!         }
//!     });
//!
//!     // 2. Spawn it; the address is its stable identity.
//!     let address = system.spawn(counter, SpawnOptions::new().with_actor_type("counter")).await?;
//!
//!     // 3. Fire-and-forget, then request/response.
//!     system.send(&address, Message::of("INCREMENT")).await;
//!     let reply = system.ask(&address, Message::of("GET_COUNT"), None).await?;
//!     assert_eq!(reply["count"], 1);
//!
//!     system.stop().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Core Pieces
//!
//! - [`behavior`] - behavior descriptors, handler results, message plans,
//!   and the declarative machine descriptor
//! - [`mailbox`] - bounded FIFO mailboxes with overflow policies
//! - [`actor`] - actor instances: lifecycle, counters, injected capabilities
//! - [`correlation`] - ask/reply token lifecycle and timeouts
//! - [`scheduler`] - the scheduler actor, sole source of delayed messages
//! - [`supervisor`] - supervision strategies, nodes, and the escalation tree
//! - [`directory`] - address resolution with a TTL-bounded LRU cache
//! - [`system`] - the actor system: spawn, route, events, shutdown
//! - [`codec`] - wire envelope and payload codecs for node boundaries
//! - [`message`] - dynamic messages, domain events, mailbox envelopes
//! - [`util`] - addresses, typed ids, the clock seam
//!
//! # Guarantees
//!
//! - Per-actor processing is single-threaded and in enqueue order; side
//!   effects of a message are observable before the next one starts.
//! - A send is delivered at most once; anything undeliverable lands in the
//!   dead-letter sink and raises a `deadLetter` event.
//! - Every ask resolves or fails within its timeout.
//! - A failing actor never takes down the scheduler, the directory, or the
//!   system: failures route through supervision.

pub mod actor;
pub mod behavior;
pub mod codec;
pub mod correlation;
pub mod directory;
pub mod mailbox;
pub mod message;
pub mod prelude;
pub mod scheduler;
pub mod supervisor;
pub mod system;
pub mod util;

// Re-export the user-facing surface at the crate root.
pub use actor::{ActorSnapshot, ActorState, Dependencies};
pub use behavior::{
    Behavior, BehaviorKind, HandlerError, HandlerParams, HandlerResult, MachineDescriptor,
    MessagePlan,
};
pub use correlation::AskError;
pub use directory::{BroadcastHook, Directory, DirectoryStats, NoopBroadcast};
pub use mailbox::{EnqueueVerdict, OverflowPolicy};
pub use message::{DomainEvent, Envelope, EventFilter, Message};
pub use supervisor::SupervisionStrategy;
pub use system::{
    ActorSystem, SpawnOptions, SupervisorSpec, SystemConfig, SystemError, SystemEvent,
    SystemEventKind,
};
pub use util::{Address, Clock, ManualClock, ScheduleId, SystemClock};
