//! Convenience re-exports for typical usage.
//!
//! ```rust
//! use lattice_rt::prelude::*;
//! ```

pub use crate::actor::{ActorSnapshot, ActorState, Dependencies};
pub use crate::behavior::{
    AskInstruction, Behavior, BehaviorKind, Continuation, HandlerError, HandlerParams,
    HandlerResult, MachineDescriptor, MessagePlan, StateSpec,
};
pub use crate::correlation::AskError;
pub use crate::mailbox::OverflowPolicy;
pub use crate::message::{DomainEvent, EventFilter, Message};
pub use crate::supervisor::SupervisionStrategy;
pub use crate::system::{
    ActorSystem, SpawnOptions, SupervisorSpec, SystemConfig, SystemError, SystemEvent,
    SystemEventKind,
};
pub use crate::util::{Address, ScheduleId, LOCAL_NODE};
