//! Behavior descriptors: what an actor does with a message.
//!
//! A [`Behavior`] is a runtime value (not a compile-time type): an initial
//! context, one async message handler, and optional start/stop hooks. The
//! [`BehaviorKind`] tag distinguishes stateless, context-carrying, and
//! machine-driven behaviors; a single dispatch path branches on the tag.

pub mod descriptor;
pub mod machine;
pub mod result;

pub use descriptor::{Behavior, BehaviorKind, HandlerError, HandlerParams, HookParams};
pub use machine::{MachineDescriptor, StateSpec, TransitionSpec};
pub use result::{
    AskInstruction, Continuation, DeliveryMode, HandlerResult, Instruction, MessagePlan,
};
