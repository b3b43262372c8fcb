//! Hierarchical supervision: strategies, nodes, and the tree that routes
//! failure escalation.

pub mod error;
pub mod node;
pub mod strategy;
pub mod tree;

pub use error::SupervisorError;
pub use node::{NodeDecision, SupervisorNode};
pub use strategy::{SupervisionDecision, SupervisionStrategy};
pub use tree::{FailureOutcome, SupervisionTree};
