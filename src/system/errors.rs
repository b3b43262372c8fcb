//! Error types for actor-system operations.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
use crate::correlation::AskError;
use crate::supervisor::SupervisorError;

/// Errors surfaced by explicit request/response operations on the system.
///
/// Fire-and-forget sends never produce these; undeliverable sends go to the
/// dead-letter sink instead.
#[derive(Debug, Error)]
pub enum SystemError {
    /// The actor could not be spawned.
    #[error("cannot spawn '{id}': {reason}")]
    SpawnFailed { id: String, reason: String },

    /// The operation requires a running system.
    #[error("actor system is not running")]
    NotRunning,

    /// `start` was called from a state it cannot start from.
    #[error("actor system cannot start from state {state}")]
    CannotStart { state: String },

    /// An ask failed or timed out.
    #[error(transparent)]
    Ask(#[from] AskError),

    /// A named supervisor does not exist.
    #[error("supervisor '{name}' not found")]
    SupervisorNotFound { name: String },

    /// No actor lives at the given path.
    #[error("no actor at {path}")]
    ActorNotFound { path: String },

    /// A supervision-tree operation failed.
    #[error(transparent)]
    Supervision(#[from] SupervisorError),

    /// The scheduler actor rejected or could not process a request.
    #[error("scheduler error: {reason}")]
    Scheduler { reason: String },

    /// Graceful shutdown exceeded its budget.
    #[error("shutdown timed out after {timeout:?}")]
    ShutdownTimeout { timeout: Duration },

    /// Configuration failed validation.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },
}

impl SystemError {
    /// Whether the error came from an ask deadline.
    pub fn is_ask_timeout(&self) -> bool {
        matches!(self, Self::Ask(err) if err.is_timeout())
    }

    /// Whether retrying after the system starts could help.
    pub fn is_not_running(&self) -> bool {
        matches!(self, Self::NotRunning | Self::CannotStart { .. })
    }
}
