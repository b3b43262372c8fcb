// Layer 1: Standard library imports
use std::fmt::{self, Display};

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Layer 3: Internal module imports
// (none)

/// Unique identifier for a schedule entry owned by the scheduler actor.
///
/// # Example
/// ```rust
/// use lattice_rt::util::ScheduleId;
///
/// let id1 = ScheduleId::new();
/// let id2 = ScheduleId::new();
/// assert_ne!(id1, id2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScheduleId(Uuid);

impl ScheduleId {
    /// Generate a new random ScheduleId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a ScheduleId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ScheduleId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ScheduleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a supervisor node in the supervision tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SupervisorId(Uuid);

impl SupervisorId {
    /// Generate a new random SupervisorId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SupervisorId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SupervisorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque correlation token binding an outgoing ask to its reply.
///
/// Tokens are minted by the correlation manager and are unique for the life
/// of the process; see `CorrelationManager::generate_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Wrap an existing token value.
    ///
    /// Intended for transports that carry tokens across the wire; locally
    /// minted tokens come from the correlation manager.
    pub fn from_string(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The token value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
