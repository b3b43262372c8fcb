//! Per-spawn options.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use crate::mailbox::OverflowPolicy;

/// Options for [`spawn`](crate::system::ActorSystem::spawn).
///
/// Every field defaults to the system configuration (or, for `id`, to a
/// generated value).
///
/// # Example
///
/// ```rust
/// use lattice_rt::system::SpawnOptions;
/// use lattice_rt::mailbox::OverflowPolicy;
///
/// let options = SpawnOptions::new()
///     .with_actor_type("counter")
///     .with_id("counter-1")
///     .with_mailbox_capacity(64)
///     .with_overflow(OverflowPolicy::Fail);
/// assert_eq!(options.id.as_deref(), Some("counter-1"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct SpawnOptions {
    /// Stable id segment of the address; generated when absent.
    pub id: Option<String>,

    /// Type segment of the address; `"actor"` when absent.
    pub actor_type: Option<String>,

    /// Name of the supervisor node to attach to; the root when absent.
    pub supervisor: Option<String>,

    /// Mailbox capacity override.
    pub mailbox_capacity: Option<usize>,

    /// Mailbox overflow policy override.
    pub overflow: Option<OverflowPolicy>,
}

impl SpawnOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_actor_type(mut self, actor_type: impl Into<String>) -> Self {
        self.actor_type = Some(actor_type.into());
        self
    }

    pub fn with_supervisor(mut self, supervisor: impl Into<String>) -> Self {
        self.supervisor = Some(supervisor.into());
        self
    }

    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = Some(capacity);
        self
    }

    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = Some(overflow);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_unset() {
        let options = SpawnOptions::new();
        assert!(options.id.is_none());
        assert!(options.actor_type.is_none());
        assert!(options.supervisor.is_none());
        assert!(options.mailbox_capacity.is_none());
        assert!(options.overflow.is_none());
    }

    #[test]
    fn test_builder_sets_fields() {
        let options = SpawnOptions::new()
            .with_supervisor("workers")
            .with_overflow(OverflowPolicy::Block);
        assert_eq!(options.supervisor.as_deref(), Some("workers"));
        assert_eq!(options.overflow, Some(OverflowPolicy::Block));
    }
}
