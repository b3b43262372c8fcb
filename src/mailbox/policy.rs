//! Overflow policies for full mailboxes.
//!
//! When a bounded mailbox is at capacity, the overflow policy decides what
//! happens to the incoming envelope. The policy is chosen per spawn and never
//! changes for the life of the actor.

// Layer 1: Standard library imports
use std::fmt;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
// (none)

/// What a full mailbox does with an incoming envelope.
///
/// # Policy Selection
///
/// - **DropNewest**: fire-and-forget traffic where the newest datum is the
///   most expendable (default).
/// - **DropOldest**: rolling-window traffic where stale entries lose value.
/// - **Block**: the sender suspends until space frees up.
/// - **Fail**: request/response traffic where the sender needs immediate
///   feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum OverflowPolicy {
    /// Discard the incoming envelope.
    #[default]
    DropNewest,

    /// Discard the oldest queued envelope to make room.
    DropOldest,

    /// Suspend the sender until space becomes available.
    Block,

    /// Reject the incoming envelope with a failure verdict.
    Fail,
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DropNewest => write!(f, "dropNewest"),
            Self::DropOldest => write!(f, "dropOldest"),
            Self::Block => write!(f, "block"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

/// Outcome of an enqueue attempt.
///
/// `Blocked` reports that the envelope was enqueued after the sender had to
/// wait for space under [`OverflowPolicy::Block`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueVerdict {
    /// Enqueued without waiting.
    Enqueued,

    /// The incoming envelope was discarded.
    DroppedNewest,

    /// The oldest queued envelope was discarded; the incoming one enqueued.
    DroppedOldest,

    /// Enqueued after waiting for space.
    Blocked,

    /// Rejected: the mailbox is closed, or full under [`OverflowPolicy::Fail`].
    Failed,
}

impl EnqueueVerdict {
    /// Whether the incoming envelope ended up in the queue.
    pub fn accepted(&self) -> bool {
        matches!(self, Self::Enqueued | Self::DroppedOldest | Self::Blocked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_drop_newest() {
        assert_eq!(OverflowPolicy::default(), OverflowPolicy::DropNewest);
    }

    #[test]
    fn test_policy_display() {
        assert_eq!(OverflowPolicy::DropNewest.to_string(), "dropNewest");
        assert_eq!(OverflowPolicy::DropOldest.to_string(), "dropOldest");
        assert_eq!(OverflowPolicy::Block.to_string(), "block");
        assert_eq!(OverflowPolicy::Fail.to_string(), "fail");
    }

    #[test]
    fn test_policy_serde_is_camel_case() {
        let json = serde_json::to_string(&OverflowPolicy::DropOldest).unwrap_or_default();
        assert_eq!(json, "\"dropOldest\"");
    }

    #[test]
    fn test_verdict_accepted() {
        assert!(EnqueueVerdict::Enqueued.accepted());
        assert!(EnqueueVerdict::DroppedOldest.accepted());
        assert!(EnqueueVerdict::Blocked.accepted());
        assert!(!EnqueueVerdict::DroppedNewest.accepted());
        assert!(!EnqueueVerdict::Failed.accepted());
    }
}
