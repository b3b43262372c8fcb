//! Actor lifecycle states and per-instance counters.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

// Layer 2: Third-party crate imports
use serde::Serialize;
use serde_json::Value;

// Layer 3: Internal module imports
// (none)

/// Lifecycle state of an actor instance.
///
/// Transitions follow a fixed graph:
///
/// ```text
/// Idle → Starting → Running → Stopping → Stopped
///              ↘        ↓
///               Error (until the supervisor acts: resume, restart, stop)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ActorState {
    Idle,
    Starting,
    Running,
    Stopping,
    Stopped,
    Error,
}

impl ActorState {
    /// Whether the transition to `next` is legal.
    pub fn can_transition_to(self, next: ActorState) -> bool {
        use ActorState::*;
        matches!(
            (self, next),
            (Idle, Starting)
                | (Starting, Running)
                | (Starting, Error)
                | (Starting, Stopping)
                | (Running, Stopping)
                | (Running, Error)
                | (Error, Running)   // supervisor resumed
                | (Error, Stopping)  // supervisor stopped
                | (Stopping, Stopped)
        )
    }

    /// Whether the actor accepts message delivery.
    pub fn accepts_messages(self) -> bool {
        matches!(self, Self::Running)
    }

    /// Whether the actor has finished for good.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped)
    }
}

/// Monotonic per-instance counters.
#[derive(Debug, Default)]
pub struct ActorCounters {
    received: AtomicU64,
    processed: AtomicU64,
    errors: AtomicU64,
}

impl ActorCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }
}

/// Read-only view of an instance at a point in time.
///
/// The context is a copy; holding a snapshot never blocks the dispatcher.
#[derive(Debug, Clone, Serialize)]
pub struct ActorSnapshot {
    pub state: ActorState,
    pub context: Value,
    pub received: u64,
    pub processed: u64,
    pub errors: u64,
    /// Time since the actor entered `Running`; zero if it never started.
    pub uptime: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_transitions() {
        use ActorState::*;
        assert!(Idle.can_transition_to(Starting));
        assert!(Starting.can_transition_to(Running));
        assert!(Running.can_transition_to(Stopping));
        assert!(Running.can_transition_to(Error));
        assert!(Error.can_transition_to(Running));
        assert!(Error.can_transition_to(Stopping));
        assert!(Stopping.can_transition_to(Stopped));
    }

    #[test]
    fn test_illegal_transitions() {
        use ActorState::*;
        assert!(!Idle.can_transition_to(Running));
        assert!(!Stopped.can_transition_to(Running));
        assert!(!Running.can_transition_to(Starting));
        assert!(!Error.can_transition_to(Starting));
        assert!(!Stopping.can_transition_to(Running));
    }

    #[test]
    fn test_only_running_accepts_messages() {
        use ActorState::*;
        assert!(Running.accepts_messages());
        for state in [Idle, Starting, Stopping, Stopped, Error] {
            assert!(!state.accepts_messages());
        }
    }

    #[test]
    fn test_counters_are_monotonic() {
        let counters = ActorCounters::new();
        counters.record_received();
        counters.record_received();
        counters.record_processed();
        counters.record_error();

        assert_eq!(counters.received(), 2);
        assert_eq!(counters.processed(), 1);
        assert_eq!(counters.errors(), 1);
    }
}
