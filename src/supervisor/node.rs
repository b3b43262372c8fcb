//! One supervisor node: a strategy plus restart throttling for the actors it
//! supervises.

// Layer 1: Standard library imports
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};

// Layer 3: Internal module imports
use super::strategy::{SupervisionDecision, SupervisionStrategy};
use crate::util::{Address, SupervisorId};

/// What a node decided for one failure, before tree-level escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeDecision {
    /// Apply this decision to the failing child.
    Apply {
        decision: SupervisionDecision,
        /// The restart budget converted this decision to `Stop`.
        exceeded_limit: bool,
    },

    /// Hand the failure to the parent node.
    Escalate,
}

/// A supervisor node.
///
/// The node keeps, per supervised child, a sliding window of restart
/// timestamps; when the window holds `max_restarts` entries a would-be
/// restart becomes a stop. Failure handling is serialized per child by a
/// re-entrancy flag: a failure reported while the same child is already
/// being handled is ignored.
#[derive(Debug)]
pub struct SupervisorNode {
    id: SupervisorId,
    name: String,
    strategy: SupervisionStrategy,
    max_restarts: u32,
    restart_window: Duration,
    restart_delay: Duration,
    supervised: HashSet<Address>,
    restart_log: HashMap<String, VecDeque<DateTime<Utc>>>,
    handling: HashSet<String>,
}

impl SupervisorNode {
    /// Create a node.
    pub fn new(
        name: impl Into<String>,
        strategy: SupervisionStrategy,
        max_restarts: u32,
        restart_window: Duration,
        restart_delay: Duration,
    ) -> Self {
        Self {
            id: SupervisorId::new(),
            name: name.into(),
            strategy,
            max_restarts,
            restart_window,
            restart_delay,
            supervised: HashSet::new(),
            restart_log: HashMap::new(),
            handling: HashSet::new(),
        }
    }

    pub fn id(&self) -> SupervisorId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn strategy(&self) -> SupervisionStrategy {
        self.strategy
    }

    pub fn max_restarts(&self) -> u32 {
        self.max_restarts
    }

    pub fn restart_window(&self) -> Duration {
        self.restart_window
    }

    pub fn restart_delay(&self) -> Duration {
        self.restart_delay
    }

    /// Put an actor under this node's supervision.
    pub fn supervise(&mut self, address: Address) {
        self.supervised.insert(address);
    }

    /// Remove an actor from supervision, dropping its restart history.
    pub fn unsupervise(&mut self, address: &Address) -> bool {
        self.restart_log.remove(address.path());
        self.handling.remove(address.path());
        self.supervised.remove(address)
    }

    pub fn is_supervising(&self, address: &Address) -> bool {
        self.supervised.contains(address)
    }

    /// Addresses currently supervised by this node.
    pub fn supervised(&self) -> impl Iterator<Item = &Address> {
        self.supervised.iter()
    }

    pub fn supervised_count(&self) -> usize {
        self.supervised.len()
    }

    /// Mark a child failure as in flight. Returns `false` when a failure for
    /// the same child is already being handled.
    pub fn begin_handling(&mut self, child_path: &str) -> bool {
        self.handling.insert(child_path.to_string())
    }

    /// Clear the in-flight flag once the decision has been applied.
    pub fn end_handling(&mut self, child_path: &str) {
        self.handling.remove(child_path);
    }

    /// Decide what to do with a failing child at `now`.
    ///
    /// `Restart` consults the throttle; the other strategies pass through.
    pub fn decide(&mut self, child_path: &str, now: DateTime<Utc>) -> NodeDecision {
        match self.strategy {
            SupervisionStrategy::Resume => NodeDecision::Apply {
                decision: SupervisionDecision::Resume,
                exceeded_limit: false,
            },
            SupervisionStrategy::Stop => NodeDecision::Apply {
                decision: SupervisionDecision::Stop,
                exceeded_limit: false,
            },
            SupervisionStrategy::Escalate => NodeDecision::Escalate,
            SupervisionStrategy::Restart => {
                if self.restart_count(child_path, now) >= self.max_restarts {
                    NodeDecision::Apply {
                        decision: SupervisionDecision::Stop,
                        exceeded_limit: true,
                    }
                } else {
                    NodeDecision::Apply {
                        decision: SupervisionDecision::Restart,
                        exceeded_limit: false,
                    }
                }
            }
        }
    }

    /// Record a restart of a child at `now`.
    pub fn record_restart(&mut self, child_path: &str, now: DateTime<Utc>) {
        self.restart_log
            .entry(child_path.to_string())
            .or_default()
            .push_back(now);
    }

    /// Restarts of a child within the sliding window ending at `now`.
    ///
    /// Prunes entries that have aged out of the window.
    pub fn restart_count(&mut self, child_path: &str, now: DateTime<Utc>) -> u32 {
        let Some(log) = self.restart_log.get_mut(child_path) else {
            return 0;
        };
        let window =
            chrono::Duration::from_std(self.restart_window).unwrap_or(chrono::Duration::MAX);
        let window_start = now - window;
        while let Some(&oldest) = log.front() {
            if oldest < window_start {
                log.pop_front();
            } else {
                break;
            }
        }
        log.len() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::LOCAL_NODE;

    fn restart_node(max_restarts: u32, window: Duration) -> SupervisorNode {
        SupervisorNode::new(
            "test",
            SupervisionStrategy::Restart,
            max_restarts,
            window,
            Duration::from_millis(0),
        )
    }

    fn addr(id: &str) -> Address {
        Address::new(LOCAL_NODE, "worker", id)
    }

    #[test]
    fn test_supervise_unsupervise() {
        let mut node = restart_node(3, Duration::from_secs(60));
        let a = addr("w1");

        node.supervise(a.clone());
        assert!(node.is_supervising(&a));
        assert_eq!(node.supervised_count(), 1);

        assert!(node.unsupervise(&a));
        assert!(!node.is_supervising(&a));
        assert!(!node.unsupervise(&a));
    }

    #[test]
    fn test_restart_until_budget_exhausted() {
        let mut node = restart_node(2, Duration::from_secs(60));
        let now = Utc::now();
        let path = "actor://local/worker/w1";

        assert_eq!(
            node.decide(path, now),
            NodeDecision::Apply {
                decision: SupervisionDecision::Restart,
                exceeded_limit: false
            }
        );
        node.record_restart(path, now);

        assert_eq!(
            node.decide(path, now),
            NodeDecision::Apply {
                decision: SupervisionDecision::Restart,
                exceeded_limit: false
            }
        );
        node.record_restart(path, now);

        // Third failure inside the window: budget exhausted.
        assert_eq!(
            node.decide(path, now),
            NodeDecision::Apply {
                decision: SupervisionDecision::Stop,
                exceeded_limit: true
            }
        );
    }

    #[test]
    fn test_window_slides() {
        let mut node = restart_node(2, Duration::from_millis(100));
        let start = Utc::now();
        let path = "actor://local/worker/w1";

        node.record_restart(path, start);
        node.record_restart(path, start);
        assert_eq!(node.restart_count(path, start), 2);

        // Past the window both entries age out.
        let later = start + chrono::Duration::milliseconds(150);
        assert_eq!(node.restart_count(path, later), 0);
        assert_eq!(
            node.decide(path, later),
            NodeDecision::Apply {
                decision: SupervisionDecision::Restart,
                exceeded_limit: false
            }
        );
    }

    #[test]
    fn test_restart_budget_is_per_child() {
        let mut node = restart_node(1, Duration::from_secs(60));
        let now = Utc::now();
        node.record_restart("actor://local/worker/w1", now);

        assert_eq!(
            node.decide("actor://local/worker/w2", now),
            NodeDecision::Apply {
                decision: SupervisionDecision::Restart,
                exceeded_limit: false
            }
        );
    }

    #[test]
    fn test_non_restart_strategies_pass_through() {
        let now = Utc::now();
        let mut resume = SupervisorNode::new(
            "r",
            SupervisionStrategy::Resume,
            3,
            Duration::from_secs(60),
            Duration::ZERO,
        );
        assert_eq!(
            resume.decide("p", now),
            NodeDecision::Apply {
                decision: SupervisionDecision::Resume,
                exceeded_limit: false
            }
        );

        let mut escalate = SupervisorNode::new(
            "e",
            SupervisionStrategy::Escalate,
            3,
            Duration::from_secs(60),
            Duration::ZERO,
        );
        assert_eq!(escalate.decide("p", now), NodeDecision::Escalate);
    }

    #[test]
    fn test_failure_handling_is_serialized_per_child() {
        let mut node = restart_node(3, Duration::from_secs(60));
        assert!(node.begin_handling("p1"));
        assert!(!node.begin_handling("p1"));
        assert!(node.begin_handling("p2"));

        node.end_handling("p1");
        assert!(node.begin_handling("p1"));
    }

    #[test]
    fn test_unsupervise_clears_history() {
        let mut node = restart_node(1, Duration::from_secs(60));
        let a = addr("w1");
        let now = Utc::now();

        node.supervise(a.clone());
        node.record_restart(a.path(), now);
        node.unsupervise(&a);

        assert_eq!(node.restart_count(a.path(), now), 0);
    }
}
