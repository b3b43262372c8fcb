//! Supervision strategies and the decisions they produce.

// Layer 1: Standard library imports
use std::fmt;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
// (none)

/// What a supervisor does with a failing child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SupervisionStrategy {
    /// Ignore the error; the child keeps its context and returns to running.
    Resume,

    /// Stop the child and start a fresh instance from its initial context
    /// after the configured restart delay.
    #[default]
    Restart,

    /// Stop the child permanently and unsupervise it.
    Stop,

    /// Hand the failure to the parent supervisor.
    Escalate,
}

impl fmt::Display for SupervisionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resume => write!(f, "resume"),
            Self::Restart => write!(f, "restart"),
            Self::Stop => write!(f, "stop"),
            Self::Escalate => write!(f, "escalate"),
        }
    }
}

/// The decision actually applied to a failing child.
///
/// This mirrors [`SupervisionStrategy`] minus `Escalate`, which is resolved
/// by walking the tree: by the time a decision is applied, escalation has
/// either found a deciding node or fallen off the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisionDecision {
    Resume,
    Restart,
    Stop,
}

impl fmt::Display for SupervisionDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resume => write!(f, "resume"),
            Self::Restart => write!(f, "restart"),
            Self::Stop => write!(f, "stop"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_strategy_is_restart() {
        assert_eq!(SupervisionStrategy::default(), SupervisionStrategy::Restart);
    }

    #[test]
    fn test_strategy_serde_is_lowercase() {
        let json = serde_json::to_string(&SupervisionStrategy::Escalate).unwrap_or_default();
        assert_eq!(json, "\"escalate\"");
        let back: SupervisionStrategy =
            serde_json::from_str("\"resume\"").unwrap_or(SupervisionStrategy::Stop);
        assert_eq!(back, SupervisionStrategy::Resume);
    }

    #[test]
    fn test_display() {
        assert_eq!(SupervisionStrategy::Restart.to_string(), "restart");
        assert_eq!(SupervisionDecision::Stop.to_string(), "stop");
    }
}
