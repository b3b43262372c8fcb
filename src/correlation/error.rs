//! Error types for the ask/reply exchange.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
use crate::util::CorrelationId;

/// Ways an ask can fail.
///
/// Timeouts carry the full exchange context so callers can log a useful
/// message without holding any other state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AskError {
    /// The reply did not arrive before the deadline.
    #[error(
        "ask '{message_kind}' to {target_path} timed out after {timeout_ms}ms (token {token})"
    )]
    Timeout {
        target_path: String,
        message_kind: String,
        timeout_ms: u64,
        token: CorrelationId,
    },

    /// A register was attempted with a token that is still pending.
    #[error("correlation token {token} is already pending")]
    TokenInUse { token: CorrelationId },

    /// The manager was cleared while the ask was pending.
    #[error("correlation manager cleared: {reason}")]
    Cleared { reason: String },

    /// The exchange failed for a reason reported by the runtime.
    #[error("ask failed: {reason}")]
    Failed { reason: String },
}

impl AskError {
    /// Whether this is a deadline expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_carries_context() {
        let err = AskError::Timeout {
            target_path: "actor://local/worker/w1".into(),
            message_kind: "GET_COUNT".into(),
            timeout_ms: 1000,
            token: CorrelationId::from_string("7-abc"),
        };
        assert!(err.is_timeout());
        let text = err.to_string();
        assert!(text.contains("GET_COUNT"));
        assert!(text.contains("actor://local/worker/w1"));
        assert!(text.contains("1000"));
        assert!(text.contains("7-abc"));
    }

    #[test]
    fn test_non_timeout_predicates() {
        let err = AskError::Cleared {
            reason: "manager cleared".into(),
        };
        assert!(!err.is_timeout());
    }
}
