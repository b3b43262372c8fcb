//! Error types for directory operations.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
// (none)

/// Errors from directory operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DirectoryError {
    /// The address is not registered (and no peer knew it either).
    #[error("address not registered: {path}")]
    NotRegistered { path: String },
}

/// Error reported by a broadcast hook.
///
/// Broadcast failures degrade the directory to local-only resolution; they
/// never fail the registration that triggered them.
#[derive(Debug, Clone, Error)]
#[error("broadcast failed: {reason}")]
pub struct BroadcastError {
    pub reason: String,
}

impl BroadcastError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = DirectoryError::NotRegistered {
            path: "actor://local/worker/w1".into(),
        };
        assert!(err.to_string().contains("actor://local/worker/w1"));

        let err = BroadcastError::new("peer unreachable");
        assert!(err.to_string().contains("peer unreachable"));
    }
}
