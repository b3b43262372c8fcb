//! Pending-ask bookkeeping.
//!
//! The manager is process-global state owned by the actor system. It is not
//! an actor: every operation is O(1) under a plain mutex and never awaits
//! while holding the lock.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, trace};
use uuid::Uuid;

// Layer 3: Internal module imports
use super::error::AskError;
use crate::util::{CorrelationId, SharedClock};

struct PendingAsk {
    tx: oneshot::Sender<Result<Value, AskError>>,
    deadline: DateTime<Utc>,
    target_path: String,
    message_kind: String,
    timeout: Duration,
}

/// Waiter half of a registered ask.
pub struct AskFuture {
    rx: oneshot::Receiver<Result<Value, AskError>>,
}

impl AskFuture {
    /// Wait for the reply or the failure that resolved this ask.
    pub async fn recv(self) -> Result<Value, AskError> {
        match self.rx.await {
            Ok(result) => result,
            // The manager was dropped with the ask still pending.
            Err(_) => Err(AskError::Cleared {
                reason: "correlation manager dropped".into(),
            }),
        }
    }
}

/// Tracks outstanding asks and arbitrates their resolution.
///
/// Duplicate resolves and resolves after timeout are no-ops: whichever of
/// `resolve`, `fail`, or the sweep removes the token first wins, and the
/// token is never reused while pending.
pub struct CorrelationManager {
    pending: Mutex<HashMap<CorrelationId, PendingAsk>>,
    sequence: AtomicU64,
    clock: SharedClock,
}

impl CorrelationManager {
    /// Create an empty manager using the given clock for deadlines.
    pub fn new(clock: SharedClock) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            sequence: AtomicU64::new(0),
            clock,
        }
    }

    /// Mint a token that is unique for the life of the process.
    ///
    /// The monotonic sequence makes tokens sortable in logs; the uuid suffix
    /// keeps them unguessable across restarts.
    pub fn generate_id(&self) -> CorrelationId {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        CorrelationId::from_string(format!("{seq:016x}-{}", Uuid::new_v4().simple()))
    }

    /// Register a pending ask, returning the waiter future.
    ///
    /// Fails immediately with [`AskError::TokenInUse`] if the token is
    /// already pending.
    pub fn register(
        &self,
        token: CorrelationId,
        timeout: Duration,
        target_path: impl Into<String>,
        message_kind: impl Into<String>,
    ) -> Result<AskFuture, AskError> {
        let (tx, rx) = oneshot::channel();
        let deadline = self.clock.now()
            + chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::MAX);

        let mut pending = self.pending.lock();
        if pending.contains_key(&token) {
            return Err(AskError::TokenInUse { token });
        }
        pending.insert(
            token,
            PendingAsk {
                tx,
                deadline,
                target_path: target_path.into(),
                message_kind: message_kind.into(),
                timeout,
            },
        );
        Ok(AskFuture { rx })
    }

    /// Complete the pending ask with a reply. No-op for unknown tokens.
    pub fn resolve(&self, token: &CorrelationId, reply: Value) {
        let entry = self.pending.lock().remove(token);
        match entry {
            Some(ask) => {
                // The waiter may have given up; that is not an error.
                let _ = ask.tx.send(Ok(reply));
            }
            None => trace!(%token, "late or unknown reply discarded"),
        }
    }

    /// Fail the pending ask. No-op for unknown tokens.
    pub fn fail(&self, token: &CorrelationId, reason: AskError) {
        if let Some(ask) = self.pending.lock().remove(token) {
            let _ = ask.tx.send(Err(reason));
        }
    }

    /// Fail every pending ask with the given reason.
    pub fn clear_all(&self, reason: &str) {
        let drained: Vec<PendingAsk> = {
            let mut pending = self.pending.lock();
            pending.drain().map(|(_, ask)| ask).collect()
        };
        if !drained.is_empty() {
            debug!(count = drained.len(), reason, "clearing pending asks");
        }
        for ask in drained {
            let _ = ask.tx.send(Err(AskError::Cleared {
                reason: reason.to_string(),
            }));
        }
    }

    /// Number of asks currently pending.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Fail every ask whose deadline has passed; returns how many expired.
    ///
    /// Driven by a scheduler interval; asks awaited directly also arm a
    /// precise timer, so the sweep only matters for plan-based asks whose
    /// waiter task died.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let expired: Vec<(CorrelationId, PendingAsk)> = {
            let mut pending = self.pending.lock();
            let tokens: Vec<CorrelationId> = pending
                .iter()
                .filter(|(_, ask)| ask.deadline <= now)
                .map(|(token, _)| token.clone())
                .collect();
            tokens
                .into_iter()
                .filter_map(|token| pending.remove(&token).map(|ask| (token, ask)))
                .collect()
        };

        let count = expired.len();
        for (token, ask) in expired {
            let _ = ask.tx.send(Err(AskError::Timeout {
                target_path: ask.target_path,
                message_kind: ask.message_kind,
                timeout_ms: ask.timeout.as_millis() as u64,
                token,
            }));
        }
        count
    }
}
