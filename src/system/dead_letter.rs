//! Dead-letter sink: the destination for every message the runtime could
//! not deliver.
//!
//! The sink is observer-only and best-effort: a bounded ring of recent dead
//! letters plus a monotonic counter. It is not a mailbox and exerts no
//! back-pressure.

// Layer 1: Standard library imports
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::warn;

// Layer 3: Internal module imports
use crate::message::Envelope;
use crate::util::Address;

/// Why a message could not be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadLetterReason {
    /// The directory had no live record for the target.
    UnknownAddress,

    /// The target exists but is not accepting messages (stopped, stopping,
    /// failed, or not yet running).
    NotAccepting,

    /// The mailbox rejected or displaced the envelope.
    MailboxOverflow,

    /// The mailbox was closed for new sends.
    MailboxClosed,

    /// The system is not running.
    SystemNotRunning,

    /// The target resolved to a remote location and no transport is wired.
    Unroutable,
}

impl DeadLetterReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownAddress => "unknownAddress",
            Self::NotAccepting => "notAccepting",
            Self::MailboxOverflow => "mailboxOverflow",
            Self::MailboxClosed => "mailboxClosed",
            Self::SystemNotRunning => "systemNotRunning",
            Self::Unroutable => "unroutable",
        }
    }
}

/// One undeliverable message.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub target: Address,
    pub envelope: Envelope,
    pub reason: DeadLetterReason,
    pub recorded_at: DateTime<Utc>,
}

/// Bounded ring of recent dead letters.
pub struct DeadLetterSink {
    recent: Mutex<VecDeque<DeadLetter>>,
    capacity: usize,
    total: AtomicU64,
}

impl DeadLetterSink {
    /// Create a sink keeping at most `capacity` recent entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            recent: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            total: AtomicU64::new(0),
        }
    }

    /// Record a dead letter; the oldest entry is evicted when full.
    pub fn publish(&self, target: Address, envelope: Envelope, reason: DeadLetterReason) {
        warn!(
            target_path = target.path(),
            message_kind = envelope.message_kind(),
            reason = reason.as_str(),
            "dead letter"
        );
        self.total.fetch_add(1, Ordering::Relaxed);

        let mut recent = self.recent.lock();
        if recent.len() == self.capacity {
            recent.pop_front();
        }
        recent.push_back(DeadLetter {
            target,
            envelope,
            reason,
            recorded_at: Utc::now(),
        });
    }

    /// Snapshot of the retained entries, oldest first.
    pub fn recent(&self) -> Vec<DeadLetter> {
        self.recent.lock().iter().cloned().collect()
    }

    /// Total dead letters since the sink was created.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Drop retained entries (the counter is preserved).
    pub fn clear(&self) {
        self.recent.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use crate::util::LOCAL_NODE;

    fn letter(sink: &DeadLetterSink, id: &str) {
        sink.publish(
            Address::new(LOCAL_NODE, "worker", id),
            Envelope::new(Message::of("PING")),
            DeadLetterReason::UnknownAddress,
        );
    }

    #[test]
    fn test_publish_and_recent() {
        let sink = DeadLetterSink::new(8);
        letter(&sink, "w1");
        letter(&sink, "w2");

        let recent = sink.recent();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].target.id(), "w1");
        assert_eq!(sink.total(), 2);
    }

    #[test]
    fn test_ring_evicts_oldest() {
        let sink = DeadLetterSink::new(2);
        letter(&sink, "w1");
        letter(&sink, "w2");
        letter(&sink, "w3");

        let recent = sink.recent();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].target.id(), "w2");
        assert_eq!(sink.total(), 3);
    }

    #[test]
    fn test_clear_preserves_counter() {
        let sink = DeadLetterSink::new(4);
        letter(&sink, "w1");
        sink.clear();
        assert!(sink.recent().is_empty());
        assert_eq!(sink.total(), 1);
    }
}
