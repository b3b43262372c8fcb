// Layer 1: Standard library imports
use std::collections::VecDeque;

// Layer 2: Third-party crate imports
use parking_lot::Mutex;
use tokio::sync::Notify;

// Layer 3: Internal module imports
use super::policy::{EnqueueVerdict, OverflowPolicy};
use crate::message::Envelope;

/// Result of an enqueue attempt: the verdict plus any envelope that fell out.
///
/// `discarded` is the incoming envelope for `DroppedNewest`/`Failed`, or the
/// displaced head of the queue for `DroppedOldest`. The system routes it to
/// the dead-letter sink.
#[derive(Debug)]
pub struct EnqueueOutcome {
    pub verdict: EnqueueVerdict,
    pub discarded: Option<Envelope>,
}

impl EnqueueOutcome {
    fn accepted(verdict: EnqueueVerdict) -> Self {
        Self {
            verdict,
            discarded: None,
        }
    }
}

struct Inner {
    queue: VecDeque<Envelope>,
    closed: bool,
}

/// Bounded FIFO mailbox for one actor.
///
/// The queue is a deque guarded by a mutex rather than a channel because
/// `DropOldest`, `clear`, and size introspection all need access to queued
/// envelopes. Arrival and freed-space signaling use [`Notify`], keeping every
/// critical section O(1) and free of await points.
///
/// Ordering: envelopes that are accepted are dequeued in the order they were
/// accepted; the single dispatcher task is the only consumer.
///
/// # Example
///
/// ```rust
/// use lattice_rt::mailbox::{EnqueueVerdict, Mailbox, OverflowPolicy};
/// use lattice_rt::message::{Envelope, Message};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let mailbox = Mailbox::new(8, OverflowPolicy::Fail);
/// let outcome = mailbox.enqueue(Envelope::new(Message::of("PING"))).await;
/// assert_eq!(outcome.verdict, EnqueueVerdict::Enqueued);
/// assert_eq!(mailbox.size(), 1);
/// # }
/// ```
pub struct Mailbox {
    inner: Mutex<Inner>,
    capacity: usize,
    policy: OverflowPolicy,
    arrivals: Notify,
    space: Notify,
}

impl Mailbox {
    /// Create a mailbox with the given capacity and overflow policy.
    ///
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::new(),
                closed: false,
            }),
            capacity: capacity.max(1),
            policy,
            arrivals: Notify::new(),
            space: Notify::new(),
        }
    }

    /// The configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The configured overflow policy.
    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Enqueue an envelope, applying the overflow policy when full.
    ///
    /// Only the `Block` policy ever suspends the caller; every other path
    /// returns immediately.
    pub async fn enqueue(&self, envelope: Envelope) -> EnqueueOutcome {
        // Fast path plus all non-blocking policies.
        let envelope = {
            let mut inner = self.inner.lock();
            if inner.closed {
                return EnqueueOutcome {
                    verdict: EnqueueVerdict::Failed,
                    discarded: Some(envelope),
                };
            }
            if inner.queue.len() < self.capacity {
                inner.queue.push_back(envelope);
                drop(inner);
                self.arrivals.notify_one();
                return EnqueueOutcome::accepted(EnqueueVerdict::Enqueued);
            }
            match self.policy {
                OverflowPolicy::DropNewest => {
                    return EnqueueOutcome {
                        verdict: EnqueueVerdict::DroppedNewest,
                        discarded: Some(envelope),
                    };
                }
                OverflowPolicy::DropOldest => {
                    let displaced = inner.queue.pop_front();
                    inner.queue.push_back(envelope);
                    drop(inner);
                    self.arrivals.notify_one();
                    return EnqueueOutcome {
                        verdict: EnqueueVerdict::DroppedOldest,
                        discarded: displaced,
                    };
                }
                OverflowPolicy::Fail => {
                    return EnqueueOutcome {
                        verdict: EnqueueVerdict::Failed,
                        discarded: Some(envelope),
                    };
                }
                OverflowPolicy::Block => envelope,
            }
        };

        self.enqueue_blocking(envelope).await
    }

    /// Wait for space under the `Block` policy.
    async fn enqueue_blocking(&self, envelope: Envelope) -> EnqueueOutcome {
        loop {
            // Register interest before re-checking so a concurrent dequeue
            // cannot slip between the check and the await.
            let space = self.space.notified();
            {
                let mut inner = self.inner.lock();
                if inner.closed {
                    return EnqueueOutcome {
                        verdict: EnqueueVerdict::Failed,
                        discarded: Some(envelope),
                    };
                }
                if inner.queue.len() < self.capacity {
                    inner.queue.push_back(envelope);
                    drop(inner);
                    self.arrivals.notify_one();
                    return EnqueueOutcome::accepted(EnqueueVerdict::Blocked);
                }
            }
            space.await;
        }
    }

    /// Remove and return the head envelope, waiting for one to arrive.
    ///
    /// Returns `None` once the mailbox is closed and fully drained.
    pub async fn dequeue(&self) -> Option<Envelope> {
        loop {
            let arrival = self.arrivals.notified();
            {
                let mut inner = self.inner.lock();
                if let Some(envelope) = inner.queue.pop_front() {
                    drop(inner);
                    self.space.notify_one();
                    return Some(envelope);
                }
                if inner.closed {
                    return None;
                }
            }
            arrival.await;
        }
    }

    /// Remove and return the head envelope if one is queued.
    pub fn try_dequeue(&self) -> Option<Envelope> {
        let envelope = self.inner.lock().queue.pop_front();
        if envelope.is_some() {
            self.space.notify_one();
        }
        envelope
    }

    /// Number of queued envelopes.
    pub fn size(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Drop every queued envelope, returning them for dead-letter routing.
    pub fn clear(&self) -> Vec<Envelope> {
        let drained: Vec<Envelope> = self.inner.lock().queue.drain(..).collect();
        if !drained.is_empty() {
            self.space.notify_waiters();
        }
        drained
    }

    /// Refuse all further enqueues; queued envelopes can still be drained.
    pub fn close_for_new_sends(&self) {
        self.inner.lock().closed = true;
        // Wake blocked senders (they fail) and the dispatcher (it drains out).
        self.space.notify_waiters();
        self.arrivals.notify_waiters();
    }

    /// Whether the mailbox refuses new sends.
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}
