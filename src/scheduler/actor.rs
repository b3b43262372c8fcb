//! The scheduler actor's state and behavior.
//!
//! Every schedule entry corresponds to a timer state machine
//! (Active → Completed | Cancelled) backed by one tokio timer task. The
//! actor shape means cancellation, shutdown, and test flushing all have a
//! single enforcement point; nothing else in the runtime is allowed to
//! arm timers for message delivery.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

// Layer 3: Internal module imports
use super::messages::{
    CancelSchedule, ScheduleOnce, ScheduleRecurring, SchedulerReply, CANCEL_SCHEDULE, CLEANUP,
    SCHEDULE_ONCE, SCHEDULE_RECURRING,
};
use crate::behavior::{Behavior, HandlerResult};
#[cfg(test)]
use crate::message::Message;
use crate::system::SystemHandle;
use crate::util::{Address, ScheduleId, SharedClock};

/// Reserved id of the scheduler actor.
pub const SCHEDULER_ACTOR_ID: &str = "scheduler";

/// Reserved type of runtime-internal actors.
pub const SCHEDULER_ACTOR_TYPE: &str = "system";

/// Timer lifecycle of one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Active,
    Completed,
    Cancelled,
}

/// Whether an entry fires once or repeatedly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleKind {
    Once,
    Recurring,
}

struct ScheduleEntry {
    kind: ScheduleKind,
    target: Address,
    next_fire_at: DateTime<Utc>,
    handle: JoinHandle<()>,
}

/// Shared state behind the scheduler behavior.
///
/// The behavior's closures and the timer tasks both hold an `Arc` of this;
/// the actor system keeps one too, for shutdown and for the `flush` test
/// hook.
pub struct SchedulerState {
    entries: Mutex<HashMap<ScheduleId, ScheduleEntry>>,
    system: SystemHandle,
    clock: SharedClock,
    terminal: AtomicBool,
    weak_self: Weak<SchedulerState>,
}

impl SchedulerState {
    pub fn new(system: SystemHandle, clock: SharedClock) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            entries: Mutex::new(HashMap::new()),
            system,
            clock,
            terminal: AtomicBool::new(false),
            weak_self: weak.clone(),
        })
    }

    /// Register a one-shot entry and arm its timer.
    pub fn schedule_once(&self, command: ScheduleOnce) -> Result<ScheduleId, String> {
        if self.terminal.load(Ordering::Acquire) {
            return Err("scheduler is stopped".to_string());
        }

        let id = ScheduleId::new();
        let fire_at = self.clock.now()
            + chrono::Duration::from_std(command.delay).unwrap_or(chrono::Duration::MAX);

        let state = self.weak_self.clone();
        let system = self.system.clone();
        let target = command.target.clone();
        let message = command.message;
        let delay = command.delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            system.send_from(&target, message, None).await;
            if let Some(state) = state.upgrade() {
                state.complete(id);
            }
        });

        self.entries.lock().insert(
            id,
            ScheduleEntry {
                kind: ScheduleKind::Once,
                target: command.target,
                next_fire_at: fire_at,
                handle,
            },
        );
        debug!(schedule_id = %id, delay_ms = delay.as_millis() as u64, "scheduled once");
        Ok(id)
    }

    /// Register a recurring entry and arm its timer loop.
    pub fn schedule_recurring(&self, command: ScheduleRecurring) -> Result<ScheduleId, String> {
        if self.terminal.load(Ordering::Acquire) {
            return Err("scheduler is stopped".to_string());
        }
        if command.interval.is_zero() {
            return Err("recurring interval must be > 0".to_string());
        }

        let id = ScheduleId::new();
        let interval = command.interval;
        let fire_at = self.clock.now()
            + chrono::Duration::from_std(interval).unwrap_or(chrono::Duration::MAX);

        let state = self.weak_self.clone();
        let system = self.system.clone();
        let target = command.target.clone();
        let message = command.message;
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                system.send_from(&target, message.clone(), None).await;
                match state.upgrade() {
                    Some(state) => state.rearm(id, interval),
                    None => break,
                }
            }
        });

        self.entries.lock().insert(
            id,
            ScheduleEntry {
                kind: ScheduleKind::Recurring,
                target: command.target,
                next_fire_at: fire_at,
                handle,
            },
        );
        debug!(schedule_id = %id, interval_ms = interval.as_millis() as u64, "scheduled recurring");
        Ok(id)
    }

    /// Cancel an entry; an entry that already fired cannot be recalled.
    pub fn cancel(&self, id: ScheduleId) -> bool {
        match self.entries.lock().remove(&id) {
            Some(entry) => {
                entry.handle.abort();
                debug!(schedule_id = %id, "schedule cancelled");
                true
            }
            None => false,
        }
    }

    /// Cancel every entry and refuse further registrations.
    pub fn cleanup(&self) -> usize {
        self.terminal.store(true, Ordering::Release);
        let drained: Vec<ScheduleEntry> = {
            let mut entries = self.entries.lock();
            entries.drain().map(|(_, entry)| entry).collect()
        };
        let count = drained.len();
        for entry in drained {
            entry.handle.abort();
        }
        if count > 0 {
            debug!(cancelled = count, "scheduler cleaned up");
        }
        count
    }

    /// Number of live entries.
    pub fn active_count(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether any entry is due at or before `now` (used by `flush`).
    pub fn has_due_entries(&self, now: DateTime<Utc>) -> bool {
        self.entries
            .lock()
            .values()
            .any(|entry| entry.next_fire_at <= now)
    }

    /// The timer state of an entry, if it is still known.
    pub fn timer_state(&self, id: ScheduleId) -> Option<TimerState> {
        self.entries.lock().get(&id).map(|_| TimerState::Active)
    }

    /// The target of an entry (diagnostics).
    pub fn target_of(&self, id: ScheduleId) -> Option<Address> {
        self.entries.lock().get(&id).map(|entry| entry.target.clone())
    }

    fn complete(&self, id: ScheduleId) {
        if let Some(entry) = self.entries.lock().remove(&id) {
            debug_assert_eq!(entry.kind, ScheduleKind::Once);
        }
    }

    fn rearm(&self, id: ScheduleId, interval: Duration) {
        let next = self.clock.now()
            + chrono::Duration::from_std(interval).unwrap_or(chrono::Duration::MAX);
        if let Some(entry) = self.entries.lock().get_mut(&id) {
            entry.next_fire_at = next;
        }
    }
}

/// Build the scheduler actor's behavior around shared state.
pub fn scheduler_behavior(state: Arc<SchedulerState>) -> Behavior {
    Behavior::stateless(move |params| {
        let state = Arc::clone(&state);
        async move {
            let reply = match params.message.kind() {
                SCHEDULE_ONCE => match params.message.decode::<ScheduleOnce>() {
                    Ok(command) => match state.schedule_once(command) {
                        Ok(schedule_id) => SchedulerReply::Created { schedule_id },
                        Err(reason) => SchedulerReply::Error { reason },
                    },
                    Err(err) => SchedulerReply::Error {
                        reason: err.to_string(),
                    },
                },
                SCHEDULE_RECURRING => match params.message.decode::<ScheduleRecurring>() {
                    Ok(command) => match state.schedule_recurring(command) {
                        Ok(schedule_id) => SchedulerReply::Created { schedule_id },
                        Err(reason) => SchedulerReply::Error { reason },
                    },
                    Err(err) => SchedulerReply::Error {
                        reason: err.to_string(),
                    },
                },
                CANCEL_SCHEDULE => match params.message.decode::<CancelSchedule>() {
                    Ok(command) => {
                        if state.cancel(command.schedule_id) {
                            SchedulerReply::Cancelled {
                                schedule_id: command.schedule_id,
                            }
                        } else {
                            SchedulerReply::Error {
                                reason: format!("unknown schedule: {}", command.schedule_id),
                            }
                        }
                    }
                    Err(err) => SchedulerReply::Error {
                        reason: err.to_string(),
                    },
                },
                CLEANUP => SchedulerReply::CleanedUp {
                    cancelled: state.cleanup(),
                },
                other => {
                    warn!(kind = other, "scheduler received unknown message");
                    return Ok(HandlerResult::unchanged());
                }
            };
            Ok(HandlerResult::reply(reply.to_value()))
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::util::{SystemClock, LOCAL_NODE};

    fn state() -> Arc<SchedulerState> {
        SchedulerState::new(SystemHandle::detached(), Arc::new(SystemClock))
    }

    fn once(delay: Duration) -> ScheduleOnce {
        ScheduleOnce {
            delay,
            target: Address::new(LOCAL_NODE, "worker", "w1"),
            message: Message::new("TICK", json!(null)),
        }
    }

    #[tokio::test]
    async fn test_schedule_once_registers_entry() {
        let state = state();
        let id = state.schedule_once(once(Duration::from_secs(60))).unwrap();

        assert_eq!(state.active_count(), 1);
        assert_eq!(state.timer_state(id), Some(TimerState::Active));
        assert_eq!(
            state.target_of(id).unwrap(),
            Address::new(LOCAL_NODE, "worker", "w1")
        );
    }

    #[tokio::test]
    async fn test_cancel_removes_entry() {
        let state = state();
        let id = state.schedule_once(once(Duration::from_secs(60))).unwrap();

        assert!(state.cancel(id));
        assert_eq!(state.active_count(), 0);
        assert!(!state.cancel(id));
    }

    #[tokio::test]
    async fn test_once_entry_completes_after_firing() {
        let state = state();
        state.schedule_once(once(Duration::from_millis(10))).unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(state.active_count(), 0);
    }

    #[tokio::test]
    async fn test_recurring_requires_positive_interval() {
        let state = state();
        let err = state
            .schedule_recurring(ScheduleRecurring {
                interval: Duration::ZERO,
                target: Address::new(LOCAL_NODE, "worker", "w1"),
                message: Message::of("TICK"),
            })
            .unwrap_err();
        assert!(err.contains("interval"));
    }

    #[tokio::test]
    async fn test_cleanup_goes_terminal() {
        let state = state();
        state.schedule_once(once(Duration::from_secs(60))).unwrap();
        state.schedule_once(once(Duration::from_secs(60))).unwrap();

        assert_eq!(state.cleanup(), 2);
        assert_eq!(state.active_count(), 0);

        let err = state.schedule_once(once(Duration::from_secs(1))).unwrap_err();
        assert!(err.contains("stopped"));
    }

    #[tokio::test]
    async fn test_due_entries_tracking() {
        let state = state();
        state.schedule_once(once(Duration::from_secs(60))).unwrap();
        assert!(!state.has_due_entries(state.clock.now()));
        assert!(state.has_due_entries(
            state.clock.now() + chrono::Duration::seconds(61)
        ));
    }
}
