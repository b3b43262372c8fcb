//! Command and reply messages understood by the scheduler actor.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use crate::message::Message;
use crate::util::serde_helpers::duration_millis;
use crate::util::{Address, ScheduleId};

/// Message kind: schedule a one-shot delivery.
pub const SCHEDULE_ONCE: &str = "scheduler.scheduleOnce";

/// Message kind: schedule a periodic delivery.
pub const SCHEDULE_RECURRING: &str = "scheduler.scheduleRecurring";

/// Message kind: cancel a schedule entry.
pub const CANCEL_SCHEDULE: &str = "scheduler.cancel";

/// Message kind: cancel everything and go terminal (system shutdown).
pub const CLEANUP: &str = "scheduler.cleanup";

/// Deliver `message` to `target` once, after `delay`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleOnce {
    #[serde(with = "duration_millis")]
    pub delay: Duration,
    pub target: Address,
    pub message: Message,
}

/// Deliver `message` to `target` every `interval`.
///
/// The next tick is armed when the previous one fires, so a slow delivery
/// shifts subsequent ticks rather than bunching them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRecurring {
    #[serde(with = "duration_millis")]
    pub interval: Duration,
    pub target: Address,
    pub message: Message,
}

/// Cancel the entry with this id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelSchedule {
    pub schedule_id: ScheduleId,
}

/// Replies the scheduler actor produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SchedulerReply {
    Created { schedule_id: ScheduleId },
    Cancelled { schedule_id: ScheduleId },
    CleanedUp { cancelled: usize },
    Error { reason: String },
}

impl SchedulerReply {
    /// Wrap the reply for transport in a message body.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::util::LOCAL_NODE;
    use serde_json::json;

    #[test]
    fn test_schedule_once_round_trips_through_a_message() {
        let cmd = ScheduleOnce {
            delay: Duration::from_millis(100),
            target: Address::new(LOCAL_NODE, "worker", "w1"),
            message: Message::new("TICK", json!({ "n": 1 })),
        };

        let msg = Message::encode(SCHEDULE_ONCE, &cmd).unwrap();
        assert_eq!(msg.kind(), SCHEDULE_ONCE);

        let back: ScheduleOnce = msg.decode().unwrap();
        assert_eq!(back.delay, Duration::from_millis(100));
        assert_eq!(back.target, cmd.target);
        assert_eq!(back.message, cmd.message);
    }

    #[test]
    fn test_reply_serialization_shape() {
        let id = ScheduleId::new();
        let value = SchedulerReply::Created { schedule_id: id }.to_value();
        assert_eq!(value["status"], "created");
        assert!(value["schedule_id"].is_string());

        let back: SchedulerReply = serde_json::from_value(value).unwrap();
        assert_eq!(back, SchedulerReply::Created { schedule_id: id });
    }
}
