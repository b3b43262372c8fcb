//! The scheduler actor: the system's only source of delayed and periodic
//! messages.

pub mod actor;
pub mod messages;

pub use actor::{
    scheduler_behavior, ScheduleKind, SchedulerState, TimerState, SCHEDULER_ACTOR_ID,
    SCHEDULER_ACTOR_TYPE,
};
pub use messages::{
    CancelSchedule, ScheduleOnce, ScheduleRecurring, SchedulerReply, CANCEL_SCHEDULE, CLEANUP,
    SCHEDULE_ONCE, SCHEDULE_RECURRING,
};
