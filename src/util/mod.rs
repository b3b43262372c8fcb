//! Shared utilities: addresses, typed identifiers, the clock seam, and
//! serde helpers.

pub mod address;
pub mod clock;
pub mod ids;
pub mod serde_helpers;

pub use address::{Address, AddressError, LOCAL_NODE};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use ids::{CorrelationId, ScheduleId, SupervisorId};
