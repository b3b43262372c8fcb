//! Bounded per-actor mailboxes with configurable overflow handling.

pub mod bounded;
pub mod policy;

pub use bounded::{EnqueueOutcome, Mailbox};
pub use policy::{EnqueueVerdict, OverflowPolicy};
