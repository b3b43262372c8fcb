//! Ask/reply correlation: token minting, pending-reply tracking, timeouts.

pub mod error;
pub mod manager;

pub use error::AskError;
pub use manager::{AskFuture, CorrelationManager};
