//! Wire codec for messages crossing a node boundary.
//!
//! Local delivery never touches this module; it exists for the broadcast
//! hook and future transports. The envelope shape and the length-prefixed
//! framing are fixed; the payload format is a plug-in choice.

pub mod envelope;
pub mod json;

pub use envelope::{WireEnvelope, WireFormat};
pub use json::JsonCodec;

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
use crate::message::Message;

/// Errors from encoding or decoding wire traffic.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The payload could not be serialized.
    #[error("encode failed: {reason}")]
    Encode { reason: String },

    /// The payload could not be deserialized.
    #[error("decode failed: {reason}")]
    Decode { reason: String },

    /// A frame was truncated or structurally invalid.
    #[error("malformed frame: {reason}")]
    Frame { reason: String },

    /// The frame declared a format this codec does not handle.
    #[error("unsupported wire format: {format}")]
    UnsupportedFormat { format: String },
}

/// A payload codec: turns messages into bytes and back.
pub trait MessageCodec: Send + Sync + 'static {
    /// The format tag this codec stamps into envelopes.
    fn format(&self) -> WireFormat;

    /// Serialize a message body.
    fn encode(&self, message: &Message) -> Result<Vec<u8>, CodecError>;

    /// Deserialize a message body.
    fn decode(&self, data: &[u8]) -> Result<Message, CodecError>;
}
