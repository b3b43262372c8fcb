//! JSON payload codec.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use bytes::Bytes;
use chrono::Utc;

// Layer 3: Internal module imports
use super::envelope::{WireEnvelope, WireFormat};
use super::{CodecError, MessageCodec};
use crate::message::Message;
use crate::util::Address;

/// The built-in codec: message bodies as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    /// Encode a message into a complete wire envelope.
    pub fn envelope(
        &self,
        message: &Message,
        source: &Address,
        target: &Address,
    ) -> Result<WireEnvelope, CodecError> {
        Ok(WireEnvelope {
            format: self.format(),
            data: Bytes::from(self.encode(message)?),
            source: source.path().to_string(),
            target: target.path().to_string(),
            timestamp: Utc::now().timestamp_millis(),
        })
    }

    /// Decode the message out of a wire envelope.
    pub fn open(&self, envelope: &WireEnvelope) -> Result<Message, CodecError> {
        if envelope.format != self.format() {
            return Err(CodecError::UnsupportedFormat {
                format: envelope.format.to_string(),
            });
        }
        self.decode(&envelope.data)
    }
}

impl MessageCodec for JsonCodec {
    fn format(&self) -> WireFormat {
        WireFormat::Json
    }

    fn encode(&self, message: &Message) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(message).map_err(|err| CodecError::Encode {
            reason: err.to_string(),
        })
    }

    fn decode(&self, data: &[u8]) -> Result<Message, CodecError> {
        serde_json::from_slice(data).map_err(|err| CodecError::Decode {
            reason: err.to_string(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::util::LOCAL_NODE;

    #[test]
    fn test_message_through_envelope_and_frame() {
        let codec = JsonCodec;
        let message = Message::new("TRANSFER", json!({ "amount": 12 }));
        let source = Address::new("node-a", "client", "c1");
        let target = Address::new(LOCAL_NODE, "worker", "w1");

        let envelope = codec.envelope(&message, &source, &target).unwrap();
        assert_eq!(envelope.source, "actor://node-a/client/c1");
        assert_eq!(envelope.format, WireFormat::Json);

        let framed = envelope.to_bytes();
        let parsed = WireEnvelope::from_bytes(&framed).unwrap();
        let opened = codec.open(&parsed).unwrap();
        assert_eq!(opened, message);
    }

    #[test]
    fn test_open_rejects_other_formats() {
        let codec = JsonCodec;
        let envelope = WireEnvelope {
            format: WireFormat::MsgPack,
            data: Bytes::new(),
            source: "actor://local/a/1".into(),
            target: "actor://local/b/2".into(),
            timestamp: 0,
        };
        assert!(matches!(
            codec.open(&envelope),
            Err(CodecError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_decode_garbage_fails() {
        let codec = JsonCodec;
        assert!(matches!(
            codec.decode(b"not json"),
            Err(CodecError::Decode { .. })
        ));
    }
}
