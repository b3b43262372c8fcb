//! The fixed wire envelope and its length-prefixed framing.
//!
//! Frame layout, all integers big-endian:
//!
//! ```text
//! [u32 frame length (bytes after this field)]
//! [u8  format tag]
//! [u32 source length][source path bytes]
//! [u32 target length][target path bytes]
//! [i64 timestamp, unix millis]
//! [u32 data length][data bytes]
//! ```

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use bytes::{Buf, BufMut, Bytes, BytesMut};

// Layer 3: Internal module imports
use super::CodecError;

/// Payload formats an envelope may declare.
///
/// `MsgPack` is reserved for a plug-in codec; the crate ships JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    Json,
    MsgPack,
}

impl WireFormat {
    /// The format's name as it appears in diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::MsgPack => "msgpack",
        }
    }

    fn tag(&self) -> u8 {
        match self {
            Self::Json => 0,
            Self::MsgPack => 1,
        }
    }

    fn from_tag(tag: u8) -> Result<Self, CodecError> {
        match tag {
            0 => Ok(Self::Json),
            1 => Ok(Self::MsgPack),
            other => Err(CodecError::UnsupportedFormat {
                format: format!("tag {other}"),
            }),
        }
    }
}

impl std::fmt::Display for WireFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One framed message in flight between nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct WireEnvelope {
    pub format: WireFormat,
    pub data: Bytes,
    pub source: String,
    pub target: String,
    /// Unix milliseconds at encode time.
    pub timestamp: i64,
}

impl WireEnvelope {
    /// Serialize into a length-prefixed frame.
    pub fn to_bytes(&self) -> Bytes {
        let body_len = 1
            + 4
            + self.source.len()
            + 4
            + self.target.len()
            + 8
            + 4
            + self.data.len();
        let mut buf = BytesMut::with_capacity(4 + body_len);
        buf.put_u32(body_len as u32);
        buf.put_u8(self.format.tag());
        buf.put_u32(self.source.len() as u32);
        buf.put_slice(self.source.as_bytes());
        buf.put_u32(self.target.len() as u32);
        buf.put_slice(self.target.as_bytes());
        buf.put_i64(self.timestamp);
        buf.put_u32(self.data.len() as u32);
        buf.put_slice(&self.data);
        buf.freeze()
    }

    /// Parse one frame; the input must contain the whole frame.
    pub fn from_bytes(input: &[u8]) -> Result<Self, CodecError> {
        let mut buf = input;
        if buf.remaining() < 4 {
            return Err(CodecError::Frame {
                reason: "missing length prefix".into(),
            });
        }
        let body_len = buf.get_u32() as usize;
        if buf.remaining() < body_len {
            return Err(CodecError::Frame {
                reason: format!(
                    "frame declares {body_len} bytes but only {} remain",
                    buf.remaining()
                ),
            });
        }

        if buf.remaining() < 1 {
            return Err(CodecError::Frame {
                reason: "missing format tag".into(),
            });
        }
        let format = WireFormat::from_tag(buf.get_u8())?;
        let source = read_string(&mut buf, "source")?;
        let target = read_string(&mut buf, "target")?;
        if buf.remaining() < 8 {
            return Err(CodecError::Frame {
                reason: "missing timestamp".into(),
            });
        }
        let timestamp = buf.get_i64();
        let data = read_bytes(&mut buf, "data")?;

        Ok(Self {
            format,
            data,
            source,
            target,
            timestamp,
        })
    }
}

fn read_bytes(buf: &mut &[u8], field: &str) -> Result<Bytes, CodecError> {
    if buf.remaining() < 4 {
        return Err(CodecError::Frame {
            reason: format!("missing {field} length"),
        });
    }
    let len = buf.get_u32() as usize;
    if buf.remaining() < len {
        return Err(CodecError::Frame {
            reason: format!("truncated {field}"),
        });
    }
    let bytes = Bytes::copy_from_slice(&buf[..len]);
    buf.advance(len);
    Ok(bytes)
}

fn read_string(buf: &mut &[u8], field: &str) -> Result<String, CodecError> {
    let bytes = read_bytes(buf, field)?;
    String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::Frame {
        reason: format!("{field} is not valid utf-8"),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn envelope() -> WireEnvelope {
        WireEnvelope {
            format: WireFormat::Json,
            data: Bytes::from_static(b"{\"kind\":\"PING\",\"body\":null}"),
            source: "actor://node-a/client/c1".into(),
            target: "actor://node-b/worker/w1".into(),
            timestamp: 1_722_470_400_000,
        }
    }

    #[test]
    fn test_frame_round_trip() {
        let original = envelope();
        let bytes = original.to_bytes();
        let parsed = WireEnvelope::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_length_prefix_covers_body() {
        let bytes = envelope().to_bytes();
        let declared = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        assert_eq!(declared, bytes.len() - 4);
    }

    #[test]
    fn test_truncated_frame_is_rejected() {
        let bytes = envelope().to_bytes();
        let err = WireEnvelope::from_bytes(&bytes[..bytes.len() - 3]).unwrap_err();
        assert!(matches!(err, CodecError::Frame { .. }));
    }

    #[test]
    fn test_unknown_format_tag_is_rejected() {
        let mut bytes = BytesMut::from(&envelope().to_bytes()[..]);
        bytes[4] = 9; // format tag sits right after the length prefix
        let err = WireEnvelope::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_empty_data_is_valid() {
        let mut env = envelope();
        env.data = Bytes::new();
        let parsed = WireEnvelope::from_bytes(&env.to_bytes()).unwrap();
        assert!(parsed.data.is_empty());
    }
}
