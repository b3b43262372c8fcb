// Layer 1: Standard library imports
use std::fmt::{self, Display};

// Layer 2: Third-party crate imports
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// Layer 3: Internal module imports
// (none)

/// Reserved message kind for reply envelopes travelling through mailboxes.
///
/// A local ask resolves its waiter directly; replies arriving from a
/// transport are wrapped in this kind and handed to the correlation manager
/// by the dispatch loop instead of the actor's handler.
pub const REPLY_KIND: &str = "$reply";

/// Errors from typed encode/decode of message bodies.
#[derive(Debug, Error)]
pub enum MessageError {
    /// The body could not be decoded into the requested type.
    #[error("cannot decode '{kind}' body: {source}")]
    Decode {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    /// The value could not be encoded into a body.
    #[error("cannot encode '{kind}' body: {source}")]
    Encode {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A routable message: a kind tag plus an opaque JSON body.
///
/// # Examples
///
/// ```rust
/// use lattice_rt::message::Message;
/// use serde_json::json;
///
/// let msg = Message::new("INCREMENT", json!({ "value": 1 }));
/// assert_eq!(msg.kind(), "INCREMENT");
/// assert_eq!(msg.body()["value"], 1);
///
/// // Kind-only messages carry a null body.
/// let probe = Message::of("GET_COUNT");
/// assert!(probe.body().is_null());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    kind: String,
    body: Value,
}

impl Message {
    /// Create a message with the given kind and body.
    pub fn new(kind: impl Into<String>, body: Value) -> Self {
        Self {
            kind: kind.into(),
            body,
        }
    }

    /// Create a message with the given kind and a null body.
    pub fn of(kind: impl Into<String>) -> Self {
        Self::new(kind, Value::Null)
    }

    /// Create a message by serializing a typed body.
    pub fn encode<T: Serialize>(kind: impl Into<String>, body: &T) -> Result<Self, MessageError> {
        let kind = kind.into();
        let body = serde_json::to_value(body).map_err(|source| MessageError::Encode {
            kind: kind.clone(),
            source,
        })?;
        Ok(Self { kind, body })
    }

    /// Decode the body into a typed value.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, MessageError> {
        serde_json::from_value(self.body.clone()).map_err(|source| MessageError::Decode {
            kind: self.kind.clone(),
            source,
        })
    }

    /// The kind tag.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The opaque body.
    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Consume the message, returning its body.
    pub fn into_body(self) -> Value {
        self.body
    }

    /// Whether this is a reply envelope for the correlation manager.
    pub fn is_reply(&self) -> bool {
        self.kind == REPLY_KIND
    }

    /// Build a reply envelope body for transports.
    pub fn reply(value: Value) -> Self {
        Self::new(REPLY_KIND, value)
    }
}

impl Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Increment {
        value: i64,
    }

    #[test]
    fn test_new_and_accessors() {
        let msg = Message::new("INCREMENT", json!({ "value": 2 }));
        assert_eq!(msg.kind(), "INCREMENT");
        assert_eq!(msg.body(), &json!({ "value": 2 }));
        assert!(!msg.is_reply());
    }

    #[test]
    fn test_of_has_null_body() {
        let msg = Message::of("GET_COUNT");
        assert!(msg.body().is_null());
    }

    #[test]
    fn test_typed_encode_decode() {
        let msg = Message::encode("INCREMENT", &Increment { value: 7 }).unwrap();
        let body: Increment = msg.decode().unwrap();
        assert_eq!(body, Increment { value: 7 });
    }

    #[test]
    fn test_decode_mismatch_is_an_error() {
        let msg = Message::new("INCREMENT", json!("not-an-object"));
        let result: Result<Increment, _> = msg.decode();
        assert!(matches!(result, Err(MessageError::Decode { .. })));
    }

    #[test]
    fn test_reply_kind_is_reserved() {
        let reply = Message::reply(json!({ "count": 1 }));
        assert!(reply.is_reply());
        assert_eq!(reply.kind(), REPLY_KIND);
    }

    #[test]
    fn test_serde_round_trip() {
        let msg = Message::new("PING", json!({ "seq": 3 }));
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }
}
