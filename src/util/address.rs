//! Logical actor addresses.
//!
//! An [`Address`] is the stable identity of an actor: it survives restarts and
//! is the key used for routing, directory registration, and supervision
//! assignment. Equality and hashing are by canonical `path` only.

// Layer 1: Standard library imports
use std::fmt::{self, Display};
use std::hash::{Hash, Hasher};

// Layer 2: Third-party crate imports
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use uuid::Uuid;

// Layer 3: Internal module imports
// (none)

/// Sentinel node name for addresses that have no cluster placement.
pub const LOCAL_NODE: &str = "local";

/// URI scheme prefix shared by every actor path.
const PATH_SCHEME: &str = "actor://";

/// Errors produced while parsing an actor path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// The path did not start with the `actor://` scheme.
    #[error("invalid actor path '{path}': missing actor:// scheme")]
    MissingScheme { path: String },

    /// The path did not contain the `<node>/<type>/<id>` triple.
    #[error("invalid actor path '{path}': expected actor://<node>/<type>/<id>")]
    MalformedPath { path: String },

    /// A path segment was empty.
    #[error("invalid actor path '{path}': empty {segment} segment")]
    EmptySegment { path: String, segment: &'static str },
}

/// Stable logical identity of an actor.
///
/// The canonical form is the path `actor://<node>/<type>/<id>`. Two addresses
/// are equal exactly when their paths are equal; `node`, `actor_type`, and
/// `id` are the parsed projection of that path.
///
/// # Examples
///
/// ```rust
/// use lattice_rt::util::{Address, LOCAL_NODE};
///
/// let addr = Address::new(LOCAL_NODE, "counter", "counter-1");
/// assert_eq!(addr.path(), "actor://local/counter/counter-1");
/// assert!(addr.is_local());
///
/// let parsed = Address::parse("actor://local/counter/counter-1").unwrap();
/// assert_eq!(parsed, addr);
/// ```
#[derive(Debug, Clone)]
pub struct Address {
    id: String,
    actor_type: String,
    node: String,
    path: String,
}

impl Address {
    /// Build an address from its components, deriving the canonical path.
    pub fn new(
        node: impl Into<String>,
        actor_type: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        let node = node.into();
        let actor_type = actor_type.into();
        let id = id.into();
        let path = format!("{PATH_SCHEME}{node}/{actor_type}/{id}");
        Self {
            id,
            actor_type,
            node,
            path,
        }
    }

    /// Build an address with a freshly generated id on the given node.
    ///
    /// The id is `<type>-<uuid>`, which keeps generated ids readable in logs.
    pub fn generate(node: impl Into<String>, actor_type: impl Into<String>) -> Self {
        let actor_type = actor_type.into();
        let id = format!("{}-{}", actor_type, Uuid::new_v4());
        Self::new(node, actor_type, id)
    }

    /// Parse a canonical `actor://<node>/<type>/<id>` path.
    ///
    /// The id segment may itself contain `/`; only the first two separators
    /// are structural.
    pub fn parse(path: &str) -> Result<Self, AddressError> {
        let rest = path
            .strip_prefix(PATH_SCHEME)
            .ok_or_else(|| AddressError::MissingScheme {
                path: path.to_string(),
            })?;

        if rest.matches('/').count() < 2 {
            return Err(AddressError::MalformedPath {
                path: path.to_string(),
            });
        }

        let mut parts = rest.splitn(3, '/');
        let node = parts.next().unwrap_or_default();
        let actor_type = parts.next().unwrap_or_default();
        let id = parts.next().unwrap_or_default();

        for (segment, value) in [("node", node), ("type", actor_type), ("id", id)] {
            if value.is_empty() {
                return Err(AddressError::EmptySegment {
                    path: path.to_string(),
                    segment,
                });
            }
        }

        Ok(Self::new(node, actor_type, id))
    }

    /// The actor id segment.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The actor type segment.
    pub fn actor_type(&self) -> &str {
        &self.actor_type
    }

    /// The node segment; [`LOCAL_NODE`] means "no cluster placement".
    pub fn node(&self) -> &str {
        &self.node
    }

    /// The canonical path; this is the identity of the address.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the address carries the unset node sentinel.
    pub fn is_local(&self) -> bool {
        self.node == LOCAL_NODE
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for Address {}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)
    }
}

// Addresses travel on the wire as their bare path string.
impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.path)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let path = String::deserialize(deserializer)?;
        Self::parse(&path).map_err(D::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_builds_canonical_path() {
        let addr = Address::new("node-a", "worker", "w1");
        assert_eq!(addr.path(), "actor://node-a/worker/w1");
        assert_eq!(addr.node(), "node-a");
        assert_eq!(addr.actor_type(), "worker");
        assert_eq!(addr.id(), "w1");
        assert!(!addr.is_local());
    }

    #[test]
    fn test_parse_round_trip() {
        let addr = Address::new(LOCAL_NODE, "counter", "counter-7");
        let parsed = Address::parse(addr.path()).unwrap();
        assert_eq!(parsed, addr);
        assert_eq!(parsed.actor_type(), "counter");
    }

    #[test]
    fn test_parse_rejects_missing_scheme() {
        let err = Address::parse("local/worker/w1").unwrap_err();
        assert!(matches!(err, AddressError::MissingScheme { .. }));
    }

    #[test]
    fn test_parse_rejects_partial_path() {
        assert!(Address::parse("actor://local/worker").is_err());
        assert!(Address::parse("actor://local").is_err());
        assert!(Address::parse("actor://").is_err());
    }

    #[test]
    fn test_parse_rejects_empty_segment() {
        let err = Address::parse("actor://local//w1").unwrap_err();
        assert!(matches!(
            err,
            AddressError::EmptySegment { segment: "type", .. }
        ));
    }

    #[test]
    fn test_id_may_contain_slashes() {
        let addr = Address::parse("actor://local/tree/a/b/c").unwrap();
        assert_eq!(addr.id(), "a/b/c");
    }

    #[test]
    fn test_equality_is_by_path_only() {
        let a = Address::new(LOCAL_NODE, "worker", "w1");
        let b = Address::parse("actor://local/worker/w1").unwrap();
        assert_eq!(a, b);

        let c = Address::new(LOCAL_NODE, "worker", "w2");
        assert_ne!(a, c);
    }

    #[test]
    fn test_generate_is_unique() {
        let a = Address::generate(LOCAL_NODE, "worker");
        let b = Address::generate(LOCAL_NODE, "worker");
        assert_ne!(a, b);
        assert!(a.id().starts_with("worker-"));
    }

    #[test]
    fn test_serde_as_path_string() {
        let addr = Address::new(LOCAL_NODE, "worker", "w1");
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"actor://local/worker/w1\"");

        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn test_deserialize_rejects_garbage() {
        let result: Result<Address, _> = serde_json::from_str("\"not-a-path\"");
        assert!(result.is_err());
    }
}
