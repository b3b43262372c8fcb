//! Authoritative address→location records.
//!
//! The registry is the source of truth for where an actor lives. Entries
//! expire: a record past its ttl is invisible to reads even before the
//! sweeper removes it.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use dashmap::DashMap;

// Layer 3: Internal module imports
use crate::util::{Address, SharedClock};

/// One authoritative record: the actor at `address` resides at `location`.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryEntry {
    pub address: Address,
    pub location: String,
    pub registered_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl RegistryEntry {
    /// Whether the record is past its ttl at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Concurrent path-keyed registry.
///
/// Keys are canonical address paths; reads and writes are lock-free under
/// `DashMap`, so registration never contends with the hot lookup path.
pub struct Registry {
    entries: DashMap<String, RegistryEntry>,
    ttl: Duration,
    clock: SharedClock,
}

impl Registry {
    /// Create a registry whose entries live for `ttl`.
    pub fn new(ttl: Duration, clock: SharedClock) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            clock,
        }
    }

    /// Write (or refresh) the record for an address.
    pub fn insert(&self, address: Address, location: impl Into<String>) -> RegistryEntry {
        let now = self.clock.now();
        let expires_at =
            now + chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX);
        let entry = RegistryEntry {
            address: address.clone(),
            location: location.into(),
            registered_at: now,
            expires_at,
        };
        self.entries.insert(address.path().to_string(), entry.clone());
        entry
    }

    /// Remove the record for a path; returns it if present.
    pub fn remove(&self, path: &str) -> Option<RegistryEntry> {
        self.entries.remove(path).map(|(_, entry)| entry)
    }

    /// Read the live record for a path; expired records read as absent.
    pub fn get(&self, path: &str) -> Option<RegistryEntry> {
        let now = self.clock.now();
        self.entries
            .get(path)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.clone())
    }

    /// All live records.
    pub fn all(&self) -> Vec<RegistryEntry> {
        let now = self.clock.now();
        self.entries
            .iter()
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.clone())
            .collect()
    }

    /// All live records for a given actor type.
    pub fn by_type(&self, actor_type: &str) -> Vec<RegistryEntry> {
        let now = self.clock.now();
        self.entries
            .iter()
            .filter(|entry| !entry.is_expired(now))
            .filter(|entry| entry.address.actor_type() == actor_type)
            .map(|entry| entry.clone())
            .collect()
    }

    /// Remove every expired record; returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before - self.entries.len()
    }

    /// Number of records, including not-yet-swept expired ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every record.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::util::{ManualClock, LOCAL_NODE};

    fn registry_with_clock(ttl: Duration) -> (Registry, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let registry = Registry::new(ttl, Arc::clone(&clock) as SharedClock);
        (registry, clock)
    }

    fn addr(id: &str) -> Address {
        Address::new(LOCAL_NODE, "worker", id)
    }

    #[test]
    fn test_insert_and_get() {
        let (registry, _clock) = registry_with_clock(Duration::from_secs(300));
        registry.insert(addr("w1"), "local://local");

        let entry = registry.get("actor://local/worker/w1").unwrap();
        assert_eq!(entry.location, "local://local");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_expired_entry_reads_as_absent() {
        let (registry, clock) = registry_with_clock(Duration::from_millis(50));
        registry.insert(addr("w1"), "local://local");

        clock.advance(Duration::from_millis(100));
        assert!(registry.get("actor://local/worker/w1").is_none());
        // Still physically present until swept.
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_sweep_removes_expired() {
        let (registry, clock) = registry_with_clock(Duration::from_millis(50));
        registry.insert(addr("w1"), "loc1");
        clock.advance(Duration::from_millis(100));
        registry.insert(addr("w2"), "loc2");

        assert_eq!(registry.sweep_expired(), 1);
        assert_eq!(registry.len(), 1);
        assert!(registry.get("actor://local/worker/w2").is_some());
    }

    #[test]
    fn test_remove_is_immediate() {
        let (registry, _clock) = registry_with_clock(Duration::from_secs(300));
        registry.insert(addr("w1"), "loc1");
        assert!(registry.remove("actor://local/worker/w1").is_some());
        assert!(registry.get("actor://local/worker/w1").is_none());
        assert!(registry.remove("actor://local/worker/w1").is_none());
    }

    #[test]
    fn test_by_type_filters() {
        let (registry, _clock) = registry_with_clock(Duration::from_secs(300));
        registry.insert(Address::new(LOCAL_NODE, "worker", "w1"), "loc1");
        registry.insert(Address::new(LOCAL_NODE, "worker", "w2"), "loc2");
        registry.insert(Address::new(LOCAL_NODE, "counter", "c1"), "loc3");

        assert_eq!(registry.by_type("worker").len(), 2);
        assert_eq!(registry.by_type("counter").len(), 1);
        assert_eq!(registry.by_type("missing").len(), 0);
        assert_eq!(registry.all().len(), 3);
    }

    #[test]
    fn test_reinsert_refreshes_ttl() {
        let (registry, clock) = registry_with_clock(Duration::from_millis(100));
        registry.insert(addr("w1"), "loc1");
        clock.advance(Duration::from_millis(60));
        registry.insert(addr("w1"), "loc1");
        clock.advance(Duration::from_millis(60));

        // 120ms after the first insert but only 60ms after the refresh.
        assert!(registry.get("actor://local/worker/w1").is_some());
    }
}
