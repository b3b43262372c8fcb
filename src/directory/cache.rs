//! Derived location cache with ttl freshness and LRU eviction.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

// Layer 3: Internal module imports
use crate::util::{Address, SharedClock};

/// One cached resolution, with the access bookkeeping eviction needs.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub address: Address,
    pub location: String,
    pub cached_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub hits: u64,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// A hit requires the entry to still be within its ttl.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now <= self.expires_at
    }
}

/// Snapshot of cache effectiveness.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DirectoryStats {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub max_size: usize,
}

/// Bounded path-keyed cache.
///
/// Eviction is by ascending `last_accessed` and happens before insertion, so
/// the map never exceeds `max_size`. Hit/miss counters are monotonic; a
/// lookup counts as a hit only when served fresh from here — the owning
/// directory records the miss for every other outcome, so each lookup counts
/// exactly once.
pub struct LocationCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    max_size: usize,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    clock: SharedClock,
}

impl LocationCache {
    /// Create a cache bounded to `max_size` entries with the given ttl.
    pub fn new(max_size: usize, ttl: Duration, clock: SharedClock) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_size: max_size.max(1),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            clock,
        }
    }

    /// Serve a fresh entry, recording the hit; expired entries are dropped
    /// and read as absent.
    pub fn get_fresh(&self, path: &str) -> Option<String> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        match entries.get_mut(path) {
            Some(entry) if entry.is_fresh(now) => {
                entry.last_accessed = now;
                entry.hits += 1;
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.location.clone())
            }
            Some(_) => {
                entries.remove(path);
                None
            }
            None => None,
        }
    }

    /// Record a lookup that the cache did not serve.
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Cache a resolution, evicting least-recently-accessed entries first
    /// when at capacity.
    pub fn insert(&self, address: Address, location: impl Into<String>) {
        let now = self.clock.now();
        let path = address.path().to_string();
        let entry = CacheEntry {
            address,
            location: location.into(),
            cached_at: now,
            last_accessed: now,
            hits: 0,
            expires_at: now
                + chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX),
        };

        let mut entries = self.entries.lock();
        while entries.len() >= self.max_size && !entries.contains_key(&path) {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.last_accessed)
                .map(|(p, _)| p.clone());
            match oldest {
                Some(victim) => {
                    entries.remove(&victim);
                }
                None => break,
            }
        }
        entries.insert(path, entry);
    }

    /// Remove the entry for a path.
    pub fn remove(&self, path: &str) -> Option<CacheEntry> {
        self.entries.lock().remove(path)
    }

    /// All fresh entries.
    pub fn fresh_entries(&self) -> Vec<CacheEntry> {
        let now = self.clock.now();
        self.entries
            .lock()
            .values()
            .filter(|entry| entry.is_fresh(now))
            .cloned()
            .collect()
    }

    /// Remove every expired entry; returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(now));
        before - entries.len()
    }

    /// Number of entries, including not-yet-swept expired ones.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry. Counters are preserved.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Effectiveness snapshot.
    pub fn stats(&self) -> DirectoryStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        DirectoryStats {
            size: self.len(),
            hits,
            misses,
            hit_rate: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
            max_size: self.max_size,
        }
    }
}
