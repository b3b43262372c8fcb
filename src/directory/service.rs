//! The directory facade: cache-first resolution over the authoritative
//! registry, subscriber notifications, and peer broadcast.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::error::Error as StdError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

// Layer 2: Third-party crate imports
use parking_lot::Mutex;
use tracing::{debug, warn};

// Layer 3: Internal module imports
use super::broadcast::BroadcastHook;
use super::cache::{DirectoryStats, LocationCache};
use super::registry::{Registry, RegistryEntry};
use crate::util::{Address, SharedClock};

/// Notification delivered to directory subscribers.
#[derive(Debug, Clone)]
pub enum DirectoryEvent {
    Registered { address: Address, location: String },
    Unregistered { address: Address },
}

/// A resolvable record, from either the registry or the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryRecord {
    pub address: Address,
    pub location: String,
}

/// Subscriber callback. A returned error is logged and swallowed; it never
/// affects the operation that triggered the notification or other
/// subscribers.
pub type DirectoryListener =
    Box<dyn Fn(&DirectoryEvent) -> Result<(), Box<dyn StdError + Send + Sync>> + Send + Sync>;

type ListenerMap = Mutex<HashMap<u64, DirectoryListener>>;

/// Handle returned by [`Directory::subscribe`]; call [`unsubscribe`] to stop
/// receiving events.
///
/// [`unsubscribe`]: DirectorySubscription::unsubscribe
pub struct DirectorySubscription {
    id: u64,
    listeners: Weak<ListenerMap>,
}

impl DirectorySubscription {
    /// Remove the listener this handle refers to.
    pub fn unsubscribe(self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.lock().remove(&self.id);
        }
    }
}

/// Address→location directory with a TTL-bounded cache.
///
/// Resolution order: cache (fresh entries only), then registry, then the
/// peer broadcast hook. Anything resolved outside the cache is cached on the
/// way out, evicting least-recently-accessed entries when full.
pub struct Directory {
    registry: Registry,
    cache: LocationCache,
    broadcast: Arc<dyn BroadcastHook>,
    listeners: Arc<ListenerMap>,
    listener_seq: AtomicU64,
}

impl Directory {
    /// Create a directory.
    ///
    /// `cache_ttl` bounds both registry records and cache entries;
    /// `max_cache_size` bounds cache memory.
    pub fn new(
        cache_ttl: Duration,
        max_cache_size: usize,
        broadcast: Arc<dyn BroadcastHook>,
        clock: SharedClock,
    ) -> Self {
        Self {
            registry: Registry::new(cache_ttl, Arc::clone(&clock)),
            cache: LocationCache::new(max_cache_size, cache_ttl, clock),
            broadcast,
            listeners: Arc::new(Mutex::new(HashMap::new())),
            listener_seq: AtomicU64::new(0),
        }
    }

    /// Record that `address` resides at `location`.
    ///
    /// Subscribers are notified and peers told fire-and-forget; a failing
    /// broadcast degrades resolution to local-only but never fails the
    /// registration.
    pub fn register(&self, address: Address, location: impl Into<String>) {
        let location = location.into();
        self.registry.insert(address.clone(), location.clone());
        debug!(path = address.path(), %location, "directory register");

        self.notify(&DirectoryEvent::Registered {
            address: address.clone(),
            location: location.clone(),
        });

        let hook = Arc::clone(&self.broadcast);
        tokio::spawn(async move {
            if let Err(err) = hook.broadcast_register(&address, &location).await {
                warn!(path = address.path(), %err, "register broadcast failed");
            }
        });
    }

    /// Remove the records for `address` from registry and cache.
    pub fn unregister(&self, address: &Address) {
        self.registry.remove(address.path());
        self.cache.remove(address.path());
        debug!(path = address.path(), "directory unregister");

        self.notify(&DirectoryEvent::Unregistered {
            address: address.clone(),
        });

        let hook = Arc::clone(&self.broadcast);
        let address = address.clone();
        tokio::spawn(async move {
            if let Err(err) = hook.broadcast_unregister(&address).await {
                warn!(path = address.path(), %err, "unregister broadcast failed");
            }
        });
    }

    /// Refresh the authoritative record's ttl without notifying subscribers
    /// or peers. Used by the owning system's lease renewal so live local
    /// actors stay resolvable while stale records still age out.
    pub fn refresh(&self, address: Address, location: impl Into<String>) {
        self.registry.insert(address, location);
    }

    /// Resolve an address to its location.
    ///
    /// Counts as a cache hit only when served fresh from the cache; every
    /// other outcome (registry, broadcast, or not found) counts as a miss.
    pub async fn lookup(&self, address: &Address) -> Option<String> {
        let path = address.path();
        if let Some(location) = self.cache.get_fresh(path) {
            return Some(location);
        }
        self.cache.record_miss();

        if let Some(entry) = self.registry.get(path) {
            self.cache.insert(entry.address.clone(), entry.location.clone());
            return Some(entry.location);
        }

        if let Some(location) = self.broadcast.broadcast_lookup(address).await {
            self.cache.insert(address.clone(), location.clone());
            return Some(location);
        }

        None
    }

    /// All live records of a given actor type (registry and cache union,
    /// registry winning on duplicate paths).
    pub fn list_by_type(&self, actor_type: &str) -> Vec<DirectoryRecord> {
        let mut seen: HashMap<String, DirectoryRecord> = HashMap::new();
        for entry in self.registry.by_type(actor_type) {
            seen.insert(
                entry.address.path().to_string(),
                DirectoryRecord {
                    address: entry.address,
                    location: entry.location,
                },
            );
        }
        for entry in self.cache.fresh_entries() {
            if entry.address.actor_type() == actor_type {
                seen.entry(entry.address.path().to_string())
                    .or_insert(DirectoryRecord {
                        address: entry.address,
                        location: entry.location,
                    });
            }
        }
        seen.into_values().collect()
    }

    /// All live records (registry and cache union).
    pub fn get_all(&self) -> Vec<DirectoryRecord> {
        let mut seen: HashMap<String, DirectoryRecord> = HashMap::new();
        for entry in self.registry.all() {
            seen.insert(
                entry.address.path().to_string(),
                DirectoryRecord {
                    address: entry.address,
                    location: entry.location,
                },
            );
        }
        for entry in self.cache.fresh_entries() {
            seen.entry(entry.address.path().to_string())
                .or_insert(DirectoryRecord {
                    address: entry.address,
                    location: entry.location,
                });
        }
        seen.into_values().collect()
    }

    /// Register a subscriber; the handle unsubscribes.
    pub fn subscribe(&self, listener: DirectoryListener) -> DirectorySubscription {
        let id = self.listener_seq.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().insert(id, listener);
        DirectorySubscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Cache effectiveness snapshot.
    pub fn stats(&self) -> DirectoryStats {
        self.cache.stats()
    }

    /// The authoritative record for a path, if live. Mainly for tests and
    /// diagnostics; routing goes through [`lookup`](Self::lookup).
    pub fn registry_entry(&self, path: &str) -> Option<RegistryEntry> {
        self.registry.get(path)
    }

    /// Number of registry records (including not-yet-swept expired ones).
    pub fn registry_len(&self) -> usize {
        self.registry.len()
    }

    /// Number of cache entries (including not-yet-swept expired ones).
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Remove expired records from both registry and cache.
    ///
    /// Returns `(registry_removed, cache_removed)`. Driven by the scheduler
    /// at the configured cleanup interval.
    pub fn sweep_expired(&self) -> (usize, usize) {
        (self.registry.sweep_expired(), self.cache.sweep_expired())
    }

    /// Drop all records and subscribers. Called during system teardown.
    pub fn teardown(&self) {
        self.listeners.lock().clear();
        self.cache.clear();
        self.registry.clear();
    }

    fn notify(&self, event: &DirectoryEvent) {
        let listeners = self.listeners.lock();
        for (id, listener) in listeners.iter() {
            if let Err(err) = listener(event) {
                warn!(listener = id, %err, "directory subscriber failed; continuing");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;

    use super::*;
    use crate::directory::broadcast::NoopBroadcast;
    use crate::directory::error::BroadcastError;
    use crate::util::{ManualClock, SystemClock, LOCAL_NODE};

    fn directory() -> Directory {
        Directory::new(
            Duration::from_secs(300),
            16,
            Arc::new(NoopBroadcast),
            Arc::new(SystemClock),
        )
    }

    fn addr(id: &str) -> Address {
        Address::new(LOCAL_NODE, "worker", id)
    }

    #[tokio::test]
    async fn test_register_then_lookup() {
        let directory = directory();
        directory.register(addr("w1"), "local://local");

        // First lookup fills the cache (a miss), second is a hit.
        assert_eq!(
            directory.lookup(&addr("w1")).await.unwrap(),
            "local://local"
        );
        assert_eq!(
            directory.lookup(&addr("w1")).await.unwrap(),
            "local://local"
        );

        let stats = directory.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_unregister_removes_immediately() {
        let directory = directory();
        directory.register(addr("w1"), "loc1");
        let _ = directory.lookup(&addr("w1")).await;

        directory.unregister(&addr("w1"));
        assert!(directory.lookup(&addr("w1")).await.is_none());
        assert_eq!(directory.cache_len(), 0);
    }

    #[tokio::test]
    async fn test_lookup_past_ttl_returns_none() {
        let clock = Arc::new(ManualClock::default());
        let directory = Directory::new(
            Duration::from_millis(50),
            16,
            Arc::new(NoopBroadcast),
            Arc::clone(&clock) as SharedClock,
        );

        directory.register(addr("w1"), "loc1");
        assert!(directory.lookup(&addr("w1")).await.is_some());

        clock.advance(Duration::from_millis(100));
        assert!(directory.lookup(&addr("w1")).await.is_none());
    }

    #[tokio::test]
    async fn test_broadcast_lookup_fills_cache() {
        struct PeerHook;

        #[async_trait]
        impl BroadcastHook for PeerHook {
            async fn broadcast_register(
                &self,
                _address: &Address,
                _location: &str,
            ) -> Result<(), BroadcastError> {
                Ok(())
            }

            async fn broadcast_unregister(
                &self,
                _address: &Address,
            ) -> Result<(), BroadcastError> {
                Ok(())
            }

            async fn broadcast_lookup(&self, _address: &Address) -> Option<String> {
                Some("node://peer-1".into())
            }
        }

        let directory = Directory::new(
            Duration::from_secs(300),
            16,
            Arc::new(PeerHook),
            Arc::new(SystemClock),
        );

        let remote = Address::new("peer-1", "worker", "w9");
        assert_eq!(
            directory.lookup(&remote).await.unwrap(),
            "node://peer-1"
        );
        // Second resolution is served locally.
        assert_eq!(directory.stats().misses, 1);
        let _ = directory.lookup(&remote).await;
        assert_eq!(directory.stats().hits, 1);
    }

    #[tokio::test]
    async fn test_failing_broadcast_does_not_fail_registration() {
        struct FailingHook;

        #[async_trait]
        impl BroadcastHook for FailingHook {
            async fn broadcast_register(
                &self,
                _address: &Address,
                _location: &str,
            ) -> Result<(), BroadcastError> {
                Err(BroadcastError::new("peer down"))
            }

            async fn broadcast_unregister(
                &self,
                _address: &Address,
            ) -> Result<(), BroadcastError> {
                Err(BroadcastError::new("peer down"))
            }

            async fn broadcast_lookup(&self, _address: &Address) -> Option<String> {
                None
            }
        }

        let directory = Directory::new(
            Duration::from_secs(300),
            16,
            Arc::new(FailingHook),
            Arc::new(SystemClock),
        );

        directory.register(addr("w1"), "loc1");
        assert!(directory.lookup(&addr("w1")).await.is_some());
        directory.unregister(&addr("w1"));
        assert!(directory.lookup(&addr("w1")).await.is_none());
    }

    #[tokio::test]
    async fn test_throwing_subscriber_does_not_block_others() {
        let directory = directory();
        let seen = Arc::new(AtomicUsize::new(0));

        let _bad = directory.subscribe(Box::new(|_| Err("listener exploded".into())));
        let seen_clone = Arc::clone(&seen);
        let _good = directory.subscribe(Box::new(move |_| {
            seen_clone.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }));

        directory.register(addr("w1"), "loc1");
        assert_eq!(seen.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_notifications() {
        let directory = directory();
        let seen = Arc::new(AtomicUsize::new(0));

        let seen_clone = Arc::clone(&seen);
        let subscription = directory.subscribe(Box::new(move |_| {
            seen_clone.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }));

        directory.register(addr("w1"), "loc1");
        subscription.unsubscribe();
        directory.register(addr("w2"), "loc2");

        assert_eq!(seen.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_list_by_type_unions_registry_and_cache() {
        let directory = directory();
        directory.register(addr("w1"), "loc1");
        directory.register(Address::new(LOCAL_NODE, "counter", "c1"), "loc2");

        // Pull w1 into the cache, then drop it from the registry only.
        let _ = directory.lookup(&addr("w1")).await;
        directory.registry.remove(addr("w1").path());

        let workers = directory.list_by_type("worker");
        assert_eq!(workers.len(), 1);
        assert_eq!(workers[0].address, addr("w1"));

        assert_eq!(directory.get_all().len(), 2);
    }

    #[tokio::test]
    async fn test_sweep_and_teardown() {
        let clock = Arc::new(ManualClock::default());
        let directory = Directory::new(
            Duration::from_millis(50),
            16,
            Arc::new(NoopBroadcast),
            Arc::clone(&clock) as SharedClock,
        );

        directory.register(addr("w1"), "loc1");
        let _ = directory.lookup(&addr("w1")).await;
        clock.advance(Duration::from_millis(100));

        let (registry_removed, cache_removed) = directory.sweep_expired();
        assert_eq!(registry_removed, 1);
        assert_eq!(cache_removed, 1);

        directory.register(addr("w2"), "loc2");
        directory.teardown();
        assert_eq!(directory.registry_len(), 0);
        assert_eq!(directory.cache_len(), 0);
    }
}
