//! TTL Cache Module
//!
//! Bounded LRU cache whose entries can additionally expire after a TTL.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::{debug, trace};

use crate::cache::store::{BoundedStore, EvictCallback};
use crate::config::CacheConfig;
use crate::error::Result;
use crate::tasks::ExpiryScheduler;

// == TTL Cache ==
/// LRU cache with optional per-entry expiry.
///
/// Entries leave either through LRU pressure or when the timer armed by
/// [`add_with_ttl`](Self::add_with_ttl) fires, whichever comes first. Both
/// paths go through the same eviction callback, and an entry is reported at
/// most once.
///
/// Cloning is cheap; clones share the same entries and timers. Timers only
/// hold a weak reference, so dropping every handle frees the entries and
/// turns outstanding timers into no-ops.
pub struct TtlCache<K, V> {
    /// Bounded LRU storage
    store: Arc<BoundedStore<K, V>>,
    /// Pending expiry timers
    scheduler: ExpiryScheduler<K>,
}

impl<K, V> Clone for TtlCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            scheduler: self.scheduler.clone(),
        }
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq + Clone + Send + 'static,
    V: Send + 'static,
{
    // == Constructors ==
    /// Starts building a cache holding at most `capacity` entries.
    pub fn builder(capacity: usize) -> TtlCacheBuilder<K, V> {
        TtlCacheBuilder {
            capacity,
            on_evict: None,
            runtime: None,
        }
    }

    /// Creates a cache on the current Tokio runtime.
    ///
    /// Fails if `capacity` is zero or no runtime is running.
    pub fn new(capacity: usize) -> Result<Self> {
        Self::builder(capacity).build()
    }

    /// Creates a cache that reports every removed entry to `on_evict`.
    pub fn with_evict<F>(capacity: usize, on_evict: F) -> Result<Self>
    where
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        Self::builder(capacity).on_evict(on_evict).build()
    }

    /// Creates a cache sized by `config`.
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        config.validate()?;
        Self::new(config.capacity)
    }

    // == Add With TTL ==
    /// Adds an entry and schedules its removal after `ttl`.
    ///
    /// If `key` already has a pending timer, no new one is armed: the value is
    /// still written, and the earlier timer removes it at the original
    /// deadline. Returns true if an entry was evicted to make room.
    pub fn add_with_ttl(&self, key: K, value: V, ttl: Duration) -> bool {
        let store = Arc::downgrade(&self.store);
        let expire = move |key: &K| {
            let store = store.upgrade();
            let removed = store.as_ref().and_then(|store| store.take(key));
            move || match store {
                Some(store) => {
                    if !store.settle(removed) {
                        trace!("Expired key was already evicted");
                    }
                }
                None => trace!("Cache dropped before expiry fired"),
            }
        };

        let (_, evicted) = self.scheduler.arm_then(key.clone(), ttl, expire, || {
            self.store.insert(key, value)
        });
        self.store.settle(evicted)
    }

    // == Passthrough Operations ==
    /// Adds or updates an entry without touching any pending expiry.
    pub fn add(&self, key: K, value: V) -> bool {
        self.store.add(key, value)
    }

    /// Adds the entry only if `key` is absent. Returns `(contained, evicted)`.
    pub fn contains_or_add(&self, key: K, value: V) -> (bool, bool) {
        self.store.contains_or_add(key, value)
    }

    /// Removes `key`, returning whether it was present.
    ///
    /// A pending timer for `key` stays armed and later fires as a no-op,
    /// unless the key has been written again by then.
    pub fn remove(&self, key: &K) -> bool {
        self.store.remove(key)
    }

    /// Evicts the least recently used entry.
    pub fn remove_oldest(&self) -> Option<(K, V)> {
        self.store.remove_oldest()
    }

    /// Checks for `key` without updating recency.
    pub fn contains(&self, key: &K) -> bool {
        self.store.contains(key)
    }

    /// Returns the keys from oldest to newest.
    pub fn keys(&self) -> Vec<K> {
        self.store.keys()
    }

    /// Removes every entry. Pending timers are left to fire as no-ops.
    pub fn purge(&self) {
        self.store.purge()
    }

    /// Changes the capacity; returns the number of entries evicted.
    pub fn resize(&self, capacity: usize) -> Result<usize> {
        let evicted = self.store.resize(capacity)?;
        debug!(
            "TTL cache resized to {} entries ({} evicted)",
            capacity, evicted
        );
        Ok(evicted)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    // == Expiry Introspection ==
    /// Returns true if `key` has an expiry timer that has not fired yet.
    pub fn is_pending(&self, key: &K) -> bool {
        self.scheduler.is_pending(key)
    }

    /// Returns the number of expiry timers that have not fired yet.
    pub fn pending_len(&self) -> usize {
        self.scheduler.pending_len()
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    /// Returns the value for `key` and marks it most recently used.
    pub fn get(&self, key: &K) -> Option<V> {
        self.store.get(key)
    }

    /// Returns the value for `key` without updating recency.
    pub fn peek(&self, key: &K) -> Option<V> {
        self.store.peek(key)
    }

    /// Returns the current value if `key` is present, otherwise adds it.
    pub fn peek_or_add(&self, key: K, value: V) -> (Option<V>, bool) {
        self.store.peek_or_add(key, value)
    }

    /// Returns the least recently used entry without updating recency.
    pub fn get_oldest(&self) -> Option<(K, V)> {
        self.store.get_oldest()
    }
}

impl<K: Hash + Eq, V> fmt::Debug for TtlCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtlCache")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

// == Builder ==
/// Configures a [`TtlCache`] before construction.
pub struct TtlCacheBuilder<K, V> {
    capacity: usize,
    on_evict: Option<EvictCallback<K, V>>,
    runtime: Option<Handle>,
}

impl<K, V> TtlCacheBuilder<K, V>
where
    K: Hash + Eq + Clone + Send + 'static,
    V: Send + 'static,
{
    /// Sets the callback invoked with every entry that leaves the cache.
    pub fn on_evict<F>(mut self, on_evict: F) -> Self
    where
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        self.on_evict = Some(Box::new(on_evict));
        self
    }

    /// Runs expiry timers on `runtime` instead of the current one.
    ///
    /// Lets a cache be built from a thread outside any runtime.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> Result<TtlCache<K, V>> {
        let store = BoundedStore::build(self.capacity, self.on_evict)?;
        let scheduler = match self.runtime {
            Some(runtime) => ExpiryScheduler::new(runtime),
            None => ExpiryScheduler::current()?,
        };

        debug!("TTL cache created with capacity {}", self.capacity);

        Ok(TtlCache {
            store: Arc::new(store),
            scheduler,
        })
    }
}
