//! Bounded Store Module
//!
//! Fixed-capacity LRU storage with an optional eviction callback.

use std::fmt;
use std::hash::Hash;
use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::trace;

use crate::error::{CacheError, Result};

/// Callback invoked with every entry that leaves the store.
pub type EvictCallback<K, V> = Box<dyn Fn(&K, &V) + Send + Sync>;

// == Bounded Store ==
/// Thread-safe LRU store holding at most `capacity` entries.
///
/// Every entry that leaves the store, whether pushed out by capacity
/// pressure or removed explicitly, is handed to the eviction callback.
/// The callback runs after the internal lock is released, so it may call
/// back into the store. Overwriting an existing key is not an eviction.
pub struct BoundedStore<K, V> {
    /// Entries in recency order
    entries: Mutex<LruCache<K, V>>,
    /// Optional eviction callback
    on_evict: Option<EvictCallback<K, V>>,
}

impl<K: Hash + Eq, V> BoundedStore<K, V> {
    // == Constructors ==
    /// Creates a store holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Result<Self> {
        Self::build(capacity, None)
    }

    /// Creates a store that reports every removed entry to `on_evict`.
    pub fn with_evict<F>(capacity: usize, on_evict: F) -> Result<Self>
    where
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        Self::build(capacity, Some(Box::new(on_evict)))
    }

    pub(crate) fn build(capacity: usize, on_evict: Option<EvictCallback<K, V>>) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity).ok_or_else(CacheError::zero_capacity)?;
        Ok(Self {
            entries: Mutex::new(LruCache::new(capacity)),
            on_evict,
        })
    }

    // == Add ==
    /// Inserts or updates a value and marks it most recently used.
    ///
    /// Returns true if the least recently used entry was evicted to make room.
    pub fn add(&self, key: K, value: V) -> bool {
        match self.insert(key, value) {
            Some((key, value)) => {
                self.notify(&key, &value);
                true
            }
            None => false,
        }
    }

    // == Contains Or Add ==
    /// Adds the entry only if `key` is absent.
    ///
    /// Returns `(contained, evicted)`. A present key keeps its value and
    /// recency.
    pub fn contains_or_add(&self, key: K, value: V) -> (bool, bool) {
        let evicted = {
            let mut entries = self.entries.lock();
            if entries.contains(&key) {
                return (true, false);
            }
            entries.push(key, value)
        };
        (false, self.settle(evicted))
    }

    // == Remove ==
    /// Removes `key`, returning whether it was present.
    pub fn remove(&self, key: &K) -> bool {
        match self.take(key) {
            Some((key, value)) => {
                self.notify(&key, &value);
                true
            }
            None => false,
        }
    }

    // == Remove Oldest ==
    /// Evicts the least recently used entry.
    pub fn remove_oldest(&self) -> Option<(K, V)> {
        let oldest = self.entries.lock().pop_lru();
        if let Some((key, value)) = &oldest {
            self.notify(key, value);
        }
        oldest
    }

    // == Purge ==
    /// Removes every entry, reporting each one to the eviction callback.
    pub fn purge(&self) {
        let drained = {
            let mut entries = self.entries.lock();
            let mut drained = Vec::with_capacity(entries.len());
            while let Some(entry) = entries.pop_lru() {
                drained.push(entry);
            }
            drained
        };
        for (key, value) in &drained {
            self.notify(key, value);
        }
    }

    // == Resize ==
    /// Changes the capacity, evicting the oldest entries that no longer fit.
    ///
    /// Returns the number of entries evicted.
    pub fn resize(&self, capacity: usize) -> Result<usize> {
        let capacity = NonZeroUsize::new(capacity).ok_or_else(CacheError::zero_capacity)?;
        let evicted = {
            let mut entries = self.entries.lock();
            let mut evicted = Vec::new();
            while entries.len() > capacity.get() {
                match entries.pop_lru() {
                    Some(entry) => evicted.push(entry),
                    None => break,
                }
            }
            entries.resize(capacity);
            evicted
        };
        for (key, value) in &evicted {
            self.notify(key, value);
        }
        Ok(evicted.len())
    }

    // == Contains ==
    /// Checks for `key` without updating recency.
    pub fn contains(&self, key: &K) -> bool {
        self.entries.lock().contains(key)
    }

    // == Keys ==
    /// Returns the keys from oldest to newest.
    pub fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.entries
            .lock()
            .iter()
            .rev()
            .map(|(key, _)| key.clone())
            .collect()
    }

    // == Length ==
    /// Returns the current number of entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Returns the maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }

    // == Detached Operations ==
    // Used by the TTL layer, which delivers callbacks itself once its own
    // lock is released.

    /// Inserts without notifying; returns the entry evicted for room.
    pub(crate) fn insert(&self, key: K, value: V) -> Option<(K, V)> {
        let mut entries = self.entries.lock();
        if entries.contains(&key) {
            entries.put(key, value);
            None
        } else {
            entries.push(key, value)
        }
    }

    /// Removes without notifying.
    pub(crate) fn take(&self, key: &K) -> Option<(K, V)> {
        self.entries.lock().pop_entry(key)
    }

    /// Hands an evicted entry to the callback, returning whether there was one.
    pub(crate) fn settle(&self, evicted: Option<(K, V)>) -> bool {
        match evicted {
            Some((key, value)) => {
                self.notify(&key, &value);
                true
            }
            None => false,
        }
    }

    fn notify(&self, key: &K, value: &V) {
        trace!("Entry left the bounded store");
        if let Some(on_evict) = &self.on_evict {
            on_evict(key, value);
        }
    }
}

impl<K: Hash + Eq, V: Clone> BoundedStore<K, V> {
    // == Get ==
    /// Returns the value for `key` and marks it most recently used.
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.lock().get(key).cloned()
    }

    // == Peek ==
    /// Returns the value for `key` without updating recency.
    pub fn peek(&self, key: &K) -> Option<V> {
        self.entries.lock().peek(key).cloned()
    }

    // == Peek Or Add ==
    /// Returns the current value if `key` is present, otherwise adds it.
    ///
    /// Returns `(previous, evicted)`.
    pub fn peek_or_add(&self, key: K, value: V) -> (Option<V>, bool) {
        let evicted = {
            let mut entries = self.entries.lock();
            if let Some(current) = entries.peek(&key) {
                return (Some(current.clone()), false);
            }
            entries.push(key, value)
        };
        (None, self.settle(evicted))
    }

    // == Get Oldest ==
    /// Returns the least recently used entry without updating recency.
    pub fn get_oldest(&self) -> Option<(K, V)>
    where
        K: Clone,
    {
        self.entries
            .lock()
            .peek_lru()
            .map(|(key, value)| (key.clone(), value.clone()))
    }
}

impl<K: Hash + Eq, V> fmt::Debug for BoundedStore<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.lock();
        f.debug_struct("BoundedStore")
            .field("len", &entries.len())
            .field("capacity", &entries.cap())
            .field("on_evict", &self.on_evict.is_some())
            .finish()
    }
}
