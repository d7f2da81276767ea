//! Expiry Scheduler
//!
//! Arms one-shot Tokio tasks that remove keys once their TTL elapses.
//!
//! At most one timer is pending per key. Arming a key that already has a
//! pending timer is a no-op: the original deadline stands and the running
//! timer stays responsible for the removal.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{debug, trace};

use crate::error::{CacheError, Result};

// == Expiry Scheduler ==
/// Tracks keys with a pending expiry and runs their delayed removal.
///
/// Check-then-mark on arming and remove-then-clear on firing both happen
/// under the same lock, so a timer that is firing and a caller that is
/// arming the same key never interleave.
#[derive(Debug)]
pub struct ExpiryScheduler<K> {
    /// Keys with an outstanding timer
    pending: Arc<Mutex<HashSet<K>>>,
    /// Runtime the timers are spawned on
    runtime: Handle,
}

impl<K> Clone for ExpiryScheduler<K> {
    fn clone(&self) -> Self {
        Self {
            pending: Arc::clone(&self.pending),
            runtime: self.runtime.clone(),
        }
    }
}

impl<K> ExpiryScheduler<K>
where
    K: Hash + Eq + Clone + Send + 'static,
{
    // == Constructors ==
    /// Creates a scheduler that spawns its timers on `runtime`.
    pub fn new(runtime: Handle) -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashSet::new())),
            runtime,
        }
    }

    /// Creates a scheduler on the runtime the caller is running in.
    ///
    /// Fails outside a Tokio runtime, since timers would have nowhere to run.
    pub fn current() -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| {
            CacheError::InvalidConfiguration(
                "expiry timers require a Tokio runtime; build inside one or pass a handle"
                    .to_string(),
            )
        })?;
        Ok(Self::new(runtime))
    }

    // == Arm ==
    /// Schedules `remove` to run for `key` once `ttl` has elapsed.
    ///
    /// Returns false, doing nothing, if `key` already has a pending timer.
    ///
    /// `remove` runs while the pending set is locked and returns a completion
    /// that runs after the lock is released. Anything that may call back into
    /// the owner of this scheduler belongs in the completion.
    pub fn arm<F, R>(&self, key: K, ttl: Duration, remove: F) -> bool
    where
        F: FnOnce(&K) -> R + Send + 'static,
        R: FnOnce() + Send + 'static,
    {
        self.arm_then(key, ttl, remove, || ()).0
    }

    /// Like [`arm`](Self::arm), and also runs `critical` before releasing the
    /// pending lock.
    ///
    /// A write paired with the arming goes in `critical`; a timer for the same
    /// key cannot fire between the two.
    pub fn arm_then<F, R, C, T>(&self, key: K, ttl: Duration, remove: F, critical: C) -> (bool, T)
    where
        F: FnOnce(&K) -> R + Send + 'static,
        R: FnOnce() + Send + 'static,
        C: FnOnce() -> T,
    {
        let mut pending = self.pending.lock();

        let armed = if pending.contains(&key) {
            trace!("Expiry already pending, keeping original deadline");
            false
        } else {
            pending.insert(key.clone());
            self.spawn_timer(key, ttl, remove);
            debug!(
                "Armed expiry timer with TTL of {:?} ({} pending)",
                ttl,
                pending.len()
            );
            true
        };

        (armed, critical())
    }

    fn spawn_timer<F, R>(&self, key: K, ttl: Duration, remove: F)
    where
        F: FnOnce(&K) -> R + Send + 'static,
        R: FnOnce() + Send + 'static,
    {
        let pending = Arc::clone(&self.pending);

        self.runtime.spawn(async move {
            tokio::time::sleep(ttl).await;

            // Remove first, then clear: an arm that observes the key as
            // pending is covered by this removal.
            let complete = {
                let mut pending = pending.lock();
                let complete = remove(&key);
                pending.remove(&key);
                complete
            };
            complete();

            debug!("Expiry timer fired after {:?}", ttl);
        });
    }

    // == Introspection ==
    /// Returns true if `key` has a timer that has not fired yet.
    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.lock().contains(key)
    }

    /// Returns the number of timers that have not fired yet.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }
}
