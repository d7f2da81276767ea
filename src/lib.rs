//! ttl_lru - A bounded in-process cache with per-entry expiry
//!
//! Entries leave the cache through LRU pressure or when a TTL armed with
//! [`TtlCache::add_with_ttl`] elapses, whichever happens first.

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{BoundedStore, TtlCache, TtlCacheBuilder};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use tasks::ExpiryScheduler;
