//! Cache Module
//!
//! Provides a bounded LRU store and the TTL layer built on top of it.

mod store;
mod ttl;


// Re-export public types
pub use store::{BoundedStore, EvictCallback};
pub use ttl::{TtlCache, TtlCacheBuilder};
