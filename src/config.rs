//! Configuration Module
//!
//! Describes how a cache is sized. Loading the values is left to the caller;
//! the struct deserializes from whatever format the host application uses.

use serde::Deserialize;

use crate::error::{CacheError, Result};

/// Default number of entries a cache holds.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Cache configuration parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of entries the cache can hold
    pub capacity: usize,
}

impl CacheConfig {
    /// Creates a config with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }

    /// Checks that the configuration can build a cache.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(CacheError::zero_capacity());
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}
