//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
///
/// Runtime operations never fail; only construction and resizing can.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Capacity was zero, or no runtime was available to run expiry timers
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl CacheError {
    pub(crate) fn zero_capacity() -> Self {
        CacheError::InvalidConfiguration("capacity must be positive".to_string())
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
