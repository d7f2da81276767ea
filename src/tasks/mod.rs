//! Background Tasks Module
//!
//! Contains the tasks that run alongside cache operations.
//!
//! # Tasks
//! - Expiry: one-shot timers that remove a key once its TTL elapses

mod expiry;

pub use expiry::ExpiryScheduler;
