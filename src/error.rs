//! Error types for the memoization caches
//!
//! Provides unified error handling using thiserror.

use std::time::Duration;

use thiserror::Error;

// == Cache Error Enum ==
/// Configuration and construction errors.
///
/// Cache misses, expirations and lock timeouts are not errors; they are
/// reported through the `retrieved` flag of [`crate::cache::Fetched`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Lock timeout in milliseconds that is neither `-1` nor non-negative
    #[error("Invalid lock timeout: {0}ms (expected -1 for infinite, or >= 0)")]
    InvalidLockTimeout(i64),

    /// Configuration value that could not be parsed
    #[error("Invalid configuration value for {key}: {value:?}")]
    InvalidConfig { key: String, value: String },
}

// == Lock Timed Out ==
/// Raised internally when the bounded wait for a cache lock elapses.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Lock not acquired within {waited:?}")]
pub struct LockTimedOut {
    /// The deadline that elapsed
    pub waited: Duration,
}

// == Result Type Alias ==
/// Convenience Result type for the cache crate.
pub type Result<T> = std::result::Result<T, CacheError>;
