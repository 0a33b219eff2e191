//! Memo Cache - In-process memoization caches
//!
//! Stores lazily-computed values, refreshes them on a time-to-live, and
//! guards recomputation with a bounded-wait lock.

pub mod cache;
pub mod config;
pub mod error;
pub mod invalidation;

pub use cache::{
    CacheSettings, ContextKey, Fetched, InstanceCache, KeyedCache, LockTimeout,
    RetrievalStrategy, SequenceKey,
};
pub use config::Config;
pub use error::{CacheError, Result};
