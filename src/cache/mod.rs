//! Cache Module
//!
//! Provides in-process memoization with TTL refresh and bounded-wait locking.

mod entry;
mod instance;
mod keyed;
mod lock;
mod sequence;
mod settings;
mod stats;
mod strategy;


// Re-export public types
pub use entry::{Fetched, Slots};
pub use instance::InstanceCache;
pub use keyed::KeyedCache;
pub use lock::{BoundedLock, LockTimeout};
pub use sequence::{ContextKey, SequenceComparer, SequenceKey};
pub use settings::{CacheSettings, FailedLockHandler};
pub use stats::{CacheStats, StatsRecorder};
pub use strategy::RetrievalStrategy;
