//! Retrieval Strategy Module
//!
//! Policies selecting how a get call interacts with stored state.

use serde::{Deserialize, Serialize};

// == Retrieval Strategy ==
/// How a get call interacts with the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStrategy {
    /// Read-through: return the cached value if fresh, else replenish and store
    #[default]
    Default,
    /// Cached value only; the producer is never called
    FromCache,
    /// Always call the producer, bypassing the cache and its lock
    NoCache,
    /// Always call the producer and overwrite the stored value
    Recache,
    /// Like `Default`, but a replenished value is returned without being stored
    NoStore,
}

impl RetrievalStrategy {
    /// Whether the strategy takes the cache lock.
    pub fn uses_lock(self) -> bool {
        !matches!(self, Self::NoCache)
    }

    /// Whether the strategy can write to the cache.
    pub fn may_store(self) -> bool {
        matches!(self, Self::Default | Self::Recache)
    }
}
