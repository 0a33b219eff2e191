//! Invalidation Module
//!
//! Contracts for code that clears caches in response to outside events, such
//! as content of a given type being published, plus adapters that bind a
//! cache to a set of content aliases.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;

use tracing::debug;

use crate::cache::{InstanceCache, KeyedCache};

// == Invalidator Traits ==
/// Invalidates a whole cache.
pub trait CacheInvalidator {
    /// Clears unconditionally.
    fn invalidate(&self);

    /// Clears if the invalidator is bound to any of the given aliases.
    fn invalidate_for_aliases(&self, aliases: &[&str]);
}

/// Invalidates individual primary keys of a keyed cache.
pub trait KeyedCacheInvalidator<K> {
    fn invalidate_for_keys(&self, keys: &[K]);
}

// == Alias Invalidator ==
/// Binds a cache to the content aliases whose changes make it stale.
pub struct AliasInvalidator<C> {
    cache: Arc<C>,
    aliases: HashSet<String>,
}

impl<C> AliasInvalidator<C> {
    pub fn new<I, S>(cache: Arc<C>, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cache,
            aliases: aliases.into_iter().map(Into::into).collect(),
        }
    }

    pub fn cache(&self) -> &Arc<C> {
        &self.cache
    }

    /// Whether any of the aliases is one this invalidator is bound to.
    pub fn matches(&self, aliases: &[&str]) -> bool {
        aliases.iter().any(|alias| self.aliases.contains(*alias))
    }
}

impl<T: Clone> CacheInvalidator for AliasInvalidator<InstanceCache<T>> {
    fn invalidate(&self) {
        let cleared = self.cache.clear();
        debug!(cleared, "Invalidated instance cache");
    }

    fn invalidate_for_aliases(&self, aliases: &[&str]) {
        if self.matches(aliases) {
            self.invalidate();
        }
    }
}

impl<K, T> CacheInvalidator for AliasInvalidator<KeyedCache<K, T>>
where
    K: Eq + Hash + Clone,
    T: Clone,
{
    fn invalidate(&self) {
        let cleared = self.cache.clear();
        debug!(cleared, "Invalidated keyed cache");
    }

    fn invalidate_for_aliases(&self, aliases: &[&str]) {
        if self.matches(aliases) {
            self.invalidate();
        }
    }
}

impl<K, T> KeyedCacheInvalidator<K> for AliasInvalidator<KeyedCache<K, T>>
where
    K: Eq + Hash + Clone,
    T: Clone,
{
    fn invalidate_for_keys(&self, keys: &[K]) {
        let cleared = self.cache.clear_keys(keys);
        debug!(cleared, count = keys.len(), "Invalidated keyed cache entries");
    }
}
