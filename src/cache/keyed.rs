//! Keyed Cache Module
//!
//! Caches a family of values, one bucket per primary key, each bucket
//! partitioned by context key.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::convert::Infallible;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::MutexGuard;
use tracing::{debug, trace};

use crate::cache::{
    BoundedLock, CacheSettings, CacheStats, ContextKey, Fetched, LockTimeout, RetrievalStrategy,
    Slots, StatsRecorder,
};

type Buckets<K, T> = HashMap<K, Slots<T>>;

// == Keyed Cache ==
/// Memoizes one value per primary key.
///
/// Each primary key owns a bucket of context-key slots with one shared
/// refresh timestamp, so expiry is decided per primary key. Strategies behave
/// as in [`InstanceCache`](crate::cache::InstanceCache).
///
/// Primary keys are compared with their `Eq`/`Hash` impls. A key type that
/// compares by identity (an address, a handle) gets one bucket per instance
/// rather than per content; wrap sequences in
/// [`SequenceKey`](crate::cache::SequenceKey) to key by content.
pub struct KeyedCache<K, T> {
    buckets: BoundedLock<Buckets<K, T>>,
    stats: StatsRecorder,
}

impl<K, T> KeyedCache<K, T>
where
    K: Eq + Hash + Clone,
    T: Clone,
{
    // == Constructors ==
    /// Creates a cache using the process-wide [`CacheSettings::shared`].
    pub fn new() -> Self {
        Self::with_settings(CacheSettings::shared())
    }

    pub fn with_settings(settings: Arc<CacheSettings>) -> Self {
        let timeout = settings.default_lock_timeout();
        Self::with_settings_and_timeout(settings, timeout)
    }

    pub fn with_lock_timeout(timeout: LockTimeout) -> Self {
        Self::with_settings_and_timeout(CacheSettings::shared(), timeout)
    }

    pub fn with_settings_and_timeout(settings: Arc<CacheSettings>, timeout: LockTimeout) -> Self {
        Self {
            buckets: BoundedLock::new(HashMap::new(), timeout, settings),
            stats: StatsRecorder::new(),
        }
    }

    pub fn lock_timeout(&self) -> LockTimeout {
        self.buckets.timeout()
    }

    // == Get ==
    /// Read-through get of the unkeyed slot under `key`.
    pub fn get<F>(&self, key: &K, duration: Duration, producer: F) -> T
    where
        T: Default,
        F: FnOnce(&K) -> T,
    {
        self.get_with(key, duration, producer, RetrievalStrategy::Default, ())
    }

    pub fn get_with<F>(
        &self,
        key: &K,
        duration: Duration,
        producer: F,
        strategy: RetrievalStrategy,
        context: impl Into<ContextKey>,
    ) -> T
    where
        T: Default,
        F: FnOnce(&K) -> T,
    {
        self.try_get(key, duration, producer, T::default(), strategy, context)
            .into_value()
    }

    pub fn try_get<F>(
        &self,
        key: &K,
        duration: Duration,
        producer: F,
        default: T,
        strategy: RetrievalStrategy,
        context: impl Into<ContextKey>,
    ) -> Fetched<T>
    where
        F: FnOnce(&K) -> T,
    {
        let result = self.try_get_with(
            key,
            duration,
            |key| Ok::<_, Infallible>(producer(key)),
            default,
            strategy,
            context,
        );
        match result {
            Ok(fetched) => fetched,
            Err(never) => match never {},
        }
    }

    // == Try Get With ==
    /// Get with a fallible producer.
    ///
    /// A producer error is returned unchanged and leaves the bucket as it was.
    pub fn try_get_with<F, E>(
        &self,
        key: &K,
        duration: Duration,
        producer: F,
        default: T,
        strategy: RetrievalStrategy,
        context: impl Into<ContextKey>,
    ) -> Result<Fetched<T>, E>
    where
        F: FnOnce(&K) -> Result<T, E>,
    {
        let context = context.into();

        if !strategy.uses_lock() {
            self.stats.record_bypass();
            return producer(key).map(Fetched::retrieved);
        }

        let Some(mut buckets) = self.lock() else {
            return Ok(Fetched::fallback(default));
        };
        let now = Instant::now();

        if strategy == RetrievalStrategy::FromCache {
            let cached = buckets.get(key).and_then(|slots| slots.get(&context));
            return Ok(match cached {
                Some(value) => {
                    self.stats.record_hit();
                    Fetched::retrieved(value.clone())
                }
                None => {
                    self.stats.record_miss();
                    Fetched::fallback(default)
                }
            });
        }

        if strategy != RetrievalStrategy::Recache {
            let fresh = buckets
                .get(key)
                .and_then(|slots| slots.fresh(&context, duration, now));
            if let Some(value) = fresh {
                trace!(?context, "Keyed cache hit");
                self.stats.record_hit();
                return Ok(Fetched::retrieved(value.clone()));
            }
            self.stats.record_miss();
        }

        debug!(?context, ?strategy, "Replenishing keyed cache");
        let value = producer(key)?;
        if strategy.may_store() {
            buckets
                .entry(key.clone())
                .or_default()
                .store(context, value.clone(), now);
            self.stats.record_replenishment();
        }
        Ok(Fetched::retrieved(value))
    }

    // == Clear ==
    /// Removes every bucket. Returns false if the lock was not acquired.
    pub fn clear(&self) -> bool {
        match self.lock() {
            Some(mut buckets) => {
                buckets.clear();
                true
            }
            None => false,
        }
    }

    // == Clear Keys ==
    /// Removes the buckets of exactly the given primary keys, with all their
    /// context slots. Returns false if the lock was not acquired.
    pub fn clear_keys<I>(&self, keys: I) -> bool
    where
        I: IntoIterator,
        I::Item: Borrow<K>,
    {
        match self.lock() {
            Some(mut buckets) => {
                for key in keys {
                    buckets.remove(key.borrow());
                }
                true
            }
            None => false,
        }
    }

    // == Contains Key ==
    /// Whether a bucket exists for `key`, regardless of age.
    ///
    /// `None` if the lock could not be acquired in time.
    pub fn contains_key(&self, key: &K) -> Option<bool> {
        self.lock().map(|buckets| buckets.contains_key(key))
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    fn lock(&self) -> Option<MutexGuard<'_, Buckets<K, T>>> {
        match self.buckets.acquire() {
            Ok(guard) => Some(guard),
            Err(timed_out) => {
                debug!(waited = ?timed_out.waited, "Keyed cache lock timed out");
                self.stats.record_lock_timeout();
                None
            }
        }
    }
}

impl<K, T> Default for KeyedCache<K, T>
where
    K: Eq + Hash + Clone,
    T: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
