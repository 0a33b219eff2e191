//! Instance Cache Module
//!
//! Caches one lazily-computed value, optionally partitioned by context key.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::MutexGuard;
use tracing::{debug, trace};

use crate::cache::{
    BoundedLock, CacheSettings, CacheStats, ContextKey, Fetched, LockTimeout, RetrievalStrategy,
    Slots, StatsRecorder,
};

// == Instance Cache ==
/// Memoizes a single value, refreshed once it is older than the duration
/// passed to each get call.
///
/// Context keys split the value into independent slots that share one
/// refresh timestamp: storing any slot restarts the clock for all of them.
///
/// The producer runs while the cache lock is held (except for
/// [`RetrievalStrategy::NoCache`]). A producer that calls back into the same
/// cache waits for its own lock until the timeout and then receives the
/// fallback value; with an infinite timeout it deadlocks.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use memo_cache::cache::InstanceCache;
///
/// let cache = InstanceCache::new();
/// let ttl = Duration::from_secs(3600);
/// assert_eq!(cache.get(ttl, || "Hello".to_string()), "Hello");
/// assert_eq!(cache.get(ttl, || "World".to_string()), "Hello");
/// ```
pub struct InstanceCache<T> {
    slots: BoundedLock<Slots<T>>,
    stats: StatsRecorder,
}

impl<T: Clone> InstanceCache<T> {
    // == Constructors ==
    /// Creates a cache using the process-wide [`CacheSettings::shared`].
    pub fn new() -> Self {
        Self::with_settings(CacheSettings::shared())
    }

    /// Creates a cache with the given settings, taking their current default
    /// lock timeout.
    pub fn with_settings(settings: Arc<CacheSettings>) -> Self {
        let timeout = settings.default_lock_timeout();
        Self::with_settings_and_timeout(settings, timeout)
    }

    /// Creates a cache with an explicit lock timeout and the shared settings.
    pub fn with_lock_timeout(timeout: LockTimeout) -> Self {
        Self::with_settings_and_timeout(CacheSettings::shared(), timeout)
    }

    pub fn with_settings_and_timeout(settings: Arc<CacheSettings>, timeout: LockTimeout) -> Self {
        Self {
            slots: BoundedLock::new(Slots::new(), timeout, settings),
            stats: StatsRecorder::new(),
        }
    }

    pub fn lock_timeout(&self) -> LockTimeout {
        self.slots.timeout()
    }

    // == Get ==
    /// Read-through get of the unkeyed slot.
    ///
    /// Returns `T::default()` if the lock could not be acquired in time.
    pub fn get<F>(&self, duration: Duration, producer: F) -> T
    where
        T: Default,
        F: FnOnce() -> T,
    {
        self.get_with(duration, producer, RetrievalStrategy::Default, ())
    }

    /// Get with an explicit strategy and context key.
    ///
    /// Returns `T::default()` when no value was retrieved.
    pub fn get_with<F>(
        &self,
        duration: Duration,
        producer: F,
        strategy: RetrievalStrategy,
        context: impl Into<ContextKey>,
    ) -> T
    where
        T: Default,
        F: FnOnce() -> T,
    {
        self.try_get(duration, producer, T::default(), strategy, context)
            .into_value()
    }

    /// Get that reports whether the value was retrieved or `default` was used.
    pub fn try_get<F>(
        &self,
        duration: Duration,
        producer: F,
        default: T,
        strategy: RetrievalStrategy,
        context: impl Into<ContextKey>,
    ) -> Fetched<T>
    where
        F: FnOnce() -> T,
    {
        let result =
            self.try_get_with(duration, || Ok::<_, Infallible>(producer()), default, strategy, context);
        match result {
            Ok(fetched) => fetched,
            Err(never) => match never {},
        }
    }

    // == Try Get With ==
    /// Get with a fallible producer.
    ///
    /// A producer error is returned unchanged and leaves the cache as it was.
    /// Lock timeouts are not errors: they yield `default` with
    /// `retrieved == false`.
    pub fn try_get_with<F, E>(
        &self,
        duration: Duration,
        producer: F,
        default: T,
        strategy: RetrievalStrategy,
        context: impl Into<ContextKey>,
    ) -> Result<Fetched<T>, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let context = context.into();

        if !strategy.uses_lock() {
            self.stats.record_bypass();
            return producer().map(Fetched::retrieved);
        }

        let Some(mut slots) = self.lock() else {
            return Ok(Fetched::fallback(default));
        };
        let now = Instant::now();

        if strategy == RetrievalStrategy::FromCache {
            return Ok(match slots.get(&context) {
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
            if let Some(value) = slots.fresh(&context, duration, now) {
                trace!(?context, "Instance cache hit");
                self.stats.record_hit();
                return Ok(Fetched::retrieved(value.clone()));
            }
            self.stats.record_miss();
        }

        debug!(?context, ?strategy, "Replenishing instance cache");
        let value = producer()?;
        if strategy.may_store() {
            slots.store(context, value.clone(), now);
            self.stats.record_replenishment();
        }
        Ok(Fetched::retrieved(value))
    }

    // == Clear ==
    /// Expires the cache so the next read-through get calls the producer.
    ///
    /// Only the shared timestamp is reset. Values of other context keys stay
    /// stored and become reachable again once any slot is refreshed.
    ///
    /// Returns false if the lock could not be acquired in time.
    pub fn clear(&self) -> bool {
        match self.lock() {
            Some(mut slots) => {
                slots.expire();
                true
            }
            None => false,
        }
    }

    // == Was Cached ==
    /// Whether a value is stored for the context key, regardless of age.
    ///
    /// `None` if the lock could not be acquired in time.
    pub fn was_cached(&self, context: impl Into<ContextKey>) -> Option<bool> {
        let context = context.into();
        self.lock().map(|slots| slots.contains(&context))
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    fn lock(&self) -> Option<MutexGuard<'_, Slots<T>>> {
        match self.slots.acquire() {
            Ok(guard) => Some(guard),
            Err(timed_out) => {
                debug!(waited = ?timed_out.waited, "Instance cache lock timed out");
                self.stats.record_lock_timeout();
                None
            }
        }
    }
}

impl<T: Clone> Default for InstanceCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::thread::sleep;

    const HOUR: Duration = Duration::from_secs(3600);

    fn cache<T: Clone>() -> InstanceCache<T> {
        InstanceCache::with_settings(Arc::new(CacheSettings::new()))
    }

    #[test]
    fn test_get_returns_first_value_within_ttl() {
        let cache = cache();
        assert_eq!(cache.get(HOUR, || "Hello".to_string()), "Hello");
        assert_eq!(cache.get(HOUR, || "World".to_string()), "Hello");
    }

    #[test]
    fn test_producer_called_once_within_ttl() {
        let cache = cache();
        let calls = Cell::new(0);
        for _ in 0..5 {
            let value = cache.get(HOUR, || {
                calls.set(calls.get() + 1);
                calls.get()
            });
            assert_eq!(value, 1);
        }
        assert_eq!(calls.get(), 1);
        assert_eq!(cache.stats().hits, 4);
        assert_eq!(cache.stats().replenishments, 1);
    }

    #[test]
    fn test_get_refreshes_after_expiration() {
        let cache = cache();
        let ttl = Duration::from_millis(50);
        assert_eq!(cache.get(ttl, || 1), 1);
        sleep(Duration::from_millis(80));
        assert_eq!(cache.get(ttl, || 2), 2);
        assert_eq!(cache.get(ttl, || 3), 2);
    }

    #[test]
    fn test_from_cache_unpopulated_returns_default() {
        let cache = cache();
        let fetched = cache.try_get(
            HOUR,
            || panic!("producer must not run"),
            "fallback",
            RetrievalStrategy::FromCache,
            (),
        );
        assert_eq!(fetched, Fetched::fallback("fallback"));
    }

    #[test]
    fn test_from_cache_returns_stored_value_without_producer() {
        let cache = cache();
        cache.get(HOUR, || 7);
        let fetched = cache.try_get(
            HOUR,
            || panic!("producer must not run"),
            0,
            RetrievalStrategy::FromCache,
            (),
        );
        assert_eq!(fetched, Fetched::retrieved(7));

        // Unknown context key is a miss.
        let fetched =
            cache.try_get(HOUR, || 1, 0, RetrievalStrategy::FromCache, ["other"]);
        assert!(!fetched.retrieved);
    }

    #[test]
    fn test_no_cache_leaves_state_untouched() {
        let cache = cache();
        cache.get(HOUR, || "primed".to_string());

        let bypass = cache.get_with(HOUR, || "fresh".to_string(), RetrievalStrategy::NoCache, ());
        assert_eq!(bypass, "fresh");
        assert_eq!(cache.get(HOUR, || "other".to_string()), "primed");
        assert_eq!(cache.stats().bypasses, 1);
    }

    #[test]
    fn test_recache_overwrites_before_expiration() {
        let cache = cache();
        cache.get(HOUR, || 1);
        assert_eq!(cache.get_with(HOUR, || 2, RetrievalStrategy::Recache, ()), 2);
        assert_eq!(cache.get(HOUR, || 3), 2);
    }

    #[test]
    fn test_recache_restarts_clock() {
        let cache = cache();
        let ttl = Duration::from_millis(100);
        cache.get(ttl, || 1);
        sleep(Duration::from_millis(70));
        cache.get_with(ttl, || 2, RetrievalStrategy::Recache, ());
        sleep(Duration::from_millis(70));
        assert_eq!(cache.get(ttl, || 3), 2);
    }

    #[test]
    fn test_no_store_on_empty_cache_does_not_store() {
        let cache = cache();
        let value = cache.get_with(HOUR, || 5, RetrievalStrategy::NoStore, ());
        assert_eq!(value, 5);
        assert_eq!(cache.was_cached(()), Some(false));
        assert_eq!(cache.get(HOUR, || 6), 6);
    }

    #[test]
    fn test_no_store_returns_fresh_cached_value() {
        let cache = cache();
        cache.get(HOUR, || 1);
        assert_eq!(cache.get_with(HOUR, || 2, RetrievalStrategy::NoStore, ()), 1);
    }

    #[test]
    fn test_no_store_on_expired_entry_keeps_old_state() {
        let cache = cache();
        let ttl = Duration::from_millis(40);
        cache.get(ttl, || 1);
        sleep(Duration::from_millis(60));

        assert_eq!(cache.get_with(ttl, || 2, RetrievalStrategy::NoStore, ()), 2);
        // Still expired, so the next read-through call replenishes.
        assert_eq!(cache.get(ttl, || 3), 3);
    }

    #[test]
    fn test_clear_forces_replenish() {
        let cache = cache();
        cache.get(HOUR, || 1);
        assert!(cache.clear());
        assert_eq!(cache.was_cached(()), Some(false));
        assert_eq!(cache.get(HOUR, || 2), 2);
        assert_eq!(cache.get(HOUR, || 3), 2);
    }

    #[test]
    fn test_clear_then_refresh_revives_sibling_slots() {
        let cache = cache();
        cache.get_with(HOUR, || 1, RetrievalStrategy::Default, ["a"]);
        cache.get_with(HOUR, || 2, RetrievalStrategy::Default, ["b"]);
        assert!(cache.clear());

        let hidden = cache.try_get(HOUR, || 9, -1, RetrievalStrategy::FromCache, ["b"]);
        assert_eq!(hidden, Fetched::fallback(-1));
        assert_eq!(cache.was_cached(["b"]), Some(false));

        assert_eq!(cache.get_with(HOUR, || 3, RetrievalStrategy::Default, ["a"]), 3);

        let revived = cache.try_get(HOUR, || 9, -1, RetrievalStrategy::FromCache, ["b"]);
        assert_eq!(revived, Fetched::retrieved(2));
        assert_eq!(cache.get_with(HOUR, || 4, RetrievalStrategy::Default, ["b"]), 2);
    }

    #[test]
    fn test_context_keys_are_separate_slots() {
        let cache = cache();
        assert_eq!(cache.get_with(HOUR, || 1, RetrievalStrategy::Default, ["a"]), 1);
        assert_eq!(cache.get_with(HOUR, || 2, RetrievalStrategy::Default, ["b"]), 2);
        assert_eq!(cache.get_with(HOUR, || 3, RetrievalStrategy::Default, ["a"]), 1);
        assert_eq!(cache.get_with(HOUR, || 4, RetrievalStrategy::Default, ["a", "b"]), 4);
        assert_eq!(cache.get(HOUR, || 5), 5);

        assert_eq!(cache.was_cached(["b"]), Some(true));
        assert_eq!(cache.was_cached(["c"]), Some(false));
        assert_eq!(cache.was_cached(None::<Vec<String>>), Some(true));
    }

    #[test]
    fn test_context_slots_share_refresh_timestamp() {
        let cache = cache();
        let ttl = Duration::from_millis(100);
        cache.get_with(ttl, || 1, RetrievalStrategy::Default, ["a"]);
        sleep(Duration::from_millis(70));
        cache.get_with(ttl, || 2, RetrievalStrategy::Default, ["b"]);
        sleep(Duration::from_millis(70));

        // "a" is older than the ttl but was refreshed along with "b".
        assert_eq!(cache.get_with(ttl, || 9, RetrievalStrategy::Default, ["a"]), 1);
    }

    #[test]
    fn test_producer_error_propagates_and_preserves_state() {
        let cache = cache();
        cache.get(HOUR, || 1);

        let result = cache.try_get_with(
            HOUR,
            || Err::<i32, _>("boom"),
            0,
            RetrievalStrategy::Recache,
            (),
        );
        assert_eq!(result, Err("boom"));
        assert_eq!(cache.get(HOUR, || 2), 1);
    }

    #[test]
    fn test_producer_panic_releases_lock() {
        let cache: InstanceCache<i32> = cache();
        let outcome = catch_unwind(AssertUnwindSafe(|| cache.get(HOUR, || panic!("boom"))));
        assert!(outcome.is_err());
        assert_eq!(cache.was_cached(()), Some(false));
        assert_eq!(cache.get(HOUR, || 4), 4);
    }

    #[test]
    fn test_reentrant_producer_gets_fallback() {
        let cache: InstanceCache<i32> = InstanceCache::with_settings_and_timeout(
            Arc::new(CacheSettings::new()),
            LockTimeout::After(Duration::from_millis(20)),
        );
        let value = cache.get(HOUR, || {
            let inner = cache.try_get(HOUR, || 1, -1, RetrievalStrategy::Default, ());
            assert!(!inner.retrieved);
            inner.value
        });
        assert_eq!(value, -1);
        assert_eq!(cache.stats().lock_timeouts, 1);
    }

    #[test]
    fn test_lock_timeout_captured_at_construction() {
        let settings = Arc::new(CacheSettings::new());
        let before = InstanceCache::<u8>::with_settings(Arc::clone(&settings));
        settings.set_default_lock_timeout(LockTimeout::After(Duration::from_secs(1)));
        let after = InstanceCache::<u8>::with_settings(settings);

        assert_eq!(before.lock_timeout(), LockTimeout::Infinite);
        assert_eq!(after.lock_timeout(), LockTimeout::After(Duration::from_secs(1)));
    }
}
