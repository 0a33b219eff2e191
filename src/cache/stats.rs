//! Cache Statistics Module
//!
//! Tracks how get calls were served: from the cache, by the producer, or not
//! at all because the lock wait ran out.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Cache Stats ==
/// Point-in-time copy of a cache's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Calls answered with a stored value
    pub hits: u64,
    /// Calls that found no fresh stored value
    pub misses: u64,
    /// Producer results written to the cache
    pub replenishments: u64,
    /// Calls that skipped the cache entirely
    pub bypasses: u64,
    /// Operations abandoned because the lock wait elapsed
    pub lock_timeouts: u64,
}

impl CacheStats {
    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// == Stats Recorder ==
/// Lock-free counters updated by a cache as it serves calls.
///
/// Lock timeouts are recorded by threads that never got the lock, so the
/// counters live outside it.
#[derive(Debug, Default)]
pub struct StatsRecorder {
    hits: AtomicU64,
    misses: AtomicU64,
    replenishments: AtomicU64,
    bypasses: AtomicU64,
    lock_timeouts: AtomicU64,
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_replenishment(&self) {
        self.replenishments.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bypass(&self) {
        self.bypasses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lock_timeout(&self) {
        self.lock_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Copies the current counter values.
    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            replenishments: self.replenishments.load(Ordering::Relaxed),
            bypasses: self.bypasses.load(Ordering::Relaxed),
            lock_timeouts: self.lock_timeouts.load(Ordering::Relaxed),
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = StatsRecorder::new().snapshot();
        assert_eq!(stats, CacheStats::default());
    }

    #[test]
    fn test_hit_rate_no_requests() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let recorder = StatsRecorder::new();
        recorder.record_hit();
        recorder.record_hit();
        recorder.record_hit();
        recorder.record_miss();
        assert_eq!(recorder.snapshot().hit_rate(), 0.75);
    }

    #[test]
    fn test_hit_rate_ignores_bypasses() {
        let recorder = StatsRecorder::new();
        recorder.record_bypass();
        recorder.record_bypass();
        recorder.record_lock_timeout();
        let stats = recorder.snapshot();
        assert_eq!(stats.bypasses, 2);
        assert_eq!(stats.lock_timeouts, 1);
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_record_replenishment() {
        let recorder = StatsRecorder::new();
        recorder.record_replenishment();
        recorder.record_replenishment();
        assert_eq!(recorder.snapshot().replenishments, 2);
    }

    #[test]
    fn test_stats_serialize() {
        let recorder = StatsRecorder::new();
        recorder.record_hit();
        let json = serde_json::to_value(recorder.snapshot()).unwrap();
        assert_eq!(json["hits"], 1);
        assert_eq!(json["lock_timeouts"], 0);
    }
}
