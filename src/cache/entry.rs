//! Cache Entry Module
//!
//! Slot storage shared by both caches, and the result type of a get call.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::cache::ContextKey;

// == Fetched ==
/// The value produced by a get call, and whether it was actually retrieved.
///
/// When `retrieved` is false, `value` is the default the caller supplied:
/// either nothing was cached (`FromCache`) or the lock wait ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fetched<T> {
    pub value: T,
    pub retrieved: bool,
}

impl<T> Fetched<T> {
    /// A value obtained from the cache or the producer.
    pub fn retrieved(value: T) -> Self {
        Self {
            value,
            retrieved: true,
        }
    }

    /// The caller's default, standing in for a value that was not obtained.
    pub fn fallback(default: T) -> Self {
        Self {
            value: default,
            retrieved: false,
        }
    }

    pub fn into_value(self) -> T {
        self.value
    }

    /// `Some` only when the value was retrieved.
    pub fn into_option(self) -> Option<T> {
        self.retrieved.then_some(self.value)
    }
}

// == Slots ==
/// Values stored per context key, sharing one refresh timestamp.
///
/// Freshness is decided for the whole set: storing into any slot restarts
/// the clock for all of them.
#[derive(Debug, Clone)]
pub struct Slots<T> {
    refreshed_at: Option<Instant>,
    values: HashMap<ContextKey, T>,
}

impl<T> Slots<T> {
    pub fn new() -> Self {
        Self {
            refreshed_at: None,
            values: HashMap::new(),
        }
    }

    /// Whether anything has been stored since creation or the last clear.
    pub fn is_populated(&self) -> bool {
        self.refreshed_at.is_some()
    }

    pub fn refreshed_at(&self) -> Option<Instant> {
        self.refreshed_at
    }

    /// Looks up a slot, ignoring age.
    pub fn get(&self, context: &ContextKey) -> Option<&T> {
        if self.is_populated() {
            self.values.get(context)
        } else {
            None
        }
    }

    pub fn contains(&self, context: &ContextKey) -> bool {
        self.get(context).is_some()
    }

    // == Is Fresh ==
    /// Returns the slot value if it exists and the shared timestamp is
    /// younger than `ttl`.
    ///
    /// Boundary condition: an age equal to `ttl` is stale.
    pub fn fresh(&self, context: &ContextKey, ttl: Duration, now: Instant) -> Option<&T> {
        let refreshed_at = self.refreshed_at?;
        if now.saturating_duration_since(refreshed_at) >= ttl {
            return None;
        }
        self.values.get(context)
    }

    // == Store ==
    /// Writes a slot and restarts the shared clock.
    pub fn store(&mut self, context: ContextKey, value: T, now: Instant) {
        self.values.insert(context, value);
        self.refreshed_at = Some(now);
    }

    /// Forgets the timestamp, leaving every slot unreachable until the next
    /// store. Stored values stay in place and come back with that store.
    pub fn expire(&mut self) {
        self.refreshed_at = None;
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<T> Default for Slots<T> {
    fn default() -> Self {
        Self::new()
    }
}
