//! Bounded-Wait Lock Module
//!
//! Mutual exclusion with a deadline and a pluggable failure callback.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};

use crate::cache::CacheSettings;
use crate::config::INFINITE_LOCK_TIMEOUT_MS;
use crate::error::{CacheError, LockTimedOut, Result};

// == Lock Timeout ==
/// How long to wait for a cache lock before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockTimeout {
    /// Block until the lock is free
    #[default]
    Infinite,
    /// Give up after the given duration
    After(Duration),
}

impl LockTimeout {
    /// Converts a millisecond count, where `-1` means infinite.
    pub fn from_millis(millis: i64) -> Result<Self> {
        match millis {
            INFINITE_LOCK_TIMEOUT_MS => Ok(Self::Infinite),
            ms if ms >= 0 => Ok(Self::After(Duration::from_millis(ms as u64))),
            ms => Err(CacheError::InvalidLockTimeout(ms)),
        }
    }

    /// The bounded wait, or `None` when infinite.
    pub fn duration(self) -> Option<Duration> {
        match self {
            Self::Infinite => None,
            Self::After(duration) => Some(duration),
        }
    }
}

impl From<Duration> for LockTimeout {
    fn from(duration: Duration) -> Self {
        Self::After(duration)
    }
}

// == Bounded Lock ==
/// A mutex whose acquisition is bounded by a deadline fixed at construction.
///
/// When the deadline elapses, the failed-lock handler of the attached
/// [`CacheSettings`] is looked up at that moment and called once with the
/// deadline. The lock is not reentrant: acquiring it again from the thread
/// that holds it waits out the full deadline and then fails.
pub struct BoundedLock<S> {
    state: Mutex<S>,
    timeout: LockTimeout,
    settings: Arc<CacheSettings>,
}

impl<S> BoundedLock<S> {
    pub fn new(state: S, timeout: LockTimeout, settings: Arc<CacheSettings>) -> Self {
        Self {
            state: Mutex::new(state),
            timeout,
            settings,
        }
    }

    /// The deadline captured at construction.
    pub fn timeout(&self) -> LockTimeout {
        self.timeout
    }

    pub fn settings(&self) -> &Arc<CacheSettings> {
        &self.settings
    }

    // == Acquire ==
    /// Tries to take the lock within the deadline.
    ///
    /// The guard releases the lock on drop, including during unwinding.
    pub fn acquire(&self) -> std::result::Result<MutexGuard<'_, S>, LockTimedOut> {
        match self.timeout {
            LockTimeout::Infinite => Ok(self.state.lock()),
            LockTimeout::After(waited) => self.state.try_lock_for(waited).ok_or_else(|| {
                self.settings.notify_failed_lock(waited);
                LockTimedOut { waited }
            }),
        }
    }
}
