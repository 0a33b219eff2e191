//! Cache Settings Module
//!
//! The configuration value injected into every cache: the default lock wait
//! and the handler called when a lock wait runs out.

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::RwLock;
use tracing::warn;

use crate::cache::LockTimeout;
use crate::config::Config;
use crate::error::Result;

/// Callback invoked with the elapsed deadline when a cache lock is not acquired.
pub type FailedLockHandler = Arc<dyn Fn(Duration) + Send + Sync>;

static SHARED_SETTINGS: OnceLock<Arc<CacheSettings>> = OnceLock::new();

// == Cache Settings ==
/// Settings shared by the caches built from them.
///
/// Caches copy the default lock timeout once, when they are constructed, but
/// look up the failed-lock handler every time a lock wait fails. Changing the
/// timeout therefore only affects caches built afterwards, while a new
/// handler applies to existing caches immediately.
pub struct CacheSettings {
    default_lock_timeout: RwLock<LockTimeout>,
    failed_lock_handler: RwLock<FailedLockHandler>,
}

impl CacheSettings {
    /// Infinite lock wait, failures logged at `warn`.
    pub fn new() -> Self {
        Self::with_lock_timeout(LockTimeout::Infinite)
    }

    pub fn with_lock_timeout(timeout: LockTimeout) -> Self {
        let handler: FailedLockHandler = Arc::new(log_failed_lock);
        Self {
            default_lock_timeout: RwLock::new(timeout),
            failed_lock_handler: RwLock::new(handler),
        }
    }

    /// Builds settings from the ambient configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::with_lock_timeout(config.lock_timeout()?))
    }

    // == Shared ==
    /// Process-wide settings used by the parameterless cache constructors.
    ///
    /// Initialised from [`Config::from_env`] on first use.
    pub fn shared() -> Arc<CacheSettings> {
        SHARED_SETTINGS
            .get_or_init(|| {
                let config = Config::from_env();
                let settings = Self::from_config(&config).unwrap_or_default();
                Arc::new(settings)
            })
            .clone()
    }

    pub fn default_lock_timeout(&self) -> LockTimeout {
        *self.default_lock_timeout.read()
    }

    /// Changes the timeout picked up by caches constructed from now on.
    pub fn set_default_lock_timeout(&self, timeout: LockTimeout) {
        *self.default_lock_timeout.write() = timeout;
    }

    /// Replaces the failed-lock handler for every cache using these settings.
    pub fn set_failed_lock_handler<F>(&self, handler: F)
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        *self.failed_lock_handler.write() = Arc::new(handler);
    }

    /// Restores the logging handler.
    pub fn reset_failed_lock_handler(&self) {
        *self.failed_lock_handler.write() = Arc::new(log_failed_lock);
    }

    /// Calls the current failed-lock handler.
    pub fn notify_failed_lock(&self, waited: Duration) {
        // Cloned out so the handler may replace itself.
        let handler = Arc::clone(&self.failed_lock_handler.read());
        handler(waited);
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CacheSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheSettings")
            .field("default_lock_timeout", &self.default_lock_timeout())
            .finish_non_exhaustive()
    }
}

fn log_failed_lock(waited: Duration) {
    warn!(
        waited_ms = waited.as_millis() as u64,
        "Cache lock not acquired before timeout"
    );
}
