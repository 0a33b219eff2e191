//! Configuration Module
//!
//! Handles loading the ambient cache configuration from environment variables.

use std::env;

use serde::Deserialize;

use crate::cache::LockTimeout;
use crate::error::{CacheError, Result};

/// Environment variable holding the default lock timeout in milliseconds.
pub const LOCK_TIMEOUT_ENV: &str = "MEMO_CACHE_LOCK_TIMEOUT_MS";

/// Lock timeout value meaning "wait forever".
pub const INFINITE_LOCK_TIMEOUT_MS: i64 = -1;

/// Ambient cache configuration.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default lock wait in milliseconds, `-1` for infinite
    pub lock_timeout_ms: i64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// Unparseable or out-of-range values fall back to the defaults.
    ///
    /// # Environment Variables
    /// - `MEMO_CACHE_LOCK_TIMEOUT_MS` - Default lock wait (default: -1, infinite)
    pub fn from_env() -> Self {
        Self::try_from_env().unwrap_or_default()
    }

    /// Like [`Config::from_env`], but reports invalid values instead of
    /// falling back.
    pub fn try_from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a Config from any variable source, `lookup` returning the raw
    /// value of a variable if it is set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lock_timeout_ms = match lookup(LOCK_TIMEOUT_ENV) {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .map_err(|_| CacheError::InvalidConfig {
                    key: LOCK_TIMEOUT_ENV.to_string(),
                    value: raw.clone(),
                })?,
            None => INFINITE_LOCK_TIMEOUT_MS,
        };

        let config = Self { lock_timeout_ms };
        config.lock_timeout()?;
        Ok(config)
    }

    /// The configured lock timeout.
    pub fn lock_timeout(&self) -> Result<LockTimeout> {
        LockTimeout::from_millis(self.lock_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lock_timeout_ms: INFINITE_LOCK_TIMEOUT_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.lock_timeout_ms, -1);
        assert_eq!(config.lock_timeout().unwrap(), LockTimeout::Infinite);
    }

    fn lookup(value: Option<&'static str>) -> impl Fn(&str) -> Option<String> {
        move |key: &str| {
            assert_eq!(key, LOCK_TIMEOUT_ENV);
            value.map(str::to_string)
        }
    }

    // The process environment is never written here: other tests may
    // initialise the shared settings from it concurrently.
    #[test]
    fn test_config_from_lookup() {
        assert_eq!(Config::from_lookup(lookup(None)), Ok(Config::default()));

        let config = Config::from_lookup(lookup(Some(" 2000 "))).unwrap();
        assert_eq!(
            config.lock_timeout().unwrap(),
            LockTimeout::After(Duration::from_secs(2))
        );

        assert_eq!(
            Config::from_lookup(lookup(Some("-1"))).unwrap().lock_timeout().unwrap(),
            LockTimeout::Infinite
        );
    }

    #[test]
    fn test_config_from_lookup_rejects_invalid_values() {
        assert!(matches!(
            Config::from_lookup(lookup(Some("soon"))),
            Err(CacheError::InvalidConfig { .. })
        ));
        assert_eq!(
            Config::from_lookup(lookup(Some("-7"))),
            Err(CacheError::InvalidLockTimeout(-7))
        );
    }

    #[test]
    fn test_config_from_env_falls_back_to_default() {
        if env::var(LOCK_TIMEOUT_ENV).is_err() {
            assert_eq!(Config::from_env(), Config::default());
        }
    }

    #[test]
    fn test_config_deserialize() {
        let config: Config = serde_json::from_str(r#"{"lock_timeout_ms": 250}"#).unwrap();
        assert_eq!(config.lock_timeout_ms, 250);

        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
    }
}
