//! Cache configuration.
//!
//! A [`CacheConfig`] is applied to engines either directly
//! (`ObjectCache::with_config`) or through a `CacheFactory`, which stamps the
//! same settings on every cache it builds.
//!
//! ```
//! use object_cache::CacheConfig;
//! use std::time::Duration;
//!
//! let config = CacheConfig::default()
//!     .with_ttl(Duration::from_millis(500))
//!     .with_soft_capacity(10_000)
//!     .with_sweep_interval(Duration::from_secs(30));
//!
//! assert_eq!(config.ttl_millis, 500);
//! assert_eq!(config.sweep_interval(), Some(Duration::from_secs(30)));
//! ```
//!
//! Configs can also be loaded from JSON; missing fields take their defaults:
//!
//! ```
//! use object_cache::CacheConfig;
//!
//! let config = CacheConfig::from_json(r#"{ "ttl_millis": 1000 }"#).unwrap();
//! assert_eq!(config.ttl_millis, 1000);
//! assert_eq!(config.soft_capacity, None);
//! ```

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Time-to-live in milliseconds. `<= 0` disables time-based expiry.
    pub ttl_millis: i64,

    /// Maximum number of slots a soft-keyed cache keeps before it sheds the
    /// least recently accessed ones. `None` = unbounded.
    ///
    /// Only slots whose key is held by nobody but the cache are shed, so the
    /// cache may stay above this bound while callers pin their keys.
    pub soft_capacity: Option<usize>,

    /// Interval for the background sweeper, if one is spawned through
    /// `CacheFactory::spawn_sweeper`.
    pub sweep_interval_millis: Option<u64>,
}

impl CacheConfig {
    /// Parse a JSON config document.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if the document is malformed
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_ttl(self, ttl: Duration) -> Self {
        self.with_ttl_millis(ttl.as_millis().min(i64::MAX as u128) as i64)
    }

    pub fn with_ttl_millis(mut self, ttl_millis: i64) -> Self {
        self.ttl_millis = ttl_millis;
        self
    }

    pub fn with_soft_capacity(mut self, capacity: usize) -> Self {
        self.soft_capacity = Some(capacity);
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval_millis = Some(interval.as_millis().min(u64::MAX as u128) as u64);
        self
    }

    /// Configured sweep interval; zero intervals count as unset.
    pub fn sweep_interval(&self) -> Option<Duration> {
        self.sweep_interval_millis
            .filter(|millis| *millis > 0)
            .map(Duration::from_millis)
    }
}
