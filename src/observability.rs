//! Observability hooks for cache operations.
//!
//! Implement [`CacheMetrics`] to feed cache behaviour into your monitoring
//! system:
//!
//! ```ignore
//! use object_cache::observability::CacheMetrics;
//! use std::fmt::Debug;
//! use std::time::Duration;
//!
//! struct PrometheusMetrics;
//!
//! impl CacheMetrics for PrometheusMetrics {
//!     fn record_hit(&self, _key: &dyn Debug, _duration: Duration) {
//!         // counter!("object_cache_hits").inc();
//!     }
//!     // ... implement other methods
//! }
//!
//! // let cache = ObjectCache::new(KeyStrength::Soft)
//! //     .with_metrics(Box::new(PrometheusMetrics));
//! ```
//!
//! The engine defaults to [`NoOpMetrics`]. Hooks you do not override log
//! through the `log` crate.
//!
//! | Hook | Fired when |
//! |------|------------|
//! | `record_hit` | a fresh entry was served from the map |
//! | `record_miss` | the key was absent or stale and nothing could be produced |
//! | `record_resolve` | a persistor or resolver produced a new entry |
//! | `record_invalidate` | `invalidate_object` removed a slot |
//! | `record_purge` | housekeeping dropped reclaimed or shed slots |
//! | `record_error` | a resolver or persistor failed |

use std::fmt::Debug;
use std::time::Duration;

/// Trait for cache metrics collection.
pub trait CacheMetrics: Send + Sync {
    /// Record a cache hit.
    fn record_hit(&self, key: &dyn Debug, duration: Duration) {
        debug!("Cache HIT: {:?} took {:?}", key, duration);
    }

    /// Record a miss that produced no value.
    fn record_miss(&self, key: &dyn Debug, duration: Duration) {
        debug!("Cache MISS: {:?} took {:?}", key, duration);
    }

    /// Record a miss that was filled by the persistor or resolver.
    fn record_resolve(&self, key: &dyn Debug, duration: Duration) {
        debug!("Cache RESOLVE: {:?} took {:?}", key, duration);
    }

    /// Record an invalidation.
    fn record_invalidate(&self, key: &dyn Debug) {
        debug!("Cache INVALIDATE: {:?}", key);
    }

    /// Record slots dropped by housekeeping.
    fn record_purge(&self, count: usize) {
        debug!("Cache PURGE: {} slots", count);
    }

    /// Record an error.
    fn record_error(&self, key: &dyn Debug, error: &str) {
        warn!("Cache ERROR for {:?}: {}", key, error);
    }
}

/// Default metrics implementation (no-op).
#[derive(Clone, Default)]
pub struct NoOpMetrics;

impl CacheMetrics for NoOpMetrics {
    fn record_hit(&self, _key: &dyn Debug, _duration: Duration) {}
    fn record_miss(&self, _key: &dyn Debug, _duration: Duration) {}
    fn record_resolve(&self, _key: &dyn Debug, _duration: Duration) {}
    fn record_invalidate(&self, _key: &dyn Debug) {}
    fn record_purge(&self, _count: usize) {}
    fn record_error(&self, _key: &dyn Debug, _error: &str) {}
}

/// Metrics implementation that only logs (every hook uses its default body).
#[derive(Clone, Default)]
pub struct LogMetrics;

impl CacheMetrics for LogMetrics {}
