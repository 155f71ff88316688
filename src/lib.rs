//! # object-cache
//!
//! An adaptive, thread-safe object cache for memoizing expensive values.
//!
//! ## Features
//!
//! - **Weak or soft keys:** slots live only as long as callers hold the key
//!   (weak), or until the cache sheds them under its soft capacity (soft)
//! - **TTL expiry:** boundary-inclusive, adjustable at runtime
//! - **Resolution chain:** on a miss, a [`Persistor`] is consulted before a
//!   [`Resolver`]; "no value" is never cached
//! - **Single-flight:** at most one resolution per key is in flight, while
//!   distinct keys never block each other
//! - **Production ready:** `log`-based logging, metrics hooks, optional
//!   background sweeper
//!
//! ## Quick Start
//!
//! ```
//! use object_cache::{CacheConfig, CacheFactory, Entry, KeyStrength, Result};
//! use std::sync::Arc;
//!
//! // 1. Configure a factory
//! let factory = CacheFactory::new(CacheConfig::default().with_ttl_millis(500));
//!
//! // 2. Build a cache with a resolver
//! let cache = factory.new_resolving_cache(
//!     KeyStrength::Soft,
//!     |pid: &u32| -> Result<Option<Entry<String>>> {
//!         Ok(Some(Entry::new(format!("heap histogram of {}", pid))))
//!     },
//! );
//!
//! // 3. Look values up; keys are shared through Arc
//! let pid = Arc::new(4242);
//! let histogram = cache.retrieve_object(&pid)?;
//! assert_eq!(histogram.as_deref(), Some("heap histogram of 4242"));
//!
//! // 4. Drop stale knowledge explicitly when needed
//! cache.invalidate_object(&pid);
//! # Ok::<(), object_cache::Error>(())
//! ```
//!
//! ## Sharing
//!
//! [`ObjectCache`] methods take `&self`; wrap it in `Arc` to share it across
//! threads, and hand that `Arc` to a [`Sweeper`] for periodic housekeeping.

#[macro_use]
extern crate log;

pub mod cache;
pub mod config;
pub mod entry;
pub mod error;
pub mod factory;
pub mod key;
pub mod observability;
pub mod persistor;
pub mod resolver;
#[cfg(feature = "persistence")]
pub mod serialization;
pub mod sweeper;

// Re-exports for convenience
pub use cache::{CacheStats, ObjectCache};
pub use config::CacheConfig;
pub use entry::Entry;
pub use error::{Error, Result};
pub use factory::CacheFactory;
pub use key::{KeyRef, KeyStrength};
pub use observability::{CacheMetrics, LogMetrics, NoOpMetrics};
pub use persistor::{NoopPersistor, Persistor};
pub use resolver::{NullResolver, Resolver};
pub use sweeper::Sweeper;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
