//! Cache factory: builds configured engines.
//!
//! Every engine a factory builds is independent (own map, own TTL) but
//! starts from the factory's [`CacheConfig`].
//!
//! ```
//! use object_cache::{CacheConfig, CacheFactory, Entry, KeyStrength, Result};
//! use std::sync::Arc;
//!
//! let factory = CacheFactory::new(CacheConfig::default().with_ttl_millis(500));
//! let cache = factory.new_resolving_cache(
//!     KeyStrength::Soft,
//!     |_key: &String| -> Result<Option<Entry<String>>> { Ok(Some(Entry::new("test".to_string()))) },
//! );
//!
//! assert_eq!(cache.get_ttl(), 500);
//! assert_eq!(
//!     cache.retrieve_object(&Arc::new("key".to_string())).unwrap(),
//!     Some("test".to_string())
//! );
//! ```

use crate::cache::ObjectCache;
use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::key::KeyStrength;
use crate::persistor::Persistor;
use crate::resolver::Resolver;
use crate::sweeper::Sweeper;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

/// Composition root for [`ObjectCache`] instances.
#[derive(Clone, Debug, Default)]
pub struct CacheFactory {
    config: CacheConfig,
}

impl CacheFactory {
    pub fn new(config: CacheConfig) -> Self {
        CacheFactory { config }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Cache with neither resolver nor persistor; every miss returns `None`.
    pub fn new_cache<K, V>(&self, strength: KeyStrength) -> ObjectCache<K, V>
    where
        K: Hash + Eq + Debug + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        debug!("Creating {} cache with {:?}", strength, self.config);
        ObjectCache::new(strength).with_config(&self.config)
    }

    /// Cache that computes misses with `resolver`.
    pub fn new_resolving_cache<K, V, R>(&self, strength: KeyStrength, resolver: R) -> ObjectCache<K, V>
    where
        K: Hash + Eq + Debug + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
        R: Resolver<K, V> + 'static,
    {
        self.new_cache(strength).with_resolver(resolver)
    }

    /// Cache backed by `persistor` and no resolver. Persistor failures are
    /// propagated to callers.
    pub fn new_persistent_cache<K, V, P>(&self, strength: KeyStrength, persistor: P) -> ObjectCache<K, V>
    where
        K: Hash + Eq + Debug + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
        P: Persistor<K, V> + 'static,
    {
        self.new_cache(strength).with_persistor(persistor)
    }

    /// Cache consulting `persistor` first, then `resolver`.
    pub fn new_cache_with<K, V, R, P>(
        &self,
        strength: KeyStrength,
        resolver: R,
        persistor: P,
    ) -> ObjectCache<K, V>
    where
        K: Hash + Eq + Debug + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
        R: Resolver<K, V> + 'static,
        P: Persistor<K, V> + 'static,
    {
        self.new_cache(strength)
            .with_resolver(resolver)
            .with_persistor(persistor)
    }

    /// Start a background sweeper for `cache` at the configured interval.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - `Error::ConfigError` if no sweep interval is configured
    /// - `Error::Other` if there is no current tokio runtime
    pub fn spawn_sweeper<K, V>(&self, cache: &Arc<ObjectCache<K, V>>) -> Result<Sweeper>
    where
        K: Hash + Eq + Debug + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let interval = self.config.sweep_interval().ok_or_else(|| {
            Error::ConfigError("sweep_interval_millis is not set".to_string())
        })?;
        Sweeper::spawn(cache, interval)
    }
}
