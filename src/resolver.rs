//! Resolver trait: computes values on a cache miss.
//!
//! A resolver is the last stage of miss resolution. The engine consults it
//! only after the persistor has missed, and holds the key's slot lock while
//! it runs, so a slow resolver delays other callers of the *same* key but
//! never callers of different keys.
//!
//! # Return contract
//!
//! - `Ok(Some(entry))` - value produced, the engine caches it
//! - `Ok(None)` - value is not cacheable right now; nothing is stored and the
//!   next lookup asks again
//! - `Err(e)` - resolution failed; propagated to the caller, prior entries
//!   untouched
//!
//! # Implementing Resolver
//!
//! Any `Fn(&K) -> Result<Option<Entry<V>>>` closure is a resolver:
//!
//! ```
//! use object_cache::{Entry, KeyStrength, ObjectCache, Result};
//! use std::sync::Arc;
//!
//! let cache = ObjectCache::new(KeyStrength::Soft).with_resolver(
//!     |pid: &u32| -> Result<Option<Entry<String>>> { Ok(Some(Entry::new(format!("jvm-{}", pid)))) },
//! );
//!
//! let value = cache.retrieve_object(&Arc::new(4242)).unwrap();
//! assert_eq!(value.as_deref(), Some("jvm-4242"));
//! ```
//!
//! For infallible producers that only return a value, see [`from_value_fn`].

use crate::entry::Entry;
use crate::error::Result;
use std::marker::PhantomData;

/// Strategy producing a fresh entry for a key on a genuine miss.
pub trait Resolver<K, V>: Send + Sync {
    /// Compute the entry for `key`.
    ///
    /// # Errors
    /// Returns `Err` if the value could not be computed
    fn resolve(&self, key: &K) -> Result<Option<Entry<V>>>;
}

impl<K, V, F> Resolver<K, V> for F
where
    F: Fn(&K) -> Result<Option<Entry<V>>> + Send + Sync,
{
    fn resolve(&self, key: &K) -> Result<Option<Entry<V>>> {
        self(key)
    }
}

/// Resolver that never produces a value.
///
/// A cache built without a resolver behaves as if it had this one, except
/// that persistor failures are then propagated instead of swallowed.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullResolver;

impl<K, V> Resolver<K, V> for NullResolver {
    fn resolve(&self, _key: &K) -> Result<Option<Entry<V>>> {
        Ok(None)
    }
}

/// Adapter turning an infallible `Fn(&K) -> Option<V>` into a resolver.
pub struct ValueResolver<K, V, F> {
    produce: F,
    _types: PhantomData<fn(&K) -> V>,
}

/// Build a resolver from a function that returns the bare value.
///
/// The produced entries are stamped with the current time.
///
/// ```
/// use object_cache::resolver::{from_value_fn, Resolver};
///
/// let resolver = from_value_fn(|name: &String| {
///     (!name.is_empty()).then(|| name.len())
/// });
///
/// let entry = resolver.resolve(&"threads".to_string()).unwrap();
/// assert_eq!(entry.map(|e| *e.content()), Some(7));
/// assert!(resolver.resolve(&String::new()).unwrap().is_none());
/// ```
pub fn from_value_fn<K, V, F>(produce: F) -> ValueResolver<K, V, F>
where
    F: Fn(&K) -> Option<V> + Send + Sync,
{
    ValueResolver {
        produce,
        _types: PhantomData,
    }
}

impl<K, V, F> Resolver<K, V> for ValueResolver<K, V, F>
where
    F: Fn(&K) -> Option<V> + Send + Sync,
{
    fn resolve(&self, key: &K) -> Result<Option<Entry<V>>> {
        Ok((self.produce)(key).map(Entry::new))
    }
}
