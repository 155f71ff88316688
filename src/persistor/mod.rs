//! Persistor implementations: the optional secondary tier.
//!
//! On every miss the engine asks the persistor before the resolver. Entries
//! produced by the resolver are written through with [`Persistor::store`],
//! and `invalidate_object` forwards to [`Persistor::remove`].

use crate::entry::Entry;
use crate::error::Result;

#[cfg(feature = "persistence")]
pub mod directory;
#[cfg(feature = "persistence")]
pub mod memory;

#[cfg(feature = "persistence")]
pub use directory::DirectoryPersistor;
#[cfg(feature = "persistence")]
pub use memory::MemoryPersistor;

/// Trait for secondary-store implementations.
///
/// All methods take `&self`; implementations use interior mutability.
///
/// Entries returned by [`retrieve`](Persistor::retrieve) should carry the
/// update timestamp of the value's original creation (see
/// [`Entry::with_update_timestamp`]) so that TTL evaluation stays consistent
/// with the store.
pub trait Persistor<K, V>: Send + Sync {
    /// Look up a previously stored entry.
    ///
    /// # Returns
    /// - `Ok(Some(entry))` - entry found
    /// - `Ok(None)` - nothing stored for this key
    ///
    /// # Errors
    /// Returns `Err` if the backing store fails. The engine falls through to
    /// its resolver when it has one.
    fn retrieve(&self, key: &K) -> Result<Option<Entry<V>>>;

    /// Store an entry freshly produced by the resolver.
    ///
    /// # Errors
    /// Returns `Err` if the backing store fails. The engine logs and ignores
    /// store failures.
    fn store(&self, key: &K, entry: &Entry<V>) -> Result<()>;

    /// Drop any stored entry for `key`.
    ///
    /// Default implementation does nothing.
    ///
    /// # Errors
    /// Returns `Err` if the backing store fails
    fn remove(&self, _key: &K) -> Result<()> {
        Ok(())
    }
}

/// Default persistor: never finds anything and ignores stores.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopPersistor;

impl<K, V> Persistor<K, V> for NoopPersistor {
    fn retrieve(&self, _key: &K) -> Result<Option<Entry<V>>> {
        Ok(None)
    }

    fn store(&self, _key: &K, _entry: &Entry<V>) -> Result<()> {
        Ok(())
    }
}
