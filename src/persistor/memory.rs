//! In-memory persistor (thread-safe, byte-encoded).
//!
//! Keeps each entry as an enveloped byte record in a `DashMap`, so values
//! survive engine-level eviction (key reclamation, invalidation by another
//! engine, `clear`) for as long as the persistor itself lives.

use super::Persistor;
use crate::entry::Entry;
use crate::error::Result;
use crate::serialization::{decode_entry, encode_entry};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;

/// Thread-safe in-memory persistor.
///
/// Cloning is cheap and clones share the same store, so one persistor can
/// back several caches.
///
/// # Example
///
/// ```
/// use object_cache::persistor::{MemoryPersistor, Persistor};
/// use object_cache::Entry;
///
/// let persistor: MemoryPersistor<String, u64> = MemoryPersistor::new();
/// persistor.store(&"gc-count".to_string(), &Entry::new(17)).unwrap();
///
/// let entry = persistor.retrieve(&"gc-count".to_string()).unwrap();
/// assert_eq!(entry.map(|e| *e.content()), Some(17));
/// ```
pub struct MemoryPersistor<K, V> {
    store: Arc<DashMap<K, Vec<u8>>>,
    _value: PhantomData<fn() -> V>,
}

impl<K, V> Clone for MemoryPersistor<K, V> {
    fn clone(&self) -> Self {
        MemoryPersistor {
            store: Arc::clone(&self.store),
            _value: PhantomData,
        }
    }
}

impl<K: Eq + Hash, V> MemoryPersistor<K, V> {
    /// Create a new empty persistor.
    pub fn new() -> Self {
        MemoryPersistor {
            store: Arc::new(DashMap::new()),
            _value: PhantomData,
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Total encoded size of all records.
    pub fn total_bytes(&self) -> usize {
        self.store.iter().map(|record| record.value().len()).sum()
    }

    /// Drop every stored record.
    pub fn clear(&self) {
        self.store.clear();
        warn!("MemoryPersistor CLEAR executed - all persisted entries dropped");
    }

    #[cfg(test)]
    pub(crate) fn insert_raw(&self, key: K, bytes: Vec<u8>) {
        self.store.insert(key, bytes);
    }
}

impl<K: Eq + Hash, V> Default for MemoryPersistor<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Persistor<K, V> for MemoryPersistor<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync,
    V: Serialize + DeserializeOwned + Clone,
{
    fn retrieve(&self, key: &K) -> Result<Option<Entry<V>>> {
        let Some(bytes) = self.store.get(key).map(|record| record.value().clone()) else {
            debug!("MemoryPersistor GET {:?} -> MISS", key);
            return Ok(None);
        };

        match decode_entry(&bytes) {
            Ok(entry) => {
                debug!("MemoryPersistor GET {:?} -> HIT", key);
                Ok(Some(entry))
            }
            Err(e) => {
                if e.is_corrupt_record() {
                    self.store.remove(key);
                }
                Err(e)
            }
        }
    }

    fn store(&self, key: &K, entry: &Entry<V>) -> Result<()> {
        let bytes = encode_entry(entry)?;
        self.store.insert(key.clone(), bytes);
        debug!("MemoryPersistor SET {:?}", key);
        Ok(())
    }

    fn remove(&self, key: &K) -> Result<()> {
        self.store.remove(key);
        debug!("MemoryPersistor DELETE {:?}", key);
        Ok(())
    }
}
