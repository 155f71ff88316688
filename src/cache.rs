//! Cache engine - main entry point for cache operations.
//!
//! # Lookup protocol
//!
//! ```text
//! retrieve_object(key)
//!   ├─ slot present and fresh ──────────────► bump access time, return content
//!   └─ slot absent or stale
//!        ├─ persistor.retrieve(key) hit ────► install entry, return content
//!        └─ resolver.resolve(key)
//!             ├─ Some(entry) ───────────────► install, write through, return content
//!             ├─ None ──────────────────────► return None, store nothing
//!             └─ Err ───────────────────────► propagate, prior entry untouched
//! ```
//!
//! # Locking
//!
//! The map (a `DashMap`) only guards slot structure. Each slot carries its own
//! mutex, held across the "check, resolve, install" sequence, so at most one
//! persistor/resolver call per key is in flight while other keys proceed in
//! parallel. Map locks are never held while a slot mutex is awaited.
//!
//! A slot that leaves the map (invalidation, purge, failed first resolution)
//! is marked retired first; callers that were queued on its mutex observe the
//! flag and retry against the map. Invalidation retires a slot only while
//! holding its mutex, so it waits out any resolution already running.
//!
//! # Housekeeping
//!
//! Insertions double as maintenance points. A weak cache drops reclaimed
//! slots once the map has doubled since the last such pass; a soft cache
//! with a capacity sheds down to it. Neither needs a [`Sweeper`] to stay
//! bounded.
//!
//! [`Sweeper`]: crate::sweeper::Sweeper

use crate::config::CacheConfig;
use crate::entry::Entry;
use crate::error::Result;
use crate::key::{KeyRef, KeyStrength};
use crate::observability::{CacheMetrics, NoOpMetrics};
use crate::persistor::{NoopPersistor, Persistor};
use crate::resolver::Resolver;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

/// Slot count below which insertions never trigger a reclaim pass.
const RECLAIM_FLOOR: usize = 64;

struct Slot<V> {
    entry: Mutex<Option<Entry<V>>>,
    retired: AtomicBool,
}

impl<V> Slot<V> {
    fn new() -> Self {
        Slot {
            entry: Mutex::new(None),
            retired: AtomicBool::new(false),
        }
    }

    fn retire(&self) {
        self.retired.store(true, Ordering::Release);
    }

    fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }
}

/// Cache occupancy statistics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheStats {
    /// Slots currently in the map, including ones being resolved.
    pub total_slots: usize,
    /// Slots holding an entry (slots locked by an in-flight resolution are
    /// not counted).
    pub populated_entries: usize,
    /// Slots whose key has been reclaimed and which await a purge.
    pub reclaimed_keys: usize,
    pub ttl_millis: i64,
}

/// Adaptive object cache.
///
/// Memoizes values per key, with weak or soft key retention, optional TTL
/// expiry, and a persistor → resolver chain on misses.
///
/// # Example
///
/// ```
/// use object_cache::{Entry, KeyStrength, ObjectCache, Result};
/// use std::sync::Arc;
///
/// let cache = ObjectCache::new(KeyStrength::Soft).with_resolver(
///     |key: &String| -> Result<Option<Entry<usize>>> { Ok(Some(Entry::new(key.len()))) },
/// );
/// cache.set_ttl(500);
///
/// let key = Arc::new("heap-dump".to_string());
/// assert_eq!(cache.retrieve_object(&key).unwrap(), Some(9));
/// assert_eq!(cache.invalidate_object(&key), Some(9));
/// ```
pub struct ObjectCache<K, V> {
    map: DashMap<KeyRef<K>, Arc<Slot<V>>>,
    strength: KeyStrength,
    ttl_millis: AtomicI64,
    soft_capacity: Option<usize>,
    /// Slot count at which the next insertion runs `purge_reclaimed`.
    reclaim_mark: AtomicUsize,
    /// Slot count at which the next insertion runs `shed_soft`; raised while
    /// every slot over capacity is pinned.
    shed_mark: AtomicUsize,
    resolver: Option<Box<dyn Resolver<K, V>>>,
    persistor: Box<dyn Persistor<K, V>>,
    metrics: Box<dyn CacheMetrics>,
    #[cfg(test)]
    shed_scans: AtomicUsize,
}

impl<K, V> ObjectCache<K, V>
where
    K: Hash + Eq + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create an empty cache with no resolver, the no-op persistor and TTL
    /// disabled.
    pub fn new(strength: KeyStrength) -> Self {
        ObjectCache {
            map: DashMap::new(),
            strength,
            ttl_millis: AtomicI64::new(0),
            soft_capacity: None,
            reclaim_mark: AtomicUsize::new(RECLAIM_FLOOR),
            shed_mark: AtomicUsize::new(0),
            resolver: None,
            persistor: Box::new(NoopPersistor),
            metrics: Box::new(NoOpMetrics),
            #[cfg(test)]
            shed_scans: AtomicUsize::new(0),
        }
    }

    /// Set the resolver consulted on misses.
    pub fn with_resolver<R>(mut self, resolver: R) -> Self
    where
        R: Resolver<K, V> + 'static,
    {
        self.resolver = Some(Box::new(resolver));
        self
    }

    /// Set the persistor consulted before the resolver.
    pub fn with_persistor<P>(mut self, persistor: P) -> Self
    where
        P: Persistor<K, V> + 'static,
    {
        self.persistor = Box::new(persistor);
        self
    }

    /// Set custom metrics handler.
    pub fn with_metrics(mut self, metrics: Box<dyn CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Apply TTL and soft capacity from `config`.
    pub fn with_config(mut self, config: &CacheConfig) -> Self {
        self.ttl_millis = AtomicI64::new(config.ttl_millis);
        self.soft_capacity = config.soft_capacity;
        self
    }

    pub fn strength(&self) -> KeyStrength {
        self.strength
    }

    pub fn has_resolver(&self) -> bool {
        self.resolver.is_some()
    }

    /// Current TTL in milliseconds (`<= 0` = never time-expire).
    pub fn get_ttl(&self) -> i64 {
        self.ttl_millis.load(Ordering::Relaxed)
    }

    /// Change the TTL. Takes effect on the next lookup; existing entries are
    /// not swept.
    pub fn set_ttl(&self, ttl_millis: i64) {
        self.ttl_millis.store(ttl_millis, Ordering::Relaxed);
        debug!("Cache TTL set to {}ms", ttl_millis);
    }

    /// Look up the value for `key`, resolving it on a miss.
    ///
    /// # Returns
    /// - `Ok(Some(value))` - fresh cached value, or newly resolved value
    /// - `Ok(None)` - nothing cacheable exists for the key (not stored)
    ///
    /// # Errors
    ///
    /// - the resolver's error, if it failed
    /// - the persistor's error, if it failed and there is no resolver
    pub fn retrieve_object(&self, key: &Arc<K>) -> Result<Option<V>> {
        let timer = Instant::now();
        let probe = KeyRef::new(key, self.strength);
        let mut installed = false;

        let result = loop {
            let slot = self.slot_for(&probe, key);
            let mut guard = slot.entry.lock();
            if slot.is_retired() {
                drop(guard);
                self.discard(&probe, &slot);
                continue;
            }

            let ttl = self.get_ttl();
            let now = SystemTime::now();
            if let Some(entry) = guard.as_mut() {
                if entry.is_fresh_at(ttl, now) {
                    entry.touch(now);
                    self.metrics.record_hit(&**key, timer.elapsed());
                    break Ok(Some(entry.content().clone()));
                }
                debug!(
                    "Entry for {:?} is stale (age {:?}, ttl {}ms)",
                    key,
                    entry.age_at(now),
                    ttl
                );
            }

            match self.resolve(key, ttl) {
                Ok(Some(entry)) => {
                    let content = entry.content().clone();
                    *guard = Some(entry);
                    installed = true;
                    self.metrics.record_resolve(&**key, timer.elapsed());
                    break Ok(Some(content));
                }
                Ok(None) => {
                    if guard.is_none() {
                        slot.retire();
                        self.discard(&probe, &slot);
                    }
                    self.metrics.record_miss(&**key, timer.elapsed());
                    break Ok(None);
                }
                Err(e) => {
                    if guard.is_none() {
                        slot.retire();
                        self.discard(&probe, &slot);
                    }
                    break Err(e);
                }
            }
        };

        if installed {
            self.after_insert();
        }
        result
    }

    /// Remove the entry for `key`, returning its content if there was one.
    ///
    /// The persistor's record is removed as well, so the next lookup goes to
    /// the resolver.
    ///
    /// Blocks while a resolution for `key` is in flight. The persistor record
    /// is removed under the same slot lock, so it cannot interleave with a
    /// persistor call made by a concurrent lookup.
    pub fn invalidate_object(&self, key: &Arc<K>) -> Option<V> {
        let probe = KeyRef::new(key, self.strength);

        let previous = loop {
            let slot = self.slot_for(&probe, key);
            let mut guard = slot.entry.lock();
            if slot.is_retired() {
                drop(guard);
                self.discard(&probe, &slot);
                continue;
            }

            slot.retire();
            let taken = guard.take();
            if let Err(e) = self.persistor.remove(&**key) {
                warn!("Persistor remove failed for {:?}: {}", key, e);
                self.metrics.record_error(&**key, &e.to_string());
            }
            self.discard(&probe, &slot);
            break taken;
        };

        self.metrics.record_invalidate(&**key);
        previous.map(Entry::into_content)
    }

    /// Persistor, then resolver. Runs under the key's slot lock.
    fn resolve(&self, key: &Arc<K>, ttl_millis: i64) -> Result<Option<Entry<V>>> {
        let key: &K = key;

        match self.persistor.retrieve(key) {
            Ok(Some(entry)) => {
                if entry.is_fresh_at(ttl_millis, SystemTime::now()) {
                    debug!("Persistor hit for {:?}", key);
                    return Ok(Some(entry));
                }
                debug!("Persisted entry for {:?} already expired, ignoring it", key);
            }
            Ok(None) => {}
            Err(e) => {
                self.metrics.record_error(key, &e.to_string());
                if self.resolver.is_none() {
                    return Err(e);
                }
                warn!(
                    "Persistor lookup failed for {:?}, falling back to resolver: {}",
                    key, e
                );
            }
        }

        let Some(resolver) = self.resolver.as_ref() else {
            return Ok(None);
        };

        let entry = match resolver.resolve(key) {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                debug!("Resolver produced no value for {:?}", key);
                return Ok(None);
            }
            Err(e) => {
                self.metrics.record_error(key, &e.to_string());
                return Err(e);
            }
        };

        if let Err(e) = self.persistor.store(key, &entry) {
            warn!("Persistor store failed for {:?}: {}", key, e);
            self.metrics.record_error(key, &e.to_string());
        }
        Ok(Some(entry))
    }

    fn slot_for(&self, probe: &KeyRef<K>, key: &Arc<K>) -> Arc<Slot<V>> {
        if let Some(slot) = self.map.get(probe) {
            return Arc::clone(slot.value());
        }
        let slot = self
            .map
            .entry(KeyRef::new(key, self.strength))
            .or_insert_with(|| Arc::new(Slot::new()));
        Arc::clone(slot.value())
    }

    fn discard(&self, probe: &KeyRef<K>, slot: &Arc<Slot<V>>) {
        self.map
            .remove_if(probe, |_, current| Arc::ptr_eq(current, slot));
    }

    /// Amortized housekeeping after a new entry was installed. Runs with no
    /// slot lock held.
    fn after_insert(&self) {
        match self.strength {
            KeyStrength::Weak => {
                if self.map.len() < self.reclaim_mark.load(Ordering::Relaxed) {
                    return;
                }
                self.purge_reclaimed();
                let remaining = self.map.len();
                self.reclaim_mark
                    .store((remaining * 2).max(RECLAIM_FLOOR), Ordering::Relaxed);
            }
            KeyStrength::Soft => {
                if self.map.len() >= self.shed_mark.load(Ordering::Relaxed) {
                    self.shed_soft();
                }
            }
        }
    }

    /// Drop slots whose key has been reclaimed. Returns the number dropped.
    ///
    /// Not needed for correctness (a reclaimed slot never matches a lookup);
    /// it bounds memory held by abandoned slots.
    pub fn purge_reclaimed(&self) -> usize {
        let mut purged = 0;
        self.map.retain(|key, slot| {
            if key.is_live() && !slot.is_retired() {
                return true;
            }
            slot.retire();
            purged += 1;
            false
        });

        if purged > 0 {
            debug!("Purged {} reclaimed slots", purged);
            self.metrics.record_purge(purged);
        }
        purged
    }

    /// Enforce the soft capacity: shed the least recently accessed slots
    /// whose key only the cache still holds. Returns the number shed.
    ///
    /// No-op for weak caches and when no capacity is configured.
    pub fn shed_soft(&self) -> usize {
        let Some(capacity) = self.soft_capacity else {
            return 0;
        };
        if self.strength != KeyStrength::Soft {
            return 0;
        }
        let slots = self.map.len();
        if slots <= capacity {
            return 0;
        }
        #[cfg(test)]
        self.shed_scans.fetch_add(1, Ordering::Relaxed);

        let mut candidates: Vec<(SystemTime, Arc<Slot<V>>)> = self
            .map
            .iter()
            .filter(|item| item.key().is_sheddable())
            .filter_map(|item| {
                let slot = item.value();
                let accessed = slot.entry.try_lock()?.as_ref()?.access_timestamp();
                Some((accessed, Arc::clone(slot)))
            })
            .collect();
        let excess = slots - capacity;
        if candidates.len() < excess {
            // Pinned keys hold the cache over capacity; insertions skip the
            // scan until the map grows by another eighth.
            self.shed_mark
                .store(slots + (slots / 8).max(1), Ordering::Relaxed);
        } else {
            self.shed_mark.store(0, Ordering::Relaxed);
        }
        if candidates.is_empty() {
            trace!("No sheddable slots ({} slots, capacity {})", slots, capacity);
            return 0;
        }
        candidates.sort_by_key(|(accessed, _)| *accessed);

        let mut shed = 0;
        for (_, slot) in candidates.into_iter().take(excess) {
            slot.retire();
            slot.entry.lock().take();
            shed += 1;
        }

        if shed > 0 {
            self.map.retain(|_, slot| !slot.is_retired());
            info!(
                "Shed {} soft slots ({} slots, capacity {})",
                shed, slots, capacity
            );
            self.metrics.record_purge(shed);
        }
        shed
    }

    /// Housekeeping pass: [`purge_reclaimed`](Self::purge_reclaimed) then
    /// [`shed_soft`](Self::shed_soft).
    pub fn purge(&self) -> usize {
        self.purge_reclaimed() + self.shed_soft()
    }

    /// Number of slots in the map.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Drop every slot. The persistor is left untouched.
    pub fn clear(&self) {
        for item in self.map.iter() {
            item.value().retire();
        }
        self.map.clear();
        self.reclaim_mark.store(RECLAIM_FLOOR, Ordering::Relaxed);
        self.shed_mark.store(0, Ordering::Relaxed);
        warn!("ObjectCache CLEAR executed - all slots dropped");
    }

    /// Get occupancy statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            total_slots: 0,
            populated_entries: 0,
            reclaimed_keys: 0,
            ttl_millis: self.get_ttl(),
        };
        for item in self.map.iter() {
            stats.total_slots += 1;
            if !item.key().is_live() {
                stats.reclaimed_keys += 1;
            }
            if item
                .value()
                .entry
                .try_lock()
                .is_some_and(|entry| entry.is_some())
            {
                stats.populated_entries += 1;
            }
        }
        stats
    }

    /// Print cache statistics to debug log.
    pub fn log_stats(&self) {
        let stats = self.stats();
        debug!(
            "ObjectCache Stats ({} keys): {} slots, {} populated, {} reclaimed, ttl {}ms",
            self.strength,
            stats.total_slots,
            stats.populated_entries,
            stats.reclaimed_keys,
            stats.ttl_millis
        );
    }
}
