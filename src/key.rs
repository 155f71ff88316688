//! Key reference wrappers.
//!
//! The engine never owns caller keys outright. Each map slot is keyed by a
//! [`KeyRef`], which holds the caller's `Arc<K>` either weakly or softly and
//! caches the key's hash at construction so the slot stays hashable after
//! the referent is gone.
//!
//! # Strengths
//!
//! | Strength | Holds | Slot reclaimable when |
//! |----------|-------|-----------------------|
//! | `Weak`   | `Weak<K>` | the last caller-side `Arc<K>` is dropped |
//! | `Soft`   | `Arc<K>`  | the engine sheds it under its soft capacity, and only if no caller still holds the key |
//!
//! # Equality
//!
//! Two wrappers are equal only if both referents are alive and equal by
//! value. A reclaimed (or vacant) wrapper is equal to nothing, not even
//! itself, so a dead slot can never be matched by a lookup; it is simply
//! abandoned until a purge drops it.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

/// How strongly the cache holds on to its keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStrength {
    /// The cache does not keep keys alive. A slot dies as soon as no caller
    /// holds the key.
    Weak,

    /// The cache keeps keys alive until it decides to shed them
    /// (least recently accessed first, see `CacheConfig::soft_capacity`).
    #[default]
    Soft,
}

impl fmt::Display for KeyStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyStrength::Weak => write!(f, "weak"),
            KeyStrength::Soft => write!(f, "soft"),
        }
    }
}

enum Handle<K> {
    Weak(Weak<K>),
    Soft(Arc<K>),
    Vacant,
}

/// Identity of a cache slot.
pub struct KeyRef<K> {
    handle: Handle<K>,
    hash: u64,
}

impl<K: Hash> KeyRef<K> {
    /// Wrap `key` with the given strength.
    pub fn new(key: &Arc<K>, strength: KeyStrength) -> Self {
        let hash = hash_of(key.as_ref());
        let handle = match strength {
            KeyStrength::Weak => Handle::Weak(Arc::downgrade(key)),
            KeyStrength::Soft => Handle::Soft(Arc::clone(key)),
        };
        KeyRef { handle, hash }
    }
}

impl<K> KeyRef<K> {
    /// Wrapper for an absent key: hash 0, equal to nothing.
    pub fn vacant() -> Self {
        KeyRef {
            handle: Handle::Vacant,
            hash: 0,
        }
    }

    /// The strength this wrapper was created with, `None` when vacant.
    pub fn strength(&self) -> Option<KeyStrength> {
        match self.handle {
            Handle::Weak(_) => Some(KeyStrength::Weak),
            Handle::Soft(_) => Some(KeyStrength::Soft),
            Handle::Vacant => None,
        }
    }

    /// Whether the referent is still reachable.
    pub fn is_live(&self) -> bool {
        match &self.handle {
            Handle::Weak(weak) => weak.strong_count() > 0,
            Handle::Soft(_) => true,
            Handle::Vacant => false,
        }
    }

    /// The referent, if it is still alive.
    pub fn get(&self) -> Option<Arc<K>> {
        match &self.handle {
            Handle::Weak(weak) => weak.upgrade(),
            Handle::Soft(key) => Some(Arc::clone(key)),
            Handle::Vacant => None,
        }
    }

    /// True when a soft key is held by nobody but this wrapper, i.e. the
    /// slot would be reclaimed if the cache let go of it.
    pub(crate) fn is_sheddable(&self) -> bool {
        match &self.handle {
            Handle::Soft(key) => Arc::strong_count(key) == 1,
            Handle::Weak(_) | Handle::Vacant => false,
        }
    }

    /// Hash computed from the referent at construction.
    pub fn cached_hash(&self) -> u64 {
        self.hash
    }
}

fn hash_of<K: Hash + ?Sized>(key: &K) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

impl<K: PartialEq> PartialEq for KeyRef<K> {
    fn eq(&self, other: &Self) -> bool {
        if self.hash != other.hash {
            return false;
        }
        match (self.get(), other.get()) {
            (Some(a), Some(b)) => Arc::ptr_eq(&a, &b) || *a == *b,
            _ => false,
        }
    }
}

// Reflexivity only fails for reclaimed wrappers, which are never used as
// lookup probes.
impl<K: Eq> Eq for KeyRef<K> {}

impl<K> Hash for KeyRef<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl<K: fmt::Debug> fmt::Debug for KeyRef<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.handle, self.get()) {
            (Handle::Vacant, _) => write!(f, "KeyRef(vacant)"),
            (_, Some(key)) => write!(f, "KeyRef({:?})", key),
            (_, None) => write!(f, "KeyRef(reclaimed, hash={:#x})", self.hash),
        }
    }
}
