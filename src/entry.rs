//! Cached value holder with access/update bookkeeping.

use std::time::{Duration, SystemTime};

/// A cached value plus the two timestamps the engine needs for TTL checks.
///
/// `update_timestamp` marks when the content was produced; `access_timestamp`
/// marks the last successful read. The access timestamp never precedes the
/// update timestamp.
///
/// # Example
///
/// ```
/// use object_cache::Entry;
/// use std::time::{Duration, SystemTime};
///
/// // Fresh value, both timestamps are "now"
/// let entry = Entry::new("heap histogram");
/// assert!(entry.access_timestamp() >= entry.update_timestamp());
///
/// // Value reloaded from a persistor keeps its original creation time
/// let created = SystemTime::now() - Duration::from_secs(60);
/// let reloaded = Entry::with_update_timestamp("heap histogram", created);
/// assert_eq!(reloaded.update_timestamp(), created);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Entry<V> {
    content: V,
    access_timestamp: SystemTime,
    update_timestamp: SystemTime,
}

impl<V> Entry<V> {
    /// Create an entry whose timestamps are both "now".
    pub fn new(content: V) -> Self {
        let now = SystemTime::now();
        Entry {
            content,
            access_timestamp: now,
            update_timestamp: now,
        }
    }

    /// Create an entry with an explicit update timestamp.
    ///
    /// Used by persistors so that TTL evaluation stays relative to when the
    /// value was originally produced, not when it was reloaded.
    pub fn with_update_timestamp(content: V, updated: SystemTime) -> Self {
        let now = SystemTime::now();
        Entry {
            content,
            access_timestamp: now.max(updated),
            update_timestamp: updated,
        }
    }

    pub fn content(&self) -> &V {
        &self.content
    }

    pub fn into_content(self) -> V {
        self.content
    }

    pub fn access_timestamp(&self) -> SystemTime {
        self.access_timestamp
    }

    pub fn update_timestamp(&self) -> SystemTime {
        self.update_timestamp
    }

    /// Replace the content, resetting both timestamps.
    pub fn set_content(&mut self, content: V) {
        let now = SystemTime::now();
        self.content = content;
        self.update_timestamp = now;
        self.access_timestamp = now;
    }

    /// Record a read at `now`.
    pub(crate) fn touch(&mut self, now: SystemTime) {
        self.access_timestamp = now.max(self.update_timestamp);
    }

    /// Time elapsed since the content was produced, as observed at `now`.
    ///
    /// An update timestamp in the future (clock skew) counts as zero elapsed.
    pub fn age_at(&self, now: SystemTime) -> Duration {
        now.duration_since(self.update_timestamp)
            .unwrap_or(Duration::ZERO)
    }

    /// Whether the entry is still fresh under `ttl_millis` at `now`.
    ///
    /// `ttl_millis <= 0` disables time-based expiry. Expiry is
    /// boundary-inclusive: an entry exactly `ttl_millis` old is stale.
    pub fn is_fresh_at(&self, ttl_millis: i64, now: SystemTime) -> bool {
        if ttl_millis <= 0 {
            return true;
        }
        self.age_at(now).as_millis() < ttl_millis as u128
    }
}
