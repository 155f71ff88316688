//! Postcard-based encoding of persisted entries with versioned envelopes.
//!
//! Persistors that keep entries outside the process heap (or simply as
//! bytes) store them in this format. Only the content and the update
//! timestamp are persisted; the access timestamp is process-local and is
//! reset on reload.
//!
//! # Format
//!
//! ```text
//! ┌─────────────────┬─────────────────┬──────────────────────────────────────┐
//! │  MAGIC (4 bytes)│VERSION (4 bytes)│ POSTCARD PAYLOAD (PersistedEntry<V>) │
//! └─────────────────┴─────────────────┴──────────────────────────────────────┘
//!   "OBJC"              u32                content + updated_at_millis
//! ```
//!
//! # Example
//!
//! ```rust
//! use object_cache::serialization::{decode_entry, encode_entry};
//! use object_cache::Entry;
//!
//! # fn main() -> object_cache::Result<()> {
//! let entry = Entry::new(vec![1u32, 2, 3]);
//! let bytes = encode_entry(&entry)?;
//!
//! let restored: Entry<Vec<u32>> = decode_entry(&bytes)?;
//! assert_eq!(restored.content(), entry.content());
//! # Ok(())
//! # }
//! ```

use crate::entry::Entry;
use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Magic header for persisted entries: b"OBJC"
pub const ENTRY_MAGIC: [u8; 4] = *b"OBJC";

/// Current schema version.
///
/// Increment when the layout of [`PersistedEntry`] changes. Records written
/// with another version are rejected and recomputed.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Versioned envelope around every persisted record.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Envelope<T> {
    /// Magic header: must be b"OBJC"
    pub magic: [u8; 4],
    /// Schema version: must match CURRENT_SCHEMA_VERSION
    pub version: u32,
    pub payload: T,
}

impl<T> Envelope<T> {
    /// Create a new envelope with current magic and version.
    pub fn new(payload: T) -> Self {
        Self {
            magic: ENTRY_MAGIC,
            version: CURRENT_SCHEMA_VERSION,
            payload,
        }
    }
}

/// Persisted form of an [`Entry`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PersistedEntry<V> {
    pub content: V,
    /// Update timestamp as milliseconds since the Unix epoch.
    pub updated_at_millis: u64,
}

impl<V: Clone> PersistedEntry<V> {
    pub fn from_entry(entry: &Entry<V>) -> Self {
        PersistedEntry {
            content: entry.content().clone(),
            updated_at_millis: epoch_millis(entry.update_timestamp()),
        }
    }
}

impl<V> PersistedEntry<V> {
    pub fn into_entry(self) -> Entry<V> {
        let updated = UNIX_EPOCH + Duration::from_millis(self.updated_at_millis);
        Entry::with_update_timestamp(self.content, updated)
    }
}

/// Serialize any value wrapped in an envelope.
///
/// # Errors
///
/// Returns `Error::SerializationError` if Postcard serialization fails.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let envelope = Envelope::new(value);
    postcard::to_allocvec(&envelope).map_err(|e| {
        error!("Entry serialization failed: {}", e);
        Error::SerializationError(e.to_string())
    })
}

/// Deserialize an enveloped value, validating magic and version.
///
/// # Errors
///
/// - `Error::InvalidCacheEntry`: Invalid magic header
/// - `Error::VersionMismatch`: Schema version mismatch
/// - `Error::DeserializationError`: Corrupted Postcard payload
pub fn decode<'de, T: Deserialize<'de>>(bytes: &'de [u8]) -> Result<T> {
    let envelope: Envelope<T> = postcard::from_bytes(bytes).map_err(|e| {
        error!("Entry deserialization failed: {}", e);
        Error::DeserializationError(e.to_string())
    })?;

    if envelope.magic != ENTRY_MAGIC {
        warn!(
            "Invalid persisted entry: expected magic {:?}, got {:?}",
            ENTRY_MAGIC, envelope.magic
        );
        return Err(Error::InvalidCacheEntry(format!(
            "Invalid magic: expected {:?}, got {:?}",
            ENTRY_MAGIC, envelope.magic
        )));
    }

    if envelope.version != CURRENT_SCHEMA_VERSION {
        warn!(
            "Persisted entry version mismatch: expected {}, got {}",
            CURRENT_SCHEMA_VERSION, envelope.version
        );
        return Err(Error::VersionMismatch {
            expected: CURRENT_SCHEMA_VERSION,
            found: envelope.version,
        });
    }

    Ok(envelope.payload)
}

/// Encode an entry for a persistor.
pub fn encode_entry<V: Serialize + Clone>(entry: &Entry<V>) -> Result<Vec<u8>> {
    encode(&PersistedEntry::from_entry(entry))
}

/// Decode an entry previously written by [`encode_entry`].
pub fn decode_entry<V: DeserializeOwned>(bytes: &[u8]) -> Result<Entry<V>> {
    decode::<PersistedEntry<V>>(bytes).map(PersistedEntry::into_entry)
}

/// Milliseconds since the Unix epoch for `time`, saturating at zero.
pub(crate) fn epoch_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
