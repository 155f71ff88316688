//! File-per-key persistor.
//!
//! Each entry lives in its own file under a cache directory, so a cache can
//! be rehydrated after a restart without recomputing values. Before using
//! it, consider whether you really need entries to outlive the process: the
//! stored format is versioned (see [`crate::serialization`]) and records from
//! another schema version are discarded rather than migrated.

use super::Persistor;
use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::serialization::{decode_entry, encode_entry};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::{Display, Write as _};
use std::fs;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

const RECORD_EXTENSION: &str = "objc";

/// Joins the escaped prefix and key. Never produced by `escape_file_name`.
const PREFIX_SEPARATOR: char = '@';

/// Persistor storing one file per key.
///
/// The file name is `"{prefix}@{key}"`, where the prefix and the key (rendered
/// with `Display`) are percent-escaped separately. `@` is always escaped
/// inside either part, so distinct keys never share a file and two prefixes
/// never see each other's records, even when one extends the other.
///
/// # Example
///
/// ```no_run
/// use object_cache::persistor::DirectoryPersistor;
/// use object_cache::{CacheFactory, KeyStrength, ObjectCache};
///
/// # fn main() -> object_cache::Result<()> {
/// let persistor = DirectoryPersistor::<String>::new("/var/cache/monitor", "heap")?;
/// let cache: ObjectCache<u32, String> =
///     CacheFactory::default().new_persistent_cache(KeyStrength::Soft, persistor);
/// # Ok(())
/// # }
/// ```
pub struct DirectoryPersistor<V> {
    directory: PathBuf,
    prefix: String,
    write_seq: AtomicU64,
    _value: PhantomData<fn() -> V>,
}

impl<V> DirectoryPersistor<V> {
    /// Open (creating if needed) a persistor rooted at `directory`.
    ///
    /// # Errors
    /// Returns `Error::PersistorError` if the directory cannot be created
    pub fn new(directory: impl AsRef<Path>, prefix: impl Into<String>) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory)?;
        Ok(DirectoryPersistor {
            directory,
            prefix: prefix.into(),
            write_seq: AtomicU64::new(0),
            _value: PhantomData,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the record file for `key`.
    pub fn record_path<K: Display>(&self, key: &K) -> PathBuf {
        self.directory.join(format!(
            "{}{}.{}",
            self.own_prefix(),
            escape_file_name(&key.to_string()),
            RECORD_EXTENSION
        ))
    }

    fn own_prefix(&self) -> String {
        format!("{}{}", escape_file_name(&self.prefix), PREFIX_SEPARATOR)
    }

    fn record_files(&self) -> Result<Vec<PathBuf>> {
        let own_prefix = self.own_prefix();
        let mut files = Vec::new();
        for dir_entry in fs::read_dir(&self.directory)? {
            let path = dir_entry?.path();
            let is_record = path
                .extension()
                .is_some_and(|ext| ext == RECORD_EXTENSION);
            let is_own = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(&own_prefix));
            if is_record && is_own {
                files.push(path);
            }
        }
        Ok(files)
    }

    /// Number of records stored under this persistor's prefix.
    ///
    /// # Errors
    /// Returns `Error::PersistorError` if the directory cannot be listed
    pub fn len(&self) -> Result<usize> {
        Ok(self.record_files()?.len())
    }

    /// Delete every record stored under this persistor's prefix.
    ///
    /// # Errors
    /// Returns `Error::PersistorError` if a record cannot be deleted
    pub fn clear(&self) -> Result<usize> {
        let files = self.record_files()?;
        for path in &files {
            remove_if_exists(path)?;
        }
        warn!(
            "DirectoryPersistor CLEAR removed {} records from {}",
            files.len(),
            self.directory.display()
        );
        Ok(files.len())
    }
}

impl<K, V> Persistor<K, V> for DirectoryPersistor<V>
where
    K: Display,
    V: Serialize + DeserializeOwned + Clone,
{
    fn retrieve(&self, key: &K) -> Result<Option<Entry<V>>> {
        let path = self.record_path(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("DirectoryPersistor GET {} -> MISS", key);
                return Ok(None);
            }
            Err(e) => return Err(Error::PersistorError(format!("{}: {}", path.display(), e))),
        };

        match decode_entry(&bytes) {
            Ok(entry) => {
                debug!("DirectoryPersistor GET {} -> HIT", key);
                Ok(Some(entry))
            }
            Err(e) => {
                if e.is_corrupt_record() {
                    warn!("Discarding unreadable record {}: {}", path.display(), e);
                    remove_if_exists(&path)?;
                }
                Err(e)
            }
        }
    }

    fn store(&self, key: &K, entry: &Entry<V>) -> Result<()> {
        let path = self.record_path(key);
        let bytes = encode_entry(entry)?;

        let seq = self.write_seq.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("tmp-{}-{}", std::process::id(), seq));
        fs::write(&tmp, &bytes)?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        debug!("DirectoryPersistor SET {} ({} bytes)", key, bytes.len());
        Ok(())
    }

    fn remove(&self, key: &K) -> Result<()> {
        remove_if_exists(&self.record_path(key))?;
        debug!("DirectoryPersistor DELETE {}", key);
        Ok(())
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Percent-escape everything outside `[A-Za-z0-9._-]`.
fn escape_file_name(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'_' | b'-' => {
                escaped.push(byte as char)
            }
            _ => {
                let _ = write!(escaped, "%{:02X}", byte);
            }
        }
    }
    escaped
}
