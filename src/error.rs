//! Error types for the object cache.

use std::fmt;

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the object cache.
///
/// Note that an uncacheable miss is *not* an error: resolvers and persistors
/// report it as `Ok(None)`. The variants below describe genuine failures.
#[derive(Debug, Clone)]
pub enum Error {
    /// The resolver failed while computing a value.
    ///
    /// Propagated to the caller of `retrieve_object`. Any previous entry for
    /// the key is left untouched, so the next call retries resolution.
    ResolverError(String),

    /// The persistor's backing store failed (I/O error, unavailable store).
    ///
    /// On lookup this is only surfaced when the cache has no resolver to fall
    /// back to. Failures while storing or removing are logged and swallowed.
    PersistorError(String),

    /// Encoding an entry for the persistor failed.
    SerializationError(String),

    /// Decoding a persisted entry failed.
    ///
    /// **Recovery:** the persisted record should be evicted and recomputed.
    DeserializationError(String),

    /// Persisted record does not carry the expected envelope magic.
    InvalidCacheEntry(String),

    /// Persisted record was written with a different schema version.
    VersionMismatch {
        /// Expected schema version (from compiled code)
        expected: u32,
        /// Found schema version (from persisted record)
        found: u32,
    },

    /// Invalid configuration, e.g. a malformed JSON config document.
    ConfigError(String),

    /// Generic error with custom message.
    Other(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ResolverError(msg) => write!(f, "Resolver error: {}", msg),
            Error::PersistorError(msg) => write!(f, "Persistor error: {}", msg),
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Error::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
            Error::InvalidCacheEntry(msg) => write!(f, "Invalid cache entry: {}", msg),
            Error::VersionMismatch { expected, found } => {
                write!(
                    f,
                    "Persisted entry version mismatch: expected {}, found {}",
                    expected, found
                )
            }
            Error::ConfigError(msg) => write!(f, "Config error: {}", msg),
            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// True for errors that mean a persisted record is unreadable and should
    /// be discarded rather than retried.
    pub fn is_corrupt_record(&self) -> bool {
        matches!(
            self,
            Error::DeserializationError(_)
                | Error::InvalidCacheEntry(_)
                | Error::VersionMismatch { .. }
        )
    }
}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::ConfigError(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::PersistorError(e.to_string())
    }
}

impl From<String> for Error {
    fn from(e: String) -> Self {
        Error::Other(e)
    }
}

impl From<&str> for Error {
    fn from(e: &str) -> Self {
        Error::Other(e.to_string())
    }
}
