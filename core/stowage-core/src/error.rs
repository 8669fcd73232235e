//! Error types for stowage.
//!
//! All public APIs return `StoreResult<T>`; library code does not panic.
//! Format detection and codec failures have their own enums so callers can
//! tell "corrupt at rest" apart from "engine I/O failed".

use crate::config::EngineKind;
use crate::format::Format;
use thiserror::Error;

/// Unified error type for storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Invalid or inconsistent configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Required connection parameters were left empty
    #[error("missing parameters: {}", .0.join(", "))]
    MissingParameters(Vec<&'static str>),

    /// Standard I/O error
    #[error("io error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// sled embedded database error
    #[error("sled error: {source}")]
    Sled {
        #[from]
        source: sled::Error,
    },

    /// redb embedded database error
    #[error("redb error: {source}")]
    Redb {
        #[from]
        source: redb::Error,
    },

    /// SQLite error
    #[error("sqlite error: {source}")]
    Sqlite {
        #[from]
        source: rusqlite::Error,
    },

    /// Malformed connection string
    #[error("invalid connection string: {source}")]
    Url {
        #[from]
        source: url::ParseError,
    },

    /// Value could not be compressed or restored
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Content-format detection failed
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    /// The backend does not provide this capability
    #[error("{operation} is not implemented by the {engine} backend")]
    Unsupported {
        engine: EngineKind,
        operation: String,
    },

    /// The backend handle was already released
    #[error("{engine} backend is closed")]
    Closed { engine: EngineKind },

    /// The in-memory backend reached its entry limit
    #[error("{engine} backend is full ({limit} entries)")]
    Full { engine: EngineKind, limit: usize },

    /// Invalid action arguments
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
}

/// Result type alias for all storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

// redb splits its errors per operation; funnel them all through `redb::Error`.
macro_rules! from_redb {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for StoreError {
                fn from(err: $ty) -> Self {
                    StoreError::Redb {
                        source: redb::Error::from(err),
                    }
                }
            }
        )*
    };
}

from_redb!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
    redb::CompactionError,
);

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Config(err.to_string())
    }
}

/// Compression and value-frame errors.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("{codec} compression failed: {reason}")]
    Compress { codec: &'static str, reason: String },

    #[error("{codec} decompression failed: {reason}")]
    Decompress { codec: &'static str, reason: String },

    /// Decompressed output would exceed the safety limit
    #[error("decompressed size exceeds limit of {limit} bytes")]
    TooLarge { limit: usize },

    #[error("malformed value frame: {0}")]
    Frame(String),

    #[error("unknown codec marker {0:#04x}")]
    UnknownMarker(u8),
}

/// Magic-number detection errors.
///
/// "No data", "nothing matched" and "ran out of bytes mid-probe" are kept
/// apart on purpose; none of them collapses into `Format::Unknown`.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("no data to read")]
    Empty,

    #[error("unknown compression format")]
    Unknown,

    #[error("short read while probing for {format}: needed {needed} bytes at offset {offset}")]
    ShortRead {
        format: Format,
        offset: u64,
        needed: usize,
    },

    #[error("io error while probing: {0}")]
    Io(#[from] std::io::Error),
}
