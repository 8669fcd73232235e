//! Storage module: one key/value contract over interchangeable engines.
//!
//! All engines implement the [`StorageBackend`] trait. Callers normally hold
//! a [`Storage`], which picks the engine from [`StorageConfig::engine`].
//!
//! [`StorageConfig::engine`]: crate::config::StorageConfig::engine

mod base;
pub mod compression;
pub mod dal;
pub mod envelope;
pub mod facade;
pub mod memory;
pub mod redb_store;
pub mod sled_store;
pub mod sqlite_store;
pub mod stats;

pub use dal::{ConnectionString, DalStore};
pub use facade::Storage;
pub use memory::MemoryStore;
pub use redb_store::RedbStore;
pub use sled_store::SledStore;
pub use sqlite_store::SqliteStore;

pub(crate) use base::StoreCore;

use crate::config::{EngineKind, StorageConfig};
use crate::error::StoreResult;
use std::collections::BTreeMap;
use std::time::Duration;

/// Result of [`StorageBackend::action`].
pub type ActionOutput = BTreeMap<String, serde_json::Value>;

/// Argument passed to [`StorageBackend::action`].
#[derive(Debug, Clone, PartialEq)]
pub enum ActionArg {
    Duration(Duration),
    Str(String),
    Int(i64),
    Bool(bool),
}

impl ActionArg {
    /// `Duration` as is, non-negative `Int` as milliseconds.
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            ActionArg::Duration(d) => Some(*d),
            ActionArg::Int(ms) if *ms >= 0 => Some(Duration::from_millis(*ms as u64)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ActionArg::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<Duration> for ActionArg {
    fn from(d: Duration) -> Self {
        ActionArg::Duration(d)
    }
}

impl From<&str> for ActionArg {
    fn from(s: &str) -> Self {
        ActionArg::Str(s.to_string())
    }
}

impl From<String> for ActionArg {
    fn from(s: String) -> Self {
        ActionArg::Str(s)
    }
}

impl From<i64> for ActionArg {
    fn from(n: i64) -> Self {
        ActionArg::Int(n)
    }
}

impl From<bool> for ActionArg {
    fn from(b: bool) -> Self {
        ActionArg::Bool(b)
    }
}

/// Core storage interface, implemented by every engine.
///
/// # Contract
///
/// - `set`: Upsert semantics, overwrites existing key.
/// - `get`: `Ok(None)` for absent or expired keys; `Err` only on failure.
/// - `delete`: Deleting an absent key is not an error.
/// - `clear`: Removes every entry in the bucket, keeps the bucket.
/// - `action` / `debug`: Unknown names fail with
///   [`StoreError::Unsupported`](crate::error::StoreError::Unsupported).
/// - `close`: Releases the engine handle. Closing twice is `Ok`; any other
///   call after close fails with
///   [`StoreError::Closed`](crate::error::StoreError::Closed).
///
/// Values pass through the configured codec transparently; callers always
/// get back the bytes they stored.
pub trait StorageBackend: Send + Sync {
    /// Engine behind this backend.
    fn kind(&self) -> EngineKind;

    /// Configuration the backend was opened with.
    fn config(&self) -> &StorageConfig;

    /// Ensure the bucket exists and the engine answers.
    fn init(&self) -> StoreResult<()>;

    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    fn delete(&self, key: &str) -> StoreResult<()>;

    fn clear(&self) -> StoreResult<()>;

    /// Non-mutating health check.
    fn ping(&self) -> StoreResult<()>;

    /// All keys in the bucket, expired entries included.
    fn keys(&self) -> StoreResult<Vec<String>>;

    /// Log internal state: `"keys"`, `"stats"` or `"config"`.
    fn debug(&self, action: &str) -> StoreResult<()>;

    /// Engine-specific extension point.
    fn action(&self, name: &str, args: &[ActionArg]) -> StoreResult<ActionOutput>;

    fn close(&self) -> StoreResult<()>;

    fn is_closed(&self) -> bool;
}
