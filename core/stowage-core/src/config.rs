//! Storage configuration.
//!
//! A [`StorageConfig`] is built by the caller before any backend exists and is
//! never mutated by the crate. Every field has a default, and the defaults
//! themselves live in an injected [`Defaults`] value rather than in globals, so
//! tests can point every backend at an isolated directory.

use crate::error::{StoreError, StoreResult};
use crate::storage::compression::{Codec, CompressionConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Storage engine selected by [`StorageConfig::engine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// `BTreeMap` behind a lock, nothing persisted
    InMemory,
    /// sled, the embedded log-structured store
    Sled,
    /// redb, embedded copy-on-write B-tree
    Redb,
    /// SQLite through rusqlite, one table per bucket
    Sqlite,
    /// Data-abstraction layer resolved from a connection string
    Dal,
}

impl EngineKind {
    pub const ALL: &'static [EngineKind] = &[
        EngineKind::InMemory,
        EngineKind::Sled,
        EngineKind::Redb,
        EngineKind::Sqlite,
        EngineKind::Dal,
    ];

    /// Recognize an engine name (case-insensitive). Several historical
    /// spellings map onto each engine.
    pub fn try_parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "" | "in_memory" | "in-memory" | "inmemory" | "memory" | "mem" => {
                Some(EngineKind::InMemory)
            }
            "badger" | "lsm" | "sled" => Some(EngineKind::Sled),
            "boltdb" | "bolt" | "redb" => Some(EngineKind::Redb),
            "bbolt" | "sqlite" | "sqlite3" => Some(EngineKind::Sqlite),
            "dal" | "pivot" => Some(EngineKind::Dal),
            _ => None,
        }
    }

    /// Like [`try_parse`](Self::try_parse), falling back to the in-memory engine.
    pub fn parse(name: &str) -> Self {
        Self::try_parse(name).unwrap_or(EngineKind::InMemory)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::InMemory => "in_memory",
            EngineKind::Sled => "sled",
            EngineKind::Redb => "redb",
            EngineKind::Sqlite => "sqlite",
            EngineKind::Dal => "dal",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fallback values used when a config field is left empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// Root under which each engine gets its own directory
    pub prefix_path: PathBuf,
    /// Bucket / tree / table name
    pub bucket: String,
    /// File name (without extension) for single-file engines
    pub file_stem: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            prefix_path: PathBuf::from("./shared/data/storage"),
            bucket: "stowage".to_string(),
            file_stem: "stowage".to_string(),
        }
    }
}

impl Defaults {
    /// Defaults rooted at `dir` instead of the working directory.
    pub fn rooted_at(dir: impl Into<PathBuf>) -> Self {
        Self {
            prefix_path: dir.into(),
            ..Self::default()
        }
    }
}

/// Settings for the data-abstraction-layer backend.
///
/// Either `dsn` is set, or all of `scheme`, `host`, `dataset` and `options`
/// are; the connection string is then assembled as
/// `scheme://host/dataset?options`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DalConfig {
    pub dsn: Option<String>,
    pub scheme: Option<String>,
    pub host: Option<String>,
    pub dataset: Option<String>,
    pub options: Option<BTreeMap<String, String>>,
}

/// Main configuration for a storage backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Engine name, see [`EngineKind::try_parse`]
    pub engine: String,
    /// Directory holding the engine's files. `None` or empty means
    /// `{defaults.prefix_path}/{engine}`.
    pub storage_path: Option<PathBuf>,
    /// Bucket / tree / table name; empty means `defaults.bucket`
    pub bucket: String,
    /// Make every write durable before returning
    pub sync_writes: bool,
    /// Value codec applied above the engine
    pub compression: CompressionConfig,
    /// Values shorter than this are stored uncompressed
    pub compress_min_size: usize,
    /// Per-operation debug logging
    pub debug: bool,
    /// Count operations (exposed through the `stats` action)
    pub stats: bool,
    /// Entries expire this long after being set
    #[serde(with = "duration_millis")]
    pub ttl: Option<Duration>,
    /// Entry limit for the in-memory engine
    pub max_entries: Option<usize>,
    pub dal: DalConfig,
    pub defaults: Defaults,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::InMemory.as_str().to_string(),
            storage_path: None,
            bucket: String::new(),
            sync_writes: true,
            compression: CompressionConfig::none(),
            compress_min_size: 0,
            debug: false,
            stats: false,
            ttl: None,
            max_entries: None,
            dal: DalConfig::default(),
            defaults: Defaults::default(),
        }
    }
}

impl StorageConfig {
    /// Create a new config builder
    pub fn builder() -> StorageConfigBuilder {
        StorageConfigBuilder::default()
    }

    /// Parse a JSON document; absent fields keep their defaults.
    pub fn from_json(json: &str) -> StoreResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// The engine this config selects, falling back to in-memory.
    pub fn engine_kind(&self) -> EngineKind {
        EngineKind::parse(&self.engine)
    }

    /// Bucket name after defaulting. Fails if both are empty or the name
    /// contains a NUL byte.
    pub fn resolved_bucket(&self) -> StoreResult<String> {
        let bucket = if self.bucket.trim().is_empty() {
            self.defaults.bucket.trim()
        } else {
            self.bucket.trim()
        };
        if bucket.is_empty() {
            return Err(StoreError::Config("bucket name is empty".to_string()));
        }
        if bucket.contains('\0') {
            return Err(StoreError::Config(format!(
                "bucket name {bucket:?} contains a NUL byte"
            )));
        }
        Ok(bucket.to_string())
    }

    /// Directory for `kind`'s files after defaulting.
    pub fn storage_dir(&self, kind: EngineKind) -> StoreResult<PathBuf> {
        let dir = match self.storage_path.as_deref() {
            Some(path) if !path.as_os_str().is_empty() => path.to_path_buf(),
            _ => self.defaults.prefix_path.join(kind.as_str()),
        };
        if dir.as_os_str().is_empty() {
            return Err(StoreError::Config("storage path is empty".to_string()));
        }
        if dir.is_file() {
            return Err(StoreError::Config(format!(
                "storage path {} is a file, expected a directory",
                dir.display()
            )));
        }
        Ok(dir)
    }

    /// `{storage_dir}/{file_stem}.{extension}` for single-file engines.
    pub fn storage_file(&self, kind: EngineKind, extension: &str) -> StoreResult<PathBuf> {
        let stem = self.defaults.file_stem.trim();
        if stem.is_empty() {
            return Err(StoreError::Config("storage file name is empty".to_string()));
        }
        Ok(self.storage_dir(kind)?.join(format!("{stem}.{extension}")))
    }

    pub fn codec(&self) -> Codec {
        self.compression.to_codec()
    }
}

/// Builder for StorageConfig
#[derive(Default)]
pub struct StorageConfigBuilder {
    config: StorageConfig,
}

impl StorageConfigBuilder {
    pub fn engine(mut self, engine: impl Into<String>) -> Self {
        self.config.engine = engine.into();
        self
    }

    pub fn engine_kind(mut self, kind: EngineKind) -> Self {
        self.config.engine = kind.as_str().to_string();
        self
    }

    pub fn storage_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config.storage_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.config.bucket = bucket.into();
        self
    }

    pub fn sync_writes(mut self, sync: bool) -> Self {
        self.config.sync_writes = sync;
        self
    }

    pub fn compression(mut self, compression: CompressionConfig) -> Self {
        self.config.compression = compression;
        self
    }

    pub fn compress_min_size(mut self, bytes: usize) -> Self {
        self.config.compress_min_size = bytes;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    pub fn stats(mut self, stats: bool) -> Self {
        self.config.stats = stats;
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.config.ttl = Some(ttl);
        self
    }

    pub fn max_entries(mut self, limit: usize) -> Self {
        self.config.max_entries = Some(limit);
        self
    }

    pub fn dal(mut self, dal: DalConfig) -> Self {
        self.config.dal = dal;
        self
    }

    /// Shorthand for a DAL config holding only a DSN.
    pub fn dsn(mut self, dsn: impl Into<String>) -> Self {
        self.config.dal.dsn = Some(dsn.into());
        self
    }

    pub fn defaults(mut self, defaults: Defaults) -> Self {
        self.config.defaults = defaults;
        self
    }

    pub fn build(self) -> StorageConfig {
        self.config
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(ttl: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        ttl.map(|d| d.as_millis() as u64).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::compression::CompressionAlgorithm;

    #[test]
    fn engine_names() {
        assert_eq!(EngineKind::parse("badger"), EngineKind::Sled);
        assert_eq!(EngineKind::parse("BoltDB"), EngineKind::Redb);
        assert_eq!(EngineKind::parse("bbolt"), EngineKind::Sqlite);
        assert_eq!(EngineKind::parse("in_memory"), EngineKind::InMemory);
        assert_eq!(EngineKind::parse("pivot"), EngineKind::Dal);
    }

    #[test]
    fn unknown_engine_falls_back_to_memory() {
        assert_eq!(EngineKind::try_parse("cassandra"), None);
        assert_eq!(EngineKind::parse("cassandra"), EngineKind::InMemory);
    }

    #[test]
    fn bucket_defaults_when_empty() {
        let config = StorageConfig::default();
        assert_eq!(config.resolved_bucket().unwrap(), "stowage");

        let config = StorageConfig::builder().bucket("pages").build();
        assert_eq!(config.resolved_bucket().unwrap(), "pages");
    }

    #[test]
    fn bucket_rejects_empty_defaults() {
        let config = StorageConfig::builder()
            .defaults(Defaults {
                bucket: String::new(),
                ..Defaults::default()
            })
            .build();
        assert!(matches!(
            config.resolved_bucket(),
            Err(StoreError::Config(_))
        ));
    }

    #[test]
    fn storage_dir_uses_injected_prefix() {
        let config = StorageConfig::builder()
            .defaults(Defaults::rooted_at("/tmp/stowage-test"))
            .build();
        assert_eq!(
            config.storage_dir(EngineKind::Redb).unwrap(),
            PathBuf::from("/tmp/stowage-test/redb")
        );
        assert_eq!(
            config.storage_file(EngineKind::Redb, "redb").unwrap(),
            PathBuf::from("/tmp/stowage-test/redb/stowage.redb")
        );
    }

    #[test]
    fn explicit_storage_path_wins() {
        let config = StorageConfig::builder()
            .storage_path("/var/lib/app")
            .build();
        assert_eq!(
            config.storage_dir(EngineKind::Sled).unwrap(),
            PathBuf::from("/var/lib/app")
        );
    }

    #[test]
    fn from_json_keeps_defaults() {
        let config = StorageConfig::from_json(
            r#"{"engine": "boltdb", "ttl": 1500, "compression": {"algorithm": "zstd", "level": 9}}"#,
        )
        .unwrap();
        assert_eq!(config.engine_kind(), EngineKind::Redb);
        assert_eq!(config.ttl, Some(Duration::from_millis(1500)));
        assert_eq!(config.compression.algorithm(), CompressionAlgorithm::Zstd);
        assert_eq!(config.compression.level(), Some(9));
        assert!(config.sync_writes);
        assert_eq!(config.defaults, Defaults::default());
    }

    #[test]
    fn from_json_rejects_garbage() {
        assert!(matches!(
            StorageConfig::from_json("{engine"),
            Err(StoreError::Config(_))
        ));
    }
}
