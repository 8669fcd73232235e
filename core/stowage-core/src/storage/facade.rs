//! `Storage`, the engine-agnostic entry point.

use super::{
    ActionArg, ActionOutput, DalStore, MemoryStore, RedbStore, SledStore, SqliteStore,
    StorageBackend,
};
use crate::config::{EngineKind, StorageConfig};
use crate::error::StoreResult;
use tracing::{instrument, warn};

/// Owns exactly one backend for its whole lifetime.
///
/// # Example
///
/// ```rust
/// use stowage_core::{Storage, StorageBackend, StorageConfig};
///
/// let storage = Storage::open(&StorageConfig::default()).unwrap();
/// storage.set("greeting", b"hello").unwrap();
/// assert_eq!(storage.get("greeting").unwrap(), Some(b"hello".to_vec()));
/// storage.close().unwrap();
/// ```
pub struct Storage {
    backend: Box<dyn StorageBackend>,
}

impl Storage {
    /// Open the backend named by `config.engine`. Unknown names fall back
    /// to the in-memory engine.
    #[instrument(skip(config), fields(engine = %config.engine))]
    pub fn open(config: &StorageConfig) -> StoreResult<Self> {
        let kind = match EngineKind::try_parse(&config.engine) {
            Some(kind) => kind,
            None => {
                warn!(engine = %config.engine, "unknown storage engine, using in-memory");
                EngineKind::InMemory
            }
        };

        let backend: Box<dyn StorageBackend> = match kind {
            EngineKind::InMemory => Box::new(MemoryStore::open(config)?),
            EngineKind::Sled => Box::new(SledStore::open(config)?),
            EngineKind::Redb => Box::new(RedbStore::open(config)?),
            EngineKind::Sqlite => Box::new(SqliteStore::open(config)?),
            EngineKind::Dal => Box::new(DalStore::open(config)?),
        };
        Ok(Self { backend })
    }

    /// Wrap an already-open backend.
    pub fn from_backend(backend: Box<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &dyn StorageBackend {
        self.backend.as_ref()
    }
}

impl StorageBackend for Storage {
    fn kind(&self) -> EngineKind {
        self.backend.kind()
    }

    fn config(&self) -> &StorageConfig {
        self.backend.config()
    }

    fn init(&self) -> StoreResult<()> {
        self.backend.init()
    }

    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.backend.get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.backend.set(key, value)
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.backend.delete(key)
    }

    fn clear(&self) -> StoreResult<()> {
        self.backend.clear()
    }

    fn ping(&self) -> StoreResult<()> {
        self.backend.ping()
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        self.backend.keys()
    }

    fn debug(&self, action: &str) -> StoreResult<()> {
        self.backend.debug(action)
    }

    fn action(&self, name: &str, args: &[ActionArg]) -> StoreResult<ActionOutput> {
        self.backend.action(name, args)
    }

    fn close(&self) -> StoreResult<()> {
        self.backend.close()
    }

    fn is_closed(&self) -> bool {
        self.backend.is_closed()
    }
}

impl Drop for Storage {
    fn drop(&mut self) {
        if !self.backend.is_closed()
            && let Err(e) = self.backend.close()
        {
            warn!(engine = %self.backend.kind(), error = %e, "close on drop failed");
        }
    }
}
