//! redb-backed storage, the first embedded B-tree engine slot.
//!
//! A single `{storage_dir}/{file_stem}.redb` file; the bucket maps to a
//! table of `&str -> &[u8]`. Config names: `redb`, `bolt`, `boltdb`.

use super::{ActionArg, ActionOutput, StorageBackend, StoreCore};
use crate::config::{EngineKind, StorageConfig};
use crate::error::{StoreError, StoreResult};
use parking_lot::RwLock;
use redb::{Database, Durability, ReadableTable, TableDefinition, TableHandle};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// redb-backed persistent storage.
pub struct RedbStore {
    core: StoreCore,
    path: Option<PathBuf>,
    bucket: String,
    handle: RwLock<Option<Database>>,
}

impl RedbStore {
    /// Open (creating if needed) the database file and the bucket table.
    #[instrument(skip(config), fields(engine = "redb"))]
    pub fn open(config: &StorageConfig) -> StoreResult<Self> {
        let path = config.storage_file(EngineKind::Redb, "redb")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(&path)?;
        Self::attach(db, config, Some(path))
    }

    /// Wrap a database the caller already opened, creating the bucket table
    /// if missing. On failure the database is dropped.
    #[instrument(skip(db, config), fields(engine = "redb"))]
    pub fn mount(db: Database, config: &StorageConfig) -> StoreResult<Self> {
        Self::attach(db, config, None)
    }

    fn attach(db: Database, config: &StorageConfig, path: Option<PathBuf>) -> StoreResult<Self> {
        let core = StoreCore::new(EngineKind::Redb, config);
        let bucket = config.resolved_bucket()?;
        let store = Self {
            core,
            path,
            bucket,
            handle: RwLock::new(Some(db)),
        };
        // on failure `store` drops here and releases the file
        store.init()?;

        match &store.path {
            Some(p) => info!(path = %p.display(), bucket = %store.bucket, "redb backend opened"),
            None => info!(bucket = %store.bucket, "redb backend mounted"),
        }
        Ok(store)
    }

    /// Database file, `None` for a mounted database.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn table(&self) -> TableDefinition<'_, &'static str, &'static [u8]> {
        TableDefinition::new(&self.bucket)
    }

    fn durability(&self) -> Durability {
        if self.core.config().sync_writes {
            Durability::Immediate
        } else {
            Durability::Eventual
        }
    }

    /// Run `f` inside one write transaction and commit it.
    fn write<T>(
        &self,
        f: impl FnOnce(&redb::WriteTransaction) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let guard = self.handle.write();
        let db = guard.as_ref().ok_or_else(|| self.core.closed())?;
        let mut txn = db.begin_write()?;
        txn.set_durability(self.durability());
        let out = f(&txn)?;
        txn.commit()?;
        Ok(out)
    }

    fn read<T>(&self, f: impl FnOnce(&redb::ReadTransaction) -> StoreResult<T>) -> StoreResult<T> {
        let guard = self.handle.read();
        let db = guard.as_ref().ok_or_else(|| self.core.closed())?;
        let txn = db.begin_read()?;
        f(&txn)
    }
}

impl StorageBackend for RedbStore {
    fn kind(&self) -> EngineKind {
        self.core.kind()
    }

    fn config(&self) -> &StorageConfig {
        self.core.config()
    }

    fn init(&self) -> StoreResult<()> {
        self.write(|txn| {
            txn.open_table(self.table())?;
            Ok(())
        })
    }

    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.read(|txn| {
            let table = txn.open_table(self.table())?;
            let stored = table.get(key)?;
            self.core.open_value(key, stored.as_ref().map(|guard| guard.value()))
        })
    }

    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let sealed = self.core.seal(key, value)?;
        self.write(|txn| {
            let mut table = txn.open_table(self.table())?;
            table.insert(key, sealed.as_slice())?;
            Ok(())
        })?;
        self.core.record_set();
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.write(|txn| {
            let mut table = txn.open_table(self.table())?;
            table.remove(key)?;
            Ok(())
        })?;
        self.core.record_delete(key);
        Ok(())
    }

    fn clear(&self) -> StoreResult<()> {
        self.write(|txn| {
            txn.delete_table(self.table())?;
            txn.open_table(self.table())?;
            Ok(())
        })?;
        self.core.record_clear();
        Ok(())
    }

    fn ping(&self) -> StoreResult<()> {
        self.read(|_| Ok(()))
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        self.read(|txn| {
            let table = txn.open_table(self.table())?;
            let mut keys = Vec::new();
            for entry in table.iter()? {
                let (key, _) = entry?;
                keys.push(key.value().to_string());
            }
            Ok(keys)
        })
    }

    fn debug(&self, action: &str) -> StoreResult<()> {
        self.ping()?;
        self.core.debug(action, || self.keys())
    }

    fn action(&self, name: &str, _args: &[ActionArg]) -> StoreResult<ActionOutput> {
        let mut out = ActionOutput::new();
        match name {
            "compact" => {
                let mut guard = self.handle.write();
                let db = guard.as_mut().ok_or_else(|| self.core.closed())?;
                let compacted = db.compact()?;
                out.insert("compacted".to_string(), Value::from(compacted));
            }
            "getCollections" => {
                let names = self.read(|txn| {
                    Ok(txn
                        .list_tables()
                        .map_err(StoreError::from)?
                        .map(|handle| handle.name().to_string())
                        .collect::<Vec<_>>())
                })?;
                out.extend(names.into_iter().map(|n| (n, Value::Null)));
            }
            other => {
                self.ping()?;
                return self.core.common_action(other, || self.keys());
            }
        }
        Ok(out)
    }

    fn close(&self) -> StoreResult<()> {
        if let Some(db) = self.handle.write().take() {
            drop(db);
            self.core.log_closed();
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.handle.read().is_none()
    }
}
