//! sled-backed durable storage, the log-structured engine slot.
//!
//! One sled database per storage directory; the bucket maps to a sled `Tree`.
//! Config names: `sled`, `lsm`, `badger`.

use super::{ActionArg, ActionOutput, StorageBackend, StoreCore};
use crate::config::{EngineKind, StorageConfig};
use crate::error::StoreResult;
use parking_lot::RwLock;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

const DEFAULT_TREE: &str = "__sled__default";

struct SledHandle {
    db: sled::Db,
    tree: sled::Tree,
}

/// sled-backed persistent storage.
pub struct SledStore {
    core: StoreCore,
    path: Option<PathBuf>,
    bucket: String,
    handle: RwLock<Option<SledHandle>>,
}

impl SledStore {
    /// Open (creating if needed) the database under `config.storage_dir`.
    #[instrument(skip(config), fields(engine = "sled"))]
    pub fn open(config: &StorageConfig) -> StoreResult<Self> {
        let path = config.storage_dir(EngineKind::Sled)?;
        std::fs::create_dir_all(&path)?;
        let db = sled::Config::new().path(&path).open()?;
        Self::attach(db, config, Some(path))
    }

    /// Wrap a database the caller already opened. The bucket tree is created
    /// if missing; on failure the database is flushed and dropped.
    #[instrument(skip(db, config), fields(engine = "sled"))]
    pub fn mount(db: sled::Db, config: &StorageConfig) -> StoreResult<Self> {
        Self::attach(db, config, None)
    }

    fn attach(db: sled::Db, config: &StorageConfig, path: Option<PathBuf>) -> StoreResult<Self> {
        let core = StoreCore::new(EngineKind::Sled, config);
        let opened = config.resolved_bucket().and_then(|bucket| {
            let tree = db.open_tree(&bucket)?;
            Ok((bucket, tree))
        });
        let (bucket, tree) = match opened {
            Ok(opened) => opened,
            Err(e) => {
                if let Err(flush_err) = db.flush() {
                    warn!(error = %flush_err, "flush failed while abandoning sled open");
                }
                drop(db);
                return Err(e);
            }
        };

        match &path {
            Some(p) => info!(path = %p.display(), bucket = %bucket, "sled backend opened"),
            None => info!(bucket = %bucket, "sled backend mounted"),
        }
        Ok(Self {
            core,
            path,
            bucket,
            handle: RwLock::new(Some(SledHandle { db, tree })),
        })
    }

    /// Storage directory, `None` for a mounted database.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn with_handle<T>(&self, f: impl FnOnce(&SledHandle) -> StoreResult<T>) -> StoreResult<T> {
        let guard = self.handle.read();
        let handle = guard.as_ref().ok_or_else(|| self.core.closed())?;
        f(handle)
    }

    fn sync(&self, tree: &sled::Tree) -> StoreResult<()> {
        if self.core.config().sync_writes {
            tree.flush()?;
        }
        Ok(())
    }

    fn collections(db: &sled::Db) -> Vec<String> {
        db.tree_names()
            .into_iter()
            .filter_map(|name| {
                let s = String::from_utf8(name.to_vec()).ok()?;
                // sled always carries a default tree
                (s != DEFAULT_TREE).then_some(s)
            })
            .collect()
    }
}

impl StorageBackend for SledStore {
    fn kind(&self) -> EngineKind {
        self.core.kind()
    }

    fn config(&self) -> &StorageConfig {
        self.core.config()
    }

    fn init(&self) -> StoreResult<()> {
        self.with_handle(|h| {
            h.db.open_tree(&self.bucket)?;
            Ok(())
        })
    }

    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.with_handle(|h| {
            let stored = h.tree.get(key.as_bytes())?;
            self.core.open_value(key, stored.as_deref())
        })
    }

    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let sealed = self.core.seal(key, value)?;
        let guard = self.handle.write();
        let h = guard.as_ref().ok_or_else(|| self.core.closed())?;
        h.tree.insert(key.as_bytes(), sealed)?;
        self.sync(&h.tree)?;
        self.core.record_set();
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        let guard = self.handle.write();
        let h = guard.as_ref().ok_or_else(|| self.core.closed())?;
        h.tree.remove(key.as_bytes())?;
        self.sync(&h.tree)?;
        self.core.record_delete(key);
        Ok(())
    }

    fn clear(&self) -> StoreResult<()> {
        let guard = self.handle.write();
        let h = guard.as_ref().ok_or_else(|| self.core.closed())?;
        h.tree.clear()?;
        self.sync(&h.tree)?;
        self.core.record_clear();
        Ok(())
    }

    fn ping(&self) -> StoreResult<()> {
        self.with_handle(|h| {
            h.tree.first()?;
            Ok(())
        })
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        self.with_handle(|h| {
            let mut keys = Vec::with_capacity(h.tree.len());
            for key in h.tree.iter().keys() {
                keys.push(String::from_utf8_lossy(&key?).into_owned());
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
            "flush" => {
                let bytes = self.with_handle(|h| Ok(h.db.flush()?))?;
                out.insert("flushed_bytes".to_string(), Value::from(bytes));
            }
            "sizeOnDisk" => {
                let size = self.with_handle(|h| Ok(h.db.size_on_disk()?))?;
                out.insert("size_on_disk".to_string(), Value::from(size));
            }
            "getCollections" => {
                let names = self.with_handle(|h| Ok(Self::collections(&h.db)))?;
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
        let Some(handle) = self.handle.write().take() else {
            return Ok(());
        };
        handle.db.flush()?;
        drop(handle);
        self.core.log_closed();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.handle.read().is_none()
    }
}
