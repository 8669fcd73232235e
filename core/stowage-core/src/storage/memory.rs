//! In-memory backend using BTreeMap
//!
//! Nothing is persisted; the map is dropped on `close`.

use super::{ActionArg, ActionOutput, StorageBackend, StoreCore};
use crate::config::{EngineKind, StorageConfig};
use crate::error::{StoreError, StoreResult};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tracing::{info, instrument};

/// In-memory backend using BTreeMap
pub struct MemoryStore {
    core: StoreCore,
    map: RwLock<Option<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[instrument(skip(config))]
    pub fn open(config: &StorageConfig) -> StoreResult<Self> {
        let core = StoreCore::new(EngineKind::InMemory, config);
        info!(max_entries = ?config.max_entries, "in-memory backend opened");
        Ok(Self {
            core,
            map: RwLock::new(Some(BTreeMap::new())),
        })
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> StoreResult<usize> {
        let map = self.map.read();
        Ok(map.as_ref().ok_or_else(|| self.core.closed())?.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl StorageBackend for MemoryStore {
    fn kind(&self) -> EngineKind {
        self.core.kind()
    }

    fn config(&self) -> &StorageConfig {
        self.core.config()
    }

    fn init(&self) -> StoreResult<()> {
        self.ping()
    }

    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let map = self.map.read();
        let map = map.as_ref().ok_or_else(|| self.core.closed())?;
        self.core.open_value(key, map.get(key).map(Vec::as_slice))
    }

    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let sealed = self.core.seal(key, value)?;
        let mut map = self.map.write();
        let map = map.as_mut().ok_or_else(|| self.core.closed())?;
        if let Some(limit) = self.core.config().max_entries
            && map.len() >= limit
            && !map.contains_key(key)
        {
            return Err(StoreError::Full {
                engine: self.core.kind(),
                limit,
            });
        }
        map.insert(key.to_string(), sealed);
        self.core.record_set();
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        let mut map = self.map.write();
        map.as_mut().ok_or_else(|| self.core.closed())?.remove(key);
        self.core.record_delete(key);
        Ok(())
    }

    fn clear(&self) -> StoreResult<()> {
        let mut map = self.map.write();
        map.as_mut().ok_or_else(|| self.core.closed())?.clear();
        self.core.record_clear();
        Ok(())
    }

    fn ping(&self) -> StoreResult<()> {
        if self.map.read().is_none() {
            return Err(self.core.closed());
        }
        Ok(())
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        let map = self.map.read();
        Ok(map
            .as_ref()
            .ok_or_else(|| self.core.closed())?
            .keys()
            .cloned()
            .collect())
    }

    fn debug(&self, action: &str) -> StoreResult<()> {
        self.ping()?;
        self.core.debug(action, || self.keys())
    }

    fn action(&self, name: &str, _args: &[ActionArg]) -> StoreResult<ActionOutput> {
        self.ping()?;
        self.core.common_action(name, || self.keys())
    }

    fn close(&self) -> StoreResult<()> {
        if self.map.write().take().is_some() {
            self.core.log_closed();
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.map.read().is_none()
    }
}
