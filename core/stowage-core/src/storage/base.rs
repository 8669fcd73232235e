//! State and behavior shared by every engine adapter.

use super::envelope::Envelope;
use super::stats::OpStats;
use super::ActionOutput;
use crate::config::{EngineKind, StorageConfig};
use crate::error::{StoreError, StoreResult};
use serde_json::Value;
use tracing::{debug, info};

/// Config copy, value envelope and counters of one adapter.
#[derive(Debug)]
pub(crate) struct StoreCore {
    kind: EngineKind,
    config: StorageConfig,
    envelope: Envelope,
    stats: Option<OpStats>,
}

impl StoreCore {
    pub(crate) fn new(kind: EngineKind, config: &StorageConfig) -> Self {
        Self {
            kind,
            config: config.clone(),
            envelope: Envelope::from_config(config),
            stats: config.stats.then(OpStats::new),
        }
    }

    pub(crate) fn kind(&self) -> EngineKind {
        self.kind
    }

    pub(crate) fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub(crate) fn seal(&self, key: &str, value: &[u8]) -> StoreResult<Vec<u8>> {
        self.trace("set", key);
        Ok(self.envelope.seal(value)?)
    }

    /// Decode a stored value and count the lookup.
    pub(crate) fn open_value(&self, key: &str, stored: Option<&[u8]>) -> StoreResult<Option<Vec<u8>>> {
        self.trace("get", key);
        let value = match stored {
            Some(bytes) => self.envelope.open(bytes)?,
            None => None,
        };
        if let Some(stats) = &self.stats {
            stats.record_get(value.is_some());
        }
        Ok(value)
    }

    pub(crate) fn record_set(&self) {
        if let Some(stats) = &self.stats {
            stats.record_set();
        }
    }

    pub(crate) fn record_delete(&self, key: &str) {
        self.trace("delete", key);
        if let Some(stats) = &self.stats {
            stats.record_delete();
        }
    }

    pub(crate) fn record_clear(&self) {
        self.trace("clear", "*");
        if let Some(stats) = &self.stats {
            stats.record_clear();
        }
    }

    pub(crate) fn closed(&self) -> StoreError {
        StoreError::Closed { engine: self.kind }
    }

    pub(crate) fn unsupported(&self, operation: impl Into<String>) -> StoreError {
        StoreError::Unsupported {
            engine: self.kind,
            operation: operation.into(),
        }
    }

    pub(crate) fn log_closed(&self) {
        info!(engine = %self.kind, "storage backend closed");
    }

    /// `"keys"`, `"stats"` and `"config"` are understood by every engine.
    pub(crate) fn debug<F>(&self, action: &str, keys: F) -> StoreResult<()>
    where
        F: FnOnce() -> StoreResult<Vec<String>>,
    {
        match action {
            "keys" => {
                let keys = keys()?;
                info!(engine = %self.kind, count = keys.len(), keys = ?keys, "debug keys");
            }
            "stats" => match &self.stats {
                Some(stats) => info!(engine = %self.kind, stats = ?stats.snapshot(), "debug stats"),
                None => info!(engine = %self.kind, "debug stats: statistics disabled"),
            },
            "config" => info!(engine = %self.kind, config = ?self.config, "debug config"),
            other => return Err(self.unsupported(format!("debug '{other}'"))),
        }
        Ok(())
    }

    /// Actions every engine answers: `getKeys`, `count` and `stats`.
    pub(crate) fn common_action<F>(&self, name: &str, keys: F) -> StoreResult<ActionOutput>
    where
        F: FnOnce() -> StoreResult<Vec<String>>,
    {
        let mut out = ActionOutput::new();
        match name {
            "getKeys" => {
                out.extend(keys()?.into_iter().map(|k| (k, Value::Null)));
            }
            "count" => {
                out.insert("count".to_string(), Value::from(keys()?.len()));
            }
            "stats" => {
                let stats = self
                    .stats
                    .as_ref()
                    .ok_or_else(|| self.unsupported("action 'stats' (statistics disabled)"))?;
                let snapshot = stats.snapshot();
                if let Value::Object(fields) = serde_json::to_value(snapshot)? {
                    out.extend(fields);
                }
                out.insert("hit_ratio".to_string(), Value::from(snapshot.hit_ratio()));
            }
            other => return Err(self.unsupported(format!("action '{other}'"))),
        }
        Ok(out)
    }

    fn trace(&self, op: &str, key: &str) {
        if self.config.debug {
            debug!(engine = %self.kind, op, key, "storage op");
        }
    }
}
