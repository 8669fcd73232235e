//! SQLite-backed storage, the second embedded B-tree engine slot.
//!
//! A single `{storage_dir}/{file_stem}.db` file in WAL mode; the bucket maps
//! to a `(key TEXT PRIMARY KEY, value BLOB)` table. Config names: `sqlite`,
//! `sqlite3`, `bbolt`.
//!
//! `rusqlite::Connection` is `Send` but not `Sync`, so the handle sits behind
//! a mutex rather than a read/write lock.

use super::{ActionArg, ActionOutput, StorageBackend, StoreCore};
use crate::config::{EngineKind, StorageConfig};
use crate::error::StoreResult;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection tuning beyond what [`StorageConfig`] carries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SqliteOptions {
    pub busy_timeout: Option<Duration>,
    pub journal_mode: Option<String>,
}

/// SQLite-backed persistent storage.
pub struct SqliteStore {
    core: StoreCore,
    path: Option<PathBuf>,
    bucket: String,
    table: String,
    busy_timeout: Duration,
    conn: Mutex<Option<Connection>>,
}

impl SqliteStore {
    /// Open (creating if needed) the database file and the bucket table.
    #[instrument(skip(config), fields(engine = "sqlite"))]
    pub fn open(config: &StorageConfig) -> StoreResult<Self> {
        let core = StoreCore::new(EngineKind::Sqlite, config);
        let path = config.storage_file(EngineKind::Sqlite, "db")?;
        let bucket = config.resolved_bucket()?;
        Self::open_with(core, path, bucket, SqliteOptions::default())
    }

    /// Wrap a connection the caller already opened. The bucket table is
    /// created if missing; on failure the connection is closed.
    #[instrument(skip(conn, config), fields(engine = "sqlite"))]
    pub fn mount(conn: Connection, config: &StorageConfig) -> StoreResult<Self> {
        let core = StoreCore::new(EngineKind::Sqlite, config);
        let path = conn
            .path()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);
        let bucket = match config.resolved_bucket() {
            Ok(bucket) => bucket,
            Err(e) => {
                release(conn);
                return Err(e);
            }
        };
        Self::attach(core, conn, path, bucket, SqliteOptions::default())
    }

    pub(crate) fn open_with(
        core: StoreCore,
        path: PathBuf,
        bucket: String,
        options: SqliteOptions,
    ) -> StoreResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path)?;
        Self::attach(core, conn, Some(path), bucket, options)
    }

    fn attach(
        core: StoreCore,
        conn: Connection,
        path: Option<PathBuf>,
        bucket: String,
        options: SqliteOptions,
    ) -> StoreResult<Self> {
        let busy_timeout = options.busy_timeout.unwrap_or(DEFAULT_BUSY_TIMEOUT);
        let table = quote_ident(&bucket);
        let sync_writes = core.config().sync_writes;

        let setup = || -> StoreResult<()> {
            conn.busy_timeout(busy_timeout)?;
            let journal = options.journal_mode.as_deref().unwrap_or("WAL");
            let mode: String =
                conn.pragma_update_and_check(None, "journal_mode", journal, |row| row.get(0))?;
            debug!(journal_mode = %mode, "sqlite journal mode set");
            conn.pragma_update(None, "synchronous", if sync_writes { "FULL" } else { "NORMAL" })?;
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table} (key TEXT PRIMARY KEY NOT NULL, value BLOB NOT NULL) WITHOUT ROWID"
            ))?;
            Ok(())
        };
        if let Err(e) = setup() {
            release(conn);
            return Err(e);
        }

        match &path {
            Some(p) => info!(path = %p.display(), bucket = %bucket, "sqlite backend opened"),
            None => info!(bucket = %bucket, "sqlite backend mounted"),
        }
        Ok(Self {
            core,
            path,
            bucket,
            table,
            busy_timeout,
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Database file, `None` for an in-memory connection.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub(crate) fn core(&self) -> &StoreCore {
        &self.core
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> StoreResult<T>) -> StoreResult<T> {
        let guard = self.conn.lock();
        let conn = guard.as_ref().ok_or_else(|| self.core.closed())?;
        f(conn)
    }

    /// `SELECT 1` with the busy timeout temporarily set to `timeout`.
    pub(crate) fn ping_within(&self, timeout: Duration) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.busy_timeout(timeout)?;
            let answered = conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0));
            conn.busy_timeout(self.busy_timeout)?;
            answered?;
            Ok(())
        })
    }

    pub(crate) fn collections(&self) -> StoreResult<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            )?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(names)
        })
    }
}

fn release(conn: Connection) {
    if let Err((_, e)) = conn.close() {
        warn!(error = %e, "close failed while abandoning sqlite open");
    }
}

/// Quote an SQL identifier, doubling embedded quotes.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl StorageBackend for SqliteStore {
    fn kind(&self) -> EngineKind {
        self.core.kind()
    }

    fn config(&self) -> &StorageConfig {
        self.core.config()
    }

    fn init(&self) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {} (key TEXT PRIMARY KEY NOT NULL, value BLOB NOT NULL) WITHOUT ROWID",
                self.table
            ))?;
            Ok(())
        })
    }

    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.with_conn(|conn| {
            let stored: Option<Vec<u8>> = conn
                .query_row(
                    &format!("SELECT value FROM {} WHERE key = ?1", self.table),
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;
            self.core.open_value(key, stored.as_deref())
        })
    }

    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let sealed = self.core.seal(key, value)?;
        self.with_conn(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO {} (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                    self.table
                ),
                params![key, sealed],
            )?;
            Ok(())
        })?;
        self.core.record_set();
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                &format!("DELETE FROM {} WHERE key = ?1", self.table),
                params![key],
            )?;
            Ok(())
        })?;
        self.core.record_delete(key);
        Ok(())
    }

    fn clear(&self) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(&format!("DELETE FROM {}", self.table), [])?;
            Ok(())
        })?;
        self.core.record_clear();
        Ok(())
    }

    fn ping(&self) -> StoreResult<()> {
        self.ping_within(self.busy_timeout)
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT key FROM {} ORDER BY key", self.table))?;
            let keys = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
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
            "vacuum" => {
                self.with_conn(|conn| Ok(conn.execute_batch("VACUUM")?))?;
                out.insert("vacuumed".to_string(), Value::Bool(true));
            }
            "getCollections" => {
                out.extend(self.collections()?.into_iter().map(|n| (n, Value::Null)));
            }
            other => {
                self.ping()?;
                return self.core.common_action(other, || self.keys());
            }
        }
        Ok(out)
    }

    fn close(&self) -> StoreResult<()> {
        let Some(conn) = self.conn.lock().take() else {
            return Ok(());
        };
        conn.close().map_err(|(_, e)| e)?;
        self.core.log_closed();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.conn.lock().is_none()
    }
}
