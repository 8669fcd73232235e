// Behavior every engine must share, run against each one in turn.

use stowage_core::storage::compression::CompressionConfig;
use stowage_core::storage::{RedbStore, SledStore, SqliteStore};
use stowage_core::{
    ActionArg, DalConfig, Defaults, EngineKind, Storage, StorageBackend, StorageConfig,
    StoreError, StoreResult,
};
use std::collections::BTreeMap;
use std::time::Duration;
use tempfile::TempDir;

fn config_for(kind: EngineKind, dir: &TempDir) -> StorageConfig {
    let builder = StorageConfig::builder()
        .engine_kind(kind)
        .defaults(Defaults::rooted_at(dir.path()))
        .bucket("contract")
        .stats(true);
    match kind {
        EngineKind::Dal => builder
            .dsn(format!("sqlite://{}/dal.db", dir.path().display()))
            .build(),
        _ => builder.build(),
    }
}

fn each_engine(mut f: impl FnMut(EngineKind, Storage) -> StoreResult<()>) {
    stowage_core::logging::init_test();
    for &kind in EngineKind::ALL {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(&config_for(kind, &dir)).unwrap();
        assert_eq!(storage.kind(), kind);
        if let Err(e) = f(kind, storage) {
            panic!("{kind}: {e}");
        }
    }
}

#[test]
fn test_set_then_get() {
    each_engine(|_, s| {
        s.init()?;
        s.set("alpha", b"one")?;
        assert_eq!(s.get("alpha")?, Some(b"one".to_vec()));
        assert_eq!(s.get("beta")?, None);
        Ok(())
    });
}

#[test]
fn test_overwrite_and_empty_value() {
    each_engine(|_, s| {
        s.set("k", b"first")?;
        s.set("k", b"second")?;
        assert_eq!(s.get("k")?, Some(b"second".to_vec()));
        s.set("empty", b"")?;
        assert_eq!(s.get("empty")?, Some(Vec::new()));
        Ok(())
    });
}

#[test]
fn test_delete_absent_key_is_ok() {
    each_engine(|_, s| {
        s.delete("never-set")?;
        s.set("k", b"v")?;
        s.delete("k")?;
        assert_eq!(s.get("k")?, None);
        Ok(())
    });
}

#[test]
fn test_clear_empties_bucket() {
    each_engine(|_, s| {
        for i in 0..10 {
            s.set(&format!("key_{i}"), b"v")?;
        }
        s.clear()?;
        assert_eq!(s.get("key_3")?, None);
        assert!(s.keys()?.is_empty());
        s.set("after", b"v")?;
        assert_eq!(s.keys()?, vec!["after".to_string()]);
        Ok(())
    });
}

#[test]
fn test_common_actions() {
    each_engine(|_, s| {
        s.set("a", b"1")?;
        s.set("b", b"2")?;

        let keys = s.action("getKeys", &[])?;
        assert_eq!(keys.keys().cloned().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(keys.values().all(|v| v.is_null()));

        let count = s.action("count", &[])?;
        assert_eq!(count["count"], serde_json::json!(2));

        s.get("a")?;
        s.get("missing")?;
        let stats = s.action("stats", &[])?;
        assert_eq!(stats["sets"], serde_json::json!(2));
        assert_eq!(stats["hits"], serde_json::json!(1));
        assert_eq!(stats["misses"], serde_json::json!(1));
        Ok(())
    });
}

#[test]
fn test_unknown_action_and_debug_are_unsupported() {
    each_engine(|kind, s| {
        match s.action("selfDestruct", &[]) {
            Err(StoreError::Unsupported { engine, .. }) => assert_eq!(engine, kind),
            other => panic!("{kind}: expected Unsupported, got {other:?}"),
        }
        assert!(matches!(
            s.debug("dump"),
            Err(StoreError::Unsupported { .. })
        ));
        s.debug("keys")?;
        s.debug("stats")?;
        s.debug("config")?;
        Ok(())
    });
}

#[test]
fn test_ping_and_close_lifecycle() {
    each_engine(|_, s| {
        s.ping()?;
        s.set("k", b"v")?;
        s.close()?;
        s.close()?;
        assert!(s.is_closed());
        assert!(matches!(s.get("k"), Err(StoreError::Closed { .. })));
        assert!(matches!(s.set("k", b"v"), Err(StoreError::Closed { .. })));
        assert!(matches!(s.delete("k"), Err(StoreError::Closed { .. })));
        assert!(matches!(s.clear(), Err(StoreError::Closed { .. })));
        assert!(matches!(s.ping(), Err(StoreError::Closed { .. })));
        assert!(matches!(s.action("count", &[]), Err(StoreError::Closed { .. })));
        Ok(())
    });
}

#[test]
fn test_compressed_values_round_trip() {
    let text = b"compressible compressible compressible ".repeat(100);
    for compression in [
        CompressionConfig::lz4(),
        CompressionConfig::snappy(),
        CompressionConfig::gzip(),
        CompressionConfig::zstd_level(9),
    ] {
        for &kind in EngineKind::ALL {
            let dir = tempfile::tempdir().unwrap();
            let mut config = config_for(kind, &dir);
            config.compression = compression;
            let s = Storage::open(&config).unwrap();
            s.set("doc", &text).unwrap();
            s.set("tiny", b"x").unwrap();
            assert_eq!(s.get("doc").unwrap(), Some(text.clone()), "{kind} {compression:?}");
            assert_eq!(s.get("tiny").unwrap(), Some(b"x".to_vec()));
        }
    }
}

#[test]
fn test_ttl_expiry_on_every_engine() {
    for &kind in EngineKind::ALL {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_for(kind, &dir);
        config.ttl = Some(Duration::from_millis(50));
        let s = Storage::open(&config).unwrap();
        s.set("k", b"v").unwrap();
        assert_eq!(s.get("k").unwrap(), Some(b"v".to_vec()), "{kind}");
        std::thread::sleep(Duration::from_millis(120));
        assert_eq!(s.get("k").unwrap(), None, "{kind}");
    }
}

#[test]
fn test_engine_specific_actions() {
    let dir = tempfile::tempdir().unwrap();

    let sled = Storage::open(&config_for(EngineKind::Sled, &dir)).unwrap();
    assert!(sled.action("flush", &[]).is_ok());
    assert!(sled.action("sizeOnDisk", &[]).is_ok());
    assert!(sled.action("getCollections", &[]).unwrap().contains_key("contract"));
    assert!(sled.action("vacuum", &[]).is_err());

    let redb = Storage::open(&config_for(EngineKind::Redb, &dir)).unwrap();
    assert!(redb.action("compact", &[]).is_ok());
    assert!(redb.action("flush", &[]).is_err());

    let sqlite = Storage::open(&config_for(EngineKind::Sqlite, &dir)).unwrap();
    assert!(sqlite.action("vacuum", &[]).is_ok());
    assert!(sqlite.action("getCollections", &[]).unwrap().contains_key("contract"));
    assert!(sqlite.action("compact", &[]).is_err());

    let dal = Storage::open(&config_for(EngineKind::Dal, &dir)).unwrap();
    let pong = dal
        .action("ping", &[ActionArg::from(Duration::from_secs(1))])
        .unwrap();
    assert_eq!(pong["ok"], serde_json::json!(true));
    assert!(matches!(
        dal.action("ping", &[]),
        Err(StoreError::InvalidArguments(_))
    ));
    assert!(dal.action("dsn", &[]).unwrap()["dsn"]
        .as_str()
        .unwrap()
        .starts_with("sqlite://"));
    assert!(dal.action("getCollections", &[]).unwrap().contains_key("contract"));
}

#[test]
fn test_mounted_handles_share_the_contract() {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig::builder()
        .bucket("mounted")
        .compression(CompressionConfig::lz4())
        .build();
    let value = b"mounted mounted mounted mounted ".repeat(50);

    let sled_db = sled::Config::new().path(dir.path().join("sled")).open().unwrap();
    let redb_db = redb::Database::create(dir.path().join("mounted.redb")).unwrap();
    let conn = rusqlite::Connection::open(dir.path().join("mounted.db")).unwrap();

    let backends: Vec<Box<dyn StorageBackend>> = vec![
        Box::new(SledStore::mount(sled_db, &config).unwrap()),
        Box::new(RedbStore::mount(redb_db, &config).unwrap()),
        Box::new(SqliteStore::mount(conn, &config).unwrap()),
    ];
    for backend in backends {
        let s = Storage::from_backend(backend);
        let kind = s.kind();
        s.init().unwrap();
        s.set("doc", &value).unwrap();
        assert_eq!(s.get("doc").unwrap(), Some(value.clone()), "{kind}");
        assert_eq!(s.keys().unwrap(), vec!["doc".to_string()], "{kind}");
        s.close().unwrap();
        assert!(matches!(s.get("doc"), Err(StoreError::Closed { .. })), "{kind}");
    }
}

#[test]
fn test_dal_from_parts_and_missing_parameters() {
    let dir = tempfile::tempdir().unwrap();
    let mut options = BTreeMap::new();
    options.insert("busy_timeout".to_string(), "1000".to_string());
    let config = StorageConfig::builder()
        .engine("pivot")
        .defaults(Defaults::rooted_at(dir.path()))
        .dal(DalConfig {
            scheme: Some("sqlite3".to_string()),
            host: Some("localhost".to_string()),
            dataset: Some("parts.db".to_string()),
            options: Some(options),
            ..DalConfig::default()
        })
        .build();
    let s = Storage::open(&config).unwrap();
    s.set("k", b"v").unwrap();
    assert_eq!(s.get("k").unwrap(), Some(b"v".to_vec()));
    assert!(dir.path().join("dal").join("parts.db").is_file());

    let config = StorageConfig::builder()
        .engine("dal")
        .defaults(Defaults::rooted_at(dir.path()))
        .dal(DalConfig {
            host: Some("localhost".to_string()),
            ..DalConfig::default()
        })
        .build();
    match Storage::open(&config) {
        Err(StoreError::MissingParameters(missing)) => {
            assert_eq!(missing, vec!["scheme", "dataset", "options"]);
        }
        Err(e) => panic!("unexpected error {e}"),
        Ok(_) => panic!("open should fail"),
    }
}

#[test]
fn test_dal_dsn_with_space_opens_named_file() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("my data.db");
    let config = StorageConfig::builder()
        .engine("dal")
        .defaults(Defaults::rooted_at(dir.path()))
        .dsn(format!("sqlite://{}", file.display()))
        .build();
    let s = Storage::open(&config).unwrap();
    s.set("k", b"v").unwrap();
    s.close().unwrap();

    assert!(file.is_file());
    assert!(!dir.path().join("my%20data.db").exists());
}

#[test]
fn test_dal_rejects_unsupported_scheme() {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig::builder()
        .engine("dal")
        .defaults(Defaults::rooted_at(dir.path()))
        .dsn("postgres://user:pw@localhost/app")
        .build();
    assert!(matches!(Storage::open(&config), Err(StoreError::Config(_))));
}

#[test]
fn test_storage_path_that_is_a_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("not-a-dir");
    std::fs::write(&file, b"x").unwrap();
    for kind in [EngineKind::Sled, EngineKind::Redb, EngineKind::Sqlite] {
        let config = StorageConfig::builder()
            .engine_kind(kind)
            .storage_path(&file)
            .build();
        assert!(
            matches!(Storage::open(&config), Err(StoreError::Config(_))),
            "{kind}"
        );
    }
}
