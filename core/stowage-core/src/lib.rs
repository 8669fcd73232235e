//! # stowage: Pluggable Key/Value Storage
//!
//! One key/value contract ([`StorageBackend`]) backed interchangeably by
//! several embedded engines, with transparent value compression and
//! magic-number format detection layered on top.
//!
//! ## Key Features
//!
//! - **Interchangeable engines**: in-memory, sled, redb, SQLite, and a
//!   connection-string driven data-abstraction layer
//! - **Transparent compression**: LZ4, Snappy, Gzip, ZSTD; every stored value
//!   records its own codec, so changing the config never strands old data
//! - **TTL**: entries can expire a fixed time after being written
//! - **Format detection**: classify blobs as GZip / BZip2 / LZ4 / Tar / Zip
//!   from their header bytes
//!
//! ## Quick Start
//!
//! ```rust
//! use stowage_core::{Storage, StorageBackend, StorageConfig};
//! use stowage_core::storage::compression::CompressionConfig;
//!
//! # fn main() -> stowage_core::StoreResult<()> {
//! let config = StorageConfig::builder()
//!     .engine("in_memory")
//!     .compression(CompressionConfig::lz4())
//!     .build();
//! let storage = Storage::open(&config)?;
//!
//! storage.set("user:1", b"Alice")?;
//! assert_eq!(storage.get("user:1")?, Some(b"Alice".to_vec()));
//!
//! storage.delete("user:1")?;
//! assert_eq!(storage.get("user:1")?, None);
//! # Ok(())
//! # }
//! ```
//!
//! ### Format detection
//!
//! ```rust
//! use stowage_core::format::{detect_format, Format};
//!
//! let mut blob = vec![0x1fu8, 0x8b, 0x08];
//! blob.resize(512, 0);
//! assert_eq!(detect_format(&blob).unwrap(), Format::GZip);
//! assert_eq!(Format::from_name(".tgz"), Format::GZip);
//! ```
//!
//! ## Module Layout
//!
//! - [`config`]: [`StorageConfig`], engine names, injected defaults
//! - [`storage`]: the [`StorageBackend`] trait, engines, codecs, [`Storage`]
//! - [`format`]: magic-number detection
//! - [`error`]: [`StoreError`] and friends
//! - [`logging`]: optional `tracing-subscriber` setup

pub mod config;
pub mod error;
pub mod format;
pub mod storage;

// Logging utilities
pub mod logging;

// Re-export commonly used types
pub use config::{DalConfig, Defaults, EngineKind, StorageConfig};
pub use error::{CodecError, FormatError, StoreError, StoreResult};
pub use format::Format;
pub use storage::{ActionArg, ActionOutput, Storage, StorageBackend};
