//! Value compression for stowage backends.
//!
//! Compression is applied above the engine: the backend compresses on `set`
//! and decompresses on `get`, so callers always see the bytes they stored.
//! Every stored value carries the marker of the codec that produced it (see
//! [`Envelope`](super::envelope::Envelope)), so reads never depend on the
//! current configuration.
//!
//! # Supported Algorithms
//!
//! | Algorithm | Speed | Ratio | Marker |
//! |-----------|-------|-------|--------|
//! | None | ★★★★★ | ★ | 0 |
//! | LZ4 | ★★★★★ | ★★★ | 1 |
//! | Snappy | ★★★★★ | ★★★ | 2 |
//! | Gzip | ★★★ | ★★★★ | 3 |
//! | ZSTD | ★★★ | ★★★★★ | 4 |
//!
//! # Example
//!
//! ```rust
//! use stowage_core::storage::compression::{CompressionAlgorithm, CompressionConfig};
//!
//! let config = CompressionConfig::zstd_level(9);
//! assert_eq!(config.algorithm(), CompressionAlgorithm::Zstd);
//!
//! let codec = config.to_codec();
//! let packed = codec.compress(b"hello hello hello hello").unwrap();
//! assert_eq!(codec.decompress(&packed).unwrap(), b"hello hello hello hello");
//! ```

use crate::error::CodecError;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Upper bound on a single decompressed value.
pub const MAX_DECOMPRESSED_SIZE: usize = 512 * 1024 * 1024;

const GZIP_DEFAULT_LEVEL: u32 = 6;
const ZSTD_DEFAULT_LEVEL: u32 = 3;

/// Compression algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionAlgorithm {
    /// Store values as given.
    #[default]
    None,
    /// LZ4 block format with a length prefix.
    Lz4,
    /// Snappy raw format.
    Snappy,
    /// Gzip stream, levels 0-9.
    Gzip,
    /// Zstandard frame, levels 1-22.
    Zstd,
}

impl std::fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Lz4 => write!(f, "LZ4"),
            Self::Snappy => write!(f, "Snappy"),
            Self::Gzip => write!(f, "Gzip"),
            Self::Zstd => write!(f, "ZSTD"),
        }
    }
}

impl CompressionAlgorithm {
    /// All supported compression algorithms for enumeration/benchmarks.
    pub const ALL: &'static [CompressionAlgorithm] = &[
        CompressionAlgorithm::None,
        CompressionAlgorithm::Lz4,
        CompressionAlgorithm::Snappy,
        CompressionAlgorithm::Gzip,
        CompressionAlgorithm::Zstd,
    ];
}

/// Compression configuration carried by
/// [`StorageConfig`](crate::config::StorageConfig).
///
/// Controls which compression algorithm is used and its level (for
/// algorithms that support configurable compression levels).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    algorithm: CompressionAlgorithm,
    /// Compression level (only used by ZSTD and Gzip).
    /// - ZSTD: 1-22 (default: 3)
    /// - Gzip: 0-9 (default: 6)
    /// - LZ4/Snappy/None: ignored
    level: Option<u32>,
}

impl CompressionConfig {
    /// Create a new compression config with the specified algorithm.
    pub fn new(algorithm: CompressionAlgorithm) -> Self {
        Self {
            algorithm,
            level: None,
        }
    }

    /// Set the compression level. Clamped to the algorithm's range when the
    /// codec is built.
    pub fn with_level(mut self, level: u32) -> Self {
        self.level = Some(level);
        self
    }

    pub fn algorithm(&self) -> CompressionAlgorithm {
        self.algorithm
    }

    pub fn level(&self) -> Option<u32> {
        self.level
    }

    /// Resolve into a concrete codec, clamping the level.
    pub fn to_codec(&self) -> Codec {
        match self.algorithm {
            CompressionAlgorithm::None => Codec::None,
            CompressionAlgorithm::Lz4 => Codec::Lz4,
            CompressionAlgorithm::Snappy => Codec::Snappy,
            CompressionAlgorithm::Gzip => Codec::Gzip {
                level: self.level.unwrap_or(GZIP_DEFAULT_LEVEL).min(9),
            },
            CompressionAlgorithm::Zstd => Codec::Zstd {
                level: self.level.unwrap_or(ZSTD_DEFAULT_LEVEL).clamp(1, 22),
            },
        }
    }

    // ===== Convenience constructors for common presets =====

    pub fn none() -> Self {
        Self::new(CompressionAlgorithm::None)
    }

    pub fn lz4() -> Self {
        Self::new(CompressionAlgorithm::Lz4)
    }

    pub fn snappy() -> Self {
        Self::new(CompressionAlgorithm::Snappy)
    }

    pub fn gzip() -> Self {
        Self::new(CompressionAlgorithm::Gzip)
    }

    /// Preset: Gzip with specified compression level (0-9).
    pub fn gzip_level(level: u32) -> Self {
        Self::new(CompressionAlgorithm::Gzip).with_level(level)
    }

    pub fn zstd() -> Self {
        Self::new(CompressionAlgorithm::Zstd)
    }

    /// Preset: ZSTD with specified compression level (1-22).
    pub fn zstd_level(level: u32) -> Self {
        Self::new(CompressionAlgorithm::Zstd).with_level(level)
    }
}

/// A resolved codec with its level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    None,
    Lz4,
    Snappy,
    Gzip { level: u32 },
    Zstd { level: u32 },
}

impl Codec {
    /// Marker stored in the low nibble of a value's flag byte.
    pub fn marker(self) -> u8 {
        match self {
            Codec::None => 0,
            Codec::Lz4 => 1,
            Codec::Snappy => 2,
            Codec::Gzip { .. } => 3,
            Codec::Zstd { .. } => 4,
        }
    }

    /// Codec for a stored marker. The level only matters for compression, so
    /// defaults are used.
    pub fn from_marker(marker: u8) -> Result<Self, CodecError> {
        match marker {
            0 => Ok(Codec::None),
            1 => Ok(Codec::Lz4),
            2 => Ok(Codec::Snappy),
            3 => Ok(Codec::Gzip {
                level: GZIP_DEFAULT_LEVEL,
            }),
            4 => Ok(Codec::Zstd {
                level: ZSTD_DEFAULT_LEVEL,
            }),
            other => Err(CodecError::UnknownMarker(other)),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Codec::None => "none",
            Codec::Lz4 => "lz4",
            Codec::Snappy => "snappy",
            Codec::Gzip { .. } => "gzip",
            Codec::Zstd { .. } => "zstd",
        }
    }

    pub fn is_none(self) -> bool {
        matches!(self, Codec::None)
    }

    pub fn compress(self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let fail = |reason: String| CodecError::Compress {
            codec: self.name(),
            reason,
        };
        match self {
            Codec::None => Ok(data.to_vec()),
            Codec::Lz4 => Ok(lz4_flex::compress_prepend_size(data)),
            Codec::Snappy => snap::raw::Encoder::new()
                .compress_vec(data)
                .map_err(|e| fail(e.to_string())),
            Codec::Gzip { level } => {
                let mut encoder = GzEncoder::new(Vec::new(), Compression::new(level));
                encoder.write_all(data).map_err(|e| fail(e.to_string()))?;
                encoder.finish().map_err(|e| fail(e.to_string()))
            }
            Codec::Zstd { level } => {
                zstd::stream::encode_all(data, level as i32).map_err(|e| fail(e.to_string()))
            }
        }
    }

    /// Restore a payload. Output larger than [`MAX_DECOMPRESSED_SIZE`] is
    /// rejected before it is fully materialized.
    pub fn decompress(self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let fail = |reason: String| CodecError::Decompress {
            codec: self.name(),
            reason,
        };
        let too_large = CodecError::TooLarge {
            limit: MAX_DECOMPRESSED_SIZE,
        };
        match self {
            Codec::None => Ok(data.to_vec()),
            Codec::Lz4 => {
                let prefix: [u8; 4] = data
                    .get(..4)
                    .and_then(|p| p.try_into().ok())
                    .ok_or_else(|| fail("missing size prefix".to_string()))?;
                let len = u32::from_le_bytes(prefix) as usize;
                if len > MAX_DECOMPRESSED_SIZE {
                    return Err(too_large);
                }
                check_expansion(len, data.len()).map_err(fail)?;
                lz4_flex::decompress_size_prepended(data).map_err(|e| fail(e.to_string()))
            }
            Codec::Snappy => {
                let len = snap::raw::decompress_len(data).map_err(|e| fail(e.to_string()))?;
                if len > MAX_DECOMPRESSED_SIZE {
                    return Err(too_large);
                }
                check_expansion(len, data.len()).map_err(fail)?;
                snap::raw::Decoder::new()
                    .decompress_vec(data)
                    .map_err(|e| fail(e.to_string()))
            }
            Codec::Gzip { .. } => read_bounded(GzDecoder::new(data)).map_err(|e| match e {
                Bounded::TooLarge => too_large,
                Bounded::Io(e) => fail(e.to_string()),
            }),
            Codec::Zstd { .. } => {
                let decoder =
                    zstd::stream::read::Decoder::new(data).map_err(|e| fail(e.to_string()))?;
                read_bounded(decoder).map_err(|e| match e {
                    Bounded::TooLarge => too_large,
                    Bounded::Io(e) => fail(e.to_string()),
                })
            }
        }
    }
}

// Neither block format can expand a byte into more than 255, so a larger
// declared length is corrupt and must not drive the allocation.
const MAX_EXPANSION: usize = 255;

fn check_expansion(declared: usize, compressed: usize) -> Result<(), String> {
    if declared > compressed.saturating_mul(MAX_EXPANSION).saturating_add(16) {
        return Err(format!(
            "declared length {declared} is impossible for {compressed} input bytes"
        ));
    }
    Ok(())
}

enum Bounded {
    TooLarge,
    Io(std::io::Error),
}

fn read_bounded<R: Read>(reader: R) -> Result<Vec<u8>, Bounded> {
    let mut out = Vec::new();
    reader
        .take(MAX_DECOMPRESSED_SIZE as u64 + 1)
        .read_to_end(&mut out)
        .map_err(Bounded::Io)?;
    if out.len() > MAX_DECOMPRESSED_SIZE {
        return Err(Bounded::TooLarge);
    }
    Ok(out)
}
