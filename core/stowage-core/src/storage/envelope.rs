//! On-disk framing of stored values.
//!
//! ```text
//! [flags: u8][expiry_ms: u64 BE, present iff flags & 0x80][payload]
//! ```
//!
//! The low nibble of `flags` is the marker of the codec that produced the
//! payload. Reads decode with that marker, never with the current config.

use super::compression::Codec;
use crate::config::StorageConfig;
use crate::error::CodecError;
use crate::format;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const FLAG_EXPIRY: u8 = 0x80;
const MARKER_MASK: u8 = 0x0f;

/// Seals values on write and opens them on read.
#[derive(Debug, Clone, Copy)]
pub struct Envelope {
    codec: Codec,
    min_size: usize,
    ttl: Option<Duration>,
}

impl Envelope {
    pub fn new(codec: Codec, min_size: usize, ttl: Option<Duration>) -> Self {
        Self {
            codec,
            min_size,
            ttl,
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.codec(), config.compress_min_size, config.ttl)
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn seal(&self, value: &[u8]) -> Result<Vec<u8>, CodecError> {
        self.seal_at(value, now_millis())
    }

    /// Returns `None` when the entry has expired.
    pub fn open(&self, stored: &[u8]) -> Result<Option<Vec<u8>>, CodecError> {
        self.open_at(stored, now_millis())
    }

    pub(crate) fn seal_at(&self, value: &[u8], now_ms: u64) -> Result<Vec<u8>, CodecError> {
        let (codec, payload) = if self.should_compress(value) {
            let packed = self.codec.compress(value)?;
            if packed.len() < value.len() {
                (self.codec, packed)
            } else {
                (Codec::None, value.to_vec())
            }
        } else {
            (Codec::None, value.to_vec())
        };

        let expiry = self
            .ttl
            .map(|ttl| now_ms.saturating_add(ttl_millis(ttl)));

        let mut out = Vec::with_capacity(payload.len() + 9);
        match expiry {
            Some(at) => {
                out.push(codec.marker() | FLAG_EXPIRY);
                out.extend_from_slice(&at.to_be_bytes());
            }
            None => out.push(codec.marker()),
        }
        out.extend_from_slice(&payload);
        Ok(out)
    }

    pub(crate) fn open_at(&self, stored: &[u8], now_ms: u64) -> Result<Option<Vec<u8>>, CodecError> {
        let (&flags, rest) = stored
            .split_first()
            .ok_or_else(|| CodecError::Frame("empty value".to_string()))?;
        if flags & !(FLAG_EXPIRY | MARKER_MASK) != 0 {
            return Err(CodecError::Frame(format!("reserved flag bits set in {flags:#04x}")));
        }

        let payload = if flags & FLAG_EXPIRY != 0 {
            let (expiry, payload) = rest
                .split_first_chunk::<8>()
                .ok_or_else(|| CodecError::Frame("truncated expiry".to_string()))?;
            if u64::from_be_bytes(*expiry) <= now_ms {
                return Ok(None);
            }
            payload
        } else {
            rest
        };

        let codec = Codec::from_marker(flags & MARKER_MASK)?;
        codec.decompress(payload).map(Some)
    }

    fn should_compress(&self, value: &[u8]) -> bool {
        if self.codec.is_none() || value.is_empty() || value.len() < self.min_size {
            return false;
        }
        // already-compressed payloads only grow when compressed again
        !matches!(format::detect_format(value), Ok(f) if f.is_compressed())
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Whole milliseconds, rounded up so a sub-millisecond TTL still outlives
/// the write.
fn ttl_millis(ttl: Duration) -> u64 {
    ttl.as_nanos().div_ceil(1_000_000).min(u64::MAX as u128) as u64
}
