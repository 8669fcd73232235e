//! Magic-number probes.
//!
//! Every probe reads a fixed window at a fixed offset through [`ReadAt`], so
//! the source's stream position (if it has one) is never consumed. A probe
//! that cannot fill its window fails with [`FormatError::ShortRead`] and the
//! whole detection stops there.

use super::Format;
use crate::error::FormatError;
use std::fs::File;
use std::io::{self, Cursor};

const MAGIC_GZIP: [u8; 2] = [0x1f, 0x8b];
const MAGIC_BZIP2: [u8; 3] = [0x42, 0x5a, 0x68];
const MAGIC_LZ4: [u8; 4] = [0x18, 0x4d, 0x22, 0x04];
const MAGIC_ZIP: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];
const MAGIC_ZIP_EMPTY: [u8; 4] = [0x50, 0x4b, 0x05, 0x06];
const MAGIC_ZIP_SPANNED: [u8; 4] = [0x50, 0x4b, 0x07, 0x08];
const MAGIC_TAR1: [u8; 8] = [0x75, 0x73, 0x74, 0x61, 0x72, 0x00, 0x30, 0x30];
const MAGIC_TAR2: [u8; 8] = [0x75, 0x73, 0x74, 0x61, 0x72, 0x00, 0x20, 0x00];

const TAR_OFFSET: u64 = 257;

/// Random-access byte source.
pub trait ReadAt {
    /// Read up to `buf.len()` bytes starting at `offset`. Returns the number
    /// of bytes read; `0` means `offset` is at or past the end.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;

    /// Fill `buf` from `offset` or fail with `UnexpectedEof`.
    fn read_exact_at(&self, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
        while !buf.is_empty() {
            match self.read_at(buf, offset) {
                Ok(0) => break,
                Ok(n) => {
                    buf = &mut buf[n..];
                    offset += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        if buf.is_empty() {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "failed to fill whole buffer",
            ))
        }
    }
}

impl ReadAt for [u8] {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(self.len());
        let n = buf.len().min(self.len() - start);
        buf[..n].copy_from_slice(&self[start..start + n]);
        Ok(n)
    }
}

impl ReadAt for Vec<u8> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        self.as_slice().read_at(buf, offset)
    }
}

impl<T: ReadAt + ?Sized> ReadAt for &T {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        (**self).read_at(buf, offset)
    }
}

impl<T: AsRef<[u8]>> ReadAt for Cursor<T> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        self.get_ref().as_ref().read_at(buf, offset)
    }
}

#[cfg(unix)]
impl ReadAt for File {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        std::os::unix::fs::FileExt::read_at(self, buf, offset)
    }
}

// seek_read moves the file cursor on Windows; there is no positional read
// that leaves it alone.
#[cfg(windows)]
impl ReadAt for File {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        std::os::windows::fs::FileExt::seek_read(self, buf, offset)
    }
}

fn probe<const N: usize, R: ReadAt + ?Sized>(
    source: &R,
    offset: u64,
    format: Format,
) -> Result<[u8; N], FormatError> {
    let mut window = [0u8; N];
    source
        .read_exact_at(&mut window, offset)
        .map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => FormatError::ShortRead {
                format,
                offset,
                needed: N,
            },
            _ => FormatError::Io(e),
        })?;
    Ok(window)
}

/// LZ4 frame. The header is read little-endian and compared with the
/// big-endian constant, so the bytes on disk are `04 22 4D 18`.
pub fn is_lz4<R: ReadAt + ?Sized>(source: &R) -> Result<bool, FormatError> {
    let header = probe::<4, _>(source, 0, Format::LZ4)?;
    Ok(u32::from_le_bytes(header) == u32::from_be_bytes(MAGIC_LZ4))
}

pub fn is_gzip<R: ReadAt + ?Sized>(source: &R) -> Result<bool, FormatError> {
    let header = probe::<2, _>(source, 0, Format::GZip)?;
    Ok(u16::from_be_bytes(header) == u16::from_be_bytes(MAGIC_GZIP))
}

pub fn is_bzip2<R: ReadAt + ?Sized>(source: &R) -> Result<bool, FormatError> {
    let header = probe::<3, _>(source, 0, Format::BZip2)?;
    Ok(header == MAGIC_BZIP2)
}

/// Matches regular, empty and spanned archives alike; use
/// [`detect_variant`] to tell them apart.
pub fn is_zip<R: ReadAt + ?Sized>(source: &R) -> Result<bool, FormatError> {
    Ok(zip_variant(source)?.is_some())
}

/// Matches both tar signatures at offset 257.
pub fn is_tar<R: ReadAt + ?Sized>(source: &R) -> Result<bool, FormatError> {
    Ok(tar_variant(source)?.is_some())
}

fn zip_variant<R: ReadAt + ?Sized>(source: &R) -> Result<Option<Format>, FormatError> {
    let header = u32::from_be_bytes(probe::<4, _>(source, 0, Format::Zip)?);
    let variant = [
        (MAGIC_ZIP, Format::Zip),
        (MAGIC_ZIP_EMPTY, Format::ZipEmpty),
        (MAGIC_ZIP_SPANNED, Format::ZipSpanned),
    ]
    .into_iter()
    .find(|(magic, _)| u32::from_be_bytes(*magic) == header)
    .map(|(_, format)| format);
    Ok(variant)
}

fn tar_variant<R: ReadAt + ?Sized>(source: &R) -> Result<Option<Format>, FormatError> {
    let header = u64::from_be_bytes(probe::<8, _>(source, TAR_OFFSET, Format::Tar)?);
    if header == u64::from_be_bytes(MAGIC_TAR1) {
        Ok(Some(Format::Tar1))
    } else if header == u64::from_be_bytes(MAGIC_TAR2) {
        Ok(Some(Format::Tar2))
    } else {
        Ok(None)
    }
}

/// Classify `source`, reporting signature sub-variants (`Tar1`, `ZipEmpty`, ...).
///
/// Probe order is LZ4, GZip, Zip, Tar, BZip2; the first match wins.
pub fn detect_variant<R: ReadAt + ?Sized>(source: &R) -> Result<Format, FormatError> {
    let mut first = [0u8; 1];
    match source.read_at(&mut first, 0) {
        Ok(0) => return Err(FormatError::Empty),
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Err(FormatError::Empty),
        Err(e) => return Err(FormatError::Io(e)),
    }

    if is_lz4(source)? {
        return Ok(Format::LZ4);
    }
    if is_gzip(source)? {
        return Ok(Format::GZip);
    }
    if let Some(zip) = zip_variant(source)? {
        return Ok(zip);
    }
    if let Some(tar) = tar_variant(source)? {
        return Ok(tar);
    }
    if is_bzip2(source)? {
        return Ok(Format::BZip2);
    }
    Err(FormatError::Unknown)
}

/// Classify `source` into a container tag (`Tar`, `Zip`, ...).
pub fn detect_format<R: ReadAt + ?Sized>(source: &R) -> Result<Format, FormatError> {
    detect_variant(source).map(Format::normalize)
}
