//! Content-format detection by magic number.
//!
//! Classifies an opaque blob as one of a handful of compression / archive
//! formats from its header bytes alone, independent of any file name. Names
//! can be classified separately with [`Format::from_name`].
//!
//! | Format | Offset | Bytes |
//! |--------|--------|-------|
//! | GZip   | 0      | `1F 8B` |
//! | BZip2  | 0      | `42 5A 68` |
//! | LZ4    | 0      | `18 4D 22 04` (header read little-endian) |
//! | Zip    | 0      | `50 4B 03 04`, empty `50 4B 05 06`, spanned `50 4B 07 08` |
//! | Tar    | 257    | `75 73 74 61 72 00 30 30` or `75 73 74 61 72 00 20 00` |

mod detect;

pub use detect::{
    ReadAt, detect_format, detect_variant, is_bzip2, is_gzip, is_lz4, is_tar, is_zip,
};

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Compression / archive format tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    #[default]
    Unknown,
    GZip,
    BZip2,
    LZ4,
    /// Tar, either signature
    Tar,
    /// POSIX ustar signature; normalizes to `Tar`
    Tar1,
    /// GNU tar signature; normalizes to `Tar`
    Tar2,
    Zip,
    /// Empty archive; normalizes to `Zip`
    ZipEmpty,
    /// Spanned archive; normalizes to `Zip`
    ZipSpanned,
}

impl Format {
    pub fn name(self) -> &'static str {
        match self {
            Format::Unknown => "Unknown",
            Format::GZip => "GZip",
            Format::BZip2 => "BZip2",
            Format::LZ4 => "LZ4",
            Format::Tar => "Tar",
            Format::Tar1 => "Tar1",
            Format::Tar2 => "Tar2",
            Format::Zip => "Zip",
            Format::ZipEmpty => "ZipEmpty",
            Format::ZipSpanned => "ZipSpanned",
        }
    }

    /// Canonical extension, leading dot included. Sub-variants report their
    /// container's extension.
    pub fn ext(self) -> &'static str {
        match self {
            Format::GZip => ".gz",
            Format::BZip2 => ".bz2",
            Format::LZ4 => ".lz4",
            Format::Tar | Format::Tar1 | Format::Tar2 => ".tar",
            Format::Zip | Format::ZipEmpty | Format::ZipSpanned => ".zip",
            Format::Unknown => "unknown",
        }
    }

    /// Fold signature sub-variants into their container tag.
    pub fn normalize(self) -> Format {
        match self {
            Format::Tar1 | Format::Tar2 => Format::Tar,
            Format::ZipEmpty | Format::ZipSpanned => Format::Zip,
            other => other,
        }
    }

    /// True for formats whose payload is already compressed; recompressing
    /// them buys nothing.
    pub fn is_compressed(self) -> bool {
        matches!(
            self.normalize(),
            Format::GZip | Format::BZip2 | Format::LZ4 | Format::Zip
        )
    }

    /// Map an extension or format name onto a tag.
    ///
    /// Case-insensitive, one leading `.` is ignored. Compressed-tar spellings
    /// (`tar.gz`, `tgz`, ...) map to the compression format, not `Tar`.
    pub fn from_name(name: &str) -> Format {
        let name = name.strip_prefix('.').unwrap_or(name);
        match name.to_ascii_lowercase().as_str() {
            "gzip" | "gz" | "tar.gz" | "tgz" => Format::GZip,
            "tar" => Format::Tar,
            "bz2" | "bzip2" | "tbz" | "tb2" | "tbz2" | "tar.bz2" => Format::BZip2,
            "lz4" | "tar.lz4" | "tz4" => Format::LZ4,
            "zip" => Format::Zip,
            _ => Format::Unknown,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Format::from_name(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_case_insensitive_and_dot_stripped() {
        assert_eq!(Format::from_name(".TAR.GZ"), Format::GZip);
        assert_eq!(Format::from_name("tgz"), Format::GZip);
        assert_eq!(Format::from_name("Gzip"), Format::GZip);
        assert_eq!(Format::from_name(".tbz2"), Format::BZip2);
        assert_eq!(Format::from_name("tar.lz4"), Format::LZ4);
        assert_eq!(Format::from_name("ZIP"), Format::Zip);
        assert_eq!(Format::from_name("tar"), Format::Tar);
    }

    #[test]
    fn unrecognized_names_are_unknown() {
        assert_eq!(Format::from_name(""), Format::Unknown);
        assert_eq!(Format::from_name("."), Format::Unknown);
        assert_eq!(Format::from_name("rar"), Format::Unknown);
        // only one leading dot is stripped
        assert_eq!(Format::from_name("..gz"), Format::Unknown);
    }

    #[test]
    fn from_str_matches_from_name() {
        let parsed: Format = "tar.bz2".parse().unwrap();
        assert_eq!(parsed, Format::BZip2);
    }

    #[test]
    fn variants_share_container_extension() {
        assert_eq!(Format::Tar1.ext(), ".tar");
        assert_eq!(Format::Tar2.ext(), ".tar");
        assert_eq!(Format::ZipEmpty.ext(), ".zip");
        assert_eq!(Format::ZipSpanned.ext(), ".zip");
        assert_eq!(Format::GZip.ext(), ".gz");
        assert_eq!(Format::Unknown.ext(), "unknown");
    }

    #[test]
    fn normalize_folds_variants() {
        assert_eq!(Format::Tar2.normalize(), Format::Tar);
        assert_eq!(Format::ZipSpanned.normalize(), Format::Zip);
        assert_eq!(Format::LZ4.normalize(), Format::LZ4);
    }

    #[test]
    fn compressed_formats() {
        assert!(Format::GZip.is_compressed());
        assert!(Format::ZipEmpty.is_compressed());
        assert!(!Format::Tar.is_compressed());
        assert!(!Format::Unknown.is_compressed());
    }

    #[test]
    fn display_names() {
        assert_eq!(Format::BZip2.to_string(), "BZip2");
        assert_eq!(Format::ZipSpanned.to_string(), "ZipSpanned");
    }
}
