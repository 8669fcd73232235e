// Format detection against real encoder output and on-disk files.

use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::{Cursor, Seek, SeekFrom, Write};
use stowage_core::format::{
    ReadAt, detect_format, detect_variant, is_bzip2, is_gzip, is_lz4, is_tar, is_zip,
};
use stowage_core::{Format, FormatError};

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn tar_header(name: &str) -> Vec<u8> {
    let mut block = vec![0u8; 512];
    block[..name.len()].copy_from_slice(name.as_bytes());
    block[257..265].copy_from_slice(b"ustar\x0000");
    block
}

#[test]
fn test_real_gzip_stream_is_detected() {
    let packed = gzip(&b"log line\n".repeat(500));
    assert!(is_gzip(&packed).unwrap());
    assert!(!is_lz4(&packed).unwrap());
    assert_eq!(detect_format(&packed).unwrap(), Format::GZip);
}

#[test]
fn test_lz4_frame_magic() {
    // LZ4 frame header: magic, FLG, BD, HC
    let mut frame = vec![0x04u8, 0x22, 0x4d, 0x18, 0x64, 0x40, 0xa7];
    frame.resize(300, 0);
    assert_eq!(detect_format(&frame).unwrap(), Format::LZ4);
}

#[test]
fn test_tar_archive_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("archive.tar");
    let mut archive = tar_header("hello.txt");
    archive.extend_from_slice(&[0u8; 1024]);
    std::fs::write(&path, &archive).unwrap();

    let file = std::fs::File::open(&path).unwrap();
    assert!(is_tar(&file).unwrap());
    assert_eq!(detect_variant(&file).unwrap(), Format::Tar1);
    assert_eq!(detect_format(&file).unwrap(), Format::Tar);
}

#[test]
fn test_file_position_is_not_consumed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blob.gz");
    std::fs::write(&path, gzip(b"payload payload payload")).unwrap();

    let mut file = std::fs::File::open(&path).unwrap();
    file.seek(SeekFrom::Start(3)).unwrap();
    assert_eq!(detect_format(&file).unwrap(), Format::GZip);
    #[cfg(unix)]
    assert_eq!(file.stream_position().unwrap(), 3);
}

#[test]
fn test_zip_variants_normalize() {
    for (magic, variant) in [
        ([0x50u8, 0x4b, 0x03, 0x04], Format::Zip),
        ([0x50, 0x4b, 0x05, 0x06], Format::ZipEmpty),
        ([0x50, 0x4b, 0x07, 0x08], Format::ZipSpanned),
    ] {
        let mut data = magic.to_vec();
        data.resize(512, 0);
        assert!(is_zip(&data).unwrap());
        assert_eq!(detect_variant(&data).unwrap(), variant);
        assert_eq!(detect_format(&data).unwrap(), Format::Zip);
    }
}

#[test]
fn test_bzip2_needs_tar_window() {
    // bzip2 is probed after tar, so the source must reach offset 265
    let mut data = b"BZh91AY&SY".to_vec();
    assert!(is_bzip2(&data).unwrap());
    assert!(matches!(
        detect_format(&data),
        Err(FormatError::ShortRead {
            format: Format::Tar,
            ..
        })
    ));
    data.resize(600, 0);
    assert_eq!(detect_format(&data).unwrap(), Format::BZip2);
}

#[test]
fn test_empty_and_tiny_sources() {
    assert!(matches!(
        detect_format(&Vec::<u8>::new()),
        Err(FormatError::Empty)
    ));
    // a bare gzip magic is too short for the LZ4 probe that runs first
    assert!(matches!(
        detect_format(&vec![0x1fu8, 0x8b]),
        Err(FormatError::ShortRead {
            format: Format::LZ4,
            ..
        })
    ));
    assert!(detect_format(&vec![0x42u8]).is_err());
}

#[test]
fn test_unknown_is_an_error() {
    let data = vec![b'a'; 1024];
    assert!(matches!(detect_format(&data), Err(FormatError::Unknown)));
}

#[test]
fn test_cursor_and_slice_sources_agree() {
    let packed = gzip(b"same bytes");
    let cursor = Cursor::new(packed.clone());
    let slice: &[u8] = &packed;
    assert_eq!(detect_format(&cursor).unwrap(), detect_format(slice).unwrap());
    let mut buf = [0u8; 2];
    cursor.read_exact_at(&mut buf, 0).unwrap();
    assert_eq!(buf, [0x1f, 0x8b]);
}

#[test]
fn test_names_and_extensions() {
    assert_eq!(Format::from_name(".TAR.GZ"), Format::GZip);
    assert_eq!(Format::from_name("tgz"), Format::GZip);
    assert_eq!(Format::from_name("tb2"), Format::BZip2);
    assert_eq!(Format::from_name("tz4"), Format::LZ4);
    assert_eq!(Format::from_name("docx"), Format::Unknown);
    assert_eq!(Format::Tar1.ext(), Format::Tar.ext());
    assert_eq!("zip".parse::<Format>().unwrap(), Format::Zip);
}
