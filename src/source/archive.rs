// src/source/archive.rs

//! Source archive extraction
//!
//! Handles tarballs compressed with gzip, xz or zstd, and plain tar.

use crate::error::{Error, Result};
use crate::source::SourceArchive;
use flate2::read::GzDecoder;
use std::io::Read;
use std::path::{Path, PathBuf};
use tar::Archive;
use tracing::debug;
use xz2::read::XzDecoder;

/// Compression wrapped around a source tarball
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    Gzip,
    Xz,
    Zstd,
    None,
}

impl CompressionFormat {
    /// Detect compression from magic bytes, falling back to the file name
    pub fn detect(archive: &SourceArchive) -> Result<Self> {
        let bytes = archive.bytes();

        if bytes.starts_with(&[0x1F, 0x8B]) {
            return Ok(CompressionFormat::Gzip);
        }
        if bytes.starts_with(&[0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00]) {
            return Ok(CompressionFormat::Xz);
        }
        if bytes.starts_with(&[0x28, 0xB5, 0x2F, 0xFD]) {
            return Ok(CompressionFormat::Zstd);
        }
        // POSIX tar carries "ustar" at offset 257
        if bytes.len() > 262 && &bytes[257..262] == b"ustar" {
            return Ok(CompressionFormat::None);
        }

        let name = archive.file_name();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Ok(CompressionFormat::Gzip)
        } else if name.ends_with(".tar.xz") {
            Ok(CompressionFormat::Xz)
        } else if name.ends_with(".tar.zst") {
            Ok(CompressionFormat::Zstd)
        } else if name.ends_with(".tar") {
            Ok(CompressionFormat::None)
        } else {
            Err(Error::ArchiveFormat(format!(
                "Unrecognized source archive: {}. Expected .tar.gz, .tar.xz, .tar.zst or .tar",
                name
            )))
        }
    }
}

fn open_archive<'a>(archive: &'a SourceArchive) -> Result<Archive<Box<dyn Read + 'a>>> {
    let bytes = archive.bytes();

    let reader: Box<dyn Read + 'a> = match CompressionFormat::detect(archive)? {
        CompressionFormat::Gzip => Box::new(GzDecoder::new(bytes)),
        CompressionFormat::Xz => Box::new(XzDecoder::new(bytes)),
        CompressionFormat::Zstd => {
            let decoder = zstd::Decoder::new(bytes)
                .map_err(|e| Error::ArchiveFormat(format!("Failed to create zstd decoder: {}", e)))?;
            Box::new(decoder)
        }
        CompressionFormat::None => Box::new(bytes),
    };

    Ok(Archive::new(reader))
}

/// Unpack `archive` into `scratch` and return the path of its source directory
///
/// The archive must unpack to a top-level directory named `source_dir_name`
/// (`<name>-<version>` by convention). Entries that would land outside
/// `scratch` are rejected.
pub fn extract(archive: &SourceArchive, scratch: &Path, source_dir_name: &str) -> Result<PathBuf> {
    debug!("Extracting {} into {}", archive.file_name(), scratch.display());

    let mut tar = open_archive(archive)?;
    tar.set_preserve_permissions(true);
    tar.set_overwrite(true);

    let mut count = 0usize;
    for entry in tar
        .entries()
        .map_err(|e| Error::ArchiveFormat(format!("Failed to read archive: {}", e)))?
    {
        let mut entry =
            entry.map_err(|e| Error::ArchiveFormat(format!("Failed to read entry: {}", e)))?;

        let entry_path = entry
            .path()
            .map_err(|e| Error::ArchiveFormat(format!("Failed to get entry path: {}", e)))?
            .to_path_buf();

        let unpacked = entry.unpack_in(scratch).map_err(|e| {
            Error::ArchiveFormat(format!("Failed to unpack {}: {}", entry_path.display(), e))
        })?;
        if !unpacked {
            return Err(Error::ArchiveFormat(format!(
                "Entry escapes the extraction directory: {}",
                entry_path.display()
            )));
        }
        count += 1;
    }

    let source_dir = scratch.join(source_dir_name);
    if !source_dir.is_dir() {
        return Err(Error::ArchiveFormat(format!(
            "Archive does not contain source directory {}",
            source_dir_name
        )));
    }

    debug!("Extracted {} entries to {}", count, source_dir.display());
    Ok(source_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn build_tar(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_mtime(0);
            header.set_cksum();
            builder.append_data(&mut header, path, *content).unwrap();
        }
        builder.into_inner().unwrap()
    }

    fn gzip(bytes: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    fn xz(bytes: &[u8]) -> Vec<u8> {
        let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    const FILES: &[(&str, &[u8])] = &[
        ("dmenuwrap-0.1.0/setup.py", b"from distutils.core import setup\n"),
        ("dmenuwrap-0.1.0/COPYING", b"license text\n"),
    ];

    #[test]
    fn test_detect_from_magic_bytes() {
        let tar = build_tar(FILES);
        let cases = [
            (gzip(&tar), CompressionFormat::Gzip),
            (xz(&tar), CompressionFormat::Xz),
            (zstd::encode_all(&tar[..], 0).unwrap(), CompressionFormat::Zstd),
            (tar.clone(), CompressionFormat::None),
        ];

        for (bytes, expected) in cases {
            let archive = SourceArchive::new("https://example.com/download", bytes);
            assert_eq!(CompressionFormat::detect(&archive).unwrap(), expected);
        }
    }

    #[test]
    fn test_detect_falls_back_to_suffix() {
        let archive = SourceArchive::new("https://example.com/src.tar.xz", b"??".to_vec());
        assert_eq!(CompressionFormat::detect(&archive).unwrap(), CompressionFormat::Xz);

        let archive = SourceArchive::new("https://example.com/src.zip", b"PK\x03\x04".to_vec());
        assert!(matches!(
            CompressionFormat::detect(&archive),
            Err(Error::ArchiveFormat(_))
        ));
    }

    #[test]
    fn test_extract_each_format() {
        let tar = build_tar(FILES);
        let payloads = [
            gzip(&tar),
            xz(&tar),
            zstd::encode_all(&tar[..], 0).unwrap(),
            tar.clone(),
        ];

        for bytes in payloads {
            let scratch = tempfile::tempdir().unwrap();
            let archive = SourceArchive::new("dmenuwrap-0.1.0.tar.gz", bytes);

            let source_dir = extract(&archive, scratch.path(), "dmenuwrap-0.1.0").unwrap();

            assert_eq!(source_dir, scratch.path().join("dmenuwrap-0.1.0"));
            assert_eq!(
                std::fs::read(source_dir.join("COPYING")).unwrap(),
                b"license text\n"
            );
            assert!(source_dir.join("setup.py").is_file());
        }
    }

    #[test]
    fn test_extract_missing_source_dir() {
        let scratch = tempfile::tempdir().unwrap();
        let archive = SourceArchive::new("x.tar.gz", gzip(&build_tar(FILES)));

        let result = extract(&archive, scratch.path(), "dmenuwrap-0.2.0");
        assert!(matches!(result, Err(Error::ArchiveFormat(_))));
    }

    #[test]
    fn test_extract_corrupt_gzip() {
        let scratch = tempfile::tempdir().unwrap();
        // Valid gzip header followed by a deflate block with a reserved type
        let mut bytes = vec![0x1F, 0x8B, 0x08, 0x00, 0, 0, 0, 0, 0x00, 0x03];
        bytes.extend_from_slice(&[0xFF; 16]);
        let archive = SourceArchive::new("dmenuwrap-0.1.0.tar.gz", bytes);

        let result = extract(&archive, scratch.path(), "dmenuwrap-0.1.0");
        assert!(matches!(result, Err(Error::ArchiveFormat(_))));
    }
}
