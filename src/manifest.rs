// src/manifest.rs

//! Staging root manifests
//!
//! A manifest lists every entry below a staging root with its type, mode,
//! size and SHA-256. Entries are sorted by path and carry no timestamps, so
//! two byte-identical trees always produce equal manifests.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io;
use std::path::Path;
use tracing::debug;

/// Kind of filesystem entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    /// Sockets, FIFOs and device nodes; recorded but never opened
    Other,
}

/// One entry below a staging root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Path relative to the root, `/`-separated
    pub path: String,
    pub kind: EntryKind,
    pub mode: u32,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    /// Symlink target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

/// Sorted listing of a staging root
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Walk `root` and record every entry below it
    pub fn scan(root: &Path) -> Result<Self> {
        debug!("Scanning {}", root.display());

        let mut entries = Vec::new();
        walk(root, "", &mut entries)?;
        entries.sort_by(|a, b| a.path.cmp(&b.path));

        debug!("Manifest of {} has {} entries", root.display(), entries.len());
        Ok(Self { entries })
    }

    /// Look up an entry by its root-relative path
    pub fn get(&self, path: &str) -> Option<&ManifestEntry> {
        self.entries.iter().find(|e| e.path == path)
    }

    /// Regular files only
    pub fn files(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.iter().filter(|e| e.kind == EntryKind::File)
    }

    /// Total size of regular files in bytes
    pub fn total_size(&self) -> u64 {
        self.files().map(|e| e.size).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn walk(dir: &Path, prefix: &str, entries: &mut Vec<ManifestEntry>) -> Result<()> {
    for dirent in fs::read_dir(dir)? {
        let dirent = dirent?;
        let path = dirent.path();
        let name = dirent.file_name().to_string_lossy().into_owned();
        let rel = if prefix.is_empty() {
            name
        } else {
            format!("{}/{}", prefix, name)
        };

        let metadata = fs::symlink_metadata(&path)?;
        let file_type = metadata.file_type();
        let mode = file_mode(&metadata);

        if file_type.is_symlink() {
            let target = fs::read_link(&path)?;
            entries.push(ManifestEntry {
                path: rel,
                kind: EntryKind::Symlink,
                mode,
                size: 0,
                sha256: None,
                target: Some(target.to_string_lossy().into_owned()),
            });
        } else if file_type.is_dir() {
            entries.push(ManifestEntry {
                path: rel.clone(),
                kind: EntryKind::Dir,
                mode,
                size: 0,
                sha256: None,
                target: None,
            });
            walk(&path, &rel, entries)?;
        } else if file_type.is_file() {
            entries.push(ManifestEntry {
                path: rel,
                kind: EntryKind::File,
                mode,
                size: metadata.len(),
                sha256: Some(hash_file(&path)?),
                target: None,
            });
        } else {
            entries.push(ManifestEntry {
                path: rel,
                kind: EntryKind::Other,
                mode,
                size: 0,
                sha256: None,
                target: None,
            });
        }
    }
    Ok(())
}

fn hash_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    if metadata.permissions().readonly() { 0o444 } else { 0o644 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_lists_sorted_entries() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("usr/share/licenses/python-dmenuwrap")).unwrap();
        fs::write(
            root.path().join("usr/share/licenses/python-dmenuwrap/COPYING"),
            b"",
        )
        .unwrap();
        fs::create_dir_all(root.path().join("usr/lib")).unwrap();
        fs::write(root.path().join("usr/lib/dmenuwrap.py"), b"import subprocess\n").unwrap();

        let manifest = Manifest::scan(root.path()).unwrap();
        let paths: Vec<&str> = manifest.entries.iter().map(|e| e.path.as_str()).collect();

        assert_eq!(
            paths,
            vec![
                "usr",
                "usr/lib",
                "usr/lib/dmenuwrap.py",
                "usr/share",
                "usr/share/licenses",
                "usr/share/licenses/python-dmenuwrap",
                "usr/share/licenses/python-dmenuwrap/COPYING",
            ]
        );

        let copying = manifest.get("usr/share/licenses/python-dmenuwrap/COPYING").unwrap();
        assert_eq!(copying.kind, EntryKind::File);
        assert_eq!(
            copying.sha256.as_deref(),
            Some("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
        );
        assert_eq!(manifest.files().count(), 2);
        assert_eq!(manifest.total_size(), 18);
    }

    #[test]
    fn test_identical_trees_have_equal_manifests() {
        let build = || {
            let root = tempfile::tempdir().unwrap();
            fs::create_dir_all(root.path().join("usr/bin")).unwrap();
            fs::write(root.path().join("usr/bin/tool"), b"#!/bin/sh\n").unwrap();
            root
        };
        let a = build();
        let b = build();

        assert_eq!(
            Manifest::scan(a.path()).unwrap(),
            Manifest::scan(b.path()).unwrap()
        );

        fs::write(b.path().join("usr/bin/tool"), b"#!/bin/bash\n").unwrap();
        assert_ne!(
            Manifest::scan(a.path()).unwrap(),
            Manifest::scan(b.path()).unwrap()
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_records_symlinks_and_modes() {
        use std::os::unix::fs::PermissionsExt;

        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("real"), b"x").unwrap();
        fs::set_permissions(root.path().join("real"), fs::Permissions::from_mode(0o755)).unwrap();
        std::os::unix::fs::symlink("real", root.path().join("link")).unwrap();

        let manifest = Manifest::scan(root.path()).unwrap();

        let link = manifest.get("link").unwrap();
        assert_eq!(link.kind, EntryKind::Symlink);
        assert_eq!(link.target.as_deref(), Some("real"));
        assert_eq!(manifest.get("real").unwrap().mode, 0o755);
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_records_sockets_without_opening_them() {
        let root = tempfile::tempdir().unwrap();
        let _listener =
            std::os::unix::net::UnixListener::bind(root.path().join("ctl.sock")).unwrap();
        fs::write(root.path().join("data"), b"abc").unwrap();

        let manifest = Manifest::scan(root.path()).unwrap();

        let socket = manifest.get("ctl.sock").unwrap();
        assert_eq!(socket.kind, EntryKind::Other);
        assert_eq!(socket.sha256, None);
        assert_eq!(manifest.files().count(), 1);
    }

    #[test]
    fn test_empty_root() {
        let root = tempfile::tempdir().unwrap();
        let manifest = Manifest::scan(root.path()).unwrap();
        assert!(manifest.is_empty());
        assert_eq!(manifest.to_json_pretty().unwrap(), "{\n  \"entries\": []\n}");
    }
}
