// src/stager.rs

//! The staging pipeline
//!
//! `fetch -> verify -> extract -> install -> install_license`, each step a
//! hard gate for the next. Files are installed into a hidden sibling of the
//! destination and renamed into place only after every step succeeded, so a
//! failed run never leaves a staging root that looks complete.

use crate::error::{Error, Result, Step};
use crate::installer::Installer;
use crate::manifest::Manifest;
use crate::recipe::{Checksum, PackageMetadata, MAX_OPTIMIZE};
use crate::source::{self, SourceArchive, SourceFetcher, HTTP_TIMEOUT};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Mode applied to the staged license file
pub const LICENSE_MODE: u32 = 0o644;

/// Mode applied to the staging root directory before it is moved into place
pub const ROOT_MODE: u32 = 0o755;

/// Runtime settings for a staging run
#[derive(Debug, Clone)]
pub struct StagerConfig {
    /// Timeout for source downloads
    pub http_timeout: Duration,
    /// Parent directory for scratch extraction; the system temp dir if unset
    pub scratch_dir: Option<PathBuf>,
    /// Overrides the recipe's bytecode optimization level
    pub optimize: Option<u8>,
}

impl Default for StagerConfig {
    fn default() -> Self {
        Self {
            http_timeout: HTTP_TIMEOUT,
            scratch_dir: None,
            optimize: None,
        }
    }
}

impl StagerConfig {
    /// Reject settings the delegate installer cannot accept
    pub fn validate(&self) -> Result<()> {
        if let Some(level) = self.optimize
            && level > MAX_OPTIMIZE
        {
            return Err(Error::InvalidConfig(format!(
                "Optimize level must be 0..={}, got {}",
                MAX_OPTIMIZE, level
            )));
        }
        Ok(())
    }
}

/// Outcome of a successful staging run
#[derive(Debug, Clone)]
pub struct StageReport {
    pub dest_root: PathBuf,
    pub source_url: String,
    pub checksum: Checksum,
    pub archive_size: usize,
    pub manifest: Manifest,
}

/// Produces a staging root from package metadata
pub struct Stager<I: Installer> {
    config: StagerConfig,
    fetcher: SourceFetcher,
    installer: I,
}

impl<I: Installer> Stager<I> {
    pub fn new(config: StagerConfig, installer: I) -> Result<Self> {
        config.validate()?;
        let fetcher = SourceFetcher::new(config.http_timeout)?;
        Ok(Self {
            config,
            fetcher,
            installer,
        })
    }

    pub fn config(&self) -> &StagerConfig {
        &self.config
    }

    /// Retrieve the source archive at `url`
    pub fn fetch(&self, url: &str) -> Result<SourceArchive> {
        self.fetcher.fetch(url)
    }

    /// Check the archive against the expected digest
    pub fn verify(&self, archive: &SourceArchive, expected: &Checksum) -> Result<()> {
        expected.verify(archive.bytes())
    }

    /// Unpack the archive into `scratch`, returning the source directory
    pub fn extract(&self, archive: &SourceArchive, scratch: &Path, source_dir_name: &str) -> Result<PathBuf> {
        source::extract(archive, scratch, source_dir_name)
    }

    /// Run the delegate installer against `dest_root`
    pub fn install(&self, source_dir: &Path, dest_root: &Path, optimize: u8) -> Result<()> {
        self.installer.install(source_dir, dest_root, optimize)
    }

    /// Copy the recipe's license file into `dest_root` with mode 0644
    pub fn install_license(&self, metadata: &PackageMetadata, source_dir: &Path, dest_root: &Path) -> Result<PathBuf> {
        let license = source_dir.join(&metadata.license_file);
        if !license.is_file() {
            return Err(Error::MissingLicense(metadata.license_file.clone()));
        }

        let dest = dest_root.join(metadata.license_dest());
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&license, &dest)?;
        set_mode(&dest, LICENSE_MODE)?;

        debug!("Installed license {}", dest.display());
        Ok(dest)
    }

    /// Fetch and verify the source without touching the filesystem
    pub fn verify_only(&self, metadata: &PackageMetadata) -> Result<SourceArchive> {
        metadata.validate()?;
        let url = metadata.source_url();

        let archive = self.fetch(&url).map_err(|e| e.in_step(Step::Fetch))?;
        self.verify(&archive, &metadata.checksum)
            .map_err(|e| e.in_step(Step::Verify))?;

        info!("{} matches {}", archive.file_name(), metadata.checksum);
        Ok(archive)
    }

    /// Run the full pipeline and populate `dest_root`
    ///
    /// `dest_root` must not exist or must be an empty directory. On any
    /// failure it is left exactly as it was found.
    pub fn run(&self, metadata: &PackageMetadata, dest_root: &Path) -> Result<StageReport> {
        info!("Staging {} {}", metadata.name, metadata.full_version());

        check_dest(dest_root)?;
        let archive = self.verify_only(metadata)?;

        let scratch = self.scratch()?;
        let source_dir = self
            .extract(&archive, scratch.path(), &metadata.source_dir_name())
            .map_err(|e| e.in_step(Step::Extract))?;

        let staging = staging_dir(dest_root)?;
        let optimize = self.config.optimize.unwrap_or(metadata.optimize);
        self.install(&source_dir, staging.path(), optimize)
            .map_err(|e| e.in_step(Step::Install))?;
        self.install_license(metadata, &source_dir, staging.path())
            .map_err(|e| e.in_step(Step::License))?;

        let manifest = Manifest::scan(staging.path()).map_err(|e| e.in_step(Step::Commit))?;
        commit(staging, dest_root).map_err(|e| e.in_step(Step::Commit))?;

        if let Err(e) = scratch.close() {
            warn!("Failed to remove scratch directory: {}", e);
        }

        info!(
            "Staged {} {} into {} ({} files)",
            metadata.name,
            metadata.full_version(),
            dest_root.display(),
            manifest.files().count()
        );

        Ok(StageReport {
            dest_root: dest_root.to_path_buf(),
            source_url: archive.url().to_string(),
            checksum: metadata.checksum.clone(),
            archive_size: archive.len(),
            manifest,
        })
    }

    fn scratch(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("pkgstage-src-");
        let dir = match &self.config.scratch_dir {
            Some(parent) => {
                fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };
        debug!("Scratch directory {}", dir.path().display());
        Ok(dir)
    }
}

/// Refuse destinations that already hold files
fn check_dest(dest_root: &Path) -> Result<()> {
    match fs::symlink_metadata(dest_root) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
        Ok(meta) if meta.is_dir() => {
            if fs::read_dir(dest_root)?.next().is_some() {
                Err(Error::StagingRootExists(dest_root.to_path_buf()))
            } else {
                Ok(())
            }
        }
        Ok(_) => Err(Error::StagingRootExists(dest_root.to_path_buf())),
    }
}

fn parent_of(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Hidden sibling of `dest_root`, on the same filesystem so commit is a rename
fn staging_dir(dest_root: &Path) -> Result<TempDir> {
    let parent = parent_of(dest_root);
    fs::create_dir_all(&parent)?;
    let dir = tempfile::Builder::new()
        .prefix(".pkgstage-root-")
        .tempdir_in(&parent)?;
    debug!("Staging into {}", dir.path().display());
    Ok(dir)
}

/// Move a finished staging directory into place
///
/// An empty `dest_root` is replaced by the rename itself; if the rename
/// fails the caller's directory is still there.
fn commit(staging: TempDir, dest_root: &Path) -> Result<()> {
    set_mode(staging.path(), ROOT_MODE)?;

    // rename(2) only replaces empty directories on Unix
    #[cfg(not(unix))]
    let replaced_empty_dir = if dest_root.is_dir() {
        fs::remove_dir(dest_root)?;
        true
    } else {
        false
    };

    if let Err(e) = fs::rename(staging.path(), dest_root) {
        #[cfg(not(unix))]
        if replaced_empty_dir && let Err(restore) = fs::create_dir(dest_root) {
            warn!("Failed to restore {}: {}", dest_root.display(), restore);
        }
        let staging_path = staging.path().to_path_buf();
        if let Err(cleanup) = staging.close() {
            warn!(
                "Failed to remove staging directory {}: {}",
                staging_path.display(),
                cleanup
            );
        }
        return Err(e.into());
    }

    // The staging path now names dest_root; nothing left to clean up
    let _ = staging.keep();
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
