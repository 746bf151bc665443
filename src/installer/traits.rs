// src/installer/traits.rs

//! Common trait for delegate installers

use crate::error::Result;
use std::path::Path;

/// Runs an upstream install procedure against a staging root
pub trait Installer {
    /// Install the project in `source_dir` under `dest_root`
    ///
    /// Every file must be written below `dest_root`, never to the live
    /// filesystem. Failure is reported as `Error::InstallDelegate`.
    fn install(&self, source_dir: &Path, dest_root: &Path, optimize: u8) -> Result<()>;
}

impl<F> Installer for F
where
    F: Fn(&Path, &Path, u8) -> Result<()>,
{
    fn install(&self, source_dir: &Path, dest_root: &Path, optimize: u8) -> Result<()> {
        self(source_dir, dest_root, optimize)
    }
}
