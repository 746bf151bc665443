// src/installer/setup_py.rs

//! Python distutils/setuptools installer
//!
//! Runs `python setup.py install --root=<dest> --optimize=<n>` from the
//! extracted source directory.

use crate::error::{Error, Result};
use crate::installer::traits::Installer;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

/// Interpreter used when none is configured
pub const DEFAULT_PYTHON: &str = "python";

/// Delegate installer for projects shipping a `setup.py`
#[derive(Debug, Clone)]
pub struct SetupPyInstaller {
    python: PathBuf,
}

impl SetupPyInstaller {
    pub fn new(python: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
        }
    }

    pub fn python(&self) -> &Path {
        &self.python
    }

    fn command(&self, source_dir: &Path, dest_root: &Path, optimize: u8) -> Command {
        // Built from OsStr so non-UTF-8 roots reach setup.py byte for byte
        let mut root_arg = OsString::from("--root=");
        root_arg.push(dest_root);

        let mut cmd = Command::new(&self.python);
        cmd.arg("setup.py")
            .arg("install")
            .arg(root_arg)
            .arg(format!("--optimize={}", optimize))
            .current_dir(source_dir);
        cmd
    }
}

impl Default for SetupPyInstaller {
    fn default() -> Self {
        Self::new(DEFAULT_PYTHON)
    }
}

impl Installer for SetupPyInstaller {
    fn install(&self, source_dir: &Path, dest_root: &Path, optimize: u8) -> Result<()> {
        if !source_dir.join("setup.py").is_file() {
            return Err(Error::InstallDelegate(format!(
                "No setup.py in {}",
                source_dir.display()
            )));
        }

        info!(
            "Running {} setup.py install --root={} --optimize={}",
            self.python.display(),
            dest_root.display(),
            optimize
        );

        let output = self
            .command(source_dir, dest_root, optimize)
            .output()
            .map_err(|e| {
                Error::InstallDelegate(format!(
                    "Failed to run {}: {}",
                    self.python.display(),
                    e
                ))
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stdout.lines() {
            debug!("setup.py: {}", line);
        }

        if !output.status.success() {
            for line in stderr.lines() {
                warn!("setup.py: {}", line);
            }
            return Err(Error::InstallDelegate(format!(
                "setup.py install exited with {}",
                output.status
            )));
        }

        for line in stderr.lines() {
            debug!("setup.py: {}", line);
        }
        Ok(())
    }
}
