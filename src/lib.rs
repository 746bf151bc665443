// src/lib.rs

//! pkgstage
//!
//! Fetches a versioned upstream source archive, verifies it against the
//! recipe checksum, and stages the project into a filesystem root that a
//! package manager turns into an installable package.
//!
//! # Pipeline
//!
//! - Fetch: download (or read) the source archive into memory
//! - Verify: the archive digest must match the recipe, always
//! - Extract: unpack into a scratch `<name>-<version>` directory
//! - Install: hand off to the upstream installer with a root override
//! - License: place the license under `usr/share/licenses/<name>/`
//!
//! The staging root only appears once every step succeeded.

mod error;
pub mod installer;
pub mod manifest;
pub mod recipe;
pub mod source;
pub mod stager;

pub use error::{Error, Result, Step};
pub use installer::{Installer, SetupPyInstaller};
pub use manifest::Manifest;
pub use recipe::{Checksum, PackageMetadata};
pub use stager::{StageReport, Stager, StagerConfig};
