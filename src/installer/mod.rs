// src/installer/mod.rs

//! Delegate installers
//!
//! The upstream project owns its install procedure. The stager only hands it
//! a source directory, a root to install under and a bytecode optimization
//! level; the `Installer` trait is that contract.

pub mod setup_py;
pub mod traits;

pub use setup_py::SetupPyInstaller;
pub use traits::Installer;
