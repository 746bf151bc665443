// src/error.rs

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline step an error was raised in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Fetch,
    Verify,
    Extract,
    Install,
    License,
    Commit,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Fetch => "fetch",
            Step::Verify => "verify",
            Step::Extract => "extract",
            Step::Install => "install",
            Step::License => "license",
            Step::Commit => "commit",
        };
        f.write_str(name)
    }
}

/// Core error types for pkgstage
#[derive(Error, Debug)]
pub enum Error {
    /// Network or local read failure while acquiring the source archive
    #[error("Transport error: {0}")]
    Transport(String),

    /// Archive digest does not match the recipe checksum
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    Integrity { expected: String, actual: String },

    /// Corrupt or unsupported source container
    #[error("Archive format error: {0}")]
    ArchiveFormat(String),

    /// Upstream installer reported failure
    #[error("Install delegate failed: {0}")]
    InstallDelegate(String),

    /// License file absent from the extracted source tree
    #[error("License file not found in source tree: {}", .0.display())]
    MissingLicense(PathBuf),

    /// Recipe metadata failed validation
    #[error("Invalid recipe: {0}")]
    InvalidRecipe(String),

    /// Stager settings out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Destination already holds files
    #[error("Staging root is not empty: {}", .0.display())]
    StagingRootExists(PathBuf),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Recipe or manifest (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A failure tagged with the pipeline step it happened in
    #[error("{step} step failed: {source}")]
    Step {
        step: Step,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Tag this error with the step it occurred in. Already tagged errors keep
    /// their original step.
    pub fn in_step(self, step: Step) -> Self {
        match self {
            Error::Step { .. } => self,
            other => Error::Step {
                step,
                source: Box::new(other),
            },
        }
    }

    /// The step this error was raised in, if known
    pub fn step(&self) -> Option<Step> {
        match self {
            Error::Step { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// The underlying error with any step tag removed
    pub fn kind(&self) -> &Error {
        match self {
            Error::Step { source, .. } => source.kind(),
            other => other,
        }
    }
}

/// Result type alias using pkgstage's Error type
pub type Result<T> = std::result::Result<T, Error>;
