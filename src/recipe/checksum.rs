// src/recipe/checksum.rs

//! Expected source digests and archive verification

use crate::error::{Error, Result};
use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Expected digest of a source archive, tagged with its algorithm
///
/// Serialized as `{"md5": "<hex>"}` or `{"sha256": "<hex>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Checksum {
    Md5(String),
    Sha256(String),
}

impl Checksum {
    /// Algorithm name as used in `md5sums`/`sha256sums` style fields
    pub fn algorithm(&self) -> &'static str {
        match self {
            Checksum::Md5(_) => "md5",
            Checksum::Sha256(_) => "sha256",
        }
    }

    /// Expected hex digest
    pub fn expected(&self) -> &str {
        match self {
            Checksum::Md5(hex) | Checksum::Sha256(hex) => hex,
        }
    }

    fn hex_len(&self) -> usize {
        match self {
            Checksum::Md5(_) => 32,
            Checksum::Sha256(_) => 64,
        }
    }

    /// Check that the expected digest has the right length and is hex
    pub fn validate(&self) -> Result<()> {
        let hex = self.expected();
        if hex.len() != self.hex_len() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidRecipe(format!(
                "{} checksum must be {} hex characters, got '{}'",
                self.algorithm(),
                self.hex_len(),
                hex
            )));
        }
        Ok(())
    }

    /// Digest `bytes` with this checksum's algorithm, as lowercase hex
    pub fn compute(&self, bytes: &[u8]) -> String {
        match self {
            Checksum::Md5(_) => format!("{:x}", Md5::digest(bytes)),
            Checksum::Sha256(_) => format!("{:x}", Sha256::digest(bytes)),
        }
    }

    /// Verify `bytes` against the expected digest
    ///
    /// Comparison is case-insensitive. A mismatch is always an error; there
    /// is no way to skip verification.
    pub fn verify(&self, bytes: &[u8]) -> Result<()> {
        let actual = self.compute(bytes);

        if !actual.eq_ignore_ascii_case(self.expected()) {
            return Err(Error::Integrity {
                expected: self.expected().to_lowercase(),
                actual,
            });
        }

        debug!("{} checksum verified: {}", self.algorithm(), actual);
        Ok(())
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm(), self.expected())
    }
}

impl FromStr for Checksum {
    type Err = Error;

    /// Parse `md5:<hex>`, `sha256:<hex>`, or a bare digest whose algorithm is
    /// implied by its length
    fn from_str(s: &str) -> Result<Self> {
        let checksum = match s.split_once(':') {
            Some(("md5", hex)) => Checksum::Md5(hex.to_string()),
            Some(("sha256", hex)) => Checksum::Sha256(hex.to_string()),
            Some((algo, _)) => {
                return Err(Error::InvalidRecipe(format!(
                    "Unsupported checksum algorithm: {}",
                    algo
                )));
            }
            None if s.len() == 64 => Checksum::Sha256(s.to_string()),
            None => Checksum::Md5(s.to_string()),
        };

        checksum.validate()?;
        Ok(checksum)
    }
}
