// src/source/mod.rs

//! Source archive acquisition
//!
//! Archives are fetched into memory and stay there until their checksum has
//! been verified; nothing touches the disk before then.

pub mod archive;

pub use archive::{extract, CompressionFormat};

use crate::error::{Error, Result};
use reqwest::blocking::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Default timeout for HTTP requests (30 seconds)
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// A downloaded source archive, keyed by the URL it came from
#[derive(Debug, Clone)]
pub struct SourceArchive {
    url: String,
    bytes: Vec<u8>,
}

impl SourceArchive {
    pub fn new(url: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            url: url.into(),
            bytes,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Last path segment of the URL
    pub fn file_name(&self) -> &str {
        self.url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(&self.url)
    }
}

/// Where a source URL points
enum SourceLocation {
    Remote(String),
    Local(PathBuf),
}

fn locate(url: &str) -> Result<SourceLocation> {
    if let Some(path) = url.strip_prefix("file://") {
        return Ok(SourceLocation::Local(PathBuf::from(path)));
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        return Ok(SourceLocation::Remote(url.to_string()));
    }
    match url.split_once("://") {
        Some((scheme, _)) => Err(Error::Transport(format!(
            "Unsupported URL scheme '{}' in {}",
            scheme, url
        ))),
        None => Ok(SourceLocation::Local(PathBuf::from(url))),
    }
}

/// HTTP client wrapper for source downloads
///
/// A failed fetch is reported once; there is no retry.
pub struct SourceFetcher {
    client: Client,
}

impl SourceFetcher {
    /// Create a fetcher whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("pkgstage/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Retrieve the archive at `url`
    ///
    /// `http(s)://` URLs are downloaded; `file://` URLs and plain paths are
    /// read from the local filesystem.
    pub fn fetch(&self, url: &str) -> Result<SourceArchive> {
        let bytes = match locate(url)? {
            SourceLocation::Remote(url) => self.download(&url)?,
            SourceLocation::Local(path) => read_local(&path)?,
        };

        info!("Fetched {} ({} bytes)", url, bytes.len());
        Ok(SourceArchive::new(url, bytes))
    }

    fn download(&self, url: &str) -> Result<Vec<u8>> {
        debug!("Downloading {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::Transport(format!("Request to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::Transport(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let body = response
            .bytes()
            .map_err(|e| Error::Transport(format!("Failed to read body from {}: {}", url, e)))?;

        Ok(body.to_vec())
    }
}

impl Default for SourceFetcher {
    fn default() -> Self {
        Self::new(HTTP_TIMEOUT).expect("Failed to create default source fetcher")
    }
}

fn read_local(path: &Path) -> Result<Vec<u8>> {
    debug!("Reading local source {}", path.display());
    std::fs::read(path)
        .map_err(|e| Error::Transport(format!("Failed to read {}: {}", path.display(), e)))
}
