//! Byte-range access to data and index files.
//!
//! This module provides a trait-based abstraction for reading arbitrary byte
//! ranges of a file, allowing the tabix reader to work the same way over local
//! files and remote HTTP resources.
//!
//! # Implementations
//!
//! - [`LocalStorage`] - Local filesystem storage
//! - [`HttpStorage`] - HTTP/HTTPS range requests (feature `http`)
//!
//! # Example
//!
//! ```no_run
//! use vcfseek::storage::{ByteRange, LocalStorage, Storage};
//!
//! # async fn run() -> vcfseek::Result<()> {
//! let storage = LocalStorage::new("sample.vcf.gz");
//! let first_block = storage.read_bytes(ByteRange::new(0, Some(65536))).await?;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "http")]
mod http;
mod local;

#[cfg(feature = "http")]
pub use http::HttpStorage;
pub use local::LocalStorage;

use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

/// Byte range within a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    /// Number of bytes to read, `None` reads to end of file.
    pub length: Option<u64>,
}

impl ByteRange {
    pub fn new(start: u64, length: Option<u64>) -> Self {
        Self { start, length }
    }

    /// The whole file.
    pub fn all() -> Self {
        Self::new(0, None)
    }

    /// Exclusive end offset, if bounded.
    pub fn end(&self) -> Option<u64> {
        self.length.map(|len| self.start.saturating_add(len))
    }
}

/// Storage backend trait for byte-addressable files
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read the bytes covered by `range`.
    ///
    /// Reads that extend past the end of the file return the bytes that exist.
    async fn read_bytes(&self, range: ByteRange) -> Result<Bytes>;

    /// Human-readable location, used in log messages.
    fn describe(&self) -> String;
}

/// Open a storage backend for a path or `http(s)://` URL.
pub fn open_location(location: &str) -> Result<Arc<dyn Storage>> {
    match url::Url::parse(location) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => open_remote(url),
        Ok(url) if url.scheme() == "file" => {
            let path = url
                .to_file_path()
                .map_err(|_| Error::InvalidInput(format!("invalid file URL: {}", location)))?;
            Ok(Arc::new(LocalStorage::new(path)))
        }
        _ => Ok(Arc::new(LocalStorage::new(location))),
    }
}

#[cfg(feature = "http")]
fn open_remote(url: url::Url) -> Result<Arc<dyn Storage>> {
    Ok(Arc::new(HttpStorage::new(url)?))
}

#[cfg(not(feature = "http"))]
fn open_remote(url: url::Url) -> Result<Arc<dyn Storage>> {
    Err(Error::Unsupported(format!(
        "remote location {} requires the `http` feature",
        url
    )))
}
