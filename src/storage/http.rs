//! HTTP/HTTPS storage backend.
//!
//! This module provides an HTTP-based implementation of the [`Storage`] trait,
//! reading byte ranges of remote files with `Range` requests.
//!
//! # Features
//!
//! - Support for HTTP Range requests
//! - Servers that ignore `Range` and send the whole body are sliced locally
//! - A single retry for transport errors and 5xx responses

use super::{ByteRange, Storage};
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use url::Url;

/// HTTP/HTTPS storage backend for one remote file.
pub struct HttpStorage {
    client: Client,
    url: Url,
}

/// Outcome of one request attempt.
enum Attempt {
    Done(Result<Bytes>),
    Retry(Error),
}

impl HttpStorage {
    /// Create a new HttpStorage for `url`.
    pub fn new(url: Url) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| Error::Internal(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client, url })
    }

    fn range_header(range: &ByteRange) -> Option<String> {
        match range.length {
            Some(0) => None,
            Some(len) => Some(format!("bytes={}-{}", range.start, range.start + len - 1)),
            None if range.start > 0 => Some(format!("bytes={}-", range.start)),
            None => None,
        }
    }

    /// Cut the requested range out of a full-body `200 OK` response.
    fn slice_full_body(body: Bytes, range: &ByteRange) -> Bytes {
        let len = body.len() as u64;
        let start = range.start.min(len);
        let end = range.end().map_or(len, |e| e.min(len));
        body.slice(start as usize..end as usize)
    }

    async fn attempt(&self, range: &ByteRange) -> Attempt {
        let mut request = self.client.get(self.url.clone());
        if let Some(header) = Self::range_header(range) {
            request = request.header(reqwest::header::RANGE, header);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                return Attempt::Retry(Error::Internal(format!("HTTP GET request failed: {}", e)));
            }
        };

        let status = response.status();
        if status == StatusCode::RANGE_NOT_SATISFIABLE {
            // Range starts at or past the end of the resource
            return Attempt::Done(Ok(Bytes::new()));
        }
        if status == StatusCode::NOT_FOUND {
            return Attempt::Done(Err(Error::NotFound(self.url.to_string())));
        }
        if status.is_server_error() {
            return Attempt::Retry(Error::Internal(format!(
                "bad response from server: {}",
                status
            )));
        }
        if !status.is_success() {
            return Attempt::Done(Err(Error::Internal(format!(
                "bad response from server: {}",
                status
            ))));
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                return Attempt::Retry(Error::Internal(format!(
                    "failed to read HTTP response: {}",
                    e
                )));
            }
        };

        if status == StatusCode::PARTIAL_CONTENT {
            Attempt::Done(Ok(body))
        } else {
            Attempt::Done(Ok(Self::slice_full_body(body, range)))
        }
    }
}

#[async_trait]
impl Storage for HttpStorage {
    async fn read_bytes(&self, range: ByteRange) -> Result<Bytes> {
        if range.length == Some(0) {
            return Ok(Bytes::new());
        }

        match self.attempt(&range).await {
            Attempt::Done(result) => result,
            Attempt::Retry(err) => {
                tracing::warn!("retrying {} after error: {}", self.url, err);
                match self.attempt(&range).await {
                    Attempt::Done(result) => result,
                    Attempt::Retry(err) => Err(err),
                }
            }
        }
    }

    fn describe(&self) -> String {
        self.url.to_string()
    }
}
