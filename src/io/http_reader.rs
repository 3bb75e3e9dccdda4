//! HTTP range-request implementation of [`RangeReader`].
//!
//! The remote Iris backend speaks plain HTTP: each block fetch is a GET with
//! a `Range: bytes=start-end` header, and anything other than `206 Partial
//! Content` fails the read. The file size is either supplied by the caller
//! (the Iris header stores it too) or discovered with a HEAD request.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};

use super::RangeReader;
use crate::error::IoError;

/// HTTP-backed range reader for a single remote slide URL.
#[derive(Debug, Clone)]
pub struct HttpRangeReader {
    client: Client,
    url: String,
    size: u64,
}

impl HttpRangeReader {
    /// Create a reader for `url` with a known resource size.
    pub fn new(url: impl Into<String>, size: u64) -> Self {
        HttpRangeReader {
            client: Client::new(),
            url: url.into(),
            size,
        }
    }

    /// Create a reader, discovering the resource size with a HEAD request.
    pub async fn discover(url: impl Into<String>) -> Result<Self, IoError> {
        let url = url.into();
        let client = Client::new();
        let response = client
            .head(&url)
            .send()
            .await
            .map_err(|e| IoError::Connection(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(IoError::NotFound(url));
        }
        if !response.status().is_success() {
            return Err(IoError::UnexpectedStatus {
                status: response.status().as_u16(),
                range: String::from("HEAD"),
            });
        }

        let size = response
            .content_length()
            .ok_or_else(|| IoError::Connection(format!("no content length for {url}")))?;

        Ok(HttpRangeReader { client, url, size })
    }

    /// The remote URL this reader addresses.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RangeReader for HttpRangeReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        if offset + len as u64 > self.size {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size: self.size,
            });
        }
        if len == 0 {
            return Ok(Bytes::new());
        }

        // Range header end is inclusive.
        let range = format!("bytes={}-{}", offset, offset + len as u64 - 1);
        let response = self
            .client
            .get(&self.url)
            .header(reqwest::header::RANGE, &range)
            .send()
            .await
            .map_err(|e| IoError::Connection(e.to_string()))?;

        if response.status() != StatusCode::PARTIAL_CONTENT {
            return Err(IoError::UnexpectedStatus {
                status: response.status().as_u16(),
                range,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| IoError::Connection(e.to_string()))?;

        if body.len() != len {
            return Err(IoError::ShortResponse {
                requested: len as u64,
                received: body.len() as u64,
            });
        }

        Ok(body)
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn identifier(&self) -> &str {
        &self.url
    }
}
