//! Trait for reading byte ranges from a remote resource.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::IoError;

/// Reads byte ranges from a remote resource without downloading it entirely.
///
/// The Iris block walk issues many small reads at scattered offsets; the
/// engine fetches each block's prologue first and expands to the full block
/// once its size fields are visible. Implementations must be thread-safe.
#[async_trait]
pub trait RangeReader: Send + Sync {
    /// Read exactly `len` bytes starting at `offset`.
    ///
    /// Returns an error if the range is out of bounds or the fetch fails.
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError>;

    /// Total size of the resource in bytes.
    fn size(&self) -> u64;

    /// Unique identifier for this resource (for logging and cache keys).
    fn identifier(&self) -> &str;
}
