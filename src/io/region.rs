//! Byte-region abstraction over the backing bytes of a slide file.
//!
//! Block readers never own bytes; they address a [`ByteRegion`] by absolute
//! offset. A memory-mapped (or fully loaded) local file is a plain `[u8]`
//! region. The remote backend materializes only the block ranges it has
//! fetched into a [`SparseRegion`], and the same readers run against it
//! unchanged.

use std::collections::BTreeMap;

use bytes::Bytes;
use thiserror::Error;

/// Errors produced when slicing a region.
#[derive(Debug, Error)]
pub enum RegionError {
    /// The requested range extends past the end of the file.
    #[error("byte range {offset}+{len} extends beyond the end of the region ({size} bytes)")]
    OutOfBounds { offset: u64, len: u64, size: u64 },

    /// The range is inside the file but has not been fetched yet.
    #[error("byte range {offset}+{len} has not been materialized in the region")]
    NotResident { offset: u64, len: u64 },
}

/// A contiguous byte-addressable view of a slide file.
///
/// `slice` must hand back exactly `len` bytes starting at the absolute file
/// offset, without copying.
pub trait ByteRegion {
    /// Total size of the backing file in bytes.
    fn len(&self) -> u64;

    /// True if the backing file is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow `len` bytes at absolute `offset`.
    fn slice(&self, offset: u64, len: u64) -> Result<&[u8], RegionError>;
}

impl ByteRegion for [u8] {
    fn len(&self) -> u64 {
        <[u8]>::len(self) as u64
    }

    fn slice(&self, offset: u64, len: u64) -> Result<&[u8], RegionError> {
        let size = <[u8]>::len(self) as u64;
        let end = offset.checked_add(len).ok_or(RegionError::OutOfBounds {
            offset,
            len,
            size,
        })?;
        if end > size {
            return Err(RegionError::OutOfBounds { offset, len, size });
        }
        Ok(&self[offset as usize..end as usize])
    }
}

// =============================================================================
// SparseRegion
// =============================================================================

/// A partially materialized byte region assembled from range fetches.
///
/// Ranges are keyed by their starting offset. A lookup succeeds when a single
/// cached range covers the requested span; the backend performs no coalescing,
/// so callers fetch whole blocks and slice within them.
#[derive(Debug, Clone, Default)]
pub struct SparseRegion {
    size: u64,
    ranges: BTreeMap<u64, Bytes>,
}

impl SparseRegion {
    /// Create an empty region representing a file of `size` bytes.
    pub fn new(size: u64) -> Self {
        SparseRegion {
            size,
            ranges: BTreeMap::new(),
        }
    }

    /// Install fetched bytes at `offset`. A longer range replaces a shorter
    /// one at the same offset; a shorter one is dropped.
    pub fn insert(&mut self, offset: u64, bytes: Bytes) {
        match self.ranges.get(&offset) {
            Some(existing) if existing.len() >= bytes.len() => {}
            _ => {
                self.ranges.insert(offset, bytes);
            }
        }
    }

    /// True if a single cached range covers `offset..offset+len`.
    pub fn contains(&self, offset: u64, len: u64) -> bool {
        self.find(offset, len).is_some()
    }

    /// Number of cached ranges.
    pub fn range_count(&self) -> usize {
        self.ranges.len()
    }

    fn find(&self, offset: u64, len: u64) -> Option<(u64, &Bytes)> {
        let end = offset.checked_add(len)?;
        let (start, bytes) = self.ranges.range(..=offset).next_back()?;
        if end <= start + bytes.len() as u64 {
            Some((*start, bytes))
        } else {
            None
        }
    }
}

impl ByteRegion for SparseRegion {
    fn len(&self) -> u64 {
        self.size
    }

    fn slice(&self, offset: u64, len: u64) -> Result<&[u8], RegionError> {
        let end = offset.checked_add(len).ok_or(RegionError::OutOfBounds {
            offset,
            len,
            size: self.size,
        })?;
        if end > self.size {
            return Err(RegionError::OutOfBounds {
                offset,
                len,
                size: self.size,
            });
        }
        let (start, bytes) = self
            .find(offset, len)
            .ok_or(RegionError::NotResident { offset, len })?;
        let begin = (offset - start) as usize;
        Ok(&bytes[begin..begin + len as usize])
    }
}

// =============================================================================
// Tests
// =============================================================================
