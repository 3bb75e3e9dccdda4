//! The common data-block prologue and its validation.
//!
//! Every non-root block begins with a 10-byte prologue: a u64 holding the
//! block's own absolute offset followed by a u16 recovery tag naming the
//! block kind. The self-referential offset is the basis of corruption
//! recovery: a scan for `u64_at(p) == p` with a registered tag at `p + 8`
//! rediscovers block starts without any intact parent pointers.

use crate::error::Outcome;
use crate::format::NULL_OFFSET;
use crate::io::codec::{read_u16_le, read_u64_le, write_u16_le, write_u64_le};
use crate::io::region::ByteRegion;

/// Prologue field layout shared by every non-root block.
pub(crate) mod prologue {
    pub const VALIDATION: usize = 0;
    pub const VALIDATION_S: usize = 8;
    pub const RECOVERY: usize = VALIDATION + VALIDATION_S;
    pub const RECOVERY_S: usize = 2;
    pub const SIZE: usize = RECOVERY + RECOVERY_S;
}

/// Byte length of the block prologue.
pub const PROLOGUE_SIZE: u64 = prologue::SIZE as u64;

// =============================================================================
// Recovery
// =============================================================================

/// Per-kind 16-bit recovery tags.
///
/// The tag both verifies a block's kind during validation and marks block
/// starts for post-corruption rediscovery. Values are fixed by the format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Recovery {
    Undefined = 0x5500,
    FileHeader = 0x5501,
    TileTable = 0x5502,
    Cipher = 0x5503,
    Metadata = 0x5504,
    Attributes = 0x5505,
    LayerExtents = 0x5506,
    TileOffsets = 0x5507,
    AttributeSizes = 0x5508,
    AttributeBytes = 0x5509,
    ImageArray = 0x550A,
    ImageBytes = 0x550B,
    IccProfile = 0x550C,
    Annotations = 0x550D,
    AnnotationBytes = 0x550E,
    AnnotationGroupSizes = 0x550F,
    AnnotationGroupBytes = 0x5510,
}

impl Recovery {
    /// The on-disk tag value.
    #[inline]
    pub fn tag(self) -> u16 {
        self as u16
    }

    /// Map a stored tag back to its kind.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x5500 => Some(Recovery::Undefined),
            0x5501 => Some(Recovery::FileHeader),
            0x5502 => Some(Recovery::TileTable),
            0x5503 => Some(Recovery::Cipher),
            0x5504 => Some(Recovery::Metadata),
            0x5505 => Some(Recovery::Attributes),
            0x5506 => Some(Recovery::LayerExtents),
            0x5507 => Some(Recovery::TileOffsets),
            0x5508 => Some(Recovery::AttributeSizes),
            0x5509 => Some(Recovery::AttributeBytes),
            0x550A => Some(Recovery::ImageArray),
            0x550B => Some(Recovery::ImageBytes),
            0x550C => Some(Recovery::IccProfile),
            0x550D => Some(Recovery::Annotations),
            0x550E => Some(Recovery::AnnotationBytes),
            0x550F => Some(Recovery::AnnotationGroupSizes),
            0x5510 => Some(Recovery::AnnotationGroupBytes),
            _ => None,
        }
    }
}

// =============================================================================
// DataBlock
// =============================================================================

/// Location descriptor for one block: its absolute offset, the backing file
/// size, and the file's packed extension version.
///
/// Blocks own no bytes. Every method takes the byte region explicitly, so a
/// descriptor is freely copyable and thread-safe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataBlock {
    pub offset: u64,
    pub file_size: u64,
    pub version: u32,
}

impl DataBlock {
    pub fn new(offset: u64, file_size: u64, version: u32) -> Self {
        DataBlock {
            offset,
            file_size,
            version,
        }
    }

    /// True if the descriptor names a real location inside the file.
    #[inline]
    pub fn in_bounds(&self) -> bool {
        self.offset != NULL_OFFSET && self.offset < self.file_size
    }

    /// Validate the block prologue: the stored validation value must equal
    /// the block's own offset and the recovery tag must match `recovery`.
    pub fn validate_offset<R: ByteRegion + ?Sized>(
        &self,
        region: &R,
        kind: &str,
        recovery: Recovery,
    ) -> Outcome {
        if !self.in_bounds() {
            return Outcome::validation_failure(format!(
                "invalid {kind} block: the {kind} was not created with a valid offset value"
            ));
        }
        let bytes = match region.slice(self.offset, PROLOGUE_SIZE) {
            Ok(bytes) => bytes,
            Err(e) => {
                return Outcome::validation_failure(format!("{kind} prologue unreadable: {e}"))
            }
        };

        let stored = read_u64_le(&bytes[prologue::VALIDATION..]);
        if stored != self.offset {
            return Outcome::validation_failure(format!(
                "{kind} failed offset validation: the stored validation value ({stored}) \
                 is not the offset location ({})",
                self.offset
            ));
        }

        let tag = read_u16_le(&bytes[prologue::RECOVERY..]);
        if tag != recovery.tag() {
            return Outcome::validation_failure(format!(
                "{kind} recovery tag ({:#06X}) failed validation: the stored tag value is {tag:#06X}",
                recovery.tag()
            ));
        }

        Outcome::success()
    }
}

/// Write the prologue of a block at `offset` into `base`.
///
/// Writers call this after their own bounds checks; the slice indexing here
/// assumes `offset + PROLOGUE_SIZE <= base.len()`.
pub(crate) fn store_prologue(base: &mut [u8], offset: u64, recovery: Recovery) {
    let at = offset as usize;
    write_u64_le(&mut base[at + prologue::VALIDATION..], offset);
    write_u16_le(&mut base[at + prologue::RECOVERY..], recovery.tag());
}

// =============================================================================
// Tests
// =============================================================================
