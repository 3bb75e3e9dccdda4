//! The ICC color profile block: a length-prefixed blob.

use crate::error::{ExtensionError, Outcome};
use crate::format::datablock::{self, DataBlock, Recovery};
use crate::format::NULL_OFFSET;
use crate::io::codec::{read_u32_le, write_u32_le};
use crate::io::region::ByteRegion;

/// ICC profile header field layout.
pub(crate) mod field {
    use crate::format::datablock::prologue;

    pub const ENTRY_NUMBER: usize = prologue::SIZE;
    pub const ENTRY_NUMBER_S: usize = 4;
    pub const HEADER_V1_0_SIZE: usize = ENTRY_NUMBER + ENTRY_NUMBER_S;
    // Version 1.0 ends here; later fields are added behind the version gate.
}

/// Byte length of the version 1.0 ICC profile header.
pub const ICC_PROFILE_HEADER_SIZE: u64 = field::HEADER_V1_0_SIZE as u64;

// =============================================================================
// IccProfileBlock
// =============================================================================

/// Reader for the ICC color profile block.
#[derive(Debug, Clone, Copy)]
pub struct IccProfileBlock {
    pub(crate) block: DataBlock,
}

impl IccProfileBlock {
    pub fn new(offset: u64, file_size: u64, version: u32) -> Self {
        IccProfileBlock {
            block: DataBlock::new(offset, file_size, version),
        }
    }

    #[inline]
    pub fn offset(&self) -> u64 {
        self.block.offset
    }

    /// Total block size: header plus the declared byte count.
    pub fn size<R: ByteRegion + ?Sized>(&self, region: &R) -> Result<u64, ExtensionError> {
        Ok(ICC_PROFILE_HEADER_SIZE + self.declared_bytes(region)? as u64)
    }

    /// Validate the block prologue.
    pub fn validate_offset<R: ByteRegion + ?Sized>(&self, region: &R) -> Outcome {
        self.block
            .validate_offset(region, "ICC_PROFILE", Recovery::IccProfile)
    }

    /// Validate the prologue and the body bounds.
    pub fn validate_full<R: ByteRegion + ?Sized>(&self, region: &R) -> Outcome {
        let outcome = self.validate_offset(region);
        if outcome.is_failure() {
            return outcome;
        }

        let declared = match self.declared_bytes(region) {
            Ok(declared) => declared as u64,
            Err(e) => return Outcome::validation_failure(e.to_string()),
        };
        let start = self.block.offset + ICC_PROFILE_HEADER_SIZE;
        if start + declared > self.block.file_size {
            return Outcome::failure(format!(
                "ICC_PROFILE failed validation: bytes block ({start}-{} bytes) extends beyond \
                 the end of the file",
                start + declared
            ));
        }

        outcome
    }

    /// Read a copy of the profile bytes.
    pub fn read<R: ByteRegion + ?Sized>(&self, region: &R) -> Result<Vec<u8>, ExtensionError> {
        let declared = self.declared_bytes(region)? as u64;
        let start = self.block.offset + ICC_PROFILE_HEADER_SIZE;
        if start + declared > self.block.file_size {
            return Err(ExtensionError::Structural(format!(
                "ICC profile bytes ({start}-{} bytes) extend beyond the end of the file",
                start + declared
            )));
        }
        let bytes = region
            .slice(start, declared)
            .map_err(|e| ExtensionError::Structural(format!("ICC_PROFILE unreadable: {e}")))?;
        Ok(bytes.to_vec())
    }

    fn declared_bytes<R: ByteRegion + ?Sized>(&self, region: &R) -> Result<u32, ExtensionError> {
        let bytes = region
            .slice(self.block.offset, ICC_PROFILE_HEADER_SIZE)
            .map_err(|e| ExtensionError::Structural(format!("ICC_PROFILE unreadable: {e}")))?;
        Ok(read_u32_le(&bytes[field::ENTRY_NUMBER..]))
    }
}

// =============================================================================
// Writer
// =============================================================================

/// Total bytes required to store `profile`.
pub fn size_icc_profile(profile: &[u8]) -> u64 {
    ICC_PROFILE_HEADER_SIZE + profile.len() as u64
}

/// Store the ICC color profile block at `offset`.
pub fn store_icc_profile(base: &mut [u8], offset: u64, profile: &[u8]) -> Result<(), ExtensionError> {
    if offset == NULL_OFFSET {
        return Err(ExtensionError::Invariant(String::from(
            "store_icc_profile: NULL_OFFSET provided as location",
        )));
    }
    if profile.len() as u64 > u32::MAX as u64 {
        return Err(ExtensionError::Invariant(String::from(
            "store_icc_profile: profile too long; an ICC color profile shall be shorter than \
             the 32-bit max",
        )));
    }
    let total = size_icc_profile(profile);
    if offset + total > base.len() as u64 {
        return Err(ExtensionError::Structural(format!(
            "store_icc_profile: block {offset}..{} extends beyond the region ({} bytes)",
            offset + total,
            base.len()
        )));
    }

    datablock::store_prologue(base, offset, Recovery::IccProfile);
    let at = offset as usize;
    write_u32_le(&mut base[at + field::ENTRY_NUMBER..], profile.len() as u32);
    base[at + field::HEADER_V1_0_SIZE..at + field::HEADER_V1_0_SIZE + profile.len()]
        .copy_from_slice(profile);
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
