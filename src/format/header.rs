//! The file header: the root block at offset zero.
//!
//! Unlike every other block, the header opens with the 32-bit magic number
//! rather than a self-offset (its offset is zero by definition), followed by
//! the recovery tag, the stored file size, the extension version pair, the
//! file revision, and the two required child offsets.

use tracing::warn;

use crate::error::{ExtensionError, Outcome};
use crate::format::abstraction::Header;
use crate::format::datablock::{DataBlock, Recovery};
use crate::format::metadata::MetadataBlock;
use crate::format::tile_table::TileTableBlock;
use crate::format::{
    EXTENSION_1_0, EXTENSION_MAJOR, EXTENSION_MINOR, EXTENSION_VERSION, MAGIC_BYTES, NULL_OFFSET,
};
use crate::io::codec::{read_u16_le, read_u32_le, read_u64_le, write_u16_le, write_u32_le, write_u64_le};
use crate::io::region::ByteRegion;

/// File header field layout. The header is the only block without the common
/// prologue: magic replaces the self-offset.
pub(crate) mod field {
    pub const MAGIC_BYTES: usize = 0;
    pub const MAGIC_BYTES_S: usize = 4;
    pub const RECOVERY: usize = MAGIC_BYTES + MAGIC_BYTES_S;
    pub const RECOVERY_S: usize = 2;
    pub const FILE_SIZE: usize = RECOVERY + RECOVERY_S;
    pub const FILE_SIZE_S: usize = 8;
    pub const EXTENSION_MAJOR: usize = FILE_SIZE + FILE_SIZE_S;
    pub const EXTENSION_MAJOR_S: usize = 2;
    pub const EXTENSION_MINOR: usize = EXTENSION_MAJOR + EXTENSION_MAJOR_S;
    pub const EXTENSION_MINOR_S: usize = 2;
    pub const FILE_REVISION: usize = EXTENSION_MINOR + EXTENSION_MINOR_S;
    pub const FILE_REVISION_S: usize = 4;
    pub const TILE_TABLE_OFFSET: usize = FILE_REVISION + FILE_REVISION_S;
    pub const TILE_TABLE_OFFSET_S: usize = 8;
    pub const METADATA_OFFSET: usize = TILE_TABLE_OFFSET + TILE_TABLE_OFFSET_S;
    pub const METADATA_OFFSET_S: usize = 8;
    pub const HEADER_V1_0_SIZE: usize = METADATA_OFFSET + METADATA_OFFSET_S;
    // Version 1.0 ends here; later fields are added behind the version gate.
}

/// Byte length of the version 1.0 file header.
pub const FILE_HEADER_SIZE: u64 = field::HEADER_V1_0_SIZE as u64;

// =============================================================================
// FileHeaderBlock
// =============================================================================

/// Reader for the file header block.
#[derive(Debug, Clone, Copy)]
pub struct FileHeaderBlock {
    pub(crate) block: DataBlock,
}

impl FileHeaderBlock {
    /// Create the root descriptor for a file of `file_size` bytes, as
    /// reported by the backing region. The extension version is unknown
    /// until the header is read.
    pub fn new(file_size: u64) -> Self {
        FileHeaderBlock {
            block: DataBlock::new(0, file_size, u32::MAX),
        }
    }

    /// The header block's size for the file's stored version.
    pub fn size<R: ByteRegion + ?Sized>(&self, region: &R) -> u64 {
        let size = FILE_HEADER_SIZE;
        match self.stored_version(region) {
            Ok(version) if version > EXTENSION_1_0 => {
                // v2+ header fields extend the size here once defined.
                size
            }
            _ => size,
        }
    }

    /// Quick magic + recovery tag check. Does not validate anything else.
    pub fn matches_magic<R: ByteRegion + ?Sized>(&self, region: &R) -> bool {
        let bytes = match region.slice(0, (field::FILE_SIZE) as u64) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };
        read_u32_le(&bytes[field::MAGIC_BYTES..]) == MAGIC_BYTES
            && read_u16_le(&bytes[field::RECOVERY..]) == Recovery::FileHeader.tag()
    }

    /// Packed extension version stored in the header.
    pub fn stored_version<R: ByteRegion + ?Sized>(
        &self,
        region: &R,
    ) -> Result<u32, ExtensionError> {
        let bytes = self.header_bytes(region)?;
        let major = read_u16_le(&bytes[field::EXTENSION_MAJOR..]) as u32;
        let minor = read_u16_le(&bytes[field::EXTENSION_MINOR..]) as u32;
        Ok(major << 16 | minor)
    }

    /// Stored absolute offset of the tile table block.
    pub fn tile_table_offset<R: ByteRegion + ?Sized>(
        &self,
        region: &R,
    ) -> Result<u64, ExtensionError> {
        let bytes = self.header_bytes(region)?;
        Ok(read_u64_le(&bytes[field::TILE_TABLE_OFFSET..]))
    }

    /// Stored absolute offset of the metadata block.
    pub fn metadata_offset<R: ByteRegion + ?Sized>(
        &self,
        region: &R,
    ) -> Result<u64, ExtensionError> {
        let bytes = self.header_bytes(region)?;
        Ok(read_u64_le(&bytes[field::METADATA_OFFSET..]))
    }

    /// Validate the header fields themselves: magic, recovery tag, stored
    /// file size against the backing size, and the extension version (a
    /// newer writer version is a warning, not an error).
    pub fn validate_header<R: ByteRegion + ?Sized>(&self, region: &R) -> Outcome {
        if self.block.file_size == 0 {
            return Outcome::validation_failure(
                "invalid file header size: the header must be created with the \
                 operating-system-reported file size",
            );
        }
        let bytes = match region.slice(0, FILE_HEADER_SIZE) {
            Ok(bytes) => bytes,
            Err(e) => {
                return Outcome::validation_failure(format!("FILE_HEADER unreadable: {e}"))
            }
        };

        if read_u32_le(&bytes[field::MAGIC_BYTES..]) != MAGIC_BYTES {
            return Outcome::failure("Iris file magic number failed validation");
        }
        let tag = read_u16_le(&bytes[field::RECOVERY..]);
        if tag != Recovery::FileHeader.tag() {
            return Outcome::validation_failure(format!(
                "RECOVER_HEADER ({:#06X}) tag failed validation: the stored tag value is {tag:#06X}",
                Recovery::FileHeader.tag()
            ));
        }

        let stored_size = read_u64_le(&bytes[field::FILE_SIZE..]);
        if stored_size != self.block.file_size {
            return Outcome::validation_failure(format!(
                "the internally stored Iris file size ({stored_size} bytes) differs from that \
                 provided by the operating system ({} bytes); this failure requires file recovery",
                self.block.file_size
            ));
        }

        let major = read_u16_le(&bytes[field::EXTENSION_MAJOR..]);
        let minor = read_u16_le(&bytes[field::EXTENSION_MINOR..]);
        if major > EXTENSION_MAJOR || minor > EXTENSION_MINOR {
            return Outcome::warning(format!(
                "this reader implements Iris extension version {EXTENSION_MAJOR}.{EXTENSION_MINOR}, \
                 older than the version used to write the file ({major}.{minor}); fields added by \
                 the newer version will not be surfaced"
            ));
        }

        Outcome::success()
    }

    /// Validate the header and the prologues of both required children.
    pub fn validate_full<R: ByteRegion + ?Sized>(&self, region: &R) -> Outcome {
        let mut outcome = self.validate_header(region);
        if outcome.is_failure() {
            return outcome;
        }
        if outcome.is_warning() {
            warn!("file header validation: {}", outcome.message);
        }

        let version = match self.stored_version(region) {
            Ok(version) => version,
            Err(e) => return Outcome::validation_failure(e.to_string()),
        };

        let bytes = match region.slice(0, FILE_HEADER_SIZE) {
            Ok(bytes) => bytes,
            Err(e) => {
                return Outcome::validation_failure(format!("FILE_HEADER unreadable: {e}"))
            }
        };

        let tile_table = TileTableBlock::new(
            read_u64_le(&bytes[field::TILE_TABLE_OFFSET..]),
            self.block.file_size,
            version,
        );
        let result = tile_table.validate_offset(region);
        if result.is_failure() {
            return result;
        }
        outcome = outcome.merge(result);

        let metadata = MetadataBlock::new(
            read_u64_le(&bytes[field::METADATA_OFFSET..]),
            self.block.file_size,
            version,
        );
        let result = metadata.validate_offset(region);
        if result.is_failure() {
            return result;
        }
        outcome = outcome.merge(result);

        if version > EXTENSION_1_0 {
            // v2+ header validations are added here once defined.
        }

        outcome
    }

    /// Read the header abstraction. Raises if the header fails validation.
    pub fn read<R: ByteRegion + ?Sized>(&self, region: &R) -> Result<Header, ExtensionError> {
        let outcome = self.validate_header(region);
        if outcome.is_failure() {
            return Err(ExtensionError::Validation(outcome.message));
        }
        if outcome.is_warning() {
            warn!("file header: {}", outcome.message);
        }

        let bytes = self.header_bytes(region)?;
        let header = Header {
            file_size: read_u64_le(&bytes[field::FILE_SIZE..]),
            extension_version: (read_u16_le(&bytes[field::EXTENSION_MAJOR..]) as u32) << 16
                | read_u16_le(&bytes[field::EXTENSION_MINOR..]) as u32,
            revision: read_u32_le(&bytes[field::FILE_REVISION..]),
        };

        if header.extension_version > EXTENSION_1_0 {
            // v2+ header fields are read here once defined.
        }

        Ok(header)
    }

    /// Construct the tile table reader at the stored offset, validating its
    /// prologue on the way.
    pub fn tile_table<R: ByteRegion + ?Sized>(
        &self,
        region: &R,
    ) -> Result<TileTableBlock, ExtensionError> {
        let header = self.read(region)?;
        if header.extension_version == 0 {
            return Err(ExtensionError::Validation(String::from(
                "failed to retrieve tile table: invalid file header",
            )));
        }
        let block = TileTableBlock::new(
            self.tile_table_offset(region)?,
            self.block.file_size,
            header.extension_version,
        );

        let result = block.validate_offset(region);
        if result.is_failure() {
            return Err(ExtensionError::Validation(format!(
                "failed to retrieve tile table: {}",
                result.message
            )));
        }
        if result.is_warning() {
            warn!("tile table retrieval: {}", result.message);
        }
        Ok(block)
    }

    /// Construct the metadata reader at the stored offset, validating its
    /// prologue on the way.
    pub fn metadata<R: ByteRegion + ?Sized>(
        &self,
        region: &R,
    ) -> Result<MetadataBlock, ExtensionError> {
        let header = self.read(region)?;
        if header.extension_version == 0 {
            return Err(ExtensionError::Validation(String::from(
                "failed to retrieve metadata: invalid file header",
            )));
        }
        let block = MetadataBlock::new(
            self.metadata_offset(region)?,
            self.block.file_size,
            header.extension_version,
        );

        let result = block.validate_offset(region);
        if result.is_failure() {
            return Err(ExtensionError::Validation(format!(
                "failed to retrieve metadata: {}",
                result.message
            )));
        }
        if result.is_warning() {
            warn!("metadata retrieval: {}", result.message);
        }
        Ok(block)
    }

    fn header_bytes<'r, R: ByteRegion + ?Sized>(
        &self,
        region: &'r R,
    ) -> Result<&'r [u8], ExtensionError> {
        region
            .slice(0, FILE_HEADER_SIZE)
            .map_err(|e| ExtensionError::Structural(format!("FILE_HEADER unreadable: {e}")))
    }
}

// =============================================================================
// Writer
// =============================================================================

/// Parameters for storing the file header.
#[derive(Debug, Clone, Copy)]
pub struct HeaderCreateInfo {
    /// Total file size in bytes; must equal the backing region length.
    pub file_size: u64,
    /// File revision number.
    pub revision: u32,
    /// Offset of the already-stored tile table block.
    pub tile_table_offset: u64,
    /// Offset of the already-stored metadata block.
    pub metadata_offset: u64,
}

impl Default for HeaderCreateInfo {
    fn default() -> Self {
        HeaderCreateInfo {
            file_size: 0,
            revision: 0,
            tile_table_offset: NULL_OFFSET,
            metadata_offset: NULL_OFFSET,
        }
    }
}

/// Store the file header at offset zero.
///
/// Both children must already be stored: the tile table and metadata
/// subtrees are fully validated before a byte of the header is written.
pub fn store_file_header(base: &mut [u8], info: &HeaderCreateInfo) -> Result<(), ExtensionError> {
    if info.file_size == 0 {
        return Err(ExtensionError::Invariant(String::from(
            "store_file_header: no file size provided; the file size shall be encoded as an \
             unsigned 64-bit integer identical to the operating system query for the file size",
        )));
    }
    if info.file_size != base.len() as u64 {
        return Err(ExtensionError::Invariant(format!(
            "store_file_header: declared file size ({}) does not match the backing region ({})",
            info.file_size,
            base.len()
        )));
    }

    let tile_table = TileTableBlock::new(info.tile_table_offset, info.file_size, EXTENSION_VERSION);
    let result = tile_table.validate_full(base);
    if result.is_failure() {
        return Err(ExtensionError::Validation(format!(
            "store_file_header: tile table failed full validation: {}",
            result.message
        )));
    }
    if result.is_warning() {
        warn!("store_file_header tile table validation: {}", result.message);
    }

    let metadata = MetadataBlock::new(info.metadata_offset, info.file_size, EXTENSION_VERSION);
    let result = metadata.validate_full(base);
    if result.is_failure() {
        return Err(ExtensionError::Validation(format!(
            "store_file_header: metadata failed full validation: {}",
            result.message
        )));
    }
    if result.is_warning() {
        warn!("store_file_header metadata validation: {}", result.message);
    }

    write_u32_le(&mut base[field::MAGIC_BYTES..], MAGIC_BYTES);
    write_u16_le(&mut base[field::RECOVERY..], Recovery::FileHeader.tag());
    write_u64_le(&mut base[field::FILE_SIZE..], info.file_size);
    write_u16_le(&mut base[field::EXTENSION_MAJOR..], EXTENSION_MAJOR);
    write_u16_le(&mut base[field::EXTENSION_MINOR..], EXTENSION_MINOR);
    write_u32_le(&mut base[field::FILE_REVISION..], info.revision);
    write_u64_le(&mut base[field::TILE_TABLE_OFFSET..], info.tile_table_offset);
    write_u64_le(&mut base[field::METADATA_OFFSET..], info.metadata_offset);
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
