//! The attributes subtree: a key/value store in three blocks.
//!
//! The attributes header names the encoding convention (I2S free text or
//! DICOM) and points at two array blocks: the sizes array, whose entries
//! give each pair's key and value byte lengths, and the bytes block, whose
//! body is the concatenation of every key followed by its value in
//! size-entry order. The total implied by the sizes array must equal the
//! byte count declared by the bytes block; the cross-check runs during full
//! validation and again on read.

use std::collections::BTreeMap;

use crate::error::{ExtensionError, Outcome};
use crate::format::abstraction::Attributes;
use crate::format::datablock::{self, DataBlock, Recovery};
use crate::format::{AttributeFormat, EXTENSION_1_0, NULL_OFFSET};
use crate::io::codec::{read_u16_le, read_u32_le, read_u64_le, read_u8, write_u16_le, write_u32_le, write_u64_le, write_u8};
use crate::io::region::ByteRegion;

/// Attributes header field layout.
pub(crate) mod field {
    use crate::format::datablock::prologue;

    pub const FORMAT: usize = prologue::SIZE;
    pub const FORMAT_S: usize = 1;
    pub const VERSION: usize = FORMAT + FORMAT_S;
    pub const VERSION_S: usize = 2;
    pub const LENGTHS_OFFSET: usize = VERSION + VERSION_S;
    pub const LENGTHS_OFFSET_S: usize = 8;
    pub const BYTE_ARRAY_OFFSET: usize = LENGTHS_OFFSET + LENGTHS_OFFSET_S;
    pub const BYTE_ARRAY_OFFSET_S: usize = 8;
    pub const HEADER_V1_0_SIZE: usize = BYTE_ARRAY_OFFSET + BYTE_ARRAY_OFFSET_S;
    // Version 1.0 ends here; later fields are added behind the version gate.
}

/// Sizes array header field layout.
pub(crate) mod sizes_field {
    use crate::format::datablock::prologue;

    pub const ENTRY_SIZE: usize = prologue::SIZE;
    pub const ENTRY_SIZE_S: usize = 2;
    pub const ENTRY_NUMBER: usize = ENTRY_SIZE + ENTRY_SIZE_S;
    pub const ENTRY_NUMBER_S: usize = 4;
    pub const HEADER_V1_0_SIZE: usize = ENTRY_NUMBER + ENTRY_NUMBER_S;
}

/// Sizes array per-entry field layout.
pub(crate) mod size_entry {
    pub const KEY_SIZE: usize = 0;
    pub const KEY_SIZE_S: usize = 2;
    pub const VALUE_SIZE: usize = KEY_SIZE + KEY_SIZE_S;
    pub const VALUE_SIZE_S: usize = 4;
    pub const SIZE: usize = VALUE_SIZE + VALUE_SIZE_S;
}

/// Bytes block header field layout.
pub(crate) mod bytes_field {
    use crate::format::datablock::prologue;

    pub const ENTRY_NUMBER: usize = prologue::SIZE;
    pub const ENTRY_NUMBER_S: usize = 4;
    pub const HEADER_V1_0_SIZE: usize = ENTRY_NUMBER + ENTRY_NUMBER_S;
}

/// Byte length of the version 1.0 attributes header.
pub const ATTRIBUTES_SIZE: u64 = field::HEADER_V1_0_SIZE as u64;

/// Byte length of the version 1.0 sizes array header.
pub const ATTRIBUTE_SIZES_HEADER_SIZE: u64 = sizes_field::HEADER_V1_0_SIZE as u64;

/// Byte length of the version 1.0 bytes block header.
pub const ATTRIBUTE_BYTES_HEADER_SIZE: u64 = bytes_field::HEADER_V1_0_SIZE as u64;

/// `(key_size, value_size)` pairs in entry order.
pub type SizeArray = Vec<(u16, u32)>;

// =============================================================================
// AttributesBlock
// =============================================================================

/// Reader for the attributes header block.
#[derive(Debug, Clone, Copy)]
pub struct AttributesBlock {
    pub(crate) block: DataBlock,
}

impl AttributesBlock {
    pub fn new(offset: u64, file_size: u64, version: u32) -> Self {
        AttributesBlock {
            block: DataBlock::new(offset, file_size, version),
        }
    }

    #[inline]
    pub fn offset(&self) -> u64 {
        self.block.offset
    }

    /// Block size for this file's version. Fixed-length in version 1.0.
    pub fn size(&self) -> u64 {
        let size = ATTRIBUTES_SIZE;
        if self.block.version > EXTENSION_1_0 {
            // v2+ attributes fields extend the size here once defined.
        }
        size
    }

    /// Validate the block prologue.
    pub fn validate_offset<R: ByteRegion + ?Sized>(&self, region: &R) -> Outcome {
        self.block
            .validate_offset(region, "ATTRIBUTES", Recovery::Attributes)
    }

    /// Validate the prologue, the format enumerator, and both child blocks
    /// with the sizes-to-bytes total cross-check.
    pub fn validate_full<R: ByteRegion + ?Sized>(&self, region: &R) -> Outcome {
        let mut outcome = self.validate_offset(region);
        if outcome.is_failure() {
            return outcome;
        }

        let bytes = match region.slice(self.block.offset, self.size()) {
            Ok(bytes) => bytes,
            Err(e) => {
                return Outcome::validation_failure(format!("ATTRIBUTES unreadable: {e}"))
            }
        };

        let format = read_u8(&bytes[field::FORMAT..]);
        if !AttributeFormat::accepted(format, self.block.version) {
            return Outcome::failure(format!(
                "undefined metadata attributes format ({format}) decoded from the attributes \
                 header; the format shall be one of the defined metadata conventions, excluding \
                 the undefined value (0)"
            ));
        }
        let version = read_u16_le(&bytes[field::VERSION..]);
        if format == AttributeFormat::Dicom as u8 && version == 0 {
            return Outcome::failure(
                "DICOM attributes shall include a nonzero version year; a version of zero \
                 indicates free-text attributes and requires the I2S format",
            );
        }

        let sizes = AttributeSizesBlock::new(
            read_u64_le(&bytes[field::LENGTHS_OFFSET..]),
            self.block.file_size,
            self.block.version,
        );
        let (result, expected_bytes) = sizes.validate_full(region);
        if result.is_failure() {
            return result;
        }
        outcome = outcome.merge(result);

        let byte_array = AttributeBytesBlock::new(
            read_u64_le(&bytes[field::BYTE_ARRAY_OFFSET..]),
            self.block.file_size,
            self.block.version,
        );
        let result = byte_array.validate_full(region, expected_bytes);
        if result.is_failure() {
            return result;
        }

        outcome.merge(result)
    }

    /// Read the full attribute map: format, version, and every key/value
    /// pair sliced out of the bytes block.
    pub fn read<R: ByteRegion + ?Sized>(&self, region: &R) -> Result<Attributes, ExtensionError> {
        let bytes = region
            .slice(self.block.offset, self.size())
            .map_err(|e| ExtensionError::Structural(format!("ATTRIBUTES unreadable: {e}")))?;

        let format_raw = read_u8(&bytes[field::FORMAT..]);
        let format = AttributeFormat::from_u8(format_raw)
            .filter(|_| AttributeFormat::accepted(format_raw, self.block.version))
            .ok_or_else(|| {
                ExtensionError::Enumerator(format!(
                    "undefined attributes encoding format ({format_raw}) decoded from the \
                     attributes header"
                ))
            })?;
        let version = read_u16_le(&bytes[field::VERSION..]);
        if format == AttributeFormat::Dicom && version == 0 {
            return Err(ExtensionError::Invariant(String::from(
                "DICOM attributes require a nonzero version year",
            )));
        }

        let sizes_block = self.sizes(region)?;
        let size_array = sizes_block.read(region)?;

        let bytes_block = self.bytes(region)?;
        let entries = bytes_block.read(region, &size_array)?;

        let attributes = Attributes {
            format,
            version,
            entries,
        };

        if self.block.version > EXTENSION_1_0 {
            // v2+ attributes fields are read here once defined.
        }

        Ok(attributes)
    }

    /// Stored absolute offset of the sizes array.
    pub(crate) fn stored_sizes_offset<R: ByteRegion + ?Sized>(
        &self,
        region: &R,
    ) -> Result<u64, ExtensionError> {
        let bytes = region
            .slice(self.block.offset, self.size())
            .map_err(|e| ExtensionError::Structural(format!("ATTRIBUTES unreadable: {e}")))?;
        Ok(read_u64_le(&bytes[field::LENGTHS_OFFSET..]))
    }

    /// Stored absolute offset of the bytes block.
    pub(crate) fn stored_bytes_offset<R: ByteRegion + ?Sized>(
        &self,
        region: &R,
    ) -> Result<u64, ExtensionError> {
        let bytes = region
            .slice(self.block.offset, self.size())
            .map_err(|e| ExtensionError::Structural(format!("ATTRIBUTES unreadable: {e}")))?;
        Ok(read_u64_le(&bytes[field::BYTE_ARRAY_OFFSET..]))
    }

    /// Construct the sizes array reader at the stored offset.
    pub fn sizes<R: ByteRegion + ?Sized>(
        &self,
        region: &R,
    ) -> Result<AttributeSizesBlock, ExtensionError> {
        let bytes = region
            .slice(self.block.offset, self.size())
            .map_err(|e| ExtensionError::Structural(format!("ATTRIBUTES unreadable: {e}")))?;
        let block = AttributeSizesBlock::new(
            read_u64_le(&bytes[field::LENGTHS_OFFSET..]),
            self.block.file_size,
            self.block.version,
        );
        block.validate_offset(region).into_result()?;
        Ok(block)
    }

    /// Construct the bytes block reader at the stored offset.
    pub fn bytes<R: ByteRegion + ?Sized>(
        &self,
        region: &R,
    ) -> Result<AttributeBytesBlock, ExtensionError> {
        let bytes = region
            .slice(self.block.offset, self.size())
            .map_err(|e| ExtensionError::Structural(format!("ATTRIBUTES unreadable: {e}")))?;
        let block = AttributeBytesBlock::new(
            read_u64_le(&bytes[field::BYTE_ARRAY_OFFSET..]),
            self.block.file_size,
            self.block.version,
        );
        block.validate_offset(region).into_result()?;
        Ok(block)
    }
}

// =============================================================================
// AttributeSizesBlock
// =============================================================================

/// Reader for the attribute sizes array block.
#[derive(Debug, Clone, Copy)]
pub struct AttributeSizesBlock {
    pub(crate) block: DataBlock,
}

impl AttributeSizesBlock {
    pub fn new(offset: u64, file_size: u64, version: u32) -> Self {
        AttributeSizesBlock {
            block: DataBlock::new(offset, file_size, version),
        }
    }

    #[inline]
    pub fn offset(&self) -> u64 {
        self.block.offset
    }

    /// Total block size: header plus `entry_count` entries of the stored
    /// stride.
    pub fn size<R: ByteRegion + ?Sized>(&self, region: &R) -> Result<u64, ExtensionError> {
        let (stride, entries) = self.array_header(region)?;
        Ok(ATTRIBUTE_SIZES_HEADER_SIZE + entries as u64 * stride as u64)
    }

    /// Validate the block prologue.
    pub fn validate_offset<R: ByteRegion + ?Sized>(&self, region: &R) -> Outcome {
        self.block
            .validate_offset(region, "ATTRIBUTES_SIZES", Recovery::AttributeSizes)
    }

    /// Validate the prologue and array bounds, returning the total key plus
    /// value bytes the sizes imply for the bytes-block cross-check.
    pub fn validate_full<R: ByteRegion + ?Sized>(&self, region: &R) -> (Outcome, u64) {
        let outcome = self.validate_offset(region);
        if outcome.is_failure() {
            return (outcome, 0);
        }

        let (stride, entries) = match self.array_header(region) {
            Ok(header) => header,
            Err(e) => return (Outcome::validation_failure(e.to_string()), 0),
        };

        let start = self.block.offset + ATTRIBUTE_SIZES_HEADER_SIZE;
        let body_len = entries as u64 * stride as u64;
        if start + body_len > self.block.file_size {
            return (
                Outcome::failure(format!(
                    "ATTRIBUTES_SIZES failed validation: sizes array block (location {start}-{} \
                     bytes) extends beyond the end of file",
                    start + body_len
                )),
                0,
            );
        }
        let body = match region.slice(start, body_len) {
            Ok(body) => body,
            Err(e) => return (Outcome::failure(format!("ATTRIBUTES_SIZES unreadable: {e}")), 0),
        };

        let mut expected_bytes = 0u64;
        for index in 0..entries as usize {
            let at = &body[index * stride as usize..];
            expected_bytes += read_u16_le(&at[size_entry::KEY_SIZE..]) as u64;
            expected_bytes += read_u32_le(&at[size_entry::VALUE_SIZE..]) as u64;

            if self.block.version > EXTENSION_1_0 {
                // v2+ per-entry validations are added here once defined.
            }
        }

        (outcome, expected_bytes)
    }

    /// Read the `(key_size, value_size)` array in entry order.
    pub fn read<R: ByteRegion + ?Sized>(&self, region: &R) -> Result<SizeArray, ExtensionError> {
        let (stride, entries) = self.array_header(region)?;

        let start = self.block.offset + ATTRIBUTE_SIZES_HEADER_SIZE;
        let body_len = entries as u64 * stride as u64;
        if start + body_len > self.block.file_size {
            return Err(ExtensionError::Structural(format!(
                "attribute sizes array (location {start}-{} bytes) extends beyond the end of file",
                start + body_len
            )));
        }
        let body = region
            .slice(start, body_len)
            .map_err(|e| ExtensionError::Structural(format!("ATTRIBUTES_SIZES unreadable: {e}")))?;

        let mut sizes = Vec::with_capacity(entries as usize);
        for index in 0..entries as usize {
            let at = &body[index * stride as usize..];
            sizes.push((
                read_u16_le(&at[size_entry::KEY_SIZE..]),
                read_u32_le(&at[size_entry::VALUE_SIZE..]),
            ));

            if self.block.version > EXTENSION_1_0 {
                // v2+ per-entry fields are read here once defined.
            }
        }
        Ok(sizes)
    }

    fn array_header<R: ByteRegion + ?Sized>(
        &self,
        region: &R,
    ) -> Result<(u16, u32), ExtensionError> {
        let bytes = region
            .slice(self.block.offset, ATTRIBUTE_SIZES_HEADER_SIZE)
            .map_err(|e| ExtensionError::Structural(format!("ATTRIBUTES_SIZES unreadable: {e}")))?;
        Ok((
            read_u16_le(&bytes[sizes_field::ENTRY_SIZE..]),
            read_u32_le(&bytes[sizes_field::ENTRY_NUMBER..]),
        ))
    }
}

// =============================================================================
// AttributeBytesBlock
// =============================================================================

/// Reader for the attribute bytes block.
#[derive(Debug, Clone, Copy)]
pub struct AttributeBytesBlock {
    pub(crate) block: DataBlock,
}

impl AttributeBytesBlock {
    pub fn new(offset: u64, file_size: u64, version: u32) -> Self {
        AttributeBytesBlock {
            block: DataBlock::new(offset, file_size, version),
        }
    }

    #[inline]
    pub fn offset(&self) -> u64 {
        self.block.offset
    }

    /// Total block size: header plus the declared byte count.
    pub fn size<R: ByteRegion + ?Sized>(&self, region: &R) -> Result<u64, ExtensionError> {
        Ok(ATTRIBUTE_BYTES_HEADER_SIZE + self.declared_bytes(region)? as u64)
    }

    /// Validate the block prologue.
    pub fn validate_offset<R: ByteRegion + ?Sized>(&self, region: &R) -> Outcome {
        self.block
            .validate_offset(region, "ATTRIBUTES_BYTES", Recovery::AttributeBytes)
    }

    /// Validate the prologue, the declared total against the sizes array's
    /// expectation, and the body bounds.
    pub fn validate_full<R: ByteRegion + ?Sized>(&self, region: &R, expected: u64) -> Outcome {
        let outcome = self.validate_offset(region);
        if outcome.is_failure() {
            return outcome;
        }

        let declared = match self.declared_bytes(region) {
            Ok(declared) => declared as u64,
            Err(e) => return Outcome::validation_failure(e.to_string()),
        };
        if declared != expected {
            return Outcome::failure(format!(
                "ATTRIBUTES_BYTES failed validation: expected bytes ({expected}) from the \
                 ATTRIBUTES_SIZES array do not match the byte size of the ATTRIBUTES_BYTES \
                 block ({declared})"
            ));
        }
        let start = self.block.offset + ATTRIBUTE_BYTES_HEADER_SIZE;
        if start + declared > self.block.file_size {
            return Outcome::failure(format!(
                "ATTRIBUTES_BYTES failed validation: full attributes byte array block (location \
                 {}-{} bytes) extends beyond end of file",
                self.block.offset,
                start + declared
            ));
        }

        outcome
    }

    /// Slice the byte body into the attribute map using `sizes`.
    pub fn read<R: ByteRegion + ?Sized>(
        &self,
        region: &R,
        sizes: &SizeArray,
    ) -> Result<BTreeMap<String, Vec<u8>>, ExtensionError> {
        let declared = self.declared_bytes(region)? as u64;
        let total: u64 = sizes
            .iter()
            .map(|&(key, value)| key as u64 + value as u64)
            .sum();
        if total != declared {
            return Err(ExtensionError::Invariant(format!(
                "expected bytes ({total}) from the ATTRIBUTES_SIZES array do not match the byte \
                 size of the ATTRIBUTES_BYTES block ({declared})"
            )));
        }

        let start = self.block.offset + ATTRIBUTE_BYTES_HEADER_SIZE;
        if start + declared > self.block.file_size {
            return Err(ExtensionError::Structural(format!(
                "attribute byte array (offset {start} plus {declared} bytes) exceeds the file \
                 size of {} bytes",
                self.block.file_size
            )));
        }
        let body = region
            .slice(start, declared)
            .map_err(|e| ExtensionError::Structural(format!("ATTRIBUTES_BYTES unreadable: {e}")))?;

        let mut entries = BTreeMap::new();
        let mut cursor = 0usize;
        for &(key_size, value_size) in sizes {
            let key_end = cursor + key_size as usize;
            let value_end = key_end + value_size as usize;
            let key = String::from_utf8_lossy(&body[cursor..key_end]).into_owned();
            entries.insert(key, body[key_end..value_end].to_vec());
            cursor = value_end;
        }
        Ok(entries)
    }

    fn declared_bytes<R: ByteRegion + ?Sized>(&self, region: &R) -> Result<u32, ExtensionError> {
        let bytes = region
            .slice(self.block.offset, ATTRIBUTE_BYTES_HEADER_SIZE)
            .map_err(|e| ExtensionError::Structural(format!("ATTRIBUTES_BYTES unreadable: {e}")))?;
        Ok(read_u32_le(&bytes[bytes_field::ENTRY_NUMBER..]))
    }
}

// =============================================================================
// Writers
// =============================================================================

/// Parameters for storing an attributes header block.
#[derive(Debug, Clone, Copy)]
pub struct AttributesCreateInfo {
    /// Offset at which the attributes header itself is stored.
    pub attributes_offset: u64,
    pub format: AttributeFormat,
    /// Format version; required nonzero for DICOM.
    pub version: u16,
    /// Offset of the already-stored sizes array.
    pub sizes: u64,
    /// Offset of the already-stored bytes block.
    pub bytes: u64,
}

/// Store an attributes header block at `info.attributes_offset`.
pub fn store_attributes(base: &mut [u8], info: &AttributesCreateInfo) -> Result<(), ExtensionError> {
    if info.attributes_offset == NULL_OFFSET {
        return Err(ExtensionError::Invariant(String::from(
            "store_attributes: invalid attributes offset",
        )));
    }
    let end = info.attributes_offset + ATTRIBUTES_SIZE;
    if end > base.len() as u64 {
        return Err(ExtensionError::Structural(format!(
            "store_attributes: block {}..{end} extends beyond the region ({} bytes)",
            info.attributes_offset,
            base.len()
        )));
    }
    if info.format == AttributeFormat::Dicom && info.version == 0 {
        return Err(ExtensionError::Invariant(String::from(
            "store_attributes: DICOM attributes must include the version year; a version of \
             zero indicates free-text attributes and requires the I2S format",
        )));
    }

    let file_size = base.len() as u64;
    let version = crate::format::EXTENSION_VERSION;

    let sizes = AttributeSizesBlock::new(info.sizes, file_size, version);
    let result = sizes.validate_offset(&*base);
    if result.is_failure() {
        return Err(ExtensionError::Validation(format!(
            "store_attributes: invalid attributes sizes array offset: {}",
            result.message
        )));
    }
    let bytes = AttributeBytesBlock::new(info.bytes, file_size, version);
    let result = bytes.validate_offset(&*base);
    if result.is_failure() {
        return Err(ExtensionError::Validation(format!(
            "store_attributes: invalid attributes byte array offset: {}",
            result.message
        )));
    }

    let at = info.attributes_offset as usize;
    datablock::store_prologue(base, info.attributes_offset, Recovery::Attributes);
    write_u8(&mut base[at + field::FORMAT..], info.format as u8);
    write_u16_le(&mut base[at + field::VERSION..], info.version);
    write_u64_le(&mut base[at + field::LENGTHS_OFFSET..], info.sizes);
    write_u64_le(&mut base[at + field::BYTE_ARRAY_OFFSET..], info.bytes);
    Ok(())
}

/// Total bytes required to store the sizes array for `attributes`.
pub fn size_attribute_sizes(attributes: &Attributes) -> u64 {
    ATTRIBUTE_SIZES_HEADER_SIZE + attributes.entries.len() as u64 * size_entry::SIZE as u64
}

/// Store the attribute sizes array at `offset`.
pub fn store_attribute_sizes(
    base: &mut [u8],
    offset: u64,
    attributes: &Attributes,
) -> Result<(), ExtensionError> {
    if offset == NULL_OFFSET {
        return Err(ExtensionError::Invariant(String::from(
            "store_attribute_sizes: NULL_OFFSET provided as location",
        )));
    }
    let total = size_attribute_sizes(attributes);
    if offset + total > base.len() as u64 {
        return Err(ExtensionError::Structural(format!(
            "store_attribute_sizes: block {offset}..{} extends beyond the region ({} bytes)",
            offset + total,
            base.len()
        )));
    }
    for (key, value) in &attributes.entries {
        if key.len() > u16::MAX as usize {
            return Err(ExtensionError::Invariant(format!(
                "store_attribute_sizes: attribute key \"{key}\" exceeds the 16-bit key size limit"
            )));
        }
        if value.len() > u32::MAX as usize {
            return Err(ExtensionError::Invariant(format!(
                "store_attribute_sizes: attribute value length ({} bytes) exceeds the 32-bit \
                 value size limit",
                value.len()
            )));
        }
    }

    datablock::store_prologue(base, offset, Recovery::AttributeSizes);
    let at = offset as usize;
    write_u16_le(&mut base[at + sizes_field::ENTRY_SIZE..], size_entry::SIZE as u16);
    write_u32_le(
        &mut base[at + sizes_field::ENTRY_NUMBER..],
        attributes.entries.len() as u32,
    );

    let mut cursor = at + sizes_field::HEADER_V1_0_SIZE;
    for (key, value) in &attributes.entries {
        write_u16_le(&mut base[cursor + size_entry::KEY_SIZE..], key.len() as u16);
        write_u32_le(&mut base[cursor + size_entry::VALUE_SIZE..], value.len() as u32);
        cursor += size_entry::SIZE;
    }
    Ok(())
}

/// Total bytes required to store the bytes block for `attributes`.
pub fn size_attribute_bytes(attributes: &Attributes) -> u64 {
    let body: u64 = attributes
        .entries
        .iter()
        .map(|(key, value)| key.len() as u64 + value.len() as u64)
        .sum();
    ATTRIBUTE_BYTES_HEADER_SIZE + body
}

/// Store the attribute bytes block at `offset`: each key followed by its
/// value, in the same order the sizes array was written.
pub fn store_attribute_bytes(
    base: &mut [u8],
    offset: u64,
    attributes: &Attributes,
) -> Result<(), ExtensionError> {
    if offset == NULL_OFFSET {
        return Err(ExtensionError::Invariant(String::from(
            "store_attribute_bytes: NULL_OFFSET provided as location",
        )));
    }
    let total = size_attribute_bytes(attributes);
    if offset + total > base.len() as u64 {
        return Err(ExtensionError::Structural(format!(
            "store_attribute_bytes: block {offset}..{} extends beyond the region ({} bytes)",
            offset + total,
            base.len()
        )));
    }
    let body = total - ATTRIBUTE_BYTES_HEADER_SIZE;
    if body > u32::MAX as u64 {
        return Err(ExtensionError::Invariant(format!(
            "store_attribute_bytes: attribute bytes array length ({body} bytes) exceeds the \
             32-bit size limit"
        )));
    }

    datablock::store_prologue(base, offset, Recovery::AttributeBytes);
    let at = offset as usize;
    write_u32_le(&mut base[at + bytes_field::ENTRY_NUMBER..], body as u32);

    let mut cursor = at + bytes_field::HEADER_V1_0_SIZE;
    for (key, value) in &attributes.entries {
        base[cursor..cursor + key.len()].copy_from_slice(key.as_bytes());
        cursor += key.len();
        base[cursor..cursor + value.len()].copy_from_slice(value);
        cursor += value.len();
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
