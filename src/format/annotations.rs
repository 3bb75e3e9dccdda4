//! On-slide annotations: the annotation array, per-annotation byte streams,
//! and the optional named groups.
//!
//! Annotations are keyed by 24-bit identifiers (all-ones reserved as the
//! null identifier). Each entry places a visual object on the slide and
//! points at an annotation bytes block holding its encoded form. Groups are
//! stored in a sizes/bytes block pair exactly like attributes: the sizes
//! array gives each group's label length and member count, and the bytes
//! block concatenates each label with its packed u24 member identifiers.
//! Both group offsets must be null together or valid together.

use std::collections::HashSet;

use tracing::warn;

use crate::error::{ExtensionError, Outcome};
use crate::format::abstraction::{Annotation, AnnotationGroup, Annotations};
use crate::format::datablock::{self, DataBlock, Recovery};
use crate::format::{AnnotationFormat, EXTENSION_1_0, NULL_ID, NULL_OFFSET};
use crate::io::codec::{
    read_f32_le, read_u16_le, read_u24_le, read_u32_le, read_u64_le, read_u8, write_f32_le,
    write_u16_le, write_u24_le, write_u32_le, write_u64_le, write_u8,
};
use crate::io::region::ByteRegion;

/// Annotation array header field layout.
pub(crate) mod field {
    use crate::format::datablock::prologue;

    pub const ENTRY_SIZE: usize = prologue::SIZE;
    pub const ENTRY_SIZE_S: usize = 2;
    pub const ENTRY_NUMBER: usize = ENTRY_SIZE + ENTRY_SIZE_S;
    pub const ENTRY_NUMBER_S: usize = 4;
    pub const GROUP_SIZES_OFFSET: usize = ENTRY_NUMBER + ENTRY_NUMBER_S;
    pub const GROUP_SIZES_OFFSET_S: usize = 8;
    pub const GROUP_BYTES_OFFSET: usize = GROUP_SIZES_OFFSET + GROUP_SIZES_OFFSET_S;
    pub const GROUP_BYTES_OFFSET_S: usize = 8;
    pub const HEADER_V1_0_SIZE: usize = GROUP_BYTES_OFFSET + GROUP_BYTES_OFFSET_S;
    // Version 1.0 ends here; later fields are added behind the version gate.
}

/// Annotation array per-entry field layout.
pub(crate) mod entry {
    pub const IDENTIFIER: usize = 0;
    pub const IDENTIFIER_S: usize = 3;
    pub const BYTES_OFFSET: usize = IDENTIFIER + IDENTIFIER_S;
    pub const BYTES_OFFSET_S: usize = 8;
    pub const FORMAT: usize = BYTES_OFFSET + BYTES_OFFSET_S;
    pub const FORMAT_S: usize = 1;
    pub const X_LOCATION: usize = FORMAT + FORMAT_S;
    pub const X_LOCATION_S: usize = 4;
    pub const Y_LOCATION: usize = X_LOCATION + X_LOCATION_S;
    pub const Y_LOCATION_S: usize = 4;
    pub const X_SIZE: usize = Y_LOCATION + Y_LOCATION_S;
    pub const X_SIZE_S: usize = 4;
    pub const Y_SIZE: usize = X_SIZE + X_SIZE_S;
    pub const Y_SIZE_S: usize = 4;
    pub const WIDTH: usize = Y_SIZE + Y_SIZE_S;
    pub const WIDTH_S: usize = 4;
    pub const HEIGHT: usize = WIDTH + WIDTH_S;
    pub const HEIGHT_S: usize = 4;
    pub const PARENT: usize = HEIGHT + HEIGHT_S;
    pub const PARENT_S: usize = 3;
    pub const SIZE: usize = PARENT + PARENT_S;
    // Version 1.0 ends here; later fields are added behind the version gate.
}

/// Annotation bytes header field layout.
pub(crate) mod bytes_field {
    use crate::format::datablock::prologue;

    pub const ENTRY_NUMBER: usize = prologue::SIZE;
    pub const ENTRY_NUMBER_S: usize = 4;
    pub const HEADER_V1_0_SIZE: usize = ENTRY_NUMBER + ENTRY_NUMBER_S;
}

/// Group sizes array header field layout.
pub(crate) mod group_sizes_field {
    use crate::format::datablock::prologue;

    pub const ENTRY_SIZE: usize = prologue::SIZE;
    pub const ENTRY_SIZE_S: usize = 2;
    pub const ENTRY_NUMBER: usize = ENTRY_SIZE + ENTRY_SIZE_S;
    pub const ENTRY_NUMBER_S: usize = 4;
    pub const HEADER_V1_0_SIZE: usize = ENTRY_NUMBER + ENTRY_NUMBER_S;
}

/// Group sizes per-entry field layout.
pub(crate) mod group_size_entry {
    pub const LABEL_SIZE: usize = 0;
    pub const LABEL_SIZE_S: usize = 2;
    pub const ENTRIES_NUMBER: usize = LABEL_SIZE + LABEL_SIZE_S;
    pub const ENTRIES_NUMBER_S: usize = 4;
    pub const SIZE: usize = ENTRIES_NUMBER + ENTRIES_NUMBER_S;
}

/// Group bytes header field layout.
pub(crate) mod group_bytes_field {
    use crate::format::datablock::prologue;

    pub const ENTRY_NUMBER: usize = prologue::SIZE;
    pub const ENTRY_NUMBER_S: usize = 4;
    pub const HEADER_V1_0_SIZE: usize = ENTRY_NUMBER + ENTRY_NUMBER_S;
}

/// Byte length of the version 1.0 annotation array header.
pub const ANNOTATIONS_HEADER_SIZE: u64 = field::HEADER_V1_0_SIZE as u64;

/// Byte length of the version 1.0 annotation bytes header.
pub const ANNOTATION_BYTES_HEADER_SIZE: u64 = bytes_field::HEADER_V1_0_SIZE as u64;

/// Byte length of the version 1.0 group sizes array header.
pub const GROUP_SIZES_HEADER_SIZE: u64 = group_sizes_field::HEADER_V1_0_SIZE as u64;

/// Byte length of the version 1.0 group bytes header.
pub const GROUP_BYTES_HEADER_SIZE: u64 = group_bytes_field::HEADER_V1_0_SIZE as u64;

/// Byte width of one packed group member identifier.
const MEMBER_IDENTIFIER_SIZE: u64 = 3;

/// `(label_size, member_count)` pairs in entry order.
pub type GroupSizeArray = Vec<(u16, u32)>;

// =============================================================================
// AnnotationsBlock
// =============================================================================

/// Reader for the annotation array block.
#[derive(Debug, Clone, Copy)]
pub struct AnnotationsBlock {
    pub(crate) block: DataBlock,
}

impl AnnotationsBlock {
    pub fn new(offset: u64, file_size: u64, version: u32) -> Self {
        AnnotationsBlock {
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
        Ok(ANNOTATIONS_HEADER_SIZE + entries as u64 * stride as u64)
    }

    /// Validate the block prologue.
    pub fn validate_offset<R: ByteRegion + ?Sized>(&self, region: &R) -> Outcome {
        self.block
            .validate_offset(region, "ANNOTATIONS", Recovery::Annotations)
    }

    /// Validate the prologue, the optional group pair, every entry's byte
    /// stream prologue and format enumerator, and warn on duplicate
    /// identifiers.
    pub fn validate_full<R: ByteRegion + ?Sized>(&self, region: &R) -> Outcome {
        let mut outcome = self.validate_offset(region);
        if outcome.is_failure() {
            return outcome;
        }

        // Group offsets are a pair: both null, or both valid.
        let sizes_offset = self.group_sizes_offset(region);
        let bytes_offset = self.group_bytes_offset(region);
        let sizes_present = self.offset_in_file(sizes_offset);
        let bytes_present = self.offset_in_file(bytes_offset);
        if sizes_present != bytes_present {
            return Outcome::validation_failure(format!(
                "ANNOTATIONS failed validation: the group sizes offset ({sizes_offset:#X}) and \
                 group bytes offset ({bytes_offset:#X}) shall both be null or both name valid \
                 blocks"
            ));
        }
        if sizes_present {
            let sizes = AnnotationGroupSizesBlock::new(
                sizes_offset,
                self.block.file_size,
                self.block.version,
            );
            let (result, expected_bytes) = sizes.validate_full(region);
            if result.is_failure() {
                return result;
            }
            outcome = outcome.merge(result);

            let bytes = AnnotationGroupBytesBlock::new(
                bytes_offset,
                self.block.file_size,
                self.block.version,
            );
            let result = bytes.validate_full(region, expected_bytes);
            if result.is_failure() {
                return result;
            }
            outcome = outcome.merge(result);
        }

        let (stride, entries) = match self.array_header(region) {
            Ok(header) => header,
            Err(e) => return Outcome::validation_failure(e.to_string()),
        };

        let start = self.block.offset + ANNOTATIONS_HEADER_SIZE;
        let body_len = entries as u64 * stride as u64;
        if start + body_len > self.block.file_size {
            return Outcome::failure(format!(
                "ANNOTATIONS failed validation: entry array ({start}-{} bytes) extends beyond \
                 the end of the file",
                start + body_len
            ));
        }
        let body = match region.slice(start, body_len) {
            Ok(body) => body,
            Err(e) => return Outcome::failure(format!("ANNOTATIONS unreadable: {e}")),
        };

        let mut seen = HashSet::new();
        for index in 0..entries as usize {
            let at = &body[index * stride as usize..];

            let bytes_offset = read_u64_le(&at[entry::BYTES_OFFSET..]);
            if bytes_offset == NULL_OFFSET {
                return Outcome::failure(format!(
                    "ANNOTATIONS entry ({index}) contains an invalid (null) byte stream offset; \
                     the bytes offset shall name a valid annotation bytes block"
                ));
            }
            if bytes_offset > self.block.file_size {
                return Outcome::failure(format!(
                    "ANNOTATIONS entry ({index}) contains a byte stream offset out of file \
                     bounds ({bytes_offset})"
                ));
            }
            let bytes_block =
                AnnotationBytesBlock::new(bytes_offset, self.block.file_size, self.block.version);
            let result = bytes_block.validate_offset(region);
            if result.is_failure() {
                return result;
            }

            let identifier = read_u24_le(&at[entry::IDENTIFIER..]);
            if !seen.insert(identifier) {
                warn!(
                    "duplicate annotation identifier ({identifier:#X}); each annotation within \
                     the annotations array shall be referenced by a unique 24-bit identifier"
                );
                outcome = outcome.merge(Outcome::warning(format!(
                    "duplicate annotation identifier ({identifier:#X})"
                )));
            }

            let format = read_u8(&at[entry::FORMAT..]);
            if !AnnotationFormat::accepted(format, self.block.version) {
                return Outcome::failure(format!(
                    "undefined annotation format ({format}) decoded from the annotations array; \
                     the format shall name the decoding algorithm and be one of the defined \
                     values, excluding the undefined value (0)"
                ));
            }

            if self.block.version > EXTENSION_1_0 {
                // v2+ per-entry validations are added here once defined.
            }
        }

        outcome
    }

    /// Read the annotation map and any named groups. Duplicate identifiers
    /// warn and are skipped (the first entry wins).
    ///
    /// When `collect` is supplied, the descriptor of each annotation bytes
    /// block is pushed onto it for file-map enumeration.
    pub fn read<R: ByteRegion + ?Sized>(
        &self,
        region: &R,
        mut collect: Option<&mut Vec<AnnotationBytesBlock>>,
    ) -> Result<Annotations, ExtensionError> {
        let (stride, entries) = self.array_header(region)?;

        let start = self.block.offset + ANNOTATIONS_HEADER_SIZE;
        let body_len = entries as u64 * stride as u64;
        if start + body_len > self.block.file_size {
            return Err(ExtensionError::Structural(format!(
                "annotation array ({start}-{} bytes) extends beyond the end of the file",
                start + body_len
            )));
        }
        let body = region
            .slice(start, body_len)
            .map_err(|e| ExtensionError::Structural(format!("ANNOTATIONS unreadable: {e}")))?;

        let mut annotations = Annotations::default();
        for index in 0..entries as usize {
            let at = &body[index * stride as usize..];

            let bytes_offset = read_u64_le(&at[entry::BYTES_OFFSET..]);
            if bytes_offset == NULL_OFFSET {
                return Err(ExtensionError::Structural(String::from(
                    "annotation entry contains an invalid (null) byte stream offset",
                )));
            }
            if bytes_offset > self.block.file_size {
                return Err(ExtensionError::Structural(String::from(
                    "annotation entry byte stream offset is out of file bounds",
                )));
            }
            let bytes_block =
                AnnotationBytesBlock::new(bytes_offset, self.block.file_size, self.block.version);
            bytes_block.validate_offset(region).into_result()?;
            if let Some(ref mut blocks) = collect {
                blocks.push(bytes_block);
            }

            let identifier = read_u24_le(&at[entry::IDENTIFIER..]);
            if annotations.entries.contains_key(&identifier) {
                warn!(
                    "duplicate annotation identifier ({identifier:#X}); skipping duplicate: each \
                     annotation within the annotations array shall be referenced by a unique \
                     24-bit identifier"
                );
                continue;
            }

            let (stream_offset, byte_size) = bytes_block.read(region)?;

            let format_raw = read_u8(&at[entry::FORMAT..]);
            let format = AnnotationFormat::from_u8(format_raw)
                .filter(|_| AnnotationFormat::accepted(format_raw, self.block.version))
                .ok_or_else(|| {
                    ExtensionError::Enumerator(format!(
                        "undefined annotation format ({format_raw}) decoded from the annotations \
                         array"
                    ))
                })?;

            annotations.entries.insert(
                identifier,
                Annotation {
                    offset: stream_offset,
                    byte_size,
                    format,
                    x_location: read_f32_le(&at[entry::X_LOCATION..]),
                    y_location: read_f32_le(&at[entry::Y_LOCATION..]),
                    x_size: read_f32_le(&at[entry::X_SIZE..]),
                    y_size: read_f32_le(&at[entry::Y_SIZE..]),
                    width: read_u32_le(&at[entry::WIDTH..]),
                    height: read_u32_le(&at[entry::HEIGHT..]),
                    parent: read_u24_le(&at[entry::PARENT..]),
                },
            );

            if self.block.version > EXTENSION_1_0 {
                // v2+ per-entry fields are read here once defined.
            }
        }

        if self.has_groups(region) {
            let sizes_block = self.group_sizes(region)?;
            let size_array = sizes_block.read(region)?;

            let bytes_block = self.group_bytes(region)?;
            annotations.groups = bytes_block.read(region, &size_array)?;
        }

        Ok(annotations)
    }

    /// True if both group offsets are non-null and in range.
    pub fn has_groups<R: ByteRegion + ?Sized>(&self, region: &R) -> bool {
        self.offset_in_file(self.group_sizes_offset(region))
            && self.offset_in_file(self.group_bytes_offset(region))
    }

    /// Construct the group sizes reader at the stored offset.
    pub fn group_sizes<R: ByteRegion + ?Sized>(
        &self,
        region: &R,
    ) -> Result<AnnotationGroupSizesBlock, ExtensionError> {
        let block = AnnotationGroupSizesBlock::new(
            self.group_sizes_offset(region),
            self.block.file_size,
            self.block.version,
        );
        block.validate_offset(region).into_result()?;
        Ok(block)
    }

    /// Construct the group bytes reader at the stored offset.
    pub fn group_bytes<R: ByteRegion + ?Sized>(
        &self,
        region: &R,
    ) -> Result<AnnotationGroupBytesBlock, ExtensionError> {
        let offset = self.group_bytes_offset(region);
        if offset == NULL_OFFSET || offset > self.block.file_size {
            return Err(ExtensionError::Structural(String::from(
                "invalid offset value for the annotation group bytes array",
            )));
        }
        let block =
            AnnotationGroupBytesBlock::new(offset, self.block.file_size, self.block.version);
        block.validate_offset(region).into_result()?;
        Ok(block)
    }

    pub(crate) fn group_sizes_offset<R: ByteRegion + ?Sized>(&self, region: &R) -> u64 {
        self.stored_u64(region, field::GROUP_SIZES_OFFSET)
    }

    pub(crate) fn group_bytes_offset<R: ByteRegion + ?Sized>(&self, region: &R) -> u64 {
        self.stored_u64(region, field::GROUP_BYTES_OFFSET)
    }

    fn stored_u64<R: ByteRegion + ?Sized>(&self, region: &R, field_offset: usize) -> u64 {
        match region.slice(self.block.offset + field_offset as u64, 8) {
            Ok(bytes) => read_u64_le(bytes),
            Err(_) => NULL_OFFSET,
        }
    }

    fn offset_in_file(&self, offset: u64) -> bool {
        offset != NULL_OFFSET && offset < self.block.file_size
    }

    fn array_header<R: ByteRegion + ?Sized>(
        &self,
        region: &R,
    ) -> Result<(u16, u32), ExtensionError> {
        let bytes = region
            .slice(self.block.offset, ANNOTATIONS_HEADER_SIZE)
            .map_err(|e| ExtensionError::Structural(format!("ANNOTATIONS unreadable: {e}")))?;
        Ok((
            read_u16_le(&bytes[field::ENTRY_SIZE..]),
            read_u32_le(&bytes[field::ENTRY_NUMBER..]),
        ))
    }
}

// =============================================================================
// AnnotationBytesBlock
// =============================================================================

/// Reader for one annotation byte stream block.
#[derive(Debug, Clone, Copy)]
pub struct AnnotationBytesBlock {
    pub(crate) block: DataBlock,
}

impl AnnotationBytesBlock {
    pub fn new(offset: u64, file_size: u64, version: u32) -> Self {
        AnnotationBytesBlock {
            block: DataBlock::new(offset, file_size, version),
        }
    }

    #[inline]
    pub fn offset(&self) -> u64 {
        self.block.offset
    }

    /// Total block size: header plus the declared byte count.
    pub fn size<R: ByteRegion + ?Sized>(&self, region: &R) -> Result<u64, ExtensionError> {
        Ok(ANNOTATION_BYTES_HEADER_SIZE + self.declared_bytes(region)? as u64)
    }

    /// Validate the block prologue.
    pub fn validate_offset<R: ByteRegion + ?Sized>(&self, region: &R) -> Outcome {
        self.block
            .validate_offset(region, "ANNOTATION_BYTES", Recovery::AnnotationBytes)
    }

    /// Read the payload handle: `(offset, byte_size)`. The annotation bytes
    /// themselves stay in place.
    pub fn read<R: ByteRegion + ?Sized>(&self, region: &R) -> Result<(u64, u32), ExtensionError> {
        let byte_size = self.declared_bytes(region)?;
        let start = self.block.offset + ANNOTATION_BYTES_HEADER_SIZE;
        if start + byte_size as u64 > self.block.file_size {
            return Err(ExtensionError::Structural(format!(
                "annotation bytes block ({start}-{} bytes) extends beyond the end of the file",
                start + byte_size as u64
            )));
        }

        if self.block.version > EXTENSION_1_0 {
            // v2+ annotation bytes fields are read here once defined.
        }

        Ok((start, byte_size))
    }

    fn declared_bytes<R: ByteRegion + ?Sized>(&self, region: &R) -> Result<u32, ExtensionError> {
        let bytes = region
            .slice(self.block.offset, ANNOTATION_BYTES_HEADER_SIZE)
            .map_err(|e| ExtensionError::Structural(format!("ANNOTATION_BYTES unreadable: {e}")))?;
        Ok(read_u32_le(&bytes[bytes_field::ENTRY_NUMBER..]))
    }
}

// =============================================================================
// AnnotationGroupSizesBlock
// =============================================================================

/// Reader for the group sizes array block.
#[derive(Debug, Clone, Copy)]
pub struct AnnotationGroupSizesBlock {
    pub(crate) block: DataBlock,
}

impl AnnotationGroupSizesBlock {
    pub fn new(offset: u64, file_size: u64, version: u32) -> Self {
        AnnotationGroupSizesBlock {
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
        Ok(GROUP_SIZES_HEADER_SIZE + entries as u64 * stride as u64)
    }

    /// Validate the block prologue.
    pub fn validate_offset<R: ByteRegion + ?Sized>(&self, region: &R) -> Outcome {
        self.block.validate_offset(
            region,
            "ANNOTATION_GROUP_SIZES",
            Recovery::AnnotationGroupSizes,
        )
    }

    /// Validate the prologue and bounds, returning the total label plus
    /// member bytes the sizes imply for the group bytes cross-check.
    pub fn validate_full<R: ByteRegion + ?Sized>(&self, region: &R) -> (Outcome, u64) {
        let outcome = self.validate_offset(region);
        if outcome.is_failure() {
            return (outcome, 0);
        }

        let (stride, entries) = match self.array_header(region) {
            Ok(header) => header,
            Err(e) => return (Outcome::validation_failure(e.to_string()), 0),
        };

        let start = self.block.offset + GROUP_SIZES_HEADER_SIZE;
        let body_len = entries as u64 * stride as u64;
        if start + body_len > self.block.file_size {
            return (
                Outcome::failure(format!(
                    "ANNOTATION_GROUP_SIZES failed validation: sizes array block (location \
                     {start}-{} bytes) extends beyond the end of file",
                    start + body_len
                )),
                0,
            );
        }
        let body = match region.slice(start, body_len) {
            Ok(body) => body,
            Err(e) => {
                return (
                    Outcome::failure(format!("ANNOTATION_GROUP_SIZES unreadable: {e}")),
                    0,
                )
            }
        };

        let mut expected_bytes = 0u64;
        for index in 0..entries as usize {
            let at = &body[index * stride as usize..];
            expected_bytes += read_u16_le(&at[group_size_entry::LABEL_SIZE..]) as u64;
            expected_bytes += read_u32_le(&at[group_size_entry::ENTRIES_NUMBER..]) as u64
                * MEMBER_IDENTIFIER_SIZE;

            if self.block.version > EXTENSION_1_0 {
                // v2+ per-entry validations are added here once defined.
            }
        }

        (outcome, expected_bytes)
    }

    /// Read the `(label_size, member_count)` array in entry order.
    pub fn read<R: ByteRegion + ?Sized>(
        &self,
        region: &R,
    ) -> Result<GroupSizeArray, ExtensionError> {
        let (stride, entries) = self.array_header(region)?;

        let start = self.block.offset + GROUP_SIZES_HEADER_SIZE;
        let body_len = entries as u64 * stride as u64;
        if start + body_len > self.block.file_size {
            return Err(ExtensionError::Structural(format!(
                "annotation group sizes array (location {start}-{} bytes) extends beyond the \
                 end of file",
                start + body_len
            )));
        }
        let body = region.slice(start, body_len).map_err(|e| {
            ExtensionError::Structural(format!("ANNOTATION_GROUP_SIZES unreadable: {e}"))
        })?;

        let mut sizes = Vec::with_capacity(entries as usize);
        for index in 0..entries as usize {
            let at = &body[index * stride as usize..];
            sizes.push((
                read_u16_le(&at[group_size_entry::LABEL_SIZE..]),
                read_u32_le(&at[group_size_entry::ENTRIES_NUMBER..]),
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
        let bytes = region.slice(self.block.offset, GROUP_SIZES_HEADER_SIZE).map_err(|e| {
            ExtensionError::Structural(format!("ANNOTATION_GROUP_SIZES unreadable: {e}"))
        })?;
        Ok((
            read_u16_le(&bytes[group_sizes_field::ENTRY_SIZE..]),
            read_u32_le(&bytes[group_sizes_field::ENTRY_NUMBER..]),
        ))
    }
}

// =============================================================================
// AnnotationGroupBytesBlock
// =============================================================================

/// Reader for the group bytes block.
#[derive(Debug, Clone, Copy)]
pub struct AnnotationGroupBytesBlock {
    pub(crate) block: DataBlock,
}

impl AnnotationGroupBytesBlock {
    pub fn new(offset: u64, file_size: u64, version: u32) -> Self {
        AnnotationGroupBytesBlock {
            block: DataBlock::new(offset, file_size, version),
        }
    }

    #[inline]
    pub fn offset(&self) -> u64 {
        self.block.offset
    }

    /// Total block size: header plus the declared byte count.
    pub fn size<R: ByteRegion + ?Sized>(&self, region: &R) -> Result<u64, ExtensionError> {
        Ok(GROUP_BYTES_HEADER_SIZE + self.declared_bytes(region)? as u64)
    }

    /// Validate the block prologue.
    pub fn validate_offset<R: ByteRegion + ?Sized>(&self, region: &R) -> Outcome {
        self.block.validate_offset(
            region,
            "ANNOTATION_GROUP_BYTES",
            Recovery::AnnotationGroupBytes,
        )
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
                "ANNOTATION_GROUP_BYTES failed validation: expected bytes ({expected}) from the \
                 ANNOTATION_GROUP_SIZES array do not match the byte size of the \
                 ANNOTATION_GROUP_BYTES block ({declared})"
            ));
        }
        let start = self.block.offset + GROUP_BYTES_HEADER_SIZE;
        if start + declared > self.block.file_size {
            return Outcome::failure(format!(
                "ANNOTATION_GROUP_BYTES failed validation: byte array block (location {}-{} \
                 bytes) extends beyond end of file",
                self.block.offset,
                start + declared
            ));
        }

        outcome
    }

    /// Slice the group labels out of the body, recording each group's member
    /// array location. The packed u24 identifiers are never copied.
    pub fn read<R: ByteRegion + ?Sized>(
        &self,
        region: &R,
        sizes: &GroupSizeArray,
    ) -> Result<std::collections::HashMap<String, AnnotationGroup>, ExtensionError> {
        let declared = self.declared_bytes(region)? as u64;
        let total: u64 = sizes
            .iter()
            .map(|&(label, members)| label as u64 + members as u64 * MEMBER_IDENTIFIER_SIZE)
            .sum();
        if total != declared {
            return Err(ExtensionError::Invariant(format!(
                "expected bytes ({total}) from the ANNOTATION_GROUP_SIZES array do not match \
                 the byte size of the ANNOTATION_GROUP_BYTES block ({declared})"
            )));
        }

        let start = self.block.offset + GROUP_BYTES_HEADER_SIZE;
        if start + declared > self.block.file_size {
            return Err(ExtensionError::Structural(format!(
                "annotation group byte array (location {start}-{} bytes) extends beyond the end \
                 of file",
                start + declared
            )));
        }
        let body = region.slice(start, declared).map_err(|e| {
            ExtensionError::Structural(format!("ANNOTATION_GROUP_BYTES unreadable: {e}"))
        })?;

        let mut groups = std::collections::HashMap::new();
        let mut cursor = 0usize;
        for &(label_size, member_count) in sizes {
            let label_end = cursor + label_size as usize;
            let label = String::from_utf8_lossy(&body[cursor..label_end]).into_owned();
            groups.insert(
                label,
                AnnotationGroup {
                    // The member identifiers follow the label in place.
                    offset: start + label_end as u64,
                    member_count,
                },
            );
            cursor = label_end + (member_count as u64 * MEMBER_IDENTIFIER_SIZE) as usize;
        }
        Ok(groups)
    }

    fn declared_bytes<R: ByteRegion + ?Sized>(&self, region: &R) -> Result<u32, ExtensionError> {
        let bytes = region.slice(self.block.offset, GROUP_BYTES_HEADER_SIZE).map_err(|e| {
            ExtensionError::Structural(format!("ANNOTATION_GROUP_BYTES unreadable: {e}"))
        })?;
        Ok(read_u32_le(&bytes[group_bytes_field::ENTRY_NUMBER..]))
    }
}

// =============================================================================
// Writers
// =============================================================================

/// One annotation to be stored in the array.
#[derive(Debug, Clone, Copy)]
pub struct AnnotationEntryInfo {
    /// 24-bit identifier; entries carrying `NULL_ID` or larger are skipped.
    pub identifier: u32,
    /// Offset of the already-stored annotation bytes block.
    pub bytes_offset: u64,
    pub format: AnnotationFormat,
    pub x_location: f32,
    pub y_location: f32,
    pub x_size: f32,
    pub y_size: f32,
    pub width: u32,
    pub height: u32,
    /// Parent identifier; values above `NULL_ID` are clamped to `NULL_ID`.
    pub parent: u32,
}

/// Parameters for storing an annotation array block.
#[derive(Debug, Clone)]
pub struct AnnotationArrayCreateInfo {
    /// Offset at which the annotation array itself is stored.
    pub offset: u64,
    /// Offset of an already-stored group sizes array, or `NULL_OFFSET`.
    pub group_sizes_offset: u64,
    /// Offset of an already-stored group bytes block, or `NULL_OFFSET`.
    pub group_bytes_offset: u64,
    pub annotations: Vec<AnnotationEntryInfo>,
}

/// Total bytes required to store `info`'s annotation array, excluding
/// entries that will be skipped for carrying the null identifier.
pub fn size_annotation_array(info: &AnnotationArrayCreateInfo) -> u64 {
    let kept = info
        .annotations
        .iter()
        .filter(|annotation| annotation.identifier < NULL_ID)
        .count() as u64;
    ANNOTATIONS_HEADER_SIZE + kept * entry::SIZE as u64
}

/// Store an annotation array block at `info.offset`.
///
/// Entries with a null identifier or a null byte stream offset are skipped
/// with a warning; the stored entry count reflects only the entries kept.
pub fn store_annotation_array(
    base: &mut [u8],
    info: &AnnotationArrayCreateInfo,
) -> Result<(), ExtensionError> {
    if info.offset == NULL_OFFSET {
        return Err(ExtensionError::Invariant(String::from(
            "store_annotation_array: NULL_OFFSET provided as location",
        )));
    }
    if info.annotations.len() as u64 > u32::MAX as u64 {
        return Err(ExtensionError::Invariant(format!(
            "store_annotation_array: array too large ({}); the number of annotations must be \
             less than the 32-bit max value",
            info.annotations.len()
        )));
    }
    let sizes_present = info.group_sizes_offset != NULL_OFFSET;
    let bytes_present = info.group_bytes_offset != NULL_OFFSET;
    if sizes_present != bytes_present {
        return Err(ExtensionError::Invariant(String::from(
            "store_annotation_array: the group sizes and group bytes offsets shall both be null \
             or both name stored blocks",
        )));
    }
    let total = size_annotation_array(info);
    if info.offset + total > base.len() as u64 {
        return Err(ExtensionError::Structural(format!(
            "store_annotation_array: block {}..{} extends beyond the region ({} bytes)",
            info.offset,
            info.offset + total,
            base.len()
        )));
    }

    let file_size = base.len() as u64;
    let version = crate::format::EXTENSION_VERSION;
    if sizes_present {
        let sizes = AnnotationGroupSizesBlock::new(info.group_sizes_offset, file_size, version);
        let result = sizes.validate_offset(&*base);
        if result.is_failure() {
            return Err(ExtensionError::Validation(format!(
                "store_annotation_array: invalid group sizes offset: {}",
                result.message
            )));
        }
        let bytes = AnnotationGroupBytesBlock::new(info.group_bytes_offset, file_size, version);
        let result = bytes.validate_offset(&*base);
        if result.is_failure() {
            return Err(ExtensionError::Validation(format!(
                "store_annotation_array: invalid group bytes offset: {}",
                result.message
            )));
        }
    }

    datablock::store_prologue(base, info.offset, Recovery::Annotations);
    let at = info.offset as usize;
    write_u16_le(&mut base[at + field::ENTRY_SIZE..], entry::SIZE as u16);
    write_u64_le(
        &mut base[at + field::GROUP_SIZES_OFFSET..],
        info.group_sizes_offset,
    );
    write_u64_le(
        &mut base[at + field::GROUP_BYTES_OFFSET..],
        info.group_bytes_offset,
    );

    let mut cursor = at + field::HEADER_V1_0_SIZE;
    let mut stored = 0u32;
    for annotation in &info.annotations {
        if annotation.identifier >= NULL_ID {
            warn!(
                "annotation does not carry a valid identifier; each annotation shall be \
                 referenced by a unique 24-bit identifier; skipping entry"
            );
            continue;
        }
        if annotation.bytes_offset == NULL_OFFSET {
            warn!(
                "annotation (id {:#X}) does not carry a valid byte stream offset; skipping entry",
                annotation.identifier
            );
            continue;
        }
        let parent = if annotation.parent > NULL_ID {
            warn!(
                "annotation (id {:#X}) parent identifier is out of the 24-bit range; storing \
                 the null identifier instead",
                annotation.identifier
            );
            NULL_ID
        } else {
            annotation.parent
        };

        write_u24_le(&mut base[cursor + entry::IDENTIFIER..], annotation.identifier);
        write_u64_le(&mut base[cursor + entry::BYTES_OFFSET..], annotation.bytes_offset);
        write_u8(&mut base[cursor + entry::FORMAT..], annotation.format as u8);
        write_f32_le(&mut base[cursor + entry::X_LOCATION..], annotation.x_location);
        write_f32_le(&mut base[cursor + entry::Y_LOCATION..], annotation.y_location);
        write_f32_le(&mut base[cursor + entry::X_SIZE..], annotation.x_size);
        write_f32_le(&mut base[cursor + entry::Y_SIZE..], annotation.y_size);
        write_u32_le(&mut base[cursor + entry::WIDTH..], annotation.width);
        write_u32_le(&mut base[cursor + entry::HEIGHT..], annotation.height);
        write_u24_le(&mut base[cursor + entry::PARENT..], parent);
        cursor += entry::SIZE;
        stored += 1;
    }
    // The stored count reflects only the entries actually encoded.
    write_u32_le(&mut base[at + field::ENTRY_NUMBER..], stored);
    Ok(())
}

/// Total bytes required to store one annotation byte stream.
pub fn size_annotation_bytes(data: &[u8]) -> u64 {
    ANNOTATION_BYTES_HEADER_SIZE + data.len() as u64
}

/// Store an annotation bytes block at `offset`.
pub fn store_annotation_bytes(
    base: &mut [u8],
    offset: u64,
    data: &[u8],
) -> Result<(), ExtensionError> {
    if offset == NULL_OFFSET {
        return Err(ExtensionError::Invariant(String::from(
            "store_annotation_bytes: NULL_OFFSET provided as location",
        )));
    }
    if data.len() as u64 > u32::MAX as u64 {
        return Err(ExtensionError::Invariant(String::from(
            "store_annotation_bytes: data block too large; the byte array shall contain fewer \
             bytes than the 32-bit max value",
        )));
    }
    let total = size_annotation_bytes(data);
    if offset + total > base.len() as u64 {
        return Err(ExtensionError::Structural(format!(
            "store_annotation_bytes: block {offset}..{} extends beyond the region ({} bytes)",
            offset + total,
            base.len()
        )));
    }

    datablock::store_prologue(base, offset, Recovery::AnnotationBytes);
    let at = offset as usize;
    write_u32_le(&mut base[at + bytes_field::ENTRY_NUMBER..], data.len() as u32);
    base[at + bytes_field::HEADER_V1_0_SIZE..at + bytes_field::HEADER_V1_0_SIZE + data.len()]
        .copy_from_slice(data);
    Ok(())
}

/// One named annotation group to be stored.
#[derive(Debug, Clone)]
pub struct AnnotationGroupInfo {
    pub label: String,
    /// 24-bit member identifiers, packed in order.
    pub members: Vec<u32>,
}

/// Total bytes required to store the group sizes array for `groups`.
pub fn size_annotation_group_sizes(groups: &[AnnotationGroupInfo]) -> u64 {
    GROUP_SIZES_HEADER_SIZE + groups.len() as u64 * group_size_entry::SIZE as u64
}

/// Store the group sizes array at `offset`.
pub fn store_annotation_group_sizes(
    base: &mut [u8],
    offset: u64,
    groups: &[AnnotationGroupInfo],
) -> Result<(), ExtensionError> {
    if offset == NULL_OFFSET {
        return Err(ExtensionError::Invariant(String::from(
            "store_annotation_group_sizes: NULL_OFFSET provided as location",
        )));
    }
    let total = size_annotation_group_sizes(groups);
    if offset + total > base.len() as u64 {
        return Err(ExtensionError::Structural(format!(
            "store_annotation_group_sizes: block {offset}..{} extends beyond the region ({} \
             bytes)",
            offset + total,
            base.len()
        )));
    }
    for group in groups {
        if group.label.len() > u16::MAX as usize {
            return Err(ExtensionError::Invariant(format!(
                "store_annotation_group_sizes: group label \"{}\" exceeds the 16-bit size limit",
                group.label
            )));
        }
        if group.members.len() as u64 > u32::MAX as u64 {
            return Err(ExtensionError::Invariant(String::from(
                "store_annotation_group_sizes: group member count exceeds the 32-bit limit",
            )));
        }
    }

    datablock::store_prologue(base, offset, Recovery::AnnotationGroupSizes);
    let at = offset as usize;
    write_u16_le(
        &mut base[at + group_sizes_field::ENTRY_SIZE..],
        group_size_entry::SIZE as u16,
    );
    write_u32_le(
        &mut base[at + group_sizes_field::ENTRY_NUMBER..],
        groups.len() as u32,
    );

    let mut cursor = at + group_sizes_field::HEADER_V1_0_SIZE;
    for group in groups {
        write_u16_le(
            &mut base[cursor + group_size_entry::LABEL_SIZE..],
            group.label.len() as u16,
        );
        write_u32_le(
            &mut base[cursor + group_size_entry::ENTRIES_NUMBER..],
            group.members.len() as u32,
        );
        cursor += group_size_entry::SIZE;
    }
    Ok(())
}

/// Total bytes required to store the group bytes block for `groups`.
pub fn size_annotation_group_bytes(groups: &[AnnotationGroupInfo]) -> u64 {
    let body: u64 = groups
        .iter()
        .map(|group| group.label.len() as u64 + group.members.len() as u64 * MEMBER_IDENTIFIER_SIZE)
        .sum();
    GROUP_BYTES_HEADER_SIZE + body
}

/// Store the group bytes block at `offset`: each label followed by its
/// packed u24 member identifiers, in the same order the sizes array was
/// written.
pub fn store_annotation_group_bytes(
    base: &mut [u8],
    offset: u64,
    groups: &[AnnotationGroupInfo],
) -> Result<(), ExtensionError> {
    if offset == NULL_OFFSET {
        return Err(ExtensionError::Invariant(String::from(
            "store_annotation_group_bytes: NULL_OFFSET provided as location",
        )));
    }
    let total = size_annotation_group_bytes(groups);
    if offset + total > base.len() as u64 {
        return Err(ExtensionError::Structural(format!(
            "store_annotation_group_bytes: block {offset}..{} extends beyond the region ({} \
             bytes)",
            offset + total,
            base.len()
        )));
    }
    let body = total - GROUP_BYTES_HEADER_SIZE;
    if body > u32::MAX as u64 {
        return Err(ExtensionError::Invariant(String::from(
            "store_annotation_group_bytes: byte array exceeds the 32-bit size limit",
        )));
    }
    for group in groups {
        for &member in &group.members {
            if member > NULL_ID {
                return Err(ExtensionError::Invariant(format!(
                    "store_annotation_group_bytes: member identifier {member:#X} is out of the \
                     24-bit range"
                )));
            }
        }
    }

    datablock::store_prologue(base, offset, Recovery::AnnotationGroupBytes);
    let at = offset as usize;
    write_u32_le(&mut base[at + group_bytes_field::ENTRY_NUMBER..], body as u32);

    let mut cursor = at + group_bytes_field::HEADER_V1_0_SIZE;
    for group in groups {
        base[cursor..cursor + group.label.len()].copy_from_slice(group.label.as_bytes());
        cursor += group.label.len();
        for &member in &group.members {
            write_u24_le(&mut base[cursor..], member);
            cursor += MEMBER_IDENTIFIER_SIZE as usize;
        }
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::EXTENSION_VERSION;

    fn entry_info(identifier: u32, bytes_offset: u64) -> AnnotationEntryInfo {
        AnnotationEntryInfo {
            identifier,
            bytes_offset,
            format: AnnotationFormat::Svg,
            x_location: 10.0,
            y_location: 20.0,
            x_size: 5.0,
            y_size: 5.0,
            width: 128,
            height: 64,
            parent: NULL_ID,
        }
    }

    #[test]
    fn test_entry_layout() {
        assert_eq!(entry::IDENTIFIER, 0);
        assert_eq!(entry::BYTES_OFFSET, 3);
        assert_eq!(entry::FORMAT, 11);
        assert_eq!(entry::X_LOCATION, 12);
        assert_eq!(entry::PARENT, 36);
        assert_eq!(entry::SIZE, 39);
        assert_eq!(ANNOTATIONS_HEADER_SIZE, 32);
        assert_eq!(group_size_entry::SIZE, 6);
    }

    #[test]
    fn test_round_trip_with_groups() {
        let mut buf = vec![0u8; 2048];

        store_annotation_bytes(&mut buf, 64, b"<svg/>").unwrap();
        store_annotation_bytes(&mut buf, 128, b"note text").unwrap();

        let groups = vec![
            AnnotationGroupInfo {
                label: String::from("tumor"),
                members: vec![0x000123, 0x000456],
            },
            AnnotationGroupInfo {
                label: String::from("stroma"),
                members: vec![0x000456],
            },
        ];
        store_annotation_group_sizes(&mut buf, 256, &groups).unwrap();
        store_annotation_group_bytes(&mut buf, 384, &groups).unwrap();

        store_annotation_array(
            &mut buf,
            &AnnotationArrayCreateInfo {
                offset: 512,
                group_sizes_offset: 256,
                group_bytes_offset: 384,
                annotations: vec![entry_info(0x000123, 64), entry_info(0x000456, 128)],
            },
        )
        .unwrap();

        let block = AnnotationsBlock::new(512, 2048, EXTENSION_VERSION);
        let outcome = block.validate_full(&buf[..]);
        assert!(!outcome.is_failure(), "{}", outcome.message);

        let annotations = block.read(&buf[..], None).unwrap();
        assert_eq!(annotations.entries.len(), 2);
        let first = &annotations.entries[&0x000123];
        assert_eq!(first.format, AnnotationFormat::Svg);
        assert_eq!(first.byte_size, 6);
        assert_eq!(first.offset, 64 + ANNOTATION_BYTES_HEADER_SIZE);
        assert_eq!(first.parent, NULL_ID);

        assert_eq!(annotations.groups.len(), 2);
        let tumor = &annotations.groups["tumor"];
        assert_eq!(tumor.member_count, 2);
        // Member identifiers sit right after the label in the bytes body.
        assert_eq!(tumor.offset, 384 + GROUP_BYTES_HEADER_SIZE + 5);
        assert_eq!(read_u24_le(&buf[tumor.offset as usize..]), 0x000123);
        assert_eq!(read_u24_le(&buf[tumor.offset as usize + 3..]), 0x000456);
    }

    #[test]
    fn test_duplicate_identifier_keeps_first() {
        let mut buf = vec![0u8; 1024];
        store_annotation_bytes(&mut buf, 64, b"first").unwrap();
        store_annotation_bytes(&mut buf, 128, b"second").unwrap();

        store_annotation_array(
            &mut buf,
            &AnnotationArrayCreateInfo {
                offset: 256,
                group_sizes_offset: NULL_OFFSET,
                group_bytes_offset: NULL_OFFSET,
                annotations: vec![entry_info(0x000123, 64), entry_info(0x000123, 128)],
            },
        )
        .unwrap();

        let block = AnnotationsBlock::new(256, 1024, EXTENSION_VERSION);
        let outcome = block.validate_full(&buf[..]);
        assert!(!outcome.is_failure());
        assert!(outcome.is_warning());

        let annotations = block.read(&buf[..], None).unwrap();
        assert_eq!(annotations.entries.len(), 1);
        assert_eq!(
            annotations.entries[&0x000123].offset,
            64 + ANNOTATION_BYTES_HEADER_SIZE
        );
    }

    #[test]
    fn test_half_null_group_offsets_fail() {
        let mut buf = vec![0u8; 1024];
        store_annotation_bytes(&mut buf, 64, b"x").unwrap();
        let groups = vec![AnnotationGroupInfo {
            label: String::from("solo"),
            members: vec![1],
        }];
        store_annotation_group_sizes(&mut buf, 128, &groups).unwrap();
        store_annotation_group_bytes(&mut buf, 192, &groups).unwrap();

        // Writer refuses the half-null pair outright.
        let result = store_annotation_array(
            &mut buf,
            &AnnotationArrayCreateInfo {
                offset: 256,
                group_sizes_offset: 128,
                group_bytes_offset: NULL_OFFSET,
                annotations: vec![entry_info(1, 64)],
            },
        );
        assert!(matches!(result, Err(ExtensionError::Invariant(_))));

        // A half-null pair forged on disk fails validation.
        store_annotation_array(
            &mut buf,
            &AnnotationArrayCreateInfo {
                offset: 256,
                group_sizes_offset: 128,
                group_bytes_offset: 192,
                annotations: vec![entry_info(1, 64)],
            },
        )
        .unwrap();
        write_u64_le(&mut buf[256 + field::GROUP_BYTES_OFFSET..], NULL_OFFSET);
        let block = AnnotationsBlock::new(256, 1024, EXTENSION_VERSION);
        assert!(block.validate_full(&buf[..]).is_failure());
    }

    #[test]
    fn test_group_total_mismatch_fails() {
        let mut buf = vec![0u8; 1024];
        store_annotation_bytes(&mut buf, 64, b"x").unwrap();
        let groups = vec![AnnotationGroupInfo {
            label: String::from("pair"),
            members: vec![2, 3],
        }];
        store_annotation_group_sizes(&mut buf, 128, &groups).unwrap();
        store_annotation_group_bytes(&mut buf, 192, &groups).unwrap();
        store_annotation_array(
            &mut buf,
            &AnnotationArrayCreateInfo {
                offset: 256,
                group_sizes_offset: 128,
                group_bytes_offset: 192,
                annotations: vec![entry_info(1, 64)],
            },
        )
        .unwrap();

        // Corrupt the declared group-bytes total.
        let declared = read_u32_le(&buf[192 + group_bytes_field::ENTRY_NUMBER..]);
        write_u32_le(&mut buf[192 + group_bytes_field::ENTRY_NUMBER..], declared + 3);

        let block = AnnotationsBlock::new(256, 1024, EXTENSION_VERSION);
        let outcome = block.validate_full(&buf[..]);
        assert!(outcome.is_failure());
        assert!(outcome.message.contains("ANNOTATION_GROUP_BYTES"));
    }

    #[test]
    fn test_writer_skips_null_identifier_and_counts_stored() {
        let mut buf = vec![0u8; 1024];
        store_annotation_bytes(&mut buf, 64, b"kept").unwrap();

        store_annotation_array(
            &mut buf,
            &AnnotationArrayCreateInfo {
                offset: 256,
                group_sizes_offset: NULL_OFFSET,
                group_bytes_offset: NULL_OFFSET,
                annotations: vec![entry_info(NULL_ID, 64), entry_info(7, 64)],
            },
        )
        .unwrap();

        assert_eq!(read_u32_le(&buf[256 + field::ENTRY_NUMBER..]), 1);
        let block = AnnotationsBlock::new(256, 1024, EXTENSION_VERSION);
        let annotations = block.read(&buf[..], None).unwrap();
        assert_eq!(annotations.entries.len(), 1);
        assert!(annotations.entries.contains_key(&7));
    }

    #[test]
    fn test_writer_clamps_out_of_range_parent() {
        let mut buf = vec![0u8; 1024];
        store_annotation_bytes(&mut buf, 64, b"x").unwrap();

        let mut info = entry_info(5, 64);
        info.parent = NULL_ID + 10;
        store_annotation_array(
            &mut buf,
            &AnnotationArrayCreateInfo {
                offset: 256,
                group_sizes_offset: NULL_OFFSET,
                group_bytes_offset: NULL_OFFSET,
                annotations: vec![info],
            },
        )
        .unwrap();

        let block = AnnotationsBlock::new(256, 1024, EXTENSION_VERSION);
        let annotations = block.read(&buf[..], None).unwrap();
        assert_eq!(annotations.entries[&5].parent, NULL_ID);
    }
}
