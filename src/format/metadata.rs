//! The metadata block: root of the clinical/ancillary metadata subtree.
//!
//! All four child offsets are optional; an absent child stores `NULL_OFFSET`.
//! The two floating-point calibration fields may legitimately be zero when
//! unknown, which the writer flags as a warning rather than refusing.

use tracing::warn;

use crate::error::{ExtensionError, Outcome};
use crate::format::annotations::AnnotationsBlock;
use crate::format::attributes::AttributesBlock;
use crate::format::abstraction::{CodecVersion, Metadata};
use crate::format::datablock::{self, DataBlock, Recovery};
use crate::format::icc::IccProfileBlock;
use crate::format::images::ImageArrayBlock;
use crate::format::{EXTENSION_1_0, NULL_OFFSET};
use crate::io::codec::{read_f32_le, read_u16_le, read_u64_le, write_f32_le, write_u16_le, write_u64_le};
use crate::io::region::ByteRegion;

/// Metadata field layout.
pub(crate) mod field {
    use crate::format::datablock::prologue;

    pub const CODEC_MAJOR: usize = prologue::SIZE;
    pub const CODEC_MAJOR_S: usize = 2;
    pub const CODEC_MINOR: usize = CODEC_MAJOR + CODEC_MAJOR_S;
    pub const CODEC_MINOR_S: usize = 2;
    pub const CODEC_BUILD: usize = CODEC_MINOR + CODEC_MINOR_S;
    pub const CODEC_BUILD_S: usize = 2;
    pub const ATTRIBUTES_OFFSET: usize = CODEC_BUILD + CODEC_BUILD_S;
    pub const ATTRIBUTES_OFFSET_S: usize = 8;
    pub const IMAGES_OFFSET: usize = ATTRIBUTES_OFFSET + ATTRIBUTES_OFFSET_S;
    pub const IMAGES_OFFSET_S: usize = 8;
    pub const ICC_COLOR_OFFSET: usize = IMAGES_OFFSET + IMAGES_OFFSET_S;
    pub const ICC_COLOR_OFFSET_S: usize = 8;
    pub const ANNOTATIONS_OFFSET: usize = ICC_COLOR_OFFSET + ICC_COLOR_OFFSET_S;
    pub const ANNOTATIONS_OFFSET_S: usize = 8;
    pub const MICRONS_PIXEL: usize = ANNOTATIONS_OFFSET + ANNOTATIONS_OFFSET_S;
    pub const MICRONS_PIXEL_S: usize = 4;
    pub const MAGNIFICATION: usize = MICRONS_PIXEL + MICRONS_PIXEL_S;
    pub const MAGNIFICATION_S: usize = 4;
    pub const HEADER_V1_0_SIZE: usize = MAGNIFICATION + MAGNIFICATION_S;
    // Version 1.0 ends here; later fields are added behind the version gate.
}

/// Byte length of the version 1.0 metadata block.
pub const METADATA_SIZE: u64 = field::HEADER_V1_0_SIZE as u64;

// =============================================================================
// MetadataBlock
// =============================================================================

/// Reader for the metadata block.
#[derive(Debug, Clone, Copy)]
pub struct MetadataBlock {
    pub(crate) block: DataBlock,
}

impl MetadataBlock {
    pub fn new(offset: u64, file_size: u64, version: u32) -> Self {
        MetadataBlock {
            block: DataBlock::new(offset, file_size, version),
        }
    }

    #[inline]
    pub fn offset(&self) -> u64 {
        self.block.offset
    }

    /// Block size for this file's version. Fixed-length in version 1.0.
    pub fn size(&self) -> u64 {
        let size = METADATA_SIZE;
        if self.block.version > EXTENSION_1_0 {
            // v2+ metadata fields extend the size here once defined.
        }
        size
    }

    /// Validate the block prologue.
    pub fn validate_offset<R: ByteRegion + ?Sized>(&self, region: &R) -> Outcome {
        self.block
            .validate_offset(region, "METADATA", Recovery::Metadata)
    }

    /// Validate the prologue and fully validate each present child subtree.
    pub fn validate_full<R: ByteRegion + ?Sized>(&self, region: &R) -> Outcome {
        let mut outcome = self.validate_offset(region);
        if outcome.is_failure() {
            return outcome;
        }

        if self.has_attributes(region) {
            let attributes = AttributesBlock::new(
                self.stored_offset(region, field::ATTRIBUTES_OFFSET),
                self.block.file_size,
                self.block.version,
            );
            let result = attributes.validate_full(region);
            if result.is_failure() {
                return result;
            }
            outcome = outcome.merge(result);
        }

        if self.has_image_array(region) {
            let images = ImageArrayBlock::new(
                self.stored_offset(region, field::IMAGES_OFFSET),
                self.block.file_size,
                self.block.version,
            );
            let result = images.validate_full(region);
            if result.is_failure() {
                return result;
            }
            outcome = outcome.merge(result);
        }

        if self.has_color_profile(region) {
            let profile = IccProfileBlock::new(
                self.stored_offset(region, field::ICC_COLOR_OFFSET),
                self.block.file_size,
                self.block.version,
            );
            let result = profile.validate_full(region);
            if result.is_failure() {
                return result;
            }
            outcome = outcome.merge(result);
        }

        if self.has_annotations(region) {
            let annotations = AnnotationsBlock::new(
                self.stored_offset(region, field::ANNOTATIONS_OFFSET),
                self.block.file_size,
                self.block.version,
            );
            let result = annotations.validate_full(region);
            if result.is_failure() {
                return result;
            }
            outcome = outcome.merge(result);
        }

        if self.block.version > EXTENSION_1_0 {
            // v2+ metadata validations are added here once defined.
        }

        outcome
    }

    /// Read the metadata scalars. Child subtrees are read through their own
    /// getters so the caller controls which subtrees to materialize.
    pub fn read<R: ByteRegion + ?Sized>(&self, region: &R) -> Result<Metadata, ExtensionError> {
        let result = self.validate_offset(region);
        if result.is_failure() {
            return Err(ExtensionError::Validation(result.message));
        }

        let bytes = self.header_bytes(region)?;
        let metadata = Metadata {
            codec: CodecVersion {
                major: read_u16_le(&bytes[field::CODEC_MAJOR..]),
                minor: read_u16_le(&bytes[field::CODEC_MINOR..]),
                build: read_u16_le(&bytes[field::CODEC_BUILD..]),
            },
            microns_per_pixel: read_f32_le(&bytes[field::MICRONS_PIXEL..]),
            magnification: read_f32_le(&bytes[field::MAGNIFICATION..]),
            ..Metadata::default()
        };

        if self.block.version > EXTENSION_1_0 {
            // v2+ metadata fields are read here once defined.
        }

        Ok(metadata)
    }

    /// True if the attributes offset is non-null and in range.
    pub fn has_attributes<R: ByteRegion + ?Sized>(&self, region: &R) -> bool {
        self.child_present(region, field::ATTRIBUTES_OFFSET)
    }

    /// True if the associated image array offset is non-null and in range.
    pub fn has_image_array<R: ByteRegion + ?Sized>(&self, region: &R) -> bool {
        self.child_present(region, field::IMAGES_OFFSET)
    }

    /// True if the ICC profile offset is non-null and in range.
    pub fn has_color_profile<R: ByteRegion + ?Sized>(&self, region: &R) -> bool {
        self.child_present(region, field::ICC_COLOR_OFFSET)
    }

    /// True if the annotations offset is non-null and in range.
    pub fn has_annotations<R: ByteRegion + ?Sized>(&self, region: &R) -> bool {
        self.child_present(region, field::ANNOTATIONS_OFFSET)
    }

    /// Construct the attributes reader at the stored offset.
    pub fn attributes<R: ByteRegion + ?Sized>(
        &self,
        region: &R,
    ) -> Result<AttributesBlock, ExtensionError> {
        let block = AttributesBlock::new(
            self.stored_offset(region, field::ATTRIBUTES_OFFSET),
            self.block.file_size,
            self.block.version,
        );
        self.check_child(block.validate_offset(region), "attributes data-block")?;
        Ok(block)
    }

    /// Construct the associated image array reader at the stored offset.
    pub fn image_array<R: ByteRegion + ?Sized>(
        &self,
        region: &R,
    ) -> Result<ImageArrayBlock, ExtensionError> {
        let block = ImageArrayBlock::new(
            self.stored_offset(region, field::IMAGES_OFFSET),
            self.block.file_size,
            self.block.version,
        );
        self.check_child(block.validate_offset(region), "associated images array")?;
        Ok(block)
    }

    /// Construct the ICC profile reader at the stored offset.
    pub fn color_profile<R: ByteRegion + ?Sized>(
        &self,
        region: &R,
    ) -> Result<IccProfileBlock, ExtensionError> {
        let block = IccProfileBlock::new(
            self.stored_offset(region, field::ICC_COLOR_OFFSET),
            self.block.file_size,
            self.block.version,
        );
        self.check_child(block.validate_offset(region), "ICC profile buffer")?;
        Ok(block)
    }

    /// Construct the annotations reader at the stored offset.
    pub fn annotations<R: ByteRegion + ?Sized>(
        &self,
        region: &R,
    ) -> Result<AnnotationsBlock, ExtensionError> {
        let block = AnnotationsBlock::new(
            self.stored_offset(region, field::ANNOTATIONS_OFFSET),
            self.block.file_size,
            self.block.version,
        );
        self.check_child(block.validate_offset(region), "annotations array")?;
        Ok(block)
    }

    /// Stored child offset at `field_offset` (one of the four child slots).
    pub(crate) fn stored_offset<R: ByteRegion + ?Sized>(
        &self,
        region: &R,
        field_offset: usize,
    ) -> u64 {
        match region.slice(self.block.offset + field_offset as u64, 8) {
            Ok(bytes) => read_u64_le(bytes),
            Err(_) => NULL_OFFSET,
        }
    }

    fn child_present<R: ByteRegion + ?Sized>(&self, region: &R, field_offset: usize) -> bool {
        let offset = self.stored_offset(region, field_offset);
        offset != NULL_OFFSET && offset < self.block.file_size
    }

    fn check_child(&self, result: Outcome, what: &str) -> Result<(), ExtensionError> {
        if result.is_failure() {
            return Err(ExtensionError::Validation(format!(
                "failed to retrieve {what}: {}",
                result.message
            )));
        }
        if result.is_warning() {
            warn!("{what} retrieval: {}", result.message);
        }
        Ok(())
    }

    fn header_bytes<'r, R: ByteRegion + ?Sized>(
        &self,
        region: &'r R,
    ) -> Result<&'r [u8], ExtensionError> {
        region
            .slice(self.block.offset, self.size())
            .map_err(|e| ExtensionError::Structural(format!("METADATA unreadable: {e}")))
    }
}

// =============================================================================
// Writer
// =============================================================================

/// Parameters for storing a metadata block.
#[derive(Debug, Clone, Copy)]
pub struct MetadataCreateInfo {
    /// Offset at which the metadata block itself is stored.
    pub metadata_offset: u64,
    pub codec_version: CodecVersion,
    /// Offset of an already-stored attributes block, or `NULL_OFFSET`.
    pub attributes: u64,
    /// Offset of an already-stored image array block, or `NULL_OFFSET`.
    pub images: u64,
    /// Offset of an already-stored ICC profile block, or `NULL_OFFSET`.
    pub icc_profile: u64,
    /// Offset of an already-stored annotations block, or `NULL_OFFSET`.
    pub annotations: u64,
    pub microns_per_pixel: f32,
    pub magnification: f32,
}

impl Default for MetadataCreateInfo {
    fn default() -> Self {
        MetadataCreateInfo {
            metadata_offset: NULL_OFFSET,
            codec_version: CodecVersion::default(),
            attributes: NULL_OFFSET,
            images: NULL_OFFSET,
            icc_profile: NULL_OFFSET,
            annotations: NULL_OFFSET,
            microns_per_pixel: 0.0,
            magnification: 0.0,
        }
    }
}

/// Store a metadata block at `info.metadata_offset`.
///
/// Each non-null child offset must name an already-stored block; its
/// prologue is validated before any byte is written.
pub fn store_metadata(base: &mut [u8], info: &MetadataCreateInfo) -> Result<(), ExtensionError> {
    if info.metadata_offset == NULL_OFFSET {
        return Err(ExtensionError::Invariant(String::from(
            "store_metadata: invalid (NULL_OFFSET) metadata_offset in MetadataCreateInfo",
        )));
    }
    let end = info.metadata_offset + METADATA_SIZE;
    if end > base.len() as u64 {
        return Err(ExtensionError::Structural(format!(
            "store_metadata: block {}..{end} extends beyond the region ({} bytes)",
            info.metadata_offset,
            base.len()
        )));
    }

    let file_size = base.len() as u64;
    let version = crate::format::EXTENSION_VERSION;

    if info.attributes != NULL_OFFSET {
        let block = AttributesBlock::new(info.attributes, file_size, version);
        let result = block.validate_offset(&*base);
        if result.is_failure() {
            return Err(ExtensionError::Validation(format!(
                "store_metadata: invalid attributes header offset: {}",
                result.message
            )));
        }
    }
    if info.images != NULL_OFFSET {
        let block = ImageArrayBlock::new(info.images, file_size, version);
        let result = block.validate_offset(&*base);
        if result.is_failure() {
            return Err(ExtensionError::Validation(format!(
                "store_metadata: invalid ancillary images array offset: {}",
                result.message
            )));
        }
    }
    if info.icc_profile != NULL_OFFSET {
        let block = IccProfileBlock::new(info.icc_profile, file_size, version);
        let result = block.validate_offset(&*base);
        if result.is_failure() {
            return Err(ExtensionError::Validation(format!(
                "store_metadata: invalid ICC profile byte array offset: {}",
                result.message
            )));
        }
    }
    if info.annotations != NULL_OFFSET {
        let block = AnnotationsBlock::new(info.annotations, file_size, version);
        let result = block.validate_offset(&*base);
        if result.is_failure() {
            return Err(ExtensionError::Validation(format!(
                "store_metadata: invalid slide annotations array offset: {}",
                result.message
            )));
        }
    }
    if info.microns_per_pixel == 0.0 {
        warn!(
            "store_metadata: microns_per_pixel is zero; encoding the physical pixel pitch is \
             recommended when available"
        );
    }
    if info.magnification == 0.0 {
        warn!(
            "store_metadata: magnification is zero; encoding the optical magnification is \
             recommended when available"
        );
    }

    let at = info.metadata_offset as usize;
    datablock::store_prologue(base, info.metadata_offset, Recovery::Metadata);
    write_u16_le(&mut base[at + field::CODEC_MAJOR..], info.codec_version.major);
    write_u16_le(&mut base[at + field::CODEC_MINOR..], info.codec_version.minor);
    write_u16_le(&mut base[at + field::CODEC_BUILD..], info.codec_version.build);
    write_u64_le(&mut base[at + field::ATTRIBUTES_OFFSET..], info.attributes);
    write_u64_le(&mut base[at + field::IMAGES_OFFSET..], info.images);
    write_u64_le(&mut base[at + field::ICC_COLOR_OFFSET..], info.icc_profile);
    write_u64_le(&mut base[at + field::ANNOTATIONS_OFFSET..], info.annotations);
    write_f32_le(&mut base[at + field::MICRONS_PIXEL..], info.microns_per_pixel);
    write_f32_le(&mut base[at + field::MAGNIFICATION..], info.magnification);
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::EXTENSION_VERSION;

    #[test]
    fn test_field_layout() {
        assert_eq!(field::CODEC_MAJOR, 10);
        assert_eq!(field::CODEC_MINOR, 12);
        assert_eq!(field::CODEC_BUILD, 14);
        assert_eq!(field::ATTRIBUTES_OFFSET, 16);
        assert_eq!(field::IMAGES_OFFSET, 24);
        assert_eq!(field::ICC_COLOR_OFFSET, 32);
        assert_eq!(field::ANNOTATIONS_OFFSET, 40);
        assert_eq!(field::MICRONS_PIXEL, 48);
        assert_eq!(field::MAGNIFICATION, 52);
        assert_eq!(METADATA_SIZE, 56);
    }

    #[test]
    fn test_store_and_read_scalars() {
        let mut buf = vec![0u8; 256];
        let info = MetadataCreateInfo {
            metadata_offset: 64,
            codec_version: CodecVersion {
                major: 2025,
                minor: 1,
                build: 3,
            },
            microns_per_pixel: 0.25,
            magnification: 40.0,
            ..Default::default()
        };
        store_metadata(&mut buf, &info).unwrap();

        let block = MetadataBlock::new(64, 256, EXTENSION_VERSION);
        assert!(!block.validate_offset(&buf[..]).is_failure());
        assert!(!block.validate_full(&buf[..]).is_failure());

        let metadata = block.read(&buf[..]).unwrap();
        assert_eq!(metadata.codec.major, 2025);
        assert_eq!(metadata.codec.minor, 1);
        assert_eq!(metadata.codec.build, 3);
        assert_eq!(metadata.microns_per_pixel, 0.25);
        assert_eq!(metadata.magnification, 40.0);

        // All children were stored null.
        assert!(!block.has_attributes(&buf[..]));
        assert!(!block.has_image_array(&buf[..]));
        assert!(!block.has_color_profile(&buf[..]));
        assert!(!block.has_annotations(&buf[..]));
    }

    #[test]
    fn test_zero_calibration_is_not_an_error() {
        let mut buf = vec![0u8; 256];
        let info = MetadataCreateInfo {
            metadata_offset: 0,
            ..Default::default()
        };
        store_metadata(&mut buf, &info).unwrap();

        let block = MetadataBlock::new(0, 256, EXTENSION_VERSION);
        let metadata = block.read(&buf[..]).unwrap();
        assert_eq!(metadata.microns_per_pixel, 0.0);
        assert_eq!(metadata.magnification, 0.0);
    }

    #[test]
    fn test_store_rejects_dangling_child() {
        let mut buf = vec![0u8; 256];
        let info = MetadataCreateInfo {
            metadata_offset: 0,
            attributes: 128, // nothing stored there
            ..Default::default()
        };
        assert!(matches!(
            store_metadata(&mut buf, &info),
            Err(ExtensionError::Validation(_))
        ));
    }
}
