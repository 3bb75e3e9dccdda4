//! On-disk structure of the Iris File Extension.
//!
//! An Iris file is a graph of typed data blocks linked by absolute byte
//! offsets, rooted at the file header at offset zero. Each block kind has a
//! reader (a small copyable descriptor plus methods over a [`crate::io::ByteRegion`])
//! and a writer that stores the block at a pre-computed offset after
//! validating its peers.
//!
//! # Enumerators
//!
//! Several fields are u8 enumerators with a reserved undefined value of zero.
//! Read-time validation maps the stored byte to an enumerator of the current
//! version; the undefined value is a distinct error state, not silently
//! accepted. Each acceptance check keeps a guarded tail so additive values
//! introduced by a later minor version can be admitted under a version gate.

pub mod abstraction;
pub mod annotations;
pub mod attributes;
pub mod datablock;
pub mod file_map;
pub mod header;
pub mod icc;
pub mod images;
pub mod layer_extents;
pub mod metadata;
pub mod tile_offsets;
pub mod tile_table;

pub use abstraction::{
    abstract_file_structure, is_iris_file, validate_file_structure, Annotation, AnnotationGroup,
    Annotations, AssociatedImage, Attributes, CodecVersion, File, Header, LayerExtent, Metadata,
    SlideExtent, TileEntry, TileTable,
};
pub use datablock::{DataBlock, Recovery};
pub use file_map::{generate_file_map, BlockKind, FileMap, FileMapEntry};

/// Magic number at offset zero: ASCII `Iris`.
pub const MAGIC_BYTES: u32 = 0x4972_6973;

/// Extension major version implemented by this reader.
pub const EXTENSION_MAJOR: u16 = 1;

/// Extension minor version implemented by this reader.
pub const EXTENSION_MINOR: u16 = 0;

/// Packed extension version: `major << 16 | minor`.
pub const EXTENSION_VERSION: u32 = (EXTENSION_MAJOR as u32) << 16 | EXTENSION_MINOR as u32;

/// Packed version constant for the 1.0 baseline; fields stored past this
/// version are read only behind a version gate.
pub const EXTENSION_1_0: u32 = 0x0001_0000;

/// Sentinel for an absent 64-bit offset.
pub const NULL_OFFSET: u64 = u64::MAX;

/// Sentinel for a sparse tile in the 40-bit tile offset field.
pub const NULL_TILE: u64 = (1 << 40) - 1;

/// Sentinel for an absent 24-bit annotation identifier.
pub const NULL_ID: u32 = (1 << 24) - 1;

// =============================================================================
// TileEncoding
// =============================================================================

/// Compression codec for slide tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TileEncoding {
    Iris = 1,
    Jpeg = 2,
    Avif = 3,
}

impl TileEncoding {
    /// Map a stored byte to an encoding, if defined in any version.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(TileEncoding::Iris),
            2 => Some(TileEncoding::Jpeg),
            3 => Some(TileEncoding::Avif),
            _ => None,
        }
    }

    /// True if `value` is an accepted enumerator for `version`.
    pub fn accepted(value: u8, version: u32) -> bool {
        if Self::from_u8(value).is_some() {
            return true;
        }
        if version <= EXTENSION_1_0 {
            return false;
        }
        // v2+ encodings are admitted here once defined.
        false
    }

    pub fn name(self) -> &'static str {
        match self {
            TileEncoding::Iris => "IRIS",
            TileEncoding::Jpeg => "JPEG",
            TileEncoding::Avif => "AVIF",
        }
    }
}

// =============================================================================
// PixelFormat
// =============================================================================

/// Pixel channel ordering and width of the uncompressed source data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PixelFormat {
    Bgr8 = 1,
    Rgb8 = 2,
    Bgra8 = 3,
    Rgba8 = 4,
}

impl PixelFormat {
    /// Map a stored byte to a format, if defined in any version.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(PixelFormat::Bgr8),
            2 => Some(PixelFormat::Rgb8),
            3 => Some(PixelFormat::Bgra8),
            4 => Some(PixelFormat::Rgba8),
            _ => None,
        }
    }

    /// True if `value` is an accepted enumerator for `version`.
    pub fn accepted(value: u8, version: u32) -> bool {
        if Self::from_u8(value).is_some() {
            return true;
        }
        if version <= EXTENSION_1_0 {
            return false;
        }
        // v2+ formats are admitted here once defined.
        false
    }

    pub fn name(self) -> &'static str {
        match self {
            PixelFormat::Bgr8 => "B8G8R8",
            PixelFormat::Rgb8 => "R8G8B8",
            PixelFormat::Bgra8 => "B8G8R8A8",
            PixelFormat::Rgba8 => "R8G8B8A8",
        }
    }
}

// =============================================================================
// ImageEncoding
// =============================================================================

/// Compression codec for associated (non-tile) images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ImageEncoding {
    Png = 1,
    Jpeg = 2,
    Avif = 3,
}

impl ImageEncoding {
    /// Map a stored byte to an encoding, if defined in any version.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(ImageEncoding::Png),
            2 => Some(ImageEncoding::Jpeg),
            3 => Some(ImageEncoding::Avif),
            _ => None,
        }
    }

    /// True if `value` is an accepted enumerator for `version`.
    pub fn accepted(value: u8, version: u32) -> bool {
        if Self::from_u8(value).is_some() {
            return true;
        }
        if version <= EXTENSION_1_0 {
            return false;
        }
        // v2+ encodings are admitted here once defined.
        false
    }

    pub fn name(self) -> &'static str {
        match self {
            ImageEncoding::Png => "PNG",
            ImageEncoding::Jpeg => "JPEG",
            ImageEncoding::Avif => "AVIF",
        }
    }
}

// =============================================================================
// AnnotationFormat
// =============================================================================

/// Decoding format of an annotation byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AnnotationFormat {
    Png = 1,
    Jpeg = 2,
    Svg = 3,
    Text = 4,
}

impl AnnotationFormat {
    /// Map a stored byte to a format, if defined in any version.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(AnnotationFormat::Png),
            2 => Some(AnnotationFormat::Jpeg),
            3 => Some(AnnotationFormat::Svg),
            4 => Some(AnnotationFormat::Text),
            _ => None,
        }
    }

    /// True if `value` is an accepted enumerator for `version`.
    pub fn accepted(value: u8, version: u32) -> bool {
        if Self::from_u8(value).is_some() {
            return true;
        }
        if version <= EXTENSION_1_0 {
            return false;
        }
        // v2+ formats are admitted here once defined.
        false
    }

    pub fn name(self) -> &'static str {
        match self {
            AnnotationFormat::Png => "PNG",
            AnnotationFormat::Jpeg => "JPEG",
            AnnotationFormat::Svg => "SVG",
            AnnotationFormat::Text => "TEXT",
        }
    }
}

// =============================================================================
// AttributeFormat
// =============================================================================

/// Convention by which the attribute key/value store was encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AttributeFormat {
    /// Free-text key/value attributes.
    I2s = 1,
    /// DICOM PS3.3 tag conventions; requires a nonzero version year.
    Dicom = 2,
}

impl AttributeFormat {
    /// Map a stored byte to a format, if defined in any version.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(AttributeFormat::I2s),
            2 => Some(AttributeFormat::Dicom),
            _ => None,
        }
    }

    /// True if `value` is an accepted enumerator for `version`.
    pub fn accepted(value: u8, version: u32) -> bool {
        if Self::from_u8(value).is_some() {
            return true;
        }
        if version <= EXTENSION_1_0 {
            return false;
        }
        // v2+ formats are admitted here once defined.
        false
    }

    pub fn name(self) -> &'static str {
        match self {
            AttributeFormat::I2s => "I2S",
            AttributeFormat::Dicom => "DICOM",
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_is_ascii_iris() {
        assert_eq!(&MAGIC_BYTES.to_be_bytes(), b"Iris");
    }

    #[test]
    fn test_null_sentinels() {
        assert_eq!(NULL_OFFSET, u64::MAX);
        assert_eq!(NULL_TILE, 1_099_511_627_775);
        assert_eq!(NULL_ID, 16_777_215);
    }

    #[test]
    fn test_packed_version() {
        assert_eq!(EXTENSION_VERSION, 0x0001_0000);
        assert_eq!(EXTENSION_VERSION, EXTENSION_1_0);
    }

    #[test]
    fn test_undefined_enumerators_rejected() {
        assert!(!TileEncoding::accepted(0, EXTENSION_VERSION));
        assert!(!PixelFormat::accepted(0, EXTENSION_VERSION));
        assert!(!ImageEncoding::accepted(0, EXTENSION_VERSION));
        assert!(!AnnotationFormat::accepted(0, EXTENSION_VERSION));
        assert!(!AttributeFormat::accepted(0, EXTENSION_VERSION));
    }

    #[test]
    fn test_defined_enumerators_accepted() {
        for value in 1..=3u8 {
            assert!(TileEncoding::accepted(value, EXTENSION_VERSION));
            assert!(ImageEncoding::accepted(value, EXTENSION_VERSION));
        }
        for value in 1..=4u8 {
            assert!(PixelFormat::accepted(value, EXTENSION_VERSION));
            assert!(AnnotationFormat::accepted(value, EXTENSION_VERSION));
        }
        assert!(AttributeFormat::accepted(1, EXTENSION_VERSION));
        assert!(AttributeFormat::accepted(2, EXTENSION_VERSION));
        assert!(!AttributeFormat::accepted(3, EXTENSION_VERSION));
    }

    #[test]
    fn test_unknown_values_stay_rejected_at_1_0() {
        assert!(!TileEncoding::accepted(4, EXTENSION_1_0));
        assert!(!PixelFormat::accepted(5, EXTENSION_1_0));
        assert!(!AnnotationFormat::accepted(9, EXTENSION_1_0));
    }
}
