//! The in-memory abstraction of an Iris file, and the top-level read
//! pipeline that produces it.
//!
//! Abstraction lifts block parameters, never block payloads: an associated
//! image's dimensions, encoding, and byte location are read, but the
//! compressed bytes stay on disk (or behind the remote backend) and are
//! addressed by `{offset, size}` handles. This keeps the abstraction cheap
//! enough to build eagerly for every open slide.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::{ExtensionError, Outcome};
use crate::format::header::FileHeaderBlock;
use crate::format::{
    AnnotationFormat, AttributeFormat, ImageEncoding, PixelFormat, TileEncoding, NULL_OFFSET,
};
use crate::io::region::ByteRegion;

// =============================================================================
// Abstraction types
// =============================================================================

/// Extracted file header information.
///
/// The magic number and recovery tag are consumed during validation and not
/// surfaced here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    /// Stored file size in bytes; validated against the backing region size.
    pub file_size: u64,
    /// Packed extension version (`major << 16 | minor`) the file was written
    /// with.
    pub extension_version: u32,
    /// Monotonic revision number incremented by in-place updates.
    pub revision: u32,
}

/// Byte location of one compressed tile. `offset == NULL_OFFSET` with a zero
/// size denotes a sparse (missing) tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileEntry {
    pub offset: u64,
    pub size: u32,
}

impl TileEntry {
    /// True if this slot holds no tile data.
    #[inline]
    pub fn is_sparse(&self) -> bool {
        self.offset == NULL_OFFSET
    }
}

/// Tile grid dimensions and scale of one pyramid layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerExtent {
    /// Number of 256-pixel tiles in the horizontal direction.
    pub x_tiles: u32,
    /// Number of 256-pixel tiles in the vertical direction.
    pub y_tiles: u32,
    /// Resolution scale of this layer; strictly increasing across layers.
    pub scale: f32,
    /// Derived on read: `max_scale / scale`, so the highest-resolution layer
    /// reads 1.0.
    pub downsample: f32,
}

impl LayerExtent {
    /// Total tile slots in this layer.
    #[inline]
    pub fn tiles(&self) -> u64 {
        self.x_tiles as u64 * self.y_tiles as u64
    }
}

/// Pixel extent of the base view plus the per-layer tile grids.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SlideExtent {
    pub width: u32,
    pub height: u32,
    pub layers: Vec<LayerExtent>,
}

/// Everything needed to locate and decode the tile pyramid.
///
/// `layers[layer][tile]` holds the byte location of each compressed tile,
/// in row-major order within a layer, matching the shape declared by the
/// layer extents.
#[derive(Debug, Clone, PartialEq)]
pub struct TileTable {
    pub encoding: TileEncoding,
    pub format: PixelFormat,
    pub extent: SlideExtent,
    pub layers: Vec<Vec<TileEntry>>,
}

/// Abstraction of one associated (non-tile) image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssociatedImage {
    /// Absolute offset of the compressed image bytes.
    pub offset: u64,
    /// Length of the compressed byte stream.
    pub byte_size: u32,
    pub width: u32,
    pub height: u32,
    pub encoding: ImageEncoding,
    pub format: PixelFormat,
    /// Clockwise display rotation in degrees, stored modulo 360.
    pub orientation: u16,
}

/// Label-to-image dictionary for associated images.
pub type AssociatedImages = HashMap<String, AssociatedImage>;

/// Abstraction of one on-slide annotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Annotation {
    /// Absolute offset of the annotation byte stream.
    pub offset: u64,
    /// Length of the annotation byte stream.
    pub byte_size: u32,
    pub format: AnnotationFormat,
    pub x_location: f32,
    pub y_location: f32,
    pub x_size: f32,
    pub y_size: f32,
    pub width: u32,
    pub height: u32,
    /// Identifier of the parent annotation, or `NULL_ID`.
    pub parent: u32,
}

/// A named annotation group: the in-file location of its packed u24 member
/// identifiers and their count. The identifiers live in place in the group
/// bytes block and are not copied into the abstraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnotationGroup {
    pub offset: u64,
    pub member_count: u32,
}

impl AnnotationGroup {
    /// Byte length of the packed member identifier array.
    #[inline]
    pub fn byte_size(&self) -> u64 {
        self.member_count as u64 * 3
    }
}

/// Annotations keyed by 24-bit identifier, plus named groups.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Annotations {
    pub entries: HashMap<u32, Annotation>,
    pub groups: HashMap<String, AnnotationGroup>,
}

/// Codec version triple recorded at encode time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CodecVersion {
    pub major: u16,
    pub minor: u16,
    pub build: u16,
}

/// Attribute key/value store.
#[derive(Debug, Clone, PartialEq)]
pub struct Attributes {
    pub format: AttributeFormat,
    /// Format version; the DICOM convention requires a nonzero version year.
    pub version: u16,
    /// Keys are UTF-8 comparable strings; values are opaque byte strings.
    /// Ordered so the sizes and bytes writers serialize entries identically.
    pub entries: BTreeMap<String, Vec<u8>>,
}

impl Default for Attributes {
    fn default() -> Self {
        Attributes {
            format: AttributeFormat::I2s,
            version: 0,
            entries: BTreeMap::new(),
        }
    }
}

/// Clinical and technical metadata lifted from the metadata subtree.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Metadata {
    pub codec: CodecVersion,
    /// Physical microns per pixel of the highest-resolution layer; zero when
    /// unavailable.
    pub microns_per_pixel: f32,
    /// Optical magnification coefficient; zero when unavailable.
    pub magnification: f32,
    pub attributes: Attributes,
    /// Titles of the associated images present in the file.
    pub associated_images: BTreeSet<String>,
    /// Identifiers of the annotations present in the file.
    pub annotations: BTreeSet<u32>,
    /// ICC color profile bytes, when encoded.
    pub icc_profile: Option<Vec<u8>>,
}

/// Low-overhead in-memory abstraction of the whole file structure.
#[derive(Debug, Clone, PartialEq)]
pub struct File {
    pub header: Header,
    pub tile_table: TileTable,
    pub images: AssociatedImages,
    pub annotations: Annotations,
    pub metadata: Metadata,
}

// =============================================================================
// Entry points
// =============================================================================

/// Quick check that the region starts with an Iris file header.
///
/// Examines the magic number and the header recovery tag only; this does NOT
/// validate the file structure.
pub fn is_iris_file<R: ByteRegion + ?Sized>(region: &R) -> bool {
    FileHeaderBlock::new(region.len()).matches_magic(region)
}

/// Deep structural validation of the block tree.
///
/// Walks the file header, the tile table subtree, and the metadata subtree,
/// checking every prologue, enumerator, bound, and cross-block total. Returns
/// the merged outcome; warnings (such as a newer minor version) ride along
/// with a successful result.
pub fn validate_file_structure<R: ByteRegion + ?Sized>(region: &R) -> Outcome {
    let header = FileHeaderBlock::new(region.len());

    let mut outcome = header.validate_full(region);
    if outcome.is_failure() {
        return outcome;
    }

    let tile_table = match header.tile_table(region) {
        Ok(block) => block,
        Err(e) => return Outcome::validation_failure(e.to_string()),
    };
    let result = tile_table.validate_full(region);
    if result.is_failure() {
        return result;
    }
    outcome = outcome.merge(result);

    let metadata = match header.metadata(region) {
        Ok(block) => block,
        Err(e) => return Outcome::validation_failure(e.to_string()),
    };
    let result = metadata.validate_full(region);
    if result.is_failure() {
        return result;
    }
    outcome.merge(result)
}

/// Build the in-memory [`File`] abstraction. This does NOT validate; run
/// [`validate_file_structure`] first when the file's provenance is unknown.
pub fn abstract_file_structure<R: ByteRegion + ?Sized>(
    region: &R,
) -> Result<File, ExtensionError> {
    let header_block = FileHeaderBlock::new(region.len());
    let header = header_block.read(region)?;

    let tile_table_block = header_block.tile_table(region)?;
    let tile_table = tile_table_block.read(region)?;

    let metadata_block = header_block.metadata(region)?;
    let mut metadata = metadata_block.read(region)?;

    if metadata_block.has_attributes(region) {
        let attributes = metadata_block.attributes(region)?;
        metadata.attributes = attributes.read(region)?;
    }

    let mut images = AssociatedImages::new();
    if metadata_block.has_image_array(region) {
        let array = metadata_block.image_array(region)?;
        images = array.read(region, None)?;
        for title in images.keys() {
            metadata.associated_images.insert(title.clone());
        }
    }

    if metadata_block.has_color_profile(region) {
        let profile = metadata_block.color_profile(region)?;
        metadata.icc_profile = Some(profile.read(region)?);
    }

    let mut annotations = Annotations::default();
    if metadata_block.has_annotations(region) {
        let array = metadata_block.annotations(region)?;
        annotations = array.read(region, None)?;
        for identifier in annotations.entries.keys() {
            metadata.annotations.insert(*identifier);
        }
    }

    Ok(File {
        header,
        tile_table,
        images,
        annotations,
        metadata,
    })
}

// =============================================================================
// Tests
// =============================================================================
