//! Iris File Extension: the serialization and validation engine for the
//! `.iris` whole-slide image container.
//!
//! An Iris file is a graph of typed data blocks linked by absolute byte
//! offsets: a file header at offset zero, a tile table describing the
//! compressed tile pyramid, and a metadata subtree carrying attributes,
//! associated images, an ICC color profile, and annotations. Every non-root
//! block opens with a self-referential prologue (its own offset plus a
//! per-kind recovery tag), which is what makes deep structural validation
//! and post-corruption block rediscovery possible.
//!
//! The engine is a pure byte-region transformation. Readers are small
//! copyable descriptors addressing a [`ByteRegion`] (a memory-mapped file
//! locally, or a [`SparseRegion`] of HTTP range responses remotely), and the
//! abstraction they build holds `{offset, size}` handles to large payloads
//! rather than copies.
//!
//! # Reading
//!
//! ```no_run
//! use iris_extension::{abstract_file_structure, validate_file_structure};
//!
//! # fn read(bytes: &[u8]) -> Result<(), iris_extension::ExtensionError> {
//! // Always validate before reading a file of unknown provenance.
//! validate_file_structure(bytes).into_result()?;
//!
//! let slide = abstract_file_structure(bytes)?;
//! for (index, layer) in slide.tile_table.extent.layers.iter().enumerate() {
//!     println!("layer {index}: {} x {} tiles", layer.x_tiles, layer.y_tiles);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Writing
//!
//! Writers store blocks at offsets the caller has already laid out, children
//! first; each `store_*` call validates the peers it references before
//! mutating the region, so a finished file is internally consistent by
//! construction. Use [`generate_file_map`] before updating a file in place
//! to see every block at or after the write point.

pub mod error;
pub mod format;
pub mod io;
pub mod remote;

pub use error::{ExtensionError, Flags, IoError, Outcome};
pub use format::abstraction::{
    abstract_file_structure, is_iris_file, validate_file_structure, Annotation, AnnotationGroup,
    Annotations, AssociatedImage, AssociatedImages, Attributes, CodecVersion, File, Header,
    LayerExtent, Metadata, SlideExtent, TileEntry, TileTable,
};
pub use format::annotations::{
    size_annotation_array, size_annotation_bytes, size_annotation_group_bytes,
    size_annotation_group_sizes, store_annotation_array, store_annotation_bytes,
    store_annotation_group_bytes, store_annotation_group_sizes, AnnotationArrayCreateInfo,
    AnnotationEntryInfo, AnnotationGroupInfo,
};
pub use format::attributes::{
    size_attribute_bytes, size_attribute_sizes, store_attribute_bytes, store_attribute_sizes,
    store_attributes, AttributesCreateInfo, ATTRIBUTES_SIZE,
};
pub use format::file_map::{generate_file_map, BlockKind, FileMap, FileMapEntry};
pub use format::header::{store_file_header, HeaderCreateInfo, FILE_HEADER_SIZE};
pub use format::icc::{size_icc_profile, store_icc_profile};
pub use format::images::{
    size_image_array, size_image_bytes, store_image_array, store_image_bytes, ImageArrayCreateInfo,
    ImageArrayEntry, ImageBytesCreateInfo,
};
pub use format::layer_extents::{size_layer_extents, store_layer_extents};
pub use format::metadata::{store_metadata, MetadataCreateInfo, METADATA_SIZE};
pub use format::tile_offsets::{size_tile_offsets, store_tile_offsets};
pub use format::tile_table::{store_tile_table, TileTableCreateInfo, TILE_TABLE_SIZE};
pub use format::{
    AnnotationFormat, AttributeFormat, DataBlock, ImageEncoding, PixelFormat, Recovery,
    TileEncoding, EXTENSION_MAJOR, EXTENSION_MINOR, EXTENSION_VERSION, MAGIC_BYTES, NULL_ID,
    NULL_OFFSET, NULL_TILE,
};
pub use io::{BlockCache, ByteRegion, HttpRangeReader, RangeReader, RegionError, SparseRegion};
