//! The file map: an ordered enumeration of every block in the file.
//!
//! Mapping walks the entire block graph, including every individual tile
//! payload, associated image byte stream, and annotation byte stream, and
//! records `{offset -> (kind, datablock, size)}` ordered by offset. This is
//! not cheap and does not need to be routinely done; it exists for file
//! updates: before writing at offset `p`, consult [`FileMap::at_or_after`]
//! to see every block that would be overwritten, so it can be preserved or
//! rewritten (with its back-references patched) at a new offset.

use std::collections::btree_map::{self, BTreeMap};

use crate::error::ExtensionError;
use crate::format::datablock::DataBlock;
use crate::format::header::FileHeaderBlock;
use crate::io::region::ByteRegion;

/// Kind discriminator for one file-map entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    FileHeader,
    TileTable,
    Cipher,
    Metadata,
    Attributes,
    LayerExtents,
    TileData,
    TileOffsets,
    AttributeSizes,
    AttributeBytes,
    ImageArray,
    ImageBytes,
    IccProfile,
    Annotations,
    AnnotationBytes,
    AnnotationGroupSizes,
    AnnotationGroupBytes,
}

/// One mapped block: its kind, location descriptor, and total byte size.
#[derive(Debug, Clone, Copy)]
pub struct FileMapEntry {
    pub kind: BlockKind,
    pub datablock: DataBlock,
    pub size: u64,
}

/// Offset-ordered map of every block in the file.
#[derive(Debug, Clone, Default)]
pub struct FileMap {
    pub file_size: u64,
    entries: BTreeMap<u64, FileMapEntry>,
}

impl FileMap {
    fn insert(&mut self, kind: BlockKind, datablock: DataBlock, size: u64) {
        self.entries.insert(
            datablock.offset,
            FileMapEntry {
                kind,
                datablock,
                size,
            },
        );
    }

    /// Entry starting exactly at `offset`.
    pub fn get(&self, offset: u64) -> Option<&FileMapEntry> {
        self.entries.get(&offset)
    }

    /// All entries, ordered by offset.
    pub fn iter(&self) -> btree_map::Iter<'_, u64, FileMapEntry> {
        self.entries.iter()
    }

    /// Entries starting at or after `offset`: everything a write at that
    /// offset could clobber.
    pub fn at_or_after(&self, offset: u64) -> impl Iterator<Item = (&u64, &FileMapEntry)> {
        self.entries.range(offset..)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Walk every block in the file and produce its [`FileMap`].
pub fn generate_file_map<R: ByteRegion + ?Sized>(region: &R) -> Result<FileMap, ExtensionError> {
    let mut map = FileMap {
        file_size: region.len(),
        ..FileMap::default()
    };

    let header_block = FileHeaderBlock::new(region.len());
    let header = header_block.read(region)?;
    map.insert(
        BlockKind::FileHeader,
        DataBlock::new(0, header.file_size, header.extension_version),
        header_block.size(region),
    );

    let tile_table = header_block.tile_table(region)?;
    map.insert(BlockKind::TileTable, tile_table.block, tile_table.size());

    let extents = tile_table.layer_extents(region)?;
    map.insert(BlockKind::LayerExtents, extents.block, extents.size(region)?);

    let tiles = tile_table.tile_offsets(region)?;
    map.insert(BlockKind::TileOffsets, tiles.block, tiles.size(region)?);

    // The expensive part: mapping in every tile payload.
    let table = tile_table.read(region)?;
    for layer in &table.layers {
        for tile in layer {
            if tile.is_sparse() {
                continue;
            }
            map.insert(
                BlockKind::TileData,
                DataBlock::new(tile.offset, header.file_size, header.extension_version),
                tile.size as u64,
            );
        }
    }

    let metadata = header_block.metadata(region)?;
    map.insert(BlockKind::Metadata, metadata.block, metadata.size());

    if metadata.has_attributes(region) {
        let attributes = metadata.attributes(region)?;
        map.insert(BlockKind::Attributes, attributes.block, attributes.size());

        let sizes = attributes.sizes(region)?;
        map.insert(BlockKind::AttributeSizes, sizes.block, sizes.size(region)?);

        let bytes = attributes.bytes(region)?;
        map.insert(BlockKind::AttributeBytes, bytes.block, bytes.size(region)?);
    }

    if metadata.has_image_array(region) {
        let array = metadata.image_array(region)?;
        map.insert(BlockKind::ImageArray, array.block, array.size(region)?);

        let mut streams = Vec::new();
        array.read(region, Some(&mut streams))?;
        for stream in streams {
            map.insert(BlockKind::ImageBytes, stream.block, stream.size(region)?);
        }
    }

    if metadata.has_color_profile(region) {
        let profile = metadata.color_profile(region)?;
        map.insert(BlockKind::IccProfile, profile.block, profile.size(region)?);
    }

    if metadata.has_annotations(region) {
        let annotations = metadata.annotations(region)?;
        map.insert(
            BlockKind::Annotations,
            annotations.block,
            annotations.size(region)?,
        );

        let mut streams = Vec::new();
        annotations.read(region, Some(&mut streams))?;
        for stream in streams {
            map.insert(
                BlockKind::AnnotationBytes,
                stream.block,
                stream.size(region)?,
            );
        }

        if annotations.has_groups(region) {
            let sizes = annotations.group_sizes(region)?;
            map.insert(
                BlockKind::AnnotationGroupSizes,
                sizes.block,
                sizes.size(region)?,
            );

            let bytes = annotations.group_bytes(region)?;
            map.insert(
                BlockKind::AnnotationGroupBytes,
                bytes.block,
                bytes.size(region)?,
            );
        }
    }

    Ok(map)
}

// =============================================================================
// Tests
// =============================================================================
