//! Remote read pipeline over a [`RangeReader`].
//!
//! The remote backend mirrors the local entry points without ever holding
//! the whole file: the block graph is walked with per-block range fetches.
//! Each block is fetched lazily in up to two steps: the fixed prologue (or
//! fixed header) first, then, once its size fields are visible, a second
//! fetch expanding to the block's full `size()`. Fetched ranges accumulate
//! in a [`SparseRegion`], and the ordinary synchronous readers then run
//! against it unchanged. Tile payloads are never fetched.
//!
//! Every fetch goes through a [`BlockCache`] keyed by block offset, so the
//! prologue response is reused while a block expands and repeated visits to
//! a block cost one request. A failed fetch leaves both the cache and the
//! region without that range, so a retried call fetches it again.

use crate::error::{ExtensionError, Outcome};
use crate::format::abstraction::{self, File};
use crate::format::annotations::{
    entry as annotation_entry, AnnotationBytesBlock, AnnotationsBlock, ANNOTATIONS_HEADER_SIZE,
    ANNOTATION_BYTES_HEADER_SIZE, GROUP_BYTES_HEADER_SIZE, GROUP_SIZES_HEADER_SIZE,
};
use crate::format::attributes::{
    AttributeBytesBlock, AttributeSizesBlock, ATTRIBUTES_SIZE, ATTRIBUTE_BYTES_HEADER_SIZE,
    ATTRIBUTE_SIZES_HEADER_SIZE,
};
use crate::format::header::{FileHeaderBlock, FILE_HEADER_SIZE};
use crate::format::icc::{IccProfileBlock, ICC_PROFILE_HEADER_SIZE};
use crate::format::images::{
    entry as image_entry, ImageArrayBlock, ImageBytesBlock, IMAGE_ARRAY_HEADER_SIZE,
    IMAGE_BYTES_HEADER_SIZE,
};
use crate::format::layer_extents::{LayerExtentsBlock, LAYER_EXTENTS_HEADER_SIZE};
use crate::format::metadata::{MetadataBlock, METADATA_SIZE};
use crate::format::tile_offsets::{TileOffsetsBlock, TILE_OFFSETS_HEADER_SIZE};
use crate::format::tile_table::{TileTableBlock, TILE_TABLE_SIZE};
use crate::io::block_cache::BlockCache;
use crate::io::codec::read_u64_le;
use crate::io::range_reader::RangeReader;
use crate::io::region::{ByteRegion, SparseRegion};

/// A remote slide: a cached [`RangeReader`] plus the sparse region of block
/// ranges fetched so far.
pub struct RemoteRegion<R> {
    cache: BlockCache<R>,
    region: SparseRegion,
}

impl<R: RangeReader + 'static> RemoteRegion<R> {
    /// Wrap a range reader behind a block-response cache; nothing is
    /// fetched yet.
    pub fn new(reader: R) -> Self {
        let size = reader.size();
        RemoteRegion {
            cache: BlockCache::new(reader),
            region: SparseRegion::new(size),
        }
    }

    /// The sparse region materialized so far.
    pub fn region(&self) -> &SparseRegion {
        &self.region
    }

    /// Give up the reader and keep the materialized region.
    pub fn into_region(self) -> SparseRegion {
        self.region
    }

    /// Materialize `offset..offset+len` unless the region already covers
    /// it. The fetch is served through the block cache, so expanding a block
    /// past its prologue reuses the cached response where possible.
    async fn ensure(&mut self, offset: u64, len: u64) -> Result<(), ExtensionError> {
        if len == 0 || self.region.contains(offset, len) {
            return Ok(());
        }
        let bytes = self
            .cache
            .read_exact_at(offset, len as usize)
            .await
            .map_err(ExtensionError::Io)?;
        self.region.insert(offset, bytes);
        Ok(())
    }

    /// Fetch just the file header block.
    pub async fn load_header(&mut self) -> Result<(), ExtensionError> {
        self.ensure(0, FILE_HEADER_SIZE).await
    }

    /// Walk the whole block graph, materializing every block the validation
    /// and abstraction pipelines touch. Tile payloads are skipped.
    pub async fn load_structure(&mut self) -> Result<(), ExtensionError> {
        self.load_header().await?;

        let file_size = self.region.len();
        let header = FileHeaderBlock::new(file_size);
        let version = header.stored_version(&self.region)?;

        // Tile table subtree.
        let tile_table_offset = header.tile_table_offset(&self.region)?;
        self.ensure(tile_table_offset, TILE_TABLE_SIZE).await?;
        let tile_table = TileTableBlock::new(tile_table_offset, file_size, version);

        let extents_offset = tile_table.layer_extents_offset(&self.region)?;
        self.ensure(extents_offset, LAYER_EXTENTS_HEADER_SIZE).await?;
        let extents = LayerExtentsBlock::new(extents_offset, file_size, version);
        let full = extents.size(&self.region)?;
        self.ensure(extents_offset, full).await?;

        let tiles_offset = tile_table.tile_offsets_offset(&self.region)?;
        self.ensure(tiles_offset, TILE_OFFSETS_HEADER_SIZE).await?;
        let tiles = TileOffsetsBlock::new(tiles_offset, file_size, version);
        let full = tiles.size(&self.region)?;
        self.ensure(tiles_offset, full).await?;

        // Metadata subtree.
        let metadata_offset = header.metadata_offset(&self.region)?;
        self.ensure(metadata_offset, METADATA_SIZE).await?;
        let metadata = MetadataBlock::new(metadata_offset, file_size, version);

        if metadata.has_attributes(&self.region) {
            let attributes_offset =
                metadata.stored_offset(&self.region, crate::format::metadata::field::ATTRIBUTES_OFFSET);
            self.ensure(attributes_offset, ATTRIBUTES_SIZE).await?;
            let attributes = crate::format::attributes::AttributesBlock::new(
                attributes_offset,
                file_size,
                version,
            );

            let sizes_offset = attributes.stored_sizes_offset(&self.region)?;
            self.ensure(sizes_offset, ATTRIBUTE_SIZES_HEADER_SIZE).await?;
            let sizes = AttributeSizesBlock::new(sizes_offset, file_size, version);
            let full = sizes.size(&self.region)?;
            self.ensure(sizes_offset, full).await?;

            let bytes_offset = attributes.stored_bytes_offset(&self.region)?;
            self.ensure(bytes_offset, ATTRIBUTE_BYTES_HEADER_SIZE).await?;
            let bytes = AttributeBytesBlock::new(bytes_offset, file_size, version);
            let full = bytes.size(&self.region)?;
            self.ensure(bytes_offset, full).await?;
        }

        if metadata.has_image_array(&self.region) {
            let array_offset =
                metadata.stored_offset(&self.region, crate::format::metadata::field::IMAGES_OFFSET);
            self.ensure(array_offset, IMAGE_ARRAY_HEADER_SIZE).await?;
            let array = ImageArrayBlock::new(array_offset, file_size, version);
            let full = array.size(&self.region)?;
            self.ensure(array_offset, full).await?;

            for bytes_offset in array_entry_offsets(
                &self.region,
                array_offset,
                IMAGE_ARRAY_HEADER_SIZE,
                image_entry::BYTES_OFFSET,
            )? {
                self.ensure(bytes_offset, IMAGE_BYTES_HEADER_SIZE).await?;
                let bytes = ImageBytesBlock::new(bytes_offset, file_size, version);
                let full = bytes.size(&self.region)?;
                self.ensure(bytes_offset, full).await?;
            }
        }

        if metadata.has_color_profile(&self.region) {
            let profile_offset = metadata
                .stored_offset(&self.region, crate::format::metadata::field::ICC_COLOR_OFFSET);
            self.ensure(profile_offset, ICC_PROFILE_HEADER_SIZE).await?;
            let profile = IccProfileBlock::new(profile_offset, file_size, version);
            let full = profile.size(&self.region)?;
            self.ensure(profile_offset, full).await?;
        }

        if metadata.has_annotations(&self.region) {
            let array_offset = metadata
                .stored_offset(&self.region, crate::format::metadata::field::ANNOTATIONS_OFFSET);
            self.ensure(array_offset, ANNOTATIONS_HEADER_SIZE).await?;
            let array = AnnotationsBlock::new(array_offset, file_size, version);
            let full = array.size(&self.region)?;
            self.ensure(array_offset, full).await?;

            for bytes_offset in array_entry_offsets(
                &self.region,
                array_offset,
                ANNOTATIONS_HEADER_SIZE,
                annotation_entry::BYTES_OFFSET,
            )? {
                self.ensure(bytes_offset, ANNOTATION_BYTES_HEADER_SIZE).await?;
                let bytes = AnnotationBytesBlock::new(bytes_offset, file_size, version);
                let full = bytes.size(&self.region)?;
                self.ensure(bytes_offset, full).await?;
            }

            if array.has_groups(&self.region) {
                let sizes_offset = array.group_sizes_offset(&self.region);
                self.ensure(sizes_offset, GROUP_SIZES_HEADER_SIZE).await?;
                let sizes = crate::format::annotations::AnnotationGroupSizesBlock::new(
                    sizes_offset,
                    file_size,
                    version,
                );
                let full = sizes.size(&self.region)?;
                self.ensure(sizes_offset, full).await?;

                let bytes_offset = array.group_bytes_offset(&self.region);
                self.ensure(bytes_offset, GROUP_BYTES_HEADER_SIZE).await?;
                let bytes = crate::format::annotations::AnnotationGroupBytesBlock::new(
                    bytes_offset,
                    file_size,
                    version,
                );
                let full = bytes.size(&self.region)?;
                self.ensure(bytes_offset, full).await?;
            }
        }

        Ok(())
    }
}

/// Collect one u64 offset field from each entry of a fetched array block.
fn array_entry_offsets(
    region: &SparseRegion,
    array_offset: u64,
    header_size: u64,
    entry_field: usize,
) -> Result<Vec<u64>, ExtensionError> {
    use crate::io::codec::{read_u16_le, read_u32_le};

    let header = region
        .slice(array_offset, header_size)
        .map_err(|e| ExtensionError::Structural(format!("array header unreadable: {e}")))?;
    // Array headers share the prologue + stride + count prefix.
    let stride = read_u16_le(&header[crate::format::datablock::prologue::SIZE..]) as u64;
    let entries = read_u32_le(&header[crate::format::datablock::prologue::SIZE + 2..]) as u64;

    let body = region
        .slice(array_offset + header_size, entries * stride)
        .map_err(|e| ExtensionError::Structural(format!("array body unreadable: {e}")))?;

    let mut offsets = Vec::with_capacity(entries as usize);
    for index in 0..entries as usize {
        let at = &body[index * stride as usize..];
        offsets.push(read_u64_le(&at[entry_field..]));
    }
    Ok(offsets)
}

// =============================================================================
// Entry points
// =============================================================================

/// Quick remote check that the resource starts with an Iris file header.
///
/// Fetches only the header block.
pub async fn is_iris_file<R: RangeReader>(reader: &R) -> Result<bool, ExtensionError>
where
    R: Clone + 'static,
{
    let mut remote = RemoteRegion::new(reader.clone());
    remote.load_header().await?;
    Ok(abstraction::is_iris_file(remote.region()))
}

/// Remote deep structural validation: materialize the block graph, then run
/// the ordinary tree validation against the fetched ranges.
pub async fn validate_file_structure<R: RangeReader>(reader: &R) -> Result<Outcome, ExtensionError>
where
    R: Clone + 'static,
{
    let mut remote = RemoteRegion::new(reader.clone());
    remote.load_structure().await?;
    Ok(abstraction::validate_file_structure(remote.region()))
}

/// Remote abstraction: materialize the block graph, then build the in-memory
/// [`File`] from the fetched ranges. Tile payloads stay on the server.
pub async fn abstract_file_structure<R: RangeReader>(reader: &R) -> Result<File, ExtensionError>
where
    R: Clone + 'static,
{
    let mut remote = RemoteRegion::new(reader.clone());
    remote.load_structure().await?;
    abstraction::abstract_file_structure(remote.region())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use bytes::Bytes;

    use crate::error::IoError;
    use crate::format::abstraction::{LayerExtent, TileEntry};
    use crate::format::header::{store_file_header, HeaderCreateInfo};
    use crate::format::layer_extents::store_layer_extents;
    use crate::format::metadata::{store_metadata, MetadataCreateInfo};
    use crate::format::tile_offsets::store_tile_offsets;
    use crate::format::tile_table::{store_tile_table, TileTableCreateInfo};
    use crate::format::{PixelFormat, TileEncoding, NULL_OFFSET};

    /// In-memory reader that counts range requests.
    #[derive(Clone)]
    struct MemoryReader {
        data: Arc<Vec<u8>>,
        fetches: Arc<AtomicUsize>,
    }

    impl MemoryReader {
        fn new(data: Vec<u8>) -> Self {
            MemoryReader {
                data: Arc::new(data),
                fetches: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RangeReader for MemoryReader {
        async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if offset + len as u64 > self.data.len() as u64 {
                return Err(IoError::RangeOutOfBounds {
                    offset,
                    requested: len as u64,
                    size: self.data.len() as u64,
                });
            }
            Ok(Bytes::copy_from_slice(
                &self.data[offset as usize..offset as usize + len],
            ))
        }

        fn size(&self) -> u64 {
            self.data.len() as u64
        }

        fn identifier(&self) -> &str {
            "mem://slide"
        }
    }

    /// Minimal valid slide: one layer, one sparse tile, bare metadata.
    fn minimal_slide() -> Vec<u8> {
        let mut buf = vec![0u8; 0x100];
        let extents = vec![LayerExtent {
            x_tiles: 1,
            y_tiles: 1,
            scale: 1.0,
            downsample: 1.0,
        }];
        let layers = vec![vec![TileEntry {
            offset: NULL_OFFSET,
            size: 0,
        }]];
        store_layer_extents(&mut buf, 82, &extents).unwrap();
        store_tile_offsets(&mut buf, 110, &layers).unwrap();
        store_tile_table(
            &mut buf,
            &TileTableCreateInfo {
                tile_table_offset: 38,
                encoding: TileEncoding::Jpeg,
                format: Some(PixelFormat::Rgba8),
                tiles_offset: 110,
                layer_extents_offset: 82,
                width_pixels: 256,
                height_pixels: 256,
            },
        )
        .unwrap();
        store_metadata(
            &mut buf,
            &MetadataCreateInfo {
                metadata_offset: 134,
                microns_per_pixel: 0.25,
                magnification: 20.0,
                ..Default::default()
            },
        )
        .unwrap();
        store_file_header(
            &mut buf,
            &HeaderCreateInfo {
                file_size: 0x100,
                revision: 0,
                tile_table_offset: 38,
                metadata_offset: 134,
            },
        )
        .unwrap();
        buf
    }

    #[tokio::test]
    async fn test_remote_is_iris_file() {
        let reader = MemoryReader::new(minimal_slide());
        assert!(is_iris_file(&reader).await.unwrap());

        let mut noise = minimal_slide();
        noise[0] ^= 0xFF;
        let reader = MemoryReader::new(noise);
        assert!(!is_iris_file(&reader).await.unwrap());
    }

    #[tokio::test]
    async fn test_remote_validate_and_abstract() {
        let reader = MemoryReader::new(minimal_slide());
        let outcome = validate_file_structure(&reader).await.unwrap();
        assert!(!outcome.is_failure(), "{}", outcome.message);

        let file = abstract_file_structure(&reader).await.unwrap();
        assert_eq!(file.header.file_size, 0x100);
        assert_eq!(file.tile_table.layers.len(), 1);
        assert!(file.tile_table.layers[0][0].is_sparse());
    }

    #[tokio::test]
    async fn test_remote_fetches_blocks_not_whole_file() {
        let reader = MemoryReader::new(minimal_slide());
        let mut remote = RemoteRegion::new(reader.clone());
        remote.load_structure().await.unwrap();

        // Header + tile table + (extents, tiles) x (header + expand) +
        // metadata: a handful of block-sized requests, not one 256-byte read.
        let fetches = reader.fetches();
        assert!(fetches >= 5, "expected per-block fetches, saw {fetches}");
        assert!(remote.region().range_count() >= 5);
    }

    #[tokio::test]
    async fn test_failed_fetch_leaves_cache_retryable() {
        // A reader whose backing is shorter than it claims fails mid-walk.
        #[derive(Clone)]
        struct TruncatedReader(MemoryReader);

        #[async_trait]
        impl RangeReader for TruncatedReader {
            async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
                if offset > 0x40 {
                    return Err(IoError::Connection(String::from("reset")));
                }
                self.0.read_exact_at(offset, len).await
            }

            fn size(&self) -> u64 {
                self.0.size()
            }

            fn identifier(&self) -> &str {
                "mem://truncated"
            }
        }

        let reader = TruncatedReader(MemoryReader::new(minimal_slide()));
        let mut remote = RemoteRegion::new(reader);
        let result = remote.load_structure().await;
        assert!(result.is_err());
        // The header made it in; the failed block did not.
        assert!(remote.region().contains(0, FILE_HEADER_SIZE));
        assert!(!remote.region().contains(82, 16));
    }
}
