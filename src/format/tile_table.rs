//! The tile table block: the root of the tile pyramid subtree.
//!
//! The tile table records how tiles were compressed, the pixel extent of the
//! base view, and the offsets of its two array children: the layer extents
//! (pyramid shape) and the tile offsets (per-tile byte locations). The cipher
//! offset field is reserved and always stored null.

use tracing::warn;

use crate::error::{ExtensionError, Outcome};
use crate::format::abstraction::{SlideExtent, TileTable};
use crate::format::datablock::{self, DataBlock, Recovery};
use crate::format::layer_extents::LayerExtentsBlock;
use crate::format::tile_offsets::TileOffsetsBlock;
use crate::format::{PixelFormat, TileEncoding, EXTENSION_1_0, EXTENSION_VERSION, NULL_OFFSET};
use crate::io::codec::{read_u32_le, read_u64_le, read_u8, write_u32_le, write_u64_le, write_u8};
use crate::io::region::ByteRegion;

/// Tile table field layout.
pub(crate) mod field {
    use crate::format::datablock::prologue;

    pub const ENCODING: usize = prologue::SIZE;
    pub const ENCODING_S: usize = 1;
    pub const FORMAT: usize = ENCODING + ENCODING_S;
    pub const FORMAT_S: usize = 1;
    pub const CIPHER_OFFSET: usize = FORMAT + FORMAT_S;
    pub const CIPHER_OFFSET_S: usize = 8;
    pub const TILE_OFFSETS_OFFSET: usize = CIPHER_OFFSET + CIPHER_OFFSET_S;
    pub const TILE_OFFSETS_OFFSET_S: usize = 8;
    pub const LAYER_EXTENTS_OFFSET: usize = TILE_OFFSETS_OFFSET + TILE_OFFSETS_OFFSET_S;
    pub const LAYER_EXTENTS_OFFSET_S: usize = 8;
    pub const X_EXTENT: usize = LAYER_EXTENTS_OFFSET + LAYER_EXTENTS_OFFSET_S;
    pub const X_EXTENT_S: usize = 4;
    pub const Y_EXTENT: usize = X_EXTENT + X_EXTENT_S;
    pub const Y_EXTENT_S: usize = 4;
    pub const HEADER_V1_0_SIZE: usize = Y_EXTENT + Y_EXTENT_S;
    // Version 1.0 ends here; later fields are added behind the version gate.
}

/// Byte length of the version 1.0 tile table block.
pub const TILE_TABLE_SIZE: u64 = field::HEADER_V1_0_SIZE as u64;

// =============================================================================
// TileTableBlock
// =============================================================================

/// Reader for the tile table block.
#[derive(Debug, Clone, Copy)]
pub struct TileTableBlock {
    pub(crate) block: DataBlock,
}

impl TileTableBlock {
    pub fn new(offset: u64, file_size: u64, version: u32) -> Self {
        TileTableBlock {
            block: DataBlock::new(offset, file_size, version),
        }
    }

    #[inline]
    pub fn offset(&self) -> u64 {
        self.block.offset
    }

    /// Block size for this file's version. Fixed-length in version 1.0.
    pub fn size(&self) -> u64 {
        let size = TILE_TABLE_SIZE;
        if self.block.version > EXTENSION_1_0 {
            // v2+ tile table fields extend the size here once defined.
        }
        size
    }

    /// Validate the block prologue.
    pub fn validate_offset<R: ByteRegion + ?Sized>(&self, region: &R) -> Outcome {
        self.block
            .validate_offset(region, "TILE_TABLE", Recovery::TileTable)
    }

    /// Validate the prologue, both enumerators, and both array children.
    pub fn validate_full<R: ByteRegion + ?Sized>(&self, region: &R) -> Outcome {
        let mut outcome = self.validate_offset(region);
        if outcome.is_failure() {
            return outcome;
        }
        if outcome.is_warning() {
            warn!("tile table validation: {}", outcome.message);
        }

        let bytes = match region.slice(self.block.offset, self.size()) {
            Ok(bytes) => bytes,
            Err(e) => {
                return Outcome::validation_failure(format!("TILE_TABLE unreadable: {e}"))
            }
        };

        let encoding = read_u8(&bytes[field::ENCODING..]);
        if !TileEncoding::accepted(encoding, self.block.version) {
            return Outcome::validation_failure(format!(
                "undefined tile encoding value ({encoding:#04X}) decoded from tile table; the \
                 enumeration shall name the compression algorithm and be one of the defined \
                 values, excluding the undefined value (0)"
            ));
        }
        let format = read_u8(&bytes[field::FORMAT..]);
        if !PixelFormat::accepted(format, self.block.version) {
            return Outcome::validation_failure(format!(
                "undefined tile pixel format ({format:#04X}) decoded from tile table; the format \
                 shall describe the pixel channel ordering using one of the defined values, \
                 excluding the undefined value (0)"
            ));
        }

        let extents = LayerExtentsBlock::new(
            read_u64_le(&bytes[field::LAYER_EXTENTS_OFFSET..]),
            self.block.file_size,
            self.block.version,
        );
        let result = extents.validate_full(region);
        if result.is_failure() {
            return result;
        }
        outcome = outcome.merge(result);

        let offsets = TileOffsetsBlock::new(
            read_u64_le(&bytes[field::TILE_OFFSETS_OFFSET..]),
            self.block.file_size,
            self.block.version,
        );
        let result = offsets.validate_full(region);
        if result.is_failure() {
            return result;
        }
        outcome = outcome.merge(result);

        if self.block.version > EXTENSION_1_0 {
            // v2+ tile table validations are added here once defined.
        }

        outcome
    }

    /// Read the full tile table abstraction: enumerators, extents, and the
    /// per-layer tile entry arrays.
    pub fn read<R: ByteRegion + ?Sized>(&self, region: &R) -> Result<TileTable, ExtensionError> {
        let bytes = region
            .slice(self.block.offset, self.size())
            .map_err(|e| ExtensionError::Structural(format!("TILE_TABLE unreadable: {e}")))?;

        let encoding_raw = read_u8(&bytes[field::ENCODING..]);
        let encoding = TileEncoding::from_u8(encoding_raw)
            .filter(|_| TileEncoding::accepted(encoding_raw, self.block.version))
            .ok_or_else(|| {
                ExtensionError::Enumerator(format!(
                    "undefined tile encoding value ({encoding_raw}) decoded from tile table"
                ))
            })?;

        let format_raw = read_u8(&bytes[field::FORMAT..]);
        let format = PixelFormat::from_u8(format_raw)
            .filter(|_| PixelFormat::accepted(format_raw, self.block.version))
            .ok_or_else(|| {
                ExtensionError::Enumerator(format!(
                    "undefined tile pixel format ({format_raw}) decoded from tile table"
                ))
            })?;

        let mut extent = SlideExtent {
            width: read_u32_le(&bytes[field::X_EXTENT..]),
            height: read_u32_le(&bytes[field::Y_EXTENT..]),
            layers: Vec::new(),
        };

        // Pull the layer extents, then populate the tile entries against the
        // shape they declare.
        let extents_block = self.layer_extents(region)?;
        extent.layers = extents_block.read(region)?;

        let offsets_block = self.tile_offsets(region)?;
        let layers = offsets_block.read(region, &extent.layers)?;

        let table = TileTable {
            encoding,
            format,
            extent,
            layers,
        };

        if self.block.version > EXTENSION_1_0 {
            // v2+ tile table fields are read here once defined.
        }

        Ok(table)
    }

    /// Construct the layer extents reader at the stored offset.
    pub fn layer_extents<R: ByteRegion + ?Sized>(
        &self,
        region: &R,
    ) -> Result<LayerExtentsBlock, ExtensionError> {
        let offset = self.layer_extents_offset(region)?;
        let block = LayerExtentsBlock::new(offset, self.block.file_size, self.block.version);

        let result = block.validate_offset(region);
        if result.is_failure() {
            return Err(ExtensionError::Validation(format!(
                "failed to retrieve layer extents array: {}",
                result.message
            )));
        }
        if result.is_warning() {
            warn!("layer extents retrieval: {}", result.message);
        }
        Ok(block)
    }

    /// Construct the tile offsets reader at the stored offset.
    pub fn tile_offsets<R: ByteRegion + ?Sized>(
        &self,
        region: &R,
    ) -> Result<TileOffsetsBlock, ExtensionError> {
        let offset = self.tile_offsets_offset(region)?;
        let block = TileOffsetsBlock::new(offset, self.block.file_size, self.block.version);

        let result = block.validate_offset(region);
        if result.is_failure() {
            return Err(ExtensionError::Validation(format!(
                "failed to retrieve tile offset array: {}",
                result.message
            )));
        }
        if result.is_warning() {
            warn!("tile offsets retrieval: {}", result.message);
        }
        Ok(block)
    }

    /// Stored absolute offset of the layer extents array.
    pub fn layer_extents_offset<R: ByteRegion + ?Sized>(
        &self,
        region: &R,
    ) -> Result<u64, ExtensionError> {
        let bytes = region
            .slice(self.block.offset, self.size())
            .map_err(|e| ExtensionError::Structural(format!("TILE_TABLE unreadable: {e}")))?;
        Ok(read_u64_le(&bytes[field::LAYER_EXTENTS_OFFSET..]))
    }

    /// Stored absolute offset of the tile offsets array.
    pub fn tile_offsets_offset<R: ByteRegion + ?Sized>(
        &self,
        region: &R,
    ) -> Result<u64, ExtensionError> {
        let bytes = region
            .slice(self.block.offset, self.size())
            .map_err(|e| ExtensionError::Structural(format!("TILE_TABLE unreadable: {e}")))?;
        Ok(read_u64_le(&bytes[field::TILE_OFFSETS_OFFSET..]))
    }
}

// =============================================================================
// Writer
// =============================================================================

/// Parameters for storing a tile table block.
#[derive(Debug, Clone, Copy)]
pub struct TileTableCreateInfo {
    /// Offset at which the tile table itself is stored.
    pub tile_table_offset: u64,
    pub encoding: TileEncoding,
    /// Source pixel format; `None` stores the undefined value with a warning.
    pub format: Option<PixelFormat>,
    /// Offset of the already-stored tile offsets array.
    pub tiles_offset: u64,
    /// Offset of the already-stored layer extents array.
    pub layer_extents_offset: u64,
    pub width_pixels: u32,
    pub height_pixels: u32,
}

/// Store a tile table block at `info.tile_table_offset`.
///
/// Both array children must already be stored; their prologues are validated
/// before any byte is written.
pub fn store_tile_table(base: &mut [u8], info: &TileTableCreateInfo) -> Result<(), ExtensionError> {
    if info.tile_table_offset == NULL_OFFSET {
        return Err(ExtensionError::Invariant(String::from(
            "store_tile_table: invalid tile_table_offset in TileTableCreateInfo",
        )));
    }
    let end = info.tile_table_offset + TILE_TABLE_SIZE;
    if end > base.len() as u64 {
        return Err(ExtensionError::Structural(format!(
            "store_tile_table: block {}..{end} extends beyond the region ({} bytes)",
            info.tile_table_offset,
            base.len()
        )));
    }
    if info.format.is_none() {
        warn!(
            "tile table pixel format set to the undefined value (0x00); while permitted, \
             encoding the source pixel format is recommended"
        );
    }

    let file_size = base.len() as u64;
    let tiles = TileOffsetsBlock::new(info.tiles_offset, file_size, EXTENSION_VERSION);
    let result = tiles.validate_offset(&*base);
    if result.is_failure() {
        return Err(ExtensionError::Validation(format!(
            "store_tile_table: invalid tiles_offset: {}",
            result.message
        )));
    }

    let extents = LayerExtentsBlock::new(info.layer_extents_offset, file_size, EXTENSION_VERSION);
    let result = extents.validate_offset(&*base);
    if result.is_failure() {
        return Err(ExtensionError::Validation(format!(
            "store_tile_table: invalid layer_extents_offset: {}",
            result.message
        )));
    }

    let at = info.tile_table_offset as usize;
    datablock::store_prologue(base, info.tile_table_offset, Recovery::TileTable);
    write_u8(&mut base[at + field::ENCODING..], info.encoding as u8);
    write_u8(
        &mut base[at + field::FORMAT..],
        info.format.map(|f| f as u8).unwrap_or(0),
    );
    write_u64_le(&mut base[at + field::CIPHER_OFFSET..], NULL_OFFSET);
    write_u64_le(&mut base[at + field::TILE_OFFSETS_OFFSET..], info.tiles_offset);
    write_u64_le(
        &mut base[at + field::LAYER_EXTENTS_OFFSET..],
        info.layer_extents_offset,
    );
    write_u32_le(&mut base[at + field::X_EXTENT..], info.width_pixels);
    write_u32_le(&mut base[at + field::Y_EXTENT..], info.height_pixels);
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_layout() {
        assert_eq!(field::ENCODING, 10);
        assert_eq!(field::FORMAT, 11);
        assert_eq!(field::CIPHER_OFFSET, 12);
        assert_eq!(field::TILE_OFFSETS_OFFSET, 20);
        assert_eq!(field::LAYER_EXTENTS_OFFSET, 28);
        assert_eq!(field::X_EXTENT, 36);
        assert_eq!(field::Y_EXTENT, 40);
        assert_eq!(TILE_TABLE_SIZE, 44);
    }

    #[test]
    fn test_store_rejects_null_offset() {
        let mut buf = vec![0u8; 128];
        let info = TileTableCreateInfo {
            tile_table_offset: NULL_OFFSET,
            encoding: TileEncoding::Jpeg,
            format: Some(PixelFormat::Rgba8),
            tiles_offset: 0,
            layer_extents_offset: 0,
            width_pixels: 256,
            height_pixels: 256,
        };
        assert!(matches!(
            store_tile_table(&mut buf, &info),
            Err(ExtensionError::Invariant(_))
        ));
    }

    #[test]
    fn test_store_rejects_unstored_children() {
        let mut buf = vec![0u8; 256];
        let info = TileTableCreateInfo {
            tile_table_offset: 0,
            encoding: TileEncoding::Jpeg,
            format: Some(PixelFormat::Rgba8),
            tiles_offset: 100,
            layer_extents_offset: 160,
            width_pixels: 256,
            height_pixels: 256,
        };
        assert!(matches!(
            store_tile_table(&mut buf, &info),
            Err(ExtensionError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_full_rejects_undefined_encoding() {
        use crate::format::layer_extents::store_layer_extents;
        use crate::format::tile_offsets::store_tile_offsets;
        use crate::format::abstraction::{LayerExtent, TileEntry};
        use crate::format::NULL_OFFSET as NULL;

        let mut buf = vec![0u8; 256];
        let extents = vec![LayerExtent {
            x_tiles: 1,
            y_tiles: 1,
            scale: 1.0,
            downsample: 1.0,
        }];
        let layers = vec![vec![TileEntry {
            offset: NULL,
            size: 0,
        }]];
        store_layer_extents(&mut buf, 100, &extents).unwrap();
        store_tile_offsets(&mut buf, 160, &layers).unwrap();

        let info = TileTableCreateInfo {
            tile_table_offset: 38,
            encoding: TileEncoding::Jpeg,
            format: Some(PixelFormat::Rgba8),
            tiles_offset: 160,
            layer_extents_offset: 100,
            width_pixels: 256,
            height_pixels: 256,
        };
        store_tile_table(&mut buf, &info).unwrap();

        // Stored table validates cleanly.
        let block = TileTableBlock::new(38, 256, EXTENSION_VERSION);
        assert!(!block.validate_full(&buf[..]).is_failure());

        // Zero out the encoding enumerator.
        buf[38 + field::ENCODING] = 0;
        let outcome = block.validate_full(&buf[..]);
        assert!(outcome.is_failure());
        assert!(outcome.message.contains("encoding"));
    }
}
