//! The tile offsets array: byte locations of every compressed tile.
//!
//! Entries are packed `{offset: u40, size: u24}` pairs, one per tile slot
//! across all layers in layer order. A 40-bit offset caps slide files at
//! 1 TiB; a 24-bit size caps a compressed tile under 16 MiB. The reserved
//! all-ones offset marks a sparse tile, which the read path normalizes to
//! `{NULL_OFFSET, 0}`.

use crate::error::{ExtensionError, Outcome};
use crate::format::abstraction::{LayerExtent, TileEntry};
use crate::format::datablock::{self, DataBlock, Recovery};
use crate::format::{EXTENSION_1_0, NULL_OFFSET, NULL_TILE};
use crate::io::codec::{
    read_u16_le, read_u24_le, read_u32_le, read_u40_le, write_u16_le, write_u24_le, write_u32_le,
    write_u40_le, U24_MAX, U40_MAX,
};
use crate::io::region::ByteRegion;

/// Array header field layout.
pub(crate) mod field {
    use crate::format::datablock::prologue;

    pub const ENTRY_SIZE: usize = prologue::SIZE;
    pub const ENTRY_SIZE_S: usize = 2;
    pub const ENTRY_NUMBER: usize = ENTRY_SIZE + ENTRY_SIZE_S;
    pub const ENTRY_NUMBER_S: usize = 4;
    pub const HEADER_V1_0_SIZE: usize = ENTRY_NUMBER + ENTRY_NUMBER_S;
    // Version 1.0 ends here; later fields are added behind the version gate.
}

/// Per-entry field layout.
pub(crate) mod entry {
    pub const OFFSET: usize = 0;
    pub const OFFSET_S: usize = 5; // u40: faults at 1 TiB
    pub const TILE_SIZE: usize = OFFSET + OFFSET_S;
    pub const TILE_SIZE_S: usize = 3; // u24: tiles stay well under 16 MiB
    pub const SIZE: usize = TILE_SIZE + TILE_SIZE_S;
    // Version 1.0 ends here; later fields are added behind the version gate.
}

/// Byte length of the version 1.0 array header.
pub const TILE_OFFSETS_HEADER_SIZE: u64 = field::HEADER_V1_0_SIZE as u64;

// =============================================================================
// TileOffsetsBlock
// =============================================================================

/// Reader for the tile offsets array block.
#[derive(Debug, Clone, Copy)]
pub struct TileOffsetsBlock {
    pub(crate) block: DataBlock,
}

impl TileOffsetsBlock {
    pub fn new(offset: u64, file_size: u64, version: u32) -> Self {
        TileOffsetsBlock {
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
        let size = TILE_OFFSETS_HEADER_SIZE + entries as u64 * stride as u64;
        if self.block.version > EXTENSION_1_0 {
            // v2+ tile offset fields extend the size here once defined.
        }
        Ok(size)
    }

    /// Validate the block prologue.
    pub fn validate_offset<R: ByteRegion + ?Sized>(&self, region: &R) -> Outcome {
        self.block
            .validate_offset(region, "TILE_OFFSETS", Recovery::TileOffsets)
    }

    /// Validate the prologue, the array bounds, and that every non-sparse
    /// tile payload lies inside the file.
    pub fn validate_full<R: ByteRegion + ?Sized>(&self, region: &R) -> Outcome {
        let outcome = self.validate_offset(region);
        if outcome.is_failure() {
            return outcome;
        }

        let (stride, entries) = match self.array_header(region) {
            Ok(header) => header,
            Err(e) => return Outcome::validation_failure(e.to_string()),
        };

        let start = self.block.offset + TILE_OFFSETS_HEADER_SIZE;
        let body_len = entries as u64 * stride as u64;
        if start + body_len > self.block.file_size {
            return Outcome::failure(format!(
                "TILE_OFFSETS failed validation: bytes block ({start}-{} bytes) extends beyond \
                 the end of the file",
                start + body_len
            ));
        }
        let body = match region.slice(start, body_len) {
            Ok(body) => body,
            Err(e) => return Outcome::failure(format!("TILE_OFFSETS unreadable: {e}")),
        };

        for index in 0..entries as usize {
            let at = &body[index * stride as usize..];
            let tile_offset = read_u40_le(&at[entry::OFFSET..]);
            if tile_offset == NULL_TILE {
                // Sparse slot: no payload to bound-check.
                continue;
            }
            let tile_size = read_u24_le(&at[entry::TILE_SIZE..]) as u64;
            if tile_offset + tile_size > self.block.file_size {
                return Outcome::failure(format!(
                    "TILE_OFFSETS validation failed: global tile entry ({index}) has a tile data \
                     block (offset plus size) extending out of the file bounds ({} bytes)",
                    self.block.file_size
                ));
            }

            if self.block.version > EXTENSION_1_0 {
                // v2+ per-entry validations are added here once defined.
            }
        }

        outcome
    }

    /// Read the per-layer tile entry arrays against the shape declared by
    /// the layer extents.
    ///
    /// The stored entry count must equal the total tile count of `extents`.
    /// Sparse slots surface as `{NULL_OFFSET, 0}`.
    pub fn read<R: ByteRegion + ?Sized>(
        &self,
        region: &R,
        extents: &[LayerExtent],
    ) -> Result<Vec<Vec<TileEntry>>, ExtensionError> {
        let (stride, entries) = self.array_header(region)?;

        let total_tiles: u64 = extents.iter().map(LayerExtent::tiles).sum();
        if total_tiles != entries as u64 {
            return Err(ExtensionError::Invariant(format!(
                "tile count in the layer extents ({total_tiles}) does not match the total \
                 entries in the tile offset array ({entries})"
            )));
        }

        let start = self.block.offset + TILE_OFFSETS_HEADER_SIZE;
        let body_len = entries as u64 * stride as u64;
        if start + body_len > self.block.file_size {
            return Err(ExtensionError::Structural(format!(
                "tile offsets array ({start}-{} bytes) extends beyond the end of the file",
                start + body_len
            )));
        }
        let body = region
            .slice(start, body_len)
            .map_err(|e| ExtensionError::Structural(format!("TILE_OFFSETS unreadable: {e}")))?;

        let mut layers = Vec::with_capacity(extents.len());
        let mut cursor = 0usize;
        for extent in extents {
            let tiles = extent.tiles() as usize;
            let mut layer = Vec::with_capacity(tiles);
            for _ in 0..tiles {
                let at = &body[cursor * stride as usize..];
                let mut tile = TileEntry {
                    offset: read_u40_le(&at[entry::OFFSET..]),
                    size: read_u24_le(&at[entry::TILE_SIZE..]),
                };

                // Sparse slot, or out-of-bounds payload?
                if tile.offset == NULL_TILE {
                    tile.offset = NULL_OFFSET;
                    tile.size = 0;
                } else if tile.offset + tile.size as u64 > self.block.file_size {
                    return Err(ExtensionError::Structural(String::from(
                        "tile offsets hold a tile data offset value out of file bounds",
                    )));
                }

                if self.block.version > EXTENSION_1_0 {
                    // v2+ per-entry fields are read here once defined.
                }

                layer.push(tile);
                cursor += 1;
            }
            layers.push(layer);
        }

        Ok(layers)
    }

    fn array_header<R: ByteRegion + ?Sized>(
        &self,
        region: &R,
    ) -> Result<(u16, u32), ExtensionError> {
        let bytes = region
            .slice(self.block.offset, TILE_OFFSETS_HEADER_SIZE)
            .map_err(|e| ExtensionError::Structural(format!("TILE_OFFSETS unreadable: {e}")))?;
        Ok((
            read_u16_le(&bytes[field::ENTRY_SIZE..]),
            read_u32_le(&bytes[field::ENTRY_NUMBER..]),
        ))
    }
}

// =============================================================================
// Writer
// =============================================================================

/// Total bytes required to store the given per-layer tile entries.
pub fn size_tile_offsets(layers: &[Vec<TileEntry>]) -> u64 {
    let tiles: u64 = layers.iter().map(|layer| layer.len() as u64).sum();
    TILE_OFFSETS_HEADER_SIZE + tiles * entry::SIZE as u64
}

/// Store the tile offsets array at `offset`.
///
/// Sparse entries (`TileEntry::is_sparse`) are stored with the reserved
/// all-ones 40-bit offset and a zero size.
pub fn store_tile_offsets(
    base: &mut [u8],
    offset: u64,
    layers: &[Vec<TileEntry>],
) -> Result<(), ExtensionError> {
    if offset == NULL_OFFSET {
        return Err(ExtensionError::Invariant(String::from(
            "store_tile_offsets: NULL_OFFSET provided as location",
        )));
    }
    let total = size_tile_offsets(layers);
    if offset + total > base.len() as u64 {
        return Err(ExtensionError::Structural(format!(
            "store_tile_offsets: block {offset}..{} extends beyond the region ({} bytes)",
            offset + total,
            base.len()
        )));
    }
    let total_tiles: u64 = layers.iter().map(|layer| layer.len() as u64).sum();
    if total_tiles > u32::MAX as u64 {
        return Err(ExtensionError::Invariant(format!(
            "store_tile_offsets: tile count ({total_tiles}) exceeds the 32-bit limit"
        )));
    }

    datablock::store_prologue(base, offset, Recovery::TileOffsets);
    let at = offset as usize;
    write_u16_le(&mut base[at + field::ENTRY_SIZE..], entry::SIZE as u16);
    write_u32_le(&mut base[at + field::ENTRY_NUMBER..], total_tiles as u32);

    let mut cursor = at + field::HEADER_V1_0_SIZE;
    for layer in layers {
        for tile in layer {
            let (tile_offset, tile_size) = if tile.is_sparse() {
                (NULL_TILE, 0u32)
            } else {
                (tile.offset, tile.size)
            };
            if tile_offset > U40_MAX {
                return Err(ExtensionError::Invariant(String::from(
                    "store_tile_offsets: tile offset above the 40-bit numerical limit",
                )));
            }
            if tile_size > U24_MAX {
                return Err(ExtensionError::Invariant(String::from(
                    "store_tile_offsets: tile size above the 24-bit numerical limit",
                )));
            }
            write_u40_le(&mut base[cursor + entry::OFFSET..], tile_offset);
            write_u24_le(&mut base[cursor + entry::TILE_SIZE..], tile_size);
            cursor += entry::SIZE;
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

    fn one_layer(extent: (u32, u32)) -> Vec<LayerExtent> {
        vec![LayerExtent {
            x_tiles: extent.0,
            y_tiles: extent.1,
            scale: 1.0,
            downsample: 1.0,
        }]
    }

    #[test]
    fn test_entry_layout() {
        assert_eq!(entry::OFFSET, 0);
        assert_eq!(entry::TILE_SIZE, 5);
        assert_eq!(entry::SIZE, 8);
        assert_eq!(TILE_OFFSETS_HEADER_SIZE, 16);
    }

    #[test]
    fn test_round_trip_dense_and_sparse() {
        let mut buf = vec![0u8; 4096];
        let layers = vec![vec![
            TileEntry {
                offset: 1024,
                size: 512,
            },
            TileEntry {
                offset: NULL_OFFSET,
                size: 0,
            },
        ]];
        store_tile_offsets(&mut buf, 64, &layers).unwrap();

        let block = TileOffsetsBlock::new(64, 4096, EXTENSION_VERSION);
        assert!(!block.validate_full(&buf[..]).is_failure());
        assert_eq!(block.size(&buf[..]).unwrap(), 16 + 2 * 8);

        let read = block.read(&buf[..], &one_layer((2, 1))).unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0][0], TileEntry { offset: 1024, size: 512 });
        // Sparse slot normalized back to the null handle.
        assert!(read[0][1].is_sparse());
        assert_eq!(read[0][1].size, 0);
    }

    #[test]
    fn test_sparse_sentinel_on_disk() {
        let mut buf = vec![0u8; 256];
        let layers = vec![vec![TileEntry {
            offset: NULL_OFFSET,
            size: 0,
        }]];
        store_tile_offsets(&mut buf, 64, &layers).unwrap();

        let body = 64 + field::HEADER_V1_0_SIZE;
        assert_eq!(read_u40_le(&buf[body..]), NULL_TILE);
        assert_eq!(read_u24_le(&buf[body + entry::TILE_SIZE..]), 0);
    }

    #[test]
    fn test_count_mismatch_raises() {
        let mut buf = vec![0u8; 256];
        let layers = vec![vec![TileEntry {
            offset: NULL_OFFSET,
            size: 0,
        }]];
        store_tile_offsets(&mut buf, 64, &layers).unwrap();

        let block = TileOffsetsBlock::new(64, 256, EXTENSION_VERSION);
        let result = block.read(&buf[..], &one_layer((2, 2)));
        assert!(matches!(result, Err(ExtensionError::Invariant(_))));
    }

    #[test]
    fn test_payload_out_of_bounds_fails_validation() {
        let mut buf = vec![0u8; 256];
        let layers = vec![vec![TileEntry {
            offset: 200,
            size: 100,
        }]];
        store_tile_offsets(&mut buf, 64, &layers).unwrap();

        let block = TileOffsetsBlock::new(64, 256, EXTENSION_VERSION);
        let outcome = block.validate_full(&buf[..]);
        assert!(outcome.is_failure());
        assert!(outcome.message.contains("out of the file bounds"));
    }

    #[test]
    fn test_writer_rejects_over_limit_values() {
        let mut buf = vec![0u8; 256];
        let over_offset = vec![vec![TileEntry {
            offset: U40_MAX + 1,
            size: 1,
        }]];
        assert!(store_tile_offsets(&mut buf, 64, &over_offset).is_err());

        let over_size = vec![vec![TileEntry {
            offset: 0,
            size: u32::MAX,
        }]];
        assert!(store_tile_offsets(&mut buf, 64, &over_size).is_err());
    }

    #[test]
    fn test_max_tile_size_accepted() {
        // A maximal u24 size passes the entry bounds math when the declared
        // file size accommodates the payload.
        let mut buf = vec![0u8; 1 << 16];
        let layers = vec![vec![TileEntry {
            offset: 0,
            size: U24_MAX,
        }]];
        store_tile_offsets(&mut buf, 64, &layers).unwrap();
        let block = TileOffsetsBlock::new(64, (U24_MAX + 1) as u64, EXTENSION_VERSION);
        let read = block.read(&buf[..], &one_layer((1, 1))).unwrap();
        assert_eq!(read[0][0].size, U24_MAX);
    }
}
