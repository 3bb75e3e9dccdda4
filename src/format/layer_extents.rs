//! The layer extents array: the shape of the tile pyramid.
//!
//! Each entry records one resolution layer's tile grid and scale. Scales are
//! strictly increasing across the array, so the final entry is the
//! highest-resolution layer; the read path derives each layer's downsample
//! factor from the maximum scale.
//!
//! Like every array block, the header stores the per-entry stride so a 1.0
//! reader can walk files whose entries were widened by a later minor version.

use crate::error::{ExtensionError, Outcome};
use crate::format::abstraction::LayerExtent;
use crate::format::datablock::{self, DataBlock, Recovery};
use crate::format::{EXTENSION_1_0, NULL_OFFSET};
use crate::io::codec::{read_f32_le, read_u16_le, read_u32_le, write_f32_le, write_u16_le, write_u32_le};
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
    pub const X_TILES: usize = 0;
    pub const X_TILES_S: usize = 4;
    pub const Y_TILES: usize = X_TILES + X_TILES_S;
    pub const Y_TILES_S: usize = 4;
    pub const SCALE: usize = Y_TILES + Y_TILES_S;
    pub const SCALE_S: usize = 4;
    pub const SIZE: usize = SCALE + SCALE_S;
    // Version 1.0 ends here; later fields are added behind the version gate.
}

/// Byte length of the version 1.0 array header.
pub const LAYER_EXTENTS_HEADER_SIZE: u64 = field::HEADER_V1_0_SIZE as u64;

// =============================================================================
// LayerExtentsBlock
// =============================================================================

/// Reader for the layer extents array block.
#[derive(Debug, Clone, Copy)]
pub struct LayerExtentsBlock {
    pub(crate) block: DataBlock,
}

impl LayerExtentsBlock {
    pub fn new(offset: u64, file_size: u64, version: u32) -> Self {
        LayerExtentsBlock {
            block: DataBlock::new(offset, file_size, version),
        }
    }

    #[inline]
    pub fn offset(&self) -> u64 {
        self.block.offset
    }

    /// Total block size: header plus `entry_count` entries of the stored
    /// stride. Reading the stride supports forward-compatible growth of
    /// per-entry fields.
    pub fn size<R: ByteRegion + ?Sized>(&self, region: &R) -> Result<u64, ExtensionError> {
        let (stride, entries) = self.array_header(region)?;
        let size = LAYER_EXTENTS_HEADER_SIZE + entries as u64 * stride as u64;
        if self.block.version > EXTENSION_1_0 {
            // v2+ layer extents fields extend the size here once defined.
        }
        Ok(size)
    }

    /// Validate the block prologue.
    pub fn validate_offset<R: ByteRegion + ?Sized>(&self, region: &R) -> Outcome {
        self.block
            .validate_offset(region, "LAYER_EXTENTS", Recovery::LayerExtents)
    }

    /// Validate the prologue, the array bounds, and every per-entry
    /// invariant, including the strictly-increasing-scale rule.
    pub fn validate_full<R: ByteRegion + ?Sized>(&self, region: &R) -> Outcome {
        let outcome = self.validate_offset(region);
        if outcome.is_failure() {
            return outcome;
        }

        let (stride, entries) = match self.array_header(region) {
            Ok(header) => header,
            Err(e) => return Outcome::validation_failure(e.to_string()),
        };

        let start = self.block.offset + LAYER_EXTENTS_HEADER_SIZE;
        let body_len = entries as u64 * stride as u64;
        if start + body_len > self.block.file_size {
            return Outcome::failure(format!(
                "LAYER_EXTENTS failed validation: bytes block ({start}-{} bytes) extends beyond \
                 the end of the file",
                start + body_len
            ));
        }
        let body = match region.slice(start, body_len) {
            Ok(body) => body,
            Err(e) => return Outcome::failure(format!("LAYER_EXTENTS unreadable: {e}")),
        };

        let mut prior_scale = 0.0f32;
        for index in 0..entries as usize {
            let at = &body[index * stride as usize..];
            if read_u32_le(&at[entry::X_TILES..]) < 1 {
                return Outcome::failure(format!(
                    "LAYER_EXTENTS [{index}] failed validation: the X-tiles count shall encode \
                     the number of 256-pixel tiles in the horizontal direction and shall be \
                     greater than zero"
                ));
            }
            if read_u32_le(&at[entry::Y_TILES..]) < 1 {
                return Outcome::failure(format!(
                    "LAYER_EXTENTS [{index}] failed validation: the Y-tiles count shall encode \
                     the number of 256-pixel tiles in the vertical direction and shall be \
                     greater than zero"
                ));
            }
            let scale = read_f32_le(&at[entry::SCALE..]);
            if !(scale > prior_scale) {
                return Outcome::failure(format!(
                    "LAYER_EXTENTS [{index}] failed validation: the scale of a layer shall be \
                     greater than zero and any subsequent layer shall have a scale greater than \
                     the previous scale"
                ));
            }
            prior_scale = scale;

            if self.block.version > EXTENSION_1_0 {
                // v2+ per-entry validations are added here once defined.
            }
        }

        outcome
    }

    /// Read the layer extents, deriving each entry's downsample factor
    /// against the maximum scale in the array.
    pub fn read<R: ByteRegion + ?Sized>(
        &self,
        region: &R,
    ) -> Result<Vec<LayerExtent>, ExtensionError> {
        let (stride, entries) = self.array_header(region)?;

        let start = self.block.offset + LAYER_EXTENTS_HEADER_SIZE;
        let body_len = entries as u64 * stride as u64;
        if start + body_len > self.block.file_size {
            return Err(ExtensionError::Structural(format!(
                "layer extents array ({start}-{} bytes) extends beyond the end of the file",
                start + body_len
            )));
        }
        let body = region
            .slice(start, body_len)
            .map_err(|e| ExtensionError::Structural(format!("LAYER_EXTENTS unreadable: {e}")))?;

        let mut extents = Vec::with_capacity(entries as usize);
        for index in 0..entries as usize {
            let at = &body[index * stride as usize..];
            extents.push(LayerExtent {
                x_tiles: read_u32_le(&at[entry::X_TILES..]),
                y_tiles: read_u32_le(&at[entry::Y_TILES..]),
                scale: read_f32_le(&at[entry::SCALE..]),
                downsample: 0.0,
            });

            if self.block.version > EXTENSION_1_0 {
                // v2+ per-entry fields are read here once defined.
            }
        }

        if let Some(max_scale) = extents.last().map(|extent| extent.scale) {
            for extent in &mut extents {
                extent.downsample = max_scale / extent.scale;
            }
        }

        Ok(extents)
    }

    fn array_header<R: ByteRegion + ?Sized>(
        &self,
        region: &R,
    ) -> Result<(u16, u32), ExtensionError> {
        let bytes = region
            .slice(self.block.offset, LAYER_EXTENTS_HEADER_SIZE)
            .map_err(|e| ExtensionError::Structural(format!("LAYER_EXTENTS unreadable: {e}")))?;
        Ok((
            read_u16_le(&bytes[field::ENTRY_SIZE..]),
            read_u32_le(&bytes[field::ENTRY_NUMBER..]),
        ))
    }
}

// =============================================================================
// Writer
// =============================================================================

/// Total bytes required to store `extents`.
pub fn size_layer_extents(extents: &[LayerExtent]) -> u64 {
    LAYER_EXTENTS_HEADER_SIZE + extents.len() as u64 * entry::SIZE as u64
}

/// Store the layer extents array at `offset`.
pub fn store_layer_extents(
    base: &mut [u8],
    offset: u64,
    extents: &[LayerExtent],
) -> Result<(), ExtensionError> {
    if offset == NULL_OFFSET {
        return Err(ExtensionError::Invariant(String::from(
            "store_layer_extents: NULL_OFFSET provided as location",
        )));
    }
    if extents.len() as u64 > u32::MAX as u64 {
        return Err(ExtensionError::Invariant(format!(
            "store_layer_extents: extents array length ({}) exceeds the 32-bit limit; the number \
             of layers shall be less than the 32-bit max value",
            extents.len()
        )));
    }
    let total = size_layer_extents(extents);
    if offset + total > base.len() as u64 {
        return Err(ExtensionError::Structural(format!(
            "store_layer_extents: block {offset}..{} extends beyond the region ({} bytes)",
            offset + total,
            base.len()
        )));
    }

    datablock::store_prologue(base, offset, Recovery::LayerExtents);
    let at = offset as usize;
    write_u16_le(&mut base[at + field::ENTRY_SIZE..], entry::SIZE as u16);
    write_u32_le(&mut base[at + field::ENTRY_NUMBER..], extents.len() as u32);

    let mut cursor = at + field::HEADER_V1_0_SIZE;
    for extent in extents {
        write_u32_le(&mut base[cursor + entry::X_TILES..], extent.x_tiles);
        write_u32_le(&mut base[cursor + entry::Y_TILES..], extent.y_tiles);
        write_f32_le(&mut base[cursor + entry::SCALE..], extent.scale);
        cursor += entry::SIZE;
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
