//! Associated images: the image array and per-image byte stream blocks.
//!
//! Associated images are the non-tile ancillary pictures of a slide (label,
//! macro, thumbnail). Each array entry carries display parameters and the
//! offset of an image bytes block, which stores a short ASCII title followed
//! by the compressed byte stream. Titles are the lookup key and must be
//! unique; a duplicate is skipped with a warning rather than failing the
//! read.

use tracing::warn;

use crate::error::{ExtensionError, Outcome};
use crate::format::abstraction::{AssociatedImage, AssociatedImages};
use crate::format::datablock::{self, DataBlock, Recovery};
use crate::format::{ImageEncoding, PixelFormat, EXTENSION_1_0, NULL_OFFSET};
use crate::io::codec::{
    read_u16_le, read_u32_le, read_u64_le, read_u8, write_u16_le, write_u32_le, write_u64_le,
    write_u8,
};
use crate::io::region::ByteRegion;

/// Image array header field layout.
pub(crate) mod field {
    use crate::format::datablock::prologue;

    pub const ENTRY_SIZE: usize = prologue::SIZE;
    pub const ENTRY_SIZE_S: usize = 2;
    pub const ENTRY_NUMBER: usize = ENTRY_SIZE + ENTRY_SIZE_S;
    pub const ENTRY_NUMBER_S: usize = 4;
    pub const HEADER_V1_0_SIZE: usize = ENTRY_NUMBER + ENTRY_NUMBER_S;
    // Version 1.0 ends here; later fields are added behind the version gate.
}

/// Image array per-entry field layout.
pub(crate) mod entry {
    pub const BYTES_OFFSET: usize = 0;
    pub const BYTES_OFFSET_S: usize = 8;
    pub const WIDTH: usize = BYTES_OFFSET + BYTES_OFFSET_S;
    pub const WIDTH_S: usize = 4;
    pub const HEIGHT: usize = WIDTH + WIDTH_S;
    pub const HEIGHT_S: usize = 4;
    pub const ENCODING: usize = HEIGHT + HEIGHT_S;
    pub const ENCODING_S: usize = 1;
    pub const FORMAT: usize = ENCODING + ENCODING_S;
    pub const FORMAT_S: usize = 1;
    pub const ORIENTATION: usize = FORMAT + FORMAT_S;
    pub const ORIENTATION_S: usize = 2;
    pub const SIZE: usize = ORIENTATION + ORIENTATION_S;
    // Version 1.0 ends here; later fields are added behind the version gate.
}

/// Image bytes header field layout.
pub(crate) mod bytes_field {
    use crate::format::datablock::prologue;

    pub const TITLE_SIZE: usize = prologue::SIZE;
    pub const TITLE_SIZE_S: usize = 2;
    pub const IMAGE_SIZE: usize = TITLE_SIZE + TITLE_SIZE_S;
    pub const IMAGE_SIZE_S: usize = 4;
    pub const HEADER_V1_0_SIZE: usize = IMAGE_SIZE + IMAGE_SIZE_S;
    // Version 1.0 ends here; later fields are added behind the version gate.
}

/// Byte length of the version 1.0 image array header.
pub const IMAGE_ARRAY_HEADER_SIZE: u64 = field::HEADER_V1_0_SIZE as u64;

/// Byte length of the version 1.0 image bytes header.
pub const IMAGE_BYTES_HEADER_SIZE: u64 = bytes_field::HEADER_V1_0_SIZE as u64;

// =============================================================================
// ImageArrayBlock
// =============================================================================

/// Reader for the associated image array block.
#[derive(Debug, Clone, Copy)]
pub struct ImageArrayBlock {
    pub(crate) block: DataBlock,
}

impl ImageArrayBlock {
    pub fn new(offset: u64, file_size: u64, version: u32) -> Self {
        ImageArrayBlock {
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
        Ok(IMAGE_ARRAY_HEADER_SIZE + entries as u64 * stride as u64)
    }

    /// Validate the block prologue.
    pub fn validate_offset<R: ByteRegion + ?Sized>(&self, region: &R) -> Outcome {
        self.block
            .validate_offset(region, "IMAGE_ARRAY", Recovery::ImageArray)
    }

    /// Validate the prologue, every entry's enumerators, and every
    /// referenced image bytes block.
    pub fn validate_full<R: ByteRegion + ?Sized>(&self, region: &R) -> Outcome {
        let mut outcome = self.validate_offset(region);
        if outcome.is_failure() {
            return outcome;
        }

        let (stride, entries) = match self.array_header(region) {
            Ok(header) => header,
            Err(e) => return Outcome::validation_failure(e.to_string()),
        };

        let start = self.block.offset + IMAGE_ARRAY_HEADER_SIZE;
        let body_len = entries as u64 * stride as u64;
        if start + body_len > self.block.file_size {
            return Outcome::failure(format!(
                "IMAGE_ARRAY failed validation: entry array ({start}-{} bytes) extends beyond \
                 the end of the file",
                start + body_len
            ));
        }
        let body = match region.slice(start, body_len) {
            Ok(body) => body,
            Err(e) => return Outcome::failure(format!("IMAGE_ARRAY unreadable: {e}")),
        };

        for index in 0..entries as usize {
            let at = &body[index * stride as usize..];

            let bytes = ImageBytesBlock::new(
                read_u64_le(&at[entry::BYTES_OFFSET..]),
                self.block.file_size,
                self.block.version,
            );
            let result = bytes.validate_offset(region);
            if result.is_failure() {
                return result;
            }
            let result = bytes.validate_full(region);
            if result.is_failure() {
                return result;
            }
            outcome = outcome.merge(result);

            let encoding = read_u8(&at[entry::ENCODING..]);
            if !ImageEncoding::accepted(encoding, self.block.version) {
                return Outcome::failure(format!(
                    "undefined associated image encoding ({encoding}) decoded from the image \
                     array; the encoding shall name the compression codec and be one of the \
                     defined values, excluding the undefined value (0)"
                ));
            }
            let format = read_u8(&at[entry::FORMAT..]);
            if !PixelFormat::accepted(format, self.block.version) {
                return Outcome::failure(format!(
                    "undefined associated image pixel format ({format}) decoded from the image \
                     array; the format shall describe the pixel channel ordering and be one of \
                     the defined values, excluding the undefined value (0)"
                ));
            }

            if self.block.version > EXTENSION_1_0 {
                // v2+ per-entry validations are added here once defined.
            }
        }

        outcome
    }

    /// Read the title-to-image map. Duplicate titles warn and are skipped.
    ///
    /// When `collect` is supplied, the descriptor of each image bytes block
    /// is pushed onto it (the file map uses this to enumerate byte streams).
    pub fn read<R: ByteRegion + ?Sized>(
        &self,
        region: &R,
        mut collect: Option<&mut Vec<ImageBytesBlock>>,
    ) -> Result<AssociatedImages, ExtensionError> {
        let (stride, entries) = self.array_header(region)?;

        let start = self.block.offset + IMAGE_ARRAY_HEADER_SIZE;
        let body_len = entries as u64 * stride as u64;
        if start + body_len > self.block.file_size {
            return Err(ExtensionError::Structural(format!(
                "image array ({start}-{} bytes) extends beyond the end of the file",
                start + body_len
            )));
        }
        let body = region
            .slice(start, body_len)
            .map_err(|e| ExtensionError::Structural(format!("IMAGE_ARRAY unreadable: {e}")))?;

        let mut images = AssociatedImages::new();
        for index in 0..entries as usize {
            let at = &body[index * stride as usize..];

            let bytes_offset = read_u64_le(&at[entry::BYTES_OFFSET..]);
            if bytes_offset == NULL_OFFSET {
                return Err(ExtensionError::Structural(String::from(
                    "image array entry contains an invalid (null) byte stream offset",
                )));
            }
            if bytes_offset > self.block.file_size {
                return Err(ExtensionError::Structural(String::from(
                    "image array entry byte stream offset is out of file bounds",
                )));
            }

            let bytes_block =
                ImageBytesBlock::new(bytes_offset, self.block.file_size, self.block.version);
            bytes_block.validate_offset(region).into_result()?;
            if let Some(ref mut blocks) = collect {
                blocks.push(bytes_block);
            }

            let (title, offset, byte_size) = bytes_block.read(region)?;
            if images.contains_key(&title) {
                warn!(
                    "duplicate associated image title ({title}); skipping duplicate: each image \
                     within the associated images array shall carry a unique ASCII label"
                );
                continue;
            }

            let encoding_raw = read_u8(&at[entry::ENCODING..]);
            let encoding = ImageEncoding::from_u8(encoding_raw)
                .filter(|_| ImageEncoding::accepted(encoding_raw, self.block.version))
                .ok_or_else(|| {
                    ExtensionError::Enumerator(format!(
                        "undefined associated image encoding ({encoding_raw}) decoded from the \
                         image array"
                    ))
                })?;
            let format_raw = read_u8(&at[entry::FORMAT..]);
            let format = PixelFormat::from_u8(format_raw)
                .filter(|_| PixelFormat::accepted(format_raw, self.block.version))
                .ok_or_else(|| {
                    ExtensionError::Enumerator(format!(
                        "undefined associated image source format ({format_raw}) decoded from \
                         the image array"
                    ))
                })?;

            // Orientation is a u16 in degrees; values outside the cardinal
            // rotations are permitted, so only the modulus is applied.
            let orientation = read_u16_le(&at[entry::ORIENTATION..]) % 360;

            images.insert(
                title,
                AssociatedImage {
                    offset,
                    byte_size,
                    width: read_u32_le(&at[entry::WIDTH..]),
                    height: read_u32_le(&at[entry::HEIGHT..]),
                    encoding,
                    format,
                    orientation,
                },
            );

            if self.block.version > EXTENSION_1_0 {
                // v2+ per-entry fields are read here once defined.
            }
        }

        Ok(images)
    }

    fn array_header<R: ByteRegion + ?Sized>(
        &self,
        region: &R,
    ) -> Result<(u16, u32), ExtensionError> {
        let bytes = region
            .slice(self.block.offset, IMAGE_ARRAY_HEADER_SIZE)
            .map_err(|e| ExtensionError::Structural(format!("IMAGE_ARRAY unreadable: {e}")))?;
        Ok((
            read_u16_le(&bytes[field::ENTRY_SIZE..]),
            read_u32_le(&bytes[field::ENTRY_NUMBER..]),
        ))
    }
}

// =============================================================================
// ImageBytesBlock
// =============================================================================

/// Reader for one image bytes block: title plus compressed stream.
#[derive(Debug, Clone, Copy)]
pub struct ImageBytesBlock {
    pub(crate) block: DataBlock,
}

impl ImageBytesBlock {
    pub fn new(offset: u64, file_size: u64, version: u32) -> Self {
        ImageBytesBlock {
            block: DataBlock::new(offset, file_size, version),
        }
    }

    #[inline]
    pub fn offset(&self) -> u64 {
        self.block.offset
    }

    /// Total block size: header plus title plus image bytes.
    pub fn size<R: ByteRegion + ?Sized>(&self, region: &R) -> Result<u64, ExtensionError> {
        let (title, image) = self.declared_sizes(region)?;
        Ok(IMAGE_BYTES_HEADER_SIZE + title as u64 + image as u64)
    }

    /// Validate the block prologue.
    pub fn validate_offset<R: ByteRegion + ?Sized>(&self, region: &R) -> Outcome {
        self.block
            .validate_offset(region, "IMAGE_BYTES", Recovery::ImageBytes)
    }

    /// Validate the prologue, the nonzero title and image lengths, and the
    /// body bounds.
    pub fn validate_full<R: ByteRegion + ?Sized>(&self, region: &R) -> Outcome {
        let outcome = self.validate_offset(region);
        if outcome.is_failure() {
            return outcome;
        }

        let (title, image) = match self.declared_sizes(region) {
            Ok(sizes) => sizes,
            Err(e) => return Outcome::validation_failure(e.to_string()),
        };
        if title == 0 {
            return Outcome::validation_failure(
                "associated image title failed validation: the title size shall encode a length \
                 greater than zero of a valid and unique image label",
            );
        }
        if image == 0 {
            return Outcome::validation_failure(
                "associated image bytes failed validation: the image size shall encode a length, \
                 in bytes, greater than zero of a valid encoded image byte stream",
            );
        }
        if self.block.offset + IMAGE_BYTES_HEADER_SIZE + title as u64 + image as u64
            > self.block.file_size
        {
            return Outcome::failure(format!(
                "IMAGE_BYTES failed validation: image bytes block (location {}-{} bytes) extends \
                 beyond the end of file",
                self.block.offset,
                self.block.offset + IMAGE_BYTES_HEADER_SIZE + title as u64 + image as u64
            ));
        }

        outcome
    }

    /// Read the title and the payload handle: `(title, offset, byte_size)`.
    ///
    /// The compressed image bytes are not copied; `offset` points directly
    /// at them within the region.
    pub fn read<R: ByteRegion + ?Sized>(
        &self,
        region: &R,
    ) -> Result<(String, u64, u32), ExtensionError> {
        let (title_size, image_size) = self.declared_sizes(region)?;
        if title_size == 0 {
            return Err(ExtensionError::Invariant(String::from(
                "associated image title size must be greater than zero",
            )));
        }
        if image_size == 0 {
            return Err(ExtensionError::Invariant(String::from(
                "associated image byte size must be greater than zero",
            )));
        }

        let title_start = self.block.offset + IMAGE_BYTES_HEADER_SIZE;
        let payload_start = title_start + title_size as u64;
        if payload_start + image_size as u64 > self.block.file_size {
            return Err(ExtensionError::Structural(format!(
                "image bytes block ({title_start}-{} bytes) extends beyond the end of the file",
                payload_start + image_size as u64
            )));
        }

        let title_bytes = region
            .slice(title_start, title_size as u64)
            .map_err(|e| ExtensionError::Structural(format!("IMAGE_BYTES unreadable: {e}")))?;
        let title = String::from_utf8_lossy(title_bytes).into_owned();

        if self.block.version > EXTENSION_1_0 {
            // v2+ image bytes fields are read here once defined.
        }

        Ok((title, payload_start, image_size))
    }

    fn declared_sizes<R: ByteRegion + ?Sized>(
        &self,
        region: &R,
    ) -> Result<(u16, u32), ExtensionError> {
        let bytes = region
            .slice(self.block.offset, IMAGE_BYTES_HEADER_SIZE)
            .map_err(|e| ExtensionError::Structural(format!("IMAGE_BYTES unreadable: {e}")))?;
        Ok((
            read_u16_le(&bytes[bytes_field::TITLE_SIZE..]),
            read_u32_le(&bytes[bytes_field::IMAGE_SIZE..]),
        ))
    }
}

// =============================================================================
// Writers
// =============================================================================

/// One entry of an image array to be stored.
#[derive(Debug, Clone, Copy)]
pub struct ImageArrayEntry {
    /// Offset of the already-stored image bytes block.
    pub bytes_offset: u64,
    pub width: u32,
    pub height: u32,
    pub encoding: ImageEncoding,
    pub format: PixelFormat,
    /// Display rotation in degrees; stored modulo 360.
    pub orientation: u16,
}

/// Parameters for storing an image array block.
#[derive(Debug, Clone)]
pub struct ImageArrayCreateInfo {
    /// Offset at which the image array itself is stored.
    pub offset: u64,
    pub images: Vec<ImageArrayEntry>,
}

/// Total bytes required to store `info`'s image array.
pub fn size_image_array(info: &ImageArrayCreateInfo) -> u64 {
    IMAGE_ARRAY_HEADER_SIZE + info.images.len() as u64 * entry::SIZE as u64
}

/// Store an image array block at `info.offset`.
pub fn store_image_array(base: &mut [u8], info: &ImageArrayCreateInfo) -> Result<(), ExtensionError> {
    if info.offset == NULL_OFFSET {
        return Err(ExtensionError::Invariant(String::from(
            "store_image_array: NULL_OFFSET provided as location",
        )));
    }
    if info.images.len() as u64 > u32::MAX as u64 {
        return Err(ExtensionError::Invariant(format!(
            "store_image_array: array too large ({}); the number of associated images must be \
             less than the 32-bit max value",
            info.images.len()
        )));
    }
    let total = size_image_array(info);
    if info.offset + total > base.len() as u64 {
        return Err(ExtensionError::Structural(format!(
            "store_image_array: block {}..{} extends beyond the region ({} bytes)",
            info.offset,
            info.offset + total,
            base.len()
        )));
    }

    datablock::store_prologue(base, info.offset, Recovery::ImageArray);
    let at = info.offset as usize;
    write_u16_le(&mut base[at + field::ENTRY_SIZE..], entry::SIZE as u16);
    write_u32_le(&mut base[at + field::ENTRY_NUMBER..], info.images.len() as u32);

    let mut cursor = at + field::HEADER_V1_0_SIZE;
    for image in &info.images {
        if image.bytes_offset == NULL_OFFSET {
            return Err(ExtensionError::Invariant(String::from(
                "store_image_array: NULL_OFFSET provided as an image byte stream location",
            )));
        }
        if image.width == 0 {
            return Err(ExtensionError::Invariant(String::from(
                "store_image_array: the width shall encode the horizontal pixel extent of the \
                 encoded image and shall be greater than zero",
            )));
        }
        if image.height == 0 {
            return Err(ExtensionError::Invariant(String::from(
                "store_image_array: the height shall encode the vertical pixel extent of the \
                 encoded image and shall be greater than zero",
            )));
        }
        write_u64_le(&mut base[cursor + entry::BYTES_OFFSET..], image.bytes_offset);
        write_u32_le(&mut base[cursor + entry::WIDTH..], image.width);
        write_u32_le(&mut base[cursor + entry::HEIGHT..], image.height);
        write_u8(&mut base[cursor + entry::ENCODING..], image.encoding as u8);
        write_u8(&mut base[cursor + entry::FORMAT..], image.format as u8);
        write_u16_le(&mut base[cursor + entry::ORIENTATION..], image.orientation % 360);
        cursor += entry::SIZE;
    }
    Ok(())
}

/// Parameters for storing one image bytes block.
#[derive(Debug, Clone, Copy)]
pub struct ImageBytesCreateInfo<'a> {
    /// Offset at which the bytes block is stored.
    pub offset: u64,
    /// Unique ASCII title; must be nonempty and under 64 KiB.
    pub title: &'a str,
    /// Compressed image byte stream.
    pub data: &'a [u8],
}

/// Total bytes required to store `info`'s image bytes block.
pub fn size_image_bytes(info: &ImageBytesCreateInfo<'_>) -> u64 {
    IMAGE_BYTES_HEADER_SIZE + info.title.len() as u64 + info.data.len() as u64
}

/// Store an image bytes block at `info.offset`.
pub fn store_image_bytes(base: &mut [u8], info: &ImageBytesCreateInfo<'_>) -> Result<(), ExtensionError> {
    if info.offset == NULL_OFFSET {
        return Err(ExtensionError::Invariant(String::from(
            "store_image_bytes: NULL_OFFSET provided as location",
        )));
    }
    if info.title.is_empty() {
        return Err(ExtensionError::Invariant(String::from(
            "store_image_bytes: no title given; an associated image shall carry a valid and \
             unique title",
        )));
    }
    if info.title.len() > u16::MAX as usize {
        return Err(ExtensionError::Invariant(String::from(
            "store_image_bytes: title too long; an associated image title shall be shorter than \
             the 16-bit max",
        )));
    }
    if info.data.is_empty() {
        return Err(ExtensionError::Invariant(String::from(
            "store_image_bytes: no image data provided; the byte stream shall comprise a valid \
             array of compressed image bytes",
        )));
    }
    if info.data.len() as u64 > u32::MAX as u64 {
        return Err(ExtensionError::Invariant(String::from(
            "store_image_bytes: image too large; the byte stream shall be less than the 32-bit max",
        )));
    }
    let total = size_image_bytes(info);
    if info.offset + total > base.len() as u64 {
        return Err(ExtensionError::Structural(format!(
            "store_image_bytes: block {}..{} extends beyond the region ({} bytes)",
            info.offset,
            info.offset + total,
            base.len()
        )));
    }

    datablock::store_prologue(base, info.offset, Recovery::ImageBytes);
    let at = info.offset as usize;
    write_u16_le(&mut base[at + bytes_field::TITLE_SIZE..], info.title.len() as u16);
    write_u32_le(&mut base[at + bytes_field::IMAGE_SIZE..], info.data.len() as u32);

    let mut cursor = at + bytes_field::HEADER_V1_0_SIZE;
    base[cursor..cursor + info.title.len()].copy_from_slice(info.title.as_bytes());
    cursor += info.title.len();
    base[cursor..cursor + info.data.len()].copy_from_slice(info.data);
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
