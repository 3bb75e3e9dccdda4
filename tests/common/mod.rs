//! Shared fixtures: slide files built through the writers with a simple
//! sequential layout planner.
//!
//! The engine never chooses offsets; these helpers play the role of the
//! encoder's layout pass, placing each block back to back and storing
//! children before the parents that reference them.

use std::collections::BTreeMap;

use iris_extension::{
    size_annotation_array, size_annotation_bytes, size_annotation_group_bytes,
    size_annotation_group_sizes, size_attribute_bytes, size_attribute_sizes, size_icc_profile,
    size_image_array, size_image_bytes, size_layer_extents, size_tile_offsets,
    store_annotation_array, store_annotation_bytes, store_annotation_group_bytes,
    store_annotation_group_sizes, store_attribute_bytes, store_attribute_sizes, store_attributes,
    store_file_header, store_icc_profile, store_image_array, store_image_bytes,
    store_layer_extents, store_metadata, store_tile_offsets, store_tile_table,
    AnnotationArrayCreateInfo, AnnotationEntryInfo, AnnotationFormat, AnnotationGroupInfo,
    AttributeFormat, Attributes, AttributesCreateInfo, CodecVersion, HeaderCreateInfo,
    ImageArrayCreateInfo, ImageArrayEntry, ImageBytesCreateInfo, ImageEncoding, LayerExtent,
    MetadataCreateInfo, PixelFormat, TileEncoding, TileEntry, TileTableCreateInfo,
    ATTRIBUTES_SIZE, FILE_HEADER_SIZE, METADATA_SIZE, NULL_ID, NULL_OFFSET, TILE_TABLE_SIZE,
};

/// Offsets of every block in a fixture slide.
#[derive(Debug, Clone, Default)]
pub struct Layout {
    pub file_size: u64,
    pub tile_table: u64,
    pub layer_extents: u64,
    pub tile_offsets: u64,
    pub tile_payloads: Vec<u64>,
    pub metadata: u64,
    pub attributes: u64,
    pub attribute_sizes: u64,
    pub attribute_bytes: u64,
    pub image_bytes: Vec<u64>,
    pub image_array: u64,
    pub icc_profile: u64,
    pub annotation_bytes: Vec<u64>,
    pub group_sizes: u64,
    pub group_bytes: u64,
    pub annotations: u64,
}

/// The minimal valid slide from the format's smoke scenario: a 256-byte file
/// holding one 1x1 layer with a single sparse tile and bare metadata.
pub fn minimal_slide() -> (Vec<u8>, Layout) {
    let mut layout = Layout {
        file_size: 0x100,
        tile_table: FILE_HEADER_SIZE,
        ..Layout::default()
    };
    layout.layer_extents = layout.tile_table + TILE_TABLE_SIZE;

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

    layout.tile_offsets = layout.layer_extents + size_layer_extents(&extents);
    layout.metadata = layout.tile_offsets + size_tile_offsets(&layers);
    assert!(layout.metadata + METADATA_SIZE <= layout.file_size);

    let mut buf = vec![0u8; layout.file_size as usize];
    store_layer_extents(&mut buf, layout.layer_extents, &extents).unwrap();
    store_tile_offsets(&mut buf, layout.tile_offsets, &layers).unwrap();
    store_tile_table(
        &mut buf,
        &TileTableCreateInfo {
            tile_table_offset: layout.tile_table,
            encoding: TileEncoding::Jpeg,
            format: Some(PixelFormat::Rgba8),
            tiles_offset: layout.tile_offsets,
            layer_extents_offset: layout.layer_extents,
            width_pixels: 256,
            height_pixels: 256,
        },
    )
    .unwrap();
    store_metadata(
        &mut buf,
        &MetadataCreateInfo {
            metadata_offset: layout.metadata,
            microns_per_pixel: 0.25,
            magnification: 20.0,
            ..Default::default()
        },
    )
    .unwrap();
    store_file_header(
        &mut buf,
        &HeaderCreateInfo {
            file_size: layout.file_size,
            revision: 0,
            tile_table_offset: layout.tile_table,
            metadata_offset: layout.metadata,
        },
    )
    .unwrap();

    (buf, layout)
}

/// Everything the format can carry: two pyramid layers (one sparse slot),
/// attributes, two associated images, an ICC profile, and two grouped
/// annotations.
pub fn full_slide() -> (Vec<u8>, Layout) {
    let extents = vec![
        LayerExtent {
            x_tiles: 1,
            y_tiles: 1,
            scale: 1.0,
            downsample: 1.0,
        },
        LayerExtent {
            x_tiles: 2,
            y_tiles: 2,
            scale: 4.0,
            downsample: 1.0,
        },
    ];

    let mut attributes = Attributes {
        format: AttributeFormat::I2s,
        version: 0,
        entries: BTreeMap::new(),
    };
    attributes
        .entries
        .insert(String::from("PatientID"), b"X1".to_vec());
    attributes
        .entries
        .insert(String::from("StainType"), b"H&E".to_vec());

    // Built in sorted-title order so a sorted re-store reproduces the bytes.
    let images: Vec<(&str, Vec<u8>, u32, u32, ImageEncoding)> = vec![
        ("label", vec![0x50; 32], 40, 30, ImageEncoding::Png),
        ("macro", vec![0x4A; 48], 80, 60, ImageEncoding::Jpeg),
    ];

    let icc_profile = b"acspAPPL fixture profile".to_vec();

    let annotation_payloads: Vec<(u32, &[u8], AnnotationFormat)> = vec![
        (0x000123, b"<svg/>", AnnotationFormat::Svg),
        (0x000456, b"free text", AnnotationFormat::Text),
    ];
    let groups = vec![AnnotationGroupInfo {
        label: String::from("tumor"),
        members: vec![0x000123, 0x000456],
    }];

    // Layout pass: children first, back to back from the header.
    let mut layout = Layout {
        tile_table: FILE_HEADER_SIZE,
        ..Layout::default()
    };
    let mut cursor = layout.tile_table + TILE_TABLE_SIZE;

    layout.layer_extents = cursor;
    cursor += size_layer_extents(&extents);

    // Five tile slots: one on the low-resolution layer, four on the base
    // layer; the final base tile is left sparse.
    let tile_data: Vec<Option<Vec<u8>>> = vec![
        Some(vec![0x11; 64]),
        Some(vec![0x22; 64]),
        Some(vec![0x33; 64]),
        Some(vec![0x44; 64]),
        None,
    ];
    let mut tile_entries: Vec<TileEntry> = Vec::new();
    layout.tile_offsets = cursor;
    cursor += 16 + tile_data.len() as u64 * 8;
    for payload in &tile_data {
        match payload {
            Some(data) => {
                layout.tile_payloads.push(cursor);
                tile_entries.push(TileEntry {
                    offset: cursor,
                    size: data.len() as u32,
                });
                cursor += data.len() as u64;
            }
            None => tile_entries.push(TileEntry {
                offset: NULL_OFFSET,
                size: 0,
            }),
        }
    }
    let layers = vec![tile_entries[..1].to_vec(), tile_entries[1..].to_vec()];

    layout.metadata = cursor;
    cursor += METADATA_SIZE;

    layout.attributes = cursor;
    cursor += ATTRIBUTES_SIZE;
    layout.attribute_sizes = cursor;
    cursor += size_attribute_sizes(&attributes);
    layout.attribute_bytes = cursor;
    cursor += size_attribute_bytes(&attributes);

    for (title, data, _, _, _) in &images {
        layout.image_bytes.push(cursor);
        cursor += size_image_bytes(&ImageBytesCreateInfo {
            offset: cursor,
            title,
            data: data.as_slice(),
        });
    }
    layout.image_array = cursor;
    let image_entries: Vec<ImageArrayEntry> = images
        .iter()
        .zip(&layout.image_bytes)
        .map(|((_, _, width, height, encoding), &bytes_offset)| ImageArrayEntry {
            bytes_offset,
            width: *width,
            height: *height,
            encoding: *encoding,
            format: PixelFormat::Rgb8,
            orientation: 0,
        })
        .collect();
    cursor += size_image_array(&ImageArrayCreateInfo {
        offset: layout.image_array,
        images: image_entries.clone(),
    });

    layout.icc_profile = cursor;
    cursor += size_icc_profile(&icc_profile);

    for (_, data, _) in &annotation_payloads {
        layout.annotation_bytes.push(cursor);
        cursor += size_annotation_bytes(data);
    }
    layout.group_sizes = cursor;
    cursor += size_annotation_group_sizes(&groups);
    layout.group_bytes = cursor;
    cursor += size_annotation_group_bytes(&groups);

    layout.annotations = cursor;
    let annotation_entries: Vec<AnnotationEntryInfo> = annotation_payloads
        .iter()
        .zip(&layout.annotation_bytes)
        .map(|((identifier, _, format), &bytes_offset)| AnnotationEntryInfo {
            identifier: *identifier,
            bytes_offset,
            format: *format,
            x_location: 12.0,
            y_location: 34.0,
            x_size: 5.0,
            y_size: 6.0,
            width: 320,
            height: 240,
            parent: NULL_ID,
        })
        .collect();
    cursor += size_annotation_array(&AnnotationArrayCreateInfo {
        offset: layout.annotations,
        group_sizes_offset: layout.group_sizes,
        group_bytes_offset: layout.group_bytes,
        annotations: annotation_entries.clone(),
    });

    layout.file_size = cursor;
    let mut buf = vec![0u8; layout.file_size as usize];

    // Store pass: leaves up to the header.
    store_layer_extents(&mut buf, layout.layer_extents, &extents).unwrap();
    store_tile_offsets(&mut buf, layout.tile_offsets, &layers).unwrap();
    for (payload, &offset) in tile_data.iter().flatten().zip(&layout.tile_payloads) {
        buf[offset as usize..offset as usize + payload.len()].copy_from_slice(payload);
    }
    store_tile_table(
        &mut buf,
        &TileTableCreateInfo {
            tile_table_offset: layout.tile_table,
            encoding: TileEncoding::Jpeg,
            format: Some(PixelFormat::Rgb8),
            tiles_offset: layout.tile_offsets,
            layer_extents_offset: layout.layer_extents,
            width_pixels: 512,
            height_pixels: 512,
        },
    )
    .unwrap();

    store_attribute_sizes(&mut buf, layout.attribute_sizes, &attributes).unwrap();
    store_attribute_bytes(&mut buf, layout.attribute_bytes, &attributes).unwrap();
    store_attributes(
        &mut buf,
        &AttributesCreateInfo {
            attributes_offset: layout.attributes,
            format: attributes.format,
            version: attributes.version,
            sizes: layout.attribute_sizes,
            bytes: layout.attribute_bytes,
        },
    )
    .unwrap();

    for ((title, data, _, _, _), &offset) in images.iter().zip(&layout.image_bytes) {
        store_image_bytes(
            &mut buf,
            &ImageBytesCreateInfo {
                offset,
                title,
                data: data.as_slice(),
            },
        )
        .unwrap();
    }
    store_image_array(
        &mut buf,
        &ImageArrayCreateInfo {
            offset: layout.image_array,
            images: image_entries,
        },
    )
    .unwrap();

    store_icc_profile(&mut buf, layout.icc_profile, &icc_profile).unwrap();

    for ((_, data, _), &offset) in annotation_payloads.iter().zip(&layout.annotation_bytes) {
        store_annotation_bytes(&mut buf, offset, data).unwrap();
    }
    store_annotation_group_sizes(&mut buf, layout.group_sizes, &groups).unwrap();
    store_annotation_group_bytes(&mut buf, layout.group_bytes, &groups).unwrap();
    store_annotation_array(
        &mut buf,
        &AnnotationArrayCreateInfo {
            offset: layout.annotations,
            group_sizes_offset: layout.group_sizes,
            group_bytes_offset: layout.group_bytes,
            annotations: annotation_entries,
        },
    )
    .unwrap();

    store_metadata(
        &mut buf,
        &MetadataCreateInfo {
            metadata_offset: layout.metadata,
            codec_version: CodecVersion {
                major: 2025,
                minor: 1,
                build: 0,
            },
            attributes: layout.attributes,
            images: layout.image_array,
            icc_profile: layout.icc_profile,
            annotations: layout.annotations,
            microns_per_pixel: 0.5,
            magnification: 20.0,
        },
    )
    .unwrap();

    store_file_header(
        &mut buf,
        &HeaderCreateInfo {
            file_size: layout.file_size,
            revision: 2,
            tile_table_offset: layout.tile_table,
            metadata_offset: layout.metadata,
        },
    )
    .unwrap();

    (buf, layout)
}
