//! Structural property tests: file-map enumeration, the self-offset
//! contract, re-store idempotence, and version tolerance.

mod common;

use common::{full_slide, minimal_slide};
use iris_extension::{
    abstract_file_structure, generate_file_map, store_annotation_array, store_annotation_bytes,
    store_annotation_group_bytes, store_annotation_group_sizes, store_attribute_bytes,
    store_attribute_sizes, store_attributes, store_file_header, store_icc_profile,
    store_image_array, store_image_bytes, store_layer_extents, store_metadata, store_tile_offsets,
    store_tile_table, validate_file_structure, AnnotationArrayCreateInfo, AnnotationEntryInfo,
    AnnotationGroupInfo, AttributesCreateInfo, BlockKind, HeaderCreateInfo, ImageArrayCreateInfo,
    ImageArrayEntry, ImageBytesCreateInfo, MetadataCreateInfo, Recovery, TileTableCreateInfo,
    EXTENSION_MINOR,
};

// =============================================================================
// File map
// =============================================================================

#[test]
fn test_file_map_enumerates_every_block() {
    let (buf, layout) = full_slide();
    let map = generate_file_map(&buf[..]).unwrap();

    assert_eq!(map.file_size, layout.file_size);

    let count_of = |kind: BlockKind| map.iter().filter(|(_, entry)| entry.kind == kind).count();
    assert_eq!(count_of(BlockKind::FileHeader), 1);
    assert_eq!(count_of(BlockKind::TileTable), 1);
    assert_eq!(count_of(BlockKind::LayerExtents), 1);
    assert_eq!(count_of(BlockKind::TileOffsets), 1);
    // Four dense tiles; the sparse slot is not mapped.
    assert_eq!(count_of(BlockKind::TileData), 4);
    assert_eq!(count_of(BlockKind::Metadata), 1);
    assert_eq!(count_of(BlockKind::Attributes), 1);
    assert_eq!(count_of(BlockKind::AttributeSizes), 1);
    assert_eq!(count_of(BlockKind::AttributeBytes), 1);
    assert_eq!(count_of(BlockKind::ImageArray), 1);
    assert_eq!(count_of(BlockKind::ImageBytes), 2);
    assert_eq!(count_of(BlockKind::IccProfile), 1);
    assert_eq!(count_of(BlockKind::Annotations), 1);
    assert_eq!(count_of(BlockKind::AnnotationBytes), 2);
    assert_eq!(count_of(BlockKind::AnnotationGroupSizes), 1);
    assert_eq!(count_of(BlockKind::AnnotationGroupBytes), 1);
    assert_eq!(map.len(), 21);

    // Entries are ordered and non-overlapping for this sequential layout.
    let mut last_end = 0u64;
    for (offset, entry) in map.iter() {
        assert!(*offset >= last_end, "block at {offset} overlaps previous");
        last_end = offset + entry.size;
    }
    assert!(last_end <= layout.file_size);

    // Specific offsets land where the layout planner put them.
    assert_eq!(map.get(layout.tile_table).unwrap().kind, BlockKind::TileTable);
    assert_eq!(map.get(layout.icc_profile).unwrap().kind, BlockKind::IccProfile);
    assert_eq!(
        map.get(layout.group_bytes).unwrap().kind,
        BlockKind::AnnotationGroupBytes
    );
}

#[test]
fn test_file_map_upper_bound_for_in_place_updates() {
    let (buf, layout) = full_slide();
    let map = generate_file_map(&buf[..]).unwrap();

    // A write at the metadata block must see the whole metadata subtree
    // (everything laid out at or after it).
    let clobbered: Vec<BlockKind> = map
        .at_or_after(layout.metadata)
        .map(|(_, entry)| entry.kind)
        .collect();
    assert_eq!(clobbered[0], BlockKind::Metadata);
    assert!(clobbered.contains(&BlockKind::Annotations));
    assert!(!clobbered.contains(&BlockKind::TileTable));
}

// =============================================================================
// Self-offset contract
// =============================================================================

#[test]
fn test_every_block_prologue_stores_its_own_offset() {
    let (buf, _) = full_slide();
    let map = generate_file_map(&buf[..]).unwrap();

    for (offset, entry) in map.iter() {
        match entry.kind {
            // The header opens with magic, tile payloads with codec bytes.
            BlockKind::FileHeader | BlockKind::TileData => continue,
            _ => {}
        }
        let at = *offset as usize;
        let stored = u64::from_le_bytes(buf[at..at + 8].try_into().unwrap());
        assert_eq!(stored, *offset, "{:?} self-offset mismatch", entry.kind);

        let tag = u16::from_le_bytes(buf[at + 8..at + 10].try_into().unwrap());
        assert!(
            Recovery::from_u16(tag).is_some(),
            "{:?} carries unregistered recovery tag {tag:#06X}",
            entry.kind
        );
    }
}

#[test]
fn test_stored_file_size_equals_backing_size() {
    let (buf, _) = full_slide();
    let stored = u64::from_le_bytes(buf[6..14].try_into().unwrap());
    assert_eq!(stored, buf.len() as u64);
}

// =============================================================================
// Re-store idempotence
// =============================================================================

/// Abstract a file, re-store every block at identical offsets using only the
/// read-back values, and abstract again: both the bytes and the abstractions
/// must match.
#[test]
fn test_abstract_store_abstract_is_identity() {
    let (buf, layout) = full_slide();
    let first = abstract_file_structure(&buf[..]).unwrap();

    let mut rebuilt = vec![0u8; buf.len()];

    // Tile payloads move as opaque bytes via their handles.
    for layer in &first.tile_table.layers {
        for tile in layer {
            if tile.is_sparse() {
                continue;
            }
            let src = tile.offset as usize..tile.offset as usize + tile.size as usize;
            rebuilt[src.clone()].copy_from_slice(&buf[src]);
        }
    }

    store_layer_extents(&mut rebuilt, layout.layer_extents, &first.tile_table.extent.layers)
        .unwrap();
    store_tile_offsets(&mut rebuilt, layout.tile_offsets, &first.tile_table.layers).unwrap();
    store_tile_table(
        &mut rebuilt,
        &TileTableCreateInfo {
            tile_table_offset: layout.tile_table,
            encoding: first.tile_table.encoding,
            format: Some(first.tile_table.format),
            tiles_offset: layout.tile_offsets,
            layer_extents_offset: layout.layer_extents,
            width_pixels: first.tile_table.extent.width,
            height_pixels: first.tile_table.extent.height,
        },
    )
    .unwrap();

    store_attribute_sizes(&mut rebuilt, layout.attribute_sizes, &first.metadata.attributes)
        .unwrap();
    store_attribute_bytes(&mut rebuilt, layout.attribute_bytes, &first.metadata.attributes)
        .unwrap();
    store_attributes(
        &mut rebuilt,
        &AttributesCreateInfo {
            attributes_offset: layout.attributes,
            format: first.metadata.attributes.format,
            version: first.metadata.attributes.version,
            sizes: layout.attribute_sizes,
            bytes: layout.attribute_bytes,
        },
    )
    .unwrap();

    // Associated images in sorted-title order, matching the fixture layout.
    let mut image_entries = Vec::new();
    for (index, title) in first.metadata.associated_images.iter().enumerate() {
        let image = &first.images[title];
        let payload =
            &buf[image.offset as usize..image.offset as usize + image.byte_size as usize];
        store_image_bytes(
            &mut rebuilt,
            &ImageBytesCreateInfo {
                offset: layout.image_bytes[index],
                title: title.as_str(),
                data: payload,
            },
        )
        .unwrap();
        image_entries.push(ImageArrayEntry {
            bytes_offset: layout.image_bytes[index],
            width: image.width,
            height: image.height,
            encoding: image.encoding,
            format: image.format,
            orientation: image.orientation,
        });
    }
    store_image_array(
        &mut rebuilt,
        &ImageArrayCreateInfo {
            offset: layout.image_array,
            images: image_entries,
        },
    )
    .unwrap();

    store_icc_profile(
        &mut rebuilt,
        layout.icc_profile,
        first.metadata.icc_profile.as_deref().unwrap(),
    )
    .unwrap();

    // Annotations in ascending-identifier order, matching the fixture.
    let mut annotation_entries = Vec::new();
    for (index, identifier) in first.metadata.annotations.iter().enumerate() {
        let annotation = &first.annotations.entries[identifier];
        let payload = &buf
            [annotation.offset as usize..annotation.offset as usize + annotation.byte_size as usize];
        store_annotation_bytes(&mut rebuilt, layout.annotation_bytes[index], payload).unwrap();
        annotation_entries.push(AnnotationEntryInfo {
            identifier: *identifier,
            bytes_offset: layout.annotation_bytes[index],
            format: annotation.format,
            x_location: annotation.x_location,
            y_location: annotation.y_location,
            x_size: annotation.x_size,
            y_size: annotation.y_size,
            width: annotation.width,
            height: annotation.height,
            parent: annotation.parent,
        });
    }

    // Group members are read back out of the group bytes block in place.
    let mut groups = Vec::new();
    for (label, group) in &first.annotations.groups {
        let mut members = Vec::new();
        for index in 0..group.member_count as usize {
            let at = group.offset as usize + index * 3;
            members.push(u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], 0]));
        }
        groups.push(AnnotationGroupInfo {
            label: label.clone(),
            members,
        });
    }
    store_annotation_group_sizes(&mut rebuilt, layout.group_sizes, &groups).unwrap();
    store_annotation_group_bytes(&mut rebuilt, layout.group_bytes, &groups).unwrap();
    store_annotation_array(
        &mut rebuilt,
        &AnnotationArrayCreateInfo {
            offset: layout.annotations,
            group_sizes_offset: layout.group_sizes,
            group_bytes_offset: layout.group_bytes,
            annotations: annotation_entries,
        },
    )
    .unwrap();

    store_metadata(
        &mut rebuilt,
        &MetadataCreateInfo {
            metadata_offset: layout.metadata,
            codec_version: first.metadata.codec,
            attributes: layout.attributes,
            images: layout.image_array,
            icc_profile: layout.icc_profile,
            annotations: layout.annotations,
            microns_per_pixel: first.metadata.microns_per_pixel,
            magnification: first.metadata.magnification,
        },
    )
    .unwrap();
    store_file_header(
        &mut rebuilt,
        &HeaderCreateInfo {
            file_size: layout.file_size,
            revision: first.header.revision,
            tile_table_offset: layout.tile_table,
            metadata_offset: layout.metadata,
        },
    )
    .unwrap();

    assert_eq!(rebuilt, buf, "re-stored bytes diverged from the original");

    let second = abstract_file_structure(&rebuilt[..]).unwrap();
    assert_eq!(first, second);
}

// =============================================================================
// Version tolerance
// =============================================================================

#[test]
fn test_newer_minor_version_reads_with_warning() {
    let (mut buf, _) = minimal_slide();

    // Pretend the file was written by extension 1.(minor+1).
    let newer = EXTENSION_MINOR + 1;
    buf[16..18].copy_from_slice(&newer.to_le_bytes());

    let outcome = validate_file_structure(&buf[..]);
    assert!(!outcome.is_failure(), "{}", outcome.message);
    assert!(outcome.is_warning());
    assert!(outcome.message.contains("older"), "{}", outcome.message);

    let slide = abstract_file_structure(&buf[..]).unwrap();
    assert_eq!(slide.header.extension_version & 0xFFFF, newer as u32);
    // Nothing beyond the 1.0 field set is surfaced.
    assert_eq!(slide.tile_table.extent.layers.len(), 1);
}
