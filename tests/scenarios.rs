//! End-to-end scenarios: complete files built through the writers, then
//! validated and read back through the public entry points.

mod common;

use common::{full_slide, minimal_slide};
use iris_extension::{
    abstract_file_structure, is_iris_file, store_layer_extents, validate_file_structure,
    AnnotationArrayCreateInfo, AnnotationEntryInfo, AnnotationFormat, AttributeFormat,
    ExtensionError, LayerExtent, NULL_ID, NULL_OFFSET,
};

// =============================================================================
// S1: minimal valid file
// =============================================================================

#[test]
fn test_minimal_file_validates_and_abstracts() {
    let (buf, layout) = minimal_slide();

    assert!(is_iris_file(&buf[..]));
    let outcome = validate_file_structure(&buf[..]);
    assert!(!outcome.is_failure(), "{}", outcome.message);
    assert!(!outcome.is_warning());

    let slide = abstract_file_structure(&buf[..]).unwrap();
    assert_eq!(slide.header.file_size, layout.file_size);
    assert_eq!(slide.header.revision, 0);

    // One 1x1 layer at unit scale.
    assert_eq!(slide.tile_table.extent.layers.len(), 1);
    let layer = &slide.tile_table.extent.layers[0];
    assert_eq!(layer.x_tiles, 1);
    assert_eq!(layer.y_tiles, 1);
    assert_eq!(layer.downsample, 1.0);

    // The single tile slot is sparse and surfaces as the null handle.
    assert_eq!(slide.tile_table.layers.len(), 1);
    let tile = slide.tile_table.layers[0][0];
    assert_eq!(tile.offset, NULL_OFFSET);
    assert_eq!(tile.size, 0);

    assert_eq!(slide.metadata.microns_per_pixel, 0.25);
    assert_eq!(slide.metadata.magnification, 20.0);
    assert!(slide.metadata.attributes.entries.is_empty());
    assert!(slide.images.is_empty());
    assert!(slide.annotations.entries.is_empty());
    assert!(slide.metadata.icc_profile.is_none());
}

// =============================================================================
// S2: truncated file (stored size disagrees with the backing size)
// =============================================================================

#[test]
fn test_stored_size_mismatch_fails_validation() {
    let (mut buf, _) = minimal_slide();

    // FILE_SIZE lives at byte 6 of the header.
    buf[6..14].copy_from_slice(&0x200u64.to_le_bytes());

    let outcome = validate_file_structure(&buf[..]);
    assert!(outcome.is_failure());
    assert!(outcome.message.contains("file size"), "{}", outcome.message);

    assert!(matches!(
        abstract_file_structure(&buf[..]),
        Err(ExtensionError::Validation(_))
    ));
}

// =============================================================================
// S3: corrupt self-offset
// =============================================================================

#[test]
fn test_corrupt_tile_table_self_offset_fails_validation() {
    let (mut buf, layout) = minimal_slide();

    // Overwrite the tile table's stored validation offset.
    let at = layout.tile_table as usize;
    buf[at..at + 8].copy_from_slice(&0u64.to_le_bytes());

    let outcome = validate_file_structure(&buf[..]);
    assert!(outcome.is_failure());
    assert!(outcome.message.contains("TILE_TABLE"), "{}", outcome.message);
}

// =============================================================================
// S4: attribute round trip
// =============================================================================

#[test]
fn test_attribute_round_trip() {
    let (buf, _) = full_slide();

    let outcome = validate_file_structure(&buf[..]);
    assert!(!outcome.is_failure(), "{}", outcome.message);

    let slide = abstract_file_structure(&buf[..]).unwrap();
    let attributes = &slide.metadata.attributes;
    assert_eq!(attributes.format, AttributeFormat::I2s);
    assert_eq!(attributes.entries.len(), 2);
    assert_eq!(attributes.entries["PatientID"], b"X1");
    assert_eq!(attributes.entries["StainType"], b"H&E");
}

// =============================================================================
// S5: layer scale monotonicity violation
// =============================================================================

#[test]
fn test_equal_layer_scales_fail_validation() {
    let (mut buf, layout) = minimal_slide();

    // Rewrite the extents array with two equal scales; entry [1] violates
    // the strictly-increasing rule. The original single-entry block is the
    // same size as the header of the two-entry one, so borrow room from the
    // tail of the 256-byte file.
    let extents = vec![
        LayerExtent {
            x_tiles: 1,
            y_tiles: 1,
            scale: 1.0,
            downsample: 1.0,
        },
        LayerExtent {
            x_tiles: 1,
            y_tiles: 1,
            scale: 1.0,
            downsample: 1.0,
        },
    ];
    store_layer_extents(&mut buf, layout.layer_extents, &extents).unwrap();

    let outcome = validate_file_structure(&buf[..]);
    assert!(outcome.is_failure());
    assert!(outcome.message.contains("[1]"), "{}", outcome.message);
}

// =============================================================================
// S6: duplicate annotation identifier
// =============================================================================

#[test]
fn test_duplicate_annotation_identifier_warns_and_skips() {
    use iris_extension::{store_annotation_array, store_annotation_bytes};

    let mut buf = vec![0u8; 1024];
    store_annotation_bytes(&mut buf, 64, b"first").unwrap();
    store_annotation_bytes(&mut buf, 128, b"second").unwrap();

    let entry = |bytes_offset| AnnotationEntryInfo {
        identifier: 0x000123,
        bytes_offset,
        format: AnnotationFormat::Text,
        x_location: 0.0,
        y_location: 0.0,
        x_size: 0.0,
        y_size: 0.0,
        width: 0,
        height: 0,
        parent: NULL_ID,
    };
    store_annotation_array(
        &mut buf,
        &AnnotationArrayCreateInfo {
            offset: 256,
            group_sizes_offset: NULL_OFFSET,
            group_bytes_offset: NULL_OFFSET,
            annotations: vec![entry(64), entry(128)],
        },
    )
    .unwrap();

    let block = iris_extension::format::annotations::AnnotationsBlock::new(
        256,
        1024,
        iris_extension::EXTENSION_VERSION,
    );
    let outcome = block.validate_full(&buf[..]);
    assert!(!outcome.is_failure());
    assert!(outcome.is_warning());

    let annotations = block.read(&buf[..], None).unwrap();
    assert_eq!(annotations.entries.len(), 1);
    // The first entry wins; its byte stream is the one surfaced.
    assert_eq!(annotations.entries[&0x000123].byte_size, 5);
}

// =============================================================================
// Full-featured file
// =============================================================================

#[test]
fn test_full_slide_round_trip() {
    let (buf, layout) = full_slide();

    assert!(is_iris_file(&buf[..]));
    let outcome = validate_file_structure(&buf[..]);
    assert!(!outcome.is_failure(), "{}", outcome.message);

    let slide = abstract_file_structure(&buf[..]).unwrap();

    // Pyramid: 1x1 then 2x2, scales 1 and 4.
    assert_eq!(slide.tile_table.extent.layers.len(), 2);
    assert_eq!(slide.tile_table.extent.layers[0].downsample, 4.0);
    assert_eq!(slide.tile_table.extent.layers[1].downsample, 1.0);
    assert_eq!(slide.tile_table.layers[0].len(), 1);
    assert_eq!(slide.tile_table.layers[1].len(), 4);
    // The final base-layer slot was left sparse.
    assert!(slide.tile_table.layers[1][3].is_sparse());
    let dense: Vec<_> = slide.tile_table.layers[1]
        .iter()
        .filter(|tile| !tile.is_sparse())
        .collect();
    assert_eq!(dense.len(), 3);
    assert!(dense.iter().all(|tile| tile.size == 64));

    // Associated images keyed by unique titles.
    assert_eq!(slide.images.len(), 2);
    assert_eq!(slide.images["label"].width, 40);
    assert_eq!(slide.images["macro"].byte_size, 48);
    assert!(slide.metadata.associated_images.contains("label"));
    assert!(slide.metadata.associated_images.contains("macro"));

    // ICC profile bytes round-tripped.
    assert_eq!(
        slide.metadata.icc_profile.as_deref(),
        Some(&b"acspAPPL fixture profile"[..])
    );

    // Annotations and their one group.
    assert_eq!(slide.annotations.entries.len(), 2);
    assert_eq!(
        slide.annotations.entries[&0x000123].format,
        AnnotationFormat::Svg
    );
    assert_eq!(slide.annotations.groups.len(), 1);
    assert_eq!(slide.annotations.groups["tumor"].member_count, 2);
    assert!(slide.metadata.annotations.contains(&0x000123));
    assert!(slide.metadata.annotations.contains(&0x000456));

    // Codec version and calibration survived.
    assert_eq!(slide.metadata.codec.major, 2025);
    assert_eq!(slide.header.revision, 2);
    assert_eq!(slide.header.file_size, layout.file_size);
}
