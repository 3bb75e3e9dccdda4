//! iris-info: validate an Iris slide file and print its structure.
//!
//! Maps the file into memory, runs deep structural validation, and prints
//! the abstraction: pyramid layers, calibration, attributes, associated
//! images, and annotation counts. With `--map`, also dumps the full file
//! map (every block with its offset, kind, and size).

use std::fs::File as StdFile;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use memmap2::Mmap;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use iris_extension::{
    abstract_file_structure, generate_file_map, validate_file_structure, NULL_ID,
};

/// Inspect an Iris whole-slide image file.
#[derive(Parser, Debug)]
#[command(name = "iris-info")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the .iris slide file.
    slide: PathBuf,

    /// Also print the file map: every block with offset, kind, and size.
    #[arg(long)]
    map: bool,

    /// Enable verbose (debug-level) logging.
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let file = match StdFile::open(&cli.slide) {
        Ok(file) => file,
        Err(e) => {
            error!("failed to open {}: {e}", cli.slide.display());
            return ExitCode::FAILURE;
        }
    };
    // The mapping is read-only and lives for the duration of the run.
    let mapped = match unsafe { Mmap::map(&file) } {
        Ok(mapped) => mapped,
        Err(e) => {
            error!("failed to map {}: {e}", cli.slide.display());
            return ExitCode::FAILURE;
        }
    };
    let region: &[u8] = &mapped;

    // Always validate the structure before reading it.
    let outcome = validate_file_structure(region);
    if outcome.is_failure() {
        error!("{} failed validation: {}", cli.slide.display(), outcome.message);
        return ExitCode::FAILURE;
    }
    if outcome.is_warning() {
        println!("validation warning: {}", outcome.message);
    }
    println!(
        "Iris slide file \"{}\" successfully passed file validation.",
        cli.slide.display()
    );

    let slide = match abstract_file_structure(region) {
        Ok(slide) => slide,
        Err(e) => {
            error!("failed to abstract slide structure: {e}");
            return ExitCode::FAILURE;
        }
    };

    println!("Slide file information:");
    println!(
        "  Encoded with extension v{}.{}, revision {}",
        slide.header.extension_version >> 16,
        slide.header.extension_version & 0xFFFF,
        slide.header.revision
    );
    println!("  Tile encoding: {}", slide.tile_table.encoding.name());
    println!("  Pixel format:  {}", slide.tile_table.format.name());
    println!(
        "  Base extent:   {}px x {}px",
        slide.tile_table.extent.width, slide.tile_table.extent.height
    );
    println!("  Layers (256px tiles):");
    for (index, layer) in slide.tile_table.extent.layers.iter().enumerate() {
        let stored = slide.tile_table.layers[index]
            .iter()
            .filter(|tile| !tile.is_sparse())
            .count();
        println!(
            "    layer {index}: {} x {} tiles, scale {:.1}, downsample {:.1} ({stored} stored)",
            layer.x_tiles, layer.y_tiles, layer.scale, layer.downsample
        );
    }

    if slide.metadata.microns_per_pixel > 0.0 {
        println!("  Microns/pixel: {}", slide.metadata.microns_per_pixel);
    }
    if slide.metadata.magnification > 0.0 {
        println!("  Magnification: {}x", slide.metadata.magnification);
    }

    if slide.metadata.attributes.entries.is_empty() {
        println!("  No encoded metadata attributes present");
    } else {
        println!("  Metadata attributes ({}):", slide.metadata.attributes.format.name());
        for (key, value) in &slide.metadata.attributes.entries {
            println!("    [{key}]: {}", String::from_utf8_lossy(value));
        }
    }

    if slide.images.is_empty() {
        println!("  No associated images present");
    } else {
        println!("  Associated images:");
        for title in &slide.metadata.associated_images {
            if let Some(image) = slide.images.get(title) {
                println!(
                    "    {title}: {}px x {}px, {} ({} bytes)",
                    image.width,
                    image.height,
                    image.encoding.name(),
                    image.byte_size
                );
            }
        }
    }

    if !slide.annotations.entries.is_empty() {
        let parented = slide
            .annotations
            .entries
            .values()
            .filter(|annotation| annotation.parent != NULL_ID)
            .count();
        println!(
            "  Annotations: {} ({} grouped into {} groups, {parented} parented)",
            slide.annotations.entries.len(),
            slide
                .annotations
                .groups
                .values()
                .map(|group| group.member_count as u64)
                .sum::<u64>(),
            slide.annotations.groups.len()
        );
    }

    if cli.map {
        match generate_file_map(region) {
            Ok(map) => {
                println!("File map ({} blocks, {} bytes):", map.len(), map.file_size);
                for (offset, entry) in map.iter() {
                    println!("  {offset:#010X}  {:<22} {:>10} bytes", format!("{:?}", entry.kind), entry.size);
                }
            }
            Err(e) => {
                error!("failed to generate file map: {e}");
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "iris_extension=debug,iris_info=debug"
    } else {
        "iris_extension=info,iris_info=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
