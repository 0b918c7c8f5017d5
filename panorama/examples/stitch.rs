//! Example: Stitch a Panorama
//!
//! 1. Load the images given on the command line, ordered left to right
//! 2. Resize them to a common height
//! 3. Stitch them into one panorama with match visualization enabled
//! 4. Save `output/panorama_image.png` and `output/matched_points.png`
//!
//! # Usage
//!
//! ```bash
//! cargo run --release --example stitch -- left.jpg middle.jpg right.jpg
//! ```

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use panorama::preprocess::resize_to_common_height;
use panorama::{Config, Image, Stitcher};

const OUTPUT_DIR: &str = "output";

fn main() -> anyhow::Result<()> {
    common::setup_logging("info", "logs", "stitch");

    let paths: Vec<PathBuf> = env::args().skip(1).map(PathBuf::from).collect();
    if paths.len() < 2 {
        eprintln!("Usage: stitch <image> <image> [<image> ...]");
        eprintln!("Images are stitched in the given left-to-right order.");
        std::process::exit(1);
    }
    if let Some(missing) = paths.iter().find(|p| !p.exists()) {
        bail!("input file {} does not exist", missing.display());
    }

    let loaded = paths
        .iter()
        .map(|path| {
            tracing::info!(path = %path.display(), "Loading image");
            image::open(path).with_context(|| format!("failed to load {}", path.display()))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let images: Vec<Image> = resize_to_common_height(&loaded)
        .iter()
        .map(Image::from)
        .collect();

    let config = Config {
        emit_match_visualization: true,
        ..Default::default()
    };
    let panorama = match Stitcher::new(config).stitch(&images) {
        Ok(panorama) => panorama,
        Err(e) => {
            tracing::error!(kind = e.kind(), error = %e, "Stitching failed");
            eprintln!("Stitching failed ({}): {e}", e.kind());
            std::process::exit(2);
        }
    };

    for step in &panorama.steps {
        println!(
            "step {}: reference image {}, {} matches, {} inliers, canvas {}x{}",
            step.step,
            step.reference_index,
            step.matches,
            step.inliers,
            step.canvas_width,
            step.canvas_height
        );
    }

    let output_dir = Path::new(OUTPUT_DIR);
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    let panorama_path = output_dir.join("panorama_image.png");
    panorama
        .canvas
        .to_dynamic()
        .save(&panorama_path)
        .with_context(|| format!("failed to write {}", panorama_path.display()))?;
    println!("Saved {}", panorama_path.display());

    if let Some(visualization) = &panorama.visualization {
        let matches_path = output_dir.join("matched_points.png");
        visualization
            .save(&matches_path)
            .with_context(|| format!("failed to write {}", matches_path.display()))?;
        println!("Saved {}", matches_path.display());
    }

    Ok(())
}
