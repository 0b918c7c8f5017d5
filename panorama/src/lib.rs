//! Panorama - feature-based image stitching.
//!
//! This library aligns overlapping photographs and composites them into one
//! wide image:
//! - SIFT-style keypoint detection and 128-element descriptors
//! - Brute-force descriptor matching with Lowe's ratio test
//! - RANSAC homography estimation with normalized DLT
//! - Perspective warping onto a shared canvas
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use panorama::{Config, Image, Stitcher};
//!
//! let images: Vec<Image> = load_left_to_right()?;
//! let panorama = Stitcher::new(Config::default()).stitch(&images)?;
//! println!("{}x{}", panorama.canvas.width(), panorama.canvas.height());
//! ```

mod config;
mod error;
pub(crate) mod features;
pub(crate) mod homography;
pub(crate) mod matching;
pub(crate) mod math;
pub(crate) mod pipeline;
pub mod preprocess;
mod raster;
pub(crate) mod visualize;
pub(crate) mod warp;

#[cfg(any(test, feature = "bench"))]
pub mod testing;

// ============================================================================
// Core types
// ============================================================================

pub use config::{Config, FeatureConfig, InterpolationMethod, RansacConfig, WarpConfig};
pub use error::{RansacFailureReason, Result, StitchError};
pub use raster::Image;

// ============================================================================
// Pipeline stages
// ============================================================================

pub use features::{Descriptor, FeatureExtractor, FeatureSet, Keypoint, DESCRIPTOR_SIZE};
pub use homography::{Homography, HomographyEstimate, HomographyEstimator, MIN_CORRESPONDENCES};
pub use matching::{Correspondence, DescriptorMatcher, MIN_FEATURES_FOR_MATCHING};
pub use visualize::{draw_matches, MATCH_COLOR};
pub use warp::{compose_canvas, warp_perspective};

// ============================================================================
// Orchestration
// ============================================================================

pub use pipeline::{PairStitch, Panorama, StepSummary, Stitcher};
