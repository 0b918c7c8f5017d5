//! Scale and rotation invariant feature extraction.
//!
//! Keypoints are difference-of-Gaussian extrema refined to sub-pixel
//! accuracy, each with a dominant gradient orientation and a 4x4x8 gradient
//! histogram descriptor computed in the rotated keypoint frame.


mod descriptor;
mod detect;
mod scale_space;

use rayon::prelude::*;

use crate::config::FeatureConfig;
use crate::error::Result;
use crate::raster::Image;

use detect::detect_keypoints;
use scale_space::{Plane, ScaleSpace};

/// Number of elements in a descriptor.
pub const DESCRIPTOR_SIZE: usize = 128;

/// Unit-length gradient histogram describing the neighborhood of a keypoint.
pub type Descriptor = [f32; DESCRIPTOR_SIZE];

/// A detected interest point in input image coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    /// Diameter of the meaningful neighborhood in pixels.
    pub size: f32,
    /// Dominant orientation in radians, [0, 2π).
    pub angle: f32,
    /// Absolute interpolated DoG response.
    pub response: f32,
    /// Pyramid octave the keypoint was detected in.
    pub octave: usize,
}

impl Keypoint {
    pub fn position(&self) -> glam::DVec2 {
        glam::DVec2::new(self.x as f64, self.y as f64)
    }
}

/// Keypoints and their descriptors, aligned by index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureSet {
    keypoints: Vec<Keypoint>,
    descriptors: Vec<Descriptor>,
}

impl FeatureSet {
    /// # Panics
    /// Panics if the two vectors differ in length.
    pub fn new(keypoints: Vec<Keypoint>, descriptors: Vec<Descriptor>) -> Self {
        assert_eq!(
            keypoints.len(),
            descriptors.len(),
            "every keypoint needs exactly one descriptor"
        );
        Self {
            keypoints,
            descriptors,
        }
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Keypoint, &Descriptor)> {
        self.keypoints.iter().zip(self.descriptors.iter())
    }
}

/// Stateless feature extractor. Construct one per use or share it freely;
/// extraction never mutates the extractor.
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor {
    config: FeatureConfig,
}

impl FeatureExtractor {
    pub fn new(config: FeatureConfig) -> Self {
        config.validate();
        Self { config }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Detect keypoints and compute their descriptors.
    ///
    /// Fails with `InvalidInput` for a zero-extent image. An image without any
    /// stable extrema yields an empty set.
    pub fn extract(&self, image: &Image) -> Result<FeatureSet> {
        image.ensure_not_empty("image")?;

        let base = Plane::new(image.width(), image.height(), image.to_gray_f32());
        let space = ScaleSpace::build(
            base,
            self.config.scales_per_octave,
            self.config.sigma,
            self.config.max_octaves,
        );

        let mut detected = detect_keypoints(&space, &self.config);
        if let Some(limit) = self.config.max_features {
            if detected.len() > limit {
                // Stable: equal responses keep detection order.
                detected.sort_by(|a, b| b.response.total_cmp(&a.response));
                detected.truncate(limit);
            }
        }

        let descriptors: Vec<Descriptor> = detected
            .par_iter()
            .map(|kp| descriptor::compute_descriptor(&space.gaussians[kp.octave][kp.layer], kp))
            .collect();

        let keypoints: Vec<Keypoint> = detected
            .iter()
            .map(|kp| {
                let scale = kp.octave_scale();
                Keypoint {
                    x: kp.x * scale,
                    y: kp.y * scale,
                    size: kp.octave_sigma * scale * 2.0,
                    angle: kp.angle_deg.to_radians(),
                    response: kp.response,
                    octave: kp.octave,
                }
            })
            .collect();

        tracing::debug!(
            width = image.width(),
            height = image.height(),
            octaves = space.num_octaves(),
            keypoints = keypoints.len(),
            "Extracted features"
        );

        Ok(FeatureSet::new(keypoints, descriptors))
    }
}
