//! Pairwise stitching and the sequence orchestrator.
//!
//! # Pipeline Stages
//!
//! 1. **Feature Extraction** - SIFT keypoints and descriptors for both images
//! 2. **Matching** - Ratio-test nearest neighbours, image to align as query
//! 3. **RANSAC** - Homography from the image to align into the reference frame
//! 4. **Compositing** - Warp onto a shared canvas, reference pasted top-left
//!
//! A sequence of N images is folded right to left in N - 1 pairwise steps:
//! each newly visited image becomes the reference and the panorama built so
//! far is warped into its frame.


use std::time::Instant;

use common::parallel::try_par_map_limited;
use image::RgbImage;

use crate::config::Config;
use crate::error::{Result, StitchError};
use crate::features::{FeatureExtractor, FeatureSet};
use crate::homography::{HomographyEstimate, HomographyEstimator};
use crate::matching::{Correspondence, DescriptorMatcher};
use crate::raster::Image;
use crate::visualize::draw_matches;
use crate::warp::compose_canvas;

/// Result of stitching one image pair.
#[derive(Debug, Clone)]
pub struct PairStitch {
    /// Reference at the top-left with the warped image to its right.
    pub canvas: Image,
    /// Transform from the image to align into the reference frame.
    pub estimate: HomographyEstimate,
    /// Ratio-test matches; query is the image to align, train the reference.
    pub matches: Vec<Correspondence>,
    /// Side-by-side inlier lines, when enabled.
    pub visualization: Option<RgbImage>,
}

/// Statistics of one pairwise step of a sequence stitch.
#[derive(Debug, Clone, PartialEq)]
pub struct StepSummary {
    /// Zero-based step number in execution order.
    pub step: usize,
    /// Input index of the image used as reference.
    pub reference_index: usize,
    pub reference_keypoints: usize,
    pub to_align_keypoints: usize,
    pub matches: usize,
    pub inliers: usize,
    pub ransac_iterations: usize,
    pub canvas_width: usize,
    pub canvas_height: usize,
}

impl StepSummary {
    fn new(
        step: usize,
        reference_index: usize,
        reference_features: &FeatureSet,
        to_align_features: &FeatureSet,
        pair: &PairStitch,
    ) -> Self {
        Self {
            step,
            reference_index,
            reference_keypoints: reference_features.len(),
            to_align_keypoints: to_align_features.len(),
            matches: pair.matches.len(),
            inliers: pair.estimate.inlier_count(),
            ransac_iterations: pair.estimate.iterations,
            canvas_width: pair.canvas.width(),
            canvas_height: pair.canvas.height(),
        }
    }
}

/// Result of stitching a whole sequence.
#[derive(Debug, Clone)]
pub struct Panorama {
    pub canvas: Image,
    /// Diagnostic image of the last pairwise step, when enabled.
    pub visualization: Option<RgbImage>,
    /// One entry per pairwise step, in execution order.
    pub steps: Vec<StepSummary>,
}

/// Stitches image pairs and left-to-right image sequences.
#[derive(Debug, Clone)]
pub struct Stitcher {
    config: Config,
    extractor: FeatureExtractor,
    matcher: DescriptorMatcher,
    estimator: HomographyEstimator,
}

impl Default for Stitcher {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Stitcher {
    /// # Panics
    ///
    /// Panics if the configuration is invalid.
    pub fn new(config: Config) -> Self {
        config.validate();
        Self {
            extractor: FeatureExtractor::new(config.features.clone()),
            matcher: DescriptorMatcher::new(config.ratio_threshold),
            estimator: HomographyEstimator::new(
                config.ransac.clone(),
                config.reprojection_threshold,
            ),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Warp `to_align` into the frame of `reference` and composite both.
    pub fn stitch_pair(&self, reference: &Image, to_align: &Image) -> Result<PairStitch> {
        check_pair(reference, to_align)?;

        let (reference_features, to_align_features) = rayon::join(
            || self.extractor.extract(reference),
            || self.extractor.extract(to_align),
        );
        let (reference_features, to_align_features) = (reference_features?, to_align_features?);

        self.stitch_with_features(reference, &reference_features, to_align, &to_align_features)
    }

    /// Fold a left-to-right sequence of equally tall images into one panorama.
    ///
    /// The first step stitches the last two images; every further step takes
    /// the next image to the left as reference and the running panorama as
    /// the image to align. The first failing step aborts the whole run.
    pub fn stitch(&self, images: &[Image]) -> Result<Panorama> {
        let n = images.len();
        if n < 2 {
            return Err(StitchError::invalid_input(format!(
                "stitching needs at least 2 images, got {n}"
            )));
        }
        for (i, image) in images.iter().enumerate() {
            image.ensure_not_empty(&format!("image {i}"))?;
        }
        let (height, channels) = (images[0].height(), images[0].channels());
        if let Some((i, image)) = images
            .iter()
            .enumerate()
            .find(|(_, img)| img.height() != height || img.channels() != channels)
        {
            return Err(StitchError::invalid_input(format!(
                "image {i} is {}px tall with {} channels, image 0 is {height}px with {channels}",
                image.height(),
                image.channels()
            )));
        }

        let start = Instant::now();
        tracing::info!(images = n, "Stitching sequence");

        let features = try_par_map_limited(images, self.config.max_parallel_extractions, |img| {
            self.extractor.extract(img)
        })?;

        let mut steps = Vec::with_capacity(n - 1);

        let first_reference = n - 2;
        let mut current = self
            .stitch_with_features(
                &images[first_reference],
                &features[first_reference],
                &images[n - 1],
                &features[n - 1],
            )
            .inspect_err(|e| log_step_failure(0, first_reference, e))?;
        steps.push(StepSummary::new(
            0,
            first_reference,
            &features[first_reference],
            &features[n - 1],
            &current,
        ));
        log_step(steps.last());

        for (offset, reference_index) in (0..first_reference).rev().enumerate() {
            let step = offset + 1;
            let panorama_features = self
                .extractor
                .extract(&current.canvas)
                .inspect_err(|e| log_step_failure(step, reference_index, e))?;
            let next = self
                .stitch_with_features(
                    &images[reference_index],
                    &features[reference_index],
                    &current.canvas,
                    &panorama_features,
                )
                .inspect_err(|e| log_step_failure(step, reference_index, e))?;
            steps.push(StepSummary::new(
                step,
                reference_index,
                &features[reference_index],
                &panorama_features,
                &next,
            ));
            log_step(steps.last());
            current = next;
        }

        tracing::info!(
            steps = steps.len(),
            width = current.canvas.width(),
            height = current.canvas.height(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Panorama complete"
        );

        Ok(Panorama {
            canvas: current.canvas,
            visualization: current.visualization,
            steps,
        })
    }

    fn stitch_with_features(
        &self,
        reference: &Image,
        reference_features: &FeatureSet,
        to_align: &Image,
        to_align_features: &FeatureSet,
    ) -> Result<PairStitch> {
        let matches = self
            .matcher
            .match_features(to_align_features, reference_features)?;

        let estimate =
            self.estimator
                .estimate_from_matches(&matches, to_align_features, reference_features)?;

        let canvas = compose_canvas(reference, to_align, &estimate.homography, &self.config.warp)?;

        let visualization = self.config.emit_match_visualization.then(|| {
            draw_matches(
                to_align,
                reference,
                to_align_features,
                reference_features,
                &matches,
                &estimate.inlier_mask,
            )
        });

        Ok(PairStitch {
            canvas,
            estimate,
            matches,
            visualization,
        })
    }
}

fn check_pair(reference: &Image, to_align: &Image) -> Result<()> {
    reference.ensure_not_empty("reference image")?;
    to_align.ensure_not_empty("image to align")?;
    if reference.channels() != to_align.channels() {
        return Err(StitchError::invalid_input(format!(
            "channel counts differ: reference has {}, image to align has {}",
            reference.channels(),
            to_align.channels()
        )));
    }
    Ok(())
}

fn log_step(summary: Option<&StepSummary>) {
    if let Some(s) = summary {
        tracing::info!(
            step = s.step,
            reference = s.reference_index,
            matches = s.matches,
            inliers = s.inliers,
            iterations = s.ransac_iterations,
            width = s.canvas_width,
            height = s.canvas_height,
            "Stitch step done"
        );
    }
}

fn log_step_failure(step: usize, reference_index: usize, error: &StitchError) {
    tracing::warn!(
        step,
        reference = reference_index,
        kind = error.kind(),
        %error,
        "Stitch step failed"
    );
}
