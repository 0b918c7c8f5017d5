//! Configuration types for the stitching pipeline.
//!
//! All configuration structs and related enums are consolidated here.
//! Defaults follow the values commonly used for SIFT + RANSAC stitching
//! (Lowe ratio 0.75, 4 px reprojection tolerance).

// =============================================================================
// Feature extraction configuration
// =============================================================================

/// Scale-space feature detector configuration.
#[derive(Debug, Clone)]
pub struct FeatureConfig {
    /// Number of sampled scales per octave (DoG layers searched for extrema).
    pub scales_per_octave: usize,
    /// Blur of the first level of each octave.
    pub sigma: f32,
    /// Minimum absolute DoG response of a refined extremum, relative to
    /// intensities in [0, 1] and scaled by `scales_per_octave`.
    pub contrast_threshold: f32,
    /// Maximum principal curvature ratio; larger ratios are edge responses.
    pub edge_threshold: f32,
    /// Upper bound on the number of octaves. The image size bounds it too.
    pub max_octaves: usize,
    /// Keep only the strongest `n` keypoints by response. `None` keeps all.
    pub max_features: Option<usize>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            scales_per_octave: 3,
            sigma: 1.6,
            contrast_threshold: 0.04,
            edge_threshold: 10.0,
            max_octaves: 6,
            max_features: None,
        }
    }
}

impl FeatureConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) {
        assert!(
            self.scales_per_octave >= 1,
            "scales_per_octave must be >= 1, got {}",
            self.scales_per_octave
        );
        assert!(
            self.sigma > 0.5,
            "sigma must exceed the assumed input blur of 0.5, got {}",
            self.sigma
        );
        assert!(
            self.contrast_threshold >= 0.0,
            "contrast_threshold must be non-negative, got {}",
            self.contrast_threshold
        );
        assert!(
            self.edge_threshold > 1.0,
            "edge_threshold must be > 1, got {}",
            self.edge_threshold
        );
        assert!(
            self.max_octaves >= 1,
            "max_octaves must be >= 1, got {}",
            self.max_octaves
        );
        if let Some(max_features) = self.max_features {
            assert!(max_features > 0, "max_features must be positive when set");
        }
    }
}

// =============================================================================
// RANSAC configuration
// =============================================================================

/// RANSAC configuration for homography estimation.
///
/// The reprojection threshold lives on [`Config`] because it is part of the
/// user-facing surface; the estimator receives it explicitly.
#[derive(Debug, Clone)]
pub struct RansacConfig {
    /// Maximum iterations.
    pub max_iterations: usize,
    /// Target confidence for early termination.
    /// Matches OpenCV `findHomography` (0.995).
    pub confidence: f64,
    /// Minimum number of inliers for a homography to be accepted.
    pub min_inliers: usize,
    /// Random seed for reproducibility (None draws a fresh seed per run).
    pub seed: Option<u64>,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            max_iterations: 2000,
            confidence: 0.995,
            min_inliers: 5,
            seed: Some(0),
        }
    }
}

impl RansacConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) {
        assert!(
            self.max_iterations > 0,
            "RANSAC max_iterations must be positive, got {}",
            self.max_iterations
        );
        assert!(
            (0.0..1.0).contains(&self.confidence),
            "RANSAC confidence must be in [0, 1), got {}",
            self.confidence
        );
        assert!(
            self.min_inliers >= 4,
            "RANSAC min_inliers must be >= 4 (minimal homography sample), got {}",
            self.min_inliers
        );
    }
}

// =============================================================================
// Warp configuration
// =============================================================================

/// Interpolation method for perspective resampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterpolationMethod {
    /// Nearest neighbor - fastest, blocky
    Nearest,
    /// Bilinear interpolation - default, matches typical perspective warps
    #[default]
    Bilinear,
}

/// Configuration for perspective warping.
#[derive(Debug, Clone)]
pub struct WarpConfig {
    /// Interpolation method to use
    pub method: InterpolationMethod,
    /// Value written for samples that fall outside the source image
    pub border_value: u8,
}

impl Default for WarpConfig {
    fn default() -> Self {
        Self {
            method: InterpolationMethod::default(),
            border_value: 0,
        }
    }
}

// =============================================================================
// Top-level configuration
// =============================================================================

/// Stitching pipeline configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Lowe ratio: a match is accepted only if its distance is below
    /// `ratio_threshold` times the second-best distance. Higher accepts more,
    /// less distinctive matches.
    pub ratio_threshold: f32,
    /// Pixel distance below which a correspondence counts as a RANSAC inlier.
    pub reprojection_threshold: f64,
    /// Also produce a side-by-side image with lines between inlier keypoints.
    pub emit_match_visualization: bool,
    /// Upper bound on images whose features are extracted concurrently.
    pub max_parallel_extractions: usize,
    pub features: FeatureConfig,
    pub ransac: RansacConfig,
    pub warp: WarpConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ratio_threshold: 0.75,
            reprojection_threshold: 4.0,
            emit_match_visualization: false,
            max_parallel_extractions: 4,
            features: FeatureConfig::default(),
            ransac: RansacConfig::default(),
            warp: WarpConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration parameters, including nested sections.
    pub fn validate(&self) {
        assert!(
            self.ratio_threshold > 0.0 && self.ratio_threshold <= 1.0,
            "ratio_threshold must be in (0, 1], got {}",
            self.ratio_threshold
        );
        assert!(
            self.reprojection_threshold > 0.0,
            "reprojection_threshold must be positive, got {}",
            self.reprojection_threshold
        );
        assert!(
            self.max_parallel_extractions > 0,
            "max_parallel_extractions must be positive"
        );
        self.features.validate();
        self.ransac.validate();
    }
}
