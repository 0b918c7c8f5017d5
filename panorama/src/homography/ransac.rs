//! RANSAC (Random Sample Consensus) homography estimation.
//!
//! 1. Randomly sample 4 correspondences, skipping collinear configurations
//! 2. Fit a candidate by normalized DLT
//! 3. Count correspondences within the reprojection threshold
//! 4. Keep the best candidate (most inliers, then lowest total error)
//! 5. Refit on all inliers of the winner

use glam::DVec2;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use super::dlt::{adaptive_iterations, estimate_homography, has_collinear_triple};
use super::Homography;
use crate::config::RansacConfig;
use crate::error::{RansacFailureReason, Result, StitchError};
use crate::features::FeatureSet;
use crate::matching::Correspondence;

/// Minimal sample for a homography.
const SAMPLE_SIZE: usize = 4;

/// Fewest correspondences a robust fit is attempted with.
pub const MIN_CORRESPONDENCES: usize = SAMPLE_SIZE + 1;

/// A homography together with the consensus that supports it.
#[derive(Debug, Clone, PartialEq)]
pub struct HomographyEstimate {
    /// Maps source points onto destination points.
    pub homography: Homography,
    /// One flag per input correspondence.
    pub inlier_mask: Vec<bool>,
    /// Sampling iterations performed.
    pub iterations: usize,
    /// Sum of reprojection errors over the inliers.
    pub total_error: f64,
}

impl HomographyEstimate {
    pub fn inlier_count(&self) -> usize {
        self.inlier_mask.iter().filter(|&&m| m).count()
    }

    /// Indices of the inlier correspondences, ascending.
    pub fn inlier_indices(&self) -> Vec<usize> {
        self.inlier_mask
            .iter()
            .enumerate()
            .filter_map(|(i, &m)| m.then_some(i))
            .collect()
    }
}

/// Consensus of one candidate.
#[derive(Debug, Clone)]
pub(super) struct Consensus {
    pub(super) homography: Homography,
    pub(super) mask: Vec<bool>,
    pub(super) count: usize,
    pub(super) total_error: f64,
}

impl Consensus {
    pub(super) fn evaluate(
        homography: Homography,
        src: &[DVec2],
        dst: &[DVec2],
        threshold: f64,
    ) -> Self {
        let mut mask = Vec::with_capacity(src.len());
        let mut count = 0;
        let mut total_error = 0.0;
        for (s, d) in src.iter().zip(dst) {
            let err = homography.reprojection_error(*s, *d);
            let inlier = err < threshold;
            if inlier {
                count += 1;
                total_error += err;
            }
            mask.push(inlier);
        }
        Self {
            homography,
            mask,
            count,
            total_error,
        }
    }

    /// More inliers wins; equal counts go to the lower total error.
    pub(super) fn is_better_than(&self, other: &Consensus) -> bool {
        self.count > other.count
            || (self.count == other.count && self.total_error < other.total_error)
    }
}

/// RANSAC estimator for homographies.
#[derive(Debug, Clone)]
pub struct HomographyEstimator {
    config: RansacConfig,
    threshold: f64,
}

impl HomographyEstimator {
    /// `reprojection_threshold` is the pixel distance below which a
    /// correspondence counts as an inlier.
    pub fn new(config: RansacConfig, reprojection_threshold: f64) -> Self {
        config.validate();
        assert!(
            reprojection_threshold > 0.0,
            "reprojection_threshold must be positive, got {reprojection_threshold}"
        );
        Self {
            config,
            threshold: reprojection_threshold,
        }
    }

    /// Estimate the homography mapping each query keypoint of `matches` onto
    /// its train keypoint.
    pub fn estimate_from_matches(
        &self,
        matches: &[Correspondence],
        query: &FeatureSet,
        train: &FeatureSet,
    ) -> Result<HomographyEstimate> {
        let mut src = Vec::with_capacity(matches.len());
        let mut dst = Vec::with_capacity(matches.len());
        for m in matches {
            let (Some(q), Some(t)) = (
                query.keypoints().get(m.query_idx),
                train.keypoints().get(m.train_idx),
            ) else {
                return Err(StitchError::invalid_input(format!(
                    "correspondence ({}, {}) is out of range",
                    m.query_idx, m.train_idx
                )));
            };
            src.push(q.position());
            dst.push(t.position());
        }
        self.estimate(&src, &dst)
    }

    /// Estimate the homography mapping `src[i]` onto `dst[i]`.
    ///
    /// Fails with `InsufficientCorrespondences` for fewer than 5 pairs and
    /// with `DegenerateGeometry` when no candidate reaches `min_inliers`.
    pub fn estimate(&self, src: &[DVec2], dst: &[DVec2]) -> Result<HomographyEstimate> {
        if src.len() != dst.len() {
            return Err(StitchError::invalid_input(format!(
                "point lists differ in length: {} vs {}",
                src.len(),
                dst.len()
            )));
        }
        let n = src.len();
        if n < MIN_CORRESPONDENCES {
            return Err(StitchError::InsufficientCorrespondences {
                found: n,
                required: MIN_CORRESPONDENCES,
            });
        }

        let mut rng: ChaCha8Rng = match self.config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_os_rng(),
        };

        let mut best: Option<Consensus> = None;
        let mut singular_fits = 0usize;

        // Pre-allocate buffers to avoid per-iteration allocations
        let mut sample_indices: Vec<usize> = Vec::with_capacity(SAMPLE_SIZE);
        let mut sample_src: Vec<DVec2> = Vec::with_capacity(SAMPLE_SIZE);
        let mut sample_dst: Vec<DVec2> = Vec::with_capacity(SAMPLE_SIZE);

        let mut iterations = 0;
        let mut iteration_limit = self.config.max_iterations;

        while iterations < iteration_limit {
            iterations += 1;

            random_sample_into(&mut rng, n, SAMPLE_SIZE, &mut sample_indices);
            sample_src.clear();
            sample_dst.clear();
            for &i in &sample_indices {
                sample_src.push(src[i]);
                sample_dst.push(dst[i]);
            }

            if has_collinear_triple(&sample_src) || has_collinear_triple(&sample_dst) {
                continue;
            }
            let Some(raw) = estimate_homography(&sample_src, &sample_dst) else {
                continue;
            };
            let Some(candidate) = Homography::from_matrix(raw) else {
                singular_fits += 1;
                continue;
            };

            let consensus = Consensus::evaluate(candidate, src, dst, self.threshold);
            let improved = best
                .as_ref()
                .map_or(true, |b| consensus.is_better_than(b));
            if improved {
                let inlier_ratio = consensus.count as f64 / n as f64;
                best = Some(consensus);

                let adaptive =
                    adaptive_iterations(inlier_ratio, SAMPLE_SIZE, self.config.confidence);
                iteration_limit = iteration_limit.min(adaptive.max(iterations));
            }
        }

        let Some(best) = best else {
            let reason = if singular_fits > 0 {
                RansacFailureReason::SingularTransform
            } else {
                RansacFailureReason::DegenerateSamples
            };
            return Err(StitchError::DegenerateGeometry {
                reason,
                iterations,
                best_inlier_count: 0,
            });
        };

        if best.count < self.config.min_inliers {
            return Err(StitchError::DegenerateGeometry {
                reason: RansacFailureReason::InsufficientInliers,
                iterations,
                best_inlier_count: best.count,
            });
        }

        let final_consensus = self.refine(src, dst, best);

        tracing::debug!(
            correspondences = n,
            inliers = final_consensus.count,
            iterations,
            total_error = final_consensus.total_error,
            "RANSAC homography estimated"
        );

        Ok(HomographyEstimate {
            homography: final_consensus.homography,
            inlier_mask: final_consensus.mask,
            iterations,
            total_error: final_consensus.total_error,
        })
    }

    /// Refit on all inliers and recount. Keeps the candidate if the refit is
    /// degenerate or loses inliers.
    fn refine(&self, src: &[DVec2], dst: &[DVec2], candidate: Consensus) -> Consensus {
        let (inlier_src, inlier_dst): (Vec<DVec2>, Vec<DVec2>) = candidate
            .mask
            .iter()
            .zip(src.iter().zip(dst))
            .filter_map(|(&m, (s, d))| m.then_some((*s, *d)))
            .unzip();

        let refit = estimate_homography(&inlier_src, &inlier_dst)
            .and_then(Homography::from_matrix)
            .map(|h| Consensus::evaluate(h, src, dst, self.threshold));

        match refit {
            Some(refit) if refit.count >= candidate.count => refit,
            _ => candidate,
        }
    }
}

/// Sample `k` distinct indices from `0..n` into `buffer`.
fn random_sample_into<R: Rng>(rng: &mut R, n: usize, k: usize, buffer: &mut Vec<usize>) {
    debug_assert!(k <= n, "Cannot sample {} indices from {}", k, n);
    buffer.clear();

    if k <= n / 2 {
        // Floyd's algorithm for sampling without replacement
        for j in (n - k)..n {
            let t = rng.random_range(0..=j);
            if buffer.contains(&t) {
                buffer.push(j);
            } else {
                buffer.push(t);
            }
        }
    } else {
        buffer.extend(0..n);
        buffer.shuffle(rng);
        buffer.truncate(k);
    }
}
