//! Brute-force descriptor matching with Lowe's ratio test.

#[cfg(test)]
mod tests;

use rayon::prelude::*;

use crate::error::{Result, StitchError};
use crate::features::{Descriptor, FeatureSet};

/// The ratio test needs a nearest and a second-nearest candidate.
pub const MIN_FEATURES_FOR_MATCHING: usize = 2;

/// A putative match between two feature sets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correspondence {
    /// Index into the query feature set.
    pub query_idx: usize,
    /// Index into the train feature set.
    pub train_idx: usize,
    /// Euclidean descriptor distance.
    pub distance: f32,
}

/// Nearest-neighbor matcher over descriptor space.
#[derive(Debug, Clone, Copy)]
pub struct DescriptorMatcher {
    ratio: f32,
}

impl DescriptorMatcher {
    /// # Panics
    /// Panics if `ratio` is not in (0, 1].
    pub fn new(ratio: f32) -> Self {
        assert!(
            ratio > 0.0 && ratio <= 1.0,
            "ratio must be in (0, 1], got {ratio}"
        );
        Self { ratio }
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    /// Match every query descriptor against the train set.
    ///
    /// A query is kept only if its nearest train descriptor is closer than
    /// `ratio` times the second nearest. Output is ordered by query index.
    /// Fails with `InsufficientFeatures` if the train set has fewer than two
    /// entries. An empty query yields no matches.
    pub fn match_features(
        &self,
        query: &FeatureSet,
        train: &FeatureSet,
    ) -> Result<Vec<Correspondence>> {
        if train.len() < MIN_FEATURES_FOR_MATCHING {
            return Err(StitchError::InsufficientFeatures {
                found: train.len(),
                required: MIN_FEATURES_FOR_MATCHING,
            });
        }

        let train_desc = train.descriptors();
        let ratio_sq = self.ratio * self.ratio;

        let matches: Vec<Correspondence> = query
            .descriptors()
            .par_iter()
            .enumerate()
            .filter_map(|(query_idx, desc)| {
                let (best_idx, best, second) = two_nearest(desc, train_desc);
                (best < ratio_sq * second).then(|| Correspondence {
                    query_idx,
                    train_idx: best_idx,
                    distance: best.sqrt(),
                })
            })
            .collect();

        tracing::debug!(
            query = query.len(),
            train = train.len(),
            matches = matches.len(),
            ratio = self.ratio,
            "Matched descriptors"
        );

        Ok(matches)
    }
}

impl Default for DescriptorMatcher {
    fn default() -> Self {
        Self::new(0.75)
    }
}

/// Index and squared distance of the nearest train descriptor, plus the
/// squared distance of the second nearest. Ties keep the earlier index.
fn two_nearest(desc: &Descriptor, train: &[Descriptor]) -> (usize, f32, f32) {
    let mut best_idx = 0;
    let mut best = f32::INFINITY;
    let mut second = f32::INFINITY;
    for (idx, candidate) in train.iter().enumerate() {
        let d = squared_distance(desc, candidate);
        if d < best {
            second = best;
            best = d;
            best_idx = idx;
        } else if d < second {
            second = d;
        }
    }
    (best_idx, best, second)
}

#[inline]
pub(crate) fn squared_distance(a: &Descriptor, b: &Descriptor) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}
