//! Error types for the stitching pipeline.

use thiserror::Error;

/// Reason a RANSAC run could not produce a usable homography.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RansacFailureReason {
    /// Every sampled minimal set was degenerate (collinear points or singular fit).
    DegenerateSamples,
    /// Candidates were fitted but none reached the minimum inlier count.
    InsufficientInliers,
    /// The winning transform is singular and cannot be inverted for warping.
    SingularTransform,
}

impl std::fmt::Display for RansacFailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RansacFailureReason::DegenerateSamples => write!(f, "all samples were degenerate"),
            RansacFailureReason::InsufficientInliers => write!(f, "insufficient inliers"),
            RansacFailureReason::SingularTransform => write!(f, "singular transform"),
        }
    }
}

/// Errors produced by the stitching core.
///
/// Every pairwise stitch either succeeds completely or fails with exactly one
/// of these; there is no partial output.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StitchError {
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("Insufficient features: found {found}, need at least {required}")]
    InsufficientFeatures { found: usize, required: usize },

    #[error("Insufficient correspondences: found {found}, need at least {required}")]
    InsufficientCorrespondences { found: usize, required: usize },

    #[error(
        "Degenerate geometry: {reason} (iterations: {iterations}, best inlier count: {best_inlier_count})"
    )]
    DegenerateGeometry {
        reason: RansacFailureReason,
        iterations: usize,
        best_inlier_count: usize,
    },
}

impl StitchError {
    pub(crate) fn invalid_input(reason: impl Into<String>) -> Self {
        StitchError::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Short, stable name of the failure kind, suitable for user-facing reports.
    pub fn kind(&self) -> &'static str {
        match self {
            StitchError::InvalidInput { .. } => "InvalidInput",
            StitchError::InsufficientFeatures { .. } => "InsufficientFeatures",
            StitchError::InsufficientCorrespondences { .. } => "InsufficientCorrespondences",
            StitchError::DegenerateGeometry { .. } => "DegenerateGeometry",
        }
    }
}

pub type Result<T> = std::result::Result<T, StitchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_correspondences_message() {
        let err = StitchError::InsufficientCorrespondences {
            found: 3,
            required: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient correspondences: found 3, need at least 5"
        );
        assert_eq!(err.kind(), "InsufficientCorrespondences");
    }

    #[test]
    fn test_degenerate_geometry_message() {
        let err = StitchError::DegenerateGeometry {
            reason: RansacFailureReason::InsufficientInliers,
            iterations: 2000,
            best_inlier_count: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("insufficient inliers"));
        assert!(msg.contains("2000"));
        assert_eq!(err.kind(), "DegenerateGeometry");
    }

    #[test]
    fn test_invalid_input_message() {
        let err = StitchError::invalid_input("image has zero extent");
        assert_eq!(err.to_string(), "Invalid input: image has zero extent");
    }
}
