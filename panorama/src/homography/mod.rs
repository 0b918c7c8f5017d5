//! Projective transforms between image planes and their robust estimation.


mod dlt;
mod ransac;

use glam::DVec2;

use crate::math::DMat3;

pub use ransac::{HomographyEstimate, HomographyEstimator, MIN_CORRESPONDENCES};

/// Bottom-right elements below this magnitude make a matrix unusable.
const NORMALIZATION_EPS: f64 = 1e-10;

/// Invertible 3x3 projective transform, normalized so `m[8] == 1`.
///
/// The inverse is computed once on construction; warping needs it for every
/// output pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    forward: DMat3,
    inverse: DMat3,
}

impl Homography {
    pub fn identity() -> Self {
        Self {
            forward: DMat3::identity(),
            inverse: DMat3::identity(),
        }
    }

    /// Pure translation by `(dx, dy)`.
    pub fn translation(dx: f64, dy: f64) -> Self {
        Self {
            forward: DMat3::from_rows([1.0, 0.0, dx], [0.0, 1.0, dy], [0.0, 0.0, 1.0]),
            inverse: DMat3::from_rows([1.0, 0.0, -dx], [0.0, 1.0, -dy], [0.0, 0.0, 1.0]),
        }
    }

    /// Normalize and validate a raw matrix.
    ///
    /// Returns `None` if the bottom-right element is (near) zero, an element is
    /// not finite, or the matrix is singular.
    pub fn from_matrix(matrix: DMat3) -> Option<Self> {
        if !matrix.is_finite() {
            return None;
        }
        let forward = matrix.normalized(NORMALIZATION_EPS)?;
        let inverse = forward.inverse()?.normalized(NORMALIZATION_EPS)?;
        Some(Self { forward, inverse })
    }

    /// Row-major elements.
    pub fn from_array(data: [f64; 9]) -> Option<Self> {
        Self::from_matrix(DMat3::from_array(data))
    }

    pub fn matrix(&self) -> &DMat3 {
        &self.forward
    }

    pub fn to_array(&self) -> [f64; 9] {
        *self.forward.as_array()
    }

    pub fn inverse(&self) -> Homography {
        Homography {
            forward: self.inverse,
            inverse: self.forward,
        }
    }

    /// Map a point; `None` if it lands on the line at infinity.
    #[inline]
    pub fn apply(&self, p: DVec2) -> Option<DVec2> {
        self.forward.try_transform_point(p)
    }

    /// Map a point through the inverse transform.
    #[inline]
    pub fn apply_inverse(&self, p: DVec2) -> Option<DVec2> {
        self.inverse.try_transform_point(p)
    }

    /// `self ∘ other`: apply `other` first, then `self`.
    pub fn compose(&self, other: &Homography) -> Option<Homography> {
        Self::from_matrix(self.forward * other.forward)
    }

    /// Euclidean distance between the mapped `src` and `dst`.
    /// Infinite for points mapped to infinity.
    #[inline]
    pub fn reprojection_error(&self, src: DVec2, dst: DVec2) -> f64 {
        self.apply(src)
            .map(|p| p.distance(dst))
            .unwrap_or(f64::INFINITY)
    }

    /// Largest element-wise difference between two normalized homographies.
    pub fn max_abs_diff(&self, other: &Homography) -> f64 {
        self.forward
            .as_array()
            .iter()
            .zip(other.forward.as_array())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max)
    }
}

impl Default for Homography {
    fn default() -> Self {
        Self::identity()
    }
}
