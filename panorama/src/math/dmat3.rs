//! Row-major 3x3 matrix of f64 values.

use glam::DVec2;
use std::ops::{Index, Mul};

/// Row-major 3x3 matrix of f64 values.
///
/// Memory layout:
/// ```text
/// | m[0] m[1] m[2] |
/// | m[3] m[4] m[5] |
/// | m[6] m[7] m[8] |
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DMat3 {
    data: [f64; 9],
}

/// Determinant magnitude below which a matrix is treated as singular.
const SINGULAR_EPS: f64 = 1e-12;

impl DMat3 {
    #[inline]
    pub const fn from_array(data: [f64; 9]) -> Self {
        Self { data }
    }

    #[inline]
    pub const fn identity() -> Self {
        Self {
            data: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        }
    }

    #[inline]
    pub const fn from_rows(row0: [f64; 3], row1: [f64; 3], row2: [f64; 3]) -> Self {
        Self {
            data: [
                row0[0], row0[1], row0[2], row1[0], row1[1], row1[2], row2[0], row2[1], row2[2],
            ],
        }
    }

    #[inline]
    pub const fn as_array(&self) -> &[f64; 9] {
        &self.data
    }

    /// Matrix multiplication: `self * rhs`.
    #[inline]
    pub fn mul_mat(&self, rhs: &DMat3) -> DMat3 {
        let a = &self.data;
        let b = &rhs.data;
        let mut out = [0.0; 9];
        for row in 0..3 {
            for col in 0..3 {
                out[row * 3 + col] = a[row * 3] * b[col]
                    + a[row * 3 + 1] * b[3 + col]
                    + a[row * 3 + 2] * b[6 + col];
            }
        }
        DMat3 { data: out }
    }

    #[inline]
    pub fn determinant(&self) -> f64 {
        let d = &self.data;
        d[0] * (d[4] * d[8] - d[5] * d[7]) - d[1] * (d[3] * d[8] - d[5] * d[6])
            + d[2] * (d[3] * d[7] - d[4] * d[6])
    }

    /// Matrix inverse, or `None` if the determinant is below 1e-12.
    pub fn inverse(&self) -> Option<DMat3> {
        let det = self.determinant();
        if !det.is_finite() || det.abs() < SINGULAR_EPS {
            return None;
        }
        let inv_det = 1.0 / det;
        let d = &self.data;
        Some(DMat3 {
            data: [
                (d[4] * d[8] - d[5] * d[7]) * inv_det,
                (d[2] * d[7] - d[1] * d[8]) * inv_det,
                (d[1] * d[5] - d[2] * d[4]) * inv_det,
                (d[5] * d[6] - d[3] * d[8]) * inv_det,
                (d[0] * d[8] - d[2] * d[6]) * inv_det,
                (d[2] * d[3] - d[0] * d[5]) * inv_det,
                (d[3] * d[7] - d[4] * d[6]) * inv_det,
                (d[1] * d[6] - d[0] * d[7]) * inv_det,
                (d[0] * d[4] - d[1] * d[3]) * inv_det,
            ],
        })
    }

    /// Scale every element so that `m[8] == 1`. `None` if `|m[8]| < eps`.
    pub fn normalized(&self, eps: f64) -> Option<DMat3> {
        let scale = self.data[8];
        if !scale.is_finite() || scale.abs() < eps {
            return None;
        }
        Some(*self * (1.0 / scale))
    }

    /// Apply this matrix as a 2D homogeneous transform.
    ///
    /// Returns `None` for points mapped to infinity (`w ≈ 0`).
    #[inline]
    pub fn try_transform_point(&self, p: DVec2) -> Option<DVec2> {
        let d = &self.data;
        let w = d[6] * p.x + d[7] * p.y + d[8];
        if w.abs() <= f64::EPSILON {
            return None;
        }
        Some(DVec2::new(
            (d[0] * p.x + d[1] * p.y + d[2]) / w,
            (d[3] * p.x + d[4] * p.y + d[5]) / w,
        ))
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }
}

impl Default for DMat3 {
    #[inline]
    fn default() -> Self {
        Self::identity()
    }
}

impl Index<usize> for DMat3 {
    type Output = f64;
    #[inline]
    fn index(&self, idx: usize) -> &f64 {
        &self.data[idx]
    }
}

impl Mul for DMat3 {
    type Output = DMat3;
    #[inline]
    fn mul(self, rhs: DMat3) -> DMat3 {
        self.mul_mat(&rhs)
    }
}

impl Mul<f64> for DMat3 {
    type Output = DMat3;
    #[inline]
    fn mul(self, rhs: f64) -> DMat3 {
        let mut out = self;
        for v in out.data.iter_mut() {
            *v *= rhs;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-10;

    fn mat_approx_eq(a: &DMat3, b: &DMat3) -> bool {
        a.as_array()
            .iter()
            .zip(b.as_array().iter())
            .all(|(x, y)| (x - y).abs() < EPS)
    }

    #[test]
    fn test_mul_identity() {
        let m = DMat3::from_rows([2.0, 1.0, 3.0], [0.5, 4.0, -1.0], [0.001, 0.002, 1.0]);
        assert!(mat_approx_eq(&(m * DMat3::identity()), &m));
        assert!(mat_approx_eq(&(DMat3::identity() * m), &m));
    }

    #[test]
    fn test_inverse_roundtrip() {
        let m = DMat3::from_rows([1.1, 0.05, 30.0], [-0.02, 0.95, -12.0], [1e-4, 2e-5, 1.0]);
        let inv = m.inverse().unwrap();
        assert!(mat_approx_eq(&(m * inv), &DMat3::identity()));
    }

    #[test]
    fn test_singular_has_no_inverse() {
        let m = DMat3::from_rows([1.0, 2.0, 3.0], [2.0, 4.0, 6.0], [0.0, 0.0, 1.0]);
        assert!(m.inverse().is_none());
    }

    #[test]
    fn test_normalized() {
        let m = DMat3::identity() * 4.0;
        assert!(mat_approx_eq(&m.normalized(1e-10).unwrap(), &DMat3::identity()));

        let degenerate = DMat3::from_rows([1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 0.0]);
        assert!(degenerate.normalized(1e-10).is_none());
    }

    #[test]
    fn test_transform_point_projective() {
        let m = DMat3::from_rows([1.0, 0.0, 10.0], [0.0, 1.0, 5.0], [0.0, 0.0, 2.0]);
        let p = m.try_transform_point(DVec2::new(2.0, 4.0)).unwrap();
        assert!((p.x - 6.0).abs() < EPS);
        assert!((p.y - 4.5).abs() < EPS);
    }

    #[test]
    fn test_transform_point_at_infinity() {
        let m = DMat3::from_rows([1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]);
        assert!(m.try_transform_point(DVec2::new(0.0, 3.0)).is_none());
    }
}
