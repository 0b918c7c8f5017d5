//! Normalized Direct Linear Transform for homography fitting.

use glam::DVec2;
use nalgebra::{DMatrix, SVD};

use crate::math::DMat3;

/// Sine of the smallest angle at which three points still count as a triangle.
const COLLINEAR_EPS: f64 = 1e-3;

/// Compute adaptive iteration count for early termination.
pub(crate) fn adaptive_iterations(inlier_ratio: f64, sample_size: usize, confidence: f64) -> usize {
    if inlier_ratio <= 0.0 {
        return usize::MAX;
    }
    if inlier_ratio >= 1.0 {
        return 1;
    }

    // N = log(1 - confidence) / log(1 - w^n)
    let w_n = inlier_ratio.powi(sample_size as i32);
    let log_conf = (1.0 - confidence).ln();
    let log_outlier = (1.0 - w_n).ln();

    if log_outlier >= 0.0 {
        return usize::MAX;
    }

    (log_conf / log_outlier).ceil().max(1.0) as usize
}

/// Estimate a homography mapping `src` onto `dst` from at least 4 pairs.
///
/// Returns the raw matrix (arbitrary scale), or `None` if the system is
/// degenerate.
pub(crate) fn estimate_homography(src: &[DVec2], dst: &[DVec2]) -> Option<DMat3> {
    debug_assert_eq!(src.len(), dst.len());
    if src.len() < 4 {
        return None;
    }

    let (src_norm, src_t) = normalize_points(src)?;
    let (dst_norm, dst_t) = normalize_points(dst)?;

    // Each pair contributes two rows of A in A h = 0:
    // [-x -y -1  0  0  0  x*x'  y*x'  x']
    // [ 0  0  0 -x -y -1  x*y'  y*y'  y']
    let n = src_norm.len();
    let mut a_data = Vec::with_capacity(2 * n * 9);
    for (s, d) in src_norm.iter().zip(&dst_norm) {
        a_data.extend_from_slice(&[-s.x, -s.y, -1.0, 0.0, 0.0, 0.0, s.x * d.x, s.y * d.x, d.x]);
        a_data.extend_from_slice(&[0.0, 0.0, 0.0, -s.x, -s.y, -1.0, s.x * d.y, s.y * d.y, d.y]);
    }
    let a = DMatrix::from_row_slice(2 * n, 9, &a_data);
    let h_norm = solve_homogeneous_svd(a)?;

    // H = T_dst^-1 * H_norm * T_src
    let h = dst_t.inverse()? * h_norm * src_t;
    h.is_finite().then_some(h)
}

/// Translate to the centroid and scale so the mean distance is sqrt(2).
///
/// Returns `None` if all points coincide.
pub(crate) fn normalize_points(points: &[DVec2]) -> Option<(Vec<DVec2>, DMat3)> {
    let c = centroid(points);
    let mean_dist = points.iter().map(|p| (*p - c).length()).sum::<f64>() / points.len() as f64;
    if mean_dist < 1e-10 {
        return None;
    }

    let scale = std::f64::consts::SQRT_2 / mean_dist;
    let normalized = points.iter().map(|p| (*p - c) * scale).collect();
    let t = DMat3::from_rows(
        [scale, 0.0, -c.x * scale],
        [0.0, scale, -c.y * scale],
        [0.0, 0.0, 1.0],
    );
    Some((normalized, t))
}

/// Solve `A h = 0` via SVD of the m×9 design matrix.
///
/// Returns the right singular vector of the smallest singular value.
fn solve_homogeneous_svd(a: DMatrix<f64>) -> Option<DMat3> {
    let nrows = a.nrows();
    let ncols = a.ncols();

    // nalgebra computes a thin SVD, so V^T has min(m, n) rows. Pad with zero
    // rows to keep the null-space vector for m < 9.
    let a = if nrows < ncols {
        let mut padded = DMatrix::zeros(ncols, ncols);
        padded.view_mut((0, 0), (nrows, ncols)).copy_from(&a);
        padded
    } else {
        a
    };

    let svd = SVD::new(a, false, true);
    let v_t = svd.v_t?;

    // Singular values are not guaranteed to be sorted.
    let (min_idx, _) = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))?;

    let row = v_t.row(min_idx);
    let mut data = [0.0f64; 9];
    for (dst, &val) in data.iter_mut().zip(row.iter()) {
        *dst = val;
    }
    Some(DMat3::from_array(data))
}

pub(crate) fn centroid(points: &[DVec2]) -> DVec2 {
    if points.is_empty() {
        return DVec2::ZERO;
    }
    points.iter().copied().sum::<DVec2>() / points.len() as f64
}

/// True if any three of the points are (nearly) collinear or coincide.
pub(crate) fn has_collinear_triple(points: &[DVec2]) -> bool {
    let n = points.len();
    for i in 0..n {
        for j in i + 1..n {
            for k in j + 1..n {
                let ab = points[j] - points[i];
                let ac = points[k] - points[i];
                let cross = ab.perp_dot(ac).abs();
                if cross <= COLLINEAR_EPS * ab.length() * ac.length() {
                    return true;
                }
            }
        }
    }
    false
}
