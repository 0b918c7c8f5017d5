//! Scale-space extrema detection, sub-pixel refinement and orientation assignment.

use nalgebra::{Matrix3, Vector3};
use rayon::prelude::*;

use super::scale_space::{Plane, ScaleSpace};
use crate::config::FeatureConfig;

/// Minimum distance of a candidate from the octave border.
pub(crate) const IMAGE_BORDER: usize = 5;

const MAX_INTERPOLATION_STEPS: usize = 5;

const ORIENTATION_BINS: usize = 36;
/// Orientation window sigma relative to the keypoint's octave scale.
const ORIENTATION_SIGMA_FACTOR: f32 = 1.5;
/// Orientation window radius in units of the window sigma.
const ORIENTATION_RADIUS_FACTOR: f32 = 3.0 * ORIENTATION_SIGMA_FACTOR;
/// Secondary peaks at least this fraction of the maximum spawn extra keypoints.
const ORIENTATION_PEAK_RATIO: f32 = 0.8;

/// A refined extremum with everything the descriptor stage needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct OctaveKeypoint {
    pub octave: usize,
    pub layer: usize,
    /// Sub-pixel position in octave coordinates.
    pub x: f32,
    pub y: f32,
    /// Blur of the keypoint relative to its octave.
    pub octave_sigma: f32,
    pub response: f32,
    /// Dominant gradient orientation in degrees, [0, 360).
    pub angle_deg: f32,
}

impl OctaveKeypoint {
    #[inline]
    pub fn octave_scale(&self) -> f32 {
        (1usize << self.octave) as f32
    }
}

/// Detect oriented keypoints in every octave. Output order is deterministic:
/// octave, layer, row, column, orientation peak.
pub(crate) fn detect_keypoints(space: &ScaleSpace, config: &FeatureConfig) -> Vec<OctaveKeypoint> {
    let layers: Vec<(usize, usize)> = (0..space.num_octaves())
        .flat_map(|o| (1..=space.scales).map(move |l| (o, l)))
        .collect();

    layers
        .par_iter()
        .map(|&(octave, layer)| detect_in_layer(space, config, octave, layer))
        .collect::<Vec<_>>()
        .into_iter()
        .flatten()
        .collect()
}

fn detect_in_layer(
    space: &ScaleSpace,
    config: &FeatureConfig,
    octave: usize,
    layer: usize,
) -> Vec<OctaveKeypoint> {
    let dogs = &space.dogs[octave];
    let (prev, curr, next) = (&dogs[layer - 1], &dogs[layer], &dogs[layer + 1]);
    let (w, h) = (curr.width, curr.height);
    if w <= 2 * IMAGE_BORDER || h <= 2 * IMAGE_BORDER {
        return Vec::new();
    }

    let threshold = 0.5 * config.contrast_threshold / space.scales as f32;
    let mut out = Vec::new();

    for y in IMAGE_BORDER..h - IMAGE_BORDER {
        for x in IMAGE_BORDER..w - IMAGE_BORDER {
            let v = curr.at(x, y);
            if v.abs() <= threshold || !is_local_extremum(prev, curr, next, x, y, v) {
                continue;
            }
            let Some(kp) = refine_extremum(space, config, octave, layer, x, y) else {
                continue;
            };
            assign_orientations(&space.gaussians[octave][kp.layer], kp, &mut out);
        }
    }
    out
}

fn is_local_extremum(
    prev: &Plane,
    curr: &Plane,
    next: &Plane,
    x: usize,
    y: usize,
    v: f32,
) -> bool {
    let neighbors = || {
        [prev, curr, next].into_iter().flat_map(move |p| {
            (y - 1..=y + 1).flat_map(move |yy| (x - 1..=x + 1).map(move |xx| p.at(xx, yy)))
        })
    };
    if v > 0.0 {
        neighbors().all(|n| v >= n)
    } else {
        neighbors().all(|n| v <= n)
    }
}

/// First derivatives and Hessian of the DoG stack at an integer sample.
fn derivatives(dogs: &[Plane], layer: usize, x: usize, y: usize) -> (Vector3<f32>, Matrix3<f32>) {
    let (prev, curr, next) = (&dogs[layer - 1], &dogs[layer], &dogs[layer + 1]);
    let v2 = curr.at(x, y) * 2.0;

    let dx = (curr.at(x + 1, y) - curr.at(x - 1, y)) * 0.5;
    let dy = (curr.at(x, y + 1) - curr.at(x, y - 1)) * 0.5;
    let ds = (next.at(x, y) - prev.at(x, y)) * 0.5;

    let dxx = curr.at(x + 1, y) + curr.at(x - 1, y) - v2;
    let dyy = curr.at(x, y + 1) + curr.at(x, y - 1) - v2;
    let dss = next.at(x, y) + prev.at(x, y) - v2;
    let dxy = (curr.at(x + 1, y + 1) - curr.at(x - 1, y + 1) - curr.at(x + 1, y - 1)
        + curr.at(x - 1, y - 1))
        * 0.25;
    let dxs =
        (next.at(x + 1, y) - next.at(x - 1, y) - prev.at(x + 1, y) + prev.at(x - 1, y)) * 0.25;
    let dys =
        (next.at(x, y + 1) - next.at(x, y - 1) - prev.at(x, y + 1) + prev.at(x, y - 1)) * 0.25;

    let gradient = Vector3::new(dx, dy, ds);
    let hessian = Matrix3::new(dxx, dxy, dxs, dxy, dyy, dys, dxs, dys, dss);
    (gradient, hessian)
}

/// Second-order Taylor refinement of a discrete extremum.
///
/// Returns `None` if the fit does not converge, drifts out of the octave,
/// has low contrast or lies on an edge.
fn refine_extremum(
    space: &ScaleSpace,
    config: &FeatureConfig,
    octave: usize,
    layer: usize,
    x: usize,
    y: usize,
) -> Option<OctaveKeypoint> {
    let dogs = &space.dogs[octave];
    let (w, h) = (dogs[0].width, dogs[0].height);
    let scales = space.scales;
    let (mut x, mut y, mut layer) = (x as i64, y as i64, layer as i64);

    let mut converged = None;
    for _ in 0..MAX_INTERPOLATION_STEPS {
        let (g, hess) = derivatives(dogs, layer as usize, x as usize, y as usize);
        let offset = -(hess.try_inverse()? * g);

        if offset.iter().all(|o| o.abs() < 0.5) {
            converged = Some((g, offset));
            break;
        }
        if offset.iter().any(|o| !o.is_finite() || o.abs() > (w.max(h) as f32)) {
            return None;
        }

        x += offset[0].round() as i64;
        y += offset[1].round() as i64;
        layer += offset[2].round() as i64;

        let border = IMAGE_BORDER as i64;
        if layer < 1
            || layer > scales as i64
            || x < border
            || x >= w as i64 - border
            || y < border
            || y >= h as i64 - border
        {
            return None;
        }
    }
    let (g, offset) = converged?;
    let (x, y, layer) = (x as usize, y as usize, layer as usize);

    let curr = &dogs[layer];
    let contrast = curr.at(x, y) + 0.5 * g.dot(&offset);
    if contrast.abs() * (scales as f32) < config.contrast_threshold {
        return None;
    }

    // Principal curvature ratio from the 2x2 spatial Hessian.
    let v2 = curr.at(x, y) * 2.0;
    let dxx = curr.at(x + 1, y) + curr.at(x - 1, y) - v2;
    let dyy = curr.at(x, y + 1) + curr.at(x, y - 1) - v2;
    let dxy = (curr.at(x + 1, y + 1) - curr.at(x - 1, y + 1) - curr.at(x + 1, y - 1)
        + curr.at(x - 1, y - 1))
        * 0.25;
    let tr = dxx + dyy;
    let det = dxx * dyy - dxy * dxy;
    let r = config.edge_threshold;
    if det <= 0.0 || tr * tr * r >= (r + 1.0) * (r + 1.0) * det {
        return None;
    }

    Some(OctaveKeypoint {
        octave,
        layer,
        x: x as f32 + offset[0],
        y: y as f32 + offset[1],
        octave_sigma: space.sigma * 2f32.powf((layer as f32 + offset[2]) / scales as f32),
        response: contrast.abs(),
        angle_deg: 0.0,
    })
}

/// Push one copy of `kp` per dominant orientation peak.
fn assign_orientations(img: &Plane, kp: OctaveKeypoint, out: &mut Vec<OctaveKeypoint>) {
    let hist = orientation_histogram(
        img,
        kp.x.round() as i64,
        kp.y.round() as i64,
        (ORIENTATION_RADIUS_FACTOR * kp.octave_sigma).round() as i64,
        ORIENTATION_SIGMA_FACTOR * kp.octave_sigma,
    );

    let max = hist.iter().copied().fold(0.0f32, f32::max);
    if max <= 0.0 {
        return;
    }
    let peak_threshold = max * ORIENTATION_PEAK_RATIO;
    let n = ORIENTATION_BINS;

    for j in 0..n {
        let l = if j > 0 { j - 1 } else { n - 1 };
        let r = if j + 1 < n { j + 1 } else { 0 };
        if hist[j] > hist[l] && hist[j] > hist[r] && hist[j] >= peak_threshold {
            let mut bin =
                j as f32 + 0.5 * (hist[l] - hist[r]) / (hist[l] - 2.0 * hist[j] + hist[r]);
            if bin < 0.0 {
                bin += n as f32;
            } else if bin >= n as f32 {
                bin -= n as f32;
            }
            let mut angle = 360.0 - (360.0 / n as f32) * bin;
            if (angle - 360.0).abs() < f32::EPSILON {
                angle = 0.0;
            }
            out.push(OctaveKeypoint {
                angle_deg: angle,
                ..kp
            });
        }
    }
}

/// Smoothed 36-bin histogram of gradient directions around `(cx, cy)`.
///
/// The y derivative is taken upward (`I(y-1) - I(y+1)`) so angles read
/// counter-clockwise in image space.
pub(crate) fn orientation_histogram(
    img: &Plane,
    cx: i64,
    cy: i64,
    radius: i64,
    sigma: f32,
) -> [f32; ORIENTATION_BINS] {
    let n = ORIENTATION_BINS;
    let weight_scale = -1.0 / (2.0 * sigma * sigma);
    let bins_per_degree = n as f32 / 360.0;
    let mut raw = [0.0f32; ORIENTATION_BINS];

    for i in -radius..=radius {
        let y = cy + i;
        if y <= 0 || y >= img.height as i64 - 1 {
            continue;
        }
        for j in -radius..=radius {
            let x = cx + j;
            if x <= 0 || x >= img.width as i64 - 1 {
                continue;
            }
            let (xu, yu) = (x as usize, y as usize);
            let dx = img.at(xu + 1, yu) - img.at(xu - 1, yu);
            let dy = img.at(xu, yu - 1) - img.at(xu, yu + 1);
            let weight = (((i * i + j * j) as f32) * weight_scale).exp();
            let magnitude = (dx * dx + dy * dy).sqrt();
            let angle = dy.atan2(dx).to_degrees().rem_euclid(360.0);

            let bin = (bins_per_degree * angle).round() as usize % n;
            raw[bin] += weight * magnitude;
        }
    }

    let mut hist = [0.0f32; ORIENTATION_BINS];
    for (i, h) in hist.iter_mut().enumerate() {
        let at = |offset: isize| raw[(i as isize + offset).rem_euclid(n as isize) as usize];
        *h = (at(-2) + at(2)) * (1.0 / 16.0)
            + (at(-1) + at(1)) * (4.0 / 16.0)
            + at(0) * (6.0 / 16.0);
    }
    hist
}
