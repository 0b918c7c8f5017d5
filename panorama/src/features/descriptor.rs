//! 128-dimensional gradient histogram descriptors.

use super::detect::OctaveKeypoint;
use super::scale_space::Plane;
use super::{Descriptor, DESCRIPTOR_SIZE};

/// Spatial cells per side.
const WIDTH: usize = 4;
/// Orientation bins per cell.
const BINS: usize = 8;
/// Cell size in units of the keypoint's octave scale.
const SCALE_FACTOR: f32 = 3.0;
/// Per-element cap applied before renormalization.
const MAGNITUDE_CLIP: f32 = 0.2;

/// Compute the descriptor of `kp` on its Gaussian level `img`.
pub(crate) fn compute_descriptor(img: &Plane, kp: &OctaveKeypoint) -> Descriptor {
    let d = WIDTH;
    let n = BINS;
    let cx = kp.x.round() as i64;
    let cy = kp.y.round() as i64;

    // Rotate the sampling grid into the keypoint frame.
    let ori = 360.0 - kp.angle_deg;
    let (sin_t, cos_t) = ori.to_radians().sin_cos();
    let bins_per_degree = n as f32 / 360.0;
    let exp_scale = -1.0 / (d as f32 * d as f32 * 0.5);
    let hist_width = SCALE_FACTOR * kp.octave_sigma;
    let diagonal = ((img.width * img.width + img.height * img.height) as f32).sqrt();
    let radius = (hist_width * std::f32::consts::SQRT_2 * (d as f32 + 1.0) * 0.5)
        .round()
        .min(diagonal) as i64;
    let (cos_t, sin_t) = (cos_t / hist_width, sin_t / hist_width);

    // Padded by one cell / bin on each side for interpolation spill-over.
    let row_stride = (d + 2) * (n + 2);
    let mut hist = vec![0.0f32; (d + 2) * row_stride];

    for i in -radius..=radius {
        for j in -radius..=radius {
            let c_rot = j as f32 * cos_t - i as f32 * sin_t;
            let r_rot = j as f32 * sin_t + i as f32 * cos_t;
            let rbin = r_rot + d as f32 / 2.0 - 0.5;
            let cbin = c_rot + d as f32 / 2.0 - 0.5;
            let r = cy + i;
            let c = cx + j;

            if rbin <= -1.0
                || rbin >= d as f32
                || cbin <= -1.0
                || cbin >= d as f32
                || r <= 0
                || r >= img.height as i64 - 1
                || c <= 0
                || c >= img.width as i64 - 1
            {
                continue;
            }

            let (ru, cu) = (r as usize, c as usize);
            let dx = img.at(cu + 1, ru) - img.at(cu - 1, ru);
            let dy = img.at(cu, ru - 1) - img.at(cu, ru + 1);
            let weight = ((c_rot * c_rot + r_rot * r_rot) * exp_scale).exp();
            let magnitude = (dx * dx + dy * dy).sqrt() * weight;
            let grad_ori = dy.atan2(dx).to_degrees().rem_euclid(360.0);
            let obin = (grad_ori - ori) * bins_per_degree;

            let r0 = rbin.floor();
            let c0 = cbin.floor();
            let o0 = obin.floor();
            let (rf, cf, of) = (rbin - r0, cbin - c0, obin - o0);
            let o0 = (o0 as i64).rem_euclid(n as i64) as usize;

            let v_r1 = magnitude * rf;
            let v_r0 = magnitude - v_r1;
            let v_rc11 = v_r1 * cf;
            let v_rc10 = v_r1 - v_rc11;
            let v_rc01 = v_r0 * cf;
            let v_rc00 = v_r0 - v_rc01;

            let r_cell = (r0 as i64 + 1) as usize;
            let c_cell = (c0 as i64 + 1) as usize;
            let idx = (r_cell * (d + 2) + c_cell) * (n + 2) + o0;
            for (base, v) in [
                (idx, v_rc00),
                (idx + (n + 2), v_rc01),
                (idx + row_stride, v_rc10),
                (idx + row_stride + (n + 2), v_rc11),
            ] {
                let v1 = v * of;
                hist[base] += v - v1;
                hist[base + 1] += v1;
            }
        }
    }

    let mut desc = [0.0f32; DESCRIPTOR_SIZE];
    for i in 0..d {
        for j in 0..d {
            let idx = ((i + 1) * (d + 2) + (j + 1)) * (n + 2);
            // Fold the wrap-around bins back onto the first two.
            hist[idx] += hist[idx + n];
            hist[idx + 1] += hist[idx + n + 1];
            let out = (i * d + j) * n;
            desc[out..out + n].copy_from_slice(&hist[idx..idx + n]);
        }
    }

    normalize_and_clip(&mut desc);
    desc
}

/// Unit-normalize, clip large components, renormalize.
///
/// Leaves an all-zero vector untouched.
pub(crate) fn normalize_and_clip(desc: &mut [f32]) {
    let norm = desc.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm <= f32::EPSILON {
        return;
    }
    let clip = norm * MAGNITUDE_CLIP;
    desc.iter_mut().for_each(|v| *v = v.min(clip));

    let norm = desc.iter().map(|v| v * v).sum::<f32>().sqrt();
    desc.iter_mut().for_each(|v| *v /= norm);
}
