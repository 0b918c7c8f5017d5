//! Testing utilities for panorama.
//!
//! Scenes are generated from seeded RNGs so every test sees identical pixels.
//! Also compiled with the `bench` feature so benchmarks share the generators.

#![allow(dead_code)]

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::raster::Image;

/// Initialize tracing subscriber for tests.
/// Safe to call multiple times - will only initialize once.
/// Respects RUST_LOG env var, defaults to "info".
#[cfg(test)]
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Dense field of overlapping colored Gaussian blobs on a gray background.
///
/// Blobs overlap heavily so local neighborhoods are distinctive, which gives
/// the feature detector plenty of unambiguous keypoints.
pub fn textured_scene(width: usize, height: usize, seed: u64) -> Image {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut acc = vec![110.0f32; width * height * 3];

    let num_blobs = width * height / 120;
    for _ in 0..num_blobs {
        let cx = rng.random_range(-8.0..width as f32 + 8.0);
        let cy = rng.random_range(-8.0..height as f32 + 8.0);
        let sigma: f32 = rng.random_range(1.5..6.0);
        let amp: [f32; 3] = [
            rng.random_range(-90.0..90.0),
            rng.random_range(-90.0..90.0),
            rng.random_range(-90.0..90.0),
        ];
        splat_blob(&mut acc, width, height, cx, cy, sigma, amp);
    }

    to_rgb_image(width, height, &acc)
}

/// Periodic blob lattice: every interior neighborhood repeats with `period`.
pub fn tiled_scene(width: usize, height: usize, period: usize) -> Image {
    let mut acc = vec![110.0f32; width * height * 3];
    let half = period as f32 / 2.0;
    let mut y = 0;
    while y < height + period {
        let mut x = 0;
        while x < width + period {
            let (cx, cy) = (x as f32, y as f32);
            splat_blob(&mut acc, width, height, cx, cy, 3.0, [90.0, 60.0, 30.0]);
            splat_blob(&mut acc, width, height, cx + half, cy, 2.0, [-70.0, -40.0, 20.0]);
            splat_blob(&mut acc, width, height, cx, cy + half, 1.5, [40.0, -80.0, -60.0]);
            x += period;
        }
        y += period;
    }
    to_rgb_image(width, height, &acc)
}

/// A sub-window of `image`.
pub fn crop(image: &Image, x0: usize, y0: usize, width: usize, height: usize) -> Image {
    assert!(x0 + width <= image.width() && y0 + height <= image.height());
    let c = image.channels();
    let mut data = Vec::with_capacity(width * height * c);
    for y in y0..y0 + height {
        data.extend_from_slice(&image.row(y)[x0 * c..(x0 + width) * c]);
    }
    Image::from_raw(width, height, c, data).unwrap()
}

/// `count` equally sized windows stepping `step` pixels to the right,
/// ordered left to right.
pub fn horizontal_sequence(scene: &Image, count: usize, width: usize, step: usize) -> Vec<Image> {
    (0..count)
        .map(|i| crop(scene, i * step, 0, width, scene.height()))
        .collect()
}

/// Mean absolute per-byte difference over a rectangle present in both images.
pub fn mean_abs_diff(
    a: &Image,
    a_origin: (usize, usize),
    b: &Image,
    b_origin: (usize, usize),
    size: (usize, usize),
) -> f64 {
    assert_eq!(a.channels(), b.channels());
    let mut total = 0u64;
    let mut count = 0u64;
    for dy in 0..size.1 {
        for dx in 0..size.0 {
            let pa = a.pixel(a_origin.0 + dx, a_origin.1 + dy);
            let pb = b.pixel(b_origin.0 + dx, b_origin.1 + dy);
            for (va, vb) in pa.iter().zip(pb) {
                total += (*va as i32 - *vb as i32).unsigned_abs() as u64;
                count += 1;
            }
        }
    }
    total as f64 / count.max(1) as f64
}

fn splat_blob(
    acc: &mut [f32],
    width: usize,
    height: usize,
    cx: f32,
    cy: f32,
    sigma: f32,
    amp: [f32; 3],
) {
    let r = (3.0 * sigma).ceil();
    let x0 = (cx - r).floor().max(0.0) as usize;
    let y0 = (cy - r).floor().max(0.0) as usize;
    let x1 = ((cx + r).ceil().max(0.0) as usize).min(width);
    let y1 = ((cy + r).ceil().max(0.0) as usize).min(height);
    let inv = -1.0 / (2.0 * sigma * sigma);
    for y in y0..y1 {
        for x in x0..x1 {
            let d2 = (x as f32 - cx).powi(2) + (y as f32 - cy).powi(2);
            let w = (d2 * inv).exp();
            let idx = (y * width + x) * 3;
            for c in 0..3 {
                acc[idx + c] += amp[c] * w;
            }
        }
    }
}

fn to_rgb_image(width: usize, height: usize, acc: &[f32]) -> Image {
    let data = acc.iter().map(|v| v.round().clamp(0.0, 255.0) as u8).collect();
    Image::from_raw(width, height, 3, data).unwrap()
}

/// Two identical copies of a textured patch side by side, each surrounded by
/// `margin` pixels of flat background. Every keypoint of one copy has an
/// identical twin in the other.
pub fn twin_scene(content_width: usize, margin: usize, height: usize, seed: u64) -> Image {
    let content = textured_scene(content_width, height, seed);
    let half = content_width + 2 * margin;
    Image::from_fn(2 * half, height, |x, y| {
        let local = x % half;
        if (margin..margin + content_width).contains(&local) {
            let p = content.pixel(local - margin, y);
            [p[0], p[1], p[2]]
        } else {
            [110, 110, 110]
        }
    })
}
