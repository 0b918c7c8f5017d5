//! Gaussian and difference-of-Gaussian pyramids over single-channel f32 planes.

use common::parallel::par_rows_mut;
use rayon::prelude::*;

/// Blur already present in a freshly loaded image.
const SIGMA_IN: f32 = 0.5;

/// Octaves whose short side falls below this are not built.
const MIN_OCTAVE_SIZE: usize = 8;

/// Single-channel f32 image, row-major.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Plane {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl Plane {
    pub fn new(width: usize, height: usize, data: Vec<f32>) -> Self {
        assert_eq!(data.len(), width * height, "Pixel count mismatch");
        Self {
            width,
            height,
            data,
        }
    }

    #[inline]
    pub fn at(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    /// Every second pixel in both directions.
    pub fn downsample(&self) -> Plane {
        let width = (self.width / 2).max(1);
        let height = (self.height / 2).max(1);
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            let row = &self.data[(2 * y) * self.width..];
            data.extend((0..width).map(|x| row[2 * x]));
        }
        Plane::new(width, height, data)
    }

    /// Pixel-wise `self - other`.
    pub fn subtract(&self, other: &Plane) -> Plane {
        debug_assert_eq!(self.data.len(), other.data.len());
        let data = self
            .data
            .par_iter()
            .zip(other.data.par_iter())
            .map(|(a, b)| a - b)
            .collect();
        Plane::new(self.width, self.height, data)
    }

    /// Separable Gaussian blur with replicated borders.
    pub fn gaussian_blur(&self, sigma: f32) -> Plane {
        let kernel = gaussian_kernel_1d(sigma);
        let radius = (kernel.len() / 2) as isize;
        let (w, h) = (self.width, self.height);

        let mut temp = vec![0.0f32; w * h];
        par_rows_mut(&mut temp, w).for_each(|(first_row, chunk)| {
            for (local_y, out_row) in chunk.chunks_mut(w).enumerate() {
                let in_row = &self.data[(first_row + local_y) * w..][..w];
                for (x, out) in out_row.iter_mut().enumerate() {
                    *out = kernel
                        .iter()
                        .enumerate()
                        .map(|(k, kv)| {
                            let sx = (x as isize + k as isize - radius).clamp(0, w as isize - 1);
                            in_row[sx as usize] * kv
                        })
                        .sum();
                }
            }
        });

        let mut output = vec![0.0f32; w * h];
        par_rows_mut(&mut output, w).for_each(|(first_row, chunk)| {
            for (local_y, out_row) in chunk.chunks_mut(w).enumerate() {
                let y = (first_row + local_y) as isize;
                out_row.fill(0.0);
                for (k, kv) in kernel.iter().enumerate() {
                    let sy = (y + k as isize - radius).clamp(0, h as isize - 1) as usize;
                    let in_row = &temp[sy * w..][..w];
                    for (out, v) in out_row.iter_mut().zip(in_row) {
                        *out += v * kv;
                    }
                }
            }
        });

        Plane::new(w, h, output)
    }
}

/// Normalized 1D Gaussian kernel with radius `ceil(3 * sigma)`.
pub(crate) fn gaussian_kernel_1d(sigma: f32) -> Vec<f32> {
    assert!(sigma > 0.0, "Sigma must be positive");

    let radius = (3.0 * sigma).ceil() as usize;
    let two_sigma_sq = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (0..=2 * radius)
        .map(|i| {
            let x = i as f32 - radius as f32;
            (-x * x / two_sigma_sq).exp()
        })
        .collect();

    let sum: f32 = kernel.iter().sum();
    kernel.iter_mut().for_each(|v| *v /= sum);
    kernel
}

/// Number of octaves for an image whose shorter side is `min_dim` pixels.
pub(crate) fn octave_count(min_dim: usize, max_octaves: usize) -> usize {
    if min_dim < 2 {
        return 1;
    }
    let by_size = (min_dim as f32).log2().floor() as i64 - 3;
    by_size.clamp(1, max_octaves as i64) as usize
}

/// Gaussian pyramid plus its difference-of-Gaussian stack.
///
/// `gaussians[o]` holds `scales + 3` levels, `dogs[o]` holds `scales + 2`.
#[derive(Debug)]
pub(crate) struct ScaleSpace {
    pub gaussians: Vec<Vec<Plane>>,
    pub dogs: Vec<Vec<Plane>>,
    pub scales: usize,
    pub sigma: f32,
}

impl ScaleSpace {
    pub fn build(base: Plane, scales: usize, sigma: f32, max_octaves: usize) -> Self {
        let num_octaves = octave_count(base.width.min(base.height), max_octaves);

        // Incremental blur between consecutive levels of one octave.
        let k = 2f32.powf(1.0 / scales as f32);
        let level_sigmas: Vec<f32> = (1..scales + 3)
            .map(|i| {
                let prev = sigma * k.powi(i as i32 - 1);
                let total = prev * k;
                (total * total - prev * prev).sqrt()
            })
            .collect();

        let initial = (sigma * sigma - SIGMA_IN * SIGMA_IN).max(0.01).sqrt();
        let mut octave_base = base.gaussian_blur(initial);

        let mut gaussians: Vec<Vec<Plane>> = Vec::with_capacity(num_octaves);
        for octave in 0..num_octaves {
            if octave > 0 && octave_base.width.min(octave_base.height) < MIN_OCTAVE_SIZE {
                break;
            }
            let mut levels = Vec::with_capacity(scales + 3);
            levels.push(octave_base);
            for &s in &level_sigmas {
                let next = levels[levels.len() - 1].gaussian_blur(s);
                levels.push(next);
            }
            // Level `scales` has twice the base blur; it seeds the next octave.
            octave_base = levels[scales].downsample();
            gaussians.push(levels);
        }

        let dogs = gaussians
            .iter()
            .map(|levels| levels.windows(2).map(|w| w[1].subtract(&w[0])).collect())
            .collect();

        Self {
            gaussians,
            dogs,
            scales,
            sigma,
        }
    }

    pub fn num_octaves(&self) -> usize {
        self.gaussians.len()
    }
}
