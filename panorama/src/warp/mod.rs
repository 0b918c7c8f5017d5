//! Perspective resampling and canvas composition.
//!
//! The warp maps every output pixel through the inverse homography and samples
//! the source image there, so the output has no holes. Rows are processed in
//! parallel.


use common::parallel::par_rows_mut;
use glam::DVec2;
use rayon::prelude::*;

use crate::config::{InterpolationMethod, WarpConfig};
use crate::error::{Result, StitchError};
use crate::homography::Homography;
use crate::raster::Image;

/// Resample `image` into a `width` x `height` frame.
///
/// `homography` maps `image` coordinates into output coordinates. Output
/// pixels whose source lies outside `image` take `config.border_value`.
pub fn warp_perspective(
    image: &Image,
    homography: &Homography,
    width: usize,
    height: usize,
    config: &WarpConfig,
) -> Result<Image> {
    image.ensure_not_empty("image to warp")?;
    let channels = image.channels();
    let output = Image::zeros(width, height, channels)?;
    if output.is_empty() {
        return Ok(output);
    }

    let row_len = width * channels;
    let border = config.border_value;
    let method = config.method;
    let mut data = output.into_raw();

    par_rows_mut(&mut data, row_len).for_each(|(first_row, chunk)| {
        for (i, out_row) in chunk.chunks_exact_mut(row_len).enumerate() {
            warp_row(image, homography, first_row + i, out_row, method, border);
        }
    });

    Image::from_raw(width, height, channels, data)
}

/// Warp `to_align` into the frame of `reference` and paste `reference` over
/// the top-left corner.
///
/// The canvas is `to_align.width + reference.width` wide and `to_align.height`
/// tall. Reference rows below that height are clipped. Overlapping content is
/// not blended.
pub fn compose_canvas(
    reference: &Image,
    to_align: &Image,
    homography: &Homography,
    config: &WarpConfig,
) -> Result<Image> {
    reference.ensure_not_empty("reference image")?;
    to_align.ensure_not_empty("image to align")?;
    if reference.channels() != to_align.channels() {
        return Err(StitchError::invalid_input(format!(
            "channel counts differ: reference has {}, image to align has {}",
            reference.channels(),
            to_align.channels()
        )));
    }

    let width = to_align.width() + reference.width();
    let height = to_align.height();
    let warped = warp_perspective(to_align, homography, width, height, config)?;

    let channels = warped.channels();
    let stride = warped.stride();
    let mut data = warped.into_raw();
    let paste_rows = reference.height().min(height);
    let paste_len = reference.width() * channels;
    for y in 0..paste_rows {
        let start = y * stride;
        data[start..start + paste_len].copy_from_slice(reference.row(y));
    }

    tracing::debug!(
        canvas_width = width,
        canvas_height = height,
        clipped_rows = reference.height() - paste_rows,
        "Canvas composed"
    );

    Image::from_raw(width, height, channels, data)
}

fn warp_row(
    input: &Image,
    homography: &Homography,
    y: usize,
    out_row: &mut [u8],
    method: InterpolationMethod,
    border: u8,
) {
    let channels = input.channels();
    for (x, out_px) in out_row.chunks_exact_mut(channels).enumerate() {
        let Some(src) = homography.apply_inverse(DVec2::new(x as f64, y as f64)) else {
            out_px.fill(border);
            continue;
        };
        match method {
            InterpolationMethod::Nearest => sample_nearest(input, src, border, out_px),
            InterpolationMethod::Bilinear => sample_bilinear(input, src, border, out_px),
        }
    }
}

/// Pixel at integer coordinates, or `None` outside the image.
#[inline]
fn pixel_at(input: &Image, x: i64, y: i64) -> Option<&[u8]> {
    if x < 0 || y < 0 || x >= input.width() as i64 || y >= input.height() as i64 {
        None
    } else {
        Some(input.pixel(x as usize, y as usize))
    }
}

#[inline]
fn sample_nearest(input: &Image, p: DVec2, border: u8, out: &mut [u8]) {
    match pixel_at(input, p.x.round() as i64, p.y.round() as i64) {
        Some(px) => out.copy_from_slice(px),
        None => out.fill(border),
    }
}

/// Bilinear sampling. Taps outside the image contribute the border value.
#[inline]
fn sample_bilinear(input: &Image, p: DVec2, border: u8, out: &mut [u8]) {
    let x0 = p.x.floor();
    let y0 = p.y.floor();
    let fx = (p.x - x0) as f32;
    let fy = (p.y - y0) as f32;
    let (x0, y0) = (x0 as i64, y0 as i64);

    // Entirely outside, including the one-pixel apron.
    if x0 < -1 || y0 < -1 || x0 >= input.width() as i64 || y0 >= input.height() as i64 {
        out.fill(border);
        return;
    }

    let p00 = pixel_at(input, x0, y0);
    let p10 = pixel_at(input, x0 + 1, y0);
    let p01 = pixel_at(input, x0, y0 + 1);
    let p11 = pixel_at(input, x0 + 1, y0 + 1);
    let tap = |px: Option<&[u8]>, c: usize| px.map_or(border, |px| px[c]) as f32;

    for (c, dst) in out.iter_mut().enumerate() {
        let top = tap(p00, c) + fx * (tap(p10, c) - tap(p00, c));
        let bottom = tap(p01, c) + fx * (tap(p11, c) - tap(p01, c));
        let value = top + fy * (bottom - top);
        *dst = value.round().clamp(0.0, 255.0) as u8;
    }
}
