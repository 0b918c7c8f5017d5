//! 8-bit interleaved image buffer consumed by every pipeline stage.

use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};

use crate::error::{Result, StitchError};

/// Rec. 601 luma weights used for grayscale conversion.
const LUMA_WEIGHTS: [f32; 3] = [0.299, 0.587, 0.114];

/// A 2D grid of 8-bit pixels stored interleaved and row-major.
///
/// `channels` is 1 (gray), 3 (RGB) or 4 (RGBA). A zero-extent image can be
/// constructed, but every pipeline stage rejects it with `InvalidInput`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    width: usize,
    height: usize,
    channels: usize,
    data: Vec<u8>,
}

impl Image {
    /// Wrap an interleaved buffer.
    ///
    /// Fails with `InvalidInput` if the channel count is unsupported or the
    /// buffer length does not equal `width * height * channels`.
    pub fn from_raw(width: usize, height: usize, channels: usize, data: Vec<u8>) -> Result<Self> {
        if !matches!(channels, 1 | 3 | 4) {
            return Err(StitchError::invalid_input(format!(
                "unsupported channel count {channels}, expected 1, 3 or 4"
            )));
        }
        let expected = width * height * channels;
        if data.len() != expected {
            return Err(StitchError::invalid_input(format!(
                "buffer holds {} bytes, {width}x{height}x{channels} needs {expected}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// A black image of the given size.
    pub fn zeros(width: usize, height: usize, channels: usize) -> Result<Self> {
        Self::from_raw(width, height, channels, vec![0; width * height * channels])
    }

    /// Build an image by evaluating `f(x, y)` for every pixel.
    pub(crate) fn from_fn<const C: usize>(
        width: usize,
        height: usize,
        f: impl Fn(usize, usize) -> [u8; C],
    ) -> Self {
        let mut data = Vec::with_capacity(width * height * C);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&f(x, y));
            }
        }
        Self {
            width,
            height,
            channels: C,
            data,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of bytes in one row.
    #[inline]
    pub fn stride(&self) -> usize {
        self.width * self.channels
    }

    /// All channels of the pixel at `(x, y)`.
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> &[u8] {
        let start = y * self.stride() + x * self.channels;
        &self.data[start..start + self.channels]
    }

    #[inline]
    pub fn row(&self, y: usize) -> &[u8] {
        let stride = self.stride();
        &self.data[y * stride..(y + 1) * stride]
    }

    /// Fails with `InvalidInput` if the image has zero extent.
    pub(crate) fn ensure_not_empty(&self, what: &str) -> Result<()> {
        if self.is_empty() {
            return Err(StitchError::invalid_input(format!(
                "{what} has zero extent ({}x{})",
                self.width, self.height
            )));
        }
        Ok(())
    }

    /// Grayscale intensities in [0, 1], row-major. Alpha is ignored.
    pub fn to_gray_f32(&self) -> Vec<f32> {
        match self.channels {
            1 => self.data.iter().map(|&v| v as f32 / 255.0).collect(),
            c => self
                .data
                .chunks_exact(c)
                .map(|px| {
                    (LUMA_WEIGHTS[0] * px[0] as f32
                        + LUMA_WEIGHTS[1] * px[1] as f32
                        + LUMA_WEIGHTS[2] * px[2] as f32)
                        / 255.0
                })
                .collect(),
        }
    }

    /// Convert to an RGB buffer. Gray is replicated, alpha is dropped.
    pub fn to_rgb_image(&self) -> RgbImage {
        let mut out = RgbImage::new(self.width as u32, self.height as u32);
        for (dst, src) in out.chunks_exact_mut(3).zip(self.data.chunks_exact(self.channels)) {
            match self.channels {
                1 => dst.fill(src[0]),
                _ => dst.copy_from_slice(&src[..3]),
            }
        }
        out
    }

    /// Convert into an `image` crate buffer with the matching color type.
    pub fn to_dynamic(&self) -> DynamicImage {
        let (w, h) = (self.width as u32, self.height as u32);
        let data = self.data.clone();
        // Lengths are checked on construction.
        match self.channels {
            1 => GrayImage::from_raw(w, h, data).map(DynamicImage::ImageLuma8),
            3 => RgbImage::from_raw(w, h, data).map(DynamicImage::ImageRgb8),
            _ => RgbaImage::from_raw(w, h, data).map(DynamicImage::ImageRgba8),
        }
        .unwrap_or_else(|| DynamicImage::new_rgb8(w, h))
    }
}

impl From<&DynamicImage> for Image {
    /// Keeps gray, RGB and RGBA 8-bit images as they are; any other color
    /// type is converted to the closest 8-bit layout.
    fn from(img: &DynamicImage) -> Self {
        let (width, height) = (img.width() as usize, img.height() as usize);
        let (channels, data) = match img {
            DynamicImage::ImageLuma8(buf) => (1, buf.as_raw().clone()),
            DynamicImage::ImageRgb8(buf) => (3, buf.as_raw().clone()),
            DynamicImage::ImageRgba8(buf) => (4, buf.as_raw().clone()),
            other if other.color().has_alpha() => (4, other.to_rgba8().into_raw()),
            other if other.color().channel_count() <= 2 => (1, other.to_luma8().into_raw()),
            other => (3, other.to_rgb8().into_raw()),
        };
        Self {
            width,
            height,
            channels,
            data,
        }
    }
}

impl From<DynamicImage> for Image {
    fn from(img: DynamicImage) -> Self {
        Image::from(&img)
    }
}

impl From<RgbImage> for Image {
    fn from(img: RgbImage) -> Self {
        let (width, height) = (img.width() as usize, img.height() as usize);
        Self {
            width,
            height,
            channels: 3,
            data: img.into_raw(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_validates_length() {
        let err = Image::from_raw(2, 2, 3, vec![0; 11]).unwrap_err();
        assert_eq!(err.kind(), "InvalidInput");
        assert!(Image::from_raw(2, 2, 3, vec![0; 12]).is_ok());
    }

    #[test]
    fn test_from_raw_rejects_two_channels() {
        let err = Image::from_raw(1, 1, 2, vec![0; 2]).unwrap_err();
        assert_eq!(err.kind(), "InvalidInput");
    }

    #[test]
    fn test_zero_extent_is_constructible_but_empty() {
        let img = Image::zeros(0, 10, 3).unwrap();
        assert!(img.is_empty());
        assert!(img.ensure_not_empty("image").is_err());
    }

    #[test]
    fn test_gray_conversion_uses_luma_weights() {
        let img = Image::from_raw(2, 1, 3, vec![255, 0, 0, 255, 255, 255]).unwrap();
        let gray = img.to_gray_f32();
        assert!((gray[0] - 0.299).abs() < 1e-6);
        assert!((gray[1] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_gray_ignores_alpha() {
        let img = Image::from_raw(1, 1, 4, vec![0, 255, 0, 0]).unwrap();
        assert!((img.to_gray_f32()[0] - 0.587).abs() < 1e-6);
    }

    #[test]
    fn test_pixel_and_row_access() {
        let img = Image::from_fn(3, 2, |x, y| [x as u8, y as u8, 7]);
        assert_eq!(img.pixel(2, 1), &[2, 1, 7]);
        assert_eq!(img.row(1).len(), 9);
    }

    #[test]
    fn test_dynamic_image_roundtrip_keeps_layout() {
        let img = Image::from_fn(4, 3, |x, y| [(x * 10) as u8, (y * 20) as u8, 5, 200]);
        let dynamic = img.to_dynamic();
        assert!(matches!(dynamic, DynamicImage::ImageRgba8(_)));
        assert_eq!(Image::from(&dynamic), img);
    }

    #[test]
    fn test_gray_to_rgb_replicates() {
        let img = Image::from_raw(1, 1, 1, vec![42]).unwrap();
        assert_eq!(img.to_rgb_image().as_raw(), &vec![42, 42, 42]);
    }
}
