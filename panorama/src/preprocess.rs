//! Input preparation before stitching.

use image::imageops::FilterType;
use image::DynamicImage;

/// Resize every image to the smallest height in the set, keeping each
/// image's aspect ratio. Images already at that height are cloned unchanged.
pub fn resize_to_common_height(images: &[DynamicImage]) -> Vec<DynamicImage> {
    let Some(target) = images.iter().map(|img| img.height()).min() else {
        return Vec::new();
    };

    images
        .iter()
        .map(|img| {
            if img.height() == target {
                return img.clone();
            }
            let scale = target as f64 / img.height() as f64;
            let width = ((img.width() as f64 * scale).round() as u32).max(1);
            tracing::debug!(
                from_width = img.width(),
                from_height = img.height(),
                to_width = width,
                to_height = target,
                "Resizing input"
            );
            img.resize_exact(width, target, FilterType::Triangle)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn blank(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
    }

    #[test]
    fn test_resizes_to_minimum_height() {
        let images = [blank(400, 300), blank(200, 150), blank(90, 150)];
        let resized = resize_to_common_height(&images);

        let dims: Vec<(u32, u32)> = resized.iter().map(|i| (i.width(), i.height())).collect();
        assert_eq!(dims, vec![(200, 150), (200, 150), (90, 150)]);
    }

    #[test]
    fn test_rounds_width() {
        let resized = resize_to_common_height(&[blank(101, 200), blank(10, 100)]);
        assert_eq!(resized[0].width(), 51);
        assert_eq!(resized[0].height(), 100);
    }

    #[test]
    fn test_empty_input() {
        assert!(resize_to_common_height(&[]).is_empty());
    }
}
