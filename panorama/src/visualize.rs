//! Side-by-side diagnostic image of inlier matches.

use image::{imageops, Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;

use crate::features::FeatureSet;
use crate::matching::Correspondence;
use crate::raster::Image;

pub const MATCH_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Draw `to_align` on the left and `reference` to its right, with one line
/// per inlier correspondence.
///
/// `matches` use `to_align_features` as the query set and
/// `reference_features` as the train set. `inlier_mask` holds one flag per
/// match; matches without a set flag are not drawn. The image is as tall as
/// the taller input; uncovered pixels are black.
pub fn draw_matches(
    to_align: &Image,
    reference: &Image,
    to_align_features: &FeatureSet,
    reference_features: &FeatureSet,
    matches: &[Correspondence],
    inlier_mask: &[bool],
) -> RgbImage {
    let offset = to_align.width();
    let width = offset + reference.width();
    let height = to_align.height().max(reference.height());

    let mut out = RgbImage::new(width as u32, height as u32);
    imageops::replace(&mut out, &to_align.to_rgb_image(), 0, 0);
    imageops::replace(&mut out, &reference.to_rgb_image(), offset as i64, 0);

    let mut drawn = 0usize;
    for (m, _) in matches
        .iter()
        .zip(inlier_mask)
        .filter(|(_, inlier)| **inlier)
    {
        let (Some(q), Some(t)) = (
            to_align_features.keypoints().get(m.query_idx),
            reference_features.keypoints().get(m.train_idx),
        ) else {
            continue;
        };
        // Endpoints snap to whole pixels.
        let start = (q.x.trunc(), q.y.trunc());
        let end = (t.x.trunc() + offset as f32, t.y.trunc());
        draw_line_segment_mut(&mut out, start, end, MATCH_COLOR);
        drawn += 1;
    }

    tracing::debug!(width, height, lines = drawn, "Match visualization drawn");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{Keypoint, DESCRIPTOR_SIZE};

    fn features(points: &[(f32, f32)]) -> FeatureSet {
        let keypoints = points
            .iter()
            .map(|&(x, y)| Keypoint {
                x,
                y,
                size: 2.0,
                angle: 0.0,
                response: 1.0,
                octave: 0,
            })
            .collect();
        FeatureSet::new(keypoints, vec![[0.0; DESCRIPTOR_SIZE]; points.len()])
    }

    fn solid(width: usize, height: usize, value: u8) -> Image {
        Image::from_raw(width, height, 1, vec![value; width * height]).unwrap()
    }

    #[test]
    fn test_layout_places_images_side_by_side() {
        let left = solid(4, 3, 50);
        let right = solid(5, 6, 200);
        let out = draw_matches(
            &left,
            &right,
            &FeatureSet::default(),
            &FeatureSet::default(),
            &[],
            &[],
        );

        assert_eq!(out.dimensions(), (9, 6));
        assert_eq!(out.get_pixel(0, 0), &Rgb([50, 50, 50]));
        assert_eq!(out.get_pixel(4, 5), &Rgb([200, 200, 200]));
        // Below the shorter left image.
        assert_eq!(out.get_pixel(1, 4), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_only_inliers_are_drawn() {
        let left = solid(10, 10, 0);
        let right = solid(10, 10, 0);
        let left_features = features(&[(2.7, 2.2), (2.0, 8.0)]);
        let right_features = features(&[(7.0, 2.9), (7.0, 8.0)]);
        let matches = [
            Correspondence {
                query_idx: 0,
                train_idx: 0,
                distance: 0.0,
            },
            Correspondence {
                query_idx: 1,
                train_idx: 1,
                distance: 0.0,
            },
        ];

        let out = draw_matches(
            &left,
            &right,
            &left_features,
            &right_features,
            &matches,
            &[true, false],
        );

        // Horizontal line on row 2 from x=2 to x=17.
        for x in 2..=17 {
            assert_eq!(out.get_pixel(x, 2), &MATCH_COLOR, "x={x}");
        }
        assert_eq!(out.get_pixel(10, 8), &Rgb([0, 0, 0]));
    }
}
