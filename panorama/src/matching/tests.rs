//! Tests for descriptor matching.

use super::*;
use crate::config::FeatureConfig;
use crate::features::{FeatureExtractor, Keypoint, DESCRIPTOR_SIZE};
use crate::raster::Image;
use crate::testing::{crop, textured_scene};

fn keypoint(i: usize) -> Keypoint {
    Keypoint {
        x: i as f32,
        y: 0.0,
        size: 1.0,
        angle: 0.0,
        response: 1.0,
        octave: 0,
    }
}

fn feature_set(descriptors: Vec<Descriptor>) -> FeatureSet {
    let keypoints = (0..descriptors.len()).map(keypoint).collect();
    FeatureSet::new(keypoints, descriptors)
}

fn one_hot(i: usize) -> Descriptor {
    let mut d = [0.0; DESCRIPTOR_SIZE];
    d[i] = 1.0;
    d
}

fn mixed(major: usize, minor: usize, weight: f32) -> Descriptor {
    let mut d = [0.0; DESCRIPTOR_SIZE];
    d[major] = 1.0 - weight;
    d[minor] = weight;
    d
}

#[test]
fn test_train_with_one_entry_is_insufficient() {
    let query = feature_set(vec![one_hot(0), one_hot(1)]);
    let train = feature_set(vec![one_hot(0)]);
    let err = DescriptorMatcher::default()
        .match_features(&query, &train)
        .unwrap_err();
    assert_eq!(
        err,
        StitchError::InsufficientFeatures {
            found: 1,
            required: 2
        }
    );
}

#[test]
fn test_empty_train_is_insufficient() {
    let query = feature_set(vec![one_hot(0), one_hot(1)]);
    let err = DescriptorMatcher::default()
        .match_features(&query, &FeatureSet::default())
        .unwrap_err();
    assert_eq!(
        err,
        StitchError::InsufficientFeatures {
            found: 0,
            required: 2
        }
    );
}

#[test]
fn test_empty_query_has_no_matches() {
    let train = feature_set(vec![one_hot(0), one_hot(1)]);
    let matches = DescriptorMatcher::default()
        .match_features(&FeatureSet::default(), &train)
        .unwrap();
    assert!(matches.is_empty());
}

#[test]
fn test_single_query_against_two_train_entries() {
    let train = feature_set(vec![one_hot(0), one_hot(1)]);
    let query = feature_set(vec![one_hot(1)]);
    let matches = DescriptorMatcher::new(0.8)
        .match_features(&query, &train)
        .unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].train_idx, 1);
}

#[test]
fn test_distinct_nearest_is_accepted() {
    let train = feature_set((0..6).map(one_hot).collect());
    let query = feature_set(vec![mixed(3, 4, 0.25)]);

    let matches = DescriptorMatcher::default()
        .match_features(&query, &train)
        .unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].query_idx, 0);
    assert_eq!(matches[0].train_idx, 3);
    let expected = squared_distance(&query.descriptors()[0], &train.descriptors()[3]).sqrt();
    assert!((matches[0].distance - expected).abs() < 1e-6);
}

#[test]
fn test_ambiguous_match_is_rejected() {
    // Halfway between two train descriptors: nearest and second nearest tie.
    let train = feature_set(vec![one_hot(0), one_hot(1), one_hot(2)]);
    let query = feature_set(vec![mixed(0, 1, 0.5), one_hot(2)]);

    let matches = DescriptorMatcher::default()
        .match_features(&query, &train)
        .unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].query_idx, 1);
    assert_eq!(matches[0].train_idx, 2);
}

#[test]
fn test_duplicate_train_descriptors_reject_exact_query() {
    let train = feature_set(vec![one_hot(5), one_hot(5), one_hot(9)]);
    let query = feature_set(vec![one_hot(5), one_hot(9)]);

    let matches = DescriptorMatcher::default()
        .match_features(&query, &train)
        .unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].train_idx, 2);
}

#[test]
fn test_higher_ratio_accepts_more() {
    let train = feature_set((0..8).map(one_hot).collect());
    let query = feature_set(vec![
        mixed(0, 1, 0.1),
        mixed(2, 3, 0.3),
        mixed(4, 5, 0.42),
    ]);

    let strict_matcher = DescriptorMatcher::new(0.5);
    let loose_matcher = DescriptorMatcher::new(0.95);
    assert_eq!(strict_matcher.ratio(), 0.5);
    assert_eq!(loose_matcher.ratio(), 0.95);

    let strict = strict_matcher.match_features(&query, &train).unwrap();
    let loose = loose_matcher.match_features(&query, &train).unwrap();
    assert!(strict.len() < loose.len());
    assert_eq!(loose.len(), 3);
}

#[test]
fn test_output_ordered_by_query_index() {
    let train = feature_set((0..40).map(one_hot).collect());
    let query = feature_set((0..40).rev().map(one_hot).collect());

    let matches = DescriptorMatcher::default()
        .match_features(&query, &train)
        .unwrap();
    assert_eq!(matches.len(), 40);
    for (i, m) in matches.iter().enumerate() {
        assert_eq!(m.query_idx, i);
        assert_eq!(m.train_idx, 39 - i);
        assert_eq!(m.distance, 0.0);
    }
}

#[test]
#[should_panic(expected = "ratio must be in (0, 1]")]
fn test_zero_ratio_panics() {
    DescriptorMatcher::new(0.0);
}

#[test]
fn test_translated_images_match_consistently() {
    let scene = textured_scene(260, 140, 21);
    let left = crop(&scene, 0, 0, 200, 140);
    let right = crop(&scene, 40, 0, 200, 140);

    let extractor = FeatureExtractor::new(FeatureConfig::default());
    let fl = extractor.extract(&left).unwrap();
    let fr = extractor.extract(&right).unwrap();

    let matches = DescriptorMatcher::default().match_features(&fr, &fl).unwrap();
    let consistent = matches
        .iter()
        .filter(|m| {
            let q = fr.keypoints()[m.query_idx];
            let t = fl.keypoints()[m.train_idx];
            (t.x - (q.x + 40.0)).abs() < 1.0 && (t.y - q.y).abs() < 1.0
        })
        .count();

    assert!(consistent >= 30, "{consistent} consistent matches");
    assert!(consistent * 10 >= matches.len() * 8);
}

#[test]
fn test_rotated_image_matches_consistently() {
    // 90 degree rotation; an odd height keeps every octave's sampling grid.
    let (w, h) = (160, 161);
    let original = textured_scene(w, h, 4);
    let rotated =
        Image::from_fn(h, w, |xr, yr| {
            let p = original.pixel(yr, h - 1 - xr);
            [p[0], p[1], p[2]]
        });

    let extractor = FeatureExtractor::new(FeatureConfig::default());
    let fo = extractor.extract(&original).unwrap();
    let fr = extractor.extract(&rotated).unwrap();

    let matches = DescriptorMatcher::default().match_features(&fr, &fo).unwrap();
    let consistent = matches
        .iter()
        .filter(|m| {
            let q = fr.keypoints()[m.query_idx];
            let t = fo.keypoints()[m.train_idx];
            (t.x - q.y).abs() < 1.0 && (t.y - ((h - 1) as f32 - q.x)).abs() < 1.0
        })
        .count();

    assert!(consistent >= 30, "{consistent} consistent matches");
    assert!(consistent * 10 >= matches.len() * 8);
}
