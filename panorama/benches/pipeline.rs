//! Benchmarks for the stitching pipeline stages.
//! Run with: cargo bench -p panorama --features bench --bench pipeline

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use glam::DVec2;
use panorama::testing::{crop, horizontal_sequence, textured_scene};
use panorama::{
    Config, DescriptorMatcher, FeatureConfig, FeatureExtractor, Homography, HomographyEstimator,
    Image, RansacConfig, Stitcher, WarpConfig,
};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn benchmark_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("feature_extraction");
    group.sample_size(10);
    let extractor = FeatureExtractor::new(FeatureConfig::default());

    for size in [256, 512] {
        let image = textured_scene(size, size, 1);
        group.throughput(Throughput::Elements((size * size) as u64));
        group.bench_function(BenchmarkId::new("sift", size), |b| {
            b.iter(|| black_box(extractor.extract(black_box(&image))))
        });
    }
    group.finish();
}

fn benchmark_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("matching");
    let scene = textured_scene(640, 320, 2);
    let extractor = FeatureExtractor::new(FeatureConfig::default());
    let left = extractor.extract(&crop(&scene, 0, 0, 400, 320)).unwrap();
    let right = extractor.extract(&crop(&scene, 240, 0, 400, 320)).unwrap();
    let matcher = DescriptorMatcher::default();

    group.throughput(Throughput::Elements((left.len() * right.len()) as u64));
    group.bench_function("ratio_test", |b| {
        b.iter(|| black_box(matcher.match_features(black_box(&right), black_box(&left))))
    });
    group.finish();
}

fn benchmark_ransac(c: &mut Criterion) {
    let mut group = c.benchmark_group("ransac");
    let truth =
        Homography::from_array([1.02, 0.03, 40.0, -0.02, 0.99, -10.0, 1e-4, 2e-5, 1.0]).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(3);

    for count in [50, 200, 1000] {
        let src: Vec<DVec2> = (0..count)
            .map(|_| DVec2::new(rng.random_range(0.0..800.0), rng.random_range(0.0..600.0)))
            .collect();
        let dst: Vec<DVec2> = src
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let mapped = truth.apply(*p).unwrap();
                // 30% outliers
                if i % 10 < 3 {
                    mapped + DVec2::new(rng.random_range(30.0..200.0), rng.random_range(30.0..200.0))
                } else {
                    mapped
                }
            })
            .collect();
        let estimator = HomographyEstimator::new(RansacConfig::default(), 4.0);

        group.throughput(Throughput::Elements(count as u64));
        group.bench_function(BenchmarkId::new("homography", count), |b| {
            b.iter(|| black_box(estimator.estimate(black_box(&src), black_box(&dst))))
        });
    }
    group.finish();
}

fn benchmark_warp(c: &mut Criterion) {
    let mut group = c.benchmark_group("warp");
    let image = textured_scene(640, 480, 4);
    let h = Homography::from_array([0.98, 0.02, 300.0, -0.01, 1.0, 5.0, 5e-5, 0.0, 1.0]).unwrap();

    group.throughput(Throughput::Elements((1280 * 480) as u64));
    group.bench_function("perspective_bilinear", |b| {
        b.iter(|| {
            black_box(panorama::warp_perspective(
                black_box(&image),
                &h,
                1280,
                480,
                &WarpConfig::default(),
            ))
        })
    });
    group.finish();
}

fn benchmark_stitch(c: &mut Criterion) {
    let mut group = c.benchmark_group("stitch");
    group.sample_size(10);
    let scene = textured_scene(880, 300, 5);
    let images: Vec<Image> = horizontal_sequence(&scene, 3, 400, 240);
    let stitcher = Stitcher::new(Config::default());

    group.bench_function("three_images", |b| {
        b.iter(|| black_box(stitcher.stitch(black_box(&images))))
    });
    group.finish();
}

criterion_group!(
    benches,
    benchmark_extraction,
    benchmark_matching,
    benchmark_ransac,
    benchmark_warp,
    benchmark_stitch
);
criterion_main!(benches);
