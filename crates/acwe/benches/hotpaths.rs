use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use acwe::levelset::{self, gradient_magnitude, to_sdf, EnergyWeights};
use acwe::{field_from_fn, segment, Field, Mask, NoopObserver, SegmentConfig};

/// Bright disk of radius `size / 4` holding a dark blob of radius `size / 10`,
/// with uniform noise.
fn make_scene(size: u32, seed: u64) -> (Field, Mask) {
    let c = size as f64 / 2.0;
    let mut rng = StdRng::seed_from_u64(seed);
    let image = field_from_fn(size, size, |x, y| {
        let d = ((x as f64 - c).powi(2) + (y as f64 - c).powi(2)).sqrt();
        let base = if d <= size as f64 / 10.0 {
            60.0
        } else if d <= size as f64 / 2.5 {
            400.0
        } else {
            20.0
        };
        base + rng.gen_range(-15.0..=15.0)
    });
    let seed_mask = Mask::disk(size, size, [c, c], size as f64 / 16.0);
    (image, seed_mask)
}

fn bench_sdf(c: &mut Criterion) {
    let (_, mask) = make_scene(512, 3);
    c.bench_function("to_sdf_512", |b| {
        b.iter(|| black_box(to_sdf(black_box(&mask))))
    });
}

fn bench_gradient(c: &mut Criterion) {
    let (_, mask) = make_scene(512, 3);
    let phi = to_sdf(&mask);
    c.bench_function("gradient_magnitude_512", |b| {
        b.iter(|| black_box(gradient_magnitude(black_box(&phi))))
    });
}

fn bench_step(c: &mut Criterion) {
    let (image, mask) = make_scene(512, 5);
    let weights = EnergyWeights::default();
    c.bench_function("acwe_single_step_512", |b| {
        b.iter(|| {
            let out = levelset::acwe(
                black_box(&image),
                black_box(&mask),
                1,
                &weights,
                2,
                &mut NoopObserver,
            )
            .expect("fixture has both regions");
            black_box(out.area())
        })
    });
}

fn bench_segment(c: &mut Criterion) {
    let (image, mask) = make_scene(128, 11);
    let config = SegmentConfig::default();
    c.bench_function("segment_128", |b| {
        b.iter(|| {
            let result = segment(black_box(&image), None, black_box(&mask), &config, &mut NoopObserver)
                .expect("fixture should segment");
            black_box(result.mask.area())
        })
    });
}

criterion_group!(hotpaths, bench_sdf, bench_gradient, bench_step, bench_segment);
criterion_main!(hotpaths);
