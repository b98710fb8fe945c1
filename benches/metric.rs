use criterion::{criterion_group, criterion_main, Criterion};
use nalgebra::DVector;
use std::hint::black_box;

use regmetric::{
    Collaborators, ImageBuffer, LinearInterpolator, Metric, MetricConfig,
    NormalizedCorrelationMetric, TranslationTransform,
};

fn make_image(width: usize, height: usize) -> ImageBuffer {
    let mut data = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            let value = ((x * 13) ^ (y * 7) ^ (x * y)) & 0xFF;
            data.push(value as f32);
        }
    }
    ImageBuffer::from_vec(data, width, height).unwrap()
}

fn bench_ncc(c: &mut Criterion) {
    let fixed = make_image(256, 256);
    let moving = make_image(256, 256);
    let transform = TranslationTransform::new();
    let interpolator = LinearInterpolator::new();
    let collab = Collaborators::new(fixed.view(), moving.view(), &transform, &interpolator);

    let mut metric = NormalizedCorrelationMetric::new(collab);
    metric.before_registration(&MetricConfig::default()).unwrap();
    metric.initialize().unwrap();
    metric.before_each_resolution(0).unwrap();

    let params = DVector::from_vec(vec![0.3, -0.2]);

    c.bench_function("ncc_value_full_256", |b| {
        b.iter(|| black_box(metric.value(&params).unwrap()));
    });

    c.bench_function("ncc_value_and_derivative_full_256", |b| {
        b.iter(|| black_box(metric.value_and_derivative(&params).unwrap()));
    });

    let sampled_config = MetricConfig {
        use_all_pixels: false,
        samples_per_resolution: vec![5000],
        ..MetricConfig::default()
    };
    let mut sampled = NormalizedCorrelationMetric::new(collab);
    sampled.before_registration(&sampled_config).unwrap();
    sampled.initialize().unwrap();
    sampled.before_each_resolution(0).unwrap();

    c.bench_function("ncc_value_and_derivative_sampled_5000", |b| {
        b.iter(|| black_box(sampled.value_and_derivative(&params).unwrap()));
    });
}

criterion_group!(benches, bench_ncc);
criterion_main!(benches);
