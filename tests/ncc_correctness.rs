use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use nalgebra::{DVector, Point2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use regmetric::{
    Collaborators, ElapsedReporter, ImageBuffer, LinearInterpolator, Metric, MetricConfig,
    MetricError, NearestInterpolator, NormalizedCorrelationMetric, RegionMask,
    TranslationTransform,
};

fn textured_image(width: usize, height: usize) -> ImageBuffer {
    let mut data = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            let value = ((x * 13) ^ (y * 7) ^ (x * y)) & 0xFF;
            data.push(value as f32);
        }
    }
    ImageBuffer::from_vec(data, width, height).unwrap()
}

fn noise_image(width: usize, height: usize, seed: u64) -> ImageBuffer {
    let mut rng = StdRng::seed_from_u64(seed);
    let data: Vec<f32> = (0..width * height)
        .map(|_| rng.random_range(0.0..255.0))
        .collect();
    ImageBuffer::from_vec(data, width, height).unwrap()
}

fn ready_metric<'a>(collab: Collaborators<'a>, config: &MetricConfig) -> NormalizedCorrelationMetric<'a> {
    let mut metric = NormalizedCorrelationMetric::new(collab);
    metric.before_registration(config).unwrap();
    metric.initialize().unwrap();
    metric.before_each_resolution(0).unwrap();
    metric
}

#[test]
fn identity_self_match_reaches_minus_one() {
    let image = textured_image(24, 18);
    let transform = TranslationTransform::new();
    let interpolator = LinearInterpolator::new();
    let collab = Collaborators::new(image.view(), image.view(), &transform, &interpolator);
    let metric = ready_metric(collab, &MetricConfig::default());

    let params = TranslationTransform::identity_params();
    let (value, gradient) = metric.value_and_derivative(&params).unwrap();
    assert!((value + 1.0).abs() < 1e-9, "value {value}");
    // At an exact intensity match every per-point derivative term cancels.
    assert!(gradient.norm() < 1e-9, "gradient norm {}", gradient.norm());
}

#[test]
fn linear_rescaled_moving_reaches_minus_one() {
    let fixed = textured_image(20, 16);
    let moving_data: Vec<f32> = {
        let mut data = Vec::new();
        for y in 0..16 {
            for x in 0..20 {
                let value = ((x * 13) ^ (y * 7) ^ (x * y)) & 0xFF;
                data.push(2.0 * value as f32 + 10.0);
            }
        }
        data
    };
    let moving = ImageBuffer::from_vec(moving_data, 20, 16).unwrap();
    let transform = TranslationTransform::new();
    let interpolator = LinearInterpolator::new();
    let collab = Collaborators::new(fixed.view(), moving.view(), &transform, &interpolator);
    let metric = ready_metric(collab, &MetricConfig::default());

    let value = metric
        .value(&TranslationTransform::identity_params())
        .unwrap();
    assert!((value + 1.0).abs() < 1e-9, "value {value}");
}

#[test]
fn measure_stays_within_unit_range() {
    let fixed = noise_image(30, 22, 7);
    let moving = noise_image(30, 22, 8);
    let transform = TranslationTransform::new();
    let interpolator = LinearInterpolator::new();
    let collab = Collaborators::new(fixed.view(), moving.view(), &transform, &interpolator);
    let metric = ready_metric(collab, &MetricConfig::default());

    let value = metric
        .value(&TranslationTransform::identity_params())
        .unwrap();
    assert!((-1.0 - 1e-9..=1.0 + 1e-9).contains(&value), "value {value}");
}

#[test]
fn mean_subtraction_absorbs_intensity_offset() {
    let fixed = textured_image(20, 16);
    let offset_data: Vec<f32> = {
        let mut data = Vec::new();
        for y in 0..16 {
            for x in 0..20 {
                let value = ((x * 13) ^ (y * 7) ^ (x * y)) & 0xFF;
                data.push(value as f32 + 50.0);
            }
        }
        data
    };
    let moving = ImageBuffer::from_vec(offset_data, 20, 16).unwrap();
    let transform = TranslationTransform::new();
    let interpolator = LinearInterpolator::new();
    let collab = Collaborators::new(fixed.view(), moving.view(), &transform, &interpolator);
    let params = TranslationTransform::identity_params();

    let with_mean = ready_metric(collab, &MetricConfig::default());
    let centered = with_mean.value(&params).unwrap();
    assert!((centered + 1.0).abs() < 1e-9, "centered {centered}");

    let raw_config = MetricConfig {
        subtract_mean: false,
        ..MetricConfig::default()
    };
    let without_mean = ready_metric(collab, &raw_config);
    let raw = without_mean.value(&params).unwrap();
    assert!(raw > centered + 1e-6, "raw {raw} centered {centered}");
}

#[test]
fn moving_mask_restricts_the_overlap() {
    let fixed = textured_image(24, 18);
    // Corrupt the right half of the moving image; a mask over the intact
    // half must restore the perfect match.
    let mut data = Vec::new();
    for y in 0..18 {
        for x in 0..24 {
            let value = ((x * 13) ^ (y * 7) ^ (x * y)) & 0xFF;
            data.push(if x >= 12 { 0.0 } else { value as f32 });
        }
    }
    let moving = ImageBuffer::from_vec(data, 24, 18).unwrap();
    let transform = TranslationTransform::new();
    let interpolator = LinearInterpolator::new();
    let mask = RegionMask::new(Point2::new(0.0, 0.0), Point2::new(11.0, 17.0)).unwrap();
    let params = TranslationTransform::identity_params();

    let unmasked = ready_metric(
        Collaborators::new(fixed.view(), moving.view(), &transform, &interpolator),
        &MetricConfig::default(),
    );
    let corrupted = unmasked.value(&params).unwrap();
    assert!(corrupted > -1.0 + 1e-6, "corrupted {corrupted}");

    let masked = ready_metric(
        Collaborators::new(fixed.view(), moving.view(), &transform, &interpolator)
            .with_moving_mask(&mask),
        &MetricConfig::default(),
    );
    let restored = masked.value(&params).unwrap();
    assert!((restored + 1.0).abs() < 1e-9, "restored {restored}");
}

#[test]
fn no_overlap_reports_insufficient_samples() {
    let image = textured_image(16, 12);
    let transform = TranslationTransform::new();
    let interpolator = LinearInterpolator::new();
    let collab = Collaborators::new(image.view(), image.view(), &transform, &interpolator);
    let metric = ready_metric(collab, &MetricConfig::default());

    let params = DVector::from_vec(vec![1000.0, 1000.0]);
    assert!(matches!(
        metric.value(&params),
        Err(MetricError::InsufficientSamples)
    ));
}

#[test]
fn constant_moving_image_is_degenerate() {
    let fixed = textured_image(16, 12);
    let moving = ImageBuffer::from_vec(vec![42.0; 16 * 12], 16, 12).unwrap();
    let transform = TranslationTransform::new();
    let interpolator = LinearInterpolator::new();
    let collab = Collaborators::new(fixed.view(), moving.view(), &transform, &interpolator);
    let metric = ready_metric(collab, &MetricConfig::default());

    assert!(matches!(
        metric.value(&TranslationTransform::identity_params()),
        Err(MetricError::DegenerateCorrelation { .. })
    ));
}

#[test]
fn lifecycle_misuse_reports_not_configured() {
    let image = textured_image(16, 12);
    let transform = TranslationTransform::new();
    let interpolator = LinearInterpolator::new();
    let collab = Collaborators::new(image.view(), image.view(), &transform, &interpolator);
    let params = TranslationTransform::identity_params();

    let mut metric = NormalizedCorrelationMetric::new(collab);
    assert!(matches!(
        metric.value(&params),
        Err(MetricError::NotConfigured(_))
    ));
    assert!(matches!(
        metric.initialize(),
        Err(MetricError::NotConfigured(_))
    ));

    metric.before_registration(&MetricConfig::default()).unwrap();
    assert!(matches!(
        metric.before_each_resolution(0),
        Err(MetricError::NotConfigured(_))
    ));

    metric.initialize().unwrap();
    assert!(matches!(
        metric.value(&params),
        Err(MetricError::NotConfigured(_))
    ));
}

#[test]
fn derivatives_require_an_interpolator_with_a_gradient() {
    let image = textured_image(16, 12);
    let transform = TranslationTransform::new();
    let interpolator = NearestInterpolator::new();
    let collab = Collaborators::new(image.view(), image.view(), &transform, &interpolator);
    let metric = ready_metric(collab, &MetricConfig::default());

    let params = TranslationTransform::identity_params();
    assert!(metric.value(&params).is_ok());
    assert!(matches!(
        metric.value_and_derivative(&params),
        Err(MetricError::GradientUnavailable)
    ));
}

#[test]
fn initialize_reports_elapsed_time_when_a_reporter_is_attached() {
    struct CountingReporter {
        calls: AtomicUsize,
    }

    impl ElapsedReporter for CountingReporter {
        fn report_elapsed(&self, label: &str, _elapsed: Duration) {
            assert_eq!(label, "NormalizedCorrelation");
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    let image = textured_image(16, 12);
    let transform = TranslationTransform::new();
    let interpolator = LinearInterpolator::new();
    let reporter = CountingReporter {
        calls: AtomicUsize::new(0),
    };
    let collab = Collaborators::new(image.view(), image.view(), &transform, &interpolator)
        .with_reporter(&reporter);

    let mut metric = NormalizedCorrelationMetric::new(collab);
    metric.before_registration(&MetricConfig::default()).unwrap();
    metric.initialize().unwrap();
    assert_eq!(reporter.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn parameter_count_is_validated() {
    let image = textured_image(16, 12);
    let transform = TranslationTransform::new();
    let interpolator = LinearInterpolator::new();
    let collab = Collaborators::new(image.view(), image.view(), &transform, &interpolator);
    let metric = ready_metric(collab, &MetricConfig::default());

    let params = DVector::from_vec(vec![0.0, 0.0, 0.0]);
    assert!(matches!(
        metric.value(&params),
        Err(MetricError::ParameterCount {
            expected: 2,
            got: 3
        })
    ));
}
