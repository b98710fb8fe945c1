//! Fixed-image sample selection.
//!
//! The sample set is built once per resolution stage and stays fixed for the
//! remainder of that stage: every evaluation of the metric within a stage
//! sees the same fixed-image points, which is what makes the derivative's
//! constant-mean approximation exact with respect to sample membership.

use nalgebra::Point2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::image::mask::SpatialMask;
use crate::image::ImageView;
use crate::metric::MetricConfig;
use crate::util::{MetricError, MetricResult};

/// One fixed-image sample: grid index, physical location, cached intensity.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    /// Grid index `(x, y)` of the sampled voxel.
    pub index: [usize; 2],
    /// Physical location of the voxel.
    pub point: Point2<f64>,
    /// Fixed-image intensity at the voxel.
    pub fixed_value: f64,
}

/// The fixed-image points participating in the evaluation for one stage.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleSet {
    stage: usize,
    samples: Vec<Sample>,
}

impl SampleSet {
    /// Returns the resolution stage this set was built for.
    pub fn stage(&self) -> usize {
        self.stage
    }

    /// Number of samples in the set.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if the set holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Returns the samples in build order.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }
}

// Per-stage rng streams stay deterministic and distinct.
const STAGE_SEED_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

/// Builds the sample set for `stage`.
///
/// Full mode walks the grid in image iteration order (row-major) and keeps
/// every voxel the fixed mask admits. Random mode draws exactly
/// `samples_per_resolution[stage]` voxels uniformly from the masked domain;
/// draws are independent, so duplicates are possible.
pub(crate) fn build_sample_set(
    stage: usize,
    fixed: &ImageView<'_>,
    fixed_mask: Option<&dyn SpatialMask>,
    config: &MetricConfig,
) -> MetricResult<SampleSet> {
    let samples = if config.use_all_pixels {
        full_grid(fixed, fixed_mask)
    } else {
        let count = *config
            .samples_per_resolution
            .get(stage)
            .ok_or(MetricError::SampleSchedule {
                got: config.samples_per_resolution.len(),
                stages: config.num_resolutions,
            })?;
        random_subset(fixed, fixed_mask, count, config.sample_seed, stage)?
    };
    Ok(SampleSet { stage, samples })
}

fn admit(
    fixed: &ImageView<'_>,
    fixed_mask: Option<&dyn SpatialMask>,
    x: usize,
    y: usize,
) -> Option<Sample> {
    let point = fixed.index_to_physical(x, y);
    if let Some(mask) = fixed_mask {
        if !mask.contains(&point) {
            return None;
        }
    }
    let fixed_value = f64::from(fixed.get(x, y)?);
    Some(Sample {
        index: [x, y],
        point,
        fixed_value,
    })
}

fn full_grid(fixed: &ImageView<'_>, fixed_mask: Option<&dyn SpatialMask>) -> Vec<Sample> {
    let mut samples = Vec::new();
    for y in 0..fixed.height() {
        for x in 0..fixed.width() {
            if let Some(sample) = admit(fixed, fixed_mask, x, y) {
                samples.push(sample);
            }
        }
    }
    samples
}

fn random_subset(
    fixed: &ImageView<'_>,
    fixed_mask: Option<&dyn SpatialMask>,
    count: usize,
    seed: u64,
    stage: usize,
) -> MetricResult<Vec<Sample>> {
    let mut rng = StdRng::seed_from_u64(seed ^ (stage as u64).wrapping_mul(STAGE_SEED_MIX));
    let mut samples = Vec::with_capacity(count);
    // Rejection sampling against the mask; bail out instead of spinning on a
    // mask that admits (almost) nothing.
    let max_attempts = count.saturating_mul(1000);
    let mut attempts = 0usize;
    while samples.len() < count {
        if attempts >= max_attempts {
            return Err(MetricError::InsufficientSamples);
        }
        attempts += 1;
        let x = rng.random_range(0..fixed.width());
        let y = rng.random_range(0..fixed.height());
        if let Some(sample) = admit(fixed, fixed_mask, x, y) {
            samples.push(sample);
        }
    }
    Ok(samples)
}
