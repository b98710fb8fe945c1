//! Similarity metrics and their lifecycle.
//!
//! A metric scores the alignment of a fixed/moving image pair under a
//! parameterized transform. Variants share one lifecycle, driven by the
//! registration framework:
//!
//! ```text
//! before_registration -> initialize -> before_each_resolution(0)
//!     -> value / value_and_derivative (repeatedly)
//!     -> before_each_resolution(1) -> ...
//! ```
//!
//! Metrics borrow their collaborators (images, transform, interpolator,
//! masks) for the duration of the run; the caller owns them. Concrete
//! variants are constructed directly or by name through [`MetricRegistry`].

use std::time::{Duration, Instant};

use nalgebra::DVector;

use crate::image::mask::SpatialMask;
use crate::image::ImageView;
use crate::interp::Interpolator;
use crate::sample::{build_sample_set, Sample, SampleSet};
use crate::trace::trace_event;
use crate::transform::Transform;
use crate::util::{MetricError, MetricResult};

mod ncc;
#[cfg(feature = "rayon")]
mod par;
mod ssd;
pub(crate) mod sums;

pub use ncc::NormalizedCorrelationMetric;
pub use ssd::MeanSquaresMetric;

use sums::Accumulate;

/// Default number of random samples per resolution stage.
pub const DEFAULT_SPATIAL_SAMPLES: usize = 5000;

/// Metric configuration, fixed for a whole registration run at
/// `before_registration`.
#[derive(Clone, Debug)]
pub struct MetricConfig {
    /// Subtract the sample means in the correlation formula. Narrows the
    /// valleys of the cost function; enabled by default.
    pub subtract_mean: bool,
    /// Use every voxel inside the fixed mask instead of a random subset.
    pub use_all_pixels: bool,
    /// Random sample count per resolution stage; consulted only when
    /// `use_all_pixels` is false, and must then cover every stage.
    pub samples_per_resolution: Vec<usize>,
    /// Number of resolution stages in the schedule.
    pub num_resolutions: usize,
    /// Seed for the per-stage random sample streams.
    pub sample_seed: u64,
    /// Accumulate sample chunks in parallel (honored with the `rayon`
    /// feature; ignored otherwise).
    pub parallel: bool,
}

impl Default for MetricConfig {
    fn default() -> Self {
        Self {
            subtract_mean: true,
            use_all_pixels: true,
            samples_per_resolution: vec![DEFAULT_SPATIAL_SAMPLES],
            num_resolutions: 1,
            sample_seed: 0x5EED_5EED,
            parallel: false,
        }
    }
}

impl MetricConfig {
    pub(crate) fn validate(&self) -> MetricResult<()> {
        if self.num_resolutions == 0 {
            return Err(MetricError::InvalidConfiguration(
                "at least one resolution stage is required",
            ));
        }
        if !self.use_all_pixels {
            if self.samples_per_resolution.len() < self.num_resolutions {
                return Err(MetricError::SampleSchedule {
                    got: self.samples_per_resolution.len(),
                    stages: self.num_resolutions,
                });
            }
            if self.samples_per_resolution[..self.num_resolutions]
                .iter()
                .any(|&count| count == 0)
            {
                return Err(MetricError::InvalidConfiguration(
                    "sample counts must be positive",
                ));
            }
        }
        Ok(())
    }
}

/// Receives elapsed-time reports from `initialize`.
pub trait ElapsedReporter: Sync {
    /// Called once per initialization with a label and the elapsed time.
    fn report_elapsed(&self, label: &str, elapsed: Duration);
}

/// Borrowed collaborators for one registration run.
///
/// All references are read-only during evaluation and safe to share across
/// threads; the surrounding framework keeps them alive for the whole run.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    /// The reference image; never transformed.
    pub fixed: ImageView<'a>,
    /// The image being aligned; sampled at transformed coordinates.
    pub moving: ImageView<'a>,
    /// Mapping from fixed to moving physical space.
    pub transform: &'a dyn Transform,
    /// Sampler for moving intensities and their gradients.
    pub interpolator: &'a dyn Interpolator,
    /// Restricts sample selection on the fixed side.
    pub fixed_mask: Option<&'a dyn SpatialMask>,
    /// Restricts validity of transformed points on the moving side.
    pub moving_mask: Option<&'a dyn SpatialMask>,
    /// Optional sink for setup timing reports.
    pub reporter: Option<&'a dyn ElapsedReporter>,
}

impl<'a> Collaborators<'a> {
    /// Creates a collaborator bundle without masks or reporter.
    pub fn new(
        fixed: ImageView<'a>,
        moving: ImageView<'a>,
        transform: &'a dyn Transform,
        interpolator: &'a dyn Interpolator,
    ) -> Self {
        Self {
            fixed,
            moving,
            transform,
            interpolator,
            fixed_mask: None,
            moving_mask: None,
            reporter: None,
        }
    }

    /// Adds a fixed-side mask.
    pub fn with_fixed_mask(mut self, mask: &'a dyn SpatialMask) -> Self {
        self.fixed_mask = Some(mask);
        self
    }

    /// Adds a moving-side mask.
    pub fn with_moving_mask(mut self, mask: &'a dyn SpatialMask) -> Self {
        self.moving_mask = Some(mask);
        self
    }

    /// Adds an elapsed-time reporter.
    pub fn with_reporter(mut self, reporter: &'a dyn ElapsedReporter) -> Self {
        self.reporter = Some(reporter);
        self
    }
}

/// Similarity measure between a fixed and a moving image.
///
/// Values are costs: an optimizer minimizing the measure drives the images
/// into alignment. Implementations are interchangeable behind this trait and
/// selectable by name through [`MetricRegistry`].
pub trait Metric {
    /// Name under which the variant is registered.
    fn name(&self) -> &'static str;

    /// Number of transform parameters the derivative is taken against.
    fn num_params(&self) -> usize;

    /// Fixes the configuration for the whole run. Idempotent; resets any
    /// stage state from a previous configuration.
    fn before_registration(&mut self, config: &MetricConfig) -> MetricResult<()>;

    /// Validates the collaborator bindings and reports setup time.
    fn initialize(&mut self) -> MetricResult<()>;

    /// Enters a resolution stage and rebuilds the sample set. Stages must be
    /// visited exactly once each, in increasing order starting at zero.
    fn before_each_resolution(&mut self, stage: usize) -> MetricResult<()>;

    /// Evaluates the measure at `params`.
    fn value(&self, params: &DVector<f64>) -> MetricResult<f64>;

    /// Evaluates the measure and its gradient with respect to `params`.
    fn value_and_derivative(&self, params: &DVector<f64>) -> MetricResult<(f64, DVector<f64>)>;

    /// Request from a stochastic optimizer for a fresh sample subset.
    ///
    /// Intentionally ignored: the active sample set changes only in
    /// [`Metric::before_each_resolution`]. Random subsets are refreshed at
    /// resolution boundaries, not per iteration.
    fn select_new_samples(&mut self);
}

/// Constructor for a metric variant over borrowed collaborators.
pub type MetricFactory = for<'a> fn(Collaborators<'a>) -> Box<dyn Metric + 'a>;

/// Name-to-factory registry for metric variants.
pub struct MetricRegistry {
    entries: Vec<(&'static str, MetricFactory)>,
}

impl MetricRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Creates a registry with the built-in variants registered.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("NormalizedCorrelation", ncc::factory);
        registry.register("MeanSquares", ssd::factory);
        registry
    }

    /// Registers a variant, replacing any previous entry with the same name.
    pub fn register(&mut self, name: &'static str, factory: MetricFactory) {
        self.entries.retain(|(existing, _)| *existing != name);
        self.entries.push((name, factory));
    }

    /// Returns the registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(name, _)| *name)
    }

    /// Instantiates the named variant over the given collaborators.
    pub fn create<'a>(
        &self,
        name: &str,
        collaborators: Collaborators<'a>,
    ) -> MetricResult<Box<dyn Metric + 'a>> {
        let factory = self
            .entries
            .iter()
            .find(|(existing, _)| *existing == name)
            .map(|(_, factory)| *factory)
            .ok_or_else(|| MetricError::UnknownMetric(name.to_string()))?;
        Ok(factory(collaborators))
    }
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

/// Lifecycle state and evaluation plumbing shared by the metric variants.
pub(crate) struct EvalCore<'a> {
    pub collab: Collaborators<'a>,
    pub config: MetricConfig,
    configured: bool,
    initialized: bool,
    stage: Option<usize>,
    samples: Option<SampleSet>,
}

impl<'a> EvalCore<'a> {
    pub fn new(collab: Collaborators<'a>) -> Self {
        Self {
            collab,
            config: MetricConfig::default(),
            configured: false,
            initialized: false,
            stage: None,
            samples: None,
        }
    }

    pub fn before_registration(&mut self, config: &MetricConfig) -> MetricResult<()> {
        config.validate()?;
        self.config = config.clone();
        self.configured = true;
        self.stage = None;
        self.samples = None;
        Ok(())
    }

    pub fn initialize(&mut self, label: &'static str) -> MetricResult<()> {
        if !self.configured {
            return Err(MetricError::NotConfigured(
                "before_registration must complete first",
            ));
        }
        let started = Instant::now();
        if self.collab.transform.num_params() == 0 {
            return Err(MetricError::InvalidConfiguration(
                "transform has no parameters",
            ));
        }
        self.initialized = true;
        let elapsed = started.elapsed();
        if let Some(reporter) = self.collab.reporter {
            reporter.report_elapsed(label, elapsed);
        }
        trace_event!("initialize", metric = label, elapsed_ns = elapsed.as_nanos() as u64);
        Ok(())
    }

    pub fn before_each_resolution(&mut self, stage: usize) -> MetricResult<()> {
        if !self.initialized {
            return Err(MetricError::NotConfigured("initialize must complete first"));
        }
        let expected = self.stage.map_or(0, |current| current + 1);
        if stage != expected {
            return Err(MetricError::StageOrder {
                expected,
                got: stage,
            });
        }
        if stage >= self.config.num_resolutions {
            return Err(MetricError::InvalidConfiguration(
                "resolution stage beyond the configured schedule",
            ));
        }
        let set = build_sample_set(stage, &self.collab.fixed, self.collab.fixed_mask, &self.config)?;
        trace_event!("sample_set", stage = stage as u64, samples = set.len() as u64);
        self.stage = Some(stage);
        self.samples = Some(set);
        Ok(())
    }

    /// Returns the sample set of the active stage, if any.
    pub fn active_samples(&self) -> Option<&SampleSet> {
        self.samples.as_ref()
    }

    /// Validates the query and returns the active samples.
    pub fn ready_samples(&self, params: &DVector<f64>) -> MetricResult<&[Sample]> {
        let set = self.samples.as_ref().ok_or(MetricError::NotConfigured(
            "before_each_resolution must complete first",
        ))?;
        let expected = self.collab.transform.num_params();
        if params.len() != expected {
            return Err(MetricError::ParameterCount {
                expected,
                got: params.len(),
            });
        }
        Ok(set.samples())
    }
}

/// Evaluates one fixed-image sample against the moving image.
///
/// Returns `Ok(None)` when the transformed point falls outside the moving
/// mask or the interpolatable domain; such points are excluded from the sums.
/// When `dm` is provided it is filled with the per-parameter sensitivity
/// `dm/dp_k = grad_m . J[:, k]`.
pub(crate) fn evaluate_point(
    collab: &Collaborators<'_>,
    sample: &Sample,
    params: &DVector<f64>,
    dm: Option<&mut DVector<f64>>,
) -> MetricResult<Option<(f64, f64)>> {
    let mapped = collab.transform.map(&sample.point, params);
    if let Some(mask) = collab.moving_mask {
        if !mask.contains(&mapped) {
            return Ok(None);
        }
    }
    let m = match collab.interpolator.sample(&collab.moving, &mapped) {
        Some(value) => value,
        None => return Ok(None),
    };
    if let Some(dm) = dm {
        let gradient = collab
            .interpolator
            .gradient(&collab.moving, &mapped)
            .ok_or(MetricError::GradientUnavailable)?;
        let jacobian = collab.transform.jacobian(&sample.point, params);
        for k in 0..dm.len() {
            dm[k] = jacobian[(0, k)] * gradient.x + jacobian[(1, k)] * gradient.y;
        }
    }
    Ok(Some((sample.fixed_value, m)))
}

/// Folds every valid sample of `samples` into a fresh accumulator.
///
/// `deriv_params` carries the parameter count when the evaluation tracks
/// derivatives. The parallel path partitions the samples into chunks and
/// merges partial accumulators in chunk order, so results are reproducible.
pub(crate) fn accumulate<A, F>(
    collab: &Collaborators<'_>,
    samples: &[Sample],
    params: &DVector<f64>,
    deriv_params: Option<usize>,
    make: F,
    parallel: bool,
) -> MetricResult<A>
where
    A: Accumulate,
    F: Fn() -> A + Sync,
{
    #[cfg(feature = "rayon")]
    {
        if parallel {
            return par::accumulate_par(collab, samples, params, deriv_params, &make);
        }
    }
    #[cfg(not(feature = "rayon"))]
    let _ = parallel;
    accumulate_chunk(collab, samples, params, deriv_params, &make)
}

pub(crate) fn accumulate_chunk<A, F>(
    collab: &Collaborators<'_>,
    samples: &[Sample],
    params: &DVector<f64>,
    deriv_params: Option<usize>,
    make: &F,
) -> MetricResult<A>
where
    A: Accumulate,
    F: Fn() -> A + Sync,
{
    let mut acc = make();
    let mut scratch = deriv_params.map(|count| DVector::zeros(count));
    for sample in samples {
        if let Some((f, m)) = evaluate_point(collab, sample, params, scratch.as_mut())? {
            acc.push(f, m, scratch.as_ref());
        }
    }
    Ok(acc)
}
