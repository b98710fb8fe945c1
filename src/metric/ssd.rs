//! Mean-squares metric.

use nalgebra::DVector;

use crate::metric::sums::SquaredDiffSums;
use crate::metric::{accumulate, Collaborators, EvalCore, Metric, MetricConfig};
use crate::sample::SampleSet;
use crate::trace::{trace_event, trace_span};
use crate::util::MetricResult;

/// Mean of squared intensity differences over the valid samples.
///
/// `MS = sum((m_i - f_i)^2) / N`, gradient `2/N * sum((m_i - f_i) dm_i/dp)`.
/// Zero at a perfect intensity match; insensitive to the `subtract_mean`
/// flag, which only concerns the correlation variant.
pub struct MeanSquaresMetric<'a> {
    core: EvalCore<'a>,
}

pub(crate) fn factory<'a>(collaborators: Collaborators<'a>) -> Box<dyn Metric + 'a> {
    Box::new(MeanSquaresMetric::new(collaborators))
}

impl<'a> MeanSquaresMetric<'a> {
    /// Creates the metric over borrowed collaborators.
    pub fn new(collaborators: Collaborators<'a>) -> Self {
        Self {
            core: EvalCore::new(collaborators),
        }
    }

    /// Returns the sample set of the active resolution stage.
    pub fn active_samples(&self) -> Option<&SampleSet> {
        self.core.active_samples()
    }

    fn sums(&self, params: &DVector<f64>, derivative: bool) -> MetricResult<SquaredDiffSums> {
        let samples = self.core.ready_samples(params)?;
        let _span = trace_span!(
            "ssd_evaluate",
            samples = samples.len(),
            derivative = derivative
        )
        .entered();
        let num_params = self.core.collab.transform.num_params();
        accumulate(
            &self.core.collab,
            samples,
            params,
            derivative.then_some(num_params),
            || {
                if derivative {
                    SquaredDiffSums::with_derivative(num_params)
                } else {
                    SquaredDiffSums::value_only()
                }
            },
            self.core.config.parallel,
        )
    }
}

impl Metric for MeanSquaresMetric<'_> {
    fn name(&self) -> &'static str {
        "MeanSquares"
    }

    fn num_params(&self) -> usize {
        self.core.collab.transform.num_params()
    }

    fn before_registration(&mut self, config: &MetricConfig) -> MetricResult<()> {
        self.core.before_registration(config)
    }

    fn initialize(&mut self) -> MetricResult<()> {
        self.core.initialize("MeanSquares")
    }

    fn before_each_resolution(&mut self, stage: usize) -> MetricResult<()> {
        self.core.before_each_resolution(stage)
    }

    fn value(&self, params: &DVector<f64>) -> MetricResult<f64> {
        self.sums(params, false)?.measure()
    }

    fn value_and_derivative(&self, params: &DVector<f64>) -> MetricResult<(f64, DVector<f64>)> {
        self.sums(params, true)?.measure_and_derivative()
    }

    fn select_new_samples(&mut self) {
        // Same contract as the correlation variant: refresh requests from
        // stochastic optimizers are ignored between resolution boundaries.
        trace_event!("select_new_samples_ignored");
    }
}
