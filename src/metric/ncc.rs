//! Normalized-correlation metric.
//!
//! Measure:
//!
//! ```text
//! NC = -sum((f - fbar)(m - mbar)) / sqrt(sum((f - fbar)^2) * sum((m - mbar)^2))
//! ```
//!
//! over the valid samples of the active stage, with `fbar`/`mbar` zero when
//! mean subtraction is disabled. The sign makes alignment a minimum: the
//! measure lives in `[-1, 1]` with perfect linear correlation at `-1`.
//!
//! The gradient treats the sample means as constants with respect to the
//! parameters; sample membership is fixed within a stage, only transformed
//! positions move. Per parameter `k`:
//!
//! ```text
//! dNC/dp_k = -sum_i [ (f_i - fbar) - (Sfm/Smm)(m_i - mbar) ] * dm_i/dp_k
//!            / sqrt(Sff * Smm)
//! ```

use nalgebra::DVector;

use crate::metric::sums::CorrelationSums;
use crate::metric::{accumulate, Collaborators, EvalCore, Metric, MetricConfig};
use crate::sample::SampleSet;
use crate::trace::{trace_event, trace_span};
use crate::util::MetricResult;

/// Normalized-correlation similarity metric.
pub struct NormalizedCorrelationMetric<'a> {
    core: EvalCore<'a>,
}

pub(crate) fn factory<'a>(collaborators: Collaborators<'a>) -> Box<dyn Metric + 'a> {
    Box::new(NormalizedCorrelationMetric::new(collaborators))
}

impl<'a> NormalizedCorrelationMetric<'a> {
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

    fn sums(&self, params: &DVector<f64>, derivative: bool) -> MetricResult<CorrelationSums> {
        let samples = self.core.ready_samples(params)?;
        let _span = trace_span!(
            "ncc_evaluate",
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
                    CorrelationSums::with_derivative(num_params)
                } else {
                    CorrelationSums::value_only()
                }
            },
            self.core.config.parallel,
        )
    }
}

impl Metric for NormalizedCorrelationMetric<'_> {
    fn name(&self) -> &'static str {
        "NormalizedCorrelation"
    }

    fn num_params(&self) -> usize {
        self.core.collab.transform.num_params()
    }

    fn before_registration(&mut self, config: &MetricConfig) -> MetricResult<()> {
        self.core.before_registration(config)
    }

    fn initialize(&mut self) -> MetricResult<()> {
        self.core.initialize("NormalizedCorrelation")
    }

    fn before_each_resolution(&mut self, stage: usize) -> MetricResult<()> {
        self.core.before_each_resolution(stage)
    }

    fn value(&self, params: &DVector<f64>) -> MetricResult<f64> {
        self.sums(params, false)?
            .measure(self.core.config.subtract_mean)
    }

    fn value_and_derivative(&self, params: &DVector<f64>) -> MetricResult<(f64, DVector<f64>)> {
        self.sums(params, true)?
            .measure_and_derivative(self.core.config.subtract_mean)
    }

    fn select_new_samples(&mut self) {
        // Contract: the active sample set changes only at resolution
        // boundaries. Stochastic refresh requests are ignored.
        trace_event!("select_new_samples_ignored");
    }
}
