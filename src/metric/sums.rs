//! Reduction of per-point contributions into metric sums.
//!
//! Sums are accumulated raw in a single pass and mean-corrected afterwards:
//! `Sff = sum(f^2) - sum(f)^2 / N`, and likewise for `Smm`, `Sfm` and the
//! per-parameter derivative sums. The corrected quantities equal the
//! mean-subtracted definitions exactly, and the correction terms vanish when
//! mean subtraction is disabled.
//!
//! All sums are plain additions, so partial accumulators merge by field-wise
//! addition; the parallel path relies on this.

use nalgebra::DVector;

use crate::util::{MetricError, MetricResult};

/// Variance-product threshold below which the correlation is undefined.
pub(crate) const DEGENERATE_THRESHOLD: f64 = 1e-10;

/// Sink for valid point contributions.
pub(crate) trait Accumulate: Send {
    /// Folds one valid sample into the sums. `dm` holds `dm/dp` when the
    /// evaluation tracks derivatives.
    fn push(&mut self, f: f64, m: f64, dm: Option<&DVector<f64>>);

    /// Adds another partial accumulator of the same shape.
    #[cfg_attr(not(feature = "rayon"), allow(dead_code))]
    fn merge(&mut self, other: Self)
    where
        Self: Sized;
}

/// Per-parameter derivative sums for the correlation measure.
#[derive(Clone, Debug)]
pub(crate) struct DerivativeSums {
    /// `sum(f * dm/dp)` per parameter.
    pub f_dm: DVector<f64>,
    /// `sum(m * dm/dp)` per parameter.
    pub m_dm: DVector<f64>,
    /// `sum(dm/dp)` per parameter.
    pub dm: DVector<f64>,
}

impl DerivativeSums {
    fn zeros(num_params: usize) -> Self {
        Self {
            f_dm: DVector::zeros(num_params),
            m_dm: DVector::zeros(num_params),
            dm: DVector::zeros(num_params),
        }
    }
}

/// Sums for the normalized-correlation measure and its derivative.
#[derive(Clone, Debug)]
pub(crate) struct CorrelationSums {
    pub n: usize,
    pub sum_f: f64,
    pub sum_m: f64,
    pub sum_ff: f64,
    pub sum_mm: f64,
    pub sum_fm: f64,
    pub deriv: Option<DerivativeSums>,
}

impl CorrelationSums {
    /// Accumulator for value-only evaluations.
    pub fn value_only() -> Self {
        Self {
            n: 0,
            sum_f: 0.0,
            sum_m: 0.0,
            sum_ff: 0.0,
            sum_mm: 0.0,
            sum_fm: 0.0,
            deriv: None,
        }
    }

    /// Accumulator that also tracks the per-parameter derivative sums.
    pub fn with_derivative(num_params: usize) -> Self {
        Self {
            deriv: Some(DerivativeSums::zeros(num_params)),
            ..Self::value_only()
        }
    }

    fn centered(&self, subtract_mean: bool) -> MetricResult<Centered> {
        if self.n == 0 {
            return Err(MetricError::InsufficientSamples);
        }
        let n = self.n as f64;
        let (sff, smm, sfm) = if subtract_mean {
            (
                self.sum_ff - self.sum_f * self.sum_f / n,
                self.sum_mm - self.sum_m * self.sum_m / n,
                self.sum_fm - self.sum_f * self.sum_m / n,
            )
        } else {
            (self.sum_ff, self.sum_mm, self.sum_fm)
        };
        let product = sff * smm;
        if product <= DEGENERATE_THRESHOLD {
            return Err(MetricError::DegenerateCorrelation {
                product,
                threshold: DEGENERATE_THRESHOLD,
            });
        }
        Ok(Centered {
            n,
            smm,
            sfm,
            denom: product.sqrt(),
        })
    }

    /// Computes `-Sfm / sqrt(Sff * Smm)`.
    pub fn measure(&self, subtract_mean: bool) -> MetricResult<f64> {
        let c = self.centered(subtract_mean)?;
        Ok(-c.sfm / c.denom)
    }

    /// Computes the measure together with its analytic gradient.
    pub fn measure_and_derivative(
        &self,
        subtract_mean: bool,
    ) -> MetricResult<(f64, DVector<f64>)> {
        let c = self.centered(subtract_mean)?;
        let d = self
            .deriv
            .as_ref()
            .expect("accumulator built with derivative tracking");
        let ratio = c.sfm / c.smm;
        let mut gradient = DVector::zeros(d.dm.len());
        for k in 0..gradient.len() {
            let (f_dm, m_dm) = if subtract_mean {
                (
                    d.f_dm[k] - self.sum_f * d.dm[k] / c.n,
                    d.m_dm[k] - self.sum_m * d.dm[k] / c.n,
                )
            } else {
                (d.f_dm[k], d.m_dm[k])
            };
            gradient[k] = -(f_dm - ratio * m_dm) / c.denom;
        }
        Ok((-c.sfm / c.denom, gradient))
    }
}

struct Centered {
    n: f64,
    smm: f64,
    sfm: f64,
    denom: f64,
}

impl Accumulate for CorrelationSums {
    fn push(&mut self, f: f64, m: f64, dm: Option<&DVector<f64>>) {
        self.n += 1;
        self.sum_f += f;
        self.sum_m += m;
        self.sum_ff += f * f;
        self.sum_mm += m * m;
        self.sum_fm += f * m;
        if let (Some(sums), Some(dm)) = (self.deriv.as_mut(), dm) {
            for k in 0..dm.len() {
                sums.f_dm[k] += f * dm[k];
                sums.m_dm[k] += m * dm[k];
                sums.dm[k] += dm[k];
            }
        }
    }

    fn merge(&mut self, other: Self) {
        self.n += other.n;
        self.sum_f += other.sum_f;
        self.sum_m += other.sum_m;
        self.sum_ff += other.sum_ff;
        self.sum_mm += other.sum_mm;
        self.sum_fm += other.sum_fm;
        if let (Some(sums), Some(other)) = (self.deriv.as_mut(), other.deriv) {
            sums.f_dm += other.f_dm;
            sums.m_dm += other.m_dm;
            sums.dm += other.dm;
        }
    }
}

/// Sums for the mean-squares measure and its derivative.
#[derive(Clone, Debug)]
pub(crate) struct SquaredDiffSums {
    pub n: usize,
    pub sum_sq: f64,
    pub diff_dm: Option<DVector<f64>>,
}

impl SquaredDiffSums {
    /// Accumulator for value-only evaluations.
    pub fn value_only() -> Self {
        Self {
            n: 0,
            sum_sq: 0.0,
            diff_dm: None,
        }
    }

    /// Accumulator that also tracks the derivative sum.
    pub fn with_derivative(num_params: usize) -> Self {
        Self {
            diff_dm: Some(DVector::zeros(num_params)),
            ..Self::value_only()
        }
    }

    /// Mean of squared intensity differences.
    pub fn measure(&self) -> MetricResult<f64> {
        if self.n == 0 {
            return Err(MetricError::InsufficientSamples);
        }
        Ok(self.sum_sq / self.n as f64)
    }

    /// Measure together with its analytic gradient.
    pub fn measure_and_derivative(&self) -> MetricResult<(f64, DVector<f64>)> {
        let measure = self.measure()?;
        let diff_dm = self
            .diff_dm
            .as_ref()
            .expect("accumulator built with derivative tracking");
        Ok((measure, diff_dm * (2.0 / self.n as f64)))
    }
}

impl Accumulate for SquaredDiffSums {
    fn push(&mut self, f: f64, m: f64, dm: Option<&DVector<f64>>) {
        let diff = m - f;
        self.n += 1;
        self.sum_sq += diff * diff;
        if let (Some(sums), Some(dm)) = (self.diff_dm.as_mut(), dm) {
            for k in 0..dm.len() {
                sums[k] += diff * dm[k];
            }
        }
    }

    fn merge(&mut self, other: Self) {
        self.n += other.n;
        self.sum_sq += other.sum_sq;
        if let (Some(sums), Some(other)) = (self.diff_dm.as_mut(), other.diff_dm) {
            *sums += other;
        }
    }
}
