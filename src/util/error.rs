//! Error types for regmetric.

use thiserror::Error;

/// Result alias for regmetric operations.
pub type MetricResult<T> = std::result::Result<T, MetricError>;

/// Errors reported by the metric engine and its collaborators.
///
/// Configuration problems (`InvalidConfiguration`, `SampleSchedule`,
/// `ParameterCount`, `UnknownMetric`) are fatal to the run and surface before
/// any evaluation. `NotConfigured` and `StageOrder` are lifecycle misuse.
/// `InsufficientSamples` and `DegenerateCorrelation` are per-evaluation
/// outcomes an optimizer may treat as a rejected step; the engine never
/// retries on its own.
#[derive(Debug, Error)]
pub enum MetricError {
    /// The image dimensions are invalid (zero or overflowing).
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
    /// The row stride is smaller than the image width.
    #[error("stride {stride} is smaller than width {width}")]
    InvalidStride { width: usize, stride: usize },
    /// The backing buffer cannot hold the described image.
    #[error("buffer too small: needed {needed}, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
    /// The direction matrix of an image geometry is not invertible.
    #[error("direction matrix is not invertible")]
    SingularDirection,
    /// The configuration is missing or inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(&'static str),
    /// The sample schedule has fewer entries than resolution stages.
    #[error("sample schedule has {got} entries for {stages} resolution stages")]
    SampleSchedule { got: usize, stages: usize },
    /// An operation was requested before the required lifecycle step.
    #[error("metric not configured: {0}")]
    NotConfigured(&'static str),
    /// Resolution stages must be visited exactly once, in increasing order.
    #[error("resolution stage {got} requested, expected {expected}")]
    StageOrder { expected: usize, got: usize },
    /// The parameter vector does not match the transform.
    #[error("parameter vector has {got} entries, transform expects {expected}")]
    ParameterCount { expected: usize, got: usize },
    /// No sample survived the transform and mask filtering.
    #[error("no valid samples map into the moving image domain")]
    InsufficientSamples,
    /// The variance product vanished; the correlation is undefined.
    #[error("degenerate correlation: variance product {product:.3e} at or below {threshold:.3e}")]
    DegenerateCorrelation { product: f64, threshold: f64 },
    /// A derivative was requested through an interpolator without a gradient.
    #[error("interpolator provides no intensity gradient")]
    GradientUnavailable,
    /// No metric with this name is registered.
    #[error("unknown metric \"{0}\"")]
    UnknownMetric(String),
}
