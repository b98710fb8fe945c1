//! RegMetric is a similarity-metric engine for intensity-based image
//! registration.
//!
//! Given a fixed image, a moving image and a parameterized spatial
//! transform, the crate produces a scalar dissimilarity measure and its
//! analytic gradient with respect to the transform parameters, for
//! consumption by an external iterative optimizer. The built-in variants are
//! normalized correlation and mean squares; variants are interchangeable
//! behind the [`Metric`] trait and selectable by name through
//! [`MetricRegistry`]. Optional parallel accumulation is available via the
//! `rayon` feature.

pub mod image;
pub mod interp;
pub mod metric;
pub mod sample;
mod trace;
pub mod transform;
pub mod util;

pub use image::mask::{BinaryMask, RegionMask, SpatialMask};
pub use image::{ImageBuffer, ImageGeometry, ImageView};
pub use interp::{Interpolator, LinearInterpolator, NearestInterpolator};
pub use metric::{
    Collaborators, ElapsedReporter, MeanSquaresMetric, Metric, MetricConfig, MetricFactory,
    MetricRegistry, NormalizedCorrelationMetric, DEFAULT_SPATIAL_SAMPLES,
};
pub use sample::{Sample, SampleSet};
pub use transform::{AffineTransform, Transform, TranslationTransform};
pub use util::{MetricError, MetricResult};
