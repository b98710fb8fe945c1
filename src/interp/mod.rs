//! Intensity interpolation at non-grid coordinates.
//!
//! The metric samples the moving image at transformed physical points, which
//! rarely land on the voxel grid. Interpolators decide the interpolatable
//! domain, produce intensities, and (for derivative queries) the spatial
//! intensity gradient in physical space.

use nalgebra::{Point2, Vector2};

use crate::image::ImageView;

mod linear;
mod nearest;

pub use linear::LinearInterpolator;
pub use nearest::NearestInterpolator;

/// Samples an image at continuous physical coordinates.
///
/// `Sync` because evaluations fan out over sample chunks.
pub trait Interpolator: Sync {
    /// Returns true if `point` lies inside the interpolatable domain.
    fn is_inside(&self, image: &ImageView<'_>, point: &Point2<f64>) -> bool;

    /// Returns the interpolated intensity, or `None` outside the domain.
    fn sample(&self, image: &ImageView<'_>, point: &Point2<f64>) -> Option<f64>;

    /// Returns the physical-space intensity gradient at `point`.
    ///
    /// `None` means the point is outside the domain or the scheme has no
    /// usable derivative; the metric reports the latter as an error when a
    /// derivative evaluation is requested.
    fn gradient(&self, image: &ImageView<'_>, point: &Point2<f64>) -> Option<Vector2<f64>>;
}
