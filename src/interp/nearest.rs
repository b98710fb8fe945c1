//! Nearest-neighbour interpolation.

use nalgebra::{Point2, Vector2};

use crate::image::ImageView;
use crate::interp::Interpolator;

/// Nearest-neighbour interpolator.
///
/// Piecewise-constant, so it carries no usable intensity gradient; metrics
/// reject derivative requests made through it.
#[derive(Default, Copy, Clone, Debug)]
pub struct NearestInterpolator;

impl NearestInterpolator {
    /// Creates a new nearest-neighbour interpolator.
    pub fn new() -> Self {
        Self
    }

    fn nearest(image: &ImageView<'_>, point: &Point2<f64>) -> Option<(usize, usize)> {
        let index = image.geometry().physical_to_index(point);
        let x = index.x.round();
        let y = index.y.round();
        if x < 0.0 || y < 0.0 {
            return None;
        }
        let (x, y) = (x as usize, y as usize);
        if x >= image.width() || y >= image.height() {
            return None;
        }
        Some((x, y))
    }
}

impl Interpolator for NearestInterpolator {
    fn is_inside(&self, image: &ImageView<'_>, point: &Point2<f64>) -> bool {
        Self::nearest(image, point).is_some()
    }

    fn sample(&self, image: &ImageView<'_>, point: &Point2<f64>) -> Option<f64> {
        let (x, y) = Self::nearest(image, point)?;
        image.get(x, y).map(f64::from)
    }

    fn gradient(&self, _image: &ImageView<'_>, _point: &Point2<f64>) -> Option<Vector2<f64>> {
        None
    }
}
