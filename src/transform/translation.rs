//! Pure translation transform.

use nalgebra::{DMatrix, DVector, Point2, Vector2};

use crate::transform::Transform;

/// Translation by `(params[0], params[1])`.
#[derive(Default, Copy, Clone, Debug)]
pub struct TranslationTransform;

impl TranslationTransform {
    /// Creates a new translation transform.
    pub fn new() -> Self {
        Self
    }

    /// Parameters of the identity mapping.
    pub fn identity_params() -> DVector<f64> {
        DVector::zeros(2)
    }
}

impl Transform for TranslationTransform {
    fn num_params(&self) -> usize {
        2
    }

    fn map(&self, point: &Point2<f64>, params: &DVector<f64>) -> Point2<f64> {
        debug_assert_eq!(params.len(), 2);
        point + Vector2::new(params[0], params[1])
    }

    fn jacobian(&self, _point: &Point2<f64>, params: &DVector<f64>) -> DMatrix<f64> {
        debug_assert_eq!(params.len(), 2);
        DMatrix::identity(2, 2)
    }
}
