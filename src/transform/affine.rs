//! 2D affine transform.

use nalgebra::{DMatrix, DVector, Point2};

use crate::transform::Transform;

/// Affine transform with parameters `[a11, a12, a21, a22, tx, ty]`:
///
/// ```text
/// x' = a11 * x + a12 * y + tx
/// y' = a21 * x + a22 * y + ty
/// ```
#[derive(Default, Copy, Clone, Debug)]
pub struct AffineTransform;

impl AffineTransform {
    /// Creates a new affine transform.
    pub fn new() -> Self {
        Self
    }

    /// Parameters of the identity mapping.
    pub fn identity_params() -> DVector<f64> {
        DVector::from_vec(vec![1.0, 0.0, 0.0, 1.0, 0.0, 0.0])
    }
}

impl Transform for AffineTransform {
    fn num_params(&self) -> usize {
        6
    }

    fn map(&self, point: &Point2<f64>, params: &DVector<f64>) -> Point2<f64> {
        debug_assert_eq!(params.len(), 6);
        Point2::new(
            params[0] * point.x + params[1] * point.y + params[4],
            params[2] * point.x + params[3] * point.y + params[5],
        )
    }

    fn jacobian(&self, point: &Point2<f64>, params: &DVector<f64>) -> DMatrix<f64> {
        debug_assert_eq!(params.len(), 6);
        let mut jac = DMatrix::zeros(2, 6);
        jac[(0, 0)] = point.x;
        jac[(0, 1)] = point.y;
        jac[(0, 4)] = 1.0;
        jac[(1, 2)] = point.x;
        jac[(1, 3)] = point.y;
        jac[(1, 5)] = 1.0;
        jac
    }
}
