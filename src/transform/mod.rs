//! Parameterized spatial transforms.
//!
//! A transform maps fixed-image physical points into moving-image physical
//! space. The parameter vector is passed to every call rather than stored,
//! so transform objects are stateless and share freely across threads during
//! a parallel evaluation.

use nalgebra::{DMatrix, DVector, Point2};

mod affine;
mod translation;

pub use affine::AffineTransform;
pub use translation::TranslationTransform;

/// Parameterized mapping from fixed to moving physical space.
///
/// `jacobian` returns the matrix of partial derivatives of the mapped point
/// with respect to each parameter, with one column per parameter (shape
/// `2 x num_params`). Callers validate the parameter-vector length once per
/// query; implementations may assume it matches.
///
/// `Sync` because evaluations fan out over sample chunks.
pub trait Transform: Sync {
    /// Number of parameters of this transform.
    fn num_params(&self) -> usize;

    /// Maps a physical point under the given parameters.
    fn map(&self, point: &Point2<f64>, params: &DVector<f64>) -> Point2<f64>;

    /// Jacobian of the mapped point with respect to the parameters.
    fn jacobian(&self, point: &Point2<f64>, params: &DVector<f64>) -> DMatrix<f64>;
}
