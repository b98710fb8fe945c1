//! Spatial-domain masks.
//!
//! Masks restrict the metric to a region of interest. They are predicates on
//! physical points, so the same mask object serves the fixed side (sample
//! selection) and the moving side (validity of transformed points).

use nalgebra::Point2;

use crate::image::ImageGeometry;
use crate::util::{MetricError, MetricResult};

/// Predicate deciding whether a physical point belongs to the valid region.
///
/// `Sync` because evaluations fan out over sample chunks.
pub trait SpatialMask: Sync {
    /// Returns true if `point` lies inside the mask.
    fn contains(&self, point: &Point2<f64>) -> bool;
}

/// Axis-aligned box in physical space.
#[derive(Copy, Clone, Debug)]
pub struct RegionMask {
    min: Point2<f64>,
    max: Point2<f64>,
}

impl RegionMask {
    /// Creates a box mask from its physical corners (inclusive).
    pub fn new(min: Point2<f64>, max: Point2<f64>) -> MetricResult<Self> {
        if !(min.x <= max.x && min.y <= max.y) {
            return Err(MetricError::InvalidConfiguration(
                "region mask corners must satisfy min <= max",
            ));
        }
        Ok(Self { min, max })
    }
}

impl SpatialMask for RegionMask {
    fn contains(&self, point: &Point2<f64>) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }
}

/// Binary voxel mask over an image grid.
///
/// Membership is decided at the nearest voxel; nonzero labels are inside.
pub struct BinaryMask<'a> {
    labels: &'a [u8],
    width: usize,
    height: usize,
    geometry: ImageGeometry,
}

impl<'a> BinaryMask<'a> {
    /// Creates a mask from a row-major label buffer aligned with `geometry`.
    pub fn new(
        labels: &'a [u8],
        width: usize,
        height: usize,
        geometry: ImageGeometry,
    ) -> MetricResult<Self> {
        if width == 0 || height == 0 {
            return Err(MetricError::InvalidDimensions { width, height });
        }
        let needed = width
            .checked_mul(height)
            .ok_or(MetricError::InvalidDimensions { width, height })?;
        if labels.len() < needed {
            return Err(MetricError::BufferTooSmall {
                needed,
                got: labels.len(),
            });
        }
        Ok(Self {
            labels,
            width,
            height,
            geometry,
        })
    }
}

impl SpatialMask for BinaryMask<'_> {
    fn contains(&self, point: &Point2<f64>) -> bool {
        let index = self.geometry.physical_to_index(point);
        let x = index.x.round();
        let y = index.y.round();
        if x < 0.0 || y < 0.0 {
            return false;
        }
        let (x, y) = (x as usize, y as usize);
        if x >= self.width || y >= self.height {
            return false;
        }
        self.labels[y * self.width + x] != 0
    }
}
