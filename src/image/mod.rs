//! Image views with physical-space geometry.
//!
//! `ImageView` is a borrowed 2D view into a 1D `f32` buffer with an explicit
//! stride, paired with an `ImageGeometry` that places the voxel grid in
//! physical space (origin, per-axis spacing, direction matrix). Continuous
//! index `(cx, cy)` maps to the physical point
//! `origin + direction * diag(spacing) * (cx, cy)`.
//!
//! Images are read-only to the metric engine; the registration framework
//! owns the buffers for the duration of a run.

use nalgebra::{Matrix2, Point2, Vector2};

use crate::util::{MetricError, MetricResult};

pub mod mask;

/// Placement of a voxel grid in physical space.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ImageGeometry {
    origin: Point2<f64>,
    spacing: Vector2<f64>,
    direction: Matrix2<f64>,
    // Cached inverse of direction * diag(spacing).
    to_index: Matrix2<f64>,
}

impl ImageGeometry {
    /// Creates a geometry from origin, per-axis spacing and direction cosines.
    ///
    /// Spacing must be strictly positive and the direction matrix invertible.
    pub fn new(
        origin: Point2<f64>,
        spacing: Vector2<f64>,
        direction: Matrix2<f64>,
    ) -> MetricResult<Self> {
        if !(spacing.x > 0.0 && spacing.y > 0.0) {
            return Err(MetricError::InvalidConfiguration(
                "image spacing must be strictly positive",
            ));
        }
        let forward = direction * Matrix2::from_diagonal(&spacing);
        let to_index = forward
            .try_inverse()
            .ok_or(MetricError::SingularDirection)?;
        Ok(Self {
            origin,
            spacing,
            direction,
            to_index,
        })
    }

    /// Unit spacing, zero origin, identity direction.
    pub fn identity() -> Self {
        Self {
            origin: Point2::origin(),
            spacing: Vector2::new(1.0, 1.0),
            direction: Matrix2::identity(),
            to_index: Matrix2::identity(),
        }
    }

    /// Returns the physical origin of voxel `(0, 0)`.
    pub fn origin(&self) -> Point2<f64> {
        self.origin
    }

    /// Returns the per-axis voxel spacing.
    pub fn spacing(&self) -> Vector2<f64> {
        self.spacing
    }

    /// Returns the direction cosine matrix.
    pub fn direction(&self) -> Matrix2<f64> {
        self.direction
    }

    /// Maps a continuous index to a physical point.
    pub fn index_to_physical(&self, index: Vector2<f64>) -> Point2<f64> {
        self.origin + self.direction * index.component_mul(&self.spacing)
    }

    /// Maps a physical point to a continuous index.
    pub fn physical_to_index(&self, point: &Point2<f64>) -> Vector2<f64> {
        self.to_index * (point - self.origin)
    }

    /// Maps an index-space intensity gradient to physical space.
    ///
    /// The continuous index is an affine function of the physical point, so
    /// the chain rule contributes the transposed index mapping.
    pub fn index_gradient_to_physical(&self, gradient: Vector2<f64>) -> Vector2<f64> {
        self.to_index.transpose() * gradient
    }
}

/// Borrowed 2D scalar image view with an explicit stride and geometry.
#[derive(Copy, Clone)]
pub struct ImageView<'a> {
    data: &'a [f32],
    width: usize,
    height: usize,
    stride: usize,
    geometry: ImageGeometry,
}

impl<'a> ImageView<'a> {
    /// Creates a contiguous view with `stride == width` and identity geometry.
    pub fn from_slice(data: &'a [f32], width: usize, height: usize) -> MetricResult<Self> {
        Self::new(data, width, height, width, ImageGeometry::identity())
    }

    /// Creates a view with an explicit stride and geometry.
    pub fn new(
        data: &'a [f32],
        width: usize,
        height: usize,
        stride: usize,
        geometry: ImageGeometry,
    ) -> MetricResult<Self> {
        let needed = required_len(width, height, stride)?;
        if data.len() < needed {
            return Err(MetricError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            stride,
            geometry,
        })
    }

    /// Returns the image width in voxels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the image height in voxels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the stride in elements between row starts.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Returns the physical placement of the grid.
    pub fn geometry(&self) -> &ImageGeometry {
        &self.geometry
    }

    /// Returns the intensity at `(x, y)` if it is within bounds.
    pub fn get(&self, x: usize, y: usize) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = y.checked_mul(self.stride)?.checked_add(x)?;
        self.data.get(idx).copied()
    }

    /// Returns a contiguous slice for row `y` with length `width`.
    pub fn row(&self, y: usize) -> Option<&'a [f32]> {
        if y >= self.height {
            return None;
        }
        let start = y.checked_mul(self.stride)?;
        let end = start.checked_add(self.width)?;
        self.data.get(start..end)
    }

    /// Returns the physical location of grid point `(x, y)`.
    pub fn index_to_physical(&self, x: usize, y: usize) -> Point2<f64> {
        self.geometry
            .index_to_physical(Vector2::new(x as f64, y as f64))
    }
}

/// Owned contiguous scalar image, the counterpart of [`ImageView`].
pub struct ImageBuffer {
    data: Vec<f32>,
    width: usize,
    height: usize,
    geometry: ImageGeometry,
}

impl ImageBuffer {
    /// Creates an owned image from a row-major buffer with identity geometry.
    pub fn from_vec(data: Vec<f32>, width: usize, height: usize) -> MetricResult<Self> {
        let needed = required_len(width, height, width)?;
        if data.len() != needed {
            return Err(MetricError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            geometry: ImageGeometry::identity(),
        })
    }

    /// Replaces the physical placement of the grid.
    pub fn with_geometry(mut self, geometry: ImageGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    /// Returns a borrowed view of the image.
    pub fn view(&self) -> ImageView<'_> {
        ImageView {
            data: &self.data,
            width: self.width,
            height: self.height,
            stride: self.width,
            geometry: self.geometry,
        }
    }
}

fn required_len(width: usize, height: usize, stride: usize) -> MetricResult<usize> {
    if width == 0 || height == 0 {
        return Err(MetricError::InvalidDimensions { width, height });
    }
    if stride < width {
        return Err(MetricError::InvalidStride { width, stride });
    }
    let needed = (height - 1)
        .checked_mul(stride)
        .and_then(|v| v.checked_add(width))
        .ok_or(MetricError::InvalidDimensions { width, height })?;
    Ok(needed)
}
