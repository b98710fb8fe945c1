//! Bilinear interpolation with an analytic spatial gradient.

use nalgebra::{Point2, Vector2};

use crate::image::ImageView;
use crate::interp::Interpolator;

/// Bilinear interpolator.
///
/// The interpolatable domain is the continuous-index box
/// `[0, width-1] x [0, height-1]`; images narrower than two voxels in either
/// axis have no domain. The gradient is the exact derivative of the bilinear
/// weights, mapped to physical space through the image geometry.
#[derive(Default, Copy, Clone, Debug)]
pub struct LinearInterpolator;

impl LinearInterpolator {
    /// Creates a new bilinear interpolator.
    pub fn new() -> Self {
        Self
    }

    fn corners(image: &ImageView<'_>, point: &Point2<f64>) -> Option<Taps> {
        let index = image.geometry().physical_to_index(point);
        let (cx, cy) = (index.x, index.y);
        let (w, h) = (image.width(), image.height());
        if w < 2 || h < 2 {
            return None;
        }
        if !(cx >= 0.0 && cy >= 0.0) {
            return None;
        }
        if cx > (w - 1) as f64 || cy > (h - 1) as f64 {
            return None;
        }
        // Points exactly on the far edge fall into the last interior cell.
        let x0 = (cx.floor() as usize).min(w - 2);
        let y0 = (cy.floor() as usize).min(h - 2);
        let fx = cx - x0 as f64;
        let fy = cy - y0 as f64;

        let row0 = image.row(y0)?;
        let row1 = image.row(y0 + 1)?;
        Some(Taps {
            v00: row0[x0] as f64,
            v10: row0[x0 + 1] as f64,
            v01: row1[x0] as f64,
            v11: row1[x0 + 1] as f64,
            fx,
            fy,
        })
    }
}

struct Taps {
    v00: f64,
    v10: f64,
    v01: f64,
    v11: f64,
    fx: f64,
    fy: f64,
}

impl Interpolator for LinearInterpolator {
    fn is_inside(&self, image: &ImageView<'_>, point: &Point2<f64>) -> bool {
        Self::corners(image, point).is_some()
    }

    fn sample(&self, image: &ImageView<'_>, point: &Point2<f64>) -> Option<f64> {
        let t = Self::corners(image, point)?;
        let top = t.v00 + t.fx * (t.v10 - t.v00);
        let bottom = t.v01 + t.fx * (t.v11 - t.v01);
        Some(top + t.fy * (bottom - top))
    }

    fn gradient(&self, image: &ImageView<'_>, point: &Point2<f64>) -> Option<Vector2<f64>> {
        let t = Self::corners(image, point)?;
        let dx = (1.0 - t.fy) * (t.v10 - t.v00) + t.fy * (t.v11 - t.v01);
        let dy = (1.0 - t.fx) * (t.v01 - t.v00) + t.fx * (t.v11 - t.v10);
        Some(
            image
                .geometry()
                .index_gradient_to_physical(Vector2::new(dx, dy)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::LinearInterpolator;
    use crate::image::{ImageBuffer, ImageGeometry};
    use crate::interp::Interpolator;
    use nalgebra::{Matrix2, Point2, Vector2};

    fn ramp_image() -> ImageBuffer {
        // v(x, y) = 2x + 3y on a 4x3 grid.
        let mut data = Vec::new();
        for y in 0..3 {
            for x in 0..4 {
                data.push((2 * x + 3 * y) as f32);
            }
        }
        ImageBuffer::from_vec(data, 4, 3).unwrap()
    }

    #[test]
    fn reproduces_grid_values() {
        let image = ramp_image();
        let interp = LinearInterpolator::new();
        let v = interp.sample(&image.view(), &Point2::new(2.0, 1.0)).unwrap();
        assert!((v - 7.0).abs() < 1e-12);
    }

    #[test]
    fn interpolates_between_voxels() {
        let image = ramp_image();
        let interp = LinearInterpolator::new();
        let v = interp.sample(&image.view(), &Point2::new(1.5, 0.5)).unwrap();
        assert!((v - 4.5).abs() < 1e-12);
    }

    #[test]
    fn domain_excludes_outside_points() {
        let image = ramp_image();
        let interp = LinearInterpolator::new();
        let view = image.view();
        assert!(interp.is_inside(&view, &Point2::new(3.0, 2.0)));
        assert!(!interp.is_inside(&view, &Point2::new(3.01, 1.0)));
        assert!(!interp.is_inside(&view, &Point2::new(-0.01, 1.0)));
        assert!(interp.sample(&view, &Point2::new(0.0, 2.5)).is_none());
    }

    #[test]
    fn gradient_matches_ramp_slope() {
        let image = ramp_image();
        let interp = LinearInterpolator::new();
        let g = interp
            .gradient(&image.view(), &Point2::new(1.3, 0.7))
            .unwrap();
        assert!((g.x - 2.0).abs() < 1e-12);
        assert!((g.y - 3.0).abs() < 1e-12);
    }

    #[test]
    fn gradient_respects_spacing() {
        // Same ramp but with 2mm x 0.5mm voxels: physical slopes halve/double.
        let geometry = ImageGeometry::new(
            Point2::origin(),
            Vector2::new(2.0, 0.5),
            Matrix2::identity(),
        )
        .unwrap();
        let image = ramp_image().with_geometry(geometry);
        let interp = LinearInterpolator::new();
        let g = interp
            .gradient(&image.view(), &Point2::new(2.0, 0.5))
            .unwrap();
        assert!((g.x - 1.0).abs() < 1e-12);
        assert!((g.y - 6.0).abs() < 1e-12);
    }
}
