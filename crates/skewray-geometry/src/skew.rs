//! Skew-Line Solver.
//!
//! For rays `g: a + s·v` and `h: b + t·w` the common normal is `n = v × w`.
//! The plane through `g` spanned by `v` and `n` has normal `n1 = v × n` and
//! cuts `h` in its closest point to `g`; symmetrically `n2 = w × n` gives the
//! closest point on `g`:
//!
//! ```text
//! on_h = b + ((a − b) · n1 / (w · n1)) w
//! on_g = a + ((b − a) · n2 / (v · n2)) v
//! ```
//!
//! Both denominators equal `−|n|²`, so they vanish for parallel rays.  The
//! solver rejects a pair whenever `|n| ≤ tolerance · |v| · |w|`.

use nalgebra::Point3;
use skewray_types::GeometryError;

use crate::ray::Ray;

/// Default smallest accepted sine of the angle between two ray directions.
pub const DEFAULT_PARALLEL_TOLERANCE: f64 = 1e-9;

/// Closed-form closest points between two rays.
///
/// ```rust
/// use nalgebra::Point3;
/// use skewray_geometry::{ray::Ray, skew::SkewLineSolver};
///
/// let g = Ray::through(Point3::new(1.0, 0.0, 0.0), Point3::new(1.0, 1.0, 0.0)).unwrap();
/// let h = Ray::through(Point3::new(0.0, 1.0, 1.0), Point3::new(1.0, 1.0, 1.0)).unwrap();
/// let (on_g, on_h) = SkewLineSolver::new().nearest_points(&g, &h).unwrap();
/// assert!((on_g - Point3::new(1.0, 1.0, 0.0)).norm() < 1e-12);
/// assert!((on_h - Point3::new(1.0, 1.0, 1.0)).norm() < 1e-12);
/// ```
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SkewLineSolver {
    tolerance: f64,
}

impl SkewLineSolver {
    /// Creates a `SkewLineSolver` with default values.
    ///
    /// Same as calling [`Default::default`].
    pub fn new() -> Self {
        Default::default()
    }

    /// Set the parallelism tolerance: the smallest accepted sine of the angle
    /// between the two directions.
    ///
    /// Default is `1e-9`.
    #[must_use]
    pub fn tolerance(self, tolerance: f64) -> Self {
        Self { tolerance }
    }

    /// Returns `(point on ray1 nearest ray2, point on ray2 nearest ray1)`.
    ///
    /// # Errors
    ///
    /// [`GeometryError::ParallelRays`] when the rays are too close to
    /// parallel for the closest points to be well defined.
    pub fn nearest_points(
        &self,
        ray1: &Ray,
        ray2: &Ray,
    ) -> Result<(Point3<f64>, Point3<f64>), GeometryError> {
        let (a, v) = (ray1.origin.coords, ray1.direction.into_inner());
        let (b, w) = (ray2.origin.coords, ray2.direction.into_inner());

        let n = v.cross(&w);
        let cross_norm = n.norm();
        let limit = self.tolerance * v.norm() * w.norm();
        if cross_norm.is_nan() || cross_norm <= limit {
            return Err(GeometryError::ParallelRays {
                cross_norm,
                tolerance: self.tolerance,
            });
        }

        let n1 = v.cross(&n);
        let n2 = w.cross(&n);
        let on_ray2 = b + w * ((a - b).dot(&n1) / w.dot(&n1));
        let on_ray1 = a + v * ((b - a).dot(&n2) / v.dot(&n2));

        Ok((Point3::from(on_ray1), Point3::from(on_ray2)))
    }
}

impl Default for SkewLineSolver {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_PARALLEL_TOLERANCE,
        }
    }
}

/// [`SkewLineSolver::nearest_points`] with the default tolerance.
pub fn nearest_points(
    ray1: &Ray,
    ray2: &Ray,
) -> Result<(Point3<f64>, Point3<f64>), GeometryError> {
    SkewLineSolver::new().nearest_points(ray1, ray2)
}
