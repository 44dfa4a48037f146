//! Multi-Ray Triangulator.
//!
//! Every unordered pair of rays contributes its two closest points; the
//! estimate is the plain mean of all contributed points.  This is not a
//! least-squares minimizer: nearly parallel pairs weigh as much as
//! well-conditioned ones and bias the center toward their (less reliable)
//! closest points.  Pairs below the solver tolerance are dropped entirely.

use nalgebra::{Point3, Vector3};
use skewray_types::GeometryError;
use tracing::debug;

use crate::ray::Ray;
use crate::skew::SkewLineSolver;

/// Outcome of triangulating one set of rays.
#[derive(Debug, Clone, PartialEq)]
pub struct TriangulationResult {
    /// Mean of all diagnostic points.
    pub center: Point3<f64>,
    /// For every usable pair `(i, j)`, `i < j`, in lexicographic order: the
    /// point on ray `i` nearest ray `j`, then the point on ray `j` nearest
    /// ray `i`.
    pub diagnostic_points: Vec<Point3<f64>>,
    /// Pairs rejected as parallel.
    pub skipped_pairs: Vec<(usize, usize)>,
}

impl TriangulationResult {
    /// Number of ray pairs that contributed to the center.
    pub fn usable_pairs(&self) -> usize {
        self.diagnostic_points.len() / 2
    }
}

/// Pairwise-closest-point triangulator.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Triangulator {
    solver: SkewLineSolver,
}

impl Triangulator {
    /// Creates a `Triangulator` with the default solver.
    pub fn new() -> Self {
        Default::default()
    }

    /// Use `solver` for every pair.
    #[must_use]
    pub fn with_solver(solver: SkewLineSolver) -> Self {
        Self { solver }
    }

    pub fn solver(&self) -> &SkewLineSolver {
        &self.solver
    }

    /// Triangulate `rays` into one point.
    ///
    /// # Errors
    ///
    /// [`GeometryError::InsufficientGeometry`] when fewer than two rays are
    /// given or every pair is parallel.
    pub fn triangulate(&self, rays: &[Ray]) -> Result<TriangulationResult, GeometryError> {
        if rays.len() < 2 {
            return Err(GeometryError::InsufficientGeometry {
                rays: rays.len(),
                usable_pairs: 0,
            });
        }

        let pair_count = rays.len() * (rays.len() - 1) / 2;
        let mut diagnostic_points = Vec::with_capacity(2 * pair_count);
        let mut skipped_pairs = Vec::new();

        for i in 0..rays.len() {
            for j in (i + 1)..rays.len() {
                match self.solver.nearest_points(&rays[i], &rays[j]) {
                    Ok((on_i, on_j)) => {
                        diagnostic_points.push(on_i);
                        diagnostic_points.push(on_j);
                    }
                    Err(e) => {
                        debug!(i, j, error = %e, "skipping ray pair");
                        skipped_pairs.push((i, j));
                    }
                }
            }
        }

        if diagnostic_points.is_empty() {
            return Err(GeometryError::InsufficientGeometry {
                rays: rays.len(),
                usable_pairs: 0,
            });
        }

        let sum = diagnostic_points
            .iter()
            .fold(Vector3::zeros(), |acc, p| acc + p.coords);
        let center = Point3::from(sum / diagnostic_points.len() as f64);

        Ok(TriangulationResult {
            center,
            diagnostic_points,
            skipped_pairs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn seed_rays() -> (Ray, Ray) {
        let g = Ray::through(Point3::new(0.0, 0.0, 3.0), Point3::new(3.0, 2.0, -1.0)).unwrap();
        let h = Ray::through(Point3::new(-3.0, 0.0, 0.0), Point3::new(4.0, 3.0, 1.0)).unwrap();
        (g, h)
    }

    #[test]
    fn two_rays_give_midpoint_of_nearest_points() {
        let (g, h) = seed_rays();
        let result = Triangulator::new().triangulate(&[g, h]).unwrap();
        let on_g = Point3::new(1.850253807, 1.233502538, 0.5329949239);
        let on_h = Point3::new(1.530456853, 1.941624365, 0.6472081218);
        assert_relative_eq!(result.center, nalgebra::center(&on_g, &on_h), epsilon = 1e-7);
        assert_eq!(result.diagnostic_points.len(), 2);
        assert_eq!(result.usable_pairs(), 1);
        assert!(result.skipped_pairs.is_empty());
    }

    #[test]
    fn diagnostic_points_cover_every_pair() {
        let target = Point3::new(0.5, -0.25, 6.0);
        let rays: Vec<Ray> = [
            Point3::new(-1.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, -1.0, 0.5),
        ]
        .into_iter()
        .map(|o| Ray::through(o, target).unwrap())
        .collect();

        let result = Triangulator::new().triangulate(&rays).unwrap();
        // 2 · C(4, 2)
        assert_eq!(result.diagnostic_points.len(), 12);
        assert_relative_eq!(result.center, target, epsilon = 1e-9);
    }

    #[test]
    fn single_ray_is_insufficient() {
        let (g, _) = seed_rays();
        let err = Triangulator::new().triangulate(&[g]).unwrap_err();
        assert_eq!(
            err,
            GeometryError::InsufficientGeometry {
                rays: 1,
                usable_pairs: 0
            }
        );
    }

    #[test]
    fn no_rays_is_insufficient() {
        assert!(matches!(
            Triangulator::new().triangulate(&[]),
            Err(GeometryError::InsufficientGeometry { rays: 0, .. })
        ));
    }

    #[test]
    fn all_parallel_pairs_is_insufficient() {
        let d = Vector3::new(0.0, 0.0, 1.0);
        let rays = [
            Ray::new(Point3::new(0.0, 0.0, 0.0), d).unwrap(),
            Ray::new(Point3::new(1.0, 0.0, 0.0), d).unwrap(),
            Ray::new(Point3::new(0.0, 1.0, 0.0), d).unwrap(),
        ];
        assert!(matches!(
            Triangulator::new().triangulate(&rays),
            Err(GeometryError::InsufficientGeometry {
                rays: 3,
                usable_pairs: 0
            })
        ));
    }

    #[test]
    fn parallel_pair_is_excluded_from_the_mean() {
        let target = Point3::new(0.0, 0.0, 4.0);
        let a = Ray::through(Point3::new(-1.0, 0.0, 0.0), target).unwrap();
        // b is a copy of a's direction, shifted sideways: parallel to a
        let b = Ray::new(Point3::new(-1.0, 2.0, 0.0), a.direction.into_inner()).unwrap();
        let c = Ray::through(Point3::new(1.0, 0.0, 0.0), target).unwrap();

        let result = Triangulator::new().triangulate(&[a, b, c]).unwrap();
        assert_eq!(result.skipped_pairs, vec![(0, 1)]);
        assert_eq!(result.diagnostic_points.len(), 4);
        // (0, 2) meets at target; (1, 2) meets somewhere else, so the mean
        // moves off target but stays finite
        assert!(result.center.coords.iter().all(|v| v.is_finite()));
        assert_relative_eq!(result.diagnostic_points[0], target, epsilon = 1e-9);
        assert_relative_eq!(result.diagnostic_points[1], target, epsilon = 1e-9);
    }

    #[test]
    fn custom_solver_tolerance_is_used() {
        let g = Ray::new(Point3::origin(), Vector3::x()).unwrap();
        let h = Ray::new(Point3::new(0.0, 1.0, 0.0), Vector3::new(1.0, 1e-6, 0.0)).unwrap();
        let strict = Triangulator::with_solver(SkewLineSolver::new().tolerance(1e-3));
        assert!(strict.triangulate(&[g, h]).is_err());
        assert!(Triangulator::new().triangulate(&[g, h]).is_ok());
    }
}
