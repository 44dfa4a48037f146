//! `skewray-geometry` – the triangulation core.
//!
//! Turns calibrated 2-D observations from several cameras into one 3-D point
//! per label.  Everything here is pure, allocation-light numeric code with no
//! shared state, so callers may run independent (frame, label) units on as
//! many threads as they like.
//!
//! # Modules
//!
//! - [`transform`] – [`Transform`][transform::Transform] and
//!   [`CalibrationChain`][transform::CalibrationChain]: composes the
//!   world→camera transform of every camera in the rig from the pairwise
//!   chain and the per-camera corrections, and inverts it to camera→world.
//! - [`ray`] – [`make_ray`][ray::make_ray]: back-projects a pixel through a
//!   camera's intrinsics and pose into a world-space [`Ray`][ray::Ray].
//! - [`skew`] – [`SkewLineSolver`][skew::SkewLineSolver]: closed-form closest
//!   points between two rays, refusing near-parallel pairs.
//! - [`triangulation`] – [`Triangulator`][triangulation::Triangulator]:
//!   averages the pairwise closest points of N rays into one estimate.
//! - [`projection`] – [`project`][projection::project]: the inverse of the
//!   ray constructor, used to check reconstructions against observations.
//!
//! # Example
//!
//! ```rust
//! use nalgebra::Point3;
//! use skewray_geometry::{ray::Ray, triangulation::Triangulator};
//!
//! let target = Point3::new(0.0, 0.0, 5.0);
//! let rays = [
//!     Ray::through(Point3::new(-1.0, 0.0, 0.0), target).unwrap(),
//!     Ray::through(Point3::new(1.0, 0.0, 0.0), target).unwrap(),
//!     Ray::through(Point3::new(0.0, 1.0, 0.0), target).unwrap(),
//! ];
//! let result = Triangulator::new().triangulate(&rays).unwrap();
//! assert!((result.center - target).norm() < 1e-9);
//! assert_eq!(result.diagnostic_points.len(), 6);
//! ```

pub mod projection;
pub mod ray;
pub mod skew;
pub mod transform;
pub mod triangulation;

pub use projection::{project, Reprojection};
pub use ray::{image_plane_point, make_ray, Ray};
pub use skew::SkewLineSolver;
pub use transform::{CalibrationChain, CameraPose, RigPoses, Transform};
pub use triangulation::{TriangulationResult, Triangulator};
