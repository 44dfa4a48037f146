//! Ray Constructor.
//!
//! Back-projects a pixel onto the camera's image plane at unit depth,
//!
//! ```text
//! p = ((x + shift_x − ccx) / f, (y + shift_y − ccy) / f, 1)
//! ```
//!
//! moves that point and the optical center into world space with the
//! camera→world transform, and returns the ray between them.

use nalgebra::{Point3, Unit, Vector3};
use skewray_types::{GeometryError, Intrinsics, Pixel, PixelShift};

use crate::transform::Transform;

/// A half-line in world space: an origin and a unit direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Point3<f64>,
    pub direction: Unit<Vector3<f64>>,
}

impl Ray {
    /// Build a ray, normalizing `direction`.
    ///
    /// # Errors
    ///
    /// [`GeometryError::DegenerateRay`] when `direction` has (near) zero
    /// length or any component is not finite.
    pub fn new(origin: Point3<f64>, direction: Vector3<f64>) -> Result<Self, GeometryError> {
        if !origin.iter().chain(direction.iter()).all(|v| v.is_finite()) {
            return Err(GeometryError::DegenerateRay(format!(
                "non-finite ray origin {origin} or direction {direction}"
            )));
        }
        let direction = Unit::try_new(direction, f64::EPSILON).ok_or_else(|| {
            GeometryError::DegenerateRay("direction has zero length".to_string())
        })?;
        Ok(Self { origin, direction })
    }

    /// The ray from `origin` through `target`.
    pub fn through(origin: Point3<f64>, target: Point3<f64>) -> Result<Self, GeometryError> {
        Self::new(origin, target - origin)
    }

    /// The point `distance` units along the ray.
    pub fn at(&self, distance: f64) -> Point3<f64> {
        self.origin + self.direction.into_inner() * distance
    }
}

/// The image-plane point of `pixel` at unit depth, in world coordinates.
///
/// # Errors
///
/// [`GeometryError::DegenerateRay`] when the intrinsics cannot back-project
/// (focal length not strictly positive, non-finite values) or the pixel is
/// not finite.
pub fn image_plane_point(
    pixel: Pixel,
    camera_to_world: &Transform,
    intrinsics: &Intrinsics,
    shift: PixelShift,
) -> Result<Point3<f64>, GeometryError> {
    if !intrinsics.is_valid() {
        return Err(GeometryError::DegenerateRay(format!(
            "unusable intrinsics: focal length {}, principal point ({}, {})",
            intrinsics.focal_length, intrinsics.principal_x, intrinsics.principal_y
        )));
    }
    if !pixel.is_finite() {
        return Err(GeometryError::DegenerateRay(format!(
            "non-finite pixel ({}, {})",
            pixel.x, pixel.y
        )));
    }
    let f = intrinsics.focal_length;
    let local = Point3::new(
        (pixel.x + shift.x - intrinsics.principal_x) / f,
        (pixel.y + shift.y - intrinsics.principal_y) / f,
        1.0,
    );
    Ok(camera_to_world.transform_point(&local))
}

/// The world-space ray from the camera center through `pixel`.
///
/// # Errors
///
/// [`GeometryError::DegenerateRay`] when the intrinsics or the pixel are
/// unusable, or when the image-plane point coincides with the optical center.
pub fn make_ray(
    pixel: Pixel,
    camera_to_world: &Transform,
    intrinsics: &Intrinsics,
    shift: PixelShift,
) -> Result<Ray, GeometryError> {
    let on_plane = image_plane_point(pixel, camera_to_world, intrinsics, shift)?;
    Ray::through(camera_to_world.origin(), on_plane)
}
