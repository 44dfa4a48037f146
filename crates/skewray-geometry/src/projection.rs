//! Forward Projector.
//!
//! The inverse of [`make_ray`][crate::ray::make_ray]: moves a world point
//! into the camera frame, divides by depth, scales by the focal length and
//! undoes the pixel shift / principal-point offset.
//!
//! ```text
//! x = f · X / Z − shift_x + ccx
//! y = f · Y / Z − shift_y + ccy
//! ```
//!
//! Every point on a ray built from pixel `p` projects back onto `p`, which is
//! what [`Reprojection`] uses to grade a triangulated point.

use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use skewray_types::{GeometryError, Intrinsics, Pixel, PixelShift};

use crate::transform::Transform;

/// Points closer to the image plane than this (in camera depth) cannot be
/// projected.
const DEPTH_EPSILON: f64 = 1e-12;

/// Project a world-space `point` into pixel coordinates.
///
/// # Errors
///
/// [`GeometryError::DegenerateRay`] when the intrinsics are unusable or the
/// point lies on the camera's principal plane (zero depth).
pub fn project(
    point: &Point3<f64>,
    world_to_camera: &Transform,
    intrinsics: &Intrinsics,
    shift: PixelShift,
) -> Result<Pixel, GeometryError> {
    if !intrinsics.is_valid() {
        return Err(GeometryError::DegenerateRay(format!(
            "cannot project with focal length {}",
            intrinsics.focal_length
        )));
    }
    let local = world_to_camera.transform_point(point);
    if !local.z.is_finite() || local.z.abs() < DEPTH_EPSILON {
        return Err(GeometryError::DegenerateRay(format!(
            "point {point} has depth {} in camera frame",
            local.z
        )));
    }
    let f = intrinsics.focal_length;
    Ok(Pixel::new(
        f * local.x / local.z - shift.x + intrinsics.principal_x,
        f * local.y / local.z - shift.y + intrinsics.principal_y,
    ))
}

/// Reprojection residual of a point in one camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reprojection {
    pub camera: usize,
    /// Where the point projects.
    pub projected: Pixel,
    /// What the camera observed.
    pub observed: Pixel,
    /// Distance between the two, in pixels.
    pub error: f64,
}

impl Reprojection {
    /// Project `point` into the camera and compare against `observed`.
    pub fn measure(
        camera: usize,
        point: &Point3<f64>,
        world_to_camera: &Transform,
        intrinsics: &Intrinsics,
        shift: PixelShift,
        observed: Pixel,
    ) -> Result<Self, GeometryError> {
        let projected = project(point, world_to_camera, intrinsics, shift)?;
        Ok(Self {
            camera,
            projected,
            observed,
            error: projected.distance(&observed),
        })
    }
}
