//! Camera Transform Composer.
//!
//! A multi-camera rig is calibrated as a chain of pairwise relative
//! transforms (`camchain`) plus one corrective transform per camera.  Each
//! camera owns two consecutive links of the chain, so the world→camera
//! transform of camera `c` is
//!
//! ```text
//! T_c = R[c] · chain[2c] · chain[2c-1] · … · chain[1] · chain[0]
//! ```
//!
//! Links closer to the target camera are applied last (on the left).  The
//! camera→world transform is the matrix inverse of `T_c`.
//!
//! # Example
//!
//! ```rust
//! use skewray_geometry::transform::{CalibrationChain, Transform};
//!
//! let shift = Transform::from_translation(1.0, 0.0, 0.0);
//! let chain = CalibrationChain::new(
//!     vec![Transform::identity(), shift, shift],
//!     vec![Transform::identity(), Transform::identity()],
//! );
//!
//! // camera 1 = R[1] · chain[2] · chain[1] · chain[0]
//! let w2c = chain.world_to_camera(1).unwrap();
//! assert!((w2c.matrix()[(0, 3)] - 2.0).abs() < 1e-12);
//! ```

use std::ops::Range;

use nalgebra::{Matrix4, Point3, Rotation3, Translation3, Vector3};
use serde::{Deserialize, Serialize};
use skewray_types::GeometryError;
use tracing::warn;

/// Determinants below this magnitude are treated as singular.
const SINGULAR_EPSILON: f64 = 1e-12;

// ────────────────────────────────────────────────────────────────────────────
// Transform
// ────────────────────────────────────────────────────────────────────────────

/// A 4×4 homogeneous transform.
///
/// Serialized as four rows of four numbers (row-major).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[[f64; 4]; 4]", into = "[[f64; 4]; 4]")]
pub struct Transform(Matrix4<f64>);

impl Transform {
    /// The identity transform.
    pub fn identity() -> Self {
        Self(Matrix4::identity())
    }

    /// Build from a raw homogeneous matrix.
    pub fn from_matrix(matrix: Matrix4<f64>) -> Self {
        Self(matrix)
    }

    /// Build from four rows.
    pub fn from_rows(rows: [[f64; 4]; 4]) -> Self {
        Self(Matrix4::from_fn(|r, c| rows[r][c]))
    }

    /// Pure translation.
    pub fn from_translation(x: f64, y: f64, z: f64) -> Self {
        Self(Translation3::new(x, y, z).to_homogeneous())
    }

    /// Rigid transform from Euler angles in degrees about X, Y and Z, followed
    /// by a translation.  The rotation is `Rz · Rx · Ry`.
    pub fn from_euler_degrees(rotation_deg: [f64; 3], translation: [f64; 3]) -> Self {
        let [ax, by, gz] = rotation_deg.map(f64::to_radians);
        let rx = Rotation3::from_axis_angle(&Vector3::x_axis(), ax);
        let ry = Rotation3::from_axis_angle(&Vector3::y_axis(), by);
        let rz = Rotation3::from_axis_angle(&Vector3::z_axis(), gz);
        let rotation = rz * rx * ry;
        let [tx, ty, tz] = translation;
        Self(Translation3::new(tx, ty, tz).to_homogeneous() * rotation.to_homogeneous())
    }

    /// The underlying matrix.
    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.0
    }

    /// Matrix product `self · other`: `other` is applied first, then `self`.
    pub fn compose(&self, other: &Self) -> Self {
        Self(self.0 * other.0)
    }

    /// Returns `true` when every entry is finite.
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }

    /// Matrix inverse, or `None` when the matrix is singular or not finite.
    pub fn try_inverse(&self) -> Option<Self> {
        if !self.is_finite() {
            return None;
        }
        let det = self.0.determinant();
        if !det.is_finite() || det.abs() < SINGULAR_EPSILON {
            return None;
        }
        self.0
            .try_inverse()
            .map(Self)
            .filter(|inv| inv.is_finite())
    }

    /// Apply to a point: homogenize with `w = 1`, multiply, keep `x, y, z`.
    pub fn transform_point(&self, point: &Point3<f64>) -> Point3<f64> {
        Point3::from((self.0 * point.to_homogeneous()).xyz())
    }

    /// Where the local origin `(0, 0, 0, 1)` lands.
    pub fn origin(&self) -> Point3<f64> {
        self.transform_point(&Point3::origin())
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl From<[[f64; 4]; 4]> for Transform {
    fn from(rows: [[f64; 4]; 4]) -> Self {
        Self::from_rows(rows)
    }
}

impl From<Transform> for [[f64; 4]; 4] {
    fn from(t: Transform) -> Self {
        std::array::from_fn(|r| std::array::from_fn(|c| t.0[(r, c)]))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// CalibrationChain
// ────────────────────────────────────────────────────────────────────────────

/// The rig calibration: pairwise chain links plus one correction per camera.
///
/// Loaded once per run and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CalibrationChain {
    /// Pairwise relative transforms, two per camera.
    #[serde(rename = "camchain")]
    pub links: Vec<Transform>,
    /// Per-camera corrective transforms (`R`).
    pub corrections: Vec<Transform>,
}

impl CalibrationChain {
    pub fn new(links: Vec<Transform>, corrections: Vec<Transform>) -> Self {
        Self { links, corrections }
    }

    /// Number of cameras this chain can produce a transform for.
    pub fn camera_capacity(&self) -> usize {
        self.corrections.len().min(self.links.len().div_ceil(2))
    }

    /// Compose the world→camera transform for `camera`.
    ///
    /// # Errors
    ///
    /// [`GeometryError::Calibration`] when the chain has fewer than
    /// `2 * camera + 1` links or no correction for `camera`.
    pub fn world_to_camera(&self, camera: usize) -> Result<Transform, GeometryError> {
        let needed = 2 * camera + 1;
        if self.links.len() < needed {
            return Err(GeometryError::Calibration {
                camera,
                details: format!(
                    "chain has {} link(s), {needed} required",
                    self.links.len()
                ),
            });
        }
        let correction = self
            .corrections
            .get(camera)
            .ok_or_else(|| GeometryError::Calibration {
                camera,
                details: format!("no correction transform ({} available)", self.corrections.len()),
            })?;

        let chained = self.links[..needed]
            .iter()
            .fold(Transform::identity(), |acc, link| link.compose(&acc));
        Ok(correction.compose(&chained))
    }

    /// Compose and invert the transforms of `camera`.
    pub fn camera_pose(&self, camera: usize) -> Result<CameraPose, GeometryError> {
        CameraPose::from_world_to_camera(camera, self.world_to_camera(camera)?)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// CameraPose
// ────────────────────────────────────────────────────────────────────────────

/// Both directions of one camera's extrinsic transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub camera: usize,
    pub world_to_camera: Transform,
    pub camera_to_world: Transform,
}

impl CameraPose {
    /// Pair `world_to_camera` with its inverse.
    ///
    /// # Errors
    ///
    /// [`GeometryError::Calibration`] when the matrix is singular.
    pub fn from_world_to_camera(
        camera: usize,
        world_to_camera: Transform,
    ) -> Result<Self, GeometryError> {
        let camera_to_world =
            world_to_camera
                .try_inverse()
                .ok_or_else(|| GeometryError::Calibration {
                    camera,
                    details: "world-to-camera transform is singular".to_string(),
                })?;
        Ok(Self {
            camera,
            world_to_camera,
            camera_to_world,
        })
    }

    /// Optical center in world coordinates.
    pub fn center(&self) -> Point3<f64> {
        self.camera_to_world.origin()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// RigPoses
// ────────────────────────────────────────────────────────────────────────────

/// Per-frame arena of camera poses, indexed by camera.
///
/// Cameras whose calibration fails keep their error in place so every label
/// of the frame sees the same outcome.  Only cameras the chain can serve are
/// composed; the rest of the rig is tracked as one [`uncalibrated`] range.
/// The arena is read-only once built.
///
/// [`uncalibrated`]: RigPoses::uncalibrated
#[derive(Debug, Clone)]
pub struct RigPoses {
    cameras: usize,
    poses: Vec<Result<CameraPose, GeometryError>>,
}

impl RigPoses {
    /// Compose the poses of cameras `0..cameras`.
    pub fn compose(chain: &CalibrationChain, cameras: usize) -> Self {
        let composed = cameras.min(chain.camera_capacity());
        let poses = (0..composed)
            .map(|camera| {
                chain.camera_pose(camera).inspect_err(|e| {
                    warn!(camera, error = %e, "dropping camera for this frame");
                })
            })
            .collect();
        if composed < cameras {
            warn!(first = composed, cameras, "calibration chain is shorter than the rig");
        }
        Self { cameras, poses }
    }

    /// Number of cameras in the rig.
    pub fn len(&self) -> usize {
        self.cameras
    }

    pub fn is_empty(&self) -> bool {
        self.cameras == 0
    }

    /// Pose of `camera`, or the error that removed it from the frame.
    pub fn get(&self, camera: usize) -> Result<&CameraPose, GeometryError> {
        match self.poses.get(camera) {
            Some(Ok(pose)) => Ok(pose),
            Some(Err(e)) => Err(e.clone()),
            None if camera < self.cameras => Err(self.missing_calibration(camera)),
            None => Err(GeometryError::Calibration {
                camera,
                details: format!("camera outside rig of {} stream(s)", self.cameras),
            }),
        }
    }

    /// Cameras that failed to compose, with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (usize, &GeometryError)> {
        self.poses
            .iter()
            .enumerate()
            .filter_map(|(camera, p)| p.as_ref().err().map(|e| (camera, e)))
    }

    /// Cameras of the rig past the end of the calibration chain.
    pub fn uncalibrated(&self) -> Range<usize> {
        self.poses.len()..self.cameras
    }

    /// The error reported for a camera in [`RigPoses::uncalibrated`].
    pub fn missing_calibration(&self, camera: usize) -> GeometryError {
        GeometryError::Calibration {
            camera,
            details: format!(
                "calibration chain covers {} of {} camera(s)",
                self.poses.len(),
                self.cameras
            ),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
