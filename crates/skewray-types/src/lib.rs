//! Shared data model for the skewray workspace.
//!
//! Everything that crosses a crate boundary lives here: per-camera
//! [`Intrinsics`], 2-D [`Pixel`] observations grouped into an
//! [`ObservationSet`], the rig-wide [`PixelShift`]
//! and [`RigConfig`], and the [`GeometryError`] every core operation reports.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pinhole intrinsics of one camera for one frame.
///
/// Serialized positionally as `[focal_length, baseline, principal_x,
/// principal_y]`, the row layout of the per-frame parameter files.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct Intrinsics {
    /// Focal length in pixels.
    pub focal_length: f64,
    /// Stereo baseline.  Carried for layout compatibility; the ray math
    /// never reads it.
    pub baseline: f64,
    /// Principal point X (pixels).
    pub principal_x: f64,
    /// Principal point Y (pixels).
    pub principal_y: f64,
}

impl Intrinsics {
    pub fn new(focal_length: f64, baseline: f64, principal_x: f64, principal_y: f64) -> Self {
        Self {
            focal_length,
            baseline,
            principal_x,
            principal_y,
        }
    }

    /// Returns `true` when the focal length is usable for back-projection.
    pub fn is_valid(&self) -> bool {
        self.focal_length.is_finite()
            && self.focal_length > 0.0
            && self.principal_x.is_finite()
            && self.principal_y.is_finite()
    }
}

impl From<[f64; 4]> for Intrinsics {
    fn from(row: [f64; 4]) -> Self {
        Self::new(row[0], row[1], row[2], row[3])
    }
}

impl From<Intrinsics> for [f64; 4] {
    fn from(i: Intrinsics) -> Self {
        [i.focal_length, i.baseline, i.principal_x, i.principal_y]
    }
}

/// A 2-D observation in pixel space, serialized as `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Pixel {
    pub x: f64,
    pub y: f64,
}

impl Pixel {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Euclidean distance to `other` in pixels.
    pub fn distance(&self, other: &Pixel) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl From<[f64; 2]> for Pixel {
    fn from(p: [f64; 2]) -> Self {
        Self::new(p[0], p[1])
    }
}

impl From<Pixel> for [f64; 2] {
    fn from(p: Pixel) -> Self {
        [p.x, p.y]
    }
}

/// Every camera's observation of one label in one frame, keyed by camera
/// index.
pub type ObservationSet = BTreeMap<usize, Pixel>;

/// Fixed pixel offset of the rig's sensors relative to the calibrated image
/// origin.  Added before back-projection and removed after projection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelShift {
    pub x: f64,
    pub y: f64,
}

impl PixelShift {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// No offset.
    pub fn zero() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl Default for PixelShift {
    /// The offset measured on the four-stream capture rig.
    fn default() -> Self {
        Self::new(22.0, -8.0)
    }
}

/// Rig-wide constants handed to the composer and the ray constructor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RigConfig {
    /// Number of camera streams; valid camera indices are `0..cameras`.
    pub cameras: usize,
    /// Sensor pixel offset.
    pub pixel_shift: PixelShift,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            cameras: 4,
            pixel_shift: PixelShift::default(),
        }
    }
}

/// Failure kinds of the triangulation core.
///
/// Camera-, ray- and pair-level errors drop only that contributor;
/// [`GeometryError::InsufficientGeometry`] drops the whole (frame, label)
/// unit.  None of them abort a batch.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GeometryError {
    #[error("Calibration Error on camera {camera}: {details}")]
    Calibration { camera: usize, details: String },

    #[error("Degenerate Ray: {0}")]
    DegenerateRay(String),

    #[error("Parallel Rays: |v x w| = {cross_norm:e} is below tolerance {tolerance:e}")]
    ParallelRays { cross_norm: f64, tolerance: f64 },

    #[error("Insufficient Geometry: {rays} ray(s) with {usable_pairs} usable pair(s)")]
    InsufficientGeometry { rays: usize, usable_pairs: usize },
}

impl GeometryError {
    /// Short machine-friendly name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            GeometryError::Calibration { .. } => "calibration",
            GeometryError::DegenerateRay(_) => "degenerate_ray",
            GeometryError::ParallelRays { .. } => "parallel_rays",
            GeometryError::InsufficientGeometry { .. } => "insufficient_geometry",
        }
    }
}
