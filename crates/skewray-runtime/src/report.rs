//! Serializable results of a triangulation run.

use chrono::{DateTime, Utc};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use skewray_geometry::Reprojection;
use skewray_types::GeometryError;
use uuid::Uuid;

/// A contributor or unit that was dropped, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skip {
    /// Label the drop applies to; `None` for frame-wide camera failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Camera the drop applies to; `None` when the whole label was dropped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera: Option<usize>,
    pub error: GeometryError,
}

impl Skip {
    /// A camera removed from the whole frame.
    pub fn camera(camera: usize, error: GeometryError) -> Self {
        Self {
            label: None,
            camera: Some(camera),
            error,
        }
    }

    /// One camera's observation of `label` removed.
    pub fn observation(label: &str, camera: usize, error: GeometryError) -> Self {
        Self {
            label: Some(label.to_string()),
            camera: Some(camera),
            error,
        }
    }

    /// `label` could not be triangulated at all in this frame.
    pub fn label(label: &str, error: GeometryError) -> Self {
        Self {
            label: Some(label.to_string()),
            camera: None,
            error,
        }
    }
}

/// The triangulated position of one label in one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelPoint {
    pub label: String,
    /// Cameras whose rays contributed, ascending.
    pub cameras: Vec<usize>,
    pub center: [f64; 3],
    /// Pairwise closest points, two per usable camera pair.  Empty when
    /// diagnostics are disabled.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<[f64; 3]>,
    /// Camera pairs rejected as parallel.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parallel_pairs: Vec<(usize, usize)>,
    /// Per-camera residuals of the center.  Empty when reprojection is
    /// disabled.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reprojection: Vec<Reprojection>,
}

impl LabelPoint {
    pub fn center_point(&self) -> Point3<f64> {
        Point3::from(self.center)
    }

    /// Mean reprojection error in pixels, when any residual was measured.
    pub fn mean_reprojection_error(&self) -> Option<f64> {
        if self.reprojection.is_empty() {
            return None;
        }
        let total: f64 = self.reprojection.iter().map(|r| r.error).sum();
        Some(total / self.reprojection.len() as f64)
    }
}

/// Everything produced for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    pub frame: u64,
    pub points: Vec<LabelPoint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skips: Vec<Skip>,
}

impl FrameReport {
    pub fn point(&self, label: &str) -> Option<&LabelPoint> {
        self.points.iter().find(|p| p.label == label)
    }
}

/// The outcome of one batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// `true` when the run stopped early on a cancellation request.
    pub cancelled: bool,
    /// One report per processed frame, in input order.
    pub frames: Vec<FrameReport>,
}

impl BatchReport {
    /// Start a report stamped with a fresh run id and the current time.
    pub fn begin() -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            started_at: now,
            finished_at: now,
            cancelled: false,
            frames: Vec::new(),
        }
    }

    /// Close the report.
    pub fn finish(mut self, frames: Vec<FrameReport>, cancelled: bool) -> Self {
        self.frames = frames;
        self.cancelled = cancelled;
        self.finished_at = Utc::now();
        self
    }

    pub fn point_count(&self) -> usize {
        self.frames.iter().map(|f| f.points.len()).sum()
    }

    pub fn skip_count(&self) -> usize {
        self.frames.iter().map(|f| f.skips.len()).sum()
    }

    pub fn frame(&self, frame: u64) -> Option<&FrameReport> {
        self.frames.iter().find(|f| f.frame == frame)
    }
}
