//! [`Pipeline`] – per-frame triangulation.
//!
//! For each frame:
//!
//! 1. **Compose** – build the [`RigPoses`] arena from the calibration chain.
//!    Cameras that fail are reported once as frame-wide [`Skip`]s.
//! 2. **Back-project** – for every label, turn each observing camera's pixel
//!    into a world ray.  Observations without a pose, without intrinsics, or
//!    producing a degenerate ray are dropped individually.
//! 3. **Triangulate** – labels with at least two rays go through the
//!    [`Triangulator`]; anything less is reported as an
//!    [`GeometryError::InsufficientGeometry`] skip.
//! 4. **Check** – optionally reproject the center into every contributing
//!    camera, then move the outputs through the optional output transform.
//!
//! Labels are processed in sorted order.  Nothing in a frame can abort the
//! batch.
//!
//! # Example
//!
//! ```rust
//! use skewray_geometry::{CalibrationChain, Transform};
//! use skewray_runtime::pipeline::{FrameInput, Pipeline, PipelineConfig};
//!
//! let chain = CalibrationChain::new(vec![Transform::identity(); 7], vec![Transform::identity(); 4]);
//! let pipeline = Pipeline::new(chain, PipelineConfig::default());
//!
//! // a frame with no observations produces no points and no skips
//! let report = pipeline.process_frame(&FrameInput::new(0));
//! assert!(report.points.is_empty());
//! assert!(report.skips.is_empty());
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use skewray_geometry::skew::DEFAULT_PARALLEL_TOLERANCE;
use skewray_geometry::{
    make_ray, CalibrationChain, CameraPose, Ray, Reprojection, RigPoses, SkewLineSolver,
    Transform, Triangulator,
};
use skewray_types::{GeometryError, Intrinsics, ObservationSet, Pixel, RigConfig};
use tracing::{debug, info, info_span};

use crate::report::{FrameReport, LabelPoint, Skip};

// ─────────────────────────────────────────────────────────────────────────────
// Input
// ─────────────────────────────────────────────────────────────────────────────

/// Everything the pipeline needs about one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameInput {
    pub frame: u64,
    /// Intrinsics of each camera for this frame.
    #[serde(default)]
    pub intrinsics: BTreeMap<usize, Intrinsics>,
    /// Observations grouped by label.
    #[serde(default)]
    pub observations: BTreeMap<String, ObservationSet>,
}

impl FrameInput {
    pub fn new(frame: u64) -> Self {
        Self {
            frame,
            ..Default::default()
        }
    }

    /// Set the intrinsics of `camera`.
    pub fn with_intrinsics(mut self, camera: usize, intrinsics: Intrinsics) -> Self {
        self.intrinsics.insert(camera, intrinsics);
        self
    }

    /// Record `camera`'s observation of `label`.
    pub fn observe(&mut self, label: &str, camera: usize, pixel: Pixel) {
        self.observations
            .entry(label.to_string())
            .or_default()
            .insert(camera, pixel);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration bundle for [`Pipeline`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    pub rig: RigConfig,
    /// Parallelism tolerance of the skew-line solver.
    pub parallel_tolerance: f64,
    /// Keep the pairwise closest points next to each center.
    pub include_diagnostics: bool,
    /// Measure the reprojection residual of each center.
    pub reproject: bool,
    /// Rigid transform applied to every emitted point.
    pub output_transform: Option<Transform>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rig: RigConfig::default(),
            parallel_tolerance: DEFAULT_PARALLEL_TOLERANCE,
            include_diagnostics: true,
            reproject: true,
            output_transform: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pipeline
// ─────────────────────────────────────────────────────────────────────────────

/// One camera's usable contribution to a label.
struct Contributor<'a> {
    camera: usize,
    pose: &'a CameraPose,
    intrinsics: &'a Intrinsics,
    pixel: Pixel,
    ray: Ray,
}

/// Frame-by-frame triangulation over an immutable calibration chain.
///
/// `Pipeline` holds no mutable state; share it by reference (or `Arc`)
/// across threads.
#[derive(Debug, Clone)]
pub struct Pipeline {
    chain: CalibrationChain,
    config: PipelineConfig,
    triangulator: Triangulator,
}

impl Pipeline {
    pub fn new(chain: CalibrationChain, config: PipelineConfig) -> Self {
        let solver = SkewLineSolver::new().tolerance(config.parallel_tolerance);
        Self {
            chain,
            config,
            triangulator: Triangulator::with_solver(solver),
        }
    }

    pub fn chain(&self) -> &CalibrationChain {
        &self.chain
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Triangulate every label of `input`.
    pub fn process_frame(&self, input: &FrameInput) -> FrameReport {
        let span = info_span!("frame", frame = input.frame);
        let _enter = span.enter();

        let poses = RigPoses::compose(&self.chain, self.config.rig.cameras);
        let mut skips: Vec<Skip> = poses
            .failures()
            .map(|(camera, e)| Skip::camera(camera, e.clone()))
            .collect();
        // One skip covers every camera past the end of the chain.
        let missing = poses.uncalibrated();
        if !missing.is_empty() {
            skips.push(Skip::camera(missing.start, poses.missing_calibration(missing.start)));
        }

        let mut points = Vec::with_capacity(input.observations.len());
        for (label, observations) in &input.observations {
            match self.triangulate_label(&poses, input, label, observations, &mut skips) {
                Ok(point) => points.push(point),
                Err(e) => {
                    info!(frame = input.frame, label = %label, error = %e, "skipping label");
                    skips.push(Skip::label(label, e));
                }
            }
        }

        debug!(points = points.len(), skips = skips.len(), "frame done");
        FrameReport {
            frame: input.frame,
            points,
            skips,
        }
    }

    /// Triangulate one label from its observation set.
    ///
    /// Individual drops are appended to `skips`; the returned error means
    /// the label produced no point.
    pub fn triangulate_label(
        &self,
        poses: &RigPoses,
        input: &FrameInput,
        label: &str,
        observations: &ObservationSet,
        skips: &mut Vec<Skip>,
    ) -> Result<LabelPoint, GeometryError> {
        let span = info_span!("label", label = %label);
        let _enter = span.enter();

        let shift = self.config.rig.pixel_shift;
        let mut contributors = Vec::with_capacity(observations.len());

        for (&camera, &pixel) in observations {
            let pose = match poses.get(camera) {
                Ok(pose) => pose,
                Err(e) => {
                    // Cameras inside the rig were already reported frame-wide.
                    if camera >= poses.len() {
                        skips.push(Skip::observation(label, camera, e));
                    } else {
                        debug!(camera, "camera unavailable in this frame");
                    }
                    continue;
                }
            };
            let Some(intrinsics) = input.intrinsics.get(&camera) else {
                skips.push(Skip::observation(
                    label,
                    camera,
                    GeometryError::Calibration {
                        camera,
                        details: "no intrinsics for this frame".to_string(),
                    },
                ));
                continue;
            };
            match make_ray(pixel, &pose.camera_to_world, intrinsics, shift) {
                Ok(ray) => contributors.push(Contributor {
                    camera,
                    pose,
                    intrinsics,
                    pixel,
                    ray,
                }),
                Err(e) => {
                    debug!(camera, error = %e, "dropping observation");
                    skips.push(Skip::observation(label, camera, e));
                }
            }
        }

        let rays: Vec<Ray> = contributors.iter().map(|c| c.ray).collect();
        let result = self.triangulator.triangulate(&rays)?;

        let reprojection = if self.config.reproject {
            contributors
                .iter()
                .filter_map(|c| {
                    Reprojection::measure(
                        c.camera,
                        &result.center,
                        &c.pose.world_to_camera,
                        c.intrinsics,
                        shift,
                        c.pixel,
                    )
                    .inspect_err(|e| debug!(camera = c.camera, error = %e, "no reprojection"))
                    .ok()
                })
                .collect()
        } else {
            Vec::new()
        };

        let emit = |p: &nalgebra::Point3<f64>| {
            let p = match &self.config.output_transform {
                Some(t) => t.transform_point(p),
                None => *p,
            };
            [p.x, p.y, p.z]
        };

        let diagnostics = if self.config.include_diagnostics {
            result.diagnostic_points.iter().map(&emit).collect()
        } else {
            Vec::new()
        };

        Ok(LabelPoint {
            label: label.to_string(),
            cameras: contributors.iter().map(|c| c.camera).collect(),
            center: emit(&result.center),
            diagnostics,
            parallel_pairs: result
                .skipped_pairs
                .iter()
                .map(|&(i, j)| (contributors[i].camera, contributors[j].camera))
                .collect(),
            reprojection,
        })
    }
}
