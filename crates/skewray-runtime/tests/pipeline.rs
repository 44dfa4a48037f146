//! End-to-end triangulation over a synthetic four-camera rig.

use std::num::NonZeroUsize;
use std::sync::{Arc, atomic::AtomicBool};

use approx::assert_relative_eq;
use nalgebra::{Isometry3, Matrix4, Point3, Vector3};
use skewray_geometry::{CalibrationChain, Transform, project};
use skewray_runtime::{FrameInput, Pipeline, PipelineConfig, run, run_concurrent};
use skewray_types::{GeometryError, Intrinsics, PixelShift};

// ─────────────────────────────────────────────────────────────────────────────
// Fixtures
// ─────────────────────────────────────────────────────────────────────────────

const EYES: [[f64; 3]; 4] = [
    [3.0, 0.5, -5.0],
    [-3.0, 0.0, -5.0],
    [0.0, 3.0, -4.0],
    [0.5, -3.0, -6.0],
];

fn world_to_camera(camera: usize) -> Transform {
    let eye = Point3::from(EYES[camera]);
    let c2w = Isometry3::face_towards(&eye, &Point3::origin(), &Vector3::y());
    Transform::from_matrix(c2w.inverse().to_homogeneous())
}

fn intrinsics(camera: usize) -> Intrinsics {
    Intrinsics::new(600.0 + 20.0 * camera as f64, 0.12, 320.0, 240.0)
}

/// Every link is the identity, so each correction is the camera's pose.
fn identity_chain() -> CalibrationChain {
    CalibrationChain::new(
        vec![Transform::identity(); 7],
        (0..4).map(world_to_camera).collect(),
    )
}

/// Non-trivial links; corrections compensate so the composed poses match
/// [`world_to_camera`].
fn linked_chain() -> CalibrationChain {
    let links: Vec<Transform> = (0..7)
        .map(|i| {
            let i = i as f64;
            Transform::from_euler_degrees([5.0 * i, -3.0 * i, 2.0 + i], [0.1 * i, -0.2, 0.05 * i])
        })
        .collect();
    let mut corrections = Vec::new();
    let mut product = Transform::identity();
    let mut applied = 0;
    for camera in 0..4 {
        for link in &links[applied..=camera * 2] {
            product = link.compose(&product);
        }
        applied = camera * 2 + 1;
        let inverse = product.try_inverse().expect("links are rigid");
        corrections.push(world_to_camera(camera).compose(&inverse));
    }
    CalibrationChain::new(links, corrections)
}

fn frame(n: u64, labels: &[(&str, Point3<f64>)], cameras: &[usize]) -> FrameInput {
    let shift = PixelShift::default();
    let mut input = FrameInput::new(n);
    for &camera in cameras {
        input = input.with_intrinsics(camera, intrinsics(camera));
    }
    for (label, point) in labels {
        for &camera in cameras {
            let pixel = project(point, &world_to_camera(camera), &intrinsics(camera), shift)
                .expect("point in front of camera");
            input.observe(label, camera, pixel);
        }
    }
    input
}

fn targets() -> Vec<(&'static str, Point3<f64>)> {
    vec![
        ("head", Point3::new(0.1, 0.4, 0.2)),
        ("tail", Point3::new(-0.3, -0.1, 0.5)),
        ("paw", Point3::new(0.25, -0.35, -0.1)),
    ]
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn four_cameras_recover_every_label() {
    let pipeline = Pipeline::new(identity_chain(), PipelineConfig::default());
    let report = pipeline.process_frame(&frame(0, &targets(), &[0, 1, 2, 3]));

    assert!(report.skips.is_empty(), "{:?}", report.skips);
    assert_eq!(report.points.len(), 3);
    // labels come out sorted
    let labels: Vec<&str> = report.points.iter().map(|p| p.label.as_str()).collect();
    assert_eq!(labels, vec!["head", "paw", "tail"]);

    for (label, truth) in targets() {
        let point = report.point(label).unwrap();
        assert_eq!(point.cameras, vec![0, 1, 2, 3]);
        assert_eq!(point.diagnostics.len(), 12);
        assert_relative_eq!(point.center_point(), truth, epsilon = 1e-8);
        assert_eq!(point.reprojection.len(), 4);
        assert!(point.mean_reprojection_error().unwrap() < 1e-6);
    }
}

#[test]
fn chained_links_compose_to_the_same_rig() {
    let chain = linked_chain();
    for camera in 0..4 {
        let composed = chain.world_to_camera(camera).unwrap();
        assert_relative_eq!(
            *composed.matrix(),
            *world_to_camera(camera).matrix(),
            epsilon = 1e-9
        );
    }

    let pipeline = Pipeline::new(chain, PipelineConfig::default());
    let report = pipeline.process_frame(&frame(3, &targets(), &[0, 1, 2, 3]));
    for (label, truth) in targets() {
        assert_relative_eq!(report.point(label).unwrap().center_point(), truth, epsilon = 1e-7);
    }
}

#[test]
fn two_cameras_are_enough() {
    let pipeline = Pipeline::new(identity_chain(), PipelineConfig::default());
    let report = pipeline.process_frame(&frame(1, &targets(), &[1, 3]));
    for (label, truth) in targets() {
        let point = report.point(label).unwrap();
        assert_eq!(point.cameras, vec![1, 3]);
        assert_eq!(point.diagnostics.len(), 2);
        assert_relative_eq!(point.center_point(), truth, epsilon = 1e-8);
    }
}

#[test]
fn singular_camera_is_dropped_for_the_frame() {
    let mut chain = identity_chain();
    chain.corrections[2] = Transform::from_matrix(Matrix4::zeros());
    let pipeline = Pipeline::new(chain, PipelineConfig::default());

    let report = pipeline.process_frame(&frame(2, &targets(), &[0, 1, 2, 3]));

    // one frame-wide skip, not one per label
    assert_eq!(report.skips.len(), 1);
    assert_eq!(report.skips[0].camera, Some(2));
    assert_eq!(report.skips[0].label, None);
    assert!(matches!(report.skips[0].error, GeometryError::Calibration { camera: 2, .. }));

    for (label, truth) in targets() {
        let point = report.point(label).unwrap();
        assert_eq!(point.cameras, vec![0, 1, 3]);
        assert_relative_eq!(point.center_point(), truth, epsilon = 1e-8);
    }
}

#[test]
fn short_chain_limits_the_rig() {
    let mut chain = identity_chain();
    chain.links.truncate(5);
    let pipeline = Pipeline::new(chain, PipelineConfig::default());
    let report = pipeline.process_frame(&frame(0, &targets()[..1], &[0, 1, 2, 3]));

    assert_eq!(report.skips.len(), 1);
    assert_eq!(report.skips[0].camera, Some(3));
    assert_eq!(report.points[0].cameras, vec![0, 1, 2]);
}

#[test]
fn label_seen_once_is_reported_not_fatal() {
    let pipeline = Pipeline::new(identity_chain(), PipelineConfig::default());
    let mut input = frame(4, &targets()[..1], &[0, 2]);
    let lonely = project(
        &Point3::new(0.0, 0.0, 0.3),
        &world_to_camera(0),
        &intrinsics(0),
        PixelShift::default(),
    )
    .unwrap();
    input.observe("whisker", 0, lonely);

    let report = pipeline.process_frame(&input);
    assert_eq!(report.points.len(), 1);
    assert_eq!(report.skips.len(), 1);
    assert_eq!(report.skips[0].label.as_deref(), Some("whisker"));
    assert_eq!(report.skips[0].error.kind(), "insufficient_geometry");
}

#[test]
fn output_transform_is_applied_after_triangulation() {
    let output = Transform::from_euler_degrees([0.0, 0.0, 90.0], [0.0, 0.0, 0.285]);
    let config = PipelineConfig {
        output_transform: Some(output),
        ..PipelineConfig::default()
    };
    let pipeline = Pipeline::new(identity_chain(), config);
    let report = pipeline.process_frame(&frame(0, &targets(), &[0, 1, 2, 3]));

    for (label, truth) in targets() {
        let point = report.point(label).unwrap();
        assert_relative_eq!(
            point.center_point(),
            output.transform_point(&truth),
            epsilon = 1e-8
        );
        assert!(point.mean_reprojection_error().unwrap() < 1e-6);
    }
}

#[test]
fn frame_input_reads_job_layout() {
    let json = r#"{
        "frame": 12,
        "intrinsics": { "0": [600.0, 0.12, 320.0, 240.0], "2": [640.0, 0.12, 320.0, 240.0] },
        "observations": { "head": { "0": [100.5, 200.0], "2": [90.0, 210.25] } }
    }"#;
    let input: FrameInput = serde_json::from_str(json).unwrap();
    assert_eq!(input.frame, 12);
    assert_eq!(input.intrinsics.len(), 2);
    assert_eq!(input.observations["head"][&2].y, 210.25);

    let bare: FrameInput = serde_json::from_str(r#"{"frame": 1}"#).unwrap();
    assert!(bare.observations.is_empty());
}

#[test]
fn sequential_batch_covers_every_frame() {
    let pipeline = Pipeline::new(identity_chain(), PipelineConfig::default());
    let frames: Vec<FrameInput> = (0..6).map(|n| frame(n, &targets(), &[0, 1, 2, 3])).collect();
    let report = run(&pipeline, &frames, &AtomicBool::new(false));
    assert!(!report.cancelled);
    assert_eq!(report.frames.len(), 6);
    assert_eq!(report.point_count(), 18);
    assert_eq!(report.skip_count(), 0);
}

#[tokio::test]
async fn concurrent_batch_matches_sequential() {
    let pipeline = Pipeline::new(linked_chain(), PipelineConfig::default());
    let frames: Vec<FrameInput> = (0..10)
        .map(|n| frame(n, &targets(), if n % 2 == 0 { &[0, 1, 2, 3][..] } else { &[0, 2][..] }))
        .collect();

    let sequential = run(&pipeline, &frames, &AtomicBool::new(false));
    let workers = NonZeroUsize::new(4).unwrap();
    let concurrent =
        run_concurrent(Arc::new(pipeline), frames, workers, Arc::new(AtomicBool::new(false)))
            .await;

    assert_eq!(concurrent.frames, sequential.frames);
    let order: Vec<u64> = concurrent.frames.iter().map(|f| f.frame).collect();
    assert_eq!(order, (0..10).collect::<Vec<_>>());
}
