//! `skewray-runtime` – batch orchestration around the triangulation core.
//!
//! # Modules
//!
//! - [`pipeline`] – [`Pipeline`][pipeline::Pipeline]: composes the rig poses
//!   for a frame, turns every label's observations into rays and triangulates
//!   them, collecting per-contributor drops as [`Skip`][report::Skip]s.
//! - [`batch`] – [`run`][batch::run] and
//!   [`run_concurrent`][batch::run_concurrent]: drive a pipeline over many
//!   frames, sequentially or on a bounded pool of blocking tokio tasks, and
//!   honour a shared cancellation flag between frames.
//! - [`report`] – serializable [`BatchReport`][report::BatchReport],
//!   [`FrameReport`][report::FrameReport] and
//!   [`LabelPoint`][report::LabelPoint] records.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: initialises
//!   the global `tracing` subscriber with an optional OTLP span exporter.

pub mod batch;
pub mod pipeline;
pub mod report;
pub mod telemetry;

pub use batch::{run, run_concurrent};
pub use pipeline::{FrameInput, Pipeline, PipelineConfig};
pub use report::{BatchReport, FrameReport, LabelPoint, Skip};
pub use telemetry::{init_tracing, TracerProviderGuard};
