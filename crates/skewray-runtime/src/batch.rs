//! Batch execution of a [`Pipeline`] over many frames.
//!
//! Frames are independent, so they can run in any order; the resulting
//! [`BatchReport`] always lists them in input order.  A shared cancellation
//! flag is checked before each frame starts.  Frames already running finish
//! normally and are kept in the report.

use std::num::NonZeroUsize;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tokio::{sync::Semaphore, task::JoinSet};
use tracing::{info, warn};

use crate::{
    pipeline::{FrameInput, Pipeline},
    report::{BatchReport, FrameReport},
};

/// Process `frames` one after another on the calling thread.
pub fn run(pipeline: &Pipeline, frames: &[FrameInput], cancel: &AtomicBool) -> BatchReport {
    let report = BatchReport::begin();
    info!(run_id = %report.run_id, frames = frames.len(), "batch started");

    let mut done = Vec::with_capacity(frames.len());
    for input in frames {
        if cancel.load(Ordering::SeqCst) {
            warn!(frame = input.frame, "cancellation requested, stopping");
            break;
        }
        done.push(pipeline.process_frame(input));
    }

    let cancelled = done.len() < frames.len();
    finish(report, done, cancelled)
}

/// Process `frames` on up to `workers` blocking tasks.
pub async fn run_concurrent(
    pipeline: Arc<Pipeline>,
    frames: Vec<FrameInput>,
    workers: NonZeroUsize,
    cancel: Arc<AtomicBool>,
) -> BatchReport {
    let report = BatchReport::begin();
    let total = frames.len();
    info!(run_id = %report.run_id, frames = total, workers = workers.get(), "batch started");

    let permits = Arc::new(Semaphore::new(workers.get()));
    let mut tasks = JoinSet::new();

    for (index, input) in frames.into_iter().enumerate() {
        let pipeline = Arc::clone(&pipeline);
        let permits = Arc::clone(&permits);
        let cancel = Arc::clone(&cancel);
        tasks.spawn(async move {
            let _permit = permits.acquire_owned().await.ok()?;
            if cancel.load(Ordering::SeqCst) {
                return None;
            }
            tokio::task::spawn_blocking(move || pipeline.process_frame(&input))
                .await
                .inspect_err(|e| warn!(index, error = %e, "frame task failed"))
                .ok()
                .map(|frame| (index, frame))
        });
    }

    let mut done = Vec::with_capacity(total);
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Some(entry)) => done.push(entry),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "frame task aborted"),
        }
    }
    done.sort_by_key(|(index, _)| *index);

    let cancelled = cancel.load(Ordering::SeqCst) && done.len() < total;
    let frames = done.into_iter().map(|(_, frame)| frame).collect();
    finish(report, frames, cancelled)
}

fn finish(report: BatchReport, frames: Vec<FrameReport>, cancelled: bool) -> BatchReport {
    let report = report.finish(frames, cancelled);
    info!(
        run_id = %report.run_id,
        frames = report.frames.len(),
        points = report.point_count(),
        skips = report.skip_count(),
        cancelled = report.cancelled,
        "batch finished"
    );
    report
}
