//! `skewray` – multi-camera ray triangulation from the command line.
//!
//! ```text
//! skewray run --job job.json [--config skewray.toml] [--out report.json] [--no-diagnostics]
//! skewray show-config [--config skewray.toml]
//! ```
//!
//! The report is written as JSON to `--out`, or to stdout.  Logs and the run
//! summary go to stderr.  Ctrl-C stops the batch between frames and still
//! writes the frames finished so far.

mod config;
mod error;
mod job;

use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::{Parser, Subcommand};
use colored::Colorize;
use skewray_runtime::{BatchReport, Pipeline, init_tracing, run, run_concurrent};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::CliError;
use crate::job::Job;

#[derive(Debug, Parser)]
#[command(name = "skewray", version, about = "Triangulate labelled points seen by a calibrated camera rig")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Triangulate every frame of a job file.
    Run {
        /// JSON job: calibration chain plus frames.
        #[arg(long, value_name = "FILE")]
        job: PathBuf,

        /// Write the report here instead of stdout.
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,

        /// Omit pairwise diagnostic points from the report.
        #[arg(long)]
        no_diagnostics: bool,
    },
    /// Print the effective configuration as TOML.
    ShowConfig,
}

fn main() {
    let guard = init_tracing("skewray");
    let result = try_main();
    drop(guard);
    if let Err(e) = result {
        eprintln!("{}: {e}", "error".red().bold());
        std::process::exit(1);
    }
}

fn try_main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let mut cfg = config::load(cli.config.as_deref())?;

    match cli.command {
        Command::ShowConfig => {
            let raw =
                toml::to_string_pretty(&cfg).map_err(|e| CliError::Serialize(e.to_string()))?;
            print!("{raw}");
            Ok(())
        }
        Command::Run {
            job,
            out,
            no_diagnostics,
        } => {
            if no_diagnostics {
                cfg.include_diagnostics = false;
            }
            let job = job::load(&job)?;
            let cancel = install_cancel_handler();
            let report = run_job(&cfg, job, cancel)?;
            write_report(&report, out.as_deref())?;
            print_summary(&report);
            Ok(())
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Run
// ─────────────────────────────────────────────────────────────────────────────

/// Flip the returned flag on Ctrl-C.
fn install_cancel_handler() -> Arc<AtomicBool> {
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("{}", "⚠  Ctrl-C received – finishing in-flight frames …".yellow().bold());
        flag.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; the batch cannot be interrupted cleanly");
    }
    cancel
}

/// Triangulate every frame of `job` under `cfg`.
fn run_job(cfg: &Config, job: Job, cancel: Arc<AtomicBool>) -> Result<BatchReport, CliError> {
    job.check_capacity(cfg.cameras);
    let pipeline = Pipeline::new(job.chain, cfg.to_pipeline_config());

    let Some(workers) = NonZeroUsize::new(cfg.workers) else {
        return Ok(run(&pipeline, &job.frames, &cancel));
    };

    info!(workers = cfg.workers, "running frames concurrently");
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    Ok(runtime.block_on(run_concurrent(
        Arc::new(pipeline),
        job.frames,
        workers,
        cancel,
    )))
}

fn write_report(report: &BatchReport, out: Option<&Path>) -> Result<(), CliError> {
    let json =
        serde_json::to_string_pretty(report).map_err(|e| CliError::Serialize(e.to_string()))?;
    match out {
        Some(path) => fs::write(path, json).map_err(|source| CliError::Write {
            path: path.to_path_buf(),
            source,
        }),
        None => {
            println!("{json}");
            Ok(())
        }
    }
}

fn print_summary(report: &BatchReport) {
    let status = if report.cancelled {
        "cancelled".yellow().bold()
    } else {
        "done".green().bold()
    };
    eprintln!(
        "  {} {} frame(s), {} point(s), {} skip(s)  [run {}]",
        status,
        report.frames.len(),
        report.point_count(),
        report.skip_count(),
        report.run_id.to_string().dimmed()
    );
}
