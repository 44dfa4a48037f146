//! Tracing initialisation for the `skewray` binary.
//!
//! What reaches the subscriber:
//!
//! | Source | Kind | Fields |
//! |---|---|---|
//! | [`Pipeline::process_frame`] | `frame` span | `frame` |
//! | [`Pipeline::triangulate_label`] | `label` span, nested in `frame` | `label` |
//! | [`Pipeline::process_frame`] | `info!` per skipped label | `frame`, `label`, `error` |
//! | [`RigPoses::compose`] | `warn!` per dropped camera, once for a chain shorter than the rig | `camera`, `error` / `first`, `cameras` |
//! | [`batch::run`] / [`batch::run_concurrent`] | `info!` at start and finish | `run_id`, `frames`, `points`, `skips`, `cancelled` |
//!
//! Per-pair and per-observation drops are `debug!` and only show up with
//! `RUST_LOG=debug`.  With an OTLP collector configured, one trace per frame
//! is exported with its label spans as children.
//!
//! # Environment variables
//!
//! | Variable | Effect |
//! |---|---|
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | OTLP/HTTP collector base URL (e.g. `http://localhost:4318`); enables span export. |
//! | `RUST_LOG` | Log filter (default `"info"`). |
//! | `SKEWRAY_LOG_FORMAT=json` | Newline-delimited JSON logs on stderr. |
//!
//! [`Pipeline::process_frame`]: crate::pipeline::Pipeline::process_frame
//! [`Pipeline::triangulate_label`]: crate::pipeline::Pipeline::triangulate_label
//! [`RigPoses::compose`]: skewray_geometry::RigPoses::compose
//! [`batch::run`]: crate::batch::run
//! [`batch::run_concurrent`]: crate::batch::run_concurrent
//!
//! # Example
//!
//! ```rust,no_run
//! let _guard = skewray_runtime::telemetry::init_tracing("skewray");
//! ```

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{trace::SdkTracerProvider, Resource};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// ─────────────────────────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────────────────────────

/// Initialise the global `tracing` subscriber.
///
/// Logs go to stderr; stdout is reserved for the JSON report.  Spans are
/// exported under the `skewray` tracer with `service_name` as the resource
/// name.
///
/// Hold the returned [`TracerProviderGuard`] until the process exits, or the
/// last frames' spans are lost.
pub fn init_tracing(service_name: &str) -> TracerProviderGuard {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let use_json = json_logs_requested();

    let provider = build_provider(service_name);

    if let Some(ref p) = provider {
        let tracer = p.tracer("skewray");
        let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);
        if use_json {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(otel_layer)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        } else {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(otel_layer)
                .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    } else if use_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }

    TracerProviderGuard(provider)
}

// ─────────────────────────────────────────────────────────────────────────────
// RAII guard
// ─────────────────────────────────────────────────────────────────────────────

/// Flushes the frame and label spans still held by the exporter when dropped.
pub struct TracerProviderGuard(Option<SdkTracerProvider>);

impl TracerProviderGuard {
    /// `true` when spans are being exported.
    pub fn is_exporting(&self) -> bool {
        self.0.is_some()
    }
}

impl Drop for TracerProviderGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.0.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("[skewray] OpenTelemetry provider shutdown error: {e}");
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal helpers
// ─────────────────────────────────────────────────────────────────────────────

fn json_logs_requested() -> bool {
    std::env::var("SKEWRAY_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"))
}

/// `None` without an endpoint or when the exporter fails to build; the run
/// then logs to stderr only.
fn build_provider(service_name: &str) -> Option<SdkTracerProvider> {
    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok()?;

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| eprintln!("[skewray] OTLP exporter init failed: {e}"))
        .ok()?;

    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .build();

    Some(
        SdkTracerProvider::builder()
            .with_resource(resource)
            // The CLI builds its Tokio runtime after tracing is initialised,
            // so the batch exporter cannot be used here.
            .with_simple_exporter(exporter)
            .build(),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use skewray_geometry::{CalibrationChain, Transform};
    use skewray_types::Pixel;
    use tracing::span;
    use tracing_subscriber::{Layer, Registry, layer::Context, registry::LookupSpan};

    use crate::pipeline::{FrameInput, Pipeline, PipelineConfig};

    /// Records `(span name, parent span name)` for every new span.
    #[derive(Clone, Default)]
    struct SpanTree(Arc<Mutex<Vec<(String, Option<String>)>>>);

    impl<S> Layer<S> for SpanTree
    where
        S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    {
        fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
            let parent = ctx
                .span(id)
                .and_then(|s| s.parent())
                .map(|p| p.name().to_string());
            self.0
                .lock()
                .unwrap()
                .push((attrs.metadata().name().to_string(), parent));
        }
    }

    #[test]
    fn label_spans_nest_under_their_frame() {
        let chain = CalibrationChain::new(vec![Transform::identity()], vec![Transform::identity()]);
        let mut config = PipelineConfig::default();
        config.rig.cameras = 1;
        let pipeline = Pipeline::new(chain, config);
        let mut input = FrameInput::new(3);
        input.observe("nose", 0, Pixel::new(1.0, 2.0));
        input.observe("tail", 0, Pixel::new(3.0, 4.0));

        let tree = SpanTree::default();
        let subscriber = Registry::default().with(tree.clone());
        tracing::subscriber::with_default(subscriber, || pipeline.process_frame(&input));

        let spans = tree.0.lock().unwrap().clone();
        assert_eq!(
            spans,
            vec![
                ("frame".to_string(), None),
                ("label".to_string(), Some("frame".to_string())),
                ("label".to_string(), Some("frame".to_string())),
            ]
        );
    }

    #[test]
    fn build_provider_returns_none_without_endpoint() {
        // SAFETY: no other test in this crate touches this env-var.
        unsafe { std::env::remove_var("OTEL_EXPORTER_OTLP_ENDPOINT") };
        assert!(build_provider("test-service").is_none());
    }

    #[test]
    fn json_format_is_case_insensitive() {
        // SAFETY: no other test in this crate touches this env-var.
        unsafe { std::env::set_var("SKEWRAY_LOG_FORMAT", "JSON") };
        assert!(json_logs_requested());
        unsafe { std::env::set_var("SKEWRAY_LOG_FORMAT", "pretty") };
        assert!(!json_logs_requested());
        unsafe { std::env::remove_var("SKEWRAY_LOG_FORMAT") };
        assert!(!json_logs_requested());
    }

    #[test]
    fn guard_without_provider_drops_cleanly() {
        let guard = TracerProviderGuard(None);
        assert!(!guard.is_exporting());
        drop(guard);
    }
}
