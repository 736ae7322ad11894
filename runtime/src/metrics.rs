//! Prometheus metrics for the store runtime.
//!
//! The store records through the `metrics` facade unconditionally. Nothing is
//! exported until a recorder is installed, which is what [`MetricsExporter`]
//! does.
//!
//! # Example
//!
//! ```rust,no_run
//! use sessionflow_runtime::metrics::MetricsExporter;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut exporter = MetricsExporter::new();
//! exporter.install()?;
//!
//! // ... run the coordinator ...
//!
//! if let Some(text) = exporter.render() {
//!     println!("{text}");
//! }
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder handle.
///
/// Installs a process-wide recorder and renders the text exposition format
/// on demand. Serving the text over HTTP is left to the embedding
/// application.
#[derive(Default)]
pub struct MetricsExporter {
    handle: Option<PrometheusHandle>,
}

impl MetricsExporter {
    /// Create an exporter that has not been installed yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Register metric descriptions and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// A recorder that is already installed (another exporter, or a previous
    /// test) is not an error. In that case [`render`](Self::render) returns
    /// `None` for this instance.
    pub fn install(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Prometheus recorder installed");
                Ok(())
            },
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            },
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this instance did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register descriptions for the metrics the store emits.
fn register_metrics() {
    describe_counter!(
        "store_actions_total",
        "Total number of actions reduced by the store"
    );
    describe_histogram!(
        "store_reducer_duration_seconds",
        "Time spent inside the reducer per action"
    );
    describe_histogram!(
        "store_effects_count",
        "Number of effects returned per reduced action"
    );
    describe_counter!(
        "store_effects_executed_total",
        "Total number of effects executed, labelled by type"
    );
    describe_gauge!(
        "store_effects_pending",
        "Effects currently running"
    );
    describe_counter!(
        "store_shutdown_rejected_actions_total",
        "Actions rejected because the store was shutting down"
    );
    describe_counter!(
        "store_shutdown_total",
        "Shutdown attempts, labelled by outcome"
    );
}

/// Store metrics recorder.
pub struct StoreMetrics;

impl StoreMetrics {
    /// Record one reduced action.
    pub fn record_action(duration: Duration, effects: usize) {
        counter!("store_actions_total").increment(1);
        histogram!("store_reducer_duration_seconds").record(duration.as_secs_f64());
        // Note: Precision loss acceptable for metrics (effect counts < 2^52)
        #[allow(clippy::cast_precision_loss)]
        histogram!("store_effects_count").record(effects as f64);
    }

    /// Record one executed effect of the given kind.
    pub fn record_effect(kind: &'static str) {
        counter!("store_effects_executed_total", "type" => kind).increment(1);
    }

    /// Record the number of effects still running.
    pub fn record_pending(pending: usize) {
        // Note: Precision loss acceptable for gauges (pending counts < 2^52)
        #[allow(clippy::cast_precision_loss)]
        gauge!("store_effects_pending").set(pending as f64);
    }

    /// Record an action rejected during shutdown.
    pub fn record_rejected() {
        counter!("store_shutdown_rejected_actions_total").increment(1);
    }

    /// Record the outcome of a shutdown attempt.
    pub fn record_shutdown(outcome: &'static str) {
        counter!("store_shutdown_total", "outcome" => outcome).increment(1);
    }
}
