//! Prometheus metrics for observability and monitoring.
//!
//! This module describes and records metrics for:
//! - Store command processing and effect execution
//! - Session queries (outcome, stale results discarded)
//! - Authentication lifecycle events seen by listeners
//!
//! # Example
//!
//! ```rust,no_run
//! use session_shell_runtime::metrics::MetricsExporter;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut exporter = MetricsExporter::new();
//! exporter.install()?;
//!
//! // Later, e.g. from a diagnostics endpoint
//! if let Some(text) = exporter.render() {
//!     println!("{text}");
//! }
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use thiserror::Error;

// Re-export metrics macros for use in other crates
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

/// Prometheus recorder installer.
///
/// Installs a process-wide `metrics` recorder backed by Prometheus and keeps
/// the handle used to render the text exposition format.
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

    /// Describe all metrics and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// Only one recorder can exist per process. If one is already installed
    /// (e.g. by another test), this logs a warning and succeeds without a
    /// handle, so [`MetricsExporter::render`] returns `None`.
    pub fn install(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Prometheus metrics recorder installed");
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

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this exporter did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    // Store
    describe_counter!("store.commands.total", "Total number of actions sent to stores");
    describe_counter!(
        "store.effects.executed",
        "Total number of effects executed, labelled by effect type"
    );
    describe_counter!(
        "store.shutdown.rejected_actions",
        "Actions rejected because the store was shutting down"
    );
    describe_histogram!(
        "store.reducer.duration_seconds",
        "Time taken by one reducer call"
    );

    // Session reconciliation
    describe_counter!(
        "session.query.total",
        "Completed session queries, labelled by outcome"
    );
    describe_counter!(
        "session.query.stale_discarded",
        "Session query results discarded because a newer query had started"
    );
    describe_counter!(
        "session.lifecycle.events",
        "Authentication lifecycle events received, labelled by kind"
    );
}

/// Session reconciliation metrics recorder.
pub struct SessionMetrics;

impl SessionMetrics {
    /// Record a completed session query (`"authenticated"` or `"not_authenticated"`).
    pub fn record_query(outcome: &'static str) {
        counter!("session.query.total", "outcome" => outcome).increment(1);
    }

    /// Record a query result dropped by the staleness guard.
    pub fn record_stale_discard() {
        counter!("session.query.stale_discarded").increment(1);
    }

    /// Record a lifecycle event seen by a listener.
    pub fn record_lifecycle_event(kind: &str) {
        counter!("session.lifecycle.events", "kind" => kind.to_string()).increment(1);
    }
}
