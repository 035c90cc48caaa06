//! Observability metrics for command dispatch.
//!
//! Metrics are exposed via the `metrics` crate facade. To export to
//! Prometheus, install a recorder in the binary:
//!
//! ```rust,ignore
//! use metrics_exporter_prometheus::PrometheusBuilder;
//!
//! PrometheusBuilder::new()
//!     .with_http_listener(([0, 0, 0, 0], 9090))
//!     .install()
//!     .expect("failed to install Prometheus recorder");
//! ```
//!
//! ## Metrics Exported
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `ledgerflow_commands_total` | Counter | `result` | Dispatch outcomes |
//! | `ledgerflow_command_duration_seconds` | Histogram | `command` | Handler execution time |

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    /// Counter: Total dispatch outcomes.
    pub const COMMANDS_TOTAL: &str = "ledgerflow_commands_total";
    /// Histogram: Handler execution duration in seconds.
    pub const COMMAND_DURATION_SECONDS: &str = "ledgerflow_command_duration_seconds";
}

/// Label keys used across metrics.
pub mod labels {
    /// Dispatch result (executed, failed, replayed, still_processing).
    pub const RESULT: &str = "result";
    /// The `ENTITY.ACTION` pair of the command.
    pub const COMMAND: &str = "command";
}

/// High-level interface for recording command dispatch metrics.
///
/// Cheap to clone and share across request workers.
#[derive(Debug, Clone, Default)]
pub struct CommandMetrics;

impl CommandMetrics {
    /// Creates a new metrics recorder.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Records a dispatch outcome.
    ///
    /// Increments the `ledgerflow_commands_total` counter.
    pub fn record_dispatch(&self, result: &str) {
        counter!(
            names::COMMANDS_TOTAL,
            labels::RESULT => result.to_string(),
        )
        .increment(1);
    }

    /// Records how long the business handler ran.
    ///
    /// Only fresh executions are observed; replays never run the handler.
    pub fn observe_handler_duration(&self, command: &str, duration_secs: f64) {
        histogram!(
            names::COMMAND_DURATION_SECONDS,
            labels::COMMAND => command.to_string(),
        )
        .record(duration_secs);
    }
}
