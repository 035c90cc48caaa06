//! Observability metrics for batch job execution.
//!
//! Exposed via the `metrics` crate facade; install a recorder (e.g.
//! `metrics_exporter_prometheus`) in the binary to export them.
//!
//! ## Metrics Exported
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `ledgerflow_cob_steps_total` | Counter | `step`, `outcome` | Step outcomes |
//! | `ledgerflow_cob_step_duration_seconds` | Histogram | `step` | Step execution time |
//! | `ledgerflow_cob_entities_total` | Counter | `job`, `status` | Per-entity terminal states |

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    /// Counter: Step outcomes by step and outcome.
    pub const STEPS_TOTAL: &str = "ledgerflow_cob_steps_total";
    /// Histogram: Step execution duration in seconds.
    pub const STEP_DURATION_SECONDS: &str = "ledgerflow_cob_step_duration_seconds";
    /// Counter: Per-entity terminal states by job and status.
    pub const ENTITIES_TOTAL: &str = "ledgerflow_cob_entities_total";
}

/// Label keys used across metrics.
pub mod labels {
    /// Step name.
    pub const STEP: &str = "step";
    /// Step outcome (completed, skipped, failed).
    pub const OUTCOME: &str = "outcome";
    /// Job name.
    pub const JOB: &str = "job";
    /// Entity terminal status (completed, failed, cancelled).
    pub const STATUS: &str = "status";
}

/// High-level interface for recording batch execution metrics.
///
/// Cheap to clone and share across worker tasks.
#[derive(Debug, Clone, Default)]
pub struct CobMetrics;

impl CobMetrics {
    /// Creates a new metrics recorder.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Records one step execution outcome and its duration.
    pub fn record_step(&self, step: &str, outcome: &str, duration_secs: f64) {
        counter!(
            names::STEPS_TOTAL,
            labels::STEP => step.to_string(),
            labels::OUTCOME => outcome.to_string(),
        )
        .increment(1);
        histogram!(
            names::STEP_DURATION_SECONDS,
            labels::STEP => step.to_string(),
        )
        .record(duration_secs);
    }

    /// Records one entity reaching a terminal state.
    pub fn record_entity(&self, job: &str, status: &str) {
        counter!(
            names::ENTITIES_TOTAL,
            labels::JOB => job.to_string(),
            labels::STATUS => status.to_string(),
        )
        .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_can_record_without_a_recorder_installed() {
        let metrics = CobMetrics::new();
        metrics.record_step("ACCRUE_INTEREST", "completed", 0.05);
        metrics.record_entity("LOAN_CLOSE_OF_BUSINESS", "failed");
    }
}
