//! The business step seam: one named unit of work over one entity.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use ledgerflow_core::EntityId;

/// Outcome of executing one step against one entity.
///
/// Produced per (job, step, entity) triple and returned synchronously to
/// the job runner's caller; this core never persists it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "status")]
pub enum StepOutcome {
    /// The step did its work.
    Completed,
    /// The step deliberately decided there was nothing to do for this
    /// entity (a business decision, not a failure).
    BusinessSkipped {
        /// Why the step skipped the entity.
        reason: String,
    },
    /// The step failed; remaining steps for this entity must not run.
    Failed {
        /// Description of the failure.
        message: String,
    },
}

impl StepOutcome {
    /// Creates a skipped outcome with the given reason.
    #[must_use]
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::BusinessSkipped {
            reason: reason.into(),
        }
    }

    /// Creates a failed outcome with the given message.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    /// Returns true if this outcome aborts the entity's pipeline.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Returns the label value used in metrics for this outcome.
    #[must_use]
    pub const fn metric_label(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::BusinessSkipped { .. } => "skipped",
            Self::Failed { .. } => "failed",
        }
    }
}

/// One named, ordered unit of batch work applied to an entity.
///
/// Implementations carry the actual financial logic (interest accrual,
/// arrears aging, delinquency classification) and live outside this core.
/// Each step declares the single job it belongs to; the registry enforces
/// that declaration eagerly at registration time.
///
/// Implementations should not panic across this seam; the runner converts
/// a panicking step into an entity-level failure, but the panic message is
/// lost to the report.
#[async_trait]
pub trait BusinessStep: Send + Sync + std::fmt::Debug {
    /// The unique step name (e.g. `"ACCRUE_INTEREST"`).
    fn name(&self) -> &str;

    /// The job this step belongs to (e.g. `"LOAN_CLOSE_OF_BUSINESS"`).
    fn job(&self) -> &str;

    /// Executes the step against one entity.
    async fn execute(&self, entity: EntityId) -> StepOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_failed_aborts_the_pipeline() {
        assert!(!StepOutcome::Completed.is_failure());
        assert!(!StepOutcome::skipped("nothing due").is_failure());
        assert!(StepOutcome::failed("ledger unavailable").is_failure());
    }

    #[test]
    fn metric_labels_are_stable() {
        assert_eq!(StepOutcome::Completed.metric_label(), "completed");
        assert_eq!(StepOutcome::skipped("x").metric_label(), "skipped");
        assert_eq!(StepOutcome::failed("x").metric_label(), "failed");
    }

    #[test]
    fn outcome_serializes_tagged() {
        let json = serde_json::to_value(StepOutcome::skipped("no interest due")).unwrap();
        assert_eq!(json["status"], "BUSINESS_SKIPPED");
        assert_eq!(json["reason"], "no interest due");
    }
}
