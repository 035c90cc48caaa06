//! Error types for the business-step orchestration domain.
//!
//! Registry errors are configuration-time failures: they are fatal to the
//! specific registration or `run` call and never silently ignored.
//! Per-entity execution failures are not errors; they travel through
//! [`crate::runner::EntityRunResult`] so a batch is never aborted by one
//! entity.

/// The result type used throughout ledgerflow-cob.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in step registration and job resolution.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested job has no registered step pipeline.
    #[error("job not found: {job}")]
    JobNotFound {
        /// The job name that was not found.
        job: String,
    },

    /// A job referenced a step name with no registered implementation.
    #[error("no registered step implementation for '{step}'")]
    UnregisteredStep {
        /// The step name with no implementation.
        step: String,
    },

    /// A step was invoked under (or wired into) a job it does not belong to.
    #[error("step '{step}' does not belong to job '{job}'")]
    StepNotBelongsToJob {
        /// The step name.
        step: String,
        /// The job the step was invoked under.
        job: String,
    },

    /// A job was registered with an empty step list.
    #[error("job '{job}' must declare at least one step")]
    EmptyJob {
        /// The job name.
        job: String,
    },

    /// A step implementation with this name is already registered.
    #[error("step '{step}' is already registered")]
    DuplicateStep {
        /// The step name.
        step: String,
    },

    /// A job with this name is already registered.
    ///
    /// Changing an existing job's pipeline goes through
    /// [`crate::registry::StepRegistry::reconfigure_job`] explicitly.
    #[error("job '{job}' is already registered")]
    DuplicateJob {
        /// The job name.
        job: String,
    },

    /// An invalid entity run state transition was attempted.
    #[error("invalid run state transition: {from} -> {to} ({reason})")]
    InvalidStateTransition {
        /// The current state.
        from: String,
        /// The attempted target state.
        to: String,
        /// The reason the transition is invalid.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_error_names_step_and_job() {
        let err = Error::StepNotBelongsToJob {
            step: "MARK_OVERDUE".into(),
            job: "SAVINGS_CLOSE_OF_BUSINESS".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("MARK_OVERDUE"));
        assert!(msg.contains("SAVINGS_CLOSE_OF_BUSINESS"));
    }

    #[test]
    fn empty_job_error_display() {
        let err = Error::EmptyJob {
            job: "LOAN_CLOSE_OF_BUSINESS".into(),
        };
        assert!(err.to_string().contains("at least one step"));
    }
}
