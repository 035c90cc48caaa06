//! # ledgerflow-cob
//!
//! Business-step orchestration for Close of Business batch work.
//!
//! A **job** is a named, ordered sequence of **business steps**; each step
//! is one unit of work applied to a single entity (a loan account, a
//! savings account). This crate provides:
//!
//! - **Step Registry**: Eagerly validated lookup from job name to its step
//!   pipeline, with explicit step-to-job membership checks
//! - **Job Runner**: Executes a job's full pipeline against a batch of
//!   entities with per-entity and per-step failure isolation
//!
//! ## Guarantees
//!
//! - **Step order invariance**: Steps run in registration order; a failed
//!   step aborts only the remaining steps for that entity
//! - **Entity isolation**: One entity's failure never prevents other
//!   entities' pipelines from completing
//! - **Startup-time validation**: A step wired into the wrong job is a
//!   registration failure, never a silent runtime execution
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ledgerflow_cob::registry::StepRegistry;
//! use ledgerflow_cob::runner::JobRunner;
//! use ledgerflow_core::EntityId;
//!
//! # async fn example(
//! #     accrue: Arc<dyn ledgerflow_cob::step::BusinessStep>,
//! #     overdue: Arc<dyn ledgerflow_cob::step::BusinessStep>,
//! # ) -> ledgerflow_cob::error::Result<()> {
//! let mut registry = StepRegistry::new();
//! registry.register_step(accrue)?;
//! registry.register_step(overdue)?;
//! registry.register_job("LOAN_CLOSE_OF_BUSINESS", &["ACCRUE_INTEREST", "MARK_OVERDUE"])?;
//!
//! let runner = JobRunner::new(Arc::new(registry));
//! let report = runner
//!     .run("LOAN_CLOSE_OF_BUSINESS", &[EntityId::new(101), EntityId::new(102)])
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod metrics;
pub mod registry;
pub mod runner;
pub mod step;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::registry::StepRegistry;
    pub use crate::runner::{
        BatchReport, CancelToken, EntityRunResult, EntityRunState, JobRunner,
    };
    pub use crate::step::{BusinessStep, StepOutcome};
}
