//! Batch job execution with per-entity and per-step failure isolation.
//!
//! The runner executes a job's full step pipeline against a batch of
//! target entities:
//!
//! - Entities are independent units of work, processed in parallel across
//!   a bounded worker pool; no entity's result is ever rolled back by
//!   another entity's failure
//! - Steps within one entity's pipeline are strictly sequential, because
//!   later steps may depend on state mutated by earlier ones
//! - A failed step aborts only the remaining steps for that entity; the
//!   rest of the batch keeps running
//! - Cancellation stops scheduling new entities without touching
//!   already-recorded terminal states
//!
//! ## State Machine
//!
//! Per (entity, job) run:
//!
//! ```text
//! ┌─────────┐  scheduled  ┌─────────┐  all steps ok  ┌───────────┐
//! │ PENDING │────────────►│ RUNNING │───────────────►│ COMPLETED │
//! └─────────┘             └─────────┘                └───────────┘
//!      │                       │
//!      │ batch cancelled       │ step failed
//!      ▼                       ▼
//! ┌───────────┐           ┌────────┐
//! │ CANCELLED │           │ FAILED │
//! └───────────┘           └────────┘
//! ```
//!
//! Re-running a job on an entity after a FAILED run restarts from the
//! first step; resume semantics belong to the external scheduler.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use ledgerflow_core::{EntityId, RunId};

use crate::error::{Error, Result};
use crate::metrics::CobMetrics;
use crate::registry::StepRegistry;
use crate::step::{BusinessStep, StepOutcome};

/// Default number of entities processed concurrently.
const DEFAULT_PARALLELISM: usize = 8;

/// State machine for one (entity, job) run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityRunState {
    /// Scheduled, not yet started.
    Pending,
    /// Steps are executing.
    Running,
    /// Every step completed or was skipped.
    Completed,
    /// A step failed; remaining steps were not run.
    Failed,
    /// The batch was cancelled before this entity started.
    Cancelled,
}

impl EntityRunState {
    /// Returns true if this is a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns true if the transition from self to target is valid.
    #[must_use]
    pub const fn can_transition_to(&self, target: Self) -> bool {
        match self {
            Self::Pending => matches!(target, Self::Running | Self::Cancelled),
            Self::Running => matches!(target, Self::Completed | Self::Failed),
            Self::Completed | Self::Failed | Self::Cancelled => false,
        }
    }

    /// Returns the label value used in metrics for this state.
    #[must_use]
    pub const fn metric_label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for EntityRunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Running => write!(f, "RUNNING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Terminal result for one entity in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRunResult {
    /// Terminal state; always `Completed`, `Failed`, or `Cancelled`.
    pub status: EntityRunState,
    /// Name of the failing step, if the run failed at one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<String>,
    /// Zero-based index of the failing step within the pipeline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_step_index: Option<usize>,
    /// Why the run failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    /// How many steps reached a non-failing outcome before the run ended.
    pub steps_run: usize,
}

impl EntityRunResult {
    fn completed(steps_run: usize) -> Self {
        Self {
            status: EntityRunState::Completed,
            failed_step: None,
            failed_step_index: None,
            cause: None,
            steps_run,
        }
    }

    fn failed(step: &str, index: usize, cause: String) -> Self {
        Self {
            status: EntityRunState::Failed,
            failed_step: Some(step.to_owned()),
            failed_step_index: Some(index),
            cause: Some(cause),
            steps_run: index,
        }
    }

    fn cancelled() -> Self {
        Self {
            status: EntityRunState::Cancelled,
            failed_step: None,
            failed_step_index: None,
            cause: None,
            steps_run: 0,
        }
    }

    fn aborted(cause: String, steps_run: usize) -> Self {
        Self {
            status: EntityRunState::Failed,
            failed_step: None,
            failed_step_index: None,
            cause: Some(cause),
            steps_run,
        }
    }

    fn panicked() -> Self {
        Self {
            status: EntityRunState::Failed,
            failed_step: None,
            failed_step_index: None,
            cause: Some("step execution panicked".to_owned()),
            steps_run: 0,
        }
    }

    /// Returns true if every step reached a non-failing outcome.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == EntityRunState::Completed
    }
}

/// Aggregate result of one batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    /// Unique identifier for this batch run.
    pub run_id: RunId,
    /// The job that was executed.
    pub job: String,
    /// When the batch started.
    pub started_at: DateTime<Utc>,
    /// When the last entity reached a terminal state.
    pub completed_at: DateTime<Utc>,
    /// Terminal result per entity. Every entity handed to the runner is
    /// present; failures are isolated, never dropped.
    pub results: BTreeMap<EntityId, EntityRunResult>,
}

impl BatchReport {
    /// Returns the result for one entity, if it was part of the batch.
    #[must_use]
    pub fn result(&self, entity: EntityId) -> Option<&EntityRunResult> {
        self.results.get(&entity)
    }

    /// Returns how many entities completed their full pipeline.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.count(EntityRunState::Completed)
    }

    /// Returns how many entities failed at some step.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.count(EntityRunState::Failed)
    }

    /// Returns how many entities were cancelled before starting.
    #[must_use]
    pub fn cancelled_count(&self) -> usize {
        self.count(EntityRunState::Cancelled)
    }

    /// Returns true if every entity in the batch completed.
    #[must_use]
    pub fn is_fully_completed(&self) -> bool {
        self.results.values().all(EntityRunResult::is_completed)
    }

    fn count(&self, state: EntityRunState) -> usize {
        self.results.values().filter(|r| r.status == state).count()
    }
}

/// Cooperative cancellation handle for an in-progress batch.
///
/// Cancelling stops the runner from starting new entities; entities whose
/// pipelines are already executing run to their terminal state.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a fresh, non-cancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation of the batch.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true if cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Tracks the state machine for one entity's run, validating transitions.
struct EntityRun {
    entity: EntityId,
    state: EntityRunState,
}

impl EntityRun {
    fn new(entity: EntityId) -> Self {
        Self {
            entity,
            state: EntityRunState::Pending,
        }
    }

    fn transition_to(&mut self, target: EntityRunState) -> Result<()> {
        if !self.state.can_transition_to(target) {
            return Err(Error::InvalidStateTransition {
                from: self.state.to_string(),
                to: target.to_string(),
                reason: format!("entity {}", self.entity),
            });
        }
        self.state = target;
        Ok(())
    }
}

/// Executes registered jobs against entity batches.
///
/// ## Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use ledgerflow_cob::registry::StepRegistry;
/// use ledgerflow_cob::runner::JobRunner;
///
/// # fn make(registry: Arc<StepRegistry>) {
/// let runner = JobRunner::new(registry).with_parallelism(16);
/// # }
/// ```
#[derive(Debug)]
pub struct JobRunner {
    registry: Arc<StepRegistry>,
    parallelism: usize,
    metrics: CobMetrics,
}

impl JobRunner {
    /// Creates a runner over the given registry with default parallelism.
    #[must_use]
    pub fn new(registry: Arc<StepRegistry>) -> Self {
        Self {
            registry,
            parallelism: DEFAULT_PARALLELISM,
            metrics: CobMetrics::new(),
        }
    }

    /// Sets how many entities may execute concurrently (minimum 1).
    #[must_use]
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// Runs a job's full pipeline against a batch of entities.
    ///
    /// Duplicate entity ids in the batch collapse to a single run; the
    /// report carries one result per distinct entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the job cannot be resolved from the registry;
    /// that is a configuration failure and aborts the whole batch before
    /// any entity runs. Per-entity failures never surface here; they are
    /// reported in the [`BatchReport`].
    pub async fn run(&self, job: &str, entities: &[EntityId]) -> Result<BatchReport> {
        self.run_with_cancel(job, entities, &CancelToken::new())
            .await
    }

    /// Runs a job with an external cancellation handle.
    ///
    /// Cancellation stops new entities from starting; results already
    /// recorded are untouched and entities that never started are reported
    /// as [`EntityRunState::Cancelled`].
    ///
    /// # Errors
    ///
    /// Same as [`JobRunner::run`].
    pub async fn run_with_cancel(
        &self,
        job: &str,
        entities: &[EntityId],
        cancel: &CancelToken,
    ) -> Result<BatchReport> {
        let steps = self.registry.steps_for(job)?;
        let run_id = RunId::generate();
        let started_at = Utc::now();

        debug!(
            %run_id,
            job,
            entities = entities.len(),
            steps = steps.len(),
            "starting batch run"
        );

        let semaphore = Arc::new(Semaphore::new(self.parallelism));
        let mut tasks: JoinSet<(EntityId, EntityRunResult)> = JoinSet::new();
        let mut task_entities: HashMap<tokio::task::Id, EntityId> = HashMap::new();

        let mut scheduled = HashSet::new();
        for &entity in entities {
            // A duplicate id in the batch must not run the pipeline twice.
            if !scheduled.insert(entity) {
                continue;
            }
            let steps = steps.clone();
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            let metrics = self.metrics.clone();
            let job = job.to_owned();
            let handle = tasks.spawn(async move {
                // The permit gates entity start, bounding the worker pool.
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (entity, EntityRunResult::cancelled());
                };
                if cancel.is_cancelled() {
                    return (entity, EntityRunResult::cancelled());
                }
                let result = run_pipeline(&job, &steps, entity, &metrics).await;
                (entity, result)
            });
            task_entities.insert(handle.id(), entity);
        }

        let mut results = BTreeMap::new();
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((task_id, (entity, result))) => {
                    task_entities.remove(&task_id);
                    self.metrics.record_entity(job, result.status.metric_label());
                    results.insert(entity, result);
                }
                Err(join_error) => {
                    // A panicking step takes down only its own entity.
                    let Some(entity) = task_entities.remove(&join_error.id()) else {
                        continue;
                    };
                    error!(%run_id, job, %entity, %join_error, "entity run panicked");
                    self.metrics
                        .record_entity(job, EntityRunState::Failed.metric_label());
                    results.insert(entity, EntityRunResult::panicked());
                }
            }
        }

        let report = BatchReport {
            run_id,
            job: job.to_owned(),
            started_at,
            completed_at: Utc::now(),
            results,
        };
        debug!(
            %run_id,
            job,
            completed = report.completed_count(),
            failed = report.failed_count(),
            cancelled = report.cancelled_count(),
            "batch run finished"
        );
        Ok(report)
    }
}

/// Runs one entity's step pipeline sequentially, stopping at the first
/// failing step.
async fn run_pipeline(
    job: &str,
    steps: &[Arc<dyn BusinessStep>],
    entity: EntityId,
    metrics: &CobMetrics,
) -> EntityRunResult {
    let mut run = EntityRun::new(entity);
    if let Err(e) = run.transition_to(EntityRunState::Running) {
        return EntityRunResult::aborted(e.to_string(), 0);
    }

    for (index, step) in steps.iter().enumerate() {
        let started = Instant::now();
        let outcome = step.execute(entity).await;
        metrics.record_step(
            step.name(),
            outcome.metric_label(),
            started.elapsed().as_secs_f64(),
        );

        match outcome {
            StepOutcome::Completed => {}
            StepOutcome::BusinessSkipped { reason } => {
                debug!(job, step = step.name(), %entity, %reason, "step skipped");
            }
            StepOutcome::Failed { message } => {
                warn!(job, step = step.name(), %entity, %message, "business step failed");
                if let Err(e) = run.transition_to(EntityRunState::Failed) {
                    return EntityRunResult::failed(step.name(), index, e.to_string());
                }
                return EntityRunResult::failed(step.name(), index, message);
            }
        }
    }

    if let Err(e) = run.transition_to(EntityRunState::Completed) {
        return EntityRunResult::aborted(e.to_string(), steps.len());
    }
    EntityRunResult::completed(steps.len())
}
