//! Static lookup from job name to step pipeline.
//!
//! The registry is populated by explicit registration calls at process
//! start and validated eagerly: an empty pipeline, an unknown step name,
//! or a step wired into a job it does not declare is a registration
//! failure, never a runtime surprise. After startup the registry is
//! immutable except through [`StepRegistry::reconfigure_job`], which
//! re-runs the same validation.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::step::BusinessStep;

/// Lookup table from step name to implementation and from job name to its
/// ordered step pipeline.
///
/// Job/step consistency is validated once at registration time, not on
/// every call.
#[derive(Default)]
pub struct StepRegistry {
    steps: HashMap<String, Arc<dyn BusinessStep>>,
    jobs: HashMap<String, Vec<String>>,
}

impl std::fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepRegistry")
            .field("steps", &self.steps.keys().collect::<Vec<_>>())
            .field("jobs", &self.jobs)
            .finish()
    }
}

impl StepRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a step implementation under its declared name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateStep`] if a step with the same name is
    /// already registered.
    pub fn register_step(&mut self, step: Arc<dyn BusinessStep>) -> Result<()> {
        let name = step.name().to_owned();
        if self.steps.contains_key(&name) {
            return Err(Error::DuplicateStep { step: name });
        }
        debug!(step = %name, job = %step.job(), "registered business step");
        self.steps.insert(name, step);
        Ok(())
    }

    /// Registers a job as an ordered list of step names.
    ///
    /// # Errors
    ///
    /// - [`Error::DuplicateJob`] if the job name is already registered
    /// - [`Error::EmptyJob`] if `step_names` is empty
    /// - [`Error::UnregisteredStep`] if a name has no registered
    ///   implementation
    /// - [`Error::StepNotBelongsToJob`] if a step's declared job differs
    ///   from `name`
    pub fn register_job(&mut self, name: impl Into<String>, step_names: &[&str]) -> Result<()> {
        let name = name.into();
        if self.jobs.contains_key(&name) {
            return Err(Error::DuplicateJob { job: name });
        }
        let pipeline = self.validate_pipeline(&name, step_names)?;
        debug!(job = %name, steps = ?pipeline, "registered job");
        self.jobs.insert(name, pipeline);
        Ok(())
    }

    /// Replaces an existing job's step pipeline.
    ///
    /// This is the explicit reconfiguration path; the new pipeline goes
    /// through the same validation as initial registration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::JobNotFound`] if the job was never registered, plus
    /// the same validation errors as [`StepRegistry::register_job`].
    pub fn reconfigure_job(&mut self, name: &str, step_names: &[&str]) -> Result<()> {
        if !self.jobs.contains_key(name) {
            return Err(Error::JobNotFound {
                job: name.to_owned(),
            });
        }
        let pipeline = self.validate_pipeline(name, step_names)?;
        debug!(job = %name, steps = ?pipeline, "reconfigured job");
        self.jobs.insert(name.to_owned(), pipeline);
        Ok(())
    }

    /// Produces the ordered, immutable step sequence for a job.
    ///
    /// # Errors
    ///
    /// Returns [`Error::JobNotFound`] if the job is unknown.
    pub fn steps_for(&self, job: &str) -> Result<Vec<Arc<dyn BusinessStep>>> {
        let names = self.jobs.get(job).ok_or_else(|| Error::JobNotFound {
            job: job.to_owned(),
        })?;
        // Registration validated every name; a missing implementation here
        // would mean the registry was mutated behind our back.
        names
            .iter()
            .map(|name| {
                self.steps
                    .get(name)
                    .cloned()
                    .ok_or_else(|| Error::UnregisteredStep { step: name.clone() })
            })
            .collect()
    }

    /// Verifies that a step belongs to a job's registered sequence.
    ///
    /// This is the explicit guard against a step being invoked under the
    /// wrong job.
    ///
    /// # Errors
    ///
    /// Returns [`Error::JobNotFound`] for an unknown job and
    /// [`Error::StepNotBelongsToJob`] if the step is not in the job's
    /// pipeline.
    pub fn verify_membership(&self, job: &str, step: &str) -> Result<()> {
        let names = self.jobs.get(job).ok_or_else(|| Error::JobNotFound {
            job: job.to_owned(),
        })?;
        if names.iter().any(|name| name == step) {
            Ok(())
        } else {
            Err(Error::StepNotBelongsToJob {
                step: step.to_owned(),
                job: job.to_owned(),
            })
        }
    }

    /// Returns the registered job names, sorted.
    #[must_use]
    pub fn job_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.jobs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn validate_pipeline(&self, job: &str, step_names: &[&str]) -> Result<Vec<String>> {
        if step_names.is_empty() {
            return Err(Error::EmptyJob {
                job: job.to_owned(),
            });
        }
        for name in step_names {
            let step = self.steps.get(*name).ok_or_else(|| Error::UnregisteredStep {
                step: (*name).to_owned(),
            })?;
            if step.job() != job {
                return Err(Error::StepNotBelongsToJob {
                    step: (*name).to_owned(),
                    job: job.to_owned(),
                });
            }
        }
        Ok(step_names.iter().map(|s| (*s).to_owned()).collect())
    }
}
