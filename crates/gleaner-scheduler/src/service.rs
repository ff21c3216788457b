use std::sync::Arc;

use gleaner_core::{types::dedup_list, Job, JobId, JobStatus, NewJob, RunRecord, ValidationError};
use gleaner_ledger::Ledger;
use tracing::{info, instrument};

use crate::{
    error::{Result, SchedulerError},
    runner::JobRunner,
    schedule::validate_schedule,
};

/// Job management and history queries for CLI / UI layers.
///
/// Shares the ledger and the running-jobs set with the engine, so a manual
/// trigger and a scheduled execution of the same job never overlap.
#[derive(Clone)]
pub struct JobService {
    runner: Arc<JobRunner>,
}

impl JobService {
    pub fn new(runner: Arc<JobRunner>) -> Self {
        Self { runner }
    }

    fn ledger(&self) -> &Ledger {
        self.runner.ledger()
    }

    /// Validate and persist a new job. It starts `Active`.
    #[instrument(skip(self, new), fields(job = %new.name))]
    pub fn create(&self, mut new: NewJob) -> Result<Job> {
        check_identity(&new.name, new.target.value())?;
        new.params.validate()?;
        new.schedule = validate_schedule(&new.schedule)?;

        let job = new.into_job(self.runner.clock().now());
        self.ledger().insert_job(&job)?;
        info!(job_id = %job.id, schedule = %job.schedule, "job created");
        Ok(job)
    }

    pub fn get(&self, id: &JobId) -> Result<Option<Job>> {
        Ok(self.ledger().get_job(id)?)
    }

    pub fn list_all(&self) -> Result<Vec<Job>> {
        Ok(self.ledger().list_jobs()?)
    }

    pub fn list_active(&self) -> Result<Vec<Job>> {
        Ok(self.ledger().list_active_jobs()?)
    }

    /// Replace a job's definition. Status is left as stored; use
    /// [`JobService::pause`] and [`JobService::resume`] for that. Returns
    /// `false` if it does not exist.
    #[instrument(skip(self, job), fields(job_id = %job.id))]
    pub fn update(&self, job: &Job) -> Result<bool> {
        check_identity(&job.name, job.target.value())?;
        job.params.validate()?;
        let mut job = job.clone();
        job.schedule = validate_schedule(&job.schedule)?;
        job.name = job.name.trim().to_string();
        job.notification_targets = dedup_list(job.notification_targets);
        job.export_formats = dedup_list(
            job.export_formats
                .into_iter()
                .map(|f| f.to_ascii_lowercase())
                .collect(),
        );
        Ok(self.ledger().update_job(&job)?)
    }

    pub fn delete(&self, id: &JobId) -> Result<bool> {
        Ok(self.ledger().delete_job(id)?)
    }

    /// Stop automatic triggering.
    pub fn pause(&self, id: &JobId) -> Result<bool> {
        Ok(self.ledger().set_job_status(id, JobStatus::Paused)?)
    }

    /// Make a job eligible for automatic triggering again.
    pub fn resume(&self, id: &JobId) -> Result<bool> {
        Ok(self.ledger().set_job_status(id, JobStatus::Active)?)
    }

    /// Execute a job now, whatever its status or schedule.
    ///
    /// `Ok(None)` when no such job exists; `AlreadyRunning` when an
    /// execution of it is in flight.
    #[instrument(skip(self), fields(job_id = %id))]
    pub async fn run_now(&self, id: &JobId) -> Result<Option<RunRecord>> {
        let Some(job) = self.get(id)? else {
            return Ok(None);
        };
        let _guard = self
            .runner
            .running()
            .try_acquire(&job.id)
            .ok_or_else(|| SchedulerError::AlreadyRunning { id: id.to_string() })?;
        info!(job = %job.name, "manual run");
        Ok(Some(self.runner.execute(&job).await))
    }

    pub fn list_runs_for_job(&self, job_id: &JobId, limit: usize) -> Result<Vec<RunRecord>> {
        Ok(self.ledger().list_runs_for_job(job_id, limit)?)
    }

    pub fn list_all_runs(&self, limit: usize) -> Result<Vec<RunRecord>> {
        Ok(self.ledger().list_all_runs(limit)?)
    }
}

fn check_identity(name: &str, target: &str) -> std::result::Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if target.trim().is_empty() {
        return Err(ValidationError::EmptyTarget);
    }
    Ok(())
}
