use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashSet;
use futures_util::FutureExt;
use gleaner_collector::{
    query::build_locator, CollectionController, CollectionResult, ControllerConfig, ItemSource,
    SourceError,
};
use gleaner_core::{config::CollectorConfig, Job, JobId, RunRecord, RunStatus, StopReason};
use gleaner_ledger::Ledger;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    clock::Clock,
    delivery::{Exporter, Notifier, RunSummary},
    error::ExecutionError,
};

/// Opens a fresh [`ItemSource`] for each execution.
#[async_trait]
pub trait SourceFactory: Send + Sync {
    async fn open_source(&self, job: &Job) -> Result<Box<dyn ItemSource>, SourceError>;
}

/// In-memory set of job ids with an execution in flight.
///
/// Cloning shares the set. Membership is taken with [`RunningJobs::try_acquire`]
/// and released when the returned guard drops.
#[derive(Debug, Clone, Default)]
pub struct RunningJobs {
    ids: Arc<DashSet<JobId>>,
}

impl RunningJobs {
    /// Claim `id`, or `None` when an execution of it is already running.
    pub fn try_acquire(&self, id: &JobId) -> Option<RunGuard> {
        if self.ids.insert(id.clone()) {
            Some(RunGuard {
                ids: Arc::clone(&self.ids),
                id: id.clone(),
            })
        } else {
            None
        }
    }

    pub fn is_running(&self, id: &JobId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Releases its job id from [`RunningJobs`] on drop.
#[derive(Debug)]
pub struct RunGuard {
    ids: Arc<DashSet<JobId>>,
    id: JobId,
}

impl RunGuard {
    pub fn job_id(&self) -> &JobId {
        &self.id
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.ids.remove(&self.id);
    }
}

/// Executes one job end to end and records the outcome.
pub struct JobRunner {
    ledger: Arc<Ledger>,
    sources: Arc<dyn SourceFactory>,
    exporter: Option<Arc<dyn Exporter>>,
    notifier: Option<Arc<dyn Notifier>>,
    clock: Arc<dyn Clock>,
    controller: CollectionController,
    search_base_url: String,
    running: RunningJobs,
}

impl JobRunner {
    pub fn new(
        ledger: Arc<Ledger>,
        sources: Arc<dyn SourceFactory>,
        clock: Arc<dyn Clock>,
        collector: &CollectorConfig,
    ) -> Self {
        Self {
            ledger,
            sources,
            exporter: None,
            notifier: None,
            clock,
            controller: CollectionController::new(ControllerConfig::from(collector)),
            search_base_url: collector.search_base_url.clone(),
            running: RunningJobs::default(),
        }
    }

    pub fn with_exporter(mut self, exporter: Arc<dyn Exporter>) -> Self {
        self.exporter = Some(exporter);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_controller(mut self, config: ControllerConfig) -> Self {
        self.controller = CollectionController::new(config);
        self
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn running(&self) -> &RunningJobs {
        &self.running
    }

    /// Run `job` once and return its terminal record.
    ///
    /// Never fails: every error, including a panic in a collaborator, is
    /// folded into the record. Callers hold the
    /// job's [`RunGuard`] for the duration.
    #[instrument(skip(self, job), fields(job_id = %job.id, job = %job.name))]
    pub async fn execute(&self, job: &Job) -> RunRecord {
        let started_at = self.clock.now();
        let mut run = RunRecord::running(job, started_at);
        if let Err(e) = self.ledger.save_run(&run) {
            error!(run_id = %run.id, "could not persist running placeholder: {e}");
        }
        info!(run_id = %run.id, "execution started");

        let outcome = AssertUnwindSafe(self.collect_and_deliver(job, &mut run))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(ExecutionError::Panicked(panic_message(&*panic))));
        match outcome {
            Ok(status) => run.finish(status, self.clock.now()),
            Err(e) => {
                warn!(run_id = %run.id, error = %e, "execution failed");
                run.log(self.clock.now(), e.to_string());
                run.fail(e.to_string(), self.clock.now());
            }
        }

        if let Err(e) = self.ledger.save_run(&run) {
            error!(run_id = %run.id, "could not persist terminal run: {e}");
        }

        let complete = job.schedule.is_once() && run.status != RunStatus::Failed;
        if let Err(e) = self.ledger.record_attempt(&job.id, started_at, complete) {
            error!("could not record attempt: {e}");
        }

        info!(
            run_id = %run.id,
            status = %run.status,
            items = run.items_collected,
            "execution finished"
        );
        run
    }

    async fn collect_and_deliver(
        &self,
        job: &Job,
        run: &mut RunRecord,
    ) -> Result<RunStatus, ExecutionError> {
        let deadline = self.controller.config().call_timeout;

        let mut source = within(deadline, "open_source", self.sources.open_source(job)).await?;
        let authenticated = within(deadline, "is_authenticated", source.is_authenticated()).await?;
        if !authenticated {
            return Err(ExecutionError::AuthenticationRequired(
                "item source has no logged-in session".into(),
            ));
        }

        let started_at = run.started_at;
        let locator = build_locator(&job.target, &job.params, &self.search_base_url, started_at);
        let clock = &self.clock;
        let result = {
            let mut progress = |line: String| run.log(clock.now(), line);
            self.controller
                .run(source.as_mut(), &job.params, &locator, started_at, &mut progress)
                .await
        };
        drop(source);

        run.items_collected = result.item_count();
        run.stop_reason = Some(result.stop_reason);
        run.log(
            self.clock.now(),
            format!("collected {} items ({})", run.items_collected, result.stop_reason),
        );
        for e in &result.errors {
            run.log(self.clock.now(), format!("soft error: {e}"));
        }

        match result.stop_reason {
            StopReason::Error => {
                return Err(ExecutionError::Collection(
                    result
                        .fatal_error
                        .clone()
                        .unwrap_or_else(|| "unknown collection error".into()),
                ))
            }
            StopReason::Blocked => return Err(ExecutionError::Blocked),
            _ => {}
        }

        let mut soft_errors = result.errors.len();
        soft_errors += self.export(job, run, &result).await;
        soft_errors += self.notify(job, run, &result).await;

        Ok(if soft_errors == 0 {
            RunStatus::Success
        } else {
            RunStatus::Partial
        })
    }

    /// Export every requested format. Returns the number of failures.
    async fn export(&self, job: &Job, run: &mut RunRecord, result: &CollectionResult) -> usize {
        if job.export_formats.is_empty() {
            return 0;
        }
        let Some(exporter) = &self.exporter else {
            run.log(self.clock.now(), "no exporter configured; export skipped");
            return job.export_formats.len();
        };

        let deadline = self.controller.config().call_timeout;
        let mut failures = 0;
        for format in &job.export_formats {
            let outcome = tokio::time::timeout(
                deadline,
                exporter.export(format, job, &run.id, result),
            )
            .await;
            match outcome {
                Ok(Ok(artifact)) => {
                    debug!(%format, %artifact, "exported");
                    run.log(self.clock.now(), format!("exported {format}: {artifact}"));
                    run.exported_artifacts.push(artifact);
                }
                Ok(Err(e)) => {
                    warn!(%format, error = %e, "export failed");
                    run.log(self.clock.now(), format!("export {format} failed: {e}"));
                    failures += 1;
                }
                Err(_) => {
                    warn!(%format, "export timed out");
                    run.log(self.clock.now(), format!("export {format} timed out"));
                    failures += 1;
                }
            }
        }
        failures
    }

    /// Notify recipients unless this is a dry run. Returns 1 on failure.
    async fn notify(&self, job: &Job, run: &mut RunRecord, result: &CollectionResult) -> usize {
        if job.notification_targets.is_empty() {
            return 0;
        }
        if job.dry_run {
            run.log(self.clock.now(), "dry run: notification skipped");
            return 0;
        }
        let Some(notifier) = &self.notifier else {
            run.log(
                self.clock.now(),
                format!(
                    "no notifier configured; {} recipient(s) not notified",
                    job.notification_targets.len()
                ),
            );
            return 0;
        };

        let summary = RunSummary::new(job, &run.id, result);
        let outcome = tokio::time::timeout(
            self.controller.config().call_timeout,
            notifier.notify(&job.notification_targets, &summary, &run.exported_artifacts),
        )
        .await;
        match outcome {
            Ok(Ok(true)) => {
                run.notification_sent = true;
                run.log(
                    self.clock.now(),
                    format!("notified {} recipient(s)", job.notification_targets.len()),
                );
                0
            }
            Ok(Ok(false)) => {
                run.log(self.clock.now(), "notifier declined to send");
                1
            }
            Ok(Err(e)) => {
                warn!(error = %e, "notification failed");
                run.log(self.clock.now(), format!("notification failed: {e}"));
                1
            }
            Err(_) => {
                warn!("notification timed out");
                run.log(self.clock.now(), "notification timed out");
                1
            }
        }
    }
}

/// Apply the per-call deadline to a source operation.
async fn within<T>(
    deadline: Duration,
    call: &'static str,
    fut: impl Future<Output = Result<T, SourceError>>,
) -> Result<T, SourceError> {
    tokio::time::timeout(deadline, fut)
        .await
        .unwrap_or_else(|_| {
            Err(SourceError::Timeout {
                call,
                ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
            })
        })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
