use std::sync::Arc;
use std::time::Duration;

use gleaner_core::RunRecord;
use tokio::{sync::watch, task::JoinSet};
use tracing::{debug, error, info, warn};

use crate::{error::Result, runner::JobRunner, schedule::is_due};

/// Polling loop: evaluates active jobs once per tick and launches each due
/// one as an independent task.
pub struct SchedulerEngine {
    runner: Arc<JobRunner>,
    tick_every: Duration,
    tasks: JoinSet<RunRecord>,
}

impl SchedulerEngine {
    pub fn new(runner: Arc<JobRunner>, tick_every: Duration) -> Self {
        Self {
            runner,
            tick_every,
            tasks: JoinSet::new(),
        }
    }

    /// Executions launched by this engine that have not been reaped yet.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Main event loop. Ticks until `shutdown` broadcasts `true`, then waits
    /// for every in-flight execution to finish.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(tick_secs = self.tick_every.as_secs(), "scheduler engine started");
        self.recover_interrupted_runs();

        let mut interval = tokio::time::interval(self.tick_every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick() {
                        error!("scheduler tick error: {e}");
                    }
                }
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    Self::reaped(joined);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("scheduler engine shutting down");
                        break;
                    }
                }
            }
        }

        self.drain().await;
        info!("scheduler engine stopped");
    }

    /// Evaluate every active job against the clock and launch the due ones.
    /// Returns how many executions were started.
    pub fn tick(&mut self) -> Result<usize> {
        let now = self.runner.clock().now();
        let jobs = self.runner.ledger().list_active_jobs()?;

        let mut launched = 0;
        for job in jobs {
            if !is_due(&job.schedule, job.last_run, now) {
                continue;
            }
            let Some(guard) = self.runner.running().try_acquire(&job.id) else {
                debug!(job_id = %job.id, "previous execution still running; skipped");
                continue;
            };
            info!(job_id = %job.id, job = %job.name, "job due");

            let runner = Arc::clone(&self.runner);
            self.tasks.spawn(async move {
                let _guard = guard;
                runner.execute(&job).await
            });
            launched += 1;
        }
        Ok(launched)
    }

    /// Await every in-flight execution.
    pub async fn drain(&mut self) {
        if !self.tasks.is_empty() {
            info!(count = self.tasks.len(), "waiting for in-flight executions");
        }
        while let Some(joined) = self.tasks.join_next().await {
            Self::reaped(joined);
        }
    }

    fn reaped(joined: std::result::Result<RunRecord, tokio::task::JoinError>) {
        match joined {
            Ok(run) => debug!(run_id = %run.id, status = %run.status, "execution reaped"),
            Err(e) => error!("execution task aborted: {e}"),
        }
    }

    /// Runs a previous process left in `running` can never finish now.
    fn recover_interrupted_runs(&self) {
        let now = self.runner.clock().now();
        match self.runner.ledger().fail_interrupted_runs(now) {
            Ok(0) => {}
            Ok(n) => warn!(count = n, "interrupted runs closed out on startup"),
            Err(e) => error!("interrupted-run recovery failed: {e}"),
        }
    }
}
