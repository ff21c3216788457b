use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::NaiveDateTime;
use gleaner_core::{CollectionParams, Job, JobId, NewJob, RunRecord, Target};
use gleaner_scheduler::{schedule, validate_cron, SchedulerEngine, CRON_EXAMPLES};
use tokio::sync::watch;
use tracing::info;

use crate::{
    app::App,
    cli::{CronCommand, JobAddArgs, JobCommand, RunsArgs},
};

pub async fn serve(app: &App) -> anyhow::Result<()> {
    let lock = app.lock_store()?;
    info!(lock = %lock.path().display(), "store locked for scheduling");
    let tick = Duration::from_secs(app.config.scheduler.tick_secs.max(1));
    let engine = SchedulerEngine::new(Arc::clone(&app.runner), tick);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(engine.run(shutdown_rx));

    tokio::signal::ctrl_c()
        .await
        .context("listening for ctrl-c")?;
    info!("shutdown requested; draining executions");
    let _ = shutdown_tx.send(true);
    handle.await?;
    drop(lock);
    Ok(())
}

pub async fn job(app: &App, command: JobCommand) -> anyhow::Result<()> {
    let service = &app.service;
    match command {
        JobCommand::Add(args) => {
            let new = args.into_new_job(&app.config.scheduler.default_timezone)?;
            let job = service.create(new)?;
            println!("created {}", job.id);
            print_job(&job);
        }
        JobCommand::List { active } => {
            let jobs = if active {
                service.list_active()?
            } else {
                service.list_all()?
            };
            if jobs.is_empty() {
                println!("no jobs");
            }
            for job in &jobs {
                println!(
                    "{}  {:<9} {:<24} {}",
                    job.id, job.status, job.name, job.schedule
                );
            }
        }
        JobCommand::Show { id } => {
            let id = JobId::from(id);
            let Some(job) = service.get(&id)? else {
                bail!("no job with id {id}");
            };
            print_job(&job);
            let runs = service.list_runs_for_job(&id, 5)?;
            if !runs.is_empty() {
                println!("recent runs:");
                for run in &runs {
                    print_run_line(run);
                }
            }
        }
        JobCommand::Pause { id } => {
            let changed = service.pause(&JobId::from(id.as_str()))?;
            report(changed, "paused", &id)?;
        }
        JobCommand::Resume { id } => {
            let changed = service.resume(&JobId::from(id.as_str()))?;
            report(changed, "resumed", &id)?;
        }
        JobCommand::Delete { id } => {
            let changed = service.delete(&JobId::from(id.as_str()))?;
            report(changed, "deleted", &id)?;
        }
        JobCommand::Run { id } => {
            let _lock = app.lock_store()?;
            let Some(run) = service.run_now(&JobId::from(id.as_str())).await? else {
                bail!("no job with id {id}");
            };
            print_run_line(&run);
            for line in &run.log_lines {
                println!("  {line}");
            }
            for artifact in &run.exported_artifacts {
                println!("  artifact: {artifact}");
            }
        }
    }
    Ok(())
}

pub fn runs(app: &App, args: RunsArgs) -> anyhow::Result<()> {
    let runs = match args.job {
        Some(id) => app.service.list_runs_for_job(&JobId::from(id), args.limit)?,
        None => app.service.list_all_runs(args.limit)?,
    };
    if runs.is_empty() {
        println!("no runs");
    }
    for run in &runs {
        print_run_line(run);
    }
    Ok(())
}

pub fn cron(command: CronCommand) -> anyhow::Result<()> {
    match command {
        CronCommand::Check { expr } => {
            let parsed = validate_cron(&expr)?;
            println!("ok: {parsed}");
        }
        CronCommand::Examples => {
            for example in CRON_EXAMPLES {
                println!("{:<16} {}", example.expr, example.label);
            }
        }
    }
    Ok(())
}

impl JobAddArgs {
    /// Turn CLI flags into a job definition. Schedule validation happens here
    /// so bad input fails before the ledger is touched.
    pub fn into_new_job(self, default_tz: &str) -> anyhow::Result<NewJob> {
        let tz = self.tz.as_deref().unwrap_or(default_tz);
        let schedule = match (&self.cron, &self.at) {
            (Some(cron), _) => schedule::recurring(cron, tz)?,
            (None, Some(at)) => schedule::once_local(parse_local(at)?, tz)?,
            (None, None) => bail!("either --cron or --at is required"),
        };
        let target = match (self.query, self.url) {
            (_, Some(url)) => Target::Url(url),
            (Some(query), None) => Target::Query(query),
            (None, None) => bail!("either --query or --url is required"),
        };

        Ok(NewJob {
            name: self.name,
            target,
            params: CollectionParams {
                sort: self.sort.into(),
                max_items: (!self.unbounded).then_some(self.max_items),
                max_age_minutes: self.max_age_minutes,
                max_age_days: self.max_age_days,
                include_reposts: !self.no_reposts,
                include_replies: !self.no_replies,
                include_quotes: !self.no_quotes,
                language: self.lang,
            },
            schedule,
            notification_targets: self.notify,
            export_formats: self.formats,
            dry_run: self.dry_run,
        })
    }
}

fn parse_local(text: &str) -> anyhow::Result<NaiveDateTime> {
    ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text.trim(), fmt).ok())
        .with_context(|| format!("cannot read '{text}' as a local date and time (YYYY-MM-DD HH:MM)"))
}

fn report(changed: bool, verb: &str, id: &str) -> anyhow::Result<()> {
    if !changed {
        bail!("no job with id {id}");
    }
    println!("{verb} {id}");
    Ok(())
}

fn print_job(job: &Job) {
    println!("name:      {}", job.name);
    println!("status:    {}", job.status);
    println!(
        "target:    {} ({})",
        job.target.value(),
        if job.target.is_url() { "url" } else { "query" }
    );
    println!("schedule:  {}", job.schedule);
    match job.params.max_items {
        Some(n) => println!("max items: {n}"),
        None => println!("max items: unbounded"),
    }
    if !job.export_formats.is_empty() {
        println!("formats:   {}", job.export_formats.join(", "));
    }
    if !job.notification_targets.is_empty() {
        println!("notify:    {}", job.notification_targets.join(", "));
    }
    if job.dry_run {
        println!("dry run:   yes");
    }
    match job.last_run {
        Some(at) => println!("last run:  {}", at.to_rfc3339()),
        None => println!("last run:  never"),
    }
}

fn print_run_line(run: &RunRecord) {
    let stop = run
        .stop_reason
        .map(|r| r.to_string())
        .unwrap_or_else(|| "-".into());
    print!(
        "{}  {:<8} {:<20} items={:<5} stop={}",
        run.started_at.format("%Y-%m-%d %H:%M:%S"),
        run.status,
        run.job_name,
        run.items_collected,
        stop
    );
    match &run.error_message {
        Some(err) => println!("  error: {err}"),
        None => println!(),
    }
}
