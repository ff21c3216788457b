#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use gleaner_collector::{
    CollectionResult, ControllerConfig, Item, ItemSource, Position, SourceError,
};
use gleaner_core::{
    config::CollectorConfig, CollectionParams, Job, NewJob, RunId, Schedule, Target,
};
use gleaner_ledger::Ledger;
use gleaner_scheduler::{
    DeliveryError, Exporter, JobRunner, JobService, ManualClock, Notifier, RunSummary,
    SourceFactory,
};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 4, 7, 0, 0).unwrap()
}

/// Feed of fixed pages; advancing past the last one ends the feed.
pub struct PagedSource {
    pages: Vec<Vec<Item>>,
    authenticated: bool,
    blocked: bool,
    transient_page: Option<u64>,
}

#[async_trait]
impl ItemSource for PagedSource {
    async fn is_authenticated(&mut self) -> Result<bool, SourceError> {
        Ok(self.authenticated)
    }

    async fn open(&mut self, _locator: &str) -> Result<Position, SourceError> {
        Ok(Position::start())
    }

    async fn fetch_visible(&mut self, position: Position) -> Result<Vec<Item>, SourceError> {
        if self.transient_page == Some(position.0) {
            return Err(SourceError::Transient("feed hiccup".into()));
        }
        Ok(self
            .pages
            .get(position.0 as usize)
            .cloned()
            .unwrap_or_default())
    }

    async fn advance(&mut self, position: Position) -> Result<Option<Position>, SourceError> {
        let next = position.next();
        Ok(((next.0 as usize) < self.pages.len()).then_some(next))
    }

    async fn has_block_signal(&mut self) -> Result<bool, SourceError> {
        Ok(self.blocked)
    }
}

pub struct FakeSources {
    pub authenticated: bool,
    pub blocked: bool,
    pub pages: Vec<Vec<Item>>,
    /// Page whose fetch fails with a transient error.
    pub transient_page: Option<u64>,
    pub panic_on_open: bool,
    pub opened: AtomicUsize,
}

impl FakeSources {
    pub fn new() -> Self {
        Self {
            authenticated: true,
            blocked: false,
            pages: vec![
                vec![Item::new("a"), Item::new("b")],
                vec![Item::new("b"), Item::new("c")],
            ],
            transient_page: None,
            panic_on_open: false,
            opened: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SourceFactory for FakeSources {
    async fn open_source(&self, _job: &Job) -> Result<Box<dyn ItemSource>, SourceError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_open {
            panic!("source driver crashed");
        }
        Ok(Box::new(PagedSource {
            pages: self.pages.clone(),
            authenticated: self.authenticated,
            blocked: self.blocked,
            transient_page: self.transient_page,
        }))
    }
}

#[derive(Default)]
pub struct RecordingExporter {
    pub failing: Vec<String>,
    pub calls: Mutex<Vec<String>>,
}

#[async_trait]
impl Exporter for RecordingExporter {
    async fn export(
        &self,
        format: &str,
        job: &Job,
        _run_id: &RunId,
        result: &CollectionResult,
    ) -> Result<String, DeliveryError> {
        self.calls.lock().unwrap().push(format.to_string());
        if self.failing.iter().any(|f| f == format) {
            return Err(DeliveryError::UnsupportedFormat(format.to_string()));
        }
        Ok(format!("/exports/{}_{}.{format}", job.name, result.items.len()))
    }
}

pub struct FakeNotifier {
    pub answer: bool,
    pub calls: AtomicUsize,
}

impl FakeNotifier {
    pub fn answering(answer: bool) -> Self {
        Self {
            answer,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn notify(
        &self,
        recipients: &[String],
        summary: &RunSummary,
        _artifacts: &[String],
    ) -> Result<bool, DeliveryError> {
        assert!(!recipients.is_empty());
        assert!(summary.subject().contains(&summary.job_name));
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.answer)
    }
}

pub struct Harness {
    pub ledger: Arc<Ledger>,
    pub clock: Arc<ManualClock>,
    pub runner: Arc<JobRunner>,
    pub service: JobService,
}

pub fn harness(
    sources: Arc<FakeSources>,
    exporter: Option<Arc<RecordingExporter>>,
    notifier: Option<Arc<FakeNotifier>>,
) -> Harness {
    let ledger = Arc::new(Ledger::open_in_memory().unwrap());
    let clock = Arc::new(ManualClock::new(t0()));
    let mut runner = JobRunner::new(ledger.clone(), sources, clock.clone(), &CollectorConfig::default())
        .with_controller(ControllerConfig {
            empty_fetch_limit: 2,
            min_interval: Duration::ZERO,
            block_check_every: 1,
            call_timeout: Duration::from_secs(5),
        });
    if let Some(exporter) = exporter {
        runner = runner.with_exporter(exporter);
    }
    if let Some(notifier) = notifier {
        runner = runner.with_notifier(notifier);
    }
    let runner = Arc::new(runner);
    Harness {
        ledger,
        clock,
        service: JobService::new(runner.clone()),
        runner,
    }
}

pub fn daily_at_seven(name: &str) -> NewJob {
    NewJob {
        name: name.into(),
        target: Target::Query("rust".into()),
        params: CollectionParams::default(),
        schedule: Schedule::Recurring {
            cron: "0 7 * * *".into(),
            timezone: "UTC".into(),
        },
        notification_targets: vec![],
        export_formats: vec![],
        dry_run: false,
    }
}

pub fn once_at(name: &str, run_at: DateTime<Utc>) -> NewJob {
    NewJob {
        schedule: Schedule::Once {
            run_at,
            timezone: "UTC".into(),
        },
        ..daily_at_seven(name)
    }
}
