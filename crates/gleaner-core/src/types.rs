use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::ValidationError;

/// Unique identifier for a job (UUIDv7, time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique identifier for one execution of a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RunId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// What a job collects: a search expression or a ready-made resource locator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Target {
    Query(String),
    Url(String),
}

impl Target {
    pub fn value(&self) -> &str {
        match self {
            Target::Query(v) | Target::Url(v) => v,
        }
    }

    pub fn is_url(&self) -> bool {
        matches!(self, Target::Url(_))
    }

    /// Rebuild from the two persisted columns.
    pub fn from_parts(value: String, is_url: bool) -> Self {
        if is_url {
            Target::Url(value)
        } else {
            Target::Query(value)
        }
    }
}

/// Feed ordering requested from the source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    #[default]
    Latest,
    Top,
}

/// Immutable configuration for one collection run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionParams {
    #[serde(default)]
    pub sort: SortMode,
    /// `None` means unbounded by count.
    #[serde(default = "default_max_items")]
    pub max_items: Option<u32>,
    /// Age window in minutes. Takes precedence over `max_age_days`.
    #[serde(default)]
    pub max_age_minutes: Option<u32>,
    #[serde(default)]
    pub max_age_days: Option<u32>,
    #[serde(default = "bool_true")]
    pub include_reposts: bool,
    #[serde(default = "bool_true")]
    pub include_replies: bool,
    #[serde(default = "bool_true")]
    pub include_quotes: bool,
    /// ISO language code filter, e.g. `"pt"`.
    #[serde(default)]
    pub language: Option<String>,
}

impl Default for CollectionParams {
    fn default() -> Self {
        Self {
            sort: SortMode::Latest,
            max_items: default_max_items(),
            max_age_minutes: None,
            max_age_days: None,
            include_reposts: true,
            include_replies: true,
            include_quotes: true,
            language: None,
        }
    }
}

impl CollectionParams {
    /// The configured age window, minutes winning over days.
    pub fn age_window(&self) -> Option<Duration> {
        match (self.max_age_minutes, self.max_age_days) {
            (Some(m), _) => Some(Duration::minutes(i64::from(m))),
            (None, Some(d)) => Some(Duration::days(i64::from(d))),
            (None, None) => None,
        }
    }

    /// Oldest acceptable item instant for a session starting at `now`.
    ///
    /// A window reaching past the representable range means no cutoff.
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.age_window().and_then(|w| now.checked_sub_signed(w))
    }

    /// Reject age windows longer than [`MAX_AGE_DAYS`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(value) = self.max_age_minutes.filter(|m| *m > MAX_AGE_MINUTES) {
            return Err(ValidationError::AgeWindowTooLarge {
                field: "max_age_minutes",
                value,
                max: MAX_AGE_MINUTES,
            });
        }
        if let Some(value) = self.max_age_days.filter(|d| *d > MAX_AGE_DAYS) {
            return Err(ValidationError::AgeWindowTooLarge {
                field: "max_age_days",
                value,
                max: MAX_AGE_DAYS,
            });
        }
        Ok(())
    }
}

/// Longest accepted age window, in days (about a century).
pub const MAX_AGE_DAYS: u32 = 36_500;
pub const MAX_AGE_MINUTES: u32 = MAX_AGE_DAYS * 24 * 60;

fn default_max_items() -> Option<u32> {
    Some(3000)
}

fn bool_true() -> bool {
    true
}

/// When a job should run. Every variant carries the IANA zone its
/// due-time comparisons are evaluated in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Schedule {
    /// Fire once, at or after `run_at`.
    Once {
        run_at: DateTime<Utc>,
        timezone: String,
    },
    /// Fire whenever the five-field cron expression matches the local minute.
    Recurring { cron: String, timezone: String },
}

impl Schedule {
    pub fn timezone(&self) -> &str {
        match self {
            Schedule::Once { timezone, .. } | Schedule::Recurring { timezone, .. } => timezone,
        }
    }

    pub fn is_once(&self) -> bool {
        matches!(self, Schedule::Once { .. })
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schedule::Once { run_at, timezone } => {
                write!(f, "once at {} ({timezone})", run_at.to_rfc3339())
            }
            Schedule::Recurring { cron, timezone } => write!(f, "cron '{cron}' ({timezone})"),
        }
    }
}

/// Lifecycle state of a job definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Eligible for automatic triggering.
    Active,
    /// Suspended by the user; reversible.
    Paused,
    /// A one-shot job that has executed.
    Completed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Active => "active",
            JobStatus::Paused => "paused",
            JobStatus::Completed => "completed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(JobStatus::Active),
            "paused" => Ok(JobStatus::Paused),
            "completed" => Ok(JobStatus::Completed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// A persisted, user-defined collection task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    pub target: Target,
    pub params: CollectionParams,
    pub schedule: Schedule,
    /// Recipient addresses, order-preserving and without duplicates.
    pub notification_targets: Vec<String>,
    /// Opaque format tags handed to the exporter (`"json"`, `"csv"`, ...).
    pub export_formats: Vec<String>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    /// Start of the most recent execution. Written by the runner only.
    pub last_run: Option<DateTime<Utc>>,
    /// When true the notification step is skipped.
    pub dry_run: bool,
}

/// Creation input for a job; identity and bookkeeping are assigned on insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewJob {
    pub name: String,
    pub target: Target,
    #[serde(default)]
    pub params: CollectionParams,
    pub schedule: Schedule,
    #[serde(default)]
    pub notification_targets: Vec<String>,
    #[serde(default)]
    pub export_formats: Vec<String>,
    #[serde(default)]
    pub dry_run: bool,
}

impl NewJob {
    /// Materialise an `Active` job created at `now`.
    pub fn into_job(self, now: DateTime<Utc>) -> Job {
        Job {
            id: JobId::new(),
            name: self.name.trim().to_string(),
            target: self.target,
            params: self.params,
            schedule: self.schedule,
            notification_targets: dedup_list(self.notification_targets),
            export_formats: dedup_list(
                self.export_formats
                    .into_iter()
                    .map(|f| f.to_ascii_lowercase())
                    .collect(),
            ),
            status: JobStatus::Active,
            created_at: now,
            last_run: None,
            dry_run: self.dry_run,
        }
    }
}

/// Trim entries, drop blanks and duplicates, keep first-seen order.
pub fn dedup_list(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let item = item.trim();
        if !item.is_empty() && !out.iter().any(|e| e == item) {
            out.push(item.to_string());
        }
    }
    out
}
