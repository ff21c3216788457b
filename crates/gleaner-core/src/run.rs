//! Run-history types: one [`RunRecord`] per attempted execution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{Job, JobId, RunId};

/// Outcome of a run. `Running` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
    Partial,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
            RunStatus::Partial => "partial",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "running" => Ok(RunStatus::Running),
            "success" => Ok(RunStatus::Success),
            "failed" => Ok(RunStatus::Failed),
            "partial" => Ok(RunStatus::Partial),
            other => Err(format!("unknown run status: {other}")),
        }
    }
}

/// The terminal condition that ended one collection session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    MaxItemsReached,
    DateLimitReached,
    NoNewItems,
    Blocked,
    Error,
    /// The source reported that the feed has no further positions.
    Completed,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::MaxItemsReached => "max_items_reached",
            StopReason::DateLimitReached => "date_limit_reached",
            StopReason::NoNewItems => "no_new_items",
            StopReason::Blocked => "blocked",
            StopReason::Error => "error",
            StopReason::Completed => "completed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for StopReason {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "max_items_reached" => Ok(StopReason::MaxItemsReached),
            "date_limit_reached" => Ok(StopReason::DateLimitReached),
            "no_new_items" => Ok(StopReason::NoNewItems),
            "blocked" => Ok(StopReason::Blocked),
            "error" => Ok(StopReason::Error),
            "completed" => Ok(StopReason::Completed),
            other => Err(format!("unknown stop reason: {other}")),
        }
    }
}

/// A timestamped progress message captured during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub at: DateTime<Utc>,
    pub message: String,
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.at.format("%H:%M:%S"), self.message)
    }
}

/// Append-once audit entry for one execution.
///
/// Persisted in `Running` state before any collection work begins and
/// replaced, in full, exactly once when the execution finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: RunId,
    pub job_id: JobId,
    /// Snapshot of the job name so history survives renames and deletion.
    pub job_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub stop_reason: Option<StopReason>,
    pub items_collected: u32,
    pub exported_artifacts: Vec<String>,
    pub notification_sent: bool,
    /// Set only when `status` is `Failed`.
    pub error_message: Option<String>,
    pub log_lines: Vec<LogLine>,
}

impl RunRecord {
    /// Fresh placeholder for an execution of `job` starting at `at`.
    pub fn running(job: &Job, at: DateTime<Utc>) -> Self {
        Self {
            id: RunId::new(),
            job_id: job.id.clone(),
            job_name: job.name.clone(),
            started_at: at,
            finished_at: None,
            status: RunStatus::Running,
            stop_reason: None,
            items_collected: 0,
            exported_artifacts: Vec::new(),
            notification_sent: false,
            error_message: None,
            log_lines: Vec::new(),
        }
    }

    pub fn log(&mut self, at: DateTime<Utc>, message: impl Into<String>) {
        self.log_lines.push(LogLine {
            at,
            message: message.into(),
        });
    }

    /// Move to a terminal status. `Failed` keeps whatever `error_message`
    /// was set; any other status clears it.
    pub fn finish(&mut self, status: RunStatus, at: DateTime<Utc>) {
        debug_assert!(status.is_terminal(), "finish() needs a terminal status");
        self.status = status;
        self.finished_at = Some(at);
        if status != RunStatus::Failed {
            self.error_message = None;
        }
    }

    /// Shorthand for a `Failed` finish carrying `message`.
    pub fn fail(&mut self, message: impl Into<String>, at: DateTime<Utc>) {
        self.error_message = Some(message.into());
        self.finish(RunStatus::Failed, at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CollectionParams, NewJob, Schedule, Target};
    use chrono::TimeZone;

    fn job() -> Job {
        NewJob {
            name: "digest".into(),
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
        .into_job(Utc::now())
    }

    #[test]
    fn running_record_snapshots_job() {
        let at = Utc.with_ymd_and_hms(2026, 5, 1, 7, 0, 0).unwrap();
        let job = job();
        let run = RunRecord::running(&job, at);
        assert_eq!(run.status, RunStatus::Running);
        assert_eq!(run.job_id, job.id);
        assert_eq!(run.job_name, "digest");
        assert!(run.finished_at.is_none());
    }

    #[test]
    fn fail_sets_message_and_finish_time() {
        let at = Utc.with_ymd_and_hms(2026, 5, 1, 7, 0, 0).unwrap();
        let mut run = RunRecord::running(&job(), at);
        run.fail("session expired", at);
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.error_message.as_deref(), Some("session expired"));
        assert_eq!(run.finished_at, Some(at));
    }

    #[test]
    fn log_line_renders_clock_time() {
        let line = LogLine {
            at: Utc.with_ymd_and_hms(2026, 5, 1, 7, 3, 9).unwrap(),
            message: "scroll #2".into(),
        };
        assert_eq!(line.to_string(), "[07:03:09] scroll #2");
    }

    #[test]
    fn stop_reason_string_forms_match() {
        for reason in [
            StopReason::MaxItemsReached,
            StopReason::DateLimitReached,
            StopReason::NoNewItems,
            StopReason::Blocked,
            StopReason::Error,
            StopReason::Completed,
        ] {
            assert_eq!(reason.to_string().parse::<StopReason>(), Ok(reason));
        }
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Partial.is_terminal());
    }
}
