use chrono::{DateTime, Utc};
use gleaner_core::{JobId, LogLine, RunId, RunRecord};
use rusqlite::OptionalExtension;
use tracing::{instrument, warn};

use crate::codec::{decode_enum, decode_opt_time, decode_time, encode_time};
use crate::error::Result;
use crate::jobs::Ledger;

const RUN_COLUMNS: &str = "id, job_id, job_name, started_at, finished_at, status, stop_reason,
                           items_collected, artifacts, notification_sent, error_message, logs";

/// Message stored on runs that a crashed process left in `running`.
pub const INTERRUPTED_MESSAGE: &str = "interrupted before completion";

impl Ledger {
    /// Insert or fully replace a run record.
    ///
    /// Called once with the `Running` placeholder and once more with the
    /// terminal record; the second call overwrites every column.
    #[instrument(skip(self, run), fields(run_id = %run.id, job_id = %run.job_id, status = %run.status))]
    pub fn save_run(&self, run: &RunRecord) -> Result<()> {
        let artifacts = serde_json::to_string(&run.exported_artifacts)?;
        let logs = serde_json::to_string(&run.log_lines)?;
        let db = self.conn()?;
        db.execute(
            "INSERT OR REPLACE INTO run_history
             (id, job_id, job_name, started_at, finished_at, status, stop_reason,
              items_collected, artifacts, notification_sent, error_message, logs)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12)",
            rusqlite::params![
                run.id.as_str(),
                run.job_id.as_str(),
                run.job_name,
                encode_time(&run.started_at),
                run.finished_at.as_ref().map(encode_time),
                run.status.to_string(),
                run.stop_reason.map(|r| r.to_string()),
                run.items_collected,
                artifacts,
                run.notification_sent,
                run.error_message,
                logs,
            ],
        )?;
        Ok(())
    }

    pub fn get_run(&self, id: &RunId) -> Result<Option<RunRecord>> {
        let db = self.conn()?;
        let raw = db
            .query_row(
                &format!("SELECT {RUN_COLUMNS} FROM run_history WHERE id = ?1"),
                [id.as_str()],
                RawRun::from_row,
            )
            .optional()?;
        raw.map(RawRun::decode).transpose()
    }

    /// Most recent runs of one job, newest first.
    pub fn list_runs_for_job(&self, job_id: &JobId, limit: usize) -> Result<Vec<RunRecord>> {
        self.query_runs(
            &format!(
                "SELECT {RUN_COLUMNS} FROM run_history
                 WHERE job_id = ?1
                 ORDER BY started_at DESC, id DESC
                 LIMIT ?2"
            ),
            rusqlite::params![job_id.as_str(), limit as i64],
        )
    }

    /// Most recent runs across all jobs, newest first.
    pub fn list_all_runs(&self, limit: usize) -> Result<Vec<RunRecord>> {
        self.query_runs(
            &format!(
                "SELECT {RUN_COLUMNS} FROM run_history
                 ORDER BY started_at DESC, id DESC
                 LIMIT ?1"
            ),
            rusqlite::params![limit as i64],
        )
    }

    /// Close out runs a previous process left in `running`.
    ///
    /// Only safe at startup, before any execution of this process has
    /// written its placeholder, and while no other process is executing
    /// against the same database.
    #[instrument(skip(self))]
    pub fn fail_interrupted_runs(&self, now: DateTime<Utc>) -> Result<usize> {
        let db = self.conn()?;
        let n = db.execute(
            "UPDATE run_history
             SET status = 'failed', finished_at = ?1, error_message = ?2
             WHERE status = 'running'",
            rusqlite::params![encode_time(&now), INTERRUPTED_MESSAGE],
        )?;
        if n > 0 {
            warn!(count = n, "runs marked failed after interruption");
        }
        Ok(n)
    }

    fn query_runs(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<RunRecord>> {
        let db = self.conn()?;
        let mut stmt = db.prepare_cached(sql)?;
        let raws: Vec<RawRun> = stmt
            .query_map(params, RawRun::from_row)?
            .collect::<rusqlite::Result<_>>()?;

        let runs = raws
            .into_iter()
            .filter_map(|raw| {
                let id = raw.id.clone();
                match raw.decode() {
                    Ok(run) => Some(run),
                    Err(e) => {
                        warn!(run_id = %id, error = %e, "skipping undecodable run row");
                        None
                    }
                }
            })
            .collect();
        Ok(runs)
    }
}

struct RawRun {
    id: String,
    job_id: String,
    job_name: String,
    started_at: String,
    finished_at: Option<String>,
    status: String,
    stop_reason: Option<String>,
    items_collected: u32,
    artifacts: String,
    notification_sent: bool,
    error_message: Option<String>,
    logs: String,
}

impl RawRun {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            job_id: row.get(1)?,
            job_name: row.get(2)?,
            started_at: row.get(3)?,
            finished_at: row.get(4)?,
            status: row.get(5)?,
            stop_reason: row.get(6)?,
            items_collected: row.get(7)?,
            artifacts: row.get(8)?,
            notification_sent: row.get(9)?,
            error_message: row.get(10)?,
            logs: row.get(11)?,
        })
    }

    fn decode(self) -> Result<RunRecord> {
        let log_lines: Vec<LogLine> = serde_json::from_str(&self.logs)?;
        Ok(RunRecord {
            id: RunId(self.id),
            job_id: JobId(self.job_id),
            job_name: self.job_name,
            started_at: decode_time("run_history", &self.started_at)?,
            finished_at: decode_opt_time("run_history", self.finished_at)?,
            status: decode_enum("run_history", &self.status)?,
            stop_reason: self
                .stop_reason
                .as_deref()
                .map(|s| decode_enum("run_history", s))
                .transpose()?,
            items_collected: self.items_collected,
            exported_artifacts: serde_json::from_str(&self.artifacts)?,
            notification_sent: self.notification_sent,
            error_message: self.error_message,
            log_lines,
        })
    }
}
