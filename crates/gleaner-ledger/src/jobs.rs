use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use gleaner_core::{Job, JobId, JobStatus, Target};
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info, instrument, warn};

use crate::codec::{decode_enum, decode_opt_time, decode_time, encode_time};
use crate::db::init_db;
use crate::error::{LedgerError, Result};

const JOB_COLUMNS: &str = "id, name, target, is_url, params, schedule, recipients, formats,
                           status, dry_run, created_at, last_run";

/// Thread-safe store for job definitions and run history.
///
/// Wraps a single SQLite connection in a `Mutex`; the polling loop and all
/// executions share one `Arc<Ledger>`. Run-history operations live in
/// [`crate::runs`].
pub struct Ledger {
    db: Mutex<Connection>,
}

impl Ledger {
    /// Wrap an open connection, creating the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// Open (or create) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;
        Self::new(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    pub(crate) fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db.lock().map_err(|_| LedgerError::Poisoned)
    }

    /// Persist a newly created job.
    #[instrument(skip(self, job), fields(job_id = %job.id))]
    pub fn insert_job(&self, job: &Job) -> Result<()> {
        let row = EncodedJob::from_job(job)?;
        let db = self.conn()?;
        db.execute(
            "INSERT INTO jobs
             (id, name, target, is_url, params, schedule, recipients, formats,
              status, dry_run, created_at, last_run)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12)",
            rusqlite::params![
                job.id.as_str(),
                job.name,
                job.target.value(),
                job.target.is_url(),
                row.params,
                row.schedule,
                row.recipients,
                row.formats,
                job.status.to_string(),
                job.dry_run,
                encode_time(&job.created_at),
                job.last_run.as_ref().map(encode_time),
            ],
        )?;
        info!(name = %job.name, "job stored");
        Ok(())
    }

    /// Retrieve a job by id, returning `None` if it does not exist.
    #[instrument(skip(self), fields(job_id = %id))]
    pub fn get_job(&self, id: &JobId) -> Result<Option<Job>> {
        let db = self.conn()?;
        let raw = db
            .query_row(
                &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"),
                [id.as_str()],
                RawJob::from_row,
            )
            .optional()?;
        raw.map(RawJob::decode).transpose()
    }

    /// All jobs, oldest first.
    pub fn list_jobs(&self) -> Result<Vec<Job>> {
        self.query_jobs(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs ORDER BY created_at, id"
        ))
    }

    /// Jobs eligible for automatic triggering.
    pub fn list_active_jobs(&self) -> Result<Vec<Job>> {
        self.query_jobs(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE status = 'active' ORDER BY created_at, id"
        ))
    }

    /// Replace the user-editable fields of a job.
    ///
    /// `status`, `last_run` and `created_at` are never overwritten here;
    /// status moves only through [`Ledger::set_job_status`] and
    /// [`Ledger::record_attempt`]. Returns `false` when no such job exists.
    #[instrument(skip(self, job), fields(job_id = %job.id))]
    pub fn update_job(&self, job: &Job) -> Result<bool> {
        let row = EncodedJob::from_job(job)?;
        let db = self.conn()?;
        let n = db.execute(
            "UPDATE jobs SET name = ?1, target = ?2, is_url = ?3, params = ?4,
                    schedule = ?5, recipients = ?6, formats = ?7, dry_run = ?8
             WHERE id = ?9",
            rusqlite::params![
                job.name,
                job.target.value(),
                job.target.is_url(),
                row.params,
                row.schedule,
                row.recipients,
                row.formats,
                job.dry_run,
                job.id.as_str(),
            ],
        )?;
        Ok(n > 0)
    }

    /// Remove a job. Its run history is kept.
    #[instrument(skip(self), fields(job_id = %id))]
    pub fn delete_job(&self, id: &JobId) -> Result<bool> {
        let db = self.conn()?;
        let n = db.execute("DELETE FROM jobs WHERE id = ?1", [id.as_str()])?;
        if n > 0 {
            info!("job deleted");
        }
        Ok(n > 0)
    }

    /// Set the lifecycle status of a job in one statement.
    #[instrument(skip(self), fields(job_id = %id, %status))]
    pub fn set_job_status(&self, id: &JobId, status: JobStatus) -> Result<bool> {
        let db = self.conn()?;
        let n = db.execute(
            "UPDATE jobs SET status = ?1 WHERE id = ?2",
            rusqlite::params![status.to_string(), id.as_str()],
        )?;
        Ok(n > 0)
    }

    /// Runner bookkeeping after an execution: stamp `last_run` and, for a
    /// finished one-shot job, mark it completed, in one statement.
    #[instrument(skip(self), fields(job_id = %id))]
    pub fn record_attempt(
        &self,
        id: &JobId,
        started_at: DateTime<Utc>,
        complete: bool,
    ) -> Result<bool> {
        let db = self.conn()?;
        let n = db.execute(
            "UPDATE jobs
             SET last_run = ?1,
                 status   = CASE WHEN ?2 THEN 'completed' ELSE status END
             WHERE id = ?3",
            rusqlite::params![encode_time(&started_at), complete, id.as_str()],
        )?;
        debug!(complete, updated = n, "attempt recorded");
        Ok(n > 0)
    }

    fn query_jobs(&self, sql: &str) -> Result<Vec<Job>> {
        let db = self.conn()?;
        let mut stmt = db.prepare_cached(sql)?;
        let raws: Vec<RawJob> = stmt
            .query_map([], RawJob::from_row)?
            .collect::<rusqlite::Result<_>>()?;

        // A row that no longer decodes must not hide every other job.
        let jobs = raws
            .into_iter()
            .filter_map(|raw| {
                let id = raw.id.clone();
                match raw.decode() {
                    Ok(job) => Some(job),
                    Err(e) => {
                        warn!(job_id = %id, error = %e, "skipping undecodable job row");
                        None
                    }
                }
            })
            .collect();
        Ok(jobs)
    }
}

/// JSON-encoded columns of a job.
struct EncodedJob {
    params: String,
    schedule: String,
    recipients: String,
    formats: String,
}

impl EncodedJob {
    fn from_job(job: &Job) -> Result<Self> {
        Ok(Self {
            params: serde_json::to_string(&job.params)?,
            schedule: serde_json::to_string(&job.schedule)?,
            recipients: serde_json::to_string(&job.notification_targets)?,
            formats: serde_json::to_string(&job.export_formats)?,
        })
    }
}

/// A `jobs` row as stored, before JSON/time decoding.
struct RawJob {
    id: String,
    name: String,
    target: String,
    is_url: bool,
    params: String,
    schedule: String,
    recipients: String,
    formats: String,
    status: String,
    dry_run: bool,
    created_at: String,
    last_run: Option<String>,
}

impl RawJob {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            target: row.get(2)?,
            is_url: row.get(3)?,
            params: row.get(4)?,
            schedule: row.get(5)?,
            recipients: row.get(6)?,
            formats: row.get(7)?,
            status: row.get(8)?,
            dry_run: row.get(9)?,
            created_at: row.get(10)?,
            last_run: row.get(11)?,
        })
    }

    fn decode(self) -> Result<Job> {
        Ok(Job {
            id: JobId(self.id),
            name: self.name,
            target: Target::from_parts(self.target, self.is_url),
            params: serde_json::from_str(&self.params)?,
            schedule: serde_json::from_str(&self.schedule)?,
            notification_targets: serde_json::from_str(&self.recipients)?,
            export_formats: serde_json::from_str(&self.formats)?,
            status: decode_enum("jobs", &self.status)?,
            created_at: decode_time("jobs", &self.created_at)?,
            last_run: decode_opt_time("jobs", self.last_run)?,
            dry_run: self.dry_run,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use gleaner_core::{CollectionParams, NewJob, Schedule};

    fn ledger() -> Ledger {
        Ledger::open_in_memory().expect("in-memory ledger")
    }

    fn new_job(name: &str, schedule: Schedule) -> Job {
        NewJob {
            name: name.into(),
            target: Target::Query("rust lang:en".into()),
            params: CollectionParams {
                max_items: Some(50),
                ..Default::default()
            },
            schedule,
            notification_targets: vec!["ops@example.com".into()],
            export_formats: vec!["json".into()],
            dry_run: false,
        }
        .into_job(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap())
    }

    fn recurring() -> Schedule {
        Schedule::Recurring {
            cron: "0 7 * * *".into(),
            timezone: "America/Sao_Paulo".into(),
        }
    }

    fn once() -> Schedule {
        Schedule::Once {
            run_at: Utc.with_ymd_and_hms(2026, 2, 1, 10, 0, 0).unwrap(),
            timezone: "UTC".into(),
        }
    }

    #[test]
    fn insert_then_get_round_trips_every_field() {
        let ledger = ledger();
        let job = new_job("digest", recurring());
        ledger.insert_job(&job).unwrap();

        let loaded = ledger.get_job(&job.id).unwrap().expect("job exists");
        assert_eq!(loaded, job);
    }

    #[test]
    fn get_missing_job_is_none() {
        assert!(ledger().get_job(&JobId::from("nope")).unwrap().is_none());
    }

    #[test]
    fn list_active_excludes_paused_and_completed() {
        let ledger = ledger();
        let a = new_job("a", recurring());
        let b = new_job("b", recurring());
        let c = new_job("c", once());
        for j in [&a, &b, &c] {
            ledger.insert_job(j).unwrap();
        }
        assert!(ledger.set_job_status(&b.id, JobStatus::Paused).unwrap());
        assert!(ledger.set_job_status(&c.id, JobStatus::Completed).unwrap());

        let active: Vec<_> = ledger
            .list_active_jobs()
            .unwrap()
            .into_iter()
            .map(|j| j.name)
            .collect();
        assert_eq!(active, vec!["a"]);
        assert_eq!(ledger.list_jobs().unwrap().len(), 3);
    }

    #[test]
    fn update_never_touches_last_run() {
        let ledger = ledger();
        let mut job = new_job("digest", recurring());
        ledger.insert_job(&job).unwrap();
        let ran_at = Utc.with_ymd_and_hms(2026, 1, 2, 7, 0, 0).unwrap();
        ledger.record_attempt(&job.id, ran_at, false).unwrap();

        job.name = "renamed".into();
        job.last_run = None;
        assert!(ledger.update_job(&job).unwrap());

        let loaded = ledger.get_job(&job.id).unwrap().unwrap();
        assert_eq!(loaded.name, "renamed");
        assert_eq!(loaded.last_run, Some(ran_at));
    }

    #[test]
    fn update_keeps_status_set_elsewhere() {
        let ledger = ledger();
        let mut stale = new_job("digest", recurring());
        ledger.insert_job(&stale).unwrap();
        ledger.set_job_status(&stale.id, JobStatus::Paused).unwrap();

        stale.name = "renamed".into();
        assert_eq!(stale.status, JobStatus::Active);
        assert!(ledger.update_job(&stale).unwrap());

        let loaded = ledger.get_job(&stale.id).unwrap().unwrap();
        assert_eq!(loaded.name, "renamed");
        assert_eq!(loaded.status, JobStatus::Paused);
    }

    #[test]
    fn record_attempt_completes_only_when_asked() {
        let ledger = ledger();
        let job = new_job("one-shot", once());
        ledger.insert_job(&job).unwrap();
        let at = Utc.with_ymd_and_hms(2026, 2, 1, 10, 0, 30).unwrap();

        ledger.record_attempt(&job.id, at, false).unwrap();
        assert_eq!(
            ledger.get_job(&job.id).unwrap().unwrap().status,
            JobStatus::Active
        );

        ledger.record_attempt(&job.id, at, true).unwrap();
        let loaded = ledger.get_job(&job.id).unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::Completed);
        assert_eq!(loaded.last_run, Some(at));
    }

    #[test]
    fn delete_reports_whether_a_row_went_away() {
        let ledger = ledger();
        let job = new_job("digest", recurring());
        ledger.insert_job(&job).unwrap();
        assert!(ledger.delete_job(&job.id).unwrap());
        assert!(!ledger.delete_job(&job.id).unwrap());
        assert!(!ledger.set_job_status(&job.id, JobStatus::Paused).unwrap());
    }

    #[test]
    fn corrupt_row_is_skipped_in_listing() {
        let ledger = ledger();
        ledger.insert_job(&new_job("good", recurring())).unwrap();
        {
            let db = ledger.conn().unwrap();
            db.execute(
                "INSERT INTO jobs (id, name, target, is_url, params, schedule, recipients,
                                   formats, status, dry_run, created_at)
                 VALUES ('bad', 'bad', 'q', 0, '{}', 'not json', '[]', '[]', 'active', 0,
                         '2026-01-01T00:00:00.000000Z')",
                [],
            )
            .unwrap();
        }
        let names: Vec<_> = ledger
            .list_active_jobs()
            .unwrap()
            .into_iter()
            .map(|j| j.name)
            .collect();
        assert_eq!(names, vec!["good"]);
        assert!(ledger.get_job(&JobId::from("bad")).is_err());
    }
}
