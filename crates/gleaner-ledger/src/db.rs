use rusqlite::Connection;

use crate::error::Result;

/// Initialise the ledger schema in `conn`.
///
/// Safe to call on every startup: uses `IF NOT EXISTS` throughout.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS jobs (
            id          TEXT    NOT NULL PRIMARY KEY,
            name        TEXT    NOT NULL,
            target      TEXT    NOT NULL,
            is_url      INTEGER NOT NULL DEFAULT 0,
            params      TEXT    NOT NULL,   -- JSON-encoded CollectionParams
            schedule    TEXT    NOT NULL,   -- JSON-encoded Schedule enum
            recipients  TEXT    NOT NULL,   -- JSON array of addresses
            formats     TEXT    NOT NULL,   -- JSON array of export format tags
            status      TEXT    NOT NULL DEFAULT 'active',
            dry_run     INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT    NOT NULL,
            last_run    TEXT                -- RFC 3339 or NULL
        ) STRICT;

        -- The polling loop only ever reads active jobs.
        CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs (status);

        CREATE TABLE IF NOT EXISTS run_history (
            id                TEXT    NOT NULL PRIMARY KEY,
            job_id            TEXT    NOT NULL,   -- no FK: history outlives the job
            job_name          TEXT    NOT NULL,
            started_at        TEXT    NOT NULL,
            finished_at       TEXT,
            status            TEXT    NOT NULL,
            stop_reason       TEXT,
            items_collected   INTEGER NOT NULL DEFAULT 0,
            artifacts         TEXT    NOT NULL,   -- JSON array of artifact references
            notification_sent INTEGER NOT NULL DEFAULT 0,
            error_message     TEXT,
            logs              TEXT    NOT NULL    -- JSON array of {at, message}
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_runs_job_started
            ON run_history (job_id, started_at DESC);
        CREATE INDEX IF NOT EXISTS idx_runs_status ON run_history (status);
        ",
    )?;
    Ok(())
}
