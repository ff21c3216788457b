use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context};
use fs2::FileExt;
use gleaner_core::GleanerConfig;
use gleaner_ledger::Ledger;
use gleaner_scheduler::{JobRunner, JobService, SystemClock};
use tracing::{debug, info};

use crate::{export::JsonExporter, source::SnapshotSources};

/// Everything a command needs, wired once from config.
pub struct App {
    pub config: GleanerConfig,
    pub runner: Arc<JobRunner>,
    pub service: JobService,
}

impl App {
    pub fn open(config: GleanerConfig) -> anyhow::Result<Self> {
        let db_path = &config.database.path;
        ensure_parent_dir(db_path)?;
        info!(path = %db_path, "opening SQLite database");
        let ledger = Arc::new(
            Ledger::open(db_path).with_context(|| format!("opening database {db_path}"))?,
        );

        let runner = JobRunner::new(
            ledger,
            Arc::new(SnapshotSources::new(&config.source.snapshot_dir)),
            Arc::new(SystemClock),
            &config.collector,
        )
        .with_exporter(Arc::new(JsonExporter::new(&config.exports.dir)));
        let runner = Arc::new(runner);

        Ok(Self {
            service: JobService::new(Arc::clone(&runner)),
            runner,
            config,
        })
    }

    /// Claim the database for executions. Held by `serve` and `job run`.
    pub fn lock_store(&self) -> anyhow::Result<StoreLock> {
        StoreLock::acquire(&self.config.database.path)
    }
}

/// Exclusive advisory lock on `<db>.lock`, released on drop.
///
/// Only one process may execute jobs or recover interrupted runs against a
/// database at a time.
#[derive(Debug)]
pub struct StoreLock {
    _file: File,
    path: PathBuf,
}

impl StoreLock {
    pub fn acquire(db_path: &str) -> anyhow::Result<Self> {
        let path = PathBuf::from(format!("{db_path}.lock"));
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("opening lock file {}", path.display()))?;

        if let Err(e) = file.try_lock_exclusive() {
            if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() {
                return Err(anyhow!(
                    "database {db_path} is in use by another gleaner process (lock {} is held)",
                    path.display()
                ));
            }
            return Err(anyhow::Error::new(e)
                .context(format!("locking {}", path.display())));
        }
        debug!(path = %path.display(), "store lock acquired");
        Ok(Self { _file: file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn ensure_parent_dir(path: &str) -> anyhow::Result<()> {
    match Path::new(path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
            .with_context(|| format!("creating database directory {}", parent.display())),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_lock_on_same_database_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("gleaner.db");
        let db = db.to_str().unwrap();

        let held = StoreLock::acquire(db).unwrap();
        assert!(held.path().ends_with("gleaner.db.lock"));

        let err = StoreLock::acquire(db).unwrap_err();
        assert!(err.to_string().contains("in use by another gleaner process"));

        drop(held);
        StoreLock::acquire(db).unwrap();
    }

    #[test]
    fn parent_directory_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("nested/deeper/gleaner.db");
        ensure_parent_dir(db.to_str().unwrap()).unwrap();
        assert!(dir.path().join("nested/deeper").is_dir());
    }

    #[test]
    fn unusable_parent_directory_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain-file");
        std::fs::write(&file, b"x").unwrap();
        let db = file.join("gleaner.db");

        let err = ensure_parent_dir(db.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("creating database directory"));
    }
}
