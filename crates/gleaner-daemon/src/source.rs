//! File-backed item source.
//!
//! A snapshot directory holds `page-*.json` files, each a JSON array of
//! items, in scroll order. Position N shows pages 0..=N together, the way a
//! scrolling feed keeps earlier items on screen. A file named `BLOCKED` in
//! the directory raises the soft-block signal; a missing directory means
//! the source is not authenticated.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use gleaner_collector::{Item, ItemSource, Position, SourceError};
use gleaner_core::Job;
use gleaner_scheduler::SourceFactory;
use tracing::debug;

pub const BLOCK_MARKER: &str = "BLOCKED";

pub struct SnapshotSources {
    dir: PathBuf,
}

impl SnapshotSources {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl SourceFactory for SnapshotSources {
    async fn open_source(&self, job: &Job) -> Result<Box<dyn ItemSource>, SourceError> {
        debug!(job_id = %job.id, dir = %self.dir.display(), "opening snapshot source");
        Ok(Box::new(SnapshotSource::new(&self.dir)))
    }
}

pub struct SnapshotSource {
    dir: PathBuf,
    pages: Vec<PathBuf>,
}

impl SnapshotSource {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            pages: Vec::new(),
        }
    }

    async fn read_page(path: &Path) -> Result<Vec<Item>, SourceError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SourceError::Transient(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| SourceError::Transient(format!("{}: {e}", path.display())))
    }
}

#[async_trait]
impl ItemSource for SnapshotSource {
    async fn is_authenticated(&mut self) -> Result<bool, SourceError> {
        Ok(tokio::fs::metadata(&self.dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false))
    }

    async fn open(&mut self, locator: &str) -> Result<Position, SourceError> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| SourceError::Fatal(format!("{}: {e}", self.dir.display())))?;

        let mut pages = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SourceError::Fatal(e.to_string()))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with("page-") && name.ends_with(".json") {
                pages.push(entry.path());
            }
        }
        pages.sort();
        debug!(%locator, pages = pages.len(), "snapshot opened");
        self.pages = pages;
        Ok(Position::start())
    }

    async fn fetch_visible(&mut self, position: Position) -> Result<Vec<Item>, SourceError> {
        let upto = (position.0 as usize + 1).min(self.pages.len());
        let mut items = Vec::new();
        for path in &self.pages[..upto] {
            items.extend(Self::read_page(path).await?);
        }
        Ok(items)
    }

    async fn advance(&mut self, position: Position) -> Result<Option<Position>, SourceError> {
        let next = position.next();
        Ok(((next.0 as usize) < self.pages.len()).then_some(next))
    }

    async fn has_block_signal(&mut self) -> Result<bool, SourceError> {
        Ok(tokio::fs::try_exists(self.dir.join(BLOCK_MARKER))
            .await
            .unwrap_or(false))
    }
}
