//! Outbound collaborators invoked after a collection session: exporters
//! turn a result into artifacts, notifiers tell recipients about them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gleaner_collector::CollectionResult;
use gleaner_core::{Job, RunId, StopReason};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("unsupported export format: {0}")]
    UnsupportedFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("delivery failed: {0}")]
    Transport(String),
}

/// Writes one artifact per requested format.
#[async_trait]
pub trait Exporter: Send + Sync {
    /// Export `result` as `format` and return a reference to the artifact
    /// (typically a file path).
    async fn export(
        &self,
        format: &str,
        job: &Job,
        run_id: &RunId,
        result: &CollectionResult,
    ) -> Result<String, DeliveryError>;
}

/// Sends a run summary with its artifacts to the job's recipients.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// `Ok(false)` means the transport declined without raising an error.
    async fn notify(
        &self,
        recipients: &[String],
        summary: &RunSummary,
        artifacts: &[String],
    ) -> Result<bool, DeliveryError>;
}

/// What a notifier is told about a finished collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub job_name: String,
    pub target: String,
    pub items_collected: u32,
    pub stop_reason: StopReason,
    pub started_at: DateTime<Utc>,
    pub soft_errors: Vec<String>,
}

impl RunSummary {
    pub fn new(job: &Job, run_id: &RunId, result: &CollectionResult) -> Self {
        Self {
            run_id: run_id.clone(),
            job_name: job.name.clone(),
            target: job.target.value().to_string(),
            items_collected: result.item_count(),
            stop_reason: result.stop_reason,
            started_at: result.started_at,
            soft_errors: result.errors.clone(),
        }
    }

    /// One-line subject for a message about this run.
    pub fn subject(&self) -> String {
        format!(
            "[gleaner] {}: {} items ({})",
            self.job_name, self.items_collected, self.stop_reason
        )
    }
}
