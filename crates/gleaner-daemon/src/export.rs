use std::path::PathBuf;

use async_trait::async_trait;
use gleaner_collector::CollectionResult;
use gleaner_core::{Job, RunId};
use gleaner_scheduler::{DeliveryError, Exporter};
use serde_json::json;
use tracing::info;

/// Writes `{dir}/{job}_{YYYYmmdd_HHMMSS}.json` with run metadata and items.
pub struct JsonExporter {
    dir: PathBuf,
}

impl JsonExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl Exporter for JsonExporter {
    async fn export(
        &self,
        format: &str,
        job: &Job,
        run_id: &RunId,
        result: &CollectionResult,
    ) -> Result<String, DeliveryError> {
        if format != "json" {
            return Err(DeliveryError::UnsupportedFormat(format.to_string()));
        }

        let document = json!({
            "metadata": {
                "job_id": job.id,
                "job_name": job.name,
                "run_id": run_id,
                "target": job.target,
                "params": job.params,
                "collected_at": result.started_at,
                "finished_at": result.finished_at,
                "stop_reason": result.stop_reason,
                "total_items": result.items.len(),
                "iterations": result.iterations,
                "soft_errors": result.errors,
            },
            "items": result.items,
        });

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(format!(
            "{}_{}.json",
            file_stem(&job.name),
            result.started_at.format("%Y%m%d_%H%M%S")
        ));
        tokio::fs::write(&path, serde_json::to_vec_pretty(&document)?).await?;

        info!(path = %path.display(), items = result.items.len(), "json export written");
        Ok(path.display().to_string())
    }
}

/// Job names are free text; keep file names portable.
fn file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() {
        "job".to_string()
    } else {
        stem
    }
}
