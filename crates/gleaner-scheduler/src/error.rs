use gleaner_collector::SourceError;
use gleaner_core::ValidationError;
use gleaner_ledger::LedgerError;
use thiserror::Error;

/// Errors returned to callers of the scheduler's public operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Rejected at creation or update time; nothing was persisted.
    #[error("Invalid job: {0}")]
    Validation(#[from] ValidationError),

    #[error("Job not found: {id}")]
    JobNotFound { id: String },

    /// A manual trigger hit a job that is mid-execution.
    #[error("Job {id} is already running")]
    AlreadyRunning { id: String },
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Hard failures inside one execution. Each one ends the run as `Failed`;
/// none ever escapes [`crate::runner::JobRunner::execute`].
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("item source unavailable: {0}")]
    Source(#[from] SourceError),

    #[error("collection aborted: {0}")]
    Collection(String),

    #[error("collection blocked: the source raised its soft-block signal")]
    Blocked,

    #[error("execution panicked: {0}")]
    Panicked(String),
}
