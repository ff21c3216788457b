//! Shared domain types, configuration and error taxonomy for gleaner.
//!
//! Every other crate in the workspace speaks in these types: the ledger
//! persists them, the collector fills a [`run::StopReason`], the scheduler
//! moves a [`types::Job`] through its lifecycle.

pub mod config;
pub mod error;
pub mod run;
pub mod types;

pub use config::GleanerConfig;
pub use error::{GleanerError, Result, ValidationError};
pub use run::{LogLine, RunRecord, RunStatus, StopReason};
pub use types::{
    CollectionParams, Job, JobId, JobStatus, NewJob, RunId, Schedule, SortMode, Target,
};
