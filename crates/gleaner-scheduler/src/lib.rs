//! `gleaner-scheduler`: Tokio-based job scheduler and runner.
//!
//! # Overview
//!
//! Jobs live in the [`gleaner_ledger::Ledger`]. The [`engine::SchedulerEngine`]
//! polls it once per tick, asks [`schedule::is_due`] about every active job
//! and hands each due one to the [`runner::JobRunner`] as an independent
//! task. The runner drives a collection session, exports, notifies and
//! folds every outcome into exactly one terminal run record.
//!
//! # Schedule variants
//!
//! | Variant     | Due when                                                  |
//! |-------------|-----------------------------------------------------------|
//! | `Once`      | never run before and `now >= run_at`                      |
//! | `Recurring` | the cron expression matches the local minute, once per minute |

pub mod clock;
pub mod cron;
pub mod delivery;
pub mod engine;
pub mod error;
pub mod runner;
pub mod schedule;
pub mod service;

pub use clock::{Clock, ManualClock, SystemClock};
pub use cron::{validate_cron, CronExpr, CRON_EXAMPLES};
pub use delivery::{DeliveryError, Exporter, Notifier, RunSummary};
pub use engine::SchedulerEngine;
pub use error::{ExecutionError, Result, SchedulerError};
pub use runner::{JobRunner, RunGuard, RunningJobs, SourceFactory};
pub use schedule::{is_due, validate_schedule};
pub use service::JobService;
