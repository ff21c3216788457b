//! `gleaner-ledger`: SQLite-backed entity store and run history.
//!
//! The ledger is the single source of truth shared by the polling loop and
//! every running execution. Each public operation is one SQL statement, so a
//! read-modify-write never spans two calls.

pub mod db;
pub mod error;
pub mod jobs;
pub mod runs;

mod codec;

pub use error::{LedgerError, Result};
pub use jobs::Ledger;
