use thiserror::Error;

/// Errors raised by the job and run-history store.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Underlying SQLite / rusqlite error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A JSON column could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row holds a value the current schema cannot represent.
    #[error("corrupt row in {table}: {reason}")]
    CorruptRow { table: &'static str, reason: String },

    /// A writer panicked while holding the connection.
    #[error("ledger connection poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, LedgerError>;
