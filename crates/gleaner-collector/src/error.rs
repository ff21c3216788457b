use thiserror::Error;

/// Failures reported by (or on behalf of) an item source.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// A recoverable hiccup: the session continues and the run degrades to partial.
    #[error("transient source error: {0}")]
    Transient(String),

    /// The source cannot continue; the session stops with `StopReason::Error`.
    #[error("fatal source error: {0}")]
    Fatal(String),

    /// The source has no usable session (cookies expired, logged out).
    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    /// The collaborator did not answer within the per-call deadline.
    #[error("{call} timed out after {ms}ms")]
    Timeout { call: &'static str, ms: u64 },
}

impl SourceError {
    /// Whether this error ends the session instead of being logged and skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SourceError::Fatal(_) | SourceError::AuthenticationRequired(_)
        )
    }
}
