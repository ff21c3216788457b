use std::fmt;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GleanerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, GleanerError>;

/// Input rejected at job-creation (or update) time. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("cron expression must have 5 fields (minute hour day month weekday), got {found}")]
    CronFieldCount { found: usize },

    #[error("invalid cron expression: {}", join_field_errors(.0))]
    CronFields(Vec<CronFieldError>),

    #[error("unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error("missing required schedule field: {0}")]
    MissingField(&'static str),

    #[error("local time {time} does not exist in {timezone}")]
    NonexistentLocalTime { time: String, timezone: String },

    #[error("job name must not be empty")]
    EmptyName,

    #[error("job target must not be empty")]
    EmptyTarget,

    #[error("{field} must be at most {max}, got {value}")]
    AgeWindowTooLarge {
        field: &'static str,
        value: u32,
        max: u32,
    },
}

/// One rejected cron field, e.g. `hour (0-23): out of range '25'`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronFieldError {
    /// Human label of the field including its bounds.
    pub field: &'static str,
    /// The raw text that failed.
    pub value: String,
    pub reason: String,
}

impl fmt::Display for CronFieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} '{}'", self.field, self.reason, self.value)
    }
}

fn join_field_errors(errors: &[CronFieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cron_field_errors_are_listed_in_message() {
        let err = ValidationError::CronFields(vec![
            CronFieldError {
                field: "minute (0-59)",
                value: "*/x".into(),
                reason: "invalid step".into(),
            },
            CronFieldError {
                field: "hour (0-23)",
                value: "25".into(),
                reason: "out of range".into(),
            },
        ]);
        let msg = err.to_string();
        assert!(msg.contains("minute (0-59): invalid step '*/x'"));
        assert!(msg.contains("hour (0-23): out of range '25'"));
    }
}
