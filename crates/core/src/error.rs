//! Error types shared across the workspace.

use thiserror::Error;

/// Errors raised while decoding or interpreting domain values.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Unknown {kind} label: {label}")]
    UnknownLabel { kind: &'static str, label: String },

    #[error("Unsupported transaction type: {0}")]
    UnsupportedTransactionType(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

/// User-submitted configuration did not match the expected shape.
///
/// Carries the schema so the caller can re-prompt with it.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
    pub schema: &'static str,
}

impl ValidationError {
    pub fn new(message: impl Into<String>, schema: &'static str) -> Self {
        Self {
            message: message.into(),
            schema,
        }
    }
}

/// Errors from evaluating a cron schedule.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidExpression { expression: String, reason: String },

    #[error("Cron expression '{0}' has no upcoming occurrence")]
    Exhausted(String),

    #[error("Cannot localize {naive} into {timezone}")]
    Localize { naive: String, timezone: String },
}
