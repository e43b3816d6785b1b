//! Typed errors shared by the report pipeline

use thiserror::Error;

/// Invalid command-line input. The CLI prints usage and exits with status 1.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    #[error("run number must be a positive integer, got '{0}'")]
    InvalidRunNumber(String),

    #[error("runMin ({min}) is greater than runMax ({max})")]
    EmptyRange { min: u32, max: u32 },

    #[error("no run number found in file name '{file}' (pattern: {pattern})")]
    NoRunInFileName { file: String, pattern: String },

    #[error("invalid run pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("no runs selected")]
    NoRuns,

    #[error("condition names cannot be empty")]
    EmptyCondition,
}

/// Failure of a single (run, condition) lookup. Never fatal to a report.
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("run {0} not found")]
    RunNotFound(u32),

    #[error("condition '{key}' not found for run {run}")]
    ConditionNotFound { run: u32, key: String },

    #[error("condition '{key}' has unsupported value type '{value_type}'")]
    UnsupportedValueType { key: String, value_type: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
