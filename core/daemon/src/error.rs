//! Error types for daemon operations.

use std::path::PathBuf;

use worklog_daemon_protocol::ErrorInfo;

/// All errors that can occur while serving a request or sweeping sessions.
#[derive(Debug, thiserror::Error)]
pub enum WorklogError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Worker {worker_id} already has an open session")]
    ConcurrencyViolation { worker_id: i64 },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration malformed: {path}: {details}")]
    Config { path: PathBuf, details: String },
}

pub type Result<T> = std::result::Result<T, WorklogError>;

impl WorklogError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        WorklogError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        WorklogError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            WorklogError::NotFound { .. } => "not_found",
            WorklogError::Validation { .. } => "validation_error",
            WorklogError::ConcurrencyViolation { .. } => "concurrency_violation",
            WorklogError::Storage(_) => "storage_error",
            WorklogError::Config { .. } => "config_error",
        }
    }
}

// Storage helpers format rusqlite failures with context and bubble them up as strings.
impl From<String> for WorklogError {
    fn from(message: String) -> Self {
        WorklogError::Storage(message)
    }
}

impl From<WorklogError> for ErrorInfo {
    fn from(err: WorklogError) -> Self {
        ErrorInfo::new(err.code(), err.to_string())
    }
}
