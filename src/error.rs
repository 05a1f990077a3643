//! Error types for countdown-keeper
//!
//! Every failure in this crate is recoverable: the operation does not take
//! effect, the caller is told why, and prior in-memory state is kept.

use std::path::PathBuf;
use thiserror::Error;

use crate::store::StoreError;

/// Rejected input when creating a timer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("timer name must not be empty")]
    EmptyName,

    #[error("duration must be a positive number of seconds, got {0}")]
    NonPositiveDuration(i64),

    #[error("duration must be a whole number of seconds, got '{0}'")]
    NotWholeSeconds(String),

    #[error("category must not be empty")]
    EmptyCategory,
}

/// Top-level error for timer and history operations
#[derive(Error, Debug)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("no timer with id {0}")]
    TimerNotFound(String),

    #[error("failed to read '{key}' from store: {source}")]
    StorageRead {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to write '{key}' to store: {message}")]
    StorageWrite { key: String, message: String },

    #[error("stored '{key}' collection is malformed: {source}")]
    Parse {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("no permission to export into {}: {message}", .path.display())]
    Permission { path: PathBuf, message: String },

    #[error("export to {} failed: {message}", .path.display())]
    Export { path: PathBuf, message: String },
}

impl AppError {
    /// Component label used when the error is recorded as a notice
    pub fn component(&self) -> &'static str {
        match self {
            AppError::Validation(_) | AppError::TimerNotFound(_) => "timers",
            AppError::StorageRead { key, .. }
            | AppError::StorageWrite { key, .. }
            | AppError::Parse { key, .. } => {
                if key == crate::store::HISTORY_KEY {
                    "history"
                } else {
                    "timers"
                }
            }
            AppError::Permission { .. } | AppError::Export { .. } => "export",
        }
    }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_are_attributed_to_their_collection() {
        let err = AppError::StorageWrite {
            key: "history".to_string(),
            message: "disk full".to_string(),
        };
        assert_eq!(err.component(), "history");

        let err = AppError::StorageWrite {
            key: "timers".to_string(),
            message: "disk full".to_string(),
        };
        assert_eq!(err.component(), "timers");
    }

    #[test]
    fn validation_messages_name_the_field() {
        let err = AppError::from(ValidationError::NonPositiveDuration(-3));
        assert!(err.to_string().contains("positive"));
        assert!(err.to_string().contains("-3"));
    }
}
