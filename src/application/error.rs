//! Application-level errors (wraps domain errors)

use std::path::PathBuf;
use thiserror::Error;

use crate::domain::DomainError;

/// Application errors wrap domain errors and add run-level context.
///
/// Every variant except `OperationFailed` aborts a run before anything is
/// written, or (for `Write`) after a verified backup exists.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("cannot load bookmarks from {path}: {message}")]
    Load { path: PathBuf, message: String },

    #[error("malformed bookmark store {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: DomainError,
    },

    #[error("permission denied: {0} (grant Full Disk Access to your terminal)")]
    Permission(PathBuf),

    #[error("backup of {path} failed: {message}")]
    Backup { path: PathBuf, message: String },

    #[error("writing {path} failed, original intact, backup at {backup}: {message}")]
    Write {
        path: PathBuf,
        backup: PathBuf,
        message: String,
    },

    #[error("run cancelled, no changes written")]
    Cancelled,

    #[error("config error: {message}")]
    Config { message: String },

    #[error("operation failed: {context}")]
    OperationFailed {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ApplicationError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
