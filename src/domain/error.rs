//! Domain-level errors (no external dependencies)

use thiserror::Error;

use crate::domain::arena::NodeId;

/// Domain errors represent violations of the bookmark tree model.
/// These are independent of infrastructure concerns.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("invalid parent (not a folder): {0}")]
    InvalidParent(NodeId),

    #[error("the root folder cannot be removed")]
    RootRemoval,

    #[error("malformed bookmark store: {message}")]
    Malformed { message: String },

    #[error("cannot encode bookmark store: {message}")]
    Encode { message: String },
}

impl DomainError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
