//! Error types for the social index

use thiserror::Error;

use crate::MsgId;

/// Failures reported by a message source
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("Log query failed: {0}")]
    Query(String),

    #[error("Message not found: {0}")]
    NotFound(MsgId),

    #[error("Log closed")]
    Closed,
}

/// Core index errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Invalid config: \"{field}\" must be a nonempty string")]
    InvalidConfig { field: &'static str },

    #[error("Invalid reference: {0}")]
    InvalidRef(String),
}

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// Result type for message source operations
pub type SourceResult<T> = Result<T, SourceError>;
