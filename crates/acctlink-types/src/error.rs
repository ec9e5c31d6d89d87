use thiserror::Error;

use crate::submission::ReviewStatus;

/// Errors returned by the link workflow engine.
///
/// Every variant maps to exactly one HTTP status at the API edge.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Malformed caller input. Always client-fixable.
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown provider (or other referenced entity).
    #[error("not found: {0}")]
    NotFound(String),

    /// Missing, expired, or out-of-stage session, or a policy rejection.
    #[error("authentication error: {0}")]
    Auth(String),

    /// The selected storage backend failed. Never retried by the workflow.
    #[error("storage backend unavailable: {0}")]
    BackendUnavailable(String),
}

impl From<RepositoryError> for LinkError {
    fn from(e: RepositoryError) -> Self {
        LinkError::BackendUnavailable(e.to_string())
    }
}

/// Errors returned by the review queue.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("submission not found")]
    NotFound,

    #[error("submission already {0}")]
    AlreadyDecided(ReviewStatus),

    #[error("invalid review action: '{0}'")]
    InvalidAction(String),

    #[error("review backend unavailable")]
    Unavailable,

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<RepositoryError> for ReviewError {
    fn from(e: RepositoryError) -> Self {
        ReviewError::Storage(e.to_string())
    }
}

/// Errors from repository operations (used by trait definitions in acctlink-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}
