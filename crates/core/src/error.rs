//! Errors raised by record rules, before anything is stored.

use thiserror::Error;

/// Shorthand for results carrying a [`DomainError`].
pub type DomainResult<T> = Result<T, DomainError>;

/// Why a record operation was refused.
///
/// Each variant maps to one HTTP status in the API. Database and network
/// failures have their own error types in `keel-infra` and `keel-client`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A payload failed validation (missing required field, bad number, ...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A status action is not allowed from the record's current status.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// Text that should hold a UUID did not parse as one.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The requested record (or action) does not exist.
    #[error("not found")]
    NotFound,

    /// The request collides with data already stored.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unauthorized")]
    Unauthorized,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        Self::InvalidTransition(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}
