//! Errors raised by catalog, batch and ledger rules.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Rule failures that depend only on the request and the records it touches.
///
/// Each variant maps to one HTTP error code at the API edge. Database and
/// connection failures never end up here; the store layer has its own error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed input: blank product name, manufacture after expiry,
    /// unit price out of range.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A unit count outside `1..=MAX_QUANTITY`.
    #[error("quantity must be between 1 and {max} (got {0})", max = crate::MAX_QUANTITY)]
    InvalidQuantity(i64),

    /// Stock or ledger rule broken, e.g. returning more than was sold from a
    /// batch or driving a batch below zero.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("not found")]
    NotFound,

    /// Duplicate internal batch code or product.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}
