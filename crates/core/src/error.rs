//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// malformed robot reports). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. empty robot id).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A checkpoint string did not match `<zone>-<row>-<shelf>`.
    #[error("malformed checkpoint {checkpoint:?}: {reason}")]
    MalformedCheckpoint {
        checkpoint: String,
        reason: &'static str,
    },
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn malformed_checkpoint(checkpoint: impl Into<String>, reason: &'static str) -> Self {
        Self::MalformedCheckpoint {
            checkpoint: checkpoint.into(),
            reason,
        }
    }
}
