//! Error types shared across feed engine processes.
//!
//! There is no HTTP layer in this workspace, so `AppError` does not map to
//! status codes. Instead every variant classifies into one of five buckets
//! (see [`Classification`]) that callers use to decide whether to retry,
//! log and drop, or propagate as fatal.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using [`AppError`].
pub type Result<T> = std::result::Result<T, AppError>;

/// Machine-readable error identifiers, stable across releases.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    InvalidFormat,
    NotFound,
    Unauthorized,
    Transient,
    Timeout,
    Capacity,
    Configuration,
    Serialization,
    Internal,
}

/// High-level classification used to decide retry/log behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Caller supplied bad input; never retry.
    Validation,
    /// Requested entity does not exist, or the caller is not authorized to
    /// see it. Authorization failures collapse into `NotFound` so callers
    /// cannot distinguish "doesn't exist" from "not yours".
    NotFound,
    /// Likely transient (network, DB pool exhaustion, upstream 5xx); safe
    /// to retry with backoff.
    Transient,
    /// Rate limit or capacity ceiling hit; retry after backing off.
    Capacity,
    /// Programmer error or unrecoverable state; do not retry.
    Fatal,
}

/// Application error type.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("validation failed: {message}")]
    Validation { message: String, field: Option<String> },

    #[error("invalid format: {message}")]
    InvalidFormat { message: String },

    #[error("{resource_type} not found: {id}")]
    NotFound { resource_type: String, id: String },

    #[error("not authorized to access {resource_type} {id}")]
    Unauthorized { resource_type: String, id: String },

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("upstream request failed: {message}")]
    Transient { message: String },

    #[error("operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("capacity exceeded: {message}")]
    Capacity { message: String },

    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {message}")]
    Internal { message: String },

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn not_found(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        AppError::NotFound { resource_type: resource_type.into(), id: id.into() }
    }

    pub fn unauthorized(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        AppError::Unauthorized { resource_type: resource_type.into(), id: id.into() }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::Unauthorized { .. } => ErrorCode::Unauthorized,
            AppError::Database(_) | AppError::Transient { .. } => ErrorCode::Transient,
            AppError::Timeout { .. } => ErrorCode::Timeout,
            AppError::Capacity { .. } => ErrorCode::Capacity,
            AppError::Configuration { .. } => ErrorCode::Configuration,
            AppError::Serialization(_) => ErrorCode::Serialization,
            AppError::Internal { .. } | AppError::Other(_) => ErrorCode::Internal,
        }
    }

    /// Classification drives retry and log-level decisions in the
    /// scheduler and processor loops. Authorization failures deliberately
    /// collapse into `NotFound` here too (see [`Classification::NotFound`]).
    pub fn classification(&self) -> Classification {
        match self {
            AppError::Validation { .. } | AppError::InvalidFormat { .. } => {
                Classification::Validation
            }
            AppError::NotFound { .. } | AppError::Unauthorized { .. } => Classification::NotFound,
            AppError::Database(_) | AppError::Transient { .. } | AppError::Timeout { .. } => {
                Classification::Transient
            }
            AppError::Capacity { .. } => Classification::Capacity,
            AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Internal { .. }
            | AppError::Other(_) => Classification::Fatal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self.classification(), Classification::Transient | Classification::Capacity)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Transient { message: err.to_string() }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration { message: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_and_unauthorized_collapse_to_same_classification() {
        let nf = AppError::not_found("feed", "f1");
        let unauth = AppError::unauthorized("feed", "f1");
        assert_eq!(nf.classification(), Classification::NotFound);
        assert_eq!(unauth.classification(), Classification::NotFound);
    }

    #[test]
    fn transient_errors_are_retryable() {
        let err = AppError::Transient { message: "connection reset".into() };
        assert!(err.is_retryable());
    }

    #[test]
    fn validation_errors_are_not_retryable() {
        let err = AppError::Validation { message: "bad topic".into(), field: Some("topic".into()) };
        assert!(!err.is_retryable());
    }
}
