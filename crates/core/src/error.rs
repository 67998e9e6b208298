//! Error model shared by the valuation core.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across the valuation core.
pub type ValuationResult<T> = Result<T, ValuationError>;

/// Failure category of a backend interaction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendErrorKind {
    /// The relay or backend could not be reached.
    Unreachable,
    /// The call exceeded the configured timeout.
    Timeout,
    /// The backend answered with an RPC-level fault.
    Rpc,
    /// The response could not be interpreted (wrong shape, missing id, ...).
    Malformed,
}

impl core::fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            BackendErrorKind::Unreachable => "unreachable",
            BackendErrorKind::Timeout => "timeout",
            BackendErrorKind::Rpc => "rpc fault",
            BackendErrorKind::Malformed => "malformed response",
        };
        f.write_str(s)
    }
}

/// Network / RPC failure talking to the ERP backend.
///
/// `retryable` tells the caller whether repeating the same call may succeed.
/// The core never retries on its own.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("backend {kind}: {message}")]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable,
        }
    }

    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Unreachable, message, true)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Timeout, message, true)
    }

    pub fn rpc(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Rpc, message, false)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Malformed, message, false)
    }
}

/// Error taxonomy of the valuation core.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValuationError {
    /// Input rejected before touching the backend (negative cost, editing a
    /// non-inbound movement, ...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A movement or product does not exist on the backend.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// A read against the backend failed.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// A remote patch failed; nothing downstream of it was executed.
    #[error("backend write failed: {0}")]
    BackendWrite(BackendError),
}

impl ValuationError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn write_failed(source: BackendError) -> Self {
        Self::BackendWrite(source)
    }

    /// Whether repeating the failed operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ValuationError::Backend(e) | ValuationError::BackendWrite(e) => e.retryable,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_flag_follows_backend_kind() {
        assert!(ValuationError::from(BackendError::timeout("slow")).is_retryable());
        assert!(!ValuationError::from(BackendError::malformed("no id")).is_retryable());
        assert!(!ValuationError::validation("negative cost").is_retryable());
        assert!(ValuationError::write_failed(BackendError::unreachable("down")).is_retryable());
    }

    #[test]
    fn messages_name_the_missing_record() {
        let err = ValuationError::not_found("movement", 17);
        assert_eq!(err.to_string(), "movement 17 not found");
    }
}
