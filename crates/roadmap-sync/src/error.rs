//! Error types for the sync layer
//!
//! Classification follows the recovery policy:
//! - Network failures and missing records are recovered locally
//! - Rejected credentials force a session reset
//! - Validation failures are logged and the remote write skipped
//! - Only answer submission and account flows surface errors to the user

use roadmap_core::ModelError;
use std::path::PathBuf;

/// Main sync error type
#[derive(Debug, Clone, thiserror::Error)]
pub enum SyncError {
    /// Transport failure or timeout
    #[error("network failure: {0}")]
    NetworkFailure(String),

    /// Remote refused the credential (401/403)
    #[error("authentication rejected (status {status})")]
    AuthRejected {
        /// HTTP status returned
        status: u16,
    },

    /// Record does not exist for this user (404)
    #[error("record not found: {0}")]
    RecordNotFound(String),

    /// Malformed payload or local state
    #[error("validation failure: {0}")]
    ValidationFailure(String),

    /// Any other non-success response
    #[error("remote rejected request (status {status}): {message}")]
    Rejected {
        /// HTTP status returned
        status: u16,
        /// Server-provided message
        message: String,
    },

    /// Local cache failure
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// Model rule violated
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// Operation needs a session token
    #[error("not authenticated")]
    NotAuthenticated,

    /// Session changed while the request was in flight
    #[error("session changed while request was in flight")]
    StaleSession,
}

impl SyncError {
    /// Check if the local state can absorb this failure
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NetworkFailure(_) | Self::RecordNotFound(_) | Self::StaleSession
        )
    }

    /// Check if the session is no longer valid
    #[inline]
    #[must_use]
    pub fn forces_session_reset(&self) -> bool {
        matches!(self, Self::AuthRejected { .. })
    }

    /// Check if the error should be shown to the user rather than only logged
    #[inline]
    #[must_use]
    pub fn is_user_visible(&self) -> bool {
        !matches!(
            self,
            Self::RecordNotFound(_) | Self::StaleSession | Self::Cache(_)
        )
    }

    /// Map a transport status code onto the taxonomy
    #[must_use]
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Self::AuthRejected { status },
            404 => Self::RecordNotFound(message),
            _ => Self::Rejected { status, message },
        }
    }
}

/// Local cache errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    /// Backing file could not be read or written
    #[error("cache io error at {path}: {message}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error text
        message: String,
    },

    /// Stored value could not be decoded
    #[error("corrupt cache entry {key}: {message}")]
    Corrupt {
        /// Cache key
        key: &'static str,
        /// Decode error text
        message: String,
    },
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert!(matches!(
            SyncError::from_status(401, "Access token required"),
            SyncError::AuthRejected { status: 401 }
        ));
        assert!(matches!(
            SyncError::from_status(403, "Invalid or expired token"),
            SyncError::AuthRejected { status: 403 }
        ));
        assert!(matches!(
            SyncError::from_status(404, "Todo not found"),
            SyncError::RecordNotFound(m) if m == "Todo not found"
        ));
        assert!(matches!(
            SyncError::from_status(409, "User already exists"),
            SyncError::Rejected { status: 409, .. }
        ));
    }

    #[test]
    fn classification() {
        assert!(SyncError::NetworkFailure("timeout".into()).is_recoverable());
        assert!(SyncError::RecordNotFound("x".into()).is_recoverable());
        assert!(!SyncError::ValidationFailure("x".into()).is_recoverable());
        assert!(SyncError::AuthRejected { status: 403 }.forces_session_reset());
        assert!(!SyncError::NetworkFailure("x".into()).forces_session_reset());
        assert!(SyncError::Rejected { status: 500, message: "x".into() }.is_user_visible());
        assert!(!SyncError::StaleSession.is_user_visible());
    }

    #[test]
    fn model_errors_convert() {
        let err: SyncError = ModelError::UnknownStep(5).into();
        assert_eq!(err.to_string(), "model error: unknown step: 5");
    }
}
