//! Error types for replio
//!
//! This module defines the error taxonomy of the reconfiguration protocol
//! and the structured error records delivered to the originating request.

use crate::striping::StripingRecordError;
use thiserror::Error;

/// Common result type for replio operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for replio
#[derive(Debug, Error)]
pub enum Error {
    // Caller errors
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unsupported replica update policy: {0:?}")]
    UnsupportedPolicy(String),

    #[error("malformed striping record: {0}")]
    MalformedRecord(#[from] StripingRecordError),

    #[error("precondition violated: {0}")]
    PreconditionViolated(String),

    // Metadata install outcomes
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("redirect to replication master: {target}")]
    Redirect { target: String },

    // Per-OSD transport failures
    #[error("transport error talking to OSD {osd}: {message}")]
    Transport { osd: String, message: String },

    #[error("request timeout")]
    Timeout,

    // Protocol failures
    #[error("insufficient quorum: {0}")]
    InsufficientQuorum(String),

    #[error("coordinator is shutting down")]
    Shutdown,

    // Internal errors
    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a precondition violation error
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::PreconditionViolated(msg.into())
    }

    /// Create an insufficient quorum error
    pub fn insufficient_quorum(msg: impl Into<String>) -> Self {
        Self::InsufficientQuorum(msg.into())
    }

    /// Create a not implemented error
    pub fn not_implemented(feature: impl Into<String>) -> Self {
        Self::NotImplemented(feature.into())
    }

    /// Check if this is a retryable (transient transport) error
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Timeout)
    }

    /// Check if this error was caused by the caller
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_)
                | Self::UnsupportedPolicy(_)
                | Self::MalformedRecord(_)
                | Self::PreconditionViolated(_)
        )
    }

    /// POSIX errno class reported to the client for this error
    #[must_use]
    pub fn errno(&self) -> Errno {
        match self {
            Self::InvalidArgument(_)
            | Self::UnsupportedPolicy(_)
            | Self::MalformedRecord(_)
            | Self::PreconditionViolated(_) => Errno::Einval,

            Self::PermissionDenied(_) => Errno::Eperm,

            Self::Transport { .. } | Self::Timeout => Errno::Eio,

            Self::Shutdown => Errno::Eagain,

            Self::Redirect { .. }
            | Self::InsufficientQuorum(_)
            | Self::NotImplemented(_)
            | Self::Internal(_) => Errno::None,
        }
    }
}

/// POSIX errno classes surfaced to clients
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Errno {
    /// No errno applies (internal server errors, redirects)
    None,
    /// Invalid argument
    Einval,
    /// Operation not permitted
    Eperm,
    /// I/O error
    Eio,
    /// Resource temporarily unavailable
    Eagain,
}

/// Classification of an error record
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorType {
    /// A POSIX-style error attributable to the request
    Errno,
    /// A failure inside the server
    InternalServerError,
    /// The request must be retried against another replica of the metadata
    /// service
    Redirect,
}

/// Structured error record attached to a failed request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorRecord {
    /// Classification of the failure
    pub error_type: ErrorType,
    /// POSIX errno class, `Errno::None` unless `error_type` is `Errno`
    pub errno: Errno,
    /// Human-readable description; for redirects, the target UUID
    pub message: String,
}

impl From<Error> for ErrorRecord {
    fn from(err: Error) -> Self {
        match err {
            Error::Redirect { target } => Self {
                error_type: ErrorType::Redirect,
                errno: Errno::None,
                message: target,
            },
            err if err.errno() != Errno::None => Self {
                error_type: ErrorType::Errno,
                errno: err.errno(),
                message: err.to_string(),
            },
            err => Self {
                error_type: ErrorType::InternalServerError,
                errno: Errno::None,
                message: format!("an error has occurred at the metadata service: {err}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_retryable() {
        assert!(Error::Timeout.is_retryable());
        assert!(Error::Transport {
            osd: "osd".into(),
            message: "connection reset".into()
        }
        .is_retryable());
        assert!(!Error::PermissionDenied("test".into()).is_retryable());
    }

    #[test]
    fn test_errno_mapping() {
        assert_eq!(Error::invalid_argument("x").errno(), Errno::Einval);
        assert_eq!(
            Error::UnsupportedPolicy("WqRqX".into()).errno(),
            Errno::Einval
        );
        assert_eq!(Error::PermissionDenied("x".into()).errno(), Errno::Eperm);
        assert_eq!(Error::internal("x").errno(), Errno::None);
    }

    #[test]
    fn test_record_classification() {
        let record = ErrorRecord::from(Error::precondition("version mismatch"));
        assert_eq!(record.error_type, ErrorType::Errno);
        assert_eq!(record.errno, Errno::Einval);

        let record = ErrorRecord::from(Error::insufficient_quorum("no responses"));
        assert_eq!(record.error_type, ErrorType::InternalServerError);
        assert_eq!(record.errno, Errno::None);

        let record = ErrorRecord::from(Error::Redirect {
            target: "mrc-2".into(),
        });
        assert_eq!(record.error_type, ErrorType::Redirect);
        assert_eq!(record.message, "mrc-2");
    }
}
