//! Error types for provisioning operations

use seaweedfs_cosi_client::{BackendError, ErrorKind};
use thiserror::Error;

/// Result type alias using `ProvisionError`
pub type Result<T> = std::result::Result<T, ProvisionError>;

/// Failure categories exposed to the RPC layer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidArgument,
    AlreadyExists,
    NotFound,
    FailedPrecondition,
    Unavailable,
    Internal,
}

/// Errors that can occur while provisioning buckets and grants
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// Malformed name, principal or authentication type
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A bucket path is occupied by data this provisioner did not create
    #[error("bucket {bucket} already exists and is not managed by this provisioner")]
    AlreadyExists { bucket: String },

    /// The referenced bucket or grant does not exist
    #[error("{resource} not found")]
    NotFound { resource: String },

    /// The backend refuses the operation in its current state
    #[error("{resource}: {reason}")]
    FailedPrecondition { resource: String, reason: String },

    /// Backend unreachable; the caller may retry
    #[error("backend unavailable while {context}: {source}")]
    Unavailable {
        context: String,
        #[source]
        source: BackendError,
    },

    /// Unexpected backend failure or inconsistency
    #[error("internal error while {context}: {source}")]
    Internal {
        context: String,
        #[source]
        source: BackendError,
    },
}

impl ProvisionError {
    /// Classify a backend error raised while doing `context`
    pub fn backend(context: impl Into<String>, source: BackendError) -> Self {
        let context = context.into();
        match source.kind() {
            ErrorKind::Unavailable => Self::Unavailable { context, source },
            ErrorKind::NotFound => Self::NotFound { resource: context },
            ErrorKind::Precondition => Self::FailedPrecondition {
                resource: context,
                reason: source.to_string(),
            },
            _ => Self::Internal { context, source },
        }
    }

    /// Backend error that is always reported as internal
    pub fn internal(context: impl Into<String>, source: BackendError) -> Self {
        Self::Internal {
            context: context.into(),
            source,
        }
    }

    /// Get the error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::AlreadyExists { .. } => ErrorCode::AlreadyExists,
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::FailedPrecondition { .. } => ErrorCode::FailedPrecondition,
            Self::Unavailable { .. } => ErrorCode::Unavailable,
            Self::Internal { .. } => ErrorCode::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ErrorKind::Unavailable, ErrorCode::Unavailable)]
    #[case(ErrorKind::NotFound, ErrorCode::NotFound)]
    #[case(ErrorKind::Precondition, ErrorCode::FailedPrecondition)]
    #[case(ErrorKind::Rejected, ErrorCode::Internal)]
    #[case(ErrorKind::AlreadyExists, ErrorCode::Internal)]
    #[case(ErrorKind::Internal, ErrorCode::Internal)]
    fn test_backend_error_classification(#[case] kind: ErrorKind, #[case] expected: ErrorCode) {
        let err = ProvisionError::backend(
            "creating bucket logs",
            BackendError::simulated(kind, "backend said no"),
        );
        assert_eq!(err.code(), expected);
    }

    #[test]
    fn test_message_keeps_context() {
        let err = ProvisionError::backend(
            "deleting bucket b-logs",
            BackendError::simulated(ErrorKind::Unavailable, "connection refused"),
        );
        let message = err.to_string();
        assert!(message.contains("b-logs"));
        assert!(message.contains("connection refused"));
    }
}
