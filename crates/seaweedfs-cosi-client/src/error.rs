//! Backend error types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, BackendError>;

/// Coarse classification of a backend failure.
///
/// Callers branch on this instead of inspecting messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Backend unreachable, overloaded or timed out; safe for the caller to retry
    Unavailable,
    /// The addressed entry does not exist
    NotFound,
    /// The addressed entry already exists
    AlreadyExists,
    /// The backend refused the operation in its current state
    Precondition,
    /// The backend rejected the request as malformed
    Rejected,
    /// Anything else
    Internal,
}

/// Backend errors
#[derive(Error, Debug)]
pub enum BackendError {
    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Filer API error
    #[error("filer error ({status}) on {path}: {message}")]
    Filer {
        status: u16,
        path: String,
        message: String,
    },

    /// IAM API error
    #[error("IAM error ({code}) on {action}: {message}")]
    Iam {
        action: String,
        code: String,
        message: String,
        request_id: Option<String>,
    },

    /// The backend answered with something we could not decode
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Failure produced by the in-memory backend
    #[error("{kind:?}: {message}")]
    Simulated { kind: ErrorKind, message: String },
}

impl BackendError {
    /// Build an error of an explicit kind
    pub fn simulated(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Simulated {
            kind,
            message: message.into(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    ErrorKind::Unavailable
                } else if let Some(status) = e.status() {
                    kind_for_status(status.as_u16())
                } else {
                    ErrorKind::Internal
                }
            }
            Self::Filer { status, .. } => kind_for_status(*status),
            Self::Iam { code, .. } => kind_for_iam_code(code),
            Self::InvalidResponse(_) | Self::Config(_) => ErrorKind::Internal,
            Self::Simulated { kind, .. } => *kind,
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Check if the caller may retry
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Unavailable
    }
}

/// Map a filer HTTP status to an error kind
pub(crate) fn kind_for_status(status: u16) -> ErrorKind {
    match status {
        404 => ErrorKind::NotFound,
        409 | 412 => ErrorKind::Precondition,
        400 => ErrorKind::Rejected,
        429 | 502 | 503 | 504 => ErrorKind::Unavailable,
        _ => ErrorKind::Internal,
    }
}

/// Map an IAM error code to an error kind
pub(crate) fn kind_for_iam_code(code: &str) -> ErrorKind {
    match code {
        "NoSuchEntity" => ErrorKind::NotFound,
        "EntityAlreadyExists" => ErrorKind::AlreadyExists,
        "ServiceUnavailable" | "ServiceFailure" | "Throttling" => ErrorKind::Unavailable,
        "InvalidInput" | "ValidationError" | "MalformedPolicyDocument" | "InvalidAction" => {
            ErrorKind::Rejected
        }
        "DeleteConflict" | "LimitExceeded" => ErrorKind::Precondition,
        _ => ErrorKind::Internal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(404, ErrorKind::NotFound)]
    #[case(409, ErrorKind::Precondition)]
    #[case(400, ErrorKind::Rejected)]
    #[case(503, ErrorKind::Unavailable)]
    #[case(500, ErrorKind::Internal)]
    fn test_filer_status_kind(#[case] status: u16, #[case] expected: ErrorKind) {
        let err = BackendError::Filer {
            status,
            path: "/buckets/a".to_string(),
            message: String::new(),
        };
        assert_eq!(err.kind(), expected);
    }

    #[rstest]
    #[case("NoSuchEntity", ErrorKind::NotFound)]
    #[case("EntityAlreadyExists", ErrorKind::AlreadyExists)]
    #[case("ServiceUnavailable", ErrorKind::Unavailable)]
    #[case("MalformedPolicyDocument", ErrorKind::Rejected)]
    #[case("SomethingElse", ErrorKind::Internal)]
    fn test_iam_code_kind(#[case] code: &str, #[case] expected: ErrorKind) {
        let err = BackendError::Iam {
            action: "CreateUser".to_string(),
            code: code.to_string(),
            message: String::new(),
            request_id: None,
        };
        assert_eq!(err.kind(), expected);
    }

    #[test]
    fn test_retryable_only_when_unavailable() {
        assert!(BackendError::simulated(ErrorKind::Unavailable, "down").is_retryable());
        assert!(!BackendError::simulated(ErrorKind::Internal, "boom").is_retryable());
        assert!(BackendError::simulated(ErrorKind::NotFound, "gone").is_not_found());
    }
}
