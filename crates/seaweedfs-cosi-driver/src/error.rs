//! Translation of provisioning errors into gRPC status codes

use seaweedfs_cosi_core::{ErrorCode, ProvisionError};
use tonic::{Code, Status};

/// gRPC code for a provisioning error code
pub fn code_for(code: ErrorCode) -> Code {
    match code {
        ErrorCode::InvalidArgument => Code::InvalidArgument,
        ErrorCode::AlreadyExists => Code::AlreadyExists,
        ErrorCode::NotFound => Code::NotFound,
        ErrorCode::FailedPrecondition => Code::FailedPrecondition,
        ErrorCode::Unavailable => Code::Unavailable,
        ErrorCode::Internal => Code::Internal,
    }
}

/// Whether the failure was caused by the request rather than the backend
pub fn is_caller_error(code: ErrorCode) -> bool {
    matches!(
        code,
        ErrorCode::InvalidArgument | ErrorCode::AlreadyExists | ErrorCode::NotFound
    )
}

/// Convert a provisioning error into a status carrying its context
pub fn status_for(err: &ProvisionError) -> Status {
    Status::new(code_for(err.code()), err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use seaweedfs_cosi_client::{BackendError, ErrorKind};

    #[rstest]
    #[case(ProvisionError::InvalidArgument("empty".into()), Code::InvalidArgument)]
    #[case(ProvisionError::AlreadyExists { bucket: "b-x".into() }, Code::AlreadyExists)]
    #[case(ProvisionError::NotFound { resource: "bucket b-x".into() }, Code::NotFound)]
    #[case(
        ProvisionError::FailedPrecondition { resource: "bucket b-x".into(), reason: "protected".into() },
        Code::FailedPrecondition
    )]
    #[case(
        ProvisionError::backend("creating bucket b-x", BackendError::simulated(ErrorKind::Unavailable, "refused")),
        Code::Unavailable
    )]
    #[case(
        ProvisionError::internal("attaching policy", BackendError::simulated(ErrorKind::Rejected, "denied")),
        Code::Internal
    )]
    fn test_status_mapping(#[case] err: ProvisionError, #[case] expected: Code) {
        let status = status_for(&err);
        assert_eq!(status.code(), expected);
        assert_eq!(status.message(), err.to_string());
    }
}
