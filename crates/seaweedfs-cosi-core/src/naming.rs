//! Naming rules for buckets, principals and backend identities

use crate::{ProvisionError, Result};
use std::net::Ipv4Addr;

/// Minimum bucket ID length
pub const MIN_BUCKET_ID_LEN: usize = 3;
/// Maximum bucket ID length
pub const MAX_BUCKET_ID_LEN: usize = 63;
/// Maximum principal length
pub const MAX_PRINCIPAL_LEN: usize = 64;

/// Separator between principal and bucket ID in an account ID.
/// Valid in neither a principal nor a bucket ID, so the split is unambiguous.
const ACCOUNT_SEPARATOR: char = '@';

/// Validate a caller-supplied bucket name before it is turned into an ID
pub fn validate_requested_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ProvisionError::InvalidArgument(
            "bucket name must not be empty".to_string(),
        ));
    }
    if name.contains('/') {
        return Err(ProvisionError::InvalidArgument(format!(
            "bucket name {:?} must be a single path segment",
            name
        )));
    }
    Ok(())
}

/// Validate a bucket ID according to S3 bucket naming rules
pub fn validate_bucket_id(id: &str) -> Result<()> {
    let invalid = |reason: &str| {
        Err(ProvisionError::InvalidArgument(format!(
            "invalid bucket {:?}: {}",
            id, reason
        )))
    };

    if id.len() < MIN_BUCKET_ID_LEN || id.len() > MAX_BUCKET_ID_LEN {
        return invalid("must be between 3 and 63 characters");
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return invalid("can only contain lowercase letters, numbers, hyphens, and periods");
    }

    let first = id.as_bytes()[0];
    let last = id.as_bytes()[id.len() - 1];
    if !first.is_ascii_alphanumeric() || !last.is_ascii_alphanumeric() {
        return invalid("must start and end with a letter or number");
    }

    if id.contains("..") {
        return invalid("cannot contain consecutive periods");
    }

    if id.parse::<Ipv4Addr>().is_ok() {
        return invalid("cannot be formatted as an IP address");
    }

    Ok(())
}

/// Validate a principal identifier
pub fn validate_principal(principal: &str) -> Result<()> {
    if principal.is_empty() || principal.len() > MAX_PRINCIPAL_LEN {
        return Err(ProvisionError::InvalidArgument(format!(
            "principal must be between 1 and {} characters",
            MAX_PRINCIPAL_LEN
        )));
    }
    if !principal
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "_+=,.-".contains(c))
    {
        return Err(ProvisionError::InvalidArgument(format!(
            "principal {:?} contains characters outside [A-Za-z0-9_+=,.-]",
            principal
        )));
    }
    Ok(())
}

/// Backend identity (and COSI account ID) for a principal on a bucket
pub fn account_id(principal: &str, bucket_id: &str) -> String {
    format!("{}{}{}", principal, ACCOUNT_SEPARATOR, bucket_id)
}

/// Resolve the account ID for a revocation request, which may carry either the
/// account ID handed out at grant time or the bare principal.
/// An account ID of another bucket is rejected.
pub fn resolve_account_id(bucket_id: &str, account_or_principal: &str) -> Result<String> {
    match account_or_principal.split_once(ACCOUNT_SEPARATOR) {
        Some((principal, bucket)) if bucket == bucket_id => {
            validate_principal(principal)?;
            Ok(account_or_principal.to_string())
        }
        Some(_) => Err(ProvisionError::InvalidArgument(format!(
            "account {:?} does not belong to bucket {}",
            account_or_principal, bucket_id
        ))),
        None => {
            validate_principal(account_or_principal)?;
            Ok(account_id(account_or_principal, bucket_id))
        }
    }
}

/// Name of the scoping policy attached for a bucket
pub fn policy_name(bucket_id: &str) -> String {
    format!("cosi-{}", bucket_id)
}
