//! # SeaweedFS COSI Core
//!
//! Provisioning logic for the SeaweedFS COSI driver.
//!
//! This crate provides:
//! - **Bucket Management**: idempotent creation and removal of bucket directories
//! - **Access Management**: bucket-scoped credentials backed by one identity per grant
//! - **Naming**: bucket ID, account ID and policy name rules
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │           Provisioner Service           │
//! ├────────────────────┬────────────────────┤
//! │   BucketManager    │   AccessManager    │
//! ├────────────────────┴────────────────────┤
//! │           StorageBackend Trait          │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Managers keep no state between calls. Idempotency is derived from what the
//! backend reports on every request.

pub mod access;
pub mod bucket;
pub mod config;
pub mod error;
pub mod naming;

pub use access::{
    bucket_policy, AccessGrant, AccessManager, AuthenticationType, Credentials, GrantOutcome,
    RevocationOutcome,
};
pub use bucket::{BucketManager, BucketOutcome, BucketParameters, CreationStatus, DeletionOutcome};
pub use config::{ProvisionerConfig, DEFAULT_BUCKETS_ROOT};
pub use error::{ErrorCode, ProvisionError, Result};
