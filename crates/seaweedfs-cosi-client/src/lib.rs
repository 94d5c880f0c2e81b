//! # SeaweedFS COSI Client
//!
//! Typed access to the administrative surface of a SeaweedFS cluster.
//!
//! This crate provides:
//! - **Filer API**: directory stat, tagged creation and recursive removal
//! - **IAM API**: identities, access keys and inline policies (SigV4 signed)
//! - **StorageBackend**: the trait the provisioner is written against
//! - **MemoryBackend**: an atomic in-process implementation for tests and development
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          Provisioner Managers           │
//! ├─────────────────────────────────────────┤
//! │          StorageBackend Trait           │
//! ├────────────────────────┬────────────────┤
//! │     SeaweedBackend     │ MemoryBackend  │
//! ├────────────┬───────────┴────────────────┤
//! │ FilerClient│ IamClient                  │
//! ├────────────┴────────────────────────────┤
//! │          SeaweedFS filer / S3 IAM       │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Every operation is a single attempt. Retrying is left to the caller.

mod config;
mod error;
pub mod filer;
pub mod iam;
pub mod memory;
mod seaweed;
mod signing;
mod types;

pub use config::{Config, IamCredentials, TlsConfig};
pub use error::{BackendError, ErrorKind, Result};
pub use filer::{FilerClient, OWNER_HEADER};
pub use iam::IamClient;
pub use memory::{MemoryBackend, Operation};
pub use seaweed::SeaweedBackend;
pub use types::*;

use async_trait::async_trait;

/// Administrative operations the provisioner needs from a storage backend
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Look up the entry at `path`
    async fn stat_directory(&self, path: &str) -> Result<Option<DirectoryEntry>>;

    /// Create a directory tagged with `owner`
    async fn create_directory(&self, path: &str, owner: &str) -> Result<CreateDirectoryOutcome>;

    /// Recursively remove the directory at `path`
    async fn delete_directory(&self, path: &str) -> Result<DeleteOutcome>;

    /// Create an identity (IAM user)
    async fn create_identity(&self, name: &str) -> Result<IdentityOutcome>;

    /// Delete an identity
    async fn delete_identity(&self, name: &str) -> Result<DeleteOutcome>;

    /// Issue a new access key for an identity
    async fn create_access_key(&self, identity: &str) -> Result<AccessKey>;

    /// List the access key ids held by an identity
    async fn list_access_keys(&self, identity: &str) -> Result<Vec<String>>;

    /// Delete one access key
    async fn delete_access_key(&self, identity: &str, access_key_id: &str)
        -> Result<DeleteOutcome>;

    /// Attach (or replace) a named policy on an identity
    async fn put_identity_policy(
        &self,
        identity: &str,
        policy_name: &str,
        policy: &PolicyDocument,
    ) -> Result<()>;

    /// Fetch a named policy of an identity
    async fn get_identity_policy(
        &self,
        identity: &str,
        policy_name: &str,
    ) -> Result<Option<PolicyDocument>>;

    /// Detach a named policy from an identity
    async fn delete_identity_policy(&self, identity: &str, policy_name: &str)
        -> Result<DeleteOutcome>;
}
