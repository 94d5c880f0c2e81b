//! Scoped credential issuance and revocation
//!
//! Every grant is backed by its own backend identity, named
//! `{principal}@{bucket_id}`, holding one access key and one policy that only
//! covers the bucket and the objects inside it. The identity store is the
//! only record of a grant.
//!
//! The policy is attached before the key is created, so an identity holding
//! any key is a complete grant. Keys on an existing identity are never
//! removed by a grant request.

use crate::{
    bucket::BucketManager,
    naming::{account_id, policy_name, resolve_account_id, validate_principal},
    ProvisionError, Result,
};
use parking_lot::Mutex;
use seaweedfs_cosi_client::{
    BackendError, DeleteOutcome, Effect, IdentityOutcome, PolicyDocument, PolicyStatement,
    SecretKey, StorageBackend,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, instrument, warn};

/// Object actions granted on `arn:aws:s3:::{bucket}/*`
const OBJECT_ACTIONS: &[&str] = &[
    "s3:GetObject",
    "s3:PutObject",
    "s3:DeleteObject",
    "s3:GetObjectTagging",
    "s3:PutObjectTagging",
    "s3:AbortMultipartUpload",
    "s3:ListMultipartUploadParts",
];

/// Bucket actions granted on `arn:aws:s3:::{bucket}`
const BUCKET_ACTIONS: &[&str] = &[
    "s3:ListBucket",
    "s3:GetBucketLocation",
    "s3:ListBucketMultipartUploads",
];

/// Requested authentication scheme
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthenticationType {
    Unspecified,
    /// Static access key pair
    Key,
    /// Workload identity federation
    Iam,
}

/// An issued key pair. The secret is only ever handed out once.
#[derive(Clone, Debug)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: SecretKey,
}

/// Outcome of a grant request
#[derive(Clone, Debug)]
pub enum GrantOutcome {
    /// A fresh credential was issued by this request
    Issued(Credentials),
    /// A complete grant already exists; its secret was disclosed earlier
    AlreadyGranted,
}

impl GrantOutcome {
    pub fn credentials(&self) -> Option<&Credentials> {
        match self {
            Self::Issued(credentials) => Some(credentials),
            Self::AlreadyGranted => None,
        }
    }

    pub fn is_already_granted(&self) -> bool {
        matches!(self, Self::AlreadyGranted)
    }
}

/// A granted account together with what this request produced
#[derive(Clone, Debug)]
pub struct AccessGrant {
    pub account_id: String,
    pub outcome: GrantOutcome,
}

/// Outcome of a revoke request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RevocationOutcome {
    Revoked,
    /// No grant existed
    AlreadyAbsent,
}

/// Build the policy that confines a credential to one bucket
pub fn bucket_policy(bucket_id: &str) -> PolicyDocument {
    fn to_vec(actions: &[&str]) -> Vec<String> {
        actions.iter().map(|a| a.to_string()).collect()
    }
    PolicyDocument::new(vec![
        PolicyStatement {
            effect: Effect::Allow,
            action: to_vec(BUCKET_ACTIONS),
            resource: vec![format!("arn:aws:s3:::{}", bucket_id)],
        },
        PolicyStatement {
            effect: Effect::Allow,
            action: to_vec(OBJECT_ACTIONS),
            resource: vec![format!("arn:aws:s3:::{}/*", bucket_id)],
        },
    ])
}

/// Per-account locks serializing grant and revoke work within this process
#[derive(Default)]
struct AccountLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl AccountLocks {
    async fn lock(&self, account: &str) -> AccountGuard<'_> {
        let entry = Arc::clone(self.locks.lock().entry(account.to_string()).or_default());
        let guard = entry.lock_owned().await;
        AccountGuard {
            locks: self,
            account: account.to_string(),
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().len()
    }
}

struct AccountGuard<'a> {
    locks: &'a AccountLocks,
    account: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for AccountGuard<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.locks.lock();
        drop(self.guard.take());
        // Only the map still holds the entry: nobody is waiting for it
        if locks
            .get(&self.account)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            locks.remove(&self.account);
        }
    }
}

/// Issues and revokes bucket-scoped credentials.
///
/// Clones share their account locks, so grants and revokes for one account
/// never interleave within a process.
pub struct AccessManager<B: StorageBackend + ?Sized> {
    buckets: BucketManager<B>,
    locks: Arc<AccountLocks>,
}

impl<B: StorageBackend + ?Sized> Clone for AccessManager<B> {
    fn clone(&self) -> Self {
        Self {
            buckets: self.buckets.clone(),
            locks: Arc::clone(&self.locks),
        }
    }
}

impl<B: StorageBackend + ?Sized + 'static> AccessManager<B> {
    /// Create an access manager sharing the bucket manager's backend
    pub fn new(buckets: BucketManager<B>) -> Self {
        Self {
            buckets,
            locks: Arc::default(),
        }
    }

    fn backend(&self) -> &Arc<B> {
        self.buckets.backend()
    }

    /// Grant `principal` access to `bucket_id`.
    ///
    /// Replaying a completed grant returns [`GrantOutcome::AlreadyGranted`] and
    /// never re-emits the secret.
    #[instrument(skip_all, fields(bucket = %bucket_id, principal = %principal, auth = ?auth_type))]
    pub async fn grant_access(
        &self,
        bucket_id: &str,
        principal: &str,
        auth_type: AuthenticationType,
    ) -> Result<AccessGrant> {
        match auth_type {
            AuthenticationType::Key => {}
            AuthenticationType::Iam => {
                return Err(ProvisionError::InvalidArgument(
                    "IAM authentication is not supported, use Key".to_string(),
                ))
            }
            AuthenticationType::Unspecified => {
                return Err(ProvisionError::InvalidArgument(
                    "authentication type must be specified".to_string(),
                ))
            }
        }
        self.buckets.resolve(bucket_id)?;
        validate_principal(principal)?;
        self.buckets.ensure_managed(bucket_id).await?;

        let account = account_id(principal, bucket_id);
        let policy = policy_name(bucket_id);
        let _guard = self.locks.lock(&account).await;
        let backend = self.backend();

        let created = backend
            .create_identity(&account)
            .await
            .map_err(|e| ProvisionError::backend(format!("creating identity {}", account), e))?;

        if created == IdentityOutcome::AlreadyExists {
            let keys = backend.list_access_keys(&account).await.map_err(|e| {
                ProvisionError::backend(format!("inspecting identity {}", account), e)
            })?;
            if !keys.is_empty() {
                info!(account = %account, "Grant already exists, secret not re-emitted");
                return Ok(AccessGrant {
                    account_id: account,
                    outcome: GrantOutcome::AlreadyGranted,
                });
            }
            debug!(account = %account, "Completing earlier partial grant");
        }

        match self.issue(&account, &policy, bucket_id).await {
            Ok(credentials) => {
                info!(
                    account = %account,
                    access_key_id = %credentials.access_key_id,
                    "Access granted"
                );
                Ok(AccessGrant {
                    account_id: account,
                    outcome: GrantOutcome::Issued(credentials),
                })
            }
            Err((context, source)) => {
                warn!(
                    account = %account,
                    error = %source,
                    "Grant failed while {}, cleaning up", context
                );
                self.compensate(&account, &policy).await;
                Err(ProvisionError::internal(context, source))
            }
        }
    }

    async fn issue(
        &self,
        account: &str,
        policy: &str,
        bucket_id: &str,
    ) -> std::result::Result<Credentials, (String, BackendError)> {
        let backend = self.backend();
        backend
            .put_identity_policy(account, policy, &bucket_policy(bucket_id))
            .await
            .map_err(|e| (format!("attaching policy {} to {}", policy, account), e))?;
        let key = backend
            .create_access_key(account)
            .await
            .map_err(|e| (format!("creating access key for {}", account), e))?;
        Ok(Credentials {
            access_key_id: key.access_key_id,
            secret_access_key: key.secret_access_key,
        })
    }

    /// Remove everything a failed grant may have left behind. Runs on its own
    /// task so it finishes even if the calling request is dropped.
    async fn compensate(&self, account: &str, policy: &str) {
        let backend = Arc::clone(self.backend());
        let account = account.to_string();
        let policy = policy.to_string();
        let task = tokio::spawn(async move {
            if let Err(e) = remove_grant(backend.as_ref(), &account, &policy).await {
                warn!(
                    account = %account,
                    error = %e,
                    "Cleanup after failed grant incomplete, identity may need manual removal"
                );
            }
        });
        if let Err(e) = task.await {
            warn!(error = %e, "Cleanup task did not complete");
        }
    }

    /// Revoke a grant. `account` may be the account ID returned at grant time
    /// or the bare principal. Works whether or not the bucket still exists.
    #[instrument(skip_all, fields(bucket = %bucket_id, account = %account))]
    pub async fn revoke_access(&self, bucket_id: &str, account: &str) -> Result<RevocationOutcome> {
        self.buckets.resolve(bucket_id)?;
        let account = resolve_account_id(bucket_id, account)?;
        let policy = policy_name(bucket_id);
        let _guard = self.locks.lock(&account).await;
        let backend = self.backend();

        let detached = backend
            .delete_identity_policy(&account, &policy)
            .await
            .map_err(|e| ProvisionError::backend(format!("detaching policy {}", policy), e))?;

        let keys = backend
            .list_access_keys(&account)
            .await
            .map_err(|e| ProvisionError::internal(format!("listing keys of {}", account), e))?;
        let mut removed = detached == DeleteOutcome::Deleted;
        for key in &keys {
            let outcome = backend
                .delete_access_key(&account, key)
                .await
                .map_err(|e| ProvisionError::internal(format!("deleting key of {}", account), e))?;
            removed |= outcome == DeleteOutcome::Deleted;
        }
        let identity = backend
            .delete_identity(&account)
            .await
            .map_err(|e| ProvisionError::internal(format!("deleting identity {}", account), e))?;
        removed |= identity == DeleteOutcome::Deleted;

        if removed {
            info!(keys = keys.len(), "Access revoked");
            Ok(RevocationOutcome::Revoked)
        } else {
            info!("No grant to revoke");
            Ok(RevocationOutcome::AlreadyAbsent)
        }
    }
}

/// Delete keys, policy and identity of a grant, treating absence as done
async fn remove_grant<B: StorageBackend + ?Sized>(
    backend: &B,
    account: &str,
    policy: &str,
) -> std::result::Result<(), BackendError> {
    for key in backend.list_access_keys(account).await? {
        backend.delete_access_key(account, &key).await?;
    }
    backend.delete_identity_policy(account, policy).await?;
    backend.delete_identity(account).await?;
    Ok(())
}
