//! Bucket lifecycle management on top of filer directories

use crate::{
    naming::{validate_bucket_id, validate_requested_name},
    ProvisionError, ProvisionerConfig, Result,
};
use seaweedfs_cosi_client::{CreateDirectoryOutcome, DeleteOutcome, StorageBackend};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Creation parameters supplied with a bucket request
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BucketParameters {
    /// Requested region; the backend has no notion of regions, it is only passed through
    pub region: Option<String>,
    /// Any other parameters, passed through unused
    pub extra: BTreeMap<String, String>,
}

impl BucketParameters {
    /// Split a raw parameter map into known and pass-through entries
    pub fn from_map<I>(params: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut parameters = Self::default();
        for (key, value) in params {
            if key == "region" {
                parameters.region = Some(value).filter(|v| !v.is_empty());
            } else {
                parameters.extra.insert(key, value);
            }
        }
        parameters
    }
}

/// How a create request was satisfied
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreationStatus {
    /// This request created the directory
    Created,
    /// An earlier request with the same name already created it
    AlreadyExisted,
}

/// Result of a successful create request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BucketOutcome {
    pub bucket_id: String,
    pub status: CreationStatus,
}

/// Result of a successful delete request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeletionOutcome {
    Deleted,
    /// Nothing to delete
    AlreadyAbsent,
}

/// Creates and removes bucket directories.
///
/// Holds no state of its own; the backend is the only source of truth.
pub struct BucketManager<B: StorageBackend + ?Sized> {
    backend: Arc<B>,
    config: ProvisionerConfig,
}

impl<B: StorageBackend + ?Sized> Clone for BucketManager<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            config: self.config.clone(),
        }
    }
}

impl<B: StorageBackend + ?Sized> BucketManager<B> {
    /// Create a new bucket manager
    pub fn new(backend: Arc<B>, config: ProvisionerConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &ProvisionerConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Validate a bucket ID and return its filer path
    pub fn resolve(&self, bucket_id: &str) -> Result<String> {
        validate_bucket_id(bucket_id)?;
        if !bucket_id.starts_with(&self.config.bucket_prefix) {
            return Err(ProvisionError::InvalidArgument(format!(
                "bucket {:?} is not managed by this provisioner",
                bucket_id
            )));
        }
        Ok(self.config.bucket_path(bucket_id))
    }

    /// Create a bucket, or confirm that an earlier attempt already did
    #[instrument(skip_all, fields(bucket = %name))]
    pub async fn create_bucket(
        &self,
        name: &str,
        parameters: &BucketParameters,
    ) -> Result<BucketOutcome> {
        validate_requested_name(name)?;
        let bucket_id = self.config.bucket_id_for(name);
        let path = self.resolve(&bucket_id)?;
        debug!(
            path = %path,
            region = ?parameters.region,
            "Creating bucket directory"
        );

        let outcome = self
            .backend
            .create_directory(&path, &self.config.provisioner_name)
            .await
            .map_err(|e| ProvisionError::backend(format!("creating bucket {}", bucket_id), e))?;

        let status = match outcome {
            CreateDirectoryOutcome::Created => {
                info!(bucket_id = %bucket_id, "Bucket created");
                CreationStatus::Created
            }
            CreateDirectoryOutcome::AlreadyExistsOwned => {
                info!(bucket_id = %bucket_id, "Bucket already exists, treating as success");
                CreationStatus::AlreadyExisted
            }
            CreateDirectoryOutcome::AlreadyExistsForeign => {
                return Err(ProvisionError::AlreadyExists { bucket: bucket_id });
            }
        };

        Ok(BucketOutcome { bucket_id, status })
    }

    /// Recursively delete a bucket. Deleting an absent bucket succeeds.
    #[instrument(skip_all, fields(bucket = %bucket_id))]
    pub async fn delete_bucket(&self, bucket_id: &str) -> Result<DeletionOutcome> {
        let path = self.resolve(bucket_id)?;
        let context = || format!("deleting bucket {}", bucket_id);

        let entry = self
            .backend
            .stat_directory(&path)
            .await
            .map_err(|e| ProvisionError::backend(context(), e))?;
        let Some(entry) = entry else {
            info!("Bucket already absent");
            return Ok(DeletionOutcome::AlreadyAbsent);
        };
        if !entry.is_owned_by(&self.config.provisioner_name) {
            return Err(ProvisionError::FailedPrecondition {
                resource: format!("bucket {}", bucket_id),
                reason: "directory was not created by this provisioner".to_string(),
            });
        }

        match self.backend.delete_directory(&path).await {
            Ok(DeleteOutcome::Deleted) => {
                info!("Bucket deleted");
                Ok(DeletionOutcome::Deleted)
            }
            Ok(DeleteOutcome::NotFound) => Ok(DeletionOutcome::AlreadyAbsent),
            Err(e) if e.is_not_found() => Ok(DeletionOutcome::AlreadyAbsent),
            Err(e) => Err(ProvisionError::backend(context(), e)),
        }
    }

    /// Confirm that a bucket exists and was created by this provisioner,
    /// asking the backend every time
    pub async fn ensure_managed(&self, bucket_id: &str) -> Result<()> {
        let path = self.resolve(bucket_id)?;
        let entry = self
            .backend
            .stat_directory(&path)
            .await
            .map_err(|e| ProvisionError::backend(format!("looking up bucket {}", bucket_id), e))?;
        match entry {
            Some(entry) if entry.is_owned_by(&self.config.provisioner_name) => Ok(()),
            Some(entry) if entry.is_directory => Err(ProvisionError::FailedPrecondition {
                resource: format!("bucket {}", bucket_id),
                reason: "directory was not created by this provisioner".to_string(),
            }),
            _ => Err(ProvisionError::NotFound {
                resource: format!("bucket {}", bucket_id),
            }),
        }
    }
}
