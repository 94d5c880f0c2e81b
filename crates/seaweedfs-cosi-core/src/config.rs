//! Provisioner configuration

use serde::{Deserialize, Serialize};

/// Default filer directory holding one sub-directory per bucket
pub const DEFAULT_BUCKETS_ROOT: &str = "/buckets";

/// Settings shared by the bucket and access managers
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProvisionerConfig {
    /// Provisioner (driver) name, also used as the directory ownership tag
    pub provisioner_name: String,
    /// Filer directory under which bucket directories live
    pub buckets_root: String,
    /// Prefix prepended to requested names to form bucket IDs
    pub bucket_prefix: String,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            provisioner_name: "seaweedfs.objectstorage.k8s.io".to_string(),
            buckets_root: DEFAULT_BUCKETS_ROOT.to_string(),
            bucket_prefix: String::new(),
        }
    }
}

impl ProvisionerConfig {
    /// Create a config for the given provisioner name
    pub fn new(provisioner_name: impl Into<String>) -> Self {
        Self {
            provisioner_name: provisioner_name.into(),
            ..Default::default()
        }
    }

    /// Set the bucket ID prefix
    pub fn with_bucket_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.bucket_prefix = prefix.into();
        self
    }

    /// Set the buckets root directory
    pub fn with_buckets_root(mut self, root: impl Into<String>) -> Self {
        self.buckets_root = root.into();
        self
    }

    /// Bucket ID for a requested name
    pub fn bucket_id_for(&self, name: &str) -> String {
        format!("{}{}", self.bucket_prefix, name)
    }

    /// Filer path of a bucket ID
    pub fn bucket_path(&self, bucket_id: &str) -> String {
        format!("{}/{}", self.buckets_root.trim_end_matches('/'), bucket_id)
    }
}
