//! Driver configuration

use seaweedfs_cosi_client::{Config as BackendConfig, TlsConfig};
use seaweedfs_cosi_core::{ProvisionerConfig, DEFAULT_BUCKETS_ROOT};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors detected at startup
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unsupported endpoint scheme in {0:?}, expected unix:// or tcp://")]
    UnsupportedScheme(String),

    #[error("invalid endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("{0} must be set unless the memory backend is selected")]
    Missing(&'static str),

    #[error("IAM access key ID and secret must be set together")]
    PartialIamCredentials,
}

/// Where the gRPC server listens
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListenEndpoint {
    /// Unix domain socket path
    Unix(PathBuf),
    /// TCP socket address
    Tcp(SocketAddr),
}

impl ListenEndpoint {
    /// Parse `unix:///path/to.sock` or `tcp://host:port`
    pub fn parse(endpoint: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: reason.to_string(),
        };

        if let Some(path) = endpoint.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(invalid("socket path is empty"));
            }
            return Ok(Self::Unix(PathBuf::from(path)));
        }
        if let Some(addr) = endpoint.strip_prefix("tcp://") {
            return addr
                .parse()
                .map(Self::Tcp)
                .map_err(|_| invalid("expected host:port with a numeric address"));
        }
        Err(ConfigError::UnsupportedScheme(endpoint.to_string()))
    }
}

impl std::fmt::Display for ListenEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "unix://{}", path.display()),
            Self::Tcp(addr) => write!(f, "tcp://{}", addr),
        }
    }
}

/// Driver configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Provisioner name reported to the sidecar
    pub driver_name: String,
    /// gRPC listen endpoint
    pub cosi_endpoint: String,
    /// SeaweedFS filer URL
    pub filer_endpoint: Option<String>,
    /// SeaweedFS IAM API URL
    pub iam_endpoint: Option<String>,
    /// S3 endpoint handed to workloads with their credentials
    pub s3_endpoint: String,
    /// Region reported to workloads
    pub region: String,
    /// Filer directory holding the buckets
    pub buckets_root: String,
    /// Prefix for bucket IDs
    pub bucket_prefix: String,
    /// IAM admin access key ID
    pub iam_access_key_id: Option<String>,
    /// IAM admin secret access key
    #[serde(skip_serializing)]
    pub iam_secret_access_key: Option<String>,
    /// CA bundle for the backend
    pub tls_ca_cert: Option<PathBuf>,
    /// Client certificate for the backend
    pub tls_client_cert: Option<PathBuf>,
    /// Client key for the backend
    pub tls_client_key: Option<PathBuf>,
    /// Per-request backend timeout (seconds)
    pub request_timeout_secs: u64,
    /// Use the in-memory backend (for testing/development)
    pub use_memory_backend: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            driver_name: "seaweedfs.objectstorage.k8s.io".to_string(),
            cosi_endpoint: "unix:///var/lib/cosi/cosi.sock".to_string(),
            filer_endpoint: None,
            iam_endpoint: None,
            s3_endpoint: String::new(),
            region: String::new(),
            buckets_root: DEFAULT_BUCKETS_ROOT.to_string(),
            bucket_prefix: String::new(),
            iam_access_key_id: None,
            iam_secret_access_key: None,
            tls_ca_cert: None,
            tls_client_cert: None,
            tls_client_key: None,
            request_timeout_secs: 30,
            use_memory_backend: false,
        }
    }
}

impl DriverConfig {
    /// Parsed listen endpoint
    pub fn listen_endpoint(&self) -> Result<ListenEndpoint, ConfigError> {
        ListenEndpoint::parse(&self.cosi_endpoint)
    }

    /// Settings for the bucket and access managers
    pub fn provisioner_config(&self) -> ProvisionerConfig {
        ProvisionerConfig::new(&self.driver_name)
            .with_buckets_root(&self.buckets_root)
            .with_bucket_prefix(&self.bucket_prefix)
    }

    /// Settings for the SeaweedFS client
    pub fn backend_config(&self) -> Result<BackendConfig, ConfigError> {
        let filer = self
            .filer_endpoint
            .as_deref()
            .filter(|e| !e.is_empty())
            .ok_or(ConfigError::Missing("SEAWEEDFS_FILER"))?;
        let defaults = BackendConfig::default();
        let iam = self
            .iam_endpoint
            .clone()
            .filter(|e| !e.is_empty())
            .unwrap_or(defaults.iam_endpoint);

        let mut config = BackendConfig::new(filer, iam)
            .with_timeout(Duration::from_secs(self.request_timeout_secs));
        if !self.region.is_empty() {
            config.signing_region = self.region.clone();
        }

        match (&self.iam_access_key_id, &self.iam_secret_access_key) {
            (Some(id), Some(secret)) => config = config.with_iam_credentials(id, secret),
            (None, None) => {}
            _ => return Err(ConfigError::PartialIamCredentials),
        }

        if self.tls_ca_cert.is_some() || self.tls_client_cert.is_some() || self.tls_client_key.is_some() {
            config = config.with_tls(TlsConfig {
                ca_cert: self.tls_ca_cert.clone(),
                client_cert: self.tls_client_cert.clone(),
                client_key: self.tls_client_key.clone(),
            });
        }
        Ok(config)
    }
}
