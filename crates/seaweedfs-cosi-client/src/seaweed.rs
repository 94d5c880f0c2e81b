//! `StorageBackend` over a live SeaweedFS cluster

use crate::{
    AccessKey, BackendError, Config, CreateDirectoryOutcome, DeleteOutcome, DirectoryEntry,
    FilerClient, IamClient, IdentityOutcome, PolicyDocument, Result, StorageBackend, TlsConfig,
};
use async_trait::async_trait;
use reqwest::{header, Certificate, Client, Identity};

/// SeaweedFS backend combining the filer and IAM APIs
#[derive(Clone)]
pub struct SeaweedBackend {
    config: Config,
    filer: FilerClient,
    iam: IamClient,
}

impl SeaweedBackend {
    /// Create a new backend with the given configuration
    pub fn new(config: Config) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            config
                .user_agent
                .parse()
                .map_err(|_| BackendError::Config("user agent is not a valid header".into()))?,
        );

        let mut builder = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers);
        if let Some(tls) = &config.tls {
            builder = apply_tls(builder, tls)?;
        }
        let http = builder.build().map_err(BackendError::Http)?;

        Ok(Self {
            filer: FilerClient::new(&config, http.clone()),
            iam: IamClient::new(&config, http),
            config,
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn filer(&self) -> &FilerClient {
        &self.filer
    }

    pub fn iam(&self) -> &IamClient {
        &self.iam
    }
}

fn read_pem(path: &std::path::Path) -> Result<Vec<u8>> {
    std::fs::read(path)
        .map_err(|e| BackendError::Config(format!("cannot read {}: {}", path.display(), e)))
}

fn apply_tls(
    mut builder: reqwest::ClientBuilder,
    tls: &TlsConfig,
) -> Result<reqwest::ClientBuilder> {
    if let Some(ca) = &tls.ca_cert {
        let cert = Certificate::from_pem(&read_pem(ca)?)
            .map_err(|e| BackendError::Config(format!("CA certificate {}: {}", ca.display(), e)))?;
        builder = builder.add_root_certificate(cert);
    }

    match (&tls.client_cert, &tls.client_key) {
        (Some(cert), Some(key)) => {
            let identity = Identity::from_pkcs8_pem(&read_pem(cert)?, &read_pem(key)?)
                .map_err(|e| BackendError::Config(format!("client identity: {}", e)))?;
            builder = builder.identity(identity);
        }
        (None, None) => {}
        _ => {
            return Err(BackendError::Config(
                "client certificate and key must be configured together".into(),
            ))
        }
    }
    Ok(builder)
}

#[async_trait]
impl StorageBackend for SeaweedBackend {
    async fn stat_directory(&self, path: &str) -> Result<Option<DirectoryEntry>> {
        self.filer.stat(path).await
    }

    async fn create_directory(&self, path: &str, owner: &str) -> Result<CreateDirectoryOutcome> {
        self.filer.mkdir(path, owner).await
    }

    async fn delete_directory(&self, path: &str) -> Result<DeleteOutcome> {
        self.filer.delete_recursive(path).await
    }

    async fn create_identity(&self, name: &str) -> Result<IdentityOutcome> {
        self.iam.create_user(name).await
    }

    async fn delete_identity(&self, name: &str) -> Result<DeleteOutcome> {
        self.iam.delete_user(name).await
    }

    async fn create_access_key(&self, identity: &str) -> Result<AccessKey> {
        self.iam.create_access_key(identity).await
    }

    async fn list_access_keys(&self, identity: &str) -> Result<Vec<String>> {
        self.iam.list_access_keys(identity).await
    }

    async fn delete_access_key(
        &self,
        identity: &str,
        access_key_id: &str,
    ) -> Result<DeleteOutcome> {
        self.iam.delete_access_key(identity, access_key_id).await
    }

    async fn put_identity_policy(
        &self,
        identity: &str,
        policy_name: &str,
        policy: &PolicyDocument,
    ) -> Result<()> {
        self.iam.put_user_policy(identity, policy_name, policy).await
    }

    async fn get_identity_policy(
        &self,
        identity: &str,
        policy_name: &str,
    ) -> Result<Option<PolicyDocument>> {
        self.iam.get_user_policy(identity, policy_name).await
    }

    async fn delete_identity_policy(
        &self,
        identity: &str,
        policy_name: &str,
    ) -> Result<DeleteOutcome> {
        self.iam.delete_user_policy(identity, policy_name).await
    }
}
