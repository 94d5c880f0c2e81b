//! Client configuration

use crate::SecretKey;
use std::path::PathBuf;
use std::time::Duration;

/// Backend client configuration
#[derive(Clone, Debug)]
pub struct Config {
    /// Filer HTTP endpoint URL
    pub filer_endpoint: String,
    /// IAM API endpoint URL
    pub iam_endpoint: String,
    /// Region used when signing IAM requests
    pub signing_region: String,
    /// Administrative credentials for the IAM API (unsigned requests when absent)
    pub iam_credentials: Option<IamCredentials>,
    /// Transport security for both endpoints
    pub tls: Option<TlsConfig>,
    /// Per-request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            filer_endpoint: "http://localhost:8888".to_string(),
            iam_endpoint: "http://localhost:8111".to_string(),
            signing_region: "us-east-1".to_string(),
            iam_credentials: None,
            tls: None,
            timeout: Duration::from_secs(30),
            user_agent: format!("seaweedfs-cosi/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Config {
    /// Create a new config with the given filer and IAM endpoints
    pub fn new(filer_endpoint: impl Into<String>, iam_endpoint: impl Into<String>) -> Self {
        Self {
            filer_endpoint: filer_endpoint.into(),
            iam_endpoint: iam_endpoint.into(),
            ..Default::default()
        }
    }

    /// Sign IAM requests with the given administrative key pair
    pub fn with_iam_credentials(
        mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        self.iam_credentials = Some(IamCredentials {
            access_key_id: access_key_id.into(),
            secret_access_key: SecretKey::new(secret_access_key),
        });
        self
    }

    /// Set TLS material
    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Filer base URL without a trailing slash
    pub fn filer_url(&self) -> &str {
        self.filer_endpoint.trim_end_matches('/')
    }

    /// IAM base URL without a trailing slash
    pub fn iam_url(&self) -> &str {
        self.iam_endpoint.trim_end_matches('/')
    }
}

/// Key pair used to sign IAM administrative requests
#[derive(Clone, Debug)]
pub struct IamCredentials {
    pub access_key_id: String,
    pub secret_access_key: SecretKey,
}

/// PEM files for mutually-trusted TLS
#[derive(Clone, Debug, Default)]
pub struct TlsConfig {
    /// CA bundle used to verify the backend
    pub ca_cert: Option<PathBuf>,
    /// Client certificate presented to the backend
    pub client_cert: Option<PathBuf>,
    /// PKCS#8 private key for the client certificate
    pub client_key: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_are_trimmed() {
        let config = Config::new("http://filer:8888/", "http://s3:8111//");
        assert_eq!(config.filer_url(), "http://filer:8888");
        assert_eq!(config.iam_url(), "http://s3:8111");
    }

    #[test]
    fn test_iam_secret_is_not_debug_printed() {
        let config = Config::default().with_iam_credentials("admin", "super-secret-value");
        let printed = format!("{:?}", config);
        assert!(printed.contains("admin"));
        assert!(!printed.contains("super-secret-value"));
    }
}
