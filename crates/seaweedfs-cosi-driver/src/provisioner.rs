//! Provisioner service: the gRPC face of the bucket and access managers

use crate::error::{is_caller_error, status_for};
use crate::proto::{
    protocol, provisioner_server::Provisioner, secrets, AuthenticationType as WireAuthType,
    CredentialDetails, DriverCreateBucketRequest, DriverCreateBucketResponse,
    DriverDeleteBucketRequest, DriverDeleteBucketResponse, DriverGrantBucketAccessRequest,
    DriverGrantBucketAccessResponse, DriverRevokeBucketAccessRequest,
    DriverRevokeBucketAccessResponse, Protocol, S3SignatureVersion, S3_CREDENTIALS_KEY, S3,
};
use seaweedfs_cosi_client::StorageBackend;
use seaweedfs_cosi_core::{
    AccessManager, AuthenticationType, BucketManager, BucketParameters, Credentials,
    ProvisionError, ProvisionerConfig,
};
use std::collections::HashMap;
use std::sync::Arc;
use tonic::{Request, Response, Status};
use tracing::{error, info_span, warn, Instrument};
use uuid::Uuid;

/// Connection details handed to workloads alongside their credentials
#[derive(Clone, Debug, Default)]
pub struct S3Settings {
    /// S3 endpoint URL
    pub endpoint: String,
    /// Default region. Reported in `bucket_info` unless the bucket was created
    /// with a `region` parameter, and always the region placed in credentials:
    /// the backend keeps no per-bucket region, so a grant cannot recover an
    /// override given at creation time.
    pub region: String,
}

/// Provisioner service
pub struct ProvisionerService {
    buckets: BucketManager<dyn StorageBackend>,
    access: AccessManager<dyn StorageBackend>,
    s3: S3Settings,
}

impl ProvisionerService {
    /// Create a provisioner service over a backend
    pub fn new(backend: Arc<dyn StorageBackend>, config: ProvisionerConfig, s3: S3Settings) -> Self {
        let buckets = BucketManager::new(backend, config);
        let access = AccessManager::new(buckets.clone());
        Self {
            buckets,
            access,
            s3,
        }
    }

    fn s3_protocol(&self, region: Option<&str>) -> Protocol {
        Protocol {
            r#type: Some(protocol::Type::S3(S3 {
                region: region.unwrap_or(&self.s3.region).to_string(),
                signature_version: S3SignatureVersion::S3V4 as i32,
            })),
        }
    }

    fn credential_details(&self, credentials: &Credentials) -> HashMap<String, CredentialDetails> {
        let secrets = HashMap::from([
            (
                secrets::ACCESS_KEY_ID.to_string(),
                credentials.access_key_id.clone(),
            ),
            (
                secrets::ACCESS_SECRET_KEY.to_string(),
                credentials.secret_access_key.expose().to_string(),
            ),
            (secrets::ENDPOINT.to_string(), self.s3.endpoint.clone()),
            (secrets::REGION.to_string(), self.s3.region.clone()),
        ]);
        HashMap::from([(S3_CREDENTIALS_KEY.to_string(), CredentialDetails { secrets })])
    }
}

/// Reject a request whose required field is empty
fn require(field: &str, value: &str) -> Result<(), Status> {
    if value.is_empty() {
        warn!(field, "Rejected request with missing field");
        return Err(Status::invalid_argument(format!("{} is required", field)));
    }
    Ok(())
}

/// Log a failed operation and convert it to a status.
/// Caller mistakes are warnings, backend trouble is an error.
fn failed(operation: &str, err: ProvisionError) -> Status {
    let code = err.code();
    if is_caller_error(code) {
        warn!(operation, code = ?code, error = %err, "Request rejected");
    } else {
        error!(operation, code = ?code, error = %err, "Request failed");
    }
    status_for(&err)
}

fn auth_type(value: i32) -> Result<AuthenticationType, Status> {
    match WireAuthType::try_from(value) {
        Ok(WireAuthType::Key) => Ok(AuthenticationType::Key),
        Ok(WireAuthType::Iam) => Ok(AuthenticationType::Iam),
        Ok(WireAuthType::UnknownAuthenticationType) => Ok(AuthenticationType::Unspecified),
        Err(_) => {
            warn!(value, "Rejected unknown authentication type");
            Err(Status::invalid_argument(format!(
                "unknown authentication type {}",
                value
            )))
        }
    }
}

#[tonic::async_trait]
impl Provisioner for ProvisionerService {
    async fn driver_create_bucket(
        &self,
        request: Request<DriverCreateBucketRequest>,
    ) -> Result<Response<DriverCreateBucketResponse>, Status> {
        let req = request.into_inner();
        let span = info_span!("create_bucket", request_id = %Uuid::new_v4(), name = %req.name);

        async move {
            require("name", &req.name)?;
            let parameters = BucketParameters::from_map(req.parameters);
            let outcome = self
                .buckets
                .create_bucket(&req.name, &parameters)
                .await
                .map_err(|e| failed("DriverCreateBucket", e))?;

            Ok(Response::new(DriverCreateBucketResponse {
                bucket_id: outcome.bucket_id,
                bucket_info: Some(self.s3_protocol(parameters.region.as_deref())),
            }))
        }
        .instrument(span)
        .await
    }

    async fn driver_delete_bucket(
        &self,
        request: Request<DriverDeleteBucketRequest>,
    ) -> Result<Response<DriverDeleteBucketResponse>, Status> {
        let req = request.into_inner();
        let span = info_span!("delete_bucket", request_id = %Uuid::new_v4(), bucket_id = %req.bucket_id);

        async move {
            require("bucket_id", &req.bucket_id)?;
            self.buckets
                .delete_bucket(&req.bucket_id)
                .await
                .map_err(|e| failed("DriverDeleteBucket", e))?;
            Ok(Response::new(DriverDeleteBucketResponse {}))
        }
        .instrument(span)
        .await
    }

    async fn driver_grant_bucket_access(
        &self,
        request: Request<DriverGrantBucketAccessRequest>,
    ) -> Result<Response<DriverGrantBucketAccessResponse>, Status> {
        let req = request.into_inner();
        let span = info_span!(
            "grant_bucket_access",
            request_id = %Uuid::new_v4(),
            bucket_id = %req.bucket_id,
            principal = %req.name,
        );

        async move {
            require("bucket_id", &req.bucket_id)?;
            require("name", &req.name)?;
            let auth = auth_type(req.authentication_type)?;

            let grant = self
                .access
                .grant_access(&req.bucket_id, &req.name, auth)
                .await
                .map_err(|e| failed("DriverGrantBucketAccess", e))?;

            let credentials = grant
                .outcome
                .credentials()
                .map(|c| self.credential_details(c))
                .unwrap_or_default();

            Ok(Response::new(DriverGrantBucketAccessResponse {
                account_id: grant.account_id,
                credentials,
            }))
        }
        .instrument(span)
        .await
    }

    async fn driver_revoke_bucket_access(
        &self,
        request: Request<DriverRevokeBucketAccessRequest>,
    ) -> Result<Response<DriverRevokeBucketAccessResponse>, Status> {
        let req = request.into_inner();
        let span = info_span!(
            "revoke_bucket_access",
            request_id = %Uuid::new_v4(),
            bucket_id = %req.bucket_id,
            account_id = %req.account_id,
        );

        async move {
            require("bucket_id", &req.bucket_id)?;
            require("account_id", &req.account_id)?;
            self.access
                .revoke_access(&req.bucket_id, &req.account_id)
                .await
                .map_err(|e| failed("DriverRevokeBucketAccess", e))?;
            Ok(Response::new(DriverRevokeBucketAccessResponse {}))
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seaweedfs_cosi_client::{ErrorKind, MemoryBackend, Operation};
    use tonic::Code;

    fn service() -> (Arc<MemoryBackend>, ProvisionerService) {
        let backend = Arc::new(MemoryBackend::new());
        let service = ProvisionerService::new(
            backend.clone(),
            ProvisionerConfig::new("seaweedfs.objectstorage.k8s.io").with_bucket_prefix("b-"),
            S3Settings {
                endpoint: "http://s3.example:8333".to_string(),
                region: "us-east-1".to_string(),
            },
        );
        (backend, service)
    }

    fn create(name: &str, region: Option<&str>) -> Request<DriverCreateBucketRequest> {
        Request::new(DriverCreateBucketRequest {
            name: name.to_string(),
            parameters: region
                .map(|r| HashMap::from([("region".to_string(), r.to_string())]))
                .unwrap_or_default(),
        })
    }

    fn grant(bucket_id: &str, name: &str, auth: WireAuthType) -> Request<DriverGrantBucketAccessRequest> {
        Request::new(DriverGrantBucketAccessRequest {
            bucket_id: bucket_id.to_string(),
            name: name.to_string(),
            authentication_type: auth as i32,
            parameters: HashMap::new(),
        })
    }

    fn s3_of(info: Option<Protocol>) -> S3 {
        match info.and_then(|p| p.r#type) {
            Some(protocol::Type::S3(s3)) => s3,
            other => panic!("expected S3 protocol, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_bucket_reports_s3_protocol() {
        let (_, service) = service();
        let response = service
            .driver_create_bucket(create("logs-2024", None))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.bucket_id, "b-logs-2024");
        let s3 = s3_of(response.bucket_info);
        assert_eq!(s3.region, "us-east-1");
        assert_eq!(s3.signature_version, S3SignatureVersion::S3V4 as i32);
    }

    #[tokio::test]
    async fn test_region_parameter_overrides_default() {
        let (_, service) = service();
        let response = service
            .driver_create_bucket(create("logs", Some("eu-central-1")))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(s3_of(response.bucket_info).region, "eu-central-1");
    }

    #[tokio::test]
    async fn test_empty_name_rejected_without_backend_call() {
        let (backend, service) = service();
        let status = service.driver_create_bucket(create("", None)).await.unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
        assert_eq!(backend.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_grant_emits_secret_once() {
        let (_, service) = service();
        service.driver_create_bucket(create("logs", None)).await.unwrap();

        let first = service
            .driver_grant_bucket_access(grant("b-logs", "svc", WireAuthType::Key))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(first.account_id, "svc@b-logs");
        let s3 = &first.credentials[S3_CREDENTIALS_KEY].secrets;
        assert!(s3[secrets::ACCESS_KEY_ID].starts_with("AKID"));
        assert!(!s3[secrets::ACCESS_SECRET_KEY].is_empty());
        assert_eq!(s3[secrets::ENDPOINT], "http://s3.example:8333");
        assert_eq!(s3[secrets::REGION], "us-east-1");

        let replay = service
            .driver_grant_bucket_access(grant("b-logs", "svc", WireAuthType::Key))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(replay.account_id, first.account_id);
        assert!(replay.credentials.is_empty());
    }

    #[tokio::test]
    async fn test_credentials_carry_default_region() {
        let (_, service) = service();
        service
            .driver_create_bucket(create("logs", Some("eu-central-1")))
            .await
            .unwrap();

        let granted = service
            .driver_grant_bucket_access(grant("b-logs", "svc", WireAuthType::Key))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(granted.credentials[S3_CREDENTIALS_KEY].secrets[secrets::REGION], "us-east-1");
    }

    #[tokio::test]
    async fn test_grant_status_codes() {
        let (_, service) = service();
        let status = service
            .driver_grant_bucket_access(grant("b-missing", "svc", WireAuthType::Key))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::NotFound);

        service.driver_create_bucket(create("logs", None)).await.unwrap();
        let status = service
            .driver_grant_bucket_access(grant("b-logs", "svc", WireAuthType::Iam))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);

        let mut unknown = grant("b-logs", "svc", WireAuthType::Key);
        unknown.get_mut().authentication_type = 42;
        let status = service.driver_grant_bucket_access(unknown).await.unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_backend_outage_is_unavailable() {
        let (backend, service) = service();
        backend.fail_next(Operation::CreateDirectory, ErrorKind::Unavailable);
        let status = service.driver_create_bucket(create("logs", None)).await.unwrap_err();
        assert_eq!(status.code(), Code::Unavailable);
    }

    #[tokio::test]
    async fn test_policy_failure_is_internal_and_cleaned_up() {
        let (backend, service) = service();
        service.driver_create_bucket(create("logs", None)).await.unwrap();
        backend.fail_next(Operation::PutIdentityPolicy, ErrorKind::Internal);

        let status = service
            .driver_grant_bucket_access(grant("b-logs", "svc", WireAuthType::Key))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::Internal);
        assert!(status.message().contains("svc@b-logs"));
        assert!(!backend.has_identity("svc@b-logs"));
    }

    #[tokio::test]
    async fn test_delete_and_revoke_are_idempotent() {
        let (_, service) = service();
        for _ in 0..2 {
            service
                .driver_delete_bucket(Request::new(DriverDeleteBucketRequest {
                    bucket_id: "b-gone".to_string(),
                    delete_context: HashMap::new(),
                }))
                .await
                .unwrap();
            service
                .driver_revoke_bucket_access(Request::new(DriverRevokeBucketAccessRequest {
                    bucket_id: "b-gone".to_string(),
                    account_id: "svc@b-gone".to_string(),
                    revoke_access_context: HashMap::new(),
                }))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_missing_fields_rejected() {
        let (_, service) = service();
        let status = service
            .driver_revoke_bucket_access(Request::new(DriverRevokeBucketAccessRequest {
                bucket_id: "b-logs".to_string(),
                account_id: String::new(),
                revoke_access_context: HashMap::new(),
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);

        let status = service
            .driver_delete_bucket(Request::new(DriverDeleteBucketRequest::default()))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
    }
}
