//! End-to-end tests of the COSI gRPC surface
//!
//! A real tonic server is started on an ephemeral port (or a unix socket) over
//! the in-memory backend and driven through the generated clients.

use hyper_util::rt::TokioIo;
use seaweedfs_cosi_client::MemoryBackend;
use seaweedfs_cosi_core::ProvisionerConfig;
use seaweedfs_cosi_driver::proto::{
    identity_client::IdentityClient, provisioner_client::ProvisionerClient, secrets,
    AuthenticationType, DriverCreateBucketRequest, DriverDeleteBucketRequest,
    DriverGetInfoRequest, DriverGrantBucketAccessRequest, DriverRevokeBucketAccessRequest,
    S3_CREDENTIALS_KEY,
};
use seaweedfs_cosi_driver::{
    serve, IdentityService, ListenEndpoint, Listener, ProvisionerService, S3Settings,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::UnixStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tonic::transport::{Channel, Endpoint, Uri};
use tonic::Code;
use tower::service_fn;

const DRIVER_NAME: &str = "seaweedfs.objectstorage.k8s.io";

struct Harness {
    backend: Arc<MemoryBackend>,
    channel: Channel,
    shutdown: oneshot::Sender<()>,
    server: JoinHandle<anyhow::Result<()>>,
}

impl Harness {
    fn provisioner(&self) -> ProvisionerClient<Channel> {
        ProvisionerClient::new(self.channel.clone())
    }

    async fn stop(self) {
        let Harness {
            channel,
            shutdown,
            server,
            ..
        } = self;
        drop(channel);
        shutdown.send(()).unwrap();
        server.await.unwrap().unwrap();
    }
}

fn services(backend: Arc<MemoryBackend>) -> (IdentityService, ProvisionerService) {
    let provisioner = ProvisionerService::new(
        backend,
        ProvisionerConfig::new(DRIVER_NAME).with_bucket_prefix("b-"),
        S3Settings {
            endpoint: "http://seaweedfs-s3:8333".to_string(),
            region: "us-east-1".to_string(),
        },
    );
    (IdentityService::new(DRIVER_NAME), provisioner)
}

fn spawn_server(
    listener: Listener,
    backend: Arc<MemoryBackend>,
) -> (oneshot::Sender<()>, JoinHandle<anyhow::Result<()>>) {
    let (identity, provisioner) = services(backend);
    let (tx, rx) = oneshot::channel::<()>();
    let server = tokio::spawn(serve(listener, identity, provisioner, async {
        rx.await.ok();
    }));
    (tx, server)
}

async fn start_tcp() -> Harness {
    let backend = Arc::new(MemoryBackend::new());
    let listener = Listener::bind(&ListenEndpoint::Tcp("127.0.0.1:0".parse().unwrap()))
        .await
        .unwrap();
    let ListenEndpoint::Tcp(addr) = listener.local_endpoint().unwrap() else {
        panic!("expected a tcp endpoint");
    };
    let (shutdown, server) = spawn_server(listener, backend.clone());

    let channel = Endpoint::from_shared(format!("http://{}", addr))
        .unwrap()
        .connect()
        .await
        .unwrap();

    Harness {
        backend,
        channel,
        shutdown,
        server,
    }
}

fn create(name: &str) -> DriverCreateBucketRequest {
    DriverCreateBucketRequest {
        name: name.to_string(),
        parameters: HashMap::new(),
    }
}

fn grant(bucket_id: &str, name: &str) -> DriverGrantBucketAccessRequest {
    DriverGrantBucketAccessRequest {
        bucket_id: bucket_id.to_string(),
        name: name.to_string(),
        authentication_type: AuthenticationType::Key as i32,
        parameters: HashMap::new(),
    }
}

fn revoke(bucket_id: &str, account_id: &str) -> DriverRevokeBucketAccessRequest {
    DriverRevokeBucketAccessRequest {
        bucket_id: bucket_id.to_string(),
        account_id: account_id.to_string(),
        revoke_access_context: HashMap::new(),
    }
}

fn delete(bucket_id: &str) -> DriverDeleteBucketRequest {
    DriverDeleteBucketRequest {
        bucket_id: bucket_id.to_string(),
        delete_context: HashMap::new(),
    }
}

#[tokio::test]
async fn test_driver_get_info() {
    let harness = start_tcp().await;
    let mut identity = IdentityClient::new(harness.channel.clone());

    let info = identity
        .driver_get_info(DriverGetInfoRequest {})
        .await
        .unwrap()
        .into_inner();
    assert_eq!(info.name, DRIVER_NAME);

    harness.stop().await;
}

#[test_log::test(tokio::test)]
async fn test_bucket_and_access_lifecycle() {
    let harness = start_tcp().await;
    let mut client = harness.provisioner();

    // Create, then replay the create
    let created = client.driver_create_bucket(create("logs-2024")).await.unwrap().into_inner();
    assert_eq!(created.bucket_id, "b-logs-2024");
    let replay = client.driver_create_bucket(create("logs-2024")).await.unwrap().into_inner();
    assert_eq!(replay.bucket_id, created.bucket_id);
    assert_eq!(harness.backend.directory_count(), 1);

    // Grant, then replay the grant
    let granted = client
        .driver_grant_bucket_access(grant("b-logs-2024", "svc-writer"))
        .await
        .unwrap()
        .into_inner();
    let s3 = &granted.credentials[S3_CREDENTIALS_KEY].secrets;
    let akid = s3[secrets::ACCESS_KEY_ID].clone();
    let secret = s3[secrets::ACCESS_SECRET_KEY].clone();
    assert_eq!(s3[secrets::ENDPOINT], "http://seaweedfs-s3:8333");
    assert!(harness
        .backend
        .authorize(&akid, &secret, "s3:PutObject", "b-logs-2024", Some("a.txt")));

    let regrant = client
        .driver_grant_bucket_access(grant("b-logs-2024", "svc-writer"))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(regrant.account_id, granted.account_id);
    assert!(regrant.credentials.is_empty());

    // Delete the bucket twice
    client.driver_delete_bucket(delete("b-logs-2024")).await.unwrap();
    client.driver_delete_bucket(delete("b-logs-2024")).await.unwrap();
    assert_eq!(harness.backend.directory_count(), 0);

    // Revoke after the bucket is gone, twice
    client
        .driver_revoke_bucket_access(revoke("b-logs-2024", &granted.account_id))
        .await
        .unwrap();
    client
        .driver_revoke_bucket_access(revoke("b-logs-2024", &granted.account_id))
        .await
        .unwrap();
    assert!(!harness
        .backend
        .authorize(&akid, &secret, "s3:GetObject", "b-logs-2024", Some("a.txt")));

    harness.stop().await;
}

#[tokio::test]
async fn test_credentials_do_not_cross_buckets() {
    let harness = start_tcp().await;
    let mut client = harness.provisioner();

    client.driver_create_bucket(create("alpha")).await.unwrap();
    client.driver_create_bucket(create("beta")).await.unwrap();

    let granted = client
        .driver_grant_bucket_access(grant("b-alpha", "svc"))
        .await
        .unwrap()
        .into_inner();
    let s3 = &granted.credentials[S3_CREDENTIALS_KEY].secrets;
    let (akid, secret) = (&s3[secrets::ACCESS_KEY_ID], &s3[secrets::ACCESS_SECRET_KEY]);

    assert!(harness.backend.authorize(akid, secret, "s3:GetObject", "b-alpha", Some("k")));
    assert!(!harness.backend.authorize(akid, secret, "s3:GetObject", "b-beta", Some("k")));

    harness.stop().await;
}

#[tokio::test]
async fn test_error_codes_over_the_wire() {
    let harness = start_tcp().await;
    let mut client = harness.provisioner();

    let status = client.driver_create_bucket(create("")).await.unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);

    let status = client
        .driver_grant_bucket_access(grant("b-missing", "svc"))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::NotFound);

    harness.backend.insert_directory("/buckets/b-taken", Some("another-driver"));
    let status = client.driver_create_bucket(create("taken")).await.unwrap_err();
    assert_eq!(status.code(), Code::AlreadyExists);

    harness.stop().await;
}

#[tokio::test]
async fn test_concurrent_creates_over_the_wire() {
    let harness = start_tcp().await;
    let mut a = harness.provisioner();
    let mut b = harness.provisioner();

    let (first, second) = tokio::join!(
        a.driver_create_bucket(create("race")),
        b.driver_create_bucket(create("race"))
    );
    assert_eq!(
        first.unwrap().into_inner().bucket_id,
        second.unwrap().into_inner().bucket_id
    );
    assert_eq!(harness.backend.directory_count(), 1);

    harness.stop().await;
}

async fn connect_unix(path: PathBuf) -> Channel {
    Endpoint::try_from("http://[::]:50051")
        .unwrap()
        .connect_with_connector(service_fn(move |_: Uri| {
            let path = path.clone();
            async move { Ok::<_, std::io::Error>(TokioIo::new(UnixStream::connect(path).await?)) }
        }))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_unix_socket_serves_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cosi.sock");
    let backend = Arc::new(MemoryBackend::new());

    let listener = Listener::bind(&ListenEndpoint::Unix(path.clone())).await.unwrap();
    let (shutdown, server) = spawn_server(listener, backend);

    let channel = connect_unix(path.clone()).await;
    let info = IdentityClient::new(channel.clone())
        .driver_get_info(DriverGetInfoRequest {})
        .await
        .unwrap()
        .into_inner();
    assert_eq!(info.name, DRIVER_NAME);

    let created = ProvisionerClient::new(channel)
        .driver_create_bucket(create("over-uds"))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(created.bucket_id, "b-over-uds");

    shutdown.send(()).unwrap();
    server.await.unwrap().unwrap();
    assert!(!path.exists());
}
