//! SeaweedFS COSI driver - object storage provisioner for Kubernetes

use clap::Parser;
use seaweedfs_cosi_driver::{run_server, DriverConfig};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "seaweedfs-cosi-driver")]
#[command(about = "COSI provisioner driver for SeaweedFS")]
#[command(version)]
struct Args {
    /// Provisioner name reported to the sidecar
    #[arg(long, default_value = "seaweedfs.objectstorage.k8s.io", env = "DRIVERNAME")]
    driver_name: String,

    /// gRPC endpoint (unix:///path or tcp://host:port)
    #[arg(long, default_value = "unix:///var/lib/cosi/cosi.sock", env = "COSI_ENDPOINT")]
    cosi_endpoint: String,

    /// SeaweedFS filer URL
    #[arg(long, env = "SEAWEEDFS_FILER")]
    filer: Option<String>,

    /// SeaweedFS IAM API URL
    #[arg(long, env = "SEAWEEDFS_IAM")]
    iam: Option<String>,

    /// S3 endpoint handed to workloads
    #[arg(long, default_value = "", env = "ENDPOINT")]
    endpoint: String,

    /// Region handed to workloads
    #[arg(long, default_value = "", env = "REGION")]
    region: String,

    /// Filer directory holding the buckets
    #[arg(long, default_value = "/buckets", env = "BUCKETS_ROOT")]
    buckets_root: String,

    /// Prefix for bucket IDs
    #[arg(long, default_value = "", env = "BUCKET_PREFIX")]
    bucket_prefix: String,

    /// IAM admin access key ID
    #[arg(long, env = "SEAWEEDFS_IAM_ACCESS_KEY_ID")]
    iam_access_key_id: Option<String>,

    /// IAM admin secret access key
    #[arg(long, env = "SEAWEEDFS_IAM_SECRET_ACCESS_KEY", hide_env_values = true)]
    iam_secret_access_key: Option<String>,

    /// CA bundle used to verify SeaweedFS
    #[arg(long, env = "SEAWEEDFS_TLS_CA")]
    tls_ca: Option<PathBuf>,

    /// Client certificate presented to SeaweedFS
    #[arg(long, env = "SEAWEEDFS_TLS_CERT")]
    tls_cert: Option<PathBuf>,

    /// Client key for the certificate
    #[arg(long, env = "SEAWEEDFS_TLS_KEY")]
    tls_key: Option<PathBuf>,

    /// Per-request backend timeout in seconds
    #[arg(long, default_value = "30", env = "REQUEST_TIMEOUT_SECS")]
    request_timeout: u64,

    /// Use in-memory backend (for testing, nothing will persist)
    #[arg(long, env = "COSI_MEMORY_BACKEND")]
    memory_backend: bool,

    /// Enable debug logging
    #[arg(short, long, env = "COSI_DEBUG")]
    debug: bool,

    /// Emit logs as JSON
    #[arg(long, env = "COSI_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Setup logging
    let log_level = if args.debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("seaweedfs_cosi={},h2=warn", log_level).into());
    let registry = tracing_subscriber::registry().with(filter);
    if args.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!(
        driver = %args.driver_name,
        endpoint = %args.cosi_endpoint,
        "Starting SeaweedFS COSI driver"
    );
    if args.endpoint.is_empty() {
        tracing::warn!("ENDPOINT is not set, workloads will receive an empty S3 endpoint");
    }

    let config = DriverConfig {
        driver_name: args.driver_name,
        cosi_endpoint: args.cosi_endpoint,
        filer_endpoint: args.filer,
        iam_endpoint: args.iam,
        s3_endpoint: args.endpoint,
        region: args.region,
        buckets_root: args.buckets_root,
        bucket_prefix: args.bucket_prefix,
        iam_access_key_id: args.iam_access_key_id,
        iam_secret_access_key: args.iam_secret_access_key,
        tls_ca_cert: args.tls_ca,
        tls_client_cert: args.tls_cert,
        tls_client_key: args.tls_key,
        request_timeout_secs: args.request_timeout,
        use_memory_backend: args.memory_backend,
    };

    run_server(config).await
}
