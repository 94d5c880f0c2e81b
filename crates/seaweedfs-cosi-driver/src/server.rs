//! Server startup and lifecycle

use crate::config::{DriverConfig, ListenEndpoint};
use crate::identity::IdentityService;
use crate::proto::{identity_server::IdentityServer, provisioner_server::ProvisionerServer};
use crate::provisioner::{ProvisionerService, S3Settings};
use anyhow::Context;
use seaweedfs_cosi_client::{MemoryBackend, SeaweedBackend, StorageBackend};
use std::future::Future;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::{TcpListener, UnixListener};
use tokio_stream::wrappers::{TcpListenerStream, UnixListenerStream};
use tonic::transport::Server;
use tracing::{info, warn};

/// A bound listener, ready to accept connections
pub enum Listener {
    Unix { listener: UnixListener, path: PathBuf },
    Tcp(TcpListener),
}

impl Listener {
    /// Bind an endpoint. A stale unix socket left by an earlier run is removed first.
    pub async fn bind(endpoint: &ListenEndpoint) -> anyhow::Result<Self> {
        match endpoint {
            ListenEndpoint::Unix(path) => {
                remove_stale_socket(path)?;
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("creating socket directory {}", parent.display()))?;
                }
                let listener = UnixListener::bind(path)
                    .with_context(|| format!("binding {}", endpoint))?;
                Ok(Self::Unix {
                    listener,
                    path: path.clone(),
                })
            }
            ListenEndpoint::Tcp(addr) => {
                let listener = TcpListener::bind(addr)
                    .await
                    .with_context(|| format!("binding {}", endpoint))?;
                Ok(Self::Tcp(listener))
            }
        }
    }

    /// The endpoint actually bound (resolves port 0)
    pub fn local_endpoint(&self) -> anyhow::Result<ListenEndpoint> {
        Ok(match self {
            Self::Unix { path, .. } => ListenEndpoint::Unix(path.clone()),
            Self::Tcp(listener) => ListenEndpoint::Tcp(listener.local_addr()?),
        })
    }
}

fn remove_stale_socket(path: &Path) -> anyhow::Result<()> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => {
            warn!(path = %path.display(), "Removing stale socket");
            std::fs::remove_file(path)
                .with_context(|| format!("removing stale socket {}", path.display()))
        }
        Ok(_) => anyhow::bail!("{} exists and is not a socket", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("inspecting {}", path.display())),
    }
}

/// Create the storage backend selected by the configuration
pub fn create_backend(config: &DriverConfig) -> anyhow::Result<Arc<dyn StorageBackend>> {
    if config.use_memory_backend {
        warn!("⚠ Using in-memory backend - buckets and credentials will NOT persist!");
        return Ok(Arc::new(MemoryBackend::new()));
    }
    let backend_config = config.backend_config()?;
    info!(
        filer = %backend_config.filer_url(),
        iam = %backend_config.iam_url(),
        signed = backend_config.iam_credentials.is_some(),
        tls = backend_config.tls.is_some(),
        "Using SeaweedFS backend"
    );
    Ok(Arc::new(SeaweedBackend::new(backend_config)?))
}

/// Serve both COSI services on a bound listener until `shutdown` resolves.
/// In-flight calls complete before this returns.
pub async fn serve(
    listener: Listener,
    identity: IdentityService,
    provisioner: ProvisionerService,
    shutdown: impl Future<Output = ()> + Send,
) -> anyhow::Result<()> {
    let router = Server::builder()
        .add_service(IdentityServer::new(identity))
        .add_service(ProvisionerServer::new(provisioner));

    match listener {
        Listener::Unix { listener, path } => {
            info!("COSI driver listening on unix://{}", path.display());
            let result = router
                .serve_with_incoming_shutdown(UnixListenerStream::new(listener), shutdown)
                .await;
            if let Err(e) = std::fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "Failed to remove socket");
            }
            result?;
        }
        Listener::Tcp(listener) => {
            info!("COSI driver listening on tcp://{}", listener.local_addr()?);
            router
                .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
                .await?;
        }
    }

    info!("COSI driver shutdown complete");
    Ok(())
}

/// Run the driver until SIGINT or SIGTERM
pub async fn run_server(config: DriverConfig) -> anyhow::Result<()> {
    run_server_with_shutdown(config, shutdown_signal()).await
}

/// Run the driver with a caller-provided shutdown signal
pub async fn run_server_with_shutdown(
    config: DriverConfig,
    shutdown: impl Future<Output = ()> + Send,
) -> anyhow::Result<()> {
    let endpoint = config.listen_endpoint()?;
    let backend = create_backend(&config)?;

    let identity = IdentityService::new(&config.driver_name);
    let provisioner = ProvisionerService::new(
        backend,
        config.provisioner_config(),
        S3Settings {
            endpoint: config.s3_endpoint.clone(),
            region: config.region.clone(),
        },
    );

    let listener = Listener::bind(&endpoint).await?;
    serve(listener, identity, provisioner, shutdown).await
}

/// Resolves on the first SIGINT or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
