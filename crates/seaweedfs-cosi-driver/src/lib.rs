//! # SeaweedFS COSI Driver
//!
//! Container Object Storage Interface provisioner for SeaweedFS.
//!
//! This crate provides:
//! - **Identity Service**: reports the provisioner name to the sidecar
//! - **Provisioner Service**: bucket creation/deletion and access grant/revoke
//! - **Server**: unix socket or TCP listener with graceful shutdown
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              COSI Provisioner Sidecar               │
//! └─────────────────────────┬───────────────────────────┘
//!                           │ gRPC (unix socket)
//! ┌─────────────────────────▼───────────────────────────┐
//! │                 seaweedfs-cosi-driver                │
//! ├─────────────────────────────────────────────────────┤
//! │     Identity Service     │   Provisioner Service    │
//! ├─────────────────────────────────────────────────────┤
//! │                 seaweedfs-cosi-core                  │
//! │          (BucketManager, AccessManager)              │
//! ├─────────────────────────────────────────────────────┤
//! │                seaweedfs-cosi-client                 │
//! │              (Filer API, IAM API)                    │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod identity;
pub mod proto;
pub mod provisioner;
pub mod server;

pub use config::{ConfigError, DriverConfig, ListenEndpoint};
pub use error::status_for;
pub use identity::IdentityService;
pub use provisioner::{ProvisionerService, S3Settings};
pub use server::{create_backend, run_server, run_server_with_shutdown, serve, shutdown_signal, Listener};
