//! Identity service

use crate::proto::{identity_server::Identity, DriverGetInfoRequest, DriverGetInfoResponse};
use tonic::{Request, Response, Status};
use tracing::error;

/// Reports the provisioner name to the sidecar
#[derive(Clone, Debug)]
pub struct IdentityService {
    provisioner_name: String,
}

impl IdentityService {
    pub fn new(provisioner_name: impl Into<String>) -> Self {
        Self {
            provisioner_name: provisioner_name.into(),
        }
    }
}

#[tonic::async_trait]
impl Identity for IdentityService {
    async fn driver_get_info(
        &self,
        _request: Request<DriverGetInfoRequest>,
    ) -> Result<Response<DriverGetInfoResponse>, Status> {
        if self.provisioner_name.is_empty() {
            error!("Provisioner name is empty");
            return Err(Status::internal("provisioner name is empty"));
        }
        Ok(Response::new(DriverGetInfoResponse {
            name: self.provisioner_name.clone(),
        }))
    }
}
