//! Generated COSI v1alpha1 types and service stubs

#![allow(clippy::all)]

tonic::include_proto!("cosi.v1alpha1");

/// Key of the S3 entry in a grant's credentials map
pub const S3_CREDENTIALS_KEY: &str = "s3";

/// Secret names inside the S3 credentials entry
pub mod secrets {
    pub const ACCESS_KEY_ID: &str = "accessKeyID";
    pub const ACCESS_SECRET_KEY: &str = "accessSecretKey";
    pub const ENDPOINT: &str = "endpoint";
    pub const REGION: &str = "region";
}
