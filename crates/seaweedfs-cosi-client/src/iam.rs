//! SeaweedFS IAM API (AWS IAM query protocol)

use crate::{
    signing::{self, CanonicalRequest, SigningParams},
    AccessKey, BackendError, Config, DeleteOutcome, IamCredentials, IdentityOutcome,
    PolicyDocument, Result, SecretKey,
};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

const API_VERSION: &str = "2010-05-08";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";

// ==================== Response Shapes ====================

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(rename = "Error")]
    error: ErrorDetail,
    #[serde(rename = "RequestId", default)]
    request_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorDetail {
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct CreateAccessKeyResponse {
    #[serde(rename = "CreateAccessKeyResult")]
    result: CreateAccessKeyResult,
}

#[derive(Debug, Deserialize)]
struct CreateAccessKeyResult {
    #[serde(rename = "AccessKey")]
    access_key: AccessKeyXml,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AccessKeyXml {
    #[serde(default)]
    user_name: Option<String>,
    access_key_id: String,
    secret_access_key: String,
}

#[derive(Debug, Deserialize)]
struct ListAccessKeysResponse {
    #[serde(rename = "ListAccessKeysResult")]
    result: ListAccessKeysResult,
}

#[derive(Debug, Deserialize)]
struct ListAccessKeysResult {
    #[serde(rename = "AccessKeyMetadata", default)]
    metadata: Option<AccessKeyMembers>,
}

#[derive(Debug, Deserialize)]
struct AccessKeyMembers {
    #[serde(rename = "member", default)]
    member: Vec<AccessKeyMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AccessKeyMetadata {
    #[serde(default)]
    user_name: Option<String>,
    access_key_id: String,
}

#[derive(Debug, Deserialize)]
struct GetUserPolicyResponse {
    #[serde(rename = "GetUserPolicyResult")]
    result: GetUserPolicyResult,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetUserPolicyResult {
    policy_document: String,
}

// ==================== Client ====================

/// Client for identity, access key and policy management
#[derive(Clone)]
pub struct IamClient {
    base_url: String,
    region: String,
    credentials: Option<IamCredentials>,
    http: Client,
}

impl IamClient {
    pub(crate) fn new(config: &Config, http: Client) -> Self {
        Self {
            base_url: config.iam_url().to_string(),
            region: config.signing_region.clone(),
            credentials: config.iam_credentials.clone(),
            http,
        }
    }

    /// Check whether a user exists
    #[instrument(skip(self))]
    pub async fn get_user(&self, user: &str) -> Result<bool> {
        match self.call("GetUser", &[("UserName", user)]).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Create a user
    #[instrument(skip(self))]
    pub async fn create_user(&self, user: &str) -> Result<IdentityOutcome> {
        if self.get_user(user).await? {
            return Ok(IdentityOutcome::AlreadyExists);
        }
        match self.call("CreateUser", &[("UserName", user)]).await {
            Ok(_) => Ok(IdentityOutcome::Created),
            Err(e) if e.kind() == crate::ErrorKind::AlreadyExists => {
                Ok(IdentityOutcome::AlreadyExists)
            }
            Err(e) => Err(e),
        }
    }

    /// Delete a user
    #[instrument(skip(self))]
    pub async fn delete_user(&self, user: &str) -> Result<DeleteOutcome> {
        not_found_is_ok(self.call("DeleteUser", &[("UserName", user)]).await)
    }

    /// Issue a new access key for a user
    #[instrument(skip(self))]
    pub async fn create_access_key(&self, user: &str) -> Result<AccessKey> {
        let body = self.call("CreateAccessKey", &[("UserName", user)]).await?;
        let parsed: CreateAccessKeyResponse = quick_xml::de::from_str(&body)
            .map_err(|e| BackendError::InvalidResponse(format!("CreateAccessKey: {}", e)))?;
        let key = parsed.result.access_key;
        Ok(AccessKey {
            identity: key.user_name.unwrap_or_else(|| user.to_string()),
            access_key_id: key.access_key_id,
            secret_access_key: SecretKey::new(key.secret_access_key),
        })
    }

    /// List access key ids of a user
    #[instrument(skip(self))]
    pub async fn list_access_keys(&self, user: &str) -> Result<Vec<String>> {
        let body = match self.call("ListAccessKeys", &[("UserName", user)]).await {
            Ok(body) => body,
            Err(e) if e.is_not_found() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let parsed: ListAccessKeysResponse = quick_xml::de::from_str(&body)
            .map_err(|e| BackendError::InvalidResponse(format!("ListAccessKeys: {}", e)))?;
        Ok(parsed
            .result
            .metadata
            .map(|m| m.member)
            .unwrap_or_default()
            .into_iter()
            .filter(|k| k.user_name.as_deref().map_or(true, |u| u == user))
            .map(|k| k.access_key_id)
            .collect())
    }

    /// Delete one access key
    #[instrument(skip(self))]
    pub async fn delete_access_key(&self, user: &str, access_key_id: &str) -> Result<DeleteOutcome> {
        not_found_is_ok(
            self.call(
                "DeleteAccessKey",
                &[("UserName", user), ("AccessKeyId", access_key_id)],
            )
            .await,
        )
    }

    /// Attach an inline policy to a user
    #[instrument(skip(self, document))]
    pub async fn put_user_policy(
        &self,
        user: &str,
        policy_name: &str,
        document: &PolicyDocument,
    ) -> Result<()> {
        let json = document
            .to_json()
            .map_err(|e| BackendError::InvalidResponse(format!("policy encoding: {}", e)))?;
        self.call(
            "PutUserPolicy",
            &[
                ("UserName", user),
                ("PolicyName", policy_name),
                ("PolicyDocument", &json),
            ],
        )
        .await?;
        Ok(())
    }

    /// Fetch an inline policy, `None` if the user or policy does not exist
    #[instrument(skip(self))]
    pub async fn get_user_policy(
        &self,
        user: &str,
        policy_name: &str,
    ) -> Result<Option<PolicyDocument>> {
        let body = match self
            .call("GetUserPolicy", &[("UserName", user), ("PolicyName", policy_name)])
            .await
        {
            Ok(body) => body,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };
        let parsed: GetUserPolicyResponse = quick_xml::de::from_str(&body)
            .map_err(|e| BackendError::InvalidResponse(format!("GetUserPolicy: {}", e)))?;
        parse_policy_document(&parsed.result.policy_document).map(Some)
    }

    /// Remove an inline policy
    #[instrument(skip(self))]
    pub async fn delete_user_policy(&self, user: &str, policy_name: &str) -> Result<DeleteOutcome> {
        not_found_is_ok(
            self.call(
                "DeleteUserPolicy",
                &[("UserName", user), ("PolicyName", policy_name)],
            )
            .await,
        )
    }

    // ==================== Helper Methods ====================

    async fn call(&self, action: &str, params: &[(&str, &str)]) -> Result<String> {
        let body = encode_form(action, params);
        let url = format!("{}/", self.base_url);

        let mut req = self
            .http
            .post(&url)
            .header("Content-Type", FORM_CONTENT_TYPE)
            .body(body.clone());

        if let Some(credentials) = &self.credentials {
            let time = chrono::Utc::now();
            let amz_date = signing::amz_date(time);
            let host = host_header(&url)?;
            let headers = [
                ("content-type", FORM_CONTENT_TYPE),
                ("host", host.as_str()),
                ("x-amz-date", amz_date.as_str()),
            ];
            let authorization = signing::authorization(
                &SigningParams {
                    access_key_id: &credentials.access_key_id,
                    secret_access_key: credentials.secret_access_key.expose(),
                    region: &self.region,
                    service: "iam",
                    time,
                },
                &CanonicalRequest {
                    method: "POST",
                    path: "/",
                    query: "",
                    headers: &headers,
                    payload: body.as_bytes(),
                },
            );
            req = req
                .header("X-Amz-Date", amz_date)
                .header("Authorization", authorization);
        }

        debug!("Sending IAM {} to {}", action, url);
        let response = req.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(parse_error(action, &text, status.as_u16()));
        }
        Ok(text)
    }
}

fn not_found_is_ok(result: Result<String>) -> Result<DeleteOutcome> {
    match result {
        Ok(_) => Ok(DeleteOutcome::Deleted),
        Err(e) if e.is_not_found() => Ok(DeleteOutcome::NotFound),
        Err(e) => Err(e),
    }
}

/// Form-encode an IAM action and its parameters
fn encode_form(action: &str, params: &[(&str, &str)]) -> String {
    let mut pairs = vec![
        format!("Action={}", urlencoding::encode(action)),
        format!("Version={}", API_VERSION),
    ];
    for (name, value) in params {
        pairs.push(format!("{}={}", name, urlencoding::encode(value)));
    }
    pairs.join("&")
}

/// Host header value the HTTP client will send for `url`
fn host_header(url: &str) -> Result<String> {
    let parsed = url::Url::parse(url)
        .map_err(|e| BackendError::Config(format!("invalid IAM endpoint {}: {}", url, e)))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| BackendError::Config(format!("IAM endpoint {} has no host", url)))?;
    Ok(match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// Parse an IAM error body, falling back to the HTTP status
fn parse_error(action: &str, body: &str, status: u16) -> BackendError {
    match quick_xml::de::from_str::<ErrorResponse>(body) {
        Ok(parsed) => BackendError::Iam {
            action: action.to_string(),
            code: parsed.error.code,
            message: parsed.error.message,
            request_id: parsed.request_id,
        },
        Err(_) => {
            let code = match status {
                404 => "NoSuchEntity".to_string(),
                409 => "EntityAlreadyExists".to_string(),
                429 => "Throttling".to_string(),
                502..=504 => "ServiceUnavailable".to_string(),
                400 => "InvalidInput".to_string(),
                _ => format!("HTTP{}", status),
            };
            BackendError::Iam {
                action: action.to_string(),
                code,
                message: body.to_string(),
                request_id: None,
            }
        }
    }
}

/// Policy documents come back either as raw or URL-encoded JSON
fn parse_policy_document(raw: &str) -> Result<PolicyDocument> {
    if let Ok(doc) = serde_json::from_str(raw) {
        return Ok(doc);
    }
    let decoded = urlencoding::decode(raw)
        .map_err(|e| BackendError::InvalidResponse(format!("policy document: {}", e)))?;
    serde_json::from_str(&decoded)
        .map_err(|e| BackendError::InvalidResponse(format!("policy document: {}", e)))
}
