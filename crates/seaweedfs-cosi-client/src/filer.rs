//! SeaweedFS filer HTTP API

use crate::{
    BackendError, Config, CreateDirectoryOutcome, DeleteOutcome, DirectoryEntry, Result,
};
use base64::Engine as _;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, instrument};

/// Header (and extended attribute key) carrying the ownership tag
pub const OWNER_HEADER: &str = "Seaweed-Cosi-Owner";

/// `os.ModeDir` as reported in the entry's `Mode`
const MODE_DIR: u64 = 1 << 31;

/// Entry metadata as returned by `GET <path>?metadata=true`
#[derive(Debug, Deserialize)]
struct FilerEntry {
    #[serde(rename = "FullPath")]
    full_path: String,
    #[serde(rename = "Mode", default)]
    mode: u64,
    #[serde(rename = "Extended", default)]
    extended: Option<HashMap<String, String>>,
}

impl FilerEntry {
    fn into_directory_entry(self) -> DirectoryEntry {
        let owner = self
            .extended
            .as_ref()
            .and_then(|ext| ext.get(OWNER_HEADER))
            .and_then(|v| base64::engine::general_purpose::STANDARD.decode(v).ok())
            .and_then(|raw| String::from_utf8(raw).ok());

        DirectoryEntry {
            path: self.full_path,
            is_directory: self.mode & MODE_DIR != 0,
            owner,
        }
    }
}

/// Client for the directory operations of the filer
#[derive(Clone)]
pub struct FilerClient {
    base_url: String,
    http: Client,
}

impl FilerClient {
    pub(crate) fn new(config: &Config, http: Client) -> Self {
        Self {
            base_url: config.filer_url().to_string(),
            http,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Look up an entry; `None` when nothing lives at `path`
    #[instrument(skip(self))]
    pub async fn stat(&self, path: &str) -> Result<Option<DirectoryEntry>> {
        let response = self
            .http
            .get(self.url(path))
            .query(&[("metadata", "true")])
            .header("Accept", "application/json")
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check(response, path).await?;
        let entry: FilerEntry = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(format!("filer entry {}: {}", path, e)))?;
        Ok(Some(entry.into_directory_entry()))
    }

    /// Create a directory tagged with `owner`.
    ///
    /// The filer creates directories idempotently, so the outcome is decided by
    /// looking at the entry before and after the request.
    #[instrument(skip(self))]
    pub async fn mkdir(&self, path: &str, owner: &str) -> Result<CreateDirectoryOutcome> {
        if let Some(existing) = self.stat(path).await? {
            return Ok(if existing.is_owned_by(owner) {
                CreateDirectoryOutcome::AlreadyExistsOwned
            } else {
                CreateDirectoryOutcome::AlreadyExistsForeign
            });
        }

        let dir_url = format!("{}/", self.url(path.trim_end_matches('/')));
        debug!("Creating directory {}", dir_url);
        let response = self
            .http
            .post(&dir_url)
            .header(OWNER_HEADER, owner)
            .send()
            .await?;
        check(response, path).await?;

        match self.stat(path).await? {
            Some(entry) if entry.is_owned_by(owner) => Ok(CreateDirectoryOutcome::Created),
            Some(_) => Ok(CreateDirectoryOutcome::AlreadyExistsForeign),
            None => Err(BackendError::InvalidResponse(format!(
                "directory {} missing right after creation",
                path
            ))),
        }
    }

    /// Recursively remove a directory
    #[instrument(skip(self))]
    pub async fn delete_recursive(&self, path: &str) -> Result<DeleteOutcome> {
        let response = self
            .http
            .delete(self.url(path))
            .query(&[("recursive", "true"), ("ignoreRecursiveError", "false")])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(DeleteOutcome::NotFound);
        }
        check(response, path).await?;
        Ok(DeleteOutcome::Deleted)
    }
}

/// Turn a non-success response into a typed error
async fn check(response: Response, path: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or(body);
    Err(BackendError::Filer {
        status: status.as_u16(),
        path: path.to_string(),
        message,
    })
}
