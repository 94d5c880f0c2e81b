//! Common types for the backend client

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroizing;

/// A filer entry as seen by the provisioner
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Full path of the entry
    pub path: String,
    /// Whether the entry is a directory
    pub is_directory: bool,
    /// Value of the ownership tag, if the entry carries one
    pub owner: Option<String>,
}

impl DirectoryEntry {
    /// Whether this entry is a directory tagged with `owner`
    pub fn is_owned_by(&self, owner: &str) -> bool {
        self.is_directory && self.owner.as_deref() == Some(owner)
    }
}

/// Result of a directory creation request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreateDirectoryOutcome {
    /// The directory was created by this request
    Created,
    /// The directory already existed and carries our ownership tag
    AlreadyExistsOwned,
    /// Something else already lives at that path
    AlreadyExistsForeign,
}

/// Result of a removal request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// Result of an identity creation request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdentityOutcome {
    Created,
    AlreadyExists,
}

/// Secret material. Never printed, wiped on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(Zeroizing<String>);

impl SecretKey {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(Zeroizing::new(secret.into()))
    }

    /// Access the secret value
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

/// An access key pair issued by the backend
#[derive(Clone, Debug)]
pub struct AccessKey {
    /// Identity the key belongs to
    pub identity: String,
    /// Public key identifier
    pub access_key_id: String,
    /// Secret half of the pair
    pub secret_access_key: SecretKey,
}

/// IAM policy document
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    pub statement: Vec<PolicyStatement>,
}

/// A single policy statement
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    pub effect: Effect,
    pub action: Vec<String>,
    pub resource: Vec<String>,
}

/// Statement effect
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

impl PolicyDocument {
    pub const VERSION: &'static str = "2012-10-17";

    /// Create a policy from statements
    pub fn new(statement: Vec<PolicyStatement>) -> Self {
        Self {
            version: Self::VERSION.to_string(),
            statement,
        }
    }

    /// Evaluate the policy for an action on a resource ARN.
    ///
    /// An explicit deny wins; otherwise at least one allow must match.
    pub fn allows(&self, action: &str, resource: &str) -> bool {
        let matching = |s: &&PolicyStatement| {
            s.action.iter().any(|a| pattern_matches(a, action))
                && s.resource.iter().any(|r| pattern_matches(r, resource))
        };
        if self
            .statement
            .iter()
            .filter(|s| s.effect == Effect::Deny)
            .any(|s| matching(&s))
        {
            return false;
        }
        self.statement
            .iter()
            .filter(|s| s.effect == Effect::Allow)
            .any(|s| matching(&s))
    }

    /// Serialize to the JSON form sent to the backend
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Match a value against a pattern where `*` matches any (possibly empty) run of characters
fn pattern_matches(pattern: &str, value: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == value;
    }

    let mut rest = value;
    for (i, part) in parts.iter().enumerate() {
        if i == 0 {
            match rest.strip_prefix(part) {
                Some(r) => rest = r,
                None => return false,
            }
        } else if i == parts.len() - 1 {
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(pos) => rest = &rest[pos + part.len()..],
                None => return false,
            }
        }
    }
    true
}
