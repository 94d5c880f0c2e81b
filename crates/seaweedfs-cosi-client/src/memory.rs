//! In-memory backend for testing and development

use crate::{
    AccessKey, BackendError, CreateDirectoryOutcome, DeleteOutcome, DirectoryEntry, ErrorKind,
    IdentityOutcome, PolicyDocument, Result, SecretKey, StorageBackend,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::{distributions::Alphanumeric, Rng};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

/// Backend operations, used to count calls and inject failures
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    StatDirectory,
    CreateDirectory,
    DeleteDirectory,
    CreateIdentity,
    DeleteIdentity,
    CreateAccessKey,
    ListAccessKeys,
    DeleteAccessKey,
    PutIdentityPolicy,
    GetIdentityPolicy,
    DeleteIdentityPolicy,
}

#[derive(Debug, Default)]
struct DirectoryRecord {
    owner: Option<String>,
    protected: bool,
}

#[derive(Debug, Default)]
struct IdentityRecord {
    keys: BTreeMap<String, SecretKey>,
    policies: BTreeMap<String, PolicyDocument>,
}

#[derive(Debug, Default)]
struct State {
    directories: BTreeMap<String, DirectoryRecord>,
    identities: BTreeMap<String, IdentityRecord>,
    failures: HashMap<Operation, VecDeque<ErrorKind>>,
    calls: HashMap<Operation, usize>,
}

impl State {
    /// Record a call and pop a pending injected failure, if any
    fn enter(&mut self, op: Operation) -> Result<()> {
        *self.calls.entry(op).or_default() += 1;
        match self.failures.get_mut(&op).and_then(|q| q.pop_front()) {
            Some(kind) => Err(BackendError::simulated(
                kind,
                format!("injected failure for {:?}", op),
            )),
            None => Ok(()),
        }
    }
}

/// An in-memory backend.
///
/// All operations take a single lock, so each one is atomic.
#[derive(Clone, Debug, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
}

impl MemoryBackend {
    /// Create a new empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call of `op` fail with `kind`
    pub fn fail_next(&self, op: Operation, kind: ErrorKind) {
        self.state
            .lock()
            .failures
            .entry(op)
            .or_default()
            .push_back(kind);
    }

    /// Number of calls made for an operation
    pub fn calls(&self, op: Operation) -> usize {
        self.state.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Number of calls made across all operations
    pub fn total_calls(&self) -> usize {
        self.state.lock().calls.values().sum()
    }

    /// Number of directories
    pub fn directory_count(&self) -> usize {
        self.state.lock().directories.len()
    }

    /// Check if a directory exists
    pub fn has_directory(&self, path: &str) -> bool {
        self.state.lock().directories.contains_key(path)
    }

    /// Place a directory that was not created by a provisioner
    pub fn insert_directory(&self, path: &str, owner: Option<&str>) {
        self.state.lock().directories.insert(
            path.to_string(),
            DirectoryRecord {
                owner: owner.map(str::to_string),
                protected: false,
            },
        );
    }

    /// Refuse removal of a directory
    pub fn protect_directory(&self, path: &str) {
        if let Some(dir) = self.state.lock().directories.get_mut(path) {
            dir.protected = true;
        }
    }

    /// Check if an identity exists
    pub fn has_identity(&self, name: &str) -> bool {
        self.state.lock().identities.contains_key(name)
    }

    /// Number of access keys held by an identity
    pub fn access_key_count(&self, identity: &str) -> usize {
        self.state
            .lock()
            .identities
            .get(identity)
            .map_or(0, |i| i.keys.len())
    }

    /// Number of policies attached to an identity
    pub fn policy_count(&self, identity: &str) -> usize {
        self.state
            .lock()
            .identities
            .get(identity)
            .map_or(0, |i| i.policies.len())
    }

    /// Decide whether a key pair may perform `action` on `bucket` (or an object in it).
    ///
    /// Mirrors the S3 gateway's check: the pair must belong to a live identity and one
    /// of that identity's policies must allow the action on the resource.
    pub fn authorize(
        &self,
        access_key_id: &str,
        secret_access_key: &str,
        action: &str,
        bucket: &str,
        key: Option<&str>,
    ) -> bool {
        let resource = match key {
            Some(key) => format!("arn:aws:s3:::{}/{}", bucket, key),
            None => format!("arn:aws:s3:::{}", bucket),
        };
        let state = self.state.lock();
        state.identities.values().any(|identity| {
            identity
                .keys
                .get(access_key_id)
                .is_some_and(|secret| secret.expose() == secret_access_key)
                && identity
                    .policies
                    .values()
                    .any(|policy| policy.allows(action, &resource))
        })
    }
}

fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn is_within(path: &str, root: &str) -> bool {
    path == root
        || path
            .strip_prefix(root)
            .is_some_and(|rest| rest.starts_with('/'))
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn stat_directory(&self, path: &str) -> Result<Option<DirectoryEntry>> {
        let mut state = self.state.lock();
        state.enter(Operation::StatDirectory)?;
        Ok(state.directories.get(path).map(|dir| DirectoryEntry {
            path: path.to_string(),
            is_directory: true,
            owner: dir.owner.clone(),
        }))
    }

    async fn create_directory(&self, path: &str, owner: &str) -> Result<CreateDirectoryOutcome> {
        let mut state = self.state.lock();
        state.enter(Operation::CreateDirectory)?;
        if let Some(existing) = state.directories.get(path) {
            return Ok(if existing.owner.as_deref() == Some(owner) {
                CreateDirectoryOutcome::AlreadyExistsOwned
            } else {
                CreateDirectoryOutcome::AlreadyExistsForeign
            });
        }
        state.directories.insert(
            path.to_string(),
            DirectoryRecord {
                owner: Some(owner.to_string()),
                protected: false,
            },
        );
        Ok(CreateDirectoryOutcome::Created)
    }

    async fn delete_directory(&self, path: &str) -> Result<DeleteOutcome> {
        let mut state = self.state.lock();
        state.enter(Operation::DeleteDirectory)?;
        if !state.directories.contains_key(path) {
            return Ok(DeleteOutcome::NotFound);
        }
        if state
            .directories
            .iter()
            .any(|(p, dir)| dir.protected && is_within(p, path))
        {
            return Err(BackendError::simulated(
                ErrorKind::Precondition,
                format!("{} is protected", path),
            ));
        }
        state.directories.retain(|p, _| !is_within(p, path));
        Ok(DeleteOutcome::Deleted)
    }

    async fn create_identity(&self, name: &str) -> Result<IdentityOutcome> {
        let mut state = self.state.lock();
        state.enter(Operation::CreateIdentity)?;
        if state.identities.contains_key(name) {
            return Ok(IdentityOutcome::AlreadyExists);
        }
        state
            .identities
            .insert(name.to_string(), IdentityRecord::default());
        Ok(IdentityOutcome::Created)
    }

    async fn delete_identity(&self, name: &str) -> Result<DeleteOutcome> {
        let mut state = self.state.lock();
        state.enter(Operation::DeleteIdentity)?;
        Ok(match state.identities.remove(name) {
            Some(_) => DeleteOutcome::Deleted,
            None => DeleteOutcome::NotFound,
        })
    }

    async fn create_access_key(&self, identity: &str) -> Result<AccessKey> {
        let mut state = self.state.lock();
        state.enter(Operation::CreateAccessKey)?;
        let record = state.identities.get_mut(identity).ok_or_else(|| {
            BackendError::simulated(ErrorKind::NotFound, format!("no identity {}", identity))
        })?;

        let access_key_id = format!("AKID{}", random_string(16).to_uppercase());
        let secret = SecretKey::new(random_string(40));
        record.keys.insert(access_key_id.clone(), secret.clone());

        Ok(AccessKey {
            identity: identity.to_string(),
            access_key_id,
            secret_access_key: secret,
        })
    }

    async fn list_access_keys(&self, identity: &str) -> Result<Vec<String>> {
        let mut state = self.state.lock();
        state.enter(Operation::ListAccessKeys)?;
        Ok(state
            .identities
            .get(identity)
            .map(|i| i.keys.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete_access_key(
        &self,
        identity: &str,
        access_key_id: &str,
    ) -> Result<DeleteOutcome> {
        let mut state = self.state.lock();
        state.enter(Operation::DeleteAccessKey)?;
        Ok(
            match state
                .identities
                .get_mut(identity)
                .and_then(|i| i.keys.remove(access_key_id))
            {
                Some(_) => DeleteOutcome::Deleted,
                None => DeleteOutcome::NotFound,
            },
        )
    }

    async fn put_identity_policy(
        &self,
        identity: &str,
        policy_name: &str,
        policy: &PolicyDocument,
    ) -> Result<()> {
        let mut state = self.state.lock();
        state.enter(Operation::PutIdentityPolicy)?;
        let record = state.identities.get_mut(identity).ok_or_else(|| {
            BackendError::simulated(ErrorKind::NotFound, format!("no identity {}", identity))
        })?;
        record
            .policies
            .insert(policy_name.to_string(), policy.clone());
        Ok(())
    }

    async fn get_identity_policy(
        &self,
        identity: &str,
        policy_name: &str,
    ) -> Result<Option<PolicyDocument>> {
        let mut state = self.state.lock();
        state.enter(Operation::GetIdentityPolicy)?;
        Ok(state
            .identities
            .get(identity)
            .and_then(|i| i.policies.get(policy_name).cloned()))
    }

    async fn delete_identity_policy(
        &self,
        identity: &str,
        policy_name: &str,
    ) -> Result<DeleteOutcome> {
        let mut state = self.state.lock();
        state.enter(Operation::DeleteIdentityPolicy)?;
        Ok(
            match state
                .identities
                .get_mut(identity)
                .and_then(|i| i.policies.remove(policy_name))
            {
                Some(_) => DeleteOutcome::Deleted,
                None => DeleteOutcome::NotFound,
            },
        )
    }
}
