use serde::{Deserialize, Serialize};

use crate::stack::ObjectIdentity;

// ─── Resource-Level State ───────────────────────────────────────────────────

/// A resource's state as stored in the database.
///
/// `manifest_json` is always the redacted manifest. Secrets only ever
/// contribute to `manifest_hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceState {
    pub id: String,
    pub stack_id: String,
    pub address: String,
    pub kind_token: String,
    pub api_version: String,
    pub kind: String,
    pub object_name: String,
    pub namespace: Option<String>,
    pub status: String,
    pub manifest_json: String,
    pub manifest_hash: String,
    pub sensitive_paths: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ResourceState {
    /// Create a new resource state with default values.
    pub fn new(stack_id: &str, address: &str, identity: &ObjectIdentity) -> Self {
        let kind_token = address
            .split_once('.')
            .map(|(token, _)| token)
            .unwrap_or(address);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            stack_id: stack_id.to_string(),
            address: address.to_string(),
            kind_token: kind_token.to_string(),
            api_version: identity.api_version.clone(),
            kind: identity.kind.clone(),
            object_name: identity.name.clone(),
            namespace: identity.namespace.clone(),
            status: status::PLANNED.to_string(),
            manifest_json: "{}".to_string(),
            manifest_hash: String::new(),
            sensitive_paths: vec![],
            created_at: chrono::Utc::now().to_rfc3339(),
            updated_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn identity(&self) -> ObjectIdentity {
        ObjectIdentity {
            api_version: self.api_version.clone(),
            kind: self.kind.clone(),
            name: self.object_name.clone(),
            namespace: self.namespace.clone(),
        }
    }
}

/// Resource status values.
pub mod status {
    pub const PLANNED: &str = "planned";
    pub const CREATING: &str = "creating";
    pub const CREATED: &str = "created";
    pub const UPDATING: &str = "updating";
    pub const DELETING: &str = "deleting";
    pub const FAILED: &str = "failed";
}

// ─── Stack ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stack {
    pub id: String,
    pub name: String,
    /// Random per-stack salt mixed into manifest hashes.
    pub hash_salt: String,
    pub created_at: String,
    pub updated_at: String,
}

// ─── Runs ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: String,
    pub stack_id: String,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub status: String,
    pub operation: String,
    pub resources_planned: i32,
    pub resources_succeeded: i32,
    pub resources_failed: i32,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceResult {
    pub address: String,
    pub action: String,
    pub status: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub error_message: Option<String>,
}

pub mod action {
    pub const CREATE: &str = "create";
    pub const UPDATE: &str = "update";
    pub const DELETE: &str = "delete";
    pub const NOOP: &str = "no-op";
}

pub mod run_status {
    pub const RUNNING: &str = "running";
    pub const SUCCEEDED: &str = "succeeded";
    pub const FAILED: &str = "failed";
}

// ─── Query Filters ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct ResourceFilter {
    pub kind_token: Option<String>,
    pub status: Option<String>,
}
