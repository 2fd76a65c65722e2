#![allow(dead_code)]

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;

use pgstack::config::{OpaqueDocument, SecretString, StackConfig};
use pgstack::executor::cluster::ClusterClient;
use pgstack::stack::{self, Declaration, ObjectIdentity, ResourceSpec};
use pgstack::state::{SqliteBackend, StateBackend};

pub const STACKGRES_PASSWORD: &str = "s3cr3t-Admin!";
pub const DATABASE_PASSWORD: &str = "db-Pa55'word";

pub const ALERTS_YAML: &str = r#"
groups:
  - name: postgres
    rules:
      - alert: PostgresDown
        expr: pg_up == 0
        for: 1m
        labels:
          severity: critical
"#;

pub fn test_config() -> StackConfig {
    StackConfig {
        project: "stackgres".to_string(),
        stack: "dev".to_string(),
        kubeconfig_context: "kind-dev".to_string(),
        stackgres_password: SecretString::new(STACKGRES_PASSWORD),
        initial_database_user: "app".to_string(),
        initial_database_password: SecretString::new(DATABASE_PASSWORD),
        initial_database_name: "appdb".to_string(),
    }
}

pub fn test_alerts() -> OpaqueDocument {
    OpaqueDocument::parse(Path::new("alerts.yaml"), ALERTS_YAML).unwrap()
}

pub fn test_declaration() -> Declaration {
    stack::declare(&test_config(), test_alerts()).unwrap()
}

pub fn declaration_with(config: &StackConfig) -> Declaration {
    stack::declare(config, test_alerts()).unwrap()
}

/// Write a complete project into `dir`.
pub fn write_project(dir: &Path) {
    std::fs::write(
        dir.join("pgstack.dev.yaml"),
        format!(
            "config:\n  kubeconfig_context: kind-dev\n  stackgres_password: \"{}\"\n  initial_database_user: app\n  initial_database_password: \"{}\"\n  initial_database_name: appdb\n",
            STACKGRES_PASSWORD, DATABASE_PASSWORD
        ),
    )
    .unwrap();
    std::fs::write(dir.join("alerts.yaml"), ALERTS_YAML).unwrap();
}

pub async fn memory_backend() -> (Arc<dyn StateBackend>, String) {
    let backend = SqliteBackend::open_memory().unwrap();
    backend.initialize().await.unwrap();
    let stack_id = backend.ensure_stack("dev").await.unwrap();
    (Arc::new(backend), stack_id)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Ping,
    Exists(String),
    Apply(String),
    Delete(String),
}

/// In-memory cluster recording every call the engine makes.
#[derive(Default)]
pub struct RecordingCluster {
    calls: Mutex<Vec<Call>>,
    objects: Mutex<HashSet<ObjectIdentity>>,
    applied_manifests: Mutex<Vec<serde_json::Value>>,
    fail_apply: Mutex<HashSet<String>>,
    fail_ping: Mutex<bool>,
}

impl RecordingCluster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make `apply` fail for the resource at `address`.
    pub fn fail_apply_of(&self, address: &str) {
        self.fail_apply.lock().unwrap().insert(address.to_string());
    }

    pub fn fail_ping(&self) {
        *self.fail_ping.lock().unwrap() = true;
    }

    /// Let every call succeed again.
    pub fn recover(&self) {
        self.fail_apply.lock().unwrap().clear();
        *self.fail_ping.lock().unwrap() = false;
    }

    /// Drop an object behind the engine's back.
    pub fn forget(&self, name: &str) {
        self.objects.lock().unwrap().retain(|o| o.name != name);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn applied(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Apply(address) => Some(address),
                _ => None,
            })
            .collect()
    }

    /// Kinds of deleted objects, in deletion order.
    pub fn deleted_kinds(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Delete(kind) => Some(kind),
                _ => None,
            })
            .collect()
    }

    pub fn applied_manifests(&self) -> Vec<serde_json::Value> {
        self.applied_manifests.lock().unwrap().clone()
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl ClusterClient for RecordingCluster {
    async fn ping(&self) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Ping);
        if *self.fail_ping.lock().unwrap() {
            bail!("connection refused");
        }
        Ok(())
    }

    async fn exists(&self, spec: &ResourceSpec) -> Result<bool> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Exists(spec.address.clone()));
        Ok(self.objects.lock().unwrap().contains(&spec.identity))
    }

    async fn apply(&self, spec: &ResourceSpec) -> Result<serde_json::Value> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Apply(spec.address.clone()));
        if self.fail_apply.lock().unwrap().contains(&spec.address) {
            bail!("admission webhook denied the request");
        }
        self.objects.lock().unwrap().insert(spec.identity.clone());
        self.applied_manifests
            .lock()
            .unwrap()
            .push(spec.manifest.clone());
        Ok(serde_json::json!({ "name": spec.identity.name }))
    }

    async fn delete(&self, identity: &ObjectIdentity) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Delete(identity.kind.clone()));
        self.objects.lock().unwrap().remove(identity);
        Ok(())
    }
}
