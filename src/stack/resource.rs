use std::fmt::Write as _;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::secret::REDACTED;

/// apiVersion used for chart releases, which are installed through helm
/// rather than the Kubernetes API.
pub const HELM_RELEASE_API_VERSION: &str = "helm.sh/v3";
pub const HELM_RELEASE_KIND: &str = "Release";

/// Coordinates of one cluster object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectIdentity {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    /// `None` for cluster-scoped objects.
    pub namespace: Option<String>,
}

impl ObjectIdentity {
    pub fn is_helm_release(&self) -> bool {
        self.api_version == HELM_RELEASE_API_VERSION && self.kind == HELM_RELEASE_KIND
    }

    /// Split `apiVersion` into (group, version). The core group is empty.
    pub fn group_version(&self) -> (&str, &str) {
        match self.api_version.split_once('/') {
            Some((group, version)) => (group, version),
            None => ("", self.api_version.as_str()),
        }
    }
}

impl std::fmt::Display for ObjectIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{} {}/{}", self.api_version, self.kind, ns, self.name),
            None => write!(f, "{}/{} {}", self.api_version, self.kind, self.name),
        }
    }
}

/// Typed reference to a declared resource.
///
/// Dependents read object names through the handle instead of repeating
/// string literals, and `ResourceSpec::depends_on` records an explicit
/// ordering edge from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHandle {
    address: String,
    name: String,
    namespace: Option<String>,
}

impl ResourceHandle {
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }
}

/// Desired state of one object, plus its explicit dependencies.
#[derive(Debug, Clone)]
pub struct ResourceSpec {
    /// `<kind_token>.<logical_name>`, stable across runs.
    pub address: String,
    pub identity: ObjectIdentity,
    /// Full object body, secrets included.
    pub manifest: serde_json::Value,
    /// JSON pointers (RFC 6901) into `manifest` that hold secret values.
    pub sensitive_paths: Vec<String>,
    /// Addresses this resource must be created after.
    pub depends_on: Vec<String>,
}

impl ResourceSpec {
    /// Build a spec from a manifest, reading identity from its
    /// `apiVersion`, `kind` and `metadata`.
    pub fn from_manifest(
        kind_token: &str,
        logical_name: &str,
        manifest: serde_json::Value,
    ) -> Result<Self> {
        let address = format!("{}.{}", kind_token, logical_name);
        let field = |pointer: &str| {
            manifest
                .pointer(pointer)
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };
        let identity = ObjectIdentity {
            api_version: field("/apiVersion")
                .with_context(|| format!("{}: manifest has no apiVersion", address))?,
            kind: field("/kind").with_context(|| format!("{}: manifest has no kind", address))?,
            name: field("/metadata/name")
                .with_context(|| format!("{}: manifest has no metadata.name", address))?,
            namespace: field("/metadata/namespace"),
        };
        Ok(Self {
            address,
            identity,
            manifest,
            sensitive_paths: Vec::new(),
            depends_on: Vec::new(),
        })
    }

    /// Mark the value at `pointer` as secret.
    pub fn sensitive(mut self, pointer: &str) -> Self {
        self.sensitive_paths.push(pointer.to_string());
        self
    }

    /// Record an explicit dependency on another declared resource.
    pub fn depends_on(mut self, handle: &ResourceHandle) -> Self {
        if !self.depends_on.iter().any(|d| d == handle.address()) {
            self.depends_on.push(handle.address().to_string());
        }
        self
    }

    /// The part of the address before the first dot.
    pub fn kind_token(&self) -> &str {
        self.address
            .split_once('.')
            .map(|(token, _)| token)
            .unwrap_or(&self.address)
    }

    pub fn handle(&self) -> ResourceHandle {
        ResourceHandle {
            address: self.address.clone(),
            name: self.identity.name.clone(),
            namespace: self.identity.namespace.clone(),
        }
    }

    /// Salted SHA-256 of the canonical manifest. Covers secret fields, so a
    /// rotated password shows up as a change without storing it.
    pub fn manifest_hash(&self, salt: &str) -> String {
        manifest_hash(&self.manifest, salt)
    }

    /// The manifest with every sensitive path replaced by the placeholder.
    pub fn redacted_manifest(&self) -> serde_json::Value {
        redact(&self.manifest, &self.sensitive_paths)
    }
}

/// Replace the values at `pointers` with the redaction placeholder.
/// Pointers that do not resolve are ignored.
pub fn redact(value: &serde_json::Value, pointers: &[String]) -> serde_json::Value {
    let mut redacted = value.clone();
    for pointer in pointers {
        if let Some(slot) = redacted.pointer_mut(pointer) {
            *slot = serde_json::Value::String(REDACTED.to_string());
        }
    }
    redacted
}

/// Hex SHA-256 over `salt`, a NUL separator and the key-sorted
/// serialization of `value`.
pub fn manifest_hash(value: &serde_json::Value, salt: &str) -> String {
    let mut canonical = String::new();
    write_canonical(value, &mut canonical);
    let digest = Sha256::new()
        .chain_update(salt.as_bytes())
        .chain_update([0u8])
        .chain_update(canonical.as_bytes())
        .finalize();
    hex::encode(digest)
}

fn write_canonical(value: &serde_json::Value, out: &mut String) {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                let _ = write!(out, "{}:", serde_json::Value::String((*key).clone()));
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        serde_json::Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => {
            let _ = write!(out, "{}", scalar);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identity_comes_from_manifest() {
        let spec = ResourceSpec::from_manifest(
            "secret",
            "creds",
            json!({
                "apiVersion": "v1",
                "kind": "Secret",
                "metadata": {"name": "creds", "namespace": "db"},
            }),
        )
        .unwrap();
        assert_eq!(spec.address, "secret.creds");
        assert_eq!(spec.kind_token(), "secret");
        assert_eq!(spec.identity.group_version(), ("", "v1"));
        assert_eq!(spec.identity.namespace.as_deref(), Some("db"));
    }

    #[test]
    fn manifest_without_name_is_rejected() {
        let err = ResourceSpec::from_manifest("secret", "creds", json!({"apiVersion": "v1", "kind": "Secret"}))
            .unwrap_err();
        assert!(err.to_string().contains("metadata.name"));
    }

    #[test]
    fn hash_ignores_key_order() {
        let a = json!({"b": 1, "a": {"y": [1, 2], "x": "s"}});
        let b = json!({"a": {"x": "s", "y": [1, 2]}, "b": 1});
        assert_eq!(manifest_hash(&a, "salt"), manifest_hash(&b, "salt"));
        assert_ne!(manifest_hash(&a, "salt"), manifest_hash(&json!({"b": 2}), "salt"));
    }

    #[test]
    fn hash_depends_on_salt() {
        let value = json!({"stringData": {"password": "hunter2"}});
        assert_ne!(manifest_hash(&value, "one"), manifest_hash(&value, "two"));
    }

    #[test]
    fn redact_replaces_only_listed_paths() {
        let value = json!({"stringData": {"k": "secret"}, "other": "visible"});
        let out = redact(&value, &["/stringData/k".to_string(), "/missing".to_string()]);
        assert_eq!(out["stringData"]["k"], REDACTED);
        assert_eq!(out["other"], "visible");
    }
}
