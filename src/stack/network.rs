use anyhow::Result;
use serde_json::json;

use super::labels;
use super::resource::{ResourceHandle, ResourceSpec};

pub const POSTGRES_PORT: u16 = 5432;
pub const POSTGRES_PORT_NAME: &str = "pgport";

/// NodePort service in front of the cluster primary.
///
/// Selects the operator-generated primary pod by label, so it has no
/// ordering dependency on the cluster object itself.
pub fn postgres_service(namespace: &ResourceHandle, cluster: &ResourceHandle) -> Result<ResourceSpec> {
    let selector = labels::primary_selector(cluster.name());
    ResourceSpec::from_manifest(
        "service",
        "postgres-service",
        json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": {
                "name": "postgres-service",
                "namespace": namespace.name(),
                "labels": selector,
            },
            "spec": {
                "type": "NodePort",
                "ports": [{
                    "port": POSTGRES_PORT,
                    "name": POSTGRES_PORT_NAME,
                    "targetPort": POSTGRES_PORT_NAME,
                }],
                "selector": selector,
            },
        }),
    )
}
