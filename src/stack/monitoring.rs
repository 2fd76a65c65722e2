//! VictoriaMetrics scrape targets and alerting rules for the cluster.

use anyhow::Result;
use serde_json::json;

use super::labels;
use super::resource::{ResourceHandle, ResourceSpec};
use crate::config::OpaqueDocument;

pub const VM_API_VERSION: &str = "operator.victoriametrics.com/v1beta1";

pub const POSTGRES_EXPORTER_PORT: &str = "prometheus-postgres-exporter";
pub const ENVOY_PORT: &str = "envoy";
pub const ENVOY_METRICS_PATH: &str = "/stats/prometheus";

/// One scraped endpoint of the cluster's services.
#[derive(Debug, Clone, Copy)]
pub struct ScrapeEndpoint {
    pub logical_name: &'static str,
    pub port: &'static str,
    pub path: Option<&'static str>,
}

pub const POSTGRES_SCRAPE: ScrapeEndpoint = ScrapeEndpoint {
    logical_name: "postgres-scrape",
    port: POSTGRES_EXPORTER_PORT,
    path: None,
};

pub const ENVOY_SCRAPE: ScrapeEndpoint = ScrapeEndpoint {
    logical_name: "envoy-scrape",
    port: ENVOY_PORT,
    path: Some(ENVOY_METRICS_PATH),
};

pub fn service_scrape(
    endpoint: ScrapeEndpoint,
    namespace: &ResourceHandle,
    cluster: &ResourceHandle,
) -> Result<ResourceSpec> {
    let mut target = json!({ "port": endpoint.port });
    if let Some(path) = endpoint.path {
        target["path"] = json!(path);
    }

    ResourceSpec::from_manifest(
        "vm_service_scrape",
        endpoint.logical_name,
        json!({
            "apiVersion": VM_API_VERSION,
            "kind": "VMServiceScrape",
            "metadata": { "name": endpoint.logical_name, "namespace": namespace.name() },
            "spec": {
                "endpoints": [target],
                "namespaceSelector": { "matchNames": [namespace.name()] },
                "selector": {
                    "matchLabels": labels::exporter_selector(cluster.name(), namespace.name()),
                },
            },
        }),
    )
}

/// Alerting rules whose `spec` is the external alerts document, verbatim.
pub fn alert_rule(
    alerts: OpaqueDocument,
    namespace: &ResourceHandle,
    release: &ResourceHandle,
) -> Result<ResourceSpec> {
    let spec = ResourceSpec::from_manifest(
        "vm_rule",
        "postgres-alerts",
        json!({
            "apiVersion": VM_API_VERSION,
            "kind": "VMRule",
            "metadata": { "name": "postgres-alerts", "namespace": namespace.name() },
            "spec": alerts.into_value(),
        }),
    )?;
    Ok(spec.depends_on(release))
}
