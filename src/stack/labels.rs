//! Label contracts with the StackGres operator.
//!
//! The operator stamps these labels on the pods and services it generates
//! for an `SGCluster`. Selectors declared here must match them byte for
//! byte, so every value the operator owns is a named constant.

use std::collections::BTreeMap;

pub const APP: &str = "app";
pub const CLUSTER: &str = "cluster";
pub const CLUSTER_NAME: &str = "cluster-name";
pub const CLUSTER_NAMESPACE: &str = "cluster-namespace";
pub const CLUSTER_UID: &str = "cluster-uid";
pub const ROLE: &str = "role";

/// Value of `app` on every StackGres cluster pod.
pub const STACKGRES_CLUSTER_APP: &str = "StackGresCluster";

/// Value of `cluster` on pods that belong to the Patroni cluster.
pub const CLUSTER_MEMBER: &str = "true";

/// Value of `role` Patroni sets on the current primary.
pub const PRIMARY_ROLE: &str = "master";

/// UID the operator recorded for the deployed `SGCluster`.
///
/// Copied from a running cluster; it changes whenever the cluster object is
/// recreated and the scrape selectors stop matching until it is updated.
pub const DEPLOYED_CLUSTER_UID: &str = "dc8a0f05-a935-4600-b380-e70a34bcfb04";

/// Labels selecting the primary pod of `cluster_name`.
pub fn primary_selector(cluster_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (APP.to_string(), STACKGRES_CLUSTER_APP.to_string()),
        (CLUSTER.to_string(), CLUSTER_MEMBER.to_string()),
        (CLUSTER_NAME.to_string(), cluster_name.to_string()),
        (ROLE.to_string(), PRIMARY_ROLE.to_string()),
    ])
}

/// Labels selecting the metrics-exporting services of `cluster_name`.
pub fn exporter_selector(cluster_name: &str, cluster_namespace: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (APP.to_string(), STACKGRES_CLUSTER_APP.to_string()),
        (CLUSTER_NAME.to_string(), cluster_name.to_string()),
        (CLUSTER_NAMESPACE.to_string(), cluster_namespace.to_string()),
        (CLUSTER_UID.to_string(), DEPLOYED_CLUSTER_UID.to_string()),
    ])
}
