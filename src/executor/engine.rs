use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use petgraph::graph::NodeIndex;
use tracing::{debug, info, warn};

use super::cluster::ClusterClient;
use crate::dag::resource_graph::{self, DagNode, DependencyEdge};
use crate::dag::walker::{
    format_duration, DagWalker, NodeExecutor, NodeResult, NodeStatus, Progress, WalkMode,
};
use crate::stack::{Declaration, ObjectIdentity, ResourceSpec};
use crate::state::backend::StateBackend;
use crate::state::models::{self, action, run_status, status, ResourceFilter, ResourceState};

/// The action to take for a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceAction {
    Create,
    Update,
    Delete,
    NoOp,
}

impl ResourceAction {
    fn as_str(&self) -> &'static str {
        match self {
            ResourceAction::Create => action::CREATE,
            ResourceAction::Update => action::UPDATE,
            ResourceAction::Delete => action::DELETE,
            ResourceAction::NoOp => action::NOOP,
        }
    }
}

impl std::fmt::Display for ResourceAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceAction::Create => write!(f, "+"),
            ResourceAction::Update => write!(f, "~"),
            ResourceAction::Delete => write!(f, "-"),
            ResourceAction::NoOp => write!(f, "(no changes)"),
        }
    }
}

/// A planned change for a single resource.
///
/// Both states are redacted manifests and safe to print.
#[derive(Debug)]
pub struct PlannedChange {
    pub address: String,
    pub action: ResourceAction,
    pub kind_token: String,
    pub identity: ObjectIdentity,
    pub planned_state: Option<serde_json::Value>,
    pub prior_state: Option<serde_json::Value>,
    pub sensitive_paths: Vec<String>,
}

/// Summary of a plan operation.
#[derive(Debug)]
pub struct PlanSummary {
    pub changes: Vec<PlannedChange>,
    pub creates: usize,
    pub updates: usize,
    pub deletes: usize,
    pub no_ops: usize,
}

impl PlanSummary {
    fn from_changes(changes: Vec<PlannedChange>) -> Self {
        let count = |a: ResourceAction| changes.iter().filter(|c| c.action == a).count();
        let creates = count(ResourceAction::Create);
        let updates = count(ResourceAction::Update);
        let deletes = count(ResourceAction::Delete);
        let no_ops = count(ResourceAction::NoOp);
        Self {
            changes,
            creates,
            updates,
            deletes,
            no_ops,
        }
    }

    pub fn has_changes(&self) -> bool {
        self.creates + self.updates + self.deletes > 0
    }

    pub fn action_for(&self, address: &str) -> Option<ResourceAction> {
        self.changes
            .iter()
            .find(|c| c.address == address)
            .map(|c| c.action)
    }
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.has_changes() {
            return write!(f, "No changes.");
        }
        write!(
            f,
            "Plan: {} to add, {} to change, {} to destroy.",
            self.creates, self.updates, self.deletes
        )
    }
}

/// Summary of an apply operation.
#[derive(Debug)]
pub struct ApplySummary {
    pub run_id: String,
    pub results: Vec<NodeResult>,
    pub added: usize,
    pub changed: usize,
    pub destroyed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub elapsed_secs: u64,
    pub is_destroy: bool,
}

impl ApplySummary {
    pub fn succeeded(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }

    /// First failure message, if any node failed.
    pub fn first_error(&self) -> Option<(&str, &str)> {
        self.results.iter().find_map(|r| match &r.status {
            NodeStatus::Failed(msg) => Some((r.address.as_str(), msg.as_str())),
            _ => None,
        })
    }
}

impl std::fmt::Display for ApplySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let action = if self.is_destroy { "Destroy" } else { "Apply" };
        let time = format_duration(self.elapsed_secs);
        if self.is_destroy {
            write!(
                f,
                "{} complete! Resources: {} destroyed",
                action, self.destroyed,
            )?;
        } else {
            write!(
                f,
                "{} complete! Resources: {} added, {} changed, {} destroyed",
                action, self.added, self.changed, self.destroyed,
            )?;
        }
        if self.failed > 0 {
            write!(f, ", {} failed", self.failed)?;
        }
        if self.skipped > 0 {
            write!(f, ", {} skipped", self.skipped)?;
        }
        write!(f, ". Total time: {}.", time)
    }
}

/// A stored resource with the addresses it depended on when applied.
type StoredNode = (String, ObjectIdentity, Vec<String>);

/// Drives plan, apply and destroy of a declaration against a cluster.
///
/// Change detection compares manifest hashes recorded in state, so the
/// cluster is only consulted when `plan` is asked to refresh.
pub struct ResourceEngine {
    cluster: Arc<dyn ClusterClient>,
    parallelism: usize,
}

impl ResourceEngine {
    pub fn new(cluster: Arc<dyn ClusterClient>, parallelism: usize) -> Self {
        Self {
            cluster,
            parallelism,
        }
    }

    /// Compare the declaration with recorded state.
    ///
    /// With `refresh`, resources recorded as created are checked against
    /// the cluster and planned for creation again when missing.
    pub async fn plan(
        &self,
        declaration: &Declaration,
        backend: &dyn StateBackend,
        stack_id: &str,
        refresh: bool,
    ) -> Result<PlanSummary> {
        let salt = hash_salt(backend, stack_id).await?;
        let mut changes = Vec::new();
        let total = declaration.resources().len();

        for (i, spec) in declaration.resources().iter().enumerate() {
            let prior = backend.get_resource(stack_id, &spec.address).await?;
            let desired_hash = spec.manifest_hash(&salt);

            let mut action = match &prior {
                None => ResourceAction::Create,
                // Never accepted by the cluster
                Some(row) if row.manifest_hash.is_empty() => ResourceAction::Create,
                // Failed or interrupted after an earlier successful apply
                Some(row) if row.status != status::CREATED => ResourceAction::Update,
                Some(row) if row.manifest_hash != desired_hash => ResourceAction::Update,
                Some(_) => ResourceAction::NoOp,
            };

            if refresh && prior.is_some() && action != ResourceAction::Create {
                println!(
                    "{}: {} [{}/{}]",
                    spec.address,
                    "Refreshing state...".dimmed(),
                    i + 1,
                    total,
                );
                if !self.cluster.exists(spec).await? {
                    info!(address = %spec.address, "Recorded object is missing from the cluster");
                    action = ResourceAction::Create;
                }
            }

            let prior_state = prior
                .as_ref()
                .map(|row| serde_json::from_str::<serde_json::Value>(&row.manifest_json))
                .transpose()
                .with_context(|| format!("Corrupt manifest in state for {}", spec.address))?;

            changes.push(PlannedChange {
                address: spec.address.clone(),
                action,
                kind_token: spec.kind_token().to_string(),
                identity: spec.identity.clone(),
                planned_state: Some(spec.redacted_manifest()),
                prior_state,
                sensitive_paths: spec.sensitive_paths.clone(),
            });
        }

        // Recorded resources that are no longer declared
        let declared: HashSet<&str> = declaration
            .resources()
            .iter()
            .map(|r| r.address.as_str())
            .collect();
        for row in backend
            .list_resources(stack_id, &ResourceFilter::default())
            .await?
        {
            if declared.contains(row.address.as_str()) {
                continue;
            }
            let prior_state = serde_json::from_str::<serde_json::Value>(&row.manifest_json)
                .with_context(|| format!("Corrupt manifest in state for {}", row.address))?;
            changes.push(PlannedChange {
                identity: row.identity(),
                address: row.address,
                action: ResourceAction::Delete,
                kind_token: row.kind_token,
                planned_state: None,
                prior_state: Some(prior_state),
                sensitive_paths: row.sensitive_paths,
            });
        }

        let summary = PlanSummary::from_changes(changes);
        debug!(
            creates = summary.creates,
            updates = summary.updates,
            deletes = summary.deletes,
            no_ops = summary.no_ops,
            "Plan computed"
        );
        Ok(summary)
    }

    /// Apply a plan using the event-driven DAG walker.
    ///
    /// A failed resource is marked failed in state and all of its
    /// transitive dependents are skipped. Resources that already converged
    /// are left in place. Orphaned resources are deleted afterwards,
    /// dependents first.
    pub async fn apply(
        &self,
        declaration: &Declaration,
        backend: Arc<dyn StateBackend>,
        stack_id: &str,
        plan: &PlanSummary,
    ) -> Result<ApplySummary> {
        let (graph, node_map) = resource_graph::build_resource_dag(declaration)?;
        let salt = hash_salt(backend.as_ref(), stack_id).await?;
        let start = std::time::Instant::now();
        let started_at = chrono::Utc::now().to_rfc3339();

        let run_id = backend
            .start_run(
                stack_id,
                "apply",
                (plan.creates + plan.updates + plan.deletes) as i32,
            )
            .await?;

        let outcome = async {
            let actions: Arc<HashMap<String, ResourceAction>> = Arc::new(
                declaration
                    .resources()
                    .iter()
                    .map(|r| {
                        let action = plan
                            .action_for(&r.address)
                            .unwrap_or(ResourceAction::Create);
                        (r.address.clone(), action)
                    })
                    .collect(),
            );

            // Edges persisted with each row; the provider is not a resource.
            let dependencies: Arc<HashMap<String, Vec<(String, DependencyEdge)>>> = Arc::new(
                declaration
                    .resources()
                    .iter()
                    .map(|r| {
                        let deps = resource_graph::dependencies_of(&graph, &node_map, &r.address)
                            .into_iter()
                            .filter(|(_, edge)| *edge != DependencyEdge::ProviderDep)
                            .collect();
                        (r.address.clone(), deps)
                    })
                    .collect(),
            );

            let progress: HashMap<NodeIndex, Progress> = graph
                .node_indices()
                .filter_map(|idx| {
                    let address = graph[idx].address();
                    let p = match actions.get(address)? {
                        ResourceAction::NoOp => Progress::Silent,
                        ResourceAction::Update => Progress::Modifying,
                        _ => Progress::Creating,
                    };
                    Some((idx, p))
                })
                .collect();

            let cluster = Arc::clone(&self.cluster);
            let stack = stack_id.to_string();
            let backend_clone = Arc::clone(&backend);
            let exec_actions = Arc::clone(&actions);
            let salt = Arc::new(salt);

            let executor: NodeExecutor = Box::new(move |_idx: NodeIndex, node: DagNode| {
                let cluster = Arc::clone(&cluster);
                let stack_id = stack.clone();
                let backend = Arc::clone(&backend_clone);
                let actions = Arc::clone(&exec_actions);
                let dependencies = Arc::clone(&dependencies);
                let salt = Arc::clone(&salt);

                Box::pin(async move {
                    match node {
                        DagNode::Provider { ref context, .. } => {
                            cluster.ping().await?;
                            debug!(context = %context, "Cluster reachable");
                            Ok(None)
                        }
                        DagNode::Resource {
                            ref address,
                            ref spec,
                        } => {
                            let action = actions
                                .get(address)
                                .copied()
                                .unwrap_or(ResourceAction::Create);
                            if action == ResourceAction::NoOp {
                                return Ok(None);
                            }
                            let deps = dependencies.get(address).cloned().unwrap_or_default();
                            converge(
                                cluster.as_ref(),
                                backend.as_ref(),
                                &stack_id,
                                spec,
                                action,
                                &deps,
                                &salt,
                            )
                            .await
                        }
                        DagNode::Stored { .. } => Ok(None),
                    }
                })
            });

            let walker = DagWalker::new(self.parallelism).with_progress(progress);
            let mut results = walker
                .walk(&graph, Arc::new(executor), WalkMode::Apply)
                .await?;

            // Orphans go after the declared resources
            let orphans: Vec<&PlannedChange> = plan
                .changes
                .iter()
                .filter(|c| c.action == ResourceAction::Delete)
                .collect();
            if !orphans.is_empty() {
                let mut stored = Vec::new();
                for change in &orphans {
                    let Some(row) = backend.get_resource(stack_id, &change.address).await? else {
                        continue;
                    };
                    let deps = backend.get_dependencies(&row.id).await?;
                    stored.push((row.address.clone(), row.identity(), deps));
                }
                let deleted = self
                    .delete_stored(Arc::clone(&backend), stack_id, &stored)
                    .await?;
                results.extend(deleted);
            }

            let mut added = 0;
            let mut changed = 0;
            let mut destroyed = 0;
            let mut failed = 0;
            let mut skipped = 0;
            let completed_at = chrono::Utc::now().to_rfc3339();

            for result in &results {
                let action = match actions.get(&result.address) {
                    Some(action) => *action,
                    None if orphans.iter().any(|o| o.address == result.address) => {
                        ResourceAction::Delete
                    }
                    // Provider node
                    None => {
                        if matches!(result.status, NodeStatus::Failed(_)) {
                            failed += 1;
                        }
                        continue;
                    }
                };
                if action == ResourceAction::NoOp && result.status == NodeStatus::Succeeded {
                    continue;
                }

                let (run_result_status, error_message) = match &result.status {
                    NodeStatus::Succeeded => {
                        match action {
                            ResourceAction::Create => added += 1,
                            ResourceAction::Update => changed += 1,
                            ResourceAction::Delete => destroyed += 1,
                            ResourceAction::NoOp => {}
                        }
                        (run_status::SUCCEEDED, None)
                    }
                    NodeStatus::Failed(msg) => {
                        failed += 1;
                        (run_status::FAILED, Some(msg.clone()))
                    }
                    NodeStatus::Skipped(reason) => {
                        skipped += 1;
                        ("skipped", Some(reason.clone()))
                    }
                    NodeStatus::Pending | NodeStatus::Running => continue,
                };

                backend
                    .record_resource_result(
                        &run_id,
                        &models::ResourceResult {
                            address: result.address.clone(),
                            action: action.as_str().to_string(),
                            status: run_result_status.to_string(),
                            started_at: Some(started_at.clone()),
                            completed_at: Some(completed_at.clone()),
                            error_message,
                        },
                    )
                    .await?;
            }

            let summary = ApplySummary {
                run_id: run_id.clone(),
                results,
                added,
                changed,
                destroyed,
                failed,
                skipped,
                elapsed_secs: start.elapsed().as_secs(),
                is_destroy: false,
            };
            Ok::<_, anyhow::Error>(summary)
        }
        .await;
        let summary = close_run(backend.as_ref(), &run_id, outcome).await?;

        info!(
            run_id = %run_id,
            added = summary.added,
            changed = summary.changed,
            destroyed = summary.destroyed,
            failed = summary.failed,
            "Apply finished"
        );
        Ok(summary)
    }

    /// Delete every recorded resource of the stack, dependents first.
    pub async fn destroy(
        &self,
        backend: Arc<dyn StateBackend>,
        stack_id: &str,
    ) -> Result<ApplySummary> {
        let start = std::time::Instant::now();
        let started_at = chrono::Utc::now().to_rfc3339();

        let rows = backend
            .list_resources(stack_id, &ResourceFilter::default())
            .await?;
        let mut stored = Vec::with_capacity(rows.len());
        for row in &rows {
            let deps = backend.get_dependencies(&row.id).await?;
            stored.push((row.address.clone(), row.identity(), deps));
        }

        let run_id = backend
            .start_run(stack_id, "destroy", rows.len() as i32)
            .await?;

        let outcome = async {
            if !stored.is_empty() {
                self.cluster.ping().await?;
            }
            let results = self
                .delete_stored(Arc::clone(&backend), stack_id, &stored)
                .await?;

            let completed_at = chrono::Utc::now().to_rfc3339();
            let mut destroyed = 0;
            let mut failed = 0;
            let mut skipped = 0;
            for result in &results {
                let (run_result_status, error_message) = match &result.status {
                    NodeStatus::Succeeded => {
                        destroyed += 1;
                        (run_status::SUCCEEDED, None)
                    }
                    NodeStatus::Failed(msg) => {
                        failed += 1;
                        (run_status::FAILED, Some(msg.clone()))
                    }
                    NodeStatus::Skipped(reason) => {
                        skipped += 1;
                        ("skipped", Some(reason.clone()))
                    }
                    NodeStatus::Pending | NodeStatus::Running => continue,
                };
                backend
                    .record_resource_result(
                        &run_id,
                        &models::ResourceResult {
                            address: result.address.clone(),
                            action: action::DELETE.to_string(),
                            status: run_result_status.to_string(),
                            started_at: Some(started_at.clone()),
                            completed_at: Some(completed_at.clone()),
                            error_message,
                        },
                    )
                    .await?;
            }

            let summary = ApplySummary {
                run_id: run_id.clone(),
                results,
                added: 0,
                changed: 0,
                destroyed,
                failed,
                skipped,
                elapsed_secs: start.elapsed().as_secs(),
                is_destroy: true,
            };
            Ok::<_, anyhow::Error>(summary)
        }
        .await;
        close_run(backend.as_ref(), &run_id, outcome).await
    }

    /// Delete stored resources in reverse dependency order, removing each
    /// state row once its object is gone.
    async fn delete_stored(
        &self,
        backend: Arc<dyn StateBackend>,
        stack_id: &str,
        stored: &[StoredNode],
    ) -> Result<Vec<NodeResult>> {
        if stored.is_empty() {
            return Ok(Vec::new());
        }

        let (graph, _node_map) = resource_graph::build_state_dag(stored)?;
        let reverse_graph = resource_graph::reversed(&graph);

        let cluster = Arc::clone(&self.cluster);
        let stack = stack_id.to_string();

        let executor: NodeExecutor = Box::new(move |_idx: NodeIndex, node: DagNode| {
            let cluster = Arc::clone(&cluster);
            let stack_id = stack.clone();
            let backend = Arc::clone(&backend);

            Box::pin(async move {
                let (address, identity) = match node {
                    DagNode::Stored { address, identity } => (address, identity),
                    _ => return Ok(None),
                };

                let Some(mut row) = backend.get_resource(&stack_id, &address).await? else {
                    debug!(address = %address, "Resource not in state, skipping destroy");
                    return Ok(None);
                };

                row.status = status::DELETING.to_string();
                row.updated_at = chrono::Utc::now().to_rfc3339();
                backend.upsert_resource(&row).await?;

                if let Err(e) = cluster.delete(&identity).await {
                    let message = format!("{:#}", e);
                    warn!(address = %address, error = %message, "Delete failed");
                    row.status = status::FAILED.to_string();
                    row.updated_at = chrono::Utc::now().to_rfc3339();
                    backend.upsert_resource(&row).await?;
                    return Err(e);
                }

                backend.delete_resource(&stack_id, &address).await?;
                info!(address = %address, "Resource destroyed");
                Ok(Some(serde_json::json!({ "name": identity.name })))
            })
        });

        let walker = DagWalker::new(self.parallelism);
        walker
            .walk(&reverse_graph, Arc::new(executor), WalkMode::Destroy)
            .await
    }
}

/// Create or update one object and record the outcome.
///
/// The row moves through `creating`/`updating` to `created` or `failed`.
/// The manifest hash is only advanced once the cluster accepted the
/// object, so an interrupted update is planned again on the next run.
async fn converge(
    cluster: &dyn ClusterClient,
    backend: &dyn StateBackend,
    stack_id: &str,
    spec: &ResourceSpec,
    action: ResourceAction,
    dependencies: &[(String, DependencyEdge)],
    salt: &str,
) -> Result<Option<serde_json::Value>> {
    let address = &spec.address;
    let mut row = match backend.get_resource(stack_id, address).await? {
        Some(row) => row,
        None => ResourceState::new(stack_id, address, &spec.identity),
    };

    row.status = match action {
        ResourceAction::Update => status::UPDATING,
        _ => status::CREATING,
    }
    .to_string();
    row.updated_at = chrono::Utc::now().to_rfc3339();
    row.id = backend.upsert_resource(&row).await?;

    let outputs = match cluster.apply(spec).await {
        Ok(outputs) => outputs,
        Err(e) => {
            let message = format!("{:#}", e);
            warn!(address = %address, error = %message, "Apply failed");
            row.status = status::FAILED.to_string();
            row.updated_at = chrono::Utc::now().to_rfc3339();
            backend.upsert_resource(&row).await?;
            return Err(e);
        }
    };

    let identity = &spec.identity;
    row.api_version = identity.api_version.clone();
    row.kind = identity.kind.clone();
    row.object_name = identity.name.clone();
    row.namespace = identity.namespace.clone();
    row.status = status::CREATED.to_string();
    row.manifest_json = serde_json::to_string(&spec.redacted_manifest())?;
    row.manifest_hash = spec.manifest_hash(salt);
    row.sensitive_paths = spec.sensitive_paths.clone();
    row.updated_at = chrono::Utc::now().to_rfc3339();
    row.id = backend.upsert_resource(&row).await?;

    let mut dep_rows = Vec::with_capacity(dependencies.len());
    for (dep_address, edge) in dependencies {
        match backend.get_resource(stack_id, dep_address).await? {
            Some(dep) => dep_rows.push((dep.id, edge.as_str().to_string())),
            None => warn!(
                address = %address,
                dependency = %dep_address,
                "Dependency missing from state, edge not recorded"
            ),
        }
    }
    backend.set_dependencies(&row.id, &dep_rows).await?;

    info!(address = %address, action = action.as_str(), "Resource applied successfully");

    let mut outputs = match outputs {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    outputs
        .entry("name")
        .or_insert_with(|| serde_json::Value::String(identity.name.clone()));
    Ok(Some(serde_json::Value::Object(outputs)))
}

async fn hash_salt(backend: &dyn StateBackend, stack_id: &str) -> Result<String> {
    backend
        .get_stack_by_id(stack_id)
        .await?
        .map(|stack| stack.hash_salt)
        .with_context(|| format!("Stack {} not found in state", stack_id))
}

/// Close a run. An operation that errored out part way is recorded as
/// failed with that error, so no run stays `running`.
async fn close_run(
    backend: &dyn StateBackend,
    run_id: &str,
    outcome: Result<ApplySummary>,
) -> Result<ApplySummary> {
    match outcome {
        Ok(summary) => {
            finish_run(backend, &summary).await?;
            Ok(summary)
        }
        Err(e) => {
            let message = format!("{:#}", e);
            if let Err(record_err) = backend
                .complete_run(run_id, run_status::FAILED, 0, 0, Some(&message))
                .await
            {
                warn!(run_id = %run_id, error = %record_err, "Could not record aborted run");
            }
            Err(e)
        }
    }
}

async fn finish_run(backend: &dyn StateBackend, summary: &ApplySummary) -> Result<()> {
    let (run_result, error) = if summary.failed > 0 {
        let error = summary
            .first_error()
            .map(|(address, msg)| format!("{}: {}", address, msg));
        (run_status::FAILED, error)
    } else {
        (run_status::SUCCEEDED, None)
    };
    let succeeded = summary.added + summary.changed + summary.destroyed;
    backend
        .complete_run(
            &summary.run_id,
            run_result,
            succeeded as i32,
            summary.failed as i32,
            error.as_deref(),
        )
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(address: &str, action: ResourceAction) -> PlannedChange {
        PlannedChange {
            address: address.to_string(),
            action,
            kind_token: "secret".to_string(),
            identity: ObjectIdentity {
                api_version: "v1".to_string(),
                kind: "Secret".to_string(),
                name: address.to_string(),
                namespace: Some("stackgres".to_string()),
            },
            planned_state: None,
            prior_state: None,
            sensitive_paths: vec![],
        }
    }

    #[test]
    fn test_plan_summary_display() {
        let plan = PlanSummary::from_changes(vec![
            change("secret.a", ResourceAction::Create),
            change("secret.b", ResourceAction::Create),
            change("secret.c", ResourceAction::Update),
            change("secret.d", ResourceAction::NoOp),
        ]);
        assert_eq!(plan.to_string(), "Plan: 2 to add, 1 to change, 0 to destroy.");
        assert_eq!(plan.action_for("secret.c"), Some(ResourceAction::Update));
        assert_eq!(plan.action_for("secret.z"), None);
    }

    #[test]
    fn test_plan_summary_no_changes() {
        let plan = PlanSummary::from_changes(vec![change("secret.a", ResourceAction::NoOp)]);
        assert!(!plan.has_changes());
        assert_eq!(plan.to_string(), "No changes.");
    }
}
