mod common;

use std::collections::HashSet;
use std::sync::Arc;

use common::*;
use pgstack::config::SecretString;
use pgstack::executor::engine::{ResourceAction, ResourceEngine};
use pgstack::output::formatter::render_resource_plan;
use pgstack::stack::Declaration;
use pgstack::state::models::{status, ResourceFilter};
use pgstack::state::StateBackend;

fn engine(cluster: &Arc<RecordingCluster>) -> ResourceEngine {
    ResourceEngine::new(cluster.clone(), 4)
}

#[tokio::test]
async fn test_first_apply_creates_every_resource() {
    let cluster = RecordingCluster::new();
    let (backend, stack_id) = memory_backend().await;
    let declaration = test_declaration();
    let engine = engine(&cluster);

    let plan = engine
        .plan(&declaration, backend.as_ref(), &stack_id, false)
        .await
        .unwrap();
    assert_eq!(plan.creates, 9);
    assert_eq!(plan.to_string(), "Plan: 9 to add, 0 to change, 0 to destroy.");

    let summary = engine
        .apply(&declaration, backend.clone(), &stack_id, &plan)
        .await
        .unwrap();
    assert!(summary.succeeded());
    assert_eq!(summary.added, 9);
    assert_eq!(cluster.applied().len(), 9);
    assert_eq!(cluster.object_count(), 9);

    let rows = backend
        .list_resources(&stack_id, &ResourceFilter::default())
        .await
        .unwrap();
    assert_eq!(rows.len(), 9);
    assert!(rows.iter().all(|r| r.status == status::CREATED));
    assert!(rows.iter().all(|r| !r.manifest_hash.is_empty()));

    let run = backend.get_latest_run(&stack_id).await.unwrap().unwrap();
    assert_eq!(run.status, "succeeded");
    assert_eq!(run.resources_succeeded, 9);
}

#[tokio::test]
async fn test_dependencies_are_applied_first() {
    let cluster = RecordingCluster::new();
    let (backend, stack_id) = memory_backend().await;
    let declaration = test_declaration();
    let engine = engine(&cluster);

    let plan = engine
        .plan(&declaration, backend.as_ref(), &stack_id, false)
        .await
        .unwrap();
    engine
        .apply(&declaration, backend.clone(), &stack_id, &plan)
        .await
        .unwrap();

    let applied = cluster.applied();
    let position = |address: &str| applied.iter().position(|a| a == address).unwrap();
    assert_eq!(position("namespace.namespace"), 0);
    let cluster_pos = position("sg_cluster.stackgres-cluster");
    assert!(position("helm_release.stackgres") < cluster_pos);
    assert!(position("sg_instance_profile.stackgres-instance-profile") < cluster_pos);
    assert!(position("secret.stackgres-sqls-secret") < cluster_pos);
    assert!(position("helm_release.stackgres") < position("vm_rule.postgres-alerts"));
}

#[tokio::test]
async fn test_recorded_dependencies() {
    let cluster = RecordingCluster::new();
    let (backend, stack_id) = memory_backend().await;
    let declaration = test_declaration();
    let engine = engine(&cluster);

    let plan = engine
        .plan(&declaration, backend.as_ref(), &stack_id, false)
        .await
        .unwrap();
    engine
        .apply(&declaration, backend.clone(), &stack_id, &plan)
        .await
        .unwrap();

    let row = backend
        .get_resource(&stack_id, "sg_cluster.stackgres-cluster")
        .await
        .unwrap()
        .unwrap();
    let deps: HashSet<String> = backend
        .get_dependencies(&row.id)
        .await
        .unwrap()
        .into_iter()
        .collect();
    let expected: HashSet<String> = [
        "helm_release.stackgres",
        "sg_instance_profile.stackgres-instance-profile",
        "secret.stackgres-sqls-secret",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    assert_eq!(deps, expected);

    let namespace = backend
        .get_resource(&stack_id, "namespace.namespace")
        .await
        .unwrap()
        .unwrap();
    let dependents = backend.get_dependents(&namespace.id).await.unwrap();
    assert!(dependents.contains(&"service.postgres-service".to_string()));
    assert!(dependents.contains(&"helm_release.stackgres".to_string()));
}

#[tokio::test]
async fn test_second_apply_is_a_no_op() {
    let cluster = RecordingCluster::new();
    let (backend, stack_id) = memory_backend().await;
    let declaration = test_declaration();
    let engine = engine(&cluster);

    let plan = engine
        .plan(&declaration, backend.as_ref(), &stack_id, false)
        .await
        .unwrap();
    engine
        .apply(&declaration, backend.clone(), &stack_id, &plan)
        .await
        .unwrap();
    let applied_before = cluster.applied().len();

    let replan = engine
        .plan(&declaration, backend.as_ref(), &stack_id, false)
        .await
        .unwrap();
    assert!(!replan.has_changes());
    assert_eq!(replan.no_ops, 9);
    assert_eq!(replan.to_string(), "No changes.");
    assert!(render_resource_plan(&replan).contains("No changes."));

    let summary = engine
        .apply(&declaration, backend.clone(), &stack_id, &replan)
        .await
        .unwrap();
    assert_eq!(summary.added + summary.changed + summary.destroyed, 0);
    assert_eq!(cluster.applied().len(), applied_before);
}

#[tokio::test]
async fn test_password_rotation_updates_secret_holders() {
    let cluster = RecordingCluster::new();
    let (backend, stack_id) = memory_backend().await;
    let engine = engine(&cluster);

    let declaration = test_declaration();
    let plan = engine
        .plan(&declaration, backend.as_ref(), &stack_id, false)
        .await
        .unwrap();
    engine
        .apply(&declaration, backend.clone(), &stack_id, &plan)
        .await
        .unwrap();

    let mut rotated = test_config();
    rotated.stackgres_password = SecretString::new("rotated-admin");
    rotated.initial_database_password = SecretString::new("rotated-db");
    let declaration = declaration_with(&rotated);

    let plan = engine
        .plan(&declaration, backend.as_ref(), &stack_id, false)
        .await
        .unwrap();
    assert_eq!(plan.updates, 2);
    assert_eq!(plan.creates, 0);
    assert_eq!(
        plan.action_for("helm_release.stackgres"),
        Some(ResourceAction::Update)
    );
    assert_eq!(
        plan.action_for("secret.stackgres-sqls-secret"),
        Some(ResourceAction::Update)
    );

    let summary = engine
        .apply(&declaration, backend.clone(), &stack_id, &plan)
        .await
        .unwrap();
    assert_eq!(summary.changed, 2);
    assert_eq!(summary.added, 0);
}

#[tokio::test]
async fn test_secrets_never_reach_state_or_plan_output() {
    let cluster = RecordingCluster::new();
    let (backend, stack_id) = memory_backend().await;
    let declaration = test_declaration();
    let engine = engine(&cluster);

    let plan = engine
        .plan(&declaration, backend.as_ref(), &stack_id, false)
        .await
        .unwrap();
    let rendered = render_resource_plan(&plan);
    assert!(!rendered.contains(STACKGRES_PASSWORD));
    assert!(!rendered.contains(DATABASE_PASSWORD));

    engine
        .apply(&declaration, backend.clone(), &stack_id, &plan)
        .await
        .unwrap();

    for row in backend
        .list_resources(&stack_id, &ResourceFilter::default())
        .await
        .unwrap()
    {
        assert!(!row.manifest_json.contains(STACKGRES_PASSWORD), "{}", row.address);
        assert!(!row.manifest_json.contains(DATABASE_PASSWORD), "{}", row.address);
    }

    // The cluster itself receives the real values
    let manifests = cluster.applied_manifests();
    assert!(manifests
        .iter()
        .any(|m| m.to_string().contains(STACKGRES_PASSWORD)));
}

#[tokio::test]
async fn test_failed_release_skips_its_dependents() {
    let cluster = RecordingCluster::new();
    cluster.fail_apply_of("helm_release.stackgres");
    let (backend, stack_id) = memory_backend().await;
    let declaration = test_declaration();
    let engine = engine(&cluster);

    let plan = engine
        .plan(&declaration, backend.as_ref(), &stack_id, false)
        .await
        .unwrap();
    let summary = engine
        .apply(&declaration, backend.clone(), &stack_id, &plan)
        .await
        .unwrap();

    assert!(!summary.succeeded());
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.skipped, 3);
    assert_eq!(summary.added, 5);

    let (address, message) = summary.first_error().unwrap();
    assert_eq!(address, "helm_release.stackgres");
    assert!(message.contains("admission webhook"));

    let applied = cluster.applied();
    assert!(!applied.contains(&"sg_cluster.stackgres-cluster".to_string()));
    assert!(!applied.contains(&"vm_rule.postgres-alerts".to_string()));

    let release = backend
        .get_resource(&stack_id, "helm_release.stackgres")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(release.status, status::FAILED);
    assert!(backend
        .get_resource(&stack_id, "sg_cluster.stackgres-cluster")
        .await
        .unwrap()
        .is_none());

    let run = backend.get_latest_run(&stack_id).await.unwrap().unwrap();
    assert_eq!(run.status, "failed");
    assert!(run.error_message.unwrap().contains("admission webhook"));

    // The failed release is created again on the next plan
    let replan = engine
        .plan(&declaration, backend.as_ref(), &stack_id, false)
        .await
        .unwrap();
    assert_eq!(
        replan.action_for("helm_release.stackgres"),
        Some(ResourceAction::Create)
    );
    assert_eq!(replan.creates, 4);
    assert_eq!(replan.no_ops, 5);
}

#[tokio::test]
async fn test_failed_update_is_planned_as_update() {
    let cluster = RecordingCluster::new();
    let (backend, stack_id) = memory_backend().await;
    let engine = engine(&cluster);

    let declaration = test_declaration();
    let plan = engine
        .plan(&declaration, backend.as_ref(), &stack_id, false)
        .await
        .unwrap();
    engine
        .apply(&declaration, backend.clone(), &stack_id, &plan)
        .await
        .unwrap();

    let mut rotated = test_config();
    rotated.initial_database_password = SecretString::new("rotated-db");
    let declaration = declaration_with(&rotated);

    cluster.fail_apply_of("secret.stackgres-sqls-secret");
    let plan = engine
        .plan(&declaration, backend.as_ref(), &stack_id, false)
        .await
        .unwrap();
    assert_eq!(plan.updates, 1);
    let summary = engine
        .apply(&declaration, backend.clone(), &stack_id, &plan)
        .await
        .unwrap();
    assert_eq!(summary.failed, 1);

    let secret = backend
        .get_resource(&stack_id, "secret.stackgres-sqls-secret")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(secret.status, status::FAILED);
    assert!(!secret.manifest_hash.is_empty());

    cluster.recover();
    let replan = engine
        .plan(&declaration, backend.as_ref(), &stack_id, false)
        .await
        .unwrap();
    assert_eq!(
        replan.action_for("secret.stackgres-sqls-secret"),
        Some(ResourceAction::Update)
    );
    assert_eq!(replan.creates, 0);

    let summary = engine
        .apply(&declaration, backend.clone(), &stack_id, &replan)
        .await
        .unwrap();
    assert!(summary.succeeded());
    assert_eq!(summary.added, 0);
    assert_eq!(summary.changed, 1);

    let secret = backend
        .get_resource(&stack_id, "secret.stackgres-sqls-secret")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(secret.status, status::CREATED);
}

#[tokio::test]
async fn test_stored_hashes_are_salted_per_stack() {
    let cluster = RecordingCluster::new();
    let (backend, dev) = memory_backend().await;
    let prod = backend.ensure_stack("prod").await.unwrap();
    let declaration = test_declaration();
    let engine = engine(&cluster);

    for stack_id in [&dev, &prod] {
        let plan = engine
            .plan(&declaration, backend.as_ref(), stack_id, false)
            .await
            .unwrap();
        engine
            .apply(&declaration, backend.clone(), stack_id, &plan)
            .await
            .unwrap();
    }

    let address = "secret.stackgres-sqls-secret";
    let dev_row = backend.get_resource(&dev, address).await.unwrap().unwrap();
    let prod_row = backend.get_resource(&prod, address).await.unwrap().unwrap();
    assert_ne!(dev_row.manifest_hash, prod_row.manifest_hash);

    let salt = backend.get_stack("dev").await.unwrap().unwrap().hash_salt;
    let spec = declaration.get(address).unwrap();
    assert_eq!(dev_row.manifest_hash, spec.manifest_hash(&salt));
    assert_ne!(dev_row.manifest_hash, spec.manifest_hash(""));
}

#[tokio::test]
async fn test_unreachable_cluster_applies_nothing() {
    let cluster = RecordingCluster::new();
    cluster.fail_ping();
    let (backend, stack_id) = memory_backend().await;
    let declaration = test_declaration();
    let engine = engine(&cluster);

    let plan = engine
        .plan(&declaration, backend.as_ref(), &stack_id, false)
        .await
        .unwrap();
    let summary = engine
        .apply(&declaration, backend.clone(), &stack_id, &plan)
        .await
        .unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.skipped, 9);
    assert_eq!(summary.added, 0);
    assert!(cluster.applied().is_empty());
    assert_eq!(backend.count_resources(&stack_id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_destroy_removes_dependents_first() {
    let cluster = RecordingCluster::new();
    let (backend, stack_id) = memory_backend().await;
    let declaration = test_declaration();
    let engine = engine(&cluster);

    let plan = engine
        .plan(&declaration, backend.as_ref(), &stack_id, false)
        .await
        .unwrap();
    engine
        .apply(&declaration, backend.clone(), &stack_id, &plan)
        .await
        .unwrap();

    let summary = engine.destroy(backend.clone(), &stack_id).await.unwrap();
    assert!(summary.succeeded());
    assert_eq!(summary.destroyed, 9);
    assert!(summary.to_string().starts_with("Destroy complete! Resources: 9 destroyed"));

    let deleted = cluster.deleted_kinds();
    assert_eq!(deleted.len(), 9);
    assert_eq!(deleted.last().map(String::as_str), Some("Namespace"));
    let position = |kind: &str| deleted.iter().position(|k| k == kind).unwrap();
    assert!(position("SGCluster") < position("SGInstanceProfile"));
    assert!(position("SGCluster") < position("Release"));
    assert!(position("VMRule") < position("Release"));

    assert_eq!(backend.count_resources(&stack_id).await.unwrap(), 0);
    assert_eq!(cluster.object_count(), 0);

    let run = backend.get_latest_run(&stack_id).await.unwrap().unwrap();
    assert_eq!(run.operation, "destroy");
    let results = backend.list_run_results(&run.id).await.unwrap();
    assert_eq!(results.len(), 9);
    assert!(results.iter().all(|r| r.action == "delete"));
}

#[tokio::test]
async fn test_unreachable_cluster_fails_destroy_run() {
    let cluster = RecordingCluster::new();
    let (backend, stack_id) = memory_backend().await;
    let declaration = test_declaration();
    let engine = engine(&cluster);

    let plan = engine
        .plan(&declaration, backend.as_ref(), &stack_id, false)
        .await
        .unwrap();
    engine
        .apply(&declaration, backend.clone(), &stack_id, &plan)
        .await
        .unwrap();

    cluster.fail_ping();
    let err = engine.destroy(backend.clone(), &stack_id).await.unwrap_err();
    assert!(format!("{:#}", err).contains("connection refused"));

    let run = backend.get_latest_run(&stack_id).await.unwrap().unwrap();
    assert_eq!(run.operation, "destroy");
    assert_eq!(run.status, "failed");
    assert!(run.completed_at.is_some());
    assert!(run.error_message.unwrap().contains("connection refused"));
    assert_eq!(backend.count_resources(&stack_id).await.unwrap(), 9);
    assert!(cluster.deleted_kinds().is_empty());
}

#[tokio::test]
async fn test_destroy_of_empty_stack() {
    let cluster = RecordingCluster::new();
    let (backend, stack_id) = memory_backend().await;

    let summary = engine(&cluster)
        .destroy(backend.clone(), &stack_id)
        .await
        .unwrap();
    assert_eq!(summary.destroyed, 0);
    assert!(cluster.calls().is_empty());
}

#[tokio::test]
async fn test_undeclared_resource_is_deleted() {
    let cluster = RecordingCluster::new();
    let (backend, stack_id) = memory_backend().await;
    let full = test_declaration();
    let engine = engine(&cluster);

    let plan = engine
        .plan(&full, backend.as_ref(), &stack_id, false)
        .await
        .unwrap();
    engine
        .apply(&full, backend.clone(), &stack_id, &plan)
        .await
        .unwrap();

    let mut trimmed = Declaration::new(&full.stack, full.provider.clone());
    for spec in full.resources() {
        if spec.address != "vm_rule.postgres-alerts" {
            trimmed.add(spec.clone());
        }
    }

    let plan = engine
        .plan(&trimmed, backend.as_ref(), &stack_id, false)
        .await
        .unwrap();
    assert_eq!(plan.deletes, 1);
    assert_eq!(
        plan.action_for("vm_rule.postgres-alerts"),
        Some(ResourceAction::Delete)
    );

    let summary = engine
        .apply(&trimmed, backend.clone(), &stack_id, &plan)
        .await
        .unwrap();
    assert_eq!(summary.destroyed, 1);
    assert_eq!(cluster.deleted_kinds(), vec!["VMRule".to_string()]);
    assert!(backend
        .get_resource(&stack_id, "vm_rule.postgres-alerts")
        .await
        .unwrap()
        .is_none());
    assert_eq!(backend.count_resources(&stack_id).await.unwrap(), 8);
}

#[tokio::test]
async fn test_refresh_recreates_missing_object() {
    let cluster = RecordingCluster::new();
    let (backend, stack_id) = memory_backend().await;
    let declaration = test_declaration();
    let engine = engine(&cluster);

    let plan = engine
        .plan(&declaration, backend.as_ref(), &stack_id, false)
        .await
        .unwrap();
    engine
        .apply(&declaration, backend.clone(), &stack_id, &plan)
        .await
        .unwrap();

    cluster.forget("stackgres-sqls-secret");

    let stale = engine
        .plan(&declaration, backend.as_ref(), &stack_id, false)
        .await
        .unwrap();
    assert!(!stale.has_changes());

    let refreshed = engine
        .plan(&declaration, backend.as_ref(), &stack_id, true)
        .await
        .unwrap();
    assert_eq!(refreshed.creates, 1);
    assert_eq!(
        refreshed.action_for("secret.stackgres-sqls-secret"),
        Some(ResourceAction::Create)
    );
    assert!(cluster
        .calls()
        .contains(&Call::Exists("namespace.namespace".to_string())));
}
