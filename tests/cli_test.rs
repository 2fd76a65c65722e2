mod common;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use common::write_project;
use pgstack::config::loader::env_var;
use pgstack::config::types::keys;

fn pgstack(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("pgstack").unwrap();
    cmd.arg("--project-dir").arg(dir.path());
    for key in keys::REQUIRED {
        cmd.env_remove(env_var(key));
    }
    cmd
}

#[test]
fn test_validate_accepts_complete_project() {
    let dir = TempDir::new().unwrap();
    write_project(dir.path());

    pgstack(&dir)
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid."))
        .stdout(predicate::str::contains("9 resource(s)"));
}

#[test]
fn test_validate_names_missing_key() {
    let dir = TempDir::new().unwrap();
    write_project(dir.path());
    std::fs::write(
        dir.path().join("pgstack.dev.yaml"),
        "config:\n  kubeconfig_context: kind-dev\n  stackgres_password: pw\n  initial_database_user: app\n  initial_database_password: pw2\n",
    )
    .unwrap();

    pgstack(&dir)
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("initial_database_name"));
}

#[test]
fn test_environment_supplies_missing_key() {
    let dir = TempDir::new().unwrap();
    write_project(dir.path());
    std::fs::write(
        dir.path().join("pgstack.dev.yaml"),
        "config:\n  kubeconfig_context: kind-dev\n  stackgres_password: pw\n  initial_database_user: app\n  initial_database_password: pw2\n",
    )
    .unwrap();

    pgstack(&dir)
        .env(env_var(keys::INITIAL_DATABASE_NAME), "appdb")
        .arg("validate")
        .assert()
        .success();
}

#[test]
fn test_validate_rejects_malformed_alerts() {
    let dir = TempDir::new().unwrap();
    write_project(dir.path());
    std::fs::write(dir.path().join("alerts.yaml"), "groups: [unclosed").unwrap();

    pgstack(&dir)
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("alerts.yaml"));
}

#[test]
fn test_graph_prints_dot() {
    let dir = TempDir::new().unwrap();
    write_project(dir.path());

    pgstack(&dir)
        .arg("graph")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("digraph resources {"))
        .stdout(predicate::str::contains("helm_release.stackgres"));
}

#[test]
fn test_other_stack_reads_its_own_file() {
    let dir = TempDir::new().unwrap();
    write_project(dir.path());

    pgstack(&dir)
        .args(["--stack", "prod", "validate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("kubeconfig_context"));
}

#[test]
fn test_destroy_needs_only_kubeconfig_context() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("pgstack.dev.yaml"),
        "config:\n  kubeconfig_context: kind-dev\n",
    )
    .unwrap();

    pgstack(&dir)
        .args(["destroy", "--auto-approve"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to destroy."));
}

#[test]
fn test_destroy_without_context_fails() {
    let dir = TempDir::new().unwrap();
    write_project(dir.path());
    std::fs::write(
        dir.path().join("pgstack.dev.yaml"),
        "config:\n  stackgres_password: pw\n",
    )
    .unwrap();

    pgstack(&dir)
        .args(["destroy", "--auto-approve"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("kubeconfig_context"));
}
