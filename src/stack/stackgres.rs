//! Namespace, operator release and the Postgres cluster it manages.

use anyhow::Result;
use serde_json::json;

use super::resource::{ResourceHandle, ResourceSpec, HELM_RELEASE_API_VERSION, HELM_RELEASE_KIND};
use crate::config::{SecretString, StackConfig};

pub const CHART: &str = "stackgres-operator";
pub const CHART_VERSION: &str = "1.1.0";
pub const CHART_REPOSITORY: &str = "https://stackgres.io/downloads/stackgres-k8s/stackgres/helm/";
pub const ADMIN_USER: &str = "admin";

pub const STACKGRES_API_VERSION: &str = "stackgres.io/v1";

pub const SQL_SECRET_NAME: &str = "stackgres-sqls-secret";
pub const CREATE_USER_KEY: &str = "create-user.sql";

pub const INSTANCE_PROFILE_NAME: &str = "4c8g";

/// Name of the `SGCluster` object. The operator copies it into the
/// `cluster-name` label of every pod it creates.
pub const CLUSTER_NAME: &str = "stackgres-cluster-8dawtfo8";
pub const CLUSTER_INSTANCES: u32 = 3;
pub const POSTGRES_VERSION: &str = "14";
pub const POSTGRES_EXTENSIONS: [&str; 1] = ["fuzzystrmatch"];
pub const VOLUME_SIZE: &str = "100Gi";

/// `CREATE USER <user> WITH PASSWORD '<password>';`
///
/// Values are substituted literally. Nothing is quoted or escaped.
pub fn create_user_sql(user: &str, password: &SecretString) -> String {
    format!("CREATE USER {} WITH PASSWORD '{}';", user, password.expose())
}

/// `CREATE DATABASE <name> WITH OWNER <user>;`
pub fn create_database_sql(database: &str, owner: &str) -> String {
    format!("CREATE DATABASE {} WITH OWNER {};", database, owner)
}

pub fn namespace(config: &StackConfig) -> Result<ResourceSpec> {
    ResourceSpec::from_manifest(
        "namespace",
        "namespace",
        json!({
            "apiVersion": "v1",
            "kind": "Namespace",
            "metadata": { "name": config.namespace() },
        }),
    )
}

pub fn operator_release(config: &StackConfig, namespace: &ResourceHandle) -> Result<ResourceSpec> {
    let spec = ResourceSpec::from_manifest(
        "helm_release",
        &config.project,
        json!({
            "apiVersion": HELM_RELEASE_API_VERSION,
            "kind": HELM_RELEASE_KIND,
            "metadata": { "name": config.project, "namespace": namespace.name() },
            "spec": {
                "chart": CHART,
                "version": CHART_VERSION,
                "repository": CHART_REPOSITORY,
                "values": {
                    "authentication": {
                        "user": ADMIN_USER,
                        "password": config.stackgres_password.expose(),
                    },
                },
            },
        }),
    )?;
    Ok(spec
        .sensitive("/spec/values/authentication/password")
        .depends_on(namespace))
}

pub fn sql_secret(config: &StackConfig, namespace: &ResourceHandle) -> Result<ResourceSpec> {
    let sql = create_user_sql(&config.initial_database_user, &config.initial_database_password);
    let spec = ResourceSpec::from_manifest(
        "secret",
        SQL_SECRET_NAME,
        json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "type": "Opaque",
            "metadata": { "name": SQL_SECRET_NAME, "namespace": namespace.name() },
            "stringData": { CREATE_USER_KEY: sql },
        }),
    )?;
    Ok(spec
        .sensitive(&format!("/stringData/{}", CREATE_USER_KEY))
        .depends_on(namespace))
}

pub fn instance_profile(namespace: &ResourceHandle, release: &ResourceHandle) -> Result<ResourceSpec> {
    let spec = ResourceSpec::from_manifest(
        "sg_instance_profile",
        "stackgres-instance-profile",
        json!({
            "apiVersion": STACKGRES_API_VERSION,
            "kind": "SGInstanceProfile",
            "metadata": { "name": INSTANCE_PROFILE_NAME, "namespace": namespace.name() },
            "spec": { "cpu": "4", "memory": "8Gi" },
        }),
    )?;
    Ok(spec.depends_on(release))
}

pub fn cluster(
    config: &StackConfig,
    namespace: &ResourceHandle,
    release: &ResourceHandle,
    profile: &ResourceHandle,
    sql_secret: &ResourceHandle,
) -> Result<ResourceSpec> {
    let extensions: Vec<serde_json::Value> = POSTGRES_EXTENSIONS
        .iter()
        .map(|name| json!({ "name": name }))
        .collect();

    let spec = ResourceSpec::from_manifest(
        "sg_cluster",
        "stackgres-cluster",
        json!({
            "apiVersion": STACKGRES_API_VERSION,
            "kind": "SGCluster",
            "metadata": { "name": CLUSTER_NAME, "namespace": namespace.name() },
            "spec": {
                "instances": CLUSTER_INSTANCES,
                "postgres": {
                    "version": POSTGRES_VERSION,
                    "extensions": extensions,
                },
                "sgInstanceProfile": profile.name(),
                "prometheusAutobind": true,
                "pods": {
                    "persistentVolume": { "size": VOLUME_SIZE },
                },
                "initialData": {
                    "scripts": [
                        {
                            "name": "create-stackgres-user",
                            "scriptFrom": {
                                "secretKeyRef": {
                                    "name": sql_secret.name(),
                                    "key": CREATE_USER_KEY,
                                },
                            },
                        },
                        {
                            "name": "create-stackgres-database",
                            "script": create_database_sql(
                                &config.initial_database_name,
                                &config.initial_database_user,
                            ),
                        },
                    ],
                },
            },
        }),
    )?;
    Ok(spec.depends_on(release).depends_on(profile).depends_on(sql_secret))
}
