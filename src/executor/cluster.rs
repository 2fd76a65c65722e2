use anyhow::{Context, Result};
use async_trait::async_trait;
use kube::api::{Api, ApiResource, DeleteParams, Patch, PatchParams};
use kube::config::KubeConfigOptions;
use kube::core::{DynamicObject, GroupVersionKind};
use kube::Client;
use serde_json::json;
use tracing::{debug, info};

use super::helm::{HelmRunner, ReleaseSpec};
use super::retry::{with_retry, with_retry_when};
use crate::config::Settings;
use crate::stack::{ObjectIdentity, ResourceSpec};

/// Field manager recorded on every server-side apply.
pub const FIELD_MANAGER: &str = "pgstack";

const RETRY_BASE_DELAY_MS: u64 = 500;

/// Operations the engine needs from the target cluster.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Verify the cluster is reachable.
    async fn ping(&self) -> Result<()>;

    /// Whether the object described by `spec` currently exists.
    async fn exists(&self, spec: &ResourceSpec) -> Result<bool>;

    /// Create or update the object. Returns what the cluster reports back.
    async fn apply(&self, spec: &ResourceSpec) -> Result<serde_json::Value>;

    /// Delete the object. Deleting an absent object succeeds.
    async fn delete(&self, identity: &ObjectIdentity) -> Result<()>;
}

/// `ClusterClient` backed by the Kubernetes API and the helm CLI.
pub struct KubeCluster {
    client: Client,
    helm: HelmRunner,
    retries: u32,
}

impl KubeCluster {
    /// Connect using the given context of the default kubeconfig.
    pub async fn connect(context: &str, settings: &Settings) -> Result<Self> {
        let options = KubeConfigOptions {
            context: Some(context.to_string()),
            ..Default::default()
        };
        let config = kube::Config::from_kubeconfig(&options)
            .await
            .with_context(|| format!("Failed to load kubeconfig context '{}'", context))?;
        let client = Client::try_from(config)
            .context("Failed to create Kubernetes client. Ensure kubeconfig is configured.")?;

        debug!(context = context, "Kubernetes client created");

        Ok(Self {
            client,
            helm: HelmRunner::new(settings, context),
            retries: settings.api_retries,
        })
    }

    fn api(&self, identity: &ObjectIdentity) -> Api<DynamicObject> {
        let (group, version) = identity.group_version();
        let gvk = GroupVersionKind {
            group: group.to_string(),
            version: version.to_string(),
            kind: identity.kind.clone(),
        };
        let ar = ApiResource::from_gvk(&gvk);
        match &identity.namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &ar),
            None => Api::all_with(self.client.clone(), &ar),
        }
    }

    fn release_namespace(identity: &ObjectIdentity) -> Result<&str> {
        identity
            .namespace
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Release '{}' has no namespace", identity.name))
    }
}

/// Conflicts, throttling and server-side failures are worth another try.
fn is_transient(err: &kube::Error) -> bool {
    match err {
        kube::Error::Api(status) => {
            status.code == 409 || status.code == 429 || status.code >= 500
        }
        _ => false,
    }
}

fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(status) if status.code == 404)
}

#[async_trait]
impl ClusterClient for KubeCluster {
    async fn ping(&self) -> Result<()> {
        let version = with_retry(self.retries, RETRY_BASE_DELAY_MS, "apiserver_version", || {
            self.client.apiserver_version()
        })
        .await
        .context("Kubernetes API server is unreachable")?;
        debug!(
            major = %version.major,
            minor = %version.minor,
            "Connected to Kubernetes API server"
        );
        Ok(())
    }

    async fn exists(&self, spec: &ResourceSpec) -> Result<bool> {
        let identity = &spec.identity;
        if identity.is_helm_release() {
            return self
                .helm
                .status(&identity.name, Self::release_namespace(identity)?)
                .await;
        }

        let api = self.api(identity);
        let found = with_retry_when(
            self.retries,
            RETRY_BASE_DELAY_MS,
            "get",
            is_transient,
            || api.get_opt(&identity.name),
        )
        .await
        .with_context(|| format!("Failed to read {}", identity))?;
        Ok(found.is_some())
    }

    async fn apply(&self, spec: &ResourceSpec) -> Result<serde_json::Value> {
        let identity = &spec.identity;
        if identity.is_helm_release() {
            let release = ReleaseSpec::from_resource(spec)?;
            self.helm.upgrade_install(&release).await?;
            info!(release = %release.name, namespace = %release.namespace, "Release installed");
            return Ok(json!({
                "name": release.name,
                "namespace": release.namespace,
                "chart": release.chart,
                "version": release.version,
            }));
        }

        let api = self.api(identity);
        let params = PatchParams::apply(FIELD_MANAGER).force();
        let patch = Patch::Apply(&spec.manifest);
        let applied = with_retry_when(
            self.retries,
            RETRY_BASE_DELAY_MS,
            "apply",
            is_transient,
            || api.patch(&identity.name, &params, &patch),
        )
        .await
        .with_context(|| format!("Failed to apply {}", identity))?;

        info!(object = %identity, "Object applied");
        Ok(json!({
            "name": applied.metadata.name,
            "namespace": applied.metadata.namespace,
            "uid": applied.metadata.uid,
            "resourceVersion": applied.metadata.resource_version,
        }))
    }

    async fn delete(&self, identity: &ObjectIdentity) -> Result<()> {
        if identity.is_helm_release() {
            return self
                .helm
                .uninstall(&identity.name, Self::release_namespace(identity)?)
                .await;
        }

        let api = self.api(identity);
        let params = DeleteParams::default();
        let result = with_retry_when(
            self.retries,
            RETRY_BASE_DELAY_MS,
            "delete",
            is_transient,
            || api.delete(&identity.name, &params),
        )
        .await;

        match result {
            Ok(_) => {
                info!(object = %identity, "Object deleted");
                Ok(())
            }
            Err(e) if is_not_found(&e) => {
                debug!(object = %identity, "Object already absent");
                Ok(())
            }
            Err(e) => Err(e).with_context(|| format!("Failed to delete {}", identity)),
        }
    }
}
