//! The StackGres Postgres stack: every object it provisions and the
//! explicit ordering edges between them.

pub mod labels;
pub mod monitoring;
pub mod network;
pub mod resource;
pub mod stackgres;
pub mod validator;

use std::path::Path;

use anyhow::Result;

use crate::config::{loader, OpaqueDocument, ProjectFile, StackConfig};
pub use resource::{ObjectIdentity, ResourceHandle, ResourceSpec};

/// Address of the provider node every root resource hangs off.
pub const PROVIDER_ADDRESS: &str = "provider.k8s";

/// Connection settings for the target cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    /// kubeconfig context name.
    pub context: String,
    /// Namespace objects default to.
    pub namespace: String,
}

/// Desired state of one stack: provider settings plus resources in
/// declaration order.
#[derive(Debug, Clone)]
pub struct Declaration {
    pub stack: String,
    pub provider: ProviderSettings,
    resources: Vec<ResourceSpec>,
}

impl Declaration {
    pub fn new(stack: &str, provider: ProviderSettings) -> Self {
        Self {
            stack: stack.to_string(),
            provider,
            resources: Vec::new(),
        }
    }

    /// Append a resource and return a handle dependents can reference.
    pub fn add(&mut self, spec: ResourceSpec) -> ResourceHandle {
        let handle = spec.handle();
        self.resources.push(spec);
        handle
    }

    pub fn resources(&self) -> &[ResourceSpec] {
        &self.resources
    }

    pub fn get(&self, address: &str) -> Option<&ResourceSpec> {
        self.resources.iter().find(|r| r.address == address)
    }

    /// Addresses `address` was explicitly declared to depend on.
    pub fn explicit_dependencies(&self, address: &str) -> Option<&[String]> {
        self.get(address).map(|r| r.depends_on.as_slice())
    }
}

/// Declare the full stack. Pure: no I/O and no cluster access.
pub fn declare(config: &StackConfig, alerts: OpaqueDocument) -> Result<Declaration> {
    let mut declaration = Declaration::new(
        &config.stack,
        ProviderSettings {
            context: config.kubeconfig_context.clone(),
            namespace: config.namespace().to_string(),
        },
    );

    let namespace = declaration.add(stackgres::namespace(config)?);
    let release = declaration.add(stackgres::operator_release(config, &namespace)?);
    let sql_secret = declaration.add(stackgres::sql_secret(config, &namespace)?);
    let profile = declaration.add(stackgres::instance_profile(&namespace, &release)?);
    let cluster = declaration.add(stackgres::cluster(
        config,
        &namespace,
        &release,
        &profile,
        &sql_secret,
    )?);

    declaration.add(network::postgres_service(&namespace, &cluster)?);
    declaration.add(monitoring::service_scrape(
        monitoring::POSTGRES_SCRAPE,
        &namespace,
        &cluster,
    )?);
    declaration.add(monitoring::service_scrape(
        monitoring::ENVOY_SCRAPE,
        &namespace,
        &cluster,
    )?);
    declaration.add(monitoring::alert_rule(alerts, &namespace, &release)?);

    tracing::debug!(
        stack = %declaration.stack,
        resources = declaration.resources.len(),
        "Stack declared"
    );
    Ok(declaration)
}

/// A stack loaded from disk and validated.
#[derive(Debug, Clone)]
pub struct LoadedStack {
    pub project: ProjectFile,
    pub config: StackConfig,
    pub declaration: Declaration,
}

/// Load project settings, stack configuration and the alerts document,
/// then declare and validate the stack.
///
/// Any configuration or document problem fails here, before a single
/// object is submitted.
pub fn load(project_dir: &Path, stack: &str) -> Result<LoadedStack> {
    let project = loader::load_project(project_dir)?;
    let config = loader::load_stack_config(project_dir, &project.name, stack)?;
    let alerts = OpaqueDocument::load(&project_dir.join(&project.settings.alerts_path))?;

    let declaration = declare(&config, alerts)?;
    validator::validate(&declaration)?;

    Ok(LoadedStack {
        project,
        config,
        declaration,
    })
}
