use serde::{Deserialize, Serialize};

use super::secret::SecretString;

// ─── Project File ───────────────────────────────────────────────────────────

/// Contents of `pgstack.yaml`. Every field is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectFile {
    #[serde(default = "default_project_name")]
    pub name: String,
    #[serde(default)]
    pub settings: Settings,
}

impl Default for ProjectFile {
    fn default() -> Self {
        Self {
            name: default_project_name(),
            settings: Settings::default(),
        }
    }
}

/// Engine settings controlling execution behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    #[serde(default = "default_working_dir")]
    pub working_dir: String,
    #[serde(default = "default_alerts_path")]
    pub alerts_path: String,
    #[serde(default = "default_helm_binary")]
    pub helm_binary: String,
    #[serde(default = "default_helm_timeout_secs")]
    pub helm_timeout_secs: u64,
    #[serde(default = "default_api_retries")]
    pub api_retries: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            parallelism: default_parallelism(),
            working_dir: default_working_dir(),
            alerts_path: default_alerts_path(),
            helm_binary: default_helm_binary(),
            helm_timeout_secs: default_helm_timeout_secs(),
            api_retries: default_api_retries(),
        }
    }
}

fn default_project_name() -> String {
    "stackgres".to_string()
}

fn default_parallelism() -> usize {
    10
}

fn default_working_dir() -> String {
    ".pgstack".to_string()
}

fn default_alerts_path() -> String {
    "alerts.yaml".to_string()
}

fn default_helm_binary() -> String {
    "helm".to_string()
}

fn default_helm_timeout_secs() -> u64 {
    600
}

fn default_api_retries() -> u32 {
    2
}

// ─── Stack Configuration ────────────────────────────────────────────────────

/// Keys every stack file must provide under `config:`.
pub mod keys {
    pub const KUBECONFIG_CONTEXT: &str = "kubeconfig_context";
    pub const STACKGRES_PASSWORD: &str = "stackgres_password";
    pub const INITIAL_DATABASE_USER: &str = "initial_database_user";
    pub const INITIAL_DATABASE_PASSWORD: &str = "initial_database_password";
    pub const INITIAL_DATABASE_NAME: &str = "initial_database_name";

    pub const REQUIRED: [&str; 5] = [
        KUBECONFIG_CONTEXT,
        STACKGRES_PASSWORD,
        INITIAL_DATABASE_USER,
        INITIAL_DATABASE_PASSWORD,
        INITIAL_DATABASE_NAME,
    ];
}

/// Validated configuration for one stack. Built once at startup and
/// passed by reference from then on.
#[derive(Debug, Clone)]
pub struct StackConfig {
    pub project: String,
    pub stack: String,
    pub kubeconfig_context: String,
    pub stackgres_password: SecretString,
    pub initial_database_user: String,
    pub initial_database_password: SecretString,
    pub initial_database_name: String,
}

impl StackConfig {
    /// Namespace every object lands in; it shares the project's name.
    pub fn namespace(&self) -> &str {
        &self.project
    }
}
