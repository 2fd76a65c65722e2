use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use super::secret::SecretString;
use super::types::{keys, ProjectFile, StackConfig};

/// Project file name, looked up in the project directory.
pub const PROJECT_FILE: &str = "pgstack.yaml";

/// Prefix of environment variables that override stack configuration keys.
pub const ENV_PREFIX: &str = "PGSTACK_";

/// Problems with the project file or a stack's configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration value '{0}'")]
    Missing(&'static str),

    #[error("configuration value '{key}' must be a string, number or boolean")]
    NotScalar { key: String },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Default, Deserialize)]
struct StackFile {
    #[serde(default)]
    config: BTreeMap<String, serde_yaml::Value>,
}

/// Path of the configuration file for `stack`, e.g. `pgstack.dev.yaml`.
pub fn stack_file(dir: &Path, stack: &str) -> PathBuf {
    dir.join(format!("pgstack.{}.yaml", stack))
}

/// Environment variable overriding `key`, e.g. `PGSTACK_STACKGRES_PASSWORD`.
pub fn env_var(key: &str) -> String {
    format!("{}{}", ENV_PREFIX, key.to_uppercase())
}

/// Load `pgstack.yaml`, falling back to defaults when it does not exist.
pub fn load_project(dir: &Path) -> Result<ProjectFile, ConfigError> {
    let path = dir.join(PROJECT_FILE);
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No project file, using defaults");
        return Ok(ProjectFile::default());
    }
    read_yaml(&path)
}

/// Load and validate the configuration for one stack.
///
/// Values come from the stack file's `config:` mapping. Keys may carry the
/// project as a prefix (`stackgres:kubeconfig_context`). Environment
/// variables take precedence over file values.
pub fn load_stack_config(
    dir: &Path,
    project: &str,
    stack: &str,
) -> Result<StackConfig, ConfigError> {
    let values = stack_values(dir, project, stack)?;
    resolve(project, stack, &values)
}

/// Resolve only the kubeconfig context of a stack.
///
/// Teardown works from recorded state and needs nothing else, so a stack
/// whose other keys have gone missing can still be destroyed.
pub fn load_kubeconfig_context(
    dir: &Path,
    project: &str,
    stack: &str,
) -> Result<String, ConfigError> {
    let values = stack_values(dir, project, stack)?;
    require(&values, keys::KUBECONFIG_CONTEXT)
}

/// Raw values from the stack file with environment overrides applied.
fn stack_values(
    dir: &Path,
    project: &str,
    stack: &str,
) -> Result<BTreeMap<String, String>, ConfigError> {
    let path = stack_file(dir, stack);
    let file: StackFile = if path.exists() {
        read_yaml(&path)?
    } else {
        tracing::warn!(path = %path.display(), "Stack file not found");
        StackFile::default()
    };

    let mut values = scalar_values(project, file.config)?;
    for key in keys::REQUIRED {
        if let Ok(value) = std::env::var(env_var(key)) {
            tracing::debug!(key = key, "Configuration value overridden from environment");
            values.insert(key.to_string(), value);
        }
    }
    Ok(values)
}

fn require(values: &BTreeMap<String, String>, key: &'static str) -> Result<String, ConfigError> {
    values
        .get(key)
        .filter(|v| !v.trim().is_empty())
        .cloned()
        .ok_or(ConfigError::Missing(key))
}

/// Build a [`StackConfig`] from raw string values. Empty values count as missing.
pub fn resolve(
    project: &str,
    stack: &str,
    values: &BTreeMap<String, String>,
) -> Result<StackConfig, ConfigError> {
    let require = |key: &'static str| require(values, key);

    Ok(StackConfig {
        project: project.to_string(),
        stack: stack.to_string(),
        kubeconfig_context: require(keys::KUBECONFIG_CONTEXT)?,
        stackgres_password: SecretString::new(require(keys::STACKGRES_PASSWORD)?),
        initial_database_user: require(keys::INITIAL_DATABASE_USER)?,
        initial_database_password: SecretString::new(require(keys::INITIAL_DATABASE_PASSWORD)?),
        initial_database_name: require(keys::INITIAL_DATABASE_NAME)?,
    })
}

fn scalar_values(
    project: &str,
    raw: BTreeMap<String, serde_yaml::Value>,
) -> Result<BTreeMap<String, String>, ConfigError> {
    let prefix = format!("{}:", project);
    let mut values = BTreeMap::new();
    for (key, value) in raw {
        let key = key.strip_prefix(&prefix).map(str::to_string).unwrap_or(key);
        let text = match value {
            serde_yaml::Value::Null => continue,
            serde_yaml::Value::String(s) => s,
            serde_yaml::Value::Number(n) => n.to_string(),
            serde_yaml::Value::Bool(b) => b.to_string(),
            _ => return Err(ConfigError::NotScalar { key }),
        };
        values.insert(key, text);
    }
    Ok(values)
}

fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
