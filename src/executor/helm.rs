use anyhow::{anyhow, Context, Result};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::config::Settings;
use crate::stack::ResourceSpec;

/// Result of a helm command execution.
#[derive(Debug)]
pub struct HelmResult {
    pub exit_code: i32,
    pub stdout_lines: Vec<String>,
    pub stderr_lines: Vec<String>,
}

impl HelmResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Extract a human-readable error message from the result.
    pub fn error_message(&self) -> String {
        // helm prefixes fatal errors with "Error:"
        let errors: Vec<&str> = self
            .stderr_lines
            .iter()
            .map(|l| l.trim())
            .filter(|l| l.starts_with("Error:"))
            .collect();
        if !errors.is_empty() {
            return errors.join("; ");
        }

        let stderr = self.stderr_lines.join("\n");
        if !stderr.trim().is_empty() {
            return stderr;
        }

        let meaningful: Vec<&String> = self
            .stdout_lines
            .iter()
            .filter(|l| !l.trim().is_empty())
            .collect();
        if !meaningful.is_empty() {
            return meaningful
                .iter()
                .rev()
                .take(5)
                .rev()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join("\n");
        }

        format!("exit code {}", self.exit_code)
    }

    /// Whether helm reported that the release does not exist.
    pub fn is_not_found(&self) -> bool {
        self.stderr_lines
            .iter()
            .any(|l| l.contains("not found"))
    }
}

/// A chart release as declared by a `helm.sh/v3` `Release` manifest.
#[derive(Debug, Clone)]
pub struct ReleaseSpec {
    pub name: String,
    pub namespace: String,
    pub chart: String,
    pub version: String,
    pub repository: String,
    pub values: serde_json::Value,
}

impl ReleaseSpec {
    pub fn from_resource(spec: &ResourceSpec) -> Result<Self> {
        let namespace = spec
            .identity
            .namespace
            .clone()
            .ok_or_else(|| anyhow!("Release '{}' has no namespace", spec.address))?;
        let field = |name: &str| -> Result<String> {
            spec.manifest
                .pointer(&format!("/spec/{}", name))
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .ok_or_else(|| anyhow!("Release '{}' is missing spec.{}", spec.address, name))
        };
        Ok(Self {
            name: spec.identity.name.clone(),
            namespace,
            chart: field("chart")?,
            version: field("version")?,
            repository: field("repository")?,
            values: spec
                .manifest
                .pointer("/spec/values")
                .cloned()
                .unwrap_or_else(|| serde_json::json!({})),
        })
    }
}

/// Drives the helm CLI against one kube context.
#[derive(Debug, Clone)]
pub struct HelmRunner {
    binary: String,
    kube_context: String,
    timeout_secs: u64,
}

impl HelmRunner {
    pub fn new(settings: &Settings, kube_context: &str) -> Self {
        Self {
            binary: settings.helm_binary.clone(),
            kube_context: kube_context.to_string(),
            timeout_secs: settings.helm_timeout_secs,
        }
    }

    /// `helm upgrade --install --wait`. Values go through a temporary file
    /// so that secrets never show up in the process list.
    pub async fn upgrade_install(&self, release: &ReleaseSpec) -> Result<()> {
        let mut values_file = tempfile::Builder::new()
            .prefix("pgstack-values-")
            .suffix(".yaml")
            .tempfile()
            .context("Failed to create helm values file")?;
        let values = serde_yaml::to_string(&release.values)?;
        values_file.write_all(values.as_bytes())?;
        values_file.flush()?;

        let values_path = values_file.path().to_string_lossy().to_string();
        let timeout = format!("{}s", self.timeout_secs);
        let args = [
            "upgrade",
            "--install",
            release.name.as_str(),
            release.chart.as_str(),
            "--repo",
            release.repository.as_str(),
            "--version",
            release.version.as_str(),
            "--namespace",
            release.namespace.as_str(),
            "--wait",
            "--timeout",
            timeout.as_str(),
            "-f",
            values_path.as_str(),
        ];

        let result = self.run(&args).await?;
        if !result.success() {
            anyhow::bail!(
                "helm upgrade of release '{}' failed: {}",
                release.name,
                result.error_message()
            );
        }
        Ok(())
    }

    /// Whether the release is installed.
    pub async fn status(&self, name: &str, namespace: &str) -> Result<bool> {
        let result = self
            .run(&["status", name, "--namespace", namespace])
            .await?;
        if result.success() {
            return Ok(true);
        }
        if result.is_not_found() {
            return Ok(false);
        }
        anyhow::bail!(
            "helm status of release '{}' failed: {}",
            name,
            result.error_message()
        )
    }

    /// Uninstall the release. A release that is already gone is not an error.
    pub async fn uninstall(&self, name: &str, namespace: &str) -> Result<()> {
        let result = self
            .run(&["uninstall", name, "--namespace", namespace, "--wait"])
            .await?;
        if result.success() || result.is_not_found() {
            return Ok(());
        }
        anyhow::bail!(
            "helm uninstall of release '{}' failed: {}",
            name,
            result.error_message()
        )
    }

    async fn run(&self, args: &[&str]) -> Result<HelmResult> {
        let mut full_args: Vec<&str> = args.to_vec();
        full_args.push("--kube-context");
        full_args.push(&self.kube_context);
        run_helm(&self.binary, &full_args).await
    }
}

/// Run a helm command, collecting its output line by line.
pub async fn run_helm(binary: &str, args: &[&str]) -> Result<HelmResult> {
    tracing::info!(binary = binary, args = ?args, "Running helm");

    let mut cmd = Command::new(binary);
    cmd.args(args)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped());

    let mut child = cmd
        .spawn()
        .with_context(|| format!("Failed to spawn {}", binary))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("{} stdout was not captured", binary))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("{} stderr was not captured", binary))?;

    let mut stdout_stream = BufReader::new(stdout).lines();
    let mut stderr_stream = BufReader::new(stderr).lines();

    let stdout_handle = tokio::spawn(async move {
        let mut lines = Vec::new();
        while let Ok(Some(line)) = stdout_stream.next_line().await {
            tracing::debug!(stream = "stdout", "{}", line);
            lines.push(line);
        }
        lines
    });

    let stderr_handle = tokio::spawn(async move {
        let mut lines = Vec::new();
        while let Ok(Some(line)) = stderr_stream.next_line().await {
            tracing::debug!(stream = "stderr", "{}", line);
            lines.push(line);
        }
        lines
    });

    let stdout_lines = stdout_handle.await?;
    let stderr_lines = stderr_handle.await?;

    let status = child.wait().await?;
    let exit_code = status.code().unwrap_or(-1);

    tracing::info!(exit_code = exit_code, "helm command completed");

    Ok(HelmResult {
        exit_code,
        stdout_lines,
        stderr_lines,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(exit_code: i32, stdout: &[&str], stderr: &[&str]) -> HelmResult {
        HelmResult {
            exit_code,
            stdout_lines: stdout.iter().map(|s| s.to_string()).collect(),
            stderr_lines: stderr.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_error_message_prefers_error_lines() {
        let r = result(
            1,
            &[],
            &[
                "WARNING: kubeconfig is group-readable",
                "Error: INSTALLATION FAILED: timed out waiting for the condition",
            ],
        );
        assert_eq!(
            r.error_message(),
            "Error: INSTALLATION FAILED: timed out waiting for the condition"
        );
    }

    #[test]
    fn test_error_message_falls_back_to_exit_code() {
        assert_eq!(result(3, &[], &[]).error_message(), "exit code 3");
    }

    #[test]
    fn test_not_found_detection() {
        let r = result(1, &[], &["Error: uninstall: Release not loaded: stackgres: release: not found"]);
        assert!(r.is_not_found());
        assert!(!result(1, &[], &["Error: Kubernetes cluster unreachable"]).is_not_found());
    }

    #[test]
    fn test_release_spec_from_resource() {
        let spec = ResourceSpec::from_manifest(
            "helm_release",
            "stackgres",
            serde_json::json!({
                "apiVersion": "helm.sh/v3",
                "kind": "Release",
                "metadata": { "name": "stackgres", "namespace": "stackgres" },
                "spec": {
                    "chart": "stackgres-operator",
                    "version": "1.1.0",
                    "repository": "https://example.invalid/charts/",
                    "values": { "authentication": { "user": "admin" } },
                },
            }),
        )
        .unwrap();

        let release = ReleaseSpec::from_resource(&spec).unwrap();
        assert_eq!(release.name, "stackgres");
        assert_eq!(release.namespace, "stackgres");
        assert_eq!(release.chart, "stackgres-operator");
        assert_eq!(release.version, "1.1.0");
        assert_eq!(release.values["authentication"]["user"], "admin");
    }
}
