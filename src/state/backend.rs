use anyhow::Result;
use async_trait::async_trait;

use super::models::{ResourceFilter, ResourceResult, ResourceState, RunRecord, Stack};

/// Pluggable state backend trait.
#[async_trait]
pub trait StateBackend: Send + Sync {
    // ─── Initialization ─────────────────────────────────────────────────────

    /// Initialize the backend (create tables, run migrations).
    async fn initialize(&self) -> Result<()>;

    // ─── Stack Operations ───────────────────────────────────────────────────

    /// Create a new stack. Returns the stack ID.
    async fn create_stack(&self, name: &str) -> Result<String>;

    /// Get a stack by name.
    async fn get_stack(&self, name: &str) -> Result<Option<Stack>>;

    /// Get a stack by ID.
    async fn get_stack_by_id(&self, stack_id: &str) -> Result<Option<Stack>>;

    /// List all stacks.
    async fn list_stacks(&self) -> Result<Vec<Stack>>;

    /// Get a stack by name, creating it on first use. Returns the stack ID.
    async fn ensure_stack(&self, name: &str) -> Result<String> {
        match self.get_stack(name).await? {
            Some(stack) => Ok(stack.id),
            None => self.create_stack(name).await,
        }
    }

    // ─── Resource CRUD ──────────────────────────────────────────────────────

    /// Get a resource by stack and address.
    async fn get_resource(&self, stack_id: &str, address: &str) -> Result<Option<ResourceState>>;

    /// Insert or update a resource. Returns the ID of the stored row, which
    /// is the existing one when the address was already present.
    async fn upsert_resource(&self, resource: &ResourceState) -> Result<String>;

    /// Delete a resource from state.
    async fn delete_resource(&self, stack_id: &str, address: &str) -> Result<()>;

    /// List resources with optional filtering, ordered by address.
    async fn list_resources(
        &self,
        stack_id: &str,
        filter: &ResourceFilter,
    ) -> Result<Vec<ResourceState>>;

    /// Count resources in a stack.
    async fn count_resources(&self, stack_id: &str) -> Result<usize>;

    // ─── Dependencies ───────────────────────────────────────────────────────

    /// Set dependencies for a resource (replaces existing).
    async fn set_dependencies(
        &self,
        resource_id: &str,
        depends_on: &[(String, String)], // (depends_on_id, dep_type)
    ) -> Result<()>;

    /// Addresses of the resources the given resource depends on.
    async fn get_dependencies(&self, resource_id: &str) -> Result<Vec<String>>;

    /// Addresses of the resources that depend on the given resource.
    async fn get_dependents(&self, resource_id: &str) -> Result<Vec<String>>;

    // ─── Runs ───────────────────────────────────────────────────────────────

    /// Start a new execution run.
    async fn start_run(&self, stack_id: &str, operation: &str, resources_planned: i32)
        -> Result<String>;

    /// Complete an execution run.
    async fn complete_run(
        &self,
        run_id: &str,
        status: &str,
        resources_succeeded: i32,
        resources_failed: i32,
        error_message: Option<&str>,
    ) -> Result<()>;

    /// Record a per-resource result within a run.
    async fn record_resource_result(&self, run_id: &str, result: &ResourceResult) -> Result<()>;

    /// Per-resource results of a run, ordered by address.
    async fn list_run_results(&self, run_id: &str) -> Result<Vec<ResourceResult>>;

    /// Get the latest run for a stack.
    async fn get_latest_run(&self, stack_id: &str) -> Result<Option<RunRecord>>;

    /// List recent runs for a stack.
    async fn list_runs(&self, stack_id: &str, limit: usize) -> Result<Vec<RunRecord>>;
}
