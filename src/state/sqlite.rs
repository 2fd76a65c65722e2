use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::backend::StateBackend;
use super::migration;
use super::models::*;

const STACK_COLUMNS: &str = "id, name, hash_salt, created_at, updated_at";

const RESOURCE_COLUMNS: &str = "id, stack_id, address, kind_token, api_version, kind,
    object_name, namespace, status, manifest_json, manifest_hash, sensitive_paths,
    created_at, updated_at";

const RUN_COLUMNS: &str = "id, stack_id, started_at, completed_at, status, operation,
    resources_planned, resources_succeeded, resources_failed, error_message";

/// SQLite-backed state store, one database per working directory.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Open or create the SQLite state database.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(dir) = db_path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open state database at {}", db_path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("State database connection is poisoned"))
    }

    fn now() -> String {
        chrono::Utc::now().to_rfc3339()
    }
}

#[async_trait]
impl StateBackend for SqliteBackend {
    // ─── Initialization ─────────────────────────────────────────────────────

    async fn initialize(&self) -> Result<()> {
        let conn = self.conn()?;
        migration::check_and_migrate(&conn)
    }

    // ─── Stack Operations ───────────────────────────────────────────────────

    async fn create_stack(&self, name: &str) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let salt = hex::encode(rand::random::<[u8; 32]>());
        let now = Self::now();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO stacks (id, name, hash_salt, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, name, salt, now, now],
        )
        .with_context(|| format!("Failed to create stack '{}'", name))?;
        Ok(id)
    }

    async fn get_stack(&self, name: &str) -> Result<Option<Stack>> {
        let conn = self.conn()?;
        let result = conn
            .query_row(
                &format!("SELECT {} FROM stacks WHERE name = ?1", STACK_COLUMNS),
                params![name],
                stack_from_row,
            )
            .optional()?;
        Ok(result)
    }

    async fn get_stack_by_id(&self, stack_id: &str) -> Result<Option<Stack>> {
        let conn = self.conn()?;
        let result = conn
            .query_row(
                &format!("SELECT {} FROM stacks WHERE id = ?1", STACK_COLUMNS),
                params![stack_id],
                stack_from_row,
            )
            .optional()?;
        Ok(result)
    }

    async fn list_stacks(&self) -> Result<Vec<Stack>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare(&format!("SELECT {} FROM stacks ORDER BY name", STACK_COLUMNS))?;
        let rows = stmt
            .query_map([], stack_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ─── Resource CRUD ──────────────────────────────────────────────────────

    async fn get_resource(&self, stack_id: &str, address: &str) -> Result<Option<ResourceState>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM resources WHERE stack_id = ?1 AND address = ?2",
            RESOURCE_COLUMNS
        );
        let result = conn
            .query_row(&sql, params![stack_id, address], resource_from_row)
            .optional()?;
        Ok(result)
    }

    async fn upsert_resource(&self, resource: &ResourceState) -> Result<String> {
        let conn = self.conn()?;
        let sensitive_json = serde_json::to_string(&resource.sensitive_paths)?;
        let id: String = conn.query_row(
            "INSERT INTO resources (id, stack_id, address, kind_token, api_version, kind,
                object_name, namespace, status, manifest_json, manifest_hash, sensitive_paths,
                created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
             ON CONFLICT(stack_id, address) DO UPDATE SET
                api_version = excluded.api_version,
                kind = excluded.kind,
                object_name = excluded.object_name,
                namespace = excluded.namespace,
                status = excluded.status,
                manifest_json = excluded.manifest_json,
                manifest_hash = excluded.manifest_hash,
                sensitive_paths = excluded.sensitive_paths,
                updated_at = excluded.updated_at
             RETURNING id",
            params![
                resource.id,
                resource.stack_id,
                resource.address,
                resource.kind_token,
                resource.api_version,
                resource.kind,
                resource.object_name,
                resource.namespace,
                resource.status,
                resource.manifest_json,
                resource.manifest_hash,
                sensitive_json,
                resource.created_at,
                resource.updated_at,
            ],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    async fn delete_resource(&self, stack_id: &str, address: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM resources WHERE stack_id = ?1 AND address = ?2",
            params![stack_id, address],
        )?;
        Ok(())
    }

    async fn list_resources(
        &self,
        stack_id: &str,
        filter: &ResourceFilter,
    ) -> Result<Vec<ResourceState>> {
        let conn = self.conn()?;
        let mut sql = format!("SELECT {} FROM resources WHERE stack_id = ?1", RESOURCE_COLUMNS);
        let mut param_values: Vec<String> = vec![stack_id.to_string()];

        if let Some(ref kind_token) = filter.kind_token {
            param_values.push(kind_token.clone());
            sql.push_str(&format!(" AND kind_token = ?{}", param_values.len()));
        }
        if let Some(ref st) = filter.status {
            param_values.push(st.clone());
            sql.push_str(&format!(" AND status = ?{}", param_values.len()));
        }

        sql.push_str(" ORDER BY address");

        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::ToSql> =
            param_values.iter().map(|v| v as &dyn rusqlite::ToSql).collect();
        let rows = stmt
            .query_map(param_refs.as_slice(), resource_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    async fn count_resources(&self, stack_id: &str) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM resources WHERE stack_id = ?1",
            params![stack_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    // ─── Dependencies ───────────────────────────────────────────────────────

    async fn set_dependencies(
        &self,
        resource_id: &str,
        depends_on: &[(String, String)],
    ) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM resource_dependencies WHERE resource_id = ?1",
            params![resource_id],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO resource_dependencies (resource_id, depends_on_id, dependency_type) VALUES (?1, ?2, ?3)",
            )?;
            for (dep_id, dep_type) in depends_on {
                stmt.execute(params![resource_id, dep_id, dep_type])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    async fn get_dependencies(&self, resource_id: &str) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT r.address FROM resource_dependencies d
             JOIN resources r ON r.id = d.depends_on_id
             WHERE d.resource_id = ?1 ORDER BY r.address",
        )?;
        let rows = stmt
            .query_map(params![resource_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(rows)
    }

    async fn get_dependents(&self, resource_id: &str) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT r.address FROM resource_dependencies d
             JOIN resources r ON r.id = d.resource_id
             WHERE d.depends_on_id = ?1 ORDER BY r.address",
        )?;
        let rows = stmt
            .query_map(params![resource_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(rows)
    }

    // ─── Runs ───────────────────────────────────────────────────────────────

    async fn start_run(
        &self,
        stack_id: &str,
        operation: &str,
        resources_planned: i32,
    ) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Self::now();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO runs (id, stack_id, started_at, status, operation, resources_planned)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![id, stack_id, now, run_status::RUNNING, operation, resources_planned],
        )?;
        Ok(id)
    }

    async fn complete_run(
        &self,
        run_id: &str,
        status: &str,
        resources_succeeded: i32,
        resources_failed: i32,
        error_message: Option<&str>,
    ) -> Result<()> {
        let now = Self::now();
        let conn = self.conn()?;
        conn.execute(
            "UPDATE runs SET completed_at = ?2, status = ?3, resources_succeeded = ?4,
                resources_failed = ?5, error_message = ?6
             WHERE id = ?1",
            params![
                run_id,
                now,
                status,
                resources_succeeded,
                resources_failed,
                error_message
            ],
        )?;
        Ok(())
    }

    async fn record_resource_result(&self, run_id: &str, result: &ResourceResult) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO run_resources (run_id, resource_address, action, status, started_at, completed_at, error_message)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(run_id, resource_address) DO UPDATE SET
                status = excluded.status, completed_at = excluded.completed_at,
                error_message = excluded.error_message",
            params![
                run_id,
                result.address,
                result.action,
                result.status,
                result.started_at,
                result.completed_at,
                result.error_message,
            ],
        )?;
        Ok(())
    }

    async fn list_run_results(&self, run_id: &str) -> Result<Vec<ResourceResult>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT resource_address, action, status, started_at, completed_at, error_message
             FROM run_resources WHERE run_id = ?1 ORDER BY resource_address",
        )?;
        let rows = stmt
            .query_map(params![run_id], |row| {
                Ok(ResourceResult {
                    address: row.get(0)?,
                    action: row.get(1)?,
                    status: row.get(2)?,
                    started_at: row.get(3)?,
                    completed_at: row.get(4)?,
                    error_message: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    async fn get_latest_run(&self, stack_id: &str) -> Result<Option<RunRecord>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM runs WHERE stack_id = ?1 ORDER BY started_at DESC LIMIT 1",
            RUN_COLUMNS
        );
        let result = conn
            .query_row(&sql, params![stack_id], run_from_row)
            .optional()?;
        Ok(result)
    }

    async fn list_runs(&self, stack_id: &str, limit: usize) -> Result<Vec<RunRecord>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM runs WHERE stack_id = ?1 ORDER BY started_at DESC LIMIT ?2",
            RUN_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![stack_id, limit as i64], run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

// ─── Helper functions ───────────────────────────────────────────────────────

fn stack_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Stack> {
    Ok(Stack {
        id: row.get(0)?,
        name: row.get(1)?,
        hash_salt: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn resource_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ResourceState> {
    let sensitive_json: String = row.get(11)?;
    let sensitive_paths: Vec<String> = serde_json::from_str(&sensitive_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(11, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(ResourceState {
        id: row.get(0)?,
        stack_id: row.get(1)?,
        address: row.get(2)?,
        kind_token: row.get(3)?,
        api_version: row.get(4)?,
        kind: row.get(5)?,
        object_name: row.get(6)?,
        namespace: row.get(7)?,
        status: row.get(8)?,
        manifest_json: row.get(9)?,
        manifest_hash: row.get(10)?,
        sensitive_paths,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

fn run_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        stack_id: row.get(1)?,
        started_at: row.get(2)?,
        completed_at: row.get(3)?,
        status: row.get(4)?,
        operation: row.get(5)?,
        resources_planned: row.get(6)?,
        resources_succeeded: row.get(7)?,
        resources_failed: row.get(8)?,
        error_message: row.get(9)?,
    })
}
