use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};

use super::schema;

/// Bring a state database up to the current schema version.
pub fn check_and_migrate(conn: &Connection) -> Result<()> {
    let table_exists = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type='table' AND name='schema_version'",
            [],
            |row| row.get::<_, String>(0),
        )
        .optional()?
        .is_some();

    let current_version: i32 = if table_exists {
        conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )?
    } else {
        0
    };

    if current_version > schema::SCHEMA_VERSION {
        anyhow::bail!(
            "State database is at schema version {}, newer than this binary supports ({})",
            current_version,
            schema::SCHEMA_VERSION
        );
    }

    apply_migrations(conn, current_version)
}

fn apply_migrations(conn: &Connection, from_version: i32) -> Result<()> {
    let now = chrono::Utc::now().to_rfc3339();

    if from_version < 1 {
        conn.execute_batch(schema::CREATE_TABLES_SQL)
            .context("Failed to create state tables")?;
        conn.execute_batch(schema::CREATE_INDEXES_SQL)
            .context("Failed to create state indexes")?;
        conn.execute(
            "INSERT OR REPLACE INTO schema_version (version, applied_at, description) VALUES (?1, ?2, ?3)",
            rusqlite::params![1, now, "Initial schema"],
        )?;
    }

    if from_version < 2 {
        conn.execute_batch(schema::ADD_HASH_SALT_SQL)
            .context("Failed to add stack hash salt")?;
        conn.execute(
            "INSERT OR REPLACE INTO schema_version (version, applied_at, description) VALUES (?1, ?2, ?3)",
            rusqlite::params![2, now, "Per-stack hash salt"],
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_fresh_and_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        check_and_migrate(&conn).unwrap();
        check_and_migrate(&conn).unwrap();

        let version: i32 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, schema::SCHEMA_VERSION);
    }

    #[test]
    fn test_existing_stacks_get_a_salt() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(schema::CREATE_TABLES_SQL).unwrap();
        conn.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (1, 'earlier')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO stacks (id, name, created_at, updated_at) VALUES ('s1', 'dev', 'then', 'then')",
            [],
        )
        .unwrap();

        check_and_migrate(&conn).unwrap();

        let salt: String = conn
            .query_row("SELECT hash_salt FROM stacks WHERE id = 's1'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(salt.len(), 64);
    }

    #[test]
    fn test_newer_schema_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        check_and_migrate(&conn).unwrap();
        conn.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (99, 'later')",
            [],
        )
        .unwrap();
        assert!(check_and_migrate(&conn).is_err());
    }
}
