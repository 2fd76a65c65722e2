/// SQL DDL for the pgstack state database.
///
/// One row per managed object, keyed by stack and address. Manifests are
/// stored redacted; a salted hash of the unredacted manifest is what change
/// detection compares against.

pub const SCHEMA_VERSION: i32 = 2;

pub const CREATE_TABLES_SQL: &str = "
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL,
    description TEXT
);

-- Stacks (dev, prod, ...)
CREATE TABLE IF NOT EXISTS stacks (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Managed cluster objects
CREATE TABLE IF NOT EXISTS resources (
    id TEXT PRIMARY KEY,
    stack_id TEXT NOT NULL,
    address TEXT NOT NULL,
    kind_token TEXT NOT NULL,
    api_version TEXT NOT NULL,
    kind TEXT NOT NULL,
    object_name TEXT NOT NULL,
    namespace TEXT,
    status TEXT NOT NULL DEFAULT 'planned',
    manifest_json TEXT NOT NULL DEFAULT '{}',
    manifest_hash TEXT NOT NULL DEFAULT '',
    sensitive_paths TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(stack_id, address),
    FOREIGN KEY (stack_id) REFERENCES stacks(id) ON DELETE CASCADE
);

-- Resource dependencies (DAG edges)
CREATE TABLE IF NOT EXISTS resource_dependencies (
    resource_id TEXT NOT NULL,
    depends_on_id TEXT NOT NULL,
    dependency_type TEXT NOT NULL DEFAULT 'explicit',
    PRIMARY KEY (resource_id, depends_on_id),
    FOREIGN KEY (resource_id) REFERENCES resources(id) ON DELETE CASCADE,
    FOREIGN KEY (depends_on_id) REFERENCES resources(id) ON DELETE CASCADE
);

-- Execution runs
CREATE TABLE IF NOT EXISTS runs (
    id TEXT PRIMARY KEY,
    stack_id TEXT NOT NULL,
    started_at TEXT NOT NULL,
    completed_at TEXT,
    status TEXT NOT NULL DEFAULT 'running',
    operation TEXT NOT NULL,
    resources_planned INTEGER DEFAULT 0,
    resources_succeeded INTEGER DEFAULT 0,
    resources_failed INTEGER DEFAULT 0,
    error_message TEXT,
    FOREIGN KEY (stack_id) REFERENCES stacks(id) ON DELETE CASCADE
);

-- Per-resource results within a run
CREATE TABLE IF NOT EXISTS run_resources (
    run_id TEXT NOT NULL,
    resource_address TEXT NOT NULL,
    action TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    started_at TEXT,
    completed_at TEXT,
    error_message TEXT,
    PRIMARY KEY (run_id, resource_address),
    FOREIGN KEY (run_id) REFERENCES runs(id) ON DELETE CASCADE
);
";

/// Version 2: per-stack salt mixed into every manifest hash. Stacks that
/// predate it get a fresh random salt.
pub const ADD_HASH_SALT_SQL: &str = "
ALTER TABLE stacks ADD COLUMN hash_salt TEXT NOT NULL DEFAULT '';
UPDATE stacks SET hash_salt = lower(hex(randomblob(32))) WHERE hash_salt = '';
";

pub const CREATE_INDEXES_SQL: &str = "
CREATE INDEX IF NOT EXISTS idx_resources_stack ON resources(stack_id);
CREATE INDEX IF NOT EXISTS idx_resources_kind ON resources(kind_token);
CREATE INDEX IF NOT EXISTS idx_resources_status ON resources(status);
CREATE INDEX IF NOT EXISTS idx_resource_deps_depends ON resource_dependencies(depends_on_id);
CREATE INDEX IF NOT EXISTS idx_runs_stack ON runs(stack_id);
CREATE INDEX IF NOT EXISTS idx_run_resources_run ON run_resources(run_id);
";
