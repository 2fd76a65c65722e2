pub mod backend;
pub mod lock;
pub mod migration;
pub mod models;
pub mod schema;
pub mod sqlite;

pub use backend::StateBackend;
pub use lock::FileLock;
pub use sqlite::SqliteBackend;

/// Name of the state database inside the working directory.
pub const STATE_DB: &str = "pgstack.db";
