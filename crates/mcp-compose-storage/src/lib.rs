//! mcp-compose Storage Layer
//!
//! SQLite persistence for the activity log. The file location defaults to
//! the user data directory and can be overridden with `MCP_ACTIVITY_DB` or
//! `[activity].database` in the manifest.

mod database;
pub mod repositories;

pub use database::Database;
pub use repositories::SqliteActivityStore;

use std::path::PathBuf;
use std::sync::Arc;

/// Default database location: `<data dir>/mcp-compose/activity.db`.
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mcp-compose")
        .join("activity.db")
}

/// Open the database at `path` (or the default) and wrap it in a store.
pub fn open_activity_store(path: Option<&std::path::Path>) -> anyhow::Result<SqliteActivityStore> {
    let path = path.map(PathBuf::from).unwrap_or_else(default_database_path);
    let db = Database::open(&path)?;
    tracing::info!("[Storage] Activity store ready at {:?}", path);
    Ok(SqliteActivityStore::new(Arc::new(tokio::sync::Mutex::new(db))))
}
