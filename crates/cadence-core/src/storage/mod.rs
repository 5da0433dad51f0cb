mod backend;
mod sqlite;

pub use backend::StorageBackend;
pub use sqlite::SqliteStorage;

use crate::config::CadenceConfig;
use crate::error::Result;

/// Open the configured SQLite database, creating its directory if needed.
pub fn create_backend(config: &CadenceConfig) -> Result<SqliteStorage> {
    let path = config.database_path()?;
    tracing::debug!(path = %path.display(), "opening habit store");
    SqliteStorage::open(&path)
}
