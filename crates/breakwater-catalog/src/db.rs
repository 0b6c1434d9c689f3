//! Shared SQLite pool setup.
//!
//! Catalog mutations must be serialized (one logical writer at a time), so
//! every catalog runs on a single-connection pool. SQLite itself is the
//! second line of defense via its file lock.

use crate::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Open (creating if missing) a database file.
pub(crate) async fn open_file(path: &Path) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))?
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Open an in-memory database (tests). The single connection is the
/// database; more connections would each see their own empty one.
pub(crate) async fn open_memory() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    Ok(pool)
}
