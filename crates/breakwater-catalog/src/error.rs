//! Catalog Error Types
//!
//! All catalog operations return `Result<T>` aliased to
//! `Result<T, CatalogError>`, so callers propagate failures with `?`.
//! Database and JSON failures convert automatically; `NotFound` exists for
//! the few operations whose contract requires the row to be present.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CatalogError>;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
