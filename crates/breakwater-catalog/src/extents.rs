//! SQLite Extent Metadata Catalog
//!
//! The durable mapping `extent id -> (destination, relative path, size,
//! last_modify_ms)`. This is the index the reader resolves descriptors
//! against and the set the garbage collector sweeps.
//!
//! ## Schema
//!
//! One table. The primary key on `id` serves point lookups; SQLite's
//! implicit rowid is the internal monotone sequence that paged listing and
//! its opaque marker ride on. Upserts go through `ON CONFLICT(id) DO
//! UPDATE`, which keeps the rowid stable, so an extent does not move within
//! a listing when its size is bumped by an append.
//!
//! ## Invariants
//!
//! - `(destination_id, relative_path)` is unique across live rows (enforced
//!   by a unique index).
//! - A row exists for every extent file the writer pool has created; the
//!   row is removed only by `delete`, which only the garbage collector and
//!   tests call.

use crate::db;
use crate::error::Result;
use crate::types::{ExtentFilter, ExtentPage, ExtentRecord};
use crate::{ExtentCatalog, DEFAULT_LIST_LIMIT};
use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::path::Path;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS extents (
        id TEXT PRIMARY KEY,
        destination_id TEXT NOT NULL,
        relative_path TEXT NOT NULL,
        size INTEGER NOT NULL,
        last_modify_ms INTEGER NOT NULL
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_extents_placement
        ON extents (destination_id, relative_path)",
    "CREATE INDEX IF NOT EXISTS idx_extents_last_modify
        ON extents (last_modify_ms)",
];

/// SQLite-backed implementation of [`ExtentCatalog`].
pub struct SqliteExtentCatalog {
    pool: SqlitePool,
}

impl SqliteExtentCatalog {
    /// Open (or create) the catalog at `path` and apply the schema.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let pool = db::open_file(path.as_ref()).await?;
        Self::setup(&pool).await?;

        tracing::info!(path = %path.as_ref().display(), "Extent catalog opened");

        Ok(Self { pool })
    }

    /// In-memory catalog (for testing).
    pub async fn open_in_memory() -> Result<Self> {
        let pool = db::open_memory().await?;
        Self::setup(&pool).await?;
        Ok(Self { pool })
    }

    async fn setup(pool: &SqlitePool) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(pool).await?;
        }
        Ok(())
    }

    fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<ExtentRecord> {
        Ok(ExtentRecord {
            id: row.try_get("id")?,
            destination_id: row.try_get("destination_id")?,
            relative_path: row.try_get("relative_path")?,
            size: row.try_get::<i64, _>("size")? as u64,
            last_modify_ms: row.try_get("last_modify_ms")?,
        })
    }
}

#[async_trait]
impl ExtentCatalog for SqliteExtentCatalog {
    async fn upsert(&self, record: &ExtentRecord) -> Result<()> {
        let size = record.size as i64;

        sqlx::query(
            r#"
            INSERT INTO extents (id, destination_id, relative_path, size, last_modify_ms)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                destination_id = excluded.destination_id,
                relative_path = excluded.relative_path,
                size = excluded.size,
                last_modify_ms = excluded.last_modify_ms
            "#,
        )
        .bind(&record.id)
        .bind(&record.destination_id)
        .bind(&record.relative_path)
        .bind(size)
        .bind(record.last_modify_ms)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<ExtentRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, destination_id, relative_path, size, last_modify_ms
            FROM extents
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::record_from_row).transpose()
    }

    async fn delete(&self, id: &str) -> Result<()> {
        // rows_affected deliberately ignored: delete is idempotent.
        sqlx::query("DELETE FROM extents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn list(
        &self,
        filter: &ExtentFilter,
        marker: Option<i64>,
        limit: Option<u32>,
    ) -> Result<ExtentPage> {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT);
        // Absent marker means "from the start", not a magic bound.
        let after = marker.unwrap_or(0);

        let rows = sqlx::query(
            r#"
            SELECT rowid AS seq, id, destination_id, relative_path, size, last_modify_ms
            FROM extents
            WHERE rowid > ?
              AND (? IS NULL OR id = ?)
              AND (? IS NULL OR last_modify_ms < ?)
            ORDER BY rowid
            LIMIT ?
            "#,
        )
        .bind(after)
        .bind(filter.id.as_deref())
        .bind(filter.id.as_deref())
        .bind(filter.modified_before_ms)
        .bind(filter.modified_before_ms)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let last_seq = rows.last().map(|r| r.try_get::<i64, _>("seq")).transpose()?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            records.push(Self::record_from_row(row)?);
        }

        let next_marker = if records.len() == limit as usize {
            last_seq
        } else {
            None
        };

        Ok(ExtentPage {
            records,
            next_marker,
        })
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}
