//! Blob and Queue Metadata Catalogs
//!
//! The higher-level entities that reference extents. Both catalogs share
//! one SQLite file (`MetadataDb`); each is a thin handle over the pool and
//! can be cloned freely.
//!
//! ## Reference protocol
//!
//! These catalogs are the "E" side of the extent lifecycle: a writer first
//! appends bytes to the extent store, then persists the returned descriptor
//! here, then acknowledges the client. A deleter removes the row (dropping
//! its references) and lets the garbage collector reclaim the extents
//! later. Neither catalog can delete an extent directly.
//!
//! The only thing the extent store asks of this layer is
//! [`ExtentReferences`]: a paged enumeration of every extent id a live
//! record embeds. Descriptor lists are stored as JSON columns and decoded
//! during that walk; SQLite never queries inside them.

use crate::db;
use crate::error::Result;
use crate::types::{BlobRecord, IdPage, QueueMessageRecord};
use crate::ExtentReferences;
use async_trait::async_trait;
use breakwater_core::ExtentDescriptor;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::path::Path;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS blobs (
        account TEXT NOT NULL,
        container TEXT NOT NULL,
        name TEXT NOT NULL,
        content_length INTEGER NOT NULL,
        parts TEXT NOT NULL,
        created_ms INTEGER NOT NULL,
        PRIMARY KEY (account, container, name)
    )",
    "CREATE TABLE IF NOT EXISTS queue_messages (
        account TEXT NOT NULL,
        queue TEXT NOT NULL,
        message_id TEXT NOT NULL,
        inserted_ms INTEGER NOT NULL,
        text_length INTEGER NOT NULL,
        part TEXT NOT NULL,
        PRIMARY KEY (account, queue, message_id)
    )",
    "CREATE INDEX IF NOT EXISTS idx_queue_messages_queue
        ON queue_messages (account, queue)",
    "CREATE TABLE IF NOT EXISTS service_properties (
        account TEXT PRIMARY KEY,
        document TEXT NOT NULL
    )",
];

/// The shared metadata database holding blobs, queue messages, and service
/// properties. Open once, then hand out per-catalog handles.
pub struct MetadataDb {
    pool: SqlitePool,
}

impl MetadataDb {
    /// Open (or create) the metadata database at `path`.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let pool = db::open_file(path.as_ref()).await?;
        Self::setup(&pool).await?;

        tracing::info!(path = %path.as_ref().display(), "Metadata database opened");

        Ok(Self { pool })
    }

    /// In-memory database (for testing).
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

    pub fn blobs(&self) -> BlobCatalog {
        BlobCatalog {
            pool: self.pool.clone(),
        }
    }

    pub fn queues(&self) -> QueueCatalog {
        QueueCatalog {
            pool: self.pool.clone(),
        }
    }

    pub(crate) fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    pub async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// Catalog of stored blobs.
#[derive(Clone)]
pub struct BlobCatalog {
    pool: SqlitePool,
}

impl BlobCatalog {
    /// Insert or replace a blob record. Replacing drops the previous
    /// version's extent references; the old bytes become garbage.
    pub async fn put_blob(&self, record: &BlobRecord) -> Result<()> {
        let parts = serde_json::to_string(&record.parts)?;
        let content_length = record.content_length as i64;

        sqlx::query(
            r#"
            INSERT INTO blobs (account, container, name, content_length, parts, created_ms)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(account, container, name) DO UPDATE SET
                content_length = excluded.content_length,
                parts = excluded.parts,
                created_ms = excluded.created_ms
            "#,
        )
        .bind(&record.account)
        .bind(&record.container)
        .bind(&record.name)
        .bind(content_length)
        .bind(parts)
        .bind(record.created_ms)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_blob(
        &self,
        account: &str,
        container: &str,
        name: &str,
    ) -> Result<Option<BlobRecord>> {
        let row = sqlx::query(
            r#"
            SELECT account, container, name, content_length, parts, created_ms
            FROM blobs
            WHERE account = ? AND container = ? AND name = ?
            "#,
        )
        .bind(account)
        .bind(container)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let parts: Vec<ExtentDescriptor> = serde_json::from_str(row.try_get("parts")?)?;

        Ok(Some(BlobRecord {
            account: row.try_get("account")?,
            container: row.try_get("container")?,
            name: row.try_get("name")?,
            content_length: row.try_get::<i64, _>("content_length")? as u64,
            parts,
            created_ms: row.try_get("created_ms")?,
        }))
    }

    /// Remove a blob, dropping its extent references. Idempotent.
    pub async fn delete_blob(&self, account: &str, container: &str, name: &str) -> Result<()> {
        sqlx::query("DELETE FROM blobs WHERE account = ? AND container = ? AND name = ?")
            .bind(account)
            .bind(container)
            .bind(name)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl ExtentReferences for BlobCatalog {
    async fn referenced_extent_ids(&self, marker: Option<i64>, limit: u32) -> Result<IdPage> {
        let after = marker.unwrap_or(0);

        let rows = sqlx::query("SELECT rowid AS seq, parts FROM blobs WHERE rowid > ? ORDER BY rowid LIMIT ?")
            .bind(after)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        let full = rows.len() == limit as usize;
        let last_seq = rows.last().map(|r| r.try_get::<i64, _>("seq")).transpose()?;

        let mut ids = Vec::new();
        for row in &rows {
            let parts: Vec<ExtentDescriptor> = serde_json::from_str(row.try_get("parts")?)?;
            ids.extend(parts.into_iter().map(|d| d.extent_id));
        }

        Ok(IdPage {
            ids,
            next_marker: if full { last_seq } else { None },
        })
    }
}

/// Catalog of stored queue messages.
#[derive(Clone)]
pub struct QueueCatalog {
    pool: SqlitePool,
}

impl QueueCatalog {
    pub async fn put_message(&self, record: &QueueMessageRecord) -> Result<()> {
        let part = serde_json::to_string(&record.part)?;
        let text_length = record.text_length as i64;

        sqlx::query(
            r#"
            INSERT INTO queue_messages (account, queue, message_id, inserted_ms, text_length, part)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.account)
        .bind(&record.queue)
        .bind(&record.message_id)
        .bind(record.inserted_ms)
        .bind(text_length)
        .bind(part)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Return up to `count` messages in insertion order without removing
    /// them.
    pub async fn peek_messages(
        &self,
        account: &str,
        queue: &str,
        count: u32,
    ) -> Result<Vec<QueueMessageRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT account, queue, message_id, inserted_ms, text_length, part
            FROM queue_messages
            WHERE account = ? AND queue = ?
            ORDER BY rowid
            LIMIT ?
            "#,
        )
        .bind(account)
        .bind(queue)
        .bind(count as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            let part: ExtentDescriptor = serde_json::from_str(row.try_get("part")?)?;
            messages.push(QueueMessageRecord {
                account: row.try_get("account")?,
                queue: row.try_get("queue")?,
                message_id: row.try_get("message_id")?,
                inserted_ms: row.try_get("inserted_ms")?,
                text_length: row.try_get::<i64, _>("text_length")? as u64,
                part,
            });
        }

        Ok(messages)
    }

    /// Remove a message, dropping its extent reference. Idempotent.
    pub async fn delete_message(&self, account: &str, queue: &str, message_id: &str) -> Result<()> {
        sqlx::query(
            "DELETE FROM queue_messages WHERE account = ? AND queue = ? AND message_id = ?",
        )
        .bind(account)
        .bind(queue)
        .bind(message_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ExtentReferences for QueueCatalog {
    async fn referenced_extent_ids(&self, marker: Option<i64>, limit: u32) -> Result<IdPage> {
        let after = marker.unwrap_or(0);

        let rows = sqlx::query(
            "SELECT rowid AS seq, part FROM queue_messages WHERE rowid > ? ORDER BY rowid LIMIT ?",
        )
        .bind(after)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let full = rows.len() == limit as usize;
        let last_seq = rows.last().map(|r| r.try_get::<i64, _>("seq")).transpose()?;

        let mut ids = Vec::with_capacity(rows.len());
        for row in &rows {
            let part: ExtentDescriptor = serde_json::from_str(row.try_get("part")?)?;
            ids.push(part.extent_id);
        }

        Ok(IdPage {
            ids,
            next_marker: if full { last_seq } else { None },
        })
    }
}
