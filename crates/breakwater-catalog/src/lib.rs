//! Breakwater Metadata Catalogs
//!
//! This crate implements the durable indexes of the emulator - everything
//! that knows *where bytes live* without holding the bytes themselves.
//!
//! ## Purpose
//!
//! While extent files hold raw payload bytes on disk, the catalogs track:
//! - **Extents**: which file holds each extent, its size, and when it was
//!   last appended to (the extent metadata catalog)
//! - **Blobs / queue messages**: the logical entities clients see, each
//!   embedding the extent descriptors that name its bytes
//! - **Service properties**: the per-account settings document
//! - **Accounts**: provisioned account names and keys
//!
//! ## Why SQLite?
//!
//! The emulator is single-node and embeds its state next to the extent
//! files. SQLite gives it ACID durability with zero configuration, a real
//! unique index on the extent id for point lookups, and the implicit rowid
//! as a monotone sequence for paged listing - exactly the two indexes the
//! catalog contract needs.
//!
//! ## Crash behavior
//!
//! Every mutation commits before the call returns, so an acknowledged
//! catalog change survives a process crash. Startup reopens the database
//! files and re-runs the idempotent schema setup; no filesystem scan is
//! performed. An extent row whose file went missing is discovered lazily by
//! a failing read and reclaimed by a later garbage collection sweep.
//!
//! ## Usage
//!
//! ```ignore
//! use breakwater_catalog::{ExtentCatalog, SqliteExtentCatalog};
//!
//! let catalog = SqliteExtentCatalog::open("data/extents.sqlite").await?;
//! catalog.upsert(&record).await?;
//! let page = catalog.list(&Default::default(), None, None).await?;
//! ```

pub mod accounts;
mod db;
pub mod error;
pub mod extents;
pub mod metadata;
pub mod properties;
pub mod types;

pub use accounts::AccountStore;
pub use error::{CatalogError, Result};
pub use extents::SqliteExtentCatalog;
pub use metadata::{BlobCatalog, MetadataDb, QueueCatalog};
pub use properties::ServicePropertiesStore;
pub use types::*;

use async_trait::async_trait;

/// Default page size for `list` when the caller does not supply one.
pub const DEFAULT_LIST_LIMIT: u32 = 5000;

/// The extent metadata catalog: a durable map from extent id to placement.
///
/// Implementations must serialize mutations (one logical writer at a time)
/// and make every change visible to in-process readers as soon as the call
/// returns. All implementations are shared as `Arc<dyn ExtentCatalog>`.
#[async_trait]
pub trait ExtentCatalog: Send + Sync {
    /// Insert the record, or update `size`, `last_modify_ms`,
    /// `destination_id`, and `relative_path` if the id already exists.
    ///
    /// Updates keep the record's internal sequence number, so a re-written
    /// extent does not move within a paged listing.
    async fn upsert(&self, record: &ExtentRecord) -> Result<()>;

    /// Point lookup by extent id. `Ok(None)` when absent.
    async fn get(&self, id: &str) -> Result<Option<ExtentRecord>>;

    /// Remove the record. Idempotent: deleting an absent id succeeds.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Paged enumeration in internal-sequence order.
    ///
    /// # Arguments
    ///
    /// * `filter` - optional exact id and optional strict upper bound on
    ///   `last_modify_ms`
    /// * `marker` - resume point from a previous page's `next_marker`;
    ///   `None` starts from the beginning
    /// * `limit` - page size, defaulting to [`DEFAULT_LIST_LIMIT`]
    ///
    /// # Returns
    ///
    /// The matching page. `next_marker` is present iff the page is full, in
    /// which case it is the sequence of the last returned record. Records
    /// inserted behind the marker during iteration are not revisited;
    /// iteration is restartable from the beginning only.
    async fn list(
        &self,
        filter: &ExtentFilter,
        marker: Option<i64>,
        limit: Option<u32>,
    ) -> Result<ExtentPage>;

    /// Flush and close the backing store. Further calls fail.
    async fn close(&self) -> Result<()>;
}

/// The one coupling the garbage collector needs from higher-level catalogs:
/// a lazy, paged enumeration of every extent id their live records
/// reference.
///
/// The store never learns *which* blob or message references an extent,
/// only that a reference exists.
#[async_trait]
pub trait ExtentReferences: Send + Sync {
    /// Return one page of referenced extent ids. Ids may repeat across
    /// pages; callers accumulate into a set. `None` marker starts from the
    /// beginning; a `None` `next_marker` ends the enumeration.
    async fn referenced_extent_ids(&self, marker: Option<i64>, limit: u32) -> Result<IdPage>;
}
