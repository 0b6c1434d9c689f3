//! Extent Store Facade
//!
//! `ExtentStore` is the component the rest of the emulator holds: it owns
//! the destination set, the writer pool, the reader, and the extent catalog
//! handle, and it enforces the init/close lifecycle around them.
//!
//! ## Lifecycle
//!
//! ```text
//! open/new ──▶ init ──▶ append/read … ──▶ close
//!                │                          │
//!            creates roots,           drains the pool,
//!            opens catalogs           closes the catalog
//! ```
//!
//! Operations before `init` fail with `NotInitialized`, after `close` with
//! `Closed`. Startup is O(catalog size), not O(files on disk): nothing
//! walks the destination roots. A catalog row whose file disappeared is
//! noticed by the first read that touches it and repaired by a later
//! garbage collection sweep.
//!
//! ## Usage
//!
//! ```ignore
//! use breakwater_store::{ExtentStore, StoreConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let store = ExtentStore::open(&StoreConfig::default()).await?;
//! store.init().await?;
//!
//! let cancel = CancellationToken::new();
//! let descriptor = store.append(None, b"Hello World", &cancel).await?;
//! let bytes = store.read(&descriptor, &cancel).await?;
//! ```

use crate::config::StoreConfig;
use crate::destination::DestinationSet;
use crate::error::{Error, Result};
use crate::pool::ExtentWriterPool;
use crate::reader::ExtentReader;
use breakwater_catalog::{ExtentCatalog, SqliteExtentCatalog};
use breakwater_core::ExtentDescriptor;
use bytes::Bytes;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const STATE_NEW: u8 = 0;
const STATE_INITIALIZED: u8 = 1;
const STATE_CLOSED: u8 = 2;

/// The durable byte store: append-only extents plus their catalog.
pub struct ExtentStore {
    destinations: Arc<DestinationSet>,
    catalog: Arc<dyn ExtentCatalog>,
    pool: Arc<ExtentWriterPool>,
    reader: ExtentReader,
    state: AtomicU8,
}

impl ExtentStore {
    /// Build a store over an already-open catalog handle. Tests use this
    /// with an in-memory catalog; `open` is the production path.
    pub fn new(config: &StoreConfig, catalog: Arc<dyn ExtentCatalog>) -> Result<Self> {
        let destinations = Arc::new(DestinationSet::new(&config.destinations)?);

        let pool = Arc::new(ExtentWriterPool::new(
            Arc::clone(&destinations),
            Arc::clone(&catalog),
            config.extent_rotation_bytes,
            config.append_chunk_bytes,
        ));
        let reader = ExtentReader::new(Arc::clone(&destinations), Arc::clone(&catalog));

        Ok(Self {
            destinations,
            catalog,
            pool,
            reader,
            state: AtomicU8::new(STATE_NEW),
        })
    }

    /// Open the SQLite extent catalog named by the config and build the
    /// store over it.
    pub async fn open(config: &StoreConfig) -> Result<Self> {
        if let Some(parent) = config.extent_catalog_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let catalog: Arc<dyn ExtentCatalog> =
            Arc::new(SqliteExtentCatalog::open(&config.extent_catalog_path).await?);

        Self::new(config, catalog)
    }

    /// Create destination roots and start accepting traffic.
    pub async fn init(&self) -> Result<()> {
        if self.state.load(Ordering::Acquire) == STATE_CLOSED {
            return Err(Error::Closed);
        }

        for destination in self.destinations.iter() {
            tokio::fs::create_dir_all(&destination.root_path).await?;
        }

        self.state.store(STATE_INITIALIZED, Ordering::Release);
        tracing::info!(
            destinations = self.destinations.len(),
            "Extent store initialized"
        );

        Ok(())
    }

    fn ensure_ready(&self) -> Result<()> {
        match self.state.load(Ordering::Acquire) {
            STATE_INITIALIZED => Ok(()),
            STATE_CLOSED => Err(Error::Closed),
            _ => Err(Error::NotInitialized),
        }
    }

    /// Append `payload` and return the descriptor of the written range.
    /// `destination_id` pins the write to one destination; `None` spreads
    /// writes round-robin.
    pub async fn append(
        &self,
        destination_id: Option<&str>,
        payload: &[u8],
        cancel: &CancellationToken,
    ) -> Result<ExtentDescriptor> {
        self.ensure_ready()?;
        self.pool.append(destination_id, payload, cancel).await
    }

    /// Read back exactly the range a descriptor names.
    pub async fn read(
        &self,
        descriptor: &ExtentDescriptor,
        cancel: &CancellationToken,
    ) -> Result<Bytes> {
        self.ensure_ready()?;
        self.reader.read(descriptor, cancel).await
    }

    /// Flush and close every open extent, then the catalog. Idempotent;
    /// all later operations fail with `Closed`.
    pub async fn close(&self) -> Result<()> {
        let previous = self.state.swap(STATE_CLOSED, Ordering::AcqRel);
        if previous == STATE_CLOSED {
            return Ok(());
        }

        self.pool.close().await?;
        self.catalog.close().await?;
        tracing::info!("Extent store closed");

        Ok(())
    }

    /// Handle to the extent catalog (shared with the garbage collector).
    pub fn catalog(&self) -> Arc<dyn ExtentCatalog> {
        Arc::clone(&self.catalog)
    }

    /// Handle to the writer pool, for spawning the idle-eviction loop.
    pub fn writer_pool(&self) -> Arc<ExtentWriterPool> {
        Arc::clone(&self.pool)
    }

    /// The configured destination set.
    pub fn destinations(&self) -> Arc<DestinationSet> {
        Arc::clone(&self.destinations)
    }
}
