//! Blob Write/Read Path
//!
//! The blob side of the extent lifecycle. A put follows the protocol order
//! that keeps garbage collection safe:
//!
//! 1. append the content to the extent store (one descriptor per block)
//! 2. persist the descriptors in the blob catalog
//! 3. return to the caller
//!
//! Between 1 and 2 the extents are unreferenced; the collector's unmodified
//! window keeps them alive. Deletion goes the other way: the record (and
//! with it every reference) is removed, the caller is acknowledged, and the
//! bytes are reclaimed by a later sweep. There is no way to delete an
//! extent from here directly.

use crate::error::Result;
use crate::store::ExtentStore;
use breakwater_catalog::{BlobCatalog, BlobRecord};
use breakwater_core::now_ms;
use bytes::{Bytes, BytesMut};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Content larger than this is split into multiple extent appends, one
/// descriptor per block.
const BLOCK_BYTES: usize = 4 * 1024 * 1024;

pub struct BlobService {
    store: Arc<ExtentStore>,
    catalog: BlobCatalog,
}

impl BlobService {
    pub fn new(store: Arc<ExtentStore>, catalog: BlobCatalog) -> Self {
        Self { store, catalog }
    }

    /// Store a blob's content and record it under
    /// `account/container/name`. Overwrites an existing blob; the old
    /// version's extents become garbage.
    pub async fn put_blob(
        &self,
        account: &str,
        container: &str,
        name: &str,
        content: Bytes,
        cancel: &CancellationToken,
    ) -> Result<BlobRecord> {
        let mut parts = Vec::new();
        for block in content.chunks(BLOCK_BYTES) {
            parts.push(self.store.append(None, block, cancel).await?);
        }

        let record = BlobRecord {
            account: account.to_string(),
            container: container.to_string(),
            name: name.to_string(),
            content_length: content.len() as u64,
            parts,
            created_ms: now_ms(),
        };
        self.catalog.put_blob(&record).await?;

        tracing::debug!(
            account,
            container,
            name,
            content_length = record.content_length,
            blocks = record.parts.len(),
            "Blob stored"
        );

        Ok(record)
    }

    /// Read a blob's full content, or `None` if no such blob exists.
    pub async fn get_blob(
        &self,
        account: &str,
        container: &str,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Bytes>> {
        let Some(record) = self.catalog.get_blob(account, container, name).await? else {
            return Ok(None);
        };

        let mut content = BytesMut::with_capacity(record.content_length as usize);
        for part in &record.parts {
            content.extend_from_slice(&self.store.read(part, cancel).await?);
        }

        Ok(Some(content.freeze()))
    }

    /// Drop the blob record and its extent references. The bytes stay on
    /// disk until the garbage collector proves them unreferenced.
    pub async fn delete_blob(&self, account: &str, container: &str, name: &str) -> Result<()> {
        self.catalog.delete_blob(account, container, name).await?;
        Ok(())
    }
}
