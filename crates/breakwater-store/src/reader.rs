//! Extent Reader
//!
//! Resolves a descriptor through the catalog and streams the byte range
//! back. Reads run concurrently with writers: the writer pool advances an
//! extent's recorded size only after the bytes below it are flushed, so any
//! read inside the recorded size observes stable bytes.
//!
//! Failure modes are deliberate and distinct: a descriptor whose extent has
//! no catalog row is `ExtentNotFound` (the HTTP layer turns this into 404),
//! a descriptor reaching past the recorded size is `RangeExceeded` (a
//! corrupt descriptor - never retried), and a missing or unreadable file is
//! a plain `Io` error surfaced as-is. The startup path performs no
//! filesystem reconciliation, so a row whose file vanished is only
//! discovered here.

use crate::destination::DestinationSet;
use crate::error::{Error, Result};
use breakwater_catalog::ExtentCatalog;
use breakwater_core::ExtentDescriptor;
use bytes::Bytes;
use std::io::SeekFrom;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::sync::CancellationToken;

/// Reads descriptor ranges out of extent files.
pub struct ExtentReader {
    destinations: Arc<DestinationSet>,
    catalog: Arc<dyn ExtentCatalog>,
}

impl ExtentReader {
    pub fn new(destinations: Arc<DestinationSet>, catalog: Arc<dyn ExtentCatalog>) -> Self {
        Self {
            destinations,
            catalog,
        }
    }

    /// Read exactly `descriptor.count` bytes at `descriptor.offset`.
    pub async fn read(
        &self,
        descriptor: &ExtentDescriptor,
        cancel: &CancellationToken,
    ) -> Result<Bytes> {
        let record = self
            .catalog
            .get(&descriptor.extent_id)
            .await?
            .ok_or_else(|| Error::ExtentNotFound(descriptor.extent_id.clone()))?;

        if descriptor.end() > record.size {
            return Err(Error::RangeExceeded {
                extent_id: descriptor.extent_id.clone(),
                offset: descriptor.offset,
                count: descriptor.count,
                size: record.size,
            });
        }

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let path = self
            .destinations
            .resolve(&record.destination_id, &record.relative_path)?;

        let mut file = tokio::fs::File::open(&path).await?;
        file.seek(SeekFrom::Start(descriptor.offset)).await?;

        let mut buf = vec![0u8; descriptor.count as usize];
        file.read_exact(&mut buf).await?;

        Ok(Bytes::from(buf))
    }
}
