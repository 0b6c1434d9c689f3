//! Extent Writer Pool
//!
//! Manages the bounded set of currently-open append files and routes every
//! incoming payload into one of them.
//!
//! ## How a destination's budget works
//!
//! Each destination owns a semaphore sized to its `max_concurrency` and a
//! list of idle open files. An append acquires a permit (waiting if the
//! whole budget is busy), then pops an idle file or - when none is idle -
//! creates a fresh extent: a new uuid, a new file under the destination
//! root named by that uuid, and a catalog row with size 0. Files are only
//! ever created while holding a permit with the idle list empty, so the
//! number of open files in a destination never exceeds its budget.
//!
//! ## Ordering
//!
//! A popped file is owned exclusively until the append finishes, so appends
//! to the same extent are serialized and the returned offset is simply the
//! pre-append size. Appends to different extents proceed in parallel within
//! each destination's budget.
//!
//! ## Failure handling
//!
//! A write error or a fired abort token evicts the current extent from the
//! pool and surfaces the error. The catalog row is *not* rolled back: bytes
//! that were already appended and flushed stay valid, the row's size
//! reflects them, and other records may keep referencing the extent.
//!
//! ## Rotation
//!
//! An append that pushes the file to the rotation threshold syncs and
//! closes it; so does the idle-eviction loop for files that have not seen
//! an append in a while. A rotated extent is immutable; later appends open
//! new extents.

use crate::destination::{Destination, DestinationSet};
use crate::error::{Error, Result};
use breakwater_catalog::{ExtentCatalog, ExtentRecord};
use breakwater_core::{now_ms, ExtentDescriptor};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// An open append file, owned exclusively by whichever append popped it.
struct OpenExtent {
    id: String,
    destination_id: String,
    relative_path: String,
    file: tokio::fs::File,

    /// Bytes proven durable at the head of the file. Advanced only after a
    /// successful flush, so any concurrent read below this size is stable.
    size: u64,

    /// When the extent last finished an append; idle eviction keys off it.
    last_used_ms: i64,
}

struct DestinationSlots {
    semaphore: Semaphore,
    idle: Mutex<Vec<OpenExtent>>,
}

/// Bounded pool of open extent files across all destinations.
pub struct ExtentWriterPool {
    destinations: Arc<DestinationSet>,
    catalog: Arc<dyn ExtentCatalog>,
    slots: HashMap<String, DestinationSlots>,
    rotation_bytes: u64,
    chunk_bytes: usize,
}

impl ExtentWriterPool {
    pub fn new(
        destinations: Arc<DestinationSet>,
        catalog: Arc<dyn ExtentCatalog>,
        rotation_bytes: u64,
        chunk_bytes: usize,
    ) -> Self {
        let slots = destinations
            .iter()
            .map(|destination| {
                (
                    destination.id.clone(),
                    DestinationSlots {
                        semaphore: Semaphore::new(destination.max_concurrency as usize),
                        idle: Mutex::new(Vec::new()),
                    },
                )
            })
            .collect();

        Self {
            destinations,
            catalog,
            slots,
            rotation_bytes,
            chunk_bytes: chunk_bytes.max(1),
        }
    }

    /// Append `payload` to some extent of `destination_id` (round-robin over
    /// all destinations when `None`) and return the descriptor of the
    /// written range.
    pub async fn append(
        &self,
        destination_id: Option<&str>,
        payload: &[u8],
        cancel: &CancellationToken,
    ) -> Result<ExtentDescriptor> {
        let destination = match destination_id {
            Some(id) => self.destinations.get(id)?,
            None => self.destinations.next(),
        };
        let slots = self
            .slots
            .get(&destination.id)
            .ok_or_else(|| Error::UnknownDestination(destination.id.clone()))?;

        let _permit = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            permit = slots.semaphore.acquire() => permit.map_err(|_| Error::Closed)?,
        };

        // The idle-list guard must not be held across extent creation.
        let popped = slots.idle.lock().await.pop();
        let mut extent = match popped {
            Some(extent) => extent,
            None => self.create_extent(destination).await?,
        };

        let offset = extent.size;
        let (appended, failure) = Self::write_chunks(
            &mut extent.file,
            payload,
            self.chunk_bytes,
            cancel,
        )
        .await;
        extent.size += appended;

        // The row tracks whatever actually landed, whether or not the append
        // as a whole succeeded.
        let upserted = self
            .catalog
            .upsert(&ExtentRecord {
                id: extent.id.clone(),
                destination_id: extent.destination_id.clone(),
                relative_path: extent.relative_path.clone(),
                size: extent.size,
                last_modify_ms: now_ms(),
            })
            .await;

        if let Some(error) = failure {
            tracing::warn!(
                extent = %extent.id,
                appended,
                error = %error,
                "Append failed; evicting extent"
            );
            if let Err(catalog_error) = upserted {
                tracing::warn!(
                    extent = %extent.id,
                    error = %catalog_error,
                    "Catalog update failed while evicting extent"
                );
            }
            // `extent` drops here without rejoining the idle list.
            return Err(error);
        }
        if let Err(catalog_error) = upserted {
            tracing::warn!(
                extent = %extent.id,
                error = %catalog_error,
                "Catalog update failed; evicting extent"
            );
            return Err(catalog_error.into());
        }

        let descriptor = ExtentDescriptor::new(extent.id.clone(), offset, payload.len() as u64);

        if extent.size >= self.rotation_bytes {
            tracing::debug!(extent = %extent.id, size = extent.size, "Rotating extent");
            if let Err(error) = extent.file.sync_all().await {
                tracing::warn!(extent = %extent.id, error = %error, "Sync failed during rotation");
            }
        } else {
            extent.last_used_ms = now_ms();
            slots.idle.lock().await.push(extent);
        }

        Ok(descriptor)
    }

    /// Sync and close idle files untouched for `idle_timeout`, as measured
    /// against `now_ms`. Returns how many were evicted.
    pub async fn evict_idle(&self, now_ms: i64, idle_timeout: Duration) -> usize {
        let cutoff = now_ms - idle_timeout.as_millis() as i64;
        let mut evicted = 0;

        for slots in self.slots.values() {
            let mut idle = slots.idle.lock().await;
            let mut kept = Vec::with_capacity(idle.len());
            for extent in idle.drain(..) {
                if extent.last_used_ms < cutoff {
                    if let Err(error) = extent.file.sync_all().await {
                        tracing::warn!(
                            extent = %extent.id,
                            error = %error,
                            "Sync failed during idle eviction"
                        );
                    }
                    evicted += 1;
                } else {
                    kept.push(extent);
                }
            }
            *idle = kept;
        }

        if evicted > 0 {
            tracing::debug!(evicted, "Evicted idle extents");
        }
        evicted
    }

    /// Spawn the idle-eviction loop: every `interval`, close files that
    /// have not appended for `idle_timeout`.
    pub fn start_idle_eviction(
        self: Arc<Self>,
        interval: Duration,
        idle_timeout: Duration,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                self.evict_idle(now_ms(), idle_timeout).await;
            }
        })
    }

    /// Write in chunks, observing the abort token between chunks. Returns
    /// the number of bytes proven durable plus the failure, if any. Only a
    /// successful flush proves bytes durable; a failed flush proves nothing
    /// from this call.
    async fn write_chunks(
        file: &mut tokio::fs::File,
        payload: &[u8],
        chunk_bytes: usize,
        cancel: &CancellationToken,
    ) -> (u64, Option<Error>) {
        let mut written: u64 = 0;
        let mut failure: Option<Error> = None;

        for chunk in payload.chunks(chunk_bytes) {
            if cancel.is_cancelled() {
                failure = Some(Error::Cancelled);
                break;
            }
            match file.write_all(chunk).await {
                Ok(()) => written += chunk.len() as u64,
                Err(error) => {
                    failure = Some(error.into());
                    break;
                }
            }
        }

        match file.flush().await {
            Ok(()) => (written, failure),
            Err(error) => (0, failure.or(Some(error.into()))),
        }
    }

    async fn create_extent(&self, destination: &Destination) -> Result<OpenExtent> {
        let id = Uuid::new_v4().to_string();
        let path = destination.root_path.join(&id);

        let file = OpenOptions::new()
            .append(true)
            .create_new(true)
            .open(&path)
            .await?;

        let record = ExtentRecord {
            id: id.clone(),
            destination_id: destination.id.clone(),
            relative_path: id.clone(),
            size: 0,
            last_modify_ms: now_ms(),
        };
        if let Err(error) = self.catalog.upsert(&record).await {
            // Without a row the file would never be swept; clean it up now.
            let _ = tokio::fs::remove_file(&path).await;
            return Err(error.into());
        }

        tracing::debug!(
            extent = %id,
            destination = %destination.id,
            path = %path.display(),
            "Created extent"
        );

        Ok(OpenExtent {
            id: id.clone(),
            destination_id: destination.id.clone(),
            relative_path: id,
            file,
            size: 0,
            last_used_ms: now_ms(),
        })
    }

    /// Drain every destination's budget, then sync and close all open
    /// files. In-flight appends finish first; the caller prevents new ones.
    pub async fn close(&self) -> Result<()> {
        for destination in self.destinations.iter() {
            let Some(slots) = self.slots.get(&destination.id) else {
                continue;
            };

            let _drain = slots
                .semaphore
                .acquire_many(destination.max_concurrency)
                .await
                .map_err(|_| Error::Closed)?;

            let mut idle = slots.idle.lock().await;
            for extent in idle.drain(..) {
                if let Err(error) = extent.file.sync_all().await {
                    tracing::warn!(
                        extent = %extent.id,
                        error = %error,
                        "Sync failed while closing pool"
                    );
                }
            }
        }

        tracing::info!("Extent writer pool closed");
        Ok(())
    }
}
