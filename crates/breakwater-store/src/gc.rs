//! Extent Garbage Collector
//!
//! Periodic sweep that reclaims extents no live record references.
//!
//! ## One sweep
//!
//! 1. Snapshot the referenced set: every registered reference source (the
//!    blob and queue catalogs) enumerates the extent ids its live records
//!    embed, in pages, into one in-memory set.
//! 2. Page through the extent catalog, pre-filtered to rows whose
//!    `last_modify_ms` is older than `now - unmodified_window`.
//! 3. Every candidate absent from the referenced set loses its file first
//!    (a missing file counts as deleted) and its catalog row second.
//!
//! ## The window fence
//!
//! A writer appends, *then* stores the descriptor, *then* acknowledges. In
//! the gap the extent is unreferenced but must survive; the unmodified
//! window guarantees it does, because a freshly appended extent cannot be
//! old enough to qualify. An orphan left by a crash inside the gap is
//! reclaimed by a later sweep once the window elapses - disk is the cost,
//! never data.
//!
//! A sweep that fires while the previous one is still running is dropped.

use crate::destination::DestinationSet;
use crate::error::Result;
use breakwater_catalog::{ExtentCatalog, ExtentFilter, ExtentReferences};
use breakwater_core::now_ms;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{self, MissedTickBehavior};

/// Counters for a single sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepStats {
    /// Catalog rows old enough to be considered.
    pub scanned: u64,

    /// Extents actually reclaimed (file and row gone).
    pub deleted: u64,

    /// Sum of the reclaimed extents' recorded sizes.
    pub bytes_reclaimed: u64,
}

/// Cumulative counters across all sweeps, for monitoring.
#[derive(Debug, Default)]
pub struct GcTotals {
    scanned: AtomicU64,
    deleted: AtomicU64,
    bytes_reclaimed: AtomicU64,
}

impl GcTotals {
    fn record(&self, stats: &SweepStats) {
        self.scanned.fetch_add(stats.scanned, Ordering::Relaxed);
        self.deleted.fetch_add(stats.deleted, Ordering::Relaxed);
        self.bytes_reclaimed
            .fetch_add(stats.bytes_reclaimed, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SweepStats {
        SweepStats {
            scanned: self.scanned.load(Ordering::Relaxed),
            deleted: self.deleted.load(Ordering::Relaxed),
            bytes_reclaimed: self.bytes_reclaimed.load(Ordering::Relaxed),
        }
    }
}

/// The garbage collector. Construct once, then either call
/// [`ExtentGc::sweep`] on demand or spawn the interval loop with
/// [`ExtentGc::start`].
pub struct ExtentGc {
    catalog: Arc<dyn ExtentCatalog>,
    destinations: Arc<DestinationSet>,
    references: Vec<Arc<dyn ExtentReferences>>,
    unmodified_window: Duration,
    page_size: u32,
    sweeping: Mutex<()>,
    totals: GcTotals,
}

impl ExtentGc {
    pub fn new(
        catalog: Arc<dyn ExtentCatalog>,
        destinations: Arc<DestinationSet>,
        references: Vec<Arc<dyn ExtentReferences>>,
        unmodified_window: Duration,
        page_size: u32,
    ) -> Self {
        Self {
            catalog,
            destinations,
            references,
            unmodified_window,
            page_size,
            sweeping: Mutex::new(()),
            totals: GcTotals::default(),
        }
    }

    /// Cumulative counters across every sweep so far.
    pub fn totals(&self) -> SweepStats {
        self.totals.snapshot()
    }

    /// Run one sweep against the wall clock. Returns `None` when a sweep
    /// was already in progress and this fire was dropped.
    pub async fn sweep(&self) -> Result<Option<SweepStats>> {
        self.sweep_at(now_ms()).await
    }

    /// Run one sweep with an explicit clock reading. Everything the sweep
    /// compares against time goes through `now_ms`, which makes the window
    /// fence testable without waiting an hour.
    pub async fn sweep_at(&self, now_ms: i64) -> Result<Option<SweepStats>> {
        let _guard = match self.sweeping.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::debug!("Sweep already in progress; dropping this fire");
                return Ok(None);
            }
        };

        let referenced = self.collect_referenced().await?;
        tracing::debug!(referenced = referenced.len(), "Collected referenced extent ids");

        let filter = ExtentFilter::unmodified_since(now_ms, self.unmodified_window.as_secs() as i64);

        let mut stats = SweepStats::default();
        let mut marker = None;

        loop {
            let page = self
                .catalog
                .list(&filter, marker, Some(self.page_size))
                .await?;

            for record in &page.records {
                stats.scanned += 1;

                if referenced.contains(&record.id) {
                    continue;
                }

                match self
                    .destinations
                    .resolve(&record.destination_id, &record.relative_path)
                {
                    Ok(path) => match tokio::fs::remove_file(&path).await {
                        Ok(()) => {}
                        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
                        Err(error) => {
                            tracing::warn!(
                                extent = %record.id,
                                error = %error,
                                "Failed to delete extent file; leaving row for a later sweep"
                            );
                            continue;
                        }
                    },
                    Err(error) => {
                        tracing::warn!(
                            extent = %record.id,
                            error = %error,
                            "Cannot resolve extent placement; leaving row"
                        );
                        continue;
                    }
                }

                self.catalog.delete(&record.id).await?;
                stats.deleted += 1;
                stats.bytes_reclaimed += record.size;
            }

            match page.next_marker {
                Some(m) => marker = Some(m),
                None => break,
            }
        }

        self.totals.record(&stats);
        tracing::info!(
            scanned = stats.scanned,
            deleted = stats.deleted,
            bytes_reclaimed = stats.bytes_reclaimed,
            "Garbage collection sweep completed"
        );

        Ok(Some(stats))
    }

    async fn collect_referenced(&self) -> Result<HashSet<String>> {
        let mut referenced = HashSet::new();

        for source in &self.references {
            let mut marker = None;
            loop {
                let page = source.referenced_extent_ids(marker, self.page_size).await?;
                referenced.extend(page.ids);
                match page.next_marker {
                    Some(m) => marker = Some(m),
                    None => break,
                }
            }
        }

        Ok(referenced)
    }

    /// Spawn the interval loop. The first sweep happens one full interval
    /// after start; overlapping fires are dropped by `sweep` itself.
    pub fn start(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // interval() fires immediately; consume that tick.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if let Err(error) = self.sweep().await {
                    tracing::error!(error = %error, "Garbage collection sweep failed");
                }
            }
        })
    }
}
