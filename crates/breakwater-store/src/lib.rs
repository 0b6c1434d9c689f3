//! Breakwater Extent Store
//!
//! This crate implements the byte-storage half of the emulator: the part
//! that owns files on disk, survives crashes mid-write, and reclaims space
//! without ever deleting live data.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌────────────────┐  append   ┌──────────────────┐
//! │ Blob / Queue   │──────────▶│ ExtentWriterPool │──▶ extent files
//! │ write paths    │           └────────┬─────────┘    (per destination)
//! └──────┬─────────┘                    │ upsert
//!        │ descriptors                  ▼
//!        │               ┌─────────────────────────┐
//!        └──────────────▶│ Extent metadata catalog │◀── ExtentReader
//!   (blob/queue catalog) └────────────┬────────────┘
//!                                     │ iterate
//!                                     ▼
//!                               ┌──────────┐  referenced ids
//!                               │ ExtentGc │◀────────────────── catalogs
//!                               └──────────┘
//! ```
//!
//! ## Main Components
//!
//! ### ExtentStore
//! Lifecycle facade: owns the destination set, writer pool, reader, and
//! catalog handle; gates everything behind init/close.
//!
//! ### ExtentWriterPool
//! Bounded cache of open append files. Picks a file (or creates one inside
//! the destination's budget), appends, returns `(extent, offset, count)`.
//!
//! ### ExtentReader
//! Resolves descriptors through the catalog and streams ranges back.
//!
//! ### ExtentGc
//! Periodic sweep deleting extents that no blob or queue record references
//! and that are older than the unmodified window.
//!
//! ### BlobService / QueueService
//! The write-order protocol (bytes first, references second, ack last)
//! that makes the sweep safe, plus the queue's payload ceiling.

pub mod blob;
pub mod config;
pub mod destination;
pub mod error;
pub mod gc;
pub mod pool;
pub mod queue;
pub mod reader;
pub mod store;

pub use blob::BlobService;
pub use config::{DestinationConfig, StoreConfig};
pub use destination::{Destination, DestinationSet};
pub use error::{Error, Result};
pub use gc::{ExtentGc, GcTotals, SweepStats};
pub use pool::ExtentWriterPool;
pub use queue::QueueService;
pub use reader::ExtentReader;
pub use store::ExtentStore;
