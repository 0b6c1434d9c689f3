//! Store Error Types
//!
//! ## Error Categories
//!
//! ### Lifecycle
//! - `NotInitialized` / `Closed`: operation before `init` or after `close`
//!
//! ### Placement
//! - `UnknownDestination`: append named a destination that is not configured
//! - `ExtentNotFound`: descriptor resolves to no catalog row
//! - `RangeExceeded`: descriptor reaches past the recorded extent size
//!   (a corrupt descriptor; never retried)
//!
//! ### Write path
//! - `PayloadTooLarge`: rejected at the protocol boundary, before any bytes
//!   reach the store
//! - `Cancelled`: the caller's abort token fired; bytes already appended
//!   stay valid and the open extent is evicted
//! - `Io`: filesystem failure; same eviction behavior, no catalog rollback
//!
//! Nothing is swallowed: each kind maps 1:1 to a response at the HTTP
//! boundary.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Store is not initialized")]
    NotInitialized,

    #[error("Store is closed")]
    Closed,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Unknown destination: {0}")]
    UnknownDestination(String),

    #[error("Extent not found: {0}")]
    ExtentNotFound(String),

    #[error("Range [{offset}, {offset}+{count}) exceeds extent {extent_id} size {size}")]
    RangeExceeded {
        extent_id: String,
        offset: u64,
        count: u64,
        size: u64,
    },

    #[error("Payload of {actual} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { actual: usize, limit: usize },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Catalog error: {0}")]
    Catalog(#[from] breakwater_catalog::CatalogError),
}
