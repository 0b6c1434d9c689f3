//! Breakwater Core Types
//!
//! Leaf types shared by every Breakwater crate. Nothing in here performs I/O;
//! this crate exists so that the catalog and store crates can exchange extent
//! descriptors without depending on each other.
//!
//! ## What is an Extent?
//!
//! All blob and queue payloads the emulator accepts end up as raw bytes inside
//! *extents*: append-only files spread across one or more configured local
//! directories. An extent has no header or footer; a logical entity (a blob, a
//! queue message) names the byte ranges it owns through [`ExtentDescriptor`]
//! values stored in the metadata catalogs.
//!
//! ```text
//! ┌────────────────────── extent file ──────────────────────┐
//! │ blob A block 0 │ message M │ blob B block 3 │ (append…) │
//! └─────────────────────────────────────────────────────────┘
//!   ▲ descriptor {id, 0, n}   ▲ descriptor {id, n, m}
//! ```
//!
//! Extents are immutable once rotated out of the writer pool; deletion only
//! ever happens through the garbage collector after an extent is proven
//! unreferenced.

pub mod descriptor;
pub mod limits;
pub mod time;

pub use descriptor::ExtentDescriptor;
pub use limits::{MAX_QUEUE_MESSAGE_BYTES, SERVICE_VERSION};
pub use time::now_ms;
