//! Catalog Type Definitions
//!
//! Data structures stored by the catalogs.
//!
//! ## Types Overview
//!
//! ### ExtentRecord
//! One row per extent file: where it lives (destination + relative path), how
//! many bytes have been appended so far, and when it was last written. The
//! garbage collector keys its age fence off `last_modify_ms`.
//!
//! ### ExtentFilter / ExtentPage
//! Structured predicate and page shape for `ExtentCatalog::list`. There is no
//! query DSL; a filter is a record of optional constraints applied in SQL.
//!
//! ### BlobRecord / QueueMessageRecord
//! The higher-level entities that *reference* extents. Each embeds one or
//! more [`ExtentDescriptor`] values; the presence of a descriptor in a live
//! record is what keeps an extent alive.
//!
//! ### ServiceProperties
//! Per-account settings document (CORS, metrics, logging, static website,
//! delete retention). Every field is optional so that an update can express
//! the service's "absent means unchanged" merge rule.
//!
//! ## Design Decisions
//!
//! - Timestamps are i64 milliseconds since epoch, like every store the
//!   emulator keeps.
//! - Sizes are u64 in memory and cast to i64 at the SQLite boundary.
//! - Descriptor lists are persisted as JSON columns; SQLite never needs to
//!   query inside them.

use breakwater_core::{ExtentDescriptor, SERVICE_VERSION};
use serde::{Deserialize, Serialize};

/// Catalog row describing one extent file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtentRecord {
    /// Opaque unique id, also the file name under the destination root.
    pub id: String,

    /// Which configured persistence destination holds the file.
    pub destination_id: String,

    /// File path relative to the destination root.
    pub relative_path: String,

    /// Bytes appended so far. Monotonically non-decreasing while the extent
    /// is open; frozen once the writer pool rotates it out.
    pub size: u64,

    /// Wall-clock time of the most recent append (ms since epoch).
    pub last_modify_ms: i64,
}

/// Optional constraints for `ExtentCatalog::list`.
#[derive(Debug, Clone, Default)]
pub struct ExtentFilter {
    /// Exact-match on the extent id.
    pub id: Option<String>,

    /// Only return extents whose `last_modify_ms` is strictly below this
    /// value. Callers derive it as `query_time - unmodified_seconds * 1000`.
    pub modified_before_ms: Option<i64>,
}

impl ExtentFilter {
    /// Age filter for a garbage collection pass: extents untouched since
    /// before `query_time_ms - unmodified_seconds * 1000`.
    pub fn unmodified_since(query_time_ms: i64, unmodified_seconds: i64) -> Self {
        Self {
            id: None,
            modified_before_ms: Some(query_time_ms - unmodified_seconds * 1000),
        }
    }
}

/// One page of extent records.
///
/// `next_marker` is present exactly when the page is full, and then equals
/// the internal sequence of the last returned record. Passing it back
/// resumes the listing; `None` as the input marker starts from the top.
#[derive(Debug, Clone)]
pub struct ExtentPage {
    pub records: Vec<ExtentRecord>,
    pub next_marker: Option<i64>,
}

/// One page of referenced extent ids, produced by `ExtentReferences`.
#[derive(Debug, Clone)]
pub struct IdPage {
    pub ids: Vec<String>,
    pub next_marker: Option<i64>,
}

/// A stored blob: named entity plus the ordered extent ranges holding its
/// content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRecord {
    pub account: String,
    pub container: String,
    pub name: String,

    /// Total content length; equals the sum of `parts[i].count`.
    pub content_length: u64,

    /// Byte ranges in write order. One per committed block.
    pub parts: Vec<ExtentDescriptor>,

    pub created_ms: i64,
}

/// A stored queue message. The body lives in the extent store; the record
/// carries a single descriptor for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMessageRecord {
    pub account: String,
    pub queue: String,
    pub message_id: String,
    pub inserted_ms: i64,

    /// Length of the (already base64-encoded) message text.
    pub text_length: u64,

    /// Where the message body bytes live.
    pub part: ExtentDescriptor,
}

/// CORS rule, one entry of the service properties CORS list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorsRule {
    pub allowed_origins: String,
    pub allowed_methods: String,
    pub allowed_headers: String,
    pub exposed_headers: String,
    pub max_age_in_seconds: u32,
}

/// Logging settings for a storage account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub version: String,
    pub read: bool,
    pub write: bool,
    pub delete: bool,
    pub retention: RetentionPolicy,
}

/// Hour or minute metrics settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSettings {
    pub version: String,
    pub enabled: bool,
    pub include_apis: Option<bool>,
    pub retention: RetentionPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub enabled: bool,
    pub days: Option<u32>,
}

impl RetentionPolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            days: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticWebsiteSettings {
    pub enabled: bool,
    pub index_document: Option<String>,
    pub error_document_404_path: Option<String>,
}

/// Per-account service properties document.
///
/// Every field is optional: an update supplies only the properties it wants
/// to replace, and the store preserves the rest. The stored document is
/// always fully populated (starting from [`ServiceProperties::defaults`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceProperties {
    pub default_service_version: Option<String>,
    pub logging: Option<LoggingSettings>,
    pub hour_metrics: Option<MetricsSettings>,
    pub minute_metrics: Option<MetricsSettings>,

    /// CORS is special-cased by the merge: an explicit empty list replaces
    /// the stored rules, an absent field preserves them.
    pub cors: Option<Vec<CorsRule>>,

    pub static_website: Option<StaticWebsiteSettings>,
    pub delete_retention_policy: Option<RetentionPolicy>,
}

impl ServiceProperties {
    /// The document returned for an account that never set properties:
    /// empty CORS, metrics disabled, logging of reads/writes/deletes
    /// enabled, static website disabled, current service version.
    pub fn defaults() -> Self {
        Self {
            default_service_version: Some(SERVICE_VERSION.to_string()),
            logging: Some(LoggingSettings {
                version: "1.0".to_string(),
                read: true,
                write: true,
                delete: true,
                retention: RetentionPolicy::disabled(),
            }),
            hour_metrics: Some(MetricsSettings {
                version: "1.0".to_string(),
                enabled: false,
                include_apis: None,
                retention: RetentionPolicy::disabled(),
            }),
            minute_metrics: Some(MetricsSettings {
                version: "1.0".to_string(),
                enabled: false,
                include_apis: None,
                retention: RetentionPolicy::disabled(),
            }),
            cors: Some(Vec::new()),
            static_website: Some(StaticWebsiteSettings {
                enabled: false,
                index_document: None,
                error_document_404_path: None,
            }),
            delete_retention_policy: Some(RetentionPolicy::disabled()),
        }
    }

    /// Apply the service's merge rule: each supplied top-level property
    /// replaces the stored one, each absent property is preserved.
    pub fn merge_from(&mut self, update: ServiceProperties) {
        if let Some(v) = update.default_service_version {
            self.default_service_version = Some(v);
        }
        if let Some(v) = update.logging {
            self.logging = Some(v);
        }
        if let Some(v) = update.hour_metrics {
            self.hour_metrics = Some(v);
        }
        if let Some(v) = update.minute_metrics {
            self.minute_metrics = Some(v);
        }
        if let Some(v) = update.cors {
            // An empty list is a deliberate "clear all rules".
            self.cors = Some(v);
        }
        if let Some(v) = update.static_website {
            self.static_website = Some(v);
        }
        if let Some(v) = update.delete_retention_policy {
            self.delete_retention_policy = Some(v);
        }
    }

    /// An update that touches nothing.
    pub fn empty_update() -> Self {
        Self {
            default_service_version: None,
            logging: None,
            hour_metrics: None,
            minute_metrics: None,
            cors: None,
            static_website: None,
            delete_retention_policy: None,
        }
    }
}

/// A provisioned storage account. Read-only on the request path; mutated
/// only during administrative provisioning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub name: String,
    pub key: String,
    pub enabled: bool,
}
