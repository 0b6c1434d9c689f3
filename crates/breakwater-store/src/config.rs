//! Store Configuration
//!
//! The single configuration record for the persistence core. Everything the
//! source kept as scattered literals is a named field here with the same
//! default: extent rotation at 1 MiB, GC every 10 minutes behind a 1 hour
//! unmodified window, catalog pages of 5000.
//!
//! ## Usage
//!
//! ```ignore
//! use breakwater_store::StoreConfig;
//!
//! // Development config: everything under one data directory
//! let config = StoreConfig {
//!     destinations: vec![DestinationConfig {
//!         id: "default".to_string(),
//!         root_path: "data/extents".into(),
//!         max_concurrency: 10,
//!     }],
//!     ..Default::default()
//! };
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Listen host for the outer HTTP layer (carried in config; unused by
    /// the core itself).
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port for the outer HTTP layer.
    #[serde(default = "default_port")]
    pub port: u16,

    /// SQLite file backing the extent metadata catalog.
    #[serde(default = "default_extent_catalog_path")]
    pub extent_catalog_path: PathBuf,

    /// SQLite file backing the blob/queue metadata and service properties.
    #[serde(default = "default_metadata_db_path")]
    pub metadata_db_path: PathBuf,

    /// SQLite file backing the account store.
    #[serde(default = "default_account_db_path")]
    pub account_db_path: PathBuf,

    /// Ordered persistence destinations. Must not be empty. Destinations
    /// may be added across restarts; removing one that still holds live
    /// extents is not supported.
    #[serde(default = "default_destinations")]
    pub destinations: Vec<DestinationConfig>,

    /// Size at which an open extent is rotated out of the writer pool
    /// (default: 1 MiB). An append that reaches this size closes the file;
    /// the next append opens a fresh extent.
    #[serde(default = "default_rotation_bytes")]
    pub extent_rotation_bytes: u64,

    /// Chunk size for appends; cancellation is observed between chunks
    /// (default: 256 KiB).
    #[serde(default = "default_append_chunk_bytes")]
    pub append_chunk_bytes: usize,

    /// Idle open files older than this are rotated out of the writer pool
    /// (default: 10 minutes).
    #[serde(default = "default_idle_timeout", with = "duration_secs")]
    pub extent_idle_timeout: Duration,

    /// How often the garbage collector sweeps (default: 10 minutes).
    #[serde(default = "default_gc_interval", with = "duration_secs")]
    pub gc_interval: Duration,

    /// Minimum age before an unreferenced extent may be reclaimed
    /// (default: 1 hour). This is the fence protecting the gap between an
    /// append and the moment its descriptor lands in a metadata catalog.
    #[serde(default = "default_unmodified_window", with = "duration_secs")]
    pub unmodified_window: Duration,

    /// Page size for catalog iteration during a sweep (default: 5000).
    #[serde(default = "default_gc_page_size")]
    pub gc_page_size: u32,

    /// Suppress the access log entirely.
    #[serde(default)]
    pub silent: bool,

    /// Verbose diagnostics for the outer layers.
    #[serde(default)]
    pub debug: bool,

    /// Optional access-log destination for the outer HTTP layer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_log_path: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            extent_catalog_path: default_extent_catalog_path(),
            metadata_db_path: default_metadata_db_path(),
            account_db_path: default_account_db_path(),
            destinations: default_destinations(),
            extent_rotation_bytes: default_rotation_bytes(),
            append_chunk_bytes: default_append_chunk_bytes(),
            extent_idle_timeout: default_idle_timeout(),
            gc_interval: default_gc_interval(),
            unmodified_window: default_unmodified_window(),
            gc_page_size: default_gc_page_size(),
            silent: false,
            debug: false,
            access_log_path: None,
        }
    }
}

/// One configured persistence destination: a local directory plus its
/// concurrency budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    /// Stable label. On-disk records name destinations by id, so
    /// reordering the configured list never breaks resolution.
    pub id: String,

    /// Directory that holds this destination's extent files.
    pub root_path: PathBuf,

    /// Maximum simultaneously open append files in this destination.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: u32,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    10000
}

fn default_extent_catalog_path() -> PathBuf {
    PathBuf::from("data/__breakwater_extents__.sqlite")
}

fn default_metadata_db_path() -> PathBuf {
    PathBuf::from("data/__breakwater_metadata__.sqlite")
}

fn default_account_db_path() -> PathBuf {
    PathBuf::from("data/__breakwater_accounts__.sqlite")
}

fn default_destinations() -> Vec<DestinationConfig> {
    vec![DestinationConfig {
        id: "default".to_string(),
        root_path: PathBuf::from("data/extents"),
        max_concurrency: default_max_concurrency(),
    }]
}

fn default_max_concurrency() -> u32 {
    10
}

fn default_rotation_bytes() -> u64 {
    1024 * 1024 // 1 MiB
}

fn default_append_chunk_bytes() -> usize {
    256 * 1024 // 256 KiB
}

fn default_idle_timeout() -> Duration {
    Duration::from_secs(10 * 60)
}

fn default_gc_interval() -> Duration {
    Duration::from_secs(10 * 60)
}

fn default_unmodified_window() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_gc_page_size() -> u32 {
    5000
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_json() {
        let config = StoreConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: StoreConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(back.extent_rotation_bytes, 1024 * 1024);
        assert_eq!(back.gc_interval, Duration::from_secs(600));
        assert_eq!(back.unmodified_window, Duration::from_secs(3600));
        assert_eq!(back.gc_page_size, 5000);
        assert_eq!(back.destinations.len(), 1);
    }

    #[test]
    fn omitted_fields_take_defaults() {
        let back: StoreConfig = serde_json::from_str(r#"{"port": 11000}"#).unwrap();
        assert_eq!(back.port, 11000);
        assert_eq!(back.host, "127.0.0.1");
        assert_eq!(back.destinations[0].id, "default");
    }
}
