//! Service-wide limits and versions.

/// Largest accepted queue message body, measured after the client's base64
/// encoding (64 KiB, matching the real service). Enforced before any bytes
/// reach the extent store.
pub const MAX_QUEUE_MESSAGE_BYTES: usize = 64 * 1024;

/// Service version reported when an account has no stored service properties.
pub const SERVICE_VERSION: &str = "2023-11-03";
