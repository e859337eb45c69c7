//! Constants used throughout the facility core crate.
//!
//! Environment variable names and the defaults applied when they are unset.

/// Environment variable naming the storage root.
pub const STORAGE_ROOT_ENV: &str = "STORAGE_ROOT";

/// Environment variable holding the photo retention window in days.
pub const RETENTION_DAYS_ENV: &str = "RETENTION_DAYS";

/// Environment variable holding the optional absolute base URL for stored files.
pub const PUBLIC_BASE_URL_ENV: &str = "PUBLIC_BASE_URL";

/// Environment variable holding the maximum upload size in megabytes.
pub const MAX_FILE_MB_ENV: &str = "MAX_FILE_MB";

/// Environment variable holding the number of seconds between retention sweeps.
pub const SWEEP_INTERVAL_SECS_ENV: &str = "SWEEP_INTERVAL_SECS";

/// Default storage root when no explicit directory is configured.
pub const DEFAULT_STORAGE_ROOT: &str = "uploads_dev";

/// Default photo retention window.
pub const DEFAULT_RETENTION_DAYS: u32 = 60;

/// Default maximum upload size.
pub const DEFAULT_MAX_FILE_MB: u64 = 20;

/// Default interval between sweeps (once a day).
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Upper bound for `RETENTION_DAYS` (one hundred years).
pub const MAX_RETENTION_DAYS: u32 = 36_500;

/// Upper bound for `MAX_FILE_MB`.
pub const MAX_FILE_MB_LIMIT: u64 = 10 * 1024;

pub(crate) const BYTES_PER_MB: u64 = 1024 * 1024;
