//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into the storage services. Nothing below the binaries reads environment variables: the
//! binaries call [`StorageConfig::from_env`], and everything else receives a [`StorageConfig`].

use crate::constants::{
    BYTES_PER_MB, DEFAULT_MAX_FILE_MB, DEFAULT_RETENTION_DAYS, DEFAULT_STORAGE_ROOT,
    DEFAULT_SWEEP_INTERVAL_SECS, MAX_FILE_MB_ENV, MAX_FILE_MB_LIMIT, MAX_RETENTION_DAYS,
    PUBLIC_BASE_URL_ENV, RETENTION_DAYS_ENV, STORAGE_ROOT_ENV, SWEEP_INTERVAL_SECS_ENV,
};
use crate::{CoreError, CoreResult};
use facility_files::PathPolicy;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Storage configuration resolved at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageConfig {
    storage_root: PathBuf,
    retention_days: u32,
    public_base_url: Option<String>,
    max_file_mb: u64,
    sweep_interval: Duration,
}

impl StorageConfig {
    /// Create a new `StorageConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if the storage root is empty, `retention_days` is
    /// outside `1..=MAX_RETENTION_DAYS`, `max_file_mb` is outside `1..=MAX_FILE_MB_LIMIT`, the
    /// sweep interval is shorter than a second, or the base URL is not `http(s)://`.
    pub fn new(
        storage_root: PathBuf,
        retention_days: u32,
        public_base_url: Option<String>,
        max_file_mb: u64,
        sweep_interval: Duration,
    ) -> CoreResult<Self> {
        if storage_root.as_os_str().is_empty() {
            return Err(CoreError::InvalidConfig("storage root cannot be empty".into()));
        }

        if !(1..=MAX_RETENTION_DAYS).contains(&retention_days) {
            return Err(CoreError::InvalidConfig(format!(
                "retention days must be between 1 and {}, got {}",
                MAX_RETENTION_DAYS, retention_days
            )));
        }

        if !(1..=MAX_FILE_MB_LIMIT).contains(&max_file_mb) {
            return Err(CoreError::InvalidConfig(format!(
                "max file size must be between 1 and {} MB, got {}",
                MAX_FILE_MB_LIMIT, max_file_mb
            )));
        }

        if sweep_interval < Duration::from_secs(1) {
            return Err(CoreError::InvalidConfig(
                "sweep interval must be at least one second".into(),
            ));
        }

        if let Some(url) = &public_base_url {
            let has_host = url
                .strip_prefix("https://")
                .or_else(|| url.strip_prefix("http://"))
                .is_some_and(|rest| !rest.trim_matches('/').is_empty());
            if !has_host {
                return Err(CoreError::InvalidConfig(format!(
                    "public base URL must be an absolute http(s) URL, got '{}'",
                    url
                )));
            }
        }

        Ok(Self {
            storage_root,
            retention_days,
            public_base_url,
            max_file_mb,
            sweep_interval,
        })
    }

    /// Resolve configuration from the process environment.
    ///
    /// Call this once, from a binary's `main`.
    pub fn from_env() -> CoreResult<Self> {
        Self::from_env_values(EnvValues::from_process_env())
    }

    /// Resolve configuration from raw environment values, applying defaults.
    ///
    /// Unset and blank values both fall back to the default.
    pub fn from_env_values(values: EnvValues) -> CoreResult<Self> {
        let storage_root = non_blank(values.storage_root)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_ROOT));

        let retention_days =
            parse_optional(RETENTION_DAYS_ENV, values.retention_days)?.unwrap_or(DEFAULT_RETENTION_DAYS);
        let max_file_mb =
            parse_optional(MAX_FILE_MB_ENV, values.max_file_mb)?.unwrap_or(DEFAULT_MAX_FILE_MB);
        let sweep_interval_secs = parse_optional(SWEEP_INTERVAL_SECS_ENV, values.sweep_interval_secs)?
            .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS);

        Self::new(
            storage_root,
            retention_days,
            non_blank(values.public_base_url),
            max_file_mb,
            Duration::from_secs(sweep_interval_secs),
        )
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    pub fn retention_days(&self) -> u32 {
        self.retention_days
    }

    pub fn public_base_url(&self) -> Option<&str> {
        self.public_base_url.as_deref()
    }

    pub fn max_file_mb(&self) -> u64 {
        self.max_file_mb
    }

    /// Maximum accepted upload size in bytes (`max_file_mb` MiB).
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_file_mb * BYTES_PER_MB
    }

    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    /// Path policy for this storage root and base URL.
    pub fn path_policy(&self) -> PathPolicy {
        PathPolicy::new(self.storage_root.clone(), self.public_base_url.clone())
    }
}

/// Raw, unparsed configuration values as found in the environment.
#[derive(Clone, Debug, Default)]
pub struct EnvValues {
    pub storage_root: Option<String>,
    pub retention_days: Option<String>,
    pub public_base_url: Option<String>,
    pub max_file_mb: Option<String>,
    pub sweep_interval_secs: Option<String>,
}

impl EnvValues {
    /// Reads every recognised variable from the process environment.
    pub fn from_process_env() -> Self {
        let var = |name: &str| std::env::var(name).ok();
        Self {
            storage_root: var(STORAGE_ROOT_ENV),
            retention_days: var(RETENTION_DAYS_ENV),
            public_base_url: var(PUBLIC_BASE_URL_ENV),
            max_file_mb: var(MAX_FILE_MB_ENV),
            sweep_interval_secs: var(SWEEP_INTERVAL_SECS_ENV),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse an optional environment value. `None` or blank yields `Ok(None)`.
fn parse_optional<T: FromStr>(name: &str, value: Option<String>) -> CoreResult<Option<T>> {
    non_blank(value)
        .map(|v| {
            v.parse::<T>().map_err(|_| {
                CoreError::InvalidConfig(format!("{} must be a non-negative integer, got '{}'", name, v))
            })
        })
        .transpose()
}
