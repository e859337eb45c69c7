//! # Facility Core
//!
//! Runtime wiring for facility blob storage.
//!
//! This crate sits between the binaries and `facility-files`:
//! - [`StorageConfig`] resolved once at startup from `STORAGE_ROOT`, `RETENTION_DAYS`,
//!   `PUBLIC_BASE_URL`, `MAX_FILE_MB` and `SWEEP_INTERVAL_SECS`
//! - [`StorageService`], the size-checked upload path handed to HTTP handlers
//! - [`RetentionScheduler`], the single timer that drives photo retention sweeps
//!
//! **No API concerns**: routing, authentication and database records belong to the callers.

pub mod config;
pub mod constants;
pub mod error;
pub mod scheduler;
pub mod service;

pub use config::{EnvValues, StorageConfig};
pub use error::{CoreError, CoreResult};
pub use scheduler::RetentionScheduler;
pub use service::StorageService;

pub use facility_files::{
    FilesError, StoredObject, SweepReport, UploadCategory, UploadRequest,
};
