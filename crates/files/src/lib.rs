//! Facility File Storage
//!
//! This crate stores the photos and receipts uploaded against facility cleaning visits, and
//! reclaims disk space by expiring old photos.
//!
//! ## Storage Layout
//!
//! ```text
//! <storage_root>/
//! ├── photos/
//! │   └── <facility_id>/
//! │       └── <YYYY-MM-DD>/
//! │           └── <unix_millis>-<random_hex>.<ext>
//! └── receipts/
//!     └── <facility_id>/
//!         └── <YYYY-MM>/
//!             └── <unix_millis>-<random_hex>.<ext>
//! ```
//!
//! ## Components
//!
//! - [`PathPolicy`] maps a facility and a period to a directory and derives public URLs
//! - [`FilenameGenerator`] produces collision-resistant names that never echo user input
//! - [`TypeValidator`] checks the declared MIME type and the extension against a category
//! - [`BlobStore`] ties the above together on the upload write path
//! - [`RetentionSweeper`] deletes expired photos and prunes empty directories
//!
//! Receipts are never deleted by this crate.
//!
//! ## Example Usage
//!
//! ```no_run
//! use facility_files::{BlobStore, PathPolicy, UploadCategory, UploadRequest};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = BlobStore::new(PathPolicy::new("uploads_dev", None));
//! let stored = store.store(&UploadRequest {
//!     bytes: b"...",
//!     original_name: "before.jpg",
//!     mime_type: "image/jpeg",
//!     category: UploadCategory::Photo,
//!     facility_id: "42",
//!     period: "2024-03-15",
//! })?;
//! println!("{}", stored.public_url);
//! # Ok(())
//! # }
//! ```

mod category;
mod constants;
mod filename;
mod paths;
mod retention;
mod store;

use std::path::PathBuf;

pub use category::{TypeValidator, UnknownCategory, UploadCategory};
pub use constants::{PHOTOS_DIR_NAME, RANDOM_SUFFIX_BYTES, RECEIPTS_DIR_NAME};
pub use facility_types::{FacilityId, LocationError, ReceiptMonth, VisitDate};
pub use filename::{extension_of, FilenameGenerator, RandomSource, ThreadRngSource};
pub use paths::PathPolicy;
pub use retention::{retention_cutoff, sweep, RetentionSweeper, SweepReport};
pub use store::{ensure_dir, BlobStore, StoredObject, UploadRequest};

/// Errors that can occur while storing a file
///
/// Every variant is terminal for the request that produced it; nothing is retried internally.
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// The declared MIME type or the file extension is not allowed for the category
    #[error("unsupported file type: {message}", message = category.rejection_message())]
    UnsupportedType { category: UploadCategory },

    /// Facility id, date or month is malformed
    #[error("invalid location: {0}")]
    InvalidLocationArgs(#[from] LocationError),

    /// The target directory could not be created
    #[error("failed to create directory {path}: {source}", path = path.display())]
    DirectoryCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The payload could not be written
    #[error("failed to write {path}: {source}", path = path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file already exists at the generated path; it is left untouched
    #[error("refusing to overwrite existing file {}", .0.display())]
    WriteConflict(PathBuf),

    /// Path is not inside the storage root (or cannot be expressed as a URL)
    #[error("invalid path: {0}")]
    InvalidPath(String),
}

pub type FilesResult<T> = std::result::Result<T, FilesError>;
