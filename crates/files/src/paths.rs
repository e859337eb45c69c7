//! Storage directory layout and public URL derivation.
//!
//! This module contains **no I/O logic**, only path construction. Location arguments arrive
//! already validated as [`FacilityId`], [`VisitDate`] and [`ReceiptMonth`], so joining them
//! cannot step outside the storage root.

use crate::category::UploadCategory;
use crate::{FilesError, FilesResult};
use facility_types::{FacilityId, ReceiptMonth, VisitDate};
use std::path::{Component, Path, PathBuf};

/// Maps facility/period pairs to directories under the storage root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPolicy {
    storage_root: PathBuf,
    public_base_url: Option<String>,
}

impl PathPolicy {
    /// Creates a policy rooted at `storage_root`.
    ///
    /// When `public_base_url` is `None`, URLs are root-relative (`/photos/...`). A trailing `/` on
    /// the base URL is ignored.
    pub fn new(storage_root: impl Into<PathBuf>, public_base_url: Option<String>) -> Self {
        Self {
            storage_root: storage_root.into(),
            public_base_url: public_base_url.map(|url| url.trim_end_matches('/').to_owned()),
        }
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    pub fn public_base_url(&self) -> Option<&str> {
        self.public_base_url.as_deref()
    }

    /// Root of a category's subtree, e.g. `<root>/photos`.
    pub fn category_root(&self, category: UploadCategory) -> PathBuf {
        self.storage_root.join(category.dir_name())
    }

    pub fn photos_root(&self) -> PathBuf {
        self.category_root(UploadCategory::Photo)
    }

    pub fn receipts_root(&self) -> PathBuf {
        self.category_root(UploadCategory::Receipt)
    }

    /// `<root>/photos/<facility>/<YYYY-MM-DD>`
    pub fn photo_dir(&self, facility: &FacilityId, date: &VisitDate) -> PathBuf {
        self.photos_root()
            .join(facility.as_str())
            .join(date.to_string())
    }

    /// `<root>/receipts/<facility>/<YYYY-MM>`
    pub fn receipt_dir(&self, facility: &FacilityId, month: &ReceiptMonth) -> PathBuf {
        self.receipts_root()
            .join(facility.as_str())
            .join(month.as_str())
    }

    /// Derives the public URL of a stored file.
    ///
    /// The path is made relative to the storage root and its segments are joined with `/`,
    /// then either appended to the configured base URL or prefixed with `/`.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::InvalidPath`] if `path` is not strictly inside the storage root, or
    /// if a segment is `..`, `.` or not valid UTF-8.
    pub fn public_url_from(&self, path: &Path) -> FilesResult<String> {
        let relative = path.strip_prefix(&self.storage_root).map_err(|_| {
            FilesError::InvalidPath(format!(
                "{} is not inside storage root {}",
                path.display(),
                self.storage_root.display()
            ))
        })?;

        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(segment) => {
                    let segment = segment.to_str().ok_or_else(|| {
                        FilesError::InvalidPath(format!(
                            "{} contains a non UTF-8 segment",
                            path.display()
                        ))
                    })?;
                    segments.push(segment);
                }
                _ => {
                    return Err(FilesError::InvalidPath(format!(
                        "{} contains a non-normal segment",
                        path.display()
                    )))
                }
            }
        }

        if segments.is_empty() {
            return Err(FilesError::InvalidPath(format!(
                "{} is the storage root itself",
                path.display()
            )));
        }

        let relative_url = segments.join("/");
        Ok(match &self.public_base_url {
            Some(base) => format!("{}/{}", base, relative_url),
            None => format!("/{}", relative_url),
        })
    }
}
