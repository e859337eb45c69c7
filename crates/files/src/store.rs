//! The upload write path.
//!
//! [`BlobStore::store`] is called synchronously by upload handlers. It validates the declared
//! type, resolves the target directory, creates it if needed, writes the payload under a freshly
//! generated name and returns the resulting [`StoredObject`].
//!
//! # Concurrency
//!
//! Concurrent uploads share nothing but the filesystem. Directory creation treats "already
//! exists" as success, and the payload is written with `create_new`, so an unexpected name clash
//! surfaces as [`FilesError::WriteConflict`] instead of truncating another upload's file.
//!
//! A retention sweep may run at the same time and prune the target directory between its creation
//! and the write. The write path recreates it once rather than failing the upload.
//!
//! # Database
//!
//! The store never records anything outside the filesystem. Persisting the returned
//! [`StoredObject`] is the caller's job.

use crate::category::{normalise_mime, TypeValidator, UploadCategory};
use crate::filename::FilenameGenerator;
use crate::paths::PathPolicy;
use crate::{FilesError, FilesResult};
use facility_types::{FacilityId, ReceiptMonth, VisitDate};
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// One upload as handed over by the HTTP layer.
#[derive(Debug, Clone, Copy)]
pub struct UploadRequest<'a> {
    /// Raw payload
    pub bytes: &'a [u8],
    /// Filename as supplied by the client; only its extension is used
    pub original_name: &'a str,
    /// Client-declared MIME type
    pub mime_type: &'a str,
    pub category: UploadCategory,
    pub facility_id: &'a str,
    /// `YYYY-MM-DD` for photos, `YYYY-MM` for receipts
    pub period: &'a str,
}

/// A file written by [`BlobStore::store`].
///
/// The file's modification time is its creation timestamp; nothing else records it.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct StoredObject {
    /// Location on disk (under the storage root)
    pub path: PathBuf,

    /// URL the file is served from
    pub public_url: String,

    /// Size of the payload in bytes
    pub byte_size: u64,

    /// Generated filename, `<unix_millis>-<random_hex>.<ext>`
    pub stored_filename: String,

    pub category: UploadCategory,

    /// Hex SHA-256 digest of the payload
    pub sha256: String,

    /// Media type sniffed from the payload's magic bytes, if recognised
    ///
    /// Advisory only. Acceptance is decided by [`TypeValidator`] on the declared type.
    pub detected_media_type: Option<String>,
}

/// Writes uploads into the storage tree.
#[derive(Debug, Clone)]
pub struct BlobStore {
    paths: PathPolicy,
    filenames: FilenameGenerator,
}

impl BlobStore {
    pub fn new(paths: PathPolicy) -> Self {
        Self::with_filename_generator(paths, FilenameGenerator::new())
    }

    pub fn with_filename_generator(paths: PathPolicy, filenames: FilenameGenerator) -> Self {
        Self { paths, filenames }
    }

    pub fn paths(&self) -> &PathPolicy {
        &self.paths
    }

    /// Stores one upload.
    ///
    /// # Errors
    ///
    /// - [`FilesError::UnsupportedType`] if the MIME type or extension is not allowed
    /// - [`FilesError::InvalidLocationArgs`] if the facility id or period is malformed
    /// - [`FilesError::DirectoryCreateFailed`] if the target directory cannot be created
    /// - [`FilesError::WriteConflict`] if the generated path already exists
    /// - [`FilesError::WriteFailed`] if the payload cannot be written
    /// - [`FilesError::InvalidPath`] if the URL cannot be derived (should be unreachable)
    pub fn store(&self, request: &UploadRequest<'_>) -> FilesResult<StoredObject> {
        if let Err(e) =
            TypeValidator::check(request.mime_type, request.original_name, request.category)
        {
            tracing::warn!(
                category = %request.category,
                mime_type = request.mime_type,
                "rejected upload with unsupported type"
            );
            return Err(e);
        }

        let dir = self.target_dir(request)?;
        ensure_dir(&dir)?;

        let stored_filename = self.filenames.generate(request.original_name);
        let path = dir.join(&stored_filename);
        write_new(&path, request.bytes)?;

        let public_url = self.paths.public_url_from(&path)?;

        let sha256 = hex::encode(Sha256::digest(request.bytes));
        let detected_media_type = infer::get(request.bytes).map(|kind| kind.mime_type().to_owned());
        if let Some(detected) = &detected_media_type {
            if *detected != normalise_mime(request.mime_type) {
                tracing::warn!(
                    path = %path.display(),
                    declared = request.mime_type,
                    detected = %detected,
                    "declared media type differs from file contents"
                );
            }
        }

        tracing::info!(
            path = %path.display(),
            category = %request.category,
            bytes = request.bytes.len(),
            "stored upload"
        );

        Ok(StoredObject {
            path,
            public_url,
            byte_size: request.bytes.len() as u64,
            stored_filename,
            category: request.category,
            sha256,
            detected_media_type,
        })
    }

    fn target_dir(&self, request: &UploadRequest<'_>) -> FilesResult<PathBuf> {
        let facility = FacilityId::parse(request.facility_id)?;
        let dir = match request.category {
            UploadCategory::Photo => {
                self.paths.photo_dir(&facility, &VisitDate::parse(request.period)?)
            }
            UploadCategory::Receipt => self
                .paths
                .receipt_dir(&facility, &ReceiptMonth::parse(request.period)?),
        };
        debug_assert!(dir.starts_with(self.paths.storage_root()));
        Ok(dir)
    }
}

/// Creates `dir` and any missing parents.
///
/// Safe to call concurrently for the same path: a directory that already exists, or that another
/// caller creates first, counts as success.
///
/// # Errors
///
/// Returns [`FilesError::DirectoryCreateFailed`] if the directory cannot be created, including
/// when a non-directory already occupies the path.
pub fn ensure_dir(dir: &Path) -> FilesResult<()> {
    match fs::create_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
        Err(source) => Err(FilesError::DirectoryCreateFailed {
            path: dir.to_path_buf(),
            source,
        }),
    }
}

/// Writes `bytes` to a file that must not exist yet.
///
/// A retention sweep may prune the freshly created, still empty target directory before the file
/// is opened. In that case the directory is recreated once and the open retried.
fn write_new(path: &Path, bytes: &[u8]) -> FilesResult<()> {
    let open = || OpenOptions::new().write(true).create_new(true).open(path);
    let opened = match (open(), path.parent()) {
        (Err(e), Some(dir)) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(dir = %dir.display(), "target directory vanished, recreating");
            ensure_dir(dir)?;
            open()
        }
        (result, _) => result,
    };

    let mut file = match opened {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            tracing::warn!(path = %path.display(), "generated filename already exists");
            return Err(FilesError::WriteConflict(path.to_path_buf()));
        }
        Err(source) => {
            return Err(FilesError::WriteFailed {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    if let Err(source) = file.write_all(bytes).and_then(|()| file.sync_all()) {
        drop(file);
        // We created this file, so removing the partial write cannot clobber anyone else's.
        if let Err(e) = fs::remove_file(path) {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove partial upload");
        }
        return Err(FilesError::WriteFailed {
            path: path.to_path_buf(),
            source,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filename::RandomSource;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    const PNG_HEADER: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    /// Always produces the same bytes, so every generated name in a millisecond collides.
    struct ConstantSource;

    impl RandomSource for ConstantSource {
        fn fill_bytes(&self, dest: &mut [u8]) {
            dest.fill(0x11);
        }
    }

    fn photo_request(bytes: &[u8]) -> UploadRequest<'_> {
        UploadRequest {
            bytes,
            original_name: "Before.PNG",
            mime_type: "image/png",
            category: UploadCategory::Photo,
            facility_id: "42",
            period: "2024-03-15",
        }
    }

    fn count_files(dir: &Path) -> usize {
        if !dir.exists() {
            return 0;
        }
        fs::read_dir(dir)
            .unwrap()
            .map(|e| {
                let e = e.unwrap();
                if e.file_type().unwrap().is_dir() {
                    count_files(&e.path())
                } else {
                    1
                }
            })
            .sum()
    }

    #[test]
    fn test_store_photo_success() {
        let temp = TempDir::new().unwrap();
        let store = BlobStore::new(PathPolicy::new(temp.path(), None));

        let stored = store.store(&photo_request(&PNG_HEADER)).unwrap();

        let expected_dir = temp.path().join("photos").join("42").join("2024-03-15");
        assert_eq!(stored.path.parent(), Some(expected_dir.as_path()));
        assert!(stored.stored_filename.ends_with(".png"));
        assert_eq!(
            stored.public_url,
            format!("/photos/42/2024-03-15/{}", stored.stored_filename)
        );
        assert_eq!(stored.byte_size, 8);
        assert_eq!(stored.category, UploadCategory::Photo);
        assert_eq!(stored.detected_media_type.as_deref(), Some("image/png"));
        assert_eq!(stored.sha256.len(), 64);
        assert_eq!(fs::read(&stored.path).unwrap(), PNG_HEADER);
    }

    #[test]
    fn test_store_receipt_with_base_url() {
        let temp = TempDir::new().unwrap();
        let store = BlobStore::new(PathPolicy::new(
            temp.path(),
            Some("https://files.example.com".into()),
        ));

        let stored = store
            .store(&UploadRequest {
                bytes: b"%PDF-1.4 receipt",
                original_name: "march.pdf",
                mime_type: "application/pdf",
                category: UploadCategory::Receipt,
                facility_id: "42",
                period: "2024-03",
            })
            .unwrap();

        assert!(stored.path.starts_with(temp.path().join("receipts/42/2024-03")));
        assert!(stored
            .public_url
            .starts_with("https://files.example.com/receipts/42/2024-03/"));
    }

    #[test]
    fn test_store_into_existing_directory() {
        let temp = TempDir::new().unwrap();
        let store = BlobStore::new(PathPolicy::new(temp.path(), None));

        let first = store.store(&photo_request(b"one")).unwrap();
        let second = store.store(&photo_request(b"two")).unwrap();

        assert_ne!(first.path, second.path);
        assert_eq!(first.path.parent(), second.path.parent());
        assert_eq!(count_files(temp.path()), 2);
    }

    #[test]
    fn test_store_rejects_unsupported_type_without_writing() {
        let temp = TempDir::new().unwrap();
        let store = BlobStore::new(PathPolicy::new(temp.path(), None));

        let result = store.store(&UploadRequest {
            bytes: &PNG_HEADER,
            original_name: "receipt.png",
            mime_type: "image/png",
            category: UploadCategory::Receipt,
            facility_id: "42",
            period: "2024-03",
        });

        assert!(matches!(
            result,
            Err(FilesError::UnsupportedType {
                category: UploadCategory::Receipt
            })
        ));
        assert!(!temp.path().join("receipts").exists());
    }

    #[test]
    fn test_store_rejects_malformed_location() {
        let temp = TempDir::new().unwrap();
        let store = BlobStore::new(PathPolicy::new(temp.path(), None));

        for (facility_id, period) in [("../42", "2024-03-15"), ("42", "2024-03"), ("42", "15/03/2024")] {
            let request = UploadRequest {
                facility_id,
                period,
                ..photo_request(b"x")
            };
            assert!(
                matches!(store.store(&request), Err(FilesError::InvalidLocationArgs(_))),
                "expected rejection for {} / {}",
                facility_id,
                period
            );
        }
        assert_eq!(count_files(temp.path()), 0);
    }

    #[test]
    fn test_store_receipt_requires_month() {
        let temp = TempDir::new().unwrap();
        let store = BlobStore::new(PathPolicy::new(temp.path(), None));

        let result = store.store(&UploadRequest {
            bytes: b"%PDF",
            original_name: "r.pdf",
            mime_type: "application/pdf",
            category: UploadCategory::Receipt,
            facility_id: "42",
            period: "2024-03-15",
        });

        assert!(matches!(result, Err(FilesError::InvalidLocationArgs(_))));
    }

    #[test]
    fn test_store_conflict_does_not_overwrite() {
        let temp = TempDir::new().unwrap();
        let paths = PathPolicy::new(temp.path(), None);
        let filenames = FilenameGenerator::with_source(Arc::new(ConstantSource));
        let store = BlobStore::with_filename_generator(paths.clone(), filenames.clone());

        let first = store.store(&photo_request(b"original")).unwrap();

        // Same random suffix and an existing file at every timestamp the second call could pick.
        let dir = first.path.parent().unwrap().to_path_buf();
        let now = chrono::Utc::now();
        for offset in 0..=2_000 {
            let at = now + chrono::Duration::milliseconds(offset);
            let name = filenames.generate_at("Before.PNG", at);
            let path = dir.join(name);
            if !path.exists() {
                fs::write(&path, b"placeholder").unwrap();
            }
        }

        let result = store.store(&photo_request(b"replacement"));

        assert!(matches!(result, Err(FilesError::WriteConflict(_))));
        assert_eq!(fs::read(&first.path).unwrap(), b"original");
    }

    /// Runs a full retention sweep while the store is generating a name, i.e. after the target
    /// directory has been created but before the payload is written.
    struct SweepingSource {
        storage_root: PathBuf,
        removed_dirs: AtomicUsize,
    }

    impl RandomSource for SweepingSource {
        fn fill_bytes(&self, dest: &mut [u8]) {
            let report = crate::retention::sweep(&self.storage_root, 60, chrono::Utc::now());
            self.removed_dirs
                .fetch_add(report.removed_dirs, Ordering::SeqCst);
            dest.fill(0x07);
        }
    }

    #[test]
    fn test_store_survives_sweep_pruning_target_directory() {
        let temp = TempDir::new().unwrap();
        let source = Arc::new(SweepingSource {
            storage_root: temp.path().to_path_buf(),
            removed_dirs: AtomicUsize::new(0),
        });
        let store = BlobStore::with_filename_generator(
            PathPolicy::new(temp.path(), None),
            FilenameGenerator::with_source(source.clone()),
        );

        let stored = store.store(&photo_request(&PNG_HEADER)).unwrap();

        assert_eq!(source.removed_dirs.load(Ordering::SeqCst), 2);
        assert_eq!(fs::read(&stored.path).unwrap(), PNG_HEADER);
        assert!(stored
            .path
            .starts_with(temp.path().join("photos/42/2024-03-15")));
    }

    #[test]
    fn test_serialized_stored_object_round_trips() {
        let temp = TempDir::new().unwrap();
        let store = BlobStore::new(PathPolicy::new(temp.path(), None));
        let stored = store.store(&photo_request(&PNG_HEADER)).unwrap();

        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["category"], "photo");
        assert_eq!(json["detected_media_type"], "image/png");

        let restored: StoredObject = serde_json::from_value(json).unwrap();
        assert_eq!(restored, stored);
    }

    #[test]
    fn test_store_directory_blocked_by_file() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("photos")).unwrap();
        fs::write(temp.path().join("photos").join("42"), b"not a directory").unwrap();
        let store = BlobStore::new(PathPolicy::new(temp.path(), None));

        let result = store.store(&photo_request(b"x"));

        assert!(matches!(result, Err(FilesError::DirectoryCreateFailed { .. })));
    }

    #[test]
    fn test_ensure_dir_is_idempotent_and_concurrent() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("photos").join("7").join("2024-01-01");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let dir = dir.clone();
                std::thread::spawn(move || ensure_dir(&dir))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        ensure_dir(&dir).unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    fn test_concurrent_stores_do_not_collide() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(BlobStore::new(PathPolicy::new(temp.path(), None)));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let payload = vec![i as u8; 32];
                    (0..25)
                        .map(|_| store.store(&photo_request(&payload)).map(|s| s.path))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut paths = std::collections::HashSet::new();
        for handle in handles {
            for path in handle.join().unwrap() {
                assert!(paths.insert(path.unwrap()));
            }
        }
        assert_eq!(count_files(temp.path()), 200);
    }
}
