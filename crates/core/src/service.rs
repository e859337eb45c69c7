//! Storage facade used by upload handlers.
//!
//! [`StorageService`] owns the configured [`BlobStore`] and [`RetentionSweeper`] and adds the
//! upload size guard that runs before any bytes reach the store.

use crate::config::StorageConfig;
use crate::{CoreError, CoreResult};
use facility_files::{
    BlobStore, FilenameGenerator, RetentionSweeper, StoredObject, SweepReport, UploadRequest,
};
use std::path::Path;

/// Storage operations for one configured storage root.
#[derive(Clone, Debug)]
pub struct StorageService {
    config: StorageConfig,
    store: BlobStore,
    sweeper: RetentionSweeper,
}

impl StorageService {
    pub fn new(config: StorageConfig) -> Self {
        Self::with_filename_generator(config, FilenameGenerator::new())
    }

    /// Creates a service whose store uses `filenames` (for injecting a deterministic source).
    pub fn with_filename_generator(config: StorageConfig, filenames: FilenameGenerator) -> Self {
        let paths = config.path_policy();
        let sweeper = RetentionSweeper::new(&paths, config.retention_days());
        let store = BlobStore::with_filename_generator(paths, filenames);

        Self {
            config,
            store,
            sweeper,
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn sweeper(&self) -> &RetentionSweeper {
        &self.sweeper
    }

    /// Rejects payloads larger than the configured maximum.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::PayloadTooLarge`] if `size` exceeds `max_file_mb` MiB.
    pub fn check_upload_size(&self, size: u64) -> CoreResult<()> {
        let limit = self.config.max_upload_bytes();
        if size > limit {
            return Err(CoreError::PayloadTooLarge { size, limit });
        }
        Ok(())
    }

    /// Size-checks and stores one upload.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::PayloadTooLarge`] before touching the filesystem, or any
    /// [`facility_files::FilesError`] from the store wrapped in [`CoreError::Files`].
    pub fn store_upload(&self, request: &UploadRequest<'_>) -> CoreResult<StoredObject> {
        if let Err(e) = self.check_upload_size(request.bytes.len() as u64) {
            tracing::warn!(
                category = %request.category,
                size = request.bytes.len(),
                "rejected oversized upload"
            );
            return Err(e);
        }
        Ok(self.store.store(request)?)
    }

    /// Public URL for a file under the storage root.
    pub fn public_url(&self, path: &Path) -> CoreResult<String> {
        Ok(self.store.paths().public_url_from(path)?)
    }

    /// Runs one retention sweep now, on the calling thread.
    pub fn sweep_now(&self) -> SweepReport {
        self.sweeper.sweep()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facility_files::{FilesError, UploadCategory};
    use std::time::Duration;
    use tempfile::TempDir;

    fn service(root: &Path, max_file_mb: u64) -> StorageService {
        let config = StorageConfig::new(
            root.to_path_buf(),
            60,
            None,
            max_file_mb,
            Duration::from_secs(60),
        )
        .unwrap();
        StorageService::new(config)
    }

    fn photo(bytes: &[u8]) -> UploadRequest<'_> {
        UploadRequest {
            bytes,
            original_name: "after.webp",
            mime_type: "image/webp",
            category: UploadCategory::Photo,
            facility_id: "12",
            period: "2024-07-04",
        }
    }

    #[test]
    fn test_store_upload_within_limit() {
        let temp = TempDir::new().unwrap();
        let service = service(temp.path(), 1);
        let payload = vec![0u8; 1024 * 1024];

        let stored = service.store_upload(&photo(&payload)).unwrap();

        assert_eq!(stored.byte_size, 1024 * 1024);
        assert!(stored.path.exists());
        assert_eq!(service.public_url(&stored.path).unwrap(), stored.public_url);
    }

    #[test]
    fn test_store_upload_one_byte_over_limit() {
        let temp = TempDir::new().unwrap();
        let service = service(temp.path(), 1);
        let payload = vec![0u8; 1024 * 1024 + 1];

        let result = service.store_upload(&photo(&payload));

        assert!(matches!(
            result,
            Err(CoreError::PayloadTooLarge {
                size: 1_048_577,
                limit: 1_048_576
            })
        ));
        assert!(!temp.path().join("photos").exists());
        assert_eq!(
            result.unwrap_err().user_message(),
            "file is too large (maximum 1 MB)"
        );
    }

    #[test]
    fn test_store_upload_surfaces_file_errors() {
        let temp = TempDir::new().unwrap();
        let service = service(temp.path(), 1);

        let err = service
            .store_upload(&UploadRequest {
                mime_type: "image/gif",
                original_name: "after.gif",
                ..photo(b"GIF89a")
            })
            .unwrap_err();

        assert!(matches!(
            err,
            CoreError::Files(FilesError::UnsupportedType { .. })
        ));
        assert_eq!(err.user_message(), "only JPEG/PNG/WebP images are accepted");
    }

    #[test]
    fn test_sweep_now_uses_configured_root() {
        let temp = TempDir::new().unwrap();
        let service = service(temp.path(), 1);
        service.store_upload(&photo(b"fresh")).unwrap();

        let report = service.sweep_now();

        assert_eq!(report.deleted_files, 0);
        assert_eq!(
            service.sweeper().photos_root(),
            temp.path().join("photos").as_path()
        );
    }
}
