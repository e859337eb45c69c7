//! Photo retention sweep.
//!
//! A sweep walks `<root>/photos` depth-first, deletes regular files whose modification time is
//! strictly older than `now - retention_days`, and removes directories left empty by that, so the
//! tree does not accumulate empty facility and date shells.
//!
//! # Guarantees
//!
//! - Only the photos subtree is opened. Receipts are excluded by construction, not by age.
//! - Symbolic links are never followed or deleted.
//! - Directories are removed with [`fs::remove_dir`] only, which never deletes a directory that is
//!   non-empty at the moment of removal. An upload whose target directory is pruned before its
//!   file lands recreates the directory itself.
//! - A missing photos root is a no-op.
//! - A failure to read or delete one entry is logged and that branch is skipped. The sweep never
//!   returns an error.
//! - Running a sweep twice with no changes in between deletes nothing the second time.
//!
//! Abandoning a sweep part-way (for example at shutdown) leaves a valid tree; the next sweep
//! finishes the job.

use crate::paths::PathPolicy;
use chrono::{DateTime, Duration, Utc};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct SweepReport {
    /// Files strictly older than this instant were eligible for deletion
    pub cutoff: DateTime<Utc>,
    pub deleted_files: usize,
    pub removed_dirs: usize,
    /// Entries that could not be read or deleted and were skipped
    pub failed_entries: usize,
}

impl SweepReport {
    fn empty(cutoff: DateTime<Utc>) -> Self {
        Self {
            cutoff,
            deleted_files: 0,
            removed_dirs: 0,
            failed_entries: 0,
        }
    }

    pub fn deleted_count(&self) -> usize {
        self.deleted_files
    }
}

/// `now` minus `retention_days` whole days, clamped to the earliest representable instant.
pub fn retention_cutoff(now: DateTime<Utc>, retention_days: u32) -> DateTime<Utc> {
    now.checked_sub_signed(Duration::days(i64::from(retention_days)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Deletes expired photos under `storage_root`.
pub fn sweep(storage_root: &Path, retention_days: u32, now: DateTime<Utc>) -> SweepReport {
    RetentionSweeper::new(&PathPolicy::new(storage_root, None), retention_days).sweep_at(now)
}

/// Expires photos older than the retention window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionSweeper {
    photos_root: PathBuf,
    retention_days: u32,
}

impl RetentionSweeper {
    pub fn new(paths: &PathPolicy, retention_days: u32) -> Self {
        Self {
            photos_root: paths.photos_root(),
            retention_days,
        }
    }

    pub fn retention_days(&self) -> u32 {
        self.retention_days
    }

    pub fn photos_root(&self) -> &Path {
        &self.photos_root
    }

    /// Sweeps with the current time.
    pub fn sweep(&self) -> SweepReport {
        self.sweep_at(Utc::now())
    }

    /// Sweeps as if the current time were `now`. The cutoff is recomputed on every call.
    pub fn sweep_at(&self, now: DateTime<Utc>) -> SweepReport {
        let cutoff = retention_cutoff(now, self.retention_days);
        let mut report = SweepReport::empty(cutoff);

        match fs::symlink_metadata(&self.photos_root) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                tracing::warn!(
                    path = %self.photos_root.display(),
                    "photos root is not a directory, skipping sweep"
                );
                return report;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(
                    path = %self.photos_root.display(),
                    "photos root does not exist yet, nothing to sweep"
                );
                return report;
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.photos_root.display(),
                    error = %e,
                    "cannot inspect photos root, skipping sweep"
                );
                report.failed_entries = 1;
                return report;
            }
        }

        // The photos root itself is kept even when it ends up empty.
        let summary = sweep_dir(&self.photos_root, SystemTime::from(cutoff));
        report.deleted_files = summary.deleted_files;
        report.removed_dirs = summary.removed_dirs;
        report.failed_entries = summary.failed_entries;

        tracing::info!(
            cutoff = %cutoff,
            deleted_files = report.deleted_files,
            removed_dirs = report.removed_dirs,
            failed_entries = report.failed_entries,
            "photo retention sweep finished"
        );
        report
    }
}

/// Per-directory result of [`sweep_dir`].
#[derive(Debug, Default)]
struct DirSummary {
    deleted_files: usize,
    removed_dirs: usize,
    failed_entries: usize,
    /// Entries still present (or of unknown state) after the sweep
    remaining: usize,
}

impl DirSummary {
    fn is_empty(&self) -> bool {
        self.remaining == 0
    }

    fn absorb_counts(&mut self, child: &DirSummary) {
        self.deleted_files += child.deleted_files;
        self.removed_dirs += child.removed_dirs;
        self.failed_entries += child.failed_entries;
    }
}

enum FileOutcome {
    Deleted,
    Kept,
    /// Already removed by someone else
    Gone,
    Failed,
}

/// Sweeps one directory, children first.
///
/// Subdirectories are swept and, if left empty, removed before this directory's own emptiness is
/// decided, so a chain of directories emptied by the sweep collapses in one pass.
fn sweep_dir(dir: &Path, cutoff: SystemTime) -> DirSummary {
    let mut summary = DirSummary::default();

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return summary,
        Err(e) => {
            tracing::warn!(path = %dir.display(), error = %e, "cannot read directory, skipping");
            summary.failed_entries += 1;
            summary.remaining += 1;
            return summary;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(path = %dir.display(), error = %e, "cannot read directory entry");
                summary.failed_entries += 1;
                summary.remaining += 1;
                continue;
            }
        };
        let path = entry.path();

        let file_type = match entry.file_type() {
            Ok(file_type) => file_type,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot stat entry");
                summary.failed_entries += 1;
                summary.remaining += 1;
                continue;
            }
        };

        if file_type.is_dir() {
            let child = sweep_dir(&path, cutoff);
            summary.absorb_counts(&child);
            if !child.is_empty() || !remove_empty_dir(&path, &mut summary) {
                summary.remaining += 1;
            }
        } else if file_type.is_file() {
            match sweep_file(&path, &entry, cutoff) {
                FileOutcome::Deleted => summary.deleted_files += 1,
                FileOutcome::Gone => {}
                FileOutcome::Kept => summary.remaining += 1,
                FileOutcome::Failed => {
                    summary.failed_entries += 1;
                    summary.remaining += 1;
                }
            }
        } else {
            // Symlinks and special files are left alone.
            summary.remaining += 1;
        }
    }

    summary
}

/// Returns true if the directory no longer exists afterwards.
fn remove_empty_dir(path: &Path, summary: &mut DirSummary) -> bool {
    match fs::remove_dir(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "pruned empty directory");
            summary.removed_dirs += 1;
            true
        }
        Err(e) if e.kind() == ErrorKind::NotFound => true,
        Err(e) => {
            let gained_entries = fs::read_dir(path)
                .map(|mut entries| entries.next().is_some())
                .unwrap_or(false);
            if gained_entries {
                tracing::debug!(path = %path.display(), "directory received new entries during sweep");
            } else {
                tracing::warn!(path = %path.display(), error = %e, "cannot remove empty directory");
                summary.failed_entries += 1;
            }
            false
        }
    }
}

fn sweep_file(path: &Path, entry: &fs::DirEntry, cutoff: SystemTime) -> FileOutcome {
    let modified = match entry.metadata().and_then(|meta| meta.modified()) {
        Ok(modified) => modified,
        Err(e) if e.kind() == ErrorKind::NotFound => return FileOutcome::Gone,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot read modification time");
            return FileOutcome::Failed;
        }
    };

    if modified >= cutoff {
        return FileOutcome::Kept;
    }

    match fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "deleted expired photo");
            FileOutcome::Deleted
        }
        Err(e) if e.kind() == ErrorKind::NotFound => FileOutcome::Gone,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot delete expired photo");
            FileOutcome::Failed
        }
    }
}
