//! Directory names and sizes shared across the storage modules.

/// Directory under the storage root that holds photo uploads.
pub const PHOTOS_DIR_NAME: &str = "photos";

/// Directory under the storage root that holds receipt uploads.
pub const RECEIPTS_DIR_NAME: &str = "receipts";

/// Number of random bytes in a generated filename (hex-encoded, so twice as many characters).
pub const RANDOM_SUFFIX_BYTES: usize = 16;

/// Longest extension carried over from an original filename.
pub(crate) const MAX_EXTENSION_LEN: usize = 16;
