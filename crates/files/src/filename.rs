//! Generated storage filenames.
//!
//! Stored files are named `<unix_millis>-<random_hex>.<ext>`. Only the extension of the
//! uploader's filename survives, and only after it has been lowercased and checked to be plain
//! ASCII alphanumerics. The original base name is never echoed, so separators, `..` and control
//! characters cannot reach the filesystem through it.
//!
//! The random part is [`RANDOM_SUFFIX_BYTES`] bytes, i.e. 32 hex characters. That is twice the
//! 16 characters of the older `<millis>-<16 hex>` naming, so anything parsing stored names must not
//! assume a fixed suffix width.

use crate::constants::{MAX_EXTENSION_LEN, RANDOM_SUFFIX_BYTES};
use chrono::{DateTime, Utc};
use rand::RngCore;
use std::fmt;
use std::sync::Arc;

/// Source of random bytes for filename suffixes.
///
/// Production code uses [`ThreadRngSource`]; tests can inject a deterministic source.
pub trait RandomSource: Send + Sync {
    fn fill_bytes(&self, dest: &mut [u8]);
}

/// [`RandomSource`] backed by the thread-local generator from `rand`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngSource;

impl RandomSource for ThreadRngSource {
    fn fill_bytes(&self, dest: &mut [u8]) {
        rand::thread_rng().fill_bytes(dest);
    }
}

/// Produces collision-resistant, extension-preserving filenames.
#[derive(Clone)]
pub struct FilenameGenerator {
    random: Arc<dyn RandomSource>,
}

impl Default for FilenameGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FilenameGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilenameGenerator").finish_non_exhaustive()
    }
}

impl FilenameGenerator {
    pub fn new() -> Self {
        Self::with_source(Arc::new(ThreadRngSource))
    }

    pub fn with_source(random: Arc<dyn RandomSource>) -> Self {
        Self { random }
    }

    /// Generates a filename for an upload whose client-side name was `original_name`.
    pub fn generate(&self, original_name: &str) -> String {
        self.generate_at(original_name, Utc::now())
    }

    /// Generates a filename using `at` for the timestamp prefix.
    ///
    /// The suffix carries [`RANDOM_SUFFIX_BYTES`] bytes of randomness, so two names generated in
    /// the same millisecond still differ with overwhelming probability.
    pub fn generate_at(&self, original_name: &str, at: DateTime<Utc>) -> String {
        let mut suffix = [0u8; RANDOM_SUFFIX_BYTES];
        self.random.fill_bytes(&mut suffix);

        let stem = format!("{}-{}", at.timestamp_millis(), hex::encode(suffix));
        match extension_of(original_name) {
            Some(ext) => format!("{}.{}", stem, ext),
            None => stem,
        }
    }
}

/// Returns the lowercase extension of `filename`, if it has a usable one.
///
/// Both `/` and `\` are treated as separators since client filenames may come from any OS.
/// Dotfiles such as `.jpg` have no extension, and extensions that are empty, overly long or
/// contain anything but ASCII alphanumerics are discarded.
pub fn extension_of(filename: &str) -> Option<String> {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let (stem, ext) = base.rsplit_once('.')?;

    if stem.is_empty()
        || ext.is_empty()
        || ext.len() > MAX_EXTENSION_LEN
        || !ext.bytes().all(|b| b.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
