//! Upload categories and their type allow-lists.
//!
//! A client declares a MIME type and supplies a filename. Neither is trustworthy alone: the MIME
//! type is client-asserted, and an extension says nothing about what the client claims the bytes
//! are. [`TypeValidator`] therefore requires both to be on the category's allow-list.

use crate::constants::{PHOTOS_DIR_NAME, RECEIPTS_DIR_NAME};
use crate::filename::extension_of;
use crate::{FilesError, FilesResult};
use std::fmt;
use std::str::FromStr;

/// The kind of file being uploaded. Each category has its own subtree and allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadCategory {
    /// Before/after photos of a cleaning visit. Expire after the retention window.
    Photo,
    /// Purchase receipts. Never expire.
    Receipt,
}

impl UploadCategory {
    pub const ALL: [UploadCategory; 2] = [UploadCategory::Photo, UploadCategory::Receipt];

    pub fn as_str(self) -> &'static str {
        match self {
            UploadCategory::Photo => "photo",
            UploadCategory::Receipt => "receipt",
        }
    }

    /// Directory directly under the storage root that holds this category.
    pub fn dir_name(self) -> &'static str {
        match self {
            UploadCategory::Photo => PHOTOS_DIR_NAME,
            UploadCategory::Receipt => RECEIPTS_DIR_NAME,
        }
    }

    /// Accepted MIME types, lowercase and without parameters.
    pub fn allowed_mime_types(self) -> &'static [&'static str] {
        match self {
            UploadCategory::Photo => &["image/jpeg", "image/png", "image/webp"],
            UploadCategory::Receipt => &["application/pdf"],
        }
    }

    /// Accepted extensions, lowercase and without the leading dot.
    pub fn allowed_extensions(self) -> &'static [&'static str] {
        match self {
            UploadCategory::Photo => &["jpg", "jpeg", "png", "webp"],
            UploadCategory::Receipt => &["pdf"],
        }
    }

    /// Message shown to the uploader when a file is rejected for this category.
    pub fn rejection_message(self) -> &'static str {
        match self {
            UploadCategory::Photo => "only JPEG/PNG/WebP images are accepted",
            UploadCategory::Receipt => "only PDF receipts are accepted",
        }
    }
}

impl fmt::Display for UploadCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a category name is neither `photo` nor `receipt`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown upload category '{0}'")]
pub struct UnknownCategory(pub String);

impl FromStr for UploadCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "photo" => Ok(UploadCategory::Photo),
            "receipt" => Ok(UploadCategory::Receipt),
            _ => Err(UnknownCategory(s.to_owned())),
        }
    }
}

/// Double check of declared MIME type and filename extension against a category.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeValidator;

impl TypeValidator {
    /// Returns true only if both the MIME type and the extension of `filename` are allowed.
    ///
    /// MIME types are compared case-insensitively with any parameters (`; charset=...`) removed.
    pub fn accepts(mime_type: &str, filename: &str, category: UploadCategory) -> bool {
        let mime = normalise_mime(mime_type);
        let mime_ok = category.allowed_mime_types().contains(&mime.as_str());

        let ext_ok = extension_of(filename)
            .is_some_and(|ext| category.allowed_extensions().contains(&ext.as_str()));

        mime_ok && ext_ok
    }

    /// Like [`TypeValidator::accepts`], for a category given by name. Unknown names reject.
    pub fn accepts_named(mime_type: &str, filename: &str, category: &str) -> bool {
        category
            .parse::<UploadCategory>()
            .is_ok_and(|category| Self::accepts(mime_type, filename, category))
    }

    /// [`TypeValidator::accepts`] as a `Result`, for use with `?`.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::UnsupportedType`] when the pair is rejected.
    pub fn check(mime_type: &str, filename: &str, category: UploadCategory) -> FilesResult<()> {
        if Self::accepts(mime_type, filename, category) {
            Ok(())
        } else {
            Err(FilesError::UnsupportedType { category })
        }
    }
}

/// Lowercases a MIME type and strips parameters and surrounding whitespace.
pub(crate) fn normalise_mime(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_allowed_pair_is_accepted() {
        for category in UploadCategory::ALL {
            for mime in category.allowed_mime_types() {
                for ext in category.allowed_extensions() {
                    let filename = format!("scan.{}", ext);
                    assert!(
                        TypeValidator::accepts(mime, &filename, category),
                        "{} / {} should be accepted for {}",
                        mime,
                        filename,
                        category
                    );
                }
            }
        }
    }

    #[test]
    fn test_mime_allowed_but_extension_not() {
        assert!(!TypeValidator::accepts("image/jpeg", "photo.gif", UploadCategory::Photo));
        assert!(!TypeValidator::accepts("image/png", "photo.pdf", UploadCategory::Photo));
        assert!(!TypeValidator::accepts("image/webp", "photo", UploadCategory::Photo));
        assert!(!TypeValidator::accepts("application/pdf", "receipt.png", UploadCategory::Receipt));
    }

    #[test]
    fn test_extension_allowed_but_mime_not() {
        assert!(!TypeValidator::accepts("image/gif", "photo.jpg", UploadCategory::Photo));
        assert!(!TypeValidator::accepts("application/pdf", "photo.png", UploadCategory::Photo));
        assert!(!TypeValidator::accepts("image/png", "receipt.pdf", UploadCategory::Receipt));
        assert!(!TypeValidator::accepts("", "receipt.pdf", UploadCategory::Receipt));
    }

    #[test]
    fn test_categories_do_not_share_allow_lists() {
        assert!(!TypeValidator::accepts("application/pdf", "r.pdf", UploadCategory::Photo));
        assert!(!TypeValidator::accepts("image/jpeg", "p.jpg", UploadCategory::Receipt));
    }

    #[test]
    fn test_case_and_parameters_are_ignored() {
        assert!(TypeValidator::accepts("IMAGE/JPEG", "BEFORE.JPG", UploadCategory::Photo));
        assert!(TypeValidator::accepts(
            " application/pdf; name=receipt.pdf",
            "Receipt.PDF",
            UploadCategory::Receipt
        ));
    }

    #[test]
    fn test_unknown_category_rejects() {
        assert!(TypeValidator::accepts_named("image/jpeg", "a.jpg", "photo"));
        assert!(TypeValidator::accepts_named("image/jpeg", "a.jpg", "Photo"));
        assert!(!TypeValidator::accepts_named("image/jpeg", "a.jpg", "avatar"));
        assert!(!TypeValidator::accepts_named("image/jpeg", "a.jpg", ""));
    }

    #[test]
    fn test_check_reports_category() {
        let err = TypeValidator::check("text/plain", "notes.txt", UploadCategory::Photo).unwrap_err();
        assert!(matches!(
            err,
            FilesError::UnsupportedType {
                category: UploadCategory::Photo
            }
        ));
        assert!(err.to_string().contains("only JPEG/PNG/WebP images are accepted"));
    }

    #[test]
    fn test_category_parse_and_dirs() {
        assert_eq!("receipt".parse::<UploadCategory>().unwrap(), UploadCategory::Receipt);
        assert!("invoice".parse::<UploadCategory>().is_err());
        assert_eq!(UploadCategory::Photo.dir_name(), "photos");
        assert_eq!(UploadCategory::Receipt.dir_name(), "receipts");
    }
}
