//! Intake filter
//!
//! Screens an upload's declared metadata before a single byte is written.
//! Gates run in a fixed order and the first failure wins:
//!
//! 1. declared type is allowed
//! 2. file name has an extension
//! 3. extension is allowed
//! 4. extension belongs to the declared type's kind
//! 5. file name is not dangerous
//! 6. file name is at most [`MAX_FILE_NAME_LEN`] characters and not empty
//!
//! # Examples
//!
//! ```rust
//! use image_intake::storage::{IntakeFilter, MediaKind, MediaPolicy, Rejection, UploadCandidate};
//!
//! let filter = IntakeFilter::new(MediaPolicy::strict());
//!
//! let approval = filter.admit(UploadCandidate::new("cat.JPG", "image/jpeg"))?;
//! assert_eq!(approval.kind, MediaKind::Jpeg);
//! assert!(approval.stored_name.ends_with(".jpg"));
//!
//! let rejected = filter.admit(UploadCandidate::new("cat.png", "image/jpeg"));
//! assert!(matches!(rejected, Err(Rejection::TypeExtensionMismatch { .. })));
//! # Ok::<(), Rejection>(())
//! ```

use super::media::MediaPolicy;
use super::naming::{self, NamePolicy, MAX_FILE_NAME_LEN};
use super::types::{IntakeApproval, Rejection, UploadCandidate};

/// Metadata gate in front of storage
#[derive(Debug, Clone, Copy, Default)]
pub struct IntakeFilter {
    names: NamePolicy,
}

impl IntakeFilter {
    /// Creates a filter over the given media policy
    #[must_use]
    pub const fn new(media: MediaPolicy) -> Self {
        Self {
            names: NamePolicy::new(media),
        }
    }

    /// Name policy used by this filter
    #[must_use]
    pub const fn names(&self) -> &NamePolicy {
        &self.names
    }

    /// Admits or rejects a candidate from its declared metadata alone
    ///
    /// # Errors
    ///
    /// Returns the [`Rejection`] of the first gate that fails.
    pub fn admit(&self, candidate: UploadCandidate) -> Result<IntakeApproval, Rejection> {
        let name = candidate.original_name.as_str();
        let declared_type = candidate.declared_type.as_str();

        let kind = self
            .names
            .media()
            .kind_for_declared_type(declared_type)
            .ok_or_else(|| Rejection::DeclaredTypeNotAllowed(declared_type.to_string()))?;

        let extension =
            naming::classify_extension(name).ok_or(Rejection::MissingOrDisallowedExtension)?;

        if !self.names.is_extension_allowed(&extension) {
            // A final extension like `.php` is the more specific failure
            if naming::has_dangerous_name(name) {
                return Err(Rejection::DangerousFileName);
            }
            return Err(Rejection::MissingOrDisallowedExtension);
        }

        if !self
            .names
            .is_extension_consistent_with_declared_type(&extension, declared_type)
        {
            return Err(Rejection::TypeExtensionMismatch {
                extension,
                declared_type: declared_type.to_string(),
            });
        }

        if naming::has_dangerous_name(name) {
            return Err(Rejection::DangerousFileName);
        }

        let length = name.chars().count();
        if length > MAX_FILE_NAME_LEN {
            return Err(Rejection::FileNameTooLong {
                actual: length,
                limit: MAX_FILE_NAME_LEN,
            });
        }

        let trimmed = name.trim();
        let stem = trimmed.rsplit_once('.').map_or(trimmed, |(stem, _)| stem);
        if stem.trim().is_empty() {
            return Err(Rejection::EmptyFileName);
        }

        let stored_name = self.names.generate_stored_name(kind, &extension);
        Ok(IntakeApproval {
            candidate,
            kind,
            stored_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MediaKind;

    fn admit(name: &str, declared_type: &str) -> Result<IntakeApproval, Rejection> {
        IntakeFilter::new(MediaPolicy::strict()).admit(UploadCandidate::new(name, declared_type))
    }

    #[test]
    fn test_admits_each_kind() {
        assert_eq!(admit("a.png", "image/png").unwrap().kind, MediaKind::Png);
        assert_eq!(admit("a.jpeg", "image/jpeg").unwrap().kind, MediaKind::Jpeg);
        assert_eq!(admit("a.jpg", "image/jpg").unwrap().kind, MediaKind::Jpeg);
        assert_eq!(admit("a.gif", "image/gif").unwrap().kind, MediaKind::Gif);
    }

    #[test]
    fn test_approval_keeps_candidate() {
        let approval = admit("Holiday.PNG", "image/png").unwrap();
        assert_eq!(approval.candidate.original_name, "Holiday.PNG");
        assert!(approval.stored_name.ends_with(".png"));
        assert!(!approval.stored_name.contains("Holiday"));
    }

    #[test]
    fn test_declared_type_gate_runs_first() {
        // Would also fail every later gate
        let result = admit("../x.php", "text/html");
        assert!(matches!(result, Err(Rejection::DeclaredTypeNotAllowed(t)) if t == "text/html"));
    }

    #[test]
    fn test_missing_extension() {
        assert!(matches!(
            admit("README", "image/png"),
            Err(Rejection::MissingOrDisallowedExtension)
        ));
        assert!(matches!(
            admit("photo.", "image/png"),
            Err(Rejection::MissingOrDisallowedExtension)
        ));
    }

    #[test]
    fn test_disallowed_extension() {
        assert!(matches!(
            admit("photo.bmp", "image/png"),
            Err(Rejection::MissingOrDisallowedExtension)
        ));
    }

    #[test]
    fn test_type_extension_mismatch() {
        let result = admit("a.gif", "image/png");
        assert!(matches!(
            result,
            Err(Rejection::TypeExtensionMismatch { extension, declared_type })
                if extension == "gif" && declared_type == "image/png"
        ));
    }

    #[test]
    fn test_double_extension_is_dangerous() {
        assert!(matches!(
            admit("photo.jpg.php", "image/jpeg"),
            Err(Rejection::DangerousFileName)
        ));
        assert!(matches!(
            admit("shell.php.jpg", "image/jpeg"),
            Err(Rejection::DangerousFileName)
        ));
    }

    #[test]
    fn test_traversal_is_dangerous() {
        assert!(matches!(
            admit("../../etc/cron.png", "image/png"),
            Err(Rejection::DangerousFileName)
        ));
        assert!(matches!(
            admit("nul.png", "image/png"),
            Err(Rejection::DangerousFileName)
        ));
    }

    #[test]
    fn test_name_length_limit() {
        let at_limit = format!("{}.png", "a".repeat(MAX_FILE_NAME_LEN - 4));
        assert!(admit(&at_limit, "image/png").is_ok());

        let over_limit = format!("{}.png", "a".repeat(MAX_FILE_NAME_LEN));
        assert!(matches!(
            admit(&over_limit, "image/png"),
            Err(Rejection::FileNameTooLong { actual, limit })
                if actual == MAX_FILE_NAME_LEN + 4 && limit == MAX_FILE_NAME_LEN
        ));
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        // 200 two-byte characters is 400 bytes but only 204 characters
        let name = format!("{}.png", "é".repeat(200));
        assert!(admit(&name, "image/png").is_ok());
    }

    #[test]
    fn test_empty_stem() {
        assert!(matches!(admit(".png", "image/png"), Err(Rejection::EmptyFileName)));
        assert!(matches!(admit("   .png", "image/png"), Err(Rejection::EmptyFileName)));
    }

    #[test]
    fn test_svg_requires_opt_in() {
        assert!(matches!(
            admit("logo.svg", "image/svg+xml"),
            Err(Rejection::DeclaredTypeNotAllowed(_))
        ));

        let filter = IntakeFilter::new(MediaPolicy::with_svg());
        let approval = filter
            .admit(UploadCandidate::new("logo.svg", "image/svg+xml"))
            .unwrap();
        assert_eq!(approval.kind, MediaKind::Svg);
    }
}
