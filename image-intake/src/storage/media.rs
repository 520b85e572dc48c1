//! Media kind policy table
//!
//! Every accepted image format is described exactly once, here. The intake
//! filter, the post-store validator and the stored-name generator all read
//! from [`POLICY_TABLE`] so the mapping between declared content types,
//! filename extensions and binary signatures cannot drift between stages.
//!
//! # Examples
//!
//! ```rust
//! use image_intake::storage::media::{MediaKind, MediaPolicy};
//!
//! let policy = MediaPolicy::strict();
//!
//! assert_eq!(policy.kind_for_declared_type("image/png"), Some(MediaKind::Png));
//! assert_eq!(policy.kind_for_declared_type("image/svg+xml"), None);
//! assert!(MediaKind::Jpeg.accepts_extension("jpeg"));
//! ```

use super::signature;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Version of the policy table
///
/// Bump whenever a kind, declared type or extension is added or removed so
/// log lines and responses can be correlated with the rules that produced them.
pub const POLICY_VERSION: u32 = 1;

/// A closed category of accepted image format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Portable Network Graphics
    Png,
    /// JPEG / JFIF
    Jpeg,
    /// Graphics Interchange Format
    Gif,
    /// Scalable Vector Graphics (opt-in, see [`MediaPolicy::with_svg`])
    Svg,
}

/// Signature matcher over the leading bytes of a file
pub type SignatureMatcher = fn(&[u8]) -> bool;

/// One row of the policy table
#[derive(Debug, Clone, Copy)]
pub struct KindRule {
    /// Kind described by this row
    pub kind: MediaKind,
    /// Accepted declared content types, lowercase essence only
    pub declared_types: &'static [&'static str],
    /// Accepted filename extensions, lowercase; the first entry is canonical
    pub extensions: &'static [&'static str],
    /// Content detector for this kind
    pub matcher: SignatureMatcher,
    /// How many leading bytes the matcher needs to see
    pub sniff_window: usize,
}

/// The policy table
///
/// Binary kinds come first and are matched in order; SVG is last because its
/// detector is a text scan rather than a fixed prefix.
pub static POLICY_TABLE: &[KindRule] = &[
    KindRule {
        kind: MediaKind::Png,
        declared_types: &["image/png"],
        extensions: &["png"],
        matcher: signature::is_png,
        sniff_window: signature::PNG_SIGNATURE.len(),
    },
    KindRule {
        kind: MediaKind::Jpeg,
        declared_types: &["image/jpeg", "image/jpg"],
        extensions: &["jpg", "jpeg"],
        matcher: signature::is_jpeg,
        sniff_window: signature::JPEG_SOI.len(),
    },
    KindRule {
        kind: MediaKind::Gif,
        declared_types: &["image/gif"],
        extensions: &["gif"],
        matcher: signature::is_gif,
        sniff_window: signature::GIF_SIGNATURE.len(),
    },
    KindRule {
        kind: MediaKind::Svg,
        declared_types: &["image/svg+xml"],
        extensions: &["svg"],
        matcher: signature::is_svg,
        sniff_window: signature::SVG_SNIFF_WINDOW,
    },
];

impl MediaKind {
    /// All kinds in table order
    pub const ALL: [Self; 4] = [Self::Png, Self::Jpeg, Self::Gif, Self::Svg];

    /// Returns this kind's row in the policy table
    #[must_use]
    pub fn rule(self) -> &'static KindRule {
        // The table has one row per variant, in declaration order.
        &POLICY_TABLE[self as usize]
    }

    /// Declared content types accepted for this kind
    #[must_use]
    pub fn declared_types(self) -> &'static [&'static str] {
        self.rule().declared_types
    }

    /// Filename extensions accepted for this kind
    #[must_use]
    pub fn extensions(self) -> &'static [&'static str] {
        self.rule().extensions
    }

    /// The extension used for stored files of this kind
    #[must_use]
    pub fn canonical_extension(self) -> &'static str {
        self.rule().extensions[0]
    }

    /// Whether `extension` (case-insensitive, without the dot) belongs to this kind
    #[must_use]
    pub fn accepts_extension(self, extension: &str) -> bool {
        self.extensions()
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(extension))
    }

    /// Runs this kind's signature matcher against `bytes`
    #[must_use]
    pub fn matches(self, bytes: &[u8]) -> bool {
        (self.rule().matcher)(bytes)
    }

    /// Number of leading bytes needed to classify a file of this kind
    #[must_use]
    pub fn sniff_window(self) -> usize {
        self.rule().sniff_window
    }

    /// Lowercase display name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Gif => "gif",
            Self::Svg => "svg",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which rows of the policy table are active for a deployment
///
/// The strict policy enables PNG, JPEG and GIF. SVG is text, can carry script,
/// and has no fixed magic prefix, so enabling it is an explicit decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaPolicy {
    allow_svg: bool,
}

impl Default for MediaPolicy {
    fn default() -> Self {
        Self::strict()
    }
}

impl MediaPolicy {
    /// PNG, JPEG and GIF only
    #[must_use]
    pub const fn strict() -> Self {
        Self { allow_svg: false }
    }

    /// Strict kinds plus SVG
    #[must_use]
    pub const fn with_svg() -> Self {
        Self { allow_svg: true }
    }

    /// Builds a policy from the `allow_svg` configuration flag
    #[must_use]
    pub const fn from_flags(allow_svg: bool) -> Self {
        Self { allow_svg }
    }

    /// Whether SVG uploads are enabled
    #[must_use]
    pub const fn allows_svg(&self) -> bool {
        self.allow_svg
    }

    /// Whether `kind` is enabled under this policy
    #[must_use]
    pub const fn is_enabled(&self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Png | MediaKind::Jpeg | MediaKind::Gif => true,
            MediaKind::Svg => self.allow_svg,
        }
    }

    /// Iterates over the enabled rows of the policy table
    pub fn rules(&self) -> impl Iterator<Item = &'static KindRule> + '_ {
        POLICY_TABLE.iter().filter(|rule| self.is_enabled(rule.kind))
    }

    /// Maps a declared content type to the enabled kind that owns it
    ///
    /// The declared type is reduced to its lowercase essence first, so
    /// `Image/PNG; charset=binary` maps to [`MediaKind::Png`].
    #[must_use]
    pub fn kind_for_declared_type(&self, declared_type: &str) -> Option<MediaKind> {
        let essence = normalize_declared_type(declared_type)?;
        self.rules()
            .find(|rule| rule.declared_types.contains(&essence.as_str()))
            .map(|rule| rule.kind)
    }

    /// Whether any enabled kind accepts `extension`
    #[must_use]
    pub fn allows_extension(&self, extension: &str) -> bool {
        self.rules().any(|rule| rule.kind.accepts_extension(extension))
    }

    /// Classifies `bytes` against the enabled kinds, first match wins
    #[must_use]
    pub fn sniff(&self, bytes: &[u8]) -> Option<MediaKind> {
        self.rules()
            .find(|rule| (rule.matcher)(bytes))
            .map(|rule| rule.kind)
    }
}

/// Reduces a declared content type to its lowercase `type/subtype` essence
///
/// Returns `None` when the value does not parse as a media type at all.
#[must_use]
pub fn normalize_declared_type(declared_type: &str) -> Option<String> {
    let parsed: mime::Mime = declared_type.trim().parse().ok()?;
    Some(parsed.essence_str().to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_rows_follow_variant_order() {
        for kind in MediaKind::ALL {
            assert_eq!(kind.rule().kind, kind);
        }
    }

    #[test]
    fn test_declared_types_are_unique_across_kinds() {
        let mut seen = Vec::new();
        for rule in POLICY_TABLE {
            for declared in rule.declared_types {
                assert!(!seen.contains(declared), "{declared} listed twice");
                seen.push(*declared);
            }
        }
    }

    #[test]
    fn test_extensions_are_unique_across_kinds() {
        let mut seen = Vec::new();
        for rule in POLICY_TABLE {
            for ext in rule.extensions {
                assert!(!seen.contains(ext), "{ext} listed twice");
                seen.push(*ext);
            }
        }
    }

    #[test]
    fn test_kind_for_declared_type() {
        let policy = MediaPolicy::strict();
        assert_eq!(policy.kind_for_declared_type("image/png"), Some(MediaKind::Png));
        assert_eq!(policy.kind_for_declared_type("image/jpg"), Some(MediaKind::Jpeg));
        assert_eq!(policy.kind_for_declared_type("IMAGE/GIF"), Some(MediaKind::Gif));
        assert_eq!(
            policy.kind_for_declared_type("image/jpeg; charset=binary"),
            Some(MediaKind::Jpeg)
        );
        assert_eq!(policy.kind_for_declared_type("application/x-php"), None);
        assert_eq!(policy.kind_for_declared_type("not a mime"), None);
        assert_eq!(policy.kind_for_declared_type(""), None);
    }

    #[test]
    fn test_svg_is_opt_in() {
        assert_eq!(MediaPolicy::strict().kind_for_declared_type("image/svg+xml"), None);
        assert!(!MediaPolicy::strict().allows_extension("svg"));

        let policy = MediaPolicy::with_svg();
        assert_eq!(policy.kind_for_declared_type("image/svg+xml"), Some(MediaKind::Svg));
        assert!(policy.allows_extension("SVG"));
    }

    #[test]
    fn test_canonical_extension() {
        assert_eq!(MediaKind::Png.canonical_extension(), "png");
        assert_eq!(MediaKind::Jpeg.canonical_extension(), "jpg");
        assert_eq!(MediaKind::Gif.canonical_extension(), "gif");
    }

    #[test]
    fn test_sniff_respects_enabled_kinds() {
        let svg = b"<svg xmlns=\"http://www.w3.org/2000/svg\"></svg>";
        assert_eq!(MediaPolicy::strict().sniff(svg), None);
        assert_eq!(MediaPolicy::with_svg().sniff(svg), Some(MediaKind::Svg));
    }
}
