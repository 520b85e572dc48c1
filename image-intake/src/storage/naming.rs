//! File name policy
//!
//! Decides whether a client-supplied file name and declared content type are
//! acceptable on their own and together, and generates the name the file is
//! actually stored under.
//!
//! The stored name never contains client-controlled text: it is a random
//! identifier plus an extension string taken from the policy table.
//!
//! # Examples
//!
//! ```rust
//! use image_intake::storage::naming::{self, NamePolicy};
//! use image_intake::storage::{MediaKind, MediaPolicy};
//!
//! let policy = NamePolicy::new(MediaPolicy::strict());
//!
//! assert_eq!(naming::classify_extension("holiday.JPG").as_deref(), Some("jpg"));
//! assert!(policy.is_extension_consistent_with_declared_type("jpg", "image/jpeg"));
//! assert!(!policy.is_extension_consistent_with_declared_type("png", "image/jpeg"));
//!
//! // Double extensions are caught even when the final one is allowed
//! assert!(naming::has_dangerous_name("photo.jpg.php"));
//! assert!(naming::has_dangerous_name("photo.php.jpg"));
//!
//! let stored = policy.generate_stored_name(MediaKind::Jpeg, "jpeg");
//! assert!(stored.ends_with(".jpeg"));
//! ```

use super::media::{MediaKind, MediaPolicy};
use rand::Rng;

/// Longest accepted original file name, in characters
pub const MAX_FILE_NAME_LEN: usize = 255;

/// Bytes of randomness in a stored name (rendered as hex)
pub const STORED_NAME_ENTROPY_BYTES: usize = 16;

/// Extensions that a misconfigured server might execute or render as active
/// content, wherever they appear in a multi-dot name
const DANGEROUS_EXTENSIONS: &[&str] = &[
    "php", "php3", "php4", "php5", "phtml", "phar", "exe", "js", "mjs", "html", "htm", "shtml",
    "xhtml", "asp", "aspx", "jsp", "jar", "war", "sh", "bat", "cmd", "ps1", "cgi", "pl", "py",
];

/// Characters never allowed in an original file name
const FORBIDDEN_CHARS: &[char] = &['/', '\\', '<', '>', ':', '"', '|', '?', '*'];

/// Extracts the lowercase extension after the final `.`
///
/// Returns `None` when the name has no dot or ends with one.
#[must_use]
pub fn classify_extension(name: &str) -> Option<String> {
    let (_, extension) = name.rsplit_once('.')?;
    if extension.is_empty() {
        return None;
    }
    Some(extension.to_ascii_lowercase())
}

/// Returns true if `name` could escape the storage directory, address a
/// device, or smuggle an executable extension
///
/// Checks, in order:
/// - `..` anywhere in the name
/// - path separators and the characters `< > : " | ? *`
/// - control characters
/// - reserved Windows device names (`CON`, `NUL`, `COM1`, ...) as the stem
/// - a dangerous extension in any dot-separated segment after the stem
#[must_use]
pub fn has_dangerous_name(name: &str) -> bool {
    if name.contains("..") {
        return true;
    }

    if name
        .chars()
        .any(|c| c.is_control() || FORBIDDEN_CHARS.contains(&c))
    {
        return true;
    }

    let lowered = name.to_ascii_lowercase();
    let mut segments = lowered.split('.');
    let stem = segments.next().unwrap_or_default();
    if is_reserved_device_name(stem.trim_end()) {
        return true;
    }

    segments.any(|segment| DANGEROUS_EXTENSIONS.contains(&segment.trim()))
}

/// Returns true for `con`, `prn`, `aux`, `nul`, `com0`-`com9` and `lpt0`-`lpt9`
fn is_reserved_device_name(stem: &str) -> bool {
    match stem {
        "con" | "prn" | "aux" | "nul" => true,
        _ => {
            let bytes = stem.as_bytes();
            bytes.len() == 4
                && (stem.starts_with("com") || stem.starts_with("lpt"))
                && bytes[3].is_ascii_digit()
        }
    }
}

/// Name and declared-type checks bound to a media policy
#[derive(Debug, Clone, Copy, Default)]
pub struct NamePolicy {
    media: MediaPolicy,
}

impl NamePolicy {
    /// Creates a name policy over the given media policy
    #[must_use]
    pub const fn new(media: MediaPolicy) -> Self {
        Self { media }
    }

    /// The media policy these checks consult
    #[must_use]
    pub const fn media(&self) -> &MediaPolicy {
        &self.media
    }

    /// Whether the declared content type belongs to an enabled kind
    #[must_use]
    pub fn is_declared_type_allowed(&self, declared_type: &str) -> bool {
        self.media.kind_for_declared_type(declared_type).is_some()
    }

    /// Whether the extension belongs to an enabled kind
    #[must_use]
    pub fn is_extension_allowed(&self, extension: &str) -> bool {
        self.media.allows_extension(extension)
    }

    /// Whether the extension belongs to the kind that the declared type maps to
    ///
    /// This is a cross-check, not two independent allow-lists: `image/png`
    /// with `.jpg` fails even though both are allowed on their own.
    #[must_use]
    pub fn is_extension_consistent_with_declared_type(
        &self,
        extension: &str,
        declared_type: &str,
    ) -> bool {
        self.media
            .kind_for_declared_type(declared_type)
            .is_some_and(|kind| kind.accepts_extension(extension))
    }

    /// Generates a collision-resistant stored name
    ///
    /// The name is 16 random bytes in hex followed by one of `kind`'s own
    /// extension strings: the one matching `original_extension` if there is
    /// one, otherwise the canonical extension.
    #[must_use]
    pub fn generate_stored_name(&self, kind: MediaKind, original_extension: &str) -> String {
        let extension = kind
            .extensions()
            .iter()
            .find(|ext| ext.eq_ignore_ascii_case(original_extension))
            .copied()
            .unwrap_or_else(|| kind.canonical_extension());

        let id: [u8; STORED_NAME_ENTROPY_BYTES] = rand::rng().random();
        format!("{}.{extension}", hex::encode(id))
    }
}
