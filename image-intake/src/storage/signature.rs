//! Content signature sniffing
//!
//! Classifies a byte buffer by its leading magic bytes, independently of any
//! client-provided file name or content type. This is a cheap header check,
//! not a decoder: a buffer that starts like a PNG is classified as a PNG.
//!
//! # Security
//!
//! **Never trust the declared content type alone.** The post-store validator
//! runs [`sniff`] against the bytes that actually landed on disk and rejects
//! the upload when the result disagrees with what the client claimed.
//!
//! # Examples
//!
//! ```rust
//! use image_intake::storage::{signature, MediaKind};
//!
//! let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00];
//! assert_eq!(signature::sniff(&png), Some(MediaKind::Png));
//!
//! assert_eq!(signature::sniff(b"#!/bin/sh"), None);
//! ```

use super::media::MediaKind;
use once_cell::sync::Lazy;
use regex::Regex;

/// PNG file signature
pub const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// JPEG start-of-image marker
pub const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

/// GIF signature prefix (shared by GIF87a and GIF89a)
pub const GIF_SIGNATURE: [u8; 3] = *b"GIF";

/// Bytes scanned when classifying an SVG document
///
/// Scripts can hide anywhere in the document, so SVG is scanned in full up to
/// the upload ceiling.
#[allow(clippy::cast_possible_truncation)]
pub const SVG_SNIFF_WINDOW: usize = crate::storage::MAX_UPLOAD_BYTES as usize;

/// Binary kinds, in the order they are tried by [`sniff`]
const BINARY_KINDS: [MediaKind; 3] = [MediaKind::Png, MediaKind::Jpeg, MediaKind::Gif];

/// Returns true if `bytes` starts with the PNG signature
#[must_use]
pub fn is_png(bytes: &[u8]) -> bool {
    bytes.starts_with(&PNG_SIGNATURE)
}

/// Returns true if `bytes` starts with the JPEG start-of-image marker
#[must_use]
pub fn is_jpeg(bytes: &[u8]) -> bool {
    bytes.starts_with(&JPEG_SOI)
}

/// Returns true if `bytes` starts with `GIF`
#[must_use]
pub fn is_gif(bytes: &[u8]) -> bool {
    bytes.starts_with(&GIF_SIGNATURE)
}

/// Classifies `bytes` as PNG, JPEG or GIF
///
/// Returns `None` when no signature matches, including when the buffer is
/// shorter than the signature it would need. Never panics.
#[must_use]
pub fn sniff(bytes: &[u8]) -> Option<MediaKind> {
    BINARY_KINDS.into_iter().find(|kind| kind.matches(bytes))
}

static EVENT_HANDLER_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[\s/]on[a-z]+\s*=").expect("Invalid regex"));

/// Element and URI markers that make an SVG document active content
const SVG_ACTIVE_MARKERS: [&str; 4] = ["<script", "javascript:", "<foreignobject", "<!entity"];

/// Returns true if `bytes` is a passive SVG document
///
/// SVG has no magic prefix, so detection walks the XML prolog: an optional
/// UTF-8 BOM, an XML declaration, comments and a DOCTYPE without an internal
/// subset may precede the root element, which must be `<svg`. Documents that
/// carry script, event-handler attributes, `javascript:` URIs, foreign
/// objects or entity declarations are not classified as SVG.
#[must_use]
pub fn is_svg(bytes: &[u8]) -> bool {
    let Ok(text) = std::str::from_utf8(bytes) else {
        return false;
    };
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let Some(root) = skip_prolog(text) else {
        return false;
    };
    let Some(after_tag) = root.strip_prefix("<svg") else {
        return false;
    };
    if !after_tag.starts_with(|c: char| c.is_ascii_whitespace() || c == '>' || c == '/') {
        return false;
    }

    let lowered = text.to_ascii_lowercase();
    if SVG_ACTIVE_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        return false;
    }
    !EVENT_HANDLER_ATTR.is_match(text)
}

/// Skips whitespace, the XML declaration, comments and DOCTYPE
///
/// Returns the remaining text starting at the first element, or `None` if the
/// prolog is malformed or declares an internal DTD subset.
fn skip_prolog(text: &str) -> Option<&str> {
    let mut rest = text.trim_start();
    loop {
        if let Some(after) = rest.strip_prefix("<?xml") {
            let end = after.find("?>")?;
            rest = after[end + 2..].trim_start();
        } else if let Some(after) = rest.strip_prefix("<!--") {
            let end = after.find("-->")?;
            rest = after[end + 3..].trim_start();
        } else if rest
            .get(..9)
            .is_some_and(|head| head.eq_ignore_ascii_case("<!doctype"))
        {
            let end = rest.find('>')?;
            if rest[..end].contains('[') {
                return None;
            }
            rest = rest[end + 1..].trim_start();
        } else {
            return Some(rest);
        }
    }
}
