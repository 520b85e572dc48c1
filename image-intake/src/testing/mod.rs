//! Testing utilities for image-intake
//!
//! Helpers shared by the unit tests:
//! - [`multipart_body`] - Builds a binary-safe `multipart/form-data` body
//! - Image byte fixtures with valid signatures
//! - Re-exported mockall for trait mocks

use crate::storage::signature::{GIF_SIGNATURE, JPEG_SOI, PNG_SIGNATURE};

// Re-export mockall for test usage
pub use mockall;

/// Boundary used by [`multipart_body`]
pub const BOUNDARY: &str = "----ImageIntakeBoundary7MA4YWxkTrZu0gW";

/// One part of a multipart body
#[derive(Debug, Clone, Copy)]
pub struct MultipartPart<'a> {
    name: &'a str,
    file_name: Option<&'a str>,
    content_type: Option<&'a str>,
    data: &'a [u8],
}

impl<'a> MultipartPart<'a> {
    /// A plain form field
    pub const fn text(name: &'a str, value: &'a str) -> Self {
        Self {
            name,
            file_name: None,
            content_type: None,
            data: value.as_bytes(),
        }
    }

    /// A file field
    pub const fn file(
        name: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        data: &'a [u8],
    ) -> Self {
        Self {
            name,
            file_name: Some(file_name),
            content_type: Some(content_type),
            data,
        }
    }
}

/// Builds a `multipart/form-data` body delimited by [`BOUNDARY`]
pub fn multipart_body(parts: &[MultipartPart<'_>]) -> Vec<u8> {
    let mut body = Vec::new();

    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        let disposition = part.file_name.map_or_else(
            || format!("Content-Disposition: form-data; name=\"{}\"\r\n", part.name),
            |file_name| {
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{file_name}\"\r\n",
                    part.name
                )
            },
        );
        body.extend_from_slice(disposition.as_bytes());
        if let Some(content_type) = part.content_type {
            body.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(part.data);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// `len` bytes starting with the PNG signature
pub fn png_bytes(len: usize) -> Vec<u8> {
    padded(&PNG_SIGNATURE, len)
}

/// `len` bytes starting with the JPEG start-of-image marker
pub fn jpeg_bytes(len: usize) -> Vec<u8> {
    padded(&JPEG_SOI, len)
}

/// `len` bytes starting with `GIF89a`
pub fn gif_bytes(len: usize) -> Vec<u8> {
    let mut header = GIF_SIGNATURE.to_vec();
    header.extend_from_slice(b"89a");
    padded(&header, len)
}

fn padded(header: &[u8], len: usize) -> Vec<u8> {
    let mut bytes = header.to_vec();
    bytes.resize(len.max(header.len()), 0);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{signature, MediaKind};

    #[test]
    fn test_fixtures_sniff_as_their_kind() {
        assert_eq!(signature::sniff(&png_bytes(100)), Some(MediaKind::Png));
        assert_eq!(signature::sniff(&jpeg_bytes(100)), Some(MediaKind::Jpeg));
        assert_eq!(signature::sniff(&gif_bytes(100)), Some(MediaKind::Gif));
        assert_eq!(png_bytes(5000).len(), 5000);
    }

    #[test]
    fn test_multipart_body_layout() {
        let body = multipart_body(&[
            MultipartPart::text("note", "hi"),
            MultipartPart::file("file", "a.png", "image/png", &[0x89, 0x00]),
        ]);
        let text = String::from_utf8_lossy(&body);

        assert!(text.starts_with(&format!("--{BOUNDARY}\r\n")));
        assert!(text.contains("name=\"note\"\r\n\r\nhi\r\n"));
        assert!(text.contains("filename=\"a.png\"\r\nContent-Type: image/png\r\n"));
        assert!(text.ends_with(&format!("--{BOUNDARY}--\r\n")));
    }
}
