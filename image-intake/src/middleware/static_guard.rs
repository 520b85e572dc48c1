//! Static asset guard
//!
//! Serves files from the public root for `GET` and `HEAD` requests, after
//! proving that the requested path cannot leave the root. Anything that is
//! not a contained, existing regular file falls through to the next handler,
//! so escape attempts and missing files look exactly alike to a client.
//!
//! # Examples
//!
//! ```rust
//! use image_intake::middleware::StaticAssetGuard;
//!
//! let guard = StaticAssetGuard::new("/app/public");
//!
//! let escaped = guard.resolve("../../../etc/passwd");
//! assert!(!escaped.is_contained());
//!
//! let stored = guard.resolve("/temp/0f1e2d3c.png");
//! assert!(stored.is_contained());
//! assert_eq!(stored.resolved(), std::path::Path::new("/app/public/temp/0f1e2d3c.png"));
//! ```

use crate::error::IntakeError;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{
        header::{CONTENT_LENGTH, CONTENT_TYPE},
        HeaderValue, Method, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use percent_encoding::percent_decode_str;
use std::borrow::Cow;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio_util::io::ReaderStream;

/// Resolves request paths under a fixed root and serves contained files
///
/// Holds only immutable configuration; clones share the root.
#[derive(Debug, Clone)]
pub struct StaticAssetGuard {
    root: Arc<PathBuf>,
}

/// Outcome of resolving one request path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticRequest {
    requested: String,
    resolved: PathBuf,
    contained: bool,
}

impl StaticRequest {
    /// The path as requested, untrusted
    #[must_use]
    pub fn requested(&self) -> &str {
        &self.requested
    }

    /// Candidate filesystem path; the root itself when not contained
    #[must_use]
    pub fn resolved(&self) -> &Path {
        &self.resolved
    }

    /// Whether the resolved path is proven to lie under the root
    #[must_use]
    pub const fn is_contained(&self) -> bool {
        self.contained
    }
}

impl StaticAssetGuard {
    /// Creates a guard over `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Arc::new(root.into()),
        }
    }

    /// The storage root
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lexically resolves a request path against the root
    ///
    /// Both `/` and `\` separate segments. Each segment is percent-decoded
    /// on its own; a decoded separator or NUL, or a segment that is not valid
    /// UTF-8 once decoded, is reported as not contained. `.` segments are
    /// dropped and `..` removes the previous segment; a `..` with nothing left
    /// to remove means the request tried to climb out of the root and is
    /// reported as not contained. No filesystem access happens here.
    #[must_use]
    pub fn resolve(&self, request_path: &str) -> StaticRequest {
        let escaped = StaticRequest {
            requested: request_path.to_string(),
            resolved: self.root.to_path_buf(),
            contained: false,
        };

        let mut segments: Vec<Cow<'_, str>> = Vec::new();
        for raw in request_path.split(['/', '\\']) {
            let Ok(segment) = percent_decode_str(raw).decode_utf8() else {
                return escaped;
            };
            match segment.as_ref() {
                "" | "." => {}
                ".." => {
                    if segments.pop().is_none() {
                        return escaped;
                    }
                }
                decoded if decoded.contains(['/', '\\', '\0']) => return escaped,
                _ => segments.push(segment),
            }
        }

        let resolved = segments
            .iter()
            .fold(self.root.to_path_buf(), |path, segment| path.join(segment.as_ref()));

        // Re-prove containment on the joined path itself
        let contained = resolved.strip_prefix(self.root.as_path()).is_ok_and(|relative| {
            relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)))
        });
        if !contained {
            return escaped;
        }

        StaticRequest {
            requested: request_path.to_string(),
            resolved,
            contained,
        }
    }

    /// Serves the file at `request_path` if it is contained and exists
    ///
    /// Returns `Ok(None)` when the next handler should run instead: the path
    /// escapes the root, does not exist, or is not a regular file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if an existing file cannot be opened.
    pub async fn serve(
        &self,
        request_path: &str,
        head_only: bool,
    ) -> std::io::Result<Option<Response>> {
        let request = self.resolve(request_path);
        if !request.is_contained() {
            tracing::debug!(path = %request_path, "Static request outside root");
            return Ok(None);
        }

        let metadata = match tokio::fs::metadata(request.resolved()).await {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => return Ok(None),
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let content_type = mime_guess::from_path(request.resolved())
            .first_or_octet_stream()
            .to_string();

        let body = if head_only {
            Body::empty()
        } else {
            let file = tokio::fs::File::open(request.resolved()).await?;
            Body::from_stream(ReaderStream::new(file))
        };

        let mut response = (StatusCode::OK, body).into_response();
        let headers = response.headers_mut();
        if let Ok(value) = HeaderValue::from_str(&content_type) {
            headers.insert(CONTENT_TYPE, value);
        }
        headers.insert(CONTENT_LENGTH, HeaderValue::from(metadata.len()));

        Ok(Some(response))
    }
}

/// Middleware serving contained files before routing
///
/// # Example
///
/// ```rust,no_run
/// use axum::{middleware, Router};
/// use image_intake::middleware::{static_guard, StaticAssetGuard};
///
/// let guard = StaticAssetGuard::new("./public");
/// let app: Router = Router::new().layer(middleware::from_fn_with_state(guard, static_guard));
/// ```
pub async fn static_guard(
    State(guard): State<StaticAssetGuard>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    if method != Method::GET && method != Method::HEAD {
        return next.run(request).await;
    }

    let served = guard.serve(request.uri().path(), method == Method::HEAD).await;
    match served {
        Ok(Some(response)) => response,
        Ok(None) => next.run(request).await,
        Err(e) => {
            tracing::error!(path = %request.uri().path(), error = %e, "Failed to serve static file");
            IntakeError::Internal(e.to_string()).into_response()
        }
    }
}
