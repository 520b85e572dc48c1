//! Core types for the upload pipeline
//!
//! An upload moves through typed stages, each produced only by the stage
//! before it:
//!
//! ```text
//! UploadCandidate --intake--> IntakeApproval --commit--> CommittedArtifact --verify--> StoredReference
//! ```
//!
//! Any stage may instead produce a [`Rejection`].

use super::media::MediaKind;
use super::traits::ArtifactStore;
use http::StatusCode;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during artifact storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// Artifact not found in storage
    #[error("Artifact not found: {0}")]
    NotFound(String),

    /// I/O error during storage operation
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid stored name
    #[error("Invalid stored name: {0}")]
    InvalidName(String),

    /// Artifact already exists under this stored name
    #[error("Artifact already exists: {0}")]
    AlreadyExists(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Why an upload was refused
///
/// Every variant has a stable machine-readable [`code`](Self::code), a
/// human-readable message (its `Display`) and an HTTP status.
#[derive(Debug, Error)]
pub enum Rejection {
    /// The request carried no file
    #[error("No file was uploaded")]
    NoFileProvided,

    /// The request carried more than one file
    #[error("Only one file may be uploaded per request")]
    TooManyFiles,

    /// The committed file is below the size floor
    #[error("File is too small: {actual} bytes, minimum is {minimum} bytes")]
    FileTooSmall {
        /// Committed size
        actual: u64,
        /// Size floor
        minimum: u64,
    },

    /// The file exceeded the size ceiling while being received
    #[error("File exceeds the maximum size of {limit} bytes")]
    FileTooLarge {
        /// Size ceiling
        limit: u64,
    },

    /// The declared content type is not on the allow-list
    #[error("Content type '{0}' is not allowed")]
    DeclaredTypeNotAllowed(String),

    /// The file name has no extension, or one that is not allowed
    #[error("File name must end in an allowed image extension")]
    MissingOrDisallowedExtension,

    /// The extension does not belong to the declared content type
    #[error("Extension '.{extension}' does not match content type '{declared_type}'")]
    TypeExtensionMismatch {
        /// Extension from the file name
        extension: String,
        /// Declared content type
        declared_type: String,
    },

    /// The file name contains traversal, control or executable markers
    #[error("File name is not allowed")]
    DangerousFileName,

    /// The file name is longer than the limit
    #[error("File name is too long: {actual} characters, maximum is {limit}")]
    FileNameTooLong {
        /// Name length in characters
        actual: usize,
        /// Length limit
        limit: usize,
    },

    /// The file name has no usable base name
    #[error("File name cannot be empty")]
    EmptyFileName,

    /// The committed bytes are not the declared kind of image
    #[error("File content does not match the declared type: expected {expected}, detected {}", .detected.map_or("unknown", MediaKind::as_str))]
    ContentSignatureMismatch {
        /// Kind approved from the metadata
        expected: MediaKind,
        /// Kind detected from the content, if any
        detected: Option<MediaKind>,
    },

    /// The multipart body could not be read
    #[error("Malformed upload request: {0}")]
    MalformedRequest(String),

    /// Storage failed while writing, reading or deleting
    #[error("File could not be stored")]
    FilesystemFailure(#[from] StorageError),
}

impl Rejection {
    /// Stable reason code for clients and logs
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NoFileProvided => "no_file_provided",
            Self::TooManyFiles => "too_many_files",
            Self::FileTooSmall { .. } => "file_too_small",
            Self::FileTooLarge { .. } => "file_too_large",
            Self::DeclaredTypeNotAllowed(_) => "declared_type_not_allowed",
            Self::MissingOrDisallowedExtension => "missing_or_disallowed_extension",
            Self::TypeExtensionMismatch { .. } => "type_extension_mismatch",
            Self::DangerousFileName => "dangerous_file_name",
            Self::FileNameTooLong { .. } => "file_name_too_long",
            Self::EmptyFileName => "empty_file_name",
            Self::ContentSignatureMismatch { .. } => "content_signature_mismatch",
            Self::MalformedRequest(_) => "malformed_request",
            Self::FilesystemFailure(_) => "filesystem_failure",
        }
    }

    /// HTTP status used when rendering this rejection
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::DeclaredTypeNotAllowed(_) | Self::ContentSignatureMismatch { .. } => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            Self::FilesystemFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoFileProvided
            | Self::TooManyFiles
            | Self::FileTooSmall { .. }
            | Self::MissingOrDisallowedExtension
            | Self::TypeExtensionMismatch { .. }
            | Self::DangerousFileName
            | Self::FileNameTooLong { .. }
            | Self::EmptyFileName
            | Self::MalformedRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

/// Declared metadata of an incoming upload
///
/// Both fields come straight from the client and are untrusted.
///
/// # Examples
///
/// ```rust
/// use image_intake::storage::UploadCandidate;
///
/// let candidate = UploadCandidate::new("photo.jpg", "image/jpeg");
/// assert_eq!(candidate.original_name, "photo.jpg");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCandidate {
    /// Original file name as sent by the client
    pub original_name: String,

    /// Content type as sent by the client
    pub declared_type: String,
}

impl UploadCandidate {
    /// Creates a new candidate from declared metadata
    #[must_use]
    pub fn new(original_name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            original_name: original_name.into(),
            declared_type: declared_type.into(),
        }
    }
}

/// A candidate whose metadata passed the intake filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeApproval {
    /// The approved candidate
    pub candidate: UploadCandidate,

    /// Kind implied by the declared type and extension
    pub kind: MediaKind,

    /// Name the bytes will be stored under
    pub stored_name: String,
}

/// An approved upload whose bytes are now in storage
///
/// Until verification settles it, an artifact produced by the pipeline's
/// commit stage removes its bytes from storage when dropped. An upload
/// abandoned between commit and verify therefore never stays on disk.
#[derive(Debug)]
pub struct CommittedArtifact {
    /// The approval this artifact was written for
    pub approval: IntakeApproval,

    /// Bytes written
    pub size: u64,

    removal: Option<RemovalGuard>,
}

impl CommittedArtifact {
    /// An artifact that is left in storage when dropped
    #[must_use]
    pub const fn new(approval: IntakeApproval, size: u64) -> Self {
        Self {
            approval,
            size,
            removal: None,
        }
    }

    /// Removes the stored bytes through `store` if dropped unsettled
    #[must_use]
    pub fn removed_on_drop(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.removal = Some(RemovalGuard {
            store,
            stored_name: self.approval.stored_name.clone(),
        });
        self
    }

    /// Name the bytes are stored under
    #[must_use]
    pub fn stored_name(&self) -> &str {
        &self.approval.stored_name
    }

    /// Kind approved at intake
    #[must_use]
    pub const fn kind(&self) -> MediaKind {
        self.approval.kind
    }

    /// Whether dropping this artifact would remove its bytes
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.removal.is_some()
    }

    /// Marks the artifact as handled; dropping it no longer touches storage
    pub fn settle(&mut self) {
        if let Some(mut guard) = self.removal.take() {
            guard.stored_name.clear();
        }
    }
}

/// Schedules removal of an unsettled artifact
///
/// Drop cannot await, so removal is spawned on the current tokio runtime.
struct RemovalGuard {
    store: Arc<dyn ArtifactStore>,
    stored_name: String,
}

impl fmt::Debug for RemovalGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemovalGuard")
            .field("stored_name", &self.stored_name)
            .finish_non_exhaustive()
    }
}

impl Drop for RemovalGuard {
    fn drop(&mut self) {
        if self.stored_name.is_empty() {
            return;
        }
        let stored_name = std::mem::take(&mut self.stored_name);

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(stored_name = %stored_name, "No runtime to remove abandoned upload");
            return;
        };
        let store = Arc::clone(&self.store);
        handle.spawn(async move {
            match store.remove(&stored_name).await {
                Ok(()) => {
                    tracing::info!(stored_name = %stored_name, "Removed abandoned upload");
                }
                Err(e) => {
                    tracing::warn!(
                        stored_name = %stored_name,
                        error = %e,
                        "Failed to remove abandoned upload"
                    );
                }
            }
        });
    }
}

/// An accepted upload
///
/// Serializes to the upload endpoint's response body.
///
/// # Examples
///
/// ```rust
/// use image_intake::storage::{MediaKind, StoredReference};
///
/// let stored = StoredReference {
///     file_name: "/temp/0f1e2d3c4b5a69788796a5b4c3d2e1f0.png".to_string(),
///     original_name: "a.png".to_string(),
///     kind: MediaKind::Png,
///     size: 5000,
/// };
///
/// let json = serde_json::to_value(&stored).unwrap();
/// assert_eq!(json["originalName"], "a.png");
/// assert!(json.get("kind").is_none());
/// ```
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoredReference {
    /// Root-relative public path of the stored file
    pub file_name: String,

    /// Original file name, for display only
    pub original_name: String,

    /// Verified kind
    #[serde(skip)]
    pub kind: MediaKind,

    /// Verified size in bytes
    #[serde(skip)]
    pub size: u64,
}

impl fmt::Display for StoredReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StoredReference(file_name={}, kind={}, size={})",
            self.file_name, self.kind, self.size
        )
    }
}
