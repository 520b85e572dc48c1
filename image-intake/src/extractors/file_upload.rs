//! Multipart upload extraction
//!
//! [`UploadForm`] wraps axum's [`Multipart`] and feeds the single file field
//! straight into an [`UploadPipeline`]: the field's declared metadata goes
//! through intake, then its body is streamed to storage chunk by chunk. The
//! file is never buffered in memory.
//!
//! Rules:
//! - Fields without a file name are ignored
//! - A file field with an empty file name (an empty browser file input) is ignored
//! - The file must arrive in the `file` field
//! - A second file rejects the whole request and removes the first
//!
//! # Examples
//!
//! ```rust,no_run
//! use axum::{extract::State, http::StatusCode, Json};
//! use image_intake::error::IntakeError;
//! use image_intake::extractors::UploadForm;
//! use image_intake::storage::{StoredReference, UploadPipeline};
//!
//! async fn upload(
//!     State(pipeline): State<UploadPipeline>,
//!     form: UploadForm,
//! ) -> Result<(StatusCode, Json<StoredReference>), IntakeError> {
//!     let artifact = form.commit_single(&pipeline).await?;
//!     let stored = pipeline.verify(artifact).await?;
//!     Ok((StatusCode::CREATED, Json(stored)))
//! }
//! ```

use crate::error::IntakeError;
use crate::storage::{
    CommittedArtifact, Rejection, UploadCandidate, UploadPipeline, MAX_FILES_PER_REQUEST,
    MAX_UPLOAD_BYTES, UPLOAD_FIELD,
};
use axum::{
    extract::{
        multipart::{Field, MultipartError},
        FromRequest, Multipart, Request,
    },
    http::StatusCode,
};
use bytes::Bytes;
use futures_util::{Stream, StreamExt};

/// Declared type assumed when a file part has no `Content-Type`
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Extractor for a single-image upload form
pub struct UploadForm(pub Multipart);

impl<S> FromRequest<S> for UploadForm
where
    S: Send + Sync,
{
    type Rejection = IntakeError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| Rejection::MalformedRequest(e.body_text()))?;
        Ok(Self(multipart))
    }
}

impl UploadForm {
    /// Admits and commits the form's single file
    ///
    /// Reads the whole form. Each file field is screened by intake before any
    /// of its bytes are read.
    ///
    /// # Errors
    ///
    /// - [`Rejection::NoFileProvided`] if the form carries no file
    /// - [`Rejection::TooManyFiles`] if it carries more than one
    /// - [`Rejection::MalformedRequest`] for a file outside the `file` field or
    ///   an unreadable body
    /// - any intake or commit rejection from the pipeline
    ///
    /// No artifact remains in storage when an error is returned. The
    /// committed artifact is unverified; it is removed if dropped before
    /// [`UploadPipeline::verify`] settles it, including when this future is
    /// itself dropped mid-request.
    pub async fn commit_single(
        self,
        pipeline: &UploadPipeline,
    ) -> Result<CommittedArtifact, Rejection> {
        let Self(mut multipart) = self;
        let mut committed = None;

        match receive(&mut multipart, pipeline, &mut committed).await {
            Ok(()) => committed.ok_or(Rejection::NoFileProvided),
            Err(rejection) => {
                if let Some(mut artifact) = committed {
                    pipeline.discard(artifact.stored_name()).await;
                    artifact.settle();
                }
                Err(rejection)
            }
        }
    }
}

async fn receive(
    multipart: &mut Multipart,
    pipeline: &UploadPipeline,
    committed: &mut Option<CommittedArtifact>,
) -> Result<(), Rejection> {
    let mut files = 0;
    while let Some(field) = multipart.next_field().await.map_err(multipart_rejection)? {
        let Some(candidate) = file_candidate(&field)? else {
            continue;
        };
        files += 1;
        if files > MAX_FILES_PER_REQUEST {
            return Err(Rejection::TooManyFiles);
        }

        let approval = pipeline.admit(candidate)?;
        *committed = Some(pipeline.commit(approval, field_stream(field)).await?);
    }
    Ok(())
}

/// Declared metadata of a file field, or `None` for a field to skip
///
/// # Errors
///
/// Returns [`Rejection::MalformedRequest`] for a file in any field other
/// than [`UPLOAD_FIELD`].
pub fn file_candidate(field: &Field<'_>) -> Result<Option<UploadCandidate>, Rejection> {
    let Some(file_name) = field.file_name() else {
        return Ok(None);
    };
    if file_name.is_empty() {
        return Ok(None);
    }

    let field_name = field.name().unwrap_or_default();
    if field_name != UPLOAD_FIELD {
        return Err(Rejection::MalformedRequest(format!(
            "unexpected file field '{field_name}', expected '{UPLOAD_FIELD}'"
        )));
    }

    let declared_type = field.content_type().unwrap_or(FALLBACK_CONTENT_TYPE);
    Ok(Some(UploadCandidate::new(file_name, declared_type)))
}

/// The body of a field as a stream of pipeline-typed chunks
pub fn field_stream(field: Field<'_>) -> impl Stream<Item = Result<Bytes, Rejection>> + Send + '_ {
    field.map(|chunk| chunk.map_err(multipart_rejection))
}

/// Maps a multipart read error onto a rejection
///
/// A body cut off by the request body limit is reported as too large.
#[must_use]
pub fn multipart_rejection(error: MultipartError) -> Rejection {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Rejection::FileTooLarge {
            limit: MAX_UPLOAD_BYTES,
        }
    } else {
        Rejection::MalformedRequest(error.body_text())
    }
}
