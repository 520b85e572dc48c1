//! Upload endpoint

use crate::error::IntakeError;
use crate::extractors::UploadForm;
use crate::storage::{StoredReference, UploadPipeline};
use axum::{extract::State, http::StatusCode, Json};

/// Accepts one image in the `file` field of a multipart form
///
/// Responds `201 Created` with the public path and original name. Any rejection
/// is rendered as a JSON error with its own status, and no file is left in
/// storage.
pub async fn upload(
    State(pipeline): State<UploadPipeline>,
    form: UploadForm,
) -> Result<(StatusCode, Json<StoredReference>), IntakeError> {
    let artifact = form.commit_single(&pipeline).await?;
    let stored = pipeline.verify(artifact).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}
