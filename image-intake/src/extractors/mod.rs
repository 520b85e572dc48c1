//! Axum extractors for image-intake
//!
//! Provides the multipart extractor that feeds uploads into the pipeline.

mod file_upload;

pub use file_upload::{
    field_stream, file_candidate, multipart_rejection, UploadForm, FALLBACK_CONTENT_TYPE,
};
