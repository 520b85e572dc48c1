//! HTTP handlers and router assembly
//!
//! The router exposes one endpoint, `POST /upload`. Every other `GET` or
//! `HEAD` request is offered to the static asset guard first; anything it
//! declines ends in a JSON 404.

pub mod upload;

use crate::error::IntakeError;
use crate::middleware::{cors_layer, nosniff_layer, static_guard};
use crate::state::AppState;
use crate::storage::MAX_UPLOAD_BYTES;
use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::post,
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Room for multipart boundaries and part headers on top of the file itself
pub const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// Path of the upload endpoint
pub const UPLOAD_ROUTE: &str = "/upload";

/// Largest request body accepted on any route
#[must_use]
pub fn request_body_limit() -> usize {
    usize::try_from(MAX_UPLOAD_BYTES + MULTIPART_OVERHEAD).unwrap_or(usize::MAX)
}

/// Builds the application router
///
/// # Errors
///
/// Returns an error if the configured CORS origin is not a valid header value.
pub fn router(state: AppState) -> anyhow::Result<Router> {
    let cors = cors_layer(&state.config().server)?;

    let router = Router::new()
        .route(UPLOAD_ROUTE, post(upload::upload))
        .fallback(not_found)
        .layer(from_fn_with_state(state.clone(), static_guard))
        .layer(DefaultBodyLimit::max(request_body_limit()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(nosniff_layer()),
        )
        .with_state(state);

    Ok(router)
}

/// Fallback for unmatched requests
pub async fn not_found() -> IntakeError {
    IntakeError::NotFound
}
