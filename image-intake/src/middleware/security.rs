//! Response hardening layers
//!
//! Uploaded files are served back from the same origin as the API, so every
//! response carries `X-Content-Type-Options: nosniff` and browsers never
//! second-guess a served content type.

use crate::config::ServerSettings;
use axum::http::{
    header::{self, HeaderName, InvalidHeaderValue},
    HeaderValue, Method,
};
use std::time::Duration;
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer};

/// How long browsers may cache a CORS preflight
pub const CORS_MAX_AGE: Duration = Duration::from_secs(86_400);

/// Sets `X-Content-Type-Options: nosniff` on every response
#[must_use]
pub fn nosniff_layer() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    )
}

/// CORS for the configured origin, with credentials
///
/// # Errors
///
/// Returns an error if `allowed_origin` is not a valid header value.
pub fn cors_layer(settings: &ServerSettings) -> Result<CorsLayer, InvalidHeaderValue> {
    let origin: HeaderValue = settings.allowed_origin.parse()?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .expose_headers([
            header::CONTENT_RANGE,
            HeaderName::from_static("x-content-range"),
        ])
        .max_age(CORS_MAX_AGE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, routing::get, Router};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_nosniff_header() {
        let app: Router = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(nosniff_layer());

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    }

    #[tokio::test]
    async fn test_cors_allows_configured_origin() {
        let settings = ServerSettings::default();
        let app: Router = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(cors_layer(&settings).unwrap());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::ORIGIN, "http://localhost:3000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:3000"
        );
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS],
            "true"
        );
    }

    #[tokio::test]
    async fn test_cors_ignores_other_origins() {
        let settings = ServerSettings::default();
        let app: Router = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(cors_layer(&settings).unwrap());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::ORIGIN, "http://evil.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }

    #[test]
    fn test_invalid_origin() {
        let settings = ServerSettings {
            allowed_origin: "bad\norigin".to_string(),
            ..ServerSettings::default()
        };
        assert!(cors_layer(&settings).is_err());
    }
}
