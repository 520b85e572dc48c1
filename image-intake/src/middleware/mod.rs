//! Middleware layers for image-intake
//!
//! Provides middleware for:
//! - Static file serving with path containment ([`StaticAssetGuard`])
//! - `X-Content-Type-Options: nosniff` on every response
//! - CORS for the single configured origin

pub mod security;
pub mod static_guard;

// Re-exports are intentionally public even if not used within the crate itself
#[allow(unused_imports)]
pub use security::{cors_layer, nosniff_layer, CORS_MAX_AGE};
#[allow(unused_imports)]
pub use static_guard::{static_guard, StaticAssetGuard, StaticRequest};
