//! image-intake: validating image upload service
//!
//! Accepts one image per request, screens it before storage, streams it to
//! disk, re-checks what actually landed, and serves accepted files back from
//! a public root that requests cannot climb out of.
//!
//! # Pipeline
//!
//! 1. **Intake**: declared type, extension, and file name are screened before
//!    a single byte is written
//! 2. **Commit**: the body is streamed to the temp directory under a fresh
//!    random name, with a hard size ceiling
//! 3. **Post-store validation**: the stored size and leading bytes must match
//!    the approved kind, or the file is removed
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use image_intake::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     image_intake::observability::init()?;
//!
//!     let state = AppState::new(IntakeConfig::load()?)?;
//!     let app = image_intake::handlers::router(state)?;
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Configuration
//!
//! See [`config`] for the file locations and environment variables read at
//! startup.

// Lint configuration is handled at the workspace level in Cargo.toml
#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod state;
pub mod storage;

#[cfg(test)]
pub mod testing;

pub mod prelude {
    //! Convenience re-exports for common types and traits
    //!
    //! # Examples
    //!
    //! ```rust
    //! use image_intake::prelude::*;
    //! ```

    // Configuration
    pub use crate::config::{IntakeConfig, StorageLayout};

    // Error types
    pub use crate::error::IntakeError;

    // Extractors
    pub use crate::extractors::UploadForm;

    // Middleware
    pub use crate::middleware::{StaticAssetGuard, StaticRequest};

    // Application state
    pub use crate::state::AppState;

    // Storage and validation
    pub use crate::storage::{
        ArtifactStore, LocalArtifactStore, MediaKind, MediaPolicy, Rejection, StoredReference,
        UploadCandidate, UploadPipeline,
    };

    // Re-export key dependencies
    pub use axum;
}
