//! Application state management
//!
//! Built once at startup from the loaded configuration and shared by every
//! request. Nothing in it is mutable.

use crate::config::{IntakeConfig, StorageLayout};
use crate::middleware::StaticAssetGuard;
use crate::storage::{ArtifactStore, LocalArtifactStore, MediaPolicy, UploadPipeline};
use axum::extract::FromRef;
use std::sync::Arc;

/// Application state for image-intake
///
/// Combines:
/// - Configuration
/// - The resolved storage layout
/// - The upload pipeline (over the local artifact store)
/// - The static asset guard (over the public root)
///
/// # Example
///
/// ```rust,no_run
/// use image_intake::{config::IntakeConfig, state::AppState};
///
/// # fn example() -> anyhow::Result<()> {
/// let state = AppState::new(IntakeConfig::load()?)?;
///
/// let app = image_intake::handlers::router(state)?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    config: Arc<IntakeConfig>,

    /// Storage directories and public prefix
    layout: Arc<StorageLayout>,

    /// Upload pipeline
    pipeline: UploadPipeline,

    /// Static file guard over the public root
    guard: StaticAssetGuard,
}

impl AppState {
    /// Create application state from configuration
    ///
    /// Creates the public root and temp directory if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The temp segment is invalid
    /// - The storage directories cannot be created
    /// - The temp path exists and is not a directory
    pub fn new(config: IntakeConfig) -> anyhow::Result<Self> {
        let layout = config.storage.layout()?;
        layout.ensure_dirs()?;

        let store = LocalArtifactStore::new(layout.temp_dir())?;
        Ok(Self::with_store(config, layout, Arc::new(store)))
    }

    /// Create application state over a custom artifact store
    #[must_use]
    pub fn with_store(
        config: IntakeConfig,
        layout: StorageLayout,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        let media = MediaPolicy::from_flags(config.storage.allow_svg);
        let pipeline = UploadPipeline::new(store, media, layout.public_prefix());
        let guard = StaticAssetGuard::new(layout.public_root());

        tracing::debug!(
            public_root = %layout.public_root().display(),
            temp_dir = %layout.temp_dir().display(),
            allow_svg = media.allows_svg(),
            "Application state initialized"
        );

        Self {
            config: Arc::new(config),
            layout: Arc::new(layout),
            pipeline,
            guard,
        }
    }

    /// Get configuration reference
    #[must_use]
    pub fn config(&self) -> &IntakeConfig {
        &self.config
    }

    /// Get the storage layout
    #[must_use]
    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Get the upload pipeline
    #[must_use]
    pub const fn pipeline(&self) -> &UploadPipeline {
        &self.pipeline
    }

    /// Get the static asset guard
    #[must_use]
    pub const fn guard(&self) -> &StaticAssetGuard {
        &self.guard
    }
}

impl FromRef<AppState> for UploadPipeline {
    fn from_ref(state: &AppState) -> Self {
        state.pipeline.clone()
    }
}

impl FromRef<AppState> for StaticAssetGuard {
    fn from_ref(state: &AppState) -> Self {
        state.guard.clone()
    }
}
