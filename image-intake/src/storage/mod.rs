//! Upload validation and artifact storage
//!
//! Provides:
//! - Signature sniffing (magic bytes, plus an XML-aware SVG detector)
//! - File name policy (allow-lists, cross-checks, double-extension detection)
//! - The intake filter (metadata checks before any write)
//! - The post-store validator (true size and signature after the write)
//! - Artifact storage behind [`ArtifactStore`], with a local filesystem backend
//! - [`UploadPipeline`], which runs all of the above with cleanup on rejection

pub mod intake;
pub mod local;
pub mod media;
pub mod naming;
pub mod pipeline;
pub mod post_store;
pub mod signature;
pub mod traits;
pub mod types;

/// Largest accepted upload, in bytes (10 MiB)
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Smallest accepted upload, in bytes (2 KiB)
pub const MIN_UPLOAD_BYTES: u64 = 2 * 1024;

/// Files accepted per upload request
pub const MAX_FILES_PER_REQUEST: usize = 1;

/// Multipart form field carrying the file
pub const UPLOAD_FIELD: &str = "file";

// Re-exports are intentionally public even if not used within the crate itself
#[allow(unused_imports)]
pub use intake::IntakeFilter;
#[allow(unused_imports)]
pub use local::LocalArtifactStore;
#[allow(unused_imports)]
pub use media::{MediaKind, MediaPolicy, POLICY_VERSION};
#[allow(unused_imports)]
pub use naming::NamePolicy;
#[allow(unused_imports)]
pub use pipeline::UploadPipeline;
#[allow(unused_imports)]
pub use post_store::PostStoreValidator;
#[allow(unused_imports)]
pub use traits::{ArtifactSink, ArtifactStore};
#[allow(unused_imports)]
pub use types::{
    CommittedArtifact, IntakeApproval, Rejection, StorageError, StorageResult, StoredReference,
    UploadCandidate,
};
