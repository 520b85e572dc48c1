//! Artifact storage trait definitions

use super::types::StorageResult;
use async_trait::async_trait;
use std::path::PathBuf;

/// Abstraction over where uploaded bytes are committed
///
/// Artifacts are addressed by their stored name only; callers never pass a
/// path. The pipeline writes through an [`ArtifactSink`], verifies the result
/// with [`size`](Self::size) and [`read_head`](Self::read_head), and cleans up
/// with [`remove`](Self::remove).
///
/// # Implementation Requirements
///
/// Implementations must:
/// - Refuse stored names that contain path separators or `..`
/// - Never overwrite an existing artifact from [`create`](Self::create)
/// - Make [`remove`](Self::remove) idempotent
/// - Remove a partially written artifact when its sink is dropped unfinished
///
/// # Examples
///
/// ```rust,no_run
/// use image_intake::storage::{ArtifactSink, ArtifactStore, LocalArtifactStore};
///
/// # async fn example() -> anyhow::Result<()> {
/// let store = LocalArtifactStore::new("/srv/public/temp")?;
///
/// let mut sink = store.create("0f1e2d3c4b5a69788796a5b4c3d2e1f0.png").await?;
/// sink.write_chunk(&[0x89, 0x50, 0x4E, 0x47]).await?;
/// let written = sink.finish().await?;
///
/// assert_eq!(store.size("0f1e2d3c4b5a69788796a5b4c3d2e1f0.png").await?, written);
/// store.remove("0f1e2d3c4b5a69788796a5b4c3d2e1f0.png").await?;
/// # Ok(())
/// # }
/// ```
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Opens a new artifact for writing
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The stored name is not a plain file name (`StorageError::InvalidName`)
    /// - An artifact with that name already exists (`StorageError::AlreadyExists`)
    /// - File I/O fails
    async fn create(&self, stored_name: &str) -> StorageResult<Box<dyn ArtifactSink>>;

    /// Returns the committed size of an artifact
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the artifact does not exist.
    async fn size(&self, stored_name: &str) -> StorageResult<u64>;

    /// Reads at most `max_len` leading bytes of an artifact
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the artifact does not exist.
    async fn read_head(&self, stored_name: &str, max_len: usize) -> StorageResult<Vec<u8>>;

    /// Deletes an artifact
    ///
    /// Deleting an artifact that does not exist succeeds.
    async fn remove(&self, stored_name: &str) -> StorageResult<()>;

    /// Checks whether an artifact exists
    async fn exists(&self, stored_name: &str) -> StorageResult<bool>;

    /// Filesystem location of an artifact, for logging
    fn location(&self, stored_name: &str) -> PathBuf;
}

/// An artifact being written
///
/// Dropping a sink without calling [`finish`](Self::finish) must discard the
/// partial artifact on a best-effort basis.
#[async_trait]
pub trait ArtifactSink: Send {
    /// Appends a chunk of bytes
    async fn write_chunk(&mut self, chunk: &[u8]) -> StorageResult<()>;

    /// Flushes and closes the artifact, returning the number of bytes written
    async fn finish(self: Box<Self>) -> StorageResult<u64>;
}
