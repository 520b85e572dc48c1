//! Local filesystem artifact store

use super::traits::{ArtifactSink, ArtifactStore};
use super::types::{StorageError, StorageResult};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Local filesystem artifact store
///
/// Stores every artifact as a single flat file directly inside one
/// directory (the temp upload directory under the public root):
///
/// ```text
/// /srv/public/temp/
/// ├── 0f1e2d3c4b5a69788796a5b4c3d2e1f0.png
/// └── 9a8b7c6d5e4f30211203f4e5d6c7b8a9.jpg
/// ```
///
/// # Examples
///
/// ```rust,no_run
/// use image_intake::storage::LocalArtifactStore;
///
/// // Fails if the path exists and is not a directory
/// let store = LocalArtifactStore::new("/srv/public/temp")?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    /// Directory holding the artifacts
    base_path: PathBuf,
}

impl LocalArtifactStore {
    /// Creates a new local artifact store
    ///
    /// The directory is created on first write if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` with [`ErrorKind::NotADirectory`] if the
    /// base path exists and is not a directory.
    pub fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();
        // Synchronous check is fine during startup
        if base_path.exists() && !base_path.is_dir() {
            return Err(StorageError::Io(std::io::Error::new(
                ErrorKind::NotADirectory,
                format!("{} is not a directory", base_path.display()),
            )));
        }

        Ok(Self { base_path })
    }

    /// Directory holding the artifacts
    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Resolves a stored name to its file path
    ///
    /// Stored names are flat file names; anything that could address another
    /// directory is refused.
    fn artifact_path(&self, stored_name: &str) -> StorageResult<PathBuf> {
        let is_plain = !stored_name.is_empty()
            && !stored_name.contains(['/', '\\', '\0'])
            && !stored_name.contains("..");
        if !is_plain {
            return Err(StorageError::InvalidName(stored_name.to_string()));
        }
        Ok(self.base_path.join(stored_name))
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn create(&self, stored_name: &str) -> StorageResult<Box<dyn ArtifactSink>> {
        let path = self.artifact_path(stored_name)?;
        fs::create_dir_all(&self.base_path).await?;

        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => {
                    StorageError::AlreadyExists(stored_name.to_string())
                }
                _ => StorageError::Io(e),
            })?;

        Ok(Box::new(LocalSink {
            file: Some(file),
            guard: PartialFileGuard::new(path),
            written: 0,
        }))
    }

    async fn size(&self, stored_name: &str) -> StorageResult<u64> {
        let path = self.artifact_path(stored_name)?;
        match fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => Ok(metadata.len()),
            Ok(_) => Err(StorageError::NotFound(stored_name.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(stored_name.to_string()))
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn read_head(&self, stored_name: &str, max_len: usize) -> StorageResult<Vec<u8>> {
        let path = self.artifact_path(stored_name)?;
        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(stored_name.to_string()));
            }
            Err(e) => return Err(StorageError::Io(e)),
        };

        let mut head = Vec::with_capacity(max_len.min(64 * 1024));
        file.take(max_len as u64).read_to_end(&mut head).await?;
        Ok(head)
    }

    async fn remove(&self, stored_name: &str) -> StorageResult<()> {
        let path = self.artifact_path(stored_name)?;

        // Idempotent - a concurrent cleanup may already have removed it
        if !fs::try_exists(&path).await? {
            return Ok(());
        }
        match fs::remove_file(&path).await {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(StorageError::Io(e)),
            _ => Ok(()),
        }
    }

    async fn exists(&self, stored_name: &str) -> StorageResult<bool> {
        let path = self.artifact_path(stored_name)?;
        Ok(fs::try_exists(&path).await?)
    }

    fn location(&self, stored_name: &str) -> PathBuf {
        self.base_path.join(stored_name)
    }
}

/// Sink writing one artifact to a local file
struct LocalSink {
    file: Option<fs::File>,
    guard: PartialFileGuard,
    written: u64,
}

#[async_trait]
impl ArtifactSink for LocalSink {
    async fn write_chunk(&mut self, chunk: &[u8]) -> StorageResult<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| StorageError::NotFound(self.guard.path().display().to_string()))?;
        file.write_all(chunk).await?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    async fn finish(mut self: Box<Self>) -> StorageResult<u64> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.sync_all().await?;
        }
        self.guard.disarm();
        Ok(self.written)
    }
}

/// Removes a partially written file unless disarmed
///
/// Covers the case where the request future is dropped mid-write (client
/// abort, server shutdown). Removal is best-effort: a crashed process can
/// still leave an orphan behind.
struct PartialFileGuard {
    path: PathBuf,
    armed: bool,
}

impl PartialFileGuard {
    const fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PartialFileGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "Removed partially written upload");
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to remove partially written upload"
                );
            }
        }
    }
}
