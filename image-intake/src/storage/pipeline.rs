//! Upload pipeline
//!
//! Wires the intake filter, the artifact store and the post-store validator
//! into one flow:
//!
//! ```text
//! admit (metadata only) -> commit (stream to storage) -> verify (size + signature)
//! ```
//!
//! Every rejection after `commit` has started removes the artifact before it
//! is returned, so a rejected upload never leaves a file behind.

use super::intake::IntakeFilter;
use super::post_store::PostStoreValidator;
use super::traits::{ArtifactSink, ArtifactStore};
use super::types::{
    CommittedArtifact, IntakeApproval, Rejection, StorageError, StoredReference, UploadCandidate,
};
use super::{MediaPolicy, MAX_UPLOAD_BYTES};
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The upload pipeline
///
/// Cheap to clone; all clones share one store.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use bytes::Bytes;
/// use image_intake::storage::{LocalArtifactStore, MediaPolicy, UploadCandidate, UploadPipeline};
///
/// # async fn example(png_bytes: Vec<u8>) -> anyhow::Result<()> {
/// let store = Arc::new(LocalArtifactStore::new("/srv/public/temp")?);
/// let pipeline = UploadPipeline::new(store, MediaPolicy::strict(), "/temp/");
///
/// let body = futures_util::stream::iter([Ok(Bytes::from(png_bytes))]);
/// let stored = pipeline
///     .process(UploadCandidate::new("a.png", "image/png"), body)
///     .await?;
/// println!("stored at {}", stored.file_name);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct UploadPipeline {
    store: Arc<dyn ArtifactStore>,
    intake: IntakeFilter,
    validator: PostStoreValidator,
    max_bytes: u64,
}

impl std::fmt::Debug for UploadPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadPipeline")
            .field("intake", &self.intake)
            .field("validator", &self.validator)
            .field("max_bytes", &self.max_bytes)
            .finish_non_exhaustive()
    }
}

impl UploadPipeline {
    /// Creates a pipeline over a store
    ///
    /// `public_prefix` is the URL path accepted files are served under,
    /// e.g. `/temp/`.
    #[must_use]
    pub fn new(store: Arc<dyn ArtifactStore>, media: MediaPolicy, public_prefix: &str) -> Self {
        Self {
            store,
            intake: IntakeFilter::new(media),
            validator: PostStoreValidator::new(media, public_prefix),
            max_bytes: MAX_UPLOAD_BYTES,
        }
    }

    #[cfg(test)]
    const fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// The store artifacts are committed to
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    /// Runs the whole pipeline for one upload
    ///
    /// # Errors
    ///
    /// Returns the first [`Rejection`] raised by any stage.
    pub async fn process<S>(
        &self,
        candidate: UploadCandidate,
        body: S,
    ) -> Result<StoredReference, Rejection>
    where
        S: Stream<Item = Result<Bytes, Rejection>> + Send,
    {
        let approval = self.admit(candidate)?;
        let artifact = self.commit(approval, body).await?;
        self.verify(artifact).await
    }

    /// Screens declared metadata; never touches storage
    ///
    /// # Errors
    ///
    /// Returns the rejection of the first failing intake gate.
    pub fn admit(&self, candidate: UploadCandidate) -> Result<IntakeApproval, Rejection> {
        let declared_type = candidate.declared_type.clone();
        self.intake.admit(candidate).inspect_err(|rejection| {
            info!(
                reason = rejection.code(),
                declared_type = %declared_type,
                "Upload rejected at intake"
            );
        })
    }

    /// Streams an approved upload into storage
    ///
    /// Bytes are counted as they arrive; the upload is cut off as soon as it
    /// would exceed the size ceiling. The returned artifact removes itself
    /// from storage if dropped before [`verify`](Self::verify) settles it.
    ///
    /// # Errors
    ///
    /// - [`Rejection::FileTooLarge`] past the size ceiling
    /// - any error yielded by `body`
    /// - [`Rejection::FilesystemFailure`] if storage fails
    ///
    /// The partial artifact is removed in every error case. If the artifact
    /// cannot be created at all, nothing is removed: the stored name may
    /// belong to another upload.
    pub async fn commit<S>(
        &self,
        approval: IntakeApproval,
        body: S,
    ) -> Result<CommittedArtifact, Rejection>
    where
        S: Stream<Item = Result<Bytes, Rejection>> + Send,
    {
        let stored_name = approval.stored_name.clone();
        let sink = self.store.create(&stored_name).await.map_err(|e| {
            warn!(stored_name = %stored_name, error = %e, "Failed to create artifact");
            Rejection::from(e)
        })?;

        match self.write_body(sink, body).await {
            Ok(size) => {
                debug!(stored_name = %stored_name, size, "Upload committed");
                Ok(CommittedArtifact::new(approval, size).removed_on_drop(Arc::clone(&self.store)))
            }
            Err(rejection) => Err(self.reject(&stored_name, rejection).await),
        }
    }

    async fn write_body<S>(&self, mut sink: Box<dyn ArtifactSink>, body: S) -> Result<u64, Rejection>
    where
        S: Stream<Item = Result<Bytes, Rejection>> + Send,
    {
        let mut body = std::pin::pin!(body);
        let mut received: u64 = 0;

        // An early return drops the sink, which discards the partial file
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            received += chunk.len() as u64;
            if received > self.max_bytes {
                return Err(Rejection::FileTooLarge {
                    limit: self.max_bytes,
                });
            }
            sink.write_chunk(&chunk).await?;
        }

        Ok(sink.finish().await?)
    }

    /// Checks a committed artifact's true size and content signature
    ///
    /// # Errors
    ///
    /// - [`Rejection::FileTooSmall`] or [`Rejection::ContentSignatureMismatch`]
    ///   from the post-store validator
    /// - [`Rejection::FilesystemFailure`] if the artifact cannot be read back
    ///
    /// The artifact is removed in every error case.
    pub async fn verify(
        &self,
        mut artifact: CommittedArtifact,
    ) -> Result<StoredReference, Rejection> {
        let stored_name = artifact.stored_name().to_string();
        match self.inspect(&artifact).await {
            Ok(committed_size) => {
                artifact.settle();
                let reference = self.validator.reference(artifact, committed_size);
                info!(
                    stored_name = %stored_name,
                    kind = %reference.kind,
                    size = reference.size,
                    "Upload accepted"
                );
                Ok(reference)
            }
            Err(rejection) => {
                let rejection = self.reject(&stored_name, rejection).await;
                artifact.settle();
                Err(rejection)
            }
        }
    }

    async fn inspect(&self, artifact: &CommittedArtifact) -> Result<u64, Rejection> {
        let stored_name = artifact.stored_name();
        let committed_size = self.store.size(stored_name).await?;
        let head = self
            .store
            .read_head(stored_name, artifact.kind().sniff_window())
            .await?;
        self.validator.check(artifact, committed_size, &head)?;
        Ok(committed_size)
    }

    /// Removes an artifact, for rejections decided outside the pipeline
    ///
    /// Cleanup failures are logged and swallowed.
    pub async fn discard(&self, stored_name: &str) {
        if let Err(e) = self.remove_if_present(stored_name).await {
            warn!(
                stored_name = %stored_name,
                location = %self.store.location(stored_name).display(),
                error = %e,
                "Failed to remove rejected upload"
            );
        }
    }

    async fn remove_if_present(&self, stored_name: &str) -> Result<(), StorageError> {
        if self.store.exists(stored_name).await? {
            self.store.remove(stored_name).await?;
        }
        Ok(())
    }

    /// Cleans up after a post-write rejection and hands the rejection back
    async fn reject(&self, stored_name: &str, rejection: Rejection) -> Rejection {
        self.discard(stored_name).await;
        info!(
            reason = rejection.code(),
            stored_name = %stored_name,
            "Upload rejected after commit"
        );
        rejection
    }
}
