//! Post-store validation
//!
//! Some facts about an upload only exist once its bytes are on disk: the true
//! size and the true content signature. The validator checks both against the
//! approval granted at intake. It performs no I/O itself; the pipeline reads
//! the committed size and head bytes and removes the artifact on rejection.

use super::media::MediaPolicy;
use super::types::{CommittedArtifact, Rejection, StoredReference};
use super::MIN_UPLOAD_BYTES;

/// Checks committed bytes against their intake approval
#[derive(Debug, Clone)]
pub struct PostStoreValidator {
    media: MediaPolicy,
    min_size: u64,
    public_prefix: String,
}

impl PostStoreValidator {
    /// Creates a validator
    ///
    /// `public_prefix` is prepended to stored names in accepted references and
    /// is normalized to start and end with `/`.
    #[must_use]
    pub fn new(media: MediaPolicy, public_prefix: &str) -> Self {
        Self {
            media,
            min_size: MIN_UPLOAD_BYTES,
            public_prefix: normalize_prefix(public_prefix),
        }
    }

    /// Smallest accepted committed size in bytes
    #[must_use]
    pub const fn min_size(&self) -> u64 {
        self.min_size
    }

    /// URL prefix of accepted references, e.g. `/temp/`
    #[must_use]
    pub fn public_prefix(&self) -> &str {
        &self.public_prefix
    }

    /// Validates a committed artifact
    ///
    /// `committed_size` is the size reported by storage, not the byte count
    /// seen while streaming. `head` holds at least the approved kind's sniff
    /// window, or the whole file if it is shorter.
    ///
    /// # Errors
    ///
    /// - [`Rejection::FileTooSmall`] below the size floor
    /// - [`Rejection::ContentSignatureMismatch`] when the sniffed kind differs
    ///   from the approved kind
    pub fn check(
        &self,
        artifact: &CommittedArtifact,
        committed_size: u64,
        head: &[u8],
    ) -> Result<(), Rejection> {
        if committed_size < self.min_size {
            return Err(Rejection::FileTooSmall {
                actual: committed_size,
                minimum: self.min_size,
            });
        }

        let expected = artifact.kind();
        let detected = self.media.sniff(head);
        if detected != Some(expected) {
            return Err(Rejection::ContentSignatureMismatch { expected, detected });
        }

        Ok(())
    }

    /// Builds the public reference for an artifact that passed [`check`](Self::check)
    #[must_use]
    pub fn reference(&self, artifact: CommittedArtifact, committed_size: u64) -> StoredReference {
        let kind = artifact.kind();
        let file_name = format!("{}{}", self.public_prefix, artifact.approval.stored_name);
        StoredReference {
            file_name,
            original_name: artifact.approval.candidate.original_name,
            kind,
            size: committed_size,
        }
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}/")
    }
}
