//! Upload transport seam.
//!
//! The gateway hands claimed sample batches to a [`SampleUploader`] and
//! resolves the claim from the result: success marks the batch uploaded,
//! failure returns it for retry. Real transports talk to a remote endpoint
//! using [`RemoteStorageCredentials`](crate::config::RemoteStorageCredentials);
//! tests and demos use [`MockUploader`](crate::mock::MockUploader).

use async_trait::async_trait;

use speck_types::DataSampleSet;

/// Errors an uploader can report.
///
/// Every variant is treated as transient by the gateway: the batch returns
/// to the pending state and is retried on a later tick.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum UploadError {
    /// The remote endpoint could not be reached.
    #[error("Upload endpoint unreachable: {0}")]
    Unreachable(String),

    /// The remote endpoint rejected the batch.
    #[error("Upload rejected: {0}")]
    Rejected(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Transport over which claimed sample batches are uploaded.
#[async_trait]
pub trait SampleUploader: Send + Sync {
    /// Upload one batch of samples.
    ///
    /// # Errors
    ///
    /// An `Err` means the whole batch failed; the gateway returns it for
    /// retry on a later tick.
    async fn upload(&self, samples: &DataSampleSet) -> Result<(), UploadError>;
}
