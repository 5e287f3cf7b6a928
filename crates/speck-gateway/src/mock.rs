//! Mock uploader implementation for testing.
//!
//! [`MockUploader`] implements [`SampleUploader`] entirely in memory, so the
//! gateway's upload pipeline can be exercised without a remote endpoint.
//!
//! # Features
//!
//! - **Failure injection**: fail the next N uploads, or every upload
//! - **Latency simulation**: add artificial delay to each upload
//! - **Capture**: every accepted batch is recorded for inspection

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use speck_types::DataSampleSet;

use crate::uploader::{SampleUploader, UploadError};

/// A mock uploader for testing.
///
/// # Example
///
/// ```
/// use speck_gateway::{MockUploader, SampleUploader};
/// use speck_types::{DataSample, DataSampleSet};
///
/// #[tokio::main]
/// async fn main() {
///     let uploader = MockUploader::new();
///     let batch: DataSampleSet =
///         [DataSample::builder().sample_time_utc_secs(100).build()].into_iter().collect();
///
///     uploader.upload(&batch).await.unwrap();
///     assert_eq!(uploader.uploaded_timestamps().await, vec![100]);
/// }
/// ```
#[derive(Default)]
pub struct MockUploader {
    uploaded: Mutex<Vec<DataSampleSet>>,
    upload_count: AtomicU32,
    /// Number of uploads to fail before accepting again.
    remaining_failures: AtomicU32,
    fail_all: AtomicBool,
    /// Simulated upload latency in milliseconds (0 = no delay).
    latency_ms: AtomicU64,
}

impl std::fmt::Debug for MockUploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockUploader")
            .field("upload_count", &self.upload_count.load(Ordering::Relaxed))
            .field("fail_all", &self.fail_all.load(Ordering::Relaxed))
            .finish()
    }
}

impl MockUploader {
    /// Create an uploader that accepts every batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` uploads, then accept again.
    pub fn set_transient_failures(&self, count: u32) {
        self.remaining_failures.store(count, Ordering::Relaxed);
    }

    /// Make every upload fail until cleared.
    pub fn set_fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::Relaxed);
    }

    /// Set simulated upload latency.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// Number of upload attempts made, successful or not.
    pub fn upload_count(&self) -> u32 {
        self.upload_count.load(Ordering::Relaxed)
    }

    /// Number of batches accepted.
    pub async fn batch_count(&self) -> usize {
        self.uploaded.lock().await.len()
    }

    /// Timestamps of every accepted sample, in upload order.
    pub async fn uploaded_timestamps(&self) -> Vec<i64> {
        self.uploaded
            .lock()
            .await
            .iter()
            .flat_map(|set| set.timestamps().collect::<Vec<_>>())
            .collect()
    }
}

#[async_trait]
impl SampleUploader for MockUploader {
    async fn upload(&self, samples: &DataSampleSet) -> Result<(), UploadError> {
        let latency = self.latency_ms.load(Ordering::Relaxed);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        self.upload_count.fetch_add(1, Ordering::Relaxed);

        if self.remaining_failures.load(Ordering::Relaxed) > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(UploadError::Unreachable(
                "mock transient failure".to_string(),
            ));
        }

        if self.fail_all.load(Ordering::Relaxed) {
            return Err(UploadError::Unreachable("mock outage".to_string()));
        }

        self.uploaded.lock().await.push(samples.clone());
        Ok(())
    }
}
