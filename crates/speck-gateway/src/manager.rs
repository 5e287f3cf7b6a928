//! Sample download and upload orchestration.
//!
//! [`DataSampleManager`] ties the pieces of the gateway together: it drains
//! samples from a connected device into a [`DataSampleStore`], and pushes
//! stored samples to a [`SampleUploader`] in batches on a fixed cadence.
//!
//! Both pipelines run as background tasks. The upload loop starts with
//! [`start`](DataSampleManager::start) and runs for the life of the manager;
//! a download loop is spawned per connected device with
//! [`spawn_download_loop`](DataSampleManager::spawn_download_loop) and exits
//! when its device stops answering. Every pipeline step is counted in the
//! manager's [`Statistics`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use speck_core::{RetryPolicy, SpeckDevice, with_retry};
use speck_store::DataSampleStore;
use speck_types::SaveResult;

use crate::error::{Error, Result};
use crate::stats::{Category, Statistics};
use crate::uploader::SampleUploader;

/// Options for the sample pipelines.
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    /// Interval between upload batches. The first batch is attempted as soon
    /// as the upload loop starts.
    pub upload_interval: Duration,
    /// Samples claimed per upload batch. Non-positive values fall back to
    /// the store's default bound.
    pub upload_batch_size: i32,
    /// How long the download loop waits before polling again when the device
    /// has no samples stored.
    pub download_idle_delay: Duration,
    /// Retry policy for deleting a sample off the device after it is safely
    /// stored.
    pub delete_retry: RetryPolicy,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            upload_interval: Duration::from_secs(30),
            upload_batch_size: 100,
            download_idle_delay: Duration::from_secs(1),
            delete_retry: RetryPolicy::quick(),
        }
    }
}

impl ManagerOptions {
    /// Check the options for nonsensical settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if an interval is zero or the delete
    /// retry policy is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.upload_interval.is_zero() {
            return Err(Error::invalid_config("upload_interval must be non-zero"));
        }
        if self.download_idle_delay.is_zero() {
            return Err(Error::invalid_config(
                "download_idle_delay must be non-zero",
            ));
        }
        self.delete_retry
            .validate()
            .map_err(|e| Error::invalid_config(e.to_string()))?;
        Ok(())
    }
}

/// Moves samples from device to store to remote endpoint.
///
/// The manager is single-use: [`shutdown`](Self::shutdown) cancels every
/// pipeline, closes the store, and leaves the manager spent.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use speck_gateway::{DataSampleManager, ManagerOptions, MockUploader};
/// use speck_store::SqliteSampleStore;
///
/// # async fn example() -> Result<(), speck_gateway::Error> {
/// let store = Arc::new(SqliteSampleStore::open_in_memory()?);
/// let uploader = Arc::new(MockUploader::new());
/// let manager = DataSampleManager::new(store, uploader, ManagerOptions::default())?;
///
/// manager.start().await?;
/// // ... hand connected devices to manager.spawn_download_loop(...) ...
/// manager.shutdown().await?;
/// # Ok(())
/// # }
/// ```
pub struct DataSampleManager {
    store: Arc<dyn DataSampleStore>,
    uploader: Arc<dyn SampleUploader>,
    stats: Arc<Statistics>,
    options: ManagerOptions,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
}

impl DataSampleManager {
    /// Create a manager over the given store and uploader.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the options fail validation.
    pub fn new(
        store: Arc<dyn DataSampleStore>,
        uploader: Arc<dyn SampleUploader>,
        options: ManagerOptions,
    ) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            store,
            uploader,
            stats: Arc::new(Statistics::new()),
            options,
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        })
    }

    /// The manager's pipeline statistics.
    pub fn stats(&self) -> Arc<Statistics> {
        Arc::clone(&self.stats)
    }

    /// Recover interrupted uploads and start the upload loop.
    ///
    /// Any sample left claimed by a previous run is returned to the upload
    /// queue before the loop starts, so a crash mid-upload never strands
    /// samples. Calling this again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if startup recovery fails.
    pub async fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("Sample manager already started");
            return Ok(());
        }

        let recovered = self.store.reset_uploading_samples()?;
        if recovered > 0 {
            info!("Recovered {} samples from an interrupted upload", recovered);
        }

        let handle = tokio::spawn(upload_loop(
            Arc::clone(&self.store),
            Arc::clone(&self.uploader),
            Arc::clone(&self.stats),
            self.options.clone(),
            self.cancel.clone(),
        ));
        self.tasks.lock().await.push(handle);
        Ok(())
    }

    /// Start draining samples from a connected device.
    ///
    /// The loop runs until the device stops answering reads or the manager
    /// shuts down. Spawn a fresh loop for each (re)connected device.
    pub async fn spawn_download_loop(&self, device: Arc<dyn SpeckDevice>) {
        let handle = tokio::spawn(download_loop(
            device,
            Arc::clone(&self.store),
            Arc::clone(&self.stats),
            self.options.clone(),
            self.cancel.clone(),
        ));
        self.tasks.lock().await.push(handle);
    }

    /// Stop every pipeline and close the store.
    ///
    /// Waits for in-flight work to settle before the store closes, so no
    /// pipeline ever observes a closed store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if closing the store fails. The store
    /// rejects a second shutdown.
    pub async fn shutdown(&self) -> Result<()> {
        self.cancel.cancel();

        let tasks = std::mem::take(&mut *self.tasks.lock().await);
        for task in tasks {
            let _ = task.await;
        }

        self.store.shutdown()?;
        info!("Sample manager shut down");
        Ok(())
    }
}

/// Claim batches of stored samples and push them to the uploader on a fixed
/// cadence.
async fn upload_loop(
    store: Arc<dyn DataSampleStore>,
    uploader: Arc<dyn SampleUploader>,
    stats: Arc<Statistics>,
    options: ManagerOptions,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(options.upload_interval);
    let mut consecutive_failures: u32 = 0;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let batch = match store.samples_to_upload(options.upload_batch_size) {
            Ok(batch) => batch,
            Err(e) => {
                warn!("Failed to claim samples for upload: {}", e);
                continue;
            }
        };
        if batch.is_empty() {
            continue;
        }

        stats.add(Category::SampleUploadsRequested, batch.len() as u64);

        let result = tokio::select! {
            _ = cancel.cancelled() => {
                // Return the claim before exiting, otherwise the batch stays
                // in progress until the next startup recovery.
                if let Err(e) = store.mark_failed(&batch) {
                    warn!("Failed to release {} claimed samples: {}", batch.len(), e);
                }
                break;
            }
            result = uploader.upload(&batch) => result,
        };

        match result {
            Ok(()) => {
                consecutive_failures = 0;
                stats.add(Category::SampleUploadsSuccessful, batch.len() as u64);

                let now_millis =
                    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64;
                if let Err(e) = store.mark_uploaded(&batch, now_millis) {
                    warn!("Failed to mark {} samples uploaded: {}", batch.len(), e);
                }
                debug!("Uploaded {} samples", batch.len());
            }
            Err(e) => {
                stats.add(Category::SampleUploadsFailed, batch.len() as u64);
                if let Err(mark_err) = store.mark_failed(&batch) {
                    warn!(
                        "Failed to release {} claimed samples: {}",
                        batch.len(),
                        mark_err
                    );
                }

                consecutive_failures += 1;
                if consecutive_failures <= 3 {
                    warn!(
                        "Upload of {} samples failed (attempt {}): {}",
                        batch.len(),
                        consecutive_failures,
                        e
                    );
                } else if consecutive_failures == 4 {
                    error!("Uploads keep failing, will continue trying silently");
                }
                // Keep trying - the endpoint may come back
            }
        }
    }
}

/// Read samples off a device one at a time, persist each, and delete it from
/// the device once it is safely stored.
async fn download_loop(
    device: Arc<dyn SpeckDevice>,
    store: Arc<dyn DataSampleStore>,
    stats: Arc<Statistics>,
    options: ManagerOptions,
    cancel: CancellationToken,
) {
    info!("Downloading samples from Speck {}", device.config().id);

    loop {
        if cancel.is_cancelled() {
            break;
        }

        stats.increment(Category::DownloadsRequested);
        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = device.read_sample() => result,
        };

        let sample = match result {
            Ok(Some(sample)) => {
                stats.increment(Category::DownloadsSuccessful);
                sample.with_download_time(OffsetDateTime::now_utc())
            }
            Ok(None) => {
                // Device has nothing stored yet; poll again shortly
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(options.download_idle_delay) => {}
                }
                continue;
            }
            Err(e) => {
                stats.increment(Category::DownloadsFailed);
                warn!("Failed to read sample from Speck {}: {}", device.config().id, e);
                break;
            }
        };

        stats.increment(Category::SavesRequested);
        let saved = store.save(&sample);
        match saved {
            SaveResult::Success => stats.increment(Category::SavesSuccessful),
            SaveResult::FailureDuplicate | SaveResult::FailureError => {
                stats.increment(Category::SavesFailed)
            }
        };

        if saved == SaveResult::FailureError {
            // Leave the sample on the device and retry the whole read later
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(options.download_idle_delay) => {}
            }
            continue;
        }

        // Saved, or a duplicate of one already saved. Either way the device
        // copy is redundant: clear it so the next read serves the next sample.
        let timestamp = sample.sample_time_utc_secs;
        let deleted = with_retry(&options.delete_retry, "delete_sample", || {
            let device = Arc::clone(&device);
            async move { device.delete_sample(timestamp).await }
        })
        .await;

        match deleted {
            Ok(true) => debug!("Deleted sample {} from device", timestamp),
            Ok(false) => debug!("Sample {} was already gone from device", timestamp),
            Err(e) => warn!("Failed to delete sample {} from device: {}", timestamp, e),
        }
    }

    debug!("Download loop for Speck {} stopped", device.config().id);
}
