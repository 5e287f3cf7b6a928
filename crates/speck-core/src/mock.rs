//! Mock device implementation for testing.
//!
//! This module provides a mock Speck that can be used for unit testing
//! without sensor hardware attached.
//!
//! The [`MockSpeck`] implements the [`SpeckDevice`] trait, allowing it to be
//! used interchangeably with real devices in generic code; [`MockScanner`]
//! implements [`DeviceScanner`] and hands the mock out.
//!
//! # Features
//!
//! - **Failure injection**: fail the next N scans, pings, or deletes
//! - **Latency simulation**: add artificial delays to reads and scans
//! - **Scripted samples**: preload the sample queue the device will serve

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use speck_types::{DataSample, SpeckConfig};

use crate::error::{Error, Result};
use crate::traits::{DeviceScanner, SpeckDevice};

/// A mock Speck device for testing.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use speck_core::{MockSpeck, SpeckDevice};
/// use speck_types::DataSample;
///
/// #[tokio::main]
/// async fn main() {
///     let device = Arc::new(MockSpeck::new("test-speck"));
///     device.connect();
///     device.push_sample(DataSample::builder().sample_time_utc_secs(100).build()).await;
///
///     let sample = device.read_sample().await.unwrap().unwrap();
///     assert_eq!(sample.sample_time_utc_secs, 100);
/// }
/// ```
pub struct MockSpeck {
    config: SpeckConfig,
    port_name: String,
    connected: AtomicBool,
    samples: Mutex<VecDeque<DataSample>>,
    read_count: AtomicU32,
    ping_count: AtomicU32,
    /// Number of pings to fail before answering again.
    remaining_ping_failures: AtomicU32,
    /// Number of deletes to fail before succeeding again.
    remaining_delete_failures: AtomicU32,
    fail_reads: AtomicBool,
    /// Simulated read latency in milliseconds (0 = no delay).
    read_latency_ms: AtomicU64,
}

impl std::fmt::Debug for MockSpeck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSpeck")
            .field("config", &self.config)
            .field("port_name", &self.port_name)
            .field("connected", &self.connected.load(Ordering::Relaxed))
            .finish()
    }
}

impl MockSpeck {
    /// Create a new mock device with the given ID and default config.
    pub fn new(id: &str) -> Self {
        Self::with_config(SpeckConfig {
            id: id.to_string(),
            logging_interval_secs: 1,
        })
    }

    /// Create a new mock device with a full config.
    pub fn with_config(config: SpeckConfig) -> Self {
        Self {
            config,
            port_name: format!("mock-{:04X}", rand::random::<u32>() % 0xFFFF),
            connected: AtomicBool::new(false),
            samples: Mutex::new(VecDeque::new()),
            read_count: AtomicU32::new(0),
            ping_count: AtomicU32::new(0),
            remaining_ping_failures: AtomicU32::new(0),
            remaining_delete_failures: AtomicU32::new(0),
            fail_reads: AtomicBool::new(false),
            read_latency_ms: AtomicU64::new(0),
        }
    }

    /// Mark the device connected, as a scanner would after a handshake.
    pub fn connect(&self) {
        self.connected.store(true, Ordering::Relaxed);
    }

    /// Check if connected (sync method for internal use).
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    // --- Test control methods ---

    /// Append a sample to the device's stored-sample queue.
    pub async fn push_sample(&self, sample: DataSample) {
        self.samples.lock().await.push_back(sample);
    }

    /// Replace the device's stored-sample queue.
    pub async fn load_samples(&self, samples: impl IntoIterator<Item = DataSample>) {
        let mut queue = self.samples.lock().await;
        queue.clear();
        queue.extend(samples);
    }

    /// Number of samples still stored on the device.
    pub async fn pending_samples(&self) -> usize {
        self.samples.lock().await.len()
    }

    /// Fail the next `count` pings, then answer again.
    pub fn set_transient_ping_failures(&self, count: u32) {
        self.remaining_ping_failures.store(count, Ordering::Relaxed);
    }

    /// Fail the next `count` deletes, then succeed again.
    ///
    /// Failures surface as timeouts, which are retryable.
    pub fn set_transient_delete_failures(&self, count: u32) {
        self.remaining_delete_failures
            .store(count, Ordering::Relaxed);
    }

    /// Make every read fail until cleared.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::Relaxed);
    }

    /// Set simulated read latency.
    pub fn set_read_latency(&self, latency: Duration) {
        self.read_latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// Number of read operations performed.
    pub fn read_count(&self) -> u32 {
        self.read_count.load(Ordering::Relaxed)
    }

    /// Number of pings answered or failed.
    pub fn ping_count(&self) -> u32 {
        self.ping_count.load(Ordering::Relaxed)
    }

    fn check_connected(&self) -> Result<()> {
        if !self.connected.load(Ordering::Relaxed) {
            Err(Error::NotConnected)
        } else {
            Ok(())
        }
    }

    async fn simulate_read_latency(&self) {
        let latency = self.read_latency_ms.load(Ordering::Relaxed);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
    }
}

#[async_trait]
impl SpeckDevice for MockSpeck {
    fn config(&self) -> &SpeckConfig {
        &self.config
    }

    fn port_name(&self) -> &str {
        &self.port_name
    }

    async fn ping(&self) -> Result<()> {
        self.check_connected()?;
        self.ping_count.fetch_add(1, Ordering::Relaxed);

        if self.remaining_ping_failures.load(Ordering::Relaxed) > 0 {
            self.remaining_ping_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(Error::Unresponsive);
        }
        Ok(())
    }

    async fn read_sample(&self) -> Result<Option<DataSample>> {
        self.check_connected()?;
        self.simulate_read_latency().await;

        if self.fail_reads.load(Ordering::Relaxed) {
            return Err(Error::InvalidData("Mock read failure".to_string()));
        }

        self.read_count.fetch_add(1, Ordering::Relaxed);
        Ok(self.samples.lock().await.front().copied())
    }

    async fn delete_sample(&self, sample_time_utc_secs: i64) -> Result<bool> {
        self.check_connected()?;

        if self.remaining_delete_failures.load(Ordering::Relaxed) > 0 {
            self.remaining_delete_failures
                .fetch_sub(1, Ordering::Relaxed);
            return Err(Error::timeout("delete_sample", Duration::from_millis(250)));
        }

        let mut samples = self.samples.lock().await;
        match samples
            .iter()
            .position(|s| s.sample_time_utc_secs == sample_time_utc_secs)
        {
            Some(pos) => {
                samples.remove(pos);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn available_sample_count(&self) -> Result<u32> {
        self.check_connected()?;
        Ok(self.samples.lock().await.len() as u32)
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::Relaxed);
        Ok(())
    }
}

/// A mock scanner that hands out a [`MockSpeck`].
///
/// Configure transient failures to simulate an absent device:
///
/// ```
/// use std::sync::Arc;
/// use speck_core::{MockScanner, MockSpeck};
///
/// let device = Arc::new(MockSpeck::new("test"));
/// let scanner = MockScanner::new(device);
/// // First 2 scan attempts fail, 3rd succeeds
/// scanner.set_transient_failures(2);
/// ```
pub struct MockScanner {
    device: Arc<MockSpeck>,
    scan_count: AtomicU32,
    fail_count: AtomicU32,
    remaining_failures: AtomicU32,
    should_fail: AtomicBool,
    /// Simulated scan latency in milliseconds (0 = no delay).
    scan_latency_ms: AtomicU64,
}

impl std::fmt::Debug for MockScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockScanner")
            .field("device", &self.device)
            .field("scan_count", &self.scan_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl MockScanner {
    /// Create a scanner that finds the given device.
    pub fn new(device: Arc<MockSpeck>) -> Self {
        Self {
            device,
            scan_count: AtomicU32::new(0),
            fail_count: AtomicU32::new(0),
            remaining_failures: AtomicU32::new(0),
            should_fail: AtomicBool::new(false),
            scan_latency_ms: AtomicU64::new(0),
        }
    }

    /// Fail the next `count` scan attempts, then succeed.
    pub fn set_transient_failures(&self, count: u32) {
        self.fail_count.store(count, Ordering::Relaxed);
        self.remaining_failures.store(count, Ordering::Relaxed);
    }

    /// Re-arm the transient failure counter to its configured count.
    pub fn reset_transient_failures(&self) {
        self.remaining_failures
            .store(self.fail_count.load(Ordering::Relaxed), Ordering::Relaxed);
    }

    /// Make every scan fail until cleared.
    pub fn set_should_fail(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::Relaxed);
    }

    /// Set simulated scan latency.
    pub fn set_scan_latency(&self, latency: Duration) {
        self.scan_latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// Number of scan attempts made.
    pub fn scan_count(&self) -> u32 {
        self.scan_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DeviceScanner for MockScanner {
    async fn scan_and_connect(&self) -> Result<Arc<dyn SpeckDevice>> {
        let latency = self.scan_latency_ms.load(Ordering::Relaxed);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        self.scan_count.fetch_add(1, Ordering::Relaxed);

        if self.remaining_failures.load(Ordering::Relaxed) > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(Error::no_device_found());
        }

        if self.should_fail.load(Ordering::Relaxed) {
            return Err(Error::no_device_found());
        }

        self.device.connect();
        Ok(Arc::clone(&self.device) as Arc<dyn SpeckDevice>)
    }
}
