//! Trait seams for Speck hardware.
//!
//! The wire protocol to the physical sensor is opaque request/response and
//! lives behind [`SpeckDevice`]; discovery lives behind [`DeviceScanner`].
//! The connectivity manager, the gateway, and the tests all work against
//! these traits, so a mock device is interchangeable with real hardware.

use std::sync::Arc;

use async_trait::async_trait;

use speck_types::{DataSample, SpeckConfig};

use crate::error::Result;

/// A connected Speck particle sensor.
///
/// Identity methods are synchronous because the handshake already fetched
/// them; everything that talks to the device is async.
#[async_trait]
pub trait SpeckDevice: Send + Sync {
    /// Identity the device reported during the connect handshake.
    fn config(&self) -> &SpeckConfig;

    /// The port/address the device is attached to.
    fn port_name(&self) -> &str;

    /// Liveness check. An `Err` means the device is no longer responsive.
    async fn ping(&self) -> Result<()>;

    /// Read the oldest sample stored on the device, or `None` when the
    /// device holds no pending samples.
    ///
    /// Reading does not consume the sample; call
    /// [`delete_sample`](Self::delete_sample) once it is safely persisted.
    async fn read_sample(&self) -> Result<Option<DataSample>>;

    /// Delete the stored sample with the given timestamp from the device.
    ///
    /// Returns whether the device reported a deletion.
    async fn delete_sample(&self, sample_time_utc_secs: i64) -> Result<bool>;

    /// Number of samples currently stored on the device.
    async fn available_sample_count(&self) -> Result<u32>;

    /// Disconnect from the device.
    async fn disconnect(&self) -> Result<()>;
}

/// Discovers and connects to Speck devices.
///
/// One call is one attempt; the connectivity manager owns the retry loop
/// around it.
#[async_trait]
pub trait DeviceScanner: Send + Sync {
    /// Run a single scan-and-connect attempt.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ScanFailed`](crate::Error::ScanFailed) when no
    /// device is attached, or a connect error when a device was found but
    /// the handshake failed.
    async fn scan_and_connect(&self) -> Result<Arc<dyn SpeckDevice>>;
}
