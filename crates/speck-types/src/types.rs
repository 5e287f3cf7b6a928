//! Core types for Speck sensor data.

use core::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Logging intervals (in seconds) a Speck device can be configured to record at.
pub const SUPPORTED_LOGGING_INTERVALS: [u32; 11] = [1, 2, 5, 10, 20, 30, 45, 60, 120, 180, 240];

/// A single particle-sensor reading downloaded from a Speck device.
///
/// Samples are immutable values: the device records a reading, the gateway
/// downloads it, and the fields never change afterwards. The sample timestamp
/// is the identity of the sample; one device never records two samples with
/// the same timestamp.
///
/// # Example
///
/// ```
/// use speck_types::DataSample;
///
/// let sample = DataSample::builder()
///     .sample_time_utc_secs(1_392_853_434)
///     .raw_particle_count(42)
///     .particle_count(13.4)
///     .temperature(68.2)
///     .humidity(39.0)
///     .build();
///
/// assert_eq!(sample.sample_time_utc_secs, 1_392_853_434);
/// assert!(sample.download_time().is_none());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DataSample {
    /// When the device recorded the sample, in seconds since the Unix epoch.
    pub sample_time_utc_secs: i64,
    /// Raw particle count reported by the sensor hardware.
    pub raw_particle_count: u32,
    /// Particle concentration derived from the raw count.
    pub particle_count: f32,
    /// Temperature in degrees Fahrenheit.
    pub temperature: f32,
    /// Relative humidity in percent.
    pub humidity: f32,
    /// When the gateway downloaded the sample from the device, in milliseconds
    /// since the Unix epoch. Zero means the sample was never downloaded.
    pub download_time_utc_millis: i64,
}

impl DataSample {
    /// The sample timestamp as an [`time::OffsetDateTime`], if representable.
    #[must_use]
    pub fn sample_time(&self) -> Option<time::OffsetDateTime> {
        time::OffsetDateTime::from_unix_timestamp(self.sample_time_utc_secs).ok()
    }

    /// The download timestamp, or `None` if the sample was never downloaded.
    #[must_use]
    pub fn download_time(&self) -> Option<time::OffsetDateTime> {
        if self.download_time_utc_millis == 0 {
            return None;
        }
        let nanos = i128::from(self.download_time_utc_millis) * 1_000_000;
        time::OffsetDateTime::from_unix_timestamp_nanos(nanos).ok()
    }

    /// Set the download timestamp to the given wall-clock time.
    ///
    /// This is useful when stamping a sample as it is read from the device.
    #[must_use]
    pub fn with_download_time(mut self, now: time::OffsetDateTime) -> Self {
        self.download_time_utc_millis = (now.unix_timestamp_nanos() / 1_000_000) as i64;
        self
    }

    /// Create a builder for constructing a `DataSample`.
    pub fn builder() -> DataSampleBuilder {
        DataSampleBuilder::default()
    }
}

/// Builder for constructing a [`DataSample`].
///
/// Use [`build`](Self::build) for unchecked construction, or
/// [`try_build`](Self::try_build) for validation of field values.
#[derive(Debug, Default)]
#[must_use]
pub struct DataSampleBuilder {
    sample: DataSample,
}

impl DataSampleBuilder {
    /// Set the sample timestamp in seconds since the Unix epoch.
    pub fn sample_time_utc_secs(mut self, secs: i64) -> Self {
        self.sample.sample_time_utc_secs = secs;
        self
    }

    /// Set the raw particle count.
    pub fn raw_particle_count(mut self, count: u32) -> Self {
        self.sample.raw_particle_count = count;
        self
    }

    /// Set the derived particle concentration.
    pub fn particle_count(mut self, count: f32) -> Self {
        self.sample.particle_count = count;
        self
    }

    /// Set the temperature.
    pub fn temperature(mut self, temp: f32) -> Self {
        self.sample.temperature = temp;
        self
    }

    /// Set the relative humidity (0-100).
    pub fn humidity(mut self, humidity: f32) -> Self {
        self.sample.humidity = humidity;
        self
    }

    /// Set the download timestamp in milliseconds since the Unix epoch.
    pub fn download_time_utc_millis(mut self, millis: i64) -> Self {
        self.sample.download_time_utc_millis = millis;
        self
    }

    /// Build the `DataSample` without validation.
    #[must_use]
    pub fn build(self) -> DataSample {
        self.sample
    }

    /// Build the `DataSample` with validation.
    ///
    /// Validates:
    /// - `sample_time_utc_secs` is positive
    /// - `particle_count` is not negative
    /// - `humidity` is 0-100
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidValue`] if any field has an invalid value.
    pub fn try_build(self) -> Result<DataSample, ParseError> {
        if self.sample.sample_time_utc_secs <= 0 {
            return Err(ParseError::InvalidValue(format!(
                "sample timestamp {} is not a positive Unix time",
                self.sample.sample_time_utc_secs
            )));
        }

        if self.sample.particle_count < 0.0 {
            return Err(ParseError::InvalidValue(format!(
                "particle count {} is negative",
                self.sample.particle_count
            )));
        }

        if !(0.0..=100.0).contains(&self.sample.humidity) {
            return Err(ParseError::InvalidValue(format!(
                "humidity {} is outside valid range (0-100)",
                self.sample.humidity
            )));
        }

        Ok(self.sample)
    }
}

/// Where a sample is in its upload lifecycle.
///
/// Every stored sample carries exactly one status at any time. `Success` is
/// the only terminal state; a sample may cycle between `NotAttempted` and
/// `InProgress` arbitrarily many times before it eventually succeeds.
///
/// # Text round-trip
///
/// Statuses round-trip through a stable textual form, which is how the
/// recoverable store persists them:
///
/// ```
/// use speck_types::UploadStatus;
///
/// assert_eq!(UploadStatus::InProgress.as_str(), "in_progress");
/// assert_eq!("in_progress".parse::<UploadStatus>(), Ok(UploadStatus::InProgress));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum UploadStatus {
    /// Not yet claimed by any upload attempt.
    NotAttempted,
    /// Claimed by exactly one in-flight upload attempt.
    InProgress,
    /// Uploaded and acknowledged. Terminal.
    Success,
    /// An upload attempt failed; the sample returns to `NotAttempted` for retry.
    Failure,
}

impl UploadStatus {
    /// The stable textual form of this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::NotAttempted => "not_attempted",
            UploadStatus::InProgress => "in_progress",
            UploadStatus::Success => "success",
            UploadStatus::Failure => "failure",
        }
    }
}

impl FromStr for UploadStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_attempted" => Ok(UploadStatus::NotAttempted),
            "in_progress" => Ok(UploadStatus::InProgress),
            "success" => Ok(UploadStatus::Success),
            "failure" => Ok(UploadStatus::Failure),
            other => Err(ParseError::UnknownUploadStatus(other.to_string())),
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a `save` call on a sample store.
///
/// Save outcomes are returned synchronously, never as an `Err`: an I/O
/// failure while persisting one sample is local to that sample and must not
/// tear down the caller.
///
/// ```
/// use speck_types::SaveResult;
///
/// assert!(SaveResult::Success.was_saved());
/// assert!(!SaveResult::FailureDuplicate.was_saved());
/// assert_eq!(SaveResult::FailureDuplicate.name(), "Duplicate");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SaveResult {
    /// The sample was persisted with status `NotAttempted`.
    Success,
    /// An I/O failure prevented persisting the sample. The store remains
    /// usable for subsequent calls.
    FailureError,
    /// A sample with the same timestamp already exists. Only stores that
    /// perform duplicate detection report this.
    FailureDuplicate,
}

impl SaveResult {
    /// Display name of the outcome.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            SaveResult::Success => "Success",
            SaveResult::FailureError => "Error",
            SaveResult::FailureDuplicate => "Duplicate",
        }
    }

    /// Whether the sample was persisted.
    #[must_use]
    pub fn was_saved(&self) -> bool {
        matches!(self, SaveResult::Success)
    }
}

impl fmt::Display for SaveResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An ordered, bounded batch of samples claimed for upload.
///
/// A set is a transient claim token: while it exists in flight, the samples
/// it references are `InProgress` in the store. The orchestrator discards it
/// after reporting success or failure for the whole batch.
///
/// Iteration always yields samples in increasing timestamp order, and a set
/// never holds two samples with the same timestamp.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DataSampleSet {
    samples: Vec<DataSample>,
}

impl DataSampleSet {
    /// Default batch bound applied when a caller requests a non-positive
    /// number of samples.
    pub const DEFAULT_SIZE: usize = 100;

    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a sample, keeping the set ordered by timestamp.
    ///
    /// Returns `false` (and leaves the set unchanged) if a sample with the
    /// same timestamp is already present.
    pub fn insert(&mut self, sample: DataSample) -> bool {
        match self
            .samples
            .binary_search_by_key(&sample.sample_time_utc_secs, |s| s.sample_time_utc_secs)
        {
            Ok(_) => false,
            Err(pos) => {
                self.samples.insert(pos, sample);
                true
            }
        }
    }

    /// Whether a sample with the given timestamp is in the set.
    #[must_use]
    pub fn contains(&self, sample_time_utc_secs: i64) -> bool {
        self.samples
            .binary_search_by_key(&sample_time_utc_secs, |s| s.sample_time_utc_secs)
            .is_ok()
    }

    /// Number of samples in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Iterate over the samples in increasing timestamp order.
    pub fn iter(&self) -> std::slice::Iter<'_, DataSample> {
        self.samples.iter()
    }

    /// Iterate over the sample timestamps in increasing order.
    pub fn timestamps(&self) -> impl Iterator<Item = i64> + '_ {
        self.samples.iter().map(|s| s.sample_time_utc_secs)
    }
}

impl<'a> IntoIterator for &'a DataSampleSet {
    type Item = &'a DataSample;
    type IntoIter = std::slice::Iter<'a, DataSample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}

impl FromIterator<DataSample> for DataSampleSet {
    fn from_iter<I: IntoIterator<Item = DataSample>>(iter: I) -> Self {
        let mut set = Self::new();
        for sample in iter {
            set.insert(sample);
        }
        set
    }
}

/// Identity of a connected Speck device, reported during the connect
/// handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpeckConfig {
    /// Unique device identifier.
    pub id: String,
    /// Cadence at which the device records samples, in seconds.
    pub logging_interval_secs: u32,
}

impl SpeckConfig {
    /// Whether the given logging interval is one the device family supports.
    #[must_use]
    pub fn is_supported_interval(secs: u32) -> bool {
        SUPPORTED_LOGGING_INTERVALS.contains(&secs)
    }
}

impl Default for SpeckConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            logging_interval_secs: 1,
        }
    }
}

impl fmt::Display for SpeckConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Speck {} ({}s interval)", self.id, self.logging_interval_secs)
    }
}
