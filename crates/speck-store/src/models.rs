//! Data models for stored samples.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use speck_types::{DataSample, UploadStatus};

/// A sample as stored in the recoverable store, with its upload state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSample {
    /// The sample itself.
    pub sample: DataSample,
    /// Where the sample is in its upload lifecycle.
    pub upload_status: UploadStatus,
    /// When the sample was uploaded, in milliseconds since the Unix epoch.
    /// `None` until the sample reaches `Success`.
    pub upload_time_utc_millis: Option<i64>,
    /// How many upload attempts for this sample have failed.
    pub failure_count: u32,
}

impl StoredSample {
    /// The upload timestamp, if the sample has been uploaded.
    #[must_use]
    pub fn upload_time(&self) -> Option<OffsetDateTime> {
        let millis = self.upload_time_utc_millis?;
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).ok()
    }
}

/// Counts from importing an archival CSV file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOutcome {
    /// Rows persisted as new samples.
    pub imported: usize,
    /// Rows skipped because a sample with the same timestamp already exists.
    pub duplicates: usize,
    /// Rows that failed to decode or persist.
    pub failed: usize,
}

impl ImportOutcome {
    /// Total rows examined.
    #[must_use]
    pub fn total(&self) -> usize {
        self.imported + self.duplicates + self.failed
    }
}
