//! Local sample persistence and upload-state tracking for Speck sensors.
//!
//! This crate stores downloaded data samples and tracks each sample through
//! its upload lifecycle, so that uploads survive crashes and restarts.
//!
//! Two implementations share the [`DataSampleStore`] trait:
//!
//! - [`SqliteSampleStore`]: the recoverable store. Durable saves, duplicate
//!   detection, and the full `NotAttempted -> InProgress -> Success` upload
//!   state machine over SQLite.
//! - [`CsvSampleStore`]: a degraded archival store. Appends samples to a CSV
//!   file and tracks no upload state; useful when raw durability is all
//!   that is needed.
//!
//! # Example
//!
//! ```no_run
//! use speck_store::{DataSampleStore, SqliteSampleStore};
//! use speck_types::DataSample;
//!
//! let store = SqliteSampleStore::open("samples.db")?;
//!
//! let sample = DataSample::builder()
//!     .sample_time_utc_secs(1_392_853_434)
//!     .raw_particle_count(40)
//!     .particle_count(12.5)
//!     .build();
//! println!("saved: {}", store.save(&sample));
//!
//! // Recover anything a previous process left claimed, then claim a batch.
//! store.reset_uploading_samples()?;
//! let batch = store.samples_to_upload(100)?;
//! println!("{} samples pending upload", batch.len());
//! # Ok::<(), speck_store::Error>(())
//! ```

mod error;
mod models;
mod record;
mod schema;
mod store;

pub use error::{Error, Result};
pub use models::{ImportOutcome, StoredSample};
pub use record::{HEADER, SAMPLES_FILE, read_samples};
pub use store::{CsvSampleStore, DataSampleStore, SqliteSampleStore};

use speck_types::SpeckConfig;

/// Default data directory following platform conventions.
///
/// - Linux: `~/.local/share/speck`
/// - macOS: `~/Library/Application Support/speck`
/// - Windows: `C:\Users\<user>\AppData\Local\speck`
pub fn default_data_dir() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("speck")
}

/// Per-device data directory under [`default_data_dir`].
///
/// Each device gets its own subdirectory named after its id, e.g.
/// `Speck4A3F`.
pub fn device_data_dir(config: &SpeckConfig) -> std::path::PathBuf {
    default_data_dir().join(format!("Speck{}", config.id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_data_dir_layout() {
        let config = SpeckConfig {
            id: "4A3F".to_string(),
            logging_interval_secs: 1,
        };
        let dir = device_data_dir(&config);
        assert!(dir.ends_with("speck/Speck4A3F") || dir.ends_with("Speck4A3F"));
        assert!(dir.starts_with(default_data_dir()));
    }
}
