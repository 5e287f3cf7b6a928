//! Shared types for the Speck particle sensor gateway.
//!
//! This crate provides the vocabulary used by every other gateway crate:
//! samples, sample batches, upload lifecycle states, and device identity.
//!
//! # Features
//!
//! - [`DataSample`] and its builder
//! - [`DataSampleSet`], the ordered claim token for upload batches
//! - [`UploadStatus`] and [`SaveResult`] lifecycle enums
//! - [`SpeckConfig`] device identity
//!
//! # Example
//!
//! ```
//! use speck_types::{DataSample, DataSampleSet};
//!
//! let mut batch = DataSampleSet::new();
//! batch.insert(DataSample::builder().sample_time_utc_secs(20).build());
//! batch.insert(DataSample::builder().sample_time_utc_secs(10).build());
//!
//! let times: Vec<i64> = batch.timestamps().collect();
//! assert_eq!(times, vec![10, 20]);
//! ```

pub mod error;
pub mod types;

pub use error::{ParseError, ParseResult};
pub use types::{
    DataSample, DataSampleBuilder, DataSampleSet, SUPPORTED_LOGGING_INTERVALS, SaveResult,
    SpeckConfig, UploadStatus,
};
