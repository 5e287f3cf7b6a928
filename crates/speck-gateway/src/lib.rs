//! Gateway service for Speck particle sensors.
//!
//! This crate assembles the pieces from [`speck_core`] and [`speck_store`]
//! into a running gateway: samples are drained from a connected device into
//! a local store, then pushed to a remote endpoint in batches, with every
//! pipeline step counted and observable.
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use speck_core::{ConnectivityEvent, ConnectivityManager, ConnectivityOptions};
//! use speck_core::{MockScanner, MockSpeck};
//! use speck_gateway::{DataSampleManager, ManagerOptions, MockUploader};
//! use speck_store::SqliteSampleStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(SqliteSampleStore::open_in_memory()?);
//!     let uploader = Arc::new(MockUploader::new());
//!     let manager = Arc::new(DataSampleManager::new(store, uploader, ManagerOptions::default())?);
//!     manager.start().await?;
//!
//!     let device = Arc::new(MockSpeck::new("speck-1"));
//!     let scanner = Arc::new(MockScanner::new(device));
//!     let connectivity =
//!         Arc::new(ConnectivityManager::new(scanner, ConnectivityOptions::default())?);
//!
//!     let mut events = connectivity.subscribe();
//!     connectivity.connect().await;
//!
//!     while let Ok(event) = events.recv().await {
//!         if let ConnectivityEvent::Connected { .. } = event {
//!             if let Some(device) = connectivity.device().await {
//!                 manager.spawn_download_loop(device).await;
//!             }
//!             break;
//!         }
//!     }
//!
//!     connectivity.disconnect().await;
//!     manager.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Crate layout
//!
//! - [`config`]: TOML configuration with validation
//! - [`manager`]: the download and upload pipelines
//! - [`stats`]: pipeline counters and their event stream
//! - [`uploader`]: the remote endpoint seam and its errors
//! - [`mock`]: an in-memory uploader for tests

pub mod config;
pub mod error;
pub mod manager;
pub mod mock;
pub mod stats;
pub mod uploader;

pub use config::{
    ConfigError, ConnectivityConfig, GatewayConfig, RemoteStorageCredentials, StorageConfig,
    UploadConfig, ValidationError, default_config_path,
};
pub use error::{Error, Result};
pub use manager::{DataSampleManager, ManagerOptions};
pub use mock::MockUploader;
pub use stats::{Category, StatisticEvent, Statistics};
pub use uploader::{SampleUploader, UploadError};
