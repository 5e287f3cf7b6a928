//! Device connectivity for Speck particle sensors.
//!
//! This crate provides the device-facing half of the Speck gateway: traits
//! describing a connected sensor ([`SpeckDevice`]) and a way to find one
//! ([`DeviceScanner`]), a background [`ConnectivityManager`] that keeps a
//! device connected across absences and losses, retry policies with
//! exponential backoff, and broadcast [`ConnectivityEvent`]s for observers.
//!
//! Real transports implement the two traits; [`MockSpeck`] and
//! [`MockScanner`] ship with the crate for testing and demos.
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use speck_core::{
//!     ConnectivityEvent, ConnectivityManager, ConnectivityOptions, MockScanner, MockSpeck,
//! };
//!
//! # async fn example() -> Result<(), speck_core::Error> {
//! let device = Arc::new(MockSpeck::new("speck-1"));
//! let scanner = Arc::new(MockScanner::new(device));
//! let manager = Arc::new(ConnectivityManager::new(scanner, ConnectivityOptions::default())?);
//!
//! let mut events = manager.subscribe();
//! manager.connect().await;
//!
//! while let Ok(event) = events.recv().await {
//!     match event {
//!         ConnectivityEvent::Connected { config, port } => {
//!             println!("connected to {} on {}", config.id, port);
//!             break;
//!         }
//!         other => println!("{:?}", other),
//!     }
//! }
//!
//! manager.disconnect().await;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod events;
pub mod manager;
pub mod mock;
pub mod retry;
pub mod traits;

pub use error::{ConnectionFailureReason, Error, Result, ScanFailureReason};
pub use events::{ConnectivityEvent, EventDispatcher, EventReceiver, EventSender};
pub use manager::{ConnectionState, ConnectivityManager, ConnectivityOptions};
pub use mock::{MockScanner, MockSpeck};
pub use retry::{RetryPolicy, with_retry};
pub use traits::{DeviceScanner, SpeckDevice};

// Re-export the shared types crate for convenience.
pub use speck_types as types;
