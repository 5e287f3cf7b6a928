//! Error types for speck-core.
//!
//! This module defines the errors that can occur while discovering,
//! connecting to, and talking to a Speck device.
//!
//! # Recovery
//!
//! Scan and connect failures are the normal case, not the exceptional one: a
//! device that is unplugged, still enumerating, or powered off looks exactly
//! like a failed scan. The connectivity manager therefore treats every scan
//! failure as retryable and keeps trying on a backoff schedule. The errors
//! that stop a loop are [`Error::Cancelled`] (the caller asked for
//! disconnect) and [`Error::InvalidConfig`] (fix the configuration and
//! restart).

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when communicating with Speck devices.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A scan-and-connect attempt did not produce a connected device.
    #[error("Scan failed: {0}")]
    ScanFailed(ScanFailureReason),

    /// Operation attempted while not connected to a device.
    #[error("Not connected to device")]
    NotConnected,

    /// A device was found but the connect handshake failed.
    #[error("Connection failed: {reason}")]
    ConnectionFailed {
        /// The port the attempt was made on, if one was identified.
        port: Option<String>,
        /// The structured reason for the failure.
        reason: ConnectionFailureReason,
    },

    /// The connected device stopped answering liveness pings.
    #[error("Device is not responding")]
    Unresponsive,

    /// Failed to parse data received from the device.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Operation timed out.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// Operation was cancelled.
    #[error("Operation cancelled")]
    Cancelled,

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Structured reasons why a scan attempt found no usable device.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new reasons
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ScanFailureReason {
    /// No Speck device is attached to any candidate port.
    NoDeviceFound,
    /// A candidate port exists but could not be opened.
    PortUnavailable {
        /// The port that could not be opened.
        port: String,
    },
    /// The scan gave up after the given duration.
    ScanTimeout {
        /// How long the scan ran before giving up.
        duration: Duration,
    },
}

impl std::fmt::Display for ScanFailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoDeviceFound => write!(f, "no device found"),
            Self::PortUnavailable { port } => write!(f, "port '{}' unavailable", port),
            Self::ScanTimeout { duration } => write!(f, "scan timed out after {:?}", duration),
        }
    }
}

/// Structured reasons for connect-handshake failures.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new reasons
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConnectionFailureReason {
    /// The device is held open by another process.
    Busy,
    /// The device answered the handshake with garbage.
    HandshakeFailed(String),
    /// The handshake timed out.
    Timeout,
    /// Other/unknown error.
    Other(String),
}

impl std::fmt::Display for ConnectionFailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Busy => write!(f, "device busy"),
            Self::HandshakeFailed(msg) => write!(f, "handshake failed: {}", msg),
            Self::Timeout => write!(f, "handshake timed out"),
            Self::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl Error {
    /// Create a scan failure for the common no-device case.
    pub fn no_device_found() -> Self {
        Self::ScanFailed(ScanFailureReason::NoDeviceFound)
    }

    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Create a connection failure with structured reason.
    pub fn connection_failed(port: Option<String>, reason: ConnectionFailureReason) -> Self {
        Self::ConnectionFailed { port, reason }
    }
}

/// Result type alias using speck-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
