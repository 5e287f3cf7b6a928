//! Error types for data parsing in speck-types.

use thiserror::Error;

/// Errors that can occur when parsing or validating Speck sample data.
///
/// This error type is platform-agnostic and does not include transport or
/// storage errors (those belong in speck-core and speck-store).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseError {
    /// A field value is outside its valid range.
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// A textual upload status did not match any known state.
    #[error("Unknown upload status: {0:?}")]
    UnknownUploadStatus(String),
}

/// Result type alias using speck-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
