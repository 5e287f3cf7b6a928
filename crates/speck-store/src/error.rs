//! Error types for speck-store.

use std::path::PathBuf;

/// Result type for speck-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in speck-store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error from SQLite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to create the store directory.
    #[error("Failed to create store directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A record line that could not be decoded.
    #[error("Malformed record at line {line}: {message}")]
    MalformedRecord { line: u64, message: String },

    /// CSV read/write error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The store has been shut down; no further operations are possible.
    #[error("Store is shut down")]
    StoreClosed,
}
