//! Error types for speck-gateway.

/// Result type for speck-gateway operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in speck-gateway.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Store error.
    #[error("Store error: {0}")]
    Store(#[from] speck_store::Error),

    /// Invalid manager options.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create an [`Error::InvalidConfig`].
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}
