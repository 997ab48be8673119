//! Error types for the adashare utilities

use thiserror::Error;

/// Main error type for experiment setup and reporting
#[derive(Error, Debug)]
pub enum Error {
    /// A referenced configuration key is absent
    #[error("Missing configuration key: {0}")]
    MissingKey(String),

    /// A configuration key is present but malformed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Weight initialization failed
    #[error("Initialization error: {0}")]
    Initialization(String),

    /// Command-line usage error
    #[error(transparent)]
    Usage(#[from] clap::Error),

    /// Tensor operation error
    #[error("Tensor operation error: {0}")]
    Tensor(#[from] candle_core::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Other errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for adashare operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a missing-key error for a dotted key path
    pub fn missing_key(path: impl Into<String>) -> Self {
        Self::MissingKey(path.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an initialization error
    pub fn initialization(msg: impl Into<String>) -> Self {
        Self::Initialization(msg.into())
    }
}
