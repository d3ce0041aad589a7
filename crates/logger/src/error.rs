//! Error types for the log service

use std::io;
use thiserror::Error;

/// Errors raised while building a log service.
///
/// Logging calls themselves never fail; these are configuration-time errors.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error while setting up a sink
    #[error("{0}: {1}")]
    Io(&'static str, #[source] io::Error),

    /// Failed to establish a network sink
    #[error("failed to connect log sink to {addr}: {source}")]
    Dial {
        /// The address that could not be reached
        addr: String,
        /// The underlying error
        source: io::Error,
    },

    /// Options failed validation
    #[error("invalid log service options: {0}")]
    InvalidOptions(String),

    /// Configuration file could not be parsed
    #[error("failed to parse log service config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Background writer thread could not be started
    #[error("failed to spawn log writer thread: {0}")]
    SpawnWriter(#[source] io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
