//! Error types for the Pricegate service.

use std::net::SocketAddr;

use thiserror::Error;

/// Main error type for Pricegate operations.
///
/// Only startup and configuration problems surface here. A failed reply to a
/// single client is logged by the dispatcher and never becomes an error value.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The listening socket could not be bound
    #[error("Failed to bind UDP socket on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for ServerError {
    fn from(err: config::ConfigError) -> Self {
        ServerError::Config(err.to_string())
    }
}

/// Result type alias for Pricegate operations.
pub type Result<T> = std::result::Result<T, ServerError>;
