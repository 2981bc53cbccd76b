//! Error types for the bridge framework.

use std::time::Duration;

use thiserror::Error;

/// Result type alias using [`BridgeError`].
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur in a bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file not found.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration parse error.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Configuration validation error.
    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    /// Connection could not be established.
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// Worker error.
    #[error("Worker '{name}' failed: {message}")]
    Worker { name: String, message: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a configuration validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ConfigValidation(msg.into())
    }

    /// Create a worker error.
    pub fn worker(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Worker {
            name: name.into(),
            message: msg.into(),
        }
    }
}

impl From<json5::Error> for BridgeError {
    fn from(err: json5::Error) -> Self {
        Self::ConfigParse(err.to_string())
    }
}

impl From<serial_bridge_common::Error> for BridgeError {
    fn from(err: serial_bridge_common::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Terminal outcome of a connection attempt loop.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    /// The overall timeout elapsed and the policy says to give up.
    #[error("Timed out connecting to {target} after {attempts} attempt(s) in {elapsed:?}")]
    TimedOut {
        target: String,
        attempts: u32,
        elapsed: Duration,
    },
}
