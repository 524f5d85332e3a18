//! # Codepad Core Kernel Errors
//!
//! Defines the crate-wide error type.
//!
//! [`Error`] aggregates the typed errors of each subsystem so that callers at
//! the edge (the CLI, a host shell) can work with a single `Result` alias while
//! still matching on the precise cause.
use std::path::PathBuf;
use std::result::Result as StdResult;

use crate::plugin_system::error::PluginSystemError;
use crate::storage::error::StorageSystemError;
use thiserror::Error as ThisError;

/// Top-level error type for codepad-core
#[derive(Debug, ThisError)]
pub enum Error {
    /// Specific, typed plugin system error
    #[error("Plugin system error: {0}")]
    PluginSystem(#[from] PluginSystemError),

    /// Specific, typed storage system error
    #[error("Storage system error: {0}")]
    StorageSystem(#[from] StorageSystemError),

    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with message
    #[error("Error: {0}")]
    Other(String),
}

/// Shorthand for Result with our Error type
pub type Result<T> = StdResult<T, Error>;

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl Error {
    /// Wraps an I/O failure with the operation and path that produced it.
    pub fn io(source: std::io::Error, operation: impl Into<String>, path: PathBuf) -> Self {
        Error::StorageSystem(StorageSystemError::io(source, operation, path))
    }

    /// Returns the plugin system error if this is one.
    pub fn as_plugin_error(&self) -> Option<&PluginSystemError> {
        match self {
            Error::PluginSystem(e) => Some(e),
            _ => None,
        }
    }
}
