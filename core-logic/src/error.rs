//! # Core Error Types
//!
//! Centralized error definitions for the core-logic crate.
//! All errors implement `std::error::Error` and `std::fmt::Display`.

use thiserror::Error;

/// Unified error type for core-logic operations.
///
/// Wraps the specific error types so chain crates can convert any
/// core failure with a single `?`.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Config(ConfigError),

    #[error(transparent)]
    Store(StoreError),

    #[error("Run log error: {0}")]
    RunLog(#[from] std::io::Error),
}

impl From<ConfigError> for CoreError {
    fn from(e: ConfigError) -> Self {
        CoreError::Config(e)
    }
}

impl From<StoreError> for CoreError {
    fn from(e: StoreError) -> Self {
        CoreError::Store(e)
    }
}

/// Configuration-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid RPC URL format: '{url}'")]
    InvalidRpcUrl { url: String },

    #[error("Missing required configuration field: '{field}'")]
    MissingField { field: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Failed to load configuration from {path}: {msg}")]
    Load { path: String, msg: String },
}

/// Wallet store errors.
///
/// `Corrupt` is fatal: a store that cannot be parsed is never repaired or
/// partially consumed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Corrupt wallet store at '{path}': {reason}")]
    Corrupt { path: String, reason: String },

    #[error("I/O error on wallet store {path}: {msg}")]
    Io { path: String, msg: String },

    #[error("Wallet store '{path}' does not exist and no wallet count was given")]
    MissingCount { path: String },
}

impl StoreError {
    pub(crate) fn corrupt(path: &std::path::Path, reason: impl Into<String>) -> Self {
        StoreError::Corrupt {
            path: path.display().to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: &std::path::Path, err: impl std::fmt::Display) -> Self {
        StoreError::Io {
            path: path.display().to_string(),
            msg: err.to_string(),
        }
    }
}
