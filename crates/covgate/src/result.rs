//! Result and error types for Covgate.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for Covgate operations
pub type CovResult<T> = Result<T, CovError>;

/// Errors that can occur in Covgate
#[derive(Debug, Error)]
pub enum CovError {
    /// Invalid option or engine configuration
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Invalid state error (operation called in wrong controller state)
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Error message
        message: String,
    },

    /// Total coverage is below the configured minimum
    #[error("Required test coverage of {required}% not reached. Total coverage: {total:.2}%")]
    ThresholdNotReached {
        /// Configured minimum percentage
        required: u32,
        /// Measured total percentage
        total: f64,
    },

    /// A data file could not be read or parsed
    #[error("Data file {}: {message}", path.display())]
    DataFile {
        /// Offending data file
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl CovError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid state error
    #[must_use]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create a data file error
    #[must_use]
    pub fn data_file(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::DataFile {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether this is the coverage-threshold failure rather than an operational error
    #[must_use]
    pub const fn is_threshold_failure(&self) -> bool {
        matches!(self, Self::ThresholdNotReached { .. })
    }
}
