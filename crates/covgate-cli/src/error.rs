//! Error types for the CLI

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// No coverage data to work on
    #[error("No data to report: {} does not exist or holds no data", path.display())]
    NoData {
        /// Base data file
        path: PathBuf,
    },

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Covgate library error
    #[error("{0}")]
    Cov(#[from] covgate::CovError),
}

impl CliError {
    /// Create a no-data error
    #[must_use]
    pub fn no_data(path: &Path) -> Self {
        Self::NoData {
            path: path.to_path_buf(),
        }
    }

    /// Whether this is the coverage-threshold failure
    #[must_use]
    pub fn is_threshold_failure(&self) -> bool {
        matches!(self, Self::Cov(err) if err.is_threshold_failure())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use covgate::CovError;

    #[test]
    fn test_no_data_error() {
        let err = CliError::no_data(Path::new(".coverage"));
        assert!(err.to_string().contains(".coverage"));
        assert!(!err.is_threshold_failure());
    }

    #[test]
    fn test_threshold_error_passes_through() {
        let err: CliError = CovError::ThresholdNotReached {
            required: 90,
            total: 42.0,
        }
        .into();
        assert!(err.is_threshold_failure());
        assert_eq!(
            err.to_string(),
            "Required test coverage of 90% not reached. Total coverage: 42.00%"
        );
    }

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let cli_err: CliError = io_err.into();
        assert!(cli_err.to_string().contains("I/O"));
    }
}
