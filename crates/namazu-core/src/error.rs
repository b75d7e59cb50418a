//! Error types shared across the workspace

use std::path::PathBuf;
use thiserror::Error;

/// Result alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by the foundational types and file readers
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed input data, with the 1-based line it was found on
    #[error("format error at line {line}: {message}")]
    Format { line: usize, message: String },

    /// A catalog and a forecast do not share the same spatial discretization
    #[error("region mismatch: {0}")]
    RegionMismatch(String),

    /// A catalog extends below the magnitude range a forecast covers
    #[error("magnitude range: {0}")]
    MagnitudeRange(String),

    #[error("invalid magnitude bins: {0}")]
    InvalidBins(String),

    #[error("invalid region: {0}")]
    InvalidRegion(String),

    #[error("invalid time window: {0}")]
    InvalidWindow(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CoreError {
    pub fn format(line: usize, message: impl Into<String>) -> Self {
        CoreError::Format {
            line,
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CoreError::Io {
            path: path.into(),
            source,
        }
    }
}
