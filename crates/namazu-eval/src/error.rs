//! Evaluation error types

use std::path::PathBuf;

use namazu_core::CoreError;
use thiserror::Error;

/// Result alias for evaluation operations
pub type EvalResult<T> = Result<T, EvalError>;

/// Errors raised by forecast loading, test execution, and report assembly
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("unknown test '{0}'")]
    UnknownTest(String),

    #[error("test '{test}' is not defined for {kind} forecasts")]
    Unsupported { test: String, kind: &'static str },

    #[error("forecast '{0}' has no positive rates")]
    EmptyForecast(String),

    #[error("invalid forecast: {0}")]
    InvalidForecast(String),

    #[error("statistics error: {0}")]
    Stats(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to launch {tool}: {source}")]
    ToolLaunch {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("report assembly: {0}")]
    Report(String),
}

impl EvalError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EvalError::Io {
            path: path.into(),
            source,
        }
    }
}
