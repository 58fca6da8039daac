//! Domain-level error taxonomy for the AutoML lifecycle.

use std::path::PathBuf;

/// AutoML domain errors.
#[derive(Debug, thiserror::Error)]
pub enum AutomlError {
    #[error("'task' must be one of {supported:?}, got '{got}'")]
    InvalidTaskKind {
        got: String,
        supported: Vec<&'static str>,
    },

    #[error("data preparation failed: {0}")]
    DataPreparationFailed(String),

    #[error("unsupported metric set: must contain '{expected}' (got keys {keys:?})")]
    UnsupportedMetricSet {
        expected: String,
        keys: Vec<String>,
    },

    #[error("saving artifact to {path:?} failed: {reason}")]
    ArtifactSaveFailed { path: PathBuf, reason: String },

    #[error("corrupt metrics file {path:?}: {reason}")]
    CorruptMetricsFile { path: PathBuf, reason: String },

    #[error("no trained model found at {0:?}")]
    ArtifactNotFound(PathBuf),

    #[error("invalid dataset config: {0}")]
    InvalidDatasetConfig(String),

    #[error("time budget must be a positive number of minutes, got {0}")]
    InvalidTimeBudget(f64),

    #[error("training failed: {0}")]
    Training(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AutomlError {
    /// Whether the error was caused by caller input rather than by the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AutomlError::InvalidTaskKind { .. }
                | AutomlError::DataPreparationFailed(_)
                | AutomlError::InvalidDatasetConfig(_)
                | AutomlError::InvalidTimeBudget(_)
        )
    }
}

/// Result type for AutoML domain operations.
pub type Result<T> = std::result::Result<T, AutomlError>;
