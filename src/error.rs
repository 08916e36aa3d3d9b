//! Error types for the statcore engine

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Main error type for the engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Singular matrix: pivot {pivot:e} in column {column} is below threshold")]
    SingularMatrix { column: usize, pivot: f64 },

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Model training failed: {0}")]
    TrainingFailed(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl EngineError {
    /// Short stable label used in logs and telemetry
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::InvalidInput(_) => "invalid_input",
            EngineError::ModelNotFound(_) => "model_not_found",
            EngineError::InvalidModel(_) => "invalid_model",
            EngineError::SingularMatrix { .. } => "singular_matrix",
            EngineError::UnsupportedOperation(_) => "unsupported_operation",
            EngineError::TrainingFailed(_) => "training_failed",
            EngineError::Cancelled => "cancelled",
            EngineError::ConfigError(_) => "config",
            EngineError::IoError(_) => "io",
            EngineError::SerializationError(_) => "serialization",
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::InvalidInput("empty table".to_string());
        assert_eq!(err.to_string(), "Invalid input: empty table");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: EngineError = io_err.into();
        assert!(matches!(err, EngineError::IoError(_)));
        assert_eq!(err.kind(), "io");
    }

    #[test]
    fn test_singular_display_mentions_column() {
        let err = EngineError::SingularMatrix { column: 2, pivot: 0.0 };
        assert!(err.to_string().contains("column 2"));
    }
}
