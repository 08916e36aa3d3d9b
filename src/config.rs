//! Engine configuration

use crate::error::{EngineError, Result};
use crate::monitoring::DEFAULT_WINDOW_SIZE;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for [`Engine`](crate::engine::Engine)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fraction of samples held out from the tail for the performance
    /// snapshot. 0 scores the snapshot on the training data.
    pub validation_split: f64,

    /// Evict the oldest model once the registry holds this many
    pub registry_capacity: Option<usize>,

    /// Observations kept per metric by the default metrics sink
    pub metrics_window: usize,

    /// `tracing_subscriber` filter used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            validation_split: 0.0,
            registry_capacity: None,
            metrics_window: DEFAULT_WINDOW_SIZE,
            log_filter: "statcore=info".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON config; missing fields take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.validation_split) {
            return Err(EngineError::ConfigError(format!(
                "validation_split must be in [0, 1), got {}",
                self.validation_split
            )));
        }
        if self.registry_capacity == Some(0) {
            return Err(EngineError::ConfigError("registry_capacity must be positive".to_string()));
        }
        if self.metrics_window == 0 {
            return Err(EngineError::ConfigError("metrics_window must be positive".to_string()));
        }
        Ok(())
    }

    pub fn with_validation_split(mut self, split: f64) -> Self {
        self.validation_split = split;
        self
    }

    pub fn with_registry_capacity(mut self, capacity: usize) -> Self {
        self.registry_capacity = Some(capacity);
        self
    }

    pub fn with_metrics_window(mut self, window: usize) -> Self {
        self.metrics_window = window;
        self
    }

    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.validation_split, 0.0);
        assert!(config.registry_capacity.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::new()
            .with_validation_split(0.25)
            .with_registry_capacity(8)
            .with_log_filter("statcore=debug");

        assert_eq!(config.validation_split, 0.25);
        assert_eq!(config.registry_capacity, Some(8));
        assert_eq!(config.log_filter, "statcore=debug");
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "validation_split": 0.2 }}"#).unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.validation_split, 0.2);
        assert_eq!(config.metrics_window, DEFAULT_WINDOW_SIZE);
    }

    #[test]
    fn test_from_file_rejects_bad_split() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "validation_split": 1.5 }}"#).unwrap();

        assert!(matches!(EngineConfig::from_file(file.path()), Err(EngineError::ConfigError(_))));
    }

    #[test]
    fn test_from_file_missing() {
        let result = EngineConfig::from_file("/nonexistent/statcore.json");
        assert!(matches!(result, Err(EngineError::IoError(_))));
    }
}
