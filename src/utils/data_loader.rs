//! Dataset and parameter file loading

use crate::data::FeatureTable;
use crate::error::{EngineError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// JSON dataset file.
///
/// Features are given either column-major (`columns`, one array per
/// feature) or sample-major (`rows`, one array per sample).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dataset {
    pub feature_names: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<Vec<f64>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<Vec<f64>>>,
    pub target_name: Option<String>,
    pub targets: Option<Vec<f64>>,
}

impl Dataset {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        read_json(path)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Build the feature table
    pub fn to_table(&self) -> Result<FeatureTable> {
        match (&self.columns, &self.rows) {
            (Some(columns), None) => FeatureTable::from_columns(columns.clone(), self.feature_names.clone()),
            (None, Some(rows)) => FeatureTable::from_rows(rows.clone(), self.feature_names.clone()),
            (Some(_), Some(_)) => Err(EngineError::InvalidInput(
                "dataset must give either columns or rows, not both".to_string(),
            )),
            (None, None) => Err(EngineError::InvalidInput("dataset has no feature values".to_string())),
        }
    }

    /// Targets, required for supervised commands
    pub fn require_targets(&self) -> Result<&[f64]> {
        self.targets
            .as_deref()
            .ok_or_else(|| EngineError::InvalidInput("dataset has no targets".to_string()))
    }

    pub fn target_name_or_default(&self) -> &str {
        self.target_name.as_deref().unwrap_or("target")
    }
}

/// Deserialize any JSON file, e.g. a hyperparameter grid
pub fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::Hyperparameters;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_columns() {
        let file = write_temp(
            r#"{ "feature_names": ["a", "b"], "columns": [[1, 2, 3], [4, 5, 6]], "target_name": "y", "targets": [0, 1, 0] }"#,
        );
        let dataset = Dataset::load(file.path()).unwrap();
        let table = dataset.to_table().unwrap();

        assert_eq!(table.n_samples(), 3);
        assert_eq!(table.n_features(), 2);
        assert_eq!(table.data()[[1, 1]], 5.0);
        assert_eq!(dataset.require_targets().unwrap(), &[0.0, 1.0, 0.0]);
        assert_eq!(dataset.target_name_or_default(), "y");
    }

    #[test]
    fn test_load_rows_without_targets() {
        let file = write_temp(r#"{ "feature_names": ["a"], "rows": [[1], [2]] }"#);
        let dataset = Dataset::load(file.path()).unwrap();

        assert_eq!(dataset.to_table().unwrap().n_samples(), 2);
        assert!(matches!(dataset.require_targets(), Err(EngineError::InvalidInput(_))));
    }

    #[test]
    fn test_rejects_ambiguous_layout() {
        let dataset = Dataset {
            feature_names: vec!["a".to_string()],
            columns: Some(vec![vec![1.0]]),
            rows: Some(vec![vec![1.0]]),
            ..Default::default()
        };
        assert!(dataset.to_table().is_err());
    }

    #[test]
    fn test_read_grid() {
        let file = write_temp(
            r#"[{ "family": "decision_tree", "params": { "max_depth": 2 } }, { "family": "decision_tree", "params": {} }]"#,
        );
        let grid: Vec<Hyperparameters> = read_json(file.path()).unwrap();
        assert_eq!(grid.len(), 2);
    }
}
