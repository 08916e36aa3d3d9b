//! Feature tables and target validation

use crate::error::{EngineError, Result};
use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Named numeric feature table.
///
/// Stored sample-major (`n_samples x n_features`); every feature column has
/// the same length and there is exactly one name per column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    data: Array2<f64>,
    names: Vec<String>,
}

impl FeatureTable {
    /// Build from a sample-major matrix
    pub fn new(data: Array2<f64>, names: Vec<String>) -> Result<Self> {
        if names.len() != data.ncols() {
            return Err(EngineError::InvalidInput(format!(
                "{} feature names for {} feature columns",
                names.len(),
                data.ncols()
            )));
        }
        if data.ncols() == 0 || data.nrows() == 0 {
            return Err(EngineError::InvalidInput(
                "feature table must have at least one column and one sample".to_string(),
            ));
        }
        Ok(Self { data, names })
    }

    /// Build from feature columns (one vector per feature)
    pub fn from_columns(columns: Vec<Vec<f64>>, names: Vec<String>) -> Result<Self> {
        if columns.is_empty() {
            return Err(EngineError::InvalidInput("no feature columns supplied".to_string()));
        }
        let n_samples = columns[0].len();
        if let Some((idx, col)) = columns.iter().enumerate().find(|(_, c)| c.len() != n_samples) {
            return Err(EngineError::InvalidInput(format!(
                "column {} has {} samples, expected {}",
                idx,
                col.len(),
                n_samples
            )));
        }

        let n_features = columns.len();
        let data = Array2::from_shape_fn((n_samples, n_features), |(i, j)| columns[j][i]);
        Self::new(data, names)
    }

    /// Build from sample rows (one vector per sample)
    pub fn from_rows(rows: Vec<Vec<f64>>, names: Vec<String>) -> Result<Self> {
        let n_features = names.len();
        if let Some((idx, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != n_features) {
            return Err(EngineError::InvalidInput(format!(
                "row {} has {} values, expected {}",
                idx,
                row.len(),
                n_features
            )));
        }
        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        let data = Array2::from_shape_vec((rows.len(), n_features), flat)
            .map_err(|e| EngineError::InvalidInput(e.to_string()))?;
        Self::new(data, names)
    }

    /// Sample-major view of the values
    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn feature_names(&self) -> &[String] {
        &self.names
    }

    pub fn n_samples(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.data.ncols()
    }

    /// One feature column
    pub fn column(&self, idx: usize) -> ArrayView1<'_, f64> {
        self.data.column(idx)
    }

    /// Copy of the selected samples, in the given order
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            data: self.data.select(Axis(0), indices),
            names: self.names.clone(),
        }
    }
}

/// Check that a target vector lines up with a feature table
pub fn validate_targets(table: &FeatureTable, targets: &[f64]) -> Result<()> {
    if targets.len() != table.n_samples() {
        return Err(EngineError::InvalidInput(format!(
            "{} targets for {} samples",
            targets.len(),
            table.n_samples()
        )));
    }
    if let Some(idx) = targets.iter().position(|t| !t.is_finite()) {
        return Err(EngineError::InvalidInput(format!("target {} is not finite", idx)));
    }
    Ok(())
}

/// Check that every target is exactly 0 or 1
pub fn validate_binary_targets(targets: &[f64]) -> Result<()> {
    match targets.iter().position(|&t| t != 0.0 && t != 1.0) {
        Some(idx) => Err(EngineError::InvalidInput(format!(
            "binary classifier requires 0/1 targets, sample {} has {}",
            idx, targets[idx]
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("f{}", i)).collect()
    }

    #[test]
    fn test_from_columns_layout() {
        let table = FeatureTable::from_columns(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]], names(2)).unwrap();
        assert_eq!(table.n_samples(), 3);
        assert_eq!(table.n_features(), 2);
        assert_eq!(table.data()[[1, 0]], 2.0);
        assert_eq!(table.data()[[1, 1]], 5.0);
    }

    #[test]
    fn test_name_count_mismatch() {
        let err = FeatureTable::from_columns(vec![vec![1.0], vec![2.0]], names(1)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn test_ragged_columns() {
        let err = FeatureTable::from_columns(vec![vec![1.0, 2.0], vec![3.0]], names(2)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn test_empty_table() {
        assert!(FeatureTable::from_columns(vec![], vec![]).is_err());
        assert!(FeatureTable::from_rows(vec![], names(2)).is_err());
    }

    #[test]
    fn test_from_rows_and_select() {
        let table = FeatureTable::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]], names(2)).unwrap();
        let subset = table.select_rows(&[2, 0]);
        assert_eq!(subset.n_samples(), 2);
        assert_eq!(subset.data()[[0, 0]], 5.0);
        assert_eq!(subset.feature_names(), table.feature_names());
    }

    #[test]
    fn test_target_validation() {
        let table = FeatureTable::from_columns(vec![vec![1.0, 2.0]], names(1)).unwrap();
        assert!(validate_targets(&table, &[1.0, 2.0]).is_ok());
        assert!(validate_targets(&table, &[1.0]).is_err());
        assert!(validate_targets(&table, &[1.0, f64::NAN]).is_err());
        assert!(validate_binary_targets(&[0.0, 1.0, 1.0]).is_ok());
        assert!(validate_binary_targets(&[0.0, 2.0]).is_err());
    }
}
