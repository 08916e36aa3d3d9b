//! Gradient Boosting implementation
//!
//! Squared-error boosting of regression trees: each round fits a tree on the
//! current residuals and adds it scaled by the learning rate.

use super::decision_tree::{DecisionTree, DecisionTreeConfig};
use crate::error::{EngineError, Result};
use crate::utils::cancel::CancellationToken;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Gradient Boosting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Stop after this many consecutive rounds without MSE improvement
    pub early_stopping_rounds: Option<usize>,
    /// Improvement required for a round to count as better
    pub min_improvement: f64,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
            early_stopping_rounds: None,
            min_improvement: 0.0,
        }
    }
}

/// Gradient Boosting Regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    config: GradientBoostingConfig,
    trees: Vec<DecisionTree>,
    initial_prediction: f64,
    /// Training MSE after each round
    train_loss: Vec<f64>,
    is_fitted: bool,
}

impl Default for GradientBoostingRegressor {
    fn default() -> Self {
        Self::new(GradientBoostingConfig::default())
    }
}

impl GradientBoostingRegressor {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            initial_prediction: 0.0,
            train_loss: Vec::new(),
            is_fitted: false,
        }
    }

    /// Fit the gradient boosting model
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.fit_cancellable(x, y, &CancellationToken::new())
    }

    /// Fit, checking `cancel` before each round
    pub fn fit_cancellable(&mut self, x: &Array2<f64>, y: &Array1<f64>, cancel: &CancellationToken) -> Result<()> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(EngineError::InvalidInput(format!(
                "y length = {}, expected {}",
                y.len(),
                n_samples
            )));
        }
        if n_samples == 0 {
            return Err(EngineError::InvalidInput("no training samples".to_string()));
        }

        self.trees.clear();
        self.train_loss.clear();

        // Initialize with mean
        self.initial_prediction = y.mean().unwrap_or(0.0);
        let mut predictions = Array1::from_elem(n_samples, self.initial_prediction);

        let tree_config = DecisionTreeConfig {
            max_depth: Some(self.config.max_depth),
            min_samples_leaf: self.config.min_samples_leaf,
            ..Default::default()
        };

        let mut best_mse = f64::INFINITY;
        let mut stale_rounds = 0usize;

        for round in 0..self.config.n_estimators {
            cancel.check()?;

            let residuals = y - &predictions;

            let mut tree = DecisionTree::new(tree_config.clone());
            tree.fit(x, &residuals)?;

            let tree_pred = tree.predict(x)?;
            predictions.scaled_add(self.config.learning_rate, &tree_pred);
            self.trees.push(tree);

            let mse = (y - &predictions).mapv(|r| r * r).sum() / n_samples as f64;
            self.train_loss.push(mse);

            if let Some(patience) = self.config.early_stopping_rounds {
                if mse < best_mse - self.config.min_improvement {
                    best_mse = mse;
                    stale_rounds = 0;
                } else {
                    stale_rounds += 1;
                    if stale_rounds >= patience {
                        tracing::debug!(round, best_mse, "gradient boosting stopped early");
                        break;
                    }
                }
            }
        }

        self.is_fitted = true;
        Ok(())
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(EngineError::InvalidModel("gradient boosting model is not fitted".to_string()));
        }
        let mut predictions = Array1::from_elem(x.nrows(), self.initial_prediction);
        for tree in &self.trees {
            predictions.scaled_add(self.config.learning_rate, &tree.predict(x)?);
        }
        Ok(predictions)
    }

    /// Number of rounds actually kept
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn initial_prediction(&self) -> f64 {
        self.initial_prediction
    }

    pub fn train_loss(&self) -> &[f64] {
        &self.train_loss
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn step_data() -> (Array2<f64>, Array1<f64>) {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0], [7.0], [8.0]];
        let y = array![1.0, 1.5, 2.0, 2.5, 7.0, 7.5, 8.0, 8.5];
        (x, y)
    }

    #[test]
    fn test_boosting_reduces_training_loss() {
        let (x, y) = step_data();
        let mut model = GradientBoostingRegressor::new(GradientBoostingConfig {
            n_estimators: 50,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();

        let loss = model.train_loss();
        assert_eq!(loss.len(), 50);
        assert!(loss.last().unwrap() < &loss[0]);

        let pred = model.predict(&x).unwrap();
        let mse = (&pred - &y).mapv(|r| r * r).mean().unwrap();
        assert!(mse < 0.05, "MSE too high: {}", mse);
    }

    #[test]
    fn test_initial_prediction_is_mean() {
        let (x, y) = step_data();
        let mut model = GradientBoostingRegressor::new(GradientBoostingConfig {
            n_estimators: 1,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        assert!((model.initial_prediction() - y.mean().unwrap()).abs() < 1e-12);
    }

    #[test]
    fn test_early_stopping_halts_on_plateau() {
        // Constant targets: residuals are zero from the start, so nothing improves
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![2.0, 2.0, 2.0, 2.0];
        let mut model = GradientBoostingRegressor::new(GradientBoostingConfig {
            n_estimators: 100,
            early_stopping_rounds: Some(3),
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        // Round 0 sets the best loss, three stale rounds follow
        assert_eq!(model.n_trees(), 4);
    }

    #[test]
    fn test_unfitted_predict() {
        let model = GradientBoostingRegressor::default();
        assert!(matches!(model.predict(&array![[1.0]]), Err(EngineError::InvalidModel(_))));
    }
}
