//! Random Forest implementation

use super::decision_tree::{DecisionTree, DecisionTreeConfig};
use crate::error::{EngineError, Result};
use crate::utils::cancel::CancellationToken;
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Random forest configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomForestConfig {
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    pub min_samples_leaf: usize,
    /// Features drawn per tree (`None` = ceil(sqrt(n_features)))
    pub max_features: Option<usize>,
    /// Draw a bootstrap sample per tree
    pub bootstrap: bool,
    pub random_state: u64,
}

impl Default for RandomForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: Some(10),
            min_samples_leaf: 1,
            max_features: None,
            bootstrap: true,
            random_state: 42,
        }
    }
}

/// Random forest regressor with bootstrap and feature bagging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    config: RandomForestConfig,
    trees: Vec<DecisionTree>,
    /// Feature indices each tree was allowed to split on
    tree_features: Vec<Vec<usize>>,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

/// Per-sample forest output
#[derive(Debug, Clone)]
pub struct ForestPrediction {
    /// Mean of member predictions
    pub mean: Array1<f64>,
    /// Population variance of member predictions
    pub variance: Array1<f64>,
}

impl ForestPrediction {
    /// `clamp(1 - sqrt(variance), 0, 1)` per sample
    pub fn confidence(&self) -> Vec<f64> {
        self.variance.iter().map(|v| (1.0 - v.sqrt()).clamp(0.0, 1.0)).collect()
    }
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(RandomForestConfig::default())
    }
}

impl RandomForest {
    pub fn new(config: RandomForestConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            tree_features: Vec::new(),
            n_features: 0,
            feature_importances: None,
        }
    }

    fn compute_max_features(&self, n_features: usize) -> usize {
        match self.config.max_features {
            Some(k) => k.min(n_features),
            None => (n_features as f64).sqrt().ceil() as usize,
        }
        .max(1)
    }

    /// Fit the forest to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.fit_cancellable(x, y, &CancellationToken::new())
    }

    /// Fit, checking `cancel` before each member tree
    pub fn fit_cancellable(&mut self, x: &Array2<f64>, y: &Array1<f64>, cancel: &CancellationToken) -> Result<()> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(EngineError::InvalidInput(format!(
                "y length = {}, expected {}",
                y.len(),
                n_samples
            )));
        }
        if n_samples == 0 || self.config.n_estimators == 0 {
            return Err(EngineError::InvalidInput(
                "random forest needs samples and at least one estimator".to_string(),
            ));
        }

        let max_features = self.compute_max_features(n_features);
        let base_seed = self.config.random_state;

        // Each tree owns its seed, so the result is independent of scheduling
        let fitted: Vec<(DecisionTree, Vec<usize>)> = (0..self.config.n_estimators)
            .into_par_iter()
            .map(|tree_idx| -> Result<(DecisionTree, Vec<usize>)> {
                cancel.check()?;
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(tree_idx as u64));

                let sample_indices: Vec<usize> = if self.config.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };

                let mut features = rand::seq::index::sample(&mut rng, n_features, max_features).into_vec();
                features.sort_unstable();

                let x_boot = x.select(Axis(0), &sample_indices);
                let y_boot: Array1<f64> = sample_indices.iter().map(|&i| y[i]).collect();

                let mut tree = DecisionTree::new(DecisionTreeConfig {
                    max_depth: self.config.max_depth,
                    min_samples_leaf: self.config.min_samples_leaf,
                    max_features: None,
                    random_state: base_seed.wrapping_add(tree_idx as u64),
                });
                tree.fit_with_features(&x_boot, &y_boot, &features)?;
                Ok((tree, features))
            })
            .collect::<Result<Vec<_>>>()?;

        let (trees, tree_features): (Vec<_>, Vec<_>) = fitted.into_iter().unzip();
        self.trees = trees;
        self.tree_features = tree_features;
        self.n_features = n_features;
        self.compute_feature_importances();

        tracing::debug!(n_trees = self.trees.len(), max_features, "random forest fitted");
        Ok(())
    }

    /// Mean impurity decrease across trees
    fn compute_feature_importances(&mut self) {
        let mut total = vec![0.0; self.n_features];
        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                for (i, &val) in imp.iter().enumerate() {
                    total[i] += val;
                }
            }
        }

        let sum: f64 = total.iter().sum();
        if sum > 0.0 {
            for imp in &mut total {
                *imp /= sum;
            }
        }
        self.feature_importances = Some(Array1::from_vec(total));
    }

    /// Mean and spread of member predictions
    pub fn predict_with_variance(&self, x: &Array2<f64>) -> Result<ForestPrediction> {
        if self.trees.is_empty() {
            return Err(EngineError::InvalidModel("random forest has no trees".to_string()));
        }

        let per_tree: Vec<Array1<f64>> = self
            .trees
            .iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<_>>()?;

        let n = x.nrows();
        let n_trees = per_tree.len() as f64;
        let mut mean: Array1<f64> = Array1::zeros(n);
        for pred in &per_tree {
            mean += pred;
        }
        mean /= n_trees;

        let mut variance: Array1<f64> = Array1::zeros(n);
        for pred in &per_tree {
            variance += &(pred - &mean).mapv(|d| d * d);
        }
        variance /= n_trees;

        Ok(ForestPrediction { mean, variance })
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.predict_with_variance(x)?.mean)
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Feature subset used by each tree
    pub fn tree_features(&self) -> &[Vec<usize>] {
        &self.tree_features
    }
}
