//! Regression decision tree
//!
//! Splits maximize variance reduction. Candidate thresholds are the midpoints
//! between consecutive unique values of a feature; among equal gains the
//! first one found wins (feature order, then ascending threshold).

use crate::error::{EngineError, Result};
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf {
        value: f64,
        n_samples: usize,
    },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        gain: f64,
        n_samples: usize,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

/// Decision tree configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionTreeConfig {
    /// Maximum depth (`None` grows until leaves are pure or too small)
    pub max_depth: Option<usize>,
    /// Nodes with this many samples or fewer become leaves
    pub min_samples_leaf: usize,
    /// Random subset of features considered by the tree (`None` = all)
    pub max_features: Option<usize>,
    pub random_state: u64,
}

impl Default for DecisionTreeConfig {
    fn default() -> Self {
        Self {
            max_depth: Some(10),
            min_samples_leaf: 1,
            max_features: None,
            random_state: 42,
        }
    }
}

/// Best split candidate for one node
#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

/// Regression tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    config: DecisionTreeConfig,
    root: Option<TreeNode>,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new(DecisionTreeConfig::default())
    }
}

/// Population variance from running sums
#[inline]
fn variance_from_sums(count: usize, sum: f64, sq_sum: f64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    let n = count as f64;
    (sq_sum / n - (sum / n).powi(2)).max(0.0)
}

impl DecisionTree {
    pub fn new(config: DecisionTreeConfig) -> Self {
        Self {
            config,
            root: None,
            n_features: 0,
            feature_importances: None,
        }
    }

    /// Fit the tree; honours `max_features` by drawing a seeded feature subset
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_features = x.ncols();
        let features: Vec<usize> = match self.config.max_features {
            Some(k) if k < n_features => {
                let mut rng = ChaCha8Rng::seed_from_u64(self.config.random_state);
                let mut picked = rand::seq::index::sample(&mut rng, n_features, k.max(1)).into_vec();
                picked.sort_unstable();
                picked
            }
            _ => (0..n_features).collect(),
        };
        self.fit_with_features(x, y, &features)
    }

    /// Fit considering only the given feature indices as split candidates
    pub fn fit_with_features(&mut self, x: &Array2<f64>, y: &Array1<f64>, features: &[usize]) -> Result<()> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

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
        if let Some(&bad) = features.iter().find(|&&f| f >= n_features) {
            return Err(EngineError::InvalidInput(format!(
                "feature index {} out of range for {} features",
                bad, n_features
            )));
        }

        self.n_features = n_features;
        let mut importances = vec![0.0; n_features];

        let indices: Vec<usize> = (0..n_samples).collect();
        self.root = Some(self.build_tree(x, y, &indices, features, 0, &mut importances));

        // Normalize feature importances
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(())
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        features: &[usize],
        depth: usize,
        importances: &mut [f64],
    ) -> TreeNode {
        let n_samples = indices.len();
        let leaf = || TreeNode::Leaf {
            value: indices.iter().map(|&i| y[i]).sum::<f64>() / n_samples as f64,
            n_samples,
        };

        let should_stop = self.config.max_depth.map_or(false, |d| depth >= d)
            || n_samples <= self.config.min_samples_leaf
            || Self::is_pure(y, indices);

        if should_stop {
            return leaf();
        }

        let Some(best) = self.find_best_split(x, y, indices, features) else {
            return leaf();
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, best.feature_idx]] <= best.threshold);

        if left_indices.is_empty() || right_indices.is_empty() {
            return leaf();
        }

        importances[best.feature_idx] += n_samples as f64 * best.gain;

        let left = Box::new(self.build_tree(x, y, &left_indices, features, depth + 1, importances));
        let right = Box::new(self.build_tree(x, y, &right_indices, features, depth + 1, importances));

        TreeNode::Split {
            feature_idx: best.feature_idx,
            threshold: best.threshold,
            gain: best.gain,
            n_samples,
            left,
            right,
        }
    }

    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        features: &[usize],
    ) -> Option<SplitCandidate> {
        let n = indices.len();
        // Sums are taken around the node mean; raw sums lose small spreads on large offsets
        let center = indices.iter().map(|&i| y[i]).sum::<f64>() / n as f64;
        let total_sum: f64 = indices.iter().map(|&i| y[i] - center).sum();
        let total_sq: f64 = indices.iter().map(|&i| (y[i] - center).powi(2)).sum();
        let parent_variance = variance_from_sums(n, total_sum, total_sq);

        // Scan features in parallel; collect keeps feature order for the tie-break
        let per_feature: Vec<Option<SplitCandidate>> = features
            .par_iter()
            .map(|&feature_idx| {
                let mut pairs: Vec<(f64, f64)> = indices.iter().map(|&i| (x[[i, feature_idx]], y[i] - center)).collect();
                pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

                let mut best: Option<SplitCandidate> = None;
                let mut left_sum = 0.0;
                let mut left_sq = 0.0;

                for k in 0..n - 1 {
                    let (value, target) = pairs[k];
                    left_sum += target;
                    left_sq += target * target;

                    let next_value = pairs[k + 1].0;
                    if next_value <= value {
                        continue;
                    }

                    let left_count = k + 1;
                    let right_count = n - left_count;
                    let left_var = variance_from_sums(left_count, left_sum, left_sq);
                    let right_var = variance_from_sums(right_count, total_sum - left_sum, total_sq - left_sq);
                    let weighted = (left_count as f64 * left_var + right_count as f64 * right_var) / n as f64;
                    let gain = parent_variance - weighted;

                    if gain > best.map_or(0.0, |b| b.gain) {
                        best = Some(SplitCandidate {
                            feature_idx,
                            threshold: (value + next_value) / 2.0,
                            gain,
                        });
                    }
                }
                best
            })
            .collect();

        let mut best: Option<SplitCandidate> = None;
        for candidate in per_feature.into_iter().flatten() {
            if candidate.gain > best.map_or(0.0, |b| b.gain) {
                best = Some(candidate);
            }
        }
        best
    }

    fn is_pure(y: &Array1<f64>, indices: &[usize]) -> bool {
        let first = y[indices[0]];
        indices.iter().all(|&i| y[i] == first)
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or_else(|| {
            EngineError::InvalidModel("decision tree has no root node".to_string())
        })?;
        if x.ncols() != self.n_features {
            return Err(EngineError::InvalidInput(format!(
                "expected {} features, got {}",
                self.n_features,
                x.ncols()
            )));
        }

        Ok(x.rows().into_iter().map(|row| Self::predict_row(root, row)).collect())
    }

    fn predict_row(mut node: &TreeNode, row: ndarray::ArrayView1<f64>) -> f64 {
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                    node = if row[*feature_idx] <= *threshold { &**left } else { &**right };
                }
            }
        }
    }

    pub fn root(&self) -> Option<&TreeNode> {
        self.root.as_ref()
    }

    pub fn is_fitted(&self) -> bool {
        self.root.is_some()
    }

    /// Normalized impurity-decrease importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Tree depth (a lone leaf has depth 0)
    pub fn depth(&self) -> usize {
        fn node_depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + node_depth(left).max(node_depth(right)),
            }
        }
        self.root.as_ref().map_or(0, node_depth)
    }

    /// Number of leaves
    pub fn n_leaves(&self) -> usize {
        fn count(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => count(left) + count(right),
            }
        }
        self.root.as_ref().map_or(0, count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn unrestricted() -> DecisionTreeConfig {
        DecisionTreeConfig {
            max_depth: None,
            ..Default::default()
        }
    }

    #[test]
    fn test_memorizes_training_data() {
        let x = array![[1.0, 5.0], [2.0, 3.0], [3.0, 8.0], [4.0, 1.0], [5.0, 7.0], [6.0, 2.0]];
        let y = array![3.2, -1.0, 7.5, 0.0, 2.2, 9.9];

        let mut tree = DecisionTree::new(unrestricted());
        tree.fit(&x, &y).unwrap();

        let predictions = tree.predict(&x).unwrap();
        assert_eq!(predictions, y);
    }

    #[test]
    fn test_memorizes_targets_with_large_offset() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![1e8, 1e8 + 1.0, 1e8, 1e8 + 1.0];

        let mut tree = DecisionTree::new(unrestricted());
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.n_leaves(), 4);
        assert_eq!(tree.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_predict_rejects_wrong_width() {
        let mut tree = DecisionTree::default();
        tree.fit(&array![[1.0], [2.0]], &array![1.0, 2.0]).unwrap();

        assert!(matches!(tree.predict(&array![[1.0, 9.0]]), Err(EngineError::InvalidInput(_))));
        assert!(tree.predict(&array![[1.0]]).is_ok());
    }

    #[test]
    fn test_max_depth_bounds_tree() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0], [7.0], [8.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];

        let mut tree = DecisionTree::new(DecisionTreeConfig {
            max_depth: Some(2),
            ..Default::default()
        });
        tree.fit(&x, &y).unwrap();

        assert!(tree.depth() <= 2);
        assert!(tree.n_leaves() <= 4);
    }

    #[test]
    fn test_constant_target_is_single_leaf() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = array![4.0, 4.0, 4.0];
        let mut tree = DecisionTree::default();
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.n_leaves(), 1);
        assert_eq!(tree.predict(&array![[10.0]]).unwrap()[0], 4.0);
    }

    #[test]
    fn test_tie_prefers_first_feature() {
        // Both features separate the targets identically
        let x = array![[0.0, 0.0], [0.0, 0.0], [1.0, 1.0], [1.0, 1.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let mut tree = DecisionTree::new(unrestricted());
        tree.fit(&x, &y).unwrap();

        match tree.root().unwrap() {
            TreeNode::Split { feature_idx, threshold, .. } => {
                assert_eq!(*feature_idx, 0);
                assert!((threshold - 0.5).abs() < 1e-12);
            }
            TreeNode::Leaf { .. } => panic!("expected a split at the root"),
        }
    }

    #[test]
    fn test_feature_importances_favor_signal() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let mut tree = DecisionTree::default();
        tree.fit(&x, &y).unwrap();

        let importances = tree.feature_importances().unwrap();
        assert!((importances[0] - 1.0).abs() < 1e-12);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_min_samples_leaf_stops_growth() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![1.0, 2.0, 3.0, 4.0];
        let mut tree = DecisionTree::new(DecisionTreeConfig {
            max_depth: None,
            min_samples_leaf: 4,
            ..Default::default()
        });
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.n_leaves(), 1);
        assert!((tree.predict(&array![[1.0]]).unwrap()[0] - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_unfitted_predict_is_invalid_model() {
        let tree = DecisionTree::default();
        assert!(matches!(tree.predict(&array![[1.0]]), Err(EngineError::InvalidModel(_))));
    }
}
