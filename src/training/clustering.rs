//! Clustering algorithms: KMeans and single-linkage agglomerative
//!
//! These are unsupervised models; they take X only (no y labels).
//! Both report contiguous 0-based labels, one centroid row per cluster and
//! the inertia (sum of squared distances to the assigned centroid).

use super::config::ModelFamily;
use crate::error::{EngineError, Result};
use crate::utils::cancel::CancellationToken;
use crate::utils::stats::{euclidean_distance, squared_euclidean};
use ndarray::{Array2, ArrayView1, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════
//  Parameters
// ═══════════════════════════════════════════════════════════════════════════

/// K-Means configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KMeansConfig {
    pub n_clusters: usize,
    pub max_iter: usize,
    /// Stop once the largest centroid movement falls below this
    pub tol: f64,
    pub random_state: u64,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            n_clusters: 3,
            max_iter: 300,
            tol: 1e-4,
            random_state: 42,
        }
    }
}

/// Agglomerative clustering configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchicalConfig {
    pub n_clusters: usize,
}

impl Default for HierarchicalConfig {
    fn default() -> Self {
        Self { n_clusters: 3 }
    }
}

/// Algorithm selection for a clustering call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum ClusteringParams {
    KMeans(KMeansConfig),
    Hierarchical(HierarchicalConfig),
}

impl Default for ClusteringParams {
    fn default() -> Self {
        ClusteringParams::KMeans(KMeansConfig::default())
    }
}

impl ClusteringParams {
    pub fn family(&self) -> ModelFamily {
        match self {
            ClusteringParams::KMeans(_) => ModelFamily::KMeans,
            ClusteringParams::Hierarchical(_) => ModelFamily::Hierarchical,
        }
    }

    pub fn n_clusters(&self) -> usize {
        match self {
            ClusteringParams::KMeans(c) => c.n_clusters,
            ClusteringParams::Hierarchical(c) => c.n_clusters,
        }
    }
}

/// Output of one clustering run
#[derive(Debug, Clone)]
pub struct ClusterFit {
    pub labels: Vec<usize>,
    pub centroids: Array2<f64>,
    pub inertia: f64,
    pub silhouette: f64,
    /// Inertia after each assignment step (k-means only)
    pub inertia_history: Vec<f64>,
}

/// Run the selected algorithm and score the result
pub fn fit_clusters(x: &Array2<f64>, params: &ClusteringParams, cancel: &CancellationToken) -> Result<ClusterFit> {
    let (labels, centroids, inertia, inertia_history) = match params {
        ClusteringParams::KMeans(config) => {
            let mut model = KMeans::new(config.clone());
            model.fit_cancellable(x, cancel)?;
            let KMeans {
                labels,
                centroids,
                inertia,
                inertia_history,
                ..
            } = model;
            (labels, centroids, inertia, inertia_history)
        }
        ClusteringParams::Hierarchical(config) => {
            let mut model = AgglomerativeClustering::new(config.n_clusters);
            model.fit(x)?;
            (model.labels, model.centroids, model.inertia, Vec::new())
        }
    };

    let silhouette = silhouette_score(x, &labels);
    Ok(ClusterFit {
        labels,
        centroids,
        inertia,
        silhouette,
        inertia_history,
    })
}

fn check_cluster_count(n_samples: usize, n_clusters: usize) -> Result<()> {
    if n_samples == 0 {
        return Err(EngineError::InvalidInput("no samples to cluster".to_string()));
    }
    if n_clusters == 0 || n_clusters > n_samples {
        return Err(EngineError::InvalidInput(format!(
            "n_clusters must be in 1..={}, got {}",
            n_samples, n_clusters
        )));
    }
    Ok(())
}

fn check_finite(x: &Array2<f64>) -> Result<()> {
    if x.iter().any(|v| !v.is_finite()) {
        return Err(EngineError::InvalidInput("features must be finite".to_string()));
    }
    Ok(())
}

/// Index of and distance to the closest centroid (lowest index on ties)
pub fn nearest_centroid(row: ArrayView1<f64>, centroids: &Array2<f64>) -> (usize, f64) {
    let mut best_c = 0;
    let mut best_dist = f64::INFINITY;
    for (c, centroid) in centroids.outer_iter().enumerate() {
        let d = squared_euclidean(row, centroid);
        if d < best_dist {
            best_dist = d;
            best_c = c;
        }
    }
    (best_c, best_dist.sqrt())
}

/// Component-wise mean of each cluster's members
fn cluster_means(x: &Array2<f64>, labels: &[usize], n_clusters: usize) -> (Array2<f64>, Vec<usize>) {
    let mut sums = Array2::<f64>::zeros((n_clusters, x.ncols()));
    let mut counts = vec![0usize; n_clusters];
    for (row, &c) in x.outer_iter().zip(labels) {
        counts[c] += 1;
        let mut target = sums.row_mut(c);
        target += &row;
    }
    for (c, &count) in counts.iter().enumerate() {
        if count > 0 {
            sums.row_mut(c).mapv_inplace(|v| v / count as f64);
        }
    }
    (sums, counts)
}

fn inertia_of(x: &Array2<f64>, labels: &[usize], centroids: &Array2<f64>) -> f64 {
    x.outer_iter()
        .zip(labels)
        .map(|(row, &c)| squared_euclidean(row, centroids.row(c)))
        .sum()
}

// ═══════════════════════════════════════════════════════════════════════════
//  K-Means Clustering
// ═══════════════════════════════════════════════════════════════════════════

/// Lloyd's k-means with uniform min/max initialization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KMeans {
    pub config: KMeansConfig,
    /// Fitted cluster centroids (n_clusters × n_features)
    pub centroids: Array2<f64>,
    pub labels: Vec<usize>,
    pub inertia: f64,
    pub inertia_history: Vec<f64>,
    pub is_fitted: bool,
}

impl Default for KMeans {
    fn default() -> Self {
        Self::new(KMeansConfig::default())
    }
}

impl KMeans {
    pub fn new(config: KMeansConfig) -> Self {
        Self {
            config,
            centroids: Array2::zeros((0, 0)),
            labels: Vec::new(),
            inertia: 0.0,
            inertia_history: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.config.max_iter = max_iter;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.config.random_state = seed;
        self
    }

    /// Each centroid coordinate drawn uniformly within that feature's range
    fn uniform_init(x: &Array2<f64>, k: usize, rng: &mut ChaCha8Rng) -> Array2<f64> {
        let bounds: Vec<(f64, f64)> = x
            .axis_iter(Axis(1))
            .map(|col| {
                let lo = col.iter().cloned().fold(f64::INFINITY, f64::min);
                let hi = col.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                (lo, hi)
            })
            .collect();

        Array2::from_shape_fn((k, x.ncols()), |(_, j)| {
            let (lo, hi) = bounds[j];
            rng.gen_range(lo..=hi)
        })
    }

    fn assign(x: &Array2<f64>, centroids: &Array2<f64>) -> Vec<usize> {
        (0..x.nrows())
            .into_par_iter()
            .map(|i| nearest_centroid(x.row(i), centroids).0)
            .collect()
    }

    /// Fit the model (unsupervised, no y needed)
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        self.fit_cancellable(x, &CancellationToken::new())
    }

    /// Fit, checking `cancel` before each iteration
    pub fn fit_cancellable(&mut self, x: &Array2<f64>, cancel: &CancellationToken) -> Result<&mut Self> {
        let k = self.config.n_clusters;
        check_cluster_count(x.nrows(), k)?;
        check_finite(x)?;

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.random_state);
        let mut centroids = Self::uniform_init(x, k, &mut rng);
        self.inertia_history.clear();

        for iter in 0..self.config.max_iter {
            cancel.check()?;

            let labels = Self::assign(x, &centroids);
            self.inertia_history.push(inertia_of(x, &labels, &centroids));

            // Empty clusters keep their previous centroid
            let (means, counts) = cluster_means(x, &labels, k);
            let mut new_centroids = centroids.clone();
            for (c, &count) in counts.iter().enumerate() {
                if count > 0 {
                    new_centroids.row_mut(c).assign(&means.row(c));
                }
            }

            let movement = centroids
                .outer_iter()
                .zip(new_centroids.outer_iter())
                .map(|(a, b)| euclidean_distance(a, b))
                .fold(0.0, f64::max);
            centroids = new_centroids;

            if movement < self.config.tol {
                tracing::debug!(iterations = iter + 1, "k-means converged");
                break;
            }
        }

        self.labels = Self::assign(x, &centroids);
        self.inertia = inertia_of(x, &self.labels, &centroids);
        self.centroids = centroids;
        self.is_fitted = true;
        Ok(self)
    }

    /// Predict cluster labels for new data
    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        if !self.is_fitted {
            return Err(EngineError::InvalidModel("k-means model is not fitted".to_string()));
        }
        Ok(Self::assign(x, &self.centroids))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  Agglomerative Clustering
// ═══════════════════════════════════════════════════════════════════════════

/// Single-linkage agglomerative clustering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgglomerativeClustering {
    pub n_clusters: usize,
    pub labels: Vec<usize>,
    pub centroids: Array2<f64>,
    pub inertia: f64,
}

impl AgglomerativeClustering {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            labels: Vec::new(),
            centroids: Array2::zeros((0, 0)),
            inertia: 0.0,
        }
    }

    /// Merge the closest pair of clusters until `n_clusters` remain.
    ///
    /// Cluster distances follow the single-linkage update
    /// `d(a ∪ b, k) = min(d(a, k), d(b, k))`. Among equal distances the
    /// first pair in row-major order is merged.
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        let n = x.nrows();
        check_cluster_count(n, self.n_clusters)?;
        check_finite(x)?;

        let mut dist = Array2::<f64>::zeros((n, n));
        for i in 0..n {
            for j in (i + 1)..n {
                let d = euclidean_distance(x.row(i), x.row(j));
                dist[[i, j]] = d;
                dist[[j, i]] = d;
            }
        }

        // Each sample points at the representative of its cluster
        let mut owner: Vec<usize> = (0..n).collect();
        let mut active: Vec<bool> = vec![true; n];
        let mut remaining = n;

        while remaining > self.n_clusters {
            let mut best: Option<(usize, usize, f64)> = None;
            for a in (0..n).filter(|&a| active[a]) {
                for b in ((a + 1)..n).filter(|&b| active[b]) {
                    let d = dist[[a, b]];
                    if best.map_or(true, |(_, _, bd)| d < bd) {
                        best = Some((a, b, d));
                    }
                }
            }
            let Some((a, b, _)) = best else {
                break;
            };

            for k in 0..n {
                let merged = dist[[a, k]].min(dist[[b, k]]);
                dist[[a, k]] = merged;
                dist[[k, a]] = merged;
            }
            active[b] = false;
            for o in owner.iter_mut().filter(|o| **o == b) {
                *o = a;
            }
            remaining -= 1;
        }

        // Contiguous ids in order of first appearance
        let mut relabel: Vec<Option<usize>> = vec![None; n];
        let mut next = 0;
        self.labels = owner
            .iter()
            .map(|&rep| {
                *relabel[rep].get_or_insert_with(|| {
                    next += 1;
                    next - 1
                })
            })
            .collect();

        let (centroids, _) = cluster_means(x, &self.labels, next);
        self.inertia = inertia_of(x, &self.labels, &centroids);
        self.centroids = centroids;
        Ok(self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  Silhouette
// ═══════════════════════════════════════════════════════════════════════════

/// Mean silhouette coefficient over all samples.
///
/// Samples alone in their cluster score 0, and so does a labelling with
/// fewer than two clusters.
pub fn silhouette_score(x: &Array2<f64>, labels: &[usize]) -> f64 {
    let n = labels.len();
    let n_clusters = labels.iter().max().map_or(0, |&m| m + 1);
    let mut sizes = vec![0usize; n_clusters];
    for &l in labels {
        sizes[l] += 1;
    }
    if sizes.iter().filter(|&&s| s > 0).count() < 2 {
        return 0.0;
    }

    let scores: Vec<f64> = (0..n)
        .into_par_iter()
        .map(|i| {
            let own = labels[i];
            if sizes[own] <= 1 {
                return 0.0;
            }

            let mut sums = vec![0.0; n_clusters];
            for j in 0..n {
                if j != i {
                    sums[labels[j]] += euclidean_distance(x.row(i), x.row(j));
                }
            }

            let a = sums[own] / (sizes[own] - 1) as f64;
            let b = (0..n_clusters)
                .filter(|&c| c != own && sizes[c] > 0)
                .map(|c| sums[c] / sizes[c] as f64)
                .fold(f64::INFINITY, f64::min);

            let denom = a.max(b);
            if denom > 0.0 {
                (b - a) / denom
            } else {
                0.0
            }
        })
        .collect();

    scores.iter().sum::<f64>() / n as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn two_blobs() -> Array2<f64> {
        array![
            [1.0, 1.0],
            [1.5, 1.5],
            [1.2, 1.3],
            [8.0, 8.0],
            [8.5, 8.5],
            [8.2, 8.3]
        ]
    }

    /// Uniform initialization can strand a centroid, so keep the best of a few seeds
    fn best_of_seeds(x: &Array2<f64>, k: usize) -> KMeans {
        (0..8u64)
            .map(|seed| {
                let mut model = KMeans::new(KMeansConfig {
                    n_clusters: k,
                    random_state: seed,
                    ..Default::default()
                });
                model.fit(x).unwrap();
                model
            })
            .min_by(|a, b| a.inertia.partial_cmp(&b.inertia).unwrap())
            .unwrap()
    }

    #[test]
    fn test_kmeans_basic() {
        let model = best_of_seeds(&two_blobs(), 2);

        let labels = &model.labels;
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[0], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_eq!(labels[3], labels[5]);
        assert_ne!(labels[0], labels[3]);
    }

    #[test]
    fn test_kmeans_is_deterministic() {
        let config = KMeansConfig {
            n_clusters: 2,
            ..Default::default()
        };
        let mut a = KMeans::new(config.clone());
        let mut b = KMeans::new(config);
        a.fit(&two_blobs()).unwrap();
        b.fit(&two_blobs()).unwrap();
        assert_eq!(a.labels, b.labels);
        assert_eq!(a.centroids, b.centroids);
    }

    #[test]
    fn test_kmeans_inertia_non_increasing() {
        let x = array![
            [0.0, 0.0],
            [0.3, 0.1],
            [4.0, 4.2],
            [4.1, 3.9],
            [9.0, 0.5],
            [8.7, 0.2],
            [2.0, 6.0]
        ];
        let mut model = KMeans::new(KMeansConfig {
            n_clusters: 3,
            random_state: 11,
            ..Default::default()
        });
        model.fit(&x).unwrap();

        let history = &model.inertia_history;
        assert!(!history.is_empty());
        assert!(history.len() <= 300);
        for pair in history.windows(2) {
            assert!(pair[1] <= pair[0] + 1e-9, "inertia rose: {:?}", history);
        }
        assert!(model.inertia <= *history.last().unwrap() + 1e-9);
    }

    #[test]
    fn test_kmeans_predict() {
        let x = array![[0.0, 0.0], [0.5, 0.5], [10.0, 10.0], [10.5, 10.5]];
        let model = best_of_seeds(&x, 2);

        let labels = model.predict(&array![[0.1, 0.1], [10.1, 10.1]]).unwrap();
        assert_ne!(labels[0], labels[1]);
    }

    #[test]
    fn test_invalid_cluster_counts() {
        let x = two_blobs();
        let mut zero = KMeans::new(KMeansConfig {
            n_clusters: 0,
            ..Default::default()
        });
        assert!(matches!(zero.fit(&x), Err(EngineError::InvalidInput(_))));

        let mut too_many = AgglomerativeClustering::new(7);
        assert!(matches!(too_many.fit(&x), Err(EngineError::InvalidInput(_))));
    }

    #[test]
    fn test_non_finite_features_are_rejected() {
        let x = array![[0.0], [f64::NAN], [2.0], [10.0]];
        let mut hierarchical = AgglomerativeClustering::new(2);
        assert!(matches!(hierarchical.fit(&x), Err(EngineError::InvalidInput(_))));

        let mut kmeans = KMeans::new(KMeansConfig {
            n_clusters: 2,
            ..Default::default()
        });
        assert!(matches!(kmeans.fit(&x), Err(EngineError::InvalidInput(_))));
    }

    #[test]
    fn test_single_linkage_chains() {
        // Chain 0-1-2 with gaps of 1, far point at 10
        let x = array![[0.0], [1.0], [2.0], [10.0]];
        let mut model = AgglomerativeClustering::new(2);
        model.fit(&x).unwrap();

        assert_eq!(model.labels, vec![0, 0, 0, 1]);
        assert!((model.centroids[[0, 0]] - 1.0).abs() < 1e-12);
        assert!((model.centroids[[1, 0]] - 10.0).abs() < 1e-12);
        assert!((model.inertia - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_linkage_labels_by_first_appearance() {
        let x = array![[10.0], [0.0], [10.5], [0.4]];
        let mut model = AgglomerativeClustering::new(2);
        model.fit(&x).unwrap();
        assert_eq!(model.labels, vec![0, 1, 0, 1]);
    }

    #[test]
    fn test_silhouette_edge_cases() {
        let x = array![[0.0], [1.0], [5.0]];
        assert_eq!(silhouette_score(&x, &[0, 0, 0]), 0.0);

        // Sample 2 is a singleton and scores 0
        let s = silhouette_score(&x, &[0, 0, 1]);
        // a = 1, b = 5 for sample 0; a = 1, b = 4 for sample 1
        let expected = ((5.0 - 1.0) / 5.0 + (4.0 - 1.0) / 4.0) / 3.0;
        assert!((s - expected).abs() < 1e-12);
    }

    #[test]
    fn test_fit_clusters_hierarchical() {
        let fit = fit_clusters(
            &two_blobs(),
            &ClusteringParams::Hierarchical(HierarchicalConfig { n_clusters: 2 }),
            &CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(fit.labels, vec![0, 0, 0, 1, 1, 1]);
        assert!(fit.silhouette > 0.8);
        assert!(fit.inertia_history.is_empty());
    }
}
