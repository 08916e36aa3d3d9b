//! Gaussian Naive Bayes classifier
//!
//! Classes are the distinct integer labels seen in training, kept in
//! ascending order. Probability columns follow that order.

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::error::{EngineError, Result};

/// Variance floor for features that are constant within a class
pub const VARIANCE_FLOOR: f64 = 1e-9;

/// Per-class Gaussian statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassStats {
    pub label: i64,
    pub prior: f64,
    pub means: Vec<f64>,
    /// Population variances, floored at [`VARIANCE_FLOOR`]
    pub variances: Vec<f64>,
}

/// Gaussian Naive Bayes Classifier
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GaussianNaiveBayes {
    classes: Vec<ClassStats>,
    n_features: usize,
}

impl GaussianNaiveBayes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit the classifier
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
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
        if let Some((i, &v)) = y.iter().enumerate().find(|(_, &v)| (v - v.round()).abs() > 1e-9) {
            return Err(EngineError::InvalidInput(format!(
                "naive Bayes requires integer class labels, sample {} has {}",
                i, v
            )));
        }

        let mut labels: Vec<i64> = y.iter().map(|&v| v.round() as i64).collect();
        labels.sort_unstable();
        labels.dedup();

        self.classes = labels
            .into_iter()
            .map(|label| {
                let members: Vec<usize> = (0..n_samples).filter(|&i| y[i].round() as i64 == label).collect();
                let count = members.len() as f64;

                // Single-pass Welford's algorithm for mean and variance
                let mut means = vec![0.0; n_features];
                let mut m2 = vec![0.0; n_features];
                for (seen, &idx) in members.iter().enumerate() {
                    let k = (seen + 1) as f64;
                    for (j, &val) in x.row(idx).iter().enumerate() {
                        let delta = val - means[j];
                        means[j] += delta / k;
                        m2[j] += delta * (val - means[j]);
                    }
                }
                let variances = m2.iter().map(|&v| (v / count).max(VARIANCE_FLOOR)).collect();

                ClassStats {
                    label,
                    prior: count / n_samples as f64,
                    means,
                    variances,
                }
            })
            .collect();
        self.n_features = n_features;

        Ok(())
    }

    fn check_fitted(&self, x: &Array2<f64>) -> Result<()> {
        if self.classes.is_empty() {
            return Err(EngineError::InvalidModel("naive Bayes model is not fitted".to_string()));
        }
        if x.ncols() != self.n_features {
            return Err(EngineError::InvalidInput(format!(
                "naive Bayes expects {} features, got {}",
                self.n_features,
                x.ncols()
            )));
        }
        Ok(())
    }

    /// Unnormalized log posterior of one row for one class
    fn joint_log_likelihood(stats: &ClassStats, row: ArrayView1<f64>) -> f64 {
        let log_likelihood: f64 = row
            .iter()
            .zip(stats.means.iter().zip(stats.variances.iter()))
            .map(|(&xi, (&mean, &var))| -0.5 * ((xi - mean).powi(2) / var + var.ln() + (2.0 * PI).ln()))
            .sum();
        stats.prior.ln() + log_likelihood
    }

    /// Normalized log posteriors, one column per class
    pub fn predict_log_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_fitted(x)?;
        let mut log_probs = Array2::zeros((x.nrows(), self.classes.len()));

        for (i, row) in x.outer_iter().enumerate() {
            for (j, stats) in self.classes.iter().enumerate() {
                log_probs[[i, j]] = Self::joint_log_likelihood(stats, row);
            }
        }

        // Normalize (log-sum-exp trick)
        for mut row in log_probs.rows_mut() {
            let max_val = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let log_sum = row.iter().map(|&v| (v - max_val).exp()).sum::<f64>().ln();
            row.mapv_inplace(|v| v - max_val - log_sum);
        }

        Ok(log_probs)
    }

    /// Class probabilities, one column per class
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        Ok(self.predict_log_proba(x)?.mapv(f64::exp))
    }

    /// Arg-max class label (lowest label on exact ties)
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let log_probs = self.predict_log_proba(x)?;
        Ok(log_probs
            .outer_iter()
            .map(|row| {
                let mut best = 0;
                for (j, &v) in row.iter().enumerate() {
                    if v > row[best] {
                        best = j;
                    }
                }
                self.classes[best].label as f64
            })
            .collect())
    }

    pub fn classes(&self) -> &[ClassStats] {
        &self.classes
    }

    /// Class labels in column order
    pub fn labels(&self) -> Vec<i64> {
        self.classes.iter().map(|c| c.label).collect()
    }
}
