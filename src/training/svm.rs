//! Kernel margin classifier
//!
//! Binary RBF-kernel classifier trained with a simplified SMO (Sequential
//! Minimal Optimization). Labels 0/1 are mapped to -1/+1 internally; each
//! KKT violator `i` is paired with `j = (i + 1) mod n`.

use crate::data::validate_binary_targets;
use crate::error::{EngineError, Result};
use crate::utils::cancel::CancellationToken;
use crate::utils::stats::squared_euclidean;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Maximum number of samples for eager kernel matrix computation.
const MAX_KERNEL_MATRIX_SAMPLES: usize = 10_000;

/// Alphas at or below this are not support vectors
const SUPPORT_EPSILON: f64 = 1e-8;

/// SVM configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SVMConfig {
    /// Regularization parameter (C)
    pub c: f64,
    /// RBF width: K(a, b) = exp(-gamma * ||a - b||^2)
    pub gamma: f64,
    /// KKT tolerance
    pub tol: f64,
    /// Maximum number of full passes
    pub max_iter: usize,
    /// Smallest alpha change that counts as progress
    pub min_delta: f64,
}

impl Default for SVMConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            gamma: 1.0,
            tol: 1e-3,
            max_iter: 100,
            min_delta: 1e-5,
        }
    }
}

/// Support Vector Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMClassifier {
    config: SVMConfig,
    support_vectors: Option<Array2<f64>>,
    /// Alpha of each support vector
    alphas: Option<Array1<f64>>,
    /// Signed (+1/-1) label of each support vector
    support_labels: Option<Array1<f64>>,
    bias: f64,
    /// Outer passes used by the last fit
    n_iter: usize,
}

impl Default for SVMClassifier {
    fn default() -> Self {
        Self::new(SVMConfig::default())
    }
}

#[inline]
fn rbf(a: ArrayView1<f64>, b: ArrayView1<f64>, gamma: f64) -> f64 {
    (-gamma * squared_euclidean(a, b)).exp()
}

impl SVMClassifier {
    pub fn new(config: SVMConfig) -> Self {
        Self {
            config,
            support_vectors: None,
            alphas: None,
            support_labels: None,
            bias: 0.0,
            n_iter: 0,
        }
    }

    /// Fit on 0/1 labels
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.fit_cancellable(x, y, &CancellationToken::new())
    }

    /// Fit, checking `cancel` before each outer pass
    pub fn fit_cancellable(&mut self, x: &Array2<f64>, y: &Array1<f64>, cancel: &CancellationToken) -> Result<()> {
        let n = x.nrows();
        if n != y.len() {
            return Err(EngineError::InvalidInput(format!("y length = {}, expected {}", y.len(), n)));
        }
        validate_binary_targets(&y.to_vec())?;
        if !(y.iter().any(|&v| v == 0.0) && y.iter().any(|&v| v == 1.0)) {
            return Err(EngineError::InvalidInput(
                "kernel classifier needs both classes in the training data".to_string(),
            ));
        }
        if n > MAX_KERNEL_MATRIX_SAMPLES {
            return Err(EngineError::InvalidInput(format!(
                "{} samples exceed the kernel matrix limit of {}",
                n, MAX_KERNEL_MATRIX_SAMPLES
            )));
        }

        let signed: Array1<f64> = y.mapv(|v| if v == 1.0 { 1.0 } else { -1.0 });
        let (alphas, bias) = self.smo_train(x, &signed, cancel)?;

        let support: Vec<usize> = (0..n).filter(|&i| alphas[i] > SUPPORT_EPSILON).collect();
        self.support_vectors = Some(x.select(Axis(0), &support));
        self.alphas = Some(support.iter().map(|&i| alphas[i]).collect());
        self.support_labels = Some(support.iter().map(|&i| signed[i]).collect());
        self.bias = bias;

        tracing::debug!(
            n_support = support.len(),
            n_iter = self.n_iter,
            bias,
            "kernel classifier fitted"
        );
        Ok(())
    }

    /// SMO training algorithm
    fn smo_train(&mut self, x: &Array2<f64>, y: &Array1<f64>, cancel: &CancellationToken) -> Result<(Array1<f64>, f64)> {
        let n = x.nrows();
        let c = self.config.c;
        let tol = self.config.tol;

        let mut alphas: Array1<f64> = Array1::zeros(n);
        let mut bias = 0.0;
        let k = self.compute_kernel_matrix(x);

        let error_at = |alphas: &Array1<f64>, bias: f64, idx: usize| -> f64 {
            let f: f64 = (0..n).map(|m| alphas[m] * y[m] * k[[m, idx]]).sum::<f64>() + bias;
            f - y[idx]
        };

        self.n_iter = 0;
        while self.n_iter < self.config.max_iter {
            cancel.check()?;
            self.n_iter += 1;
            let mut num_changed = 0;

            for i in 0..n {
                let e_i = error_at(&alphas, bias, i);
                let violates = (y[i] * e_i < -tol && alphas[i] < c) || (y[i] * e_i > tol && alphas[i] > 0.0);
                if !violates {
                    continue;
                }

                let j = (i + 1) % n;
                let e_j = error_at(&alphas, bias, j);
                let alpha_i_old = alphas[i];
                let alpha_j_old = alphas[j];

                let (l, h) = if y[i] != y[j] {
                    ((alpha_j_old - alpha_i_old).max(0.0), (c + alpha_j_old - alpha_i_old).min(c))
                } else {
                    ((alpha_i_old + alpha_j_old - c).max(0.0), (alpha_i_old + alpha_j_old).min(c))
                };
                if (l - h).abs() < 1e-10 {
                    continue;
                }

                let eta = 2.0 * k[[i, j]] - k[[i, i]] - k[[j, j]];
                if eta >= 0.0 {
                    continue;
                }

                let alpha_j = (alpha_j_old - y[j] * (e_i - e_j) / eta).clamp(l, h);
                if (alpha_j - alpha_j_old).abs() < self.config.min_delta {
                    continue;
                }
                let alpha_i = alpha_i_old + y[i] * y[j] * (alpha_j_old - alpha_j);

                let d_i = y[i] * (alpha_i - alpha_i_old);
                let d_j = y[j] * (alpha_j - alpha_j_old);
                let b1 = bias - e_i - d_i * k[[i, i]] - d_j * k[[i, j]];
                let b2 = bias - e_j - d_i * k[[i, j]] - d_j * k[[j, j]];
                bias = if alpha_i > 0.0 && alpha_i < c {
                    b1
                } else if alpha_j > 0.0 && alpha_j < c {
                    b2
                } else {
                    (b1 + b2) / 2.0
                };

                alphas[i] = alpha_i;
                alphas[j] = alpha_j;
                num_changed += 1;
            }

            if num_changed == 0 {
                break;
            }
        }

        Ok((alphas, bias))
    }

    /// Kernel matrix, rows computed in parallel
    fn compute_kernel_matrix(&self, x: &Array2<f64>) -> Array2<f64> {
        let n = x.nrows();
        let gamma = self.config.gamma;
        let rows: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| (0..n).map(|j| rbf(x.row(i), x.row(j), gamma)).collect())
            .collect();

        let mut k = Array2::zeros((n, n));
        for (i, row) in rows.into_iter().enumerate() {
            for (j, val) in row.into_iter().enumerate() {
                k[[i, j]] = val;
            }
        }
        k
    }

    /// Signed margin `f(x) = sum(alpha_k * y_k * K(sv_k, x)) + b`
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (sv, alphas, labels) = match (&self.support_vectors, &self.alphas, &self.support_labels) {
            (Some(sv), Some(a), Some(l)) => (sv, a, l),
            _ => return Err(EngineError::InvalidModel("kernel classifier is not fitted".to_string())),
        };
        if sv.nrows() > 0 && x.ncols() != sv.ncols() {
            return Err(EngineError::InvalidInput(format!(
                "kernel classifier expects {} features, got {}",
                sv.ncols(),
                x.ncols()
            )));
        }

        Ok(x
            .outer_iter()
            .map(|row| {
                sv.outer_iter()
                    .zip(alphas.iter().zip(labels.iter()))
                    .map(|(s, (&a, &l))| a * l * rbf(s, row, self.config.gamma))
                    .sum::<f64>()
                    + self.bias
            })
            .collect())
    }

    /// Predict 0/1 labels (`f(x) >= 0` is class 1)
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(|f| if f >= 0.0 { 1.0 } else { 0.0 }))
    }

    pub fn n_support_vectors(&self) -> usize {
        self.alphas.as_ref().map(|a| a.len()).unwrap_or(0)
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    pub fn n_iter(&self) -> usize {
        self.n_iter
    }
}
