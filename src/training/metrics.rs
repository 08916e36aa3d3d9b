//! Model evaluation metrics

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Regression error metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    /// Mean Squared Error
    pub mse: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Error
    pub mae: f64,
    /// R-squared
    pub r2: f64,
}

impl RegressionMetrics {
    /// Compute regression metrics
    pub fn compute(y_true: &[f64], y_pred: &[f64]) -> Self {
        let n = y_true.len().max(1) as f64;
        let errors: Vec<f64> = y_true.iter().zip(y_pred).map(|(t, p)| t - p).collect();

        let ss_res: f64 = errors.iter().map(|e| e * e).sum();
        let mse = ss_res / n;
        let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;

        Self {
            mse,
            rmse: mse.sqrt(),
            mae,
            r2: r2_score(y_true, y_pred),
        }
    }
}

/// Coefficient of determination.
///
/// A constant target gives 1 when predicted exactly and 0 otherwise.
pub fn r2_score(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let n = y_true.len();
    if n == 0 {
        return 0.0;
    }
    let y_mean = y_true.iter().sum::<f64>() / n as f64;
    let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();
    let ss_res: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).powi(2)).sum();

    match (ss_res == 0.0, ss_tot == 0.0) {
        (true, true) => 1.0,
        (false, true) => 0.0,
        _ => 1.0 - ss_res / ss_tot,
    }
}

/// Fraction of predictions matching the target label
pub fn accuracy_score(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred)
        .filter(|(t, p)| (*t - *p).abs() < 0.5)
        .count();
    correct as f64 / y_true.len() as f64
}

/// Binary confusion counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    pub fn_: usize,
}

impl ConfusionMatrix {
    /// Counts from positive-class probabilities at the 0.5 threshold
    pub fn from_probabilities(y_true: &[f64], proba: &[f64]) -> Self {
        let mut counts = Self::default();
        for (&t, &p) in y_true.iter().zip(proba) {
            match (t > 0.5, p >= 0.5) {
                (true, true) => counts.tp += 1,
                (false, true) => counts.fp += 1,
                (false, false) => counts.tn += 1,
                (true, false) => counts.fn_ += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.tp + self.fp + self.tn + self.fn_
    }
}

/// Binary classification metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub auc: f64,
    pub confusion_matrix: ConfusionMatrix,
}

impl ClassificationMetrics {
    /// Compute from 0/1 targets and positive-class probabilities
    pub fn compute(y_true: &[f64], proba: &[f64]) -> Self {
        let cm = ConfusionMatrix::from_probabilities(y_true, proba);

        let ratio = |num: usize, den: usize| if den > 0 { num as f64 / den as f64 } else { 0.0 };
        let accuracy = ratio(cm.tp + cm.tn, cm.total());
        let precision = ratio(cm.tp, cm.tp + cm.fp);
        let recall = ratio(cm.tp, cm.tp + cm.fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            accuracy,
            precision,
            recall,
            f1,
            auc: roc_auc(y_true, proba),
            confusion_matrix: cm,
        }
    }
}

/// Area under the ROC curve by the trapezoidal rule.
///
/// Samples are swept by descending score; tied scores move the threshold
/// in a single step. Returns 0.5 when either class is absent.
pub fn roc_auc(y_true: &[f64], scores: &[f64]) -> f64 {
    let n_pos = y_true.iter().filter(|&&t| t > 0.5).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return 0.5;
    }

    let mut order: Vec<usize> = (0..y_true.len()).collect();
    order.sort_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap_or(Ordering::Equal));

    let (mut tp, mut fp) = (0usize, 0usize);
    let (mut prev_tpr, mut prev_fpr) = (0.0, 0.0);
    let mut area = 0.0;

    let mut i = 0;
    while i < order.len() {
        let score = scores[order[i]];
        while i < order.len() && scores[order[i]] == score {
            if y_true[order[i]] > 0.5 {
                tp += 1;
            } else {
                fp += 1;
            }
            i += 1;
        }
        let tpr = tp as f64 / n_pos as f64;
        let fpr = fp as f64 / n_neg as f64;
        area += (fpr - prev_fpr) * (tpr + prev_tpr) / 2.0;
        prev_tpr = tpr;
        prev_fpr = fpr;
    }

    area
}

/// Clustering quality
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusteringMetrics {
    pub inertia: f64,
    pub silhouette: f64,
}

/// Performance snapshot stored with a model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelPerformance {
    pub regression: Option<RegressionMetrics>,
    /// Present only for binary probabilistic classifiers
    pub classification: Option<ClassificationMetrics>,
    pub clustering: Option<ClusteringMetrics>,
}

impl ModelPerformance {
    /// Regression metrics always; classification metrics when
    /// positive-class probabilities are supplied for 0/1 targets
    pub fn evaluate(y_true: &[f64], y_pred: &[f64], proba: Option<&[f64]>) -> Self {
        let binary = y_true.iter().all(|&t| t == 0.0 || t == 1.0);
        Self {
            regression: Some(RegressionMetrics::compute(y_true, y_pred)),
            classification: match proba {
                Some(p) if binary && !y_true.is_empty() => Some(ClassificationMetrics::compute(y_true, p)),
                _ => None,
            },
            clustering: None,
        }
    }

    pub fn clustering(inertia: f64, silhouette: f64) -> Self {
        Self {
            clustering: Some(ClusteringMetrics { inertia, silhouette }),
            ..Default::default()
        }
    }
}
