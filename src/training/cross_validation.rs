//! K-fold cross-validation and grid search

use super::config::{Hyperparameters, ModelFamily};
use super::engine::TrainEngine;
use super::metrics::{accuracy_score, r2_score};
use crate::error::{EngineError, Result};
use crate::inference::dispatch;
use crate::utils::cancel::CancellationToken;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// A single train/test split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Contiguous k-fold split; the last fold absorbs the remainder
pub fn k_fold_split(n_samples: usize, n_splits: usize) -> Result<Vec<CVSplit>> {
    if n_splits < 2 {
        return Err(EngineError::InvalidInput("n_splits must be at least 2".to_string()));
    }
    if n_samples < n_splits {
        return Err(EngineError::InvalidInput(format!(
            "n_samples ({}) must be >= n_splits ({})",
            n_samples, n_splits
        )));
    }

    let base = n_samples / n_splits;
    Ok((0..n_splits)
        .map(|fold_idx| {
            let start = fold_idx * base;
            let end = if fold_idx + 1 == n_splits { n_samples } else { start + base };
            CVSplit {
                train_indices: (0..start).chain(end..n_samples).collect(),
                test_indices: (start..end).collect(),
                fold_idx,
            }
        })
        .collect())
}

/// Cross-validation results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CVResults {
    /// Scores for each fold
    pub scores: Vec<f64>,
    /// Mean score across folds
    pub mean_score: f64,
    /// Population standard deviation around the mean
    pub std_score: f64,
}

impl CVResults {
    /// Create CV results from fold scores
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n_folds = scores.len().max(1) as f64;
        let mean_score = scores.iter().sum::<f64>() / n_folds;
        let variance = scores.iter().map(|s| (s - mean_score).powi(2)).sum::<f64>() / n_folds;
        Self {
            scores,
            mean_score,
            std_score: variance.sqrt(),
        }
    }
}

/// Grid entry with its position in the caller's grid
#[derive(Debug, Clone, PartialEq)]
pub struct GridCandidate {
    pub index: usize,
    pub hyperparameters: Hyperparameters,
}

/// Outcome for one grid candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub index: usize,
    pub hyperparameters: Hyperparameters,
    /// `None` when the candidate failed to train on some fold
    pub results: Option<CVResults>,
    pub error: Option<String>,
}

/// Winner of a grid search plus every candidate's outcome
#[derive(Debug, Clone)]
pub struct GridSearchOutcome {
    pub best_index: usize,
    pub best_hyperparameters: Hyperparameters,
    pub best_results: CVResults,
    pub candidates: Vec<CandidateScore>,
}

/// K-fold grid search over one model family
#[derive(Debug, Clone)]
pub struct CrossValidator {
    family: ModelFamily,
    n_splits: usize,
    cancel: CancellationToken,
}

impl CrossValidator {
    pub fn new(family: ModelFamily, n_splits: usize) -> Self {
        Self {
            family,
            n_splits,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Index the grid; an empty grid means the family default
    pub fn candidates(&self, grid: Vec<Hyperparameters>) -> Result<Vec<GridCandidate>> {
        if self.family.is_clustering() {
            return Err(EngineError::UnsupportedOperation(format!(
                "cross-validation is not available for {}",
                self.family
            )));
        }

        let grid = if grid.is_empty() {
            Hyperparameters::default_for(self.family).into_iter().collect()
        } else {
            grid
        };

        grid.into_iter()
            .enumerate()
            .map(|(index, hyperparameters)| {
                if hyperparameters.family() != self.family {
                    return Err(EngineError::InvalidInput(format!(
                        "grid entry {} is for {}, expected {}",
                        index,
                        hyperparameters.family(),
                        self.family
                    )));
                }
                Ok(GridCandidate { index, hyperparameters })
            })
            .collect()
    }

    /// Held-out score: accuracy for classifiers, R^2 otherwise
    pub fn score(&self, y_true: &[f64], y_pred: &[f64]) -> f64 {
        if self.family.is_classifier() {
            accuracy_score(y_true, y_pred)
        } else {
            r2_score(y_true, y_pred)
        }
    }

    fn evaluate_candidate(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        splits: &[CVSplit],
        hyperparameters: &Hyperparameters,
    ) -> Result<CVResults> {
        let trainer = TrainEngine::new(hyperparameters.clone()).with_cancellation(self.cancel.clone());
        let mut scores = Vec::with_capacity(splits.len());

        for split in splits {
            self.cancel.check()?;

            let x_train = x.select(Axis(0), &split.train_indices);
            let y_train = y.select(Axis(0), &split.train_indices);
            let x_test = x.select(Axis(0), &split.test_indices);
            let y_test = y.select(Axis(0), &split.test_indices);

            let params = trainer.fit(&x_train, &y_train)?;
            let raw = dispatch(self.family, &params, &x_test)?;
            let score = self.score(&y_test.to_vec(), &raw.predictions.to_vec());

            tracing::debug!(fold = split.fold_idx, score, "fold scored");
            scores.push(score);
        }

        let results = CVResults::from_scores(scores);
        if !results.mean_score.is_finite() {
            return Err(EngineError::TrainingFailed(format!(
                "non-finite cross-validation score {}",
                results.mean_score
            )));
        }
        Ok(results)
    }

    /// Score every candidate; the highest mean wins, the first index on ties
    pub fn search(&self, x: &Array2<f64>, y: &Array1<f64>, grid: Vec<Hyperparameters>) -> Result<GridSearchOutcome> {
        let candidates = self.candidates(grid)?;
        let splits = k_fold_split(x.nrows(), self.n_splits)?;

        let mut scored = Vec::with_capacity(candidates.len());
        let mut best: Option<(usize, CVResults)> = None;

        for candidate in candidates {
            self.cancel.check()?;

            match self.evaluate_candidate(x, y, &splits, &candidate.hyperparameters) {
                Ok(results) => {
                    tracing::debug!(
                        candidate = candidate.index,
                        mean_score = results.mean_score,
                        "candidate evaluated"
                    );
                    if best.as_ref().map_or(true, |(_, b)| results.mean_score > b.mean_score) {
                        best = Some((scored.len(), results.clone()));
                    }
                    scored.push(CandidateScore {
                        index: candidate.index,
                        hyperparameters: candidate.hyperparameters,
                        results: Some(results),
                        error: None,
                    });
                }
                Err(EngineError::Cancelled) => return Err(EngineError::Cancelled),
                Err(e) => {
                    tracing::warn!(candidate = candidate.index, error = %e, "skipping grid candidate");
                    scored.push(CandidateScore {
                        index: candidate.index,
                        hyperparameters: candidate.hyperparameters,
                        results: None,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        let (pos, best_results) = best.ok_or_else(|| {
            EngineError::TrainingFailed(format!("no viable {} configuration in the grid", self.family))
        })?;
        let winner = &scored[pos];

        Ok(GridSearchOutcome {
            best_index: winner.index,
            best_hyperparameters: winner.hyperparameters.clone(),
            best_results,
            candidates: scored,
        })
    }
}
