//! Training engine: fits the family selected by a [`Hyperparameters`] value

use super::config::Hyperparameters;
use super::decision_tree::DecisionTree;
use super::gradient_boosting::GradientBoostingRegressor;
use super::linear_models::{LinearRegression, LogisticRegression};
use super::models::ModelParameters;
use super::naive_bayes::GaussianNaiveBayes;
use super::neural_network::MLPRegressor;
use super::random_forest::RandomForest;
use super::svm::SVMClassifier;
use crate::error::{EngineError, Result};
use crate::utils::cancel::CancellationToken;
use ndarray::{Array1, Array2};
use std::time::Instant;

/// Fits one model family on in-memory arrays
#[derive(Debug, Clone)]
pub struct TrainEngine {
    hyperparameters: Hyperparameters,
    cancel: CancellationToken,
}

impl TrainEngine {
    pub fn new(hyperparameters: Hyperparameters) -> Self {
        Self {
            hyperparameters,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn hyperparameters(&self) -> &Hyperparameters {
        &self.hyperparameters
    }

    /// Fit the configured family and return its parameter payload
    pub fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<ModelParameters> {
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(EngineError::InvalidInput(format!(
                "training data must be non-empty, got {}x{}",
                x.nrows(),
                x.ncols()
            )));
        }
        if x.nrows() != y.len() {
            return Err(EngineError::InvalidInput(format!(
                "{} targets for {} samples",
                y.len(),
                x.nrows()
            )));
        }
        self.cancel.check()?;

        let start = Instant::now();
        let cancel = &self.cancel;
        let params = match &self.hyperparameters {
            Hyperparameters::LinearRegression(config) => {
                let mut model = LinearRegression::new(config.clone());
                model.fit(x, y)?;
                ModelParameters::LinearRegression(model)
            }
            Hyperparameters::LogisticRegression(config) => {
                let mut model = LogisticRegression::new(config.clone());
                model.fit(x, y)?;
                ModelParameters::LogisticRegression(model)
            }
            Hyperparameters::DecisionTree(config) => {
                let mut model = DecisionTree::new(config.clone());
                model.fit(x, y)?;
                ModelParameters::DecisionTree(model)
            }
            Hyperparameters::RandomForest(config) => {
                let mut model = RandomForest::new(config.clone());
                model.fit_cancellable(x, y, cancel)?;
                ModelParameters::RandomForest(model)
            }
            Hyperparameters::GradientBoosting(config) => {
                let mut model = GradientBoostingRegressor::new(config.clone());
                model.fit_cancellable(x, y, cancel)?;
                ModelParameters::GradientBoosting(model)
            }
            Hyperparameters::NeuralNetwork(config) => {
                let mut model = MLPRegressor::new(config.clone());
                model.fit_cancellable(x, y, cancel)?;
                ModelParameters::NeuralNetwork(model)
            }
            Hyperparameters::Svm(config) => {
                let mut model = SVMClassifier::new(config.clone());
                model.fit_cancellable(x, y, cancel)?;
                ModelParameters::Svm(model)
            }
            Hyperparameters::NaiveBayes => {
                let mut model = GaussianNaiveBayes::new();
                model.fit(x, y)?;
                ModelParameters::NaiveBayes(model)
            }
        };

        tracing::debug!(
            family = %self.hyperparameters.family(),
            n_samples = x.nrows(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "model fitted"
        );
        Ok(params)
    }
}
