//! Prediction dispatch across model families

use crate::data::FeatureTable;
use crate::error::{EngineError, Result};
use crate::training::clustering::nearest_centroid;
use crate::training::config::ModelFamily;
use crate::training::models::{Model, ModelParameters};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Confidence reported by families without a per-sample estimate
pub const FIXED_CONFIDENCE: f64 = 0.95;

/// `(class label, probability)` pairs for one sample
pub type ClassProbabilities = Vec<(i64, f64)>;

/// Output of a prediction call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub model_id: String,
    pub predictions: Vec<f64>,
    /// Per-sample class probabilities for probabilistic classifiers
    pub class_probabilities: Option<Vec<ClassProbabilities>>,
    pub confidence: Vec<f64>,
    pub feature_importance: HashMap<String, f64>,
}

/// Family output before it is attached to a model id
#[derive(Debug, Clone)]
pub struct RawPrediction {
    pub predictions: Array1<f64>,
    pub class_probabilities: Option<Vec<ClassProbabilities>>,
    /// Probability of label 1, for binary evaluation
    pub positive_proba: Option<Array1<f64>>,
    pub confidence: Vec<f64>,
}

impl RawPrediction {
    fn constant_confidence(predictions: Array1<f64>, confidence: f64) -> Self {
        let n = predictions.len();
        Self {
            predictions,
            class_probabilities: None,
            positive_proba: None,
            confidence: vec![confidence; n],
        }
    }
}

/// Run the family-specific predictor for `params`.
///
/// A payload that does not belong to `family` is `InvalidModel`.
pub fn dispatch(family: ModelFamily, params: &ModelParameters, x: &Array2<f64>) -> Result<RawPrediction> {
    if !params.matches(family) {
        return Err(EngineError::InvalidModel(format!(
            "model tagged {} carries a mismatched parameter payload",
            family
        )));
    }

    let raw = match params {
        ModelParameters::LinearRegression(model) => {
            RawPrediction::constant_confidence(model.predict(x)?, FIXED_CONFIDENCE)
        }
        ModelParameters::GradientBoosting(model) => {
            RawPrediction::constant_confidence(model.predict(x)?, FIXED_CONFIDENCE)
        }
        ModelParameters::NeuralNetwork(model) => {
            RawPrediction::constant_confidence(model.predict(x)?, FIXED_CONFIDENCE)
        }
        ModelParameters::LogisticRegression(model) => {
            let proba = model.predict_proba(x)?;
            RawPrediction {
                predictions: proba.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }),
                class_probabilities: Some(proba.iter().map(|&p| vec![(0, 1.0 - p), (1, p)]).collect()),
                confidence: proba.iter().map(|&p| (p - 0.5).abs() * 2.0).collect(),
                positive_proba: Some(proba),
            }
        }
        ModelParameters::DecisionTree(model) => {
            // A single tree has no spread between members
            RawPrediction::constant_confidence(model.predict(x)?, 1.0)
        }
        ModelParameters::RandomForest(model) => {
            let out = model.predict_with_variance(x)?;
            let confidence = out.confidence();
            RawPrediction {
                predictions: out.mean,
                class_probabilities: None,
                positive_proba: None,
                confidence,
            }
        }
        ModelParameters::Svm(model) => {
            let scores = model.decision_function(x)?;
            RawPrediction {
                predictions: scores.mapv(|f| if f >= 0.0 { 1.0 } else { 0.0 }),
                class_probabilities: None,
                positive_proba: None,
                confidence: scores.iter().map(|f| f.abs().min(1.0)).collect(),
            }
        }
        ModelParameters::NaiveBayes(model) => {
            let proba = model.predict_proba(x)?;
            let labels = model.labels();
            let predictions = model.predict(x)?;
            let positive_col = labels.iter().position(|&l| l == 1);
            RawPrediction {
                predictions,
                class_probabilities: Some(
                    proba
                        .outer_iter()
                        .map(|row| labels.iter().copied().zip(row.iter().copied()).collect())
                        .collect(),
                ),
                confidence: proba
                    .outer_iter()
                    .map(|row| row.iter().cloned().fold(0.0, f64::max))
                    .collect(),
                positive_proba: Some(match positive_col {
                    Some(j) => proba.column(j).to_owned(),
                    None => Array1::zeros(x.nrows()),
                }),
            }
        }
        ModelParameters::Clustering { centroids } => {
            if centroids.nrows() == 0 {
                return Err(EngineError::InvalidModel("clustering model has no centroids".to_string()));
            }
            if centroids.ncols() != x.ncols() {
                return Err(EngineError::InvalidInput(format!(
                    "centroids have {} features, got {}",
                    centroids.ncols(),
                    x.ncols()
                )));
            }
            let (labels, confidence): (Vec<f64>, Vec<f64>) = x
                .outer_iter()
                .map(|row| {
                    let (c, dist) = nearest_centroid(row, centroids);
                    (c as f64, 1.0 / (1.0 + dist))
                })
                .unzip();
            RawPrediction {
                predictions: Array1::from_vec(labels),
                class_probabilities: None,
                positive_proba: None,
                confidence,
            }
        }
    };

    Ok(raw)
}

/// Per-feature importance for a fitted payload.
///
/// Linear and logistic models report absolute weights, random forests the
/// normalized mean impurity decrease, every other family equal weights.
pub fn feature_importance(params: &ModelParameters, feature_names: &[String]) -> HashMap<String, f64> {
    let weights: Option<Vec<f64>> = match params {
        ModelParameters::LinearRegression(model) => {
            model.coefficients.as_ref().map(|c| c.iter().map(|w| w.abs()).collect())
        }
        ModelParameters::LogisticRegression(model) => {
            model.coefficients.as_ref().map(|c| c.iter().map(|w| w.abs()).collect())
        }
        ModelParameters::RandomForest(model) => model.feature_importances().map(|imp| imp.to_vec()),
        _ => None,
    };

    let n = feature_names.len();
    match weights {
        Some(w) if w.len() == n => feature_names.iter().cloned().zip(w).collect(),
        _ => feature_names
            .iter()
            .map(|name| (name.clone(), 1.0 / n as f64))
            .collect(),
    }
}

/// Predictor bound to one trained model
#[derive(Debug, Clone, Copy)]
pub struct InferenceEngine<'m> {
    model: &'m Model,
}

impl<'m> InferenceEngine<'m> {
    /// Bind to `model`, rejecting payloads that do not match its family
    pub fn new(model: &'m Model) -> Result<Self> {
        if !model.parameters.matches(model.family) {
            return Err(EngineError::InvalidModel(format!(
                "model {} is tagged {} but carries a different payload",
                model.id, model.family
            )));
        }
        Ok(Self { model })
    }

    pub fn model(&self) -> &Model {
        self.model
    }

    /// Predict on a table laid out like the training data
    pub fn predict(&self, table: &FeatureTable) -> Result<PredictionResult> {
        let expected = self.model.n_features();
        if table.n_features() != expected {
            return Err(EngineError::InvalidInput(format!(
                "model {} expects {} features, got {}",
                self.model.id,
                expected,
                table.n_features()
            )));
        }

        let raw = dispatch(self.model.family, &self.model.parameters, table.data())?;
        Ok(PredictionResult {
            model_id: self.model.id.clone(),
            predictions: raw.predictions.to_vec(),
            class_probabilities: raw.class_probabilities,
            confidence: raw.confidence,
            feature_importance: feature_importance(&self.model.parameters, &self.model.data_info.feature_names),
        })
    }
}
