//! Trained model record and family payloads

use super::clustering::ClusteringParams;
use super::config::{Hyperparameters, ModelFamily};
use super::decision_tree::DecisionTree;
use super::gradient_boosting::GradientBoostingRegressor;
use super::linear_models::{LinearRegression, LogisticRegression};
use super::metrics::ModelPerformance;
use super::naive_bayes::GaussianNaiveBayes;
use super::neural_network::MLPRegressor;
use super::random_forest::RandomForest;
use super::svm::SVMClassifier;
use crate::error::Result;
use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Fitted parameters, one variant per family
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ModelParameters {
    LinearRegression(LinearRegression),
    LogisticRegression(LogisticRegression),
    DecisionTree(DecisionTree),
    RandomForest(RandomForest),
    GradientBoosting(GradientBoostingRegressor),
    NeuralNetwork(MLPRegressor),
    Svm(SVMClassifier),
    NaiveBayes(GaussianNaiveBayes),
    /// Centroid table of a clustering run (one row per cluster)
    Clustering { centroids: Array2<f64> },
}

impl ModelParameters {
    /// Whether this payload can serve a model tagged with `family`
    pub fn matches(&self, family: ModelFamily) -> bool {
        matches!(
            (self, family),
            (ModelParameters::LinearRegression(_), ModelFamily::LinearRegression)
                | (ModelParameters::LogisticRegression(_), ModelFamily::LogisticRegression)
                | (ModelParameters::DecisionTree(_), ModelFamily::DecisionTree)
                | (ModelParameters::RandomForest(_), ModelFamily::RandomForest)
                | (ModelParameters::GradientBoosting(_), ModelFamily::GradientBoosting)
                | (ModelParameters::NeuralNetwork(_), ModelFamily::NeuralNetwork)
                | (ModelParameters::Svm(_), ModelFamily::Svm)
                | (ModelParameters::NaiveBayes(_), ModelFamily::NaiveBayes)
                | (ModelParameters::Clustering { .. }, ModelFamily::KMeans)
                | (ModelParameters::Clustering { .. }, ModelFamily::Hierarchical)
        )
    }
}

/// Settings a model was built with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelConfig {
    Supervised(Hyperparameters),
    Clustering(ClusteringParams),
}

/// Descriptor of the data a model was trained on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingDataInfo {
    pub feature_names: Vec<String>,
    /// `None` for clustering models
    pub target_name: Option<String>,
    /// Fraction of samples used for fitting
    pub split_ratio: f64,
    pub n_samples: usize,
}

/// Immutable trained model record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    pub family: ModelFamily,
    pub parameters: ModelParameters,
    pub hyperparameters: ModelConfig,
    pub data_info: TrainingDataInfo,
    pub performance: ModelPerformance,
    pub created_at: DateTime<Utc>,
    /// Crate version that produced the model
    pub version: String,
}

impl Model {
    /// Stamp a new record with a fresh id and creation time
    pub fn new(
        family: ModelFamily,
        parameters: ModelParameters,
        hyperparameters: ModelConfig,
        data_info: TrainingDataInfo,
        performance: ModelPerformance,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            family,
            parameters,
            hyperparameters,
            data_info,
            performance,
            created_at: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn n_features(&self) -> usize {
        self.data_info.feature_names.len()
    }

    /// Save the model to a JSON file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a model from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let model: Self = serde_json::from_str(&json)?;
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn clustering_model() -> Model {
        Model::new(
            ModelFamily::KMeans,
            ModelParameters::Clustering {
                centroids: array![[0.0, 1.0], [2.0, 3.0]],
            },
            ModelConfig::Clustering(ClusteringParams::default()),
            TrainingDataInfo {
                feature_names: vec!["a".to_string(), "b".to_string()],
                target_name: None,
                split_ratio: 1.0,
                n_samples: 4,
            },
            ModelPerformance::clustering(1.5, 0.7),
        )
    }

    #[test]
    fn test_payload_family_match() {
        let payload = ModelParameters::NaiveBayes(GaussianNaiveBayes::new());
        assert!(payload.matches(ModelFamily::NaiveBayes));
        assert!(!payload.matches(ModelFamily::Svm));
        let centroids = ModelParameters::Clustering { centroids: array![[0.0]] };
        assert!(centroids.matches(ModelFamily::Hierarchical));
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(clustering_model().id, clustering_model().id);
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let model = clustering_model();
        model.save(&path).unwrap();

        let loaded = Model::load(&path).unwrap();
        assert_eq!(loaded.id, model.id);
        assert_eq!(loaded.family, ModelFamily::KMeans);
        assert_eq!(loaded.data_info, model.data_info);
        assert_eq!(loaded.performance, model.performance);
        assert_eq!(loaded.version, env!("CARGO_PKG_VERSION"));
    }
}
