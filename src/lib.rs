//! statcore - statistical model training and prediction engine
//!
//! Self-contained implementations of linear and logistic regression,
//! decision trees and random forests, gradient boosting, a feed-forward
//! network, an RBF kernel margin classifier, Gaussian naive Bayes, k-means
//! and single-linkage clustering, and k-fold grid search. `ndarray` is only
//! the container type; the numerics live in this crate.
//!
//! # Modules
//!
//! ## Core
//! - [`linalg`] - Gaussian elimination and normal equations
//! - [`data`] - Feature tables and target validation
//! - [`training`] - Trainers, evaluator, clustering and cross-validation
//! - [`inference`] - Prediction dispatch across model families
//!
//! ## Engine
//! - [`engine`] - Public facade over training, prediction and the registry
//! - [`registry`] - Thread-safe model registry
//! - [`monitoring`] - Metrics sink and error reporter collaborators
//! - [`config`] - Engine configuration
//!
//! ## Services
//! - [`cli`] - Command-line interface

pub mod error;

pub mod data;
pub mod linalg;
pub mod utils;

pub mod inference;
pub mod training;

pub mod config;
pub mod engine;
pub mod monitoring;
pub mod registry;

pub mod cli;

pub use error::{EngineError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{EngineError, Result};

    pub use crate::config::EngineConfig;
    pub use crate::data::FeatureTable;
    pub use crate::engine::{ClusteringResult, CrossValidationResult, Engine};
    pub use crate::registry::ModelRegistry;

    pub use crate::training::{
        ClusteringParams, DecisionTreeConfig, GradientBoostingConfig, HierarchicalConfig, Hyperparameters,
        KMeansConfig, LinearRegressionConfig, LogisticRegressionConfig, MLPConfig, Model, ModelFamily,
        ModelPerformance, RandomForestConfig, SVMConfig,
    };

    pub use crate::inference::PredictionResult;

    pub use crate::monitoring::{ErrorReporter, MetricsSink, PerformanceMetrics, TracingErrorReporter};

    pub use crate::utils::CancellationToken;
}
