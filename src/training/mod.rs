//! Model training module
//!
//! Provides training functionality for:
//! - Linear models (OLS, logistic regression)
//! - Decision trees and Random Forests
//! - Gradient boosting
//! - Neural networks (MLP)
//! - Kernel margin classifier (RBF SMO)
//! - Gaussian Naive Bayes
//! - Clustering (KMeans, single-linkage agglomerative)
//! - K-fold cross-validation with grid search

pub mod clustering;
pub mod config;
pub mod cross_validation;
pub mod decision_tree;
pub mod engine;
pub mod gradient_boosting;
pub mod linear_models;
pub mod metrics;
pub mod models;
pub mod naive_bayes;
pub mod neural_network;
pub mod random_forest;
pub mod svm;

pub use clustering::{
    fit_clusters, silhouette_score, AgglomerativeClustering, ClusterFit, ClusteringParams, HierarchicalConfig, KMeans,
    KMeansConfig,
};
pub use config::{Hyperparameters, ModelFamily};
pub use cross_validation::{k_fold_split, CVResults, CVSplit, CandidateScore, CrossValidator, GridSearchOutcome};
pub use decision_tree::{DecisionTree, DecisionTreeConfig, TreeNode};
pub use engine::TrainEngine;
pub use gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
pub use linear_models::{
    LinearRegression, LinearRegressionConfig, LogisticRegression, LogisticRegressionConfig, LogisticSolver,
};
pub use metrics::{
    accuracy_score, r2_score, roc_auc, ClassificationMetrics, ClusteringMetrics, ConfusionMatrix, ModelPerformance,
    RegressionMetrics,
};
pub use models::{Model, ModelConfig, ModelParameters, TrainingDataInfo};
pub use naive_bayes::GaussianNaiveBayes;
pub use neural_network::{MLPConfig, MLPRegressor};
pub use random_forest::{ForestPrediction, RandomForest, RandomForestConfig};
pub use svm::{SVMClassifier, SVMConfig};
