//! Public engine facade
//!
//! Every public call is timed through the [`MetricsSink`] and every failure
//! is routed through the [`ErrorReporter`] before it reaches the caller.

use crate::config::EngineConfig;
use crate::data::{validate_targets, FeatureTable};
use crate::error::Result;
use crate::inference::{dispatch, InferenceEngine, PredictionResult};
use crate::monitoring::{ErrorReporter, MetricsSink, PerformanceMetrics, TracingErrorReporter};
use crate::registry::ModelRegistry;
use crate::training::{
    fit_clusters, CandidateScore, ClusteringParams, CrossValidator, Hyperparameters, Model, ModelConfig,
    ModelFamily, ModelParameters, ModelPerformance, TrainEngine, TrainingDataInfo,
};
use crate::utils::cancel::CancellationToken;
use ndarray::{s, Array1, Array2};
use rayon::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Output of [`Engine::cluster`]
#[derive(Debug, Clone, Serialize)]
pub struct ClusteringResult {
    pub labels: Vec<usize>,
    pub centroids: Array2<f64>,
    pub inertia: f64,
    pub silhouette_score: f64,
    pub inertia_history: Vec<f64>,
    /// Registered centroid model; usable with [`Engine::predict`]
    pub model: Arc<Model>,
}

/// Output of [`Engine::cross_validate`]
#[derive(Debug, Clone, Serialize)]
pub struct CrossValidationResult {
    /// Held-out scores of the winning configuration, one per fold
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
    pub std_score: f64,
    /// Winner retrained on the full data and registered
    pub best_model: Arc<Model>,
    pub best_hyperparameters: Hyperparameters,
    /// Position of the winner in the grid
    pub best_index: usize,
    pub candidates: Vec<CandidateScore>,
}

/// Training, prediction, clustering and cross-validation over a shared registry
pub struct Engine {
    config: EngineConfig,
    registry: ModelRegistry,
    metrics: Arc<dyn MetricsSink>,
    reporter: Arc<dyn ErrorReporter>,
    cancel: CancellationToken,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: EngineConfig) -> Self {
        Self {
            registry: ModelRegistry::with_capacity(config.registry_capacity),
            metrics: Arc::new(PerformanceMetrics::new(config.metrics_window)),
            reporter: Arc::new(TracingErrorReporter),
            cancel: CancellationToken::new(),
            config,
        }
    }

    pub fn with_metrics_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.metrics = sink;
        self
    }

    pub fn with_error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Share a token with the caller; cancelling it aborts in-flight calls
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    fn instrumented<T>(&self, name: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let start = Instant::now();
        let result = self.cancel.check().and_then(|_| f());
        self.metrics.record_metric(name, start.elapsed().as_secs_f64());
        if let Err(e) = &result {
            self.reporter.handle_error(e, name);
        }
        result
    }

    /// Train one model and register it.
    ///
    /// The family is the `Hyperparameters` variant. With a positive
    /// `validation_split` the tail of the table is held out and the
    /// performance snapshot is computed on it; otherwise on the training rows.
    pub fn train_model(
        &self,
        table: &FeatureTable,
        targets: &[f64],
        target_name: &str,
        hyperparameters: Hyperparameters,
    ) -> Result<Arc<Model>> {
        self.instrumented("train_model", || {
            let n_train = self.training_rows(table.n_samples());
            let model = self.fit_model(table, targets, target_name, hyperparameters, n_train)?;
            Ok(self.registry.insert(model))
        })
    }

    /// Fit on the first `n_train` rows and score on the rest, or on the
    /// training rows when nothing is left over
    fn fit_model(
        &self,
        table: &FeatureTable,
        targets: &[f64],
        target_name: &str,
        hyperparameters: Hyperparameters,
        n_train: usize,
    ) -> Result<Model> {
        validate_targets(table, targets)?;
        let start = Instant::now();
        let family = hyperparameters.family();

        let n_samples = table.n_samples();
        let n_train = n_train.min(n_samples);
        let x = table.data();
        let y = Array1::from(targets.to_vec());

        let x_train = x.slice(s![..n_train, ..]).to_owned();
        let y_train = y.slice(s![..n_train]).to_owned();

        let trainer = TrainEngine::new(hyperparameters.clone()).with_cancellation(self.cancel.clone());
        let parameters = trainer.fit(&x_train, &y_train)?;

        let (x_eval, y_eval) = if n_train < n_samples {
            (x.slice(s![n_train.., ..]).to_owned(), &targets[n_train..])
        } else {
            (x_train, targets)
        };
        let performance = snapshot(family, &parameters, &x_eval, y_eval)?;

        let model = Model::new(
            family,
            parameters,
            ModelConfig::Supervised(hyperparameters),
            TrainingDataInfo {
                feature_names: table.feature_names().to_vec(),
                target_name: Some(target_name.to_string()),
                split_ratio: n_train as f64 / n_samples as f64,
                n_samples,
            },
            performance,
        );

        info!(
            model_id = %model.id,
            family = %family,
            n_samples,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "model trained"
        );
        Ok(model)
    }

    /// Rows used for fitting; the remainder is the validation tail
    fn training_rows(&self, n_samples: usize) -> usize {
        let holdout = (n_samples as f64 * self.config.validation_split).floor() as usize;
        if holdout == 0 || holdout >= n_samples {
            n_samples
        } else {
            n_samples - holdout
        }
    }

    /// Predict with a registered model
    pub fn predict(&self, model_id: &str, table: &FeatureTable) -> Result<PredictionResult> {
        self.instrumented("predict", || {
            let model = self.registry.get(model_id)?;
            let result = InferenceEngine::new(&model)?.predict(table)?;
            debug!(model_id, n_samples = table.n_samples(), "prediction served");
            Ok(result)
        })
    }

    /// Cluster the table and register a centroid model
    pub fn cluster(&self, table: &FeatureTable, params: ClusteringParams) -> Result<ClusteringResult> {
        self.instrumented("cluster", || {
            let start = Instant::now();
            let fit = fit_clusters(table.data(), &params, &self.cancel)?;
            let family = params.family();

            let model = self.registry.insert(Model::new(
                family,
                ModelParameters::Clustering {
                    centroids: fit.centroids.clone(),
                },
                ModelConfig::Clustering(params),
                TrainingDataInfo {
                    feature_names: table.feature_names().to_vec(),
                    target_name: None,
                    split_ratio: 1.0,
                    n_samples: table.n_samples(),
                },
                ModelPerformance::clustering(fit.inertia, fit.silhouette),
            ));

            info!(
                model_id = %model.id,
                family = %family,
                n_samples = table.n_samples(),
                inertia = fit.inertia,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "clustering finished"
            );

            Ok(ClusteringResult {
                labels: fit.labels,
                centroids: fit.centroids,
                inertia: fit.inertia,
                silhouette_score: fit.silhouette,
                inertia_history: fit.inertia_history,
                model,
            })
        })
    }

    /// K-fold grid search; the winner is retrained on all rows and registered.
    /// An empty grid searches the family default only.
    pub fn cross_validate(
        &self,
        table: &FeatureTable,
        targets: &[f64],
        target_name: &str,
        family: ModelFamily,
        folds: usize,
        grid: Vec<Hyperparameters>,
    ) -> Result<CrossValidationResult> {
        self.instrumented("cross_validate", || {
            validate_targets(table, targets)?;
            let y = Array1::from(targets.to_vec());

            let outcome = CrossValidator::new(family, folds)
                .with_cancellation(self.cancel.clone())
                .search(table.data(), &y, grid)?;

            info!(
                family = %family,
                best_index = outcome.best_index,
                mean_score = outcome.best_results.mean_score,
                "grid search finished"
            );

            let best_model = self.fit_model(
                table,
                targets,
                target_name,
                outcome.best_hyperparameters.clone(),
                table.n_samples(),
            )?;
            let best_model = self.registry.insert(best_model);

            Ok(CrossValidationResult {
                fold_scores: outcome.best_results.scores,
                mean_score: outcome.best_results.mean_score,
                std_score: outcome.best_results.std_score,
                best_model,
                best_hyperparameters: outcome.best_hyperparameters,
                best_index: outcome.best_index,
                candidates: outcome.candidates,
            })
        })
    }

    /// Import a model, e.g. one read with [`Model::load`]
    pub fn register(&self, model: Model) -> Arc<Model> {
        info!(model_id = %model.id, family = %model.family, "model registered");
        self.registry.insert(model)
    }

    /// Train several configurations on the same data in parallel.
    /// Results come back in input order.
    pub fn train_batch(
        &self,
        table: &FeatureTable,
        targets: &[f64],
        target_name: &str,
        configs: Vec<Hyperparameters>,
    ) -> Vec<Result<Arc<Model>>> {
        configs
            .into_par_iter()
            .map(|hp| self.train_model(table, targets, target_name, hp))
            .collect()
    }

    /// Predict the same table with several models in parallel.
    /// Results come back in input order.
    pub fn predict_batch(&self, model_ids: &[String], table: &FeatureTable) -> Vec<Result<PredictionResult>> {
        model_ids.par_iter().map(|id| self.predict(id, table)).collect()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::with_valid_config(EngineConfig::default())
    }
}

/// Score a fitted payload on evaluation rows
fn snapshot(
    family: ModelFamily,
    parameters: &ModelParameters,
    x: &Array2<f64>,
    y: &[f64],
) -> Result<ModelPerformance> {
    let raw = dispatch(family, parameters, x)?;
    let proba = if family.has_probabilities() {
        raw.positive_proba.as_ref().map(|p| p.to_vec())
    } else {
        None
    };
    Ok(ModelPerformance::evaluate(y, &raw.predictions.to_vec(), proba.as_deref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::monitoring::RecordingErrorReporter;
    use crate::training::{KMeansConfig, LinearRegressionConfig};

    fn line_table() -> (FeatureTable, Vec<f64>) {
        let xs: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 2.0 * x + 3.0).collect();
        (FeatureTable::from_columns(vec![xs], vec!["x".to_string()]).unwrap(), ys)
    }

    #[test]
    fn test_train_and_predict() {
        let engine = Engine::default();
        let (table, ys) = line_table();
        let model = engine
            .train_model(&table, &ys, "y", Hyperparameters::LinearRegression(LinearRegressionConfig::default()))
            .unwrap();

        assert_eq!(engine.registry().len(), 1);
        assert_eq!(model.data_info.split_ratio, 1.0);
        let r2 = model.performance.regression.as_ref().unwrap().r2;
        assert!((r2 - 1.0).abs() < 1e-9);

        let result = engine.predict(&model.id, &table).unwrap();
        assert!((result.predictions[4] - 11.0).abs() < 1e-6);
    }

    #[test]
    fn test_validation_split_holds_out_tail() {
        let engine = Engine::new(EngineConfig::new().with_validation_split(0.2)).unwrap();
        let (table, ys) = line_table();
        let model = engine
            .train_model(&table, &ys, "y", Hyperparameters::LinearRegression(LinearRegressionConfig::default()))
            .unwrap();
        assert!((model.data_info.split_ratio - 0.8).abs() < 1e-12);
        assert_eq!(model.data_info.n_samples, 10);
    }

    #[test]
    fn test_unknown_model_is_reported() {
        let reporter = Arc::new(RecordingErrorReporter::new());
        let metrics = Arc::new(PerformanceMetrics::default());
        let engine = Engine::default()
            .with_error_reporter(reporter.clone())
            .with_metrics_sink(metrics.clone());
        let (table, _) = line_table();

        let result = engine.predict("missing", &table);
        assert!(matches!(result, Err(EngineError::ModelNotFound(_))));
        assert_eq!(reporter.records(), vec![("predict".to_string(), "model_not_found")]);
        assert_eq!(metrics.count("predict"), 1);
    }

    #[test]
    fn test_cluster_registers_model() {
        let engine = Engine::default();
        let table = FeatureTable::from_rows(
            vec![vec![0.0], vec![0.1], vec![10.0], vec![10.1]],
            vec!["x".to_string()],
        )
        .unwrap();
        let params = ClusteringParams::KMeans(KMeansConfig {
            n_clusters: 1,
            ..Default::default()
        });

        let result = engine.cluster(&table, params).unwrap();
        assert_eq!(result.labels, vec![0, 0, 0, 0]);
        assert!(engine.registry().contains(&result.model.id));
        assert!(result.model.performance.clustering.is_some());
    }

    #[test]
    fn test_cancelled_engine_rejects_calls() {
        let token = CancellationToken::new();
        let engine = Engine::default().with_cancellation(token.clone());
        token.cancel();
        let (table, ys) = line_table();

        let result = engine.train_model(&table, &ys, "y", Hyperparameters::NaiveBayes);
        assert!(matches!(result, Err(EngineError::Cancelled)));
        assert!(engine.registry().is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = Engine::new(EngineConfig::new().with_validation_split(1.0));
        assert!(matches!(result, Err(EngineError::ConfigError(_))));
    }
}
