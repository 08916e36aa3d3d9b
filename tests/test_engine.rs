//! Integration test: engine training, prediction and persistence

use statcore::monitoring::RecordingErrorReporter;
use statcore::prelude::*;
use std::sync::Arc;

fn line_table(n: usize) -> (FeatureTable, Vec<f64>) {
    let xs: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let ys: Vec<f64> = xs.iter().map(|x| 2.0 * x + 3.0).collect();
    (FeatureTable::from_columns(vec![xs], vec!["x".to_string()]).unwrap(), ys)
}

fn binary_table() -> (FeatureTable, Vec<f64>) {
    let xs: Vec<f64> = (0..10).map(|i| i as f64).collect();
    let ys: Vec<f64> = xs.iter().map(|&x| if x >= 5.0 { 1.0 } else { 0.0 }).collect();
    (FeatureTable::from_columns(vec![xs], vec!["x".to_string()]).unwrap(), ys)
}

#[test]
fn test_engine_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Engine>();
}

#[test]
fn test_linear_regression_recovers_line() {
    let engine = Engine::default();
    let (table, ys) = line_table(10);

    let model = engine
        .train_model(&table, &ys, "y", Hyperparameters::LinearRegression(LinearRegressionConfig::default()))
        .unwrap();
    assert_eq!(model.family, ModelFamily::LinearRegression);
    assert_eq!(model.data_info.target_name.as_deref(), Some("y"));

    let query = FeatureTable::from_columns(vec![vec![20.0, -1.0]], vec!["x".to_string()]).unwrap();
    let result = engine.predict(&model.id, &query).unwrap();

    assert_eq!(result.model_id, model.id);
    assert!((result.predictions[0] - 43.0).abs() < 1e-6);
    assert!((result.predictions[1] - 1.0).abs() < 1e-6);
    assert!(result.class_probabilities.is_none());
    assert!(result.feature_importance.contains_key("x"));
}

#[test]
fn test_logistic_regression_reports_classification_metrics() {
    let engine = Engine::default();
    let (table, ys) = binary_table();

    let model = engine
        .train_model(&table, &ys, "label", Hyperparameters::LogisticRegression(LogisticRegressionConfig::default()))
        .unwrap();

    let classification = model.performance.classification.as_ref().unwrap();
    assert_eq!(classification.auc, 1.0);
    assert_eq!(classification.confusion_matrix.total(), 10);

    let result = engine.predict(&model.id, &table).unwrap();
    let probabilities = result.class_probabilities.unwrap();
    for (pairs, confidence) in probabilities.iter().zip(&result.confidence) {
        let total: f64 = pairs.iter().map(|(_, p)| p).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!((0.0..=1.0).contains(confidence));
    }
}

#[test]
fn test_naive_bayes_probabilities() {
    let engine = Engine::default();
    let (table, ys) = binary_table();

    let model = engine.train_model(&table, &ys, "label", Hyperparameters::NaiveBayes).unwrap();
    assert!(model.performance.classification.is_some());

    let result = engine.predict(&model.id, &table).unwrap();
    assert_eq!(result.predictions[0], 0.0);
    assert_eq!(result.predictions[9], 1.0);
    assert_eq!(result.class_probabilities.unwrap()[0].len(), 2);
}

#[test]
fn test_forest_on_constant_target_is_certain() {
    let engine = Engine::default();
    let (table, _) = line_table(12);
    let ys = vec![5.0; 12];

    let model = engine
        .train_model(
            &table,
            &ys,
            "y",
            Hyperparameters::RandomForest(RandomForestConfig {
                n_estimators: 10,
                ..Default::default()
            }),
        )
        .unwrap();

    let result = engine.predict(&model.id, &table).unwrap();
    assert!(result.predictions.iter().all(|&p| (p - 5.0).abs() < 1e-12));
    assert!(result.confidence.iter().all(|&c| (c - 1.0).abs() < 1e-12));
}

#[test]
fn test_unrestricted_tree_memorizes() {
    let engine = Engine::default();
    let table = FeatureTable::from_rows(
        vec![vec![1.0, 5.0], vec![2.0, 3.0], vec![3.0, 8.0], vec![4.0, 1.0]],
        vec!["a".to_string(), "b".to_string()],
    )
    .unwrap();
    let ys = vec![3.2, -1.0, 7.5, 0.0];

    let model = engine
        .train_model(
            &table,
            &ys,
            "y",
            Hyperparameters::DecisionTree(DecisionTreeConfig {
                max_depth: None,
                ..Default::default()
            }),
        )
        .unwrap();

    let result = engine.predict(&model.id, &table).unwrap();
    assert_eq!(result.predictions, ys);
    assert!(result.confidence.iter().all(|&c| c == 1.0));
}

#[test]
fn test_tree_memorizes_targets_with_large_offset() {
    let engine = Engine::default();
    let (table, _) = line_table(4);
    let ys = vec![1e8, 1e8 + 1.0, 1e8, 1e8 + 1.0];

    let model = engine
        .train_model(
            &table,
            &ys,
            "y",
            Hyperparameters::DecisionTree(DecisionTreeConfig {
                max_depth: None,
                ..Default::default()
            }),
        )
        .unwrap();

    let result = engine.predict(&model.id, &table).unwrap();
    assert_eq!(result.predictions, ys);
}

#[test]
fn test_errors_are_reported_and_timed() {
    let reporter = Arc::new(RecordingErrorReporter::new());
    let metrics = Arc::new(PerformanceMetrics::default());
    let engine = Engine::default()
        .with_error_reporter(reporter.clone())
        .with_metrics_sink(metrics.clone());
    let (table, ys) = line_table(6);

    let short = &ys[..3];
    let result = engine.train_model(&table, short, "y", Hyperparameters::NaiveBayes);
    assert!(matches!(result, Err(EngineError::InvalidInput(_))));

    let result = engine.predict("no-such-model", &table);
    assert!(matches!(result, Err(EngineError::ModelNotFound(_))));

    let model = engine
        .train_model(&table, &ys, "y", Hyperparameters::LinearRegression(LinearRegressionConfig::default()))
        .unwrap();
    let wide = FeatureTable::from_rows(vec![vec![1.0, 2.0]], vec!["x".to_string(), "z".to_string()]).unwrap();
    assert!(matches!(engine.predict(&model.id, &wide), Err(EngineError::InvalidInput(_))));

    let kinds: Vec<&str> = reporter.records().iter().map(|(_, kind)| *kind).collect();
    assert_eq!(kinds, vec!["invalid_input", "model_not_found", "invalid_input"]);
    assert_eq!(metrics.count("train_model"), 2);
    assert_eq!(metrics.count("predict"), 2);
}

#[test]
fn test_logistic_rejects_non_binary_targets() {
    let engine = Engine::default();
    let (table, _) = line_table(4);
    // A label of 2 is not a binary class
    let result = engine.train_model(
        &table,
        &[0.0, 1.0, 2.0, 1.0],
        "label",
        Hyperparameters::LogisticRegression(LogisticRegressionConfig::default()),
    );
    assert!(matches!(result, Err(EngineError::InvalidInput(_))));
    assert!(engine.registry().is_empty());
}

#[test]
fn test_batches_keep_input_order() {
    let engine = Engine::default();
    let (table, ys) = line_table(12);
    let configs = vec![
        Hyperparameters::LinearRegression(LinearRegressionConfig::default()),
        Hyperparameters::DecisionTree(DecisionTreeConfig::default()),
        Hyperparameters::GradientBoosting(GradientBoostingConfig {
            n_estimators: 5,
            ..Default::default()
        }),
    ];

    let models: Vec<Arc<Model>> = engine
        .train_batch(&table, &ys, "y", configs)
        .into_iter()
        .collect::<Result<_>>()
        .unwrap();
    let families: Vec<ModelFamily> = models.iter().map(|m| m.family).collect();
    assert_eq!(
        families,
        vec![ModelFamily::LinearRegression, ModelFamily::DecisionTree, ModelFamily::GradientBoosting]
    );

    let ids: Vec<String> = models.iter().map(|m| m.id.clone()).collect();
    let results = engine.predict_batch(&ids, &table);
    for (id, result) in ids.iter().zip(results) {
        assert_eq!(&result.unwrap().model_id, id);
    }
}

#[test]
fn test_saved_model_predicts_identically() {
    let engine = Engine::default();
    let (table, ys) = line_table(10);
    let model = engine
        .train_model(&table, &ys, "y", Hyperparameters::NeuralNetwork(MLPConfig::default()))
        .unwrap();
    let before = engine.predict(&model.id, &table).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.json");
    model.save(&path).unwrap();

    let other = Engine::default();
    let loaded = other.register(Model::load(&path).unwrap());
    assert_eq!(loaded.id, model.id);

    let after = other.predict(&loaded.id, &table).unwrap();
    for (b, a) in before.predictions.iter().zip(&after.predictions) {
        assert!((b - a).abs() < 1e-9);
    }
}

#[test]
fn test_registry_capacity_evicts_oldest_model() {
    let engine = Engine::new(EngineConfig::new().with_registry_capacity(1)).unwrap();
    let (table, ys) = line_table(6);

    let a = engine
        .train_model(&table, &ys, "y", Hyperparameters::LinearRegression(LinearRegressionConfig::default()))
        .unwrap();
    let b = engine
        .train_model(&table, &ys, "y", Hyperparameters::DecisionTree(DecisionTreeConfig::default()))
        .unwrap();

    assert!(matches!(engine.predict(&a.id, &table), Err(EngineError::ModelNotFound(_))));
    assert!(engine.predict(&b.id, &table).is_ok());
}
