//! statcore CLI Module
//!
//! Command-line interface for training, prediction, clustering and
//! cross-validation over JSON dataset files.

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::training::{ClusteringParams, HierarchicalConfig, Hyperparameters, KMeansConfig, Model, ModelFamily};
use crate::utils::data_loader::{read_json, Dataset};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn metric_row(name: &str, value: f64) {
    println!("  {:<16} {}", muted(name), format!("{:.4}", value).white().bold());
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "statcore")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Statistical model training, prediction, clustering and cross-validation")]
#[command(long_about = None)]
pub struct Cli {
    /// Engine configuration file (JSON)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train a model on a dataset
    Train {
        /// Dataset file (JSON)
        #[arg(short, long)]
        data: PathBuf,

        /// Model family (linear_regression, logistic_regression, decision_tree, ...)
        #[arg(short, long, default_value = "random_forest")]
        family: ModelFamily,

        /// Hyperparameter file (JSON, tagged with the family)
        #[arg(long)]
        params: Option<PathBuf>,

        /// Output model file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Make predictions using a saved model
    Predict {
        /// Saved model file
        #[arg(short, long)]
        model: PathBuf,

        /// Dataset file (JSON)
        #[arg(short, long)]
        data: PathBuf,

        /// Output predictions file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Cluster a dataset
    Cluster {
        /// Dataset file (JSON)
        #[arg(short, long)]
        data: PathBuf,

        /// Algorithm (k_means or hierarchical)
        #[arg(short, long, default_value = "k_means")]
        algorithm: ModelFamily,

        /// Number of clusters
        #[arg(short = 'k', long, default_value = "3")]
        n_clusters: usize,

        /// Output file for labels and centroids
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// K-fold grid search
    Cv {
        /// Dataset file (JSON)
        #[arg(short, long)]
        data: PathBuf,

        /// Model family
        #[arg(short, long)]
        family: ModelFamily,

        /// Number of folds
        #[arg(long, default_value = "5")]
        folds: usize,

        /// Grid file (JSON array of hyperparameters); defaults to the family default
        #[arg(long)]
        grid: Option<PathBuf>,

        /// Output file for the retrained best model
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Load the engine configuration named on the command line, or the default
pub fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

/// Dispatch a parsed command
pub fn run(cli: Cli, config: EngineConfig) -> anyhow::Result<()> {
    let engine = Engine::new(config)?;

    match cli.command {
        Commands::Train { data, family, params, output } => {
            cmd_train(&engine, &data, family, params.as_deref(), output.as_deref())
        }
        Commands::Predict { model, data, output } => cmd_predict(&engine, &model, &data, output.as_deref()),
        Commands::Cluster { data, algorithm, n_clusters, output } => {
            cmd_cluster(&engine, &data, algorithm, n_clusters, output.as_deref())
        }
        Commands::Cv { data, family, folds, grid, output } => {
            cmd_cv(&engine, &data, family, folds, grid.as_deref(), output.as_deref())
        }
    }
}

// ─── Data loading ──────────────────────────────────────────────────────────────

fn load_dataset(path: &Path) -> anyhow::Result<Dataset> {
    step_run("Loading data");
    let start = Instant::now();
    let dataset = Dataset::load(path).with_context(|| format!("failed to read dataset {}", path.display()))?;
    let table = dataset.to_table()?;
    step_done(&format!(
        "{} rows × {} cols in {:?}",
        table.n_samples(),
        table.n_features(),
        start.elapsed()
    ));
    Ok(dataset)
}

fn write_json<T: serde::Serialize>(value: &T, path: &Path) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(
    engine: &Engine,
    data_path: &Path,
    family: ModelFamily,
    params_path: Option<&Path>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Train");

    let dataset = load_dataset(data_path)?;
    let table = dataset.to_table()?;
    let targets = dataset.require_targets()?;

    let hyperparameters = match params_path {
        Some(path) => read_json::<Hyperparameters>(path)?,
        None => Hyperparameters::default_for(family)
            .with_context(|| format!("{} is a clustering family; use `cluster`", family))?,
    };
    if hyperparameters.family() != family {
        anyhow::bail!("hyperparameters are for {}, expected {}", hyperparameters.family(), family);
    }

    step_run(&format!("Training {}", family.to_string().cyan()));
    let start = Instant::now();
    let model = engine.train_model(&table, targets, dataset.target_name_or_default(), hyperparameters)?;
    step_done(&format!("{:?}", start.elapsed()));

    println!();
    println!("  {:<16} {}", muted("Model id"), model.id.white());
    if let Some(r) = &model.performance.regression {
        metric_row("R²", r.r2);
        metric_row("RMSE", r.rmse);
    }
    if let Some(c) = &model.performance.classification {
        metric_row("Accuracy", c.accuracy);
        metric_row("AUC", c.auc);
    }

    if let Some(path) = output {
        model.save(path)?;
        println!("  {} {}", ok("saved"), path.display());
    }
    println!();
    Ok(())
}

pub fn cmd_predict(engine: &Engine, model_path: &Path, data_path: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    section("Predict");

    step_run("Loading model");
    let model = Model::load(model_path).with_context(|| format!("failed to load model {}", model_path.display()))?;
    let model = engine.register(model);
    step_done(&format!("{} ({})", model.family, model.id));

    let dataset = load_dataset(data_path)?;
    let table = dataset.to_table()?;

    let result = engine.predict(&model.id, &table)?;

    println!();
    println!("  {:>6} {:>14} {:>12}", muted("#"), muted("prediction"), muted("confidence"));
    println!("  {}", dim(&"─".repeat(34)));
    for (i, (p, c)) in result.predictions.iter().zip(&result.confidence).enumerate().take(20) {
        println!("  {:>6} {:>14.4} {:>12.4}", i, p, c);
    }
    if result.predictions.len() > 20 {
        println!("  {}", dim(&format!("... {} more", result.predictions.len() - 20)));
    }

    if let Some(path) = output {
        write_json(&result, path)?;
        println!("  {} {}", ok("saved"), path.display());
    }
    println!();
    Ok(())
}

pub fn cmd_cluster(
    engine: &Engine,
    data_path: &Path,
    algorithm: ModelFamily,
    n_clusters: usize,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Cluster");

    let params = match algorithm {
        ModelFamily::KMeans => ClusteringParams::KMeans(KMeansConfig {
            n_clusters,
            ..Default::default()
        }),
        ModelFamily::Hierarchical => ClusteringParams::Hierarchical(HierarchicalConfig { n_clusters }),
        other => anyhow::bail!("{} is not a clustering algorithm", other),
    };

    let dataset = load_dataset(data_path)?;
    let table = dataset.to_table()?;

    step_run(&format!("Clustering with {}", algorithm.to_string().cyan()));
    let start = Instant::now();
    let result = engine.cluster(&table, params)?;
    step_done(&format!("{:?}", start.elapsed()));

    println!();
    metric_row("Inertia", result.inertia);
    metric_row("Silhouette", result.silhouette_score);
    let mut sizes = vec![0usize; result.centroids.nrows()];
    for &label in &result.labels {
        sizes[label] += 1;
    }
    for (cluster, size) in sizes.iter().enumerate() {
        println!("  {:<16} {}", muted(&format!("cluster {}", cluster)), size);
    }

    if let Some(path) = output {
        write_json(&result, path)?;
        println!("  {} {}", ok("saved"), path.display());
    }
    println!();
    Ok(())
}

pub fn cmd_cv(
    engine: &Engine,
    data_path: &Path,
    family: ModelFamily,
    folds: usize,
    grid_path: Option<&Path>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Cross-validate");

    let dataset = load_dataset(data_path)?;
    let table = dataset.to_table()?;
    let targets = dataset.require_targets()?;
    let grid: Vec<Hyperparameters> = match grid_path {
        Some(path) => read_json(path)?,
        None => Vec::new(),
    };

    step_run(&format!("Searching {} ({} folds)", family.to_string().cyan(), folds));
    let start = Instant::now();
    let result = engine.cross_validate(&table, targets, dataset.target_name_or_default(), family, folds, grid)?;
    step_done(&format!("{:?}", start.elapsed()));

    let metric_name = if family.is_classifier() { "Accuracy" } else { "R²" };
    println!();
    println!("  {:<10} {:>10} {:>10}", muted("Candidate"), muted(metric_name), muted("Std"));
    println!("  {}", dim(&"─".repeat(32)));
    for candidate in &result.candidates {
        match (&candidate.results, &candidate.error) {
            (Some(r), _) => println!("  {:<10} {:>10.4} {:>10.4}", candidate.index, r.mean_score, r.std_score),
            (None, Some(e)) => println!("  {:<10} {}", candidate.index, format!("err: {}", e).red()),
            (None, None) => {}
        }
    }

    println!();
    println!(
        "  {} {} {} {:.4}",
        ok("best"),
        format!("#{}", result.best_index).white().bold(),
        muted(&format!("{}:", metric_name)),
        result.mean_score
    );

    if let Some(path) = output {
        result.best_model.save(path)?;
        println!("  {} {}", ok("saved"), path.display());
    }
    println!();
    Ok(())
}
