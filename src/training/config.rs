//! Model families and per-family hyperparameters

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::decision_tree::DecisionTreeConfig;
use super::gradient_boosting::GradientBoostingConfig;
use super::linear_models::{LinearRegressionConfig, LogisticRegressionConfig};
use super::neural_network::MLPConfig;
use super::random_forest::RandomForestConfig;
use super::svm::SVMConfig;

/// Type of model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    /// Ordinary least squares
    LinearRegression,
    /// Binary logistic regression
    LogisticRegression,
    /// Regression tree
    DecisionTree,
    /// Bagged regression trees
    RandomForest,
    /// Boosted regression trees
    GradientBoosting,
    /// Feed-forward regressor
    NeuralNetwork,
    /// RBF kernel margin classifier
    Svm,
    /// Gaussian naive Bayes
    NaiveBayes,
    /// Partitional clustering
    KMeans,
    /// Single-linkage agglomerative clustering
    Hierarchical,
}

impl ModelFamily {
    pub const SUPERVISED: [ModelFamily; 8] = [
        ModelFamily::LinearRegression,
        ModelFamily::LogisticRegression,
        ModelFamily::DecisionTree,
        ModelFamily::RandomForest,
        ModelFamily::GradientBoosting,
        ModelFamily::NeuralNetwork,
        ModelFamily::Svm,
        ModelFamily::NaiveBayes,
    ];

    pub fn is_clustering(&self) -> bool {
        matches!(self, ModelFamily::KMeans | ModelFamily::Hierarchical)
    }

    /// Families scored by accuracy during cross-validation
    pub fn is_classifier(&self) -> bool {
        matches!(
            self,
            ModelFamily::LogisticRegression | ModelFamily::NaiveBayes | ModelFamily::Svm
        )
    }

    /// Families that carry classification metrics and class probabilities
    pub fn has_probabilities(&self) -> bool {
        matches!(self, ModelFamily::LogisticRegression | ModelFamily::NaiveBayes)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFamily::LinearRegression => "linear_regression",
            ModelFamily::LogisticRegression => "logistic_regression",
            ModelFamily::DecisionTree => "decision_tree",
            ModelFamily::RandomForest => "random_forest",
            ModelFamily::GradientBoosting => "gradient_boosting",
            ModelFamily::NeuralNetwork => "neural_network",
            ModelFamily::Svm => "svm",
            ModelFamily::NaiveBayes => "naive_bayes",
            ModelFamily::KMeans => "k_means",
            ModelFamily::Hierarchical => "hierarchical",
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelFamily {
    type Err = String;

    /// Accepts the snake_case names, plus `kmeans` for k-means
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase().replace('-', "_");
        if name == "kmeans" {
            return Ok(ModelFamily::KMeans);
        }
        ModelFamily::SUPERVISED
            .iter()
            .chain(&[ModelFamily::KMeans, ModelFamily::Hierarchical])
            .find(|f| f.as_str() == name)
            .copied()
            .ok_or_else(|| format!("unknown model family '{}'", s))
    }
}

/// Hyperparameters for one supervised training run; the variant selects the family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", content = "params", rename_all = "snake_case")]
pub enum Hyperparameters {
    LinearRegression(LinearRegressionConfig),
    LogisticRegression(LogisticRegressionConfig),
    DecisionTree(DecisionTreeConfig),
    RandomForest(RandomForestConfig),
    GradientBoosting(GradientBoostingConfig),
    NeuralNetwork(MLPConfig),
    Svm(SVMConfig),
    NaiveBayes,
}

impl Hyperparameters {
    pub fn family(&self) -> ModelFamily {
        match self {
            Hyperparameters::LinearRegression(_) => ModelFamily::LinearRegression,
            Hyperparameters::LogisticRegression(_) => ModelFamily::LogisticRegression,
            Hyperparameters::DecisionTree(_) => ModelFamily::DecisionTree,
            Hyperparameters::RandomForest(_) => ModelFamily::RandomForest,
            Hyperparameters::GradientBoosting(_) => ModelFamily::GradientBoosting,
            Hyperparameters::NeuralNetwork(_) => ModelFamily::NeuralNetwork,
            Hyperparameters::Svm(_) => ModelFamily::Svm,
            Hyperparameters::NaiveBayes => ModelFamily::NaiveBayes,
        }
    }

    /// Default hyperparameters for a supervised family (`None` for clustering)
    pub fn default_for(family: ModelFamily) -> Option<Self> {
        Some(match family {
            ModelFamily::LinearRegression => Hyperparameters::LinearRegression(Default::default()),
            ModelFamily::LogisticRegression => Hyperparameters::LogisticRegression(Default::default()),
            ModelFamily::DecisionTree => Hyperparameters::DecisionTree(Default::default()),
            ModelFamily::RandomForest => Hyperparameters::RandomForest(Default::default()),
            ModelFamily::GradientBoosting => Hyperparameters::GradientBoosting(Default::default()),
            ModelFamily::NeuralNetwork => Hyperparameters::NeuralNetwork(Default::default()),
            ModelFamily::Svm => Hyperparameters::Svm(Default::default()),
            ModelFamily::NaiveBayes => Hyperparameters::NaiveBayes,
            ModelFamily::KMeans | ModelFamily::Hierarchical => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_family() {
        for family in ModelFamily::SUPERVISED {
            let params = Hyperparameters::default_for(family).unwrap();
            assert_eq!(params.family(), family);
        }
        assert!(Hyperparameters::default_for(ModelFamily::KMeans).is_none());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{"family": "random_forest", "params": {"n_estimators": 5}}"#;
        let params: Hyperparameters = serde_json::from_str(json).unwrap();
        match params {
            Hyperparameters::RandomForest(config) => {
                assert_eq!(config.n_estimators, 5);
                assert_eq!(config.max_depth, Some(10));
            }
            other => panic!("unexpected variant {:?}", other),
        }

        let nb: Hyperparameters = serde_json::from_str(r#"{"family": "naive_bayes"}"#).unwrap();
        assert_eq!(nb.family(), ModelFamily::NaiveBayes);
    }

    #[test]
    fn test_family_roles() {
        assert!(ModelFamily::Svm.is_classifier());
        assert!(!ModelFamily::Svm.has_probabilities());
        assert!(ModelFamily::NaiveBayes.has_probabilities());
        assert!(ModelFamily::Hierarchical.is_clustering());
        assert_eq!(ModelFamily::KMeans.to_string(), "k_means");
    }

    #[test]
    fn test_parse_family() {
        assert_eq!("decision-tree".parse::<ModelFamily>(), Ok(ModelFamily::DecisionTree));
        assert_eq!("kmeans".parse::<ModelFamily>(), Ok(ModelFamily::KMeans));
        assert_eq!("SVM".parse::<ModelFamily>(), Ok(ModelFamily::Svm));
        assert!("knn".parse::<ModelFamily>().is_err());
    }
}
