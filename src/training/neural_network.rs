//! Neural Network (Multi-Layer Perceptron) implementation
//!
//! A feedforward regressor trained with per-sample SGD and backpropagation.
//! Hidden layers use ReLU, the single output unit is linear.

use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::utils::cancel::CancellationToken;

/// Neural Network configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MLPConfig {
    /// Hidden layer sizes
    pub hidden_layers: Vec<usize>,
    /// Learning rate
    pub learning_rate: f64,
    /// Number of epochs
    pub max_epochs: usize,
    /// Random seed
    pub random_state: u64,
}

impl Default for MLPConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![10],
            learning_rate: 0.01,
            max_epochs: 100,
            random_state: 42,
        }
    }
}

/// Multi-Layer Perceptron Regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MLPRegressor {
    config: MLPConfig,
    /// `weights[l]` has shape `(n_out, n_in)`
    weights: Vec<Array2<f64>>,
    biases: Vec<Array1<f64>>,
    /// Mean squared error per epoch
    loss_history: Vec<f64>,
    n_features: usize,
    is_fitted: bool,
}

impl Default for MLPRegressor {
    fn default() -> Self {
        Self::new(MLPConfig::default())
    }
}

#[inline]
fn relu(z: f64) -> f64 {
    z.max(0.0)
}

impl MLPRegressor {
    pub fn new(config: MLPConfig) -> Self {
        Self {
            config,
            weights: Vec::new(),
            biases: Vec::new(),
            loss_history: Vec::new(),
            n_features: 0,
            is_fitted: false,
        }
    }

    /// Fit the network
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.fit_cancellable(x, y, &CancellationToken::new())
    }

    /// Fit, checking `cancel` before each epoch
    pub fn fit_cancellable(&mut self, x: &Array2<f64>, y: &Array1<f64>, cancel: &CancellationToken) -> Result<()> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(EngineError::InvalidInput(format!(
                "y length = {}, expected {}",
                y.len(),
                n_samples
            )));
        }
        if n_samples == 0 {
            return Err(EngineError::InvalidInput("no training samples".to_string()));
        }
        if self.config.hidden_layers.iter().any(|&h| h == 0) {
            return Err(EngineError::InvalidInput("hidden layer sizes must be positive".to_string()));
        }

        self.n_features = x.ncols();
        self.initialize_weights();
        self.loss_history.clear();

        let lr = self.config.learning_rate;
        for epoch in 0..self.config.max_epochs {
            cancel.check()?;

            let mut epoch_loss = 0.0;
            for (row, &target) in x.outer_iter().zip(y.iter()) {
                let activations = self.forward(row);
                let output = activations.last().map(|a| a[0]).unwrap_or(0.0);
                let error = output - target;
                epoch_loss += error * error;
                self.backward(&activations, error, lr);
            }

            let mse = epoch_loss / n_samples as f64;
            if !mse.is_finite() {
                return Err(EngineError::TrainingFailed(format!(
                    "network loss diverged at epoch {}",
                    epoch
                )));
            }
            self.loss_history.push(mse);
        }

        self.is_fitted = true;
        tracing::debug!(
            epochs = self.loss_history.len(),
            final_loss = self.loss_history.last().copied().unwrap_or(0.0),
            "network fitted"
        );
        Ok(())
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(EngineError::InvalidModel("network is not fitted".to_string()));
        }
        if x.ncols() != self.n_features {
            return Err(EngineError::InvalidInput(format!(
                "network expects {} features, got {}",
                self.n_features,
                x.ncols()
            )));
        }
        Ok(x
            .outer_iter()
            .map(|row| self.forward(row).last().map(|a| a[0]).unwrap_or(0.0))
            .collect())
    }

    pub fn loss_history(&self) -> &[f64] {
        &self.loss_history
    }

    /// Layer sizes including input and output
    pub fn layer_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![self.n_features];
        sizes.extend(self.config.hidden_layers.iter().copied());
        sizes.push(1);
        sizes
    }

    /// Xavier uniform initialization
    fn initialize_weights(&mut self) {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);
        let sizes = self.layer_sizes();

        self.weights.clear();
        self.biases.clear();
        for pair in sizes.windows(2) {
            let (n_in, n_out) = (pair[0], pair[1]);
            let scale = (2.0 / (n_in + n_out) as f64).sqrt();
            let w = Array2::from_shape_fn((n_out, n_in), |_| rng.gen_range(-scale..=scale));
            self.weights.push(w);
            self.biases.push(Array1::zeros(n_out));
        }
    }

    /// Post-activation values of every layer, input first
    fn forward(&self, row: ArrayView1<f64>) -> Vec<Array1<f64>> {
        let n_layers = self.weights.len();
        let mut activations = Vec::with_capacity(n_layers + 1);
        activations.push(row.to_owned());

        for (layer, (w, b)) in self.weights.iter().zip(self.biases.iter()).enumerate() {
            let z = w.dot(&activations[layer]) + b;
            let a = if layer + 1 < n_layers { z.mapv(relu) } else { z };
            activations.push(a);
        }
        activations
    }

    /// One SGD step from the output error `prediction - target`
    fn backward(&mut self, activations: &[Array1<f64>], error: f64, lr: f64) {
        let n_layers = self.weights.len();
        // Gradient of 0.5 * error^2 w.r.t. the linear output
        let mut delta = Array1::from_elem(1, error);

        for layer in (0..n_layers).rev() {
            let input = &activations[layer];
            let prev_delta = if layer > 0 {
                let back = self.weights[layer].t().dot(&delta);
                // ReLU derivative on the previous layer's output
                let mask = activations[layer].mapv(|a| if a > 0.0 { 1.0 } else { 0.0 });
                Some(back * mask)
            } else {
                None
            };

            for (i, &d) in delta.iter().enumerate() {
                let mut row = self.weights[layer].row_mut(i);
                row.scaled_add(-lr * d, input);
            }
            self.biases[layer].scaled_add(-lr, &delta);

            match prev_delta {
                Some(d) => delta = d,
                None => break,
            }
        }
    }
}
