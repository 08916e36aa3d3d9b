//! Linear model implementations
//!
//! Ordinary least squares through the normal equations and binary logistic
//! regression with either batch gradient descent or Newton-Raphson.

use crate::error::{EngineError, Result};
use crate::linalg;
use crate::utils::stats::normal_cdf;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Prepend a column of ones to the feature matrix
pub(crate) fn design_matrix(x: &Array2<f64>) -> Array2<f64> {
    let (n, p) = x.dim();
    Array2::from_shape_fn((n, p + 1), |(i, j)| if j == 0 { 1.0 } else { x[[i, j - 1]] })
}

fn check_shapes(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(EngineError::InvalidInput(format!(
            "y length = {}, expected {}",
            y.len(),
            x.nrows()
        )));
    }
    if x.nrows() == 0 {
        return Err(EngineError::InvalidInput("no training samples".to_string()));
    }
    Ok(())
}

fn check_width(x: &Array2<f64>, coefficients: &Array1<f64>) -> Result<()> {
    if x.ncols() != coefficients.len() {
        return Err(EngineError::InvalidInput(format!(
            "model expects {} features, got {}",
            coefficients.len(),
            x.ncols()
        )));
    }
    Ok(())
}

#[inline]
pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Linear regression configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearRegressionConfig {
    /// Compute coefficient standard errors and p-values after fitting
    pub compute_statistics: bool,
}

impl Default for LinearRegressionConfig {
    fn default() -> Self {
        Self { compute_statistics: true }
    }
}

/// Ordinary least squares regression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegression {
    config: LinearRegressionConfig,
    /// Fitted weights, one per feature
    pub coefficients: Option<Array1<f64>>,
    /// Fitted intercept
    pub intercept: Option<f64>,
    /// Standard errors of `[intercept, weights...]`
    pub standard_errors: Option<Array1<f64>>,
    /// Two-sided p-values of `[intercept, weights...]` (normal approximation)
    pub p_values: Option<Array1<f64>>,
    pub is_fitted: bool,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new(LinearRegressionConfig::default())
    }
}

impl LinearRegression {
    pub fn new(config: LinearRegressionConfig) -> Self {
        Self {
            config,
            coefficients: None,
            intercept: None,
            standard_errors: None,
            p_values: None,
            is_fitted: false,
        }
    }

    /// Solve `(X^T X) theta = X^T y` with an intercept column
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_shapes(x, y)?;

        let xd = design_matrix(x);
        let xtx = xd.t().dot(&xd);
        let xty = xd.t().dot(y);
        let theta = linalg::solve(&xtx, &xty)?;

        if self.config.compute_statistics {
            self.compute_statistics(&xd, y, &xtx, &theta);
        }

        self.intercept = Some(theta[0]);
        self.coefficients = Some(theta.slice(ndarray::s![1..]).to_owned());
        self.is_fitted = true;
        Ok(())
    }

    fn compute_statistics(&mut self, xd: &Array2<f64>, y: &Array1<f64>, xtx: &Array2<f64>, theta: &Array1<f64>) {
        let n = xd.nrows();
        let p = xd.ncols();
        if n <= p {
            return;
        }
        let Ok(xtx_inv) = linalg::invert(xtx) else {
            return;
        };

        let residuals = y - &xd.dot(theta);
        let sigma2 = residuals.mapv(|r| r * r).sum() / (n - p) as f64;

        let se: Array1<f64> = xtx_inv.diag().mapv(|v| (sigma2 * v.max(0.0)).sqrt());
        let p_values: Array1<f64> = theta
            .iter()
            .zip(se.iter())
            .map(|(&coef, &s)| {
                if s > 0.0 {
                    2.0 * (1.0 - normal_cdf((coef / s).abs()))
                } else if coef == 0.0 {
                    1.0
                } else {
                    0.0
                }
            })
            .collect();

        self.standard_errors = Some(se);
        self.p_values = Some(p_values);
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or_else(|| {
            EngineError::InvalidModel("linear regression has no coefficients".to_string())
        })?;
        check_width(x, coefficients)?;
        let intercept = self.intercept.unwrap_or(0.0);
        Ok(x.dot(coefficients) + intercept)
    }
}

/// Optimization strategy for logistic regression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogisticSolver {
    /// Batch gradient descent on mean binary cross-entropy
    GradientDescent,
    /// Newton-Raphson on the log-likelihood
    Newton,
}

impl Default for LogisticSolver {
    fn default() -> Self {
        Self::GradientDescent
    }
}

/// Logistic regression configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticRegressionConfig {
    pub solver: LogisticSolver,
    /// Step size (gradient descent only)
    pub learning_rate: f64,
    pub max_iter: usize,
    /// Stop once the largest coefficient update is below this
    pub tol: f64,
}

impl Default for LogisticRegressionConfig {
    fn default() -> Self {
        Self {
            solver: LogisticSolver::GradientDescent,
            learning_rate: 0.1,
            max_iter: 1000,
            tol: 1e-6,
        }
    }
}

/// Logistic regression for binary classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    config: LogisticRegressionConfig,
    pub coefficients: Option<Array1<f64>>,
    pub intercept: Option<f64>,
    /// Iterations actually run
    pub n_iter: usize,
    /// Whether the update tolerance was reached before `max_iter`
    pub converged: bool,
    pub is_fitted: bool,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new(LogisticRegressionConfig::default())
    }
}

impl LogisticRegression {
    pub fn new(config: LogisticRegressionConfig) -> Self {
        Self {
            config,
            coefficients: None,
            intercept: None,
            n_iter: 0,
            converged: false,
            is_fitted: false,
        }
    }

    /// Fit on 0/1 targets
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_shapes(x, y)?;
        crate::data::validate_binary_targets(&y.to_vec())?;

        let xd = design_matrix(x);
        let mut theta = Array1::zeros(xd.ncols());

        let (n_iter, converged) = match self.config.solver {
            LogisticSolver::GradientDescent => self.gradient_descent(&xd, y, &mut theta),
            LogisticSolver::Newton => self.newton(&xd, y, &mut theta)?,
        };

        if !converged {
            tracing::debug!(n_iter, solver = ?self.config.solver, "logistic regression hit max_iter");
        }

        self.intercept = Some(theta[0]);
        self.coefficients = Some(theta.slice(ndarray::s![1..]).to_owned());
        self.n_iter = n_iter;
        self.converged = converged;
        self.is_fitted = true;
        Ok(())
    }

    fn gradient_descent(&self, xd: &Array2<f64>, y: &Array1<f64>, theta: &mut Array1<f64>) -> (usize, bool) {
        let n = xd.nrows() as f64;
        for iter in 0..self.config.max_iter {
            let p = xd.dot(&*theta).mapv(sigmoid);
            let grad = xd.t().dot(&(&p - y)) / n;
            let update = grad * self.config.learning_rate;
            *theta -= &update;

            let max_update = update.iter().fold(0.0f64, |m, &u| m.max(u.abs()));
            if max_update < self.config.tol {
                return (iter + 1, true);
            }
        }
        (self.config.max_iter, false)
    }

    fn newton(&self, xd: &Array2<f64>, y: &Array1<f64>, theta: &mut Array1<f64>) -> Result<(usize, bool)> {
        let k = xd.ncols();
        for iter in 0..self.config.max_iter {
            let p = xd.dot(&*theta).mapv(sigmoid);
            let gradient = xd.t().dot(&(y - &p));

            // Hessian of the log-likelihood: -X^T W X
            let mut hessian = Array2::zeros((k, k));
            for (row, &pi) in xd.rows().into_iter().zip(p.iter()) {
                let w = pi * (1.0 - pi);
                for a in 0..k {
                    for b in 0..k {
                        hessian[[a, b]] -= w * row[a] * row[b];
                    }
                }
            }

            let step = linalg::solve(&hessian, &gradient)?;
            *theta -= &step;

            let max_update = step.iter().fold(0.0f64, |m, &u| m.max(u.abs()));
            if max_update < self.config.tol {
                return Ok((iter + 1, true));
            }
        }
        Ok((self.config.max_iter, false))
    }

    /// Probability of the positive class
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or_else(|| {
            EngineError::InvalidModel("logistic regression has no coefficients".to_string())
        })?;
        check_width(x, coefficients)?;
        let intercept = self.intercept.unwrap_or(0.0);
        Ok((x.dot(coefficients) + intercept).mapv(sigmoid))
    }

    /// Class labels at the 0.5 threshold
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.predict_proba(x)?.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_linear_recovers_exact_line() {
        let x = array![[0.0], [1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = x.column(0).mapv(|v| 2.0 * v + 3.0);

        let mut model = LinearRegression::default();
        model.fit(&x, &y).unwrap();

        assert!((model.intercept.unwrap() - 3.0).abs() < 1e-9);
        assert!((model.coefficients.as_ref().unwrap()[0] - 2.0).abs() < 1e-9);

        let pred = model.predict(&array![[10.0]]).unwrap();
        assert!((pred[0] - 23.0).abs() < 1e-9);
    }

    #[test]
    fn test_linear_statistics_on_noisy_data() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0], [7.0], [8.0]];
        let y = array![2.1, 3.9, 6.2, 7.8, 10.1, 12.2, 13.8, 16.1];

        let mut model = LinearRegression::default();
        model.fit(&x, &y).unwrap();

        let p_values = model.p_values.as_ref().unwrap();
        assert_eq!(p_values.len(), 2);
        // Slope is clearly significant
        assert!(p_values[1] < 0.01);
    }

    #[test]
    fn test_linear_collinear_is_singular() {
        let x = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0]];
        let y = array![1.0, 2.0, 3.0];
        let mut model = LinearRegression::default();
        assert!(matches!(model.fit(&x, &y), Err(EngineError::SingularMatrix { .. })));
    }

    #[test]
    fn test_linear_predict_unfitted() {
        let model = LinearRegression::default();
        assert!(matches!(model.predict(&array![[1.0]]), Err(EngineError::InvalidModel(_))));
    }

    fn overlapping_binary() -> (Array2<f64>, Array1<f64>) {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0], [7.0], [8.0], [4.5], [5.5]];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.0];
        (x, y)
    }

    #[test]
    fn test_logistic_gradient_descent() {
        let (x, y) = overlapping_binary();
        let mut model = LogisticRegression::new(LogisticRegressionConfig {
            max_iter: 5000,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();

        let proba = model.predict_proba(&array![[1.0], [8.0]]).unwrap();
        assert!(proba[0] < 0.5);
        assert!(proba[1] > 0.5);
    }

    #[test]
    fn test_logistic_newton_converges() {
        let (x, y) = overlapping_binary();
        let mut model = LogisticRegression::new(LogisticRegressionConfig {
            solver: LogisticSolver::Newton,
            max_iter: 100,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        assert!(model.converged);
        assert!(model.coefficients.as_ref().unwrap()[0] > 0.0);

        let labels = model.predict(&array![[1.0], [8.0]]).unwrap();
        assert_eq!(labels, array![0.0, 1.0]);
    }

    #[test]
    fn test_logistic_rejects_non_binary() {
        let x = array![[1.0], [2.0]];
        let y = array![0.0, 2.0];
        let mut model = LogisticRegression::default();
        assert!(matches!(model.fit(&x, &y), Err(EngineError::InvalidInput(_))));
    }
}
