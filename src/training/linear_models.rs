//! Regularised logistic regression

use crate::error::{HarnessError, Result};
use super::models::{check_lengths, BinaryLearner};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Regularisation penalty
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Penalty {
    L1,
    L2,
}

impl FromStr for Penalty {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "l1" => Ok(Penalty::L1),
            "l2" => Ok(Penalty::L2),
            other => Err(HarnessError::invalid_param("penalty", other, "expected l1 or l2")),
        }
    }
}

/// Solver name
///
/// Every solver runs the same proximal gradient method. The name is kept so
/// grids written for other toolkits load unchanged; `lbfgs` rejects `l1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Solver {
    Liblinear,
    Saga,
    Lbfgs,
}

impl FromStr for Solver {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "liblinear" => Ok(Solver::Liblinear),
            "saga" => Ok(Solver::Saga),
            "lbfgs" => Ok(Solver::Lbfgs),
            other => Err(HarnessError::invalid_param(
                "solver",
                other,
                "expected liblinear, saga or lbfgs",
            )),
        }
    }
}

/// Logistic regression for one positive class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Fitted coefficients
    pub coefficients: Option<Array1<f64>>,
    /// Fitted intercept
    pub intercept: Option<f64>,
    /// Whether to fit intercept
    pub fit_intercept: bool,
    /// Inverse regularisation strength
    pub c: f64,
    /// Penalty applied to the coefficients
    pub penalty: Penalty,
    /// Solver name
    pub solver: Solver,
    /// Maximum iterations
    pub max_iter: usize,
    /// Convergence tolerance on the largest coefficient change
    pub tol: f64,
    /// Iterations used by the last fit
    pub n_iter: usize,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
            fit_intercept: true,
            c: 1.0,
            penalty: Penalty::L2,
            solver: Solver::Lbfgs,
            max_iter: 100,
            tol: 1e-4,
            n_iter: 0,
        }
    }

    /// Set inverse regularisation strength
    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_penalty(mut self, penalty: Penalty) -> Self {
        self.penalty = penalty;
        self
    }

    pub fn with_solver(mut self, solver: Solver) -> Self {
        self.solver = solver;
        self
    }

    /// Set maximum iterations
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Reject combinations the named solver does not support
    pub fn validate(&self) -> Result<()> {
        if self.solver == Solver::Lbfgs && self.penalty == Penalty::L1 {
            return Err(HarnessError::invalid_param(
                "solver",
                "lbfgs",
                "does not support the l1 penalty",
            ));
        }
        Ok(())
    }

    fn sigmoid(z: &Array1<f64>) -> Array1<f64> {
        z.mapv(|v| 1.0 / (1.0 + (-v).exp()))
    }

    fn soft_threshold(val: f64, threshold: f64) -> f64 {
        if val > threshold {
            val - threshold
        } else if val < -threshold {
            val + threshold
        } else {
            0.0
        }
    }

    /// Fit by proximal gradient descent on the mean log-loss plus `penalty / (C n)`
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_lengths(x, y)?;
        self.validate()?;

        let n_samples = x.nrows() as f64;
        let n_features = x.ncols();
        let reg = 1.0 / (self.c * n_samples);

        // Step size from a bound on the Lipschitz constant of the log-loss gradient
        let mean_sq_norm = x.rows().into_iter().map(|r| r.dot(&r)).sum::<f64>() / n_samples;
        let lipschitz = 0.25 * (mean_sq_norm + 1.0)
            + if self.penalty == Penalty::L2 { reg } else { 0.0 };
        let lr = 1.0 / lipschitz.max(1e-12);

        let mut weights: Array1<f64> = Array1::zeros(n_features);
        let mut bias = 0.0;
        self.n_iter = self.max_iter;

        for iter in 0..self.max_iter {
            let linear = x.dot(&weights) + bias;
            let errors = &Self::sigmoid(&linear) - y;

            let mut dw = x.t().dot(&errors) / n_samples;
            if self.penalty == Penalty::L2 {
                dw = dw + reg * &weights;
            }
            let db = if self.fit_intercept { errors.mean().unwrap_or(0.0) } else { 0.0 };

            let mut updated = &weights - &(lr * &dw);
            if self.penalty == Penalty::L1 {
                updated.mapv_inplace(|w| Self::soft_threshold(w, lr * reg));
            }

            let max_change = updated
                .iter()
                .zip(weights.iter())
                .map(|(a, b)| (a - b).abs())
                .fold((lr * db).abs(), f64::max);

            weights = updated;
            bias -= lr * db;

            if max_change < self.tol {
                self.n_iter = iter + 1;
                break;
            }
        }

        self.coefficients = Some(weights);
        self.intercept = Some(bias);
        Ok(self)
    }

    /// Probability of the positive class
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(HarnessError::ModelNotFitted)?;
        let intercept = self.intercept.unwrap_or(0.0);
        Ok(Self::sigmoid(&(x.dot(coefficients) + intercept)))
    }
}

impl BinaryLearner for LogisticRegression {
    fn fit_binary(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.fit(x, y).map(|_| ())
    }

    fn positive_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.predict_proba(x)
    }

    fn importances(&self) -> Option<Array1<f64>> {
        self.coefficients.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn separable() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [0.0, 1.0],
            [0.5, 0.8],
            [1.0, 0.2],
            [1.5, 0.5],
            [4.0, 0.4],
            [4.5, 0.9],
            [5.0, 0.1],
            [5.5, 0.7],
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_fit_separates() {
        let (x, y) = separable();
        let mut model = LogisticRegression::new().with_c(10.0).with_max_iter(3000);
        model.fit(&x, &y).unwrap();

        let proba = model.predict_proba(&x).unwrap();
        for i in 0..4 {
            assert!(proba[i] < 0.5, "row {} p={}", i, proba[i]);
            assert!(proba[i + 4] > 0.5, "row {} p={}", i + 4, proba[i + 4]);
        }
    }

    #[test]
    fn test_l1_shrinks_noise_feature() {
        let (x, y) = separable();
        let mut model = LogisticRegression::new()
            .with_c(0.1)
            .with_penalty(Penalty::L1)
            .with_solver(Solver::Liblinear)
            .with_max_iter(3000);
        model.fit(&x, &y).unwrap();

        let coef = model.coefficients.as_ref().unwrap();
        assert!(coef[0].abs() >= coef[1].abs());
    }

    #[test]
    fn test_lbfgs_rejects_l1() {
        let (x, y) = separable();
        let mut model = LogisticRegression::new().with_penalty(Penalty::L1);
        assert!(model.fit(&x, &y).is_err());
    }

    #[test]
    fn test_predict_before_fit() {
        let model = LogisticRegression::new();
        let x = array![[1.0, 2.0]];
        assert!(matches!(model.predict_proba(&x), Err(HarnessError::ModelNotFitted)));
    }

    #[test]
    fn test_parse_penalty() {
        assert_eq!("l1".parse::<Penalty>().unwrap(), Penalty::L1);
        assert!("elasticnet".parse::<Penalty>().is_err());
    }
}
