//! Soft-margin support vector classifier with an RBF kernel
//!
//! Trained with SMO (Sequential Minimal Optimization); probabilities come from
//! Platt scaling of the decision function.

use crate::error::{HarnessError, Result};
use super::calibration::PlattScaling;
use super::models::{check_lengths, BinaryLearner};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Maximum number of samples for eager kernel matrix computation.
/// Beyond this, training returns an error to prevent OOM.
const MAX_KERNEL_MATRIX_SAMPLES: usize = 10_000;

/// SVM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMConfig {
    /// Regularization parameter (C)
    pub c: f64,
    /// RBF kernel width: K(x, y) = exp(-γ * ||x - y||²)
    pub gamma: f64,
    /// Tolerance for stopping criterion
    pub tol: f64,
    /// Maximum number of passes over the data
    pub max_iter: usize,
    /// Random seed
    pub random_state: Option<u64>,
}

impl Default for SVMConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            gamma: 1.0,
            tol: 1e-3,
            max_iter: 1000,
            random_state: Some(42),
        }
    }
}

/// Binary support vector classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMClassifier {
    pub config: SVMConfig,
    support_vectors: Option<Array2<f64>>,
    /// alpha_i * y_i for every support vector
    dual_coef: Option<Array1<f64>>,
    bias: f64,
    calibrator: PlattScaling,
}

fn rbf(gamma: f64, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    let sq: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum();
    (-gamma * sq).exp()
}

impl SVMClassifier {
    pub fn new(config: SVMConfig) -> Self {
        Self {
            config,
            support_vectors: None,
            dual_coef: None,
            bias: 0.0,
            calibrator: PlattScaling::new(),
        }
    }

    /// Number of support vectors after fit
    pub fn n_support(&self) -> usize {
        self.support_vectors.as_ref().map_or(0, |sv| sv.nrows())
    }

    /// Fit on labels in {0, 1}
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_lengths(x, y)?;
        let y_signed: Array1<f64> = y.mapv(|v| if v > 0.5 { 1.0 } else { -1.0 });

        let (alphas, bias) = self.smo_train(x, &y_signed)?;

        let support: Vec<usize> = alphas
            .iter()
            .enumerate()
            .filter(|(_, &a)| a > 1e-8)
            .map(|(i, _)| i)
            .collect();

        self.support_vectors = Some(x.select(ndarray::Axis(0), &support));
        self.dual_coef = Some(support.iter().map(|&i| alphas[i] * y_signed[i]).collect());
        self.bias = bias;

        let scores = self.decision_function(x)?;
        self.calibrator.fit(&scores, y)?;
        Ok(())
    }

    /// SMO training algorithm
    fn smo_train(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(Array1<f64>, f64)> {
        let n = x.nrows();
        let c = self.config.c;
        let tol = self.config.tol;

        if n > MAX_KERNEL_MATRIX_SAMPLES {
            return Err(HarnessError::TrainingError(format!(
                "Dataset has {} samples, exceeding the maximum {} for the SVM kernel matrix",
                n, MAX_KERNEL_MATRIX_SAMPLES
            )));
        }

        let mut alphas: Array1<f64> = Array1::zeros(n);
        let mut bias = 0.0;
        if n <= 1 {
            return Ok((alphas, bias));
        }

        let kernel_matrix = self.compute_kernel_matrix(x);

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        // Cached f(x_i) - b, kept in sync with every alpha update
        let mut f_cache: Array1<f64> = Array1::zeros(n);

        let mut passes = 0;
        let max_passes = 5;
        let mut total_iter = 0;

        while passes < max_passes && total_iter < self.config.max_iter {
            let mut num_changed = 0;

            for i in 0..n {
                let e_i = f_cache[i] + bias - y[i];

                // Check KKT conditions
                if (y[i] * e_i < -tol && alphas[i] < c) || (y[i] * e_i > tol && alphas[i] > 0.0) {
                    let j = loop {
                        let j = rng.gen_range(0..n);
                        if j != i {
                            break j;
                        }
                    };

                    let e_j = f_cache[j] + bias - y[j];
                    let alpha_i_old = alphas[i];
                    let alpha_j_old = alphas[j];

                    let (l, h) = if y[i] != y[j] {
                        ((alpha_j_old - alpha_i_old).max(0.0), (c + alpha_j_old - alpha_i_old).min(c))
                    } else {
                        ((alpha_i_old + alpha_j_old - c).max(0.0), (alpha_i_old + alpha_j_old).min(c))
                    };
                    if (l - h).abs() < 1e-10 {
                        continue;
                    }

                    let eta = 2.0 * kernel_matrix[[i, j]] - kernel_matrix[[i, i]] - kernel_matrix[[j, j]];
                    if eta >= 0.0 {
                        continue;
                    }

                    let alpha_j = (alpha_j_old - y[j] * (e_i - e_j) / eta).clamp(l, h);
                    if (alpha_j - alpha_j_old).abs() < 1e-5 {
                        continue;
                    }
                    let alpha_i = alpha_i_old + y[i] * y[j] * (alpha_j_old - alpha_j);
                    alphas[i] = alpha_i;
                    alphas[j] = alpha_j;

                    let di = y[i] * (alpha_i - alpha_i_old);
                    let dj = y[j] * (alpha_j - alpha_j_old);

                    let b1 = bias - e_i - di * kernel_matrix[[i, i]] - dj * kernel_matrix[[i, j]];
                    let b2 = bias - e_j - di * kernel_matrix[[i, j]] - dj * kernel_matrix[[j, j]];
                    bias = if alpha_i > 0.0 && alpha_i < c {
                        b1
                    } else if alpha_j > 0.0 && alpha_j < c {
                        b2
                    } else {
                        (b1 + b2) / 2.0
                    };

                    for k in 0..n {
                        f_cache[k] += di * kernel_matrix[[i, k]] + dj * kernel_matrix[[j, k]];
                    }

                    num_changed += 1;
                }
            }

            total_iter += 1;
            if num_changed == 0 {
                passes += 1;
            } else {
                passes = 0;
            }
        }

        Ok((alphas, bias))
    }

    /// Compute kernel matrix (parallelized for large datasets)
    fn compute_kernel_matrix(&self, x: &Array2<f64>) -> Array2<f64> {
        let n = x.nrows();
        let gamma = self.config.gamma;

        // For small matrices, sequential is faster due to overhead
        if n < 100 {
            let mut k = Array2::zeros((n, n));
            for i in 0..n {
                for j in i..n {
                    let val = rbf(gamma, x.row(i), x.row(j));
                    k[[i, j]] = val;
                    k[[j, i]] = val;
                }
            }
            return k;
        }

        let rows: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| (i..n).map(|j| rbf(gamma, x.row(i), x.row(j))).collect())
            .collect();

        let mut k = Array2::zeros((n, n));
        for (i, row_vals) in rows.into_iter().enumerate() {
            for (offset, val) in row_vals.into_iter().enumerate() {
                let j = i + offset;
                k[[i, j]] = val;
                k[[j, i]] = val;
            }
        }
        k
    }

    /// Signed decision value per row; positive means the positive class
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let sv = self.support_vectors.as_ref().ok_or(HarnessError::ModelNotFitted)?;
        let coef = self.dual_coef.as_ref().ok_or(HarnessError::ModelNotFitted)?;
        let gamma = self.config.gamma;

        Ok(x.rows()
            .into_iter()
            .map(|sample| {
                sv.rows()
                    .into_iter()
                    .zip(coef.iter())
                    .map(|(s, &w)| w * rbf(gamma, sample, s))
                    .sum::<f64>()
                    + self.bias
            })
            .collect())
    }

    /// Calibrated probability of the positive class
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let scores = self.decision_function(x)?;
        self.calibrator.calibrate(&scores)
    }
}

impl BinaryLearner for SVMClassifier {
    fn fit_binary(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.fit(x, y)
    }

    fn positive_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.predict_proba(x)
    }

    fn importances(&self) -> Option<Array1<f64>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn blobs() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [0.0, 0.0],
            [0.2, 0.1],
            [0.1, 0.3],
            [0.3, 0.2],
            [2.0, 2.0],
            [2.2, 2.1],
            [2.1, 1.8],
            [1.9, 2.3],
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_rbf_svm_separates_blobs() {
        let (x, y) = blobs();
        let mut svm = SVMClassifier::new(SVMConfig { c: 1.0, gamma: 0.5, ..Default::default() });
        svm.fit(&x, &y).unwrap();

        assert!(svm.n_support() > 0);
        let scores = svm.decision_function(&x).unwrap();
        for i in 0..4 {
            assert!(scores[i] < scores[i + 4]);
        }

        let proba = svm.predict_proba(&x).unwrap();
        assert!(proba.iter().all(|&p| (0.0..=1.0).contains(&p)));
        assert!(proba[0] < 0.5 && proba[4] > 0.5);
    }

    #[test]
    fn test_kernel_is_one_on_diagonal() {
        let (x, _) = blobs();
        let svm = SVMClassifier::new(SVMConfig::default());
        let k = svm.compute_kernel_matrix(&x);
        for i in 0..x.nrows() {
            assert!((k[[i, i]] - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_not_fitted() {
        let svm = SVMClassifier::new(SVMConfig::default());
        assert!(matches!(
            svm.predict_proba(&array![[1.0, 2.0]]),
            Err(HarnessError::ModelNotFitted)
        ));
    }
}
