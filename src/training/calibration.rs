//! Platt scaling (sigmoid calibration) of decision scores

use crate::error::{HarnessError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Platt scaling calibrator
///
/// Fits a sigmoid `P(y=1|f) = 1 / (1 + exp(-(a*f + b)))` on raw decision
/// values `f` by Newton's method with backtracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlattScaling {
    /// Slope parameter A
    a: Option<f64>,
    /// Intercept parameter B
    b: Option<f64>,
    /// Maximum iterations
    max_iter: usize,
    /// Convergence tolerance
    tol: f64,
}

impl Default for PlattScaling {
    fn default() -> Self {
        Self::new()
    }
}

impl PlattScaling {
    pub fn new() -> Self {
        Self {
            a: None,
            b: None,
            max_iter: 100,
            tol: 1e-7,
        }
    }

    /// Set maximum iterations
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Get fitted parameters
    pub fn parameters(&self) -> Option<(f64, f64)> {
        match (self.a, self.b) {
            (Some(a), Some(b)) => Some((a, b)),
            _ => None,
        }
    }

    fn sigmoid(x: f64) -> f64 {
        1.0 / (1.0 + (-x).exp())
    }

    /// Cross-entropy against the smoothed targets, computed stably
    fn objective(scores: &[f64], targets: &[f64], a: f64, b: f64) -> f64 {
        scores
            .iter()
            .zip(targets)
            .map(|(&f, &t)| {
                let z = a * f + b;
                // log(1 + e^z) - t z
                let softplus = if z > 0.0 { z + (-z).exp().ln_1p() } else { z.exp().ln_1p() };
                softplus - t * z
            })
            .sum()
    }

    /// Fit on decision scores and labels in {0, 1}
    pub fn fit(&mut self, scores: &Array1<f64>, labels: &Array1<f64>) -> Result<()> {
        let n = scores.len();
        if n != labels.len() {
            return Err(HarnessError::ValidationError(
                "Scores and labels must have same length".to_string(),
            ));
        }
        if n == 0 {
            return Err(HarnessError::ValidationError("Empty input".to_string()));
        }

        // Target values with Platt's adjustment for small datasets
        let n_pos = labels.iter().filter(|&&y| y > 0.5).count() as f64;
        let n_neg = n as f64 - n_pos;
        let target_pos = (n_pos + 1.0) / (n_pos + 2.0);
        let target_neg = 1.0 / (n_neg + 2.0);

        let f: Vec<f64> = scores.to_vec();
        let targets: Vec<f64> = labels
            .iter()
            .map(|&y| if y > 0.5 { target_pos } else { target_neg })
            .collect();

        let mut a = 0.0;
        let mut b = ((n_pos + 1.0) / (n_neg + 1.0)).ln();
        let mut current = Self::objective(&f, &targets, a, b);

        for _ in 0..self.max_iter {
            let mut grad_a = 0.0;
            let mut grad_b = 0.0;
            let mut hess_aa = 1e-12;
            let mut hess_ab = 0.0;
            let mut hess_bb = 1e-12;

            for i in 0..n {
                let p = Self::sigmoid(a * f[i] + b);
                let d1 = p - targets[i];
                let d2 = p * (1.0 - p);

                grad_a += f[i] * d1;
                grad_b += d1;
                hess_aa += f[i] * f[i] * d2;
                hess_ab += f[i] * d2;
                hess_bb += d2;
            }

            if grad_a.abs() < self.tol && grad_b.abs() < self.tol {
                break;
            }

            // Solve 2x2 system using Cramer's rule
            let det = hess_aa * hess_bb - hess_ab * hess_ab;
            if det.abs() < 1e-18 {
                break;
            }
            let delta_a = (hess_bb * grad_a - hess_ab * grad_b) / det;
            let delta_b = (hess_aa * grad_b - hess_ab * grad_a) / det;

            let mut step = 1.0;
            let mut accepted = false;
            while step > 1e-10 {
                let next_a = a - step * delta_a;
                let next_b = b - step * delta_b;
                let value = Self::objective(&f, &targets, next_a, next_b);
                if value < current + 1e-4 * step * (grad_a * -delta_a + grad_b * -delta_b) {
                    a = next_a;
                    b = next_b;
                    current = value;
                    accepted = true;
                    break;
                }
                step /= 2.0;
            }
            if !accepted {
                break;
            }
        }

        self.a = Some(a);
        self.b = Some(b);
        Ok(())
    }

    /// Map decision scores to probabilities
    pub fn calibrate(&self, scores: &Array1<f64>) -> Result<Array1<f64>> {
        let (a, b) = self.parameters().ok_or(HarnessError::ModelNotFitted)?;
        Ok(scores.mapv(|f| Self::sigmoid(a * f + b)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_platt_is_monotone_increasing() {
        let scores = array![-2.0, -1.2, -0.4, 0.3, -0.1, 0.9, 1.5, 2.2];
        let labels = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];

        let mut calibrator = PlattScaling::new();
        calibrator.fit(&scores, &labels).unwrap();

        let (a, _) = calibrator.parameters().unwrap();
        assert!(a > 0.0);

        let calibrated = calibrator.calibrate(&scores).unwrap();
        assert!(calibrated.iter().all(|&p| (0.0..=1.0).contains(&p)));
        assert!(calibrated[7] > calibrated[0]);
    }

    #[test]
    fn test_separable_scores_stay_finite() {
        let scores = array![-3.0, -2.0, -1.0, 1.0, 2.0, 3.0];
        let labels = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut calibrator = PlattScaling::new();
        calibrator.fit(&scores, &labels).unwrap();

        let (a, b) = calibrator.parameters().unwrap();
        assert!(a.is_finite() && b.is_finite());
    }

    #[test]
    fn test_calibrate_before_fit() {
        let calibrator = PlattScaling::new();
        assert!(calibrator.calibrate(&array![0.5]).is_err());
    }
}
