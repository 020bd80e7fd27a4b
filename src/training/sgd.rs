//! Stochastic Gradient Descent (SGD) linear classifier
//!
//! Supports hinge, log and modified-Huber losses with elastic-net
//! regularisation and the usual learning rate schedules.

use crate::error::{HarnessError, Result};
use super::models::{check_lengths, BinaryLearner};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SGDLoss {
    Hinge,         // SVM-like
    Log,           // Logistic regression
    ModifiedHuber, // Smooth hinge
}

impl FromStr for SGDLoss {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "hinge" => Ok(SGDLoss::Hinge),
            "log_loss" | "log" => Ok(SGDLoss::Log),
            "modified_huber" => Ok(SGDLoss::ModifiedHuber),
            other => Err(HarnessError::invalid_param(
                "loss",
                other,
                "expected hinge, log_loss or modified_huber",
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LearningRateSchedule {
    Constant,
    Optimal,    // 1 / (alpha * (t + t0))
    InvScaling, // eta0 / t^power_t
    Adaptive,   // Divide by 5 when the epoch loss stops improving
}

impl FromStr for LearningRateSchedule {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "constant" => Ok(LearningRateSchedule::Constant),
            "optimal" => Ok(LearningRateSchedule::Optimal),
            "invscaling" => Ok(LearningRateSchedule::InvScaling),
            "adaptive" => Ok(LearningRateSchedule::Adaptive),
            other => Err(HarnessError::invalid_param(
                "learning_rate",
                other,
                "expected constant, optimal, invscaling or adaptive",
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SGDConfig {
    pub loss: SGDLoss,
    pub learning_rate: LearningRateSchedule,
    pub eta0: f64,
    pub alpha: f64,    // regularisation strength
    pub l1_ratio: f64, // ElasticNet mixing (0 = L2, 1 = L1)
    pub max_iter: usize,
    pub tol: f64,
    pub power_t: f64, // For InvScaling schedule
    pub random_state: Option<u64>,
}

impl Default for SGDConfig {
    fn default() -> Self {
        Self {
            loss: SGDLoss::Log,
            learning_rate: LearningRateSchedule::Optimal,
            eta0: 0.01,
            alpha: 0.0001,
            l1_ratio: 0.0,
            max_iter: 1000,
            tol: 1e-3,
            power_t: 0.5,
            random_state: Some(42),
        }
    }
}

impl SGDConfig {
    /// Map a penalty name onto `l1_ratio`; `elasticnet` keeps the configured ratio
    pub fn apply_penalty(&mut self, penalty: &str) -> Result<()> {
        match penalty {
            "l2" => self.l1_ratio = 0.0,
            "l1" => self.l1_ratio = 1.0,
            "elasticnet" => {
                if self.l1_ratio == 0.0 {
                    self.l1_ratio = 0.15;
                }
            }
            other => {
                return Err(HarnessError::invalid_param(
                    "penalty",
                    other,
                    "expected l2, l1 or elasticnet",
                ))
            }
        }
        Ok(())
    }
}

fn get_lr(config: &SGDConfig, t: usize) -> f64 {
    match config.learning_rate {
        LearningRateSchedule::Constant => config.eta0,
        LearningRateSchedule::Optimal => {
            let t0 = 1.0 / (config.alpha * config.eta0);
            1.0 / (config.alpha * (t as f64 + t0))
        }
        LearningRateSchedule::InvScaling => config.eta0 / (t as f64).powf(config.power_t),
        LearningRateSchedule::Adaptive => config.eta0, // adjusted externally
    }
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

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SGDClassifier {
    pub config: SGDConfig,
    pub weights: Option<Array1<f64>>,
    pub bias: f64,
}

impl SGDClassifier {
    pub fn new(config: SGDConfig) -> Self {
        Self {
            config,
            weights: None,
            bias: 0.0,
        }
    }

    /// Fit on labels in {0, 1}
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_lengths(x, y)?;
        let n = x.nrows();
        let p = x.ncols();

        // Convert labels: 0/1 → -1/+1 for hinge losses
        let y_signed: Vec<f64> = y.iter().map(|&v| if v > 0.5 { 1.0 } else { -1.0 }).collect();

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state.unwrap_or(42));
        let mut w = Array1::zeros(p);
        let mut b = 0.0;
        let mut indices: Vec<usize> = (0..n).collect();
        let mut prev_loss = f64::MAX;
        let mut current_eta = self.config.eta0;
        let mut t = 1usize;

        let l2_coeff = self.config.alpha * (1.0 - self.config.l1_ratio);
        let l1_coeff = self.config.alpha * self.config.l1_ratio;

        for epoch in 0..self.config.max_iter {
            indices.shuffle(&mut rng);
            let mut epoch_loss = 0.0;

            for &i in &indices {
                let xi = x.row(i);
                let margin = xi.dot(&w) + b;
                let yi = y_signed[i];

                let lr = match self.config.learning_rate {
                    LearningRateSchedule::Adaptive => current_eta,
                    _ => get_lr(&self.config, t),
                };

                let dloss = match self.config.loss {
                    SGDLoss::Hinge => {
                        if yi * margin < 1.0 {
                            epoch_loss += 1.0 - yi * margin;
                            -yi
                        } else {
                            0.0
                        }
                    }
                    SGDLoss::Log => {
                        let p = sigmoid(margin);
                        let y01 = if yi > 0.0 { 1.0 } else { 0.0 };
                        epoch_loss += -(y01 * p.max(1e-15).ln()
                            + (1.0 - y01) * (1.0 - p).max(1e-15).ln());
                        p - y01
                    }
                    SGDLoss::ModifiedHuber => {
                        let z = yi * margin;
                        if z >= 1.0 {
                            0.0
                        } else if z >= -1.0 {
                            epoch_loss += (1.0 - z) * (1.0 - z);
                            -2.0 * (1.0 - z) * yi
                        } else {
                            epoch_loss += -4.0 * z;
                            -4.0 * yi
                        }
                    }
                };

                for j in 0..p {
                    let grad = dloss * xi[j] + l2_coeff * w[j];
                    w[j] -= lr * grad;
                    w[j] = soft_threshold(w[j], lr * l1_coeff);
                }
                b -= lr * dloss;
                t += 1;
            }

            epoch_loss /= n as f64;

            if self.config.learning_rate == LearningRateSchedule::Adaptive
                && epoch_loss > prev_loss - self.config.tol
            {
                current_eta /= 5.0;
                if current_eta < 1e-10 {
                    break;
                }
            }

            if (prev_loss - epoch_loss).abs() < self.config.tol && epoch > 0 {
                break;
            }
            prev_loss = epoch_loss;
        }

        self.weights = Some(w);
        self.bias = b;
        Ok(())
    }

    /// Signed distance to the separating hyperplane
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let w = self.weights.as_ref().ok_or(HarnessError::ModelNotFitted)?;
        Ok(x.dot(w) + self.bias)
    }

    /// Probability of the positive class
    ///
    /// The hinge loss has no probabilistic reading; its margins go through a
    /// sigmoid so they can still rank samples.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let margins = self.decision_function(x)?;
        Ok(margins.mapv(|z| match self.config.loss {
            SGDLoss::ModifiedHuber => ((z.clamp(-1.0, 1.0)) + 1.0) / 2.0,
            SGDLoss::Log | SGDLoss::Hinge => sigmoid(z),
        }))
    }
}

impl BinaryLearner for SGDClassifier {
    fn fit_binary(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.fit(x, y)
    }

    fn positive_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.predict_proba(x)
    }

    fn importances(&self) -> Option<Array1<f64>> {
        self.weights.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_classification_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_vec((100, 2), (0..200).map(|i| (i as f64) / 100.0).collect()).unwrap();
        let y = Array1::from_vec((0..100).map(|i| if i < 50 { 0.0 } else { 1.0 }).collect());
        (x, y)
    }

    fn accuracy(model: &SGDClassifier, x: &Array2<f64>, y: &Array1<f64>) -> f64 {
        let proba = model.predict_proba(x).unwrap();
        proba
            .iter()
            .zip(y.iter())
            .filter(|(&p, &t)| (p >= 0.5) == (t > 0.5))
            .count() as f64
            / y.len() as f64
    }

    #[test]
    fn test_sgd_classifier_log() {
        let (x, y) = make_classification_data();
        let config = SGDConfig {
            learning_rate: LearningRateSchedule::Constant,
            max_iter: 200,
            eta0: 0.05,
            ..Default::default()
        };
        let mut model = SGDClassifier::new(config);
        model.fit(&x, &y).unwrap();
        let acc = accuracy(&model, &x, &y);
        assert!(acc > 0.6, "Accuracy too low: {}", acc);
    }

    #[test]
    fn test_sgd_classifier_hinge() {
        let (x, y) = make_classification_data();
        let config = SGDConfig {
            loss: SGDLoss::Hinge,
            learning_rate: LearningRateSchedule::Constant,
            max_iter: 200,
            eta0: 0.01,
            ..Default::default()
        };
        let mut model = SGDClassifier::new(config);
        model.fit(&x, &y).unwrap();
        let proba = model.predict_proba(&x).unwrap();
        assert_eq!(proba.len(), 100);
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_penalty_mapping() {
        let mut config = SGDConfig::default();
        config.apply_penalty("l1").unwrap();
        assert_eq!(config.l1_ratio, 1.0);
        config.apply_penalty("l2").unwrap();
        assert_eq!(config.l1_ratio, 0.0);
        assert!(config.apply_penalty("none").is_err());
    }

    #[test]
    fn test_parse_loss() {
        assert_eq!("log_loss".parse::<SGDLoss>().unwrap(), SGDLoss::Log);
        assert!("squared_error".parse::<SGDLoss>().is_err());
    }
}
