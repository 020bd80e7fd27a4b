//! XGBoost-style gradient boosting with second-order approximation
//!
//! Key differences from standard gradient boosting:
//! - Uses both gradient (first derivative) and hessian (second derivative) of loss
//! - Regularized leaf weights: w* = -G / (H + lambda)
//! - Gain-based split scoring: Gain = 0.5 * [GL²/(HL+λ) + GR²/(HR+λ) - (GL+GR)²/(HL+HR+λ)] - γ
//! - Built-in L1 (alpha) and L2 (lambda) regularization
//! - Minimum child weight constraint

use crate::error::{HarnessError, Result};
use super::models::{check_lengths, BinaryLearner};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// XGBoost configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    /// L1 regularization on leaf weights
    pub reg_alpha: f64,
    /// Minimum loss reduction to make a split (gamma)
    pub gamma: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub random_state: Option<u64>,
}

impl Default for XGBoostConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            reg_alpha: 0.0,
            gamma: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            random_state: Some(42),
        }
    }
}

/// A single node in the XGBoost tree
#[derive(Debug, Clone, Serialize, Deserialize)]
enum XGBNode {
    Leaf { weight: f64 },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<XGBNode>,
        right: Box<XGBNode>,
    },
}

impl XGBNode {
    fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        match self {
            XGBNode::Leaf { weight } => *weight,
            XGBNode::Split { feature, threshold, left, right } => {
                if sample[*feature] <= *threshold {
                    left.predict(sample)
                } else {
                    right.predict(sample)
                }
            }
        }
    }

    fn count_splits(&self, counts: &mut [f64]) {
        if let XGBNode::Split { feature, left, right, .. } = self {
            if *feature < counts.len() {
                counts[*feature] += 1.0;
            }
            left.count_splits(counts);
            right.count_splits(counts);
        }
    }
}

/// Build an XGBoost tree using exact greedy split finding
fn build_xgb_tree(
    x: &Array2<f64>,
    grad: &Array1<f64>,
    hess: &Array1<f64>,
    indices: &[usize],
    feature_indices: &[usize],
    depth: usize,
    config: &XGBoostConfig,
) -> XGBNode {
    let n = indices.len();

    let g_sum: f64 = indices.iter().map(|&i| grad[i]).sum();
    let h_sum: f64 = indices.iter().map(|&i| hess[i]).sum();
    let leaf_weight = compute_leaf_weight(g_sum, h_sum, config.reg_lambda, config.reg_alpha);

    if depth >= config.max_depth || n < 2 || h_sum < config.min_child_weight {
        return XGBNode::Leaf { weight: leaf_weight };
    }

    // Find best split across features (parallelized, first feature wins ties)
    let candidates: Vec<(usize, f64, f64)> = feature_indices
        .par_iter()
        .filter_map(|&f| find_best_split_for_feature(x, grad, hess, indices, f, config))
        .collect();
    let best_split = candidates.into_iter().fold(None, |acc: Option<(usize, f64, f64)>, c| match acc {
        Some(best) if best.2 >= c.2 => Some(best),
        _ => Some(c),
    });

    match best_split {
        Some((feature, threshold, gain)) if gain > config.gamma => {
            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
                indices.iter().partition(|&&i| x[[i, feature]] <= threshold);

            if left_idx.is_empty() || right_idx.is_empty() {
                return XGBNode::Leaf { weight: leaf_weight };
            }

            let left = build_xgb_tree(x, grad, hess, &left_idx, feature_indices, depth + 1, config);
            let right = build_xgb_tree(x, grad, hess, &right_idx, feature_indices, depth + 1, config);

            XGBNode::Split {
                feature,
                threshold,
                left: Box::new(left),
                right: Box::new(right),
            }
        }
        _ => XGBNode::Leaf { weight: leaf_weight },
    }
}

/// Optimal leaf weight with L1 (alpha) and L2 (lambda) regularization
fn compute_leaf_weight(g_sum: f64, h_sum: f64, lambda: f64, alpha: f64) -> f64 {
    let g_adj = if g_sum > alpha {
        g_sum - alpha
    } else if g_sum < -alpha {
        g_sum + alpha
    } else {
        return 0.0;
    };
    -g_adj / (h_sum + lambda)
}

/// Best (feature, threshold, gain) for a single feature using the exact greedy method
fn find_best_split_for_feature(
    x: &Array2<f64>,
    grad: &Array1<f64>,
    hess: &Array1<f64>,
    indices: &[usize],
    feature: usize,
    config: &XGBoostConfig,
) -> Option<(usize, f64, f64)> {
    let mut sorted_indices: Vec<usize> = indices.to_vec();
    sorted_indices.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

    let g_total: f64 = sorted_indices.iter().map(|&i| grad[i]).sum();
    let h_total: f64 = sorted_indices.iter().map(|&i| hess[i]).sum();
    let lambda = config.reg_lambda;

    let mut g_left = 0.0;
    let mut h_left = 0.0;
    let mut best: Option<(f64, f64)> = None;

    for pos in 0..sorted_indices.len() - 1 {
        let idx = sorted_indices[pos];
        let next_idx = sorted_indices[pos + 1];
        g_left += grad[idx];
        h_left += hess[idx];

        // Skip if next sample has same feature value (avoid identical split)
        if (x[[idx, feature]] - x[[next_idx, feature]]).abs() < 1e-12 {
            continue;
        }

        let g_right = g_total - g_left;
        let h_right = h_total - h_left;
        if h_left < config.min_child_weight || h_right < config.min_child_weight {
            continue;
        }

        let gain = 0.5
            * ((g_left * g_left) / (h_left + lambda) + (g_right * g_right) / (h_right + lambda)
                - (g_total * g_total) / (h_total + lambda));

        if best.map_or(true, |b| gain > b.1) {
            best = Some(((x[[idx, feature]] + x[[next_idx, feature]]) / 2.0, gain));
        }
    }

    best.map(|(threshold, gain)| (feature, threshold, gain))
}

fn subsample(rng: &mut Xoshiro256PlusPlus, n: usize, ratio: f64) -> Vec<usize> {
    if ratio >= 1.0 {
        return (0..n).collect();
    }
    let k = (((n as f64) * ratio).ceil() as usize).max(1);
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices.truncate(k);
    indices.sort_unstable();
    indices
}

/// XGBoost Classifier (logistic loss with second-order approximation)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostClassifier {
    pub config: XGBoostConfig,
    trees: Vec<XGBNode>,
    base_score: f64,
    n_features: usize,
}

impl XGBoostClassifier {
    pub fn new(config: XGBoostConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_score: 0.0,
            n_features: 0,
        }
    }

    fn sigmoid(x: f64) -> f64 {
        1.0 / (1.0 + (-x).exp())
    }

    /// Fit on labels in {0, 1}
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_lengths(x, y)?;
        let n_samples = x.nrows();
        let n_features = x.ncols();
        self.n_features = n_features;

        // Base score in log-odds space
        let p = y.mean().unwrap_or(0.5).clamp(1e-7, 1.0 - 1e-7);
        self.base_score = (p / (1.0 - p)).ln();
        let mut raw_preds = Array1::from_elem(n_samples, self.base_score);

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        self.trees.clear();

        for _ in 0..self.config.n_estimators {
            // Logistic loss: grad = p - y, hess = p * (1 - p)
            let probs: Array1<f64> = raw_preds.mapv(Self::sigmoid);
            let grad: Array1<f64> = &probs - y;
            let hess: Array1<f64> = probs.mapv(|p| (p * (1.0 - p)).max(1e-7));

            let row_indices = subsample(&mut rng, n_samples, self.config.subsample);
            let col_indices = subsample(&mut rng, n_features, self.config.colsample_bytree);

            let tree = build_xgb_tree(x, &grad, &hess, &row_indices, &col_indices, 0, &self.config);

            // Every row moves, including the ones left out of this round's sample
            for (i, row) in x.rows().into_iter().enumerate() {
                raw_preds[i] += self.config.learning_rate * tree.predict(row);
            }

            self.trees.push(tree);
        }

        Ok(())
    }

    /// Raw log-odds margin
    pub fn decision_function(&self, x: &Array2<f64>) -> Array1<f64> {
        x.rows()
            .into_iter()
            .map(|row| {
                self.base_score
                    + self
                        .trees
                        .iter()
                        .map(|t| self.config.learning_rate * t.predict(row))
                        .sum::<f64>()
            })
            .collect()
    }

    /// Probability of the positive class
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.n_features == 0 && self.trees.is_empty() {
            return Err(HarnessError::ModelNotFitted);
        }
        Ok(self.decision_function(x).mapv(Self::sigmoid))
    }

    /// Share of splits made on each feature across all trees
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        if self.n_features == 0 {
            return None;
        }
        let mut counts = vec![0.0f64; self.n_features];
        for tree in &self.trees {
            tree.count_splits(&mut counts);
        }
        let total: f64 = counts.iter().sum();
        if total > 0.0 {
            for c in counts.iter_mut() {
                *c /= total;
            }
        }
        Some(Array1::from_vec(counts))
    }
}

impl BinaryLearner for XGBoostClassifier {
    fn fit_binary(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.fit(x, y)
    }

    fn positive_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.predict_proba(x)
    }

    fn importances(&self) -> Option<Array1<f64>> {
        self.feature_importances()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classification_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_vec((50, 2), (0..100).map(|i| i as f64 * 0.1).collect()).unwrap();
        let y: Array1<f64> = x
            .rows()
            .into_iter()
            .map(|r| if r[0] + r[1] > 5.0 { 1.0 } else { 0.0 })
            .collect();
        (x, y)
    }

    #[test]
    fn test_xgboost_classifier() {
        let (x, y) = classification_data();
        let mut model = XGBoostClassifier::new(XGBoostConfig {
            n_estimators: 50,
            max_depth: 4,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();

        let proba = model.predict_proba(&x).unwrap();
        let correct = proba
            .iter()
            .zip(y.iter())
            .filter(|(&p, &t)| (p >= 0.5) == (t > 0.5))
            .count();
        let acc = correct as f64 / y.len() as f64;
        assert!(acc >= 0.8, "XGBoost classifier accuracy = {}", acc);
    }

    #[test]
    fn test_xgboost_predict_proba_range() {
        let (x, y) = classification_data();
        let mut model = XGBoostClassifier::new(XGBoostConfig {
            subsample: 0.5,
            colsample_bytree: 0.5,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        let proba = model.predict_proba(&x).unwrap();
        assert_eq!(proba.len(), x.nrows());
        assert!(proba.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn test_importances_sum_to_one() {
        let (x, y) = classification_data();
        let mut model = XGBoostClassifier::new(XGBoostConfig { n_estimators: 10, ..Default::default() });
        model.fit(&x, &y).unwrap();
        let imp = model.feature_importances().unwrap();
        assert!((imp.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_leaf_weight_l1() {
        assert_eq!(compute_leaf_weight(0.5, 2.0, 1.0, 1.0), 0.0);
        assert!((compute_leaf_weight(3.0, 2.0, 1.0, 1.0) + 2.0 / 3.0).abs() < 1e-12);
    }
}
