//! CART classification tree with class-distribution leaves

use crate::error::{HarnessError, Result};
use ndarray::{Array1, Array2};
use rand::seq::index::sample;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node holding the class distribution of its samples
    Leaf {
        distribution: Vec<f64>,
        n_samples: usize,
    },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Criterion {
    /// Gini impurity
    Gini,
    /// Entropy
    Entropy,
}

impl FromStr for Criterion {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "gini" => Ok(Criterion::Gini),
            "entropy" | "log_loss" => Ok(Criterion::Entropy),
            other => Err(HarnessError::invalid_param("criterion", other, "expected gini or entropy")),
        }
    }
}

impl Criterion {
    fn impurity(&self, counts: &[f64], total: f64) -> f64 {
        if total <= 0.0 {
            return 0.0;
        }
        match self {
            Criterion::Gini => 1.0 - counts.iter().map(|&c| (c / total).powi(2)).sum::<f64>(),
            Criterion::Entropy => -counts
                .iter()
                .filter(|&&c| c > 0.0)
                .map(|&c| {
                    let p = c / total;
                    p * p.ln()
                })
                .sum::<f64>(),
        }
    }
}

/// Decision tree classifier over class indices `0..n_classes`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Tree root
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features drawn at random for each split, all when `None`
    pub max_features: Option<usize>,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Seed for the per-split feature draw
    pub random_state: Option<u64>,
    n_features: usize,
    n_classes: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTree {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Gini,
            random_state: None,
            n_features: 0,
            n_classes: 0,
            feature_importances: None,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features);
        self
    }

    /// Set criterion
    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Fit on class indices `y` in `0..n_classes`
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>, n_classes: usize) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(HarnessError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(HarnessError::TrainingError("Empty dataset".to_string()));
        }

        self.n_features = n_features;
        self.n_classes = n_classes;

        let labels: Vec<usize> = y.iter().map(|&v| v as usize).collect();
        if labels.iter().any(|&l| l >= n_classes) {
            return Err(HarnessError::TrainingError(
                "class index out of range".to_string(),
            ));
        }

        let mut rng = match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let mut importances = vec![0.0; n_features];
        let indices: Vec<usize> = (0..n_samples).collect();
        let root = self.build_tree(x, &labels, &indices, 0, &mut importances, &mut rng);
        self.root = Some(root);

        // Normalize feature importances
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    fn class_counts(&self, labels: &[usize], indices: &[usize]) -> Vec<f64> {
        let mut counts = vec![0.0; self.n_classes];
        for &i in indices {
            counts[labels[i]] += 1.0;
        }
        counts
    }

    fn leaf(counts: Vec<f64>, n_samples: usize) -> TreeNode {
        let total: f64 = counts.iter().sum();
        let distribution = if total > 0.0 {
            counts.iter().map(|c| c / total).collect()
        } else {
            counts
        };
        TreeNode::Leaf {
            distribution,
            n_samples,
        }
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        labels: &[usize],
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let counts = self.class_counts(labels, indices);
        let parent_impurity = self.criterion.impurity(&counts, n_samples as f64);

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || parent_impurity <= 0.0
            || self.n_features == 0;

        if should_stop {
            return Self::leaf(counts, n_samples);
        }

        let n_try = self.max_features.unwrap_or(self.n_features).clamp(1, self.n_features);
        let features: Vec<usize> = if n_try >= self.n_features {
            (0..self.n_features).collect()
        } else {
            sample(rng, self.n_features, n_try).into_vec()
        };

        let Some((best_feature, best_threshold, gain)) =
            self.find_best_split(x, labels, indices, &features, &counts, parent_impurity)
        else {
            return Self::leaf(counts, n_samples);
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, best_feature]] <= best_threshold);

        importances[best_feature] += n_samples as f64 * gain;

        let left = Box::new(self.build_tree(x, labels, &left_indices, depth + 1, importances, rng));
        let right = Box::new(self.build_tree(x, labels, &right_indices, depth + 1, importances, rng));

        TreeNode::Split {
            feature_idx: best_feature,
            threshold: best_threshold,
            left,
            right,
            n_samples,
            impurity: parent_impurity,
        }
    }

    /// Best (feature, threshold, impurity decrease) over the candidate features
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        labels: &[usize],
        indices: &[usize],
        features: &[usize],
        counts: &[f64],
        parent_impurity: f64,
    ) -> Option<(usize, f64, f64)> {
        let n = indices.len() as f64;

        // Parallelize feature scanning: each feature independently finds its best split
        let feature_results: Vec<Option<(usize, f64, f64)>> = features
            .par_iter()
            .map(|&feature_idx| {
                let mut sorted: Vec<(f64, usize)> =
                    indices.iter().map(|&i| (x[[i, feature_idx]], labels[i])).collect();
                sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

                let mut left_counts = vec![0.0; counts.len()];
                let mut best: Option<(f64, f64)> = None;

                for pos in 0..sorted.len() - 1 {
                    left_counts[sorted[pos].1] += 1.0;
                    if sorted[pos].0 == sorted[pos + 1].0 {
                        continue;
                    }

                    let n_left = (pos + 1) as f64;
                    let n_right = n - n_left;
                    if (n_left as usize) < self.min_samples_leaf
                        || (n_right as usize) < self.min_samples_leaf
                    {
                        continue;
                    }

                    let right_counts: Vec<f64> =
                        counts.iter().zip(&left_counts).map(|(t, l)| t - l).collect();
                    let weighted = (n_left * self.criterion.impurity(&left_counts, n_left)
                        + n_right * self.criterion.impurity(&right_counts, n_right))
                        / n;
                    let gain = parent_impurity - weighted;

                    if gain > best.map_or(1e-12, |b| b.1) {
                        best = Some(((sorted[pos].0 + sorted[pos + 1].0) / 2.0, gain));
                    }
                }

                best.map(|(threshold, gain)| (feature_idx, threshold, gain))
            })
            .collect();

        // First feature wins ties so results do not depend on thread scheduling
        feature_results.into_iter().flatten().fold(None, |acc, cand| match acc {
            Some(best) if best.2 >= cand.2 => Some(best),
            _ => Some(cand),
        })
    }

    /// Class distribution per row
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let root = self.root.as_ref().ok_or(HarnessError::ModelNotFitted)?;
        let mut proba = Array2::zeros((x.nrows(), self.n_classes));
        for (i, row) in x.rows().into_iter().enumerate() {
            let mut node = root;
            let distribution = loop {
                match node {
                    TreeNode::Leaf { distribution, .. } => break distribution,
                    TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                        node = if row[*feature_idx] <= *threshold { left.as_ref() } else { right.as_ref() };
                    }
                }
            };
            for (c, &p) in distribution.iter().enumerate() {
                proba[[i, c]] = p;
            }
        }
        Ok(proba)
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get tree depth
    pub fn get_depth(&self) -> usize {
        fn depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => 1 + depth(left).max(depth(right)),
            }
        }
        self.root.as_ref().map_or(0, depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier_simple() {
        let x = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new().with_random_state(1);
        tree.fit(&x, &y, 2).unwrap();

        let proba = tree.predict_proba(&x).unwrap();
        assert_eq!(proba.row(0).to_vec(), vec![1.0, 0.0]);
        assert_eq!(proba.row(3).to_vec(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_max_depth() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let y = array![0.0, 1.0, 0.0, 1.0];

        let mut tree = DecisionTree::new().with_max_depth(2).with_random_state(1);
        tree.fit(&x, &y, 2).unwrap();

        // depth counts levels of nodes, so max_depth 2 allows 3 levels
        assert!(tree.get_depth() <= 3);
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new().with_random_state(1);
        tree.fit(&x, &y, 2).unwrap();

        let importances = tree.feature_importances().unwrap();
        assert!((importances[0] - 1.0).abs() < 1e-12);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_entropy_leaf_distribution() {
        let x = array![[0.0], [0.0], [0.0], [1.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new().with_criterion(Criterion::Entropy).with_random_state(1);
        tree.fit(&x, &y, 2).unwrap();

        let proba = tree.predict_proba(&array![[0.0]]).unwrap();
        assert!((proba[[0, 0]] - 2.0 / 3.0).abs() < 1e-12);
    }
}
