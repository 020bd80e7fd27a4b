//! Random Forest classifier

use crate::error::{HarnessError, Result};
use super::decision_tree::{Criterion, DecisionTree};
use super::models::{check_lengths, unique_classes, Classifier};
use ndarray::{Array1, Array2};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Strategy for max features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Square root of n_features
    Sqrt,
    /// Log2 of n_features
    Log2,
    /// Fraction of n_features
    Fraction(f64),
    /// All features
    All,
}

/// Random Forest model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    /// Individual trees
    trees: Vec<DecisionTree>,
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features considered at each split
    pub max_features: MaxFeatures,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Random state
    pub random_state: Option<u64>,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
    /// Number of features
    n_features: usize,
    /// Sorted class labels
    classes: Vec<f64>,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForest {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            criterion: Criterion::Gini,
            random_state: None,
            feature_importances: None,
            n_features: 0,
            classes: Vec::new(),
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

    /// Set max features strategy
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    fn compute_max_features(&self, n_features: usize) -> usize {
        match self.max_features {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().ceil() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).ceil() as usize,
            MaxFeatures::All => n_features,
        }
        .clamp(1, n_features.max(1))
    }

    /// Get number of trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn compute_feature_importances(&mut self) {
        let mut total_importances = vec![0.0; self.n_features];

        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                for (total, &val) in total_importances.iter_mut().zip(imp.iter()) {
                    *total += val;
                }
            }
        }

        // Normalize
        let total: f64 = total_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut total_importances {
                *imp /= total;
            }
        }

        self.feature_importances = Some(Array1::from_vec(total_importances));
    }
}

impl Classifier for RandomForest {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_lengths(x, y)?;
        if self.n_estimators == 0 {
            return Err(HarnessError::invalid_param("n_estimators", 0, "must be at least 1"));
        }

        let n_samples = x.nrows();
        let n_features = x.ncols();
        self.n_features = n_features;
        self.classes = unique_classes(y);
        let n_classes = self.classes.len();

        // Class index per sample
        let y_idx: Array1<f64> = y.mapv(|v| {
            self.classes
                .binary_search_by(|c| c.total_cmp(&v))
                .unwrap_or(0) as f64
        });

        let max_features = self.compute_max_features(n_features);
        let base_seed = self.random_state.unwrap_or(42);

        // Build trees in parallel
        let trees: Vec<DecisionTree> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let seed = base_seed.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                let sample_indices: Vec<usize> = if self.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };

                let x_boot = x.select(ndarray::Axis(0), &sample_indices);
                let y_boot: Array1<f64> = sample_indices.iter().map(|&i| y_idx[i]).collect();

                let mut tree = DecisionTree::new()
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_criterion(self.criterion)
                    .with_max_features(max_features)
                    .with_random_state(seed.wrapping_mul(31).wrapping_add(7));
                if let Some(d) = self.max_depth {
                    tree = tree.with_max_depth(d);
                }

                tree.fit(&x_boot, &y_boot, n_classes)?;
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        self.trees = trees;
        self.compute_feature_importances();
        Ok(())
    }

    /// Mean of the per-tree class distributions
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(HarnessError::ModelNotFitted);
        }

        let per_tree: Vec<Array2<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict_proba(x))
            .collect::<Result<Vec<_>>>()?;

        let mut proba = Array2::zeros((x.nrows(), self.classes.len()));
        for p in &per_tree {
            proba += p;
        }
        proba /= per_tree.len() as f64;
        Ok(proba)
    }

    fn classes(&self) -> &[f64] {
        &self.classes
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.feature_importances.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier() {
        let x = array![
            [0.0, 0.0],
            [0.1, 0.1],
            [0.2, 0.2],
            [1.0, 1.0],
            [1.1, 1.1],
            [1.2, 1.2],
        ];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut rf = RandomForest::new(10).with_random_state(42);
        rf.fit(&x, &y).unwrap();

        let predictions = rf.predict(&x).unwrap();
        let accuracy = predictions
            .iter()
            .zip(y.iter())
            .filter(|(p, a)| (*p - *a).abs() < 0.5)
            .count() as f64
            / y.len() as f64;

        assert!(accuracy >= 0.8, "Accuracy too low: {}", accuracy);
    }

    #[test]
    fn test_predict_proba_multiclass() {
        let x = array![[0.0], [0.1], [1.0], [1.1], [2.0], [2.1]];
        let y = array![5.0, 5.0, 6.0, 6.0, 9.0, 9.0];

        let mut rf = RandomForest::new(20).with_random_state(42);
        rf.fit(&x, &y).unwrap();

        assert_eq!(rf.classes(), &[5.0, 6.0, 9.0]);
        assert_eq!(rf.n_trees(), 20);
        let proba = rf.predict_proba(&x).unwrap();
        assert_eq!(proba.ncols(), 3);
        for i in 0..proba.nrows() {
            let row_sum: f64 = proba.row(i).sum();
            assert!((row_sum - 1.0).abs() < 1e-6, "Row {} sum: {}", i, row_sum);
        }
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut rf = RandomForest::new(10)
            .with_max_features(MaxFeatures::All)
            .with_random_state(42);
        rf.fit(&x, &y).unwrap();

        let importances = Classifier::feature_importances(&rf).unwrap();
        assert_eq!(importances.len(), 2);
        assert!(importances[0] >= importances[1]);
    }

    #[test]
    fn test_same_seed_same_forest() {
        let x = array![[0.0, 1.0], [0.5, 0.2], [1.0, 0.7], [1.5, 0.1], [2.0, 0.9], [2.5, 0.3]];
        let y = array![0.0, 1.0, 0.0, 1.0, 1.0, 0.0];

        let fit = || {
            let mut rf = RandomForest::new(8).with_random_state(3);
            rf.fit(&x, &y).unwrap();
            rf.predict_proba(&x).unwrap()
        };
        assert_eq!(fit(), fit());
    }
}
