//! Cross-validation splitters

use crate::error::{HarnessError, Result};
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cross-validation strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CVStrategy {
    /// K-Fold cross-validation
    KFold { n_splits: usize, shuffle: bool },
    /// Stratified K-Fold (maintains class distribution)
    StratifiedKFold { n_splits: usize, shuffle: bool },
}

impl Default for CVStrategy {
    fn default() -> Self {
        CVStrategy::StratifiedKFold { n_splits: 15, shuffle: false }
    }
}

/// A single train/test split
#[derive(Debug, Clone)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Cross-validation splitter
pub struct CrossValidator {
    strategy: CVStrategy,
    random_state: Option<u64>,
}

impl CrossValidator {
    pub fn new(strategy: CVStrategy) -> Self {
        Self {
            strategy,
            random_state: None,
        }
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Generate train/test splits
    pub fn split(&self, n_samples: usize, y: Option<&Array1<f64>>) -> Result<Vec<CVSplit>> {
        match &self.strategy {
            CVStrategy::KFold { n_splits, shuffle } => {
                self.k_fold_split(n_samples, *n_splits, *shuffle)
            }
            CVStrategy::StratifiedKFold { n_splits, shuffle } => {
                let y = y.ok_or_else(|| {
                    HarnessError::ValidationError(
                        "StratifiedKFold requires target array".to_string(),
                    )
                })?;
                self.stratified_k_fold_split(n_samples, y, *n_splits, *shuffle)
            }
        }
    }

    fn rng(&self) -> ChaCha8Rng {
        match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        }
    }

    fn check_sizes(n_samples: usize, n_splits: usize) -> Result<()> {
        if n_splits < 2 {
            return Err(HarnessError::ValidationError(
                "n_splits must be at least 2".to_string(),
            ));
        }
        if n_samples < n_splits {
            return Err(HarnessError::ValidationError(format!(
                "n_samples ({}) must be >= n_splits ({})",
                n_samples, n_splits
            )));
        }
        Ok(())
    }

    fn k_fold_split(&self, n_samples: usize, n_splits: usize, shuffle: bool) -> Result<Vec<CVSplit>> {
        Self::check_sizes(n_samples, n_splits)?;

        let mut indices: Vec<usize> = (0..n_samples).collect();
        if shuffle {
            indices.shuffle(&mut self.rng());
        }

        let base = n_samples / n_splits;
        let remainder = n_samples % n_splits;

        let mut splits = Vec::with_capacity(n_splits);
        let mut current = 0;

        for fold_idx in 0..n_splits {
            let fold_size = if fold_idx < remainder { base + 1 } else { base };
            let test_indices: Vec<usize> = indices[current..current + fold_size].to_vec();
            let train_indices: Vec<usize> = indices[..current]
                .iter()
                .chain(indices[current + fold_size..].iter())
                .copied()
                .collect();

            splits.push(CVSplit {
                train_indices,
                test_indices,
                fold_idx,
            });

            current += fold_size;
        }

        Ok(splits)
    }

    fn stratified_k_fold_split(
        &self,
        n_samples: usize,
        y: &Array1<f64>,
        n_splits: usize,
        shuffle: bool,
    ) -> Result<Vec<CVSplit>> {
        Self::check_sizes(n_samples, n_splits)?;
        if y.len() != n_samples {
            return Err(HarnessError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }

        // Group samples by class, ordered by label
        let mut class_indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (idx, &val) in y.iter().enumerate() {
            class_indices.entry(val.round() as i64).or_default().push(idx);
        }

        if shuffle {
            let mut rng = self.rng();
            for indices in class_indices.values_mut() {
                indices.shuffle(&mut rng);
            }
        }

        // Deal each class round-robin, continuing where the previous class stopped
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); n_splits];
        let mut offset = 0;
        for indices in class_indices.values() {
            for &idx in indices {
                folds[offset % n_splits].push(idx);
                offset += 1;
            }
        }

        let mut splits = Vec::with_capacity(n_splits);
        for fold_idx in 0..n_splits {
            let mut test_indices = folds[fold_idx].clone();
            test_indices.sort_unstable();
            let mut train_indices: Vec<usize> = folds
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != fold_idx)
                .flat_map(|(_, f)| f.iter().copied())
                .collect();
            train_indices.sort_unstable();

            splits.push(CVSplit {
                train_indices,
                test_indices,
                fold_idx,
            });
        }

        Ok(splits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_k_fold() {
        let cv = CrossValidator::new(CVStrategy::KFold { n_splits: 5, shuffle: false });
        let splits = cv.split(100, None).unwrap();

        assert_eq!(splits.len(), 5);
        for split in &splits {
            assert_eq!(split.test_indices.len(), 20);
            assert_eq!(split.train_indices.len(), 80);
        }

        let mut all_test: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        all_test.sort();
        assert_eq!(all_test, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_stratified_k_fold() {
        let y = Array1::from_vec(vec![0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0]);

        let cv = CrossValidator::new(CVStrategy::StratifiedKFold { n_splits: 5, shuffle: false });
        let splits = cv.split(10, Some(&y)).unwrap();

        assert_eq!(splits.len(), 5);
        for split in &splits {
            assert_eq!(split.test_indices.len(), 2);
            let positives = split.test_indices.iter().filter(|&&i| y[i] > 0.5).count();
            assert_eq!(positives, 1);
        }
    }

    #[test]
    fn test_stratified_balances_fold_sizes() {
        // 7 + 8 samples over 15 folds: every fold gets exactly one sample
        let y = Array1::from_vec((0..15).map(|i| if i < 7 { 0.0 } else { 1.0 }).collect());
        let cv = CrossValidator::new(CVStrategy::default());
        let splits = cv.split(15, Some(&y)).unwrap();
        assert!(splits.iter().all(|s| s.test_indices.len() == 1));
    }

    #[test]
    fn test_too_few_samples() {
        let cv = CrossValidator::new(CVStrategy::KFold { n_splits: 15, shuffle: false });
        assert!(cv.split(10, None).is_err());
    }

    #[test]
    fn test_shuffle_is_seeded() {
        let cv = |seed| {
            CrossValidator::new(CVStrategy::KFold { n_splits: 4, shuffle: true })
                .with_random_state(seed)
                .split(40, None)
                .unwrap()
        };
        assert_eq!(cv(7)[0].test_indices, cv(7)[0].test_indices);
    }
}
