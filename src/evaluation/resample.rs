//! Seeded resampling of row indices

use crate::error::{HarnessError, Result};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Fit and scoring rows of one evaluation run
#[derive(Debug, Clone, PartialEq)]
pub struct Resample {
    pub fit_indices: Vec<usize>,
    pub score_indices: Vec<usize>,
}

/// Shuffled split holding out `ceil(test_size * n)` rows
pub fn train_test_split(n_samples: usize, test_size: f64, seed: u64) -> Result<Resample> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(HarnessError::invalid_param("test_size", test_size, "must be in (0, 1)"));
    }
    if n_samples < 2 {
        return Err(HarnessError::DataError(format!(
            "cannot split {} samples into train and test",
            n_samples
        )));
    }

    let n_test = ((n_samples as f64 * test_size - 1e-9).ceil() as usize).clamp(1, n_samples - 1);

    let mut indices: Vec<usize> = (0..n_samples).collect();
    indices.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));

    let score_indices = indices[..n_test].to_vec();
    let fit_indices = indices[n_test..].to_vec();
    Ok(Resample { fit_indices, score_indices })
}

/// `n` draws with replacement; the scoring rows are the out-of-bag complement
pub fn bootstrap(n_samples: usize, seed: u64) -> Result<Resample> {
    if n_samples == 0 {
        return Err(HarnessError::DataError("cannot bootstrap an empty sample".to_string()));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let fit_indices: Vec<usize> = (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();

    let mut in_bag = vec![false; n_samples];
    for &i in &fit_indices {
        in_bag[i] = true;
    }
    let score_indices = (0..n_samples).filter(|&i| !in_bag[i]).collect();

    Ok(Resample { fit_indices, score_indices })
}
