//! Class balancing of fit sets

use crate::error::{HarnessError, Result};
use crate::training::unique_classes;
use super::BalancerType;
use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::debug;

/// Ordered float for BinaryHeap-based partial sort
#[derive(Debug, Clone, Copy)]
struct DistIdx(f64, usize);

impl PartialEq for DistIdx {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for DistIdx {}
impl PartialOrd for DistIdx {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DistIdx {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.partial_cmp(&other.0).unwrap_or(Ordering::Equal)
    }
}

/// Resamples rows until every class has the same count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassBalancer {
    balancer_type: BalancerType,
    /// Number of nearest neighbors for SMOTE
    k_neighbors: usize,
    seed: u64,
}

impl ClassBalancer {
    pub fn new(balancer_type: BalancerType) -> Self {
        Self {
            balancer_type,
            k_neighbors: 5,
            seed: 42,
        }
    }

    pub fn with_k_neighbors(mut self, k: usize) -> Self {
        self.k_neighbors = k.max(1);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Balanced copy of `(x, y)`; original rows come first, in order
    pub fn fit_resample(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(Array2<f64>, Array1<f64>)> {
        let classes = unique_classes(y);
        if classes.len() < 2 {
            return Err(HarnessError::ValidationError(
                "Need at least 2 classes for class balancing".to_string(),
            ));
        }

        let by_class: Vec<Vec<usize>> = classes
            .iter()
            .map(|&c| (0..y.len()).filter(|&i| y[i] == c).collect())
            .collect();
        let mut rng = StdRng::seed_from_u64(self.seed);

        let (x_out, y_out) = match self.balancer_type {
            BalancerType::RandomUndersampling => {
                let min_count = by_class.iter().map(Vec::len).min().unwrap_or(0);
                let mut keep: Vec<usize> = Vec::with_capacity(min_count * classes.len());
                for rows in &by_class {
                    keep.extend(rows.choose_multiple(&mut rng, min_count).copied());
                }
                keep.sort_unstable();
                (x.select(Axis(0), &keep), y.select(Axis(0), &keep))
            }
            BalancerType::RandomOversampling => {
                let max_count = by_class.iter().map(Vec::len).max().unwrap_or(0);
                let mut extra: Vec<usize> = Vec::new();
                for rows in &by_class {
                    for _ in rows.len()..max_count {
                        extra.push(rows[rng.gen_range(0..rows.len())]);
                    }
                }
                let all: Vec<usize> = (0..y.len()).chain(extra).collect();
                (x.select(Axis(0), &all), y.select(Axis(0), &all))
            }
            BalancerType::Smote => self.smote(x, y, &classes, &by_class, &mut rng)?,
        };

        debug!(
            balancer = %self.balancer_type,
            before = y.len(),
            after = y_out.len(),
            "balanced fit set"
        );
        Ok((x_out, y_out))
    }

    fn smote(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        classes: &[f64],
        by_class: &[Vec<usize>],
        rng: &mut StdRng,
    ) -> Result<(Array2<f64>, Array1<f64>)> {
        let max_count = by_class.iter().map(Vec::len).max().unwrap_or(0);
        let mut synthetic_x: Vec<f64> = Vec::new();
        let mut synthetic_y: Vec<f64> = Vec::new();

        for (&class, rows) in classes.iter().zip(by_class) {
            let n_to_generate = max_count - rows.len();
            if n_to_generate == 0 {
                continue;
            }
            if rows.len() < 2 {
                return Err(HarnessError::DataError(format!(
                    "SMOTE needs at least 2 samples of class {}",
                    class
                )));
            }

            let k = self.k_neighbors.min(rows.len() - 1);
            let neighbors: Vec<Vec<usize>> = rows
                .iter()
                .map(|&r| find_neighbors(x, r, rows, k))
                .collect();

            for _ in 0..n_to_generate {
                let pick = rng.gen_range(0..rows.len());
                let neighbor = neighbors[pick][rng.gen_range(0..neighbors[pick].len())];
                let gap: f64 = rng.gen();
                let point = x.row(rows[pick]);
                let other = x.row(neighbor);
                synthetic_x.extend(point.iter().zip(other.iter()).map(|(&p, &n)| p + gap * (n - p)));
                synthetic_y.push(class);
            }
        }

        let n_synthetic = synthetic_y.len();
        let synthetic = Array2::from_shape_vec((n_synthetic, x.ncols()), synthetic_x)?;
        let x_out = ndarray::concatenate(Axis(0), &[x.view(), synthetic.view()])?;
        let y_out = y.iter().copied().chain(synthetic_y).collect();
        Ok((x_out, y_out))
    }
}

/// The `k` rows of `candidates` closest to `row`, excluding itself
fn find_neighbors(x: &Array2<f64>, row: usize, candidates: &[usize], k: usize) -> Vec<usize> {
    let point = x.row(row);
    let mut heap: BinaryHeap<DistIdx> = BinaryHeap::with_capacity(k + 1);

    for &c in candidates {
        if c == row {
            continue;
        }
        let dist: f64 = point
            .iter()
            .zip(x.row(c).iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum();
        if heap.len() < k {
            heap.push(DistIdx(dist, c));
        } else if let Some(&DistIdx(max_dist, _)) = heap.peek() {
            if dist < max_dist {
                heap.pop();
                heap.push(DistIdx(dist, c));
            }
        }
    }

    heap.into_iter().map(|DistIdx(_, i)| i).collect()
}
