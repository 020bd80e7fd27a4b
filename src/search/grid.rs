//! Cross-validated exhaustive grid search scored by ROC AUC

use crate::error::{HarnessError, Result};
use crate::evaluation::metrics::roc_auc_score;
use crate::preprocessing::ClassBalancer;
use crate::training::{
    format_params, unique_classes, CVSplit, CVStrategy, Classifier, CrossValidator, Estimator,
    ModelFamily, ParamSet, ParameterGrid,
};
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Score of one grid candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateScore {
    pub params: ParamSet,
    /// Mean AUC over the folds that produced a score
    pub mean_auc: f64,
    pub n_folds_scored: usize,
}

/// Outcome of a single grid-search pass
#[derive(Debug, Clone)]
pub struct GridSearchResult {
    pub best_score: f64,
    pub best_params: ParamSet,
    /// Best candidate refit on the whole input
    pub best_estimator: Estimator,
    /// Candidates that scored, in grid order
    pub scores: Vec<CandidateScore>,
    pub n_failed: usize,
}

/// Exhaustive search over a [`ParameterGrid`] with stratified k-fold AUC
#[derive(Debug, Clone)]
pub struct GridSearch {
    family: ModelFamily,
    cv_folds: usize,
    seed: u64,
    /// Applied to the training rows of every fold and to the refit
    balancer: Option<ClassBalancer>,
}

impl GridSearch {
    pub fn new(family: ModelFamily, cv_folds: usize, seed: u64) -> Self {
        Self {
            family,
            cv_folds,
            seed,
            balancer: None,
        }
    }

    pub fn with_balancer(mut self, balancer: Option<ClassBalancer>) -> Self {
        self.balancer = balancer;
        self
    }

    /// Score every candidate and refit the winner
    pub fn fit(&self, grid: &ParameterGrid, x: &Array2<f64>, y: &Array1<f64>) -> Result<GridSearchResult> {
        let classes = unique_classes(y);
        let positive = *classes
            .last()
            .ok_or_else(|| HarnessError::DataError("empty training target".to_string()))?;
        if classes.len() < 2 {
            return Err(HarnessError::SearchFailure(
                "training target holds a single class".to_string(),
            ));
        }

        let folds = self.folds(x.nrows(), y)?;
        let candidates = grid.candidates();

        let results: Vec<Option<CandidateScore>> = candidates
            .par_iter()
            .map(|params| self.score_candidate(params, &folds, x, y, positive))
            .collect();

        let n_failed = results.iter().filter(|r| r.is_none()).count();
        let scores: Vec<CandidateScore> = results.into_iter().flatten().collect();

        // first candidate wins ties
        let best = scores
            .iter()
            .fold(None::<&CandidateScore>, |acc, s| match acc {
                Some(b) if b.mean_auc >= s.mean_auc => Some(b),
                _ => Some(s),
            })
            .ok_or_else(|| {
                HarnessError::SearchFailure(format!(
                    "all {} candidates of {} failed",
                    candidates.len(),
                    self.family
                ))
            })?;

        let mut best_estimator = self.family.build(&best.params, self.seed)?;
        balanced(self.balancer.as_ref(), x.clone(), y.clone(), self.seed)
            .and_then(|(xb, yb)| best_estimator.fit(&xb, &yb))
            .map_err(|e| HarnessError::SearchFailure(format!("refit of best candidate failed: {}", e)))?;

        Ok(GridSearchResult {
            best_score: best.mean_auc,
            best_params: best.params.clone(),
            best_estimator,
            n_failed,
            scores: scores.clone(),
        })
    }

    fn folds(&self, n_samples: usize, y: &Array1<f64>) -> Result<Vec<CVSplit>> {
        let n_splits = if self.cv_folds > n_samples {
            warn!(
                requested = self.cv_folds,
                n_samples, "fewer samples than folds, using one fold per sample"
            );
            n_samples
        } else {
            self.cv_folds
        };

        CrossValidator::new(CVStrategy::StratifiedKFold { n_splits, shuffle: false })
            .split(n_samples, Some(y))
            .map_err(|e| HarnessError::SearchFailure(e.to_string()))
    }

    fn score_candidate(
        &self,
        params: &ParamSet,
        folds: &[CVSplit],
        x: &Array2<f64>,
        y: &Array1<f64>,
        positive: f64,
    ) -> Option<CandidateScore> {
        let template = match self.family.build(params, self.seed) {
            Ok(estimator) => estimator,
            Err(e) => {
                debug!(params = %format_params(params), error = %e, "candidate rejected");
                return None;
            }
        };

        let fold_scores: Vec<f64> = folds
            .iter()
            .filter_map(|fold| match self.score_fold(&template, fold, x, y, positive) {
                Ok(auc) => Some(auc),
                Err(e) => {
                    debug!(fold = fold.fold_idx, error = %e, "fold skipped");
                    None
                }
            })
            .collect();

        if fold_scores.is_empty() {
            debug!(params = %format_params(params), "every fold failed");
            return None;
        }

        let mean_auc = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
        debug!(params = %format_params(params), mean_auc, folds = fold_scores.len(), "candidate scored");
        Some(CandidateScore {
            params: params.clone(),
            mean_auc,
            n_folds_scored: fold_scores.len(),
        })
    }

    fn score_fold(
        &self,
        template: &Estimator,
        fold: &CVSplit,
        x: &Array2<f64>,
        y: &Array1<f64>,
        positive: f64,
    ) -> Result<f64> {
        let (x_train, y_train) = balanced(
            self.balancer.as_ref(),
            x.select(Axis(0), &fold.train_indices),
            y.select(Axis(0), &fold.train_indices),
            self.seed.wrapping_add(fold.fold_idx as u64),
        )?;
        let x_test = x.select(Axis(0), &fold.test_indices);
        let y_test = y.select(Axis(0), &fold.test_indices);

        let mut model = template.clone();
        model.fit(&x_train, &y_train)?;
        let (_, scores) = model.predict_scored(&x_test, positive)?;
        let truth = y_test.mapv(|v| if v == positive { 1.0 } else { 0.0 });
        roc_auc_score(&truth, &scores)
    }
}

fn balanced(
    balancer: Option<&ClassBalancer>,
    x: Array2<f64>,
    y: Array1<f64>,
    seed: u64,
) -> Result<(Array2<f64>, Array1<f64>)> {
    match balancer {
        Some(b) => b.clone().with_seed(seed).fit_resample(&x, &y),
        None => Ok((x, y)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::ParamValue;

    fn separable(n: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((n, 2), |(i, j)| {
            let class = (i % 2) as f64;
            class * 3.0 + (i as f64 * 0.37 + j as f64).sin() * 0.5
        });
        let y = Array1::from_shape_fn(n, |i| (i % 2) as f64);
        (x, y)
    }

    #[test]
    fn test_grid_search_finds_a_model() {
        let (x, y) = separable(40);
        let grid = ModelFamily::LogisticRegression.default_grid();
        let result = GridSearch::new(ModelFamily::LogisticRegression, 5, 42)
            .fit(&grid, &x, &y)
            .unwrap();

        assert!(result.best_score > 0.9);
        assert_eq!(result.scores.len(), 4);
        assert_eq!(result.n_failed, 0);
        assert!(result.best_estimator.predict_proba(&x).is_ok());
    }

    #[test]
    fn test_all_candidates_failing() {
        let (x, y) = separable(20);
        let grid = ParameterGrid::new().with("C", vec![-1.0, -2.0]);
        let err = GridSearch::new(ModelFamily::RbfSvm, 5, 0).fit(&grid, &x, &y).unwrap_err();
        assert!(matches!(err, HarnessError::SearchFailure(_)));
    }

    #[test]
    fn test_ties_keep_first_candidate() {
        let (x, y) = separable(30);
        // max_iter has no effect once converged, so both candidates tie
        let grid = ParameterGrid::new()
            .with("C", vec![1.0])
            .with("max_iter", vec![5000i64, 6000]);
        let result = GridSearch::new(ModelFamily::LogisticRegression, 3, 0)
            .fit(&grid, &x, &y)
            .unwrap();
        assert_eq!(result.best_params.get("max_iter"), Some(&ParamValue::Int(5000)));
    }

    #[test]
    fn test_more_folds_than_samples() {
        let (x, y) = separable(6);
        let grid = ParameterGrid::new().with("C", vec![1.0]);
        let result = GridSearch::new(ModelFamily::LogisticRegression, 15, 0).fit(&grid, &x, &y);
        // leave-one-out folds hold a single class, so none can be scored
        assert!(matches!(result, Err(HarnessError::SearchFailure(_))));
    }
}
