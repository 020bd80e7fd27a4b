//! Adaptive grid refinement driven by cross-validated AUC

use crate::error::Result;
use crate::training::{format_params, Estimator, ModelFamily, ParamSet, ParameterGrid};
use crate::preprocessing::ClassBalancer;
use super::grid::{GridSearch, GridSearchResult};
use super::refine::modify_grid_params;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Hard ceiling on accepted states; a score rounded to 2 decimals can improve at most this often
pub const MAX_ACCEPTED_STATES: usize = 101;

/// Configuration for the search engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Folds of the stratified cross-validation
    pub cv_folds: usize,
    /// Cap on accepted refined grids
    pub max_refinements: usize,
    /// When false a single grid pass is run
    pub enable_refinement: bool,
    /// Seed handed to every estimator
    pub seed: u64,
    /// Balancer for the training rows of every fold
    pub balancer: Option<ClassBalancer>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            cv_folds: 15,
            max_refinements: 20,
            enable_refinement: true,
            seed: 42,
            balancer: None,
        }
    }
}

impl SearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    pub fn with_max_refinements(mut self, max: usize) -> Self {
        self.max_refinements = max;
        self
    }

    pub fn with_refinement(mut self, enabled: bool) -> Self {
        self.enable_refinement = enabled;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_balancer(mut self, balancer: Option<ClassBalancer>) -> Self {
        self.balancer = balancer;
        self
    }

    fn refinement_cap(&self) -> usize {
        self.max_refinements.min(MAX_ACCEPTED_STATES - 1)
    }
}

/// Why the search stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The rounded score did not improve on the last accepted state
    NoImprovement,
    /// The configured number of accepted refinements was reached
    RefinementCap,
    /// Refinement disabled, one grid pass was run
    SinglePass,
    /// A refined grid had no candidate that could be scored
    RefinementFailed,
}

/// Last accepted point of the search
#[derive(Debug, Clone)]
pub struct SearchState {
    pub grid: ParameterGrid,
    pub best_score: f64,
    pub best_params: ParamSet,
    pub best_estimator: Estimator,
}

/// Result of [`SearchEngine::run`]
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub best_score: f64,
    pub best_params: ParamSet,
    pub best_estimator: Estimator,
    /// Grid of the last accepted pass
    pub final_grid: ParameterGrid,
    /// Grid passes run, including the rejected last one
    pub iterations: usize,
    /// Refined grids that were accepted
    pub refinements: usize,
    pub stop_reason: StopReason,
    pub duration_secs: f64,
}

impl SearchOutcome {
    fn from_state(state: SearchState, iterations: usize, refinements: usize, stop_reason: StopReason, start: Instant) -> Self {
        Self {
            best_score: state.best_score,
            best_params: state.best_params,
            best_estimator: state.best_estimator,
            final_grid: state.grid,
            iterations,
            refinements,
            stop_reason,
            duration_secs: start.elapsed().as_secs_f64(),
        }
    }
}

/// Repeated grid search that narrows numeric entries around the optimum
pub struct SearchEngine {
    family: ModelFamily,
    config: SearchConfig,
}

impl SearchEngine {
    pub fn new(family: ModelFamily, config: SearchConfig) -> Self {
        Self { family, config }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Search `grid` on the training tensors from a 0.0 baseline
    pub fn run(&self, grid: &ParameterGrid, x: &Array2<f64>, y: &Array1<f64>) -> Result<SearchOutcome> {
        self.run_from(grid, 0.0, x, y)
    }

    /// Search `grid`, accepting passes that beat `baseline`
    ///
    /// A pass is accepted while `round(score, 2)` beats the last accepted
    /// score; every acceptance refines the grid and runs another pass. When
    /// the first pass does not beat `baseline` it is returned as is. Fails
    /// with `SearchFailure` only when the first pass has no scorable candidate.
    pub fn run_from(
        &self,
        grid: &ParameterGrid,
        baseline: f64,
        x: &Array2<f64>,
        y: &Array1<f64>,
    ) -> Result<SearchOutcome> {
        let search = GridSearch::new(self.family, self.config.cv_folds, self.config.seed)
            .with_balancer(self.config.balancer.clone());
        self.drive(grid, baseline, |g| search.fit(g, x, y))
    }

    /// The accept-refine loop over any grid pass
    fn drive<F>(&self, grid: &ParameterGrid, baseline: f64, mut pass: F) -> Result<SearchOutcome>
    where
        F: FnMut(&ParameterGrid) -> Result<GridSearchResult>,
    {
        let start = Instant::now();
        let cap = self.config.refinement_cap();

        info!(
            model = %self.family,
            candidates = grid.n_candidates(),
            refinement = self.config.enable_refinement,
            "starting hyperparameter search"
        );

        let first = pass(grid)?;
        let mut iterations = 1;
        let mut state = SearchState {
            grid: grid.clone(),
            best_score: first.best_score,
            best_params: first.best_params,
            best_estimator: first.best_estimator,
        };

        if !self.config.enable_refinement {
            return Ok(self.finish(state, iterations, 0, StopReason::SinglePass, start));
        }
        if round2(state.best_score) <= round2(baseline) {
            return Ok(self.finish(state, iterations, 0, StopReason::NoImprovement, start));
        }

        let mut refinements = 0;
        loop {
            if refinements >= cap {
                return Ok(self.finish(state, iterations, refinements, StopReason::RefinementCap, start));
            }

            let next_grid = modify_grid_params(&state.grid, &state.best_params, self.family);
            debug!(grid = ?next_grid, "refined grid");

            iterations += 1;
            let result = match pass(&next_grid) {
                Ok(result) => result,
                Err(e) => {
                    warn!(error = %e, "refined grid could not be scored, keeping last accepted state");
                    return Ok(self.finish(state, iterations, refinements, StopReason::RefinementFailed, start));
                }
            };

            if round2(result.best_score) > round2(state.best_score) {
                debug!(
                    score = result.best_score,
                    params = %format_params(&result.best_params),
                    "refinement accepted"
                );
                state = SearchState {
                    grid: next_grid,
                    best_score: result.best_score,
                    best_params: result.best_params,
                    best_estimator: result.best_estimator,
                };
                refinements += 1;
            } else {
                return Ok(self.finish(state, iterations, refinements, StopReason::NoImprovement, start));
            }
        }
    }

    fn finish(
        &self,
        state: SearchState,
        iterations: usize,
        refinements: usize,
        stop_reason: StopReason,
        start: Instant,
    ) -> SearchOutcome {
        let outcome = SearchOutcome::from_state(state, iterations, refinements, stop_reason, start);
        info!(
            model = %self.family,
            best_score = outcome.best_score,
            params = %format_params(&outcome.best_params),
            iterations,
            refinements,
            stop = ?stop_reason,
            "hyperparameter search finished"
        );
        outcome
    }
}

/// Round half away from zero to 2 decimals
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
