//! One experiment end to end: search, evaluate, aggregate, render

use crate::config::ExperimentConfig;
use crate::error::{HarnessError, Result};
use crate::evaluation::{
    render_roc, AggregateResult, BootstrapScoring, EvaluationRunner, EvaluationTechnique, OptimismCorrection,
    RocArtifacts, RocStyle, RunnerConfig,
};
use crate::preprocessing::Dataset;
use crate::search::{SearchConfig, SearchEngine, StopReason};
use crate::training::{Classifier, Estimator, ModelFamily, ParamSet, ParameterGrid};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::info;

/// What the search and evaluation of one configuration need to know
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationSettings {
    pub model: ModelFamily,
    pub parameters_grid: ParameterGrid,
    pub evaluation_technique: EvaluationTechnique,
    pub splitting_runs: usize,
    pub bootstrap_runs: usize,
    pub test_size: f64,
    pub plot_mean_roc: bool,
    pub roc_color: String,
    pub seed: u64,
    pub enable_parameter_search: bool,
    pub max_refinements: usize,
    pub cv_folds: usize,
    pub bootstrap_scoring: BootstrapScoring,
    pub correction: OptimismCorrection,
}

impl From<&ExperimentConfig> for EvaluationSettings {
    fn from(config: &ExperimentConfig) -> Self {
        Self {
            model: config.model,
            parameters_grid: config.grid(),
            evaluation_technique: config.evaluation_technique,
            splitting_runs: config.splitting_runs,
            bootstrap_runs: config.bootstrap_runs,
            test_size: config.test_size,
            plot_mean_roc: config.plot_mean_roc,
            roc_color: config.roc_color.clone(),
            seed: config.seed,
            enable_parameter_search: config.enable_parameter_search,
            max_refinements: config.max_refinements,
            cv_folds: config.cv_folds,
            bootstrap_scoring: config.bootstrap_scoring,
            correction: config.correction,
        }
    }
}

impl EvaluationSettings {
    fn search_config(&self) -> SearchConfig {
        SearchConfig::new()
            .with_cv_folds(self.cv_folds)
            .with_max_refinements(self.max_refinements)
            .with_refinement(self.enable_parameter_search)
            .with_seed(self.seed)
    }

    fn runner_config(&self) -> RunnerConfig {
        RunnerConfig::new(self.evaluation_technique)
            .with_splitting_runs(self.splitting_runs)
            .with_bootstrap_runs(self.bootstrap_runs)
            .with_test_size(self.test_size)
            .with_seed(self.seed)
            .with_bootstrap_scoring(self.bootstrap_scoring)
    }
}

/// How the hyperparameter search went
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSummary {
    pub best_cv_score: f64,
    pub iterations: usize,
    pub refinements: usize,
    pub stop_reason: StopReason,
}

/// Everything produced for one configuration
#[derive(Debug, Clone)]
pub struct ExperimentRecord {
    pub model: ModelFamily,
    pub best_params: ParamSet,
    pub search: SearchSummary,
    pub evaluation_results: AggregateResult,
    /// Importance per feature name, empty for families without one
    pub feature_importances: BTreeMap<String, f64>,
    /// Winning estimator refit on the training tensors
    pub estimator: Estimator,
    pub roc: RocArtifacts,
    pub duration_secs: f64,
}

impl ExperimentRecord {
    /// Scalar evaluation results rounded to 4 decimals
    pub fn rounded_results(&self) -> Vec<(&'static str, f64)> {
        self.evaluation_results
            .scalars()
            .into_iter()
            .map(|(name, value)| (name, round4(value)))
            .collect()
    }
}

pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Search on the training tensors, then evaluate on the pooled sample
///
/// The dataset's balancer is applied to every fit set of the search folds
/// and of the evaluation runs; scored rows are always original rows.
pub fn run_experiment(data: &Dataset, settings: &EvaluationSettings) -> Result<ExperimentRecord> {
    let start = Instant::now();
    // fail on a bad color before any model is fit
    let style = RocStyle::new(&settings.roc_color, settings.plot_mean_roc)?;

    info!(
        model = %settings.model,
        technique = %settings.evaluation_technique,
        candidates = settings.parameters_grid.n_candidates(),
        "running experiment"
    );

    let search_config = settings.search_config().with_balancer(data.balancer.clone());
    let outcome = SearchEngine::new(settings.model, search_config).run(
        &settings.parameters_grid,
        &data.x_train,
        &data.y_train,
    )?;

    let (x, y) = data.pooled()?;
    let runner_config = settings.runner_config().with_balancer(data.balancer.clone());
    let report = EvaluationRunner::new(settings.model, outcome.best_params.clone(), runner_config).run(&x, &y)?;

    let evaluation_results = AggregateResult::from_runs(
        &report.run_metrics(),
        report.overoptimistic.as_ref(),
        settings.correction,
        report.excluded.len(),
    )?;

    let feature_importances = match report.representative.feature_importances() {
        Some(values) => {
            if values.len() != data.feature_names.len() {
                return Err(HarnessError::ShapeError {
                    expected: format!("{} importances", data.feature_names.len()),
                    actual: format!("{} importances", values.len()),
                });
            }
            data.feature_names.iter().cloned().zip(values.iter().copied()).collect()
        }
        None => BTreeMap::new(),
    };

    let roc = render_roc(&evaluation_results, &style)?;

    info!(
        model = %settings.model,
        auc = evaluation_results.auc,
        accuracy = evaluation_results.accuracy,
        excluded = evaluation_results.n_excluded,
        "experiment finished"
    );

    Ok(ExperimentRecord {
        model: settings.model,
        best_params: outcome.best_params,
        search: SearchSummary {
            best_cv_score: outcome.best_score,
            iterations: outcome.iterations,
            refinements: outcome.refinements,
            stop_reason: outcome.stop_reason,
        },
        evaluation_results,
        feature_importances,
        estimator: outcome.best_estimator,
        roc,
        duration_secs: start.elapsed().as_secs_f64(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::{BalancerType, ClassBalancer};
    use ndarray::{Array1, Array2};

    fn dataset() -> Dataset {
        let make = |n: usize, offset: usize| {
            let x = Array2::from_shape_fn((n, 2), |(i, j)| {
                let k = i + offset;
                (k % 2) as f64 * 2.0 + ((k * 7 + j * 3) % 5) as f64 * 0.3
            });
            let y = Array1::from_shape_fn(n, |i| ((i + offset) % 2) as f64);
            (x, y)
        };
        let (x_train, y_train) = make(40, 0);
        let (x_test, y_test) = make(10, 40);
        Dataset {
            x_train,
            x_test,
            y_train,
            y_test,
            feature_names: vec!["a".to_string(), "b".to_string()],
            class_labels: vec!["0".to_string(), "1".to_string()],
            balancer: None,
        }
    }

    fn settings(model: ModelFamily) -> EvaluationSettings {
        let config = ExperimentConfig::new("y", model)
            .with_splitting_runs(3)
            .with_cv_folds(4)
            .with_parameter_search(false);
        EvaluationSettings::from(&config)
    }

    #[test]
    fn test_run_experiment() {
        let record = run_experiment(&dataset(), &settings(ModelFamily::LogisticRegression)).unwrap();

        assert_eq!(record.evaluation_results.n_runs, 3);
        assert_eq!(record.search.stop_reason, StopReason::SinglePass);
        assert_eq!(record.feature_importances.len(), 2);
        assert!(record.feature_importances.contains_key("a"));
        assert!(record.roc.svg.starts_with("<svg"));
        assert!(!record.roc.png.is_empty());
    }

    #[test]
    fn test_svm_has_no_importances() {
        let record = run_experiment(&dataset(), &settings(ModelFamily::RbfSvm)).unwrap();
        assert!(record.feature_importances.is_empty());
    }

    #[test]
    fn test_bad_color_fails_early() {
        let mut s = settings(ModelFamily::LogisticRegression);
        s.roc_color = "not-a-color".to_string();
        assert!(run_experiment(&dataset(), &s).is_err());
    }

    #[test]
    fn test_run_with_balancer() {
        let mut data = dataset();
        data.balancer = Some(ClassBalancer::new(BalancerType::RandomOversampling));
        let record = run_experiment(&data, &settings(ModelFamily::LogisticRegression)).unwrap();
        assert_eq!(record.evaluation_results.n_runs + record.evaluation_results.n_excluded, 3);
    }

    #[test]
    fn test_round4() {
        assert_eq!(round4(0.123456), 0.1235);
        assert_eq!(round4(1.0), 1.0);
    }
}
