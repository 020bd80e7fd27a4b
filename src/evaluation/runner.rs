//! Repeated refit-and-score under a resampling technique

use crate::error::{HarnessError, Result};
use crate::preprocessing::ClassBalancer;
use crate::training::{unique_classes, Classifier, Estimator, ModelFamily, ParamSet};
use super::metrics::RunMetrics;
use super::resample::{bootstrap, train_test_split, Resample};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Resampling scheme of an evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EvaluationTechnique {
    /// Fresh seeded train/test split per run
    #[default]
    #[serde(rename = "train_test")]
    TrainTest,
    /// Bootstrap fit set per run
    #[serde(rename = "bootstrap")]
    Bootstrap,
    /// Full-sample fit plus out-of-bag bootstrap runs
    #[serde(rename = ".632+")]
    Point632Plus,
}

impl EvaluationTechnique {
    pub const ALL: [EvaluationTechnique; 3] = [
        EvaluationTechnique::TrainTest,
        EvaluationTechnique::Bootstrap,
        EvaluationTechnique::Point632Plus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluationTechnique::TrainTest => "train_test",
            EvaluationTechnique::Bootstrap => "bootstrap",
            EvaluationTechnique::Point632Plus => ".632+",
        }
    }
}

impl FromStr for EvaluationTechnique {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        EvaluationTechnique::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                HarnessError::invalid_param(
                    "evaluation_technique",
                    s,
                    "expected train_test, bootstrap or .632+",
                )
            })
    }
}

impl fmt::Display for EvaluationTechnique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rows a bootstrap run is scored on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BootstrapScoring {
    /// Rows never drawn into the fit set
    #[default]
    OutOfBag,
    /// The full original sample
    InBag,
}

impl FromStr for BootstrapScoring {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "out_of_bag" => Ok(BootstrapScoring::OutOfBag),
            "in_bag" => Ok(BootstrapScoring::InBag),
            other => Err(HarnessError::invalid_param(
                "bootstrap_scoring",
                other,
                "expected out_of_bag or in_bag",
            )),
        }
    }
}

/// Run counts and sampling parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    pub technique: EvaluationTechnique,
    pub splitting_runs: usize,
    pub bootstrap_runs: usize,
    pub test_size: f64,
    pub seed: u64,
    pub bootstrap_scoring: BootstrapScoring,
    /// Applied to the fit rows of every run after resampling
    pub balancer: Option<ClassBalancer>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            technique: EvaluationTechnique::TrainTest,
            splitting_runs: 10,
            bootstrap_runs: 10,
            test_size: 0.2,
            seed: 42,
            bootstrap_scoring: BootstrapScoring::OutOfBag,
            balancer: None,
        }
    }
}

impl RunnerConfig {
    pub fn new(technique: EvaluationTechnique) -> Self {
        Self {
            technique,
            ..Default::default()
        }
    }

    pub fn with_splitting_runs(mut self, runs: usize) -> Self {
        self.splitting_runs = runs;
        self
    }

    pub fn with_bootstrap_runs(mut self, runs: usize) -> Self {
        self.bootstrap_runs = runs;
        self
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_bootstrap_scoring(mut self, scoring: BootstrapScoring) -> Self {
        self.bootstrap_scoring = scoring;
        self
    }

    pub fn with_balancer(mut self, balancer: Option<ClassBalancer>) -> Self {
        self.balancer = balancer;
        self
    }

    fn n_runs(&self) -> usize {
        match self.technique {
            EvaluationTechnique::TrainTest => self.splitting_runs,
            EvaluationTechnique::Bootstrap | EvaluationTechnique::Point632Plus => self.bootstrap_runs,
        }
    }
}

/// Metrics of one scored run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRun {
    pub index: usize,
    /// Fit rows after balancing
    pub n_fit: usize,
    pub n_scored: usize,
    pub metrics: RunMetrics,
}

/// Everything the runner learned about one configuration
#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub technique: EvaluationTechnique,
    /// Successful runs in run order
    pub runs: Vec<EvaluationRun>,
    /// Full-sample fit scored on the full sample, `.632+` only
    pub overoptimistic: Option<RunMetrics>,
    /// Indices of runs excluded as degenerate
    pub excluded: Vec<usize>,
    /// Estimator whose feature importances are reported
    pub representative: Estimator,
}

impl EvaluationReport {
    pub fn run_metrics(&self) -> Vec<RunMetrics> {
        self.runs.iter().map(|r| r.metrics.clone()).collect()
    }
}

/// Refits a fixed hyperparameter assignment under a resampling scheme
pub struct EvaluationRunner {
    family: ModelFamily,
    params: ParamSet,
    config: RunnerConfig,
}

impl EvaluationRunner {
    pub fn new(family: ModelFamily, params: ParamSet, config: RunnerConfig) -> Self {
        Self { family, params, config }
    }

    /// Evaluate on the pooled sample `(x, y)`
    pub fn run(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<EvaluationReport> {
        if x.nrows() != y.len() {
            return Err(HarnessError::ShapeError {
                expected: format!("{} targets", x.nrows()),
                actual: format!("{} targets", y.len()),
            });
        }
        let classes = unique_classes(y);
        if classes.len() < 2 {
            return Err(HarnessError::EvaluationError(
                "pooled sample holds a single class".to_string(),
            ));
        }
        // highest label is the positive class of the ROC curve
        let positive = classes[classes.len() - 1];

        let n_runs = self.config.n_runs();
        if n_runs == 0 {
            return Err(HarnessError::invalid_param(
                "runs",
                0,
                "at least one evaluation run is required",
            ));
        }

        info!(
            model = %self.family,
            technique = %self.config.technique,
            runs = n_runs,
            samples = x.nrows(),
            "starting evaluation"
        );

        let mut representative = None;
        let overoptimistic = match self.config.technique {
            EvaluationTechnique::Point632Plus => {
                let all: Vec<usize> = (0..x.nrows()).collect();
                let resample = Resample {
                    fit_indices: all.clone(),
                    score_indices: all,
                };
                let rows = self
                    .run_rows(x, y, &resample, self.config.seed)
                    .map_err(|reason| HarnessError::EvaluationError(format!("full-sample fit: {}", reason)))?;
                let (metrics, model) = self.fit_and_score(&rows, positive, self.config.seed)?;
                debug!(auc = metrics.auc, "overoptimistic full-sample fit");
                representative = Some(model);
                Some(metrics)
            }
            _ => None,
        };

        let mut runs = Vec::with_capacity(n_runs);
        let mut excluded = Vec::new();

        for index in 0..n_runs {
            let seed = self.config.seed.wrapping_add(index as u64);
            let resample = self.resample(x.nrows(), seed)?;

            let rows = match self.run_rows(x, y, &resample, seed) {
                Ok(rows) => rows,
                Err(reason) => {
                    let err = HarnessError::DegenerateRun { run: index, reason };
                    warn!(run = index, error = %err, "run excluded");
                    excluded.push(index);
                    continue;
                }
            };

            let (metrics, model) = self.fit_and_score(&rows, positive, seed)?;
            debug!(
                run = index,
                accuracy = metrics.accuracy,
                auc = metrics.auc,
                "run scored"
            );
            if representative.is_none() {
                representative = Some(model);
            }
            runs.push(EvaluationRun {
                index,
                n_fit: rows.y_fit.len(),
                n_scored: rows.y_score.len(),
                metrics,
            });
        }

        let representative = match representative {
            Some(model) if !runs.is_empty() => model,
            _ => {
                return Err(HarnessError::EvaluationError(format!(
                    "all {} runs were degenerate",
                    n_runs
                )))
            }
        };

        info!(scored = runs.len(), excluded = excluded.len(), "evaluation finished");
        Ok(EvaluationReport {
            technique: self.config.technique,
            runs,
            overoptimistic,
            excluded,
            representative,
        })
    }

    fn resample(&self, n_samples: usize, seed: u64) -> Result<Resample> {
        match self.config.technique {
            EvaluationTechnique::TrainTest => train_test_split(n_samples, self.config.test_size, seed),
            EvaluationTechnique::Point632Plus => bootstrap(n_samples, seed),
            EvaluationTechnique::Bootstrap => {
                let mut sample = bootstrap(n_samples, seed)?;
                if self.config.bootstrap_scoring == BootstrapScoring::InBag {
                    sample.score_indices = (0..n_samples).collect();
                }
                Ok(sample)
            }
        }
    }

    /// Rows of one run, or why the run cannot be scored
    ///
    /// Balancing only ever touches the fit rows, so a scored row never has a
    /// balanced copy in its own fit set.
    fn run_rows(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        resample: &Resample,
        seed: u64,
    ) -> std::result::Result<RunRows, String> {
        let y_score = y.select(Axis(0), &resample.score_indices);
        if unique_classes(&y_score).len() < 2 {
            return Err(format!("scoring set of {} rows holds a single class", y_score.len()));
        }
        let y_fit = y.select(Axis(0), &resample.fit_indices);
        if unique_classes(&y_fit).len() < 2 {
            return Err("fit set holds a single class".to_string());
        }
        let x_fit = x.select(Axis(0), &resample.fit_indices);

        let (x_fit, y_fit) = match &self.config.balancer {
            Some(balancer) => balancer
                .clone()
                .with_seed(seed)
                .fit_resample(&x_fit, &y_fit)
                .map_err(|e| format!("fit set could not be balanced: {}", e))?,
            None => (x_fit, y_fit),
        };

        Ok(RunRows {
            x_fit,
            y_fit,
            x_score: x.select(Axis(0), &resample.score_indices),
            y_score,
        })
    }

    /// Fit a fresh estimator on the fit rows and score it on the scoring rows
    fn fit_and_score(&self, rows: &RunRows, positive: f64, seed: u64) -> Result<(RunMetrics, Estimator)> {
        let mut model = self.family.build(&self.params, seed)?;
        model.fit(&rows.x_fit, &rows.y_fit)?;
        let (predicted, scores) = model.predict_scored(&rows.x_score, positive)?;
        let metrics = RunMetrics::compute(&rows.y_score, &predicted, &scores, positive)?;
        Ok((metrics, model))
    }
}

struct RunRows {
    x_fit: Array2<f64>,
    y_fit: Array1<f64>,
    x_score: Array2<f64>,
    y_score: Array1<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::BalancerType;
    use crate::training::ParamValue;

    fn data(n: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((n, 2), |(i, j)| {
            let class = (i % 2) as f64;
            class * 2.0 + ((i * 13 + j * 5) % 17) as f64 / 10.0
        });
        let y = Array1::from_shape_fn(n, |i| (i % 2) as f64);
        (x, y)
    }

    fn params() -> ParamSet {
        let mut p = ParamSet::new();
        p.insert("C".to_string(), ParamValue::Float(1.0));
        p
    }

    #[test]
    fn test_train_test_runs() {
        let (x, y) = data(100);
        let config = RunnerConfig::new(EvaluationTechnique::TrainTest).with_splitting_runs(3);
        let report = EvaluationRunner::new(ModelFamily::LogisticRegression, params(), config)
            .run(&x, &y)
            .unwrap();

        assert_eq!(report.runs.len(), 3);
        assert!(report.excluded.is_empty());
        assert!(report.overoptimistic.is_none());
        for run in &report.runs {
            assert_eq!(run.n_scored, 20);
            assert_eq!(run.n_fit, 80);
        }
    }

    #[test]
    fn test_bootstrap_scoring_modes() {
        let (x, y) = data(60);
        let oob = EvaluationRunner::new(
            ModelFamily::LogisticRegression,
            params(),
            RunnerConfig::new(EvaluationTechnique::Bootstrap).with_bootstrap_runs(2),
        )
        .run(&x, &y)
        .unwrap();
        assert!(oob.runs.iter().all(|r| r.n_scored < 60));

        let in_bag = EvaluationRunner::new(
            ModelFamily::LogisticRegression,
            params(),
            RunnerConfig::new(EvaluationTechnique::Bootstrap)
                .with_bootstrap_runs(2)
                .with_bootstrap_scoring(BootstrapScoring::InBag),
        )
        .run(&x, &y)
        .unwrap();
        assert!(in_bag.runs.iter().all(|r| r.n_scored == 60));
    }

    #[test]
    fn test_632_plus_has_overoptimistic_track() {
        let (x, y) = data(60);
        let report = EvaluationRunner::new(
            ModelFamily::LogisticRegression,
            params(),
            RunnerConfig::new(EvaluationTechnique::Point632Plus).with_bootstrap_runs(3),
        )
        .run(&x, &y)
        .unwrap();

        let full = report.overoptimistic.as_ref().unwrap();
        assert_eq!(report.runs.len(), 3);
        assert!(full.auc >= 0.5);
    }

    #[test]
    fn test_degenerate_runs_are_excluded() {
        // one positive among many negatives: most small test splits miss it
        let x = Array2::from_shape_fn((12, 1), |(i, _)| i as f64);
        let mut y = Array1::zeros(12);
        y[11] = 1.0;
        y[10] = 1.0;

        let config = RunnerConfig::new(EvaluationTechnique::TrainTest)
            .with_splitting_runs(8)
            .with_test_size(0.1);
        let result = EvaluationRunner::new(ModelFamily::LogisticRegression, params(), config).run(&x, &y);

        match result {
            Ok(report) => {
                assert!(!report.excluded.is_empty());
                assert_eq!(report.runs.len() + report.excluded.len(), 8);
            }
            Err(e) => assert!(matches!(e, HarnessError::EvaluationError(_))),
        }
    }

    fn imbalanced(n: usize) -> (Array2<f64>, Array1<f64>) {
        // every row distinct, the last fifth positive
        let x = Array2::from_shape_fn((n, 2), |(i, j)| i as f64 + j as f64 * 0.5);
        let y = Array1::from_shape_fn(n, |i| if i >= n * 4 / 5 { 1.0 } else { 0.0 });
        (x, y)
    }

    #[test]
    fn test_balanced_fit_rows_never_cover_scored_rows() {
        let (x, y) = imbalanced(50);
        let config = RunnerConfig::new(EvaluationTechnique::TrainTest)
            .with_balancer(Some(ClassBalancer::new(BalancerType::RandomOversampling)));
        let runner = EvaluationRunner::new(ModelFamily::LogisticRegression, params(), config);
        let resample = Resample {
            fit_indices: (5..45).collect(),
            score_indices: (0..5).chain(45..50).collect(),
        };

        let rows = runner.run_rows(&x, &y, &resample, 1).unwrap();

        let positives = rows.y_fit.iter().filter(|&&v| v == 1.0).count();
        assert_eq!(positives * 2, rows.y_fit.len());
        assert_eq!(rows.y_score.len(), 10);
        for scored in rows.x_score.rows() {
            assert!(rows.x_fit.rows().into_iter().all(|fit| fit != scored));
        }
    }

    #[test]
    fn test_balancer_grows_fit_sets_only() {
        let (x, y) = imbalanced(50);
        let config = RunnerConfig::new(EvaluationTechnique::TrainTest)
            .with_splitting_runs(4)
            .with_balancer(Some(ClassBalancer::new(BalancerType::RandomOversampling)));
        let report = EvaluationRunner::new(ModelFamily::LogisticRegression, params(), config)
            .run(&x, &y)
            .unwrap();

        for run in &report.runs {
            assert_eq!(run.n_scored, 10);
            assert!(run.n_fit > 40);
        }
    }

    #[test]
    fn test_excluded_runs_keep_their_index() {
        let x = Array2::from_shape_fn((12, 1), |(i, _)| i as f64);
        let mut y = Array1::zeros(12);
        y[11] = 1.0;
        y[10] = 1.0;

        let config = RunnerConfig::new(EvaluationTechnique::TrainTest)
            .with_splitting_runs(8)
            .with_test_size(0.1);
        let runner = EvaluationRunner::new(ModelFamily::LogisticRegression, params(), config);
        if let Ok(report) = runner.run(&x, &y) {
            let mut seen: Vec<usize> = report
                .runs
                .iter()
                .map(|r| r.index)
                .chain(report.excluded.iter().copied())
                .collect();
            seen.sort_unstable();
            assert_eq!(seen, (0..8).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_parse_technique() {
        assert_eq!(".632+".parse::<EvaluationTechnique>().unwrap(), EvaluationTechnique::Point632Plus);
        assert!("cross_validation".parse::<EvaluationTechnique>().is_err());
    }
}
