//! Aggregation of per-run metrics into one evaluation record

use crate::error::{HarnessError, Result};
use super::metrics::{RocCurve, RunMetrics};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Points on the common FPR grid of the averaged ROC curve
pub const ROC_GRID_POINTS: usize = 100;

/// No-information AUC used by the textbook .632+ correction
const NO_INFORMATION_AUC: f64 = 0.5;

/// How the .632+ technique turns its two tracks into one AUC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimismCorrection {
    /// Overoptimistic AUC minus the averaged out-of-bag AUC
    #[default]
    Observed,
    /// Efron and Tibshirani's weighted .632+ estimate
    Textbook632Plus,
}

impl OptimismCorrection {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptimismCorrection::Observed => "observed",
            OptimismCorrection::Textbook632Plus => "textbook_632_plus",
        }
    }

    /// Combine the full-sample AUC with the mean out-of-bag AUC
    pub fn correct(&self, overoptimistic_auc: f64, out_of_bag_auc: f64) -> f64 {
        match self {
            OptimismCorrection::Observed => overoptimistic_auc - out_of_bag_auc,
            OptimismCorrection::Textbook632Plus => {
                let gap = overoptimistic_auc - NO_INFORMATION_AUC;
                let relative_overfit = if gap <= 0.0 {
                    0.0
                } else {
                    ((overoptimistic_auc - out_of_bag_auc) / gap).clamp(0.0, 1.0)
                };
                let weight = 0.632 / (1.0 - 0.368 * relative_overfit);
                (1.0 - weight) * overoptimistic_auc + weight * out_of_bag_auc
            }
        }
    }
}

impl FromStr for OptimismCorrection {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "observed" => Ok(OptimismCorrection::Observed),
            "textbook_632_plus" => Ok(OptimismCorrection::Textbook632Plus),
            other => Err(HarnessError::invalid_param(
                "correction",
                other,
                "expected observed or textbook_632_plus",
            )),
        }
    }
}

impl fmt::Display for OptimismCorrection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mean ROC curve on an evenly spaced FPR grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeanRoc {
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
}

/// Aggregated evaluation of one configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateResult {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    /// Mean AUC over the runs
    pub averaged_auc: f64,
    /// Reported AUC: the averaged AUC, or the corrected one under .632+
    pub auc: f64,
    pub mean_roc: MeanRoc,
    /// Per-run curves, kept for plotting
    pub run_curves: Vec<RocCurve>,
    pub overoptimistic_auc: Option<f64>,
    pub overoptimistic_roc: Option<RocCurve>,
    pub n_runs: usize,
    /// Runs dropped because their scoring set held one class
    pub n_excluded: usize,
}

impl AggregateResult {
    /// Average the successful runs; the overoptimistic track turns on the correction
    pub fn from_runs(
        runs: &[RunMetrics],
        overoptimistic: Option<&RunMetrics>,
        correction: OptimismCorrection,
        n_excluded: usize,
    ) -> Result<Self> {
        if runs.is_empty() {
            return Err(HarnessError::EvaluationError(format!(
                "no run could be scored ({} excluded as degenerate)",
                n_excluded
            )));
        }

        let mean = |f: fn(&RunMetrics) -> f64| runs.iter().map(f).sum::<f64>() / runs.len() as f64;
        let averaged_auc = mean(|r| r.auc);
        let run_curves: Vec<RocCurve> = runs.iter().map(|r| r.roc.clone()).collect();

        let auc = match overoptimistic {
            Some(full) => correction.correct(full.auc, averaged_auc),
            None => averaged_auc,
        };

        Ok(Self {
            accuracy: mean(|r| r.accuracy),
            precision: mean(|r| r.precision),
            recall: mean(|r| r.recall),
            f1_score: mean(|r| r.f1_score),
            averaged_auc,
            auc,
            mean_roc: average_roc(&run_curves),
            run_curves,
            overoptimistic_auc: overoptimistic.map(|r| r.auc),
            overoptimistic_roc: overoptimistic.map(|r| r.roc.clone()),
            n_runs: runs.len(),
            n_excluded,
        })
    }

    /// Scalar metrics by name, in reporting order
    pub fn scalars(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("accuracy", self.accuracy),
            ("precision", self.precision),
            ("recall", self.recall),
            ("f1", self.f1_score),
            ("auc", self.auc),
        ]
    }
}

/// `n` evenly spaced values from `start` to `end` inclusive
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { end } else { start + i as f64 * step })
                .collect()
        }
    }
}

/// Piecewise linear value of (x, y) at `at`, extrapolating past either end
///
/// `x` must be non-decreasing. On a vertical step the upper value wins.
pub fn interpolate(x: &[f64], y: &[f64], at: f64) -> f64 {
    let n = x.len().min(y.len());
    match n {
        0 => return f64::NAN,
        1 => return y[0],
        _ => {}
    }

    let line = |lo: usize, hi: usize| y[lo] + (y[hi] - y[lo]) * (at - x[lo]) / (x[hi] - x[lo]);

    // number of knots at or left of `at`
    let j = x[..n].partition_point(|&v| v <= at);
    if j > 0 && j < n {
        return line(j - 1, j);
    }
    if j == n && at == x[n - 1] {
        return y[n - 1];
    }

    let sloped: Vec<usize> = (0..n - 1).filter(|&k| x[k + 1] > x[k]).collect();
    let k = if j == 0 { sloped.first() } else { sloped.last() };
    match k {
        Some(&k) => line(k, k + 1),
        None => y[n - 1],
    }
}

/// Mean TPR of every curve over a shared FPR grid spanning all curves
pub fn average_roc(curves: &[RocCurve]) -> MeanRoc {
    let points = curves.iter().flat_map(|c| c.fpr.iter().copied());
    let min_fpr = points.clone().fold(f64::INFINITY, f64::min);
    let max_fpr = points.fold(f64::NEG_INFINITY, f64::max);
    if curves.is_empty() || !min_fpr.is_finite() || !max_fpr.is_finite() {
        return MeanRoc { fpr: Vec::new(), tpr: Vec::new() };
    }

    let fpr = linspace(min_fpr, max_fpr, ROC_GRID_POINTS);
    let tpr = fpr
        .iter()
        .map(|&at| {
            curves.iter().map(|c| interpolate(&c.fpr, &c.tpr, at)).sum::<f64>() / curves.len() as f64
        })
        .collect();

    MeanRoc { fpr, tpr }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve(fpr: Vec<f64>, tpr: Vec<f64>) -> RocCurve {
        let thresholds = vec![0.0; fpr.len()];
        RocCurve { fpr, tpr, thresholds }
    }

    fn run(auc: f64, accuracy: f64) -> RunMetrics {
        RunMetrics {
            accuracy,
            precision: accuracy,
            recall: accuracy,
            f1_score: accuracy,
            roc: curve(vec![0.0, 0.0, 1.0], vec![0.0, 1.0, 1.0]),
            auc,
        }
    }

    #[test]
    fn test_interpolate_inside_and_outside() {
        let x = [0.0, 0.5, 1.0];
        let y = [0.0, 0.5, 1.0];
        assert!((interpolate(&x, &y, 0.25) - 0.25).abs() < 1e-12);
        assert!((interpolate(&x, &y, 1.5) - 1.5).abs() < 1e-12);
        assert!((interpolate(&x, &y, -0.5) + 0.5).abs() < 1e-12);
        assert_eq!(interpolate(&x, &y, 1.0), 1.0);
    }

    #[test]
    fn test_interpolate_vertical_step() {
        let x = [0.0, 0.0, 1.0];
        let y = [0.0, 0.6, 1.0];
        assert!((interpolate(&x, &y, 0.0) - 0.6).abs() < 1e-12);
        assert!((interpolate(&x, &y, 0.5) - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_average_over_disjoint_supports() {
        let a = curve(vec![0.0, 0.5], vec![0.0, 1.0]);
        let b = curve(vec![0.3, 1.0], vec![0.2, 0.9]);
        let mean = average_roc(&[a.clone(), b.clone()]);

        assert_eq!(mean.fpr.len(), ROC_GRID_POINTS);
        assert_eq!(mean.fpr[0], 0.0);
        assert_eq!(mean.fpr[ROC_GRID_POINTS - 1], 1.0);

        for (&f, &t) in mean.fpr.iter().zip(&mean.tpr) {
            if (0.3..=0.5).contains(&f) {
                let ta = interpolate(&a.fpr, &a.tpr, f);
                let tb = interpolate(&b.fpr, &b.tpr, f);
                assert!(t >= ta.min(tb) - 1e-12 && t <= ta.max(tb) + 1e-12);
            }
        }
    }

    #[test]
    fn test_scalar_means_are_exact() {
        let runs = vec![run(0.8, 0.7), run(0.9, 0.8), run(0.7, 0.9)];
        let agg = AggregateResult::from_runs(&runs, None, OptimismCorrection::Observed, 1).unwrap();

        assert_eq!(agg.n_runs, 3);
        assert_eq!(agg.n_excluded, 1);
        assert_eq!(agg.accuracy, (0.7 + 0.8 + 0.9) / 3.0);
        assert_eq!(agg.auc, agg.averaged_auc);
        assert!(agg.overoptimistic_roc.is_none());
    }

    #[test]
    fn test_observed_correction() {
        let runs = vec![run(0.8, 0.8), run(0.6, 0.8)];
        let full = run(0.95, 1.0);
        let agg = AggregateResult::from_runs(&runs, Some(&full), OptimismCorrection::Observed, 0).unwrap();

        assert!((agg.averaged_auc - 0.7).abs() < 1e-12);
        assert!((agg.auc - 0.25).abs() < 1e-12);
        assert_eq!(agg.overoptimistic_auc, Some(0.95));
    }

    #[test]
    fn test_textbook_correction() {
        let c = OptimismCorrection::Textbook632Plus;
        // no overfit: plain .632 weighting
        let plain = c.correct(0.8, 0.8);
        assert!((plain - 0.8).abs() < 1e-12);
        // full overfit: the estimate collapses to the out-of-bag value
        assert!((c.correct(0.9, 0.5) - 0.5).abs() < 1e-12);
        // between the two tracks otherwise
        let mid = c.correct(0.95, 0.8);
        assert!(mid > 0.8 && mid < 0.95);
    }

    #[test]
    fn test_no_runs_is_an_error() {
        let err = AggregateResult::from_runs(&[], None, OptimismCorrection::Observed, 4).unwrap_err();
        assert!(matches!(err, HarnessError::EvaluationError(_)));
    }

    #[test]
    fn test_parse_correction() {
        assert_eq!("observed".parse::<OptimismCorrection>().unwrap(), OptimismCorrection::Observed);
        assert!("none".parse::<OptimismCorrection>().is_err());
    }
}
