//! Classification metrics: accuracy, support-weighted precision/recall/F1, ROC and AUC

use crate::error::{HarnessError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Receiver operating characteristic as ordered (FPR, TPR) pairs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RocCurve {
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    /// Decision threshold per point; the first is `+inf`
    pub thresholds: Vec<f64>,
}

impl RocCurve {
    pub fn len(&self) -> usize {
        self.fpr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fpr.is_empty()
    }

    /// Area under the curve
    pub fn auc(&self) -> f64 {
        auc(&self.fpr, &self.tpr)
    }
}

/// Metrics of a single evaluation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub roc: RocCurve,
    pub auc: f64,
}

impl RunMetrics {
    /// Score predicted labels and positive-class probabilities against the truth
    pub fn compute(
        y_true: &Array1<f64>,
        y_pred: &Array1<f64>,
        positive_scores: &Array1<f64>,
        positive_label: f64,
    ) -> Result<Self> {
        if y_true.len() != y_pred.len() || y_true.len() != positive_scores.len() {
            return Err(HarnessError::ShapeError {
                expected: format!("{} predictions", y_true.len()),
                actual: format!("{} labels, {} scores", y_pred.len(), positive_scores.len()),
            });
        }

        let (precision, recall, f1_score) = weighted_precision_recall_f1(y_true, y_pred);
        let binary_truth = y_true.mapv(|v| if v == positive_label { 1.0 } else { 0.0 });
        let roc = roc_curve(&binary_truth, positive_scores)?;
        let auc = roc.auc();

        Ok(Self {
            accuracy: accuracy(y_true, y_pred),
            precision,
            recall,
            f1_score,
            roc,
            auc,
        })
    }
}

/// Fraction of exact label matches
pub fn accuracy(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| t == p)
        .count();
    correct as f64 / y_true.len() as f64
}

/// Precision, recall and F1 per label, averaged with weights equal to the true support
///
/// Labels are the union of true and predicted labels. A zero denominator scores 0.
pub fn weighted_precision_recall_f1(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> (f64, f64, f64) {
    let mut labels: Vec<f64> = y_true.iter().chain(y_pred.iter()).copied().collect();
    labels.sort_by(|a, b| a.total_cmp(b));
    labels.dedup();

    let total = y_true.len() as f64;
    if total == 0.0 {
        return (0.0, 0.0, 0.0);
    }

    let mut precision = 0.0;
    let mut recall = 0.0;
    let mut f1 = 0.0;

    for &label in &labels {
        let (tp, fp, fn_) = confusion_counts(y_true, y_pred, label);
        let support = (tp + fn_) as f64;
        if support == 0.0 {
            continue;
        }

        let p = ratio(tp, tp + fp);
        let r = ratio(tp, tp + fn_);
        let f = if p + r > 0.0 { 2.0 * p * r / (p + r) } else { 0.0 };

        let weight = support / total;
        precision += weight * p;
        recall += weight * r;
        f1 += weight * f;
    }

    (precision, recall, f1)
}

fn ratio(num: usize, den: usize) -> f64 {
    if den > 0 {
        num as f64 / den as f64
    } else {
        0.0
    }
}

/// (tp, fp, fn) for one label treated as positive
fn confusion_counts(y_true: &Array1<f64>, y_pred: &Array1<f64>, label: f64) -> (usize, usize, usize) {
    let mut tp = 0;
    let mut fp = 0;
    let mut fn_ = 0;

    for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
        match (t == label, p == label) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => {}
        }
    }

    (tp, fp, fn_)
}

/// ROC curve of binary targets (1.0 positive) against scores
///
/// Thresholds are the distinct scores in decreasing order. Collinear
/// intermediate points are dropped and an initial (0, 0) point is prepended.
pub fn roc_curve(y_true: &Array1<f64>, scores: &Array1<f64>) -> Result<RocCurve> {
    if y_true.len() != scores.len() {
        return Err(HarnessError::ShapeError {
            expected: format!("{} scores", y_true.len()),
            actual: format!("{} scores", scores.len()),
        });
    }
    if scores.iter().any(|s| !s.is_finite()) {
        return Err(HarnessError::EvaluationError("scores must be finite".to_string()));
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    // Cumulative counts at the last index of every distinct score
    let mut tps = Vec::new();
    let mut fps = Vec::new();
    let mut thresholds = Vec::new();
    let mut tp = 0.0;
    let mut fp = 0.0;
    for (rank, &i) in order.iter().enumerate() {
        if y_true[i] > 0.5 {
            tp += 1.0;
        } else {
            fp += 1.0;
        }
        let last_of_run = rank + 1 == order.len() || scores[order[rank + 1]] != scores[i];
        if last_of_run {
            tps.push(tp);
            fps.push(fp);
            thresholds.push(scores[i]);
        }
    }

    if tp == 0.0 || fp == 0.0 {
        return Err(HarnessError::EvaluationError(
            "ROC curve needs both positive and negative samples".to_string(),
        ));
    }

    let keep: Vec<usize> = if tps.len() > 2 {
        (0..tps.len())
            .filter(|&k| {
                k == 0
                    || k == tps.len() - 1
                    || fps[k + 1] - 2.0 * fps[k] + fps[k - 1] != 0.0
                    || tps[k + 1] - 2.0 * tps[k] + tps[k - 1] != 0.0
            })
            .collect()
    } else {
        (0..tps.len()).collect()
    };

    let mut curve = RocCurve {
        fpr: vec![0.0],
        tpr: vec![0.0],
        thresholds: vec![f64::INFINITY],
    };
    for k in keep {
        curve.fpr.push(fps[k] / fp);
        curve.tpr.push(tps[k] / tp);
        curve.thresholds.push(thresholds[k]);
    }
    Ok(curve)
}

/// Trapezoidal area under a piecewise linear curve
pub fn auc(x: &[f64], y: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[1] + ys[0]) / 2.0)
        .sum()
}

/// Area under the ROC curve of binary targets against scores
pub fn roc_auc_score(y_true: &Array1<f64>, scores: &Array1<f64>) -> Result<f64> {
    Ok(roc_curve(y_true, scores)?.auc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_perfect_predictions() {
        let y = array![0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0];
        let scores = y.mapv(|v| if v > 0.5 { 0.9 } else { 0.1 });

        let m = RunMetrics::compute(&y, &y, &scores, 1.0).unwrap();
        assert_eq!(m.accuracy, 1.0);
        assert_eq!(m.precision, 1.0);
        assert_eq!(m.recall, 1.0);
        assert_eq!(m.f1_score, 1.0);
        assert_eq!(m.auc, 1.0);
    }

    #[test]
    fn test_roc_curve_matches_reference() {
        // y = [0, 0, 1, 1], scores = [0.1, 0.4, 0.35, 0.8]
        let y = array![0.0, 0.0, 1.0, 1.0];
        let scores = array![0.1, 0.4, 0.35, 0.8];
        let roc = roc_curve(&y, &scores).unwrap();

        assert_eq!(roc.fpr, vec![0.0, 0.0, 0.5, 0.5, 1.0]);
        assert_eq!(roc.tpr, vec![0.0, 0.5, 0.5, 1.0, 1.0]);
        assert!(roc.thresholds[0].is_infinite());
        assert!((roc.auc() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_drop_intermediate_collinear_points() {
        let y = array![1.0, 1.0, 1.0, 0.0, 0.0];
        let scores = array![0.9, 0.8, 0.7, 0.2, 0.1];
        let roc = roc_curve(&y, &scores).unwrap();

        // the first distinct threshold is always kept
        assert_eq!(roc.fpr, vec![0.0, 0.0, 0.0, 1.0]);
        assert_eq!(roc.tpr, vec![0.0, 1.0 / 3.0, 1.0, 1.0]);
        assert_eq!(roc.thresholds[1..], [0.9, 0.7, 0.1]);
    }

    #[test]
    fn test_tied_scores_share_a_point() {
        let y = array![0.0, 1.0];
        let scores = array![0.5, 0.5];
        let roc = roc_curve(&y, &scores).unwrap();
        assert_eq!(roc.fpr, vec![0.0, 1.0]);
        assert!((roc.auc() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_single_class_is_an_error() {
        let y = array![1.0, 1.0, 1.0];
        let scores = array![0.2, 0.5, 0.9];
        assert!(roc_curve(&y, &scores).is_err());
    }

    #[test]
    fn test_weighted_metrics() {
        // class 0: tp=2 fp=1 fn=0; class 1: tp=1 fp=0 fn=1
        let y_true = array![0.0, 0.0, 1.0, 1.0];
        let y_pred = array![0.0, 0.0, 0.0, 1.0];
        let (p, r, f) = weighted_precision_recall_f1(&y_true, &y_pred);

        let p0 = 2.0 / 3.0;
        let f0 = 2.0 * p0 / (p0 + 1.0);
        let f1 = 2.0 * 0.5 / 1.5;
        assert!((p - (0.5 * p0 + 0.5 * 1.0)).abs() < 1e-12);
        assert!((r - 0.75).abs() < 1e-12);
        assert!((f - (0.5 * f0 + 0.5 * f1)).abs() < 1e-12);
        assert_eq!(accuracy(&y_true, &y_pred), 0.75);
    }

    #[test]
    fn test_auc_trapezoid() {
        assert!((auc(&[0.0, 1.0], &[0.0, 1.0]) - 0.5).abs() < 1e-12);
        assert!((auc(&[0.0, 0.0, 1.0], &[0.0, 1.0, 1.0]) - 1.0).abs() < 1e-12);
    }
}
