//! Classifier contract, one-vs-rest wrapper and the fitted-estimator enum

use crate::error::{HarnessError, Result};
use super::linear_models::LogisticRegression;
use super::random_forest::RandomForest;
use super::sgd::SGDClassifier;
use super::svm::SVMClassifier;
use super::xgboost::XGBoostClassifier;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Uniform contract every model family is adapted to
pub trait Classifier {
    /// Fit on features `x` and class labels `y`
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Class probabilities, one column per entry of [`Classifier::classes`]
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>>;

    /// Sorted class labels seen during fit
    fn classes(&self) -> &[f64];

    /// Per-feature importance, `None` when the family has no notion of one
    fn feature_importances(&self) -> Option<Array1<f64>>;

    /// Most probable class per row
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        let classes = self.classes();
        Ok(proba
            .axis_iter(Axis(0))
            .map(|row| classes[argmax(row.iter().copied())])
            .collect())
    }

    /// Predicted labels together with the probability of `label` per row
    ///
    /// A label never seen during fit scores 0 everywhere.
    fn predict_scored(&self, x: &Array2<f64>, label: f64) -> Result<(Array1<f64>, Array1<f64>)> {
        let proba = self.predict_proba(x)?;
        let classes = self.classes();
        let predicted = proba
            .axis_iter(Axis(0))
            .map(|row| classes[argmax(row.iter().copied())])
            .collect();
        let scores = match classes.iter().position(|&c| c == label) {
            Some(col) => proba.column(col).to_owned(),
            None => Array1::zeros(x.nrows()),
        };
        Ok((predicted, scores))
    }
}

/// A learner that only separates a positive class from the rest
pub trait BinaryLearner: Clone {
    /// Fit on labels in {0, 1}
    fn fit_binary(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Probability of the positive class
    fn positive_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    fn importances(&self) -> Option<Array1<f64>>;
}

/// Index of the largest value; the first one wins ties
pub(crate) fn argmax(values: impl Iterator<Item = f64>) -> usize {
    let mut best_idx = 0;
    let mut best = f64::NEG_INFINITY;
    for (i, v) in values.enumerate() {
        if v > best {
            best = v;
            best_idx = i;
        }
    }
    best_idx
}

/// Sorted distinct labels of `y`
pub(crate) fn unique_classes(y: &Array1<f64>) -> Vec<f64> {
    let mut classes: Vec<f64> = y.iter().copied().collect();
    classes.sort_by(|a, b| a.total_cmp(b));
    classes.dedup();
    classes
}

pub(crate) fn check_lengths(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(HarnessError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 {
        return Err(HarnessError::TrainingError("Empty dataset".to_string()));
    }
    Ok(())
}

/// Lifts a [`BinaryLearner`] to any number of classes
///
/// Two classes train a single learner for the larger label. More classes
/// train one learner per class and normalise the scores row-wise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneVsRest<L> {
    template: L,
    learners: Vec<L>,
    classes: Vec<f64>,
}

impl<L: BinaryLearner> OneVsRest<L> {
    pub fn new(template: L) -> Self {
        Self {
            template,
            learners: Vec::new(),
            classes: Vec::new(),
        }
    }

    /// Unfitted learner configuration
    pub fn template(&self) -> &L {
        &self.template
    }

    /// Fitted learners, one for binary problems
    pub fn learners(&self) -> &[L] {
        &self.learners
    }

    fn fit_one(&self, x: &Array2<f64>, y: &Array1<f64>, positive: f64) -> Result<L> {
        let target = y.mapv(|v| if v == positive { 1.0 } else { 0.0 });
        let mut learner = self.template.clone();
        learner.fit_binary(x, &target)?;
        Ok(learner)
    }
}

impl<L: BinaryLearner> Classifier for OneVsRest<L> {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_lengths(x, y)?;
        let classes = unique_classes(y);
        if classes.len() < 2 {
            return Err(HarnessError::TrainingError(
                "at least 2 distinct classes are required".to_string(),
            ));
        }

        let learners = if classes.len() == 2 {
            vec![self.fit_one(x, y, classes[1])?]
        } else {
            classes
                .iter()
                .map(|&c| self.fit_one(x, y, c))
                .collect::<Result<Vec<_>>>()?
        };

        self.learners = learners;
        self.classes = classes;
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.learners.is_empty() {
            return Err(HarnessError::ModelNotFitted);
        }

        let n = x.nrows();
        if self.classes.len() == 2 {
            let p = self.learners[0].positive_proba(x)?;
            let mut proba = Array2::zeros((n, 2));
            for i in 0..n {
                proba[[i, 0]] = 1.0 - p[i];
                proba[[i, 1]] = p[i];
            }
            return Ok(proba);
        }

        let k = self.classes.len();
        let mut proba = Array2::zeros((n, k));
        for (c, learner) in self.learners.iter().enumerate() {
            proba.column_mut(c).assign(&learner.positive_proba(x)?);
        }
        for mut row in proba.rows_mut() {
            let total = row.sum();
            if total > 0.0 {
                row /= total;
            } else {
                row.fill(1.0 / k as f64);
            }
        }
        Ok(proba)
    }

    fn classes(&self) -> &[f64] {
        &self.classes
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.learners.first().and_then(|l| l.importances())
    }
}

/// A constructed or fitted model of one of the supported families
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "family", content = "model", rename_all = "snake_case")]
pub enum Estimator {
    LogisticRegression(OneVsRest<LogisticRegression>),
    RandomForest(RandomForest),
    Xgboost(OneVsRest<XGBoostClassifier>),
    RbfSvm(OneVsRest<SVMClassifier>),
    GradientDescent(OneVsRest<SGDClassifier>),
}

impl Classifier for Estimator {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        match self {
            Estimator::LogisticRegression(m) => m.fit(x, y),
            Estimator::RandomForest(m) => Classifier::fit(m, x, y),
            Estimator::Xgboost(m) => m.fit(x, y),
            Estimator::RbfSvm(m) => m.fit(x, y),
            Estimator::GradientDescent(m) => m.fit(x, y),
        }
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        match self {
            Estimator::LogisticRegression(m) => m.predict_proba(x),
            Estimator::RandomForest(m) => Classifier::predict_proba(m, x),
            Estimator::Xgboost(m) => m.predict_proba(x),
            Estimator::RbfSvm(m) => m.predict_proba(x),
            Estimator::GradientDescent(m) => m.predict_proba(x),
        }
    }

    fn classes(&self) -> &[f64] {
        match self {
            Estimator::LogisticRegression(m) => m.classes(),
            Estimator::RandomForest(m) => Classifier::classes(m),
            Estimator::Xgboost(m) => m.classes(),
            Estimator::RbfSvm(m) => m.classes(),
            Estimator::GradientDescent(m) => m.classes(),
        }
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        match self {
            Estimator::LogisticRegression(m) => m.feature_importances(),
            Estimator::RandomForest(m) => Classifier::feature_importances(m),
            Estimator::Xgboost(m) => m.feature_importances(),
            // kernel machines expose no per-feature weights
            Estimator::RbfSvm(_) => None,
            Estimator::GradientDescent(m) => m.feature_importances(),
        }
    }
}
