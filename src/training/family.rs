//! Model families: identifiers, default grids, hyperparameter domains and construction

use crate::error::{HarnessError, Result};
use super::decision_tree::Criterion;
use super::linear_models::{LogisticRegression, Penalty, Solver};
use super::models::{Estimator, OneVsRest};
use super::params::{ParamDomain, ParamSet, ParamValue, ParameterGrid};
use super::random_forest::{MaxFeatures, RandomForest};
use super::sgd::{SGDClassifier, SGDConfig};
use super::svm::{SVMClassifier, SVMConfig};
use super::xgboost::{XGBoostClassifier, XGBoostConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported classifier families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    LogisticRegression,
    RandomForest,
    Xgboost,
    RbfSvm,
    GradientDescent,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 5] = [
        ModelFamily::LogisticRegression,
        ModelFamily::RandomForest,
        ModelFamily::Xgboost,
        ModelFamily::RbfSvm,
        ModelFamily::GradientDescent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFamily::LogisticRegression => "logistic_regression",
            ModelFamily::RandomForest => "random_forest",
            ModelFamily::Xgboost => "xgboost",
            ModelFamily::RbfSvm => "rbf_svm",
            ModelFamily::GradientDescent => "gradient_descent",
        }
    }

    /// Grid searched when the caller supplies none
    pub fn default_grid(&self) -> ParameterGrid {
        match self {
            ModelFamily::LogisticRegression => ParameterGrid::new()
                .with("C", vec![0.1, 0.75, 1.0, 10.0])
                .with("penalty", vec!["l1"])
                .with("solver", vec!["liblinear"])
                .with("max_iter", vec![3000i64]),
            ModelFamily::RandomForest => ParameterGrid::new()
                .with("n_estimators", vec![50i64, 100])
                .with("max_depth", vec![4i64, 8]),
            ModelFamily::Xgboost => ParameterGrid::new()
                .with("n_estimators", vec![50i64, 100])
                .with("learning_rate", vec![0.1, 0.3])
                .with("max_depth", vec![3i64, 6]),
            ModelFamily::RbfSvm => ParameterGrid::new()
                .with("C", vec![0.1, 1.0])
                .with("gamma", vec![0.1, 1.0]),
            ModelFamily::GradientDescent => ParameterGrid::new()
                .with("alpha", vec![0.0001, 0.001, 0.01])
                .with("loss", vec!["log_loss"])
                .with("penalty", vec!["l2"]),
        }
    }

    /// Numeric domain of a hyperparameter, `None` for categorical or unknown names
    pub fn domain(&self, name: &str) -> Option<ParamDomain> {
        use ParamDomain::*;
        match (self, name) {
            (ModelFamily::LogisticRegression, "C") => Some(Positive),
            (ModelFamily::LogisticRegression, "max_iter") => Some(Count { min: 1 }),
            (ModelFamily::LogisticRegression, "tol") => Some(Positive),

            (ModelFamily::RandomForest, "n_estimators") => Some(Count { min: 1 }),
            (ModelFamily::RandomForest, "max_depth") => Some(Count { min: 1 }),
            (ModelFamily::RandomForest, "min_samples_split") => Some(Count { min: 2 }),
            (ModelFamily::RandomForest, "min_samples_leaf") => Some(Count { min: 1 }),
            (ModelFamily::RandomForest, "max_features") => Some(Fraction),

            (ModelFamily::Xgboost, "n_estimators") => Some(Count { min: 1 }),
            (ModelFamily::Xgboost, "max_depth") => Some(Count { min: 1 }),
            (ModelFamily::Xgboost, "learning_rate") => Some(Positive),
            (ModelFamily::Xgboost, "min_child_weight") => Some(NonNegative),
            (ModelFamily::Xgboost, "reg_lambda") => Some(NonNegative),
            (ModelFamily::Xgboost, "reg_alpha") => Some(NonNegative),
            (ModelFamily::Xgboost, "gamma") => Some(NonNegative),
            (ModelFamily::Xgboost, "subsample") => Some(Fraction),
            (ModelFamily::Xgboost, "colsample_bytree") => Some(Fraction),

            (ModelFamily::RbfSvm, "C") => Some(Positive),
            (ModelFamily::RbfSvm, "gamma") => Some(Positive),
            (ModelFamily::RbfSvm, "max_iter") => Some(Count { min: 1 }),
            (ModelFamily::RbfSvm, "tol") => Some(Positive),

            (ModelFamily::GradientDescent, "alpha") => Some(Positive),
            (ModelFamily::GradientDescent, "l1_ratio") => Some(Ratio),
            (ModelFamily::GradientDescent, "eta0") => Some(Positive),
            (ModelFamily::GradientDescent, "max_iter") => Some(Count { min: 1 }),
            (ModelFamily::GradientDescent, "tol") => Some(Positive),
            (ModelFamily::GradientDescent, "power_t") => Some(Real),
            _ => None,
        }
    }

    fn numeric(&self, name: &str, value: &ParamValue) -> Result<f64> {
        let domain = self.domain(name).ok_or_else(|| self.unknown(name, value))?;
        domain.check(name, value)
    }

    fn count(&self, name: &str, value: &ParamValue) -> Result<usize> {
        let domain = self.domain(name).ok_or_else(|| self.unknown(name, value))?;
        domain.check_count(name, value)
    }

    fn unknown(&self, name: &str, value: &ParamValue) -> HarnessError {
        HarnessError::invalid_param(
            name,
            value,
            &format!("not a hyperparameter of {}", self.as_str()),
        )
    }

    /// Construct an unfitted estimator from one hyperparameter assignment
    pub fn build(&self, params: &ParamSet, seed: u64) -> Result<Estimator> {
        match self {
            ModelFamily::LogisticRegression => {
                let mut model = LogisticRegression::new();
                for (name, value) in params {
                    match name.as_str() {
                        "C" => model.c = self.numeric(name, value)?,
                        "penalty" => model.penalty = value.expect_str(name)?.parse::<Penalty>()?,
                        "solver" => model.solver = value.expect_str(name)?.parse::<Solver>()?,
                        "max_iter" => model.max_iter = self.count(name, value)?,
                        "tol" => model.tol = self.numeric(name, value)?,
                        _ => return Err(self.unknown(name, value)),
                    }
                }
                model.validate()?;
                Ok(Estimator::LogisticRegression(OneVsRest::new(model)))
            }
            ModelFamily::RandomForest => {
                let mut model = RandomForest::new(100).with_random_state(seed);
                for (name, value) in params {
                    match name.as_str() {
                        "n_estimators" => model.n_estimators = self.count(name, value)?,
                        "max_depth" => model.max_depth = Some(self.count(name, value)?),
                        "min_samples_split" => model.min_samples_split = self.count(name, value)?,
                        "min_samples_leaf" => model.min_samples_leaf = self.count(name, value)?,
                        "max_features" => model.max_features = parse_max_features(self, name, value)?,
                        "criterion" => model.criterion = value.expect_str(name)?.parse::<Criterion>()?,
                        "bootstrap" => model.bootstrap = value.expect_bool(name)?,
                        _ => return Err(self.unknown(name, value)),
                    }
                }
                Ok(Estimator::RandomForest(model))
            }
            ModelFamily::Xgboost => {
                let mut config = XGBoostConfig {
                    random_state: Some(seed),
                    ..Default::default()
                };
                for (name, value) in params {
                    match name.as_str() {
                        "n_estimators" => config.n_estimators = self.count(name, value)?,
                        "max_depth" => config.max_depth = self.count(name, value)?,
                        "learning_rate" => config.learning_rate = self.numeric(name, value)?,
                        "min_child_weight" => config.min_child_weight = self.numeric(name, value)?,
                        "reg_lambda" => config.reg_lambda = self.numeric(name, value)?,
                        "reg_alpha" => config.reg_alpha = self.numeric(name, value)?,
                        "gamma" => config.gamma = self.numeric(name, value)?,
                        "subsample" => config.subsample = self.numeric(name, value)?,
                        "colsample_bytree" => config.colsample_bytree = self.numeric(name, value)?,
                        _ => return Err(self.unknown(name, value)),
                    }
                }
                Ok(Estimator::Xgboost(OneVsRest::new(XGBoostClassifier::new(config))))
            }
            ModelFamily::RbfSvm => {
                let mut config = SVMConfig {
                    random_state: Some(seed),
                    ..Default::default()
                };
                for (name, value) in params {
                    match name.as_str() {
                        "C" => config.c = self.numeric(name, value)?,
                        "gamma" => config.gamma = self.numeric(name, value)?,
                        "max_iter" => config.max_iter = self.count(name, value)?,
                        "tol" => config.tol = self.numeric(name, value)?,
                        _ => return Err(self.unknown(name, value)),
                    }
                }
                Ok(Estimator::RbfSvm(OneVsRest::new(SVMClassifier::new(config))))
            }
            ModelFamily::GradientDescent => {
                let mut config = SGDConfig {
                    random_state: Some(seed),
                    ..Default::default()
                };
                let mut penalty = None;
                for (name, value) in params {
                    match name.as_str() {
                        "loss" => config.loss = value.expect_str(name)?.parse()?,
                        "learning_rate" => config.learning_rate = value.expect_str(name)?.parse()?,
                        "penalty" => penalty = Some(value.expect_str(name)?.to_string()),
                        "alpha" => config.alpha = self.numeric(name, value)?,
                        "l1_ratio" => config.l1_ratio = self.numeric(name, value)?,
                        "eta0" => config.eta0 = self.numeric(name, value)?,
                        "max_iter" => config.max_iter = self.count(name, value)?,
                        "tol" => config.tol = self.numeric(name, value)?,
                        "power_t" => config.power_t = self.numeric(name, value)?,
                        _ => return Err(self.unknown(name, value)),
                    }
                }
                if let Some(penalty) = penalty {
                    config.apply_penalty(&penalty)?;
                }
                Ok(Estimator::GradientDescent(OneVsRest::new(SGDClassifier::new(config))))
            }
        }
    }
}

fn parse_max_features(family: &ModelFamily, name: &str, value: &ParamValue) -> Result<MaxFeatures> {
    match value.as_str() {
        Some("sqrt") => Ok(MaxFeatures::Sqrt),
        Some("log2") => Ok(MaxFeatures::Log2),
        Some("all") => Ok(MaxFeatures::All),
        Some(_) => Err(HarnessError::invalid_param(
            name,
            value,
            "expected sqrt, log2, all or a fraction in (0, 1]",
        )),
        None => Ok(MaxFeatures::Fraction(family.numeric(name, value)?)),
    }
}

impl FromStr for ModelFamily {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        ModelFamily::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| HarnessError::UnsupportedModel(s.to_string()))
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::models::Classifier;
    use ndarray::array;

    #[test]
    fn test_parse_family() {
        assert_eq!("rbf_svm".parse::<ModelFamily>().unwrap(), ModelFamily::RbfSvm);
        let err = "naive_bayes".parse::<ModelFamily>().unwrap_err();
        assert!(matches!(err, HarnessError::UnsupportedModel(ref s) if s == "naive_bayes"));
    }

    #[test]
    fn test_default_grids_build() {
        for family in ModelFamily::ALL {
            let grid = family.default_grid();
            assert!(grid.n_candidates() > 0, "{} has an empty grid", family);
            for candidate in grid.candidates() {
                family.build(&candidate, 0).unwrap();
            }
        }
    }

    #[test]
    fn test_unknown_hyperparameter() {
        let mut params = ParamSet::new();
        params.insert("n_neighbors".to_string(), ParamValue::Int(3));
        let err = ModelFamily::RbfSvm.build(&params, 0).unwrap_err();
        assert!(matches!(err, HarnessError::InvalidParameter { .. }));
    }

    #[test]
    fn test_domain_violation() {
        let mut params = ParamSet::new();
        params.insert("C".to_string(), ParamValue::Float(-1.0));
        assert!(ModelFamily::LogisticRegression.build(&params, 0).is_err());
    }

    #[test]
    fn test_rbf_svm_has_no_importances() {
        let x = array![[0.0, 0.0], [0.1, 0.2], [1.0, 1.0], [1.1, 0.9]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let mut params = ParamSet::new();
        params.insert("C".to_string(), ParamValue::Float(1.0));
        params.insert("gamma".to_string(), ParamValue::Float(1.0));

        let mut model = ModelFamily::RbfSvm.build(&params, 0).unwrap();
        model.fit(&x, &y).unwrap();
        assert!(model.feature_importances().is_none());
    }

    #[test]
    fn test_logistic_importances_are_coefficients() {
        let x = array![[0.0, 1.0], [1.0, 1.0], [3.0, 1.0], [4.0, 1.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let mut model = ModelFamily::LogisticRegression
            .build(&ModelFamily::LogisticRegression.default_grid().candidates()[3], 0)
            .unwrap();
        model.fit(&x, &y).unwrap();

        let importances = model.feature_importances().unwrap();
        assert_eq!(importances.len(), 2);
        assert!(importances[0] > 0.0);
    }
}
