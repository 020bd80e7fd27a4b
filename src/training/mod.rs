//! Model training module
//!
//! Provides the classifier families the harness can search and evaluate:
//! - Logistic regression (L1/L2, proximal gradient)
//! - Random Forest over CART trees
//! - XGBoost-style gradient boosted trees
//! - RBF support vector machine with Platt calibration
//! - Stochastic Gradient Descent
//!
//! Binary learners are lifted to multiclass problems through [`OneVsRest`].

mod calibration;
mod models;
pub mod cross_validation;
pub mod decision_tree;
pub mod family;
pub mod linear_models;
pub mod params;
pub mod random_forest;
pub mod sgd;
pub mod svm;
pub mod xgboost;

pub use calibration::PlattScaling;
pub use cross_validation::{CrossValidator, CVStrategy, CVSplit};
pub use decision_tree::{DecisionTree, TreeNode, Criterion};
pub use family::ModelFamily;
pub use linear_models::{LogisticRegression, Penalty, Solver};
pub use models::{BinaryLearner, Classifier, Estimator, OneVsRest};
pub use params::{format_params, ParamDomain, ParamSet, ParamValue, ParameterGrid};
pub use random_forest::{RandomForest, MaxFeatures};
pub use sgd::{SGDClassifier, SGDConfig, SGDLoss, LearningRateSchedule};
pub use svm::{SVMClassifier, SVMConfig};
pub use xgboost::{XGBoostClassifier, XGBoostConfig};

pub(crate) use models::unique_classes;
