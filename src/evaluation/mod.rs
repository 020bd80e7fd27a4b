//! Model evaluation
//!
//! Provides the evaluation side of an experiment:
//! - Seeded train/test and bootstrap resampling
//! - Accuracy, support-weighted precision/recall/F1, ROC curve and AUC per run
//! - Averaging of runs onto a shared FPR grid and the .632+ optimism correction
//! - SVG and PNG rendering of the ROC figure

pub mod aggregate;
pub mod metrics;
pub mod plot;
pub mod resample;
mod runner;

pub use aggregate::{average_roc, interpolate, linspace, AggregateResult, MeanRoc, OptimismCorrection};
pub use metrics::{accuracy, auc, roc_auc_score, roc_curve, weighted_precision_recall_f1, RocCurve, RunMetrics};
pub use plot::{render_roc, RocArtifacts, RocStyle};
pub use resample::{bootstrap, train_test_split, Resample};
pub use runner::{
    BootstrapScoring, EvaluationReport, EvaluationRun, EvaluationRunner, EvaluationTechnique, RunnerConfig,
};
