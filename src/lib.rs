//! clf-harness - experiment harness for supervised classification
//!
//! Given tabular data and a declarative parameter file, the harness prepares
//! features, tunes a classifier family with an adaptive grid search, evaluates
//! the winner under repeated resampling and reports averaged metrics with a
//! ROC figure per configuration.
//!
//! # Modules
//!
//! ## Core
//! - [`training`] - Classifier families behind one fit/predict contract
//! - [`search`] - Cross-validated grid search with grid refinement
//! - [`evaluation`] - Resampled evaluation, metrics, ROC averaging and rendering
//! - [`pipeline`] - One configuration from search to ROC artifacts
//!
//! ## Collaborators
//! - [`config`] - Parameter files, expansion and validation
//! - [`preprocessing`] - DataFrame to train/test tensors
//! - [`reporting`] - Output folder, artifacts and the summary CSV
//! - [`cli`] - Command-line interface

pub mod error;

pub mod evaluation;
pub mod pipeline;
pub mod search;
pub mod training;

pub mod config;
pub mod preprocessing;
pub mod reporting;

pub mod cli;

pub use error::{HarnessError, Result};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::{generate_combinations, ExperimentConfig};
    pub use crate::error::{HarnessError, Result};
    pub use crate::evaluation::{
        AggregateResult, EvaluationRunner, EvaluationTechnique, OptimismCorrection, RunMetrics, RunnerConfig,
    };
    pub use crate::pipeline::{run_experiment, EvaluationSettings, ExperimentRecord};
    pub use crate::preprocessing::{prepare, Dataset, PreprocessingConfig};
    pub use crate::search::{SearchConfig, SearchEngine, SearchOutcome, StopReason};
    pub use crate::training::{Classifier, Estimator, ModelFamily, ParamValue, ParameterGrid};
}
