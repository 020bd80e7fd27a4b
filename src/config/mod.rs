//! Experiment configuration
//!
//! A parameter file is a JSON object. Every list-valued key other than
//! `features` fans out into one [`ExperimentConfig`] per element.

pub mod colors;

use crate::error::{HarnessError, Result};
use crate::evaluation::{BootstrapScoring, EvaluationTechnique, OptimismCorrection};
use crate::preprocessing::{BalancerType, EncoderType, PreprocessingConfig, ScalerType};
use crate::training::{ModelFamily, ParameterGrid};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

/// Raw key/value view of one parameter combination
pub type Parameters = Map<String, Value>;

/// Keys a parameter combination may carry
pub const VALID_KEYS: [&str; 20] = [
    "target",
    "features",
    "scaler",
    "encoder",
    "class_balancer",
    "evaluation_technique",
    "model",
    "enable_parameter_search",
    "splitting_runs",
    "bootstrap_runs",
    "output_path",
    "parameters_grid",
    "plot_mean_roc",
    "roc_color",
    "test_size",
    "seed",
    "max_refinements",
    "cv_folds",
    "bootstrap_scoring",
    "correction",
];

const MODEL_NAMES: [&str; 5] = [
    "logistic_regression",
    "random_forest",
    "xgboost",
    "rbf_svm",
    "gradient_descent",
];

/// Fully typed configuration of one experiment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub target: String,
    /// Feature columns; `None` selects every non-target column
    pub features: Option<Vec<String>>,
    pub scaler: Option<ScalerType>,
    pub encoder: Option<EncoderType>,
    pub class_balancer: Option<BalancerType>,
    pub evaluation_technique: EvaluationTechnique,
    pub model: ModelFamily,
    pub enable_parameter_search: bool,
    pub splitting_runs: usize,
    pub bootstrap_runs: usize,
    pub output_path: String,
    /// `None` selects the model family's default grid
    pub parameters_grid: Option<ParameterGrid>,
    pub plot_mean_roc: bool,
    pub roc_color: String,
    pub test_size: f64,
    pub seed: u64,
    pub max_refinements: usize,
    pub cv_folds: usize,
    pub bootstrap_scoring: BootstrapScoring,
    pub correction: OptimismCorrection,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            target: String::new(),
            features: None,
            scaler: None,
            encoder: None,
            class_balancer: None,
            evaluation_technique: EvaluationTechnique::TrainTest,
            model: ModelFamily::LogisticRegression,
            enable_parameter_search: true,
            splitting_runs: 10,
            bootstrap_runs: 10,
            output_path: String::new(),
            parameters_grid: None,
            plot_mean_roc: false,
            roc_color: "red".to_string(),
            test_size: 0.2,
            seed: 42,
            max_refinements: 20,
            cv_folds: 15,
            bootstrap_scoring: BootstrapScoring::OutOfBag,
            correction: OptimismCorrection::Observed,
        }
    }
}

impl ExperimentConfig {
    /// Configuration predicting `target` with `model`, everything else default
    pub fn new(target: &str, model: ModelFamily) -> Self {
        Self {
            target: target.to_string(),
            model,
            ..Default::default()
        }
    }

    pub fn with_technique(mut self, technique: EvaluationTechnique) -> Self {
        self.evaluation_technique = technique;
        self
    }

    pub fn with_grid(mut self, grid: ParameterGrid) -> Self {
        self.parameters_grid = Some(grid);
        self
    }

    pub fn with_splitting_runs(mut self, runs: usize) -> Self {
        self.splitting_runs = runs;
        self
    }

    pub fn with_bootstrap_runs(mut self, runs: usize) -> Self {
        self.bootstrap_runs = runs;
        self
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    pub fn with_parameter_search(mut self, enabled: bool) -> Self {
        self.enable_parameter_search = enabled;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Type and validate one expanded combination
    pub fn from_parameters(params: &Parameters) -> Result<Self> {
        check_keys(params)?;
        let mut config = Self::default();

        for (key, value) in params {
            match key.as_str() {
                "target" => config.target = expect_string(key, value)?.to_string(),
                "features" => config.features = parse_features(value)?,
                "scaler" => config.scaler = parse_choice(key, value, "scaler", &["min_max", "z_score"])?,
                "encoder" => {
                    config.encoder = parse_choice(key, value, "encoder", &["one_hot", "target_encoding"])?
                }
                "class_balancer" => {
                    config.class_balancer = parse_choice(
                        key,
                        value,
                        "balancer",
                        &["smote", "random_oversampling", "random_undersampling"],
                    )?
                }
                "evaluation_technique" => {
                    let names = ["train_test", "bootstrap", ".632+"];
                    if let Some(t) = parse_choice(key, value, "evaluation technique", &names)? {
                        config.evaluation_technique = t;
                    }
                }
                "model" => {
                    config.model =
                        parse_choice(key, value, "model", &MODEL_NAMES)?.ok_or_else(model_required)?;
                }
                "bootstrap_scoring" => {
                    if let Some(s) = parse_choice(key, value, "bootstrap scoring", &["out_of_bag", "in_bag"])? {
                        config.bootstrap_scoring = s;
                    }
                }
                "correction" => {
                    let names = ["observed", "textbook_632_plus"];
                    if let Some(c) = parse_choice(key, value, "correction", &names)? {
                        config.correction = c;
                    }
                }
                "enable_parameter_search" => config.enable_parameter_search = expect_bool(key, value)?,
                "plot_mean_roc" => config.plot_mean_roc = expect_bool(key, value)?,
                "splitting_runs" => config.splitting_runs = expect_count(key, value)?,
                "bootstrap_runs" => config.bootstrap_runs = expect_count(key, value)?,
                "max_refinements" => config.max_refinements = expect_count(key, value)?,
                "cv_folds" => config.cv_folds = expect_count(key, value)?,
                "seed" => config.seed = expect_count(key, value)? as u64,
                "output_path" => config.output_path = expect_string(key, value)?.to_string(),
                "roc_color" => config.roc_color = expect_string(key, value)?.to_string(),
                "test_size" => {
                    config.test_size = value.as_f64().ok_or_else(|| type_error(key, "a float"))?
                }
                "parameters_grid" => config.parameters_grid = parse_grid(value)?,
                other => {
                    return Err(HarnessError::ConfigError(format!(
                        "This parameter name is not valid: {}",
                        other
                    )))
                }
            }
        }

        if !params.contains_key("model") {
            return Err(model_required());
        }
        config.validate()?;
        Ok(config)
    }

    /// Range checks that hold for any typed configuration
    pub fn validate(&self) -> Result<()> {
        if self.target.is_empty() {
            return Err(HarnessError::ConfigError("Parameter \"target\" is required".to_string()));
        }
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(HarnessError::ConfigError(format!(
                "Parameter \"test_size\" has to be in (0, 1), got {}",
                self.test_size
            )));
        }
        for (key, value) in [
            ("splitting_runs", self.splitting_runs),
            ("bootstrap_runs", self.bootstrap_runs),
        ] {
            if value == 0 {
                return Err(HarnessError::ConfigError(format!(
                    "Parameter \"{}\" has to be at least 1",
                    key
                )));
            }
        }
        if self.cv_folds < 2 {
            return Err(HarnessError::ConfigError(
                "Parameter \"cv_folds\" has to be at least 2".to_string(),
            ));
        }
        if !self.roc_color.is_empty() && colors::parse_color(&self.roc_color).is_none() {
            return Err(HarnessError::ConfigError(format!(
                "The given color is not correct: {}",
                self.roc_color
            )));
        }
        Ok(())
    }

    /// Grid to search: the configured one or the family default
    pub fn grid(&self) -> ParameterGrid {
        match &self.parameters_grid {
            Some(grid) if !grid.is_empty() => grid.clone(),
            _ => self.model.default_grid(),
        }
    }

    pub fn preprocessing_config(&self) -> PreprocessingConfig {
        PreprocessingConfig {
            target: self.target.clone(),
            features: self.features.clone(),
            encoder: self.encoder,
            scaler: self.scaler,
            balancer: self.class_balancer,
            test_size: self.test_size,
            random_state: self.seed,
        }
    }
}

fn check_keys(params: &Parameters) -> Result<()> {
    for key in params.keys() {
        if !VALID_KEYS.contains(&key.as_str()) {
            return Err(HarnessError::ConfigError(format!(
                "This parameter name is not valid: {}",
                key
            )));
        }
    }
    Ok(())
}

fn type_error(key: &str, kind: &str) -> HarnessError {
    HarnessError::ConfigError(format!("Parameter \"{}\" has to be {}", key, kind))
}

fn expect_string<'a>(key: &str, value: &'a Value) -> Result<&'a str> {
    value.as_str().ok_or_else(|| type_error(key, "a string"))
}

fn expect_bool(key: &str, value: &Value) -> Result<bool> {
    value.as_bool().ok_or_else(|| type_error(key, "a boolean"))
}

fn expect_count(key: &str, value: &Value) -> Result<usize> {
    value
        .as_u64()
        .map(|v| v as usize)
        .ok_or_else(|| type_error(key, "a non-negative integer"))
}

fn parse_features(value: &Value) -> Result<Option<Vec<String>>> {
    match value {
        Value::String(s) if s.is_empty() => Ok(None),
        Value::Array(items) => items
            .iter()
            .map(|v| expect_string("features", v).map(str::to_string))
            .collect::<Result<Vec<_>>>()
            .map(|f| if f.is_empty() { None } else { Some(f) }),
        _ => Err(type_error("features", "a list or the empty string")),
    }
}

/// The model family is never defaulted
fn model_required() -> HarnessError {
    HarnessError::ConfigError(format!(
        "Parameter \"model\" is required, the implemented model keys are: {}",
        MODEL_NAMES.join(", ")
    ))
}

/// An enumerated string value; the empty string means "not set"
fn parse_choice<T: FromStr>(key: &str, value: &Value, what: &str, names: &[&str]) -> Result<Option<T>> {
    let s = expect_string(key, value)?;
    if s.is_empty() {
        return Ok(None);
    }
    s.parse::<T>().map(Some).map_err(|_| {
        HarnessError::ConfigError(format!(
            "The {} is not available, the implemented {} keys are: {}",
            what,
            what,
            names.join(", ")
        ))
    })
}

fn parse_grid(value: &Value) -> Result<Option<ParameterGrid>> {
    match value {
        Value::String(s) if s.is_empty() => Ok(None),
        Value::String(s) => Err(HarnessError::ConfigError(format!(
            "parameters grid file could not be loaded: {}",
            s
        ))),
        Value::Object(_) => {
            let grid = ParameterGrid::from_json(value)?;
            Ok(if grid.is_empty() { None } else { Some(grid) })
        }
        _ => Err(type_error("parameters_grid", "a string or an object")),
    }
}

/// Read a parameter file; the top level must be a JSON object
pub fn load_parameters(path: &Path) -> Result<Parameters> {
    let text = std::fs::read_to_string(path)?;
    match serde_json::from_str::<Value>(&text)? {
        Value::Object(map) => Ok(map),
        _ => Err(HarnessError::ConfigError(
            "The input is not a valid dictionary.".to_string(),
        )),
    }
}

/// Resolve a `parameters_grid` given as a file path
///
/// An existing file is loaded in place. Otherwise, when several models are
/// listed, the grid is cleared so every family searches its default grid.
pub fn resolve_parameters_grid(params: &mut Parameters, base_dir: &Path) -> Result<()> {
    let path = match params.get("parameters_grid") {
        Some(Value::String(s)) if !s.is_empty() => PathBuf::from(s),
        _ => return Ok(()),
    };
    let path = if path.is_relative() && !path.exists() {
        base_dir.join(path)
    } else {
        path
    };

    if path.is_file() {
        let grid = load_parameters(&path)?;
        info!(path = %path.display(), "loaded parameters grid");
        params.insert("parameters_grid".to_string(), Value::Object(grid));
    } else if matches!(params.get("model"), Some(Value::Array(models)) if models.len() > 1) {
        warn!(path = %path.display(), "parameters grid not found, using default grids");
        params.insert("parameters_grid".to_string(), Value::String(String::new()));
    }
    Ok(())
}

/// Cartesian expansion over every list-valued key except `features`
///
/// The first expanded key varies fastest.
pub fn generate_combinations(params: &Parameters) -> Vec<Parameters> {
    let mut combinations = vec![Parameters::new()];

    for (key, value) in params.iter().rev() {
        match value {
            Value::Array(items) if key != "features" => {
                let mut next = Vec::with_capacity(combinations.len() * items.len());
                for item in items {
                    for partial in &combinations {
                        let mut c = partial.clone();
                        c.insert(key.clone(), item.clone());
                        next.push(c);
                    }
                }
                combinations = next;
            }
            _ => {
                for c in &mut combinations {
                    c.insert(key.clone(), value.clone());
                }
            }
        }
    }
    combinations
}
