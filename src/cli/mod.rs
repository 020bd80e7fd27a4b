//! clf-harness CLI Module
//!
//! Command-line interface for running and validating experiment files.

use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::warn;

use crate::config::{generate_combinations, load_parameters, resolve_parameters_grid, ExperimentConfig, Parameters};
use crate::error::{HarnessError, Result};
use crate::pipeline::{run_experiment, EvaluationSettings, ExperimentRecord};
use crate::preprocessing::prepare;
use crate::reporting::{create_output_folder, ReportWriter};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }
fn fail(s: &str) -> ColoredString   { s.truecolor(230, 100, 100) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "clf-harness")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Classifier experiment harness with adaptive grid search")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run every configuration of a parameter file
    Run {
        /// Input data file (CSV)
        #[arg(short, long)]
        data: PathBuf,

        /// Parameter file (JSON)
        #[arg(short, long)]
        params: PathBuf,
    },

    /// Expand and validate a parameter file without running it
    Validate {
        /// Parameter file (JSON)
        #[arg(short, long)]
        params: PathBuf,
    },
}

// ─── Data loading ──────────────────────────────────────────────────────────────

pub fn load_data(path: &Path) -> anyhow::Result<DataFrame> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    let df = match ext {
        "csv" => CsvReadOptions::default()
            .with_infer_schema_length(Some(1000))
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?,
        _ => anyhow::bail!("Unsupported file format: {}", ext),
    };

    Ok(df)
}

/// Parameter file with its grid path resolved, expanded into combinations
pub fn load_combinations(params_path: &Path) -> Result<Vec<Parameters>> {
    let mut params = load_parameters(params_path)?;
    let base_dir = params_path.parent().unwrap_or_else(|| Path::new("."));
    resolve_parameters_grid(&mut params, base_dir)?;
    Ok(generate_combinations(&params))
}

/// Prepare, search and evaluate one combination
pub fn run_combination(df: &DataFrame, params: &Parameters) -> Result<ExperimentRecord> {
    let config = ExperimentConfig::from_parameters(params)?;
    let data = prepare(df, &config.preprocessing_config())?;
    run_experiment(&data, &EvaluationSettings::from(&config))
}

/// Run every combination, recording failures without stopping; returns the failure count
pub fn run_all(df: &DataFrame, combinations: &[Parameters], writer: &mut ReportWriter) -> Result<usize> {
    let mut n_failed = 0;

    for (index, params) in combinations.iter().enumerate() {
        let model = params.get("model").and_then(|m| m.as_str()).unwrap_or("?");
        step_run(&format!("[{}/{}] {}", index + 1, combinations.len(), model.cyan()));
        let start = Instant::now();

        match run_combination(df, params).and_then(|record| {
            writer.record(index, params, &record)?;
            Ok(record)
        }) {
            Ok(record) => {
                let auc = record
                    .rounded_results()
                    .into_iter()
                    .find(|(name, _)| *name == "auc")
                    .map(|(_, v)| v)
                    .unwrap_or(f64::NAN);
                step_done(&format!("auc {:.4} in {:.2?}", auc, start.elapsed()));
            }
            Err(e) => {
                println!("{} {}", fail("failed"), dim(&e.to_string()));
                warn!(index, error = %e, "configuration failed");
                writer.record_failure(index, params, &e);
                n_failed += 1;
            }
        }
    }

    Ok(n_failed)
}

fn output_path(combinations: &[Parameters]) -> String {
    combinations
        .first()
        .and_then(|c| c.get("output_path"))
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_run(data_path: &Path, params_path: &Path) -> anyhow::Result<()> {
    let start = Instant::now();
    section("Run");

    step_run("Loading parameters");
    let combinations = load_combinations(params_path)?;
    step_done(&format!("{} configurations", combinations.len()));

    step_run("Loading data");
    let df = load_data(data_path)?;
    step_done(&format!("{} rows × {} cols", df.height(), df.width()));

    let folder = create_output_folder(&output_path(&combinations))?;
    let mut writer = ReportWriter::new(folder);

    section("Experiments");
    let n_failed = run_all(&df, &combinations, &mut writer)?;
    let summary = writer.finish()?;

    section("Summary");
    println!("  {}", kv("Configurations", &combinations.len().to_string()));
    println!("  {}", kv("Failed        ", &n_failed.to_string()));
    println!("  {}", kv("Output        ", &summary.display().to_string()));
    println!();
    println!("--- {:.3} seconds ---", start.elapsed().as_secs_f64());

    Ok(())
}

pub fn cmd_validate(params_path: &Path) -> anyhow::Result<()> {
    section("Validate");

    let combinations = load_combinations(params_path)?;
    let mut n_invalid = 0;
    for (index, params) in combinations.iter().enumerate() {
        match ExperimentConfig::from_parameters(params) {
            Ok(config) => println!(
                "  {} {} {} {}",
                ok("✓"),
                index,
                config.model.to_string().cyan(),
                dim(config.evaluation_technique.as_str())
            ),
            Err(e) => {
                println!("  {} {} {}", fail("✗"), index, e);
                n_invalid += 1;
            }
        }
    }

    println!();
    if n_invalid > 0 {
        return Err(HarnessError::ConfigError(format!(
            "{} of {} configurations are invalid",
            n_invalid,
            combinations.len()
        ))
        .into());
    }
    println!("  {}", kv("Configurations", &combinations.len().to_string()));
    Ok(())
}
