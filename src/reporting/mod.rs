//! Output folder, per-configuration artifacts and the `output.csv` summary

use crate::config::Parameters;
use crate::error::{HarnessError, Result};
use crate::pipeline::{round4, ExperimentRecord};
use chrono::Utc;
use polars::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const OUTPUT_FOLDER: &str = "ML_Pipeline_Output";
pub const SUMMARY_FILE: &str = "output.csv";

/// Create a fresh output folder
///
/// The folder lives inside `output_path` when that directory exists and in
/// the working directory otherwise; taken names get `_1`, `_2`, ... suffixes.
pub fn create_output_folder(output_path: &str) -> Result<PathBuf> {
    let parent = Path::new(output_path);
    let base = if !output_path.is_empty() && parent.is_dir() {
        parent.to_path_buf()
    } else {
        PathBuf::from(".")
    };

    let mut folder = base.join(OUTPUT_FOLDER);
    let mut counter = 1;
    while folder.exists() {
        folder = base.join(format!("{}_{}", OUTPUT_FOLDER, counter));
        counter += 1;
    }

    fs::create_dir_all(&folder)?;
    info!(folder = %folder.display(), "created output folder");
    Ok(folder)
}

#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Num(f64),
    Text(String),
}

impl From<&Value> for Cell {
    fn from(value: &Value) -> Self {
        match value {
            Value::Number(n) => n.as_f64().map(Cell::Num).unwrap_or_else(|| Cell::Text(n.to_string())),
            Value::String(s) => Cell::Text(s.clone()),
            other => Cell::Text(other.to_string()),
        }
    }
}

type Row = Vec<(String, Cell)>;

fn push(row: &mut Row, key: &str, cell: Cell) {
    // a nested key never overwrites a top-level one
    let key = if row.iter().any(|(k, _)| k == key) {
        format!("best_{}", key)
    } else {
        key.to_string()
    };
    row.push((key, cell));
}

/// Collects one summary row per configuration and writes its artifacts
pub struct ReportWriter {
    folder: PathBuf,
    rows: Vec<Row>,
}

impl ReportWriter {
    pub fn new(folder: PathBuf) -> Self {
        Self { folder, rows: Vec::new() }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Write `<i>_<model>_roc.svg`, `_roc.png` and `_model.json`, then add the row
    pub fn record(&mut self, index: usize, params: &Parameters, record: &ExperimentRecord) -> Result<()> {
        let stem = format!("{}_{}", index, record.model);
        fs::write(self.folder.join(format!("{}_roc.svg", stem)), &record.roc.svg)?;
        fs::write(self.folder.join(format!("{}_roc.png", stem)), &record.roc.png)?;
        fs::write(
            self.folder.join(format!("{}_model.json", stem)),
            serde_json::to_string_pretty(&record.estimator)?,
        )?;
        debug!(stem = %stem, "wrote artifacts");

        let mut row = parameter_cells(index, params);
        for (name, value) in &record.best_params {
            let cell = match value.as_f64() {
                Some(v) if value.is_numeric() => Cell::Num(v),
                _ => Cell::Text(value.to_string()),
            };
            push(&mut row, name, cell);
        }
        for (name, value) in record.rounded_results() {
            push(&mut row, name, Cell::Num(value));
        }
        push(&mut row, "cv_score", Cell::Num(round4(record.search.best_cv_score)));
        push(&mut row, "search_iterations", Cell::Num(record.search.iterations as f64));
        push(&mut row, "refinements", Cell::Num(record.search.refinements as f64));
        push(
            &mut row,
            "excluded_runs",
            Cell::Num(record.evaluation_results.n_excluded as f64),
        );
        push(
            &mut row,
            "feature_importances",
            Cell::Text(serde_json::to_string(&record.feature_importances)?),
        );
        push(&mut row, "duration_secs", Cell::Num(round4(record.duration_secs)));
        push(&mut row, "finished_at", Cell::Text(Utc::now().to_rfc3339()));

        self.rows.push(row);
        Ok(())
    }

    /// Add the row of a configuration that failed
    pub fn record_failure(&mut self, index: usize, params: &Parameters, error: &HarnessError) {
        let mut row = parameter_cells(index, params);
        push(&mut row, "error", Cell::Text(error.to_string()));
        push(&mut row, "finished_at", Cell::Text(Utc::now().to_rfc3339()));
        self.rows.push(row);
    }

    /// Write `output.csv`; columns appear in first-seen order
    pub fn finish(&self) -> Result<PathBuf> {
        let mut df = self.to_dataframe()?;
        let path = self.folder.join(SUMMARY_FILE);
        let mut file = fs::File::create(&path)?;
        CsvWriter::new(&mut file).finish(&mut df)?;
        info!(path = %path.display(), rows = df.height(), "wrote summary");
        Ok(path)
    }

    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut names: Vec<&str> = Vec::new();
        for row in &self.rows {
            for (key, _) in row {
                if !names.contains(&key.as_str()) {
                    names.push(key);
                }
            }
        }

        let columns: Vec<Column> = names
            .iter()
            .map(|&name| {
                let cells: Vec<Option<&Cell>> = self
                    .rows
                    .iter()
                    .map(|row| row.iter().find(|(k, _)| k == name).map(|(_, c)| c))
                    .collect();
                let numeric = cells.iter().flatten().all(|c| matches!(c, Cell::Num(_)));

                if numeric {
                    let values: Vec<Option<f64>> = cells
                        .iter()
                        .map(|c| match c {
                            Some(Cell::Num(v)) => Some(*v),
                            _ => None,
                        })
                        .collect();
                    Series::new(name.into(), values).into()
                } else {
                    let values: Vec<Option<String>> = cells
                        .iter()
                        .map(|c| match c {
                            Some(Cell::Num(v)) => Some(v.to_string()),
                            Some(Cell::Text(s)) => Some(s.clone()),
                            None => None,
                        })
                        .collect();
                    Series::new(name.into(), values).into()
                }
            })
            .collect();

        DataFrame::new(columns).map_err(HarnessError::from)
    }
}

/// Index plus the configuration as given, without the grid
fn parameter_cells(index: usize, params: &Parameters) -> Row {
    let mut row: Row = vec![("index".to_string(), Cell::Num(index as f64))];
    for (key, value) in params {
        if key != "parameters_grid" {
            row.push((key.clone(), Cell::from(value)));
        }
    }
    row
}
