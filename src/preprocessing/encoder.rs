//! Categorical encoding

use crate::error::{HarnessError, Result};
use super::EncoderType;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
enum FittedColumn {
    OneHot { categories: Vec<String> },
    Target { means: BTreeMap<String, f64>, prior: f64 },
}

/// Encoder for string feature columns, fitted on training rows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryEncoder {
    encoder_type: EncoderType,
    columns: BTreeMap<String, FittedColumn>,
}

impl CategoryEncoder {
    pub fn new(encoder_type: EncoderType) -> Self {
        Self {
            encoder_type,
            columns: BTreeMap::new(),
        }
    }

    pub fn encoder_type(&self) -> EncoderType {
        self.encoder_type
    }

    /// Learn the categories (or category means) of one column
    pub fn fit_column(&mut self, name: &str, values: &[String], y: &Array1<f64>) -> Result<&mut Self> {
        if values.len() != y.len() {
            return Err(HarnessError::ShapeError {
                expected: format!("{} values", y.len()),
                actual: format!("{} values", values.len()),
            });
        }
        if values.is_empty() {
            return Err(HarnessError::DataError(format!("column '{}' has no training rows", name)));
        }

        let fitted = match self.encoder_type {
            EncoderType::OneHot => {
                let mut categories: Vec<String> = values.to_vec();
                categories.sort();
                categories.dedup();
                FittedColumn::OneHot { categories }
            }
            EncoderType::TargetEncoding => {
                let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
                for (value, &target) in values.iter().zip(y.iter()) {
                    let entry = sums.entry(value.clone()).or_insert((0.0, 0));
                    entry.0 += target;
                    entry.1 += 1;
                }
                let means = sums
                    .into_iter()
                    .map(|(k, (sum, count))| (k, sum / count as f64))
                    .collect();
                FittedColumn::Target {
                    means,
                    prior: y.mean().unwrap_or(0.0),
                }
            }
        };

        self.columns.insert(name.to_string(), fitted);
        Ok(self)
    }

    /// Encoded output columns for `values`, named after the source column
    ///
    /// One-hot columns are named `<column>_<category>`; a category unseen
    /// during fitting encodes as all zeros, or as the training mean target.
    pub fn transform_column(&self, name: &str, values: &[String]) -> Result<Vec<(String, Vec<f64>)>> {
        let fitted = self
            .columns
            .get(name)
            .ok_or_else(|| HarnessError::FeatureNotFound(name.to_string()))?;

        Ok(match fitted {
            FittedColumn::OneHot { categories } => categories
                .iter()
                .map(|category| {
                    let indicator = values
                        .iter()
                        .map(|v| if v == category { 1.0 } else { 0.0 })
                        .collect();
                    (format!("{}_{}", name, category), indicator)
                })
                .collect(),
            FittedColumn::Target { means, prior } => {
                let encoded = values
                    .iter()
                    .map(|v| means.get(v).copied().unwrap_or(*prior))
                    .collect();
                vec![(name.to_string(), encoded)]
            }
        })
    }
}
