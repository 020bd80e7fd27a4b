//! DataFrame to train/test tensors

use crate::error::{HarnessError, Result};
use crate::evaluation::train_test_split;
use super::{CategoryEncoder, ClassBalancer, FeatureScaler, PreprocessingConfig};
use ndarray::{Array1, Array2, Axis};
use polars::prelude::*;
use tracing::{debug, info};

/// Prepared tensors of one experiment
#[derive(Debug, Clone)]
pub struct Dataset {
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Array1<f64>,
    pub y_test: Array1<f64>,
    /// Names of the columns of `x_train`/`x_test`
    pub feature_names: Vec<String>,
    /// Original label of each class value, in ascending class order
    pub class_labels: Vec<String>,
    /// Balancer for every fit set drawn from these tensors; the tensors themselves are never balanced
    pub balancer: Option<ClassBalancer>,
}

impl Dataset {
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Training rows followed by test rows
    pub fn pooled(&self) -> Result<(Array2<f64>, Array1<f64>)> {
        let x = ndarray::concatenate(Axis(0), &[self.x_train.view(), self.x_test.view()])?;
        let y = ndarray::concatenate(Axis(0), &[self.y_train.view(), self.y_test.view()])?;
        Ok((x, y))
    }
}

enum RawColumn {
    Numeric(Vec<f64>),
    Categorical(Vec<String>),
}

/// Select, encode, split and scale `df`
///
/// The configured balancer is carried on the [`Dataset`] instead of being
/// applied here, so that no balanced copy of a row can end up on both sides
/// of a later split.
pub fn prepare(df: &DataFrame, config: &PreprocessingConfig) -> Result<Dataset> {
    let (y, class_labels) = extract_target(df, &config.target)?;

    let feature_cols: Vec<String> = match &config.features {
        Some(cols) => cols.clone(),
        None => df
            .get_column_names()
            .into_iter()
            .filter(|name| name.as_str() != config.target)
            .map(|s| s.to_string())
            .collect(),
    };
    if feature_cols.is_empty() {
        return Err(HarnessError::DataError("no feature columns selected".to_string()));
    }

    let raw: Vec<(String, RawColumn)> = feature_cols
        .iter()
        .map(|name| Ok((name.clone(), extract_column(df, name)?)))
        .collect::<Result<_>>()?;

    let split = train_test_split(df.height(), config.test_size, config.random_state)?;
    let y_train = y.select(Axis(0), &split.fit_indices);
    let y_test = y.select(Axis(0), &split.score_indices);

    let mut encoder = config.encoder.map(CategoryEncoder::new);
    let mut names: Vec<String> = Vec::new();
    let mut train_cols: Vec<Vec<f64>> = Vec::new();
    let mut test_cols: Vec<Vec<f64>> = Vec::new();

    for (name, column) in &raw {
        match column {
            RawColumn::Numeric(values) => {
                names.push(name.clone());
                train_cols.push(pick(values, &split.fit_indices));
                test_cols.push(pick(values, &split.score_indices));
            }
            RawColumn::Categorical(values) => {
                let encoder = encoder.as_mut().ok_or_else(|| {
                    HarnessError::DataError(format!(
                        "column '{}' is not numeric and no encoder is configured",
                        name
                    ))
                })?;
                let train_values = pick(values, &split.fit_indices);
                encoder.fit_column(name, &train_values, &y_train)?;

                let encoded_train = encoder.transform_column(name, &train_values)?;
                let encoded_test = encoder.transform_column(name, &pick(values, &split.score_indices))?;
                for ((col_name, train), (_, test)) in encoded_train.into_iter().zip(encoded_test) {
                    names.push(col_name);
                    train_cols.push(train);
                    test_cols.push(test);
                }
            }
        }
    }

    let mut x_train = columns_to_array2(&train_cols, split.fit_indices.len());
    let mut x_test = columns_to_array2(&test_cols, split.score_indices.len());

    if let Some(scaler_type) = config.scaler {
        let mut scaler = FeatureScaler::new(scaler_type);
        x_train = scaler.fit_transform(&x_train)?;
        x_test = scaler.transform(&x_test)?;
        debug!(scaler = %scaler_type, "scaled features");
    }

    info!(
        train = x_train.nrows(),
        test = x_test.nrows(),
        features = names.len(),
        classes = class_labels.len(),
        "prepared dataset"
    );

    Ok(Dataset {
        x_train,
        x_test,
        y_train,
        y_test,
        feature_names: names,
        class_labels,
        balancer: config
            .balancer
            .map(|b| ClassBalancer::new(b).with_seed(config.random_state)),
    })
}

/// Numeric targets keep their values; anything else becomes sorted class indices
fn extract_target(df: &DataFrame, target: &str) -> Result<(Array1<f64>, Vec<String>)> {
    match extract_column(df, target)? {
        RawColumn::Numeric(values) => {
            let mut classes = values.clone();
            classes.sort_by(|a, b| a.total_cmp(b));
            classes.dedup();
            let labels = classes.iter().map(|c| c.to_string()).collect();
            Ok((Array1::from_vec(values), labels))
        }
        RawColumn::Categorical(values) => {
            let mut labels = values.clone();
            labels.sort();
            labels.dedup();
            let y = values
                .iter()
                .map(|v| labels.binary_search(v).map(|i| i as f64).unwrap_or(0.0))
                .collect();
            Ok((y, labels))
        }
    }
}

fn extract_column(df: &DataFrame, name: &str) -> Result<RawColumn> {
    let column = df
        .column(name)
        .map_err(|_| HarnessError::FeatureNotFound(name.to_string()))?;
    if column.null_count() > 0 {
        return Err(HarnessError::DataError(format!("column '{}' has missing values", name)));
    }
    let series = column.as_materialized_series();

    match series.dtype() {
        DataType::String | DataType::Categorical(_, _) => {
            let strings = series.cast(&DataType::String)?;
            let values = strings
                .str()?
                .into_iter()
                .map(|v| v.unwrap_or_default().to_string())
                .collect();
            Ok(RawColumn::Categorical(values))
        }
        _ => {
            let numeric = series
                .cast(&DataType::Float64)
                .map_err(|e| HarnessError::DataError(format!("column '{}': {}", name, e)))?;
            let values = numeric.f64()?.into_iter().map(|v| v.unwrap_or(0.0)).collect();
            Ok(RawColumn::Numeric(values))
        }
    }
}

fn pick<T: Clone>(values: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().map(|&i| values[i].clone()).collect()
}

fn columns_to_array2(columns: &[Vec<f64>], n_rows: usize) -> Array2<f64> {
    Array2::from_shape_fn((n_rows, columns.len()), |(r, c)| columns[c][r])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::{BalancerType, EncoderType, ScalerType};

    fn frame() -> DataFrame {
        df!(
            "age" => [25.0, 30.0, 35.0, 40.0, 45.0, 50.0, 55.0, 60.0, 65.0, 70.0],
            "city" => ["NYC", "LA", "NYC", "SF", "LA", "NYC", "SF", "LA", "NYC", "SF"],
            "label" => ["no", "no", "yes", "no", "yes", "no", "yes", "no", "yes", "yes"]
        )
        .unwrap()
    }

    #[test]
    fn test_string_target_is_indexed() {
        let config = PreprocessingConfig::new("label")
            .with_features(vec!["age".to_string()])
            .with_test_size(0.2);
        let data = prepare(&frame(), &config).unwrap();

        assert_eq!(data.class_labels, vec!["no".to_string(), "yes".to_string()]);
        assert_eq!(data.x_train.nrows(), 8);
        assert_eq!(data.x_test.nrows(), 2);
        assert!(data.y_train.iter().chain(data.y_test.iter()).all(|&v| v == 0.0 || v == 1.0));
    }

    #[test]
    fn test_string_feature_needs_encoder() {
        let config = PreprocessingConfig::new("label");
        let err = prepare(&frame(), &config).unwrap_err();
        assert!(matches!(err, HarnessError::DataError(_)));
    }

    #[test]
    fn test_one_hot_and_scaling() {
        let config = PreprocessingConfig::new("label")
            .with_encoder(EncoderType::OneHot)
            .with_scaler(ScalerType::MinMax);
        let data = prepare(&frame(), &config).unwrap();

        assert_eq!(data.feature_names[0], "age");
        assert!(data.feature_names.iter().any(|n| n.starts_with("city_")));
        assert_eq!(data.n_features(), data.x_train.ncols());
        let ages = data.x_train.column(0);
        assert_eq!(ages.iter().cloned().fold(f64::INFINITY, f64::min), 0.0);
        assert_eq!(ages.iter().cloned().fold(f64::NEG_INFINITY, f64::max), 1.0);
    }

    #[test]
    fn test_balancer_is_carried_not_applied() {
        let config = PreprocessingConfig::new("label")
            .with_features(vec!["age".to_string()])
            .with_balancer(BalancerType::RandomOversampling);
        let data = prepare(&frame(), &config).unwrap();

        assert!(data.balancer.is_some());
        assert_eq!(data.x_train.nrows(), 8);
        assert_eq!(data.y_train.len(), 8);
        let (x, y) = data.pooled().unwrap();
        assert_eq!(x.nrows(), 10);
        assert_eq!(y.len(), 10);
    }

    #[test]
    fn test_missing_column() {
        let config = PreprocessingConfig::new("nope");
        assert!(matches!(prepare(&frame(), &config), Err(HarnessError::FeatureNotFound(_))));
    }
}
