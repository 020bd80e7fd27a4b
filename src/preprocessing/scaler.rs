//! Feature scaling

use crate::error::{HarnessError, Result};
use super::ScalerType;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Column-wise scaler fitted on training rows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureScaler {
    scaler_type: ScalerType,
    /// mean or min per column
    center: Option<Array1<f64>>,
    /// std or range per column
    scale: Option<Array1<f64>>,
}

impl FeatureScaler {
    pub fn new(scaler_type: ScalerType) -> Self {
        Self {
            scaler_type,
            center: None,
            scale: None,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        if x.nrows() == 0 {
            return Err(HarnessError::DataError("cannot fit a scaler on zero rows".to_string()));
        }

        let (center, scale) = match self.scaler_type {
            ScalerType::MinMax => {
                let min = x.fold_axis(Axis(0), f64::INFINITY, |a, &b| a.min(b));
                let max = x.fold_axis(Axis(0), f64::NEG_INFINITY, |a, &b| a.max(b));
                let range = &max - &min;
                (min, range)
            }
            ScalerType::ZScore => {
                let mean = x
                    .mean_axis(Axis(0))
                    .ok_or_else(|| HarnessError::DataError("empty input".to_string()))?;
                (mean, x.std_axis(Axis(0), 0.0))
            }
        };

        // constant columns pass through unscaled
        self.scale = Some(scale.mapv(|s| if s == 0.0 { 1.0 } else { s }));
        self.center = Some(center);
        Ok(self)
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (center, scale) = match (&self.center, &self.scale) {
            (Some(c), Some(s)) => (c, s),
            _ => return Err(HarnessError::ModelNotFitted),
        };
        if x.ncols() != center.len() {
            return Err(HarnessError::ShapeError {
                expected: format!("{} columns", center.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }
        Ok((x - center) / scale)
    }

    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_min_max() {
        let x = array![[1.0, 5.0], [3.0, 5.0], [5.0, 5.0]];
        let scaled = FeatureScaler::new(ScalerType::MinMax).fit_transform(&x).unwrap();
        assert_eq!(scaled.column(0).to_vec(), vec![0.0, 0.5, 1.0]);
        assert_eq!(scaled.column(1).to_vec(), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_z_score_uses_training_statistics() {
        let train = array![[1.0], [3.0]];
        let mut scaler = FeatureScaler::new(ScalerType::ZScore);
        scaler.fit(&train).unwrap();

        let scaled = scaler.transform(&array![[1.0], [2.0], [5.0]]).unwrap();
        assert_eq!(scaled.column(0).to_vec(), vec![-1.0, 0.0, 3.0]);
    }

    #[test]
    fn test_unfitted() {
        let scaler = FeatureScaler::new(ScalerType::MinMax);
        assert!(matches!(scaler.transform(&array![[1.0]]), Err(HarnessError::ModelNotFitted)));
    }
}
