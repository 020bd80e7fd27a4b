//! Data preparation
//!
//! Turns a polars `DataFrame` into train/test tensors:
//! - Feature selection and target class encoding
//! - Categorical encoding (OneHot, Target encoding)
//! - Feature scaling (MinMax, Z-score) fitted on the training split
//! - Class balancing of the training split (random over/undersampling, SMOTE)

mod balancer;
mod config;
mod dataset;
mod encoder;
mod scaler;

pub use balancer::ClassBalancer;
pub use config::PreprocessingConfig;
pub use dataset::{prepare, Dataset};
pub use encoder::CategoryEncoder;
pub use scaler::FeatureScaler;

use crate::error::{HarnessError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Type of scaler to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalerType {
    /// (x - min) / (max - min)
    MinMax,
    /// (x - mean) / std
    ZScore,
}

/// Type of encoder for string columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncoderType {
    /// One indicator column per category
    OneHot,
    /// Category replaced by its mean target on the training split
    TargetEncoding,
}

/// Class balancing technique
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalancerType {
    Smote,
    RandomOversampling,
    RandomUndersampling,
}

macro_rules! named_enum {
    ($ty:ident, $key:expr, { $($variant:ident => $name:expr),+ $(,)? }) => {
        impl $ty {
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $name),+
                }
            }
        }

        impl FromStr for $ty {
            type Err = HarnessError;

            fn from_str(s: &str) -> Result<Self> {
                $ty::ALL.iter().copied().find(|v| v.as_str() == s).ok_or_else(|| {
                    let names: Vec<&str> = $ty::ALL.iter().map(|v| v.as_str()).collect();
                    HarnessError::invalid_param($key, s, &format!("expected one of {}", names.join(", ")))
                })
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

named_enum!(ScalerType, "scaler", { MinMax => "min_max", ZScore => "z_score" });
named_enum!(EncoderType, "encoder", { OneHot => "one_hot", TargetEncoding => "target_encoding" });
named_enum!(BalancerType, "class_balancer", {
    Smote => "smote",
    RandomOversampling => "random_oversampling",
    RandomUndersampling => "random_undersampling",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_parse() {
        assert_eq!("z_score".parse::<ScalerType>().unwrap(), ScalerType::ZScore);
        assert_eq!("one_hot".parse::<EncoderType>().unwrap(), EncoderType::OneHot);
        assert_eq!(
            "random_undersampling".parse::<BalancerType>().unwrap(),
            BalancerType::RandomUndersampling
        );
        assert!("robust".parse::<ScalerType>().is_err());
        assert_eq!(BalancerType::Smote.to_string(), "smote");
    }
}
