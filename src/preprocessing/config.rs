//! Preprocessing configuration

use serde::{Deserialize, Serialize};
use super::{BalancerType, EncoderType, ScalerType};

/// Configuration for data preparation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Column holding the class labels
    pub target: String,

    /// Feature columns; `None` takes every column except the target
    pub features: Option<Vec<String>>,

    /// Encoder applied to string feature columns
    pub encoder: Option<EncoderType>,

    /// Scaler fitted on the training split
    pub scaler: Option<ScalerType>,

    /// Balancer applied to every fit set, never to scored rows
    pub balancer: Option<BalancerType>,

    /// Fraction of rows held out for testing
    pub test_size: f64,

    /// Random seed for the split and the balancer
    pub random_state: u64,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            target: String::new(),
            features: None,
            encoder: None,
            scaler: None,
            balancer: None,
            test_size: 0.2,
            random_state: 42,
        }
    }
}

impl PreprocessingConfig {
    /// Create a configuration predicting `target`
    pub fn new(target: &str) -> Self {
        Self {
            target: target.to_string(),
            ..Default::default()
        }
    }

    pub fn with_features(mut self, features: Vec<String>) -> Self {
        self.features = Some(features);
        self
    }

    pub fn with_encoder(mut self, encoder: EncoderType) -> Self {
        self.encoder = Some(encoder);
        self
    }

    pub fn with_scaler(mut self, scaler: ScalerType) -> Self {
        self.scaler = Some(scaler);
        self
    }

    pub fn with_balancer(mut self, balancer: BalancerType) -> Self {
        self.balancer = Some(balancer);
        self
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PreprocessingConfig::default();
        assert_eq!(config.test_size, 0.2);
        assert!(config.scaler.is_none());
        assert!(config.features.is_none());
    }

    #[test]
    fn test_builder_pattern() {
        let config = PreprocessingConfig::new("label")
            .with_scaler(ScalerType::MinMax)
            .with_balancer(BalancerType::Smote)
            .with_test_size(0.3);

        assert_eq!(config.target, "label");
        assert_eq!(config.scaler, Some(ScalerType::MinMax));
        assert_eq!(config.balancer, Some(BalancerType::Smote));
        assert_eq!(config.test_size, 0.3);
    }
}
