//! Hyperparameter values, grids and value domains

use crate::error::{HarnessError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Smallest value a strictly positive hyperparameter is clamped to
pub const MIN_POSITIVE: f64 = 1e-6;

/// A single hyperparameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl ParamValue {
    /// Numeric view of the value. Booleans are categorical and have none.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Whether grid refinement may treat this value as a point on a number line
    pub fn is_numeric(&self) -> bool {
        matches!(self, ParamValue::Int(_) | ParamValue::Float(_))
    }

    /// Convert a JSON scalar into a value
    pub fn from_json(name: &str, value: &Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(ParamValue::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(ParamValue::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(ParamValue::Float(f))
                } else {
                    Err(HarnessError::invalid_param(name, n, "number out of range"))
                }
            }
            Value::String(s) => Ok(ParamValue::String(s.clone())),
            other => Err(HarnessError::invalid_param(
                name,
                other,
                "expected a number, string or boolean",
            )),
        }
    }

    pub(crate) fn expect_str(&self, name: &str) -> Result<&str> {
        self.as_str()
            .ok_or_else(|| HarnessError::invalid_param(name, self, "expected a string"))
    }

    pub(crate) fn expect_bool(&self, name: &str) -> Result<bool> {
        self.as_bool()
            .ok_or_else(|| HarnessError::invalid_param(name, self, "expected a boolean"))
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::String(v) => write!(f, "{}", v),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::String(v.to_string())
    }
}

/// One concrete hyperparameter assignment
pub type ParamSet = BTreeMap<String, ParamValue>;

/// Render an assignment as `name=value` pairs
pub fn format_params(params: &ParamSet) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Hyperparameter name mapped to its ordered candidate values
///
/// Names iterate in sorted order, so the Cartesian expansion is stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterGrid {
    entries: BTreeMap<String, Vec<ParamValue>>,
}

impl ParameterGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with<V: Into<ParamValue>>(mut self, name: &str, values: Vec<V>) -> Self {
        self.insert(name, values.into_iter().map(Into::into).collect());
        self
    }

    pub fn insert(&mut self, name: &str, values: Vec<ParamValue>) {
        self.entries.insert(name.to_string(), values);
    }

    pub fn get(&self, name: &str) -> Option<&[ParamValue]> {
        self.entries.get(name).map(|v| v.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<ParamValue>)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of assignments in the Cartesian product
    pub fn n_candidates(&self) -> usize {
        if self.entries.is_empty() {
            return 0;
        }
        self.entries.values().map(|v| v.len()).product()
    }

    /// Expand the grid into every assignment, last name varying fastest
    pub fn candidates(&self) -> Vec<ParamSet> {
        if self.entries.values().any(|v| v.is_empty()) {
            return Vec::new();
        }

        let mut result: Vec<ParamSet> = vec![ParamSet::new()];
        for (name, values) in &self.entries {
            let mut next = Vec::with_capacity(result.len() * values.len());
            for partial in &result {
                for value in values {
                    let mut assignment = partial.clone();
                    assignment.insert(name.clone(), value.clone());
                    next.push(assignment);
                }
            }
            result = next;
        }
        result
    }

    /// Parse a JSON object; scalar entries become single-value lists
    pub fn from_json(value: &Value) -> Result<Self> {
        let map = value.as_object().ok_or_else(|| {
            HarnessError::ConfigError("parameters_grid must be a JSON object".to_string())
        })?;

        let mut grid = ParameterGrid::new();
        for (name, raw) in map {
            let values = match raw {
                Value::Array(items) => items
                    .iter()
                    .map(|item| ParamValue::from_json(name, item))
                    .collect::<Result<Vec<_>>>()?,
                scalar => vec![ParamValue::from_json(name, scalar)?],
            };
            if values.is_empty() {
                return Err(HarnessError::ConfigError(format!(
                    "parameters_grid entry '{}' has no candidate values",
                    name
                )));
            }
            grid.insert(name, values);
        }
        Ok(grid)
    }
}

/// Admissible range of a numeric hyperparameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamDomain {
    /// Any real number
    Real,
    /// Strictly greater than zero
    Positive,
    /// Zero or greater
    NonNegative,
    /// In (0, 1]
    Fraction,
    /// In [0, 1]
    Ratio,
    /// Whole number no smaller than `min`
    Count { min: i64 },
}

impl ParamDomain {
    /// Move a refined value back inside the domain
    pub fn clamp(&self, raw: f64) -> ParamValue {
        match *self {
            ParamDomain::Real => ParamValue::Float(raw),
            ParamDomain::Positive => ParamValue::Float(raw.max(MIN_POSITIVE)),
            ParamDomain::NonNegative => ParamValue::Float(raw.max(0.0)),
            ParamDomain::Fraction => ParamValue::Float(raw.clamp(MIN_POSITIVE, 1.0)),
            ParamDomain::Ratio => ParamValue::Float(raw.clamp(0.0, 1.0)),
            ParamDomain::Count { min } => ParamValue::Int((raw.round() as i64).max(min)),
        }
    }

    /// Validate a user supplied value and return it as a float
    pub fn check(&self, name: &str, value: &ParamValue) -> Result<f64> {
        let v = value
            .as_f64()
            .ok_or_else(|| HarnessError::invalid_param(name, value, "expected a number"))?;
        if !v.is_finite() {
            return Err(HarnessError::invalid_param(name, value, "must be finite"));
        }

        let ok = match *self {
            ParamDomain::Real => true,
            ParamDomain::Positive => v > 0.0,
            ParamDomain::NonNegative => v >= 0.0,
            ParamDomain::Fraction => v > 0.0 && v <= 1.0,
            ParamDomain::Ratio => (0.0..=1.0).contains(&v),
            ParamDomain::Count { min } => v.fract() == 0.0 && v >= min as f64,
        };

        if ok {
            Ok(v)
        } else {
            Err(HarnessError::invalid_param(name, value, &self.describe()))
        }
    }

    /// Validate a whole-number value
    pub fn check_count(&self, name: &str, value: &ParamValue) -> Result<usize> {
        Ok(self.check(name, value)? as usize)
    }

    fn describe(&self) -> String {
        match self {
            ParamDomain::Real => "must be a real number".to_string(),
            ParamDomain::Positive => "must be greater than 0".to_string(),
            ParamDomain::NonNegative => "must be 0 or greater".to_string(),
            ParamDomain::Fraction => "must be in (0, 1]".to_string(),
            ParamDomain::Ratio => "must be in [0, 1]".to_string(),
            ParamDomain::Count { min } => format!("must be a whole number >= {}", min),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_candidates_cartesian() {
        let grid = ParameterGrid::new()
            .with("C", vec![0.1, 1.0])
            .with("gamma", vec![0.1, 1.0, 10.0]);

        let candidates = grid.candidates();
        assert_eq!(candidates.len(), 6);
        assert_eq!(grid.n_candidates(), 6);
        // last name varies fastest
        assert_eq!(candidates[0]["gamma"], ParamValue::Float(0.1));
        assert_eq!(candidates[1]["gamma"], ParamValue::Float(1.0));
        assert_eq!(candidates[3]["C"], ParamValue::Float(1.0));
    }

    #[test]
    fn test_from_json_mixed() {
        let grid = ParameterGrid::from_json(&json!({
            "C": [0.1, 0.75, 1, 10],
            "penalty": ["l1"],
            "max_iter": 3000
        }))
        .unwrap();

        assert_eq!(grid.get("C").unwrap()[2], ParamValue::Int(1));
        assert_eq!(grid.get("max_iter").unwrap(), &[ParamValue::Int(3000)]);
        assert_eq!(grid.n_candidates(), 4);
    }

    #[test]
    fn test_from_json_rejects_empty_list() {
        let err = ParameterGrid::from_json(&json!({ "C": [] })).unwrap_err();
        assert!(matches!(err, HarnessError::ConfigError(_)));
    }

    #[test]
    fn test_domain_clamp() {
        assert_eq!(ParamDomain::Positive.clamp(-0.5), ParamValue::Float(MIN_POSITIVE));
        assert_eq!(ParamDomain::Fraction.clamp(1.5), ParamValue::Float(1.0));
        assert_eq!(ParamDomain::Count { min: 1 }.clamp(0.2), ParamValue::Int(1));
        assert_eq!(ParamDomain::Count { min: 1 }.clamp(87.5), ParamValue::Int(88));
        assert_eq!(ParamDomain::Real.clamp(-3.0), ParamValue::Float(-3.0));
    }

    #[test]
    fn test_domain_check() {
        assert!(ParamDomain::Positive.check("C", &ParamValue::Float(0.0)).is_err());
        assert!(ParamDomain::Count { min: 1 }.check("n", &ParamValue::Float(2.5)).is_err());
        assert_eq!(
            ParamDomain::Count { min: 1 }.check_count("n", &ParamValue::Float(3.0)).unwrap(),
            3
        );
        assert!(ParamDomain::Ratio.check("r", &ParamValue::Bool(true)).is_err());
    }

    #[test]
    fn test_untagged_deserialize() {
        let values: Vec<ParamValue> = serde_json::from_str(r#"[1, 1.5, "l1", true]"#).unwrap();
        assert_eq!(
            values,
            vec![
                ParamValue::Int(1),
                ParamValue::Float(1.5),
                ParamValue::String("l1".to_string()),
                ParamValue::Bool(true),
            ]
        );
    }
}
