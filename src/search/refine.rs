//! Grid refinement around the winning point of a search pass

use crate::training::{ModelFamily, ParamSet, ParamValue, ParameterGrid};

/// `n` evenly spaced points strictly between `x` and `y`
pub fn generate_interval(x: f64, y: f64, n: usize) -> Vec<f64> {
    let step = (x - y).abs() / (n as f64 + 1.0);
    let start = x.min(y);
    (1..=n).map(|i| start + i as f64 * step).collect()
}

/// Extrapolated lower neighbour of a value at the low edge of its list
pub fn previous_number(value: f64) -> f64 {
    value - 3.0 * (value.abs() / 4.0)
}

/// Extrapolated upper neighbour of a value at the high edge of its list
pub fn next_number(value: f64) -> f64 {
    value + 3.0 * (value.abs() / 4.0)
}

/// Two points on each side of `values[position]`, the winner itself excluded
///
/// Edge winners get an extrapolated neighbour on their open side.
pub fn refine_values(values: &[f64], position: usize) -> Vec<f64> {
    let v = values[position];
    let last = values.len() - 1;

    let (bottom, top) = if position == last {
        (values[position - 1], next_number(v))
    } else if position == 0 {
        (previous_number(v), values[position + 1])
    } else {
        (values[position - 1], values[position + 1])
    };

    let mut refined = generate_interval(bottom, v, 2);
    refined.extend(generate_interval(top, v, 2));
    refined
}

/// Narrow every numeric multi-valued entry of `grid` around `best`
///
/// Categorical entries, single values and lists mixing kinds pass through
/// unchanged. Refined values are clamped into the family's domain for the
/// hyperparameter and de-duplicated in order.
pub fn modify_grid_params(grid: &ParameterGrid, best: &ParamSet, family: ModelFamily) -> ParameterGrid {
    let mut refined = ParameterGrid::new();

    for (name, values) in grid.iter() {
        let next = refine_entry(name, values, best.get(name), family).unwrap_or_else(|| values.clone());
        refined.insert(name, next);
    }
    refined
}

fn refine_entry(
    name: &str,
    values: &[ParamValue],
    winner: Option<&ParamValue>,
    family: ModelFamily,
) -> Option<Vec<ParamValue>> {
    if values.len() < 2 {
        return None;
    }
    let numbers: Vec<f64> = values.iter().map(|v| v.as_f64()).collect::<Option<_>>()?;
    let position = values.iter().position(|v| Some(v) == winner)?;

    let raw = refine_values(&numbers, position);
    let mut out: Vec<ParamValue> = Vec::with_capacity(raw.len());
    for r in raw {
        let value = match family.domain(name) {
            Some(domain) => domain.clamp(r),
            None => ParamValue::Float(r),
        };
        if !out.contains(&value) {
            out.push(value);
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: &[f64], b: &[f64]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-9)
    }

    #[test]
    fn test_generate_interval() {
        assert!(close(&generate_interval(0.75, 1.0, 2), &[0.75 + 0.25 / 3.0, 0.75 + 0.5 / 3.0]));
        assert!(close(&generate_interval(10.0, 1.0, 2), &[4.0, 7.0]));
        assert!(close(&generate_interval(1.0, 10.0, 2), &[4.0, 7.0]));
    }

    #[test]
    fn test_neighbours() {
        assert!((previous_number(0.1) - 0.025).abs() < 1e-12);
        assert!((next_number(10.0) - 17.5).abs() < 1e-12);
        // the step scales with |v|, so a negative value still moves outwards
        assert!((previous_number(-4.0) + 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_refine_interior_winner() {
        let refined = refine_values(&[0.1, 0.75, 1.0, 10.0], 2);
        assert!(close(&refined, &[0.8333333333333334, 0.9166666666666666, 4.0, 7.0]));
        assert!(!refined.contains(&1.0));
    }

    #[test]
    fn test_refine_edge_winners() {
        let low = refine_values(&[0.1, 1.0], 0);
        assert_eq!(low.len(), 4);
        assert!(low.iter().all(|&v| v > 0.025 && v < 1.0));
        assert!(close(&low[..2], &[0.05, 0.075]));

        let high = refine_values(&[0.1, 1.0], 1);
        assert!(close(&high, &[0.4, 0.7, 1.25, 1.5]));
    }

    #[test]
    fn test_modify_grid_keeps_categorical() {
        let grid = ModelFamily::LogisticRegression.default_grid();
        let best = grid.candidates()[2].clone();
        let refined = modify_grid_params(&grid, &best, ModelFamily::LogisticRegression);

        assert_eq!(refined.get("penalty"), grid.get("penalty"));
        assert_eq!(refined.get("solver"), grid.get("solver"));
        assert_eq!(refined.get("max_iter"), grid.get("max_iter"));
        let c: Vec<f64> = refined.get("C").unwrap().iter().filter_map(|v| v.as_f64()).collect();
        assert!(close(&c, &[0.8333333333333334, 0.9166666666666666, 4.0, 7.0]));
    }

    #[test]
    fn test_counts_are_rounded_and_deduplicated() {
        let grid = ParameterGrid::new().with("max_depth", vec![1i64, 2]);
        let mut best = ParamSet::new();
        best.insert("max_depth".to_string(), ParamValue::Int(1));

        let refined = modify_grid_params(&grid, &best, ModelFamily::RandomForest);
        let depths = refined.get("max_depth").unwrap();
        // raw [0.5, 0.75, 1.33, 1.67] -> clamped [1, 1, 1, 2]
        assert_eq!(depths, &[ParamValue::Int(1), ParamValue::Int(2)]);
    }

    #[test]
    fn test_positive_floor() {
        let grid = ParameterGrid::new().with("C", vec![-1.0, 1.0]);
        let mut best = ParamSet::new();
        best.insert("C".to_string(), ParamValue::Float(-1.0));

        let refined = modify_grid_params(&grid, &best, ModelFamily::RbfSvm);
        assert!(refined
            .get("C")
            .unwrap()
            .iter()
            .all(|v| v.as_f64().is_some_and(|c| c > 0.0)));
    }
}
