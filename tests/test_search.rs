//! Integration tests for the adaptive grid search

use clf_harness::search::{generate_interval, modify_grid_params, refine_values, SearchConfig, SearchEngine, StopReason};
use clf_harness::training::{ModelFamily, ParamSet, ParamValue, ParameterGrid};
use ndarray::{Array1, Array2};

fn close(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-4)
}

fn noisy_data(n: usize) -> (Array2<f64>, Array1<f64>) {
    let x = Array2::from_shape_fn((n, 3), |(i, j)| {
        let class = (i % 2) as f64;
        class * 1.2 + ((i * 13 + j * 7) % 11) as f64 * 0.25
    });
    let y = Array1::from_shape_fn(n, |i| (i % 2) as f64);
    (x, y)
}

#[test]
fn test_refinement_around_interior_winner() {
    let refined = refine_values(&[0.1, 0.75, 1.0, 10.0], 2);
    assert!(close(&refined, &[0.8333, 0.9167, 4.0, 7.0]));
    assert!(!refined.contains(&1.0));
}

#[test]
fn test_generate_interval() {
    assert!(close(&generate_interval(0.75, 1.0, 2), &[0.8333, 0.9167]));
    assert!(close(&generate_interval(10.0, 1.0, 2), &[4.0, 7.0]));
}

#[test]
fn test_refinement_at_lower_edge() {
    let grid = ParameterGrid::new().with("C", vec![0.1, 1.0]).with("gamma", vec![0.5]);
    let mut best = ParamSet::new();
    best.insert("C".to_string(), ParamValue::Float(0.1));
    best.insert("gamma".to_string(), ParamValue::Float(0.5));

    let refined = modify_grid_params(&grid, &best, ModelFamily::RbfSvm);
    let c: Vec<f64> = refined
        .get("C")
        .unwrap()
        .iter()
        .filter_map(|v| v.as_f64())
        .collect();

    assert_eq!(c.len(), 4);
    assert!(c.iter().all(|&v| v > 0.025 && v < 1.0));
    // singleton lists pass through
    assert_eq!(refined.get("gamma").unwrap(), &[ParamValue::Float(0.5)][..]);
}

#[test]
fn test_search_is_bounded() {
    let (x, y) = noisy_data(60);
    let engine = SearchEngine::new(
        ModelFamily::LogisticRegression,
        SearchConfig::new().with_cv_folds(3).with_max_refinements(3),
    );
    let outcome = engine.run(&ModelFamily::LogisticRegression.default_grid(), &x, &y).unwrap();

    assert!(outcome.refinements <= 3);
    assert!(outcome.iterations <= outcome.refinements + 2);
    assert!(outcome.best_score > 0.5 && outcome.best_score <= 1.0);
}

#[test]
fn test_rerun_on_final_grid_stops_immediately() {
    let (x, y) = noisy_data(60);
    let engine = SearchEngine::new(ModelFamily::RbfSvm, SearchConfig::new().with_cv_folds(3));
    let outcome = engine.run(&ModelFamily::RbfSvm.default_grid(), &x, &y).unwrap();

    let rerun = engine
        .run_from(&outcome.final_grid, outcome.best_score, &x, &y)
        .unwrap();
    assert_eq!(rerun.iterations, 1);
    assert_eq!(rerun.refinements, 0);
    assert_eq!(rerun.stop_reason, StopReason::NoImprovement);
    assert_eq!(rerun.best_params, outcome.best_params);
}
