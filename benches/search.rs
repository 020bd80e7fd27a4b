use clf_harness::search::{GridSearch, SearchConfig, SearchEngine};
use clf_harness::training::ModelFamily;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn create_classification_data(n_rows: usize, n_features: usize) -> (Array2<f64>, Array1<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let y = Array1::from_shape_fn(n_rows, |i| (i % 2) as f64);
    let x = Array2::from_shape_fn((n_rows, n_features), |(i, _)| y[i] + rng.gen::<f64>() * 2.0);
    (x, y)
}

fn bench_grid_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid_search");
    group.sample_size(10);

    for n_rows in [100, 400].iter() {
        let (x, y) = create_classification_data(*n_rows, 5);
        let grid = ModelFamily::LogisticRegression.default_grid();

        group.bench_with_input(BenchmarkId::new("logistic_regression", n_rows), n_rows, |b, _| {
            b.iter(|| {
                let search = GridSearch::new(ModelFamily::LogisticRegression, 5, 42);
                black_box(search.fit(&grid, &x, &y).unwrap())
            });
        });
    }

    group.finish();
}

fn bench_refinement(c: &mut Criterion) {
    let mut group = c.benchmark_group("refinement");
    group.sample_size(10);

    let (x, y) = create_classification_data(200, 5);
    for family in [ModelFamily::LogisticRegression, ModelFamily::RbfSvm] {
        let grid = family.default_grid();
        let engine = SearchEngine::new(family, SearchConfig::new().with_cv_folds(5).with_max_refinements(5));

        group.bench_function(family.as_str(), |b| {
            b.iter(|| black_box(engine.run(&grid, &x, &y).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_grid_search, bench_refinement);
criterion_main!(benches);
