//! Benchmarks for metric tensor operations.
//!
//! The adapter calls these per vertex per iteration, so the interesting
//! numbers are the fixed-size eigendecomposition and the full constrain
//! pipeline at d = 2 and d = 3.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use rand::prelude::*;
use remesh_core::MetricTensor;

/// Random symmetric positive-definite matrix A^T A + 0.1 I, row-major.
fn random_spd(dim: usize, rng: &mut StdRng) -> Vec<f64> {
    let entries: Vec<f64> = (0..dim * dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
    let mut out = vec![0.0; dim * dim];
    for i in 0..dim {
        for j in 0..dim {
            let mut sum = if i == j { 0.1 } else { 0.0 };
            for k in 0..dim {
                sum += entries[k * dim + i] * entries[k * dim + j];
            }
            out[i * dim + j] = sum;
        }
    }
    out
}

fn bench_eigen_decomp(c: &mut Criterion) {
    let mut group = c.benchmark_group("eigen_decomp");
    for dim in [2usize, 3] {
        let mut rng = StdRng::seed_from_u64(42);
        let metric = MetricTensor::new(dim, &random_spd(dim, &mut rng)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(dim), &dim, |bench, _| {
            bench.iter(|| black_box(&metric).eigen_decomp())
        });
    }
    group.finish();
}

fn bench_enforce(c: &mut Criterion) {
    let mut group = c.benchmark_group("enforce_positive_definiteness");
    for dim in [2usize, 3] {
        let mut rng = StdRng::seed_from_u64(42);
        let raw = random_spd(dim, &mut rng);
        group.bench_with_input(BenchmarkId::from_parameter(dim), &dim, |bench, _| {
            bench.iter_batched(
                || raw.clone(),
                |mut components| {
                    MetricTensor::enforce_positive_definiteness(dim, &mut components).unwrap()
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_constrain(c: &mut Criterion) {
    let mut group = c.benchmark_group("constrain");
    for dim in [2usize, 3] {
        let mut rng = StdRng::seed_from_u64(42);
        let a = MetricTensor::new(dim, &random_spd(dim, &mut rng)).unwrap();
        let b = MetricTensor::new(dim, &random_spd(dim, &mut rng)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(dim), &dim, |bench, _| {
            bench.iter_batched(
                || a.clone(),
                |mut a| a.constrain(black_box(&b), true).unwrap(),
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_eigen_decomp, bench_enforce, bench_constrain);
criterion_main!(benches);
