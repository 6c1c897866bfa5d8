//! Benchmarks for potential operations
//!
//! - Combination (product of tables with partially shared scopes)
//! - Projection (sum, max and log-sum-exp)
//! - Greedy combination of many tables

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use junction_infer::{CombineOp, Potential, ProjectOp};
use std::hint::black_box;

/// Table over `vars`, each with `card` states.
fn create_potential(vars: Vec<usize>, card: usize) -> Potential {
    let size = card.pow(vars.len() as u32);
    let values: Vec<f64> = (0..size).map(|i| (i as f64 + 1.0) / size as f64).collect();
    let dims = vec![card; vars.len()];
    Potential::from_vec(vars, &dims, values).unwrap()
}

fn bench_combine(c: &mut Criterion) {
    let mut group = c.benchmark_group("combine");

    for card in [2usize, 4, 8] {
        let p = create_potential(vec![0, 1, 2], card);
        let q = create_potential(vec![2, 3, 4], card);
        group.throughput(Throughput::Elements(card.pow(5) as u64));
        group.bench_with_input(BenchmarkId::new("product_overlap_1", card), &card, |b, _| {
            b.iter(|| black_box(p.combine(&q, CombineOp::Product).unwrap()));
        });
    }

    let p = create_potential(vec![0, 1, 2, 3], 3);
    let q = create_potential(vec![3, 1], 3);
    group.bench_function("log_sum_3x4_by_3x2", |b| {
        let (lp, lq) = (p.to_log(), q.to_log());
        b.iter(|| black_box(lp.combine(&lq, CombineOp::Sum).unwrap()));
    });

    group.finish();
}

fn bench_project(c: &mut Criterion) {
    let mut group = c.benchmark_group("project");

    let p = create_potential(vec![0, 1, 2, 3, 4], 4);
    for op in [ProjectOp::Sum, ProjectOp::Max, ProjectOp::LogSumExp] {
        group.bench_with_input(
            BenchmarkId::new("remove_two_of_five", format!("{:?}", op)),
            &op,
            |b, &op| {
                b.iter(|| black_box(p.project(&[1, 3], op).unwrap()));
            },
        );
    }

    group.bench_function("onto_single", |b| {
        b.iter(|| black_box(p.project_onto(&[2], ProjectOp::Sum).unwrap()));
    });

    group.finish();
}

fn bench_combine_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("combine_all");

    for n in [4usize, 8, 12] {
        // chain of pairwise tables x0-x1, x1-x2, ...
        let tables: Vec<Potential> = (0..n).map(|i| create_potential(vec![i, i + 1], 3)).collect();
        group.bench_with_input(BenchmarkId::new("chain", n), &n, |b, _| {
            let refs: Vec<&Potential> = tables.iter().collect();
            b.iter(|| {
                black_box(
                    Potential::combine_all(&refs, CombineOp::Product)
                        .unwrap()
                        .project(&(1..n).collect::<Vec<_>>(), ProjectOp::Sum)
                        .unwrap(),
                )
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_combine, bench_project, bench_combine_all);
criterion_main!(benches);
