//! Benchmarks for the recipe core: graph validation, tree rendering, and
//! requisite evaluation.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use cultivar::core::graph::Graph;
use cultivar::core::ready;
use cultivar::core::tree;
use cultivar::core::types::{RequisiteCondition, Step, StepCompletion};
use std::collections::HashMap;

/// A chain recipe: step i requires step i-1.
fn chain(n: usize) -> Vec<Step> {
    (0..n)
        .map(|i| {
            let step = Step::new(format!("step-{}", i), "cmd", "run");
            if i == 0 {
                step
            } else {
                let prev = format!("step-{}", i - 1);
                step.with_requisite(RequisiteCondition::Require, &[prev.as_str()])
            }
        })
        .collect()
}

/// A fan recipe: one root, n-1 leaves requiring it.
fn fan(n: usize) -> Vec<Step> {
    let mut steps = vec![Step::new("root", "cmd", "run")];
    for i in 1..n {
        steps.push(
            Step::new(format!("leaf-{}", i), "cmd", "run")
                .with_requisite(RequisiteCondition::Require, &["root"]),
        );
    }
    steps
}

fn bench_validate(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_validate");
    for size in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("chain", size), &size, |b, &size| {
            b.iter_batched(
                || chain(size),
                |steps| black_box(Graph::validate(steps).unwrap()),
                criterion::BatchSize::SmallInput,
            );
        });
        group.bench_with_input(BenchmarkId::new("fan", size), &size, |b, &size| {
            b.iter_batched(
                || fan(size),
                |steps| black_box(Graph::validate(steps).unwrap()),
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_tree_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_render");
    for size in [10, 100, 1000] {
        let graph = Graph::validate(chain(size)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &graph, |b, graph| {
            b.iter(|| black_box(tree::render(black_box(graph))));
        });
    }
    group.finish();
}

fn bench_is_ready(c: &mut Criterion) {
    let mut group = c.benchmark_group("is_ready");
    for size in [10, 100, 1000] {
        // Last step of a fan, with every other step completed
        let steps = fan(size);
        let completions: HashMap<String, StepCompletion> = steps
            .iter()
            .map(|s| {
                let mut done = StepCompletion::not_started(&s.id);
                done.status = cultivar::core::types::CompletionStatus::Completed;
                (s.id.clone(), done)
            })
            .collect();
        let last = steps.last().unwrap().clone();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(ready::is_ready(black_box(&last), black_box(&completions))));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_validate, bench_tree_render, bench_is_ready);
criterion_main!(benches);
