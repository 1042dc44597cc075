mod common;

use std::hint::black_box;
use std::time::Duration;

use common::{push_child, unbounded, Node};
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use grammar_growth::prelude::{
    AddedNodes, Cost, Expansion, FnCost, Generator, Grammar, Particle, Schedule, SosmcConfig,
    Structure, ZeroCost,
};

fn generator() -> Generator<Node> {
    let mut g = Grammar::new();
    g.define("branch", |at, x: &mut Expansion<'_, Node>| {
        let id = push_child(at, x);
        x.add_detail("branch", id);
        x.add_detail("branch", id);
        x.add_detail("leaf", id);
    });
    g.maybe("branch", |at, x: &mut Expansion<'_, Node>| {
        push_child(at, x);
    });
    g.define("leaf", |at, x: &mut Expansion<'_, Node>| {
        x.push(Node {
            parent: Some(at),
            depth: 0,
        });
    });
    g.wrap_up("branch", |_, _: &mut Expansion<'_, Node>| {});
    g.post_skeleton("leaf");
    Generator::new(g, Node::ROOT)
}

/// Penalizes deep nodes; a stand-in for a reach or collision term.
fn depth_cost(particle: &Particle<Node>, added: AddedNodes<'_, Node>, _: bool) -> Cost {
    let extra: f64 = added.iter().map(|(_, n)| n.depth as f64 * 0.1).sum();
    Cost::from_real(particle.cost().real + extra)
}

fn run_once(config: SosmcConfig, seed: u64) -> usize {
    let task = generator()
        .generate_sosmc("branch", config, FnCost::new(depth_cost), seed)
        .ok();
    task.and_then(|t| t.run_to_completion().ok())
        .map_or(0, |(outcome, _)| outcome.structure.len())
}

fn population_benches(c: &mut Criterion) {
    let mut group = c.benchmark_group("sosmc/population");
    let generations = 16;

    for &n in &[8usize, 32, 128, 512] {
        group.throughput(common::elements_throughput(n * generations));

        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let config = unbounded(SosmcConfig::new(generations).with_sample_count(n as f64));
                black_box(run_once(config, 0xC0FFEE));
            });
        });
    }

    group.finish();
}

fn funnel_benches(c: &mut Criterion) {
    let mut group = c.benchmark_group("sosmc/funnel");
    let generations = 24;

    group.bench_function("constant_200", |b| {
        b.iter(|| {
            let config = unbounded(SosmcConfig::new(generations).with_sample_count(200.0));
            black_box(run_once(config, 7));
        });
    });

    group.bench_function("linear_200_to_20", |b| {
        b.iter(|| {
            let config = unbounded(
                SosmcConfig::new(generations)
                    .with_sample_count(Schedule::Linear {
                        start: 200.0,
                        end: 20.0,
                    })
                    .with_heuristic_scale(Schedule::Linear {
                        start: 1.0,
                        end: 0.0,
                    }),
            );
            black_box(run_once(config, 7));
        });
    });

    group.finish();
}

fn fork_benches(c: &mut Criterion) {
    let mut group = c.benchmark_group("sosmc/structure_fork");

    for &len in &[16usize, 256, 4096] {
        group.throughput(common::elements_throughput(len));

        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, &len| {
            b.iter_batched(
                || {
                    let mut s = Structure::new(0u32);
                    for i in 1..len as u32 {
                        s.push(i);
                    }
                    s
                },
                |mut s| {
                    let mut forks: Vec<Structure<u32>> = (0..64).map(|_| s.fork()).collect();
                    for f in &mut forks {
                        f.push(1);
                    }
                    black_box(forks.len());
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn burst_benches(c: &mut Criterion) {
    let mut group = c.benchmark_group("sosmc/bursts");

    for &budget_us in &[250u64, 2_000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(budget_us),
            &budget_us,
            |b, &budget_us| {
                b.iter(|| {
                    let config = SosmcConfig::new(12)
                        .with_sample_count(64.0)
                        .with_burst_budget(Duration::from_micros(budget_us));
                    let task = generator()
                        .generate_sosmc("branch", config, ZeroCost, 3)
                        .ok();
                    let bursts = task
                        .and_then(|t| t.run_to_completion().ok())
                        .map_or(0, |(_, stats)| stats.bursts);
                    black_box(bursts);
                });
            },
        );
    }

    group.finish();
}

criterion_group! {
    name = benches;
    config = common::default_criterion();
    targets = population_benches,
              funnel_benches,
              fork_benches,
              burst_benches
}
criterion_main!(benches);
