//! Benchmarks for the superlinear parts of the analysis engines
//!
//! - Compatibility matrix rebuild: quadratic in distinct mods
//! - Cycle scan: linear in edges, exercised on long chains and dense graphs
//! - Bottleneck pairing: one lookup per (sample, mod)

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use modmine::engines::bottleneck::mod_impacts;
use modmine::engines::graph::{EdgeType, GraphEdge, detect_cycles};
use modmine::engines::{CancelSignal, CompatibilityMiningEngine};
use modmine::models::{CompatibilityData, PerformanceMetric};
use std::hint::black_box;

fn compatibility_log(mods: usize) -> Vec<CompatibilityData> {
    (0..mods)
        .flat_map(|a| {
            (a + 1..mods).step_by(3).map(move |b| {
                CompatibilityData::new(format!("Mod {}", a), format!("Mod {}", b), (a + b) % 4 != 0)
            })
        })
        .collect()
}

fn chain(len: u32) -> Vec<GraphEdge<u32>> {
    (0..len)
        .map(|i| GraphEdge {
            source: i,
            target: i + 1,
            edge_type: EdgeType::DependsOn,
            weight: 1.0,
        })
        .collect()
}

fn dense(nodes: u32) -> Vec<GraphEdge<u32>> {
    (0..nodes)
        .flat_map(|a| {
            (0..nodes)
                .filter(move |b| *b != a && (a * 7 + b) % 5 == 0)
                .map(move |b| GraphEdge {
                    source: a,
                    target: b,
                    edge_type: EdgeType::Requires,
                    weight: 1.0,
                })
        })
        .collect()
}

fn bench_matrix_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("compatibility_matrix");

    for mods in [10usize, 50, 100] {
        let log = compatibility_log(mods);
        group.throughput(Throughput::Elements(log.len() as u64));
        group.bench_with_input(BenchmarkId::new("build", mods), &log, |b, log| {
            let engine = CompatibilityMiningEngine::new();
            b.iter(|| engine.build(black_box(log.clone())));
        });
    }

    group.bench_function("update_existing_pair", |b| {
        let engine = CompatibilityMiningEngine::new();
        engine.build(compatibility_log(50));
        b.iter(|| engine.update(black_box(CompatibilityData::new("Mod 1", "Mod 4", true))));
    });

    group.finish();
}

fn bench_cycle_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("cycle_scan");

    for len in [1_000u32, 100_000] {
        let edges = chain(len);
        group.throughput(Throughput::Elements(edges.len() as u64));
        group.bench_with_input(BenchmarkId::new("chain", len), &edges, |b, edges| {
            b.iter(|| detect_cycles(black_box(edges)));
        });
    }

    let edges = dense(200);
    group.throughput(Throughput::Elements(edges.len() as u64));
    group.bench_function("dense_200", |b| {
        b.iter(|| detect_cycles(black_box(&edges)));
    });

    group.finish();
}

fn bench_bottleneck_pairing(c: &mut Criterion) {
    let mut group = c.benchmark_group("bottleneck_pairing");

    let mut metrics = vec![PerformanceMetric::new(["Base"], 60.0, 2000.0, 5.0, 0)];
    for i in 0..500u64 {
        metrics.push(PerformanceMetric::new(
            ["Base".to_string(), format!("Mod {}", i % 50)],
            60.0 - (i % 30) as f64,
            2000.0 + (i % 7) as f64 * 100.0,
            5.0,
            i,
        ));
    }
    group.throughput(Throughput::Elements(metrics.len() as u64));
    group.bench_function("mod_impacts_500", |b| {
        let cancel = CancelSignal::never();
        b.iter(|| mod_impacts(black_box(&metrics), &cancel));
    });

    group.finish();
}

criterion_group!(benches, bench_matrix_build, bench_cycle_scan, bench_bottleneck_pairing);
criterion_main!(benches);
