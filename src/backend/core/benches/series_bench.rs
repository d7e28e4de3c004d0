//! Benchmarks for series extraction and chart downsampling.
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use quantdash_core::series::{downsample, extract, to_chart, DEFAULT_CHART_CAP};
use serde_json::{json, Value};

fn walk(len: usize) -> Vec<f64> {
    (0..len).map(|i| 100.0 + (i as f64 * 0.37).sin()).collect()
}

fn bench_extract_shapes(c: &mut Criterion) {
    let mut group = c.benchmark_group("series_extract");
    let shapes: Vec<(&str, Value)> = vec![
        ("flat", json!(walk(1_000))),
        ("keyed", json!({"model": "arima", "forecast": walk(1_000)})),
        ("matrix", json!({"paths": [walk(500), walk(500), walk(500)]})),
        (
            "nested",
            json!({"meta": {"run": 7}, "result": {"summary": {"trajectory": walk(1_000)}}}),
        ),
        ("string_numbers", json!(walk(1_000).iter().map(|v| v.to_string()).collect::<Vec<_>>())),
        ("no_series", json!({"note": "x", "items": [{"a": 1}, {"b": 2}]})),
    ];
    for (label, payload) in &shapes {
        group.bench_with_input(BenchmarkId::from_parameter(label), payload, |b, p| {
            b.iter(|| black_box(extract(p)));
        });
    }
    group.finish();
}

fn bench_downsample(c: &mut Criterion) {
    let mut group = c.benchmark_group("series_downsample");
    for len in [100, 1_000, 10_000, 100_000] {
        let series = walk(len);
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), &series, |b, s| {
            b.iter(|| black_box(downsample(s, DEFAULT_CHART_CAP)));
        });
    }
    group.finish();
}

fn bench_to_chart_montecarlo(c: &mut Criterion) {
    let paths: Vec<Vec<f64>> = (0..200).map(|_| walk(252)).collect();
    let payload = json!({"data": {"paths": paths, "horizon": 252}});
    c.bench_function("series_to_chart_montecarlo", |b| {
        b.iter(|| black_box(to_chart(&payload, DEFAULT_CHART_CAP)));
    });
}

criterion_group!(benches, bench_extract_shapes, bench_downsample, bench_to_chart_montecarlo);
criterion_main!(benches);
