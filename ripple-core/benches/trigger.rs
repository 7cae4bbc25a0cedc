//! Benchmarks for trigger fan-out and batched flushing.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ripple_core::{EffectOptions, Record, Runtime};

/// One write re-running `n` synchronous effects
fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");

    for n in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("sync", n), &n, |b, &n| {
            let rt = Runtime::new();
            let state = rt.reactive(Record::from_pairs([("count", 0)]));
            for _ in 0..n {
                rt.effect(move |rt: &Runtime| state.get(rt, "count").unwrap());
            }

            let mut i = 0;
            b.iter(|| {
                i += 1;
                state.set(&rt, "count", black_box(i)).unwrap();
            });
        });
    }

    group.finish();
}

/// Many writes collapsing into one flush of `n` queued effects
fn bench_batch_flush(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_flush");

    for n in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("queued", n), &n, |b, &n| {
            let rt = Runtime::new();
            let state = rt.reactive(Record::from_pairs([("count", 0)]));
            for _ in 0..n {
                rt.run(
                    move |rt: &Runtime| state.get(rt, "count").unwrap(),
                    EffectOptions::queued(),
                );
            }

            let mut i = 0;
            b.iter(|| {
                // Ten writes, one run per effect
                for _ in 0..10 {
                    i += 1;
                    state.set(&rt, "count", i).unwrap();
                }
                black_box(rt.flush().unwrap())
            });
        });
    }

    group.finish();
}

/// Cached reads of a computed value
fn bench_computed_read(c: &mut Criterion) {
    let rt = Runtime::new();
    let state = rt.reactive(Record::from_pairs([("a", 1), ("b", 2)]));
    let sum = rt.derive(move |rt: &Runtime| {
        let a = state.get(rt, "a").unwrap().as_number().unwrap_or_default();
        let b = state.get(rt, "b").unwrap().as_number().unwrap_or_default();
        a + b
    });

    c.bench_function("computed_clean_read", |b| {
        b.iter(|| black_box(sum.get(&rt).unwrap()));
    });
}

criterion_group!(benches, bench_fan_out, bench_batch_flush, bench_computed_read);
criterion_main!(benches);
