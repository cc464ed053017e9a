//! Benchmarks for the coalescing engine
//!
//! This benchmark measures:
//! - Fingerprint computation for short and long argument lists
//! - End-to-end enqueue/flush/dispatch throughput against the memory backend,
//!   over a spread of keys and over one hot key

use autopipeline::backend::MemoryBackend;
use autopipeline::batch::fingerprint;
use autopipeline::{Engine, OperationKind, PipelineConfig};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::time::Duration;

fn bench_fingerprint(c: &mut Criterion) {
    let mut group = c.benchmark_group("fingerprint");

    let short = vec!["user:42".to_string(), "name".to_string()];
    group.bench_function("hget_two_args", |b| {
        b.iter(|| fingerprint(black_box(OperationKind::HGet), black_box(&short)))
    });

    for n in [10usize, 100] {
        let keys: Vec<String> = (0..n).map(|i| format!("key:{i}")).collect();
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("mget_keys", n), &keys, |b, keys| {
            b.iter(|| fingerprint(black_box(OperationKind::MGet), black_box(keys)))
        });
    }

    group.finish();
}

fn bench_engine_round_trip(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap();
    let backend = Arc::new(MemoryBackend::new());
    for i in 0..16 {
        backend.set(format!("key:{i}"), format!("value-{i}"));
    }
    let engine = {
        let _guard = rt.enter();
        Engine::start(
            backend,
            PipelineConfig::default()
                .with_ttl(Duration::from_micros(100))
                .with_max_size(64),
        )
        .unwrap()
    };

    let mut group = c.benchmark_group("engine");
    group.throughput(Throughput::Elements(256));
    group.bench_function("enqueue_256_over_16_keys", |b| {
        b.to_async(&rt).iter(|| async {
            let handles: Vec<_> = (0..256)
                .map(|i| engine.enqueue(OperationKind::Get, vec![format!("key:{}", i % 16)]))
                .collect();
            for h in futures::future::join_all(handles).await {
                black_box(h.unwrap());
            }
        })
    });
    group.bench_function("enqueue_256_one_hot_key", |b| {
        b.to_async(&rt).iter(|| async {
            let handles: Vec<_> = (0..256)
                .map(|_| engine.enqueue(OperationKind::Get, vec!["key:0".to_string()]))
                .collect();
            for h in futures::future::join_all(handles).await {
                black_box(h.unwrap());
            }
        })
    });
    group.finish();

    rt.block_on(engine.shutdown()).unwrap();
}

criterion_group!(
    benches,
    bench_fingerprint,
    bench_engine_round_trip
);
criterion_main!(benches);
