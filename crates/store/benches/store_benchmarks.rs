//! Micro-benchmarks for `MemoryStore`'s single-mutex design.
//!
//! The spec's Store contract never promises sharding or per-id locking
//! (§9 "Deliberate simplifications"); these benchmarks exist to catch a
//! regression that would change that trade-off unintentionally, not to
//! chase a throughput target.

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::runtime::Runtime;
use vitals_core::Store;
use vitals_store::MemoryStore;

fn runtime() -> Runtime {
    Runtime::new().unwrap()
}

fn bench_set_gauge(c: &mut Criterion) {
    let rt = runtime();
    let store = MemoryStore::new();
    let counter = AtomicU64::new(0);

    let mut group = c.benchmark_group("memory_store");
    group.throughput(Throughput::Elements(1));
    group.bench_function("set_gauge", |b| {
        b.iter(|| {
            let i = counter.fetch_add(1, Ordering::Relaxed);
            rt.block_on(store.set_gauge(&format!("g{i}"), i as f64)).unwrap();
        })
    });
    group.finish();
}

fn bench_set_counter_same_key(c: &mut Criterion) {
    let rt = runtime();
    let store = MemoryStore::new();

    let mut group = c.benchmark_group("memory_store");
    group.throughput(Throughput::Elements(1));
    group.bench_function("set_counter_contended_key", |b| {
        b.iter(|| rt.block_on(store.set_counter("PollCount", 1)).unwrap());
    });
    group.finish();
}

fn bench_get_all(c: &mut Criterion) {
    let rt = runtime();
    let store = MemoryStore::new();
    rt.block_on(async {
        for i in 0..1000 {
            store.set_gauge(&format!("g{i}"), i as f64).await.unwrap();
            store.set_counter(&format!("c{i}"), i as i64).await.unwrap();
        }
    });

    let mut group = c.benchmark_group("memory_store");
    group.throughput(Throughput::Elements(1));
    group.bench_function("get_all_2000_entries", |b| {
        b.iter(|| rt.block_on(store.get_all()).unwrap());
    });
    group.finish();
}

criterion_group!(benches, bench_set_gauge, bench_set_counter_same_key, bench_get_all);
criterion_main!(benches);
