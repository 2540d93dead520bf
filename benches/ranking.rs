//! # Ranking Benchmarks
//!
//! Listing sorts at catalog sizes seen on directory pages, plus the popularity
//! store round trip that feeds them.
//!
//! Run with: `cargo bench --bench ranking`

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use wishrank::{
    calculate_popularity_boost, sort_by_popularity, sort_by_popularity_and_rating, Action,
    CatalogItem, MemoryStorage, PopularityScores, PopularityStore, RateLimitConfig, RateLimiter,
    SystemClock,
};

fn catalog(n: usize) -> (Vec<CatalogItem>, PopularityScores) {
    let items = (0..n)
        .map(|i| {
            CatalogItem::new(
                format!("studio-{}", i),
                format!("Studio {}", (i * 7919) % n),
                3.0 + ((i * 37) % 200) as f64 / 100.0,
            )
        })
        .collect();

    let scores = (0..n)
        .filter(|i| i % 3 == 0)
        .map(|i| (format!("studio-{}", i), ((i * 13) % 500) as u32))
        .collect();

    (items, scores)
}

/// Benchmark the combined rating plus popularity sort
fn bench_sort_by_popularity_and_rating(c: &mut Criterion) {
    let mut group = c.benchmark_group("sort_by_popularity_and_rating");

    for n in [10, 100, 1_000] {
        let (items, scores) = catalog(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| std::hint::black_box(sort_by_popularity_and_rating(&items, &scores)));
        });
    }

    group.finish();
}

/// Benchmark the popularity-first sort
fn bench_sort_by_popularity(c: &mut Criterion) {
    let mut group = c.benchmark_group("sort_by_popularity");

    for n in [10, 100, 1_000] {
        let (items, scores) = catalog(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| std::hint::black_box(sort_by_popularity(&items, &scores)));
        });
    }

    group.finish();
}

/// Benchmark the boost function alone
fn bench_boost(c: &mut Criterion) {
    c.bench_function("calculate_popularity_boost", |b| {
        let mut n = 0u32;
        b.iter(|| {
            n = (n + 1) % 10_000;
            std::hint::black_box(calculate_popularity_boost(n))
        });
    });
}

/// Benchmark sorting through the store, which reloads and validates the persisted map
fn bench_store_sort(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_sort");

    for n in [100, 1_000] {
        let (items, scores) = catalog(n);
        let storage = Arc::new(MemoryStorage::new());
        let limiter = Arc::new(RateLimiter::new(
            storage.clone(),
            Arc::new(SystemClock),
            RateLimitConfig::default().with_limit(Action::WishlistActions, u32::MAX),
        ));
        let store = PopularityStore::new(storage, limiter);
        store.save_scores(&scores);

        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| std::hint::black_box(store.sort_by_popularity_and_rating(&items)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_sort_by_popularity_and_rating,
    bench_sort_by_popularity,
    bench_boost,
    bench_store_sort
);

criterion_main!(benches);
