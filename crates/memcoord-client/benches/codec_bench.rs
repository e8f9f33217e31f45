// Benchmarks for value encoding and the cache write path
// Measures codec throughput per value kind and a store/retrieve round against MemoryStore

use std::collections::HashMap;
use std::hint::black_box;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use memcoord_client::codec::encode_value;
use memcoord_client::{Json, KvCache, MemoryConnector, MemoryStore, Openable, StoreConfig};

fn bench_encode_text(c: &mut Criterion) {
    let text = "session-token-0123456789abcdef";

    c.bench_function("encode_text", |b| {
        b.iter(|| black_box(encode_value(black_box(text))))
    });
}

fn bench_encode_timestamp(c: &mut Criterion) {
    let when = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();

    c.bench_function("encode_timestamp", |b| {
        b.iter(|| black_box(encode_value(black_box(&when))))
    });
}

fn bench_encode_json_map(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_json_map");

    for size in [4usize, 64, 1024] {
        let map: HashMap<String, u64> = (0..size as u64).map(|i| (format!("field{i}"), i)).collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), &map, |b, map| {
            b.iter(|| black_box(encode_value(&Json(map))))
        });
    }

    group.finish();
}

fn bench_cache_round_trip(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();

    let store = Arc::new(MemoryStore::new());
    let config = StoreConfig::from_addrs("localhost").unwrap();
    let cache = KvCache::new(&config, Arc::new(MemoryConnector::new(store)));
    rt.block_on(cache.open(None)).unwrap();

    c.bench_function("cache_store_retrieve", |b| {
        b.iter(|| {
            rt.block_on(async {
                cache.store(None, "bench:key", "value", 60_000).await.unwrap();
                black_box(cache.retrieve(None, "bench:key").await.unwrap())
            })
        })
    });
}

criterion_group!(
    benches,
    bench_encode_text,
    bench_encode_timestamp,
    bench_encode_json_map,
    bench_cache_round_trip,
);

criterion_main!(benches);
