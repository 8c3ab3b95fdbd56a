//! # Engine Benchmarks
//!
//! Insert and point-lookup throughput on in-memory storage, so the numbers
//! measure the engine (page codec, spline, probe) rather than the disk.
//!
//! ```bash
//! cargo bench --bench engine
//! cargo bench --bench engine -- insert
//! cargo bench --bench engine -- lookup
//! ```

use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use tideline::Engine;

const DATA_SIZE: usize = 8;
const N: u64 = 10_000;

fn payload(i: u64) -> [u8; DATA_SIZE] {
    i.to_le_bytes()
}

fn fresh_engine() -> Engine {
    Engine::builder()
        .key_size(4)
        .data_size(DATA_SIZE)
        .page_size(512)
        .data_pages(4096)
        .erase_size_in_pages(8)
        .open()
        .expect("in-memory engine opens")
}

fn filled_engine() -> Engine {
    let mut engine = fresh_engine();
    for i in 0..N {
        engine.put(i, &payload(i)).unwrap();
    }
    engine.flush().unwrap();
    engine
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");
    group.throughput(Throughput::Elements(N));
    group.bench_function("sequential_10k", |b| {
        b.iter_batched(
            fresh_engine,
            |mut engine| {
                for i in 0..N {
                    engine.put(i, &payload(i)).unwrap();
                }
                engine
            },
            BatchSize::LargeInput,
        )
    });
    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup");
    let mut engine = filled_engine();
    let mut out = [0u8; DATA_SIZE];

    group.throughput(Throughput::Elements(1));
    group.bench_function("point_get_scattered", |b| {
        let mut i = 0u64;
        b.iter(|| {
            // Large prime stride scatters probes across the whole region.
            let key = (i * 7919) % N;
            i += 1;
            engine.get(key, &mut out).unwrap();
        })
    });
    group.finish();
}

criterion_group!(benches, bench_insert, bench_lookup);
criterion_main!(benches);
