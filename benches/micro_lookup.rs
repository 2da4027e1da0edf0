//! Micro benchmarks for hash table lookups on serialized buffers.
#![forbid(unsafe_code)]
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use flatval::{Reader, Value, Writer, WriterOptions};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const KEYS: u32 = 16_384;
const SAMPLES: usize = 4_096;

fn key(k: usize) -> Value {
    Value::String(format!("key-{k}"))
}

fn build(load: f64) -> Reader {
    let map = Value::Map(
        (0..KEYS)
            .map(|k| (key(k as usize), Value::U32(k)))
            .collect(),
    );
    let buf = Writer::with_options(WriterOptions::default().max_load_factor(load))
        .serialize(&map)
        .expect("serialize");
    Reader::from_bytes(buf).expect("open")
}

fn micro_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("micro/lookup");
    group.sample_size(30);

    // half of the probes miss
    let mut probes: Vec<Value> = (0..KEYS as usize * 2).map(key).collect();
    probes.shuffle(&mut ChaCha8Rng::seed_from_u64(0xBEEF_F00D));
    probes.truncate(SAMPLES);

    for load in [0.5, 0.75, 1.0] {
        let reader = build(load);
        let root = reader.root().expect("root");
        group.throughput(Throughput::Elements(SAMPLES as u64));
        group.bench_function(BenchmarkId::new("map_get", load), |b| {
            b.iter(|| {
                let mut hits = 0usize;
                for probe in &probes {
                    if reader.map_get(root, probe).expect("lookup").is_some() {
                        hits += 1;
                    }
                }
                black_box(hits)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, micro_lookup);
criterion_main!(benches);
