//! # Dividend Round Benchmarks
//!
//! | Phase | Target |
//! |-------|--------|
//! | Full round computation, 10k accounts | < 1s |
//! | Result-map commit, 10k entries | < 500ms |
//! | Ordered walk of a committed map | O(n) |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use qc_18_dividend_distribution::{
    keccak256, AccountEntry, DividendConfig, DividendEngine, InMemoryResultMapStore,
    LedgerSnapshot, ResultMap, RoundPools,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;

fn account(n: u32) -> [u8; 20] {
    let mut id = [0u8; 20];
    id[16..].copy_from_slice(&n.to_be_bytes());
    id
}

/// Random sponsor forest: every account after the first few picks an
/// earlier account as its sponsor.
fn snapshot(size: u32) -> LedgerSnapshot {
    let mut rng = StdRng::seed_from_u64(size as u64);
    let entries = (0..size)
        .map(|i| {
            let entry = AccountEntry::new(account(i), rng.gen_range(0..5_000_000_000));
            if i > 8 && rng.gen_bool(0.9) {
                entry.with_parent(account(rng.gen_range(0..i)))
            } else {
                entry
            }
        })
        .collect();
    LedgerSnapshot::new(1, entries)
}

fn bench_round_computation(c: &mut Criterion) {
    let mut group = c.benchmark_group("qc-18-round-computation");
    group.measurement_time(Duration::from_secs(10));
    let engine = DividendEngine::new(DividendConfig::default()).expect("default config");

    for size in [1_000u32, 10_000] {
        let snapshot = snapshot(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("compute_round", size), &snapshot, |b, s| {
            b.iter(|| {
                let round = engine
                    .compute_round(
                        s,
                        RoundPools::vbc(1_000_000_000_000),
                        Arc::new(InMemoryResultMapStore::new()),
                    )
                    .expect("round");
                black_box(round.result_hash())
            })
        });
    }
    group.finish();
}

fn bench_result_map(c: &mut Criterion) {
    let mut group = c.benchmark_group("qc-18-result-map");

    for size in [1_000u32, 10_000] {
        let entries: Vec<_> = (0..size)
            .map(|i| (keccak256(&i.to_be_bytes()), i.to_be_bytes().to_vec()))
            .collect();
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("commit", size), &entries, |b, entries| {
            b.iter(|| {
                let mut map = ResultMap::new(InMemoryResultMapStore::new());
                for (key, value) in entries {
                    map.insert(*key, value.clone()).expect("insert");
                }
                black_box(map.commit().expect("commit"))
            })
        });

        let mut committed = ResultMap::new(InMemoryResultMapStore::new());
        for (key, value) in &entries {
            committed.insert(*key, value.clone()).expect("insert");
        }
        committed.commit().expect("commit");
        group.bench_function(BenchmarkId::new("walk", size), |b| {
            b.iter(|| {
                let mut seen = 0usize;
                committed
                    .walk_after(None, |_, _| {
                        seen += 1;
                        Ok(true)
                    })
                    .expect("walk");
                black_box(seen)
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_round_computation, bench_result_map);
criterion_main!(benches);
