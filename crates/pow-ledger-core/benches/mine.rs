use criterion::{criterion_group, criterion_main, Criterion};
use pow_ledger_core::{Block, MiningStrategy};

fn bench_mine(c: &mut Criterion) {
    let txs: Vec<String> = (0..10).map(|i| format!("alice-{i} pays bob {i}")).collect();

    let mut group = c.benchmark_group("mine_difficulty_4");
    for (name, strategy) in [
        ("sequential", MiningStrategy::Sequential),
        ("parallel", MiningStrategy::Parallel),
    ] {
        group.bench_function(name, |b| {
            let mut timestamp = 1_600_000_000_000u64;
            b.iter(|| {
                timestamp += 1;
                Block::mined_at(1, timestamp, txs.clone(), [0u8; 32], 4, strategy)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_mine);
criterion_main!(benches);
