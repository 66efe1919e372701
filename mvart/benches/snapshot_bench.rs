/// Compares the multi-version tree against the persistent `im::OrdMap` for MVCC-style workloads:
/// point lookups, taking snapshots and writing while snapshots are held.
use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rand::{Rng, rng};

use im::OrdMap as ImOrdMap;
use mvart::RootNode;

const TREE_SIZES: [u64; 4] = [1 << 8, 1 << 10, 1 << 12, 1 << 14];
const SNAPSHOT_COUNTS: [usize; 3] = [1, 5, 10];

fn populate(size: u64) -> (RootNode, ImOrdMap<u64, u64>) {
    let mut tree: RootNode = RootNode::new();
    let mut ordmap = ImOrdMap::new();
    for i in 0..size {
        tree.insert(&i.to_be_bytes(), &i.to_le_bytes()).unwrap();
        ordmap = ordmap.update(i, i);
    }
    (tree, ordmap)
}

pub fn lookup_comparison(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup_comparison");
    group.throughput(Throughput::Elements(1));

    for size in TREE_SIZES {
        let (tree, ordmap) = populate(size);

        group.bench_with_input(BenchmarkId::new("mvart", size), &size, |b, &size| {
            let mut rng = rng();
            b.iter(|| {
                let key = rng.random_range(0..size);
                black_box(tree.get(&key.to_be_bytes()));
            })
        });

        group.bench_with_input(BenchmarkId::new("im_ordmap", size), &size, |b, &size| {
            let mut rng = rng();
            b.iter(|| {
                let key = rng.random_range(0..size);
                black_box(ordmap.get(&key));
            })
        });
    }

    group.finish();
}

pub fn snapshot_creation(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot_creation");
    group.throughput(Throughput::Elements(1));

    for size in TREE_SIZES {
        let (mut tree, ordmap) = populate(size);

        group.bench_with_input(BenchmarkId::new("mvart", size), &size, |b, _| {
            b.iter(|| black_box(tree.snapshot()))
        });

        group.bench_with_input(BenchmarkId::new("im_ordmap", size), &size, |b, _| {
            b.iter(|| black_box(ordmap.clone()))
        });
    }

    group.finish();
}

/// Every write lands on a tree that shares its nodes with live snapshots.
pub fn write_after_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_after_snapshot");
    group.throughput(Throughput::Elements(100));
    let size = 1 << 12;

    for snapshots in SNAPSHOT_COUNTS {
        group.bench_with_input(
            BenchmarkId::new("mvart", snapshots),
            &snapshots,
            |b, &snapshots| {
                let (mut tree, _) = populate(size);
                let mut rng = rng();
                b.iter(|| {
                    let held: Vec<_> = (0..snapshots).map(|_| tree.snapshot()).collect();
                    for _ in 0..100 {
                        let key = rng.random_range(0..size);
                        tree.insert(&key.to_be_bytes(), &key.to_be_bytes()).unwrap();
                    }
                    black_box(held);
                })
            },
        );

        group.bench_with_input(
            BenchmarkId::new("im_ordmap", snapshots),
            &snapshots,
            |b, &snapshots| {
                let (_, mut ordmap) = populate(size);
                let mut rng = rng();
                b.iter(|| {
                    let held: Vec<_> = (0..snapshots).map(|_| ordmap.clone()).collect();
                    for _ in 0..100 {
                        let key = rng.random_range(0..size);
                        ordmap.insert(key, key.rotate_left(8));
                    }
                    black_box(held);
                })
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    lookup_comparison,
    snapshot_creation,
    write_after_snapshot
);
criterion_main!(benches);
