// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{
    BatchSize, BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main,
};
use understory_lazy_tree::{
    Item, PrefetchPlanner, SelectionChain, SelectionCodec, SelectionEngine, TreeStore,
};

/// Builds a complete tree with `fanout` children per level, numbering keys in
/// pre-order. Levels at `depth` are left unknown.
fn build(next: &mut u32, depth: u32, fanout: u32) -> Vec<Item<u32>> {
    (0..fanout)
        .map(|_| {
            let key = *next;
            *next += 1;
            if depth == 0 {
                Item::unknown(key)
            } else {
                Item::branch(key, build(next, depth - 1, fanout))
            }
        })
        .collect()
}

fn tree(depth: u32, fanout: u32) -> (Vec<Item<u32>>, u32) {
    let mut next = 0;
    let items = build(&mut next, depth, fanout);
    (items, next)
}

fn store(depth: u32, fanout: u32) -> TreeStore<u32> {
    let (items, _) = tree(depth, fanout);
    let mut store = TreeStore::new();
    let _ = store.materialize(None, items);
    store
}

fn bench_materialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("lazy_tree/materialize");

    for (depth, fanout) in [(3_u32, 8_u32), (4, 8), (2, 64)] {
        let (items, count) = tree(depth, fanout);
        group.throughput(Throughput::Elements(u64::from(count)));
        group.bench_with_input(
            BenchmarkId::new("nested", format!("d{depth}_f{fanout}")),
            &items,
            |b, items| {
                b.iter_batched(
                    || items.clone(),
                    |items| {
                        let mut store = TreeStore::new();
                        let _ = store.materialize(None, items);
                        black_box(store);
                    },
                    BatchSize::LargeInput,
                );
            },
        );
    }

    group.finish();
}

fn bench_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("lazy_tree/plan");

    // Every target hangs below a distinct unresolved leaf, three links deep.
    let store = store(3, 8);
    for len in [64_usize, 512, 4_096] {
        let targets: Vec<SelectionChain<u32>> = store
            .preorder()
            .into_iter()
            .filter(|key| !store.is_resolved(key))
            .cycle()
            .take(len)
            .enumerate()
            .map(|(i, parent)| {
                let mut parents = store.ancestor_chain(&parent).unwrap_or_default();
                parents.push(parent);
                parents.push(1_000_000 + i as u32);
                SelectionChain::new(2_000_000 + i as u32, parents)
            })
            .collect();
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::new("full_suffix", len), &targets, |b, targets| {
            let planner = PrefetchPlanner::new();
            b.iter(|| black_box(planner.plan(&store, targets)));
        });
    }

    group.finish();
}

fn bench_toggle(c: &mut Criterion) {
    let mut group = c.benchmark_group("lazy_tree/toggle");
    let engine = SelectionEngine::new();

    // Checking a root cascades through its whole resolved subtree.
    for (depth, fanout) in [(3_u32, 8_u32), (4, 8)] {
        let base = store(depth, fanout);
        group.bench_function(BenchmarkId::new("check_root", format!("d{depth}_f{fanout}")), |b| {
            b.iter_batched(
                || base.clone(),
                |mut store| {
                    black_box(engine.toggle(&mut store, &0, true).ok());
                },
                BatchSize::LargeInput,
            );
        });
    }

    // Unchecking a deep leaf walks the whole ancestor chain.
    let mut checked = store(4, 8);
    engine.select_all(&mut checked);
    let deepest = checked.preorder().last().copied().unwrap_or_default();
    group.bench_function("uncheck_leaf_d4_f8", |b| {
        b.iter_batched(
            || checked.clone(),
            |mut store| {
                black_box(engine.toggle(&mut store, &deepest, false).ok());
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

fn bench_extract(c: &mut Criterion) {
    let mut group = c.benchmark_group("lazy_tree/extract");
    let codec = SelectionCodec::default();

    for (depth, fanout) in [(3_u32, 8_u32), (4, 8)] {
        let mut store = store(depth, fanout);
        SelectionEngine::new().select_all(&mut store);
        group.throughput(Throughput::Elements(store.len() as u64));
        group.bench_function(BenchmarkId::new("all_checked", format!("d{depth}_f{fanout}")), |b| {
            b.iter(|| black_box(codec.extract(&store, &[])));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_materialize, bench_plan, bench_toggle, bench_extract);
criterion_main!(benches);
