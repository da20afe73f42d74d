//! Dispatch and resolve benchmarks for delve_core.
//!
//! Run with: `cargo bench -p delve_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use delve_core::prelude::*;
use delve_test_utils::fixtures;

fn crowded_room(side: i32) -> Configurator {
    let mut configurator = fixtures::room(side, side);
    let actors = fixtures::crowd(&mut configurator, side, side, 2);
    for (index, actor) in actors.iter().enumerate() {
        let aiu = [0, 1, 2, 7][index % 4];
        if aiu != 0 {
            let _ = configurator.assign_aiu(*actor, aiu);
        }
    }
    configurator.bind_solver(Box::new(GridSolver::default()));
    configurator
}

/// Build and resolve one tick in rooms of increasing size.
pub fn dispatch_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");
    for side in [8, 16, 32] {
        group.bench_with_input(BenchmarkId::new("build_and_resolve", side), &side, |b, &side| {
            let mut configurator = crowded_room(side);
            let mut tick = 0;
            b.iter(|| {
                let queue = configurator.build_dispatch_queue(tick);
                let resolved = configurator.resolve(black_box(queue));
                tick += 1;
                black_box(resolved.accepted())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, dispatch_benchmark);
criterion_main!(benches);
