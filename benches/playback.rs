use criterion::*;
use std::hint::black_box;

mod common;
use common::*;

use syren_store::prelude::*;

fn playback_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("playback");

    group.bench_function("deferred_create_100k", |b| {
        b.iter(|| {
            let (mut ecs, world) = make_world();
            ecs.with_deferral(world, |ecs| {
                for _ in 0..AGENTS_MED {
                    ecs.create_entity(world);
                }
            });
            black_box(ecs);
        });
    });

    group.bench_function("for_each_entity_reshape_10k", |b| {
        b.iter_batched(
            || {
                let (mut ecs, world) = make_world();
                populate(&mut ecs, world, AGENTS_SMALL);
                let query = QueryBuilder::new().with::<Wealth>().without::<Productivity>().build();
                (ecs, world, query)
            },
            |(mut ecs, world, query)| {
                ecs.for_each_entity(world, &query, |ecs, entity| {
                    ecs.set_component(entity, Productivity { rate: 1.0 });
                });
                black_box(ecs);
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, playback_benchmark);
criterion_main!(benches);
