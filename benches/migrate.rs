use criterion::*;
use std::hint::black_box;

mod common;
use common::*;

fn migrate_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("migrate");

    group.bench_function("add_remove_productivity_10k", |b| {
        b.iter_batched(
            || {
                let (mut ecs, world) = make_world();
                let entities = populate(&mut ecs, world, AGENTS_SMALL);
                (ecs, entities)
            },
            |(mut ecs, entities)| {
                for &entity in &entities {
                    ecs.set_component(entity, Productivity { rate: 0.5 });
                }
                for &entity in &entities {
                    ecs.remove_component::<Productivity>(entity);
                }
                black_box(ecs);
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("overwrite_in_place_10k", |b| {
        let (mut ecs, world) = make_world();
        let entities = populate(&mut ecs, world, AGENTS_SMALL);
        b.iter(|| {
            for &entity in &entities {
                ecs.set_component(entity, Wealth { value: 2.0 });
            }
        });
        black_box(ecs);
    });

    group.bench_function("transfer_between_worlds_10k", |b| {
        b.iter_batched(
            || {
                let (mut ecs, world) = make_world();
                let target = ecs.create_world("target");
                let entities = populate(&mut ecs, world, AGENTS_SMALL);
                (ecs, target, entities)
            },
            |(mut ecs, target, entities)| {
                for entity in entities {
                    ecs.transfer_entity(entity, target);
                }
                black_box(ecs);
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, migrate_benchmark);
criterion_main!(benches);
