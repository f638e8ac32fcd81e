mod common;

use common::{setup, Frozen, Health, Position, Velocity};
use syren_store::prelude::*;


fn spawn(ecs: &mut ECSManager, world: World, position: bool, velocity: bool, frozen: bool) -> Entity {
    let entity = ecs.create_entity(world).unwrap();
    if position {
        ecs.set_component(entity, Position(1.0, 0.0));
    }
    if velocity {
        ecs.set_component(entity, Velocity(0.0, 1.0));
    }
    if frozen {
        ecs.set_component(entity, Frozen);
    }
    entity
}

#[test]
fn query_selects_archetypes_by_with_and_without() {
    let (mut ecs, world) = setup();
    spawn(&mut ecs, world, true, false, false);
    spawn(&mut ecs, world, true, true, false);
    spawn(&mut ecs, world, true, true, false);
    spawn(&mut ecs, world, true, true, true);
    spawn(&mut ecs, world, false, true, false);

    let moving = QueryBuilder::new().with::<Position>().with::<Velocity>().without::<Frozen>().build();
    assert_eq!(ecs.query_archetypes(world, &moving).len(), 1);
    assert_eq!(ecs.query_entity_count(world, &moving), 2);

    let positioned = QueryBuilder::new().with::<Position>().build();
    assert_eq!(ecs.query_archetypes(world, &positioned).len(), 3);
    assert_eq!(ecs.query_entity_count(world, &positioned), 4);

    let everything = QueryBuilder::new().build();
    assert_eq!(ecs.query_entity_count(world, &everything), 5);
    assert_eq!(ecs.query_archetypes(world, &everything).len(), ecs.world_archetype_count(world));
}

#[test]
fn query_matches_on_signature_contents() {
    let query = QueryBuilder::new().with::<Health>().without::<Frozen>().build();
    assert!(query.with_types().contains(syren_store::component_key_of::<Health>()));
    assert!(query.matches(&Signature::new().with::<Health>().with::<Position>()));
    assert!(!query.matches(&Signature::new().with::<Health>().with::<Frozen>()));
    assert!(!query.matches(&Signature::of::<Position>()));
}

#[test]
fn cached_match_refreshes_when_archetypes_change() {
    let (mut ecs, world) = setup();
    let query = QueryBuilder::new().with::<Health>().build();
    spawn(&mut ecs, world, true, false, false);
    assert!(ecs.query_archetypes(world, &query).is_empty());

    let entity = ecs.create_entity(world).unwrap();
    ecs.set_component(entity, Health(1));
    let matched = ecs.query_archetypes(world, &query);
    assert_eq!(matched, vec![ecs.entity_archetype(entity).unwrap()]);

    ecs.set_component(entity, Position(0.0, 0.0));
    let refreshed = ecs.query_archetypes(world, &query);
    assert_eq!(refreshed.len(), 2);
    assert!(refreshed.contains(&ecs.entity_archetype(entity).unwrap()));

    ecs.destroy_empty_archetypes(world);
    assert_eq!(ecs.query_archetypes(world, &query), vec![ecs.entity_archetype(entity).unwrap()]);
}

#[test]
fn one_query_serves_several_worlds() {
    let (mut ecs, world) = setup();
    let other = ecs.create_world("other");
    let query = QueryBuilder::new().with::<Position>().build();
    spawn(&mut ecs, world, true, false, false);
    spawn(&mut ecs, other, true, false, false);
    spawn(&mut ecs, other, true, true, false);

    assert_eq!(ecs.query_entity_count(world, &query), 1);
    assert_eq!(ecs.query_entity_count(other, &query), 2);
    assert_eq!(ecs.query_entity_count(world, &query), 1);

    ecs.destroy_world(other);
    assert!(ecs.query_archetypes(other, &query).is_empty());
}

#[test]
fn buffers_of_matched_archetypes_line_up_with_entities() {
    let (mut ecs, world) = setup();
    for value in 0..6 {
        let entity = spawn(&mut ecs, world, true, value % 2 == 0, false);
        ecs.try_get_component_mut::<Position>(entity).unwrap().0 = value as f32;
    }

    let query = QueryBuilder::new().with::<Position>().build();
    let mut total = 0.0;
    for archetype in ecs.query_archetypes(world, &query) {
        let entities = ecs.entity_buffer(archetype).unwrap();
        let positions = ecs.component_buffer::<Position>(archetype).unwrap();
        assert_eq!(entities.len(), positions.len());
        for (entity, position) in entities.iter().zip(positions) {
            assert_eq!(ecs.try_get_component::<Position>(*entity), Some(position));
            total += position.0;
        }
    }
    assert_eq!(total, 15.0);
}

#[test]
fn for_each_entity_visits_every_match_before_destroys_apply() {
    let (mut ecs, world) = setup();
    let entities: Vec<Entity> = (0..4).map(|_| spawn(&mut ecs, world, false, false, false)).collect();
    for &entity in &entities {
        ecs.set_component(entity, Health(1));
    }

    let query = QueryBuilder::new().with::<Health>().build();
    let mut visited = Vec::new();
    ecs.for_each_entity(world, &query, |ecs, entity| {
        visited.push(entity);
        if entity == entities[0] {
            for &other in &entities[1..] {
                ecs.destroy_entity(other);
            }
        }
    });

    assert_eq!(visited.len(), 4);
    assert_eq!(ecs.query_entity_count(world, &query), 1);
}
