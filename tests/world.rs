mod common;

use common::{init_logging, setup, Health, Position, Velocity};
use syren_store::prelude::*;
use syren_store::{registered_key_of, type_key_of, ECSError};


#[derive(Debug, Default, PartialEq)]
struct Clock {
    tick: u64,
}

#[derive(Debug, PartialEq)]
struct Seed(u64);

#[test]
fn worlds_are_created_found_and_renamed() {
    init_logging();
    let mut ecs = ECSManager::new();
    let a = ecs.create_world("alpha");
    let b = ecs.create_world("beta");

    assert_ne!(a, b);
    assert_eq!(ecs.world_count(), 2);
    assert_eq!(ecs.worlds(), vec![a, b]);
    assert_eq!(ecs.find_world("beta"), Some(b));
    assert_eq!(ecs.find_world("gamma"), None);
    assert_eq!(ecs.get_or_create_world("alpha"), a);

    let gamma = ecs.get_or_create_world("gamma");
    assert_eq!(ecs.world_count(), 3);
    assert_eq!(ecs.world_name(gamma), Some("gamma"));

    assert!(ecs.set_world_name(a, "renamed"));
    assert_eq!(ecs.world_name(a), Some("renamed"));
    assert_eq!(ecs.find_world("alpha"), None);
}

#[test]
fn default_world_handle_is_invalid() {
    let (mut ecs, _) = setup();
    let world = World::default();
    assert!(!ecs.is_world_valid(world));
    assert_eq!(ecs.create_entity(world), None);
    assert!(!ecs.set_deferral(world, true));
    assert!(!ecs.destroy_world(world));
    assert_eq!(ecs.world_name(world), None);
}

#[test]
fn destroyed_world_slot_is_reused_with_new_version() {
    let (mut ecs, world) = setup();
    assert!(ecs.destroy_world(world));
    assert_eq!(ecs.world_count(), 0);

    let next = ecs.create_world("next");
    assert_eq!(next.index(), world.index());
    assert_ne!(next, world);
    assert!(!ecs.is_world_valid(world));
    assert!(ecs.is_world_valid(next));
    assert!(!ecs.set_world_name(world, "stale"));
}

#[test]
fn many_worlds_grow_the_world_table() {
    init_logging();
    let mut ecs = ECSManager::new();
    let worlds: Vec<World> = (0..20).map(|i| ecs.create_world(format!("w{i}"))).collect();
    assert_eq!(ecs.world_count(), 20);
    for (i, &world) in worlds.iter().enumerate() {
        assert_eq!(ecs.world_name(world), Some(format!("w{i}").as_str()));
    }
}

#[test]
fn world_data_holds_one_singleton_per_type() {
    let (mut ecs, world) = setup();

    assert_eq!(
        ecs.world_data::<Clock>(world),
        Err(ECSError::MissingWorldData { world, data: std::any::type_name::<Clock>() })
    );

    assert!(ecs.set_world_data(world, Clock { tick: 1 }));
    assert!(ecs.set_world_data(world, Seed(99)));
    ecs.world_data_mut::<Clock>(world).unwrap().tick += 4;
    assert_eq!(ecs.world_data::<Clock>(world), Ok(&Clock { tick: 5 }));

    assert!(ecs.set_world_data(world, Clock { tick: 0 }));
    assert_eq!(ecs.world_data::<Clock>(world), Ok(&Clock::default()));

    let mut types = ecs.world_data_types(world);
    types.sort_unstable();
    let mut expected = vec![std::any::type_name::<Clock>(), std::any::type_name::<Seed>()];
    expected.sort_unstable();
    assert_eq!(types, expected);

    assert_eq!(ecs.take_world_data::<Seed>(world), Some(Seed(99)));
    assert_eq!(ecs.take_world_data::<Seed>(world), None);
    assert_eq!(ecs.world_data_types(world), vec![std::any::type_name::<Clock>()]);
}

#[test]
fn world_data_is_per_world_and_dies_with_it() {
    let (mut ecs, world) = setup();
    let other = ecs.create_world("other");
    ecs.set_world_data(world, Seed(1));

    assert!(ecs.world_data::<Seed>(other).is_err());
    ecs.destroy_world(world);
    assert_eq!(ecs.world_data::<Seed>(world), Err(ECSError::StaleWorld(world)));
    assert!(!ecs.set_world_data(world, Seed(2)));
}

#[test]
fn reading_absent_world_data_does_not_register_its_type() {
    #[derive(Debug)]
    struct NeverStored;

    let (mut ecs, world) = setup();
    assert!(ecs.world_data::<NeverStored>(world).is_err());
    assert!(ecs.world_data_mut::<NeverStored>(world).is_err());
    assert!(ecs.take_world_data::<NeverStored>(world).is_none());

    assert_eq!(registered_key_of::<NeverStored>(), None);
    let name = std::any::type_name::<NeverStored>();
    assert!(syren_store::registered_types().iter().all(|desc| desc.name != name));
}

#[test]
fn world_data_types_never_become_component_keys() {
    let (mut ecs, world) = setup();
    ecs.set_world_data(world, Seed(3));

    let key = type_key_of::<Seed>();
    assert_eq!(ecs.archetype_for(world, &Signature::from_keys([key])), None);
    assert!(ecs.archetype_for(world, &Signature::of::<Health>()).is_some());
}

#[test]
fn counts_and_listings_follow_placement() {
    let (mut ecs, world) = setup();
    let a = ecs.create_entity(world).unwrap();
    let b = ecs.create_entity(world).unwrap();
    ecs.set_component(a, Position(0.0, 0.0));
    ecs.set_component(b, Velocity(0.0, 0.0));

    assert_eq!(ecs.world_entity_count(world), 2);
    assert_eq!(ecs.world_archetype_count(world), 3);
    assert_eq!(ecs.archetypes(world).len(), 3);

    let mut listed = ecs.entities(world);
    listed.sort();
    let mut expected = vec![a, b];
    expected.sort();
    assert_eq!(listed, expected);
}

#[test]
fn structure_version_tracks_archetype_creation_and_destruction() {
    let (mut ecs, world) = setup();
    let start = ecs.archetype_structure_version(world).unwrap();

    let entity = ecs.create_entity(world).unwrap();
    let after_empty = ecs.archetype_structure_version(world).unwrap();
    assert_eq!(after_empty, start + 1);

    ecs.set_component(entity, Health(1));
    let after_health = ecs.archetype_structure_version(world).unwrap();
    assert_eq!(after_health, after_empty + 1);

    ecs.set_component(entity, Health(2));
    assert_eq!(ecs.archetype_structure_version(world), Some(after_health));

    assert_eq!(ecs.destroy_empty_archetypes(world), 1);
    assert_eq!(ecs.archetype_structure_version(world), Some(after_health + 1));
    assert_eq!(ecs.world_archetype_count(world), 1);

    ecs.destroy_world(world);
    assert_eq!(ecs.archetype_structure_version(world), None);
}

#[test]
fn stale_archetype_handles_resolve_nothing() {
    let (mut ecs, world) = setup();
    let archetype = ecs.archetype_for(world, &Signature::of::<Position>()).unwrap();
    assert!(ecs.destroy_archetype(archetype));

    assert!(!ecs.is_archetype_valid(archetype));
    assert_eq!(ecs.create_entity_in(archetype), None);
    assert_eq!(ecs.archetype_signature(archetype), None);
    assert_eq!(ecs.entity_buffer(archetype), None);
    assert_eq!(ecs.component_buffer::<Position>(archetype), None);
    assert_eq!(ecs.archetype_entity_count(archetype), 0);
    assert!(!ecs.resize_archetype(archetype));
    assert!(!ecs.is_archetype_valid(Archetype::default()));
}

#[test]
fn entities_move_between_worlds_sharing_one_table() {
    let (mut ecs, world) = setup();
    let other = ecs.create_world("other");
    let here = ecs.create_entity(world).unwrap();
    let there = ecs.create_entity(other).unwrap();
    assert_ne!(here.index(), there.index());

    ecs.set_component(here, Health(6));
    ecs.transfer_entity(here, other);
    ecs.destroy_world(world);

    assert!(ecs.is_alive(here));
    assert_eq!(ecs.try_get_component::<Health>(here), Some(&Health(6)));
    assert_eq!(ecs.world_entity_count(other), 2);
}
