#![allow(dead_code)]

use syren_store::prelude::*;

pub const AGENTS_SMALL: usize = 10_000;
pub const AGENTS_MED: usize = 100_000;

#[derive(Clone, Copy, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Copy, Default)]
pub struct Wealth {
    pub value: f32,
}

#[derive(Clone, Copy, Default)]
pub struct Productivity {
    pub rate: f32,
}

pub fn make_world() -> (ECSManager, World) {
    let mut ecs = ECSManager::new();
    let world = ecs.create_world("bench");
    (ecs, world)
}

/// Fills `world` with agents carrying `Position` and `Wealth`.
pub fn populate(ecs: &mut ECSManager, world: World, agent_count: usize) -> Vec<Entity> {
    let signature = Signature::new().with::<Position>().with::<Wealth>();
    let Some(archetype) = ecs.archetype_for(world, &signature) else {
        return Vec::new();
    };
    (0..agent_count)
        .filter_map(|_| ecs.create_entity_in(archetype))
        .collect()
}
