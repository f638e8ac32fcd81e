#![allow(dead_code)]

use syren_store::prelude::*;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Position(pub f32, pub f32);

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Velocity(pub f32, pub f32);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Health(pub u32);

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Label(pub String);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Frozen;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn setup() -> (ECSManager, World) {
    init_logging();
    let mut ecs = ECSManager::new();
    let world = ecs.create_world("test");
    (ecs, world)
}

/// Small deterministic generator for scripted operation sequences.
pub struct Lcg(pub u64);

impl Lcg {
    pub fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    pub fn below(&mut self, bound: u64) -> u64 {
        self.next() % bound
    }
}
