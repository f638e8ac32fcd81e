//! Entity table: slots, generations and free-list recycling.
//!
//! Every entity handle is an index into this table plus the generation the
//! slot had when the handle was issued. The table records, per slot, which
//! world owns the entity and where it is stored inside that world.
//!
//! ## Lifecycle
//!
//! ```text
//! Free --allocate--> Pending --place--> Placed
//!   ^                   |                 |
//!   +------- free ------+-----------------+
//! ```
//!
//! `Pending` slots belong to entities created while their world defers
//! structural changes: the handle is live but the row does not exist yet.
//!
//! ## Invariants
//! - Generations start at `1`, so `Entity::default()` is never alive.
//! - Freeing a slot strictly increases its generation. A slot whose
//!   generation is already `u32::MAX` is retired on free and never reused.
//! - Freed indices are recycled in FIFO order; indices are never renumbered.

use std::collections::VecDeque;

use crate::engine::types::{Entity, EntityIndex, Generation, World};


/// Where a live entity currently sits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum Placement {
    #[default]
    Free,
    Pending,
    Placed { archetype: u32, row: u32 },
}

#[derive(Clone, Copy, Debug)]
struct EntitySlot {
    generation: Generation,
    world: Option<World>,
    placement: Placement,
}

impl Default for EntitySlot {
    fn default() -> Self {
        Self { generation: 1, world: None, placement: Placement::Free }
    }
}

/// Resolved location of a placed entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct EntityLocation {
    pub world: World,
    pub archetype: u32,
    pub row: usize,
}

/// Slot table shared by every world of a manager.
pub(crate) struct EntityTable {
    slots: Vec<EntitySlot>,
    free: VecDeque<EntityIndex>,
    next_unused: usize,
    live: usize,
}

impl EntityTable {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![EntitySlot::default(); capacity.max(1)],
            free: VecDeque::new(),
            next_unused: 0,
            live: 0,
        }
    }

    #[inline] pub fn live_count(&self) -> usize { self.live }

    fn slot(&self, entity: Entity) -> Option<&EntitySlot> {
        self.slots
            .get(entity.index() as usize)
            .filter(|slot| slot.generation == entity.generation() && slot.world.is_some())
    }

    fn slot_mut(&mut self, entity: Entity) -> Option<&mut EntitySlot> {
        self.slots
            .get_mut(entity.index() as usize)
            .filter(|slot| slot.generation == entity.generation() && slot.world.is_some())
    }

    /// Reserves a slot for `world`; the entity starts out pending.
    pub fn allocate(&mut self, world: World) -> Entity {
        let index = match self.free.pop_front() {
            Some(index) => index as usize,
            None => {
                if self.next_unused == self.slots.len() {
                    let grown = self.slots.len() * 2;
                    log::debug!("growing entity table from {} to {grown} slots", self.slots.len());
                    self.slots.resize(grown, EntitySlot::default());
                }
                self.next_unused += 1;
                self.next_unused - 1
            }
        };

        let slot = &mut self.slots[index];
        slot.world = Some(world);
        slot.placement = Placement::Pending;
        self.live += 1;
        Entity::new(index as EntityIndex, slot.generation)
    }

    /// Records the archetype row of a live entity.
    pub fn place(&mut self, entity: Entity, archetype: u32, row: usize) {
        if let Some(slot) = self.slot_mut(entity) {
            slot.placement = Placement::Placed { archetype, row: row as u32 };
        }
    }

    /// Moves a live entity to another world.
    pub fn set_world(&mut self, entity: Entity, world: World) {
        if let Some(slot) = self.slot_mut(entity) {
            slot.world = Some(world);
        }
    }

    /// Invalidates `entity` and queues its index for reuse.
    pub fn free(&mut self, entity: Entity) -> bool {
        let Some(slot) = self.slot_mut(entity) else { return false };
        slot.world = None;
        slot.placement = Placement::Free;
        let reusable = match slot.generation.checked_add(1) {
            Some(next) => {
                slot.generation = next;
                true
            }
            None => false,
        };
        self.live -= 1;
        if reusable {
            self.free.push_back(entity.index());
        } else {
            log::debug!("retiring entity slot {}: generations exhausted", entity.index());
        }
        true
    }

    #[inline]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.slot(entity).is_some()
    }

    pub fn world_of(&self, entity: Entity) -> Option<World> {
        self.slot(entity).and_then(|slot| slot.world)
    }

    pub fn placement(&self, entity: Entity) -> Option<Placement> {
        self.slot(entity).map(|slot| slot.placement)
    }

    pub fn location(&self, entity: Entity) -> Option<EntityLocation> {
        let slot = self.slot(entity)?;
        match (slot.world, slot.placement) {
            (Some(world), Placement::Placed { archetype, row }) => {
                Some(EntityLocation { world, archetype, row: row as usize })
            }
            _ => None,
        }
    }

    /// Returns the live handle occupying `index`, if any.
    pub fn entity_at(&self, index: EntityIndex) -> Option<Entity> {
        let slot = self.slots.get(index as usize)?;
        slot.world.map(|_| Entity::new(index, slot.generation))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    const WORLD: World = World::new(1, 1);

    #[test]
    fn default_handle_is_never_alive() {
        let mut table = EntityTable::with_capacity(4);
        let first = table.allocate(WORLD);
        assert_eq!(first.index(), 0);
        assert!(!table.is_alive(Entity::default()));
        assert!(table.is_alive(first));
    }

    #[test]
    fn generation_strictly_increases_across_recycling() {
        let mut table = EntityTable::with_capacity(1);
        let mut previous = table.allocate(WORLD);
        for _ in 0..10 {
            assert!(table.free(previous));
            let next = table.allocate(WORLD);
            assert_eq!(next.index(), previous.index());
            assert!(next.generation() > previous.generation());
            assert!(!table.is_alive(previous));
            previous = next;
        }
    }

    #[test]
    fn exhausted_slot_is_never_recycled() {
        let mut table = EntityTable::with_capacity(4);
        let first = table.allocate(WORLD);
        table.slots[first.index() as usize].generation = Generation::MAX;
        let last = Entity::new(first.index(), Generation::MAX);
        assert!(table.is_alive(last));

        assert!(table.free(last));
        assert!(!table.is_alive(last));
        assert_eq!(table.live_count(), 0);
        assert_ne!(table.allocate(WORLD).index(), first.index());
        assert_eq!(table.entity_at(first.index()), None);
    }

    #[test]
    fn growth_keeps_existing_handles_valid() {
        let mut table = EntityTable::with_capacity(2);
        let handles: Vec<Entity> = (0..9).map(|_| table.allocate(WORLD)).collect();
        assert!(table.slots.len() >= 9);
        assert!(handles.iter().all(|&entity| table.is_alive(entity)));
        assert_eq!(table.live_count(), 9);
    }

    #[test]
    fn free_list_recycles_in_fifo_order() {
        let mut table = EntityTable::with_capacity(8);
        let a = table.allocate(WORLD);
        let b = table.allocate(WORLD);
        table.free(b);
        table.free(a);
        assert_eq!(table.allocate(WORLD).index(), b.index());
        assert_eq!(table.allocate(WORLD).index(), a.index());
    }

    #[test]
    fn placement_tracks_pending_and_placed() {
        let mut table = EntityTable::with_capacity(2);
        let entity = table.allocate(WORLD);
        assert_eq!(table.placement(entity), Some(Placement::Pending));
        assert_eq!(table.location(entity), None);
        table.place(entity, 3, 7);
        assert_eq!(
            table.location(entity),
            Some(EntityLocation { world: WORLD, archetype: 3, row: 7 })
        );
        assert!(!table.free(Entity::new(entity.index(), entity.generation() + 1)));
    }
}
