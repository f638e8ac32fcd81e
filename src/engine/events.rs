//! Deferred structural mutation.
//!
//! While a world defers structural changes, every mutating operation routed to
//! it is recorded as a [`StructuralEvent`] instead of being applied. Deferral
//! is counted, not boolean: nested enable/disable pairs compose, and the queue
//! only replays once the depth returns to zero.
//!
//! ## Replay
//! Events replay strictly in submission order through the same code paths as
//! immediate operations. A callback fired during replay may re-enter deferral;
//! replay then pauses (the queue reports nothing ready) and resumes, still in
//! FIFO order, when that nested deferral exits. An entity event whose entity
//! now lives in, or moves into, another deferring world is handed to that
//! world's queue instead of running.
//!
//! Component values are held type-erased; each set/remove event carries a
//! function pointer monomorphised for its component type that performs the
//! typed replay.

use std::{any::Any, collections::VecDeque, fmt};

use crate::engine::manager::ECSManager;
use crate::engine::types::{Archetype, Entity, TypeKey, World};


/// Typed replay of a deferred component write.
pub(crate) type SetReplay = fn(&mut ECSManager, Entity, Box<dyn Any>);

/// Typed replay of a deferred component removal.
pub(crate) type RemoveReplay = fn(&mut ECSManager, Entity);

/// One pending structural mutation.
pub(crate) enum StructuralEvent {
    CreateEntity { entity: Entity, archetype: Archetype },
    DestroyEntity { entity: Entity },
    SetComponent { entity: Entity, key: TypeKey, value: Box<dyn Any>, replay: SetReplay },
    RemoveComponent { entity: Entity, key: TypeKey, replay: RemoveReplay },
    TransferEntity { entity: Entity, target: World },
    DestroyArchetype { archetype: Archetype, only_if_empty: bool },
    DestroyWorld { world: World },
    ResizeBackingArrays { archetype: Archetype },
}

/// Kind of a pending structural event, for inspection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Placement of an entity reserved while deferring.
    CreateEntity,
    /// Entity destruction.
    DestroyEntity,
    /// Component write, in place or with migration.
    SetComponent,
    /// Component removal with migration.
    RemoveComponent,
    /// Move of an entity into another world.
    TransferEntity,
    /// Archetype destruction, including its entities.
    DestroyArchetype,
    /// World destruction.
    DestroyWorld,
    /// Shrinking of an archetype's arrays.
    ResizeBackingArrays,
}

impl StructuralEvent {
    pub(crate) fn kind(&self) -> EventKind {
        match self {
            Self::CreateEntity { .. } => EventKind::CreateEntity,
            Self::DestroyEntity { .. } => EventKind::DestroyEntity,
            Self::SetComponent { .. } => EventKind::SetComponent,
            Self::RemoveComponent { .. } => EventKind::RemoveComponent,
            Self::TransferEntity { .. } => EventKind::TransferEntity,
            Self::DestroyArchetype { .. } => EventKind::DestroyArchetype,
            Self::DestroyWorld { .. } => EventKind::DestroyWorld,
            Self::ResizeBackingArrays { .. } => EventKind::ResizeBackingArrays,
        }
    }
}

impl fmt::Debug for StructuralEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateEntity { entity, archetype } => write!(f, "CreateEntity({entity} in {archetype})"),
            Self::DestroyEntity { entity } => write!(f, "DestroyEntity({entity})"),
            Self::SetComponent { entity, key, .. } => write!(f, "SetComponent({entity}, key {key})"),
            Self::RemoveComponent { entity, key, .. } => write!(f, "RemoveComponent({entity}, key {key})"),
            Self::TransferEntity { entity, target } => write!(f, "TransferEntity({entity} to {target})"),
            Self::DestroyArchetype { archetype, .. } => write!(f, "DestroyArchetype({archetype})"),
            Self::DestroyWorld { world } => write!(f, "DestroyWorld({world})"),
            Self::ResizeBackingArrays { archetype } => write!(f, "ResizeBackingArrays({archetype})"),
        }
    }
}

/// Per-world deferral depth and FIFO of pending events.
#[derive(Default)]
pub(crate) struct StructuralEventQueue {
    depth: u32,
    events: VecDeque<StructuralEvent>,
}

impl StructuralEventQueue {
    #[inline] pub fn is_deferring(&self) -> bool { self.depth > 0 }

    pub fn enter(&mut self) {
        self.depth += 1;
    }

    /// Leaves one level of deferral; returns `true` when replay may start.
    pub fn exit(&mut self) -> bool {
        if self.depth == 0 {
            log::warn!("structural deferral disabled more often than enabled");
            return false;
        }
        self.depth -= 1;
        self.depth == 0
    }

    pub fn push(&mut self, event: StructuralEvent) {
        log::trace!("deferring {event:?}");
        self.events.push_back(event);
    }

    /// Next event to replay, or `None` while deferral is active.
    pub fn pop_ready(&mut self) -> Option<StructuralEvent> {
        if self.is_deferring() {
            return None;
        }
        self.events.pop_front()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = StructuralEvent> + '_ {
        self.events.drain(..)
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.iter().map(StructuralEvent::kind).collect()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn destroy(index: u32) -> StructuralEvent {
        StructuralEvent::DestroyEntity { entity: Entity::new(index, 1) }
    }

    #[test]
    fn nested_deferral_holds_events_until_outermost_exit() {
        let mut queue = StructuralEventQueue::default();
        queue.enter();
        queue.enter();
        queue.push(destroy(1));
        assert!(!queue.exit());
        assert!(queue.pop_ready().is_none());
        assert!(queue.exit());
        assert!(queue.pop_ready().is_some());
        assert!(queue.pop_ready().is_none());
    }

    #[test]
    fn events_replay_in_submission_order() {
        let mut queue = StructuralEventQueue::default();
        queue.enter();
        for index in 1..=3 {
            queue.push(destroy(index));
        }
        queue.exit();

        let order: Vec<u32> = std::iter::from_fn(|| queue.pop_ready())
            .map(|event| match event {
                StructuralEvent::DestroyEntity { entity } => entity.index(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn unbalanced_exit_is_ignored() {
        let mut queue = StructuralEventQueue::default();
        assert!(!queue.exit());
        assert_eq!(queue.depth, 0);
        assert!(!queue.is_deferring());
    }
}
