//! Store orchestration layer.
//!
//! [`ECSManager`] owns the entity table and every world, and exposes the whole
//! public API: world lifecycle, entity lifecycle, component access, world
//! data, callbacks and structural deferral.
//!
//! ## Immediate and deferred paths
//!
//! Every structural operation first decides where it goes:
//!
//! * if the owning world is deferring, the operation is recorded as a
//!   [`StructuralEvent`](crate::engine::events) on that world's queue and the
//!   call returns at once;
//! * otherwise it runs against the archetypes right away.
//!
//! Replay feeds queued events through the same code the immediate path uses,
//! so deferring a sequence of operations and draining it yields the same state
//! as running it directly. Events that address an entity are re-routed at
//! replay: an entity may have moved, or another world may have started
//! deferring, since the event was queued. If the world the event would touch
//! is deferring at that point, the event moves to that world's queue instead
//! of running. A deferring world's archetypes therefore never change until
//! its own deferral ends.
//!
//! ## Failure model
//!
//! Stale handles make operations silent no-ops (`false` / `None`). The
//! `try_*` accessors return [`ECSError`] for callers that want the reason.
//! Broken internal bookkeeping panics through the corruption helper.
//!
//! ## Callbacks
//!
//! On-set and on-remove callbacks receive `&mut ECSManager` and run after the
//! operation that triggered them has fully completed, so the store is always
//! consistent when user code observes it.

use std::{
    any::{type_name, Any},
    mem,
    rc::Rc,
};

use crate::engine::archetype::ArchetypeData;
use crate::engine::component::{
    component_key_of, is_component_key, registered_key_of, type_key_of, type_name_of, Component,
};
use crate::engine::entity::{EntityLocation, EntityTable, Placement};
use crate::engine::error::{corruption, ECSError, ECSResult};
use crate::engine::events::{EventKind, StructuralEvent};
use crate::engine::hooks::{fire_remove, fire_set, HookId};
use crate::engine::types::{
    Archetype, ECSConfig, Entity, EntityIndex, Signature, Version, World, INITIAL_WORLD_SLOTS,
};
use crate::engine::world::WorldData;


struct WorldSlot {
    version: Version,
    data: Option<WorldData>,
}

impl Default for WorldSlot {
    fn default() -> Self {
        Self { version: 1, data: None }
    }
}

/// Owner of every world, archetype and entity slot.
///
/// ## Role
/// All worlds created by one manager share its entity table, so entity
/// handles stay comparable across worlds and can be transferred between them.
///
/// ## Concurrency
/// Single-threaded. The manager is neither `Send` nor `Sync` because callbacks
/// are stored behind `Rc`.

pub struct ECSManager {
    config: ECSConfig,
    entities: EntityTable,
    worlds: Vec<WorldSlot>,
    free_worlds: Vec<u32>,
    next_world_slot: usize,
    world_count: usize,
}

impl Default for ECSManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ECSManager {
    /// Creates an empty manager with the default configuration.
    pub fn new() -> Self {
        Self::with_config(ECSConfig::default())
    }

    /// Creates an empty manager.
    ///
    /// ## Parameters
    /// * `config`: Initial entity table size and archetype buffer floor.

    pub fn with_config(config: ECSConfig) -> Self {
        Self {
            config,
            entities: EntityTable::with_capacity(config.initial_entity_slots),
            worlds: (0..INITIAL_WORLD_SLOTS).map(|_| WorldSlot::default()).collect(),
            free_worlds: Vec::new(),
            next_world_slot: 0,
            world_count: 0,
        }
    }

    /// Configuration this manager was built with.
    #[inline] pub fn config(&self) -> &ECSConfig { &self.config }

    /// Number of live entities across all worlds, pending ones included.
    #[inline] pub fn live_entity_count(&self) -> usize { self.entities.live_count() }

    // ─────────────────────────────────────────────────────────────────────
    // Resolution helpers
    // ─────────────────────────────────────────────────────────────────────

    fn slot_data(worlds: &[WorldSlot], world: World) -> Option<&WorldData> {
        worlds
            .get(world.index() as usize)
            .filter(|slot| slot.version == world.version())
            .and_then(|slot| slot.data.as_ref())
    }

    fn slot_data_mut(worlds: &mut [WorldSlot], world: World) -> Option<&mut WorldData> {
        worlds
            .get_mut(world.index() as usize)
            .filter(|slot| slot.version == world.version())
            .and_then(|slot| slot.data.as_mut())
    }

    fn slot_pair_mut(
        worlds: &mut [WorldSlot],
        a: World,
        b: World,
    ) -> Option<(&mut WorldData, &mut WorldData)> {
        let (ia, ib) = (a.index() as usize, b.index() as usize);
        if ia == ib || ia >= worlds.len() || ib >= worlds.len() {
            return None;
        }
        let (first, second) = if ia < ib {
            let (left, right) = worlds.split_at_mut(ib);
            (&mut left[ia], &mut right[0])
        } else {
            let (left, right) = worlds.split_at_mut(ia);
            (&mut right[0], &mut left[ib])
        };
        if first.version != a.version() || second.version != b.version() {
            return None;
        }
        Some((first.data.as_mut()?, second.data.as_mut()?))
    }

    fn world_ref(&self, world: World) -> ECSResult<&WorldData> {
        Self::slot_data(&self.worlds, world).ok_or(ECSError::StaleWorld(world))
    }

    fn world_mut(&mut self, world: World) -> ECSResult<&mut WorldData> {
        Self::slot_data_mut(&mut self.worlds, world).ok_or(ECSError::StaleWorld(world))
    }

    /// World owning a live entity; missing worlds mean broken bookkeeping.
    fn owner_mut(worlds: &mut [WorldSlot], entity: Entity, world: World) -> &mut WorldData {
        match Self::slot_data_mut(worlds, world) {
            Some(data) => data,
            None => corruption(format!("{entity} is alive but {world} is gone")),
        }
    }

    fn locate(&self, entity: Entity) -> ECSResult<EntityLocation> {
        match self.entities.placement(entity) {
            None => Err(ECSError::StaleEntity(entity)),
            Some(Placement::Pending) => Err(ECSError::PendingEntity(entity)),
            Some(_) => self.entities.location(entity).ok_or(ECSError::StaleEntity(entity)),
        }
    }

    fn is_world_deferring(&self, world: World) -> bool {
        Self::slot_data(&self.worlds, world).is_some_and(|data| data.events.is_deferring())
    }

    fn enqueue(&mut self, world: World, event: StructuralEvent) {
        match Self::slot_data_mut(&mut self.worlds, world) {
            Some(data) => data.events.push(event),
            None => log::warn!("dropping {event:?}: {world} no longer exists"),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Worlds
    // ─────────────────────────────────────────────────────────────────────

    /// Creates a new, empty world.
    pub fn create_world(&mut self, name: impl Into<String>) -> World {
        let index = match self.free_worlds.pop() {
            Some(index) => index as usize,
            None => {
                if self.next_world_slot == self.worlds.len() {
                    let grown = self.worlds.len() * 2;
                    self.worlds.resize_with(grown, WorldSlot::default);
                }
                self.next_world_slot += 1;
                self.next_world_slot - 1
            }
        };

        let slot = &mut self.worlds[index];
        let handle = World::new(index as u32, slot.version);
        slot.data = Some(WorldData::new(handle, name.into(), self.config.buffer_floor()));
        self.world_count += 1;
        log::debug!("created {handle}");
        handle
    }

    /// Returns the first live world called `name`, creating one if none exists.
    pub fn get_or_create_world(&mut self, name: &str) -> World {
        match self.find_world(name) {
            Some(world) => world,
            None => self.create_world(name),
        }
    }

    /// Returns the first live world called `name`.
    pub fn find_world(&self, name: &str) -> Option<World> {
        self.worlds
            .iter()
            .filter_map(|slot| slot.data.as_ref())
            .find(|data| data.name == name)
            .map(|data| data.handle)
    }

    /// Handles of every live world, in slot order.
    pub fn worlds(&self) -> Vec<World> {
        self.worlds
            .iter()
            .filter_map(|slot| slot.data.as_ref().map(|data| data.handle))
            .collect()
    }

    /// Number of live worlds.
    #[inline] pub fn world_count(&self) -> usize { self.world_count }

    /// Returns `true` while `world` refers to a live world.
    pub fn is_world_valid(&self, world: World) -> bool {
        self.world_ref(world).is_ok()
    }

    /// Name of `world`.
    pub fn world_name(&self, world: World) -> Option<&str> {
        self.world_ref(world).ok().map(|data| data.name.as_str())
    }

    /// Renames `world`; returns `false` if the handle is stale.
    pub fn set_world_name(&mut self, world: World, name: impl Into<String>) -> bool {
        match self.world_mut(world) {
            Ok(data) => {
                data.name = name.into();
                true
            }
            Err(_) => false,
        }
    }

    /// Number of placed entities in `world`.
    pub fn world_entity_count(&self, world: World) -> usize {
        self.world_ref(world).map_or(0, |data| data.entity_count)
    }

    /// Number of live archetypes in `world`.
    pub fn world_archetype_count(&self, world: World) -> usize {
        self.world_ref(world).map_or(0, WorldData::archetype_count)
    }

    /// Handles of every live archetype of `world`.
    pub fn archetypes(&self, world: World) -> Vec<Archetype> {
        self.world_ref(world)
            .map(|data| data.archetypes().map(ArchetypeData::handle).collect())
            .unwrap_or_default()
    }

    /// Every placed entity of `world`, archetype by archetype.
    pub fn entities(&self, world: World) -> Vec<Entity> {
        self.world_ref(world)
            .map(|data| {
                data.archetypes()
                    .flat_map(|archetype| archetype.entities().iter().copied())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Counter bumped whenever an archetype of `world` is created or destroyed.
    ///
    /// Callers caching query matches compare it to detect when to refresh.
    pub fn archetype_structure_version(&self, world: World) -> Option<u64> {
        self.world_ref(world).ok().map(WorldData::structure_version)
    }

    /// The unique archetype of `world` for `signature`, created on first use.
    ///
    /// Returns `None` for stale worlds and for signatures containing keys that
    /// were never used as component types.
    pub fn archetype_for(&mut self, world: World, signature: &Signature) -> Option<Archetype> {
        if !signature.iter().all(is_component_key) {
            return None;
        }
        let data = self.world_mut(world).ok()?;
        let index = data.archetype_index_for(signature);
        Some(data.archetype_at(index).handle())
    }

    /// Destroys `world`, every archetype and entity in it, and its callbacks.
    ///
    /// Entity handles are invalidated first; on-remove callbacks then run in
    /// bulk, once per component type and archetype, so they never observe a
    /// half-destroyed world.
    pub fn destroy_world(&mut self, world: World) -> bool {
        if !self.is_world_valid(world) {
            return false;
        }
        if self.is_world_deferring(world) {
            self.enqueue(world, StructuralEvent::DestroyWorld { world });
            return true;
        }
        self.destroy_world_now(world)
    }

    fn destroy_world_now(&mut self, world: World) -> bool {
        let Some(slot) = self
            .worlds
            .get_mut(world.index() as usize)
            .filter(|slot| slot.version == world.version())
        else {
            return false;
        };
        let Some(mut data) = slot.data.take() else { return false };
        match slot.version.checked_add(1) {
            Some(next) => {
                slot.version = next;
                self.free_worlds.push(world.index());
            }
            None => log::debug!("retiring world slot {}: versions exhausted", world.index()),
        }
        self.world_count -= 1;

        let mut discarded = 0usize;
        for event in data.events.drain() {
            discarded += 1;
            if let StructuralEvent::CreateEntity { entity, .. } = event {
                self.entities.free(entity);
            }
        }
        if discarded > 0 {
            log::warn!("{world} destroyed with {discarded} deferred events still queued");
        }

        let hooks = Rc::clone(&data.hooks);
        let mut drained = Vec::new();
        for mut archetype in data.take_archetypes() {
            let (entities, columns) = {
                let table = hooks.borrow();
                archetype.drain(|key| table.has_remove(key))
            };
            for &entity in &entities {
                self.entities.free(entity);
            }
            drained.push((entities, columns));
        }
        drop(data);

        for (entities, columns) in drained {
            for (notifier, values) in columns {
                (notifier.all)(&hooks, self, &entities, values);
            }
        }
        log::debug!("destroyed {world}");
        true
    }

    /// Destroys every archetype of `world` that holds no entities.
    ///
    /// While deferring, each candidate is re-checked at replay and kept if it
    /// gained entities in the meantime. Returns the number of archetypes
    /// destroyed or scheduled.
    pub fn destroy_empty_archetypes(&mut self, world: World) -> usize {
        let Ok(data) = self.world_ref(world) else { return 0 };
        let empty: Vec<Archetype> = data
            .archetypes()
            .filter(|archetype| archetype.is_empty())
            .map(ArchetypeData::handle)
            .collect();

        let deferring = data.events.is_deferring();
        for &archetype in &empty {
            if deferring {
                self.enqueue(world, StructuralEvent::DestroyArchetype { archetype, only_if_empty: true });
            } else {
                self.destroy_archetype_now(archetype, true);
            }
        }
        empty.len()
    }

    /// Shrinks the arrays of every archetype of `world` to fit their entities.
    pub fn resize_backing_arrays(&mut self, world: World) -> bool {
        let handles = self.archetypes(world);
        if handles.is_empty() {
            return self.is_world_valid(world);
        }
        handles.into_iter().all(|archetype| self.resize_archetype(archetype))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Deferral
    // ─────────────────────────────────────────────────────────────────────

    /// Returns `true` while structural changes to `world` are being queued.
    pub fn is_deferring(&self, world: World) -> bool {
        self.is_world_deferring(world)
    }

    /// Enables (`true`) or disables (`false`) one level of deferral.
    ///
    /// Deferral nests: the queue replays, in submission order, when the last
    /// enabled level is disabled. Returns `false` if the handle is stale.
    pub fn set_deferral(&mut self, world: World, enable: bool) -> bool {
        let Ok(data) = self.world_mut(world) else { return false };
        if enable {
            data.events.enter();
        } else if data.events.exit() {
            self.play_back(world);
        }
        true
    }

    /// Runs `f` with deferral enabled on `world`, replaying afterwards.
    pub fn with_deferral<R>(&mut self, world: World, f: impl FnOnce(&mut Self) -> R) -> R {
        let entered = self.set_deferral(world, true);
        let result = f(self);
        if entered {
            self.set_deferral(world, false);
        }
        result
    }

    /// Kinds of the events currently queued on `world`, oldest first.
    pub fn pending_events(&self, world: World) -> Vec<EventKind> {
        self.world_ref(world).map(|data| data.events.kinds()).unwrap_or_default()
    }

    fn play_back(&mut self, world: World) {
        log::trace!("replaying deferred events of {world}");
        while let Some(event) =
            Self::slot_data_mut(&mut self.worlds, world).and_then(|data| data.events.pop_ready())
        {
            self.apply(event);
        }
    }

    /// Runs one replayed event.
    ///
    /// Create, archetype and world events only touch the replaying world.
    /// Entity events go back through the public entry points, which queue
    /// them again on whichever involved world is deferring now.
    fn apply(&mut self, event: StructuralEvent) {
        match event {
            StructuralEvent::CreateEntity { entity, archetype } => self.place_now(entity, archetype),
            StructuralEvent::DestroyEntity { entity } => {
                self.destroy_entity(entity);
            }
            StructuralEvent::SetComponent { entity, value, replay, .. } => replay(self, entity, value),
            StructuralEvent::RemoveComponent { entity, replay, .. } => replay(self, entity),
            StructuralEvent::TransferEntity { entity, target } => {
                self.transfer_entity(entity, target);
            }
            StructuralEvent::DestroyArchetype { archetype, only_if_empty } => {
                self.destroy_archetype_now(archetype, only_if_empty);
            }
            StructuralEvent::DestroyWorld { world } => {
                self.destroy_world_now(world);
            }
            StructuralEvent::ResizeBackingArrays { archetype } => {
                self.resize_archetype_now(archetype);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // World data
    // ─────────────────────────────────────────────────────────────────────

    /// Stores `value` as `world`'s singleton of type `T`, replacing any previous one.
    pub fn set_world_data<T: 'static>(&mut self, world: World, value: T) -> bool {
        let key = type_key_of::<T>();
        match self.world_mut(world) {
            Ok(data) => {
                data.resources.insert(key, Box::new(value));
                true
            }
            Err(_) => false,
        }
    }

    /// Returns `world`'s singleton of type `T`.
    pub fn world_data<T: 'static>(&self, world: World) -> ECSResult<&T> {
        let data = self.world_ref(world)?;
        registered_key_of::<T>()
            .and_then(|key| data.resources.get(&key))
            .and_then(|value| value.downcast_ref::<T>())
            .ok_or(ECSError::MissingWorldData { world, data: type_name::<T>() })
    }

    /// Returns `world`'s singleton of type `T` mutably.
    pub fn world_data_mut<T: 'static>(&mut self, world: World) -> ECSResult<&mut T> {
        let data = self.world_mut(world)?;
        let stored = match registered_key_of::<T>() {
            Some(key) => data.resources.get_mut(&key),
            None => None,
        };
        stored
            .and_then(|value| value.downcast_mut::<T>())
            .ok_or(ECSError::MissingWorldData { world, data: type_name::<T>() })
    }

    /// Removes and returns `world`'s singleton of type `T`.
    pub fn take_world_data<T: 'static>(&mut self, world: World) -> Option<T> {
        let key = registered_key_of::<T>()?;
        let value: Box<dyn Any> = self.world_mut(world).ok()?.resources.remove(&key)?;
        value.downcast::<T>().ok().map(|value| *value)
    }

    /// Type names of every singleton stored on `world`, in key order.
    pub fn world_data_types(&self, world: World) -> Vec<&'static str> {
        let Ok(data) = self.world_ref(world) else { return Vec::new() };
        let mut keys: Vec<_> = data.resources.keys().copied().collect();
        keys.sort_unstable();
        keys.into_iter().filter_map(type_name_of).collect()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Callbacks
    // ─────────────────────────────────────────────────────────────────────

    /// Subscribes `hook` to writes of component `T` in `world`.
    ///
    /// The hook receives the previous value (`T::default()` when the
    /// component was added) and the stored value. Subscribers run in
    /// registration order.
    pub fn on_set<T, F>(&mut self, world: World, hook: F) -> Option<HookId>
    where
        T: Component,
        F: Fn(&mut ECSManager, Entity, &T, &T) + 'static,
    {
        let data = self.world_mut(world).ok()?;
        let id = data.hooks.borrow_mut().add_set::<T>(Rc::new(hook));
        Some(id)
    }

    /// Subscribes `hook` to removals of component `T` in `world`, including
    /// removals caused by destroying entities, archetypes or the world.
    pub fn on_remove<T, F>(&mut self, world: World, hook: F) -> Option<HookId>
    where
        T: Component,
        F: Fn(&mut ECSManager, Entity, &T) + 'static,
    {
        let data = self.world_mut(world).ok()?;
        let id = data.hooks.borrow_mut().add_remove::<T>(Rc::new(hook));
        Some(id)
    }

    /// Removes a callback registered on `world`.
    pub fn unregister_hook(&mut self, world: World, id: HookId) -> bool {
        self.world_mut(world)
            .map(|data| data.hooks.borrow_mut().unregister(id))
            .unwrap_or(false)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Entities
    // ─────────────────────────────────────────────────────────────────────

    /// Creates an entity without components in `world`.
    pub fn create_entity(&mut self, world: World) -> Option<Entity> {
        let archetype = self.archetype_for(world, &Signature::new())?;
        self.create_entity_in(archetype)
    }

    /// Creates an entity in `archetype`, with default component values.
    ///
    /// While the world defers, the returned handle is alive but pending: it
    /// is placed when the queue replays.
    pub fn create_entity_in(&mut self, archetype: Archetype) -> Option<Entity> {
        let world = archetype.world();
        let data = self.world_ref(world).ok()?;
        data.archetype(archetype)?;
        let deferring = data.events.is_deferring();

        let entity = self.entities.allocate(world);
        if deferring {
            self.enqueue(world, StructuralEvent::CreateEntity { entity, archetype });
        } else {
            self.place_now(entity, archetype);
        }
        Some(entity)
    }

    fn place_now(&mut self, entity: Entity, archetype: Archetype) {
        if self.entities.placement(entity) != Some(Placement::Pending) {
            return;
        }
        let target = Self::slot_data_mut(&mut self.worlds, archetype.world())
            .and_then(|data| {
                let row = data.archetype_mut(archetype)?.push_entity(entity);
                data.entity_count += 1;
                Some(row)
            });
        match target {
            Some(row) => {
                self.entities.place(entity, archetype.index(), row);
                log::trace!("placed {entity} in {archetype} row {row}");
            }
            None => {
                log::warn!("{archetype} vanished before {entity} was placed");
                self.entities.free(entity);
            }
        }
    }

    /// Returns `true` while `entity` refers to a live entity.
    #[inline]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// Returns `true` if `entity` was created while deferring and has not
    /// been placed yet.
    pub fn is_pending(&self, entity: Entity) -> bool {
        self.entities.placement(entity) == Some(Placement::Pending)
    }

    /// Live entity occupying table slot `index`.
    pub fn entity_at_index(&self, index: EntityIndex) -> Option<Entity> {
        self.entities.entity_at(index)
    }

    /// World that owns `entity`.
    pub fn entity_world(&self, entity: Entity) -> Option<World> {
        self.entities.world_of(entity)
    }

    /// Archetype currently storing `entity`.
    pub fn entity_archetype(&self, entity: Entity) -> Option<Archetype> {
        let location = self.locate(entity).ok()?;
        let data = self.world_ref(location.world).ok()?;
        Some(data.archetype_at(location.archetype).handle())
    }

    /// Type names of all components of `entity`.
    pub fn component_types(&self, entity: Entity) -> Vec<&'static str> {
        let Ok(location) = self.locate(entity) else { return Vec::new() };
        self.world_ref(location.world)
            .map(|data| data.archetype_at(location.archetype).component_type_names())
            .unwrap_or_default()
    }

    /// Destroys `entity`, firing on-remove callbacks for each of its components.
    pub fn destroy_entity(&mut self, entity: Entity) -> bool {
        let Some(world) = self.entities.world_of(entity) else { return false };
        if self.is_world_deferring(world) {
            self.enqueue(world, StructuralEvent::DestroyEntity { entity });
            return true;
        }
        self.destroy_entity_now(entity)
    }

    fn destroy_entity_now(&mut self, entity: Entity) -> bool {
        let location = match self.locate(entity) {
            Ok(location) => location,
            Err(ECSError::PendingEntity(_)) => return self.entities.free(entity),
            Err(_) => return false,
        };

        let data = Self::owner_mut(&mut self.worlds, entity, location.world);
        let hooks = Rc::clone(&data.hooks);
        let (displaced, removed) = {
            let table = hooks.borrow();
            data.archetype_at_mut(location.archetype)
                .remove_row(location.row, |key| table.has_remove(key))
        };
        data.entity_count -= 1;

        if let Some(displaced) = displaced {
            self.entities.place(displaced, location.archetype, location.row);
        }
        self.entities.free(entity);
        log::trace!("destroyed {entity}");

        for (notifier, value) in removed {
            (notifier.one)(&hooks, self, entity, value);
        }
        true
    }

    /// Moves `entity` and all its components into `target`.
    ///
    /// No callbacks fire; component values are unchanged. The move is queued
    /// on the source world if it is deferring, otherwise on the target if that
    /// one is. Replay checks both worlds again.
    pub fn transfer_entity(&mut self, entity: Entity, target: World) -> bool {
        let Some(source) = self.entities.world_of(entity) else { return false };
        if !self.is_world_valid(target) {
            return false;
        }
        if source == target {
            return true;
        }

        if self.is_world_deferring(source) {
            self.enqueue(source, StructuralEvent::TransferEntity { entity, target });
        } else if self.is_world_deferring(target) {
            self.enqueue(target, StructuralEvent::TransferEntity { entity, target });
        } else {
            return self.transfer_entity_now(entity, target);
        }
        true
    }

    fn transfer_entity_now(&mut self, entity: Entity, target: World) -> bool {
        let Ok(location) = self.locate(entity) else { return false };
        if location.world == target {
            return true;
        }

        let signature = {
            let source = Self::owner_mut(&mut self.worlds, entity, location.world);
            source.archetype_at(location.archetype).signature().clone()
        };
        let Ok(destination) = self.world_mut(target) else { return false };
        let target_index = destination.archetype_index_for(&signature);

        let Some((source, destination)) = Self::slot_pair_mut(&mut self.worlds, location.world, target) else {
            corruption(format!("cannot borrow {} and {target} together", location.world));
        };
        let moved = source
            .archetype_at_mut(location.archetype)
            .migrate_row(location.row, destination.archetype_at_mut(target_index));
        source.entity_count -= 1;
        destination.entity_count += 1;

        self.entities.set_world(entity, target);
        self.entities.place(entity, target_index, moved.target_row);
        if let Some(displaced) = moved.displaced {
            self.entities.place(displaced, location.archetype, location.row);
        }
        log::trace!("transferred {entity} from {} to {target}", location.world);
        true
    }

    // ─────────────────────────────────────────────────────────────────────
    // Components
    // ─────────────────────────────────────────────────────────────────────

    /// Writes component `T` on `entity`, adding it if absent.
    ///
    /// Fires on-set callbacks with the previous and the stored value. Returns
    /// `false` for stale handles; while deferring, returns `true` once queued.
    pub fn set_component<T: Component>(&mut self, entity: Entity, value: T) -> bool {
        let Some(world) = self.entities.world_of(entity) else { return false };
        if self.is_world_deferring(world) {
            let key = component_key_of::<T>();
            self.enqueue(world, StructuralEvent::SetComponent {
                entity,
                key,
                value: Box::new(value),
                replay: replay_set::<T>,
            });
            return true;
        }
        self.set_component_now(entity, value)
    }

    fn set_component_now<T: Component>(&mut self, entity: Entity, value: T) -> bool {
        let Ok(location) = self.locate(entity) else { return false };
        let key = component_key_of::<T>();
        let data = Self::owner_mut(&mut self.worlds, entity, location.world);
        let hooks = Rc::clone(&data.hooks);
        let notify = hooks.borrow().has_set(key);

        let source = data.archetype_at_mut(location.archetype);
        if let Some(column) = source.column_mut::<T>(key) {
            let old = mem::replace(&mut column[location.row], value);
            if notify {
                let new = column[location.row].clone();
                fire_set(&hooks, self, entity, &old, &new);
            }
            return true;
        }

        let mut signature = source.signature().clone();
        signature.insert(key);
        let target_index = data.archetype_index_for(&signature);
        let (source, target) = data.archetype_pair_mut(location.archetype, target_index);
        let moved = source.migrate_row(location.row, target);

        let stored = notify.then(|| value.clone());
        let target_handle = target.handle();
        match target.column_mut::<T>(key) {
            Some(column) => column[moved.target_row] = value,
            None => corruption(format!("{target_handle} lacks {}", type_name::<T>())),
        }

        self.entities.place(entity, target_index, moved.target_row);
        if let Some(displaced) = moved.displaced {
            self.entities.place(displaced, location.archetype, location.row);
        }
        log::trace!("added {} to {entity}", type_name::<T>());

        if let Some(stored) = stored {
            fire_set(&hooks, self, entity, &T::default(), &stored);
        }
        true
    }

    /// Removes component `T` from `entity`.
    ///
    /// Fires on-remove callbacks with the removed value. Returns `false` if
    /// the handle is stale or `T` is absent; while deferring, returns `true`
    /// once queued. Removing the last component leaves the entity alive with
    /// no components.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> bool {
        let Some(world) = self.entities.world_of(entity) else { return false };
        if self.is_world_deferring(world) {
            let key = component_key_of::<T>();
            self.enqueue(world, StructuralEvent::RemoveComponent { entity, key, replay: replay_remove::<T> });
            return true;
        }
        self.remove_component_now::<T>(entity)
    }

    fn remove_component_now<T: Component>(&mut self, entity: Entity) -> bool {
        let Ok(location) = self.locate(entity) else { return false };
        let key = component_key_of::<T>();
        let data = Self::owner_mut(&mut self.worlds, entity, location.world);

        let source = data.archetype_at(location.archetype);
        if !source.has(key) {
            return false;
        }
        let mut signature = source.signature().clone();
        signature.remove(key);

        let hooks = Rc::clone(&data.hooks);
        let target_index = data.archetype_index_for(&signature);
        let (source, target) = data.archetype_pair_mut(location.archetype, target_index);
        let moved = source.migrate_row(location.row, target);

        self.entities.place(entity, target_index, moved.target_row);
        if let Some(displaced) = moved.displaced {
            self.entities.place(displaced, location.archetype, location.row);
        }
        log::trace!("removed {} from {entity}", type_name::<T>());

        if !hooks.borrow().has_remove(key) {
            return true;
        }
        for (dropped_key, value) in moved.dropped {
            if dropped_key != key {
                continue;
            }
            match value.downcast::<T>() {
                Ok(value) => fire_remove(&hooks, self, entity, &*value),
                Err(_) => corruption(format!("removed value is not a {}", type_name::<T>())),
            }
        }
        true
    }

    /// Returns `true` if `entity` currently has component `T`.
    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        let Ok(location) = self.locate(entity) else { return false };
        self.world_ref(location.world)
            .is_ok_and(|data| data.archetype_at(location.archetype).has(component_key_of::<T>()))
    }

    /// Reads component `T` of `entity`, reporting why it is unavailable.
    pub fn try_component<T: Component>(&self, entity: Entity) -> ECSResult<&T> {
        let location = self.locate(entity)?;
        self.world_ref(location.world)?
            .archetype_at(location.archetype)
            .column::<T>(component_key_of::<T>())
            .and_then(|column| column.get(location.row))
            .ok_or(ECSError::MissingComponent { entity, component: type_name::<T>() })
    }

    /// Mutable variant of [`try_component`](Self::try_component).
    ///
    /// Writes through this reference do not fire on-set callbacks.
    pub fn try_component_mut<T: Component>(&mut self, entity: Entity) -> ECSResult<&mut T> {
        let location = self.locate(entity)?;
        self.world_mut(location.world)?
            .archetype_at_mut(location.archetype)
            .column_mut::<T>(component_key_of::<T>())
            .and_then(|column| column.get_mut(location.row))
            .ok_or(ECSError::MissingComponent { entity, component: type_name::<T>() })
    }

    /// Reads component `T` of `entity`.
    pub fn try_get_component<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.try_component(entity).ok()
    }

    /// Reads component `T` of `entity` mutably, without firing callbacks.
    pub fn try_get_component_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.try_component_mut(entity).ok()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Archetypes
    // ─────────────────────────────────────────────────────────────────────

    fn archetype_data(&self, archetype: Archetype) -> Option<&ArchetypeData> {
        self.world_ref(archetype.world()).ok()?.archetype(archetype)
    }

    /// Returns `true` while `archetype` refers to a live archetype.
    pub fn is_archetype_valid(&self, archetype: Archetype) -> bool {
        self.archetype_data(archetype).is_some()
    }

    /// Number of placed entities in `archetype`.
    pub fn archetype_entity_count(&self, archetype: Archetype) -> usize {
        self.archetype_data(archetype).map_or(0, ArchetypeData::len)
    }

    /// Rows allocated in `archetype`'s backing arrays.
    pub fn archetype_capacity(&self, archetype: Archetype) -> usize {
        self.archetype_data(archetype).map_or(0, ArchetypeData::capacity)
    }

    /// Component signature of `archetype`.
    pub fn archetype_signature(&self, archetype: Archetype) -> Option<&Signature> {
        self.archetype_data(archetype).map(ArchetypeData::signature)
    }

    /// Dense entity array of `archetype`; row `i` matches row `i` of every
    /// component buffer.
    pub fn entity_buffer(&self, archetype: Archetype) -> Option<&[Entity]> {
        self.archetype_data(archetype).map(ArchetypeData::entities)
    }

    /// Dense `T` values of `archetype`.
    pub fn component_buffer<T: Component>(&self, archetype: Archetype) -> Option<&[T]> {
        self.archetype_data(archetype)?.column::<T>(component_key_of::<T>())
    }

    /// Dense `T` values of `archetype`, mutably. Writes do not fire callbacks.
    pub fn component_buffer_mut<T: Component>(&mut self, archetype: Archetype) -> Option<&mut [T]> {
        self.world_mut(archetype.world())
            .ok()?
            .archetype_mut(archetype)?
            .column_mut::<T>(component_key_of::<T>())
    }

    /// Destroys `archetype` and every entity in it.
    ///
    /// Entities are invalidated without per-entity removal; on-remove
    /// callbacks then run in bulk, once per component type.
    pub fn destroy_archetype(&mut self, archetype: Archetype) -> bool {
        if !self.is_archetype_valid(archetype) {
            return false;
        }
        let world = archetype.world();
        if self.is_world_deferring(world) {
            self.enqueue(world, StructuralEvent::DestroyArchetype { archetype, only_if_empty: false });
            return true;
        }
        self.destroy_archetype_now(archetype, false)
    }

    fn destroy_archetype_now(&mut self, archetype: Archetype, only_if_empty: bool) -> bool {
        let Ok(data) = self.world_mut(archetype.world()) else { return false };
        let Some(existing) = data.archetype(archetype) else { return false };
        if only_if_empty && !existing.is_empty() {
            return false;
        }

        let hooks = Rc::clone(&data.hooks);
        let Some(mut removed) = data.remove_archetype(archetype) else { return false };
        let (entities, columns) = {
            let table = hooks.borrow();
            removed.drain(|key| table.has_remove(key))
        };
        for &entity in &entities {
            self.entities.free(entity);
        }
        for (notifier, values) in columns {
            (notifier.all)(&hooks, self, &entities, values);
        }
        true
    }

    /// Shrinks `archetype`'s arrays to the smallest power of two holding its
    /// entities, never below the configured floor.
    pub fn resize_archetype(&mut self, archetype: Archetype) -> bool {
        if !self.is_archetype_valid(archetype) {
            return false;
        }
        let world = archetype.world();
        if self.is_world_deferring(world) {
            self.enqueue(world, StructuralEvent::ResizeBackingArrays { archetype });
            return true;
        }
        self.resize_archetype_now(archetype)
    }

    fn resize_archetype_now(&mut self, archetype: Archetype) -> bool {
        let Ok(data) = self.world_mut(archetype.world()) else { return false };
        let floor = data.buffer_floor();
        match data.archetype_mut(archetype) {
            Some(existing) => {
                existing.resize_backing_arrays(floor);
                true
            }
            None => false,
        }
    }
}

fn replay_set<T: Component>(ecs: &mut ECSManager, entity: Entity, value: Box<dyn Any>) {
    match value.downcast::<T>() {
        Ok(value) => {
            ecs.set_component(entity, *value);
        }
        Err(_) => corruption(format!("deferred value is not a {}", type_name::<T>())),
    }
}

fn replay_remove<T: Component>(ecs: &mut ECSManager, entity: Entity) {
    ecs.remove_component::<T>(entity);
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_world_slot_is_retired() {
        let mut ecs = ECSManager::new();
        let first = ecs.create_world("a");
        ecs.worlds[first.index() as usize].version = Version::MAX;
        let last = World::new(first.index(), Version::MAX);
        assert!(ecs.is_world_valid(last));

        assert!(ecs.destroy_world(last));
        assert!(!ecs.is_world_valid(last));
        assert_eq!(ecs.world_count(), 0);
        let next = ecs.create_world("b");
        assert_ne!(next.index(), first.index());
    }
}
