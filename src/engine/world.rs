//! Per-world state: archetype table, signature map, world data and callbacks.
//!
//! A [`WorldData`] is owned by the manager's world table. It holds no entity
//! slots itself; entities live in the manager-wide entity table and point back
//! into this world's archetypes by index.
//!
//! ## Archetype slots
//! Slot `0` of the archetype table starts at version `1`, like every other
//! slot, so `Archetype::default()` never resolves. Destroyed slots bump their
//! version and go onto a free stack; the next new signature reuses them. A
//! slot whose version would pass `u32::MAX` is retired instead and never
//! handed out again.
//!
//! ## Invariants
//! - `signature_map` holds exactly the signatures of occupied slots, so there
//!   is at most one live archetype per signature.
//! - `entity_count` equals the sum of the occupied archetypes' lengths.

use std::{any::Any, cell::RefCell, collections::HashMap, rc::Rc};

use crate::engine::archetype::ArchetypeData;
use crate::engine::error::corruption;
use crate::engine::events::StructuralEventQueue;
use crate::engine::hooks::{HookTable, SharedHooks};
use crate::engine::types::{Archetype, Signature, TypeKey, Version, World, INITIAL_ARCHETYPE_SLOTS};


struct ArchetypeSlot {
    version: Version,
    data: Option<ArchetypeData>,
}

impl Default for ArchetypeSlot {
    fn default() -> Self {
        Self { version: 1, data: None }
    }
}

/// All state owned by one world.
pub(crate) struct WorldData {
    pub handle: World,
    pub name: String,
    archetypes: Vec<ArchetypeSlot>,
    free_archetypes: Vec<u32>,
    next_archetype_slot: usize,
    signature_map: HashMap<Signature, u32>,
    pub entity_count: usize,
    structure_version: u64,
    pub resources: HashMap<TypeKey, Box<dyn Any>>,
    pub hooks: SharedHooks,
    pub events: StructuralEventQueue,
    buffer_floor: usize,
}

impl WorldData {
    pub fn new(handle: World, name: String, buffer_floor: usize) -> Self {
        Self {
            handle,
            name,
            archetypes: (0..INITIAL_ARCHETYPE_SLOTS).map(|_| ArchetypeSlot::default()).collect(),
            free_archetypes: Vec::new(),
            next_archetype_slot: 0,
            signature_map: HashMap::new(),
            entity_count: 0,
            structure_version: 0,
            resources: HashMap::new(),
            hooks: Rc::new(RefCell::new(HookTable::default())),
            events: StructuralEventQueue::default(),
            buffer_floor,
        }
    }

    #[inline] pub fn buffer_floor(&self) -> usize { self.buffer_floor }
    #[inline] pub fn structure_version(&self) -> u64 { self.structure_version }
    #[inline] pub fn archetype_count(&self) -> usize { self.signature_map.len() }

    /// Index of the live archetype for `signature`, creating it on a miss.
    pub fn archetype_index_for(&mut self, signature: &Signature) -> u32 {
        if let Some(&index) = self.signature_map.get(signature) {
            return index;
        }

        let index = match self.free_archetypes.pop() {
            Some(index) => index,
            None => {
                if self.next_archetype_slot == self.archetypes.len() {
                    let grown = self.archetypes.len() * 2;
                    self.archetypes.resize_with(grown, ArchetypeSlot::default);
                }
                self.next_archetype_slot += 1;
                (self.next_archetype_slot - 1) as u32
            }
        };

        let slot = &mut self.archetypes[index as usize];
        let handle = Archetype::new(self.handle, index, slot.version);
        slot.data = Some(ArchetypeData::new(handle, signature.clone(), self.buffer_floor));
        self.signature_map.insert(signature.clone(), index);
        self.structure_version += 1;
        log::debug!("created {handle} with {} component types", signature.len());
        index
    }

    /// Resolves an archetype handle of this world.
    pub fn archetype(&self, archetype: Archetype) -> Option<&ArchetypeData> {
        if archetype.world() != self.handle {
            return None;
        }
        let slot = self.archetypes.get(archetype.index() as usize)?;
        if slot.version != archetype.version() {
            return None;
        }
        slot.data.as_ref()
    }

    pub fn archetype_mut(&mut self, archetype: Archetype) -> Option<&mut ArchetypeData> {
        if archetype.world() != self.handle {
            return None;
        }
        let slot = self.archetypes.get_mut(archetype.index() as usize)?;
        if slot.version != archetype.version() {
            return None;
        }
        slot.data.as_mut()
    }

    /// Archetype stored at a raw slot index, as recorded by the entity table.
    pub fn archetype_at(&self, index: u32) -> &ArchetypeData {
        match self.archetypes.get(index as usize).and_then(|slot| slot.data.as_ref()) {
            Some(data) => data,
            None => corruption(format!("{} has no archetype in slot {index}", self.handle)),
        }
    }

    pub fn archetype_at_mut(&mut self, index: u32) -> &mut ArchetypeData {
        let handle = self.handle;
        match self.archetypes.get_mut(index as usize).and_then(|slot| slot.data.as_mut()) {
            Some(data) => data,
            None => corruption(format!("{handle} has no archetype in slot {index}")),
        }
    }

    /// Borrows two distinct archetype slots mutably.
    pub fn archetype_pair_mut(&mut self, a: u32, b: u32) -> (&mut ArchetypeData, &mut ArchetypeData) {
        let (a, b) = (a as usize, b as usize);
        if a == b {
            corruption(format!("archetype slot {a} borrowed twice in {}", self.handle));
        }
        let (first, second) = if a < b {
            let (left, right) = self.archetypes.split_at_mut(b);
            (&mut left[a], &mut right[0])
        } else {
            let (left, right) = self.archetypes.split_at_mut(a);
            (&mut right[0], &mut left[b])
        };
        match (first.data.as_mut(), second.data.as_mut()) {
            (Some(first), Some(second)) => (first, second),
            _ => corruption("archetype pair refers to an empty slot"),
        }
    }

    /// Occupied archetypes in slot order.
    pub fn archetypes(&self) -> impl Iterator<Item = &ArchetypeData> {
        self.archetypes.iter().filter_map(|slot| slot.data.as_ref())
    }

    /// Detaches an archetype and frees its slot for reuse.
    pub fn remove_archetype(&mut self, archetype: Archetype) -> Option<ArchetypeData> {
        self.archetype(archetype)?;
        let index = archetype.index();
        let slot = &mut self.archetypes[index as usize];
        let data = slot.data.take()?;
        match slot.version.checked_add(1) {
            Some(next) => {
                slot.version = next;
                self.free_archetypes.push(index);
            }
            None => log::debug!("retiring archetype slot {index} of {}: versions exhausted", self.handle),
        }
        self.signature_map.remove(data.signature());
        self.entity_count -= data.len();
        self.structure_version += 1;
        log::debug!("destroyed {archetype} holding {} entities", data.len());
        Some(data)
    }

    /// Detaches every archetype, leaving the world empty.
    pub fn take_archetypes(&mut self) -> Vec<ArchetypeData> {
        let handles: Vec<Archetype> = self.archetypes().map(ArchetypeData::handle).collect();
        handles
            .into_iter()
            .filter_map(|handle| self.remove_archetype(handle))
            .collect()
    }
}
