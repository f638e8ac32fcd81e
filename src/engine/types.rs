//! Core Store Types, Handles, and Signatures
//!
//! This module defines the **handles, identifiers, and signatures** shared by
//! every other part of the store: the entity table, archetypes, worlds, the
//! structural event queue, and queries.
//!
//! ## Design Philosophy
//!
//! The store is designed around:
//!
//! - **Dense storage** grouped by archetype
//! - **Generation-checked handles** instead of references
//! - **Stable numeric type keys** assigned at runtime
//!
//! ## Handle Representation
//!
//! Every long-lived object is referred to by a small `Copy` handle made of an
//! index into an arena table plus a generation (or version):
//!
//! ```text
//! Entity    = { index, generation }
//! World     = { index, version }
//! Archetype = { world, index, version }
//! ```
//!
//! A handle is valid only while the generation stored in its slot matches the
//! one carried by the handle. Destroying the object bumps the slot's counter,
//! so old handles fail safely instead of aliasing a recycled slot.
//!
//! Slot `0` of every table starts at generation `1`, which makes every
//! `Default` handle stale from the beginning. Counters never wrap: a slot
//! whose counter has reached `u32::MAX` is retired when its object is
//! destroyed, so no handle value is ever issued twice.
//!
//! ## Signatures
//!
//! A [`Signature`] is the sorted, de-duplicated set of [`TypeKey`] values of an
//! archetype. Two signatures compare equal iff they hold the same keys,
//! regardless of insertion order, which makes them usable as map keys.

use std::fmt;

use crate::engine::component::{component_key_of, Component};


/// Runtime identifier assigned to a Rust type by the type registry.
///
/// Keys start at `1`; `0` marks an empty bucket and is never assigned.
pub type TypeKey = u32;

/// Index of a slot in the entity table.
pub type EntityIndex = u32;

/// Per-slot reuse counter used to detect stale entity handles.
pub type Generation = u32;

/// Per-slot reuse counter used to detect stale world and archetype handles.
pub type Version = u32;

/// Initial and minimum capacity of every archetype backing array.
pub const MIN_BUFFER_CAPACITY: usize = 8;

/// Number of entity slots allocated by a fresh entity table.
pub const INITIAL_ENTITY_SLOTS: usize = 1024;

/// Number of world slots allocated by a fresh manager.
pub const INITIAL_WORLD_SLOTS: usize = 4;

/// Number of archetype slots allocated by a fresh world.
pub const INITIAL_ARCHETYPE_SLOTS: usize = 32;

/// Initial length of the type registry's reverse lookup table.
pub const INITIAL_TYPE_SLOTS: usize = 64;

/// Runtime sizing knobs for an `ECSManager`.
///
/// ## Fields
/// - `initial_entity_slots`: Entity table slots allocated up front.
/// - `min_buffer_capacity`: Initial capacity of archetype arrays and the floor
///   used when shrinking them. Rounded up to a power of two.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ECSConfig {
    /// Entity table slots allocated up front.
    pub initial_entity_slots: usize,
    /// Initial and minimum capacity of archetype backing arrays.
    pub min_buffer_capacity: usize,
}

impl Default for ECSConfig {
    fn default() -> Self {
        Self {
            initial_entity_slots: INITIAL_ENTITY_SLOTS,
            min_buffer_capacity: MIN_BUFFER_CAPACITY,
        }
    }
}

impl ECSConfig {
    /// Buffer floor rounded to a power of two, never below one row.
    #[inline]
    pub fn buffer_floor(&self) -> usize {
        self.min_buffer_capacity.max(1).next_power_of_two()
    }
}


/// Generation-checked handle to an entity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, PartialOrd, Ord)]
pub struct Entity {
    index: EntityIndex,
    generation: Generation,
}

impl Entity {
    #[inline]
    pub(crate) const fn new(index: EntityIndex, generation: Generation) -> Self {
        Self { index, generation }
    }

    /// Slot index of this entity in the entity table.
    #[inline] pub const fn index(self) -> EntityIndex { self.index }

    /// Generation the slot had when this handle was issued.
    #[inline] pub const fn generation(self) -> Generation { self.generation }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity {}.{}", self.index, self.generation)
    }
}

/// Versioned handle to a world.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct World {
    index: u32,
    version: Version,
}

impl World {
    #[inline]
    pub(crate) const fn new(index: u32, version: Version) -> Self {
        Self { index, version }
    }

    /// Slot index of this world in the manager's world table.
    #[inline] pub const fn index(self) -> u32 { self.index }

    /// Version the slot had when this handle was issued.
    #[inline] pub const fn version(self) -> Version { self.version }
}

impl fmt::Display for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "World {}.{}", self.index, self.version)
    }
}

/// Versioned handle to an archetype inside a specific world.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct Archetype {
    world: World,
    index: u32,
    version: Version,
}

impl Archetype {
    #[inline]
    pub(crate) const fn new(world: World, index: u32, version: Version) -> Self {
        Self { world, index, version }
    }

    /// World that owns this archetype.
    #[inline] pub const fn world(self) -> World { self.world }

    /// Slot index of this archetype in its world's archetype table.
    #[inline] pub const fn index(self) -> u32 { self.index }

    /// Version the slot had when this handle was issued.
    #[inline] pub const fn version(self) -> Version { self.version }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Archetype {}.{} of {}", self.index, self.version, self.world)
    }
}


/// Sorted set of type keys identifying an archetype.
///
/// ## Invariants
/// - `keys` is strictly increasing (sorted, no duplicates).
/// - `0` is never stored.

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Signature {
    keys: Vec<TypeKey>,
}

impl Signature {
    /// Creates the empty signature.
    #[inline]
    pub fn new() -> Self { Self::default() }

    /// Builds a signature from arbitrary keys; order and duplicates are ignored.
    pub fn from_keys<I: IntoIterator<Item = TypeKey>>(keys: I) -> Self {
        let mut keys: Vec<TypeKey> = keys.into_iter().filter(|&key| key != 0).collect();
        keys.sort_unstable();
        keys.dedup();
        Self { keys }
    }

    /// Signature holding the single component type `T`.
    pub fn of<T: Component>() -> Self {
        Self::new().with::<T>()
    }

    /// Returns this signature extended with component type `T`.
    pub fn with<T: Component>(mut self) -> Self {
        self.insert(component_key_of::<T>());
        self
    }

    /// Inserts `key`, returning `false` if it was already present.
    pub fn insert(&mut self, key: TypeKey) -> bool {
        if key == 0 { return false; }
        match self.keys.binary_search(&key) {
            Ok(_) => false,
            Err(position) => {
                self.keys.insert(position, key);
                true
            }
        }
    }

    /// Removes `key`, returning `false` if it was absent.
    pub fn remove(&mut self, key: TypeKey) -> bool {
        match self.keys.binary_search(&key) {
            Ok(position) => {
                self.keys.remove(position);
                true
            }
            Err(_) => false,
        }
    }

    /// Returns `true` if `key` is part of the signature.
    #[inline]
    pub fn contains(&self, key: TypeKey) -> bool {
        self.keys.binary_search(&key).is_ok()
    }

    /// Returns `true` if every key of `other` is part of this signature.
    pub fn contains_all(&self, other: &Signature) -> bool {
        other.keys.iter().all(|&key| self.contains(key))
    }

    /// Returns `true` if at least one key of `other` is part of this signature.
    pub fn contains_any(&self, other: &Signature) -> bool {
        other.keys.iter().any(|&key| self.contains(key))
    }

    /// Number of types in the signature.
    #[inline] pub fn len(&self) -> usize { self.keys.len() }

    /// Returns `true` for the empty signature.
    #[inline] pub fn is_empty(&self) -> bool { self.keys.is_empty() }

    /// Keys in ascending order.
    #[inline] pub fn as_slice(&self) -> &[TypeKey] { &self.keys }

    /// Iterates over keys in ascending order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = TypeKey> + '_ {
        self.keys.iter().copied()
    }
}

impl FromIterator<TypeKey> for Signature {
    fn from_iter<I: IntoIterator<Item = TypeKey>>(iter: I) -> Self {
        Self::from_keys(iter)
    }
}
