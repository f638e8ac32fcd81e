//! # Type Registry
//!
//! This module provides the process-wide registry that assigns stable
//! [`TypeKey`] values to Rust types and exposes type-erased storage factories
//! for archetype buffer allocation.
//!
//! ## Purpose
//! Archetypes are identified by sets of type keys and must be able to build
//! their component buffers from a key alone. The registry therefore stores,
//! per key, the type's metadata and (for component types) a factory producing
//! an empty [`ComponentBuffer`].
//!
//! ## Design
//! - Keys are assigned sequentially starting at `1` on first use and are never
//!   reused or removed.
//! - The reverse table (`key -> TypeDesc`) grows by doubling.
//! - Any `'static` type can receive a key (world data uses this); a storage
//!   factory is installed the first time the type is used as a component.
//!
//! ## Concurrency
//! The registry is protected by an `RwLock` so that type identity stays
//! comparable across every manager and world in the process. Lookups of
//! already-registered types only take the read lock.

use std::{
    any::{type_name, TypeId},
    collections::HashMap,
    fmt,
    mem::{align_of, size_of},
    sync::{OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::engine::error::corruption;
use crate::engine::storage::{Attribute, ComponentBuffer};
use crate::engine::types::{TypeKey, INITIAL_TYPE_SLOTS};


/// Values that can be stored as components.
///
/// Buffers are default-initialised when they grow and vacated rows are reset
/// to `Default`, and on-set callbacks observe a clone of the stored value.

pub trait Component: 'static + Default + Clone {}

impl<T: 'static + Default + Clone> Component for T {}

/// Factory function for constructing an empty type-erased component buffer.
pub(crate) type FactoryFn = fn(TypeKey) -> Box<dyn ComponentBuffer>;

fn new_component_buffer<T: Component>(key: TypeKey) -> Box<dyn ComponentBuffer> {
    Box::new(Attribute::<T>::new(key))
}

/// Describes a registered type.
///
/// ## Fields
/// - `key`: The runtime identifier assigned by the registry.
/// - `name`: The Rust type name (`type_name::<T>()`).
/// - `type_id`: The runtime `TypeId`.
/// - `size` / `align`: Layout of the type in bytes.

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeDesc {
    /// Runtime key assigned to this type.
    pub key: TypeKey,

    /// Rust type name for diagnostics.
    pub name: &'static str,

    /// Runtime `TypeId` of the type.
    pub type_id: TypeId,

    /// Size of the type in bytes.
    pub size: usize,

    /// Alignment of the type in bytes.
    pub align: usize,
}

impl TypeDesc {
    fn of<T: 'static>(key: TypeKey) -> Self {
        Self {
            key,
            name: type_name::<T>(),
            type_id: TypeId::of::<T>(),
            size: size_of::<T>(),
            align: align_of::<T>(),
        }
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TypeDesc {{ key: {}, name: {}, size: {}, align: {} }}",
            self.key, self.name, self.size, self.align
        )
    }
}

struct Entry {
    desc: TypeDesc,
    factory: Option<FactoryFn>,
}

/// Global mapping between Rust types and compact [`TypeKey`] values.
///
/// ## Invariants
/// - Every entry in `by_type` has a matching `by_key[key]`.
/// - `by_key[0]` is always `None`.
/// - `by_key.len()` is a power of two no smaller than `INITIAL_TYPE_SLOTS`.

pub struct TypeRegistry {
    by_type: HashMap<TypeId, TypeKey>,
    by_key: Vec<Option<Entry>>,
}

static REGISTRY: OnceLock<RwLock<TypeRegistry>> = OnceLock::new();

fn registry() -> &'static RwLock<TypeRegistry> {
    REGISTRY.get_or_init(|| {
        RwLock::new(TypeRegistry {
            by_type: HashMap::new(),
            by_key: (0..INITIAL_TYPE_SLOTS).map(|_| None).collect(),
        })
    })
}

// The registry never holds user code while locked, so a poisoned lock still
// guards consistent data.
fn read_registry() -> RwLockReadGuard<'static, TypeRegistry> {
    registry().read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_registry() -> RwLockWriteGuard<'static, TypeRegistry> {
    registry().write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl TypeRegistry {

    /// Returns the key of `T`, allocating the next sequential key on first use.
    fn key_of<T: 'static>(&mut self) -> TypeKey {
        let type_id = TypeId::of::<T>();
        if let Some(&existing) = self.by_type.get(&type_id) {
            return existing;
        }

        let key = (self.by_type.len() + 1) as TypeKey;
        let slot = key as usize;
        if slot >= self.by_key.len() {
            let mut length = self.by_key.len();
            while length <= slot { length *= 2; }
            self.by_key.resize_with(length, || None);
        }

        self.by_type.insert(type_id, key);
        self.by_key[slot] = Some(Entry { desc: TypeDesc::of::<T>(key), factory: None });
        log::trace!("registered type {} as key {key}", type_name::<T>());
        key
    }

    fn install_factory<T: Component>(&mut self, key: TypeKey) {
        if let Some(entry) = self.by_key[key as usize].as_mut() {
            entry.factory.get_or_insert(new_component_buffer::<T>);
        }
    }

    fn has_factory(&self, key: TypeKey) -> bool {
        self.entry(key).is_some_and(|entry| entry.factory.is_some())
    }

    fn entry(&self, key: TypeKey) -> Option<&Entry> {
        self.by_key.get(key as usize).and_then(Option::as_ref)
    }
}

/// Returns the key for any `'static` type, registering it on first use.
pub fn type_key_of<T: 'static>() -> TypeKey {
    match registered_key_of::<T>() {
        Some(key) => key,
        None => write_registry().key_of::<T>(),
    }
}

/// Returns the key of `T` if it has been registered, without registering it.
pub fn registered_key_of<T: 'static>() -> Option<TypeKey> {
    read_registry().by_type.get(&TypeId::of::<T>()).copied()
}

/// Returns the key for component type `T` and makes sure archetypes can
/// allocate buffers for it.
pub fn component_key_of<T: Component>() -> TypeKey {
    {
        let registry = read_registry();
        if let Some(&key) = registry.by_type.get(&TypeId::of::<T>()) {
            if registry.has_factory(key) {
                return key;
            }
        }
    }

    let mut registry = write_registry();
    let key = registry.key_of::<T>();
    registry.install_factory::<T>(key);
    key
}

/// Returns the descriptor registered under `key`, if any.
pub fn type_desc(key: TypeKey) -> Option<TypeDesc> {
    read_registry().entry(key).map(|entry| entry.desc)
}

/// Returns the type name registered under `key`, if any.
pub fn type_name_of(key: TypeKey) -> Option<&'static str> {
    type_desc(key).map(|desc| desc.name)
}

/// Returns descriptors of every type registered so far, in key order.
pub fn registered_types() -> Vec<TypeDesc> {
    read_registry()
        .by_key
        .iter()
        .filter_map(|entry| entry.as_ref().map(|entry| entry.desc))
        .collect()
}

/// Returns `true` if `key` was registered through [`component_key_of`].
pub fn is_component_key(key: TypeKey) -> bool {
    read_registry().has_factory(key)
}

/// Creates an empty component buffer for `key`.
///
/// ## Panics
/// Panics if `key` was never used as a component type. Archetype signatures
/// are only built from component keys, so this indicates store corruption.

pub(crate) fn make_buffer(key: TypeKey) -> Box<dyn ComponentBuffer> {
    let factory = read_registry().entry(key).and_then(|entry| entry.factory);
    match factory {
        Some(factory) => factory(key),
        None => corruption(format!("no buffer factory registered for type key {key}")),
    }
}
