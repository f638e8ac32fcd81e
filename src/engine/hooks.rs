//! Per-world component callbacks.
//!
//! Each world keeps, per component type, an ordered list of "on-set" and
//! "on-remove" subscribers. Subscribers run synchronously in registration
//! order and receive `&mut ECSManager`, so they may perform further
//! structural operations (queued if the world is deferring).
//!
//! ## Re-entrancy
//! The table lives behind `Rc<RefCell<..>>`. Before invoking anything the
//! subscriber list is snapshotted and the borrow released, so callbacks can
//! register or unregister hooks, or trigger nested callbacks, freely.
//!
//! ## Type erasure
//! Structural code that drops values of unknown type (destroying an entity,
//! archetype or world) dispatches through a [`RemovalNotifier`], a pair of
//! monomorphised function pointers obtained from the component buffer.

use std::{
    any::{type_name, Any},
    cell::RefCell,
    collections::HashMap,
    rc::Rc,
};

use crate::engine::component::{component_key_of, Component};
use crate::engine::error::corruption;
use crate::engine::manager::ECSManager;
use crate::engine::types::{Entity, TypeKey};


/// Handle identifying a registered callback, used to unregister it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HookId(u64);

/// Callback fired after a component value is written: `(ecs, entity, old, new)`.
pub type SetHook<T> = Rc<dyn Fn(&mut ECSManager, Entity, &T, &T)>;

/// Callback fired after a component value is removed: `(ecs, entity, removed)`.
pub type RemoveHook<T> = Rc<dyn Fn(&mut ECSManager, Entity, &T)>;

struct TypeHooks<T> {
    on_set: Vec<(HookId, SetHook<T>)>,
    on_remove: Vec<(HookId, RemoveHook<T>)>,
}

impl<T> Default for TypeHooks<T> {
    fn default() -> Self {
        Self { on_set: Vec::new(), on_remove: Vec::new() }
    }
}

trait ErasedHooks: Any {
    fn unregister(&mut self, id: HookId) -> bool;
    fn has_set(&self) -> bool;
    fn has_remove(&self) -> bool;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> ErasedHooks for TypeHooks<T> {
    fn unregister(&mut self, id: HookId) -> bool {
        let before = self.on_set.len() + self.on_remove.len();
        self.on_set.retain(|(hook, _)| *hook != id);
        self.on_remove.retain(|(hook, _)| *hook != id);
        before != self.on_set.len() + self.on_remove.len()
    }

    fn has_set(&self) -> bool { !self.on_set.is_empty() }
    fn has_remove(&self) -> bool { !self.on_remove.is_empty() }
    fn as_any(&self) -> &dyn Any { self }
    fn as_any_mut(&mut self) -> &mut dyn Any { self }
}

/// Callback subscribers of one world, keyed by component type.
#[derive(Default)]
pub struct HookTable {
    next_id: u64,
    by_key: HashMap<TypeKey, Box<dyn ErasedHooks>>,
}

/// Shared handle to a world's hook table.
pub(crate) type SharedHooks = Rc<RefCell<HookTable>>;

impl HookTable {
    fn typed_mut<T: Component>(&mut self) -> &mut TypeHooks<T> {
        let entry = self
            .by_key
            .entry(component_key_of::<T>())
            .or_insert_with(|| Box::new(TypeHooks::<T>::default()) as Box<dyn ErasedHooks>);
        match entry.as_any_mut().downcast_mut::<TypeHooks<T>>() {
            Some(hooks) => hooks,
            None => corruption(format!("hook table entry mismatch for {}", type_name::<T>())),
        }
    }

    fn typed<T: Component>(&self) -> Option<&TypeHooks<T>> {
        self.by_key
            .get(&component_key_of::<T>())
            .and_then(|entry| entry.as_any().downcast_ref::<TypeHooks<T>>())
    }

    fn issue_id(&mut self) -> HookId {
        self.next_id += 1;
        HookId(self.next_id)
    }

    pub(crate) fn add_set<T: Component>(&mut self, hook: SetHook<T>) -> HookId {
        let id = self.issue_id();
        self.typed_mut::<T>().on_set.push((id, hook));
        id
    }

    pub(crate) fn add_remove<T: Component>(&mut self, hook: RemoveHook<T>) -> HookId {
        let id = self.issue_id();
        self.typed_mut::<T>().on_remove.push((id, hook));
        id
    }

    pub(crate) fn unregister(&mut self, id: HookId) -> bool {
        self.by_key.values_mut().any(|hooks| hooks.unregister(id))
    }

    /// Returns `true` if any on-set subscriber exists for `key`.
    pub fn has_set(&self, key: TypeKey) -> bool {
        self.by_key.get(&key).is_some_and(|hooks| hooks.has_set())
    }

    /// Returns `true` if any on-remove subscriber exists for `key`.
    pub fn has_remove(&self, key: TypeKey) -> bool {
        self.by_key.get(&key).is_some_and(|hooks| hooks.has_remove())
    }

    fn set_subscribers<T: Component>(&self) -> Vec<SetHook<T>> {
        self.typed::<T>()
            .map(|hooks| hooks.on_set.iter().map(|(_, hook)| Rc::clone(hook)).collect())
            .unwrap_or_default()
    }

    fn remove_subscribers<T: Component>(&self) -> Vec<RemoveHook<T>> {
        self.typed::<T>()
            .map(|hooks| hooks.on_remove.iter().map(|(_, hook)| Rc::clone(hook)).collect())
            .unwrap_or_default()
    }
}

pub(crate) fn fire_set<T: Component>(
    hooks: &SharedHooks,
    ecs: &mut ECSManager,
    entity: Entity,
    old: &T,
    new: &T,
) {
    let subscribers = hooks.borrow().set_subscribers::<T>();
    for hook in subscribers {
        hook(ecs, entity, old, new);
    }
}

pub(crate) fn fire_remove<T: Component>(
    hooks: &SharedHooks,
    ecs: &mut ECSManager,
    entity: Entity,
    removed: &T,
) {
    let subscribers = hooks.borrow().remove_subscribers::<T>();
    for hook in subscribers {
        hook(ecs, entity, removed);
    }
}

/// Monomorphised on-remove dispatch for values held as `Box<dyn Any>`.
#[derive(Clone, Copy)]
pub struct RemovalNotifier {
    pub(crate) one: fn(&SharedHooks, &mut ECSManager, Entity, Box<dyn Any>),
    pub(crate) all: fn(&SharedHooks, &mut ECSManager, &[Entity], Box<dyn Any>),
}

fn notify_one<T: Component>(hooks: &SharedHooks, ecs: &mut ECSManager, entity: Entity, value: Box<dyn Any>) {
    match value.downcast::<T>() {
        Ok(value) => fire_remove(hooks, ecs, entity, &*value),
        Err(_) => corruption(format!("removed value is not a {}", type_name::<T>())),
    }
}

fn notify_all<T: Component>(hooks: &SharedHooks, ecs: &mut ECSManager, entities: &[Entity], values: Box<dyn Any>) {
    let values = match values.downcast::<Vec<T>>() {
        Ok(values) => values,
        Err(_) => corruption(format!("removed rows are not {}", type_name::<T>())),
    };
    let subscribers = hooks.borrow().remove_subscribers::<T>();
    for (entity, value) in entities.iter().zip(values.iter()) {
        for hook in &subscribers {
            hook(ecs, *entity, value);
        }
    }
}

pub(crate) fn removal_notifier<T: Component>() -> RemovalNotifier {
    RemovalNotifier { one: notify_one::<T>, all: notify_all::<T> }
}
