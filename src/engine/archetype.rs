//! # Archetype storage
//!
//! An archetype owns every entity of one world that has exactly the component
//! types of its [`Signature`]. Its entities and component values are stored as
//! parallel dense arrays: row `i` of the entity array and of every component
//! column belong to the same entity.
//!
//! ## Bucket table
//!
//! Component columns are kept in a fixed-size open-addressed table sized to
//! the signature's arity (at least one bucket), keyed by [`TypeKey`]:
//!
//! ```text
//! home(key) = key % bucket_count
//!
//! pass 1: every key whose home bucket is free claims it
//! pass 2: each remaining key takes the first free bucket and is linked
//!         from the tail of the chain starting at its home bucket
//! ```
//!
//! Overflow buckets are never the home of any key in the signature (every
//! key left for pass 2 found its home occupied), so chains are disjoint and a
//! lookup walks at most the keys that share its home bucket.
//!
//! ## Invariants
//! - `entity_count <= capacity()`; every column has exactly `capacity()` rows.
//! - Rows `0..entity_count` are occupied, with no holes; rows beyond hold
//!   default values.
//! - Bucket count equals `max(1, signature.len())`.

use std::any::Any;

use crate::engine::component::{make_buffer, Component};
use crate::engine::error::corruption;
use crate::engine::hooks::RemovalNotifier;
use crate::engine::storage::{Attribute, ComponentBuffer};
use crate::engine::types::{Archetype, Entity, Signature, TypeKey};


struct Bucket {
    key: TypeKey,
    next: Option<usize>,
    buffer: Option<Box<dyn ComponentBuffer>>,
}

impl Bucket {
    const EMPTY: Bucket = Bucket { key: 0, next: None, buffer: None };

    #[inline] fn is_free(&self) -> bool { self.key == 0 }
}

/// Result of moving one row from an archetype into another.
pub(crate) struct MigratedRow {
    /// Row the entity now occupies in the target archetype.
    pub target_row: usize,
    /// Entity swapped into the vacated source row, if any.
    pub displaced: Option<Entity>,
    /// Values of types the target archetype does not store.
    pub dropped: Vec<(TypeKey, Box<dyn Any>)>,
}

/// Values removed together with a row, ready for on-remove dispatch.
pub(crate) type RemovedValues = Vec<(RemovalNotifier, Box<dyn Any>)>;

/// Dense storage for all entities sharing one signature.
pub struct ArchetypeData {
    handle: Archetype,
    signature: Signature,
    entities: Vec<Entity>,
    entity_count: usize,
    buckets: Box<[Bucket]>,
}

impl ArchetypeData {
    /// Builds an empty archetype whose arrays hold `capacity` rows.
    pub(crate) fn new(handle: Archetype, signature: Signature, capacity: usize) -> Self {
        Self::with_factory(handle, signature, capacity, make_buffer)
    }

    pub(crate) fn with_factory(
        handle: Archetype,
        signature: Signature,
        capacity: usize,
        factory: impl Fn(TypeKey) -> Box<dyn ComponentBuffer>,
    ) -> Self {
        let size = signature.len().max(1);
        let mut buckets: Vec<Bucket> = (0..size).map(|_| Bucket::EMPTY).collect();

        let make = |key: TypeKey| {
            let mut buffer = factory(key);
            buffer.resize(capacity);
            Some(buffer)
        };

        let mut collisions = Vec::new();
        for key in signature.iter() {
            let home = key as usize % size;
            if buckets[home].is_free() {
                buckets[home].key = key;
                buckets[home].buffer = make(key);
            } else {
                collisions.push(key);
            }
        }

        for key in collisions {
            let mut tail = key as usize % size;
            loop {
                if buckets[tail].key == key {
                    corruption(format!("type key {key} placed twice in {handle}"));
                }
                match buckets[tail].next {
                    Some(next) => tail = next,
                    None => break,
                }
            }
            let Some(free) = buckets.iter().position(Bucket::is_free) else {
                corruption(format!("bucket table of {handle} cannot place type key {key}"));
            };
            buckets[tail].next = Some(free);
            buckets[free].key = key;
            buckets[free].buffer = make(key);
        }

        Self {
            handle,
            signature,
            entities: vec![Entity::default(); capacity],
            entity_count: 0,
            buckets: buckets.into_boxed_slice(),
        }
    }

    #[inline] pub fn handle(&self) -> Archetype { self.handle }
    #[inline] pub fn signature(&self) -> &Signature { &self.signature }
    #[inline] pub fn len(&self) -> usize { self.entity_count }
    #[inline] pub fn is_empty(&self) -> bool { self.entity_count == 0 }
    #[inline] pub fn capacity(&self) -> usize { self.entities.len() }

    /// Occupied prefix of the entity array.
    #[inline]
    pub fn entities(&self) -> &[Entity] {
        &self.entities[..self.entity_count]
    }

    fn bucket_index(&self, key: TypeKey) -> Option<usize> {
        if key == 0 {
            return None;
        }
        let mut index = key as usize % self.buckets.len();
        loop {
            let bucket = &self.buckets[index];
            if bucket.key == key {
                return Some(index);
            }
            index = bucket.next?;
        }
    }

    #[inline]
    pub fn has(&self, key: TypeKey) -> bool {
        self.bucket_index(key).is_some()
    }

    pub fn buffer(&self, key: TypeKey) -> Option<&dyn ComponentBuffer> {
        let index = self.bucket_index(key)?;
        self.buckets[index].buffer.as_deref()
    }

    pub fn buffer_mut(&mut self, key: TypeKey) -> Option<&mut dyn ComponentBuffer> {
        let index = self.bucket_index(key)?;
        self.buckets[index].buffer.as_deref_mut()
    }

    /// Occupied rows of the `T` column.
    pub fn column<T: Component>(&self, key: TypeKey) -> Option<&[T]> {
        let count = self.entity_count;
        self.buffer(key)?
            .as_any()
            .downcast_ref::<Attribute<T>>()
            .map(|attribute| &attribute.as_slice()[..count])
    }

    /// Occupied rows of the `T` column, mutably.
    pub fn column_mut<T: Component>(&mut self, key: TypeKey) -> Option<&mut [T]> {
        let count = self.entity_count;
        self.buffer_mut(key)?
            .as_any_mut()
            .downcast_mut::<Attribute<T>>()
            .map(|attribute| &mut attribute.as_mut_slice()[..count])
    }

    fn buffers_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn ComponentBuffer>> {
        self.buckets.iter_mut().filter_map(|bucket| bucket.buffer.as_mut())
    }

    /// Type names of the stored components, in bucket order.
    pub fn component_type_names(&self) -> Vec<&'static str> {
        self.buckets
            .iter()
            .filter_map(|bucket| bucket.buffer.as_ref().map(|buffer| buffer.element_type_name()))
            .collect()
    }

    fn ensure_capacity(&mut self, required: usize) {
        if required < self.entities.len() {
            return;
        }
        let capacity = (required + 1).next_power_of_two();
        self.entities.resize(capacity, Entity::default());
        for buffer in self.buffers_mut() {
            buffer.resize(capacity);
        }
    }

    /// Appends `entity` with default component values and returns its row.
    pub(crate) fn push_entity(&mut self, entity: Entity) -> usize {
        let row = self.entity_count;
        self.ensure_capacity(row);
        self.entities[row] = entity;
        self.entity_count += 1;
        row
    }

    fn vacate_entity(&mut self, row: usize) -> Option<Entity> {
        let last = self.entity_count - 1;
        self.entities[row] = self.entities[last];
        self.entities[last] = Entity::default();
        self.entity_count = last;
        (row != last).then_some(self.entities[row])
    }

    fn check_row(&self, row: usize) {
        if row >= self.entity_count {
            corruption(format!(
                "row {row} is outside the {} occupied rows of {}",
                self.entity_count, self.handle
            ));
        }
    }

    /// Moves the entity at `row` into `target`, carrying every component the
    /// target stores and returning the rest.
    pub(crate) fn migrate_row(&mut self, row: usize, target: &mut ArchetypeData) -> MigratedRow {
        self.check_row(row);
        let last = self.entity_count - 1;
        let target_row = target.push_entity(self.entities[row]);

        let mut dropped = Vec::new();
        for bucket in self.buckets.iter_mut() {
            let Some(buffer) = bucket.buffer.as_mut() else { continue };
            match target.buffer_mut(bucket.key) {
                Some(destination) => buffer.move_to(row, last, destination, target_row),
                None => dropped.push((bucket.key, buffer.remove_swap(row, last))),
            }
        }

        let displaced = self.vacate_entity(row);
        MigratedRow { target_row, displaced, dropped }
    }

    /// Removes the entity at `row`, keeping the values `keep` selects.
    ///
    /// Returns the entity swapped into `row`, if any, and the kept values.
    pub(crate) fn remove_row(
        &mut self,
        row: usize,
        keep: impl Fn(TypeKey) -> bool,
    ) -> (Option<Entity>, RemovedValues) {
        self.check_row(row);
        let last = self.entity_count - 1;

        let mut removed = Vec::new();
        for buffer in self.buffers_mut() {
            let value = buffer.remove_swap(row, last);
            if keep(buffer.type_key()) {
                removed.push((buffer.removal_notifier(), value));
            }
        }

        (self.vacate_entity(row), removed)
    }

    /// Empties the archetype, returning its entities and the columns `keep`
    /// selects.
    pub(crate) fn drain(&mut self, keep: impl Fn(TypeKey) -> bool) -> (Vec<Entity>, RemovedValues) {
        let count = self.entity_count;
        let entities: Vec<Entity> = self.entities[..count].to_vec();

        let mut columns = Vec::new();
        for buffer in self.buffers_mut() {
            if keep(buffer.type_key()) {
                columns.push((buffer.removal_notifier(), buffer.take_rows(count)));
            }
        }

        self.entities[..count].fill(Entity::default());
        self.entity_count = 0;
        (entities, columns)
    }

    /// Shrinks (or grows) every array to the smallest power of two that holds
    /// the occupied rows, never below `floor`.
    pub(crate) fn resize_backing_arrays(&mut self, floor: usize) {
        let capacity = self.entity_count.next_power_of_two().max(floor);
        if capacity == self.entities.len() {
            return;
        }
        log::trace!("resizing {} from {} to {capacity} rows", self.handle, self.entities.len());
        self.entities.resize(capacity, Entity::default());
        self.entities.shrink_to_fit();
        for buffer in self.buffers_mut() {
            buffer.resize(capacity);
        }
    }
}
