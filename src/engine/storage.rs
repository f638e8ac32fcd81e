//! Dense per-type component storage and its type-erased interface.
//!
//! This module implements [`Attribute<T>`], a contiguous, default-filled
//! column holding the values of one component type for every row of an
//! archetype, together with [`ComponentBuffer`], the object-safe interface an
//! archetype uses to drive its columns without knowing their element types.
//!
//! # Storage model
//!
//! An attribute stores its values in a single `Vec<T>` whose length *is* its
//! capacity. Every slot always holds a valid `T`; rows at or beyond the
//! archetype's entity count hold `T::default()`.
//!
//! ```text
//! row:      0    1    2    3    4 .. capacity-1
//! value:   v0   v1   v2   def  def ..  def
//!                       ^ entity_count - 1
//! ```
//!
//! The owning archetype tracks the entity count; attributes never do.
//!
//! # Core operations
//!
//! - **Ensure capacity**: grows to the next power of two strictly greater than
//!   the required row, default-filling new rows.
//! - **Remove swap**: takes the value at `row`, moves the value at `last` into
//!   its place and resets `last` to `T::default()`.
//! - **Move to**: writes the value at `row` into another attribute of the same
//!   type, then performs the swap-remove locally.
//!
//! Every archetype transition (add, remove, transfer between worlds) is
//! expressed with these primitives, so each transition costs `O(1)` per
//! component and never leaves gaps.

use std::{
    any::{type_name, Any},
    mem,
};

use crate::engine::component::Component;
use crate::engine::error::corruption;
use crate::engine::hooks::{removal_notifier, RemovalNotifier};
use crate::engine::types::TypeKey;


/// Object-safe interface over a dense component column.
///
/// ## Invariants
/// - `capacity()` rows are always initialised.
/// - `row` and `last` arguments are below `capacity()` and `row <= last`.

pub trait ComponentBuffer: Any {
    /// Registry key of the element type.
    fn type_key(&self) -> TypeKey;

    /// Rust type name of the element type.
    fn element_type_name(&self) -> &'static str;

    /// Number of initialised rows.
    fn capacity(&self) -> usize;

    /// Grows or shrinks to exactly `capacity` rows.
    fn resize(&mut self, capacity: usize);

    /// Makes row `required` addressable, growing to the next power of two.
    fn ensure_capacity(&mut self, required: usize) {
        if required >= self.capacity() {
            self.resize((required + 1).next_power_of_two());
        }
    }

    /// Removes the value at `row`, filling the hole with the value at `last`.
    ///
    /// Returns the removed value boxed as its concrete type `T`.
    fn remove_swap(&mut self, row: usize, last: usize) -> Box<dyn Any>;

    /// Moves the value at `row` into `target[target_row]`, then swap-removes
    /// `row` locally.
    ///
    /// ## Panics
    /// Panics if `target` stores a different element type.
    fn move_to(&mut self, row: usize, last: usize, target: &mut dyn ComponentBuffer, target_row: usize);

    /// Takes the first `count` values, leaving defaults behind.
    ///
    /// Returns a `Vec<T>` boxed as `dyn Any`.
    fn take_rows(&mut self, count: usize) -> Box<dyn Any>;

    /// Typed on-remove dispatch for the element type.
    fn removal_notifier(&self) -> RemovalNotifier;

    /// Returns `self` as `&dyn Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Returns `self` as `&mut dyn Any` for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Dense, default-filled column of `T` values.
#[derive(Debug, Clone)]
pub struct Attribute<T> {
    key: TypeKey,
    values: Vec<T>,
}

impl<T: Component> Attribute<T> {
    /// Creates an empty column tagged with registry key `key`.
    pub fn new(key: TypeKey) -> Self {
        Self { key, values: Vec::new() }
    }

    /// Creates a column of `capacity` default rows.
    pub fn with_capacity(key: TypeKey, capacity: usize) -> Self {
        let mut attribute = Self::new(key);
        attribute.values.resize_with(capacity, T::default);
        attribute
    }

    /// All rows, including the default-filled tail.
    #[inline] pub fn as_slice(&self) -> &[T] { &self.values }

    /// Mutable view of all rows.
    #[inline] pub fn as_mut_slice(&mut self) -> &mut [T] { &mut self.values }

    /// Returns the value at `row`.
    #[inline] pub fn get(&self, row: usize) -> Option<&T> { self.values.get(row) }

    /// Returns the value at `row` mutably.
    #[inline] pub fn get_mut(&mut self, row: usize) -> Option<&mut T> { self.values.get_mut(row) }

    /// Stores `value` at `row` and returns the previous value.
    pub fn replace(&mut self, row: usize, value: T) -> T {
        match self.values.get_mut(row) {
            Some(slot) => mem::replace(slot, value),
            None => corruption(format!(
                "row {row} out of bounds for {} column of capacity {}",
                type_name::<T>(),
                self.values.len()
            )),
        }
    }

    fn vacate(&mut self, row: usize, last: usize) -> T {
        let removed = mem::take(&mut self.values[row]);
        if row != last {
            self.values.swap(row, last);
        }
        removed
    }
}

impl<T: Component> ComponentBuffer for Attribute<T> {
    fn type_key(&self) -> TypeKey { self.key }
    fn element_type_name(&self) -> &'static str { type_name::<T>() }
    fn capacity(&self) -> usize { self.values.len() }

    fn resize(&mut self, capacity: usize) {
        if capacity < self.values.len() {
            self.values.truncate(capacity);
            self.values.shrink_to_fit();
        } else {
            self.values.resize_with(capacity, T::default);
        }
    }

    fn remove_swap(&mut self, row: usize, last: usize) -> Box<dyn Any> {
        Box::new(self.vacate(row, last))
    }

    fn move_to(&mut self, row: usize, last: usize, target: &mut dyn ComponentBuffer, target_row: usize) {
        let Some(target) = target.as_any_mut().downcast_mut::<Attribute<T>>() else {
            corruption(format!(
                "cannot move {} into a column of a different type",
                type_name::<T>()
            ));
        };
        let value = self.vacate(row, last);
        target.replace(target_row, value);
    }

    fn take_rows(&mut self, count: usize) -> Box<dyn Any> {
        let count = count.min(self.values.len());
        let taken: Vec<T> = self.values[..count].iter_mut().map(mem::take).collect();
        Box::new(taken)
    }

    fn removal_notifier(&self) -> RemovalNotifier { removal_notifier::<T>() }

    fn as_any(&self) -> &dyn Any { self }
    fn as_any_mut(&mut self) -> &mut dyn Any { self }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn filled(values: &[i32]) -> Attribute<i32> {
        let mut attribute = Attribute::<i32>::with_capacity(1, 8);
        for (row, value) in values.iter().enumerate() {
            attribute.replace(row, *value);
        }
        attribute
    }

    #[test]
    fn ensure_capacity_grows_to_power_of_two_above_required_row() {
        let mut attribute = Attribute::<i32>::with_capacity(1, 8);
        attribute.ensure_capacity(7);
        assert_eq!(attribute.capacity(), 8);
        attribute.ensure_capacity(8);
        assert_eq!(attribute.capacity(), 16);
        attribute.ensure_capacity(40);
        assert_eq!(attribute.capacity(), 64);
        assert!(attribute.as_slice()[8..].iter().all(|&value| value == 0));
    }

    #[test]
    fn remove_swap_fills_hole_with_last_row() {
        let mut attribute = filled(&[10, 20, 30, 40]);
        let removed = attribute.remove_swap(1, 3);
        assert_eq!(*removed.downcast::<i32>().unwrap(), 20);
        assert_eq!(&attribute.as_slice()[..4], &[10, 40, 30, 0]);
    }

    #[test]
    fn remove_swap_of_last_row_only_clears_it() {
        let mut attribute = filled(&[10, 20]);
        attribute.remove_swap(1, 1);
        assert_eq!(&attribute.as_slice()[..2], &[10, 0]);
    }

    #[test]
    fn move_to_copies_value_and_compacts_source() {
        let mut source = filled(&[1, 2, 3]);
        let mut target = Attribute::<i32>::with_capacity(1, 8);
        source.move_to(0, 2, &mut target, 5);
        assert_eq!(target.get(5), Some(&1));
        assert_eq!(&source.as_slice()[..3], &[3, 2, 0]);
    }

    #[test]
    #[should_panic(expected = "ECS corruption detected")]
    fn move_to_rejects_foreign_column() {
        let mut source = filled(&[1]);
        let mut target = Attribute::<u64>::with_capacity(2, 8);
        source.move_to(0, 0, &mut target, 0);
    }

    #[test]
    fn take_rows_leaves_defaults_behind() {
        let mut attribute = filled(&[4, 5, 6]);
        let taken = attribute.take_rows(2).downcast::<Vec<i32>>().unwrap();
        assert_eq!(*taken, vec![4, 5]);
        assert_eq!(&attribute.as_slice()[..3], &[0, 0, 6]);
    }

    #[test]
    fn resize_shrinks_and_keeps_prefix() {
        let mut attribute = filled(&[1, 2, 3]);
        attribute.ensure_capacity(100);
        attribute.resize(8);
        assert_eq!(attribute.capacity(), 8);
        assert_eq!(&attribute.as_slice()[..3], &[1, 2, 3]);
    }
}
