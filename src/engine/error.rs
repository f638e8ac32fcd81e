//! Error types for handle resolution and component access.
//!
//! The store distinguishes three classes of failure:
//!
//! * **Stale handles** ([`ECSError::StaleEntity`], [`ECSError::StaleWorld`],
//!   [`ECSError::StaleArchetype`]). Handles routinely outlive their referents,
//!   so every caller-facing operation treats these as a silent no-op. The
//!   `try_*` accessors surface them for callers that want to know why.
//! * **Missing data** ([`ECSError::MissingComponent`],
//!   [`ECSError::MissingWorldData`]). Recoverable and reported through
//!   `Option`/`bool` results on the silent API.
//! * **Invariant violations**. These indicate a bug in the store itself and
//!   are never returned: [`corruption`] aborts the operation with a panic.
//!
//! ## Typical flow
//! Internal resolution helpers return [`ECSResult`] and use `?` to bubble
//! failures. The public silent API collapses them with `.ok()`:
//!
//! ```ignore
//! pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
//!     self.try_component::<T>(entity).is_ok()
//! }
//! ```

use thiserror::Error;

use crate::engine::types::{Archetype, Entity, World};


/// Errors produced while resolving handles or reading stored data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ECSError {
    /// The entity was destroyed, or its slot has been recycled.
    #[error("stale or dead entity reference ({0})")]
    StaleEntity(Entity),

    /// The entity handle is valid but its creation is still queued.
    #[error("entity {0} is reserved but not yet placed in an archetype")]
    PendingEntity(Entity),

    /// The world was destroyed, or the handle never referred to a world.
    #[error("stale or destroyed world reference ({0})")]
    StaleWorld(World),

    /// The archetype was destroyed, or its slot has been recycled.
    #[error("stale or destroyed archetype reference ({0})")]
    StaleArchetype(Archetype),

    /// The entity's archetype does not store the requested component type.
    #[error("entity {entity} has no component of type {component}")]
    MissingComponent {
        /// Entity that was queried.
        entity: Entity,
        /// Type name of the requested component.
        component: &'static str,
    },

    /// No singleton value of the requested type is assigned to the world.
    #[error("world {world} has no data of type {data}")]
    MissingWorldData {
        /// World that was queried.
        world: World,
        /// Type name of the requested world data.
        data: &'static str,
    },

    /// Internal consistency failure; never returned to callers, see [`corruption`].
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

/// Result alias used by fallible store operations.
pub type ECSResult<T> = Result<T, ECSError>;

/// Aborts the current operation after an internal invariant was broken.
///
/// ## Panics
/// Always. Reaching this function means the store's own bookkeeping is
/// inconsistent, which is a bug in the store rather than caller misuse.

#[cold]
#[track_caller]
pub(crate) fn corruption(message: impl Into<String>) -> ! {
    let error = ECSError::InvariantViolation(message.into());
    log::error!("{error}");
    panic!("ECS corruption detected: {error}");
}
