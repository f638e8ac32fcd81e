//! # Syren Store
//!
//! Archetype-based entity/component store with generation-checked handles
//! and deferred structural mutation.
//!
//! ## Design Goals
//! - Archetype-based storage for cache efficiency
//! - `O(1)` component add/remove through swap-remove migration
//! - Stale handles fail safely instead of aliasing recycled slots
//! - Structural changes can be deferred while data is being iterated
//!
//! ## Example
//! ```rust
//! use syren_store::prelude::*;
//!
//! #[derive(Clone, Default, Debug, PartialEq)]
//! struct Position(f32, f32);
//!
//! let mut ecs = ECSManager::new();
//! let world = ecs.create_world("main");
//! let entity = ecs.create_entity(world).unwrap();
//!
//! ecs.set_component(entity, Position(1.0, 2.0));
//! assert_eq!(ecs.try_get_component::<Position>(entity), Some(&Position(1.0, 2.0)));
//!
//! ecs.destroy_entity(entity);
//! assert!(!ecs.is_alive(entity));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod engine;

// ─────────────────────────────────────────────────────────────────────────────
// Re-exports (Public API)
// ─────────────────────────────────────────────────────────────────────────────

pub use engine::manager::ECSManager;

pub use engine::types::{
    Archetype,
    ECSConfig,
    Entity,
    Signature,
    TypeKey,
    World,
};

pub use engine::component::{
    Component,
    TypeDesc,
    component_key_of,
    registered_key_of,
    registered_types,
    type_desc,
    type_key_of,
    type_name_of,
};

pub use engine::storage::{Attribute, ComponentBuffer};

pub use engine::hooks::HookId;

pub use engine::events::EventKind;

pub use engine::query::{Query, QueryBuilder};

pub use engine::error::{
    ECSResult,
    ECSError,
};

// ─────────────────────────────────────────────────────────────────────────────
// Prelude
// ─────────────────────────────────────────────────────────────────────────────

/// Commonly used store types.
///
/// Import with:
/// ```rust
/// use syren_store::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Archetype,
        Component,
        ECSManager,
        Entity,
        HookId,
        Query,
        QueryBuilder,
        Signature,
        World,
    };
}
