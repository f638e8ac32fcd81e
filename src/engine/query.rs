//! Archetype queries.
//!
//! A [`Query`] selects the archetypes of a world whose signature contains
//! every "with" type and none of the "without" types. Iteration over the
//! selected data is left to the caller, through the manager's read-only
//! buffer views (`entity_buffer`, `component_buffer`) or
//! [`ECSManager::for_each_entity`].
//!
//! ## Caching
//! A query remembers its last match per world together with the world's
//! archetype structure version, and only rescans when an archetype has been
//! created or destroyed since.
//!
//! ## Example
//! ```ignore
//! let moving = QueryBuilder::new()
//!     .with::<Position>()
//!     .with::<Velocity>()
//!     .without::<Frozen>()
//!     .build();
//!
//! ecs.for_each_entity(world, &moving, |ecs, entity| {
//!     ecs.remove_component::<Velocity>(entity);
//! });
//! ```

use std::cell::RefCell;

use crate::engine::component::{component_key_of, Component};
use crate::engine::manager::ECSManager;
use crate::engine::types::{Archetype, Entity, Signature, World};


/// Builder for [`Query`].
#[derive(Clone, Debug, Default)]
pub struct QueryBuilder {
    with: Signature,
    without: Signature,
}

impl QueryBuilder {
    /// Creates a builder matching every archetype.
    pub fn new() -> Self { Self::default() }

    /// Requires component `T`.
    pub fn with<T: Component>(mut self) -> Self {
        self.with.insert(component_key_of::<T>());
        self
    }

    /// Excludes archetypes that store component `T`.
    pub fn without<T: Component>(mut self) -> Self {
        self.without.insert(component_key_of::<T>());
        self
    }

    /// Finishes the query.
    pub fn build(self) -> Query {
        Query { with: self.with, without: self.without, cache: RefCell::new(None) }
    }
}

struct CachedMatch {
    world: World,
    structure_version: u64,
    archetypes: Vec<Archetype>,
}

/// Archetype filter built by [`QueryBuilder`].
pub struct Query {
    with: Signature,
    without: Signature,
    cache: RefCell<Option<CachedMatch>>,
}

impl Query {
    /// Required component types.
    #[inline] pub fn with_types(&self) -> &Signature { &self.with }

    /// Excluded component types.
    #[inline] pub fn without_types(&self) -> &Signature { &self.without }

    /// Returns `true` if an archetype with `signature` is selected.
    pub fn matches(&self, signature: &Signature) -> bool {
        signature.contains_all(&self.with) && !signature.contains_any(&self.without)
    }
}

impl ECSManager {
    /// Live archetypes of `world` selected by `query`, in slot order.
    pub fn query_archetypes(&self, world: World, query: &Query) -> Vec<Archetype> {
        let Some(structure_version) = self.archetype_structure_version(world) else {
            return Vec::new();
        };

        if let Some(cached) = query.cache.borrow().as_ref() {
            if cached.world == world && cached.structure_version == structure_version {
                return cached.archetypes.clone();
            }
        }

        let archetypes: Vec<Archetype> = self
            .archetypes(world)
            .into_iter()
            .filter(|&archetype| {
                self.archetype_signature(archetype)
                    .is_some_and(|signature| query.matches(signature))
            })
            .collect();

        *query.cache.borrow_mut() = Some(CachedMatch {
            world,
            structure_version,
            archetypes: archetypes.clone(),
        });
        archetypes
    }

    /// Number of placed entities of `world` selected by `query`.
    pub fn query_entity_count(&self, world: World, query: &Query) -> usize {
        self.query_archetypes(world, query)
            .into_iter()
            .map(|archetype| self.archetype_entity_count(archetype))
            .sum()
    }

    /// Visits every entity of `world` selected by `query`.
    ///
    /// Structural deferral is enabled for the duration of the visit, so `f`
    /// may create, destroy or reshape entities freely; those changes apply
    /// once the visit ends. Entities destroyed earlier in the same visit are
    /// skipped.
    pub fn for_each_entity<F>(&mut self, world: World, query: &Query, mut f: F)
    where
        F: FnMut(&mut ECSManager, Entity),
    {
        self.with_deferral(world, |ecs| {
            for archetype in ecs.query_archetypes(world, query) {
                let snapshot: Vec<Entity> = match ecs.entity_buffer(archetype) {
                    Some(entities) => entities.to_vec(),
                    None => continue,
                };
                for entity in snapshot {
                    if ecs.is_alive(entity) {
                        f(ecs, entity);
                    }
                }
            }
        });
    }
}
