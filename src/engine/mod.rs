//! # Engine Module
//!
//! Internal store implementation.
//!
//! This module contains all core building blocks such as:
//! - Handles, signatures and the type registry
//! - The entity table
//! - Component buffers and archetypes
//! - Worlds, callbacks and structural deferral
//! - Queries
//!
//! Public API exposure is controlled by `lib.rs`.

pub mod types;
pub mod error;
pub mod component;
pub mod storage;
pub mod entity;
pub mod archetype;
pub mod hooks;
pub mod events;
pub mod world;
pub mod manager;
pub mod query;
