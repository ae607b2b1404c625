//! Generational entity store with sparse-set component tables.

pub mod entity;
pub mod storage;
pub mod world;

pub use entity::{Entity, EntityAllocator};
pub use storage::SparseSet;
pub use world::{Component, ComponentSet, World, WorldError, DEFAULT_ENTITY_LIMIT};
