use super::entity::{Entity, EntityAllocator};
use super::storage::SparseSet;
use crate::components::{
    Health, KillCounter, Lifetime, Position, Projectile, Sprite, Velocity,
};
use bitflags::bitflags;
use log::debug;
use thiserror::Error;

/// Highest slot count the store will grow to by default. `u32::MAX` is kept
/// free as the protocol's "no player" sentinel.
pub const DEFAULT_ENTITY_LIMIT: u32 = u32::MAX - 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorldError {
    #[error("entity limit of {limit} reached")]
    EntityLimitReached { limit: u32 },
}

bitflags! {
    /// Set of component kinds, used to describe queries.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ComponentSet: u8 {
        const POSITION = 1 << 0;
        const VELOCITY = 1 << 1;
        const SPRITE = 1 << 2;
        const HEALTH = 1 << 3;
        const PROJECTILE = 1 << 4;
        const LIFETIME = 1 << 5;
        const KILL_COUNTER = 1 << 6;
    }
}

/// A component kind with a dedicated table in the [`World`].
pub trait Component: Sized + 'static {
    const KIND: ComponentSet;

    fn table(world: &World) -> &SparseSet<Self>;
    fn table_mut(world: &mut World) -> &mut SparseSet<Self>;
}

macro_rules! component_table {
    ($ty:ty, $kind:ident, $field:ident) => {
        impl Component for $ty {
            const KIND: ComponentSet = ComponentSet::$kind;

            fn table(world: &World) -> &SparseSet<Self> {
                &world.$field
            }

            fn table_mut(world: &mut World) -> &mut SparseSet<Self> {
                &mut world.$field
            }
        }
    };
}

component_table!(Position, POSITION, positions);
component_table!(Velocity, VELOCITY, velocities);
component_table!(Sprite, SPRITE, sprites);
component_table!(Health, HEALTH, healths);
component_table!(Projectile, PROJECTILE, projectiles);
component_table!(Lifetime, LIFETIME, lifetimes);
component_table!(KillCounter, KILL_COUNTER, kill_counters);

/// Type-erased view of a table, used for cross-table queries and purges.
trait ErasedTable {
    fn ids(&self) -> &[u32];
    fn contains(&self, id: u32) -> bool;
    fn purge(&mut self, id: u32);
}

impl<T> ErasedTable for SparseSet<T> {
    fn ids(&self) -> &[u32] {
        SparseSet::ids(self)
    }

    fn contains(&self, id: u32) -> bool {
        SparseSet::contains(self, id)
    }

    fn purge(&mut self, id: u32) {
        self.remove(id);
    }
}

/// The entity store: generational ids plus one sparse table per component
/// kind. Owns all component data.
#[derive(Debug)]
pub struct World {
    entities: EntityAllocator,
    limit: u32,
    positions: SparseSet<Position>,
    velocities: SparseSet<Velocity>,
    sprites: SparseSet<Sprite>,
    healths: SparseSet<Health>,
    projectiles: SparseSet<Projectile>,
    lifetimes: SparseSet<Lifetime>,
    kill_counters: SparseSet<KillCounter>,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    pub fn new() -> Self {
        Self::with_entity_limit(DEFAULT_ENTITY_LIMIT)
    }

    pub fn with_entity_limit(limit: u32) -> Self {
        Self {
            entities: EntityAllocator::with_limit(limit),
            limit,
            positions: SparseSet::default(),
            velocities: SparseSet::default(),
            sprites: SparseSet::default(),
            healths: SparseSet::default(),
            projectiles: SparseSet::default(),
            lifetimes: SparseSet::default(),
            kill_counters: SparseSet::default(),
        }
    }

    /// Allocates a fresh entity, reusing a destroyed slot when one is free.
    pub fn create(&mut self) -> Result<Entity, WorldError> {
        self.entities
            .allocate()
            .ok_or(WorldError::EntityLimitReached { limit: self.limit })
    }

    /// Destroys the entity and purges it from every table.
    ///
    /// A stale handle is a no-op and returns `false`.
    pub fn destroy(&mut self, entity: Entity) -> bool {
        if !self.entities.is_alive(entity) {
            debug!("Ignoring destroy of stale entity {}", entity);
            return false;
        }
        for table in self.tables_mut() {
            table.purge(entity.id);
        }
        self.entities.deallocate(entity)
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// Current live handle for a bare id, as carried on the wire.
    pub fn resolve(&self, id: u32) -> Option<Entity> {
        self.entities.current(id)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.live_count()
    }

    /// Attaches or replaces a component. Returns `false` for a stale handle.
    pub fn add_component<T: Component>(&mut self, entity: Entity, component: T) -> bool {
        if !self.entities.is_alive(entity) {
            debug!("Ignoring component insert on stale entity {}", entity);
            return false;
        }
        T::table_mut(self).insert(entity.id, component);
        true
    }

    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Option<T> {
        if !self.entities.is_alive(entity) {
            return None;
        }
        T::table_mut(self).remove(entity.id)
    }

    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        if !self.entities.is_alive(entity) {
            return None;
        }
        T::table(self).get(entity.id)
    }

    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        if !self.entities.is_alive(entity) {
            return None;
        }
        T::table_mut(self).get_mut(entity.id)
    }

    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.get::<T>(entity).is_some()
    }

    /// Returns every live entity present in all requested tables.
    ///
    /// Order is unspecified and may change between calls. An empty set
    /// matches every live entity.
    pub fn query(&self, kinds: ComponentSet) -> Vec<Entity> {
        let tables = self.tables();
        let selected: Vec<&dyn ErasedTable> = ComponentSet::all()
            .iter()
            .zip(tables)
            .filter(|(kind, _)| kinds.contains(*kind))
            .map(|(_, table)| table)
            .collect();

        let Some(smallest) = selected.iter().min_by_key(|table| table.ids().len()) else {
            return self.entities.live().collect();
        };

        smallest
            .ids()
            .iter()
            .copied()
            .filter(|&id| selected.iter().all(|table| table.contains(id)))
            .filter_map(|id| self.entities.current(id))
            .collect()
    }

    // Order must match the flag order of `ComponentSet`.
    fn tables(&self) -> [&dyn ErasedTable; 7] {
        [
            &self.positions,
            &self.velocities,
            &self.sprites,
            &self.healths,
            &self.projectiles,
            &self.lifetimes,
            &self.kill_counters,
        ]
    }

    fn tables_mut(&mut self) -> [&mut dyn ErasedTable; 7] {
        [
            &mut self.positions,
            &mut self.velocities,
            &mut self.sprites,
            &mut self.healths,
            &mut self.projectiles,
            &mut self.lifetimes,
            &mut self.kill_counters,
        ]
    }
}
