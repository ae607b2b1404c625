//! Generational entity handles and the slot allocator behind them.

use std::fmt;

/// Handle to a simulated object.
///
/// `id` indexes a slot that is recycled after the entity is destroyed;
/// `generation` is bumped on every destroy so handles held across a destroy
/// are detectably stale.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Entity {
    pub id: u32,
    pub generation: u32,
}

impl Entity {
    pub const fn new(id: u32, generation: u32) -> Self {
        Self { id, generation }
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}v{})", self.id, self.generation)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.id, self.generation)
    }
}

/// Hands out entity slots and tracks which generation of each slot is live.
#[derive(Debug)]
pub struct EntityAllocator {
    generations: Vec<u32>,
    alive: Vec<bool>,
    free: Vec<u32>,
    limit: u32,
}

impl EntityAllocator {
    /// Creates an allocator that will never hand out more than `limit` slots.
    pub fn with_limit(limit: u32) -> Self {
        Self {
            generations: Vec::new(),
            alive: Vec::new(),
            free: Vec::new(),
            limit,
        }
    }

    /// Reuses a free slot, or grows. Returns `None` once every slot up to the
    /// limit is live.
    pub fn allocate(&mut self) -> Option<Entity> {
        if let Some(id) = self.free.pop() {
            self.alive[id as usize] = true;
            return Some(Entity::new(id, self.generations[id as usize]));
        }

        let id = u32::try_from(self.generations.len()).ok()?;
        if id >= self.limit {
            return None;
        }
        self.generations.push(0);
        self.alive.push(true);
        Some(Entity::new(id, 0))
    }

    /// Releases the slot and bumps its generation. Returns `false` for a
    /// stale or unknown handle.
    pub fn deallocate(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let slot = entity.id as usize;
        self.alive[slot] = false;
        self.generations[slot] = self.generations[slot].wrapping_add(1);
        self.free.push(entity.id);
        true
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        let slot = entity.id as usize;
        slot < self.alive.len() && self.alive[slot] && self.generations[slot] == entity.generation
    }

    /// Resolves a bare slot id to its current live handle.
    pub fn current(&self, id: u32) -> Option<Entity> {
        let slot = id as usize;
        if slot < self.alive.len() && self.alive[slot] {
            Some(Entity::new(id, self.generations[slot]))
        } else {
            None
        }
    }

    /// Every live handle, in slot order.
    pub fn live(&self) -> impl Iterator<Item = Entity> + '_ {
        self.alive
            .iter()
            .enumerate()
            .filter(|(_, alive)| **alive)
            .map(|(slot, _)| Entity::new(slot as u32, self.generations[slot]))
    }

    pub fn live_count(&self) -> usize {
        self.alive.len() - self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_grows_sequentially() {
        let mut alloc = EntityAllocator::with_limit(10);
        assert_eq!(alloc.allocate(), Some(Entity::new(0, 0)));
        assert_eq!(alloc.allocate(), Some(Entity::new(1, 0)));
        assert_eq!(alloc.live_count(), 2);
    }

    #[test]
    fn test_recycled_slot_gets_new_generation() {
        let mut alloc = EntityAllocator::with_limit(10);
        let first = alloc.allocate().unwrap();
        assert!(alloc.deallocate(first));

        let second = alloc.allocate().unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.generation, first.generation + 1);
        assert!(!alloc.is_alive(first));
        assert!(alloc.is_alive(second));
    }

    #[test]
    fn test_stale_deallocate_is_rejected() {
        let mut alloc = EntityAllocator::with_limit(10);
        let entity = alloc.allocate().unwrap();
        assert!(alloc.deallocate(entity));
        assert!(!alloc.deallocate(entity));
        assert!(!alloc.deallocate(Entity::new(99, 0)));
    }

    #[test]
    fn test_limit_reached() {
        let mut alloc = EntityAllocator::with_limit(2);
        let a = alloc.allocate().unwrap();
        alloc.allocate().unwrap();
        assert!(alloc.allocate().is_none());

        alloc.deallocate(a);
        assert!(alloc.allocate().is_some());
    }

    #[test]
    fn test_current_resolves_live_generation() {
        let mut alloc = EntityAllocator::with_limit(4);
        let a = alloc.allocate().unwrap();
        assert_eq!(alloc.current(a.id), Some(a));
        alloc.deallocate(a);
        assert_eq!(alloc.current(a.id), None);
    }
}
