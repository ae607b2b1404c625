//! Sparse-set component table keyed by entity slot id.

const EMPTY: u32 = u32::MAX;

/// One component table.
///
/// `sparse[id]` holds the index into the packed `dense`/`ids` arrays, or
/// `EMPTY` when the entity has no component of this kind. Removal is a
/// swap-remove, so dense order is not stable.
#[derive(Debug)]
pub struct SparseSet<T> {
    sparse: Vec<u32>,
    dense: Vec<T>,
    ids: Vec<u32>,
}

impl<T> Default for SparseSet<T> {
    fn default() -> Self {
        Self {
            sparse: Vec::new(),
            dense: Vec::new(),
            ids: Vec::new(),
        }
    }
}

impl<T> SparseSet<T> {
    fn slot(&self, id: u32) -> Option<usize> {
        match self.sparse.get(id as usize) {
            Some(&idx) if idx != EMPTY => Some(idx as usize),
            _ => None,
        }
    }

    /// Inserts or replaces the value for `id`.
    pub fn insert(&mut self, id: u32, value: T) {
        if let Some(idx) = self.slot(id) {
            self.dense[idx] = value;
            return;
        }
        if id as usize >= self.sparse.len() {
            self.sparse.resize(id as usize + 1, EMPTY);
        }
        self.sparse[id as usize] = self.dense.len() as u32;
        self.dense.push(value);
        self.ids.push(id);
    }

    pub fn get(&self, id: u32) -> Option<&T> {
        self.slot(id).map(|idx| &self.dense[idx])
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut T> {
        self.slot(id).map(move |idx| &mut self.dense[idx])
    }

    pub fn contains(&self, id: u32) -> bool {
        self.slot(id).is_some()
    }

    pub fn remove(&mut self, id: u32) -> Option<T> {
        let idx = self.slot(id)?;
        let value = self.dense.swap_remove(idx);
        self.ids.swap_remove(idx);
        if let Some(&moved) = self.ids.get(idx) {
            self.sparse[moved as usize] = idx as u32;
        }
        self.sparse[id as usize] = EMPTY;
        Some(value)
    }

    /// Ids that currently hold a component, in dense order.
    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.ids.iter().copied().zip(self.dense.iter())
    }

    pub fn len(&self) -> usize {
        self.dense.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get_replace() {
        let mut set = SparseSet::default();
        set.insert(5, "a");
        assert_eq!(set.get(5), Some(&"a"));
        set.insert(5, "b");
        assert_eq!(set.get(5), Some(&"b"));
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(4), None);
        assert_eq!(set.get(500), None);
    }

    #[test]
    fn test_swap_remove_keeps_index_consistent() {
        let mut set = SparseSet::default();
        set.insert(1, 10);
        set.insert(2, 20);
        set.insert(3, 30);

        assert_eq!(set.remove(1), Some(10));
        assert!(!set.contains(1));
        assert_eq!(set.get(2), Some(&20));
        assert_eq!(set.get(3), Some(&30));

        if let Some(v) = set.get_mut(3) {
            *v = 31;
        }
        assert_eq!(set.get(3), Some(&31));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_remove_last_and_missing() {
        let mut set = SparseSet::default();
        set.insert(0, 'x');
        assert_eq!(set.remove(0), Some('x'));
        assert_eq!(set.remove(0), None);
        assert_eq!(set.remove(77), None);
        assert!(set.is_empty());
    }

    #[test]
    fn test_iter_matches_ids() {
        let mut set = SparseSet::default();
        set.insert(7, 1.0f32);
        set.insert(3, 2.0f32);
        let collected: Vec<(u32, f32)> = set.iter().map(|(id, v)| (id, *v)).collect();
        assert_eq!(collected, vec![(7, 1.0), (3, 2.0)]);
        assert_eq!(set.ids(), &[7, 3]);
    }
}
