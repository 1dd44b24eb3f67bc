//! Identity to table-row mapping.

use crate::EntityId;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Rows are 1-based slots. A new identity takes the lowest free slot and a
/// removal frees its slot without moving anyone else.
#[derive(Debug, Default, Clone)]
pub struct RowIndex {
    by_id: HashMap<EntityId, usize>,
    slots: Vec<Option<EntityId>>,
}

impl RowIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row_of(&self, id: &EntityId) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    pub fn id_at(&self, row: usize) -> Option<&EntityId> {
        self.slots.get(row.checked_sub(1)?)?.as_ref()
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.by_id.contains_key(id)
    }

    /// Returns the row for `id` and whether it was newly assigned.
    pub fn assign(&mut self, id: &EntityId) -> (usize, bool) {
        if let Some(row) = self.row_of(id) {
            return (row, false);
        }
        let slot = match self.slots.iter().position(Option::is_none) {
            Some(free) => {
                self.slots[free] = Some(id.clone());
                free
            }
            None => {
                self.slots.push(Some(id.clone()));
                self.slots.len() - 1
            }
        };
        let row = slot + 1;
        self.by_id.insert(id.clone(), row);
        (row, true)
    }

    pub fn remove(&mut self, id: &EntityId) -> Option<usize> {
        let row = self.by_id.remove(id)?;
        if let Some(slot) = self.slots.get_mut(row - 1) {
            *slot = None;
        }
        while matches!(self.slots.last(), Some(None)) {
            self.slots.pop();
        }
        Some(row)
    }

    /// Removes every identity not in `keep`, returning what was removed.
    pub fn retain_only(&mut self, keep: &HashSet<EntityId>) -> Vec<(usize, EntityId)> {
        let stale = self
            .by_id
            .keys()
            .filter(|id| !keep.contains(*id))
            .cloned()
            .collect::<Vec<_>>();
        let mut removed = stale
            .into_iter()
            .filter_map(|id| self.remove(&id).map(|row| (row, id)))
            .collect::<Vec<_>>();
        removed.sort_by_key(|(row, _)| *row);
        removed
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Occupied rows in row order.
    pub fn rows(&self) -> Vec<(usize, EntityId)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, id)| id.as_ref().map(|id| (slot + 1, id.clone())))
            .collect()
    }

    pub fn clear(&mut self) {
        self.by_id.clear();
        self.slots.clear();
    }

    /// One row per identity and one identity per row.
    pub fn is_consistent(&self) -> bool {
        let occupied = self.slots.iter().filter(|slot| slot.is_some()).count();
        occupied == self.by_id.len()
            && self
                .by_id
                .iter()
                .all(|(id, row)| self.id_at(*row) == Some(id))
    }
}

/// The single lock around the row index. Held only for lookups and edits,
/// never across an await.
#[derive(Debug, Clone, Default)]
pub struct SharedRowIndex(Arc<Mutex<RowIndex>>);

impl SharedRowIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<T>(&self, f: impl FnOnce(&mut RowIndex) -> T) -> T {
        let mut guard = match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    pub fn snapshot(&self) -> RowIndex {
        self.with(|index| index.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(value: &str) -> EntityId {
        EntityId::new(value)
    }

    #[test]
    fn assign_reuses_lowest_free_slot() {
        let mut index = RowIndex::new();
        assert_eq!(index.assign(&id("a")), (1, true));
        assert_eq!(index.assign(&id("b")), (2, true));
        assert_eq!(index.assign(&id("c")), (3, true));
        assert_eq!(index.assign(&id("b")), (2, false));

        assert_eq!(index.remove(&id("b")), Some(2));
        assert_eq!(index.row_of(&id("c")), Some(3));
        assert_eq!(index.assign(&id("d")), (2, true));
        assert!(index.is_consistent());
    }

    #[test]
    fn retain_only_prunes_absent_ids() {
        let mut index = RowIndex::new();
        for name in ["a", "b", "c"] {
            index.assign(&id(name));
        }
        let keep = [id("b")].into_iter().collect::<HashSet<_>>();
        let removed = index.retain_only(&keep);
        assert_eq!(removed, vec![(1, id("a")), (3, id("c"))]);
        assert_eq!(index.rows(), vec![(2, id("b"))]);
        assert!(index.is_consistent());
        assert_eq!(index.remove(&id("a")), None);
    }

    #[test]
    fn trailing_free_slots_are_released() {
        let mut index = RowIndex::new();
        index.assign(&id("a"));
        index.assign(&id("b"));
        index.remove(&id("b"));
        index.remove(&id("a"));
        assert!(index.is_empty());
        assert_eq!(index.assign(&id("c")), (1, true));
    }

    #[test]
    fn shared_index_survives_poisoning() {
        let shared = SharedRowIndex::new();
        let clone = shared.clone();
        let _ = std::thread::spawn(move || {
            clone.with(|index| {
                index.assign(&EntityId::new("a"));
                panic!("poison the lock");
            })
        })
        .join();
        assert_eq!(shared.with(|index| index.row_of(&id("a"))), Some(1));
    }
}
