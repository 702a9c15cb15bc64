//! Side table of children that arrived before their parent.

use uuid::Uuid;

/// Pack a host index and a local id into the key used by the local-id table
pub fn local_key(host_index: u32, local_id: u32) -> u64 {
    ((host_index as u64) << 32) | local_id as u64
}

/// Host index half of a packed key
pub fn host_index_of(key: u64) -> u32 {
    (key >> 32) as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrphanRecord {
    /// Packed (host index, local id) of the parent we are waiting for
    pub parent_key: u64,
    pub child: Uuid,
    /// Registry frame the record was made on
    pub created_frame: u64,
}

#[derive(Debug, Default)]
pub struct OrphanTable {
    records: Vec<OrphanRecord>,
}

impl OrphanTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OrphanRecord> {
        self.records.iter()
    }

    /// Record `child` as waiting for `parent_key`. A child waits on one
    /// parent at a time; a newer record replaces an older one.
    pub fn insert(&mut self, parent_key: u64, child: Uuid, frame: u64) {
        if let Some(existing) = self.records.iter_mut().find(|r| r.child == child) {
            if existing.parent_key != parent_key {
                existing.parent_key = parent_key;
                existing.created_frame = frame;
            }
            return;
        }
        self.records.push(OrphanRecord {
            parent_key,
            child,
            created_frame: frame,
        });
    }

    pub fn contains_child(&self, child: &Uuid) -> bool {
        self.records.iter().any(|r| r.child == *child)
    }

    pub fn is_waiting_on(&self, parent_key: u64) -> bool {
        self.records.iter().any(|r| r.parent_key == parent_key)
    }

    /// Remove and return every child waiting on `parent_key`
    pub fn take_children_of(&mut self, parent_key: u64) -> Vec<Uuid> {
        let mut children = Vec::new();
        self.records.retain(|r| {
            if r.parent_key == parent_key {
                children.push(r.child);
                false
            } else {
                true
            }
        });
        children
    }

    pub fn remove_child(&mut self, child: &Uuid) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.child != *child);
        before != self.records.len()
    }

    /// Drop every record `stale` flags; returns how many went
    pub fn prune<F>(&mut self, mut stale: F) -> usize
    where
        F: FnMut(&OrphanRecord) -> bool,
    {
        let before = self.records.len();
        self.records.retain(|r| !stale(r));
        before - self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_key_packing() {
        let key = local_key(3, 0xdead_beef);
        assert_eq!(key, 0x0000_0003_dead_beef);
        assert_eq!(host_index_of(key), 3);
    }

    #[test]
    fn test_take_children_of() {
        let mut table = OrphanTable::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        table.insert(local_key(1, 10), a, 0);
        table.insert(local_key(1, 10), b, 1);
        table.insert(local_key(1, 11), c, 1);

        let mut children = table.take_children_of(local_key(1, 10));
        children.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(children, expected);
        assert_eq!(table.len(), 1);
        assert!(table.contains_child(&c));
    }

    #[test]
    fn test_reinsert_moves_child() {
        let mut table = OrphanTable::new();
        let a = Uuid::new_v4();
        table.insert(local_key(1, 10), a, 0);
        table.insert(local_key(1, 12), a, 5);
        assert_eq!(table.len(), 1);
        assert!(!table.is_waiting_on(local_key(1, 10)));
        assert!(table.is_waiting_on(local_key(1, 12)));
    }

    #[test]
    fn test_prune_by_age() {
        let mut table = OrphanTable::new();
        table.insert(local_key(1, 1), Uuid::new_v4(), 0);
        table.insert(local_key(1, 2), Uuid::new_v4(), 100);
        let pruned = table.prune(|r| r.created_frame + 50 < 120);
        assert_eq!(pruned, 1);
        assert_eq!(table.len(), 1);
    }
}
