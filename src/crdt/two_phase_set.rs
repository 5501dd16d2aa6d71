//! Two-phase set, mirroring `cauchy_2pset_*` in `2p_set.c`: a pair of
//! [`GSet`]s — `added` and `removed` — where removal is a permanent
//! tombstone.

use super::{Crdt, CrdtKind, GSet};
use crate::error::{CauchyError, CauchyResult};

/// A set with add and (permanent) remove, built from two [`GSet`]s.
#[derive(Debug, Clone)]
pub struct TwoPhaseSet {
    added: GSet,
    removed: GSet,
}

impl Default for TwoPhaseSet {
    fn default() -> Self {
        Self::new(16)
    }
}

impl TwoPhaseSet {
    pub fn new(initial_capacity: usize) -> Self {
        Self {
            added: GSet::new(initial_capacity),
            removed: GSet::new(initial_capacity),
        }
    }

    /// Adds an element. A no-op (but still `Ok`) if the element is already
    /// tombstoned — once removed, an element can never come back.
    pub fn add(&mut self, data: &[u8]) -> CauchyResult<()> {
        if self.removed.contains(data) {
            return Ok(());
        }
        self.added.add(data)
    }

    /// Removes an element, requiring it was previously added.
    pub fn remove(&mut self, data: &[u8]) -> CauchyResult<()> {
        if !self.added.contains(data) {
            return Err(CauchyError::NotFound);
        }
        self.removed.add(data)
    }

    pub fn contains(&self, data: &[u8]) -> bool {
        self.added.contains(data) && !self.removed.contains(data)
    }

    pub fn was_added(&self, data: &[u8]) -> bool {
        self.added.contains(data)
    }

    pub fn was_removed(&self, data: &[u8]) -> bool {
        self.removed.contains(data)
    }

    /// Count of currently-present (added, not removed) elements.
    pub fn count(&self) -> usize {
        self.added.iter().filter(|e| !self.removed.contains(e)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

impl Crdt for TwoPhaseSet {
    const KIND: CrdtKind = CrdtKind::TwoPhaseSet;

    fn merge(&mut self, other: &TwoPhaseSet) {
        self.added.merge(&other.added);
        self.removed.merge(&other.removed);
    }

    fn equals(&self, other: &TwoPhaseSet) -> bool {
        self.added.equals(&other.added) && self.removed.equals(&other.removed)
    }

    fn serialized_size(&self) -> usize {
        self.added.serialized_size() + self.removed.serialized_size()
    }

    fn serialize(&self, buffer: &mut [u8]) -> usize {
        let needed = self.serialized_size();
        if buffer.len() < needed {
            return 0;
        }
        let a = self.added.serialize(buffer);
        if a == 0 {
            return 0;
        }
        let r = self.removed.serialize(&mut buffer[a..]);
        if r == 0 {
            return 0;
        }
        a + r
    }

    fn deserialize(buffer: &[u8]) -> CauchyResult<TwoPhaseSet> {
        let added = GSet::deserialize(buffer)?;
        let a_size = added.serialized_size();
        let removed = GSet::deserialize(&buffer[a_size..])?;
        Ok(TwoPhaseSet { added, removed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permanence_scenario() {
        let mut set = TwoPhaseSet::new(4);
        set.add(b"x").unwrap();
        set.remove(b"x").unwrap();
        set.add(b"x").unwrap();
        assert!(!set.contains(b"x"));
        assert_eq!(set.count(), 0);
    }

    #[test]
    fn remove_without_add_is_not_found() {
        let mut set = TwoPhaseSet::new(4);
        assert_eq!(set.remove(b"x"), Err(CauchyError::NotFound));
    }

    #[test]
    fn merge_unions_both_sides() {
        let mut a = TwoPhaseSet::new(4);
        a.add(b"x").unwrap();
        a.add(b"y").unwrap();
        a.remove(b"y").unwrap();

        let mut b = TwoPhaseSet::new(4);
        b.add(b"z").unwrap();

        a.merge(&b);
        assert!(a.contains(b"x"));
        assert!(a.contains(b"z"));
        assert!(!a.contains(b"y"));
    }
}
