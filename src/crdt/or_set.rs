//! Observed-remove set, mirroring `cauchy_orset_*` in `or_set.c`: every
//! `add` mints a fresh [`Uid`] tag, `remove` tombstones every tag currently
//! visible, and merge never un-removes — the combination gives add-wins
//! semantics under concurrent add/remove.

use super::{Crdt, CrdtKind};
use crate::error::{CauchyError, CauchyResult};
use crate::hash::fnv1a_64;
use crate::uid::Uid;
use crate::vclock::VectorClock;

#[derive(Clone)]
struct Entry {
    data: Vec<u8>,
    hash: u64,
    tag: Uid,
    removed: bool,
}

/// A set with add-wins semantics under concurrent add/remove.
#[derive(Default, Clone)]
pub struct OrSet {
    buckets: Vec<Vec<Entry>>,
    active_count: usize,
    node_id: u64,
    timestamp: u64,
}

impl OrSet {
    /// Creates an empty set owned by `node_id`, with `initial_capacity`
    /// buckets (defaulting to 16 when `0`, matching `cauchy_orset_init`).
    pub fn new(initial_capacity: usize, node_id: u64) -> Self {
        let cap = if initial_capacity == 0 { 16 } else { initial_capacity };
        Self {
            buckets: (0..cap).map(|_| Vec::new()).collect(),
            active_count: 0,
            node_id,
            timestamp: 0,
        }
    }

    fn idx_for(&self, hash: u64) -> usize {
        (hash as usize) % self.buckets.len()
    }

    /// Adds `data`, minting a fresh tag from this set's own node/timestamp
    /// counter. Unconditional: re-adding an already-present value still
    /// creates a brand new, distinct entry (this is what gives OR-Set its
    /// add-wins property — the new tag was never observed by a concurrent
    /// remover).
    pub fn add(&mut self, data: &[u8]) -> CauchyResult<()> {
        if data.is_empty() {
            return Err(CauchyError::Invalid);
        }
        let hash = fnv1a_64(data);
        self.timestamp += 1;
        let tag = Uid::new(self.node_id, self.timestamp);
        let idx = self.idx_for(hash);
        self.buckets[idx].push(Entry {
            data: data.to_vec(),
            hash,
            tag,
            removed: false,
        });
        self.active_count += 1;
        Ok(())
    }

    /// Marks every currently visible (non-tombstoned) entry matching `data`
    /// as removed. Tags this replica has never observed (e.g. a concurrent
    /// add from elsewhere) are untouched — that's the "observed" in
    /// observed-remove.
    pub fn remove(&mut self, data: &[u8]) -> CauchyResult<()> {
        if data.is_empty() {
            return Err(CauchyError::Invalid);
        }
        let hash = fnv1a_64(data);
        let idx = self.idx_for(hash);
        let mut newly_removed = 0usize;
        for entry in self.buckets[idx].iter_mut() {
            if !entry.removed && entry.hash == hash && entry.data == data {
                entry.removed = true;
                newly_removed += 1;
            }
        }
        if newly_removed > 0 {
            self.active_count -= newly_removed;
            Ok(())
        } else {
            Err(CauchyError::NotFound)
        }
    }

    pub fn contains(&self, data: &[u8]) -> bool {
        if data.is_empty() || self.buckets.is_empty() {
            return false;
        }
        let hash = fnv1a_64(data);
        let idx = self.idx_for(hash);
        self.buckets[idx]
            .iter()
            .any(|e| !e.removed && e.hash == hash && e.data == data)
    }

    /// Count of distinct active (non-tombstoned) tags — not deduplicated by
    /// payload. Re-adding a value already present creates a second live
    /// entry and this count reflects that, the same as `set->active_count`
    /// in the C source (which increments unconditionally on every `add`,
    /// never checking whether the payload already has a live tag).
    pub fn count(&self) -> usize {
        self.active_count
    }

    pub fn is_empty(&self) -> bool {
        self.active_count == 0
    }

    fn find_by_tag(&self, hash: u64, tag: Uid) -> Option<(usize, usize)> {
        let idx = self.idx_for(hash);
        self.buckets[idx]
            .iter()
            .position(|e| e.hash == hash && e.tag == tag)
            .map(|pos| (idx, pos))
    }

    /// Iterates active entries' payloads. Distinct live tags for the same
    /// payload yield that payload more than once, matching the C source's
    /// iterator (which skips tombstones but not payload duplicates).
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.buckets
            .iter()
            .flatten()
            .filter(|e| !e.removed)
            .map(|e| e.data.as_slice())
    }

    /// Removes entries whose tag is causally stable — every node has
    /// already observed at least that many operations from the tag's
    /// owning node, per `floor` — AND are currently tombstoned. Physically
    /// dropping a tag before it's stable would let a late-arriving,
    /// not-yet-merged copy of that same tag come back from a peer and
    /// resurrect a value this replica already considers gone; gc only
    /// touches the suffix of history no peer can still be holding.
    pub fn gc(&mut self, floor: &VectorClock) -> usize {
        let mut removed = 0usize;
        for bucket in self.buckets.iter_mut() {
            bucket.retain(|e| {
                let stable = e.tag.timestamp <= floor.get(e.tag.node_id as u32);
                let drop = e.removed && stable;
                if drop {
                    removed += 1;
                }
                !drop
            });
        }
        removed
    }
}

impl Crdt for OrSet {
    const KIND: CrdtKind = CrdtKind::OrSet;

    /// For each source entry, look it up by `(hash, tag)` in `self`. Absent:
    /// clone it in. Present and source removed but ours isn't: tombstone
    /// ours too. Never un-removes.
    fn merge(&mut self, other: &OrSet) {
        for bucket in other.buckets.iter() {
            for src_entry in bucket.iter() {
                match self.find_by_tag(src_entry.hash, src_entry.tag) {
                    Some((idx, pos)) => {
                        let existing = &mut self.buckets[idx][pos];
                        if src_entry.removed && !existing.removed {
                            existing.removed = true;
                            self.active_count -= 1;
                        }
                    }
                    None => {
                        let idx = self.idx_for(src_entry.hash);
                        let was_removed = src_entry.removed;
                        self.buckets[idx].push(Entry {
                            data: src_entry.data.clone(),
                            hash: src_entry.hash,
                            tag: src_entry.tag,
                            removed: was_removed,
                        });
                        if !was_removed {
                            self.active_count += 1;
                        }
                    }
                }
            }
        }
    }

    /// Two sets are equal iff they hold the exact same set of tags, each
    /// with the same payload and removed flag — not just the same active
    /// count or the same active payloads, since two different tag
    /// histories can coincidentally produce the same visible contents.
    fn equals(&self, other: &OrSet) -> bool {
        let self_total: usize = self.buckets.iter().map(|b| b.len()).sum();
        let other_total: usize = other.buckets.iter().map(|b| b.len()).sum();
        if self_total != other_total || self.active_count != other.active_count {
            return false;
        }
        self.buckets.iter().flatten().all(|e| {
            matches!(
                other.find_by_tag(e.hash, e.tag),
                Some((idx, pos)) if other.buckets[idx][pos].removed == e.removed
                    && other.buckets[idx][pos].data == e.data
            )
        })
    }

    fn serialized_size(&self) -> usize {
        4 + self
            .buckets
            .iter()
            .flatten()
            .map(|e| 8 + 8 + 1 + 4 + e.data.len())
            .sum::<usize>()
    }

    fn serialize(&self, buffer: &mut [u8]) -> usize {
        let needed = self.serialized_size();
        if buffer.len() < needed {
            return 0;
        }
        let total: usize = self.buckets.iter().map(|b| b.len()).sum();
        buffer[0..4].copy_from_slice(&(total as u32).to_le_bytes());
        let mut off = 4;
        for entry in self.buckets.iter().flatten() {
            buffer[off..off + 8].copy_from_slice(&entry.tag.node_id.to_le_bytes());
            off += 8;
            buffer[off..off + 8].copy_from_slice(&entry.tag.timestamp.to_le_bytes());
            off += 8;
            buffer[off] = entry.removed as u8;
            off += 1;
            buffer[off..off + 4].copy_from_slice(&(entry.data.len() as u32).to_le_bytes());
            off += 4;
            buffer[off..off + entry.data.len()].copy_from_slice(&entry.data);
            off += entry.data.len();
        }
        needed
    }

    fn deserialize(buffer: &[u8]) -> CauchyResult<OrSet> {
        if buffer.len() < 4 {
            return Err(CauchyError::Invalid);
        }
        let total = u32::from_le_bytes(buffer[0..4].try_into().unwrap()) as usize;
        let mut set = OrSet::new(total.max(1).next_power_of_two().max(16), 0);
        let mut off = 4;
        for _ in 0..total {
            if buffer.len() < off + 21 {
                return Err(CauchyError::Invalid);
            }
            let node_id = u64::from_le_bytes(buffer[off..off + 8].try_into().unwrap());
            off += 8;
            let timestamp = u64::from_le_bytes(buffer[off..off + 8].try_into().unwrap());
            off += 8;
            let removed = buffer[off] != 0;
            off += 1;
            let len = u32::from_le_bytes(buffer[off..off + 4].try_into().unwrap()) as usize;
            off += 4;
            if buffer.len() < off + len {
                return Err(CauchyError::Invalid);
            }
            let data = buffer[off..off + len].to_vec();
            off += len;

            let hash = fnv1a_64(&data);
            let idx = set.idx_for(hash);
            if !removed {
                set.active_count += 1;
            }
            set.buckets[idx].push(Entry {
                data,
                hash,
                tag: Uid::new(node_id, timestamp),
                removed,
            });
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_wins_under_concurrent_remove() {
        let mut r1 = OrSet::new(4, 1);
        r1.add(b"k").unwrap();
        let mut r2 = r1.clone();

        r1.remove(b"k").unwrap();
        r2.add(b"k").unwrap();

        let mut merged_12 = r1.clone();
        merged_12.merge(&r2);
        let mut merged_21 = r2.clone();
        merged_21.merge(&r1);

        assert!(merged_12.contains(b"k"));
        assert!(merged_21.contains(b"k"));
        assert_eq!(merged_12.count(), 1);
        assert_eq!(merged_21.count(), 1);
    }

    #[test]
    fn remove_without_prior_observation_is_not_found() {
        let mut set = OrSet::new(4, 1);
        assert_eq!(set.remove(b"missing"), Err(CauchyError::NotFound));
    }

    #[test]
    fn gc_drops_only_stable_tombstones() {
        let mut set = OrSet::new(4, 1);
        set.add(b"a").unwrap();
        set.remove(b"a").unwrap();

        let mut floor = VectorClock::new(2);
        floor.set(1, 0);
        assert_eq!(set.gc(&floor), 0, "not yet stable");

        floor.set(1, 10);
        assert_eq!(set.gc(&floor), 1);
    }
}
