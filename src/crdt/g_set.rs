//! Grow-only set, mirroring `cauchy_gset_*` in `g_set.c`: an open-chaining
//! hash table keyed by FNV-1a over the payload bytes, union-only merge.
//!
//! The original never resizes its bucket array (an explicit Open Question
//! in the source spec). This port resolves that on its own terms: buckets
//! double and rehash once the load factor reaches 0.75, a conventional
//! default rather than one grounded in any example in the reference pack.

use super::{Crdt, CrdtKind};
use crate::error::{CauchyError, CauchyResult};
use crate::hash::fnv1a_64;

const INITIAL_BUCKETS: usize = 16;
const LOAD_FACTOR_THRESHOLD: f64 = 0.75;

/// A grow-only set of byte-string elements.
#[derive(Debug, Clone)]
pub struct GSet {
    buckets: Vec<Vec<Vec<u8>>>,
    count: usize,
}

impl Default for GSet {
    fn default() -> Self {
        Self::new(INITIAL_BUCKETS)
    }
}

impl GSet {
    /// Creates an empty set with `initial_capacity` buckets (rounded up to
    /// at least 1).
    pub fn new(initial_capacity: usize) -> Self {
        let cap = initial_capacity.max(1);
        Self {
            buckets: vec![Vec::new(); cap],
            count: 0,
        }
    }

    fn bucket_index(&self, data: &[u8]) -> usize {
        (fnv1a_64(data) as usize) % self.buckets.len()
    }

    /// Adds an element. Idempotent: re-adding an existing element is a
    /// no-op and still returns `Ok`.
    pub fn add(&mut self, data: &[u8]) -> CauchyResult<()> {
        if self.contains(data) {
            return Ok(());
        }
        self.maybe_grow();
        let idx = self.bucket_index(data);
        self.buckets[idx].push(data.to_vec());
        self.count += 1;
        Ok(())
    }

    pub fn contains(&self, data: &[u8]) -> bool {
        if self.buckets.is_empty() {
            return false;
        }
        let idx = self.bucket_index(data);
        self.buckets[idx].iter().any(|e| e.as_slice() == data)
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// `true` iff every element of `self` is also in `other`.
    pub fn is_subset_of(&self, other: &GSet) -> bool {
        self.iter().all(|e| other.contains(e))
    }

    /// Iterates every element exactly once, in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.buckets.iter().flatten().map(|v| v.as_slice())
    }

    fn maybe_grow(&mut self) {
        let load = (self.count + 1) as f64 / self.buckets.len() as f64;
        if load < LOAD_FACTOR_THRESHOLD {
            return;
        }
        let new_len = self.buckets.len() * 2;
        let mut new_buckets: Vec<Vec<Vec<u8>>> = vec![Vec::new(); new_len];
        for elem in self.buckets.iter().flatten() {
            let idx = (fnv1a_64(elem) as usize) % new_len;
            new_buckets[idx].push(elem.clone());
        }
        self.buckets = new_buckets;
    }
}

impl Crdt for GSet {
    const KIND: CrdtKind = CrdtKind::GSet;

    /// Unions `other` into `self` by re-adding every source element.
    fn merge(&mut self, other: &GSet) {
        for elem in other.iter() {
            // infallible: `add` only fails on conditions this type never hits.
            let _ = self.add(elem);
        }
    }

    /// `true` iff `self` and `other` are mutual subsets.
    fn equals(&self, other: &GSet) -> bool {
        self.count == other.count && self.is_subset_of(other)
    }

    fn serialized_size(&self) -> usize {
        4 + self.iter().map(|e| 4 + e.len()).sum::<usize>()
    }

    fn serialize(&self, buffer: &mut [u8]) -> usize {
        let needed = self.serialized_size();
        if buffer.len() < needed {
            return 0;
        }
        buffer[0..4].copy_from_slice(&(self.count as u32).to_le_bytes());
        let mut off = 4;
        for elem in self.iter() {
            buffer[off..off + 4].copy_from_slice(&(elem.len() as u32).to_le_bytes());
            off += 4;
            buffer[off..off + elem.len()].copy_from_slice(elem);
            off += elem.len();
        }
        needed
    }

    fn deserialize(buffer: &[u8]) -> CauchyResult<GSet> {
        if buffer.len() < 4 {
            return Err(CauchyError::Invalid);
        }
        let count = u32::from_le_bytes(buffer[0..4].try_into().unwrap()) as usize;
        let mut set = GSet::new(INITIAL_BUCKETS.max(count.next_power_of_two()));
        let mut off = 4;
        for _ in 0..count {
            if buffer.len() < off + 4 {
                return Err(CauchyError::Invalid);
            }
            let len = u32::from_le_bytes(buffer[off..off + 4].try_into().unwrap()) as usize;
            off += 4;
            if buffer.len() < off + len {
                return Err(CauchyError::Invalid);
            }
            set.add(&buffer[off..off + len]).map_err(|_| CauchyError::Invalid)?;
            off += len;
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_idempotent() {
        let mut s = GSet::new(4);
        s.add(b"x").unwrap();
        s.add(b"x").unwrap();
        assert_eq!(s.count(), 1);
        assert!(s.contains(b"x"));
    }

    #[test]
    fn grows_past_load_factor() {
        let mut s = GSet::new(4);
        for i in 0..20u32 {
            s.add(&i.to_le_bytes()).unwrap();
        }
        assert_eq!(s.count(), 20);
        assert!(s.buckets.len() > 4);
        for i in 0..20u32 {
            assert!(s.contains(&i.to_le_bytes()));
        }
    }

    #[test]
    fn merge_is_union_and_commutative() {
        let mut a = GSet::new(4);
        a.add(b"a").unwrap();
        a.add(b"b").unwrap();
        let mut b = GSet::new(4);
        b.add(b"b").unwrap();
        b.add(b"c").unwrap();

        let mut ab = a.clone();
        ab.merge(&b);
        let mut ba = b.clone();
        ba.merge(&a);
        assert!(ab.equals(&ba));
        assert_eq!(ab.count(), 3);
    }

    #[test]
    fn roundtrips_through_bytes() {
        let mut s = GSet::new(4);
        s.add(b"alpha").unwrap();
        s.add(b"beta").unwrap();
        let mut buf = vec![0u8; s.serialized_size()];
        assert_eq!(s.serialize(&mut buf), buf.len());
        let back = GSet::deserialize(&buf).unwrap();
        assert!(s.equals(&back));
    }
}
