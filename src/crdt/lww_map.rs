//! Last-write-wins map, spec.md §4.10. No C counterpart exists in the
//! original source (only LWW-Register and the other seven types were
//! implemented there); this module follows the register's own `(ts,
//! node_id)` accept rule per key, keyed by arbitrary byte strings.

use super::{Crdt, CrdtKind, LwwRegister};
use crate::error::{CauchyError, CauchyResult};
use std::collections::BTreeMap;

/// A mapping from byte-string keys to LWW-Register values. `remove` stores
/// a tombstone register rather than deleting the key outright, so a
/// strictly later write from any replica can resurrect it — same
/// accept-or-drop rule as [`LwwRegister::set`], just applied per key.
#[derive(Debug, Clone, Default)]
pub struct LwwMap {
    entries: BTreeMap<Vec<u8>, LwwRegister>,
}

impl LwwMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes `value` for `key` at `(ts, node)`, creating the key's
    /// register on first write.
    pub fn put(&mut self, key: &[u8], value: &[u8], ts: u64, node: u64) -> CauchyResult<()> {
        self.entries
            .entry(key.to_vec())
            .or_default()
            .set(value, ts, node)
    }

    /// Reads the live value for `key`, or `None` if absent or tombstoned.
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.entries.get(key).and_then(|r| r.get())
    }

    /// Tombstones `key` at `(ts, node)` — an empty-valued write that still
    /// participates in the same accept rule, so a later write anywhere
    /// wins over it and a later tombstone wins over a live value.
    pub fn remove(&mut self, key: &[u8], ts: u64, node: u64) -> CauchyResult<()> {
        self.entries
            .entry(key.to_vec())
            .or_default()
            .set(&[], ts, node)
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.entries.get(key).is_some_and(|r| r.has_value())
    }

    /// Count of keys with a live (non-tombstoned) value.
    pub fn count(&self) -> usize {
        self.entries.values().filter(|r| r.has_value()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Iterates `(key, value)` for every live entry.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.entries
            .iter()
            .filter_map(|(k, r)| r.get().map(|v| (k.as_slice(), v)))
    }
}

impl Crdt for LwwMap {
    const KIND: CrdtKind = CrdtKind::LwwMap;

    /// Per-key merge follows LWW-Register rules; a key present only on one
    /// side is copied in as-is.
    fn merge(&mut self, other: &LwwMap) {
        for (key, reg) in other.entries.iter() {
            self.entries.entry(key.clone()).or_default().merge(reg);
        }
    }

    fn equals(&self, other: &LwwMap) -> bool {
        if self.entries.len() != other.entries.len() {
            return false;
        }
        self.entries
            .iter()
            .all(|(k, r)| other.entries.get(k).is_some_and(|o| r.equals(o)))
    }

    fn serialized_size(&self) -> usize {
        4 + self
            .entries
            .iter()
            .map(|(k, r)| 4 + k.len() + r.serialized_size())
            .sum::<usize>()
    }

    fn serialize(&self, buffer: &mut [u8]) -> usize {
        let needed = self.serialized_size();
        if buffer.len() < needed {
            return 0;
        }
        buffer[0..4].copy_from_slice(&(self.entries.len() as u32).to_le_bytes());
        let mut off = 4;
        for (key, reg) in self.entries.iter() {
            buffer[off..off + 4].copy_from_slice(&(key.len() as u32).to_le_bytes());
            off += 4;
            buffer[off..off + key.len()].copy_from_slice(key);
            off += key.len();
            let written = reg.serialize(&mut buffer[off..]);
            off += written;
        }
        needed
    }

    fn deserialize(buffer: &[u8]) -> CauchyResult<LwwMap> {
        if buffer.len() < 4 {
            return Err(CauchyError::Invalid);
        }
        let count = u32::from_le_bytes(buffer[0..4].try_into().unwrap()) as usize;
        let mut map = LwwMap::new();
        let mut off = 4;
        for _ in 0..count {
            if buffer.len() < off + 4 {
                return Err(CauchyError::Invalid);
            }
            let key_len = u32::from_le_bytes(buffer[off..off + 4].try_into().unwrap()) as usize;
            off += 4;
            if buffer.len() < off + key_len {
                return Err(CauchyError::Invalid);
            }
            let key = buffer[off..off + key_len].to_vec();
            off += key_len;
            let reg = LwwRegister::deserialize(&buffer[off..])?;
            off += reg.serialized_size();
            map.entries.insert(key, reg);
        }
        Ok(map)
    }
}
