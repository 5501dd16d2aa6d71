//! Last-write-wins register, mirroring `cauchy_lww_*` in `lww_register.c`.
//!
//! The C source stores the value inline in a fixed `[u8; 256]` array; this
//! port keeps the same `MAX_VALUE_SIZE` ceiling as a validation rule (still
//! returning [`CauchyError::Full`] past it) but backs the value with an
//! owned `Vec<u8>` rather than a fixed buffer, since nothing downstream
//! depends on the register's own size being compile-time constant.

use super::{Crdt, CrdtKind};
use crate::error::{CauchyError, CauchyResult};

/// Ceiling on a register's value size, matching `CAUCHY_LWW_MAX_VALUE_SIZE`.
pub const MAX_VALUE_SIZE: usize = 256;

/// A single-value register resolved by `(timestamp, node_id)` total order.
#[derive(Debug, Clone, Default)]
pub struct LwwRegister {
    value: Vec<u8>,
    timestamp: u64,
    node_id: u64,
}

impl LwwRegister {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value if `(timestamp, node_id)` is strictly greater than the
    /// current stamp, lexicographically with `node_id` as the tie-break.
    /// Ties and older stamps are silently dropped. Never compares by value
    /// content or arrival order.
    pub fn set(&mut self, value: &[u8], timestamp: u64, node_id: u64) -> CauchyResult<()> {
        if value.len() > MAX_VALUE_SIZE {
            tracing::warn!(
                size = value.len(),
                max = MAX_VALUE_SIZE,
                "lww register rejected oversized value"
            );
            return Err(CauchyError::Full);
        }
        if timestamp > self.timestamp || (timestamp == self.timestamp && node_id > self.node_id) {
            self.value = value.to_vec();
            self.timestamp = timestamp;
            self.node_id = node_id;
        }
        Ok(())
    }

    pub fn get(&self) -> Option<&[u8]> {
        if self.value.is_empty() {
            None
        } else {
            Some(&self.value)
        }
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn node_id(&self) -> u64 {
        self.node_id
    }

    pub fn has_value(&self) -> bool {
        !self.value.is_empty()
    }
}

impl Crdt for LwwRegister {
    const KIND: CrdtKind = CrdtKind::LwwRegister;

    fn merge(&mut self, other: &LwwRegister) {
        if other.timestamp > self.timestamp
            || (other.timestamp == self.timestamp && other.node_id > self.node_id)
        {
            self.value = other.value.clone();
            self.timestamp = other.timestamp;
            self.node_id = other.node_id;
        }
    }

    fn equals(&self, other: &LwwRegister) -> bool {
        self.timestamp == other.timestamp
            && self.node_id == other.node_id
            && self.value == other.value
    }

    fn serialized_size(&self) -> usize {
        8 + 8 + 8 + self.value.len()
    }

    fn serialize(&self, buffer: &mut [u8]) -> usize {
        let needed = self.serialized_size();
        if buffer.len() < needed {
            return 0;
        }
        buffer[0..8].copy_from_slice(&self.timestamp.to_le_bytes());
        buffer[8..16].copy_from_slice(&self.node_id.to_le_bytes());
        buffer[16..24].copy_from_slice(&(self.value.len() as u64).to_le_bytes());
        buffer[24..24 + self.value.len()].copy_from_slice(&self.value);
        needed
    }

    fn deserialize(buffer: &[u8]) -> CauchyResult<LwwRegister> {
        if buffer.len() < 24 {
            return Err(CauchyError::Invalid);
        }
        let timestamp = u64::from_le_bytes(buffer[0..8].try_into().unwrap());
        let node_id = u64::from_le_bytes(buffer[8..16].try_into().unwrap());
        let value_size = u64::from_le_bytes(buffer[16..24].try_into().unwrap()) as usize;
        if value_size > MAX_VALUE_SIZE {
            return Err(CauchyError::Invalid);
        }
        if buffer.len() < 24 + value_size {
            return Err(CauchyError::Invalid);
        }
        Ok(LwwRegister {
            value: buffer[24..24 + value_size].to_vec(),
            timestamp,
            node_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tie_break_prefers_higher_node_id() {
        let mut reg = LwwRegister::new();
        reg.set(b"A", 5, 1).unwrap();
        reg.set(b"B", 5, 4).unwrap();
        assert_eq!(reg.get(), Some(&b"B"[..]));
        assert_eq!(reg.timestamp(), 5);
        assert_eq!(reg.node_id(), 4);
    }

    #[test]
    fn higher_timestamp_always_overwrites() {
        let mut reg = LwwRegister::new();
        reg.set(b"A", 1, 1).unwrap();
        reg.set(b"old", 0, 99).unwrap();
        assert_eq!(reg.get(), Some(&b"A"[..]));
        reg.set(b"B", 2, 0).unwrap();
        assert_eq!(reg.get(), Some(&b"B"[..]));
    }

    #[test]
    fn rejects_oversized_value() {
        let mut reg = LwwRegister::new();
        let big = vec![0u8; MAX_VALUE_SIZE + 1];
        assert_eq!(reg.set(&big, 1, 1), Err(CauchyError::Full));
    }

    #[test]
    fn merge_is_lattice_join_on_the_stamp() {
        let mut a = LwwRegister::new();
        a.set(b"A", 5, 1).unwrap();
        let mut b = LwwRegister::new();
        b.set(b"B", 5, 4).unwrap();

        let mut merged = a.clone();
        merged.merge(&b);
        assert!(merged.equals(&b));

        let mut merged2 = b.clone();
        merged2.merge(&a);
        assert!(merged2.equals(&b), "merge must be commutative here");
    }

    #[test]
    fn roundtrips_through_bytes() {
        let mut reg = LwwRegister::new();
        reg.set(b"hello", 42, 7).unwrap();
        let mut buf = vec![0u8; reg.serialized_size()];
        assert_eq!(reg.serialize(&mut buf), buf.len());
        let back = LwwRegister::deserialize(&buf).unwrap();
        assert!(reg.equals(&back));
    }
}
