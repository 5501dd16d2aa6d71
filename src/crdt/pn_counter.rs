//! Positive-negative counter, mirroring `cauchy_pncounter_*` in
//! `pn_counter.c`: a pair of [`GCounter`]s, one for increments and one for
//! decrements.

use super::{Crdt, CrdtKind, GCounter};
use crate::error::CauchyResult;

/// A counter supporting both increment and decrement, represented as a pair
/// of grow-only counters.
#[derive(Debug, Clone, Copy)]
pub struct PnCounter {
    positive: GCounter,
    negative: GCounter,
}

impl PnCounter {
    pub fn new(num_nodes: u32) -> Self {
        Self {
            positive: GCounter::new(num_nodes),
            negative: GCounter::new(num_nodes),
        }
    }

    pub fn increment(&mut self, node_id: u32) {
        self.positive.increment(node_id);
    }

    pub fn decrement(&mut self, node_id: u32) {
        self.negative.increment(node_id);
    }

    /// Adds a signed delta, routing to the positive or negative half by
    /// sign, matching `cauchy_pncounter_add`.
    pub fn add(&mut self, node_id: u32, delta: i64) {
        if delta >= 0 {
            self.positive.add(node_id, delta as u64);
        } else {
            self.negative.add(node_id, delta.unsigned_abs());
        }
    }

    /// Signed value: sum(positive) - sum(negative).
    pub fn value(&self) -> i64 {
        self.positive.value() as i64 - self.negative.value() as i64
    }

    pub fn positive_sum(&self) -> u64 {
        self.positive.value()
    }

    pub fn negative_sum(&self) -> u64 {
        self.negative.value()
    }
}

impl Crdt for PnCounter {
    const KIND: CrdtKind = CrdtKind::PnCounter;

    fn merge(&mut self, other: &PnCounter) {
        self.positive.merge(&other.positive);
        self.negative.merge(&other.negative);
    }

    fn equals(&self, other: &PnCounter) -> bool {
        self.positive.equals(&other.positive) && self.negative.equals(&other.negative)
    }

    fn serialized_size(&self) -> usize {
        self.positive.serialized_size() + self.negative.serialized_size()
    }

    fn serialize(&self, buffer: &mut [u8]) -> usize {
        let needed = self.serialized_size();
        if buffer.len() < needed {
            return 0;
        }
        let pos_size = self.positive.serialize(buffer);
        if pos_size == 0 {
            return 0;
        }
        let neg_size = self.negative.serialize(&mut buffer[pos_size..]);
        if neg_size == 0 {
            return 0;
        }
        pos_size + neg_size
    }

    fn deserialize(buffer: &[u8]) -> CauchyResult<PnCounter> {
        let positive = GCounter::deserialize(buffer)?;
        let pos_size = positive.serialized_size();
        let negative = GCounter::deserialize(&buffer[pos_size..])?;
        Ok(PnCounter { positive, negative })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_node_sign_scenario() {
        let mut n0 = PnCounter::new(2);
        n0.add(0, 10);
        n0.add(0, -3);
        let mut n1 = PnCounter::new(2);
        n1.add(1, 5);
        n1.add(1, -7);

        n0.merge(&n1);
        n1.merge(&n0);

        assert_eq!(n0.value(), 5);
        assert_eq!(n1.value(), 5);
    }

    #[test]
    fn roundtrips_through_bytes() {
        let mut pn = PnCounter::new(2);
        pn.add(0, 4);
        pn.add(1, -9);
        let mut buf = vec![0u8; pn.serialized_size()];
        assert_eq!(pn.serialize(&mut buf), buf.len());
        let back = PnCounter::deserialize(&buf).unwrap();
        assert!(pn.equals(&back));
        assert_eq!(back.value(), pn.value());
    }
}
