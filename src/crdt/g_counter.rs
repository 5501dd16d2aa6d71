//! Grow-only counter, mirroring `cauchy_gcounter_*` in `g_counter.c`: one
//! monotonic counter per node, value is the sum, merge is element-wise max.

use super::{Crdt, CrdtKind};
use crate::error::{CauchyError, CauchyResult};
use crate::vclock::{Causality, MAX_NODES};

/// A grow-only counter across up to [`MAX_NODES`] nodes.
#[derive(Debug, Clone, Copy)]
pub struct GCounter {
    counts: [u64; MAX_NODES],
    num_nodes: u32,
}

impl GCounter {
    pub fn new(num_nodes: u32) -> Self {
        Self {
            counts: [0; MAX_NODES],
            num_nodes: num_nodes.min(MAX_NODES as u32),
        }
    }

    pub fn num_nodes(&self) -> u32 {
        self.num_nodes
    }

    /// Increments `node_id`'s own counter by one. Out-of-range ids are
    /// silently ignored, never faulted.
    pub fn increment(&mut self, node_id: u32) {
        self.add(node_id, 1);
    }

    /// Increments `node_id`'s own counter by `delta`.
    pub fn add(&mut self, node_id: u32, delta: u64) {
        if node_id < self.num_nodes {
            self.counts[node_id as usize] = self.counts[node_id as usize].wrapping_add(delta);
        }
    }

    /// Sum across all nodes — the counter's externally visible value.
    pub fn value(&self) -> u64 {
        self.counts[..self.num_nodes as usize]
            .iter()
            .fold(0u64, |acc, &c| acc.wrapping_add(c))
    }

    /// This node's own count, or `0` if out of range.
    pub fn get(&self, node_id: u32) -> u64 {
        if node_id < self.num_nodes {
            self.counts[node_id as usize]
        } else {
            0
        }
    }

    /// Causal comparison under the same per-entry partial order as
    /// [`crate::vclock::VectorClock::compare`].
    pub fn compare(&self, other: &GCounter) -> Causality {
        let max_nodes = self.num_nodes.max(other.num_nodes) as usize;
        let mut less = false;
        let mut greater = false;
        for i in 0..max_nodes {
            let a = self.get(i as u32);
            let b = other.get(i as u32);
            if a < b {
                less = true;
            }
            if a > b {
                greater = true;
            }
        }
        match (less, greater) {
            (false, false) => Causality::Equal,
            (true, false) => Causality::HappensBefore,
            (false, true) => Causality::HappensAfter,
            (true, true) => Causality::Concurrent,
        }
    }
}

impl Crdt for GCounter {
    const KIND: CrdtKind = CrdtKind::GCounter;

    fn merge(&mut self, other: &GCounter) {
        let max_nodes = self.num_nodes.max(other.num_nodes) as usize;
        for i in 0..max_nodes {
            let src = if i < other.num_nodes as usize {
                other.counts[i]
            } else {
                0
            };
            if src > self.counts[i] {
                self.counts[i] = src;
            }
        }
        if other.num_nodes > self.num_nodes {
            self.num_nodes = other.num_nodes;
        }
    }

    fn equals(&self, other: &GCounter) -> bool {
        self.num_nodes == other.num_nodes
            && self.counts[..self.num_nodes as usize] == other.counts[..other.num_nodes as usize]
    }

    fn serialized_size(&self) -> usize {
        4 + self.num_nodes as usize * 8
    }

    fn serialize(&self, buffer: &mut [u8]) -> usize {
        let needed = self.serialized_size();
        if buffer.len() < needed {
            return 0;
        }
        buffer[0..4].copy_from_slice(&self.num_nodes.to_le_bytes());
        for (i, &c) in self.counts[..self.num_nodes as usize].iter().enumerate() {
            let off = 4 + i * 8;
            buffer[off..off + 8].copy_from_slice(&c.to_le_bytes());
        }
        needed
    }

    fn deserialize(buffer: &[u8]) -> CauchyResult<GCounter> {
        if buffer.len() < 4 {
            return Err(CauchyError::Invalid);
        }
        let num_nodes = u32::from_le_bytes(buffer[0..4].try_into().unwrap());
        if num_nodes > MAX_NODES as u32 {
            return Err(CauchyError::Invalid);
        }
        let needed = 4 + num_nodes as usize * 8;
        if buffer.len() < needed {
            return Err(CauchyError::Invalid);
        }
        let mut gc = GCounter::new(num_nodes);
        for i in 0..num_nodes as usize {
            let off = 4 + i * 8;
            gc.counts[i] = u64::from_le_bytes(buffer[off..off + 8].try_into().unwrap());
        }
        Ok(gc)
    }
}
