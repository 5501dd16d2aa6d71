//! Per-node context, mirroring `cauchy_context_*` in `cauchy.h`: the
//! handle a local replica threads through every CRDT operation that needs
//! a fresh [`Uid`] or a causal timestamp.

use crate::hazard::HazardDomain;
use crate::pool::{Pool, PoolConfig};
use crate::uid::{NodeId, Uid};
use crate::vclock::{VectorClock, MAX_NODES};
use std::sync::Arc;

/// Owns one node's identity, its local vector clock, and shared handles
/// onto the lock-free substrate (pool, hazard domain) that CRDT instances
/// backed by pooled allocation can clone out of.
///
/// The original's `cauchy_context_create` can return `NULL` on allocator
/// exhaustion and the caller must unwind anything acquired before the
/// failure point. Nothing in this port's construction path is fallible —
/// `Pool::new` and `HazardDomain::new` both pre-allocate eagerly and abort
/// through the ordinary Rust allocator-exhaustion path rather than
/// returning an error — so there's no manual unwind to write: if a later
/// step here ever becomes fallible, expressing construction as a chain of
/// `?`-propagated steps gets the unwind for free from drop order.
pub struct NodeContext {
    node_id: NodeId,
    local_clock: VectorClock,
    mem_pool: Arc<Pool<[u8; 128]>>,
    hazard_domain: Arc<HazardDomain>,
}

impl NodeContext {
    /// Creates a context for `node_id` with a fresh, empty local clock and
    /// a freshly provisioned pool/hazard domain pair.
    ///
    /// The local clock is sized to [`MAX_NODES`] up front, matching
    /// `cauchy_context_create`'s own `cauchy_vclock_init(&ctx->local_clock,
    /// CAUCHY_MAX_NODES)` — a clock sized to just this one node would make
    /// `tick`/`gen_uid` silently no-op for any `node_id` other than 0, since
    /// every [`VectorClock`] mutator treats an out-of-range node as absent.
    pub fn create(node_id: NodeId) -> Self {
        Self {
            node_id,
            local_clock: VectorClock::new(MAX_NODES as u32),
            mem_pool: Arc::new(Pool::new(PoolConfig {
                initial_blocks: 4096,
                max_blocks: 0,
            })),
            hazard_domain: Arc::new(HazardDomain::new()),
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn local_clock(&self) -> &VectorClock {
        &self.local_clock
    }

    /// A handle onto this context's shared block pool, clonable into any
    /// CRDT or substrate structure that wants pool-backed allocation.
    pub fn mem_pool(&self) -> Arc<Pool<[u8; 128]>> {
        Arc::clone(&self.mem_pool)
    }

    pub fn hazard_domain(&self) -> Arc<HazardDomain> {
        Arc::clone(&self.hazard_domain)
    }

    /// Mints a fresh [`Uid`] by ticking the local clock and reading back
    /// this node's own entry, matching `cauchy_context_gen_uid`'s
    /// `cauchy_uid_create(ctx->node_id, cauchy_vclock_get(&ctx->local_clock,
    /// ctx->node_id))` — the minted timestamp is always exactly
    /// [`get_timestamp`](Self::get_timestamp), never a separate counter that
    /// could drift from it after a `tick`/`merge_clock` call.
    pub fn gen_uid(&mut self) -> Uid {
        self.tick();
        Uid::new(self.node_id, self.get_timestamp())
    }

    /// The current logical timestamp for this node (its own vector-clock
    /// entry), without advancing anything.
    pub fn get_timestamp(&self) -> u64 {
        self.local_clock.get(self.node_id as u32)
    }

    /// Advances the local clock for a local operation.
    pub fn tick(&mut self) {
        self.local_clock.increment(self.node_id as u32);
    }

    /// Merges a clock received from a remote peer into the local clock,
    /// then ticks this node's own entry — receiving the remote state is
    /// itself a local event that must be ordered after everything the
    /// merge just absorbed.
    pub fn merge_clock(&mut self, remote: &VectorClock) {
        self.local_clock.merge(remote);
        self.tick();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gen_uid_advances_timestamp_monotonically() {
        let mut ctx = NodeContext::create(7);
        let a = ctx.gen_uid();
        let b = ctx.gen_uid();
        assert!(b.timestamp > a.timestamp);
        assert_eq!(a.node_id, 7);
        assert_eq!(b.node_id, 7);
    }

    #[test]
    fn gen_uid_timestamp_always_matches_get_timestamp() {
        let mut ctx = NodeContext::create(3);
        ctx.tick();
        ctx.tick();
        ctx.tick();
        // a tick not immediately followed by gen_uid must not leave a
        // separately-tracked counter behind the clock's own entry.
        let uid = ctx.gen_uid();
        assert_eq!(uid.timestamp, ctx.get_timestamp());

        let mut remote = VectorClock::new(4);
        remote.set(3, 100);
        ctx.merge_clock(&remote);
        let uid2 = ctx.gen_uid();
        assert_eq!(uid2.timestamp, ctx.get_timestamp());
    }

    #[test]
    fn merge_clock_advances_but_never_decreases_local_timestamp() {
        let mut ctx = NodeContext::create(1);
        ctx.tick();
        ctx.tick();
        let before = ctx.get_timestamp();

        let mut remote = VectorClock::new(2);
        remote.set(1, 1); // behind local
        ctx.merge_clock(&remote);
        // merge_clock also ticks the local entry for the receive event
        // itself, so it always advances by at least one even when the
        // remote clock contributed nothing new.
        assert_eq!(ctx.get_timestamp(), before + 1);

        let mut ahead = VectorClock::new(2);
        ahead.set(1, 50);
        ctx.merge_clock(&ahead);
        assert_eq!(ctx.get_timestamp(), 51);
    }
}
