//! Lock-free block pool: a Treiber-stack free list over cache-aligned raw
//! blocks, mirroring `cauchy_pool_*` in `memory.c`.
//!
//! Unlike the C source (which hands back untyped `void*` blocks sized by a
//! runtime `block_size`), this pool is generic over `T` and sized by
//! `size_of::<T>()`/`align_of::<T>()` at compile time — the hazard domain's
//! `RetiredNode` descriptors and any future fixed-size CRDT node types are
//! the intended callers, so there's no need to reproduce the C version's
//! untyped byte-block API.

use crate::atomic::{cas_ptr, load_ptr, store_ptr};
use crate::loom::{AtomicPtr, AtomicU64};
use crate::malloc;
use crate::platform::CACHE_LINE_SIZE;
use core::sync::atomic::Ordering;
use std::mem;
use std::ptr::{addr_of_mut, NonNull};

/// A single free-list node. Occupies the same storage as the block it
/// describes once freed, same as `pool_node_t` in the C source.
struct Node<T> {
    next: *mut Node<T>,
    value: mem::MaybeUninit<T>,
}

/// Configuration for a [`Pool`], mirroring `cauchy_pool_config_t`.
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    /// Number of blocks to pre-allocate at construction.
    pub initial_blocks: usize,
    /// Maximum blocks the pool will ever hand out (`0` = unlimited), matching
    /// `cauchy_pool_config_t::max_blocks`.
    pub max_blocks: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        // the C source defaults to 1024 initial blocks, unlimited max.
        Self {
            initial_blocks: 1024,
            max_blocks: 0,
        }
    }
}

/// Point-in-time pool statistics, mirroring `cauchy_pool_stats_t`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolStats {
    /// Blocks currently handed out from the bulk pre-allocation or freshly
    /// allocated, minus anything freed back.
    pub allocated: u64,
    /// Blocks returned via [`Pool::free`] over the pool's lifetime.
    pub freed: u64,
    /// Blocks currently checked out (`allocated - freed`).
    pub in_use: u64,
    /// The highest `in_use` has ever been.
    pub peak_use: u64,
    /// Total successful [`Pool::alloc`] calls over the pool's lifetime.
    pub total_allocs: u64,
    /// CAS retries lost racing another thread for the free-list head.
    ///
    /// The C source declares this field but never increments it anywhere in
    /// `memory.c`; this port actually tracks it, bumping it on every lost
    /// CAS in both `alloc`'s and `free`'s retry loops, since a stats struct
    /// with a field nobody writes is a bug waiting to be noticed rather than
    /// a feature worth preserving.
    pub contention: u64,
}

/// A lock-free pool of fixed-size, cache-aligned blocks for `T`.
pub struct Pool<T> {
    free_list: AtomicPtr<Node<T>>,
    allocated: AtomicU64,
    freed: AtomicU64,
    peak_use: AtomicU64,
    total_allocs: AtomicU64,
    contention: AtomicU64,
    max_blocks: usize,
    base_memory: Option<NonNull<u8>>,
    base_size: usize,
}

// SAFETY: all mutable state is reached only through atomics; `T` need not be
// `Sync` since no two threads ever observe the same live `T` concurrently
// through the pool itself (only through whatever protects the checked-out
// value, e.g. the hazard domain).
unsafe impl<T: Send> Send for Pool<T> {}
unsafe impl<T: Send> Sync for Pool<T> {}

impl<T> Pool<T> {
    /// Creates a pool, pre-allocating `config.initial_blocks` blocks from one
    /// bulk allocation (freed together on drop), same as `base_memory` in the
    /// C source.
    pub fn new(config: PoolConfig) -> Self {
        let block_align = CACHE_LINE_SIZE.max(mem::align_of::<Node<T>>());
        let block_size = mem::size_of::<Node<T>>();

        let mut pool = Self {
            free_list: AtomicPtr::new(core::ptr::null_mut()),
            allocated: AtomicU64::new(0),
            freed: AtomicU64::new(0),
            peak_use: AtomicU64::new(0),
            total_allocs: AtomicU64::new(0),
            contention: AtomicU64::new(0),
            max_blocks: config.max_blocks,
            base_memory: None,
            base_size: 0,
        };

        if config.initial_blocks > 0 && block_size > 0 {
            let total_size = block_size * config.initial_blocks;
            if let Some(base) = malloc::aligned_alloc(total_size, block_align) {
                pool.base_memory = Some(base);
                pool.base_size = total_size;

                let mut block = base.as_ptr();
                for _ in 0..config.initial_blocks {
                    let node = block as *mut Node<T>;
                    // SAFETY: `node` points into the bulk allocation we just
                    // made; `next` is the only field that needs initializing
                    // before this node is pushed onto the free list.
                    unsafe {
                        (*node).next = load_ptr(&pool.free_list);
                    }
                    store_ptr(&pool.free_list, node);
                    // SAFETY: `block_size` bytes is exactly one `Node<T>`, so
                    // advancing by it never leaves the bulk allocation.
                    block = unsafe { block.add(block_size) };
                }
                pool.allocated
                    .store(config.initial_blocks as u64, Ordering::Relaxed);
            }
        }

        pool
    }

    /// Checks out a block, taking one from the free list if available and
    /// falling back to a fresh allocation otherwise, same fallback order as
    /// `cauchy_pool_alloc`.
    pub fn alloc(&self) -> Option<NonNull<T>> {
        self.total_allocs.fetch_add(1, Ordering::Relaxed);

        if self.max_blocks != 0 {
            let allocated = self.allocated.load(Ordering::Relaxed);
            let freed = self.freed.load(Ordering::Relaxed);
            if allocated.saturating_sub(freed) >= self.max_blocks as u64 {
                return None;
            }
        }

        loop {
            let head = load_ptr(&self.free_list);
            if head.is_null() {
                return self.alloc_fresh();
            }
            // SAFETY: `head` came from the free list; nodes are only ever
            // unlinked here under successful CAS, so it's still live.
            let next = unsafe { (*head).next };
            if cas_ptr(&self.free_list, head, next).is_ok() {
                self.bump_peak();
                let value_ptr = unsafe { addr_of_mut!((*head).value) } as *mut T;
                return NonNull::new(value_ptr);
            }
            self.contention.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn alloc_fresh(&self) -> Option<NonNull<T>> {
        let block_align = CACHE_LINE_SIZE.max(mem::align_of::<Node<T>>());
        let block_size = mem::size_of::<Node<T>>();
        let raw = match malloc::aligned_alloc(block_size, block_align) {
            Some(raw) => raw,
            None => {
                tracing::warn!(block_size, block_align, "pool exhausted, fresh allocation failed");
                return None;
            }
        };
        tracing::trace!(block_size, "pool free list empty, falling back to fresh allocation");
        self.allocated.fetch_add(1, Ordering::Relaxed);
        self.bump_peak();
        let node = raw.as_ptr() as *mut Node<T>;
        let value_ptr = unsafe { addr_of_mut!((*node).value) } as *mut T;
        NonNull::new(value_ptr)
    }

    fn bump_peak(&self) {
        let in_use = self
            .allocated
            .load(Ordering::Relaxed)
            .saturating_sub(self.freed.load(Ordering::Relaxed));
        let mut peak = self.peak_use.load(Ordering::Relaxed);
        while in_use > peak {
            match self.peak_use.compare_exchange(
                peak,
                in_use,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => peak = observed,
            }
        }
    }

    /// Returns a block to the free list, same as `cauchy_pool_free`.
    ///
    /// # Safety
    ///
    /// `block` must have come from this pool's [`alloc`](Self::alloc) and
    /// must not already be back on the free list.
    pub unsafe fn free(&self, block: NonNull<T>) {
        let node = block.as_ptr() as *mut Node<T>;
        loop {
            let head = load_ptr(&self.free_list);
            (*node).next = head;
            if cas_ptr(&self.free_list, head, node).is_ok() {
                break;
            }
            self.contention.fetch_add(1, Ordering::Relaxed);
        }
        self.freed.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot of the pool's counters.
    pub fn stats(&self) -> PoolStats {
        let allocated = self.allocated.load(Ordering::Relaxed);
        let freed = self.freed.load(Ordering::Relaxed);
        PoolStats {
            allocated,
            freed,
            in_use: allocated.saturating_sub(freed),
            peak_use: self.peak_use.load(Ordering::Relaxed),
            total_allocs: self.total_allocs.load(Ordering::Relaxed),
            contention: self.contention.load(Ordering::Relaxed),
        }
    }
}

impl<T> Drop for Pool<T> {
    fn drop(&mut self) {
        if let Some(base) = self.base_memory {
            let block_align = CACHE_LINE_SIZE.max(mem::align_of::<Node<T>>());
            // SAFETY: `base` was allocated by `malloc::aligned_alloc` with
            // exactly this size/align in `new`.
            unsafe { malloc::aligned_free(base, self.base_size, block_align) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_reuses_freed_blocks() {
        let pool: Pool<u64> = Pool::new(PoolConfig {
            initial_blocks: 0,
            max_blocks: 0,
        });
        let a = pool.alloc().unwrap();
        unsafe { a.as_ptr().write(42) };
        unsafe { pool.free(a) };
        let b = pool.alloc().unwrap();
        assert_eq!(a, b);
        let stats = pool.stats();
        assert_eq!(stats.allocated, 1);
        assert_eq!(stats.freed, 1);
    }

    #[test]
    fn respects_max_blocks() {
        let pool: Pool<u64> = Pool::new(PoolConfig {
            initial_blocks: 0,
            max_blocks: 1,
        });
        let a = pool.alloc();
        assert!(a.is_some());
        let b = pool.alloc();
        assert!(b.is_none());
    }

    #[test]
    fn preallocates_initial_blocks() {
        let pool: Pool<u64> = Pool::new(PoolConfig {
            initial_blocks: 8,
            max_blocks: 0,
        });
        assert_eq!(pool.stats().allocated, 8);
        let a = pool.alloc();
        assert!(a.is_some());
        assert_eq!(pool.stats().in_use, 1);
    }
}
