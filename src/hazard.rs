//! Hazard pointer domain for safe lock-free memory reclamation, mirroring
//! `cauchy_hazard_*` in `hazard.c`.
//!
//! The C source keys a per-thread `hazard_record_t` into a CAS-linked list,
//! caches it in `_Thread_local` storage, and retires nodes onto that
//! record's own (un-shared) list until a high-water mark triggers a scan;
//! reclaim only ever walks the CALLING thread's retired list, checking each
//! node against every active record's announced hazards. This port keeps
//! that exact shape. The one place it diverges from a literal port: instead
//! of a `(retire_fn, ctx)` function-pointer pair, retirement takes an
//! `FnOnce` closure, and the type-erased pointer carries its own drop glue —
//! the natural Rust shape for "run this cleanup later," grounded in the
//! `Shield`/closure-based reclamation idiom from the hazard-pointer
//! reference implementation in the example pack.

use crate::atomic::{cas_ptr, load_ptr, store_ptr};
use crate::loom::{AtomicBool, AtomicPtr, AtomicU32};
use crate::malloc;
use crate::platform::CACHE_LINE_SIZE;
use crate::pool::{Pool, PoolConfig};
use core::sync::atomic::Ordering;
use std::cell::Cell;
use std::mem;
use std::ptr::NonNull;

/// Hazard pointer slots per thread, matching `CAUCHY_MAX_HAZARD_POINTERS`.
pub const MAX_HAZARD_POINTERS: usize = 4;
/// Reclaim threshold scale factor, matching `CAUCHY_MAX_HAZARD_THREADS`.
const MAX_HAZARD_THREADS: usize = 128;

struct Record {
    hazards: [AtomicPtr<()>; MAX_HAZARD_POINTERS],
    active: AtomicBool,
    retired_list: Cell<*mut RetiredSlot>,
    retired_count: Cell<u32>,
    next: *mut Record,
}

// SAFETY: `retired_list`/`retired_count` are only ever touched by the thread
// that owns this record (enforced by the `active` CAS handshake in
// `record_for`), exactly as in the C source.
unsafe impl Send for Record {}
unsafe impl Sync for Record {}

struct RetiredSlot {
    ptr: *mut (),
    reclaim: Option<Box<dyn FnOnce(*mut ()) + Send>>,
    next: *mut RetiredSlot,
}

// SAFETY: `reclaim` is `Send`; the slot is only reachable through the pool
// or a single thread's retired list at any one time.
unsafe impl Send for RetiredSlot {}

thread_local! {
    static TLS: Cell<Option<(*const HazardDomain, *mut Record)>> = const { Cell::new(None) };
}

/// A domain of hazard-protected pointers, shared by every thread that needs
/// to safely reclaim nodes a lock-free structure might still be traversing.
pub struct HazardDomain {
    head: AtomicPtr<Record>,
    record_count: AtomicU32,
    retired_pool: Pool<RetiredSlot>,
}

// SAFETY: all shared mutable state (`head`, the records it points to, the
// pool) is reached only through atomics or through a record whose `active`
// flag is exclusively owned by one thread at a time.
unsafe impl Send for HazardDomain {}
unsafe impl Sync for HazardDomain {}

impl HazardDomain {
    /// Creates an empty domain with a pre-sized pool of retired-node slots,
    /// matching `cauchy_hazard_domain_create`'s 256-slot default.
    pub fn new() -> Self {
        Self {
            head: AtomicPtr::new(core::ptr::null_mut()),
            record_count: AtomicU32::new(0),
            retired_pool: Pool::new(PoolConfig {
                initial_blocks: 256,
                max_blocks: 0,
            }),
        }
    }

    fn record_for(&self) -> &Record {
        let self_ptr = self as *const HazardDomain;
        if let Some((domain, rec)) = TLS.with(|t| t.get()) {
            if domain == self_ptr {
                // SAFETY: cached while `active` stays true for this thread.
                return unsafe { &*rec };
            }
        }

        let mut rec = load_ptr(&self.head);
        while !rec.is_null() {
            // SAFETY: records are never freed while the domain lives.
            let r = unsafe { &*rec };
            if r.active
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                TLS.with(|t| t.set(Some((self_ptr, rec))));
                return r;
            }
            rec = r.next;
        }

        self.create_record(self_ptr)
    }

    fn create_record(&self, self_ptr: *const HazardDomain) -> &Record {
        let layout_align = CACHE_LINE_SIZE.max(mem::align_of::<Record>());
        let raw = malloc::aligned_alloc(mem::size_of::<Record>(), layout_align)
            .expect("hazard record allocation failed");
        let rec_ptr = raw.as_ptr() as *mut Record;
        // SAFETY: `raw` is freshly allocated, exactly `size_of::<Record>()`.
        unsafe {
            rec_ptr.write(Record {
                hazards: [(); MAX_HAZARD_POINTERS]
                    .map(|_| AtomicPtr::new(core::ptr::null_mut())),
                active: AtomicBool::new(true),
                retired_list: Cell::new(core::ptr::null_mut()),
                retired_count: Cell::new(0),
                next: core::ptr::null_mut(),
            });
        }

        loop {
            let head = load_ptr(&self.head);
            // SAFETY: `rec_ptr` is owned exclusively until linked in.
            unsafe { (*rec_ptr).next = head };
            if cas_ptr(&self.head, head, rec_ptr).is_ok() {
                break;
            }
        }
        let count = self.record_count.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(record_count = count, "hazard domain claimed a new thread record");
        TLS.with(|t| t.set(Some((self_ptr, rec_ptr))));
        // SAFETY: just linked, still live for the rest of this call.
        unsafe { &*rec_ptr }
    }

    /// Announces that the calling thread intends to dereference the value
    /// currently stored in `src`, repeating the load until it's stable under
    /// the published hazard, exactly as `cauchy_hazard_protect` does.
    pub fn protect<'d, T>(&'d self, hp_index: usize, src: &crate::loom::AtomicPtr<T>) -> Shield<'d, T> {
        assert!(hp_index < MAX_HAZARD_POINTERS, "hazard index out of range");
        let rec = self.record_for();
        loop {
            let ptr = load_ptr(src);
            store_ptr(&rec.hazards[hp_index], ptr as *mut ());
            crate::atomic::seq_cst_fence();
            if load_ptr(src) == ptr {
                return Shield {
                    domain: self,
                    index: hp_index,
                    ptr,
                };
            }
        }
    }

    fn clear(&self, hp_index: usize) {
        let rec = self.record_for();
        store_ptr(&rec.hazards[hp_index], core::ptr::null_mut());
    }

    /// Defers reclamation of `ptr` until no thread's hazard slots point at
    /// it. `reclaim` runs either from a later [`Self::reclaim`] call on this
    /// thread, or synchronously right now if the retired-slot pool is
    /// exhausted — the same degraded-but-safe fallback `cauchy_hazard_retire`
    /// takes when its pool allocation fails.
    pub fn retire<T: Send + 'static>(
        &self,
        ptr: NonNull<T>,
        reclaim: impl FnOnce(NonNull<T>) + Send + 'static,
    ) {
        let erased = ptr.as_ptr() as *mut ();
        let reclaim_erased: Box<dyn FnOnce(*mut ()) + Send> = Box::new(move |p: *mut ()| {
            // SAFETY: `p` is `erased`, recovered to its original type.
            reclaim(unsafe { NonNull::new_unchecked(p as *mut T) });
        });

        let rec = self.record_for();

        let slot = match self.retired_pool.alloc() {
            Some(slot) => slot,
            None => {
                tracing::warn!("retired-slot pool exhausted, reclaiming synchronously");
                reclaim_erased(erased);
                return;
            }
        };
        // SAFETY: `slot` is a freshly checked-out, uninitialized pool block.
        unsafe {
            slot.as_ptr().write(RetiredSlot {
                ptr: erased,
                reclaim: Some(reclaim_erased),
                next: rec.retired_list.get(),
            });
        }
        rec.retired_list.set(slot.as_ptr());
        rec.retired_count.set(rec.retired_count.get() + 1);

        if rec.retired_count.get() as usize >= MAX_HAZARD_THREADS * MAX_HAZARD_POINTERS * 2 {
            self.reclaim();
        }
    }

    fn is_hazardous(&self, ptr: *mut ()) -> bool {
        let mut rec = load_ptr(&self.head);
        while !rec.is_null() {
            // SAFETY: records outlive the domain's lifetime.
            let r = unsafe { &*rec };
            if r.active.load(Ordering::Acquire) {
                if r.hazards.iter().any(|h| load_ptr(h) == ptr) {
                    return true;
                }
            }
            rec = r.next;
        }
        false
    }

    /// Scans the calling thread's own retired list, running the reclaim
    /// closure for every node no longer hazardous anywhere, and returns how
    /// many were reclaimed. Mirrors `cauchy_hazard_reclaim`: only ever
    /// touches the caller's own list, never another thread's.
    pub fn reclaim(&self) -> usize {
        let rec = self.record_for();
        let mut reclaimed = 0usize;
        let mut prev: *mut RetiredSlot = core::ptr::null_mut();
        let mut curr = rec.retired_list.get();

        while !curr.is_null() {
            // SAFETY: `curr` is on this thread's own retired list.
            let slot = unsafe { &mut *curr };
            let next = slot.next;

            if !self.is_hazardous(slot.ptr) {
                if let Some(reclaim) = slot.reclaim.take() {
                    reclaim(slot.ptr);
                }
                if prev.is_null() {
                    rec.retired_list.set(next);
                } else {
                    // SAFETY: `prev` is still on this thread's own list.
                    unsafe { (*prev).next = next };
                }
                let freed = unsafe { NonNull::new_unchecked(curr) };
                // SAFETY: `freed` was checked out from `retired_pool`.
                unsafe { self.retired_pool.free(freed) };
                rec.retired_count.set(rec.retired_count.get() - 1);
                reclaimed += 1;
            } else {
                prev = curr;
            }
            curr = next;
        }

        if reclaimed > 0 {
            tracing::trace!(reclaimed, "hazard domain reclaimed retired nodes");
        }
        reclaimed
    }

    /// Number of distinct thread records this domain has ever handed out.
    pub fn record_count(&self) -> u32 {
        self.record_count.load(Ordering::Relaxed)
    }
}

impl Default for HazardDomain {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for HazardDomain {
    fn drop(&mut self) {
        let mut rec = load_ptr(&self.head);
        while !rec.is_null() {
            // SAFETY: exclusive access, nothing else references the domain
            // anymore during drop.
            let r = unsafe { &mut *rec };
            let next = r.next;

            let mut curr = r.retired_list.get();
            while !curr.is_null() {
                let slot = unsafe { &mut *curr };
                let slot_next = slot.next;
                if let Some(reclaim) = slot.reclaim.take() {
                    reclaim(slot.ptr);
                }
                curr = slot_next;
            }

            let layout_align = CACHE_LINE_SIZE.max(mem::align_of::<Record>());
            unsafe {
                malloc::aligned_free(
                    NonNull::new_unchecked(rec as *mut u8),
                    mem::size_of::<Record>(),
                    layout_align,
                );
            }
            rec = next;
        }
    }
}

/// RAII guard returned by [`HazardDomain::protect`]; clears the published
/// hazard slot on drop instead of requiring a paired
/// [`HazardDomain::clear`](crate) call, the one place this port improves on
/// the C source's "caller remembers to unprotect" contract.
pub struct Shield<'d, T> {
    domain: &'d HazardDomain,
    index: usize,
    ptr: *mut T,
}

impl<T> Shield<'_, T> {
    /// The protected pointer, possibly null if the source was empty when
    /// protected.
    pub fn get(&self) -> *mut T {
        self.ptr
    }
}

impl<T> Drop for Shield<'_, T> {
    fn drop(&mut self) {
        self.domain.clear(self.index);
    }
}

/// Ensures a thread's cached record is released back to the pool of
/// inactive records when it exits, matching the effect (if not the
/// mechanism) of the C source relying on process teardown. Rust gives
/// threads an exit hook; the C source has no equivalent and simply leaks an
/// `active = true` record for the lifetime of the domain once a thread
/// touches it; this port reclaims the slot.
struct ThreadExitGuard;

impl Drop for ThreadExitGuard {
    fn drop(&mut self) {
        if let Some((_domain, rec)) = TLS.with(|t| t.get()) {
            // SAFETY: the domain outlives any thread using it in practice;
            // if it didn't, `rec` would already be dangling and this whole
            // cache would be unsound regardless of this guard.
            unsafe { (*rec).active.store(false, Ordering::Release) };
        }
    }
}

thread_local! {
    static EXIT_GUARD: ThreadExitGuard = const { ThreadExitGuard };
}

/// Registers the calling thread for hazard-record release on exit. Cheap
/// and idempotent; call once per thread that will use hazard domains, or
/// not at all (the record is simply held until the domain drops).
pub fn register_thread_exit_hook() {
    EXIT_GUARD.with(|_| {});
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loom::AtomicPtr as LoomAtomicPtr;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn protect_observes_live_value() {
        let domain = HazardDomain::new();
        let mut value = 7u32;
        let src: LoomAtomicPtr<u32> = LoomAtomicPtr::new(&mut value as *mut u32);
        let shield = domain.protect(0, &src);
        assert_eq!(unsafe { *shield.get() }, 7);
    }

    #[test]
    fn retire_reclaims_when_not_hazardous() {
        let domain = HazardDomain::new();
        let reclaimed_flag = Arc::new(AtomicUsize::new(0));
        let flag = reclaimed_flag.clone();
        let boxed = Box::new(123u32);
        let ptr = NonNull::new(Box::into_raw(boxed)).unwrap();

        domain.retire(ptr, move |p| {
            flag.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            unsafe { drop(Box::from_raw(p.as_ptr())) };
        });

        let n = domain.reclaim();
        assert_eq!(n, 1);
        assert_eq!(reclaimed_flag.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn retire_defers_while_hazardous() {
        let domain = HazardDomain::new();
        let mut value = 5u32;
        let src: LoomAtomicPtr<u32> = LoomAtomicPtr::new(&mut value as *mut u32);
        let shield = domain.protect(1, &src);

        let boxed_ptr = shield.get();
        let nn = NonNull::new(boxed_ptr).unwrap();
        let reclaimed_flag = Arc::new(AtomicUsize::new(0));
        let flag = reclaimed_flag.clone();
        domain.retire(nn, move |_| {
            flag.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });

        let n = domain.reclaim();
        assert_eq!(n, 0, "still hazardous, must not reclaim yet");
        drop(shield);
        let n = domain.reclaim();
        assert_eq!(n, 1);
    }
}
