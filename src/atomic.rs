//! Atomic primitives with the required memory orderings fixed in one
//! place, mirroring `cauchy/atomic.h`'s wrapper layer over
//! `<stdatomic.h>`.
//!
//! Ordering guarantees: acquire on load, release on store, acq_rel on
//! read-modify-write, and a sequentially consistent fence between hazard
//! publication and reload. Callers never pick an ordering themselves; they
//! call `load`/`store`/`cas` and get the one correct choice.

use core::sync::atomic::Ordering;
use std::sync::Mutex;

/// Loads `ptr` with acquire semantics.
#[inline(always)]
pub(crate) fn load_ptr<T>(ptr: &crate::loom::AtomicPtr<T>) -> *mut T {
    ptr.load(Ordering::Acquire)
}

/// Stores `val` into `ptr` with release semantics.
#[inline(always)]
pub(crate) fn store_ptr<T>(ptr: &crate::loom::AtomicPtr<T>, val: *mut T) {
    ptr.store(val, Ordering::Release);
}

/// Strong CAS with acq_rel success ordering / acquire failure ordering, the
/// ordering pair the Treiber stack in `pool` and the hazard record list both
/// need.
#[inline(always)]
pub(crate) fn cas_ptr<T>(
    ptr: &crate::loom::AtomicPtr<T>,
    current: *mut T,
    new: *mut T,
) -> Result<*mut T, *mut T> {
    ptr.compare_exchange(current, new, Ordering::AcqRel, Ordering::Acquire)
}

/// Sequentially consistent fence, used between publishing a hazard pointer
/// and reloading the source to check it didn't change underneath.
#[inline(always)]
pub(crate) fn seq_cst_fence() {
    crate::loom::fence(Ordering::SeqCst);
}

/// A `(pointer, generation tag)` pair for ABA-resistant lock-free structures.
///
/// On platforms with [`crate::platform::HAS_DWCAS`], this would ideally be a
/// single 128-bit atomic CAS; stable Rust exposes no portable 128-bit atomic
/// type, so every target uses the same representation here: a pointer-sized
/// atomic word for the pointer and a 64-bit atomic counter for the tag,
/// updated together under a narrow spinlock. This crate's block pool and
/// hazard domain don't need ABA resistance beyond "pool blocks are never
/// returned to the OS during the pool's lifetime" (§4.1), so `TaggedPtr` is
/// infrastructure for future lock-free OR-Set/RGA node tables rather than
/// something the current CRDTs call into.
pub struct TaggedPtr<T> {
    inner: Mutex<(*mut T, u64)>,
}

// SAFETY: access to `inner` is always through the mutex; `T` itself is never
// read or written here, only its address, so `T: Send` is unnecessary.
unsafe impl<T> Send for TaggedPtr<T> {}
unsafe impl<T> Sync for TaggedPtr<T> {}

impl<T> TaggedPtr<T> {
    /// Creates a tagged pointer starting at `ptr` with generation tag `0`.
    pub fn new(ptr: *mut T) -> Self {
        Self {
            inner: Mutex::new((ptr, 0)),
        }
    }

    /// Loads the current `(pointer, tag)` pair.
    pub fn load(&self) -> (*mut T, u64) {
        *self.inner.lock().unwrap()
    }

    /// Compare-and-swaps both the pointer and tag, bumping the tag on
    /// success so a stale `(pointer, tag)` observation can never be
    /// mistaken for the current one even if the pointer is later reused.
    pub fn cas(&self, expected: (*mut T, u64), new_ptr: *mut T) -> bool {
        let mut guard = self.inner.lock().unwrap();
        if *guard == expected {
            *guard = (new_ptr, expected.1.wrapping_add(1));
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_ptr_cas_bumps_generation() {
        let a = 1u32;
        let b = 2u32;
        let tp = TaggedPtr::new(&a as *const u32 as *mut u32);
        let observed = tp.load();
        assert_eq!(observed.1, 0);
        assert!(tp.cas(observed, &b as *const u32 as *mut u32));
        let next = tp.load();
        assert_eq!(next.1, 1);
        assert_eq!(next.0, &b as *const u32 as *mut u32);
        // stale CAS using the old generation must fail even if the pointer matches.
        assert!(!tp.cas(observed, &a as *const u32 as *mut u32));
    }
}
