//! Compile-time platform detection.
//!
//! Mirrors `cauchy/platform.h` from the original: picks a cache line size
//! and double-width-CAS availability flag per target architecture, using
//! `cfg_if!` the same way this crate's `loom`/`std` shim picks its
//! primitives.

cfg_if::cfg_if! {
    if #[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))] {
        /// Bytes per cache line on this target.
        pub const CACHE_LINE_SIZE: usize = 64;
        /// Whether a 128-bit (double-width) CAS is available on this target.
        ///
        /// x86_64 has `CMPXCHG16B`; aarch64 has the `LDXP`/`STXP` pair. Both
        /// are exposed through [`crate::atomic::TaggedPtr`], which falls
        /// back to a spinlock-guarded pair of 64-bit words when this is
        /// `false` (stable Rust has no portable 128-bit atomic).
        pub const HAS_DWCAS: bool = true;
    } else if #[cfg(target_arch = "arm")] {
        pub const CACHE_LINE_SIZE: usize = 32;
        pub const HAS_DWCAS: bool = false;
    } else {
        pub const CACHE_LINE_SIZE: usize = 64;
        pub const HAS_DWCAS: bool = false;
    }
}

/// Hints the CPU that this thread is spinning, same role as
/// `CAUCHY_CPU_PAUSE()` in `platform.h`.
#[inline(always)]
pub fn cpu_pause() {
    core::hint::spin_loop();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_line_is_power_of_two() {
        assert!(CACHE_LINE_SIZE.is_power_of_two());
    }
}
