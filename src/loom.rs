//! Loom/std shim: under `--cfg loom` the lock-free substrate (`pool`,
//! `hazard`) is built against `loom`'s shadow atomics and thread-locals so
//! its model checker can exhaustively explore interleavings; otherwise
//! it's plain `core`/`std`.

cfg_if::cfg_if! {
    if #[cfg(loom)] {
        pub(crate) use loom::sync::atomic::{AtomicBool, AtomicPtr, AtomicU32, AtomicU64, AtomicUsize, fence};
        pub(crate) use loom::thread;
    } else {
        pub(crate) use core::sync::atomic::{AtomicBool, AtomicPtr, AtomicU32, AtomicU64, AtomicUsize, fence};
        pub(crate) use std::thread;
    }
}
