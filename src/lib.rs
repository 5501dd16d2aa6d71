#![deny(missing_docs)]
#![doc = include_str!("../README.md")]

mod atomic;
mod context;
mod error;
mod hash;
mod hazard;
mod loom;
mod malloc;
mod platform;
mod pool;
mod uid;
mod vclock;

pub mod crdt;

pub use context::NodeContext;
pub use crdt::{Crdt, CrdtKind};
pub use error::{CauchyError, CauchyResult, ResultCode};
pub use hazard::{HazardDomain, Shield};
pub use pool::{Pool, PoolConfig, PoolStats};
pub use uid::{NodeId, Timestamp, Uid};
pub use vclock::{Causality, VectorClock, MAX_NODES};

use crate::loom::AtomicBool;
use std::sync::atomic::Ordering;

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Brings the library to a ready state. Idempotent — calling it again once
/// already initialized is a no-op, mirroring `cauchy_init`'s contract that
/// a caller never needs to track whether some other part of the process
/// already called it first.
pub fn init() {
    INITIALIZED.store(true, Ordering::SeqCst);
    tracing::debug!("cauchy initialized");
}

/// Releases any process-wide state `init` may have set. Idempotent, and
/// safe to call even if `init` was never called.
pub fn shutdown() {
    INITIALIZED.store(false, Ordering::SeqCst);
    tracing::debug!("cauchy shut down");
}

/// Whether [`init`] has been called more recently than [`shutdown`].
pub fn is_initialized() -> bool {
    INITIALIZED.load(Ordering::SeqCst)
}

/// The crate's version string, e.g. `"0.1.0"`.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// `(major, minor, patch)` parsed out of [`version`] at compile time,
/// mirroring `cauchy_version_info`'s three-out-parameter signature without
/// the out-parameters — `CARGO_PKG_VERSION_MAJOR`/`_MINOR`/`_PATCH` are
/// supplied directly by cargo, so there's no string to parse at runtime.
pub fn version_info() -> (u32, u32, u32) {
    (
        parse_env_u32(env!("CARGO_PKG_VERSION_MAJOR")),
        parse_env_u32(env!("CARGO_PKG_VERSION_MINOR")),
        parse_env_u32(env!("CARGO_PKG_VERSION_PATCH")),
    )
}

const fn parse_env_u32(s: &str) -> u32 {
    let bytes = s.as_bytes();
    let mut value: u32 = 0;
    let mut i = 0;
    while i < bytes.len() {
        value = value * 10 + (bytes[i] - b'0') as u32;
        i += 1;
    }
    value
}
