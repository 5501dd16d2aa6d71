//! Conflict-free replicated data types, one submodule per kind.
//!
//! Per the design note on polymorphism over CRDT kind: a common base trait
//! covering every type's capability set (`merge`/`equals`/`serialize`/
//! `deserialize`) is kept tight and dispatched through [`CrdtKind`] at the
//! boundary, rather than forcing every type behind one indirection on the
//! hot path — callers that know their concrete type just call its inherent
//! methods directly.

pub mod g_counter;
pub mod g_set;
pub mod lww_map;
pub mod lww_register;
pub mod or_set;
pub mod pn_counter;
pub mod rga;
pub mod two_phase_set;

pub use g_counter::GCounter;
pub use g_set::GSet;
pub use lww_map::LwwMap;
pub use lww_register::LwwRegister;
pub use or_set::OrSet;
pub use pn_counter::PnCounter;
pub use rga::Rga;
pub use two_phase_set::TwoPhaseSet;

use crate::error::CauchyResult;

/// Tag identifying a CRDT's concrete kind, matching `cauchy_crdt_type_t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrdtKind {
    /// Grow-only counter.
    GCounter,
    /// Increment/decrement counter.
    PnCounter,
    /// Last-write-wins single value.
    LwwRegister,
    /// Grow-only set.
    GSet,
    /// Add-then-remove-once set.
    TwoPhaseSet,
    /// Add-wins observed-remove set.
    OrSet,
    /// Last-write-wins map.
    LwwMap,
    /// Replicated growable array.
    Rga,
}

impl CrdtKind {
    /// Short name, e.g. for log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            CrdtKind::GCounter => "g_counter",
            CrdtKind::PnCounter => "pn_counter",
            CrdtKind::LwwRegister => "lww_register",
            CrdtKind::GSet => "g_set",
            CrdtKind::TwoPhaseSet => "2p_set",
            CrdtKind::OrSet => "or_set",
            CrdtKind::LwwMap => "lww_map",
            CrdtKind::Rga => "rga",
        }
    }
}

impl std::fmt::Display for CrdtKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability set shared by every CRDT in this crate: join the lattice,
/// compare for equality, and round-trip through bytes.
pub trait Crdt: Sized {
    /// This type's kind tag.
    const KIND: CrdtKind;

    /// Merges `other`'s state into `self` (the lattice join). Must be
    /// commutative, associative, and idempotent across any sequence of
    /// calls with states drawn from this type's lattice.
    fn merge(&mut self, other: &Self);

    /// State equality (not representation equality — tombstone bookkeeping
    /// differences that don't change observable state must still compare
    /// equal where a type's semantics call for it).
    fn equals(&self, other: &Self) -> bool;

    /// Bytes needed to serialize the current state.
    fn serialized_size(&self) -> usize;

    /// Serializes into `buffer`, returning bytes written, or `0` if it
    /// doesn't fit.
    fn serialize(&self, buffer: &mut [u8]) -> usize;

    /// Deserializes a previously-serialized state.
    fn deserialize(buffer: &[u8]) -> CauchyResult<Self>;
}
