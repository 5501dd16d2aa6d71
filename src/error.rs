//! Result codes and the error type returned by fallible operations.
//!
//! The original C implementation returns a tagged `cauchy_result_t` from
//! every fallible call. This crate keeps the same vocabulary of failure
//! modes but expresses them as a [`CauchyError`] so callers get ordinary
//! `Result<T, CauchyError>` and `?`-propagation instead of checking a
//! returned integer.

use core::fmt;

/// The tagged result-code vocabulary from the original C ABI.
///
/// Kept around (rather than inlined into [`CauchyError`]'s `Display`) so a
/// caller bridging to another runtime or wire protocol has a stable,
/// C-ABI-shaped code to forward, via [`CauchyError::code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ResultCode {
    /// Success.
    Ok,
    /// Allocation failed.
    NoMem,
    /// Null or malformed argument.
    Invalid,
    /// Entity not found (e.g. removing something never added).
    NotFound,
    /// Entity already exists (reserved).
    Exists,
    /// A fixed-size buffer would overflow.
    Full,
    /// The operation required a nonempty value and found none.
    Empty,
    /// Operation timed out (reserved; nothing in this crate blocks).
    Timeout,
    /// Lost a CAS race under concurrent modification.
    Concurrent,
    /// A causal dependency was not satisfied.
    Causal,
    /// Network-layer failure (reserved; transport is out of scope).
    Network,
    /// Internal invariant violation.
    Internal,
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResultCode::Ok => "OK",
            ResultCode::NoMem => "NOMEM",
            ResultCode::Invalid => "INVALID",
            ResultCode::NotFound => "NOTFOUND",
            ResultCode::Exists => "EXISTS",
            ResultCode::Full => "FULL",
            ResultCode::Empty => "EMPTY",
            ResultCode::Timeout => "TIMEOUT",
            ResultCode::Concurrent => "CONCURRENT",
            ResultCode::Causal => "CAUSAL",
            ResultCode::Network => "NETWORK",
            ResultCode::Internal => "INTERNAL",
        };
        f.write_str(s)
    }
}

/// Error type returned by every fallible `cauchy` operation.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CauchyError {
    /// The system allocator (or a pool's backing region) is exhausted.
    #[error("allocation failed")]
    NoMem,
    /// A null pointer, zero-length payload, or otherwise malformed argument.
    #[error("invalid argument")]
    Invalid,
    /// The target of a remove/lookup was never added (or already gone).
    #[error("not found")]
    NotFound,
    /// A value exceeds a fixed-size ceiling (e.g. `LwwRegister`'s value cap).
    #[error("value exceeds capacity")]
    Full,
    /// A causal dependency (e.g. a vector-clock floor for GC) was missing.
    #[error("causal dependency not satisfied")]
    Causal,
    /// An internal invariant was violated; indicates a bug, not caller misuse.
    #[error("internal invariant violated")]
    Internal,
}

impl CauchyError {
    /// Maps this error back onto the C-ABI result-code vocabulary.
    pub fn code(&self) -> ResultCode {
        match self {
            CauchyError::NoMem => ResultCode::NoMem,
            CauchyError::Invalid => ResultCode::Invalid,
            CauchyError::NotFound => ResultCode::NotFound,
            CauchyError::Full => ResultCode::Full,
            CauchyError::Causal => ResultCode::Causal,
            CauchyError::Internal => ResultCode::Internal,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type CauchyResult<T> = Result<T, CauchyError>;
