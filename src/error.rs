//! # Engine Error Kinds
//!
//! Typed error kinds for every failure the engine can surface. Fallible
//! operations return `eyre::Result`, and each kind below is raised into the
//! report chain so callers can branch on it:
//!
//! ```ignore
//! match engine.get(key, &mut out) {
//!     Ok(()) => { /* hit */ }
//!     Err(report) if report.downcast_ref::<EngineError>() == Some(&EngineError::KeyNotFound) => {
//!         /* miss */
//!     }
//!     Err(report) => return Err(report),
//! }
//! ```
//!
//! Soft conditions are not errors: a record whose blob was reclaimed by the
//! variable-region wrap still yields its fixed data, and the blob outcome is
//! reported through [`crate::VarData`] instead of this enum.

use thiserror::Error;

/// Failure kinds surfaced by engine entry points.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The key is not present in the live window of the data region.
    #[error("key not found")]
    KeyNotFound,

    /// The record exists but its variable-length blob was overwritten when
    /// the variable-data region wrapped.
    #[error("variable data evicted by region wrap")]
    VarDataEvicted,

    /// The backing storage failed a read, write, or sync. Carries the
    /// formatted context and cause; the message form keeps the enum
    /// comparable for [`EngineError::is`].
    #[error("i/o failure: {0}")]
    Io(String),

    /// Geometry or option combination that cannot be served.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The spline knot store is full; further inserts cannot be indexed.
    #[error("spline knot capacity ({0}) exhausted")]
    SplineOverflow(usize),

    /// An insert arrived with a key below the current maximum. Keys must be
    /// monotonically non-decreasing.
    #[error("key {key} violates insert order (current max {max})")]
    OrderViolation { key: u64, max: u64 },
}

impl EngineError {
    /// True when an `eyre` report carries this exact kind.
    pub fn is(report: &eyre::Report, kind: &EngineError) -> bool {
        report.downcast_ref::<EngineError>() == Some(kind)
    }
}
