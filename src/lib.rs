//! # Tideline: flash-aware time-series storage
//!
//! Tideline is an append-only key/data storage engine for time-series
//! records on resource-constrained devices. Keys are monotonically
//! non-decreasing unsigned integers up to eight bytes wide; each record
//! carries a fixed-size payload and optionally a variable-length blob.
//!
//! ```ignore
//! use tideline::Engine;
//!
//! let mut engine = Engine::builder()
//!     .path("./sensor-log")
//!     .key_size(4)
//!     .data_size(12)
//!     .page_size(512)
//!     .open()?;
//!
//! engine.put(1693526400, &reading)?;
//! engine.flush()?;
//!
//! let mut out = [0u8; 12];
//! engine.get(1693526400, &mut out)?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │   Engine (put / get / iter / flush)          │
//! ├──────────────┬───────────────┬───────────────┤
//! │ Spline index │  Buffer pool  │  Iterator     │
//! │ (+ radix)    │  (role slots) │  (bitmaps)    │
//! ├──────────────┴───────────────┴───────────────┤
//! │ Circular regions: data │ index │ var-data    │
//! ├──────────────────────────────────────────────┤
//! │ StorageDriver (file / in-memory)             │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Records accumulate into page-sized write buffers and persist a page at a
//! time into three circular regions backed by independent files. Lookups go
//! through a learned index: a greedy spline over each page's min key
//! predicts the page within a configured error bound, a short linear probe
//! pins it down, and an interpolated binary search finds the slot. Old data
//! is reclaimed erase-block-wise as the regions wrap; the engine tracks the
//! live window and reports evicted keys as not found.
//!
//! ## What the engine is not
//!
//! Single-threaded by contract (`&mut self` everywhere, host serializes),
//! no transactions, no per-record deletes, no descending keys; inserts
//! below the current maximum are rejected as `OrderViolation`.

pub mod config;
pub mod encoding;
mod engine;
mod error;
mod iterator;
pub mod memory;
pub mod spline;
pub mod storage;

pub use config::constants::NO_VAR_DATA;
pub use config::{DataHooks, EngineConfig};
pub use engine::{
    Engine, EngineBuilder, Stats, VarData, VarDataStream, DATA_FILE_NAME, INDEX_FILE_NAME,
    VAR_FILE_NAME,
};
pub use error::EngineError;
pub use iterator::{EngineIterator, IterQuery};
