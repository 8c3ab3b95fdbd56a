//! # Buffer Pool
//!
//! One contiguous allocation of page-sized blocks, partitioned into fixed
//! role slots at init. The engine performs every page transfer through these
//! slots; nothing else allocates on the write or read path.
//!
//! ## Role slots
//!
//! ```text
//! Slot  Role          Present
//! ----  -----------   ------------------------------
//! 0     data write    always
//! 1     data read     always
//! 2     index write   with index
//! 3     index read    with index
//! 4     var write     with var data (2 when index is off)
//! 5     var read      with var data (3 when index is off)
//! ```
//!
//! Two base blocks, four with the index, four with variable data, six with
//! both. Read slots act as single-page caches: the engine remembers which
//! physical page each one holds and skips the read when it matches.

mod buffer_pool;

pub use buffer_pool::{BufferPool, BufferRole};
