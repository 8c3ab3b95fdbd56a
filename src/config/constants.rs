//! # Layout Constants
//!
//! Fixed wire-format constants shared across the storage layer. Everything
//! else about the page layout (header width, record width, slots per page) is
//! derived from the runtime [`EngineConfig`](super::EngineConfig), so only the
//! truly fixed offsets live here.
//!
//! ```text
//! Data page           Index page
//! ------------------  -------------------------
//! 0  u32 page id      0  u32 page id
//! 4  u16 count        4  u16 count
//! 6  bitmap…          6  2 bytes reserved
//! …  min/max…         8  u32 first data page id
//!                     12 u32 unused
//!                     16 bitmaps…
//! ```

/// Sentinel stored in a record's variable-data offset when the record has no
/// blob. All ones, so it can never collide with a real region offset.
pub const NO_VAR_DATA: u32 = 0xFFFF_FFFF;

/// Byte width of the logical page id stamped at offset 0 of every data and
/// index page.
pub const PAGE_ID_SIZE: usize = 4;

/// Byte width of the record count field at offset 4.
pub const COUNT_SIZE: usize = 2;

/// Fixed prefix of a data-page header: page id plus record count. The bitmap
/// and min/max fields that may follow are configuration dependent.
pub const DATA_PAGE_FIXED_HEADER: usize = PAGE_ID_SIZE + COUNT_SIZE;

/// Full index-page header width. Matches
/// [`IndexPageHeader`](crate::storage::IndexPageHeader).
pub const INDEX_PAGE_HEADER_SIZE: usize = 16;

/// Byte width of the length prefix in front of every variable-data payload.
pub const VAR_LEN_PREFIX_SIZE: usize = 4;

/// Widest supported key. Keys are widened into `u64` internally.
pub const MAX_KEY_SIZE: usize = 8;

/// Widest supported page bitmap.
pub const MAX_BITMAP_SIZE: usize = 8;

/// Default knot capacity for the spline index. Fixed at init; the spline
/// never grows past it.
pub const DEFAULT_SPLINE_POINTS: usize = 300;

/// Default bound on the spline's prediction error, in pages.
pub const DEFAULT_INDEX_MAX_ERROR: u32 = 10;

/// Buffer blocks required by the bare engine (data write + data read).
pub const MIN_BUFFER_BLOCKS: usize = 2;

/// Buffer blocks required once the index region is enabled (two more role
/// slots), and once variable data is enabled on top of that.
pub const MIN_BUFFER_BLOCKS_INDEX: usize = 4;
pub const MIN_BUFFER_BLOCKS_VAR: usize = 4;
pub const MIN_BUFFER_BLOCKS_INDEX_AND_VAR: usize = 6;

const _: () = assert!(
    DATA_PAGE_FIXED_HEADER == 6,
    "data page header prefix is pinned by the wire format"
);
const _: () = assert!(
    INDEX_PAGE_HEADER_SIZE == 16,
    "index page header is pinned by the wire format"
);
