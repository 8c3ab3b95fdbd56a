//! # Engine Configuration
//!
//! Everything the engine needs to know before it touches storage: record
//! geometry, page geometry, region sizes, feature toggles, and the
//! user-supplied [`DataHooks`]. Values are collected by
//! [`EngineBuilder`](crate::EngineBuilder) and frozen into an
//! [`EngineConfig`] by [`EngineConfig::validate`], which is the single place
//! geometry errors are raised.
//!
//! ## Derived layout
//!
//! Several widths fall out of the configured sizes and are needed all over
//! the write and read paths:
//!
//! ```text
//! record_size = key_size + data_size (+ 4 with variable data)
//! header_size = 6 + bitmap_size (+ 2*key_size + 2*data_size with min/max)
//! max_records_per_page = (page_size - header_size) / record_size
//! max_idx_entries_per_page = (page_size - 16) / bitmap_size
//! ```
//!
//! ## Downgrades
//!
//! A feature whose buffer-block requirement is not met is downgraded with a
//! `warn!` rather than rejected: an index needs four blocks, variable data
//! four (six when the index is also on). Geometry that can never work (a key
//! wider than eight bytes, a page too small for one record, a region that
//! does not divide into erase blocks) is an
//! [`EngineError::InvalidConfig`].

pub mod constants;
mod hooks;

use eyre::Result;
use log::warn;

use crate::error::EngineError;
use constants::*;

pub use hooks::{bitmap_overlap, compare_le_unsigned, DataHooks};

/// Frozen engine configuration. Built by `EngineBuilder`, validated once,
/// then read-only for the life of the engine.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Key width on the wire, 1-8 bytes.
    pub key_size: usize,
    /// Fixed payload width in bytes, at least 1.
    pub data_size: usize,
    /// Page size in bytes for all three regions.
    pub page_size: usize,
    /// Page-sized blocks in the buffer pool.
    pub buffer_blocks: usize,
    /// Per-page bitmap width in bytes, 0-8. Zero disables the bitmap.
    pub bitmap_size: usize,
    /// Data region size in pages.
    pub data_pages: u32,
    /// Index region size in pages. Ignored unless `use_index`.
    pub index_pages: u32,
    /// Variable-data region size in pages. Ignored unless `use_var_data`.
    pub var_pages: u32,
    /// Pages reclaimed per erase-frontier advance. Must divide every region.
    pub erase_size_in_pages: u32,
    /// Bound on the spline's prediction error, in pages.
    pub index_max_error: u32,
    /// Key-prefix bits indexed by the radix table. Zero selects the
    /// spline-only lookup path.
    pub radix_bits: u8,
    /// Fixed knot capacity of the spline.
    pub spline_points: usize,
    /// Maintain the index region of per-page bitmap summaries.
    pub use_index: bool,
    /// Maintain per-page bitmaps in data-page headers.
    pub use_bitmap: bool,
    /// Maintain min/max key and data fields in data-page headers.
    pub use_max_min: bool,
    /// Maintain the variable-data region.
    pub use_var_data: bool,
    /// Discard any existing files instead of recovering from them.
    pub reset_data: bool,
    /// Payload comparison and bitmap encoding callbacks.
    pub hooks: DataHooks,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            key_size: 4,
            data_size: 8,
            page_size: 512,
            buffer_blocks: MIN_BUFFER_BLOCKS,
            bitmap_size: 0,
            data_pages: 1024,
            index_pages: 64,
            var_pages: 256,
            erase_size_in_pages: 8,
            index_max_error: DEFAULT_INDEX_MAX_ERROR,
            radix_bits: 0,
            spline_points: DEFAULT_SPLINE_POINTS,
            use_index: false,
            use_bitmap: false,
            use_max_min: false,
            use_var_data: false,
            reset_data: true,
            hooks: DataHooks::default(),
        }
    }
}

impl EngineConfig {
    /// Bytes per record slot: key, payload, and the 4-byte var offset when
    /// variable data is enabled.
    pub fn record_size(&self) -> usize {
        let mut size = self.key_size + self.data_size;
        if self.use_var_data {
            size += VAR_LEN_PREFIX_SIZE;
        }
        size
    }

    /// Data-page header width for this configuration.
    pub fn header_size(&self) -> usize {
        let mut size = DATA_PAGE_FIXED_HEADER + self.bitmap_size;
        if self.use_max_min {
            size += 2 * self.key_size + 2 * self.data_size;
        }
        size
    }

    /// Record slots per data page.
    pub fn max_records_per_page(&self) -> u16 {
        ((self.page_size - self.header_size()) / self.record_size()) as u16
    }

    /// Bitmap entries per index page.
    pub fn max_idx_entries_per_page(&self) -> u16 {
        if self.bitmap_size == 0 {
            return 0;
        }
        ((self.page_size - INDEX_PAGE_HEADER_SIZE) / self.bitmap_size) as u16
    }

    /// Buffer blocks this configuration needs.
    pub fn required_buffer_blocks(&self) -> usize {
        match (self.use_index, self.use_var_data) {
            (true, true) => MIN_BUFFER_BLOCKS_INDEX_AND_VAR,
            (true, false) => MIN_BUFFER_BLOCKS_INDEX,
            (false, true) => MIN_BUFFER_BLOCKS_VAR,
            (false, false) => MIN_BUFFER_BLOCKS,
        }
    }

    /// Checks geometry, downgrading features the buffer pool cannot carry
    /// and rejecting what can never work.
    pub fn validate(&mut self) -> Result<()> {
        let invalid = |msg: String| EngineError::InvalidConfig(msg);

        if !(1..=MAX_KEY_SIZE).contains(&self.key_size) {
            return Err(invalid(format!(
                "key size must be 1-{MAX_KEY_SIZE} bytes, got {}",
                self.key_size
            ))
            .into());
        }
        if self.data_size == 0 {
            return Err(invalid("data size must be at least 1 byte".into()).into());
        }
        if self.bitmap_size > MAX_BITMAP_SIZE {
            return Err(invalid(format!(
                "bitmap size must be 0-{MAX_BITMAP_SIZE} bytes, got {}",
                self.bitmap_size
            ))
            .into());
        }
        if self.use_bitmap && self.bitmap_size == 0 {
            return Err(invalid("bitmaps enabled but bitmap size is zero".into()).into());
        }
        if self.use_index && !self.use_bitmap {
            return Err(invalid(
                "the index region stores page bitmaps; enable bitmaps to use it".into(),
            )
            .into());
        }
        if self.erase_size_in_pages == 0 {
            return Err(invalid("erase size must be at least one page".into()).into());
        }
        if self.buffer_blocks < MIN_BUFFER_BLOCKS {
            return Err(invalid(format!(
                "at least {MIN_BUFFER_BLOCKS} buffer blocks required, got {}",
                self.buffer_blocks
            ))
            .into());
        }

        // Under-provisioned buffers downgrade the feature instead of failing.
        if self.use_index && self.buffer_blocks < MIN_BUFFER_BLOCKS_INDEX {
            warn!(
                "index requires {} buffer blocks but only {} configured; disabling index",
                MIN_BUFFER_BLOCKS_INDEX, self.buffer_blocks
            );
            self.use_index = false;
        }
        if self.use_var_data && self.buffer_blocks < self.required_buffer_blocks() {
            warn!(
                "variable data requires {} buffer blocks but only {} configured; disabling variable data",
                self.required_buffer_blocks(),
                self.buffer_blocks
            );
            self.use_var_data = false;
        }

        if self.page_size < self.header_size() + self.record_size() {
            return Err(invalid(format!(
                "page size {} cannot hold the {}-byte header plus one {}-byte record",
                self.page_size,
                self.header_size(),
                self.record_size()
            ))
            .into());
        }

        let min_data_pages = if self.use_index { 4 } else { 2 } * self.erase_size_in_pages;
        if self.data_pages < min_data_pages || self.data_pages % self.erase_size_in_pages != 0 {
            return Err(invalid(format!(
                "data region must be a multiple of the erase size and at least {} pages, got {}",
                min_data_pages, self.data_pages
            ))
            .into());
        }
        if self.use_index
            && (self.index_pages < 2 * self.erase_size_in_pages
                || self.index_pages % self.erase_size_in_pages != 0)
        {
            return Err(invalid(format!(
                "index region must be a multiple of the erase size and at least {} pages, got {}",
                2 * self.erase_size_in_pages,
                self.index_pages
            ))
            .into());
        }
        if self.use_var_data
            && (self.var_pages < 2 * self.erase_size_in_pages
                || self.var_pages % self.erase_size_in_pages != 0)
        {
            return Err(invalid(format!(
                "variable-data region must be a multiple of the erase size and at least {} pages, got {}",
                2 * self.erase_size_in_pages,
                self.var_pages
            ))
            .into());
        }

        if self.index_max_error == 0 {
            return Err(invalid("index max error must be at least one page".into()).into());
        }
        if usize::from(self.radix_bits) > self.key_size * 8 || self.radix_bits > 24 {
            return Err(invalid(format!(
                "radix bits must fit the key width and stay below 25, got {}",
                self.radix_bits
            ))
            .into());
        }
        if self.spline_points < 2 {
            return Err(invalid("spline needs capacity for at least two knots".into()).into());
        }

        Ok(())
    }
}
