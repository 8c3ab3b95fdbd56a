//! # Page Codec
//!
//! Layout of the two structured page kinds the engine writes.
//!
//! ## Data page
//!
//! ```text
//! Offset            Size        Field
//! ------            ----        -----------------------------
//! 0                 4           logical page id (LE)
//! 4                 2           record count (LE)
//! 6                 bitmap      page bitmap        (if enabled)
//! …                 key_size    min key            (if min/max)
//! …                 key_size    max key
//! …                 data_size   min data
//! …                 data_size   max data
//! header_size       …           record slots, each key | data | [u32 var offset]
//! ```
//!
//! Header width depends on the configuration, so data pages are accessed
//! through a [`PageLayout`] value carrying the derived offsets rather than a
//! fixed struct. `init_page` fills the min fields with ones so the first
//! insert's comparison always wins.
//!
//! ## Index page
//!
//! A fixed 16-byte header ([`IndexPageHeader`], zerocopy-transmutable)
//! followed by one bitmap per summarized data page, in logical-id order:
//! the bitmap at position `j` covers the data page whose logical id is
//! `first_data_page + j`.
//!
//! Variable-data pages carry only a `key_size`-byte max-key header and are
//! handled by the var region directly; they have no codec here.

use eyre::{ensure, Result};
use zerocopy::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::constants::{DATA_PAGE_FIXED_HEADER, INDEX_PAGE_HEADER_SIZE, PAGE_ID_SIZE};
use crate::config::EngineConfig;
use crate::encoding::widen_key;

/// Derived data-page offsets for one engine configuration. Cheap to copy;
/// every accessor takes the page buffer explicitly.
#[derive(Debug, Clone, Copy)]
pub struct PageLayout {
    pub page_size: usize,
    pub key_size: usize,
    pub data_size: usize,
    pub bitmap_size: usize,
    pub record_size: usize,
    pub header_size: usize,
    pub max_records: u16,
    pub use_max_min: bool,
    pub use_var_data: bool,
}

impl PageLayout {
    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self {
            page_size: cfg.page_size,
            key_size: cfg.key_size,
            data_size: cfg.data_size,
            bitmap_size: cfg.bitmap_size,
            record_size: cfg.record_size(),
            header_size: cfg.header_size(),
            max_records: cfg.max_records_per_page(),
            use_max_min: cfg.use_max_min,
            use_var_data: cfg.use_var_data,
        }
    }

    /// Resets a write buffer to an empty page: zeroed, with the min-key and
    /// min-data header fields set to all ones.
    pub fn init_page(&self, buf: &mut [u8]) {
        buf.fill(0);
        if self.use_max_min {
            let (min_key, _) = self.min_key_range();
            buf[min_key..min_key + self.key_size].fill(0xFF);
            let min_data = self.min_data_offset();
            buf[min_data..min_data + self.data_size].fill(0xFF);
        }
    }

    pub fn page_id(&self, buf: &[u8]) -> u32 {
        u32::from_le_bytes(buf[..PAGE_ID_SIZE].try_into().unwrap())
    }

    pub fn count(&self, buf: &[u8]) -> u16 {
        u16::from_le_bytes(buf[PAGE_ID_SIZE..DATA_PAGE_FIXED_HEADER].try_into().unwrap())
    }

    pub fn set_count(&self, buf: &mut [u8], count: u16) {
        buf[PAGE_ID_SIZE..DATA_PAGE_FIXED_HEADER].copy_from_slice(&count.to_le_bytes());
    }

    pub fn inc_count(&self, buf: &mut [u8]) {
        let count = self.count(buf);
        self.set_count(buf, count + 1);
    }

    fn bitmap_offset(&self) -> usize {
        DATA_PAGE_FIXED_HEADER
    }

    pub fn bitmap<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        &buf[self.bitmap_offset()..self.bitmap_offset() + self.bitmap_size]
    }

    pub fn bitmap_mut<'a>(&self, buf: &'a mut [u8]) -> &'a mut [u8] {
        let off = self.bitmap_offset();
        &mut buf[off..off + self.bitmap_size]
    }

    fn min_key_range(&self) -> (usize, usize) {
        let start = DATA_PAGE_FIXED_HEADER + self.bitmap_size;
        (start, start + self.key_size)
    }

    fn max_key_offset(&self) -> usize {
        self.min_key_range().1
    }

    fn min_data_offset(&self) -> usize {
        self.max_key_offset() + self.key_size
    }

    fn max_data_offset(&self) -> usize {
        self.min_data_offset() + self.data_size
    }

    /// Header min/max fields; only meaningful when `use_max_min` is set.
    pub fn header_min_key_mut<'a>(&self, buf: &'a mut [u8]) -> &'a mut [u8] {
        let (start, end) = self.min_key_range();
        &mut buf[start..end]
    }

    pub fn header_max_key_mut<'a>(&self, buf: &'a mut [u8]) -> &'a mut [u8] {
        let off = self.max_key_offset();
        &mut buf[off..off + self.key_size]
    }

    pub fn header_min_data<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        let off = self.min_data_offset();
        &buf[off..off + self.data_size]
    }

    pub fn header_min_data_mut<'a>(&self, buf: &'a mut [u8]) -> &'a mut [u8] {
        let off = self.min_data_offset();
        &mut buf[off..off + self.data_size]
    }

    pub fn header_max_data<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        let off = self.max_data_offset();
        &buf[off..off + self.data_size]
    }

    pub fn header_max_data_mut<'a>(&self, buf: &'a mut [u8]) -> &'a mut [u8] {
        let off = self.max_data_offset();
        &mut buf[off..off + self.data_size]
    }

    pub fn slot_offset(&self, slot: u16) -> usize {
        self.header_size + slot as usize * self.record_size
    }

    pub fn key_at(&self, buf: &[u8], slot: u16) -> u64 {
        let off = self.slot_offset(slot);
        widen_key(&buf[off..off + self.key_size])
    }

    pub fn data_at<'a>(&self, buf: &'a [u8], slot: u16) -> &'a [u8] {
        let off = self.slot_offset(slot) + self.key_size;
        &buf[off..off + self.data_size]
    }

    pub fn var_offset_at(&self, buf: &[u8], slot: u16) -> u32 {
        debug_assert!(self.use_var_data);
        let off = self.slot_offset(slot) + self.key_size + self.data_size;
        u32::from_le_bytes(buf[off..off + 4].try_into().unwrap())
    }

    pub fn set_var_offset(&self, buf: &mut [u8], slot: u16, var_offset: u32) {
        debug_assert!(self.use_var_data);
        let off = self.slot_offset(slot) + self.key_size + self.data_size;
        buf[off..off + 4].copy_from_slice(&var_offset.to_le_bytes());
    }

    /// Copies `key` and `data` into record slot `slot`.
    pub fn write_record(&self, buf: &mut [u8], slot: u16, key: u64, data: &[u8]) {
        debug_assert_eq!(data.len(), self.data_size);
        let off = self.slot_offset(slot);
        crate::encoding::narrow_key(key, &mut buf[off..off + self.key_size]);
        buf[off + self.key_size..off + self.key_size + self.data_size].copy_from_slice(data);
    }

    /// Smallest key on the page: the first record slot. Records are stored in
    /// non-decreasing key order.
    pub fn min_key(&self, buf: &[u8]) -> u64 {
        self.key_at(buf, 0)
    }

    /// Largest key on the page: the last occupied record slot.
    pub fn max_key(&self, buf: &[u8]) -> u64 {
        let count = self.count(buf);
        self.key_at(buf, count.saturating_sub(1))
    }

    /// Bitmap entry `slot` of an index page.
    pub fn idx_entry<'a>(&self, buf: &'a [u8], slot: u16) -> &'a [u8] {
        let off = INDEX_PAGE_HEADER_SIZE + slot as usize * self.bitmap_size;
        &buf[off..off + self.bitmap_size]
    }

    pub fn idx_entry_mut<'a>(&self, buf: &'a mut [u8], slot: u16) -> &'a mut [u8] {
        let off = INDEX_PAGE_HEADER_SIZE + slot as usize * self.bitmap_size;
        &mut buf[off..off + self.bitmap_size]
    }
}

/// Fixed header of an index page.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct IndexPageHeader {
    page_id: U32,
    count: U16,
    reserved: [u8; 2],
    first_data_page: U32,
    unused: U32,
}

const _: () = assert!(std::mem::size_of::<IndexPageHeader>() == INDEX_PAGE_HEADER_SIZE);

impl IndexPageHeader {
    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        ensure!(
            bytes.len() >= INDEX_PAGE_HEADER_SIZE,
            "buffer too small for IndexPageHeader: {} < {}",
            bytes.len(),
            INDEX_PAGE_HEADER_SIZE
        );
        Self::ref_from_bytes(&bytes[..INDEX_PAGE_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to read IndexPageHeader: {:?}", e))
    }

    pub fn from_bytes_mut(bytes: &mut [u8]) -> Result<&mut Self> {
        ensure!(
            bytes.len() >= INDEX_PAGE_HEADER_SIZE,
            "buffer too small for IndexPageHeader: {} < {}",
            bytes.len(),
            INDEX_PAGE_HEADER_SIZE
        );
        Self::mut_from_bytes(&mut bytes[..INDEX_PAGE_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to read IndexPageHeader: {:?}", e))
    }

    pub fn page_id(&self) -> u32 {
        self.page_id.get()
    }

    pub fn count(&self) -> u16 {
        self.count.get()
    }

    pub fn set_count(&mut self, count: u16) {
        self.count = U16::new(count);
    }

    pub fn inc_count(&mut self) {
        self.count = U16::new(self.count.get() + 1);
    }

    /// Logical id of the first data page summarized on this index page.
    pub fn first_data_page(&self) -> u32 {
        self.first_data_page.get()
    }

    pub fn set_first_data_page(&mut self, id: u32) {
        self.first_data_page = U32::new(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> PageLayout {
        let mut cfg = EngineConfig::default();
        cfg.key_size = 4;
        cfg.data_size = 8;
        cfg.page_size = 128;
        cfg.bitmap_size = 2;
        cfg.use_bitmap = true;
        cfg.use_max_min = true;
        PageLayout::from_config(&cfg)
    }

    #[test]
    fn header_offsets_follow_wire_format() {
        let layout = layout();
        // 6 fixed + 2 bitmap + 2*4 keys + 2*8 data
        assert_eq!(layout.header_size, 6 + 2 + 8 + 16);
        assert_eq!(layout.record_size, 12);
        assert_eq!(layout.slot_offset(0), layout.header_size);
        assert_eq!(layout.slot_offset(2), layout.header_size + 24);
    }

    #[test]
    fn init_page_sets_min_fields_to_ones() {
        let layout = layout();
        let mut buf = vec![0xAAu8; layout.page_size];
        layout.init_page(&mut buf);

        assert_eq!(layout.count(&buf), 0);
        assert_eq!(layout.page_id(&buf), 0);
        let (min_key_start, min_key_end) = (8, 12);
        assert!(buf[min_key_start..min_key_end].iter().all(|b| *b == 0xFF));
        assert!(layout.header_min_data(&buf).iter().all(|b| *b == 0xFF));
        assert!(layout.header_max_data(&buf).iter().all(|b| *b == 0));
    }

    #[test]
    fn records_round_trip_through_slots() {
        let layout = layout();
        let mut buf = vec![0u8; layout.page_size];
        layout.init_page(&mut buf);

        layout.write_record(&mut buf, 0, 41, &[1u8; 8]);
        layout.write_record(&mut buf, 1, 43, &[2u8; 8]);
        layout.set_count(&mut buf, 2);

        assert_eq!(layout.key_at(&buf, 0), 41);
        assert_eq!(layout.key_at(&buf, 1), 43);
        assert_eq!(layout.data_at(&buf, 1), &[2u8; 8]);
        assert_eq!(layout.min_key(&buf), 41);
        assert_eq!(layout.max_key(&buf), 43);
    }

    #[test]
    fn var_offset_round_trips() {
        let mut cfg = EngineConfig::default();
        cfg.use_var_data = true;
        cfg.buffer_blocks = 4;
        cfg.page_size = 128;
        let layout = PageLayout::from_config(&cfg);
        let mut buf = vec![0u8; layout.page_size];

        layout.set_var_offset(&mut buf, 3, 0xDEAD_BEEF);
        assert_eq!(layout.var_offset_at(&buf, 3), 0xDEAD_BEEF);
    }

    #[test]
    fn index_header_transmutes_in_place() {
        let mut page = vec![0u8; 64];
        {
            let header = IndexPageHeader::from_bytes_mut(&mut page).unwrap();
            header.set_first_data_page(96);
            header.set_count(2);
            header.inc_count();
        }
        let header = IndexPageHeader::from_bytes(&page).unwrap();
        assert_eq!(header.first_data_page(), 96);
        assert_eq!(header.count(), 3);
        assert_eq!(header.page_id(), 0);
    }
}
