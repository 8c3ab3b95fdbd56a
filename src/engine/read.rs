//! # Point Lookup
//!
//! A lookup runs three narrowing stages:
//!
//! 1. The spline predicts a logical page and an error-bounded window.
//! 2. A linear probe walks pages inside the window, steered by each page's
//!    min and max key, until one brackets the search key.
//! 3. Inside the page, the slot is estimated from the page's own key slope
//!    and refined by bisection, or plain bisection when the engine has no
//!    residual bound yet (`max_error == -1`).
//!
//! `get_var` reuses the found slot to fetch the record's var offset, then
//! opens a [`VarDataStream`]: a cursor over the variable-data log that the
//! caller drains in chunks with [`Engine::read_var_stream`]. The stream only
//! borrows the var-read buffer for the duration of each read call, so it
//! can be held across other engine operations.

use eyre::{bail, ensure, Result};

use crate::config::constants::{NO_VAR_DATA, VAR_LEN_PREFIX_SIZE};
use crate::error::EngineError;
use crate::memory::BufferRole;

use super::Engine;

/// Outcome of a variable-data fetch for a record that was found.
#[derive(Debug)]
pub enum VarData {
    /// The record was inserted without a blob.
    None,
    /// The blob existed but was overwritten when the var region wrapped.
    Evicted,
    /// The blob is intact; drain it with [`Engine::read_var_stream`].
    Stream(VarDataStream),
}

impl VarData {
    pub fn is_evicted(&self) -> bool {
        matches!(self, VarData::Evicted)
    }
}

/// Cursor over one blob in the variable-data log.
///
/// Plain state, no borrow of the engine: `(data_start, total_bytes,
/// bytes_read)` plus the page/offset position resolved lazily on the first
/// read.
#[derive(Debug, Clone)]
pub struct VarDataStream {
    data_start: u32,
    total_bytes: u32,
    bytes_read: u32,
    pos: Option<(u32, u32)>,
}

impl VarDataStream {
    /// Total blob length in bytes.
    pub fn len(&self) -> u32 {
        self.total_bytes
    }

    pub fn is_empty(&self) -> bool {
        self.total_bytes == 0
    }

    pub fn bytes_remaining(&self) -> u32 {
        self.total_bytes - self.bytes_read
    }
}

impl Engine {
    /// Copies the payload stored for `key` into `out`.
    pub fn get(&mut self, key: u64, out: &mut [u8]) -> Result<()> {
        let layout = self.layout;
        ensure!(
            out.len() == layout.data_size,
            "output buffer is {} bytes, configured data size is {}",
            out.len(),
            layout.data_size
        );
        let slot = self.lookup(key)?;
        out.copy_from_slice(layout.data_at(self.pool.slot(BufferRole::DataRead), slot));
        Ok(())
    }

    /// Copies the payload for `key` into `out` and reports the state of its
    /// variable-length blob.
    pub fn get_var(&mut self, key: u64, out: &mut [u8]) -> Result<VarData> {
        if self.var.is_none() {
            bail!(EngineError::InvalidConfig(
                "variable data is not enabled".into()
            ));
        }
        let layout = self.layout;
        ensure!(
            out.len() == layout.data_size,
            "output buffer is {} bytes, configured data size is {}",
            out.len(),
            layout.data_size
        );

        let slot = self.lookup(key)?;
        let data_buf = self.pool.slot(BufferRole::DataRead);
        out.copy_from_slice(layout.data_at(data_buf, slot));
        let var_offset = layout.var_offset_at(data_buf, slot);

        if var_offset == NO_VAR_DATA {
            return Ok(VarData::None);
        }
        let min_live = self.var.as_ref().expect("var region enabled").min_var_record_id;
        if key < min_live {
            return Ok(VarData::Evicted);
        }
        Ok(VarData::Stream(self.var_stream_at(var_offset)?))
    }

    /// Opens a stream over the blob whose length prefix sits at `var_offset`.
    pub(crate) fn var_stream_at(&mut self, var_offset: u32) -> Result<VarDataStream> {
        let page_size = self.layout.page_size as u32;
        let pages = self.var.as_ref().expect("var region enabled").pages();

        let page = (var_offset / page_size) % pages;
        self.read_var_page(page)?;
        let buf = self.pool.slot(BufferRole::VarRead);
        let offset = (var_offset % page_size) as usize;
        let total_bytes = u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap());

        let capacity = self.var_capacity_bytes() as u32;
        let data_start = (var_offset + VAR_LEN_PREFIX_SIZE as u32) % capacity;

        Ok(VarDataStream {
            data_start,
            total_bytes,
            bytes_read: 0,
            pos: None,
        })
    }

    /// Copies up to `out.len()` further bytes of the blob into `out`,
    /// following page boundaries (each var page starts with a
    /// `key_size`-byte header). Returns the number of bytes copied; zero
    /// means the stream is drained.
    pub fn read_var_stream(&mut self, stream: &mut VarDataStream, out: &mut [u8]) -> Result<usize> {
        if self.var.is_none() {
            bail!(EngineError::InvalidConfig(
                "variable data is not enabled".into()
            ));
        }
        let page_size = self.layout.page_size as u32;
        let key_size = self.layout.key_size as u32;
        let pages = self.var.as_ref().expect("var region enabled").pages();

        let (mut page, mut offset) = stream.pos.unwrap_or_else(|| {
            let page = (stream.data_start / page_size) % pages;
            let mut offset = stream.data_start % page_size;
            if offset == 0 {
                // The length prefix ended its page exactly; data begins
                // after the next page's header.
                offset = key_size;
            }
            (page, offset)
        });

        let mut copied = 0usize;
        while copied < out.len() && stream.bytes_read < stream.total_bytes {
            self.read_var_page(page)?;
            let buf = self.pool.slot(BufferRole::VarRead);
            let available = (page_size - offset).min(stream.total_bytes - stream.bytes_read);
            let amount = (available as usize).min(out.len() - copied);
            out[copied..copied + amount]
                .copy_from_slice(&buf[offset as usize..offset as usize + amount]);
            copied += amount;
            stream.bytes_read += amount as u32;
            offset += amount as u32;
            if offset == page_size {
                page = (page + 1) % pages;
                offset = key_size;
            }
        }

        stream.pos = Some((page, offset));
        Ok(copied)
    }

    /// Locates `key`, leaving its page resident in the data-read slot and
    /// returning the record's slot index.
    pub(crate) fn lookup(&mut self, key: u64) -> Result<u16> {
        if self.data.is_empty() {
            bail!(EngineError::KeyNotFound);
        }
        let layout = self.layout;

        let prediction = self.sidx.find(key);
        let first_live = self.data.first_live_logical as i64;
        let last_written = self.data.next_logical as i64 - 1;
        let low = (prediction.low as i64).max(first_live);
        let high = (prediction.high as i64).min(last_written);
        if low > high {
            bail!(EngineError::KeyNotFound);
        }

        // Bounded linear probe around the prediction.
        let mut low = low;
        let mut high = high;
        let mut page = (prediction.page as i64).clamp(low, high);
        loop {
            if page < low || page > high {
                bail!(EngineError::KeyNotFound);
            }
            let phys = self.data.physical_for(page as u32);
            self.read_data_page(phys)?;
            let buf = self.pool.slot(BufferRole::DataRead);
            if key < layout.min_key(buf) {
                high = page - 1;
                page -= 1;
            } else if key > layout.max_key(buf) {
                low = page + 1;
                page += 1;
            } else {
                break;
            }
        }

        // In-page search: slope-estimated start, refined by bisection.
        let buf = self.pool.slot(BufferRole::DataRead);
        let count = layout.count(buf) as i32;
        let mut first = 0i32;
        let mut last = count - 1;

        let estimate = {
            let first_key = layout.key_at(buf, 0);
            let last_key = layout.key_at(buf, (count - 1) as u16);
            let slope = if count > 1 && last_key > first_key {
                (last_key - first_key) as f64 / (count - 1) as f64
            } else {
                1.0
            };
            (key.saturating_sub(first_key) as f64 / slope) as i32
        };
        let mut middle = if self.max_error == -1 || estimate >= count || estimate <= 0 {
            (first + last) / 2
        } else {
            estimate.min(last)
        };

        while first <= last {
            let middle_key = layout.key_at(buf, middle as u16);
            if middle_key < key {
                first = middle + 1;
            } else if middle_key == key {
                return Ok(middle as u16);
            } else {
                last = middle - 1;
            }
            middle = (first + last) / 2;
        }
        bail!(EngineError::KeyNotFound)
    }
}
