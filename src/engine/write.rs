//! # Write Path
//!
//! Records accumulate in the data-write buffer until it holds
//! `max_records_per_page` of them; persisting a page then runs a fixed
//! pipeline: append to the data region, feed the page's min key to the
//! spline, append the page's bitmap to the index write buffer, refresh the
//! `avg_key_diff` and `max_error` estimates, and reinitialize the buffer.
//!
//! Variable-length blobs go to the var region first: `put_var` reserves the
//! length-prefix position, performs the fixed insert (which stamps that
//! position into the record), then streams the length and payload through
//! the var write buffer page by page, restamping each fresh page's max-key
//! header.
//!
//! An I/O failure while persisting leaves the in-memory accumulator intact,
//! so a retried `put` re-attempts the page write.

use eyre::{bail, ensure, Result};

use crate::config::constants::NO_VAR_DATA;
use crate::encoding::max_key_for_width;
use crate::error::EngineError;
use crate::memory::BufferRole;
use crate::storage::IndexPageHeader;

use super::{page_max_error, Engine};

impl Engine {
    /// Inserts one record. Keys must be monotonically non-decreasing;
    /// `data` must be exactly the configured payload width.
    pub fn put(&mut self, key: u64, data: &[u8]) -> Result<()> {
        let layout = self.layout;
        ensure!(
            data.len() == layout.data_size,
            "payload is {} bytes, configured data size is {}",
            data.len(),
            layout.data_size
        );
        ensure!(
            key <= max_key_for_width(layout.key_size),
            "key {} does not fit the configured {}-byte key width",
            key,
            layout.key_size
        );
        if let Some(max) = self.last_key {
            if key < max {
                bail!(EngineError::OrderViolation { key, max });
            }
        }

        if layout.count(self.pool.slot(BufferRole::DataWrite)) >= layout.max_records {
            self.persist_data_page()?;
        }

        let var_offset = if layout.use_var_data {
            if self.pending_var {
                (self.current_var_loc % self.var_capacity_bytes()) as u32
            } else {
                NO_VAR_DATA
            }
        } else {
            NO_VAR_DATA
        };

        let hooks = self.cfg.hooks;
        let use_max_min = self.cfg.use_max_min;
        let use_bitmap = self.cfg.use_bitmap;
        {
            let buf = self.pool.slot_mut(BufferRole::DataWrite);
            let slot = layout.count(buf);
            layout.write_record(buf, slot, key, data);
            if layout.use_var_data {
                layout.set_var_offset(buf, slot, var_offset);
            }
            layout.inc_count(buf);

            if use_max_min {
                if slot == 0 {
                    crate::encoding::narrow_key(key, layout.header_min_key_mut(buf));
                    crate::encoding::narrow_key(key, layout.header_max_key_mut(buf));
                    layout.header_min_data_mut(buf).copy_from_slice(data);
                    layout.header_max_data_mut(buf).copy_from_slice(data);
                } else {
                    // Keys arrive in order: every insert moves the max, the
                    // min never changes after the first record.
                    crate::encoding::narrow_key(key, layout.header_max_key_mut(buf));
                    let below_min = (hooks.compare_data)(data, layout.header_min_data(buf))
                        == std::cmp::Ordering::Less;
                    if below_min {
                        layout.header_min_data_mut(buf).copy_from_slice(data);
                    }
                    let above_max = (hooks.compare_data)(data, layout.header_max_data(buf))
                        == std::cmp::Ordering::Greater;
                    if above_max {
                        layout.header_max_data_mut(buf).copy_from_slice(data);
                    }
                }
            }

            if use_bitmap {
                (hooks.update_bitmap)(data, layout.bitmap_mut(buf));
            }
        }

        if self.min_key.is_none() {
            self.min_key = Some(key);
        }
        self.last_key = Some(key);
        Ok(())
    }

    /// Inserts one record with an optional variable-length blob.
    pub fn put_var(&mut self, key: u64, data: &[u8], var: Option<&[u8]>) -> Result<()> {
        if self.var.is_none() {
            bail!(EngineError::InvalidConfig(
                "variable data is not enabled".into()
            ));
        }
        let Some(blob) = var else {
            self.pending_var = false;
            return self.put(key, data);
        };

        let layout = self.layout;
        let page_size = layout.page_size as u64;

        // The 4-byte length prefix never splits across pages: close the
        // current var page when it cannot hold one.
        if page_size - self.current_var_loc % page_size < 4 {
            self.write_var_page()?;
            self.current_var_loc +=
                page_size - self.current_var_loc % page_size + layout.key_size as u64;
        }

        self.pending_var = true;
        let put_result = self.put(key, data);
        self.pending_var = false;
        put_result?;

        // This key is now the largest with bytes on the current var page.
        self.stamp_var_header(key);

        {
            let offset = (self.current_var_loc % page_size) as usize;
            let buf = self.pool.slot_mut(BufferRole::VarWrite);
            buf[offset..offset + 4].copy_from_slice(&(blob.len() as u32).to_le_bytes());
        }
        self.var_page_dirty = true;
        self.current_var_loc += 4;
        if self.current_var_loc % page_size == 0 {
            self.write_var_page()?;
            self.stamp_var_header(key);
            self.current_var_loc += layout.key_size as u64;
        }

        let mut written = 0usize;
        while written < blob.len() {
            let offset = (self.current_var_loc % page_size) as usize;
            let amount = (layout.page_size - offset).min(blob.len() - written);
            {
                let buf = self.pool.slot_mut(BufferRole::VarWrite);
                buf[offset..offset + amount].copy_from_slice(&blob[written..written + amount]);
            }
            self.var_page_dirty = true;
            written += amount;
            self.current_var_loc += amount as u64;
            if self.current_var_loc % page_size == 0 {
                self.write_var_page()?;
                self.stamp_var_header(key);
                self.current_var_loc += layout.key_size as u64;
            }
        }
        Ok(())
    }

    /// Persists the partial write buffers. A flush closes the partial data,
    /// index, and var pages (later inserts start fresh pages), and a second
    /// flush with nothing new buffered is a no-op.
    pub fn flush(&mut self) -> Result<()> {
        let layout = self.layout;

        if layout.count(self.pool.slot(BufferRole::DataWrite)) > 0 {
            self.persist_data_page()?;
        }

        if self.cfg.use_index {
            let pending = IndexPageHeader::from_bytes(self.pool.slot(BufferRole::IndexWrite))?
                .count();
            if pending > 0 {
                self.write_index_page()?;
                self.init_index_write_buffer(self.data.next_logical)?;
            }
        }

        if self.cfg.use_var_data && self.var_page_dirty {
            self.write_var_page()?;
            let page_size = layout.page_size as u64;
            self.current_var_loc +=
                page_size - self.current_var_loc % page_size + layout.key_size as u64;
        }

        self.data.sync()?;
        if let Some(index) = &mut self.index {
            index.sync()?;
        }
        if let Some(var) = &mut self.var {
            var.sync()?;
        }
        Ok(())
    }

    /// Writes the data-write buffer as the next data page and runs the
    /// bookkeeping pipeline behind every persisted page.
    pub(crate) fn persist_data_page(&mut self) -> Result<()> {
        let layout = self.layout;

        let appended = self.data.append(self.pool.slot_mut(BufferRole::DataWrite))?;
        self.bump_writes();

        if appended.evicted > 0 {
            // The evicted pages carried the smallest keys; estimate the new
            // minimum instead of reading the next live page.
            if let Some(min) = self.min_key {
                let shift =
                    appended.evicted as u64 * self.avg_key_diff * layout.max_records as u64;
                self.min_key = Some(min + shift);
            }
        }

        let page_min_key = layout.min_key(self.pool.slot(BufferRole::DataWrite));
        self.sidx.add(page_min_key, appended.logical)?;

        if self.cfg.use_index {
            self.append_index_entry(appended.logical)?;
        }

        let page_max_key = layout.max_key(self.pool.slot(BufferRole::DataWrite));
        self.update_avg_key_diff(page_max_key);

        let err = page_max_error(&layout, self.pool.slot(BufferRole::DataWrite));
        if err > self.max_error {
            self.max_error = err;
        }

        self.init_data_write_buffer();
        Ok(())
    }

    /// Appends the just-written data page's bitmap to the index write
    /// buffer, persisting that buffer first when it is full.
    fn append_index_entry(&mut self, data_page_id: u32) -> Result<()> {
        let layout = self.layout;
        let max_entries = self.max_idx_entries();

        let count =
            IndexPageHeader::from_bytes(self.pool.slot(BufferRole::IndexWrite))?.count();
        if count >= max_entries {
            self.write_index_page()?;
            self.init_index_write_buffer(data_page_id)?;
        }

        let (data_buf, idx_buf) =
            self.pool
                .slot_pair_mut(BufferRole::DataWrite, BufferRole::IndexWrite);
        let slot = IndexPageHeader::from_bytes(idx_buf)?.count();
        layout
            .idx_entry_mut(idx_buf, slot)
            .copy_from_slice(layout.bitmap(data_buf));
        IndexPageHeader::from_bytes_mut(idx_buf)?.inc_count();
        Ok(())
    }

    pub(crate) fn write_index_page(&mut self) -> Result<()> {
        let index = self
            .index
            .as_mut()
            .expect("index writes require the index region");
        index.append(self.pool.slot_mut(BufferRole::IndexWrite))?;
        self.bump_idx_writes();
        Ok(())
    }

    /// Persists the var write buffer as the next var page. Reclamation may
    /// read the eviction victim into the var-read slot, which invalidates
    /// its cache.
    pub(crate) fn write_var_page(&mut self) -> Result<()> {
        let var = self
            .var
            .as_mut()
            .expect("var writes require the var region");
        let (write_buf, read_buf) =
            self.pool
                .slot_pair_mut(BufferRole::VarWrite, BufferRole::VarRead);
        let evicted = var.append(write_buf, read_buf)?;
        self.bump_writes();
        if evicted {
            self.invalidate_var_cache();
            self.bump_reads();
        }
        self.init_var_write_buffer();
        Ok(())
    }

    fn stamp_var_header(&mut self, key: u64) {
        let key_size = self.layout.key_size;
        let buf = self.pool.slot_mut(BufferRole::VarWrite);
        crate::encoding::narrow_key(key, &mut buf[..key_size]);
        self.var_page_dirty = true;
    }
}
