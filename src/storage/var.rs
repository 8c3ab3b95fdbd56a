//! # Variable-Data Region
//!
//! The variable-data region is a byte-granular append log laid over circular
//! pages. Unlike the data and index regions its pages carry no logical id:
//! each page starts with a `key_size`-byte header holding the largest key
//! whose blob has bytes on that page, and the body is a stream of
//! `(u32 length, payload)` records that may span page boundaries.
//!
//! Reclamation chases the tail: when the writer has consumed every available
//! page it reads the header of the last page in the erase block it is about
//! to overwrite and remembers `header + 1` as the smallest key whose blob is
//! still intact. Lookups of older keys report eviction instead of returning
//! bytes that were overwritten.

use eyre::Result;
use log::debug;

use crate::encoding::widen_key;
use super::driver::{AnyStorage, StorageDriver};

/// Circular append log for variable-length blobs.
#[derive(Debug)]
pub struct VarRegion {
    storage: AnyStorage,
    pages: u32,
    erase_size: u32,
    key_size: usize,
    /// Physical page the next flush will write.
    pub next_phys: u32,
    /// Pages still writable before the next reclamation.
    pub avail_pages: u32,
    /// Smallest key whose blob has not been overwritten.
    pub min_var_record_id: u64,
    /// True once reclamation has destroyed at least one page.
    pub wrapped: bool,
}

impl VarRegion {
    pub fn new(storage: AnyStorage, pages: u32, erase_size: u32, key_size: usize) -> Self {
        Self {
            storage,
            pages,
            erase_size,
            key_size,
            next_phys: 0,
            avail_pages: pages,
            min_var_record_id: 0,
            wrapped: false,
        }
    }

    pub fn pages(&self) -> u32 {
        self.pages
    }

    /// Total byte capacity of the region; var offsets are taken modulo this.
    pub fn capacity_bytes(&self, page_size: usize) -> u64 {
        self.pages as u64 * page_size as u64
    }

    /// Writes `write_buf` as the next var page. When the region is full this
    /// first reclaims one erase block: the header of the block's last page
    /// tells which keys lose their blobs. Returns true when reclamation
    /// happened; `read_buf` holds that victim page afterwards.
    pub fn append(&mut self, write_buf: &[u8], read_buf: &mut [u8]) -> Result<bool> {
        self.next_phys %= self.pages;

        let mut evicted = false;
        if self.avail_pages == 0 {
            let victim = (self.next_phys + self.erase_size - 1) % self.pages;
            self.storage.read_page(victim, read_buf)?;
            self.min_var_record_id = widen_key(&read_buf[..self.key_size]) + 1;
            self.avail_pages += self.erase_size;
            self.wrapped = true;
            evicted = true;
            debug!(
                "var region reclaimed erase block; blobs below key {} are gone",
                self.min_var_record_id
            );
        }

        self.storage.write_page(self.next_phys, write_buf)?;
        self.next_phys += 1;
        self.avail_pages -= 1;
        Ok(evicted)
    }

    pub fn read_into(&mut self, phys: u32, buf: &mut [u8]) -> Result<()> {
        self.storage.read_page(phys, buf)
    }

    pub fn sync(&mut self) -> Result<()> {
        self.storage.sync()
    }
}
