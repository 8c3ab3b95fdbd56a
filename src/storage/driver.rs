//! # Storage Driver Abstraction
//!
//! The engine talks to its backing store through `StorageDriver`, a
//! copy-based page interface: read a page into a caller buffer, write a page
//! from one, logically erase a block, sync. Copy semantics are deliberate:
//! every page the engine touches lands in one of the buffer pool's fixed role
//! slots, so zero-copy access would buy nothing and would complicate
//! portability to flash-style backends where reads must go through RAM
//! buffers anyway.
//!
//! Two backends ship with the crate:
//!
//! - [`FileStorage`]: a plain file addressed as `page_no * page_size`.
//!   Erase is logical: the file system permits in-place rewrite, so erasing
//!   is pure bookkeeping. A NOR-flash port would implement the trait over a
//!   flash translation layer that clears erase blocks for real.
//! - [`MemStorage`]: an in-memory page array used as a test double. It
//!   tracks which pages were written so a read of never-written storage
//!   fails the same way a short file read does.
//!
//! [`AnyStorage`] type-erases the two so regions need no generics.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use eyre::{bail, ensure, Result};

use crate::error::EngineError;

/// Copy-based page I/O. One page is the unit of every transfer.
pub trait StorageDriver {
    /// Reads page `page_no` into `buf`. Fails if the page was never written.
    fn read_page(&mut self, page_no: u32, buf: &mut [u8]) -> Result<()>;

    /// Writes page `page_no` from `buf`.
    fn write_page(&mut self, page_no: u32, buf: &[u8]) -> Result<()>;

    /// Logically erases `count` pages starting at `start`. For rewritable
    /// backends this is a no-op.
    fn erase_pages(&mut self, start: u32, count: u32) -> Result<()>;

    /// Number of pages that currently hold written data.
    fn page_count(&self) -> u32;

    /// Flushes pending writes to durable storage.
    fn sync(&mut self) -> Result<()>;
}

/// Page-addressed storage over a plain file.
#[derive(Debug)]
pub struct FileStorage {
    file: File,
    page_size: usize,
    pages_written: u32,
}

impl FileStorage {
    /// Opens or creates the file at `path`. With `truncate`, existing
    /// contents are discarded.
    pub fn open<P: AsRef<Path>>(path: P, page_size: usize, truncate: bool) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(truncate)
            .open(path)
            .map_err(|e| {
                EngineError::Io(format!(
                    "failed to open storage file '{}': {e}",
                    path.display()
                ))
            })?;

        let len = file
            .metadata()
            .map_err(|e| EngineError::Io(format!("failed to stat '{}': {e}", path.display())))?
            .len();
        ensure!(
            len % page_size as u64 == 0,
            "storage file '{}' length {} is not a multiple of page size {}",
            path.display(),
            len,
            page_size
        );

        Ok(Self {
            file,
            page_size,
            pages_written: (len / page_size as u64) as u32,
        })
    }
}

impl StorageDriver for FileStorage {
    fn read_page(&mut self, page_no: u32, buf: &mut [u8]) -> Result<()> {
        ensure!(
            buf.len() == self.page_size,
            "read buffer is {} bytes, page size is {}",
            buf.len(),
            self.page_size
        );
        if page_no >= self.pages_written {
            bail!(EngineError::Io(format!(
                "page {} has never been written ({} pages on storage)",
                page_no, self.pages_written
            )));
        }
        self.file
            .seek(SeekFrom::Start(page_no as u64 * self.page_size as u64))
            .map_err(|e| EngineError::Io(format!("seek to page {page_no} failed: {e}")))?;
        self.file
            .read_exact(buf)
            .map_err(|e| EngineError::Io(format!("short read of page {page_no}: {e}")))?;
        Ok(())
    }

    fn write_page(&mut self, page_no: u32, buf: &[u8]) -> Result<()> {
        ensure!(
            buf.len() == self.page_size,
            "write buffer is {} bytes, page size is {}",
            buf.len(),
            self.page_size
        );
        self.file
            .seek(SeekFrom::Start(page_no as u64 * self.page_size as u64))
            .map_err(|e| EngineError::Io(format!("seek to page {page_no} failed: {e}")))?;
        self.file
            .write_all(buf)
            .map_err(|e| EngineError::Io(format!("short write of page {page_no}: {e}")))?;
        self.pages_written = self.pages_written.max(page_no + 1);
        Ok(())
    }

    fn erase_pages(&mut self, _start: u32, _count: u32) -> Result<()> {
        // Logical erase: the file permits in-place rewrite.
        Ok(())
    }

    fn page_count(&self) -> u32 {
        self.pages_written
    }

    fn sync(&mut self) -> Result<()> {
        self.file
            .sync_data()
            .map_err(|e| EngineError::Io(format!("sync failed: {e}")))?;
        Ok(())
    }
}

/// In-memory page array, used as a storage test double.
#[derive(Debug)]
pub struct MemStorage {
    pages: Vec<u8>,
    written: Vec<bool>,
    page_size: usize,
}

impl MemStorage {
    pub fn new(page_size: usize, max_pages: u32) -> Self {
        Self {
            pages: vec![0; page_size * max_pages as usize],
            written: vec![false; max_pages as usize],
            page_size,
        }
    }

    fn range(&self, page_no: u32) -> std::ops::Range<usize> {
        let start = page_no as usize * self.page_size;
        start..start + self.page_size
    }
}

impl StorageDriver for MemStorage {
    fn read_page(&mut self, page_no: u32, buf: &mut [u8]) -> Result<()> {
        if (page_no as usize) >= self.written.len() || !self.written[page_no as usize] {
            bail!(EngineError::Io(format!(
                "page {page_no} has never been written"
            )));
        }
        buf.copy_from_slice(&self.pages[self.range(page_no)]);
        Ok(())
    }

    fn write_page(&mut self, page_no: u32, buf: &[u8]) -> Result<()> {
        if (page_no as usize) >= self.written.len() {
            bail!(EngineError::Io(format!(
                "page {page_no} is beyond storage capacity {}",
                self.written.len()
            )));
        }
        let range = self.range(page_no);
        self.pages[range].copy_from_slice(buf);
        self.written[page_no as usize] = true;
        Ok(())
    }

    fn erase_pages(&mut self, start: u32, count: u32) -> Result<()> {
        for page_no in start..(start + count).min(self.written.len() as u32) {
            let range = self.range(page_no);
            self.pages[range].fill(0xFF);
        }
        Ok(())
    }

    fn page_count(&self) -> u32 {
        // High-water mark of written pages; the frontier scan stops at the
        // first unwritten page anyway.
        self.written.iter().rposition(|w| *w).map_or(0, |i| i as u32 + 1)
    }

    fn sync(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Type-erased storage backend.
#[derive(Debug)]
pub enum AnyStorage {
    File(FileStorage),
    Mem(MemStorage),
}

impl StorageDriver for AnyStorage {
    fn read_page(&mut self, page_no: u32, buf: &mut [u8]) -> Result<()> {
        match self {
            AnyStorage::File(s) => s.read_page(page_no, buf),
            AnyStorage::Mem(s) => s.read_page(page_no, buf),
        }
    }

    fn write_page(&mut self, page_no: u32, buf: &[u8]) -> Result<()> {
        match self {
            AnyStorage::File(s) => s.write_page(page_no, buf),
            AnyStorage::Mem(s) => s.write_page(page_no, buf),
        }
    }

    fn erase_pages(&mut self, start: u32, count: u32) -> Result<()> {
        match self {
            AnyStorage::File(s) => s.erase_pages(start, count),
            AnyStorage::Mem(s) => s.erase_pages(start, count),
        }
    }

    fn page_count(&self) -> u32 {
        match self {
            AnyStorage::File(s) => s.page_count(),
            AnyStorage::Mem(s) => s.page_count(),
        }
    }

    fn sync(&mut self) -> Result<()> {
        match self {
            AnyStorage::File(s) => s.sync(),
            AnyStorage::Mem(s) => s.sync(),
        }
    }
}
