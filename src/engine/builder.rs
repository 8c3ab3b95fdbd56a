//! # Engine Builder
//!
//! Collects configuration, validates it once, sets up the storage backends,
//! and hands back a ready engine. With a [`path`](EngineBuilder::path) the
//! three regions live as files inside that directory; without one the engine
//! runs on in-memory storage, which is what the test suites use.

use std::fs;
use std::path::PathBuf;

use eyre::Result;

use crate::config::{DataHooks, EngineConfig};
use crate::error::EngineError;
use crate::memory::BufferPool;
use crate::storage::{AnyStorage, FileStorage, MemStorage, PageLayout, Region, StorageDriver, VarRegion};

use super::Engine;

/// File names of the three regions inside the engine directory.
pub const DATA_FILE_NAME: &str = "data.tdl";
pub const INDEX_FILE_NAME: &str = "index.tdl";
pub const VAR_FILE_NAME: &str = "var.tdl";

/// Builder for [`Engine`]. Every option has a default; see
/// [`EngineConfig`] for their meanings.
#[derive(Debug)]
pub struct EngineBuilder {
    cfg: EngineConfig,
    path: Option<PathBuf>,
}

impl EngineBuilder {
    pub(crate) fn new() -> Self {
        Self {
            cfg: EngineConfig::default(),
            path: None,
        }
    }

    /// Directory holding the region files. Created if missing. Without a
    /// path the engine runs on in-memory storage.
    pub fn path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn key_size(mut self, bytes: usize) -> Self {
        self.cfg.key_size = bytes;
        self
    }

    pub fn data_size(mut self, bytes: usize) -> Self {
        self.cfg.data_size = bytes;
        self
    }

    pub fn page_size(mut self, bytes: usize) -> Self {
        self.cfg.page_size = bytes;
        self
    }

    pub fn buffer_blocks(mut self, blocks: usize) -> Self {
        self.cfg.buffer_blocks = blocks;
        self
    }

    pub fn bitmap_size(mut self, bytes: usize) -> Self {
        self.cfg.bitmap_size = bytes;
        self
    }

    pub fn data_pages(mut self, pages: u32) -> Self {
        self.cfg.data_pages = pages;
        self
    }

    pub fn index_pages(mut self, pages: u32) -> Self {
        self.cfg.index_pages = pages;
        self
    }

    pub fn var_pages(mut self, pages: u32) -> Self {
        self.cfg.var_pages = pages;
        self
    }

    pub fn erase_size_in_pages(mut self, pages: u32) -> Self {
        self.cfg.erase_size_in_pages = pages;
        self
    }

    pub fn index_max_error(mut self, pages: u32) -> Self {
        self.cfg.index_max_error = pages;
        self
    }

    pub fn radix_bits(mut self, bits: u8) -> Self {
        self.cfg.radix_bits = bits;
        self
    }

    pub fn spline_points(mut self, capacity: usize) -> Self {
        self.cfg.spline_points = capacity;
        self
    }

    pub fn use_index(mut self, enabled: bool) -> Self {
        self.cfg.use_index = enabled;
        self
    }

    pub fn use_bitmap(mut self, enabled: bool) -> Self {
        self.cfg.use_bitmap = enabled;
        self
    }

    pub fn use_max_min(mut self, enabled: bool) -> Self {
        self.cfg.use_max_min = enabled;
        self
    }

    pub fn use_var_data(mut self, enabled: bool) -> Self {
        self.cfg.use_var_data = enabled;
        self
    }

    /// With `false`, existing region files are recovered instead of
    /// discarded.
    pub fn reset_data(mut self, reset: bool) -> Self {
        self.cfg.reset_data = reset;
        self
    }

    pub fn hooks(mut self, hooks: DataHooks) -> Self {
        self.cfg.hooks = hooks;
        self
    }

    /// Validates the configuration, opens the backing storage, and returns
    /// the engine, recovering from existing files when `reset_data` is off.
    pub fn open(self) -> Result<Engine> {
        let mut cfg = self.cfg;
        cfg.validate()?;

        let layout = PageLayout::from_config(&cfg);
        let pool = BufferPool::new(
            cfg.page_size,
            cfg.buffer_blocks,
            cfg.use_index,
            cfg.use_var_data,
        )?;

        let (data_storage, index_storage, var_storage, has_existing) = match &self.path {
            Some(dir) => {
                fs::create_dir_all(dir).map_err(|e| {
                    EngineError::Io(format!(
                        "failed to create engine directory '{}': {e}",
                        dir.display()
                    ))
                })?;
                let data =
                    FileStorage::open(dir.join(DATA_FILE_NAME), cfg.page_size, cfg.reset_data)?;
                let has_existing = data.page_count() > 0;
                let index = cfg
                    .use_index
                    .then(|| {
                        FileStorage::open(dir.join(INDEX_FILE_NAME), cfg.page_size, cfg.reset_data)
                    })
                    .transpose()?;
                let var = cfg
                    .use_var_data
                    .then(|| {
                        FileStorage::open(dir.join(VAR_FILE_NAME), cfg.page_size, cfg.reset_data)
                    })
                    .transpose()?;
                (
                    AnyStorage::File(data),
                    index.map(AnyStorage::File),
                    var.map(AnyStorage::File),
                    has_existing,
                )
            }
            None => (
                AnyStorage::Mem(MemStorage::new(cfg.page_size, cfg.data_pages)),
                cfg.use_index
                    .then(|| AnyStorage::Mem(MemStorage::new(cfg.page_size, cfg.index_pages))),
                cfg.use_var_data
                    .then(|| AnyStorage::Mem(MemStorage::new(cfg.page_size, cfg.var_pages))),
                false,
            ),
        };

        if !cfg.reset_data && has_existing {
            return Engine::recover(cfg, layout, pool, data_storage, index_storage, var_storage);
        }

        let data = Region::new(data_storage, cfg.data_pages, cfg.erase_size_in_pages);
        let index =
            index_storage.map(|s| Region::new(s, cfg.index_pages, cfg.erase_size_in_pages));
        let var = var_storage
            .map(|s| VarRegion::new(s, cfg.var_pages, cfg.erase_size_in_pages, cfg.key_size));

        let mut engine = Engine::assemble(cfg, layout, pool, data, index, var, -1);
        engine.init_data_write_buffer();
        if engine.cfg.use_index {
            engine.init_index_write_buffer(0)?;
        }
        if engine.cfg.use_var_data {
            engine.init_var_write_buffer();
        }
        Ok(engine)
    }
}
