//! # Recovery
//!
//! Reopening without a reset rebuilds all in-memory state from page headers
//! alone. The data and index regions share one frontier-scan routine
//! (`Region::recover`): consecutive physical pages must carry consecutive
//! logical ids, and the first violation is the write frontier.
//!
//! On top of the data-region scan the engine re-derives:
//!
//! - `max_error`, by replaying the per-page residual computation over every
//!   live page seen during the scan;
//! - `min_key`, from the first live page's min key;
//! - `last_key` and `avg_key_diff`, from the last written page;
//! - the spline, by feeding every live page's min key in logical order.
//!
//! The variable-data region keeps no logical ids, so its reopen resets the
//! write position and the eviction watermark; see DESIGN.md for the
//! trade-off this inherits.

use eyre::Result;
use log::debug;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::memory::{BufferPool, BufferRole};
use crate::storage::{AnyStorage, PageLayout, Region, VarRegion};

use super::{page_max_error, Engine};

impl Engine {
    /// Builds an engine from existing region files.
    pub(crate) fn recover(
        cfg: EngineConfig,
        layout: PageLayout,
        mut pool: BufferPool,
        data_storage: AnyStorage,
        index_storage: Option<AnyStorage>,
        var_storage: Option<AnyStorage>,
    ) -> Result<Self> {
        let mut max_error = -1i32;
        let data = {
            let scratch = pool.slot_mut(BufferRole::DataRead);
            Region::recover(
                data_storage,
                cfg.data_pages,
                cfg.erase_size_in_pages,
                scratch,
                |page| {
                    let err = page_max_error(&layout, page);
                    if err > max_error {
                        max_error = err;
                    }
                },
            )
            .map_err(|e| EngineError::Io(format!("data region recovery failed: {e}")))?
        };

        let index = match index_storage {
            Some(storage) => {
                let scratch = pool.slot_mut(BufferRole::IndexRead);
                Some(
                    Region::recover(
                        storage,
                        cfg.index_pages,
                        cfg.erase_size_in_pages,
                        scratch,
                        |_| {},
                    )
                    .map_err(|e| {
                        EngineError::Io(format!("index region recovery failed: {e}"))
                    })?,
                )
            }
            None => None,
        };

        // Var pages carry no logical ids to scan; reopen restarts the log.
        let var = var_storage.map(|storage| {
            VarRegion::new(storage, cfg.var_pages, cfg.erase_size_in_pages, cfg.key_size)
        });

        let mut engine = Engine::assemble(cfg, layout, pool, data, index, var, max_error);
        engine.init_data_write_buffer();
        if engine.cfg.use_index {
            engine.init_index_write_buffer(engine.data.next_logical)?;
        }
        if engine.cfg.use_var_data {
            engine.init_var_write_buffer();
        }

        if !engine.data.is_empty() {
            engine.replay_data_state()?;
        }
        debug!(
            "recovered engine: {} live data pages, {} spline knots, max error {}",
            engine.data.live_pages(),
            engine.sidx.knot_count(),
            engine.max_error
        );
        Ok(engine)
    }

    /// Re-derives key estimates and the spline from the live data pages.
    fn replay_data_state(&mut self) -> Result<()> {
        let layout = self.layout;

        self.read_data_page(self.data.first_live_phys)
            .map_err(|e| {
                EngineError::Io(format!("failed to read first live page during recovery: {e}"))
            })?;
        self.min_key = Some(layout.min_key(self.pool.slot(BufferRole::DataRead)));

        for logical in self.data.first_live_logical..self.data.next_logical {
            let phys = self.data.physical_for(logical);
            self.read_data_page(phys).map_err(|e| {
                EngineError::Io(format!("failed to read live page during spline replay: {e}"))
            })?;
            let page_min = layout.min_key(self.pool.slot(BufferRole::DataRead));
            self.sidx.add(page_min, logical)?;
        }

        let last_phys = self.data.physical_for(self.data.next_logical - 1);
        self.read_data_page(last_phys).map_err(|e| {
            EngineError::Io(format!(
                "failed to read last written page during recovery: {e}"
            ))
        })?;
        let page_max = layout.max_key(self.pool.slot(BufferRole::DataRead));
        self.last_key = Some(page_max);
        self.update_avg_key_diff(page_max);
        Ok(())
    }
}
