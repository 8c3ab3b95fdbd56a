//! # Range Iterator
//!
//! Bounded iteration over live records, oldest page first. Bounds are
//! optional on all four sides: key range and data range. When bitmaps are
//! enabled and a data bound is set, the iterator builds a query bitmap via
//! the user hook and prunes pages against it: through the index region's
//! per-page summaries when the index is on, or against each data page's own
//! bitmap header otherwise.
//!
//! The iterator is a small state machine:
//!
//! ```text
//! NeedIndexPage -> NeedDataPage -> InPage -> … -> Done
//!       ^_______________|  ^________|
//! ```
//!
//! `NeedIndexPage` only occurs on the index-pruned path. Record filters:
//! below `min_key`, below `min_data`, or above `max_data` skips the record;
//! above `max_key` terminates the iteration (keys are stored in order).
//!
//! The returned payload slice borrows the engine's data-read buffer and is
//! valid until the next engine call. `next_var` instead copies the payload
//! out and additionally resolves the record's blob, because opening the
//! blob stream itself touches the var-read buffer.

use eyre::{bail, Result};
use smallvec::{smallvec, SmallVec};

use crate::config::{bitmap_overlap, constants::NO_VAR_DATA};
use crate::engine::{Engine, VarData};
use crate::error::EngineError;
use crate::memory::BufferRole;
use crate::storage::IndexPageHeader;

/// Optional bounds for an iteration. Unset sides are unbounded.
#[derive(Debug, Default, Clone)]
pub struct IterQuery {
    pub min_key: Option<u64>,
    pub max_key: Option<u64>,
    pub min_data: Option<Vec<u8>>,
    pub max_data: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IterState {
    NeedIndexPage,
    NeedDataPage,
    InPage,
    Done,
}

#[derive(Debug)]
enum Verdict {
    PageDone,
    Skip,
    Stop,
    Emit { slot: u16, key: u64 },
}

/// Cursor over records matching an [`IterQuery`]. Create with
/// [`Engine::iter`]; advance with [`next`](EngineIterator::next) or
/// [`next_var`](EngineIterator::next_var).
#[derive(Debug)]
pub struct EngineIterator {
    query: IterQuery,
    query_bitmap: Option<SmallVec<[u8; 8]>>,
    use_index_path: bool,
    state: IterState,
    /// Next data page to visit on the sequential path.
    next_data_logical: u32,
    /// Page currently being iterated and the next record slot within it.
    cur_data_logical: u32,
    cur_rec: u16,
    /// Index-path cursors: next index page, and position within the
    /// currently loaded one.
    idx_logical: u32,
    idx_entry: u16,
    idx_count: u16,
    idx_first_data: u32,
}

impl Engine {
    /// Starts an iteration over the live window with the given bounds.
    pub fn iter(&self, query: IterQuery) -> EngineIterator {
        let query_bitmap = if self.cfg.use_bitmap
            && (query.min_data.is_some() || query.max_data.is_some())
        {
            let mut bitmap: SmallVec<[u8; 8]> = smallvec![0u8; self.cfg.bitmap_size];
            (self.cfg.hooks.build_bitmap_from_range)(
                query.min_data.as_deref(),
                query.max_data.as_deref(),
                &mut bitmap,
            );
            Some(bitmap)
        } else {
            None
        };

        let use_index_path = query_bitmap.is_some() && self.index.is_some();
        EngineIterator {
            query,
            query_bitmap,
            use_index_path,
            state: if use_index_path {
                IterState::NeedIndexPage
            } else {
                IterState::NeedDataPage
            },
            next_data_logical: self.data.first_live_logical,
            cur_data_logical: 0,
            cur_rec: 0,
            idx_logical: self
                .index
                .as_ref()
                .map(|index| index.first_live_logical)
                .unwrap_or(0),
            idx_entry: 0,
            idx_count: 0,
            idx_first_data: 0,
        }
    }
}

impl EngineIterator {
    /// Advances to the next matching record. The payload slice borrows the
    /// engine's data-read buffer.
    pub fn next<'e>(&mut self, engine: &'e mut Engine) -> Result<Option<(u64, &'e [u8])>> {
        let layout = engine.layout;
        loop {
            match self.state {
                IterState::Done => return Ok(None),
                IterState::NeedIndexPage => self.load_next_index_page(engine)?,
                IterState::NeedDataPage => self.select_next_data_page(engine)?,
                IterState::InPage => {
                    // Reload through the cache; an interleaved get may have
                    // replaced the resident page.
                    let phys = engine.data.physical_for(self.cur_data_logical);
                    engine.read_data_page(phys)?;

                    let verdict = self.judge_current_record(engine);
                    match verdict {
                        Verdict::PageDone => self.state = IterState::NeedDataPage,
                        Verdict::Skip => {}
                        Verdict::Stop => {
                            self.state = IterState::Done;
                            return Ok(None);
                        }
                        Verdict::Emit { slot, key } => {
                            let buf = engine.pool.slot(BufferRole::DataRead);
                            return Ok(Some((key, layout.data_at(buf, slot))));
                        }
                    }
                }
            }
        }
    }

    /// Like [`next`](Self::next), but copies the payload into `data_out`
    /// and also resolves the record's variable-length blob.
    pub fn next_var(
        &mut self,
        engine: &mut Engine,
        data_out: &mut [u8],
    ) -> Result<Option<(u64, VarData)>> {
        if engine.var.is_none() {
            bail!(EngineError::InvalidConfig(
                "variable data is not enabled".into()
            ));
        }
        let layout = engine.layout;
        eyre::ensure!(
            data_out.len() == layout.data_size,
            "output buffer is {} bytes, configured data size is {}",
            data_out.len(),
            layout.data_size
        );

        let (key, slot) = match self.next(engine)? {
            Some((key, data)) => {
                data_out.copy_from_slice(data);
                (key, self.cur_rec - 1)
            }
            None => return Ok(None),
        };

        let var_offset = layout.var_offset_at(engine.pool.slot(BufferRole::DataRead), slot);
        if var_offset == NO_VAR_DATA {
            return Ok(Some((key, VarData::None)));
        }
        let min_live = engine
            .var
            .as_ref()
            .expect("var region enabled")
            .min_var_record_id;
        if key < min_live {
            return Ok(Some((key, VarData::Evicted)));
        }
        let stream = engine.var_stream_at(var_offset)?;
        Ok(Some((key, VarData::Stream(stream))))
    }

    fn judge_current_record(&mut self, engine: &Engine) -> Verdict {
        let layout = engine.layout;
        let buf = engine.pool.slot(BufferRole::DataRead);
        let count = layout.count(buf);
        if self.cur_rec >= count {
            return Verdict::PageDone;
        }
        let slot = self.cur_rec;
        self.cur_rec += 1;

        let key = layout.key_at(buf, slot);
        if let Some(min) = self.query.min_key {
            if key < min {
                return Verdict::Skip;
            }
        }
        if let Some(max) = self.query.max_key {
            if key > max {
                return Verdict::Stop;
            }
        }

        let data = layout.data_at(buf, slot);
        let compare = engine.cfg.hooks.compare_data;
        if let Some(min_data) = &self.query.min_data {
            if compare(data, min_data) == std::cmp::Ordering::Less {
                return Verdict::Skip;
            }
        }
        if let Some(max_data) = &self.query.max_data {
            if compare(data, max_data) == std::cmp::Ordering::Greater {
                return Verdict::Skip;
            }
        }
        Verdict::Emit { slot, key }
    }

    fn load_next_index_page(&mut self, engine: &mut Engine) -> Result<()> {
        let index = engine
            .index
            .as_ref()
            .expect("index path requires the index region");
        if self.idx_logical < index.first_live_logical {
            self.idx_logical = index.first_live_logical;
        }
        if self.idx_logical >= index.next_logical {
            self.state = IterState::Done;
            return Ok(());
        }
        let phys = index.physical_for(self.idx_logical);
        engine.read_index_page(phys)?;

        let header = IndexPageHeader::from_bytes(engine.pool.slot(BufferRole::IndexRead))?;
        self.idx_count = header.count();
        self.idx_first_data = header.first_data_page();
        self.idx_entry = 0;
        self.idx_logical += 1;
        self.state = IterState::NeedDataPage;
        Ok(())
    }

    fn select_next_data_page(&mut self, engine: &mut Engine) -> Result<()> {
        let layout = engine.layout;
        if self.use_index_path {
            let target = {
                let buf = engine.pool.slot(BufferRole::IndexRead);
                let query_bitmap = self
                    .query_bitmap
                    .as_ref()
                    .expect("index path has a query bitmap");
                let mut found = None;
                while self.idx_entry < self.idx_count {
                    let entry = self.idx_entry;
                    self.idx_entry += 1;
                    let data_logical = self.idx_first_data + entry as u32;
                    // Index pages may summarize data pages the data region
                    // has since evicted.
                    if data_logical < engine.data.first_live_logical {
                        continue;
                    }
                    if data_logical >= engine.data.next_logical {
                        break;
                    }
                    if bitmap_overlap(query_bitmap, layout.idx_entry(buf, entry)) {
                        found = Some(data_logical);
                        break;
                    }
                }
                found
            };
            match target {
                Some(logical) => {
                    let phys = engine.data.physical_for(logical);
                    engine.read_data_page(phys)?;
                    self.cur_data_logical = logical;
                    self.cur_rec = 0;
                    self.state = IterState::InPage;
                }
                None => self.state = IterState::NeedIndexPage,
            }
            return Ok(());
        }

        loop {
            if self.next_data_logical >= engine.data.next_logical {
                self.state = IterState::Done;
                return Ok(());
            }
            if self.next_data_logical < engine.data.first_live_logical {
                self.next_data_logical = engine.data.first_live_logical;
                continue;
            }
            let logical = self.next_data_logical;
            self.next_data_logical += 1;

            let phys = engine.data.physical_for(logical);
            engine.read_data_page(phys)?;

            if let Some(query_bitmap) = &self.query_bitmap {
                let buf = engine.pool.slot(BufferRole::DataRead);
                if !bitmap_overlap(query_bitmap, layout.bitmap(buf)) {
                    continue;
                }
            }
            self.cur_data_logical = logical;
            self.cur_rec = 0;
            self.state = IterState::InPage;
            return Ok(());
        }
    }
}
