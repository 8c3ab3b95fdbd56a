use eyre::{ensure, Result};

/// Named page-buffer roles. Each enabled role maps to exactly one slot in
/// the pool for the engine's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferRole {
    DataWrite,
    DataRead,
    IndexWrite,
    IndexRead,
    VarWrite,
    VarRead,
}

impl BufferRole {
    fn ordinal(self) -> usize {
        match self {
            BufferRole::DataWrite => 0,
            BufferRole::DataRead => 1,
            BufferRole::IndexWrite => 2,
            BufferRole::IndexRead => 3,
            BufferRole::VarWrite => 4,
            BufferRole::VarRead => 5,
        }
    }
}

/// Fixed pool of page-sized buffers partitioned by role.
#[derive(Debug)]
pub struct BufferPool {
    buf: Vec<u8>,
    page_size: usize,
    /// Role ordinal to slot index, `None` when the role is disabled.
    slots: [Option<usize>; 6],
}

impl BufferPool {
    /// Allocates `blocks` page buffers and wires up the role slots for the
    /// enabled features. Callers validate `blocks` against
    /// `EngineConfig::required_buffer_blocks` beforehand.
    pub fn new(page_size: usize, blocks: usize, use_index: bool, use_var: bool) -> Result<Self> {
        let mut slots = [None; 6];
        slots[BufferRole::DataWrite.ordinal()] = Some(0);
        slots[BufferRole::DataRead.ordinal()] = Some(1);
        let mut next = 2;
        if use_index {
            slots[BufferRole::IndexWrite.ordinal()] = Some(next);
            slots[BufferRole::IndexRead.ordinal()] = Some(next + 1);
            next += 2;
        }
        if use_var {
            slots[BufferRole::VarWrite.ordinal()] = Some(next);
            slots[BufferRole::VarRead.ordinal()] = Some(next + 1);
            next += 2;
        }
        ensure!(
            blocks >= next,
            "buffer pool needs {} blocks for the enabled features, got {}",
            next,
            blocks
        );

        Ok(Self {
            buf: vec![0; page_size * blocks],
            page_size,
            slots,
        })
    }

    fn offset(&self, role: BufferRole) -> usize {
        let slot = self.slots[role.ordinal()]
            .unwrap_or_else(|| panic!("buffer role {:?} is not enabled", role));
        slot * self.page_size
    }

    pub fn slot(&self, role: BufferRole) -> &[u8] {
        let off = self.offset(role);
        &self.buf[off..off + self.page_size]
    }

    pub fn slot_mut(&mut self, role: BufferRole) -> &mut [u8] {
        let off = self.offset(role);
        &mut self.buf[off..off + self.page_size]
    }

    /// Two distinct role buffers at once, for operations that copy between
    /// slots (index entry append) or read while flushing (var reclamation).
    pub fn slot_pair_mut(&mut self, a: BufferRole, b: BufferRole) -> (&mut [u8], &mut [u8]) {
        let off_a = self.offset(a);
        let off_b = self.offset(b);
        assert_ne!(off_a, off_b, "role pair must name two distinct slots");
        let page = self.page_size;
        if off_a < off_b {
            let (left, right) = self.buf.split_at_mut(off_b);
            (&mut left[off_a..off_a + page], &mut right[..page])
        } else {
            let (left, right) = self.buf.split_at_mut(off_a);
            let b_slice = &mut left[off_b..off_b + page];
            (&mut right[..page], b_slice)
        }
    }
}
