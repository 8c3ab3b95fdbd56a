//! # Spline Index
//!
//! The learned index over data pages: a greedy spline corridor
//! ([`spline`]) predicting the logical page for a key within a configured
//! error bound, optionally accelerated by a key-prefix radix table
//! ([`radix`]). [`SplineIndex`] composes the two behind one add/find
//! surface; the radix table tracks knots by index only.

mod radix;
mod spline;

use eyre::Result;

pub use radix::RadixTable;
pub use spline::{Knot, Prediction, Spline};

/// Spline model plus optional radix accelerator.
#[derive(Debug)]
pub struct SplineIndex {
    spline: Spline,
    radix: Option<RadixTable>,
}

impl SplineIndex {
    /// `radix_bits = 0` selects the spline-only path.
    pub fn new(capacity: usize, max_error: u32, radix_bits: u8, key_size: usize) -> Self {
        let radix = (radix_bits > 0)
            .then(|| RadixTable::new(radix_bits, (key_size * 8) as u32));
        Self {
            spline: Spline::new(capacity, max_error),
            radix,
        }
    }

    pub fn knot_count(&self) -> usize {
        self.spline.knot_count()
    }

    /// Feeds the min key of a newly persisted page and its logical id.
    pub fn add(&mut self, key: u64, page: u32) -> Result<()> {
        let before = self.spline.knot_count();
        self.spline.add(key, page)?;
        if let Some(radix) = &mut self.radix {
            let after = self.spline.knot_count();
            if after > before {
                let knot = self.spline.knot(after - 1);
                radix.note_knot(knot.key, after - 1);
            }
        }
        Ok(())
    }

    /// Predicts the logical page holding `key` and the probe window around
    /// it. Not meaningful before the first `add`.
    pub fn find(&mut self, key: u64) -> Prediction {
        match &self.radix {
            Some(radix) => {
                let (lo, hi) = radix.knot_range(key, self.spline.knot_count());
                self.spline.find_in_range(key, lo, hi)
            }
            None => self.spline.find(key),
        }
    }
}
