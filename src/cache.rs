//! Cache eviction between timed trials.
//!
//! Streams through two buffers larger than the last-level cache so the
//! kernel under test starts every trial with cold caches.

use std::hint::black_box;

use rayon::prelude::*;

use crate::buffer::AlignedBuf;
use crate::error::Result;

const PAR_CHUNK: usize = 1 << 16;

/// Owns the two scratch buffers used to flush the caches.
pub struct CacheEvictor {
    first: AlignedBuf<f64>,
    second: AlignedBuf<f64>,
}

impl CacheEvictor {
    /// Two buffers of `len` doubles each.
    pub fn with_len(len: usize) -> Result<Self> {
        let seed = |i: usize| (((i + 1) * 13) % 10_000) as f64;
        let first = AlignedBuf::from_fn(len, seed)?;
        let second = AlignedBuf::from_fn(len, seed)?;
        Ok(CacheEvictor { first, second })
    }

    pub fn len(&self) -> usize {
        self.first.len()
    }

    pub fn is_empty(&self) -> bool {
        self.first.is_empty()
    }

    /// Write through both buffers.
    pub fn trash(&mut self) {
        self.first
            .par_chunks_mut(PAR_CHUNK)
            .zip(self.second.par_chunks(PAR_CHUNK))
            .for_each(|(dst, src)| {
                for (d, s) in dst.iter_mut().zip(src) {
                    *d += 0.999 * *s;
                }
            });
        black_box(self.first.as_slice());
    }

    /// Read-only view of the accumulating buffer.
    pub fn scratch(&self) -> &[f64] {
        &self.first
    }
}
