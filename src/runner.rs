//! Timing loop.
//!
//! Each trial restores the output from its golden copy, flushes the caches
//! and times exactly one call. Interference can only make a call slower, so
//! the minimum over all trials is reported.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::buffer::Trial;
use crate::cache::CacheEvictor;
use crate::config::DEFAULT_REPEATS;
use crate::element::Element;
use crate::error::{BenchError, Result};
use crate::plan::Transposer;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Result of one benchmarked variant.
#[derive(Debug, Clone, PartialEq)]
pub struct Timing {
    /// Fastest trial, never zero.
    pub min: Duration,
    /// Every trial in the order it ran.
    pub samples: Vec<Duration>,
}

impl Timing {
    pub fn min_ms(&self) -> f64 {
        self.min.as_secs_f64() * 1e3
    }

    /// GiB/s for a kernel that moved `bytes` bytes.
    pub fn throughput_gib_s(&self, bytes: usize) -> f64 {
        bytes as f64 / GIB / self.min.as_secs_f64()
    }
}

/// Bytes a transpose-and-accumulate moves: read A, read and write B.
pub fn bytes_moved<T: Element>(total_size: usize) -> usize {
    3 * std::mem::size_of::<T>() * total_size
}

/// Repeats restore → evict → time one call, keeping the fastest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenchRunner {
    repeats: usize,
}

impl Default for BenchRunner {
    fn default() -> Self {
        BenchRunner {
            repeats: DEFAULT_REPEATS,
        }
    }
}

impl BenchRunner {
    pub fn new(repeats: usize) -> Result<Self> {
        if repeats == 0 {
            return Err(BenchError::argument("repeat count must be at least 1"));
        }
        Ok(BenchRunner { repeats })
    }

    pub fn repeats(&self) -> usize {
        self.repeats
    }

    /// Time `op` against the trial's working buffer.
    pub fn run<T, F>(&self, trial: &mut Trial<'_, T>, evictor: &mut CacheEvictor, mut op: F) -> Result<Timing>
    where
        T: Element,
        F: FnMut(&mut [T]) -> Result<()>,
    {
        let mut samples = Vec::with_capacity(self.repeats);
        for rep in 0..self.repeats {
            trial.reset();
            evictor.trash();
            let start = Instant::now();
            op(trial.working_mut())?;
            let elapsed = start.elapsed();
            debug!(rep, elapsed_us = elapsed.as_secs_f64() * 1e6, "trial finished");
            samples.push(elapsed);
        }

        let min = samples
            .iter()
            .copied()
            .min()
            .unwrap_or_default()
            .max(Duration::from_nanos(1));
        Ok(Timing { min, samples })
    }

    /// Time a [`Transposer`].
    pub fn run_transposer<T: Element>(
        &self,
        trial: &mut Trial<'_, T>,
        evictor: &mut CacheEvictor,
        op: &dyn Transposer<T>,
    ) -> Result<Timing> {
        self.run(trial, evictor, |b| op.execute(b))
    }
}
