//! Tensor buffers and per-trial state.
//!
//! Input `A` and the golden output `B` are filled with fixed patterns so
//! runs are repeatable. Every benchmarked variant gets its own working copy
//! of `B`, wrapped in a [`Trial`] that restores it before each timed call.

pub mod aligned;

pub use aligned::{AlignedBuf, BUFFER_ALIGN};

use rayon::prelude::*;
use tracing::debug;

use crate::element::Element;
use crate::error::Result;
use crate::problem::ProblemSpec;

/// Elements per rayon task when copying or filling buffers.
const PAR_CHUNK: usize = 1 << 16;

/// Initial value of `A[i]`.
pub fn pattern_a(i: usize) -> f64 {
    ((((i + 1) * 13) % 1000) as f64 - 500.0) / 1000.0
}

/// Initial value of the golden `B[i]`.
pub fn pattern_b(i: usize) -> f64 {
    ((((i + 1) * 17) % 1000) as f64 - 500.0) / 1000.0
}

/// Copy `golden` into `working`.
///
/// # Panics
///
/// Panics if the lengths differ.
pub fn restore<T: Element>(golden: &[T], working: &mut [T]) {
    assert_eq!(golden.len(), working.len(), "restore: length mismatch");
    working
        .par_chunks_mut(PAR_CHUNK)
        .zip(golden.par_chunks(PAR_CHUNK))
        .for_each(|(w, g)| w.copy_from_slice(g));
}

fn fill_pattern<T: Element>(buf: &mut [T], pattern: fn(usize) -> f64) {
    buf.par_chunks_mut(PAR_CHUNK)
        .enumerate()
        .for_each(|(chunk, values)| {
            let base = chunk * PAR_CHUNK;
            for (offset, v) in values.iter_mut().enumerate() {
                let x = pattern(base + offset);
                *v = T::from_parts(x, x);
            }
        });
}

/// All tensor storage for one problem.
pub struct BufferSet<T: Element> {
    /// Input tensor.
    pub a: AlignedBuf<T>,
    /// Untouched initial output, used to reset the working copies.
    pub golden: AlignedBuf<T>,
    /// One working output per benchmarked variant.
    pub working: Vec<AlignedBuf<T>>,
}

impl<T: Element> BufferSet<T> {
    /// Allocate `A`, golden `B` and `variants` working copies.
    pub fn allocate(spec: &ProblemSpec, variants: usize) -> Result<Self> {
        let n = spec.total_size();
        debug!(
            elements = n,
            variants,
            bytes_each = n * std::mem::size_of::<T>(),
            "allocating tensor buffers"
        );

        let mut a = AlignedBuf::filled(n, T::zero())?;
        let mut golden = AlignedBuf::filled(n, T::zero())?;
        fill_pattern(&mut a, pattern_a);
        fill_pattern(&mut golden, pattern_b);

        let working = (0..variants)
            .map(|_| golden.try_clone())
            .collect::<Result<Vec<_>>>()?;

        Ok(BufferSet { a, golden, working })
    }

    pub fn len(&self) -> usize {
        self.a.len()
    }

    pub fn is_empty(&self) -> bool {
        self.a.is_empty()
    }
}

/// A working buffer paired with the golden state it restarts from.
pub struct Trial<'g, T: Element> {
    golden: &'g [T],
    working: AlignedBuf<T>,
}

impl<'g, T: Element> Trial<'g, T> {
    /// # Panics
    ///
    /// Panics if `golden` and `working` differ in length.
    pub fn new(golden: &'g [T], working: AlignedBuf<T>) -> Self {
        assert_eq!(golden.len(), working.len(), "trial buffers differ in length");
        Trial { golden, working }
    }

    /// Put the working buffer back into its initial state.
    pub fn reset(&mut self) {
        restore(self.golden, &mut self.working);
    }

    pub fn golden(&self) -> &[T] {
        self.golden
    }

    pub fn working(&self) -> &[T] {
        &self.working
    }

    pub fn working_mut(&mut self) -> &mut [T] {
        &mut self.working
    }
}
