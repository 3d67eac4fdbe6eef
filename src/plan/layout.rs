//! Stride bookkeeping for plan construction.
//!
//! All tensors are column-major: dimension 0 has stride 1. Plans work in
//! the output's index order, so the source strides are permuted to line up
//! with the destination's dimensions.

use crate::error::{BenchError, Result};

/// Column-major strides for a tensor stored with the given outer extents.
///
/// Fails when the storage size does not fit in `isize`.
pub fn col_major_strides(outer: &[usize]) -> Result<Vec<isize>> {
    let mut strides = Vec::with_capacity(outer.len());
    let mut acc: isize = 1;
    for &e in outer {
        strides.push(acc);
        acc = isize::try_from(e)
            .ok()
            .and_then(|e| acc.checked_mul(e))
            .ok_or_else(|| BenchError::argument(format!("storage of {outer:?} overflows isize")))?;
    }
    Ok(strides)
}

/// Number of elements a buffer must hold to cover `extents` at `strides`.
pub fn required_len(extents: &[usize], strides: &[isize]) -> Result<usize> {
    extents
        .iter()
        .zip(strides)
        .try_fold(1usize, |acc, (&e, &s)| {
            e.checked_sub(1)
                .and_then(|steps| steps.checked_mul(s.unsigned_abs()))
                .and_then(|span| acc.checked_add(span))
        })
        .ok_or_else(|| BenchError::argument("tensor span overflows usize"))
}

/// Outer extents default to the extents; otherwise each must be at least
/// as large as its extent. Either way the storage size must fit in `isize`.
pub fn resolve_outer(extents: &[usize], outer: Option<&[usize]>, which: &str) -> Result<Vec<usize>> {
    let outer = match outer {
        None => extents,
        Some(outer) => {
            if outer.len() != extents.len() {
                return Err(BenchError::argument(format!(
                    "outer extents of {which} have length {}, expected {}",
                    outer.len(),
                    extents.len()
                )));
            }
            if let Some(k) = (0..outer.len()).find(|&k| outer[k] < extents[k]) {
                return Err(BenchError::argument(format!(
                    "outer extent {} of {which} is smaller than extent {}",
                    outer[k], extents[k]
                )));
            }
            outer
        }
    };
    outer
        .iter()
        .try_fold(1usize, |acc, &e| acc.checked_mul(e))
        .filter(|&size| isize::try_from(size).is_ok())
        .ok_or_else(|| BenchError::argument(format!("outer size of {which} overflows isize")))?;
    Ok(outer.to_vec())
}

/// Loop description in output index order: `dims[k]` iterations, moving
/// `src[k]` elements in A and `dst[k]` elements in B per step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopNest {
    pub dims: Vec<usize>,
    pub src: Vec<isize>,
    pub dst: Vec<isize>,
}

impl LoopNest {
    /// Express a permuted copy as a loop nest over B's dimensions.
    pub fn for_permutation(
        perm: &[usize],
        extents_a: &[usize],
        strides_a: &[isize],
        strides_b: &[isize],
    ) -> Self {
        LoopNest {
            dims: perm.iter().map(|&p| extents_a[p]).collect(),
            src: perm.iter().map(|&p| strides_a[p]).collect(),
            dst: strides_b.to_vec(),
        }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Remove size-1 dimensions; they never move either pointer.
    pub fn squeeze(self) -> Self {
        let keep: Vec<usize> = (0..self.rank()).filter(|&k| self.dims[k] > 1).collect();
        LoopNest {
            dims: keep.iter().map(|&k| self.dims[k]).collect(),
            src: keep.iter().map(|&k| self.src[k]).collect(),
            dst: keep.iter().map(|&k| self.dst[k]).collect(),
        }
    }

    /// Merge neighbouring dimensions that are contiguous in both A and B.
    pub fn fuse(self) -> Self {
        let n = self.rank();
        if n <= 1 {
            return self;
        }

        let mut dims = Vec::with_capacity(n);
        let mut src = Vec::with_capacity(n);
        let mut dst = Vec::with_capacity(n);
        dims.push(self.dims[0]);
        src.push(self.src[0]);
        dst.push(self.dst[0]);

        for i in 1..n {
            let last = dims.len() - 1;
            let extent = dims[last] as isize;
            if self.src[i] == src[last] * extent && self.dst[i] == dst[last] * extent {
                dims[last] *= self.dims[i];
            } else {
                dims.push(self.dims[i]);
                src.push(self.src[i]);
                dst.push(self.dst[i]);
            }
        }

        LoopNest { dims, src, dst }
    }

    pub fn total(&self) -> usize {
        self.dims.iter().product()
    }
}

/// Dimension with the smallest absolute stride.
pub fn smallest_stride_dim(strides: &[isize]) -> usize {
    strides
        .iter()
        .enumerate()
        .min_by_key(|(_, s)| s.unsigned_abs())
        .map(|(i, _)| i)
        .unwrap_or(0)
}
