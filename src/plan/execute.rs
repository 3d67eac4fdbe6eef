//! Walking the loop nest down to the leaf kernels.

use rayon::prelude::*;

use crate::element::Element;
use crate::plan::kernel::{Leaf, LeafFn, Scale};

/// Elements per task when a copy leaf is split across threads.
const COPY_CHUNK: usize = 1 << 14;

/// One outer loop: `end` iterations advancing A by `src` and B by `dst`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopLevel {
    pub end: usize,
    pub src: isize,
    pub dst: isize,
}

/// Raw pointers handed to rayon tasks.
///
/// Accessed only through methods so closures capture the wrapper rather
/// than the bare pointer field.
#[derive(Clone, Copy)]
struct SendConst<T>(*const T);

#[derive(Clone, Copy)]
struct SendMut<T>(*mut T);

// SAFETY: tasks write disjoint parts of B and only read A; the plan's
// owner holds `&mut` to B for the whole execution.
unsafe impl<T: Send> Send for SendConst<T> {}
unsafe impl<T: Sync> Sync for SendConst<T> {}
unsafe impl<T: Send> Send for SendMut<T> {}
unsafe impl<T: Sync> Sync for SendMut<T> {}

impl<T> SendConst<T> {
    fn get(self) -> *const T {
        self.0
    }
}

impl<T> SendMut<T> {
    fn get(self) -> *mut T {
        self.0
    }
}

/// Run the nest on the calling thread.
///
/// # Safety
///
/// `src` and `dst` must cover every offset reachable through `loops` and
/// `leaf`, and must not overlap.
pub unsafe fn run_serial<T: Element>(
    src: *const T,
    dst: *mut T,
    loops: &[LoopLevel],
    leaf: &Leaf,
    kernel: LeafFn<T>,
    scale: Scale<T>,
) {
    match loops.split_first() {
        None => unsafe { kernel(src, dst, leaf, scale) },
        Some((level, rest)) => {
            let mut s = src;
            let mut d = dst;
            for _ in 0..level.end {
                // SAFETY: forwarded from the caller.
                unsafe {
                    run_serial(s, d, rest, leaf, kernel, scale);
                    s = s.offset(level.src);
                    d = d.offset(level.dst);
                }
            }
        }
    }
}

/// Run the nest with the outermost loop (or the leaf itself) split across
/// the current rayon pool.
///
/// # Safety
///
/// Same as [`run_serial`]; additionally distinct iterations of the split
/// loop must write disjoint parts of `dst`, which holds for any permutation.
pub unsafe fn run_parallel<T: Element>(
    src: *const T,
    dst: *mut T,
    loops: &[LoopLevel],
    leaf: &Leaf,
    kernel: LeafFn<T>,
    scale: Scale<T>,
) {
    let src = SendConst(src);
    let dst = SendMut(dst);

    if let Some((level, rest)) = loops.split_first() {
        if level.end > 1 {
            let level = *level;
            (0..level.end).into_par_iter().for_each(|k| {
                let k = k as isize;
                // SAFETY: iteration k owns the slab at offset k * stride.
                unsafe {
                    run_serial(
                        src.get().offset(k * level.src),
                        dst.get().offset(k * level.dst),
                        rest,
                        leaf,
                        kernel,
                        scale,
                    );
                }
            });
            return;
        }
    }

    match *leaf {
        Leaf::Transpose {
            size_b,
            lda,
            sb,
            block,
            ..
        } => {
            let chunks = size_b.div_ceil(block);
            (0..chunks).into_par_iter().for_each(|c| {
                let start = c * block;
                let mut part = *leaf;
                if let Leaf::Transpose { size_b: ref mut n, .. } = part {
                    *n = block.min(size_b - start);
                }
                let start = start as isize;
                // SAFETY: each chunk covers its own band of j.
                unsafe {
                    run_serial(
                        src.get().offset(start * lda),
                        dst.get().offset(start * sb),
                        loops,
                        &part,
                        kernel,
                        scale,
                    );
                }
            });
        }
        Leaf::Copy {
            count,
            src_stride,
            dst_stride,
        } => {
            let chunks = count.div_ceil(COPY_CHUNK);
            (0..chunks).into_par_iter().for_each(|c| {
                let start = c * COPY_CHUNK;
                let part = Leaf::Copy {
                    count: COPY_CHUNK.min(count - start),
                    src_stride,
                    dst_stride,
                };
                let start = start as isize;
                // SAFETY: each chunk covers its own run of the shared dim.
                unsafe {
                    run_serial(
                        src.get().offset(start * src_stride),
                        dst.get().offset(start * dst_stride),
                        loops,
                        &part,
                        kernel,
                        scale,
                    );
                }
            });
        }
        Leaf::Scalar => unsafe { run_serial(src.get(), dst.get(), loops, leaf, kernel, scale) },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::kernel::select_leaf;

    #[test]
    fn test_serial_nest_batched_transpose() {
        // 3 independent 2x4 -> 4x2 transposes stacked along the last dim.
        let a: Vec<f64> = (0..24).map(|x| x as f64).collect();
        let mut b = vec![0.0; 24];
        let leaf = Leaf::Transpose {
            size_a: 2,
            size_b: 4,
            sa: 1,
            lda: 2,
            sb: 1,
            ldb: 4,
            block: 16,
        };
        let loops = [LoopLevel { end: 3, src: 8, dst: 8 }];
        let kernel = select_leaf::<f64>(&leaf, false);
        let scale = Scale { alpha: 1.0, beta: 0.0 };
        unsafe { run_serial(a.as_ptr(), b.as_mut_ptr(), &loops, &leaf, kernel, scale) };
        for k in 0..3 {
            for i in 0..2 {
                for j in 0..4 {
                    assert_eq!(b[k * 8 + j + i * 4], a[k * 8 + i + j * 2]);
                }
            }
        }
    }

    #[test]
    fn test_parallel_leaf_split_matches_serial() {
        let (rows, cols) = (70, 131);
        let a: Vec<f64> = (0..rows * cols).map(|x| x as f64 * 0.25).collect();
        let leaf = Leaf::Transpose {
            size_a: rows,
            size_b: cols,
            sa: 1,
            lda: rows as isize,
            sb: 1,
            ldb: cols as isize,
            block: 16,
        };
        let kernel = select_leaf::<f64>(&leaf, true);
        let scale = Scale { alpha: 2.0, beta: -1.0 };
        let mut serial = vec![1.0; rows * cols];
        let mut parallel = vec![1.0; rows * cols];
        unsafe {
            run_serial(a.as_ptr(), serial.as_mut_ptr(), &[], &leaf, kernel, scale);
            run_parallel(a.as_ptr(), parallel.as_mut_ptr(), &[], &leaf, kernel, scale);
        }
        assert_eq!(serial, parallel);
    }

    #[test]
    fn test_parallel_copy_split() {
        let n = COPY_CHUNK * 3 + 17;
        let a: Vec<f32> = (0..n).map(|x| (x % 97) as f32).collect();
        let mut b = vec![0.0f32; n];
        let leaf = Leaf::Copy {
            count: n,
            src_stride: 1,
            dst_stride: 1,
        };
        let kernel = select_leaf::<f32>(&leaf, false);
        unsafe {
            run_parallel(
                a.as_ptr(),
                b.as_mut_ptr(),
                &[],
                &leaf,
                kernel,
                Scale { alpha: 1.0, beta: 0.0 },
            )
        };
        assert_eq!(a, b);
    }
}
