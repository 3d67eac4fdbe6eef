//! Leaf kernels: the innermost two-dimensional work of a plan.
//!
//! A transpose leaf walks a `size_a × size_b` panel in BLOCK × BLOCK macro
//! tiles, each made of MICRO × MICRO micro tiles plus scalar edges. `i` runs
//! along the dimension that is contiguous in A, `j` along the dimension that
//! is contiguous in B:
//!
//! ```text
//! B[j*sb + i*ldb] = alpha * A[i*sa + j*lda] (+ beta * B[j*sb + i*ldb])
//! ```
//!
//! A copy leaf handles the case where A and B share their fastest dimension.

use crate::element::Element;

/// Scalars bound into a plan.
#[derive(Debug, Clone, Copy)]
pub struct Scale<T> {
    pub alpha: T,
    pub beta: T,
}

/// Shape of the work done at the bottom of the loop nest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leaf {
    /// Two different fastest dimensions.
    Transpose {
        size_a: usize,
        size_b: usize,
        /// Stride of A along `i` (1 without outer extents).
        sa: isize,
        /// Stride of A along `j`.
        lda: isize,
        /// Stride of B along `j` (1 without outer extents).
        sb: isize,
        /// Stride of B along `i`.
        ldb: isize,
        block: usize,
    },
    /// A and B are both fastest along the same dimension.
    Copy {
        count: usize,
        src_stride: isize,
        dst_stride: isize,
    },
    /// Every dimension has extent 1.
    Scalar,
}

/// Micro tile edge for an element of `elem_size` bytes: one 256-bit
/// register's worth of elements, at least 1.
pub fn micro_for(elem_size: usize) -> usize {
    match elem_size {
        0..=4 => 8,
        5..=8 => 4,
        9..=16 => 2,
        _ => 1,
    }
}

/// Macro tile edge.
pub fn block_for(elem_size: usize) -> usize {
    micro_for(elem_size) * 4
}

/// Function running one leaf at the given base pointers.
pub type LeafFn<T> = unsafe fn(*const T, *mut T, &Leaf, Scale<T>);

/// Choose the monomorphized leaf for this element size, beta and stride
/// pattern.
pub fn select_leaf<T: Element>(leaf: &Leaf, accumulate: bool) -> LeafFn<T> {
    match *leaf {
        Leaf::Scalar => {
            if accumulate {
                scalar_leaf::<T, true>
            } else {
                scalar_leaf::<T, false>
            }
        }
        Leaf::Copy {
            src_stride,
            dst_stride,
            ..
        } => {
            let unit = src_stride == 1 && dst_stride == 1;
            match (accumulate, unit) {
                (true, true) => copy_leaf::<T, true, true>,
                (true, false) => copy_leaf::<T, true, false>,
                (false, true) => copy_leaf::<T, false, true>,
                (false, false) => copy_leaf::<T, false, false>,
            }
        }
        Leaf::Transpose { sa, sb, .. } => {
            let unit = sa == 1 && sb == 1;
            match micro_for(std::mem::size_of::<T>()) {
                8 => pick_transpose::<T, 8>(accumulate, unit),
                4 => pick_transpose::<T, 4>(accumulate, unit),
                2 => pick_transpose::<T, 2>(accumulate, unit),
                _ => pick_transpose::<T, 1>(accumulate, unit),
            }
        }
    }
}

fn pick_transpose<T: Element, const M: usize>(accumulate: bool, unit: bool) -> LeafFn<T> {
    match (accumulate, unit) {
        (true, true) => transpose_leaf::<T, M, true, true>,
        (true, false) => transpose_leaf::<T, M, true, false>,
        (false, true) => transpose_leaf::<T, M, false, true>,
        (false, false) => transpose_leaf::<T, M, false, false>,
    }
}

#[inline(always)]
unsafe fn store<T: Element, const ACC: bool>(dst: *mut T, value: T, scale: Scale<T>) {
    // SAFETY: caller guarantees `dst` is valid for reads and writes.
    unsafe {
        if ACC {
            *dst = scale.alpha * value + scale.beta * *dst;
        } else {
            *dst = scale.alpha * value;
        }
    }
}

unsafe fn scalar_leaf<T: Element, const ACC: bool>(
    src: *const T,
    dst: *mut T,
    _leaf: &Leaf,
    scale: Scale<T>,
) {
    // SAFETY: a scalar leaf touches exactly one element of each buffer.
    unsafe { store::<T, ACC>(dst, *src, scale) };
}

unsafe fn copy_leaf<T: Element, const ACC: bool, const UNIT: bool>(
    src: *const T,
    dst: *mut T,
    leaf: &Leaf,
    scale: Scale<T>,
) {
    let Leaf::Copy {
        count,
        src_stride,
        dst_stride,
    } = *leaf
    else {
        return;
    };

    if UNIT {
        // SAFETY: the plan checked both buffers cover `count` unit-stride
        // elements from these bases, and A and B never alias.
        let (s, d) = unsafe {
            (
                std::slice::from_raw_parts(src, count),
                std::slice::from_raw_parts_mut(dst, count),
            )
        };
        if ACC {
            for (d, &s) in d.iter_mut().zip(s) {
                *d = scale.alpha * s + scale.beta * *d;
            }
        } else {
            for (d, &s) in d.iter_mut().zip(s) {
                *d = scale.alpha * s;
            }
        }
    } else {
        for k in 0..count as isize {
            // SAFETY: offsets stay within the extents validated at plan time.
            unsafe { store::<T, ACC>(dst.offset(k * dst_stride), *src.offset(k * src_stride), scale) };
        }
    }
}

unsafe fn transpose_leaf<T: Element, const M: usize, const ACC: bool, const UNIT: bool>(
    src: *const T,
    dst: *mut T,
    leaf: &Leaf,
    scale: Scale<T>,
) {
    let Leaf::Transpose {
        size_a,
        size_b,
        sa,
        lda,
        sb,
        ldb,
        block,
    } = *leaf
    else {
        return;
    };
    let (sa, sb) = if UNIT { (1, 1) } else { (sa, sb) };

    let mut jb = 0usize;
    while jb < size_b {
        let bb = block.min(size_b - jb);
        let mut ia = 0usize;
        while ia < size_a {
            let ba = block.min(size_a - ia);
            let (i, j) = (ia as isize, jb as isize);
            // SAFETY: the tile lies inside the leaf panel.
            unsafe {
                macro_tile::<T, M, ACC>(
                    src.offset(i * sa + j * lda),
                    dst.offset(j * sb + i * ldb),
                    ba,
                    bb,
                    [sa, lda, sb, ldb],
                    scale,
                );
            }
            ia += block;
        }
        jb += block;
    }
}

/// One `ba × bb` tile: full micro tiles first, then the ragged edges.
#[inline(always)]
unsafe fn macro_tile<T: Element, const M: usize, const ACC: bool>(
    src: *const T,
    dst: *mut T,
    ba: usize,
    bb: usize,
    [sa, lda, sb, ldb]: [isize; 4],
    scale: Scale<T>,
) {
    let full_a = ba / M * M;
    let full_b = bb / M * M;

    for j in (0..full_b).step_by(M) {
        for i in (0..full_a).step_by(M) {
            let (i, j) = (i as isize, j as isize);
            // SAFETY: (i, j) + M stays inside the tile.
            unsafe {
                micro_tile::<T, M, ACC>(
                    src.offset(i * sa + j * lda),
                    dst.offset(j * sb + i * ldb),
                    [sa, lda, sb, ldb],
                    scale,
                );
            }
        }
    }

    // SAFETY: every edge range below is inside the tile.
    unsafe {
        // right edge: leftover i for full j
        edge::<T, ACC>(src, dst, full_a..ba, 0..full_b, [sa, lda, sb, ldb], scale);
        // bottom edge and corner: leftover j for all i
        edge::<T, ACC>(src, dst, 0..ba, full_b..bb, [sa, lda, sb, ldb], scale);
    }
}

#[inline(always)]
unsafe fn micro_tile<T: Element, const M: usize, const ACC: bool>(
    src: *const T,
    dst: *mut T,
    [sa, lda, sb, ldb]: [isize; 4],
    scale: Scale<T>,
) {
    let mut tile = [[T::zero(); M]; M];
    for (j, row) in tile.iter_mut().enumerate() {
        for (i, v) in row.iter_mut().enumerate() {
            // SAFETY: i, j < M and the micro tile is in bounds.
            *v = unsafe { *src.offset(i as isize * sa + j as isize * lda) };
        }
    }
    for i in 0..M {
        for (j, row) in tile.iter().enumerate() {
            // SAFETY: as above.
            unsafe {
                store::<T, ACC>(dst.offset(j as isize * sb + i as isize * ldb), row[i], scale);
            }
        }
    }
}

#[inline(always)]
unsafe fn edge<T: Element, const ACC: bool>(
    src: *const T,
    dst: *mut T,
    is: std::ops::Range<usize>,
    js: std::ops::Range<usize>,
    [sa, lda, sb, ldb]: [isize; 4],
    scale: Scale<T>,
) {
    for i in is {
        for j in js.clone() {
            let (i, j) = (i as isize, j as isize);
            // SAFETY: caller passes ranges inside the tile.
            unsafe { store::<T, ACC>(dst.offset(j * sb + i * ldb), *src.offset(i * sa + j * lda), scale) };
        }
    }
}
