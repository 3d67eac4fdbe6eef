use std::alloc::{Layout, alloc, dealloc};
use std::mem::MaybeUninit;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

use rayon::prelude::*;

use crate::error::{BenchError, Result};

/// Alignment of every tensor and scratch buffer: one cache line.
pub const BUFFER_ALIGN: usize = 64;

/// Elements per rayon task when initialising a buffer.
const FILL_CHUNK: usize = 1 << 16;

/// Heap buffer of `T` aligned to [`BUFFER_ALIGN`] bytes.
///
/// Always fully initialised: every constructor writes all `len` elements.
pub struct AlignedBuf<T: Copy> {
    ptr: NonNull<T>,
    len: usize,
    layout: Layout,
}

// SAFETY: The allocation is exclusively owned; no interior mutability.
unsafe impl<T: Copy + Send> Send for AlignedBuf<T> {}
unsafe impl<T: Copy + Sync> Sync for AlignedBuf<T> {}

impl<T: Copy + Send + Sync> AlignedBuf<T> {
    /// Allocate `len` elements, each set to `value`.
    pub fn filled(len: usize, value: T) -> Result<Self> {
        Self::from_fn(len, |_| value)
    }

    /// Allocate `len` elements, element `i` set to `f(i)`, filling in
    /// parallel so large buffers are first touched by many threads.
    pub fn from_fn(len: usize, f: impl Fn(usize) -> T + Sync) -> Result<Self> {
        let buf = Self::uninit(len)?;
        // SAFETY: the allocation holds `len` elements; MaybeUninit makes no
        // claim about their contents until written.
        let slots = unsafe {
            std::slice::from_raw_parts_mut(buf.ptr.as_ptr().cast::<MaybeUninit<T>>(), len)
        };
        slots
            .par_chunks_mut(FILL_CHUNK)
            .enumerate()
            .for_each(|(chunk, values)| {
                let base = chunk * FILL_CHUNK;
                for (offset, slot) in values.iter_mut().enumerate() {
                    slot.write(f(base + offset));
                }
            });
        Ok(buf)
    }
}

impl<T: Copy> AlignedBuf<T> {

    /// Allocate and copy data from `data`.
    pub fn from_slice(data: &[T]) -> Result<Self> {
        let buf = Self::uninit(data.len())?;
        // SAFETY: buf has room for data.len() elements and the regions are
        // distinct allocations.
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), buf.ptr.as_ptr(), data.len());
        }
        Ok(buf)
    }

    /// Callers must initialise all `len` elements before exposing the buffer.
    fn uninit(len: usize) -> Result<Self> {
        if len == 0 {
            return Err(BenchError::argument("cannot allocate an empty buffer"));
        }
        let bytes = len
            .checked_mul(std::mem::size_of::<T>())
            .ok_or(BenchError::Allocation { bytes: usize::MAX })?;
        let align = BUFFER_ALIGN.max(std::mem::align_of::<T>());
        let layout =
            Layout::from_size_align(bytes, align).map_err(|_| BenchError::Allocation { bytes })?;

        // SAFETY: layout has non-zero size (len > 0 and T is a sized numeric type).
        let raw = unsafe { alloc(layout) };
        let ptr = NonNull::new(raw as *mut T).ok_or(BenchError::Allocation { bytes })?;

        Ok(Self { ptr, len, layout })
    }

    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.ptr.as_ptr()
    }

    pub fn as_slice(&self) -> &[T] {
        // SAFETY: we own `len` initialised elements starting at `ptr`.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: as above, and `&mut self` guarantees exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    pub fn byte_len(&self) -> usize {
        self.layout.size()
    }

    pub fn try_clone(&self) -> Result<Self> {
        Self::from_slice(self.as_slice())
    }
}

impl<T: Copy> Deref for AlignedBuf<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T: Copy> DerefMut for AlignedBuf<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T: Copy> Drop for AlignedBuf<T> {
    fn drop(&mut self) {
        // SAFETY: ptr was allocated with this exact layout.
        unsafe {
            dealloc(self.ptr.as_ptr() as *mut u8, self.layout);
        }
    }
}

impl<T: Copy + std::fmt::Debug> std::fmt::Debug for AlignedBuf<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignedBuf")
            .field("len", &self.len)
            .field("align", &self.layout.align())
            .finish()
    }
}
