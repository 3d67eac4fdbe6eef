//! Transpose plans.
//!
//! Planning is done once and may be expensive: the planner fuses
//! dimensions, picks the leaf kernel, orders the outer loops and, with
//! [`PlanEffort::Measure`], times candidate loop orders. A [`Plan`] can then
//! be executed any number of times against a fresh output buffer.
//!
//! # Example
//!
//! ```
//! use transpose_bench::plan::{Planner, Transposer};
//! use transpose_bench::PlanEffort;
//!
//! // 2x3 column-major matrix
//! let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
//! let mut b = [0.0; 6];
//!
//! let planner = Planner::new(1, PlanEffort::Estimate).unwrap();
//! let plan = planner
//!     .create_plan(&[1, 0], 1.0, &a, &[2, 3], None, 0.0, None)
//!     .unwrap();
//! plan.execute(&mut b).unwrap();
//!
//! assert_eq!(b, [1.0, 3.0, 5.0, 2.0, 4.0, 6.0]);
//! ```

pub mod execute;
pub mod kernel;
pub mod layout;

use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::ThreadPool;
use tracing::{debug, info};

use crate::buffer::AlignedBuf;
use crate::config::{HarnessConfig, PlanEffort};
use crate::element::Element;
use crate::error::{BenchError, Result};
use crate::problem::validate_permutation;

use execute::{LoopLevel, run_parallel, run_serial};
use kernel::{Leaf, LeafFn, Scale, block_for, select_leaf};
use layout::{LoopNest, col_major_strides, required_len, resolve_outer, smallest_stride_dim};

/// Tensors smaller than this run on one thread even when a pool exists.
pub const PARALLEL_THRESHOLD: usize = 1 << 15;

/// Upper bound on loop orders timed by [`PlanEffort::Measure`].
pub const MAX_CANDIDATES: usize = 24;

/// Timed runs per candidate during measurement.
const MEASURE_RUNS: usize = 3;

/// Something that computes `B = alpha * transpose(A) + beta * B` for
/// parameters fixed at construction.
pub trait Transposer<T: Element> {
    /// Name printed in the report.
    fn label(&self) -> String;

    /// Run once, reading the bound `A` and updating `b` in place.
    fn execute(&self, b: &mut [T]) -> Result<()>;
}

/// Builds plans with a fixed thread count and effort.
pub struct Planner {
    threads: usize,
    effort: PlanEffort,
    pool: Option<Arc<ThreadPool>>,
}

impl Planner {
    pub fn new(threads: usize, effort: PlanEffort) -> Result<Self> {
        if threads == 0 {
            return Err(BenchError::argument("thread count must be at least 1"));
        }
        let pool = if threads > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("transpose-{i}"))
                .build()
                .map_err(|e| BenchError::ThreadPool(e.to_string()))?;
            Some(Arc::new(pool))
        } else {
            None
        };
        Ok(Planner {
            threads,
            effort,
            pool,
        })
    }

    pub fn from_config(config: &HarnessConfig) -> Result<Self> {
        Self::new(config.threads, config.effort)
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Plan `B = alpha * A^perm + beta * B`.
    ///
    /// `size_a` are the extents of A; B's extents are `size_a[perm[i]]`.
    /// Outer extents describe padded storage and default to the extents.
    /// `a` must cover A's outer size; the B buffer is supplied to
    /// [`Plan::execute`].
    #[allow(clippy::too_many_arguments)]
    pub fn create_plan<'a, T: Element>(
        &self,
        perm: &[usize],
        alpha: T,
        a: &'a [T],
        size_a: &[usize],
        outer_size_a: Option<&[usize]>,
        beta: T,
        outer_size_b: Option<&[usize]>,
    ) -> Result<Plan<'a, T>> {
        let dim = perm.len();
        if dim == 0 {
            return Err(BenchError::argument("dimension must be at least 1"));
        }
        if size_a.len() != dim {
            return Err(BenchError::argument(format!(
                "permutation has {dim} entries but A has {} extents",
                size_a.len()
            )));
        }
        validate_permutation(perm)?;
        if size_a.contains(&0) {
            return Err(BenchError::argument("extents must be positive"));
        }

        let size_b: Vec<usize> = perm.iter().map(|&p| size_a[p]).collect();
        let outer_a = resolve_outer(size_a, outer_size_a, "A")?;
        let outer_b = resolve_outer(&size_b, outer_size_b, "B")?;
        let strides_a = col_major_strides(&outer_a)?;
        let strides_b = col_major_strides(&outer_b)?;

        let required_a = required_len(size_a, &strides_a)?;
        if a.len() < required_a {
            return Err(BenchError::argument(format!(
                "A holds {} elements, plan needs {required_a}",
                a.len()
            )));
        }
        let required_b = required_len(&size_b, &strides_b)?;

        let nest = LoopNest::for_permutation(perm, size_a, &strides_a, &strides_b)
            .squeeze()
            .fuse();
        let (leaf, mut loops) = split_leaf::<T>(&nest);
        order_loops(&mut loops, &leaf);

        let scale = Scale { alpha, beta };
        let accumulate = !beta.is_zero();
        let mut plan = Plan {
            a,
            scale,
            leaf,
            kernel: select_leaf::<T>(&leaf, accumulate),
            loops,
            total: nest.total(),
            required_b,
            effort: self.effort,
            threads: self.threads,
            pool: self.pool.clone(),
        };

        if self.effort == PlanEffort::Measure && plan.loops.len() > 1 {
            plan.loops = measure_best_order(&plan)?;
        }

        info!(
            perm = ?perm,
            extents = ?size_a,
            threads = self.threads,
            effort = %self.effort,
            leaf = ?plan.leaf,
            loops = plan.loops.len(),
            "created transpose plan"
        );
        Ok(plan)
    }
}

/// Reusable, parameter-bound transpose of a borrowed input tensor.
pub struct Plan<'a, T: Element> {
    a: &'a [T],
    scale: Scale<T>,
    leaf: Leaf,
    kernel: LeafFn<T>,
    /// Outer loops, outermost first.
    loops: Vec<LoopLevel>,
    total: usize,
    required_b: usize,
    effort: PlanEffort,
    threads: usize,
    pool: Option<Arc<ThreadPool>>,
}

impl<T: Element> std::fmt::Debug for Plan<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plan")
            .field("leaf", &self.leaf)
            .field("loops", &self.loops)
            .field("effort", &self.effort)
            .field("threads", &self.threads)
            .finish()
    }
}

impl<T: Element> Plan<'_, T> {
    pub fn leaf(&self) -> &Leaf {
        &self.leaf
    }

    pub fn loops(&self) -> &[LoopLevel] {
        &self.loops
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Minimum length of the B buffer passed to `execute`.
    pub fn required_b_len(&self) -> usize {
        self.required_b
    }

    // SAFETY (both arms): create_plan checked `a` covers A's extents and
    // the caller checked `b` covers B's; `b` is borrowed mutably so it
    // cannot alias `a`.
    fn run_with(&self, loops: &[LoopLevel], b: &mut [T]) {
        match &self.pool {
            Some(pool) if self.total >= PARALLEL_THRESHOLD => pool.install(|| {
                let (src, dst) = (self.a.as_ptr(), b.as_mut_ptr());
                unsafe { run_parallel(src, dst, loops, &self.leaf, self.kernel, self.scale) }
            }),
            _ => {
                let (src, dst) = (self.a.as_ptr(), b.as_mut_ptr());
                unsafe { run_serial(src, dst, loops, &self.leaf, self.kernel, self.scale) }
            }
        }
    }

    fn check_b(&self, b: &[T]) -> Result<()> {
        if b.len() < self.required_b {
            return Err(BenchError::argument(format!(
                "B holds {} elements, plan needs {}",
                b.len(),
                self.required_b
            )));
        }
        Ok(())
    }
}

impl<T: Element> Transposer<T> for Plan<'_, T> {
    fn label(&self) -> String {
        format!("plan ({})", self.effort)
    }

    fn execute(&self, b: &mut [T]) -> Result<()> {
        self.check_b(b)?;
        self.run_with(&self.loops, b);
        Ok(())
    }
}

/// Pick the leaf from the fused nest; every other dimension becomes an
/// outer loop (in nest order for now).
fn split_leaf<T: Element>(nest: &LoopNest) -> (Leaf, Vec<LoopLevel>) {
    if nest.rank() == 0 {
        return (Leaf::Scalar, Vec::new());
    }

    let dim_a = smallest_stride_dim(&nest.src);
    let dim_b = smallest_stride_dim(&nest.dst);

    let leaf = if dim_a == dim_b {
        Leaf::Copy {
            count: nest.dims[dim_a],
            src_stride: nest.src[dim_a],
            dst_stride: nest.dst[dim_a],
        }
    } else {
        Leaf::Transpose {
            size_a: nest.dims[dim_a],
            size_b: nest.dims[dim_b],
            sa: nest.src[dim_a],
            lda: nest.src[dim_b],
            sb: nest.dst[dim_b],
            ldb: nest.dst[dim_a],
            block: block_for(std::mem::size_of::<T>()),
        }
    };

    let loops = (0..nest.rank())
        .filter(|&k| k != dim_a && k != dim_b)
        .map(|k| LoopLevel {
            end: nest.dims[k],
            src: nest.src[k],
            dst: nest.dst[k],
        })
        .collect();

    (leaf, loops)
}

/// Heuristic loop order: the largest strides go outermost.
fn order_loops(loops: &mut [LoopLevel], leaf: &Leaf) {
    match leaf {
        Leaf::Copy { .. } => loops.sort_by_key(|l| std::cmp::Reverse(l.dst.unsigned_abs())),
        _ => loops.sort_by_key(|l| std::cmp::Reverse(l.src.unsigned_abs() + l.dst.unsigned_abs())),
    }
}

/// Candidate loop orders: every ordering for small nests, otherwise the
/// heuristic order plus each adjacent swap of it.
fn candidate_orders(loops: &[LoopLevel]) -> Vec<Vec<LoopLevel>> {
    if loops.len() <= 4 {
        let mut out = Vec::new();
        permutations(loops.to_vec(), 0, &mut out);
        out.truncate(MAX_CANDIDATES);
        return out;
    }
    let mut out = vec![loops.to_vec()];
    for k in 0..loops.len() - 1 {
        if out.len() == MAX_CANDIDATES {
            break;
        }
        let mut swapped = loops.to_vec();
        swapped.swap(k, k + 1);
        out.push(swapped);
    }
    out
}

fn permutations(mut items: Vec<LoopLevel>, start: usize, out: &mut Vec<Vec<LoopLevel>>) {
    if start == items.len() {
        out.push(items);
        return;
    }
    for k in start..items.len() {
        items.swap(start, k);
        permutations(items.clone(), start + 1, out);
        items.swap(start, k);
    }
}

/// Time each candidate order against a scratch output and keep the fastest.
fn measure_best_order<T: Element>(plan: &Plan<'_, T>) -> Result<Vec<LoopLevel>> {
    let mut scratch = AlignedBuf::filled(plan.required_b, T::zero())?;
    let mut best: Option<(Duration, Vec<LoopLevel>)> = None;

    for candidate in candidate_orders(&plan.loops) {
        plan.run_with(&candidate, &mut scratch);
        let mut fastest = Duration::MAX;
        for _ in 0..MEASURE_RUNS {
            let start = Instant::now();
            plan.run_with(&candidate, &mut scratch);
            fastest = fastest.min(start.elapsed());
        }
        debug!(order = ?candidate, elapsed = ?fastest, "timed candidate loop order");
        if best.as_ref().is_none_or(|(t, _)| fastest < *t) {
            best = Some((fastest, candidate));
        }
    }

    Ok(best.map(|(_, order)| order).unwrap_or_else(|| plan.loops.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planner() -> Planner {
        Planner::new(1, PlanEffort::Estimate).unwrap()
    }

    #[test]
    fn test_matrix_transpose_plan_shape() {
        let a = vec![0.0f64; 20];
        let plan = planner()
            .create_plan(&[1, 0], 1.0, &a, &[4, 5], None, 0.0, None)
            .unwrap();
        assert_eq!(
            *plan.leaf(),
            Leaf::Transpose {
                size_a: 4,
                size_b: 5,
                sa: 1,
                lda: 4,
                sb: 1,
                ldb: 5,
                block: 16,
            }
        );
        assert!(plan.loops().is_empty());
        assert_eq!(plan.required_b_len(), 20);
    }

    #[test]
    fn test_identity_becomes_single_copy() {
        let a = vec![1.0f32; 24];
        let plan = planner()
            .create_plan(&[0, 1, 2], 1.0, &a, &[2, 3, 4], None, 0.0, None)
            .unwrap();
        assert_eq!(
            *plan.leaf(),
            Leaf::Copy {
                count: 24,
                src_stride: 1,
                dst_stride: 1
            }
        );
    }

    #[test]
    fn test_all_unit_extents_is_scalar() {
        let a = [3.0f64];
        let mut b = [1.0f64];
        let plan = planner()
            .create_plan(&[1, 0, 2], 2.0, &a, &[1, 1, 1], None, 0.5, None)
            .unwrap();
        assert_eq!(*plan.leaf(), Leaf::Scalar);
        plan.execute(&mut b).unwrap();
        assert_eq!(b[0], 6.5);
    }

    #[test]
    fn test_rejects_bad_requests() {
        let a = vec![0.0f64; 6];
        let p = planner();
        assert!(p.create_plan(&[0, 0], 1.0, &a, &[2, 3], None, 0.0, None).is_err());
        assert!(p.create_plan(&[1, 0], 1.0, &a, &[2, 4], None, 0.0, None).is_err());
        assert!(p.create_plan(&[1, 0], 1.0, &a, &[2, 3], Some(&[1, 3]), 0.0, None).is_err());
        assert!(p.create_plan::<f64>(&[], 1.0, &a, &[], None, 0.0, None).is_err());

        let plan = p.create_plan(&[1, 0], 1.0, &a, &[2, 3], None, 0.0, None).unwrap();
        let mut short = vec![0.0; 5];
        assert!(plan.execute(&mut short).unwrap_err().is_argument());
    }

    #[test]
    fn test_oversized_outer_extents_are_errors() {
        let a = vec![0.0f64; 4];
        let p = planner();
        let err = p
            .create_plan(&[0, 1], 1.0, &a, &[2, 2], Some(&[1 << 62, 2]), 0.0, None)
            .unwrap_err();
        assert!(err.is_argument());
        let err = p
            .create_plan(&[1, 0], 1.0, &a, &[2, 2], None, 0.0, Some(&[2, usize::MAX / 2]))
            .unwrap_err();
        assert!(err.is_argument());
    }

    #[test]
    fn test_outer_extents_with_non_unit_inner_stride() {
        // A is 1x5 stored in a 3x5 buffer: the only real dim has stride 3.
        let a: Vec<f64> = (0..15).map(|x| x as f64).collect();
        let mut b = vec![-1.0; 10];
        let plan = planner()
            .create_plan(&[1, 0], 1.0, &a, &[1, 5], Some(&[3, 5]), 0.0, Some(&[5, 2]))
            .unwrap();
        plan.execute(&mut b).unwrap();
        // B is 5x1 inside 5x2: first column gets A[0, j] = a[3 * j]
        assert_eq!(&b[..5], &[0.0, 3.0, 6.0, 9.0, 12.0]);
        assert!(b[5..].iter().all(|&x| x == -1.0));
    }

    #[test]
    fn test_candidate_orders() {
        let l = |end| LoopLevel { end, src: 1, dst: 1 };
        assert_eq!(candidate_orders(&[l(2), l(3), l(4)]).len(), 6);
        assert_eq!(candidate_orders(&[l(2), l(3), l(4), l(5)]).len(), 24);
        assert_eq!(candidate_orders(&[l(2), l(3), l(4), l(5), l(6)]).len(), 5);
    }

    #[test]
    fn test_measure_effort_matches_estimate() {
        let extents = [3usize, 4, 5, 6];
        let n: usize = extents.iter().product();
        let a: Vec<f64> = (0..n).map(|x| x as f64).collect();
        let perm = [3, 1, 0, 2];

        let mut b_est = vec![0.5; n];
        let mut b_meas = vec![0.5; n];
        planner()
            .create_plan(&perm, 2.0, &a, &extents, None, 3.0, None)
            .unwrap()
            .execute(&mut b_est)
            .unwrap();
        Planner::new(1, PlanEffort::Measure)
            .unwrap()
            .create_plan(&perm, 2.0, &a, &extents, None, 3.0, None)
            .unwrap()
            .execute(&mut b_meas)
            .unwrap();
        assert_eq!(b_est, b_meas);
    }

    #[test]
    fn test_threaded_plan_matches_single() {
        let extents = [64usize, 32, 24];
        let n: usize = extents.iter().product();
        let a: Vec<f64> = (0..n).map(|x| (x % 101) as f64).collect();
        let perm = [2, 0, 1];

        let mut single = vec![1.0; n];
        let mut threaded = vec![1.0; n];
        planner()
            .create_plan(&perm, 1.0, &a, &extents, None, 1.0, None)
            .unwrap()
            .execute(&mut single)
            .unwrap();
        let plan = Planner::new(4, PlanEffort::Estimate)
            .unwrap()
            .create_plan(&perm, 1.0, &a, &extents, None, 1.0, None)
            .unwrap();
        assert_eq!(plan.threads(), 4);
        plan.execute(&mut threaded).unwrap();
        assert_eq!(single, threaded);
    }
}
