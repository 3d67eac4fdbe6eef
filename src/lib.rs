//! Benchmark and correctness harness for out-of-place tensor transposition.
//!
//! Computes `B = alpha * transpose(A) + beta * B` for dense or padded
//! column-major tensors of any rank. A planned, blocked and optionally
//! multi-threaded [`Plan`] is timed against a naive [`ReferenceTranspose`]
//! and the two outputs are checked element by element.
//!
//! ## Usage
//!
//! ```
//! use transpose_bench::transpose;
//!
//! // 2x3 column-major matrix into its 3x2 transpose
//! let a = vec![1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0];
//! let mut b = vec![0.0f64; 6];
//!
//! transpose(&[1, 0], 1.0, &a, &[2, 3], 0.0, &mut b).unwrap();
//! assert_eq!(b, [1.0, 3.0, 5.0, 2.0, 4.0, 6.0]);
//! ```
//!
//! For repeated runs, build a plan once and execute it many times:
//!
//! ```
//! use transpose_bench::{PlanEffort, Planner, Transposer};
//!
//! let extents = [16, 8, 4];
//! let a: Vec<f32> = (0..16 * 8 * 4).map(|i| i as f32).collect();
//! let mut b = vec![0.0f32; a.len()];
//!
//! let planner = Planner::new(2, PlanEffort::Measure).unwrap();
//! let plan = planner
//!     .create_plan(&[2, 0, 1], 1.0, &a, &extents, None, 0.0, None)
//!     .unwrap();
//! plan.execute(&mut b).unwrap();
//! assert_eq!(b[1], a[16 * 8]);
//! ```
//!
//! ## What's inside
//!
//! - Dimension fusion and stride-1 leaf selection
//! - Blocked transpose leaves monomorphized per element size
//! - Heuristic or measured loop ordering
//! - Cache-flushing timing loop and a tolerance-based oracle

pub mod buffer;
pub mod cache;
pub mod config;
pub mod element;
pub mod error;
pub mod harness;
pub mod oracle;
pub mod plan;
pub mod problem;
pub mod reference;
pub mod report;
pub mod runner;

pub use buffer::{AlignedBuf, BufferSet, Trial};
pub use cache::CacheEvictor;
pub use config::{ElementKind, HarnessConfig, PlanEffort};
pub use element::Element;
pub use error::{BenchError, Result};
pub use harness::HarnessOutcome;
pub use oracle::{EquivalenceOracle, OracleReport};
pub use plan::{Plan, Planner, Transposer};
pub use problem::ProblemSpec;
pub use reference::ReferenceTranspose;
pub use report::VariantReport;
pub use runner::{BenchRunner, Timing};

/// One-shot transpose: `B = alpha * A^perm + beta * B` on a single thread.
///
/// `size_a` are the extents of the dense column-major input; `b` must hold
/// the same number of elements.
pub fn transpose<T: Element>(
    perm: &[usize],
    alpha: T,
    a: &[T],
    size_a: &[usize],
    beta: T,
    b: &mut [T],
) -> Result<()> {
    let planner = Planner::new(1, PlanEffort::Estimate)?;
    let plan = planner.create_plan(perm, alpha, a, size_a, None, beta, None)?;
    plan.execute(b)
}
