//! End-to-end run for one problem: plan, reference, compare, report.

use num_complex::{Complex32, Complex64};
use tracing::info;

use crate::buffer::{AlignedBuf, BufferSet, Trial};
use crate::cache::CacheEvictor;
use crate::config::{ElementKind, HarnessConfig};
use crate::element::Element;
use crate::error::{BenchError, Result};
use crate::oracle::{EquivalenceOracle, OracleReport};
use crate::plan::{Planner, Transposer};
use crate::problem::ProblemSpec;
use crate::reference::ReferenceTranspose;
use crate::report::VariantReport;
use crate::runner::BenchRunner;

/// Everything the binary prints.
#[derive(Debug, Clone)]
pub struct HarnessOutcome {
    /// Plan first, then the reference.
    pub variants: Vec<VariantReport>,
    /// Plan output checked against the reference output.
    pub verdict: OracleReport,
    pub plan_label: String,
}

/// Run the harness for the element type named in `config`.
pub fn run_configured(spec: &ProblemSpec, config: &HarnessConfig) -> Result<HarnessOutcome> {
    match config.dtype {
        ElementKind::F32 => run::<f32>(spec, config),
        ElementKind::F64 => run::<f64>(spec, config),
        ElementKind::C32 => run::<Complex32>(spec, config),
        ElementKind::C64 => run::<Complex64>(spec, config),
    }
}

/// Benchmark the plan and the reference on `spec`, then compare them.
pub fn run<T: Element>(spec: &ProblemSpec, config: &HarnessConfig) -> Result<HarnessOutcome> {
    config.validate()?;
    let runner = BenchRunner::new(config.repeats)?;
    let alpha = T::from_real(config.alpha);
    let beta = T::from_real(config.beta);

    let BufferSet { a, golden, working } = BufferSet::<T>::allocate(spec, 2)?;
    let mut evictor = CacheEvictor::with_len(config.trash_len)?;
    let planner = Planner::from_config(config)?;

    // Warm-up: the first plan and execution pay for pool start-up and page
    // faults, so they are thrown away.
    {
        let warm = planner.create_plan(spec.perm(), alpha, &a, spec.extents(), None, beta, None)?;
        let mut scratch = golden.try_clone()?;
        warm.execute(&mut scratch)?;
        info!(dtype = T::NAME, threads = planner.threads(), "warm-up done");
    }

    let plan = planner.create_plan(spec.perm(), alpha, &a, spec.extents(), None, beta, None)?;
    let reference = ReferenceTranspose::new(spec, alpha, &a, beta)?;
    compare_variants(spec, &runner, &mut evictor, &golden, working, &plan, &reference)
}

/// Time `candidate` and then `reference`, each on its own working copy of
/// `golden`, and check the candidate's output against the reference's.
///
/// `working` must hold at least two buffers of `golden.len()` elements.
pub fn compare_variants<T: Element>(
    spec: &ProblemSpec,
    runner: &BenchRunner,
    evictor: &mut CacheEvictor,
    golden: &[T],
    working: Vec<AlignedBuf<T>>,
    candidate: &dyn Transposer<T>,
    reference: &dyn Transposer<T>,
) -> Result<HarnessOutcome> {
    let mut working = working.into_iter();
    let (Some(candidate_out), Some(reference_out)) = (working.next(), working.next()) else {
        return Err(BenchError::argument("need one working buffer per variant"));
    };

    let mut candidate_trial = Trial::new(golden, candidate_out);
    let candidate_timing = runner.run_transposer(&mut candidate_trial, evictor, candidate)?;

    let mut reference_trial = Trial::new(golden, reference_out);
    let reference_timing = runner.run_transposer(&mut reference_trial, evictor, reference)?;

    let verdict = EquivalenceOracle.compare(reference_trial.working(), candidate_trial.working())?;

    let plan_label = candidate.label();
    let variants = vec![
        VariantReport::new::<T>(plan_label.clone(), spec, &candidate_timing),
        VariantReport::new::<T>(reference.label(), spec, &reference_timing),
    ];
    Ok(HarnessOutcome {
        variants,
        verdict,
        plan_label,
    })
}
