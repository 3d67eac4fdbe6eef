//! Harness configuration.
//!
//! Everything that comes from the process environment or the command line
//! is captured here once, in `main`, and handed to the library by reference.

use std::fmt;
use std::str::FromStr;

use crate::error::BenchError;

/// Variable holding the worker thread count.
pub const THREADS_ENV: &str = "OMP_NUM_THREADS";

/// Trials per variant unless told otherwise.
pub const DEFAULT_REPEATS: usize = 5;

/// Size of each cache-trashing buffer, large enough to exceed any L3.
pub const DEFAULT_TRASH_BYTES: usize = 1024 * 1024 * 100;

/// How hard the planner searches for a good loop order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlanEffort {
    /// Pick the loop order from a stride heuristic.
    #[default]
    Estimate,
    /// Time every candidate loop order and keep the fastest.
    Measure,
}

impl fmt::Display for PlanEffort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanEffort::Estimate => write!(f, "estimate"),
            PlanEffort::Measure => write!(f, "measure"),
        }
    }
}

impl FromStr for PlanEffort {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "estimate" => Ok(PlanEffort::Estimate),
            "measure" | "exhaustive" => Ok(PlanEffort::Measure),
            other => Err(BenchError::argument(format!("unknown plan effort '{other}'"))),
        }
    }
}

/// Element type selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ElementKind {
    F32,
    #[default]
    F64,
    C32,
    C64,
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementKind::F32 => "f32",
            ElementKind::F64 => "f64",
            ElementKind::C32 => "c32",
            ElementKind::C64 => "c64",
        };
        f.write_str(name)
    }
}

impl FromStr for ElementKind {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "f32" | "float" => Ok(ElementKind::F32),
            "f64" | "double" => Ok(ElementKind::F64),
            "c32" | "complex32" => Ok(ElementKind::C32),
            "c64" | "complex64" => Ok(ElementKind::C64),
            other => Err(BenchError::argument(format!("unknown element type '{other}'"))),
        }
    }
}

/// Settings for one harness run.
#[derive(Debug, Clone, PartialEq)]
pub struct HarnessConfig {
    /// Worker threads used by the plan.
    pub threads: usize,
    /// Timed trials per variant.
    pub repeats: usize,
    pub effort: PlanEffort,
    /// Length of each cache-trashing buffer in doubles.
    pub trash_len: usize,
    /// Real part of alpha; the imaginary part is zero.
    pub alpha: f64,
    /// Real part of beta; the imaginary part is zero.
    pub beta: f64,
    pub dtype: ElementKind,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        HarnessConfig {
            threads: 1,
            repeats: DEFAULT_REPEATS,
            effort: PlanEffort::Estimate,
            trash_len: DEFAULT_TRASH_BYTES / std::mem::size_of::<f64>(),
            alpha: 2.0,
            beta: 4.0,
            dtype: ElementKind::F64,
        }
    }
}

impl HarnessConfig {
    /// Interpret the raw value of [`THREADS_ENV`].
    ///
    /// Missing, unparsable or zero values mean a single thread.
    pub fn threads_from_env(raw: Option<&str>) -> usize {
        raw.and_then(|s| s.trim().parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(1)
    }

    /// Read [`THREADS_ENV`] from the process environment.
    pub fn threads_from_process_env() -> usize {
        let raw = std::env::var(THREADS_ENV).ok();
        Self::threads_from_env(raw.as_deref())
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.repeats == 0 {
            return Err(BenchError::argument("repeat count must be at least 1"));
        }
        if self.threads == 0 {
            return Err(BenchError::argument("thread count must be at least 1"));
        }
        Ok(())
    }
}
