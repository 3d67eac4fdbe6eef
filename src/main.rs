//! Benchmark runner for tensor transposition.
//!
//! ```text
//! transpose-bench <dim> <perm...> <extents...> [options]
//! transpose-bench 3 2 0 1 64 128 32 --dtype c64
//! ```

use std::io::Write;
use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use transpose_bench::harness;
use transpose_bench::report::divergence_line;
use transpose_bench::{BenchError, ElementKind, HarnessConfig, PlanEffort, ProblemSpec};

#[derive(Parser, Debug)]
#[command(
    name = "transpose-bench",
    version,
    about = "Time B = alpha * transpose(A) + beta * B against a naive reference",
    allow_negative_numbers = true
)]
struct Args {
    /// Tensor rank.
    dim: i64,

    /// The permutation followed by A's extents (2 * dim integers).
    #[arg(num_args = 0..)]
    values: Vec<i64>,

    /// Element type: f32, f64, c32 or c64.
    #[arg(long, default_value_t = ElementKind::F64)]
    dtype: ElementKind,

    #[arg(long, default_value_t = 2.0)]
    alpha: f64,

    #[arg(long, default_value_t = 4.0)]
    beta: f64,

    /// Timed trials per variant.
    #[arg(long, default_value_t = 5)]
    repeats: usize,

    /// Planning effort: estimate or measure.
    #[arg(long, default_value_t = PlanEffort::Estimate)]
    effort: PlanEffort,

    /// Size of each cache-trashing buffer in MiB.
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u64).range(1..))]
    trash_mib: u64,
}

impl Args {
    fn config(&self) -> HarnessConfig {
        let trash_bytes = usize::try_from(self.trash_mib)
            .unwrap_or(usize::MAX)
            .saturating_mul(1024 * 1024);
        HarnessConfig {
            threads: HarnessConfig::threads_from_process_env(),
            repeats: self.repeats,
            effort: self.effort,
            trash_len: trash_bytes / std::mem::size_of::<f64>(),
            alpha: self.alpha,
            beta: self.beta,
            dtype: self.dtype,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Args::parse();
    let code = execute(&args, &mut std::io::stdout().lock(), &mut std::io::stderr());
    ExitCode::from(code)
}

/// Run and report; returns the process exit status.
fn execute(args: &Args, out: &mut impl Write, err: &mut impl Write) -> u8 {
    match run(args, out, err) {
        Ok(()) => 0,
        Err(e) => {
            // Nothing more can be done if stderr itself fails.
            if e.is_argument() {
                let _ = writeln!(err, "{e}");
                let _ = writeln!(err, "{}", Args::command().render_usage());
            } else {
                let _ = writeln!(err, "fatal: {e}");
            }
            1
        }
    }
}

fn run(args: &Args, out: &mut impl Write, err: &mut impl Write) -> Result<(), BenchError> {
    let spec = ProblemSpec::parse(args.dim, &args.values)?;
    let config = args.config();
    config.validate()?;

    writeln!(out, "numThreads: {}", config.threads)?;
    let outcome = harness::run_configured(&spec, &config)?;

    for variant in &outcome.variants {
        writeln!(out, "{variant}")?;
    }
    if !outcome.verdict.passed() {
        writeln!(err, "{}", divergence_line(&outcome.plan_label, &outcome.verdict))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoke(argv: &[&str]) -> (u8, String, String) {
        let args = Args::try_parse_from(argv).unwrap();
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let code = execute(&args, &mut out, &mut err);
        (code, String::from_utf8(out).unwrap(), String::from_utf8(err).unwrap())
    }

    #[test]
    fn test_small_run_prints_both_variants() {
        let (code, out, err) = invoke(&[
            "transpose-bench", "2", "1", "0", "16", "8", "--repeats", "1", "--trash-mib", "1",
        ]);
        assert_eq!(code, 0, "stderr: {err}");
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("numThreads: "));
        assert!(lines[1].starts_with("plan (estimate) 2 1,0, 16,8,: "), "{}", lines[1]);
        assert!(lines[2].starts_with("reference 2 1,0, 16,8,: "), "{}", lines[2]);
        assert!(lines[1..].iter().all(|l| l.ends_with(" GiB/s")));
        assert!(err.is_empty());
    }

    #[test]
    fn test_complex_measured_run() {
        let (code, out, _) = invoke(&[
            "transpose-bench", "3", "2", "0", "1", "4", "5", "6", "--dtype", "c64", "--effort",
            "measure", "--repeats", "2", "--trash-mib", "1",
        ]);
        assert_eq!(code, 0);
        assert!(out.contains("plan (measure) 3 2,0,1, 4,5,6,: "));
    }

    #[test]
    fn test_argument_errors_exit_one_with_usage() {
        let cases: [&[&str]; 5] = [
            &["transpose-bench", "2", "1", "0", "4"],
            &["transpose-bench", "0"],
            &["transpose-bench", "-2", "1", "0"],
            &["transpose-bench", "2", "1", "0", "4", "0"],
            &["transpose-bench", "2", "0", "0", "4", "4"],
        ];
        for argv in cases {
            let (code, out, err) = invoke(argv);
            assert_eq!(code, 1, "{argv:?}");
            assert!(out.is_empty(), "{argv:?}: {out}");
            assert!(err.contains("invalid arguments"), "{argv:?}: {err}");
            assert!(err.contains("Usage:"), "{argv:?}: {err}");
        }
    }

    #[test]
    fn test_too_few_values_message() {
        let (_, _, err) = invoke(&["transpose-bench", "2", "1", "0", "4"]);
        assert!(err.contains("not enough indices"), "{err}");
    }

    #[test]
    fn test_bad_option_is_a_clap_error() {
        let err = Args::try_parse_from(["transpose-bench", "1", "0", "4", "--dtype", "f16"]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        let err = Args::try_parse_from(["transpose-bench", "1", "0", "4", "--trash-mib", "0"]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
