//! Report lines printed by the binary.

use std::fmt;

use crate::element::Element;
use crate::oracle::OracleReport;
use crate::problem::ProblemSpec;
use crate::runner::{Timing, bytes_moved};

/// One benchmarked variant.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantReport {
    pub label: String,
    pub dim: usize,
    pub perm: String,
    pub extents: String,
    pub min_ms: f64,
    pub gib_per_s: f64,
}

impl VariantReport {
    pub fn new<T: Element>(label: impl Into<String>, spec: &ProblemSpec, timing: &Timing) -> Self {
        VariantReport {
            label: label.into(),
            dim: spec.dim(),
            perm: spec.perm_label(),
            extents: spec.extents_label(),
            min_ms: timing.min_ms(),
            gib_per_s: timing.throughput_gib_s(bytes_moved::<T>(spec.total_size())),
        }
    }
}

impl fmt::Display for VariantReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}: {:.2} ms. {:.2} GiB/s",
            self.label, self.dim, self.perm, self.extents, self.min_ms, self.gib_per_s
        )
    }
}

/// Diagnostic line for a failed comparison.
pub fn divergence_line(label: &str, report: &OracleReport) -> String {
    match report.first_mismatch {
        Some(i) => format!(
            "error in {label}: {} of {} elements differ (first at index {i})",
            report.mismatches, report.checked
        ),
        None => format!(
            "error in {label}: {} of {} elements differ",
            report.mismatches, report.checked
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_line_format() {
        let spec = ProblemSpec::new(vec![1, 0], vec![1024, 1024]).unwrap();
        let timing = Timing {
            min: Duration::from_millis(3),
            samples: vec![Duration::from_millis(3)],
        };
        let line = VariantReport::new::<f64>("reference", &spec, &timing).to_string();
        // 3 * 8 B * 2^20 = 24 MiB in 3 ms
        assert_eq!(line, "reference 2 1,0, 1024,1024,: 3.00 ms. 7.81 GiB/s");
    }

    #[test]
    fn test_divergence_line() {
        let report = OracleReport {
            checked: 10,
            mismatches: 2,
            first_mismatch: Some(4),
        };
        assert_eq!(
            divergence_line("plan (estimate)", &report),
            "error in plan (estimate): 2 of 10 elements differ (first at index 4)"
        );
    }
}
