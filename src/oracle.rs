//! Numerical equivalence between two output buffers.
//!
//! Values are compared by magnitude. A pair differs when either side is
//! NaN or infinite, or when their relative error exceeds [`REL_TOLERANCE`]
//! while both magnitudes sit clearly above the type's zero threshold.

use rayon::prelude::*;
use tracing::warn;

use crate::element::Element;
use crate::error::{BenchError, Result};

/// Largest accepted relative error between magnitudes.
pub const REL_TOLERANCE: f64 = 4e-5;

/// Below `ZERO_FLOOR_FACTOR * T::ZERO_THRESHOLD` relative error is ignored.
pub const ZERO_FLOOR_FACTOR: f64 = 5.0;

/// Outcome of comparing two buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OracleReport {
    pub checked: usize,
    pub mismatches: usize,
    pub first_mismatch: Option<usize>,
}

impl OracleReport {
    pub fn passed(&self) -> bool {
        self.mismatches == 0
    }
}

/// Whether `x` and `y` count as a mismatch.
pub fn differs<T: Element>(x: T, y: T) -> bool {
    if x.is_non_finite() || y.is_non_finite() {
        return true;
    }
    let (mx, my) = (x.magnitude(), y.magnitude());
    let diff = (mx - my).abs();
    if diff == 0.0 {
        return false;
    }
    let rel = diff / mx.max(my);
    rel > REL_TOLERANCE && mx.min(my) > T::ZERO_THRESHOLD * ZERO_FLOOR_FACTOR
}

/// Element-wise comparison of two output buffers.
#[derive(Debug, Clone, Copy, Default)]
pub struct EquivalenceOracle;

impl EquivalenceOracle {
    /// Count every differing index; never stops early.
    pub fn compare<T: Element>(&self, expected: &[T], actual: &[T]) -> Result<OracleReport> {
        if expected.len() != actual.len() {
            return Err(BenchError::argument(format!(
                "cannot compare buffers of length {} and {}",
                expected.len(),
                actual.len()
            )));
        }

        let mismatches = expected
            .par_iter()
            .zip(actual.par_iter())
            .filter(|&(&x, &y)| differs(x, y))
            .count();
        let first_mismatch = if mismatches > 0 {
            expected
                .iter()
                .zip(actual)
                .position(|(&x, &y)| differs(x, y))
        } else {
            None
        };

        let report = OracleReport {
            checked: expected.len(),
            mismatches,
            first_mismatch,
        };
        if !report.passed() {
            warn!(
                mismatches,
                checked = report.checked,
                first = ?first_mismatch,
                "outputs diverge"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::{Complex32, Complex64};

    fn check<T: Element>(x: &[T], y: &[T]) -> OracleReport {
        EquivalenceOracle.compare(x, y).unwrap()
    }

    #[test]
    fn test_identical_buffers_pass() {
        let x: Vec<f64> = (0..100).map(|i| i as f64 - 50.0).collect();
        let r = check(&x, &x);
        assert!(r.passed());
        assert_eq!(r.checked, 100);
        assert_eq!(r.first_mismatch, None);
    }

    #[test]
    fn test_rounding_noise_passes() {
        assert!(!differs(1.0f64, 1.0 + 1e-6));
        assert!(!differs(1.0f32, 1.0 + 3e-5));
        assert!(differs(1.0f64, 1.0 + 1e-3));
    }

    #[test]
    fn test_nan_and_inf_always_flagged() {
        assert!(differs(f64::NAN, 1.0));
        assert!(differs(1.0, f64::INFINITY));
        assert!(differs(f64::NAN, f64::NAN));
        assert!(differs(f32::NEG_INFINITY, f32::NEG_INFINITY));
        assert!(differs(Complex64::new(f64::NAN, 0.0), Complex64::new(0.0, 0.0)));
    }

    #[test]
    fn test_tiny_values_pass() {
        assert!(!differs(1e-18f64, 3e-18));
        assert!(!differs(1e-7f32, 4e-7));
        assert!(!differs(0.0f64, 4e-16));
        // above the floor the same ratio fails
        assert!(differs(1e-3f64, 3e-3));
    }

    #[test]
    fn test_counts_all_mismatches() {
        let x = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let y = vec![1.0, 2.5, 3.0, f64::NAN, 5.0];
        let r = check(&x, &y);
        assert!(!r.passed());
        assert_eq!(r.mismatches, 2);
        assert_eq!(r.first_mismatch, Some(1));
    }

    #[test]
    fn test_symmetric() {
        let x = vec![1.0f32, 0.0, -7.0, 1e-9, f32::NAN];
        let y = vec![1.0f32, 1.0, 7.0, 5e-9, 2.0];
        assert_eq!(check(&x, &y).mismatches, check(&y, &x).mismatches);
    }

    #[test]
    fn test_complex_compares_modulus() {
        // same modulus, different phase: compared by magnitude only
        let x = [Complex32::new(3.0, 4.0)];
        let y = [Complex32::new(-4.0, 3.0)];
        assert!(check(&x, &y).passed());
    }

    #[test]
    fn test_length_mismatch_is_error() {
        assert!(EquivalenceOracle.compare(&[1.0f64], &[1.0, 2.0]).is_err());
    }
}
