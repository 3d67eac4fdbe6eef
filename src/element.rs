//! Element types the harness can benchmark.
//!
//! Real and complex single/double precision are supported. Each type knows
//! its magnitude (modulus for complex) and the magnitude below which the
//! equivalence oracle stops trusting relative error.

use num_complex::{Complex32, Complex64};
use num_traits::{One, Zero};
use std::fmt::Debug;
use std::ops::{Add, Mul};

/// Scalar bounds shared by the plan, the reference and the oracle.
pub trait Element:
    Copy + Send + Sync + Debug + PartialEq + Add<Output = Self> + Mul<Output = Self> + Zero + One + 'static
{
    /// Short label used in reports (`f64`, `c32`, ...).
    const NAME: &'static str;

    /// Magnitude under which two values are considered numerically zero.
    const ZERO_THRESHOLD: f64;

    /// Build a value from real and imaginary parts. Real types drop `im`.
    fn from_parts(re: f64, im: f64) -> Self;

    /// Absolute value, or modulus for complex types.
    fn magnitude(self) -> f64;

    fn from_real(re: f64) -> Self {
        Self::from_parts(re, 0.0)
    }

    /// NaN in any component or infinite magnitude.
    fn is_non_finite(self) -> bool {
        !self.magnitude().is_finite()
    }
}

impl Element for f64 {
    const NAME: &'static str = "f64";
    const ZERO_THRESHOLD: f64 = 1e-16;

    fn from_parts(re: f64, _im: f64) -> Self {
        re
    }

    fn magnitude(self) -> f64 {
        self.abs()
    }
}

impl Element for f32 {
    const NAME: &'static str = "f32";
    const ZERO_THRESHOLD: f64 = 1e-6;

    fn from_parts(re: f64, _im: f64) -> Self {
        re as f32
    }

    fn magnitude(self) -> f64 {
        (self as f64).abs()
    }
}

impl Element for Complex64 {
    const NAME: &'static str = "c64";
    const ZERO_THRESHOLD: f64 = 1e-16;

    fn from_parts(re: f64, im: f64) -> Self {
        Complex64::new(re, im)
    }

    fn magnitude(self) -> f64 {
        self.norm()
    }
}

impl Element for Complex32 {
    const NAME: &'static str = "c32";
    const ZERO_THRESHOLD: f64 = 1e-6;

    fn from_parts(re: f64, im: f64) -> Self {
        Complex32::new(re as f32, im as f32)
    }

    fn magnitude(self) -> f64 {
        (self.norm()) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_thresholds_follow_precision() {
        assert_eq!(f64::ZERO_THRESHOLD, 1e-16);
        assert_eq!(Complex64::ZERO_THRESHOLD, 1e-16);
        assert_eq!(f32::ZERO_THRESHOLD, 1e-6);
        assert_eq!(Complex32::ZERO_THRESHOLD, 1e-6);
    }

    #[test]
    fn test_complex_magnitude_is_modulus() {
        let z = Complex64::from_parts(3.0, -4.0);
        assert!((z.magnitude() - 5.0).abs() < 1e-12);
        let w = Complex32::from_parts(-3.0, 4.0);
        assert!((w.magnitude() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_real_types_drop_imaginary_part() {
        assert_eq!(f64::from_parts(1.5, 9.0), 1.5);
        assert_eq!(f32::from_parts(-0.25, 9.0), -0.25);
    }

    #[test]
    fn test_non_finite_detection() {
        assert!(f64::NAN.is_non_finite());
        assert!(f64::INFINITY.is_non_finite());
        assert!(f32::NEG_INFINITY.is_non_finite());
        assert!(Complex64::new(1.0, f64::NAN).is_non_finite());
        assert!(Complex32::new(f32::INFINITY, 0.0).is_non_finite());
        assert!(!1.0f64.is_non_finite());
        assert!(!Complex64::new(0.5, -0.5).is_non_finite());
    }
}
