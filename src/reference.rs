//! Naive transpose used as ground truth.
//!
//! Walks A in storage order with an odometer and scatters each element to
//! its place in B. No blocking, no threads, no tricks: slow but obviously
//! correct.

use crate::element::Element;
use crate::error::{BenchError, Result};
use crate::plan::Transposer;
use crate::plan::layout::col_major_strides;
use crate::problem::{ProblemSpec, invert_permutation};

/// Reference implementation of `B = alpha * A^perm + beta * B` over dense
/// column-major tensors.
#[derive(Debug, Clone)]
pub struct ReferenceTranspose<'a, T: Element> {
    a: &'a [T],
    extents: Vec<usize>,
    /// For each dimension of A, B's stride along it.
    b_strides: Vec<usize>,
    alpha: T,
    beta: T,
}

impl<'a, T: Element> ReferenceTranspose<'a, T> {
    pub fn new(spec: &ProblemSpec, alpha: T, a: &'a [T], beta: T) -> Result<Self> {
        if a.len() != spec.total_size() {
            return Err(BenchError::argument(format!(
                "A holds {} elements, problem has {}",
                a.len(),
                spec.total_size()
            )));
        }
        let strides_b = col_major_strides(&spec.output_extents())?;
        let inv = invert_permutation(spec.perm());
        let b_strides = inv.iter().map(|&k| strides_b[k] as usize).collect();

        Ok(ReferenceTranspose {
            a,
            extents: spec.extents().to_vec(),
            b_strides,
            alpha,
            beta,
        })
    }
}

impl<T: Element> Transposer<T> for ReferenceTranspose<'_, T> {
    fn label(&self) -> String {
        "reference".to_string()
    }

    fn execute(&self, b: &mut [T]) -> Result<()> {
        if b.len() != self.a.len() {
            return Err(BenchError::argument(format!(
                "B holds {} elements, A holds {}",
                b.len(),
                self.a.len()
            )));
        }

        let accumulate = !self.beta.is_zero();
        let dim = self.extents.len();
        let mut idx = vec![0usize; dim];
        let mut off_b = 0usize;

        for &x in self.a {
            b[off_b] = if accumulate {
                self.alpha * x + self.beta * b[off_b]
            } else {
                self.alpha * x
            };

            for k in 0..dim {
                idx[k] += 1;
                off_b += self.b_strides[k];
                if idx[k] < self.extents[k] {
                    break;
                }
                off_b -= self.b_strides[k] * self.extents[k];
                idx[k] = 0;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64;

    #[test]
    fn test_matrix_transpose() {
        // A is 2x3 column-major
        let spec = ProblemSpec::new(vec![1, 0], vec![2, 3]).unwrap();
        let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let mut b = [0.0; 6];
        ReferenceTranspose::new(&spec, 1.0, &a, 0.0)
            .unwrap()
            .execute(&mut b)
            .unwrap();
        assert_eq!(b, [1.0, 3.0, 5.0, 2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_alpha_beta() {
        let spec = ProblemSpec::new(vec![0], vec![3]).unwrap();
        let a = [1.0, 2.0, 3.0];
        let mut b = [10.0, 20.0, 30.0];
        ReferenceTranspose::new(&spec, 2.0, &a, 0.5)
            .unwrap()
            .execute(&mut b)
            .unwrap();
        assert_eq!(b, [7.0, 14.0, 21.0]);
    }

    #[test]
    fn test_three_dim_rotation() {
        let spec = ProblemSpec::new(vec![2, 0, 1], vec![2, 3, 4]).unwrap();
        let a: Vec<f64> = (0..24).map(|x| x as f64).collect();
        let mut b = vec![0.0; 24];
        ReferenceTranspose::new(&spec, 1.0, &a, 0.0)
            .unwrap()
            .execute(&mut b)
            .unwrap();
        // B has extents [4, 2, 3]; B(k, i, j) = A(i, j, k)
        for i in 0..2 {
            for j in 0..3 {
                for k in 0..4 {
                    assert_eq!(b[k + 4 * i + 8 * j], a[i + 2 * j + 6 * k]);
                }
            }
        }
    }

    #[test]
    fn test_complex_scaling() {
        let spec = ProblemSpec::new(vec![0], vec![1]).unwrap();
        let a = [Complex64::new(1.0, 1.0)];
        let mut b = [Complex64::new(0.0, 2.0)];
        let alpha = Complex64::new(0.0, 1.0);
        let beta = Complex64::new(2.0, 0.0);
        ReferenceTranspose::new(&spec, alpha, &a, beta)
            .unwrap()
            .execute(&mut b)
            .unwrap();
        assert_eq!(b[0], Complex64::new(-1.0, 5.0));
    }

    #[test]
    fn test_length_checks() {
        let spec = ProblemSpec::new(vec![1, 0], vec![2, 2]).unwrap();
        let a = [0.0f64; 3];
        assert!(ReferenceTranspose::new(&spec, 1.0, &a, 0.0).is_err());
        let a = [0.0f64; 4];
        let r = ReferenceTranspose::new(&spec, 1.0, &a, 0.0).unwrap();
        let mut b = [0.0; 5];
        assert!(r.execute(&mut b).is_err());
    }
}
