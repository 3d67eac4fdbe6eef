//! Problem description: permutation and extents of the tensor to transpose.

use crate::error::{BenchError, Result};

/// A validated transpose problem.
///
/// `perm[i]` names the input dimension that becomes output dimension `i`,
/// so the output extents are `extents[perm[i]]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemSpec {
    perm: Vec<usize>,
    extents: Vec<usize>,
    total_size: usize,
}

impl ProblemSpec {
    /// Build from an already split permutation and extent list.
    pub fn new(perm: Vec<usize>, extents: Vec<usize>) -> Result<Self> {
        let dim = perm.len();
        if dim == 0 {
            return Err(BenchError::argument("dimension must be at least 1"));
        }
        if extents.len() != dim {
            return Err(BenchError::argument(format!(
                "expected {dim} extents, got {}",
                extents.len()
            )));
        }
        validate_permutation(&perm)?;
        if let Some(pos) = extents.iter().position(|&e| e == 0) {
            return Err(BenchError::argument(format!("extent {pos} must be positive")));
        }
        let total_size = extents
            .iter()
            .try_fold(1usize, |acc, &e| acc.checked_mul(e))
            .ok_or_else(|| BenchError::argument("total tensor size overflows usize"))?;

        Ok(ProblemSpec {
            perm,
            extents,
            total_size,
        })
    }

    /// Parse `<dim> <perm...> <extents...>` as given on the command line.
    ///
    /// `values` holds everything after the dimension count and must contain
    /// exactly `2 * dim` integers.
    pub fn parse(dim: i64, values: &[i64]) -> Result<Self> {
        if dim < 1 {
            return Err(BenchError::argument(format!(
                "dimension must be at least 1, got {dim}"
            )));
        }
        let dim = usize::try_from(dim)
            .map_err(|_| BenchError::argument(format!("dimension {dim} is too large")))?;
        let expected = dim
            .checked_mul(2)
            .ok_or_else(|| BenchError::argument("dimension is too large"))?;
        if values.len() < expected {
            return Err(BenchError::argument(format!(
                "not enough indices: dim {dim} needs {expected} values (permutation then extents), got {}",
                values.len()
            )));
        }
        if values.len() > expected {
            return Err(BenchError::argument(format!(
                "too many indices: dim {dim} needs {expected} values, got {}",
                values.len()
            )));
        }

        let perm = values[..dim]
            .iter()
            .map(|&p| {
                usize::try_from(p)
                    .map_err(|_| BenchError::argument(format!("permutation entry {p} is negative")))
            })
            .collect::<Result<Vec<_>>>()?;
        let extents = values[dim..]
            .iter()
            .map(|&e| {
                usize::try_from(e)
                    .ok()
                    .filter(|&e| e > 0)
                    .ok_or_else(|| BenchError::argument(format!("extent {e} must be positive")))
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(perm, extents)
    }

    pub fn dim(&self) -> usize {
        self.perm.len()
    }

    pub fn perm(&self) -> &[usize] {
        &self.perm
    }

    /// Extents of the input tensor A.
    pub fn extents(&self) -> &[usize] {
        &self.extents
    }

    /// Number of elements in A (and in B).
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    /// Extents of the output tensor B.
    pub fn output_extents(&self) -> Vec<usize> {
        self.perm.iter().map(|&p| self.extents[p]).collect()
    }

    /// Permutation that undoes this one.
    pub fn inverse_permutation(&self) -> Vec<usize> {
        invert_permutation(&self.perm)
    }

    /// The problem that maps B back onto A.
    pub fn inverse(&self) -> ProblemSpec {
        ProblemSpec {
            perm: self.inverse_permutation(),
            extents: self.output_extents(),
            total_size: self.total_size,
        }
    }

    /// `1,0,` style label used in the report line.
    pub fn perm_label(&self) -> String {
        join_trailing(&self.perm)
    }

    pub fn extents_label(&self) -> String {
        join_trailing(&self.extents)
    }
}

/// Check that `perm` is a bijection on `0..perm.len()`.
pub fn validate_permutation(perm: &[usize]) -> Result<()> {
    let dim = perm.len();
    let mut seen = vec![false; dim];
    for &p in perm {
        if p >= dim {
            return Err(BenchError::argument(format!(
                "permutation entry {p} out of range for dimension {dim}"
            )));
        }
        if seen[p] {
            return Err(BenchError::argument(format!(
                "permutation entry {p} appears more than once"
            )));
        }
        seen[p] = true;
    }
    Ok(())
}

/// Inverse of a valid permutation.
pub fn invert_permutation(perm: &[usize]) -> Vec<usize> {
    let mut inv = vec![0; perm.len()];
    for (i, &p) in perm.iter().enumerate() {
        inv[p] = i;
    }
    inv
}

fn join_trailing(values: &[usize]) -> String {
    values.iter().map(|v| format!("{v},")).collect()
}
