//! # Eigen Embedding
//!
//! Eigensolver back-ends behind one trait. A solver is asked for `target`
//! eigenpairs from either end of the spectrum of a symmetric matrix (standard
//! problem) or of a symmetric matrix pair `A x = λ B x` with `B` positive
//! definite (generalized problem). Solvers declare whether they accept the
//! generalized form; pairing a generalized method with a solver that does not
//! is rejected by the dispatcher before the solver is ever called.

use anyhow::{anyhow, ensure};
use log::debug;
use nalgebra::{Cholesky, DMatrix, DVector, Dyn};
use ndarray::{Array1, Array2, ArrayView2};

mod dense;
mod lanczos;
mod randomized;

pub use dense::DenseSolver;
pub use lanczos::LanczosSolver;
pub use randomized::RandomizedSolver;

pub enum EigenProblem<'a> {
    Standard(ArrayView2<'a, f64>),
    Generalized {
        lhs: ArrayView2<'a, f64>,
        rhs: ArrayView2<'a, f64>,
    },
}

impl<'a> EigenProblem<'a> {
    pub fn is_generalized(&self) -> bool {
        matches!(self, EigenProblem::Generalized { .. })
    }

    pub fn lhs(&self) -> ArrayView2<'a, f64> {
        match self {
            EigenProblem::Standard(matrix) => *matrix,
            EigenProblem::Generalized { lhs, .. } => *lhs,
        }
    }

    pub fn dimension(&self) -> usize {
        self.lhs().nrows()
    }
}

/// Which end of the spectrum to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spectrum {
    /// Largest eigenvalues, in descending order.
    Largest,
    /// Smallest eigenvalues in ascending order, after discarding the `skip`
    /// smallest (trivial null-space directions).
    Smallest { skip: usize },
}

impl Spectrum {
    /// Number of eigenpairs that have to be computed to return `target`.
    pub fn required(&self, target: usize) -> usize {
        match self {
            Spectrum::Largest => target,
            Spectrum::Smallest { skip } => target + skip,
        }
    }
}

/// Eigenvectors as columns, with their eigenvalues in the same order.
#[derive(Debug, Clone)]
pub struct EigenDecomposition {
    pub vectors: Array2<f64>,
    pub values: Array1<f64>,
}

pub trait EigenSolver: Send + Sync {
    fn supports_generalized(&self) -> bool;

    fn solve(
        &self,
        problem: &EigenProblem<'_>,
        target: usize,
        spectrum: Spectrum,
    ) -> anyhow::Result<EigenDecomposition>;
}

pub(crate) fn check_problem(
    problem: &EigenProblem<'_>,
    target: usize,
    spectrum: Spectrum,
) -> anyhow::Result<usize> {
    let lhs = problem.lhs();
    let n = lhs.nrows();
    ensure!(
        lhs.ncols() == n,
        "Eigenproblem matrix must be square, got {} x {}",
        lhs.nrows(),
        lhs.ncols()
    );
    if let EigenProblem::Generalized { rhs, .. } = problem {
        ensure!(
            rhs.dim() == lhs.dim(),
            "Right-hand matrix is {} x {}, expected {} x {}",
            rhs.nrows(),
            rhs.ncols(),
            n,
            n
        );
    }
    ensure!(target > 0, "At least one eigenpair must be requested");
    ensure!(
        spectrum.required(target) <= n,
        "Requested {} eigenpairs of a {} x {} matrix",
        spectrum.required(target),
        n,
        n
    );
    Ok(n)
}

/// Indices of the eigenvalues to return, in output order.
pub(crate) fn select(
    values: &[f64],
    target: usize,
    spectrum: Spectrum,
) -> anyhow::Result<Vec<usize>> {
    ensure!(
        spectrum.required(target) <= values.len(),
        "Only {} eigenvalues available, {} requested",
        values.len(),
        spectrum.required(target)
    );
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    Ok(match spectrum {
        Spectrum::Largest => order.into_iter().rev().take(target).collect(),
        Spectrum::Smallest { skip } => order.into_iter().skip(skip).take(target).collect(),
    })
}

/// Norms of `A v - λ v` for every pair, with the images `A v` given as columns.
pub(crate) fn residual_norms(
    images: &DMatrix<f64>,
    vectors: &DMatrix<f64>,
    values: &[f64],
) -> Vec<f64> {
    let scaled = vectors * DMatrix::from_diagonal(&DVector::from_column_slice(values));
    (images - scaled).column_iter().map(|column| column.norm()).collect()
}

/// Convergence test for Ritz pairs of an iterative solver. Each residual is
/// measured against its own Ritz value, floored at a fraction of the largest
/// one so that pairs near zero can still converge.
pub(crate) fn ritz_converged(
    residuals: &[f64],
    values: &[f64],
    scale: f64,
    tolerance: f64,
) -> bool {
    residuals
        .iter()
        .zip(values)
        .all(|(&residual, &value)| residual <= tolerance * value.abs().max(1e-3 * scale))
}

pub(crate) fn rayleigh_quotients(matrix: &DMatrix<f64>, vectors: &DMatrix<f64>) -> Vec<f64> {
    let images = matrix * vectors;
    vectors
        .column_iter()
        .zip(images.column_iter())
        .map(|(vector, image)| vector.dot(&image) / vector.norm_squared())
        .collect()
}

/// Residual bound, relative to the Frobenius norm of the matrix, an
/// iterative solver has to meet before its eigenpairs are returned.
pub(crate) const ACCEPTED_RESIDUAL: f64 = 1e-6;

/// Checks every computed pair against `matrix` and keeps the ones `spectrum`
/// asks for. Fails instead of returning pairs that are not eigenpairs.
pub(crate) fn accept(
    matrix: &DMatrix<f64>,
    values: &[f64],
    vectors: &DMatrix<f64>,
    target: usize,
    spectrum: Spectrum,
) -> anyhow::Result<(Vec<f64>, DMatrix<f64>)> {
    let bound = ACCEPTED_RESIDUAL * matrix.norm().max(f64::MIN_POSITIVE);
    let images = matrix * vectors;
    for (k, residual) in residual_norms(&images, vectors, values).into_iter().enumerate() {
        ensure!(
            residual <= bound,
            "Eigenpair {} has residual {:.3e}, above the accepted {:.3e}",
            k,
            residual,
            bound
        );
    }

    let order = select(values, target, spectrum)?;
    Ok((
        order.iter().map(|&o| values[o]).collect(),
        vectors.select_columns(order.iter()),
    ))
}

/// All eigenvalues of a symmetric matrix lie in the returned interval.
fn gershgorin_interval(matrix: &DMatrix<f64>) -> (f64, f64) {
    matrix
        .row_iter()
        .enumerate()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(low, high), (i, row)| {
            let center = row[i];
            let radius = row.iter().map(|v| v.abs()).sum::<f64>() - center.abs();
            (low.min(center - radius), high.max(center + radius))
        })
}

/// Factorization of `A - σI` with `σ` just below the smallest eigenvalue of
/// `A`. Applying its inverse turns the smallest eigenvalues `λ` of `A` into
/// the largest eigenvalues `1 / (λ - σ)`, well separated from the rest.
///
/// `σ` is located by bisection: `A - σI` has a Cholesky factorization exactly
/// when `σ` is below the spectrum.
pub(crate) struct ShiftInvert {
    factor: Cholesky<f64, Dyn>,
}

impl ShiftInvert {
    pub fn below_spectrum(matrix: &DMatrix<f64>) -> anyhow::Result<Self> {
        let n = matrix.nrows();
        let (low, high) = gershgorin_interval(matrix);
        let resolution = 1e-6
            * (high - low)
                .max(matrix.norm() * f64::EPSILON)
                .max(f64::MIN_POSITIVE);

        // the spectrum starts above `below` and at or before `above`
        let mut below = low - resolution;
        let mut above = matrix.diagonal().min();
        for _ in 0..128 {
            if above - below <= resolution {
                break;
            }
            let middle = 0.5 * (below + above);
            if Self::factorize(matrix, n, middle).is_some() {
                below = middle;
            } else {
                above = middle;
            }
        }

        let shift = below - (above - below).max(resolution);
        let factor = Self::factorize(matrix, n, shift)
            .ok_or_else(|| anyhow!("Matrix minus {:.3e} I is not positive definite", shift))?;
        debug!("Shift-invert at {:.6e} (smallest eigenvalue at most {:.6e})", shift, above);
        Ok(Self { factor })
    }

    fn factorize(matrix: &DMatrix<f64>, n: usize, shift: f64) -> Option<Cholesky<f64, Dyn>> {
        Cholesky::new(matrix - DMatrix::<f64>::identity(n, n) * shift)
    }

    pub fn apply(&self, vector: &DVector<f64>) -> DVector<f64> {
        self.factor.solve(vector)
    }

    pub fn apply_block(&self, block: &DMatrix<f64>) -> DMatrix<f64> {
        self.factor.solve(block)
    }
}

pub(crate) fn to_dmatrix(matrix: ArrayView2<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(matrix.nrows(), matrix.ncols(), |i, j| matrix[[i, j]])
}

pub(crate) fn from_dmatrix(matrix: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((matrix.nrows(), matrix.ncols()), |(i, j)| matrix[(i, j)])
}

pub(crate) fn symmetrize(matrix: DMatrix<f64>) -> DMatrix<f64> {
    let transposed = matrix.transpose();
    (matrix + transposed) * 0.5
}

/// Turns `A x = λ B x` into the standard problem `L⁻¹ A L⁻ᵀ z = λ z` with
/// `B = L Lᵀ`, and maps solutions back through `x = L⁻ᵀ z`.
pub(crate) struct CholeskyReduction {
    l: DMatrix<f64>,
}

impl CholeskyReduction {
    pub fn new(rhs: ArrayView2<f64>) -> anyhow::Result<Self> {
        let cholesky = Cholesky::new(symmetrize(to_dmatrix(rhs))).ok_or_else(|| {
            anyhow!("Right-hand matrix of the generalized eigenproblem is not positive definite")
        })?;
        Ok(Self { l: cholesky.l() })
    }

    pub fn reduce(&self, lhs: ArrayView2<f64>) -> anyhow::Result<DMatrix<f64>> {
        let half = self
            .l
            .solve_lower_triangular(&to_dmatrix(lhs))
            .ok_or_else(|| anyhow!("Cholesky factor is singular"))?;
        let reduced = self
            .l
            .solve_lower_triangular(&half.transpose())
            .ok_or_else(|| anyhow!("Cholesky factor is singular"))?;
        Ok(symmetrize(reduced))
    }

    pub fn recover(&self, vectors: &DMatrix<f64>) -> anyhow::Result<DMatrix<f64>> {
        self.l
            .transpose()
            .solve_upper_triangular(vectors)
            .ok_or_else(|| anyhow!("Cholesky factor is singular"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_select_ends_of_spectrum() {
        let values = [3.0, -1.0, 0.0, 7.0, 2.0];
        assert_eq!(select(&values, 2, Spectrum::Largest).unwrap(), vec![3, 0]);
        assert_eq!(
            select(&values, 2, Spectrum::Smallest { skip: 0 }).unwrap(),
            vec![1, 2]
        );
        assert_eq!(
            select(&values, 2, Spectrum::Smallest { skip: 1 }).unwrap(),
            vec![2, 4]
        );
        assert!(select(&values, 5, Spectrum::Smallest { skip: 1 }).is_err());
    }

    #[test]
    fn test_check_problem_shapes() {
        let square = Array2::<f64>::eye(3);
        let wide = Array2::<f64>::zeros((2, 3));

        assert_eq!(
            check_problem(&EigenProblem::Standard(square.view()), 2, Spectrum::Largest).unwrap(),
            3
        );
        assert!(check_problem(&EigenProblem::Standard(wide.view()), 1, Spectrum::Largest).is_err());
        assert!(check_problem(
            &EigenProblem::Standard(square.view()),
            3,
            Spectrum::Smallest { skip: 1 }
        )
        .is_err());
        assert!(check_problem(
            &EigenProblem::Generalized {
                lhs: square.view(),
                rhs: wide.view()
            },
            1,
            Spectrum::Largest
        )
        .is_err());
    }

    #[test]
    fn test_cholesky_reduction_recovers_generalized_pairs() {
        let a = array![[2.0, 1.0], [1.0, 3.0]];
        let b = array![[4.0, 0.0], [0.0, 1.0]];

        let reduction = CholeskyReduction::new(b.view()).unwrap();
        let reduced = reduction.reduce(a.view()).unwrap();
        let eigen = nalgebra::SymmetricEigen::new(reduced);
        let vectors = reduction.recover(&eigen.eigenvectors).unwrap();

        let a = to_dmatrix(a.view());
        let b = to_dmatrix(b.view());
        for k in 0..2 {
            let x = vectors.column(k);
            let lhs = &a * x;
            let rhs = (&b * x) * eigen.eigenvalues[k];
            for i in 0..2 {
                assert_abs_diff_eq!(lhs[i], rhs[i], epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_cholesky_reduction_rejects_indefinite_rhs() {
        let b = array![[1.0, 2.0], [2.0, 1.0]];
        assert!(CholeskyReduction::new(b.view()).is_err());
    }
}
