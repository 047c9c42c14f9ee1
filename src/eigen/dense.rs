use anyhow::bail;
use nalgebra::SymmetricEigen;
use ndarray::{Array1, Array2};

use super::{
    check_problem, select, symmetrize, to_dmatrix, EigenDecomposition, EigenProblem, EigenSolver,
    Spectrum,
};

/// Full self-adjoint eigendecomposition. Computes every eigenpair, so it is
/// meant for small problems and for checking the other solvers.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenseSolver;

impl EigenSolver for DenseSolver {
    fn supports_generalized(&self) -> bool {
        false
    }

    fn solve(
        &self,
        problem: &EigenProblem<'_>,
        target: usize,
        spectrum: Spectrum,
    ) -> anyhow::Result<EigenDecomposition> {
        let EigenProblem::Standard(matrix) = problem else {
            bail!("Dense solver only handles standard eigenproblems");
        };
        let n = check_problem(problem, target, spectrum)?;

        let eigen = SymmetricEigen::new(symmetrize(to_dmatrix(*matrix)));
        let order = select(eigen.eigenvalues.as_slice(), target, spectrum)?;

        Ok(EigenDecomposition {
            vectors: Array2::from_shape_fn((n, target), |(i, j)| {
                eigen.eigenvectors[(i, order[j])]
            }),
            values: Array1::from_iter(order.iter().map(|&o| eigen.eigenvalues[o])),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_diagonal_matrix() {
        let matrix = Array2::from_diag(&array![4.0, 1.0, 3.0, 2.0]);
        let problem = EigenProblem::Standard(matrix.view());

        let largest = DenseSolver.solve(&problem, 2, Spectrum::Largest).unwrap();
        assert_eq!(largest.vectors.dim(), (4, 2));
        assert_abs_diff_eq!(largest.values[0], 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(largest.values[1], 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(largest.vectors[[0, 0]].abs(), 1.0, epsilon = 1e-12);

        let smallest = DenseSolver
            .solve(&problem, 2, Spectrum::Smallest { skip: 1 })
            .unwrap();
        assert_abs_diff_eq!(smallest.values[0], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(smallest.values[1], 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(smallest.vectors[[3, 0]].abs(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_eigenpairs_satisfy_definition() {
        let matrix = array![[2.0, -1.0, 0.0], [-1.0, 2.0, -1.0], [0.0, -1.0, 2.0]];
        let result = DenseSolver
            .solve(&EigenProblem::Standard(matrix.view()), 3, Spectrum::Largest)
            .unwrap();

        for k in 0..3 {
            let v = result.vectors.column(k);
            let av = matrix.dot(&v);
            for i in 0..3 {
                assert_abs_diff_eq!(av[i], result.values[k] * v[i], epsilon = 1e-10);
            }
        }
        assert_abs_diff_eq!(result.values[0], 2.0 + 2f64.sqrt(), epsilon = 1e-10);
    }

    #[test]
    fn test_rejects_generalized() {
        let a = Array2::<f64>::eye(2);
        let problem = EigenProblem::Generalized {
            lhs: a.view(),
            rhs: a.view(),
        };
        assert!(!DenseSolver.supports_generalized());
        assert!(DenseSolver.solve(&problem, 1, Spectrum::Largest).is_err());
    }
}
