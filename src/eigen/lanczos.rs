use anyhow::{bail, ensure};
use log::debug;
use nalgebra::{DMatrix, DVector, SymmetricEigen};
use ndarray::Array1;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::{
    accept, check_problem, from_dmatrix, rayleigh_quotients, residual_norms, ritz_converged,
    select, symmetrize, to_dmatrix, CholeskyReduction, EigenDecomposition, EigenProblem,
    EigenSolver, ShiftInvert, Spectrum,
};

/// Thick-restarted Lanczos iteration with full reorthogonalization.
///
/// The largest eigenvalues are taken from the matrix directly. The smallest
/// come from the largest eigenvalues of a shift-inverted matrix, which keeps
/// clustered values near the bottom of the spectrum (null spaces of
/// alignment and Laplacian matrices) apart. Generalized problems are reduced
/// to standard form through a Cholesky factorization of the right-hand
/// matrix. When the Krylov dimension reaches the matrix size the result is
/// exact after a single pass.
#[derive(Debug, Clone)]
pub struct LanczosSolver {
    /// Size of the Krylov basis. Defaults to `max(4 * wanted, 100)` capped by
    /// the matrix size.
    pub krylov_dimension: Option<usize>,
    pub max_restarts: usize,
    /// Residual bound for a Ritz pair, relative to its Ritz value.
    pub tolerance: f64,
    pub seed: u64,
}

impl Default for LanczosSolver {
    fn default() -> Self {
        Self {
            krylov_dimension: None,
            max_restarts: 100,
            tolerance: 1e-9,
            seed: 42,
        }
    }
}

fn random_unit(n: usize, rng: &mut ChaCha8Rng) -> DVector<f64> {
    let v = DVector::from_fn(n, |_, _| rng.random_range(-1.0..1.0));
    let norm = v.norm();
    v / norm
}

fn orthogonalize(w: &mut DVector<f64>, basis: &DMatrix<f64>, columns: usize) {
    // twice is enough
    for _ in 0..2 {
        for i in 0..columns {
            let vi = basis.column(i);
            let c = w.dot(&vi);
            w.axpy(-c, &vi, 1.0);
        }
    }
}

/// Orthonormal basis together with the operator applied to each basis vector.
struct Krylov {
    vectors: DMatrix<f64>,
    images: DMatrix<f64>,
}

impl Krylov {
    fn new(n: usize, m: usize) -> Self {
        Self {
            vectors: DMatrix::zeros(n, m),
            images: DMatrix::zeros(n, m),
        }
    }

    /// Fills the columns from `from` on, continuing from `start`. Returns the
    /// image of the last basis vector.
    fn extend<F>(
        &mut self,
        apply: &F,
        from: usize,
        start: DVector<f64>,
        rng: &mut ChaCha8Rng,
    ) -> anyhow::Result<DVector<f64>>
    where
        F: Fn(&DVector<f64>) -> DVector<f64>,
    {
        let mut candidate = start;
        for j in from..self.vectors.ncols() {
            let direction = self.direction(candidate, j, rng)?;
            let image = apply(&direction);
            self.vectors.set_column(j, &direction);
            self.images.set_column(j, &image);
            candidate = image;
        }
        Ok(candidate)
    }

    /// Orthonormalizes `candidate` against the first `columns` vectors. An
    /// exhausted Krylov space continues in a fresh random direction.
    fn direction(
        &self,
        mut candidate: DVector<f64>,
        columns: usize,
        rng: &mut ChaCha8Rng,
    ) -> anyhow::Result<DVector<f64>> {
        for _ in 0..3 {
            let before = candidate.norm();
            orthogonalize(&mut candidate, &self.vectors, columns);
            let norm = candidate.norm();
            if norm > 1e-10 * before && norm > 0.0 {
                return Ok(candidate / norm);
            }
            candidate = random_unit(self.vectors.nrows(), rng);
        }
        bail!("Lanczos basis could not be extended past {} vectors", columns)
    }
}

impl LanczosSolver {
    fn basis_size(&self, wanted: usize, n: usize) -> usize {
        self.krylov_dimension
            .unwrap_or((4 * wanted).max(100))
            .max(wanted + 1)
            .min(n)
    }

    /// Largest `wanted` eigenpairs of the symmetric operator `apply`.
    fn largest<F>(
        &self,
        apply: F,
        n: usize,
        wanted: usize,
        rng: &mut ChaCha8Rng,
    ) -> anyhow::Result<(Vec<f64>, DMatrix<f64>)>
    where
        F: Fn(&DVector<f64>) -> DVector<f64>,
    {
        let m = self.basis_size(wanted, n);
        ensure!(
            m >= wanted,
            "Krylov dimension {} is below {} wanted eigenpairs",
            m,
            wanted
        );

        let mut krylov = Krylov::new(n, m);
        let mut kept = 0;
        let mut start = random_unit(n, rng);

        for restart in 0..=self.max_restarts {
            let mut residual = krylov.extend(&apply, kept, start, rng)?;

            let projected = symmetrize(krylov.vectors.transpose() * &krylov.images);
            let eigen = SymmetricEigen::new(projected);
            let order = select(eigen.eigenvalues.as_slice(), wanted, Spectrum::Largest)?;
            let coefficients = eigen.eigenvectors.select_columns(order.iter());
            let ritz = &krylov.vectors * &coefficients;
            let images = &krylov.images * &coefficients;
            let values: Vec<f64> = order.iter().map(|&o| eigen.eigenvalues[o]).collect();

            let scale = eigen.eigenvalues.amax().max(f64::MIN_POSITIVE);
            let residuals = residual_norms(&images, &ritz, &values);
            if m == n || ritz_converged(&residuals, &values, scale, self.tolerance) {
                debug!(
                    "Lanczos converged after {} restarts (basis size {})",
                    restart, m
                );
                return Ok((values, ritz));
            }

            // keep the wanted Ritz vectors and continue from the residual
            // direction of the whole basis
            orthogonalize(&mut residual, &krylov.vectors, m);
            for k in 0..wanted {
                krylov.vectors.set_column(k, &ritz.column(k));
                krylov.images.set_column(k, &images.column(k));
            }
            kept = wanted;
            start = residual;
        }

        bail!(
            "Lanczos iteration did not converge after {} restarts",
            self.max_restarts
        )
    }

    fn solve_standard(
        &self,
        matrix: &DMatrix<f64>,
        target: usize,
        spectrum: Spectrum,
    ) -> anyhow::Result<(Vec<f64>, DMatrix<f64>)> {
        let n = matrix.nrows();
        let wanted = spectrum.required(target);
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        let (values, vectors) = match spectrum {
            Spectrum::Largest => self.largest(|v| matrix * v, n, wanted, &mut rng)?,
            Spectrum::Smallest { .. } => {
                let inverse = ShiftInvert::below_spectrum(matrix)?;
                let (_, vectors) = self.largest(|v| inverse.apply(v), n, wanted, &mut rng)?;
                (rayleigh_quotients(matrix, &vectors), vectors)
            }
        };
        accept(matrix, &values, &vectors, target, spectrum)
    }
}

impl EigenSolver for LanczosSolver {
    fn supports_generalized(&self) -> bool {
        true
    }

    fn solve(
        &self,
        problem: &EigenProblem<'_>,
        target: usize,
        spectrum: Spectrum,
    ) -> anyhow::Result<EigenDecomposition> {
        check_problem(problem, target, spectrum)?;

        let (values, vectors) = match problem {
            EigenProblem::Standard(matrix) => {
                self.solve_standard(&symmetrize(to_dmatrix(*matrix)), target, spectrum)?
            }
            EigenProblem::Generalized { lhs, rhs } => {
                let reduction = CholeskyReduction::new(*rhs)?;
                let reduced = reduction.reduce(*lhs)?;
                let (values, vectors) = self.solve_standard(&reduced, target, spectrum)?;
                (values, reduction.recover(&vectors)?)
            }
        };

        Ok(EigenDecomposition {
            vectors: from_dmatrix(&vectors),
            values: Array1::from(values),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eigen::DenseSolver;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array2, ArrayView1};
    use rand::rngs::StdRng;

    fn random_symmetric(n: usize, seed: u64) -> Array2<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let a = Array2::from_shape_fn((n, n), |_| rng.random_range(-1.0..1.0));
        &a + &a.t()
    }

    /// Graph Laplacian of a path, eigenvalues `2 - 2 cos(πk / n)`.
    fn path_laplacian(n: usize) -> Array2<f64> {
        Array2::from_shape_fn((n, n), |(i, j)| {
            if i == j {
                if i == 0 || i + 1 == n {
                    1.0
                } else {
                    2.0
                }
            } else if i.abs_diff(j) == 1 {
                -1.0
            } else {
                0.0
            }
        })
    }

    /// Double-centered Gram matrix of random points, dense with a few large
    /// eigenvalues.
    fn centered_gram(rows: usize, cols: usize, seed: u64) -> Array2<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let data = Array2::from_shape_fn((rows, cols), |_| rng.random_range(0.0..1.0));
        let centered = &data - &data.mean_axis(ndarray::Axis(0)).unwrap();
        centered.dot(&centered.t())
    }

    fn assert_parallel(a: ArrayView1<f64>, b: ArrayView1<f64>) {
        let cosine = a.dot(&b) / (a.dot(&a).sqrt() * b.dot(&b).sqrt());
        assert_abs_diff_eq!(cosine.abs(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_matches_dense_on_small_matrix() {
        let matrix = random_symmetric(30, 7);
        let problem = EigenProblem::Standard(matrix.view());

        for spectrum in [Spectrum::Largest, Spectrum::Smallest { skip: 1 }] {
            let dense = DenseSolver.solve(&problem, 3, spectrum).unwrap();
            let lanczos = LanczosSolver::default().solve(&problem, 3, spectrum).unwrap();
            for k in 0..3 {
                assert_abs_diff_eq!(dense.values[k], lanczos.values[k], epsilon = 1e-8);
                assert_parallel(dense.vectors.column(k), lanczos.vectors.column(k));
            }
        }
    }

    #[test]
    fn test_restarted_run_on_larger_matrix() {
        // well separated extremal eigenvalues
        let n = 150;
        let diagonal = Array1::from_shape_fn(n, |i| {
            if i < 3 {
                100.0 + i as f64 * 10.0
            } else {
                i as f64 / n as f64
            }
        });
        let matrix = Array2::from_diag(&diagonal);
        let solver = LanczosSolver {
            krylov_dimension: Some(20),
            ..LanczosSolver::default()
        };
        let result = solver
            .solve(&EigenProblem::Standard(matrix.view()), 2, Spectrum::Largest)
            .unwrap();
        assert_abs_diff_eq!(result.values[0], 120.0, epsilon = 1e-6);
        assert_abs_diff_eq!(result.values[1], 110.0, epsilon = 1e-6);
    }

    #[test]
    fn test_smallest_of_path_laplacian_beyond_basis_size() {
        let n = 300;
        let matrix = path_laplacian(n);
        let problem = EigenProblem::Standard(matrix.view());
        let spectrum = Spectrum::Smallest { skip: 1 };

        let dense = DenseSolver.solve(&problem, 2, spectrum).unwrap();
        let lanczos = LanczosSolver::default().solve(&problem, 2, spectrum).unwrap();
        for k in 0..2 {
            let exact = 2.0 - 2.0 * (std::f64::consts::PI * (k + 1) as f64 / n as f64).cos();
            assert_abs_diff_eq!(dense.values[k], exact, epsilon = 1e-10);
            assert_abs_diff_eq!(lanczos.values[k], exact, epsilon = 1e-10);
            assert_parallel(dense.vectors.column(k), lanczos.vectors.column(k));
        }
    }

    #[test]
    fn test_smallest_with_small_restarted_basis() {
        let matrix = path_laplacian(200);
        let problem = EigenProblem::Standard(matrix.view());
        let spectrum = Spectrum::Smallest { skip: 1 };
        let solver = LanczosSolver {
            krylov_dimension: Some(12),
            ..LanczosSolver::default()
        };

        let dense = DenseSolver.solve(&problem, 3, spectrum).unwrap();
        let lanczos = solver.solve(&problem, 3, spectrum).unwrap();
        for k in 0..3 {
            assert_abs_diff_eq!(dense.values[k], lanczos.values[k], epsilon = 1e-9);
            assert_parallel(dense.vectors.column(k), lanczos.vectors.column(k));
        }
    }

    #[test]
    fn test_largest_of_dense_gram_matrix() {
        let matrix = centered_gram(400, 20, 5);
        let problem = EigenProblem::Standard(matrix.view());

        let dense = DenseSolver.solve(&problem, 3, Spectrum::Largest).unwrap();
        let lanczos = LanczosSolver::default()
            .solve(&problem, 3, Spectrum::Largest)
            .unwrap();
        for k in 0..3 {
            assert_abs_diff_eq!(
                dense.values[k] / lanczos.values[k],
                1.0,
                epsilon = 1e-9
            );
            assert_parallel(dense.vectors.column(k), lanczos.vectors.column(k));
        }
    }

    #[test]
    fn test_generalized_problem() {
        let lhs = random_symmetric(12, 3);
        let rhs = Array2::from_diag(&Array1::from_shape_fn(12, |i| 1.0 + i as f64));
        let problem = EigenProblem::Generalized {
            lhs: lhs.view(),
            rhs: rhs.view(),
        };

        let result = LanczosSolver::default()
            .solve(&problem, 2, Spectrum::Smallest { skip: 0 })
            .unwrap();
        assert!(result.values[0] <= result.values[1]);
        for k in 0..2 {
            let x = result.vectors.column(k);
            let ax = lhs.dot(&x);
            let bx = rhs.dot(&x);
            for i in 0..12 {
                assert_abs_diff_eq!(ax[i], result.values[k] * bx[i], epsilon = 1e-8);
            }
        }
    }

    #[test]
    fn test_generalized_laplacian_with_degrees() {
        // L x = λ D x on a path, compared with D^-1/2 L D^-1/2 solved densely
        let n = 300;
        let laplacian = path_laplacian(n);
        let degrees = laplacian.diag().to_owned();
        let degree_matrix = Array2::from_diag(&degrees);
        let problem = EigenProblem::Generalized {
            lhs: laplacian.view(),
            rhs: degree_matrix.view(),
        };
        let normalized = Array2::from_shape_fn((n, n), |(i, j)| {
            laplacian[[i, j]] / (degrees[i] * degrees[j]).sqrt()
        });

        let spectrum = Spectrum::Smallest { skip: 1 };
        let dense = DenseSolver
            .solve(&EigenProblem::Standard(normalized.view()), 2, spectrum)
            .unwrap();
        let lanczos = LanczosSolver::default().solve(&problem, 2, spectrum).unwrap();
        for k in 0..2 {
            assert_abs_diff_eq!(dense.values[k], lanczos.values[k], epsilon = 1e-10);
            let x = lanczos.vectors.column(k);
            let lx = laplacian.dot(&x);
            for i in 0..n {
                assert_abs_diff_eq!(lx[i], lanczos.values[k] * degrees[i] * x[i], epsilon = 1e-8);
            }
        }
    }

    #[test]
    fn test_unconverged_run_is_an_error() {
        let matrix = path_laplacian(200);
        let solver = LanczosSolver {
            krylov_dimension: Some(4),
            max_restarts: 0,
            ..LanczosSolver::default()
        };
        assert!(solver
            .solve(
                &EigenProblem::Standard(matrix.view()),
                2,
                Spectrum::Smallest { skip: 1 }
            )
            .is_err());
    }

    #[test]
    fn test_deterministic() {
        let matrix = random_symmetric(40, 11);
        let problem = EigenProblem::Standard(matrix.view());
        let first = LanczosSolver::default()
            .solve(&problem, 2, Spectrum::Largest)
            .unwrap();
        let second = LanczosSolver::default()
            .solve(&problem, 2, Spectrum::Largest)
            .unwrap();
        assert_eq!(first.values, second.values);
        assert_eq!(first.vectors, second.vectors);
    }
}
