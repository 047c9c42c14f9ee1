use anyhow::bail;
use log::debug;
use nalgebra::{DMatrix, SymmetricEigen, QR};
use ndarray::Array1;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::{
    accept, check_problem, from_dmatrix, rayleigh_quotients, residual_norms, ritz_converged, select,
    symmetrize, to_dmatrix, EigenDecomposition, EigenProblem, EigenSolver, ShiftInvert, Spectrum,
};

/// Randomized range finder (Halko, Martinsson & Tropp) refined by subspace
/// iteration with a Rayleigh-Ritz step after every pass.
///
/// The largest eigenvalues are iterated on the matrix itself, the smallest on
/// a shift-inverted matrix. Iteration stops once every wanted Ritz pair has
/// converged; a run that runs out of iterations is an error.
#[derive(Debug, Clone)]
pub struct RandomizedSolver {
    pub oversamples: usize,
    pub max_iterations: usize,
    /// Residual bound for a Ritz pair, relative to its Ritz value.
    pub tolerance: f64,
    pub seed: u64,
}

impl Default for RandomizedSolver {
    fn default() -> Self {
        Self {
            oversamples: 10,
            max_iterations: 300,
            tolerance: 1e-9,
            seed: 42,
        }
    }
}

fn orthonormal_basis(matrix: DMatrix<f64>) -> DMatrix<f64> {
    QR::new(matrix).q()
}

impl RandomizedSolver {
    /// Largest `wanted` eigenpairs of the symmetric operator `apply`.
    fn largest<F>(
        &self,
        apply: F,
        n: usize,
        wanted: usize,
    ) -> anyhow::Result<(Vec<f64>, DMatrix<f64>)>
    where
        F: Fn(&DMatrix<f64>) -> DMatrix<f64>,
    {
        let samples = (wanted + self.oversamples).min(n);
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let omega = DMatrix::from_fn(n, samples, |_, _| rng.random_range(-1.0..1.0));
        let mut basis = orthonormal_basis(apply(&omega));

        for iteration in 0..=self.max_iterations {
            let images = apply(&basis);
            let projected = symmetrize(basis.transpose() * &images);
            let eigen = SymmetricEigen::new(projected);
            let order = select(eigen.eigenvalues.as_slice(), wanted, Spectrum::Largest)?;
            let coefficients = eigen.eigenvectors.select_columns(order.iter());
            let ritz = &basis * &coefficients;
            let values: Vec<f64> = order.iter().map(|&o| eigen.eigenvalues[o]).collect();

            let scale = eigen.eigenvalues.amax().max(f64::MIN_POSITIVE);
            let residuals = residual_norms(&(&images * &coefficients), &ritz, &values);
            if samples == n || ritz_converged(&residuals, &values, scale, self.tolerance) {
                debug!(
                    "Randomized subspace of {} converged after {} iterations",
                    samples, iteration
                );
                return Ok((values, ritz));
            }
            basis = orthonormal_basis(images);
        }

        bail!(
            "Randomized subspace iteration did not converge after {} iterations",
            self.max_iterations
        )
    }
}

impl EigenSolver for RandomizedSolver {
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
            bail!("Randomized solver only handles standard eigenproblems");
        };
        let n = check_problem(problem, target, spectrum)?;
        let wanted = spectrum.required(target);
        let matrix = symmetrize(to_dmatrix(*matrix));

        let (values, vectors) = match spectrum {
            Spectrum::Largest => self.largest(|block| &matrix * block, n, wanted)?,
            Spectrum::Smallest { .. } => {
                let inverse = ShiftInvert::below_spectrum(&matrix)?;
                let (_, vectors) = self.largest(|block| inverse.apply_block(block), n, wanted)?;
                (rayleigh_quotients(&matrix, &vectors), vectors)
            }
        };
        let (values, vectors) = accept(&matrix, &values, &vectors, target, spectrum)?;

        Ok(EigenDecomposition {
            vectors: from_dmatrix(&vectors),
            values: Array1::from(values),
        })
    }
}
