use anyhow::ensure;
use nalgebra::{DMatrix, QR};
use ndarray::Array2;
use rayon::prelude::*;

use super::tangent_space::{neighborhood, tangent_coordinates};
use super::{Context, Fitted, SpectralArguments};
use crate::callbacks::KernelCallback;
use crate::eigen::{EigenProblem, Spectrum};
use crate::error::Result;
use crate::neighbors::Neighbors;

/// Hessian estimator of a neighborhood: orthonormalizes `[1, V, Vₐ⊙V_b]`
/// (constant, tangent coordinates, their pairwise products) and keeps the
/// columns spanning the quadratic part.
fn hessian_estimator(coordinates: &DMatrix<f64>) -> anyhow::Result<DMatrix<f64>> {
    let m = coordinates.nrows();
    let target = coordinates.ncols();
    let quadratic = target * (target + 1) / 2;
    let columns = 1 + target + quadratic;
    ensure!(
        columns <= m,
        "Neighborhood of {} points is too small for a {}-dimensional Hessian",
        m,
        target
    );

    let mut design = DMatrix::<f64>::zeros(m, columns);
    design.column_mut(0).fill(1.0);
    design.columns_mut(1, target).copy_from(coordinates);
    let mut column = 1 + target;
    for a in 0..target {
        for b in a..target {
            let product = coordinates.column(a).component_mul(&coordinates.column(b));
            design.set_column(column, &product);
            column += 1;
        }
    }

    let q = QR::new(design).q();
    Ok(q.columns(1 + target, quadratic).into_owned())
}

fn hessian_alignment(
    n: usize,
    neighbors: &Neighbors,
    kernel: &dyn KernelCallback,
    target: usize,
    shift: f64,
) -> anyhow::Result<Array2<f64>> {
    let blocks: Vec<(Vec<usize>, DMatrix<f64>)> = neighbors
        .par_iter()
        .enumerate()
        .map(|(i, local)| -> anyhow::Result<(Vec<usize>, DMatrix<f64>)> {
            let indices = neighborhood(i, local);
            let coordinates = tangent_coordinates(kernel, &indices, target)?;
            let estimator = hessian_estimator(&coordinates)?;
            let block = &estimator * estimator.transpose();
            Ok((indices, block))
        })
        .collect::<anyhow::Result<_>>()?;

    let mut alignment = Array2::zeros((n, n));
    for (indices, block) in blocks {
        for (a, &p) in indices.iter().enumerate() {
            for (b, &q) in indices.iter().enumerate() {
                alignment[[p, q]] += block[(a, b)];
            }
        }
    }
    for i in 0..n {
        alignment[[i, i]] += shift;
    }
    Ok(alignment)
}

pub(super) fn hessian_locally_linear(
    ctx: &Context<'_>,
    spectral: SpectralArguments,
    shift: f64,
) -> Result<Fitted> {
    let kernel = ctx.kernel()?;
    let alignment = hessian_alignment(
        ctx.n_points(),
        ctx.neighbors()?,
        kernel,
        spectral.target_dimension,
        shift,
    )
    .map_err(|e| ctx.embedding_failure(e))?;

    let eigen = ctx.eigen(
        EigenProblem::Standard(alignment.view()),
        spectral.target_dimension,
        Spectrum::Smallest { skip: 1 },
    )?;
    Ok(Fitted::new(eigen.vectors, eigen.values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_estimator_is_orthogonal_to_linear_part() {
        let coordinates = DMatrix::from_fn(7, 2, |a, b| ((a + 1) as f64).powi(b as i32 + 1).sin());
        let estimator = hessian_estimator(&coordinates).unwrap();
        assert_eq!(estimator.ncols(), 3);

        let ones = DMatrix::<f64>::from_element(7, 1, 1.0);
        let constant = estimator.transpose() * ones;
        let linear = estimator.transpose() * &coordinates;
        for value in constant.iter().chain(linear.iter()) {
            assert_abs_diff_eq!(*value, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_estimator_needs_enough_points() {
        let coordinates = DMatrix::from_fn(5, 2, |a, b| (a * (b + 1)) as f64);
        assert!(hessian_estimator(&coordinates).is_err());
    }
}
