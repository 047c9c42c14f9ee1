use anyhow::ensure;
use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::Array2;
use rayon::prelude::*;

use super::{linear_projection, Context, Fitted, SpectralArguments};
use crate::callbacks::KernelCallback;
use crate::eigen::{select, EigenProblem, Spectrum};
use crate::error::Result;
use crate::neighbors::Neighbors;
use crate::utils::feature_matrix;

/// Point `i` followed by its neighbors.
pub(super) fn neighborhood(i: usize, local: &[usize]) -> Vec<usize> {
    let mut indices = Vec::with_capacity(local.len() + 1);
    indices.push(i);
    indices.extend_from_slice(local);
    indices
}

/// Orthonormal tangent coordinates of a neighborhood: the leading
/// `target` eigenvectors of its centered Gram matrix, one column each.
pub(super) fn tangent_coordinates(
    kernel: &dyn KernelCallback,
    indices: &[usize],
    target: usize,
) -> anyhow::Result<DMatrix<f64>> {
    let m = indices.len();
    ensure!(
        target <= m,
        "Neighborhood of {} points cannot span {} tangent directions",
        m,
        target
    );
    let mut gram = DMatrix::from_fn(m, m, |a, b| kernel.kernel(indices[a], indices[b]));

    let row_means: Vec<f64> = (0..m).map(|a| gram.row(a).mean()).collect();
    let grand_mean = row_means.iter().sum::<f64>() / m as f64;
    for a in 0..m {
        for b in 0..m {
            gram[(a, b)] += grand_mean - row_means[a] - row_means[b];
        }
    }

    let eigen = SymmetricEigen::new(gram);
    let order = select(eigen.eigenvalues.as_slice(), target, Spectrum::Largest)?;
    Ok(eigen.eigenvectors.select_columns(order.iter()))
}

/// Sum of the local alignment blocks `I - Gᵢ Gᵢᵀ`, `Gᵢ = [1/√m, Vᵢ]`, with
/// `shift` added to the diagonal.
fn alignment_matrix(
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
            let m = indices.len();
            let coordinates = tangent_coordinates(kernel, &indices, target)?;

            let mut basis = DMatrix::<f64>::zeros(m, target + 1);
            basis.column_mut(0).fill(1.0 / (m as f64).sqrt());
            basis.columns_mut(1, target).copy_from(&coordinates);

            let block = DMatrix::<f64>::identity(m, m) - &basis * basis.transpose();
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

fn tangent_alignment(ctx: &Context<'_>, target: usize, shift: f64) -> Result<Array2<f64>> {
    let kernel = ctx.kernel()?;
    alignment_matrix(ctx.n_points(), ctx.neighbors()?, kernel, target, shift)
        .map_err(|e| ctx.embedding_failure(e))
}

pub(super) fn kernel_tangent_space(
    ctx: &Context<'_>,
    spectral: SpectralArguments,
    shift: f64,
) -> Result<Fitted> {
    let alignment = tangent_alignment(ctx, spectral.target_dimension, shift)?;
    let eigen = ctx.eigen(
        EigenProblem::Standard(alignment.view()),
        spectral.target_dimension,
        Spectrum::Smallest { skip: 1 },
    )?;
    Ok(Fitted::new(eigen.vectors, eigen.values))
}

pub(super) fn linear_tangent_space(
    ctx: &Context<'_>,
    spectral: SpectralArguments,
    shift: f64,
) -> Result<Fitted> {
    let alignment = tangent_alignment(ctx, spectral.target_dimension, shift)?;
    let features = feature_matrix(ctx.n_points(), ctx.features()?);
    linear_projection(ctx, spectral, &features, &alignment, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::LinearKernel;
    use crate::neighbors::{BruteForce, NeighborFinder, NeighborMetric};
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_tangent_of_a_line() {
        let data = array![[0.0, 0.0], [1.0, 1.0], [2.0, 2.0], [3.0, 3.0]];
        let kernel = LinearKernel::new(data.view());
        let coordinates = tangent_coordinates(&kernel, &[0, 1, 2, 3], 1).unwrap();

        // centered positions along the line are proportional to -1.5..1.5
        let expected = [-1.5, -0.5, 0.5, 1.5];
        let norm = expected.iter().map(|v: &f64| v * v).sum::<f64>().sqrt();
        let sign = coordinates[(3, 0)].signum();
        for a in 0..4 {
            assert_abs_diff_eq!(sign * coordinates[(a, 0)], expected[a] / norm, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_alignment_annihilates_constants() {
        let data = Array2::from_shape_fn((10, 3), |(i, j)| {
            ((i * 7 + j * 3) % 5) as f64 + 0.1 * i as f64
        });
        let kernel = LinearKernel::new(data.view());
        let neighbors = BruteForce
            .find_neighbors(10, 4, &NeighborMetric::Kernel(&kernel))
            .unwrap();

        let alignment = alignment_matrix(10, &neighbors, &kernel, 2, 0.0).unwrap();
        for i in 0..10 {
            assert_abs_diff_eq!(alignment.row(i).sum(), 0.0, epsilon = 1e-9);
            for j in 0..10 {
                assert_abs_diff_eq!(alignment[[i, j]], alignment[[j, i]], epsilon = 1e-12);
            }
        }
    }
}
