use anyhow::{anyhow, ensure};
use nalgebra::{DMatrix, DVector};
use ndarray::Array2;
use rayon::prelude::*;

use super::{linear_projection, Context, Fitted, SpectralArguments};
use crate::callbacks::KernelCallback;
use crate::eigen::{EigenProblem, Spectrum};
use crate::error::Result;
use crate::neighbors::Neighbors;
use crate::utils::feature_matrix;

/// Barycentric reconstruction weights of every point from its neighbors,
/// computed in feature space through the kernel. Row `i` holds the weights of
/// point `i` at the columns of its neighbors and sums to one.
pub(super) fn reconstruction_weights(
    n: usize,
    neighbors: &Neighbors,
    kernel: &dyn KernelCallback,
    shift: f64,
) -> anyhow::Result<Array2<f64>> {
    let rows: Vec<Vec<f64>> = neighbors
        .par_iter()
        .enumerate()
        .map(|(i, local)| -> anyhow::Result<Vec<f64>> {
            let k = local.len();
            let k_ii = kernel.kernel(i, i);
            let k_ia: Vec<f64> = local.iter().map(|&a| kernel.kernel(i, a)).collect();

            // local Gram matrix of the neighbors shifted to the point
            let mut gram = DMatrix::from_fn(k, k, |a, b| {
                kernel.kernel(local[a], local[b]) - k_ia[a] - k_ia[b] + k_ii
            });
            let trace = gram.trace();
            let regularizer = if trace > 0.0 { shift * trace } else { shift };
            for a in 0..k {
                gram[(a, a)] += regularizer;
            }

            let weights = gram
                .lu()
                .solve(&DVector::from_element(k, 1.0))
                .ok_or_else(|| {
                    anyhow!("Local Gram matrix of point {} is singular, raise the eigenshift", i)
                })?;
            let sum = weights.sum();
            ensure!(
                sum.is_finite() && sum.abs() > f64::EPSILON,
                "Reconstruction weights of point {} cannot be normalized",
                i
            );
            Ok(weights.iter().map(|w| w / sum).collect())
        })
        .collect::<anyhow::Result<_>>()?;

    let mut weights = Array2::zeros((n, n));
    for (i, (local, row)) in neighbors.iter().zip(rows).enumerate() {
        for (&j, w) in local.iter().zip(row) {
            weights[[i, j]] += w;
        }
    }
    Ok(weights)
}

/// `(I - W)ᵀ (I - W)`.
fn alignment_matrix(weights: Array2<f64>) -> Array2<f64> {
    let n = weights.nrows();
    let residual = Array2::eye(n) - weights;
    residual.t().dot(&residual)
}

fn weight_alignment(ctx: &Context<'_>, shift: f64) -> Result<Array2<f64>> {
    let kernel = ctx.kernel()?;
    let weights = reconstruction_weights(ctx.n_points(), ctx.neighbors()?, kernel, shift)
        .map_err(|e| ctx.embedding_failure(e))?;
    Ok(alignment_matrix(weights))
}

pub(super) fn kernel_locally_linear(
    ctx: &Context<'_>,
    spectral: SpectralArguments,
    shift: f64,
) -> Result<Fitted> {
    let alignment = weight_alignment(ctx, shift)?;
    let eigen = ctx.eigen(
        EigenProblem::Standard(alignment.view()),
        spectral.target_dimension,
        Spectrum::Smallest { skip: 1 },
    )?;
    Ok(Fitted::new(eigen.vectors, eigen.values))
}

pub(super) fn neighborhood_preserving(
    ctx: &Context<'_>,
    spectral: SpectralArguments,
    shift: f64,
) -> Result<Fitted> {
    let alignment = weight_alignment(ctx, shift)?;
    let features = feature_matrix(ctx.n_points(), ctx.features()?);
    linear_projection(ctx, spectral, &features, &alignment, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::LinearKernel;
    use crate::neighbors::{BruteForce, NeighborFinder, NeighborMetric};
    use approx::assert_abs_diff_eq;
    use ndarray::Array2;

    #[test]
    fn test_weights_reconstruct_points_on_a_line() {
        // equally spaced points: each interior point is the mean of its two neighbors
        let data =
            Array2::from_shape_fn((6, 2), |(i, j)| if j == 0 { i as f64 } else { 2.0 * i as f64 });
        let kernel = LinearKernel::new(data.view());
        let neighbors = BruteForce
            .find_neighbors(6, 2, &NeighborMetric::Kernel(&kernel))
            .unwrap();

        let weights = reconstruction_weights(6, &neighbors, &kernel, 1e-9).unwrap();
        for i in 0..6 {
            assert_abs_diff_eq!(weights.row(i).sum(), 1.0, epsilon = 1e-9);
        }
        assert_abs_diff_eq!(weights[[3, 2]], 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(weights[[3, 4]], 0.5, epsilon = 1e-6);

        let alignment = alignment_matrix(weights);
        for i in 0..6 {
            assert_abs_diff_eq!(alignment.row(i).sum(), 0.0, epsilon = 1e-9);
        }
    }
}
