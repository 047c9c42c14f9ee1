use anyhow::ensure;
use ndarray::{Array1, Array2, Axis};

use super::{Context, Fitted, SpectralArguments};
use crate::eigen::{EigenProblem, Spectrum};
use crate::error::Result;
use crate::utils::distance_matrix;

/// Symmetric conjugate of the diffusion operator built from a Gaussian
/// kernel with density normalization, and the row sums needed to map its
/// eigenvectors back.
fn diffusion_operator(
    distances: &Array2<f64>,
    width: f64,
) -> anyhow::Result<(Array2<f64>, Array1<f64>)> {
    let mut kernel = distances.mapv(|d| (-d * d / width).exp());

    let density = kernel.sum_axis(Axis(1));
    ensure!(
        density.iter().all(|&p| p > 0.0),
        "Gaussian kernel width {} is too small for the given distances",
        width
    );
    kernel.indexed_iter_mut().for_each(|((i, j), value)| {
        *value /= density[i] * density[j];
    });

    let degree = kernel.sum_axis(Axis(1));
    kernel.indexed_iter_mut().for_each(|((i, j), value)| {
        *value /= (degree[i] * degree[j]).sqrt();
    });
    Ok((kernel, degree))
}

pub(super) fn diffusion_map(
    ctx: &Context<'_>,
    spectral: SpectralArguments,
    timesteps: usize,
    width: f64,
) -> Result<Fitted> {
    let n = ctx.n_points();
    let target = spectral.target_dimension;
    let distances = distance_matrix(n, ctx.distance()?);
    let (operator, _) =
        diffusion_operator(&distances, width).map_err(|e| ctx.embedding_failure(e))?;

    let eigen = ctx.eigen(EigenProblem::Standard(operator.view()), target + 1, Spectrum::Largest)?;

    // the leading eigenvector is the stationary one, dividing by it yields the
    // right eigenvectors of the Markov matrix normalized to the trivial one
    let stationary = eigen.vectors.column(0);
    let exponent = i32::try_from(timesteps).unwrap_or(i32::MAX);
    let mut embedding = Array2::zeros((n, target));
    let mut values = Array1::zeros(target);
    for j in 0..target {
        let lambda = eigen.values[j + 1];
        let scale = lambda.powi(exponent);
        values[j] = lambda;
        for i in 0..n {
            embedding[[i, j]] = eigen.vectors[[i, j + 1]] / stationary[i] * scale;
        }
    }
    Ok(Fitted::new(embedding, values))
}
