use ndarray::{Array1, Array2, Axis};

use super::{linear_projection, Context, Fitted, SpectralArguments};
use crate::callbacks::DistanceCallback;
use crate::eigen::{EigenProblem, Spectrum};
use crate::error::Result;
use crate::neighbors::Neighbors;
use crate::utils::feature_matrix;

/// Symmetric heat-kernel weights `exp(-d² / width)` on the neighbor graph.
fn heat_weights(
    n: usize,
    neighbors: &Neighbors,
    distance: &dyn DistanceCallback,
    width: f64,
) -> Array2<f64> {
    let mut weights = Array2::zeros((n, n));
    for (i, local) in neighbors.iter().enumerate() {
        for &j in local {
            let d = distance.distance(i, j);
            let w = (-d * d / width).exp();
            weights[[i, j]] = w;
            weights[[j, i]] = w;
        }
    }
    weights
}

/// Graph Laplacian `D - W` and the degree matrix `D`.
fn laplacian(weights: &Array2<f64>) -> (Array2<f64>, Array2<f64>) {
    let degrees: Array1<f64> = weights.sum_axis(Axis(1));
    let degree = Array2::from_diag(&degrees);
    (&degree - weights, degree)
}

fn graph_laplacian(ctx: &Context<'_>, width: f64) -> Result<(Array2<f64>, Array2<f64>)> {
    let distance = ctx.distance()?;
    let weights = heat_weights(ctx.n_points(), ctx.neighbors()?, distance, width);
    Ok(laplacian(&weights))
}

pub(super) fn laplacian_eigenmaps(
    ctx: &Context<'_>,
    spectral: SpectralArguments,
    width: f64,
) -> Result<Fitted> {
    let (laplacian, degree) = graph_laplacian(ctx, width)?;
    let eigen = ctx.eigen(
        EigenProblem::Generalized {
            lhs: laplacian.view(),
            rhs: degree.view(),
        },
        spectral.target_dimension,
        Spectrum::Smallest { skip: 1 },
    )?;
    Ok(Fitted::new(eigen.vectors, eigen.values))
}

pub(super) fn locality_preserving(
    ctx: &Context<'_>,
    spectral: SpectralArguments,
    width: f64,
) -> Result<Fitted> {
    let (laplacian, degree) = graph_laplacian(ctx, width)?;
    let features = feature_matrix(ctx.n_points(), ctx.features()?);
    linear_projection(ctx, spectral, &features, &laplacian, Some(&degree))
}
