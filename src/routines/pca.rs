use std::sync::Arc;

use ndarray::{Array2, Axis};

use super::{Context, Fitted, SpectralArguments};
use crate::eigen::{DenseSolver, EigenProblem, Spectrum};
use crate::error::Result;
use crate::projection::{MatrixProjection, ProjectingFunction};
use crate::utils::{center_columns, double_center, feature_matrix, kernel_matrix};

/// Sample covariance of already centered rows.
fn covariance(centered: &Array2<f64>) -> Array2<f64> {
    let n_samples = centered.nrows();
    let denominator = (n_samples as f64 - 1.0).max(1.0);
    centered.t().dot(centered) / denominator
}

/// Principal component analysis. The embedding holds the scores of the
/// leading components and the eigenvalues are their explained variances.
pub(super) fn principal_components(ctx: &Context<'_>, target: usize) -> Result<Fitted> {
    let x = feature_matrix(ctx.n_points(), ctx.features()?);
    let mut centered = x.clone();
    let mean = center_columns(&mut centered);
    let covariance = covariance(&centered);

    let problem = EigenProblem::Standard(covariance.view());
    let eigen = match ctx.solver {
        Some(solver) => ctx.eigen_with(solver, problem, target, Spectrum::Largest)?,
        None => ctx.eigen_with(&DenseSolver, problem, target, Spectrum::Largest)?,
    };

    let projection =
        MatrixProjection::new(mean, eigen.vectors).map_err(|e| ctx.embedding_failure(e))?;
    let embedding = projection.project_rows(x.view());
    Ok(Fitted::new(embedding, eigen.values)
        .with_projection(ProjectingFunction::new(Arc::new(projection))))
}

/// Kernel PCA on the centered kernel matrix. Component `j` of point `i` is
/// `vᵢⱼ √λⱼ`.
pub(super) fn kernel_pca(ctx: &Context<'_>, spectral: SpectralArguments) -> Result<Fitted> {
    let mut kernel = kernel_matrix(ctx.n_points(), ctx.kernel()?);
    double_center(&mut kernel);

    let eigen = ctx.eigen(
        EigenProblem::Standard(kernel.view()),
        spectral.target_dimension,
        Spectrum::Largest,
    )?;
    let mut embedding = eigen.vectors;
    for (mut column, &lambda) in embedding.axis_iter_mut(Axis(1)).zip(eigen.values.iter()) {
        let scale = lambda.max(0.0).sqrt();
        column.mapv_inplace(|v| v * scale);
    }
    Ok(Fitted::new(embedding, eigen.values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_covariance_matches_definition() {
        let mut x = array![[1.0, 2.0], [3.0, 2.0], [5.0, 8.0]];
        center_columns(&mut x);
        let c = covariance(&x);
        // var([1, 3, 5]) = 4, var([2, 2, 8]) = 12, cov = 6
        assert_abs_diff_eq!(c[[0, 0]], 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(c[[1, 1]], 12.0, epsilon = 1e-12);
        assert_abs_diff_eq!(c[[0, 1]], 6.0, epsilon = 1e-12);
    }
}
